//! Utility functions for string and timestamp formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_timestamp, parse_timestamp, truncate_string};
