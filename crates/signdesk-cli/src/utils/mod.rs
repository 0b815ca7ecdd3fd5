//! Utility functions for text formatting.

pub mod format;

pub use format::{
    contains_ignore_case, format_date, format_optional_date, format_price, table, truncate_string,
};
