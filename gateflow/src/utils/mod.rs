//! Utility functions for timestamps and model-reply cleanup.

pub mod text;
pub mod timestamps;

pub use text::{extract_json_object, remove_thinking_process};
pub use timestamps::{current_month, display_stamp, file_stamp};
