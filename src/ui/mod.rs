// UI and formatting module

pub mod formatters;
pub mod prompts;
pub mod summary;

// Re-export commonly used items for cleaner imports
pub use formatters::{format_size, format_timestamp, format_uptime};
pub use prompts::{dimmed, info, success, warn};
pub use summary::format_summary_line;
