// UI and formatting module

pub mod formatters;

// Re-export commonly used items for cleaner imports
pub use formatters::{
    format_event, format_number, format_outcome, format_timestamp, format_value, print_config_report,
    print_snapshot,
};
