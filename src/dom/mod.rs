pub mod processor;

pub use processor::{cap_content, sanitize_html, truncate_with_marker, DomProcessor};
