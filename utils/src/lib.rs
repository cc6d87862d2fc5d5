mod content;
mod logging;

pub use content::{canonical_json, content_identifier, ContentAddress};
pub use logging::{parse_level, setup_logging};
