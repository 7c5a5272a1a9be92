//! Activity recording: session log, correlation and export

mod engine;
mod exchange;
mod export;
mod session;
mod token;

pub use engine::ActivityRecorder;
pub use exchange::{ArchiveText, Payload, RequestDescriptor, ResponseDescriptor};
pub use export::{HarExport, EXPORT_MIME_TYPE};
pub use session::SessionLog;
pub use token::{RequestToken, TOKEN_LEN};

/// MIME type of the synthetic page-load response
pub const PAGE_LOAD_MIME_TYPE: &str = "text/html";

/// Body text of the synthetic page-load response
pub const PAGE_LOAD_TEXT: &str = "Generated";
