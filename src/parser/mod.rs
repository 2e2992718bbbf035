//! Log line parsing into structured error records.

mod line;
mod record;
mod severity;

pub use line::LineParser;
pub use record::{fingerprint, normalize_message, ErrorRecord, RecordContext, RequestMetadata};
pub use severity::{Severity, UnknownSeverity};
