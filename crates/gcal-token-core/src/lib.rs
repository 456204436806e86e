//! Core types: credential record, firmware defines, tracing

pub mod firmware;
pub mod record;
pub mod tracing;

pub use firmware::FirmwareDefines;
pub use record::{CALENDAR_READONLY_SCOPE, CredentialRecord, RecordError, RecordResult};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
