//! Data models for jobs, import parameters and hierarchical records

pub mod import_params;
pub mod job;
pub mod move_request;
pub mod record;
pub mod validation;

pub use import_params::{ImportKind, ImportParameters, UploadedFile};
pub use job::{Job, JobLogEntry, JobOutcome, JobPayload, JobStatus, JobUser, UpdateDocumentsRequest};
pub use move_request::MoveRequest;
pub use record::{HierarchicalRecord, NewRecord, RecordKind, RecordUpdate};
pub use validation::{ValidationBlock, ValidationResult, ValidatorMode};
