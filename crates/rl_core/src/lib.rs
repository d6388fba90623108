pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use identity::IdentityVerifier;
pub use models::InferenceModel;
pub use storage::{Collection, Document, DocumentStore, Scope, WriteBatch, WriteOp};
pub use types::*;

pub mod prelude {
    pub use super::{ArticleDraft, ArticleRecord, HistoryEntry, Job, JobStatus, ScrapeResult};
    pub use super::{DocumentStore, InferenceModel, Result, Error};
}
