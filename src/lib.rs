pub mod config;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod ports;
pub mod scoring;
pub mod store;
pub mod submission;

pub use config::AppConfig;
pub use error::{Result, TiplineError};
pub use evaluation::{EvaluationReport, EvaluationScope, EvaluationService, MemberResult};
pub use ports::{
    AuditAction, AuditEntry, AuditSink, EntityChanged, LogAuditSink, MembershipResolver,
    NoopInvalidator, ViewInvalidator,
};
pub use store::{PostgresStore, StoreFactory, UnitOfWork};
pub use submission::{SubmissionOutcome, SubmissionReceipt, SubmissionService};
