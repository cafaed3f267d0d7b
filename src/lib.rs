//! Core library for the cindersweep backup lifecycle tool.
//!
//! The crate automates block-storage backup lifecycles: for each volume in a
//! configured plan it creates a backup, polls it to a terminal state, retires
//! backups past the volume's retention depth, and emails a summary. The
//! orchestration is generic over a [`Backend`] capability trait; the
//! [`openstack`] module provides the HTTP implementation.

pub mod backend;
pub mod config;
pub mod logging;
pub mod naming;
pub mod openstack;
pub mod poller;
pub mod report;
pub mod retention;
pub mod run;

pub use backend::{
    Backend, BackendFuture, BackupRecord, BackupStatus, CreateBackupRequest, ServerInfo,
    VolumeAttachment, VolumeInfo,
};
pub use config::{ConfigError, PlanEntry, ReportConfig, RunConfig};
pub use logging::LoggingError;
pub use openstack::{OpenStackBackend, OpenStackConfig, OpenStackError};
pub use poller::{PollError, PollOutcome, Poller};
pub use report::{REPORT_SUBJECT, ReportError, Reporter, SmtpReporter, format_report};
pub use retention::select_for_deletion;
pub use run::{RunOrchestrator, RunSummary};
