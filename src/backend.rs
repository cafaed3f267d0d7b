//! Backend abstraction over the cloud block-storage control plane.
//!
//! The orchestrator only ever talks to this capability surface: fetch volume
//! and server metadata, create a backup, poll a backup by id, list a volume's
//! backup history, and delete a backup. The concrete HTTP client lives in
//! [`crate::openstack`]; tests substitute fakes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

/// Lifecycle status of a backup resource.
///
/// The closed set mirrors what the block-storage service reports. Anything
/// outside the expected values maps to [`BackupStatus::Unknown`] so an
/// unrecognised status is never mistaken for success.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackupStatus {
    /// The backup is still being written.
    Creating,
    /// The backup completed and is usable.
    Available,
    /// The service reported a failure.
    Error,
    /// A delete request has been accepted and is in progress.
    Deleting,
    /// Any status value outside the expected closed set.
    Unknown,
}

impl BackupStatus {
    /// Parses a wire status string, mapping unexpected values to `Unknown`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "creating" => Self::Creating,
            "available" => Self::Available,
            "error" => Self::Error,
            "deleting" => Self::Deleting,
            _ => Self::Unknown,
        }
    }

    /// Returns true once no further transition is expected without external
    /// action. Only `creating` is non-terminal for the creation path.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Creating)
    }

    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::Error => "error",
            Self::Deleting => "deleting",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backup resource as reported by the backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackupRecord {
    /// Provider identifier for the backup.
    pub id: String,
    /// Identifier of the volume the backup belongs to.
    pub volume_id: String,
    /// Current lifecycle status.
    pub status: BackupStatus,
    /// Creation timestamp, when the backend reported one.
    pub created_at: Option<DateTime<Utc>>,
}

/// Attachment details for a volume that is plugged into a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeAttachment {
    /// Identifier of the server the volume is attached to.
    pub server_id: String,
    /// Device path on the server (for example `/dev/vdb`).
    pub device: Option<String>,
}

/// Volume metadata needed for backup naming.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeInfo {
    /// Provider identifier for the volume.
    pub id: String,
    /// Human-friendly volume name, when set.
    pub name: Option<String>,
    /// Label of the owning project.
    pub project: Option<String>,
    /// First attachment, when the volume is plugged into a server. Volumes
    /// need not be attached.
    pub attachment: Option<VolumeAttachment>,
}

/// Server metadata needed for backup naming.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerInfo {
    /// Provider identifier for the server.
    pub id: String,
    /// Human-friendly server name.
    pub name: String,
}

/// Parameters for a backup creation request.
///
/// `force` is always set: volumes may be attached and in active use, and
/// backups must proceed anyway rather than requiring detachment first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateBackupRequest {
    /// Volume to back up.
    pub volume_id: String,
    /// Human-readable backup label.
    pub name: String,
    /// Free-form description; embeds the creation timestamp.
    pub description: String,
    /// Bypass the "volume must be available" guard on the backend.
    pub force: bool,
}

impl CreateBackupRequest {
    /// Builds a forced creation request.
    #[must_use]
    pub fn new(
        volume_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            volume_id: volume_id.into(),
            name: name.into(),
            description: description.into(),
            force: true,
        }
    }
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Capability surface the lifecycle orchestrator requires from the cloud.
pub trait Backend {
    /// Provider specific error type returned by the backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches volume metadata by id.
    fn get_volume<'a>(&'a self, volume_id: &'a str)
    -> BackendFuture<'a, VolumeInfo, Self::Error>;

    /// Fetches server metadata by id.
    fn get_server<'a>(&'a self, server_id: &'a str)
    -> BackendFuture<'a, ServerInfo, Self::Error>;

    /// Requests creation of a new backup and returns the initial record.
    fn create_backup<'a>(
        &'a self,
        request: &'a CreateBackupRequest,
    ) -> BackendFuture<'a, BackupRecord, Self::Error>;

    /// Fetches a backup by id. Returns `Ok(None)` when the resource no longer
    /// exists, which the deletion poll treats as completion.
    fn get_backup<'a>(
        &'a self,
        backup_id: &'a str,
    ) -> BackendFuture<'a, Option<BackupRecord>, Self::Error>;

    /// Lists a volume's backup history, newest first, across all accessible
    /// scopes (backups may be visible across a shared administrative scope).
    fn list_backups<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> BackendFuture<'a, Vec<BackupRecord>, Self::Error>;

    /// Issues a delete request for a backup.
    fn delete_backup<'a>(&'a self, backup_id: &'a str) -> BackendFuture<'a, (), Self::Error>;
}
