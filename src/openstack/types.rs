//! Wire types for the block-storage and compute HTTP APIs.
//!
//! Payloads arrive wrapped in a single-key envelope (`{"backup": {...}}`),
//! so each resource gets an envelope struct plus the inner wire struct.
//! Conversions into the domain types live here so the client module stays
//! free of serde detail.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{BackupRecord, BackupStatus, ServerInfo, VolumeAttachment, VolumeInfo};

#[derive(Debug, Deserialize)]
pub(crate) struct BackupEnvelope {
    pub backup: BackupWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackupListEnvelope {
    pub backups: Vec<BackupWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackupWire {
    pub id: String,
    #[serde(default)]
    pub volume_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl BackupWire {
    pub(crate) fn into_record(self) -> BackupRecord {
        BackupRecord {
            id: self.id,
            volume_id: self.volume_id.unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .map_or(BackupStatus::Unknown, BackupStatus::parse),
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateBackupEnvelope<'a> {
    pub backup: CreateBackupWire<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateBackupWire<'a> {
    pub volume_id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VolumeEnvelope {
    pub volume: VolumeWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VolumeWire {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Owning project, exposed by the admin-only tenant attribute.
    #[serde(default, rename = "os-vol-tenant-attr:tenant_id")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttachmentWire {
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

impl VolumeWire {
    pub(crate) fn into_info(self) -> VolumeInfo {
        let attachment = self.attachments.into_iter().find_map(|attachment| {
            attachment.server_id.map(|server_id| VolumeAttachment {
                server_id,
                device: attachment.device,
            })
        });
        VolumeInfo {
            id: self.id,
            name: self.name,
            project: self.tenant_id,
            attachment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerEnvelope {
    pub server: ServerWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerWire {
    pub id: String,
    pub name: String,
}

impl ServerWire {
    pub(crate) fn into_info(self) -> ServerInfo {
        ServerInfo {
            id: self.id,
            name: self.name,
        }
    }
}

/// Parses the naive `created_at` timestamps the service emits, with or
/// without fractional seconds, treating them as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
