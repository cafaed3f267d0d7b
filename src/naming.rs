//! Human-readable labels and descriptions for backups.

use chrono::{DateTime, Local};

use crate::backend::VolumeInfo;

/// Placeholder used when a volume has no attachment or the attached server
/// cannot be resolved.
pub const UNATTACHED: &str = "unattached";

/// Composes a backup label from project, server, device, and volume names.
///
/// Missing server and device fields degrade to [`UNATTACHED`]; a volume
/// without a name falls back to its id.
#[must_use]
pub fn backup_label(volume: &VolumeInfo, server_name: Option<&str>) -> String {
    let project = volume.project.as_deref().unwrap_or("-");
    let server = server_name.unwrap_or(UNATTACHED);
    let device = volume
        .attachment
        .as_ref()
        .and_then(|attachment| attachment.device.as_deref())
        .unwrap_or(UNATTACHED);
    let name = volume.name.as_deref().unwrap_or(volume.id.as_str());
    format!("{project} - {server} - {device} - {name}")
}

/// Describes a backup by its wall-clock creation time.
#[must_use]
pub fn backup_description(created: DateTime<Local>) -> String {
    format!("created at {}", created.format("%Y-%m-%d %H:%M:%S"))
}
