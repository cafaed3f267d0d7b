//! Orchestrates one end-to-end backup lifecycle run.
//!
//! The run has two phases with a hard barrier between them. Phase one walks
//! the plan in order: each volume gets a new backup, polled to a terminal
//! status, and — only once the new backup is confirmed available — a
//! retention scan over the live history queues expired backups for deletion.
//! Phase two drains that queue, polling each deletion until the resource is
//! gone. Pruning never starts before every create has settled, so a crash
//! mid-run cannot leave a volume with zero backups.
//!
//! Every failure is recovered at the per-volume or per-backup level and
//! counted; the run always carries on to the next item.

use chrono::Local;
use thiserror::Error;

use crate::backend::{Backend, BackupStatus, CreateBackupRequest};
use crate::naming::{backup_description, backup_label};
use crate::poller::{PollError, PollOutcome, Poller};
use crate::report::{REPORT_SUBJECT, Reporter, format_report};
use crate::retention::select_for_deletion;

pub use crate::config::PlanEntry;

/// Aggregate counts for one run, handed to the reporter once complete.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// Backups confirmed available.
    pub created: usize,
    /// Volumes whose backup was rejected or settled in a bad status.
    pub failed: usize,
    /// Backups confirmed removed.
    pub deleted: usize,
    /// Backups whose deletion errored or stalled.
    pub delete_failed: usize,
}

/// Why a volume's backup attempt failed. Recovered per volume.
#[derive(Debug, Error)]
enum CreateFailure<E>
where
    E: std::error::Error + 'static,
{
    #[error("backup request rejected: {0}")]
    Request(#[source] E),
    #[error("backup {backup_id} settled in status {status} -- check backend logs")]
    Settled {
        backup_id: String,
        status: BackupStatus,
    },
    #[error("backup {backup_id} disappeared while creating")]
    Vanished { backup_id: String },
    #[error(transparent)]
    Poll(#[from] PollError<E>),
}

/// Why a backup's deletion failed. Recovered per backup.
#[derive(Debug, Error)]
enum DeleteFailure<E>
where
    E: std::error::Error + 'static,
{
    #[error("delete request rejected: {0}")]
    Request(#[source] E),
    #[error("backup {backup_id} reported status {status} during deletion")]
    Stuck {
        backup_id: String,
        status: BackupStatus,
    },
    #[error(transparent)]
    Poll(#[from] PollError<E>),
}

/// Drives the create → poll → retire → report sequence across a plan.
#[derive(Debug)]
pub struct RunOrchestrator<B, R> {
    backend: B,
    poller: Poller,
    reporter: Option<R>,
}

impl<B, R> RunOrchestrator<B, R>
where
    B: Backend,
    R: Reporter,
{
    /// Creates an orchestrator. A `None` reporter skips the summary email.
    #[must_use]
    pub const fn new(backend: B, poller: Poller, reporter: Option<R>) -> Self {
        Self {
            backend,
            poller,
            reporter,
        }
    }

    /// Processes the whole plan and returns the aggregate counts.
    ///
    /// Never fails: every backend problem is logged with its volume or
    /// backup id and folded into the summary.
    pub async fn execute(&self, plan: &[PlanEntry]) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut purge_queue: Vec<String> = Vec::new();

        for entry in plan {
            match self.back_up_volume(&entry.id).await {
                Ok(()) => {
                    summary.created += 1;
                    match self.select_expired(&entry.id, entry.depth).await {
                        Ok(expired) => purge_queue.extend(expired),
                        Err(err) => tracing::warn!(
                            volume_id = %entry.id,
                            error = %err,
                            "retention scan failed, keeping existing backups"
                        ),
                    }
                }
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(volume_id = %entry.id, error = %err, "backup failed");
                }
            }
        }

        for backup_id in &purge_queue {
            match self.delete_backup(backup_id).await {
                Ok(()) => summary.deleted += 1,
                Err(err) => {
                    summary.delete_failed += 1;
                    tracing::warn!(%backup_id, error = %err, "deletion failed");
                }
            }
        }

        self.report(&summary);
        tracing::info!(
            created = summary.created,
            failed = summary.failed,
            deleted = summary.deleted,
            delete_failed = summary.delete_failed,
            "job complete"
        );
        summary
    }

    /// Creates a backup for one volume and polls it until it settles.
    async fn back_up_volume(&self, volume_id: &str) -> Result<(), CreateFailure<B::Error>> {
        tracing::info!(%volume_id, "backing up volume");
        let label = self.derive_label(volume_id).await;
        let request =
            CreateBackupRequest::new(volume_id, label, backup_description(Local::now()));
        let backup = self
            .backend
            .create_backup(&request)
            .await
            .map_err(CreateFailure::Request)?;

        let backup_id = backup.id;
        let outcome = self
            .poller
            .wait(
                &backup_id,
                || self.fetch_status(&backup_id),
                BackupStatus::is_terminal,
            )
            .await?;

        match outcome {
            PollOutcome::Settled(BackupStatus::Available) => {
                tracing::info!(%volume_id, %backup_id, "volume backup complete");
                Ok(())
            }
            PollOutcome::Settled(status) => Err(CreateFailure::Settled { backup_id, status }),
            PollOutcome::Gone => Err(CreateFailure::Vanished { backup_id }),
        }
    }

    /// Fetches the live history and selects entries past the retention depth.
    async fn select_expired(
        &self,
        volume_id: &str,
        depth: usize,
    ) -> Result<Vec<String>, B::Error> {
        let history = self.backend.list_backups(volume_id).await?;
        let expired = select_for_deletion(&history, depth);
        tracing::debug!(%volume_id, expired = ?expired, "backups selected for deletion");
        Ok(expired)
    }

    /// Deletes one backup and polls until the backend stops returning it.
    async fn delete_backup(&self, backup_id: &str) -> Result<(), DeleteFailure<B::Error>> {
        tracing::info!(%backup_id, "removing backup");
        self.backend
            .delete_backup(backup_id)
            .await
            .map_err(DeleteFailure::Request)?;

        // Disappearance is the only terminal condition for a deletion; any
        // reported status just means the backend is still working.
        let outcome = self
            .poller
            .wait(backup_id, || self.fetch_status(backup_id), |_| false)
            .await?;

        match outcome {
            PollOutcome::Gone => {
                tracing::info!(%backup_id, "backup deleted");
                Ok(())
            }
            PollOutcome::Settled(status) => Err(DeleteFailure::Stuck {
                backup_id: backup_id.to_owned(),
                status,
            }),
        }
    }

    async fn fetch_status(&self, backup_id: &str) -> Result<Option<BackupStatus>, B::Error> {
        Ok(self
            .backend
            .get_backup(backup_id)
            .await?
            .map(|record| record.status))
    }

    /// Builds the human-readable backup label, degrading on lookup failures.
    ///
    /// Metadata lookups are best-effort: an unattached volume, an unresolvable
    /// server, or even a failed volume fetch only cost label detail, never the
    /// backup itself.
    async fn derive_label(&self, volume_id: &str) -> String {
        let volume = match self.backend.get_volume(volume_id).await {
            Ok(volume) => volume,
            Err(err) => {
                tracing::warn!(%volume_id, error = %err, "volume metadata lookup failed");
                return volume_id.to_owned();
            }
        };

        let server_name = match &volume.attachment {
            Some(attachment) => match self.backend.get_server(&attachment.server_id).await {
                Ok(server) => Some(server.name),
                Err(err) => {
                    tracing::warn!(
                        %volume_id,
                        server_id = %attachment.server_id,
                        error = %err,
                        "attached server lookup failed"
                    );
                    None
                }
            },
            None => {
                tracing::warn!(%volume_id, "volume not attached to any server");
                None
            }
        };

        backup_label(&volume, server_name.as_deref())
    }

    /// Hands the summary to the reporter, tolerating its absence.
    fn report(&self, summary: &RunSummary) {
        match &self.reporter {
            Some(reporter) => {
                if let Err(err) = reporter.send(REPORT_SUBJECT, &format_report(summary)) {
                    tracing::warn!(error = %err, "failed to send report");
                }
            }
            None => tracing::warn!("no report section in configuration, skipping"),
        }
    }
}
