//! End-to-end lifecycle runs against a scripted in-memory backend.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cindersweep::{
    Backend, BackendFuture, BackupRecord, BackupStatus, CreateBackupRequest, PlanEntry, Poller,
    ReportError, Reporter, RunOrchestrator, RunSummary, ServerInfo, SmtpReporter,
    VolumeAttachment, VolumeInfo,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FakeError(String);

/// One scripted answer to a `get_backup` poll.
#[derive(Clone, Debug)]
enum PollStep {
    Status(BackupStatus),
    Fail(&'static str),
}

#[derive(Default)]
struct FakeState {
    volumes: HashMap<String, VolumeInfo>,
    servers: HashMap<String, ServerInfo>,
    /// Volumes whose create call is rejected outright.
    create_failures: HashSet<String>,
    /// Backup id handed out per volume on a successful create.
    created_ids: HashMap<String, String>,
    /// Scripted `get_backup` answers per backup id; an exhausted (or absent)
    /// script means the resource no longer exists.
    poll_scripts: HashMap<String, VecDeque<PollStep>>,
    /// History returned by `list_backups`, newest first.
    histories: HashMap<String, Vec<BackupRecord>>,
    /// Backup ids whose delete request is rejected.
    delete_failures: HashSet<String>,
    create_requests: Vec<CreateBackupRequest>,
    list_calls: Vec<String>,
    delete_calls: Vec<String>,
}

/// Scripted backend double; clones share one state so tests can keep a
/// handle for assertions after the orchestrator takes ownership.
#[derive(Clone, Default)]
struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn record(id: &str, volume_id: &str, status: BackupStatus) -> BackupRecord {
    BackupRecord {
        id: id.to_owned(),
        volume_id: volume_id.to_owned(),
        status,
        created_at: None,
    }
}

impl Backend for FakeBackend {
    type Error = FakeError;

    fn get_volume<'a>(&'a self, volume_id: &'a str) -> BackendFuture<'a, VolumeInfo, FakeError> {
        Box::pin(async move {
            self.state()
                .volumes
                .get(volume_id)
                .cloned()
                .ok_or_else(|| FakeError(format!("volume {volume_id} unavailable")))
        })
    }

    fn get_server<'a>(&'a self, server_id: &'a str) -> BackendFuture<'a, ServerInfo, FakeError> {
        Box::pin(async move {
            self.state()
                .servers
                .get(server_id)
                .cloned()
                .ok_or_else(|| FakeError(format!("server {server_id} unavailable")))
        })
    }

    fn create_backup<'a>(
        &'a self,
        request: &'a CreateBackupRequest,
    ) -> BackendFuture<'a, BackupRecord, FakeError> {
        Box::pin(async move {
            let mut state = self.state();
            state.create_requests.push(request.clone());
            if state.create_failures.contains(&request.volume_id) {
                return Err(FakeError(String::from("quota exceeded")));
            }
            let id = state
                .created_ids
                .get(&request.volume_id)
                .cloned()
                .unwrap_or_else(|| format!("{}-backup", request.volume_id));
            Ok(record(&id, &request.volume_id, BackupStatus::Creating))
        })
    }

    fn get_backup<'a>(
        &'a self,
        backup_id: &'a str,
    ) -> BackendFuture<'a, Option<BackupRecord>, FakeError> {
        Box::pin(async move {
            let mut state = self.state();
            match state
                .poll_scripts
                .get_mut(backup_id)
                .and_then(VecDeque::pop_front)
            {
                Some(PollStep::Status(status)) => Ok(Some(record(backup_id, "vol", status))),
                Some(PollStep::Fail(message)) => Err(FakeError(message.to_owned())),
                None => Ok(None),
            }
        })
    }

    fn list_backups<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> BackendFuture<'a, Vec<BackupRecord>, FakeError> {
        Box::pin(async move {
            let mut state = self.state();
            state.list_calls.push(volume_id.to_owned());
            Ok(state.histories.get(volume_id).cloned().unwrap_or_default())
        })
    }

    fn delete_backup<'a>(&'a self, backup_id: &'a str) -> BackendFuture<'a, (), FakeError> {
        Box::pin(async move {
            let mut state = self.state();
            state.delete_calls.push(backup_id.to_owned());
            if state.delete_failures.contains(backup_id) {
                return Err(FakeError(String::from("backup is busy")));
            }
            Ok(())
        })
    }
}

/// Reporter double that records every message it is asked to send.
#[derive(Clone, Default)]
struct RecordingReporter {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl Reporter for RecordingReporter {
    fn send(&self, subject: &str, body: &str) -> Result<(), ReportError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((subject.to_owned(), body.to_owned()));
        Ok(())
    }
}

fn fast_poller() -> Poller {
    Poller::new(Duration::from_millis(1))
}

fn entry(id: &str, depth: usize) -> PlanEntry {
    PlanEntry {
        id: id.to_owned(),
        depth,
    }
}

fn attached_volume(id: &str) -> VolumeInfo {
    VolumeInfo {
        id: id.to_owned(),
        name: Some(String::from("data")),
        project: Some(String::from("acme")),
        attachment: Some(VolumeAttachment {
            server_id: String::from("srv-1"),
            device: Some(String::from("/dev/vdb")),
        }),
    }
}

fn web_server() -> ServerInfo {
    ServerInfo {
        id: String::from("srv-1"),
        name: String::from("web-1"),
    }
}

fn creating_then_available() -> VecDeque<PollStep> {
    VecDeque::from(vec![
        PollStep::Status(BackupStatus::Creating),
        PollStep::Status(BackupStatus::Creating),
        PollStep::Status(BackupStatus::Available),
    ])
}

/// Backend with one attached volume that backs up cleanly to `backup_id`.
fn backend_with_volume(volume_id: &str, backup_id: &str) -> FakeBackend {
    let backend = FakeBackend::default();
    {
        let mut state = backend.state();
        state
            .volumes
            .insert(volume_id.to_owned(), attached_volume(volume_id));
        state.servers.insert(String::from("srv-1"), web_server());
        state
            .created_ids
            .insert(volume_id.to_owned(), backup_id.to_owned());
        state
            .poll_scripts
            .insert(backup_id.to_owned(), creating_then_available());
    }
    backend
}

#[tokio::test]
async fn successful_run_prunes_past_the_retention_depth() {
    let backend = backend_with_volume("v1", "b5");
    {
        let mut state = backend.state();
        state.poll_scripts.insert(
            String::from("b2"),
            VecDeque::from(vec![PollStep::Status(BackupStatus::Deleting)]),
        );
        // b1 has no script: the first deletion poll already sees it gone.
        state.histories.insert(
            String::from("v1"),
            vec![
                record("b4", "v1", BackupStatus::Available),
                record("b3", "v1", BackupStatus::Available),
                record("b2", "v1", BackupStatus::Available),
                record("b1", "v1", BackupStatus::Available),
            ],
        );
    }

    let reporter = RecordingReporter::default();
    let orchestrator =
        RunOrchestrator::new(backend.clone(), fast_poller(), Some(reporter.clone()));

    let summary = orchestrator.execute(&[entry("v1", 2)]).await;

    assert_eq!(
        summary,
        RunSummary {
            created: 1,
            failed: 0,
            deleted: 2,
            delete_failed: 0,
        }
    );

    {
        let state = backend.state();
        assert_eq!(state.delete_calls, vec!["b2", "b1"]);
        let request = state.create_requests.first().expect("create was requested");
        assert!(request.force, "creation must bypass the availability guard");
        assert_eq!(request.name, "acme - web-1 - /dev/vdb - data");
        assert!(request.description.starts_with("created at "));
    }

    let sent = reporter.sent.lock().unwrap_or_else(PoisonError::into_inner);
    let (subject, body) = sent.first().expect("report was sent");
    assert_eq!(subject, "backup report");
    assert_eq!(body, "backups created: 1\nbackups deleted: 2\n");
}

#[tokio::test]
async fn rejected_creation_is_counted_and_skips_the_retention_scan() {
    let backend = backend_with_volume("v3", "b9");
    {
        let mut state = backend.state();
        state
            .volumes
            .insert(String::from("v2"), attached_volume("v2"));
        state.create_failures.insert(String::from("v2"));
        state.histories.insert(
            String::from("v3"),
            vec![record("b9", "v3", BackupStatus::Available)],
        );
    }

    let orchestrator =
        RunOrchestrator::new(backend.clone(), fast_poller(), None::<RecordingReporter>);

    let summary = orchestrator
        .execute(&[entry("v2", 1), entry("v3", 1)])
        .await;

    assert_eq!(
        summary,
        RunSummary {
            created: 1,
            failed: 1,
            deleted: 0,
            delete_failed: 0,
        }
    );
    assert_eq!(
        backend.state().list_calls,
        vec!["v3"],
        "no retention scan may run for the failed volume"
    );
}

#[tokio::test]
async fn backup_settling_in_error_counts_as_failed() {
    let backend = backend_with_volume("v1", "b1");
    backend.state().poll_scripts.insert(
        String::from("b1"),
        VecDeque::from(vec![
            PollStep::Status(BackupStatus::Creating),
            PollStep::Status(BackupStatus::Error),
        ]),
    );

    let orchestrator =
        RunOrchestrator::new(backend.clone(), fast_poller(), None::<RecordingReporter>);

    let summary = orchestrator.execute(&[entry("v1", 1)]).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.created, 0);
    assert!(
        backend.state().list_calls.is_empty(),
        "error backups must not trigger pruning"
    );
}

#[tokio::test]
async fn stuck_deletion_does_not_block_the_rest_of_the_queue() {
    let backend = backend_with_volume("v1", "b5");
    {
        let mut state = backend.state();
        state.histories.insert(
            String::from("v1"),
            vec![
                record("b5", "v1", BackupStatus::Available),
                record("b2", "v1", BackupStatus::Available),
                record("b1", "v1", BackupStatus::Available),
            ],
        );
        // b2's delete request is rejected outright; b1 deletes cleanly.
        state.delete_failures.insert(String::from("b2"));
    }

    let orchestrator =
        RunOrchestrator::new(backend, fast_poller(), None::<RecordingReporter>);

    let summary = orchestrator.execute(&[entry("v1", 1)]).await;

    assert_eq!(
        summary,
        RunSummary {
            created: 1,
            failed: 0,
            deleted: 1,
            delete_failed: 1,
        }
    );
}

#[tokio::test]
async fn deletion_poll_failure_is_isolated_per_backup() {
    let backend = backend_with_volume("v1", "b5");
    {
        let mut state = backend.state();
        state.histories.insert(
            String::from("v1"),
            vec![
                record("b5", "v1", BackupStatus::Available),
                record("b2", "v1", BackupStatus::Available),
                record("b1", "v1", BackupStatus::Available),
            ],
        );
        // b2's deletion poll errors mid-flight; b1 is gone on first fetch.
        state.poll_scripts.insert(
            String::from("b2"),
            VecDeque::from(vec![
                PollStep::Status(BackupStatus::Deleting),
                PollStep::Fail("internal error"),
            ]),
        );
    }

    let orchestrator =
        RunOrchestrator::new(backend, fast_poller(), None::<RecordingReporter>);

    let summary = orchestrator.execute(&[entry("v1", 1)]).await;

    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.delete_failed, 1);
}

#[tokio::test]
async fn metadata_lookup_failure_degrades_naming_but_not_the_backup() {
    // Volume v7 has no metadata at all; the label falls back to the id.
    let backend = FakeBackend::default();
    {
        let mut state = backend.state();
        state
            .created_ids
            .insert(String::from("v7"), String::from("b7"));
        state
            .poll_scripts
            .insert(String::from("b7"), creating_then_available());
        state.histories.insert(
            String::from("v7"),
            vec![record("b7", "v7", BackupStatus::Available)],
        );
    }

    let orchestrator =
        RunOrchestrator::new(backend.clone(), fast_poller(), None::<RecordingReporter>);

    let summary = orchestrator.execute(&[entry("v7", 1)]).await;

    assert_eq!(summary.created, 1);
    let state = backend.state();
    let request = state.create_requests.first().expect("create was requested");
    assert_eq!(request.name, "v7");
}

#[tokio::test]
async fn absent_report_configuration_still_completes_the_run() {
    let backend = backend_with_volume("v1", "b1");
    backend.state().histories.insert(
        String::from("v1"),
        vec![record("b1", "v1", BackupStatus::Available)],
    );

    let orchestrator = RunOrchestrator::new(backend, fast_poller(), None::<SmtpReporter>);

    let summary = orchestrator.execute(&[entry("v1", 1)]).await;
    assert_eq!(summary.created, 1);
    assert_eq!(summary.deleted, 0);
}
