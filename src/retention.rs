//! Retention selection over a volume's backup history.

use crate::backend::BackupRecord;

/// Selects backups eligible for deletion under a keep-the-newest policy.
///
/// `history` must be ordered by creation time descending (newest first), as
/// returned by [`crate::backend::Backend::list_backups`]. Entries at
/// zero-based position `>= depth` are returned in history order; the `depth`
/// most recent are retained. Pure over the fetched snapshot: nothing is
/// mutated and nothing is deleted here.
#[must_use]
pub fn select_for_deletion(history: &[BackupRecord], depth: usize) -> Vec<String> {
    history
        .iter()
        .skip(depth)
        .map(|backup| backup.id.clone())
        .collect()
}
