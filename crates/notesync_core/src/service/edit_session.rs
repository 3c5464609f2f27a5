//! Debounced edit commits for one record.
//!
//! # Responsibility
//! - Collapse bursts of edits into one committed update per quiet period.
//!
//! # Invariants
//! - At most one commit is pending per session.
//! - A new edit cancels a pending commit that has not started yet; a commit
//!   that already started runs to completion.
//! - Dropping the session cancels any commit that has not started.

use crate::model::record::{Record, RecordId};
use crate::service::record_service::{RecordService, RecordServiceError};
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type CommitResult = Option<Result<Record, RecordServiceError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    title: String,
    body: String,
}

struct PendingCommit {
    cancel: oneshot::Sender<()>,
    draft: Draft,
    task: JoinHandle<CommitResult>,
}

/// Edit session bound to one record.
pub struct EditSession {
    service: Arc<RecordService>,
    record_id: RecordId,
    delay: Duration,
    pending: Option<PendingCommit>,
}

impl EditSession {
    pub fn new(service: Arc<RecordService>, record_id: RecordId, delay: Duration) -> Self {
        Self {
            service,
            record_id,
            delay,
            pending: None,
        }
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    /// Whether a commit is scheduled and has not finished yet.
    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.task.is_finished())
    }

    /// Schedules a commit of `title`/`body` after the debounce delay,
    /// replacing any commit that has not started yet.
    pub fn edit(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.cancel();

        let draft = Draft {
            title: title.into(),
            body: body.into(),
        };
        let (cancel, cancelled) = oneshot::channel::<()>();
        let service = Arc::clone(&self.service);
        let record_id = self.record_id;
        let delay = self.delay;
        let committed = draft.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled => {
                    debug!("event=edit_commit module=service status=skipped reason=cancelled record_id={record_id}");
                    None
                }
                _ = tokio::time::sleep(delay) => {
                    Some(
                        service
                            .update_record(record_id, committed.title, committed.body)
                            .await,
                    )
                }
            }
        });

        self.pending = Some(PendingCommit {
            cancel,
            draft,
            task,
        });
    }

    /// Commits the pending edit now instead of waiting for the delay.
    ///
    /// Returns `None` when nothing was pending.
    pub async fn flush(&mut self) -> CommitResult {
        let pending = self.pending.take()?;
        if pending.cancel.send(()).is_ok() {
            let draft = pending.draft;
            return Some(
                self.service
                    .update_record(self.record_id, draft.title, draft.body)
                    .await,
            );
        }

        match pending.task.await {
            Ok(result) => result,
            Err(_) => Some(Err(RecordServiceError::CommitAborted)),
        }
    }

    /// Cancels a commit that has not started yet.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.cancel.send(());
        }
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.cancel();
    }
}
