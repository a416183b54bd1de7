use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};
use tracker_core::Clock;
use tracker_core::model::{ProgressMaps, QuestionId, UserId};

use storage::local::LocalProgressStore;
use storage::repository::ProgressTable;

use super::worker::{Shared, SyncCommand, SyncWorker, listen};
use super::{SyncPolicy, UncompletePolicy};
use crate::auth::SessionProvider;
use crate::error::ProgressError;

/// Per-question completion state for the whole app.
///
/// Every mutation lands in memory and in the device store before the call
/// returns. Remote work is queued to a single background worker, so pushes
/// and pulls never interleave and their failures only reach the log.
/// Each remote command carries the user it was queued for and is dropped
/// if a different account is signed in by the time it runs.
#[derive(Clone)]
pub struct ProgressStore {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<SyncCommand>,
    sessions: Arc<dyn SessionProvider>,
    policy: SyncPolicy,
}

impl ProgressStore {
    /// Load persisted progress and start syncing on behalf of `sessions`.
    ///
    /// Must be called from within a Tokio runtime. If a session is already
    /// active, a pull is queued straight away.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the device store cannot be read.
    pub async fn open(
        local: LocalProgressStore,
        remote: Arc<dyn ProgressTable>,
        sessions: Arc<dyn SessionProvider>,
        clock: Clock,
        policy: SyncPolicy,
    ) -> Result<Self, ProgressError> {
        let stored = local.load().await?;
        let maps = ProgressMaps::from_parts(stored.completed, stored.timestamps, &clock.now_iso());
        debug!(completed = maps.len(), "loaded local progress");

        let (state, _) = watch::channel(maps);
        let shared = Arc::new(Shared {
            state,
            local,
            pending_push: Mutex::new(None),
            auth_seen: watch::channel(0).0,
            clock,
        });

        // Subscribe before reading the session so a sign-in in between is not lost.
        let events = sessions.subscribe();
        let signed_in = sessions.current_session().await.map(|s| s.user_id);

        let (commands, queue) = mpsc::unbounded_channel();
        let worker = SyncWorker {
            shared: Arc::clone(&shared),
            remote,
            sessions: Arc::clone(&sessions),
            policy,
        };
        tokio::spawn(worker.run(queue));
        tokio::spawn(listen(Arc::clone(&shared), events, commands.clone()));

        let store = Self {
            shared,
            commands,
            sessions,
            policy,
        };
        if let Some(user) = signed_in {
            store.send(SyncCommand::Pull(user));
        }
        Ok(store)
    }

    /// Mark a question done (`true`) or not done (`false`).
    ///
    /// Completing stamps the current time; un-completing drops both the flag
    /// and the timestamp. The remote mirror is updated in the background.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the device store rejects the write.
    /// The in-memory state has already changed by then.
    pub async fn toggle(&self, question_id: &QuestionId, completed: bool) -> Result<(), ProgressError> {
        let now = self.shared.clock.now_iso();
        self.shared.state.send_modify(|maps| {
            if completed {
                maps.mark_completed(question_id.clone(), now);
            } else {
                maps.unmark(question_id);
            }
        });
        self.shared.persist().await?;

        let Some(user) = self.current_user().await else {
            return Ok(());
        };
        if !completed && self.policy.uncomplete == UncompletePolicy::DeleteRemote {
            self.send(SyncCommand::Retract(user, question_id.clone()));
        }
        self.request_push(user);
        Ok(())
    }

    /// Replace (or merge, per policy) local state with the signed-in user's
    /// remote rows. Resolves once the pull has been applied or has failed.
    pub async fn pull(&self) {
        if let Some(user) = self.current_user().await {
            self.send(SyncCommand::Pull(user));
        }
        self.flush().await;
    }

    /// Upload every local completion now. Resolves once the push has run.
    pub async fn push(&self) {
        if let Some(user) = self.current_user().await {
            self.request_push(user);
        }
        self.flush().await;
    }

    /// Forget all progress in memory and on the device.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the device store cannot be cleared.
    pub async fn clear(&self) -> Result<(), ProgressError> {
        self.shared.reset().await?;
        Ok(())
    }

    /// Wait until every command queued so far has been processed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(SyncCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Number of sign-in/sign-out notifications the store has reacted to.
    ///
    /// Read it before an auth call and hand it to [`Self::settle_auth`].
    #[must_use]
    pub fn auth_events_seen(&self) -> u64 {
        *self.shared.auth_seen.borrow()
    }

    /// Wait until the store has reacted to an auth event past `seen`, then
    /// until the remote work that reaction queued has finished.
    pub async fn settle_auth(&self, seen: u64) {
        let mut counter = self.shared.auth_seen.subscribe();
        if counter.wait_for(|n| *n > seen).await.is_err() {
            return;
        }
        self.flush().await;
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressMaps {
        self.shared.snapshot()
    }

    #[must_use]
    pub fn is_completed(&self, question_id: &QuestionId) -> bool {
        self.shared.state.borrow().is_completed(question_id)
    }

    #[must_use]
    pub fn completed_at(&self, question_id: &QuestionId) -> Option<String> {
        self.shared
            .state
            .borrow()
            .completed_at(question_id)
            .map(str::to_string)
    }

    /// Receiver that observes every change to the maps.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressMaps> {
        self.shared.state.subscribe()
    }

    async fn current_user(&self) -> Option<UserId> {
        self.sessions.current_session().await.map(|s| s.user_id)
    }

    fn request_push(&self, user: UserId) {
        if self.shared.claim_push(user) {
            self.send(SyncCommand::Push(user));
        }
    }

    fn send(&self, command: SyncCommand) {
        if self.commands.send(command).is_err() {
            warn!("sync worker is gone, dropping command");
        }
    }
}
