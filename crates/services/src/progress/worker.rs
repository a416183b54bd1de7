use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use tracker_core::Clock;
use tracker_core::model::{AuthEvent, AuthEventKind, ProgressMaps, QuestionId, Session, UserId};

use storage::local::LocalProgressStore;
use storage::repository::{ProgressRow, ProgressTable, StorageError};

use super::{PullPolicy, SyncPolicy};
use crate::auth::SessionProvider;

/// Remote work, tagged with the user it was queued for.
pub(crate) enum SyncCommand {
    Push(UserId),
    Retract(UserId, QuestionId),
    Pull(UserId),
    Flush(oneshot::Sender<()>),
}

/// State shared between the store handle, its worker and the auth listener.
pub(crate) struct Shared {
    pub(crate) state: watch::Sender<ProgressMaps>,
    pub(crate) local: LocalProgressStore,
    /// User of the `Push` sitting in the queue, so bursts of toggles coalesce.
    pub(crate) pending_push: Mutex<Option<UserId>>,
    /// Auth events the listener has fully reacted to.
    pub(crate) auth_seen: watch::Sender<u64>,
    pub(crate) clock: Clock,
}

impl Shared {
    pub(crate) fn snapshot(&self) -> ProgressMaps {
        self.state.borrow().clone()
    }

    pub(crate) async fn persist(&self) -> Result<(), StorageError> {
        let snapshot = self.snapshot();
        self.local.save(&snapshot).await
    }

    pub(crate) async fn reset(&self) -> Result<(), StorageError> {
        self.state.send_modify(ProgressMaps::clear);
        self.local.clear().await
    }

    /// Marks a push for `user` as queued. Returns false if one already is.
    pub(crate) fn claim_push(&self, user: UserId) -> bool {
        let mut pending = self
            .pending_push
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *pending == Some(user) {
            return false;
        }
        *pending = Some(user);
        true
    }

    fn release_push(&self, user: UserId) {
        let mut pending = self
            .pending_push
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *pending == Some(user) {
            *pending = None;
        }
    }
}

/// Applies remote operations one at a time, in the order they were queued.
///
/// A command only runs while the session still belongs to the user it was
/// queued for; anything queued before an account switch is dropped.
pub(crate) struct SyncWorker {
    pub(crate) shared: Arc<Shared>,
    pub(crate) remote: Arc<dyn ProgressTable>,
    pub(crate) sessions: Arc<dyn SessionProvider>,
    pub(crate) policy: SyncPolicy,
}

impl SyncWorker {
    pub(crate) async fn run(self, mut commands: mpsc::UnboundedReceiver<SyncCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                SyncCommand::Push(user) => self.push(user).await,
                SyncCommand::Retract(user, id) => self.retract(user, id).await,
                SyncCommand::Pull(user) => self.pull(user).await,
                SyncCommand::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("sync worker stopped");
    }

    async fn session_for(&self, user: UserId) -> Option<Session> {
        match self.sessions.current_session().await {
            Some(session) if session.user_id == user => Some(session),
            Some(session) => {
                debug!(queued_for = %user, current = %session.user_id, "session changed, dropping command");
                None
            }
            None => {
                debug!(queued_for = %user, "signed out, dropping command");
                None
            }
        }
    }

    async fn push(&self, user: UserId) {
        self.shared.release_push(user);
        let Some(session) = self.session_for(user).await else {
            return;
        };

        let now = self.shared.clock.now_iso();
        let rows: Vec<ProgressRow> = self
            .shared
            .snapshot()
            .entries()
            .map(|(id, at)| ProgressRow {
                user_id: session.user_id,
                question_id: id.clone(),
                completed: true,
                completed_at: at.map_or_else(|| now.clone(), str::to_string),
            })
            .collect();
        if rows.is_empty() {
            return;
        }

        match self.remote.upsert_rows(&session, &rows).await {
            Ok(()) => debug!(rows = rows.len(), "pushed progress"),
            Err(err) => error!(error = %err, rows = rows.len(), "failed to push progress"),
        }
    }

    async fn retract(&self, user: UserId, id: QuestionId) {
        let Some(session) = self.session_for(user).await else {
            return;
        };
        // Completed again since the retract was queued; the pending push wins.
        if self.shared.state.borrow().is_completed(&id) {
            return;
        }
        match self
            .remote
            .delete_rows(&session, std::slice::from_ref(&id))
            .await
        {
            Ok(()) => debug!(question = %id, "retracted remote completion"),
            Err(err) => error!(error = %err, question = %id, "failed to retract remote completion"),
        }
    }

    async fn pull(&self, user: UserId) {
        let Some(session) = self.session_for(user).await else {
            return;
        };
        let rows = match self.remote.completed_rows(&session).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "failed to pull progress");
                return;
            }
        };
        // The user may have signed out while the read was in flight.
        if self.session_for(user).await.is_none() {
            return;
        }

        let now = self.shared.clock.now_iso();
        let entries: Vec<(QuestionId, String)> = rows
            .into_iter()
            .filter(|row| row.completed)
            .map(|row| (row.question_id, row.completed_at.unwrap_or_else(|| now.clone())))
            .collect();
        let count = entries.len();

        match self.policy.pull {
            PullPolicy::Replace => self.shared.state.send_modify(move |maps| maps.replace_with(entries)),
            PullPolicy::Merge => self.shared.state.send_modify(move |maps| maps.merge_from(entries)),
        }
        if let Err(err) = self.shared.persist().await {
            error!(error = %err, "failed to persist pulled progress");
        }
        info!(rows = count, user = %user, "pulled remote progress");

        if self.policy.pull == PullPolicy::Merge {
            self.push(user).await;
        }
    }
}

/// Reacts to auth transitions until either side goes away.
///
/// Sign-out clears memory and the device store before anything else can
/// observe the old user's state; sign-in queues a pull for the new user.
pub(crate) async fn listen(
    shared: Arc<Shared>,
    mut events: broadcast::Receiver<AuthEvent>,
    commands: mpsc::UnboundedSender<SyncCommand>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "auth listener lagged behind");
                shared.auth_seen.send_modify(|seen| *seen += skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match (event.kind, event.session) {
            (AuthEventKind::SignedIn, Some(session)) => {
                if commands.send(SyncCommand::Pull(session.user_id)).is_err() {
                    break;
                }
            }
            (AuthEventKind::SignedOut, _) => match shared.reset().await {
                Ok(()) => info!("cleared local progress after sign-out"),
                Err(err) => error!(error = %err, "failed to clear local progress"),
            },
            _ => {}
        }
        shared.auth_seen.send_modify(|seen| *seen += 1);
    }
}
