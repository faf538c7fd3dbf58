//! Background study-session runner
//!
//! A single task owns the [`TimerMachine`]. Commands arrive over a channel and
//! ticks come from a one-second interval; both are handled in the same loop,
//! commands first, so a command is never applied halfway through a tick.
//! Observers get a [`TimerHandle`], which can send commands and watch the
//! published [`TimerSnapshot`] but never touches the machine directly.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, StudyError},
    models::Session,
    services::NotificationPresenter,
    state::{EndedSession, SubjectRef, TimerMachine, TimerSnapshot, TimerState},
    storage::SessionStore,
    utils::{format_elapsed, Clock, SystemClock},
};

/// Sessions shorter than this are not saved
pub const MIN_SESSION_SECS: u64 = 36;

const TICK: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 32;

/// Result of a FINISH command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FinishOutcome {
    /// The session was written to the store
    Saved { session: Session },
    /// Nothing was written; the live timer still reset
    Discarded { elapsed_seconds: u64, reason: String },
    /// The store rejected the write; the session is lost
    SaveFailed { elapsed_seconds: u64, error: String },
}

enum Request {
    Start {
        subject: Option<SubjectRef>,
        reply: oneshot::Sender<Result<TimerSnapshot>>,
    },
    Stop {
        reply: oneshot::Sender<Result<TimerSnapshot>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<u64>>,
    },
    Finish {
        reply: oneshot::Sender<Result<FinishOutcome>>,
    },
}

/// Owner of the live timer
pub struct SessionRunner {
    machine: TimerMachine,
    store: Arc<dyn SessionStore>,
    presenter: Arc<dyn NotificationPresenter>,
    clock: Arc<dyn Clock>,
    min_session_secs: u64,
    ticker: Option<Interval>,
    snapshot_tx: watch::Sender<TimerSnapshot>,
}

impl SessionRunner {
    pub fn new(store: Arc<dyn SessionStore>, presenter: Arc<dyn NotificationPresenter>) -> Self {
        let machine = TimerMachine::new();
        let (snapshot_tx, _) = watch::channel(machine.snapshot());
        Self {
            machine,
            store,
            presenter,
            clock: Arc::new(SystemClock),
            min_session_secs: MIN_SESSION_SECS,
            ticker: None,
            snapshot_tx,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_min_session_secs(mut self, min_session_secs: u64) -> Self {
        self.min_session_secs = min_session_secs;
        self
    }

    /// Spawn the runner onto the current tokio runtime
    ///
    /// The task lives until every [`TimerHandle`] has been dropped.
    pub fn spawn(self) -> TimerHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = TimerHandle {
            commands: commands_tx,
            snapshot: self.snapshot_tx.subscribe(),
        };
        tokio::spawn(self.run(commands_rx));
        handle
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Request>) {
        info!(
            "Session runner started (minimum session {}s)",
            self.min_session_secs
        );

        loop {
            tokio::select! {
                biased;

                request = commands.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },

                _ = next_tick(&mut self.ticker) => self.on_tick(),
            }
        }

        if self.machine.state() != TimerState::Idle {
            warn!(
                "Session runner stopping with an unfinished {} session of {}s; it will not be saved",
                self.machine.state(),
                self.machine.elapsed_seconds()
            );
        }
        info!("Session runner stopped");
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Start { subject, reply } => {
                let result = self.start(subject);
                let _ = reply.send(result);
            }
            Request::Stop { reply } => {
                let result = self.stop();
                let _ = reply.send(result);
            }
            Request::Cancel { reply } => {
                let result = self.cancel();
                let _ = reply.send(result);
            }
            Request::Finish { reply } => {
                let result = self.finish();
                let _ = reply.send(result);
            }
        }
    }

    fn start(&mut self, subject: Option<SubjectRef>) -> Result<TimerSnapshot> {
        let resuming = self.machine.state() == TimerState::Stopped;
        self.machine.start(subject).inspect_err(|e| debug!("{}", e))?;

        // The first tick lands one full second after (re)start
        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        self.ticker = Some(ticker);

        let subject = self.machine.subject().map(|s| s.name.as_str()).unwrap_or("-");
        if resuming {
            info!(
                "Study session resumed at {}s (subject: {})",
                self.machine.elapsed_seconds(),
                subject
            );
        } else {
            info!("Study session started (subject: {})", subject);
        }
        self.presenter
            .publish(&format_elapsed(self.machine.elapsed_seconds()));
        Ok(self.publish())
    }

    fn stop(&mut self) -> Result<TimerSnapshot> {
        let was_started = self.machine.state() == TimerState::Started;
        self.machine.stop().inspect_err(|e| debug!("{}", e))?;
        self.ticker = None;
        if was_started {
            info!(
                "Study session paused at {}s",
                self.machine.elapsed_seconds()
            );
        }
        Ok(self.publish())
    }

    fn cancel(&mut self) -> Result<u64> {
        let ended = self.machine.cancel().inspect_err(|e| debug!("{}", e))?;
        self.ticker = None;
        info!(
            "Study session cancelled, discarding {}s",
            ended.elapsed_seconds
        );
        self.presenter.dismiss();
        self.publish();
        Ok(ended.elapsed_seconds)
    }

    fn finish(&mut self) -> Result<FinishOutcome> {
        let ended = self.machine.finish().inspect_err(|e| debug!("{}", e))?;
        self.ticker = None;

        let outcome = self.persist(ended);
        match &outcome {
            FinishOutcome::Saved { session } => info!(
                "Study session saved: {}s for {}",
                session.duration_secs, session.related_subject_name
            ),
            FinishOutcome::Discarded {
                elapsed_seconds,
                reason,
            } => info!(
                "Study session of {}s discarded: {}",
                elapsed_seconds, reason
            ),
            FinishOutcome::SaveFailed { .. } => {}
        }

        self.presenter.dismiss();
        self.publish();
        Ok(outcome)
    }

    /// Apply the minimum-duration policy and hand the session to the store
    fn persist(&self, ended: EndedSession) -> FinishOutcome {
        let elapsed_seconds = ended.elapsed_seconds;
        if elapsed_seconds < self.min_session_secs {
            return FinishOutcome::Discarded {
                elapsed_seconds,
                reason: format!(
                    "sessions shorter than {}s are not saved",
                    self.min_session_secs
                ),
            };
        }
        let Some(subject) = ended.subject else {
            warn!("Finished a {}s session with no subject", elapsed_seconds);
            return FinishOutcome::Discarded {
                elapsed_seconds,
                reason: "no subject is associated with the session".to_string(),
            };
        };

        // The subject may have been deleted while the session was running
        match self.store.subject_exists(subject.id) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Subject {} was deleted during the session; discarding {}s",
                    subject.id, elapsed_seconds
                );
                return FinishOutcome::Discarded {
                    elapsed_seconds,
                    reason: format!("subject '{}' no longer exists", subject.name),
                };
            }
            Err(e) => {
                error!("Failed to look up subject {}: {}", subject.id, e);
                return FinishOutcome::SaveFailed {
                    elapsed_seconds,
                    error: e.to_string(),
                };
            }
        }

        // Runs synchronously on the runner task. The ticker is already stopped
        // and the FINISH reply waits for the store.
        let mut session = Session {
            id: None,
            subject_id: subject.id,
            related_subject_name: subject.name,
            duration_secs: elapsed_seconds,
            timestamp_millis: self.clock.now().timestamp_millis(),
        };
        match self.store.upsert_session(&session) {
            Ok(id) => {
                session.id = Some(id);
                FinishOutcome::Saved { session }
            }
            Err(e) => {
                error!("Failed to save {}s study session: {}", elapsed_seconds, e);
                FinishOutcome::SaveFailed {
                    elapsed_seconds,
                    error: e.to_string(),
                }
            }
        }
    }

    fn on_tick(&mut self) {
        if !self.machine.tick() {
            self.ticker = None;
            return;
        }
        let elapsed = self.machine.elapsed_seconds();
        debug!("Study session tick: {}s", elapsed);
        self.presenter.publish(&format_elapsed(elapsed));
        self.publish();
    }

    fn publish(&self) -> TimerSnapshot {
        let snapshot = self.machine.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Cloneable handle to the session runner
#[derive(Clone)]
pub struct TimerHandle {
    commands: mpsc::Sender<Request>,
    snapshot: watch::Receiver<TimerSnapshot>,
}

impl TimerHandle {
    /// START: begin or resume. `subject` replaces the association when given.
    pub async fn start(&self, subject: Option<SubjectRef>) -> Result<TimerSnapshot> {
        self.request(|reply| Request::Start { subject, reply }).await
    }

    /// STOP: pause the running session
    pub async fn stop(&self) -> Result<TimerSnapshot> {
        self.request(|reply| Request::Stop { reply }).await
    }

    /// CANCEL: discard the session. Returns the discarded seconds.
    pub async fn cancel(&self) -> Result<u64> {
        self.request(|reply| Request::Cancel { reply }).await
    }

    /// FINISH: end the session and save it if long enough
    pub async fn finish(&self) -> Result<FinishOutcome> {
        self.request(|reply| Request::Finish { reply }).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Read-only stream of snapshots
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshot.clone()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| StudyError::RunnerUnavailable)?;
        reply_rx.await.map_err(|_| StudyError::RunnerUnavailable)?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, TimeZone, Utc};
    use tokio::time::sleep;

    use super::*;
    use crate::{services::RecordingPresenter, state::TimerCommand};

    #[derive(Default)]
    struct MemoryStore {
        sessions: Mutex<Vec<Session>>,
        deleted_subjects: Mutex<Vec<i64>>,
        fail: bool,
    }

    impl MemoryStore {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sessions(&self) -> Vec<Session> {
            self.sessions.lock().unwrap().clone()
        }

        fn delete_subject(&self, subject_id: i64) {
            self.deleted_subjects.lock().unwrap().push(subject_id);
        }
    }

    impl SessionStore for MemoryStore {
        fn upsert_session(&self, session: &Session) -> Result<i64> {
            if self.fail {
                return Err(StudyError::LockPoisoned);
            }
            let mut sessions = self.sessions.lock().unwrap();
            sessions.push(session.clone());
            Ok(sessions.len() as i64)
        }

        fn delete_session(&self, _id: i64) -> Result<()> {
            Ok(())
        }

        fn subject_exists(&self, subject_id: i64) -> Result<bool> {
            Ok(!self.deleted_subjects.lock().unwrap().contains(&subject_id))
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct Fixture {
        handle: TimerHandle,
        store: Arc<MemoryStore>,
        presenter: Arc<RecordingPresenter>,
    }

    fn spawn_with(store: MemoryStore, min_session_secs: u64) -> Fixture {
        let store = Arc::new(store);
        let presenter = Arc::new(RecordingPresenter::new());
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        let handle = SessionRunner::new(store.clone(), presenter.clone())
            .with_clock(Arc::new(clock))
            .with_min_session_secs(min_session_secs)
            .spawn();
        Fixture {
            handle,
            store,
            presenter,
        }
    }

    fn spawn() -> Fixture {
        spawn_with(MemoryStore::default(), MIN_SESSION_SECS)
    }

    fn maths() -> Option<SubjectRef> {
        Some(SubjectRef {
            id: 3,
            name: "Maths".to_string(),
        })
    }

    /// Sleep through `n` ticks, stopping half a second short of the next one
    async fn wait_ticks(n: u64) {
        sleep(Duration::from_millis(n * 1000 + 500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn forty_ticks_then_finish_saves_once() {
        let fx = spawn();
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(40).await;

        let outcome = fx.handle.finish().await.unwrap();

        let sessions = fx.store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_secs, 40);
        assert_eq!(sessions[0].subject_id, 3);
        assert_eq!(sessions[0].related_subject_name, "Maths");
        assert_eq!(
            sessions[0].timestamp_millis,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
                .unwrap()
                .timestamp_millis()
        );
        assert!(matches!(outcome, FinishOutcome::Saved { session } if session.id == Some(1)));

        let snapshot = fx.handle.snapshot();
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(snapshot.elapsed_seconds, 0);
        assert!(snapshot.subject.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ten_ticks_then_cancel_writes_nothing() {
        let fx = spawn();
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(10).await;

        assert_eq!(fx.handle.cancel().await.unwrap(), 10);

        assert!(fx.store.sessions().is_empty());
        let snapshot = fx.handle.snapshot();
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(snapshot.elapsed_seconds, 0);
        assert!(snapshot.subject.is_none());
        assert_eq!(fx.presenter.dismiss_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_from_stopped_writes_nothing() {
        let fx = spawn();
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(50).await;
        fx.handle.stop().await.unwrap();

        assert_eq!(fx.handle.cancel().await.unwrap(), 50);
        assert!(fx.store.sessions().is_empty());
        assert_eq!(fx.handle.snapshot().state, TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn only_started_time_counts() {
        let fx = spawn_with(MemoryStore::default(), 5);
        fx.handle.start(maths()).await.unwrap();
        fx.handle.stop().await.unwrap();
        sleep(Duration::from_secs(30)).await;
        fx.handle.start(None).await.unwrap();
        wait_ticks(5).await;

        let outcome = fx.handle.finish().await.unwrap();

        assert!(matches!(outcome, FinishOutcome::Saved { .. }));
        let sessions = fx.store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_secs, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn short_session_is_discarded() {
        let fx = spawn();
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(35).await;

        let outcome = fx.handle.finish().await.unwrap();

        assert!(matches!(
            outcome,
            FinishOutcome::Discarded {
                elapsed_seconds: 35,
                ..
            }
        ));
        assert!(fx.store.sessions().is_empty());
        assert_eq!(fx.handle.snapshot().state, TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_is_inclusive() {
        let fx = spawn();
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(36).await;
        fx.handle.stop().await.unwrap();

        fx.handle.finish().await.unwrap();
        assert_eq!(fx.store.sessions()[0].duration_secs, 36);
    }

    #[tokio::test(start_paused = true)]
    async fn session_without_subject_is_discarded() {
        let fx = spawn();
        fx.handle.start(None).await.unwrap();
        wait_ticks(60).await;

        let outcome = fx.handle.finish().await.unwrap();
        assert!(matches!(outcome, FinishOutcome::Discarded { .. }));
        assert!(fx.store.sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn session_for_deleted_subject_is_discarded() {
        let fx = spawn();
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(40).await;
        fx.store.delete_subject(3);

        let outcome = fx.handle.finish().await.unwrap();

        assert!(matches!(
            outcome,
            FinishOutcome::Discarded {
                elapsed_seconds: 40,
                ..
            }
        ));
        assert!(fx.store.sessions().is_empty());
        assert_eq!(fx.handle.snapshot().state, TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_still_resets() {
        let fx = spawn_with(MemoryStore::failing(), MIN_SESSION_SECS);
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(40).await;

        let outcome = fx.handle.finish().await.unwrap();

        assert!(matches!(
            outcome,
            FinishOutcome::SaveFailed {
                elapsed_seconds: 40,
                ..
            }
        ));
        let snapshot = fx.handle.snapshot();
        assert_eq!(snapshot.state, TimerState::Idle);
        assert_eq!(snapshot.elapsed_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_and_second_stop_is_no_op() {
        let fx = spawn();
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(3).await;

        let first = fx.handle.stop().await.unwrap();
        sleep(Duration::from_secs(20)).await;
        let second = fx.handle.stop().await.unwrap();

        assert_eq!(first.state, TimerState::Stopped);
        assert_eq!(first.elapsed_seconds, 3);
        assert_eq!(second, first);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_commands_are_rejected() {
        let fx = spawn();
        for result in [
            fx.handle.stop().await.map(|_| ()),
            fx.handle.finish().await.map(|_| ()),
            fx.handle.cancel().await.map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(StudyError::InvalidTransition {
                    state: TimerState::Idle,
                    ..
                })
            ));
        }

        fx.handle.start(maths()).await.unwrap();
        assert!(matches!(
            fx.handle.start(None).await,
            Err(StudyError::InvalidTransition {
                command: TimerCommand::Start,
                state: TimerState::Started
            })
        ));
        assert_eq!(fx.handle.snapshot().state, TimerState::Started);
        assert!(fx.store.sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_publish_elapsed_text_and_snapshots() {
        let fx = spawn();
        let mut observer = fx.handle.subscribe();
        fx.handle.start(maths()).await.unwrap();
        wait_ticks(3).await;

        assert_eq!(
            fx.presenter.published(),
            vec!["00:00:00", "00:00:01", "00:00:02", "00:00:03"]
        );
        let snapshot = observer.borrow_and_update().clone();
        assert_eq!(snapshot.elapsed_seconds, 3);
        assert_eq!(snapshot.seconds, "03");
        assert_eq!(snapshot.subject, maths());
    }

    #[tokio::test(start_paused = true)]
    async fn session_survives_observers_coming_and_going() {
        let fx = spawn();
        fx.handle.start(maths()).await.unwrap();

        {
            let screen = fx.handle.clone();
            let observer = screen.subscribe();
            wait_ticks(2).await;
            assert_eq!(observer.borrow().elapsed_seconds, 2);
        }

        sleep(Duration::from_secs(2)).await;
        let snapshot = fx.handle.snapshot();
        assert_eq!(snapshot.elapsed_seconds, 4);
        assert_eq!(snapshot.subject, maths());
    }

    #[tokio::test(start_paused = true)]
    async fn handle_reports_stopped_runner() {
        let (commands, rx) = mpsc::channel(1);
        drop(rx);
        let (_, snapshot) = watch::channel(TimerSnapshot::default());
        let handle = TimerHandle { commands, snapshot };

        assert!(matches!(
            handle.start(None).await,
            Err(StudyError::RunnerUnavailable)
        ));
    }
}
