use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use torus_core::{Difficulty, Move, Session, SessionSnapshot, TickOutcome};

pub type SharedSession = Arc<Mutex<Session>>;

/// Owned handle to the task ticking a session at a fixed period.
///
/// The task exits by itself after the tick that reports game over, or as soon
/// as the session is no longer running. Dropping the handle aborts it.
pub struct TickLoop {
    handle: Option<JoinHandle<()>>,
}

impl TickLoop {
    pub fn spawn(session: SharedSession, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let outcome = session.lock().await.tick();
                match outcome {
                    TickOutcome::Advanced => {}
                    TickOutcome::GameOver(payload) => {
                        tracing::debug!(score = payload.score, "tick loop finished");
                        break;
                    }
                    TickOutcome::Inactive => {
                        tracing::debug!("tick loop idle, exiting");
                        break;
                    }
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Aborts the task and waits until it can no longer touch the session.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Waits for the loop to end on its own.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    tracing::error!("tick loop panicked: {err}");
                }
            }
        }
    }
}

impl Drop for TickLoop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Couples a session's lifecycle with its tick loop: the loop runs exactly
/// while the session is running.
pub struct Driver {
    session: SharedSession,
    period: Duration,
    ticker: Option<TickLoop>,
}

impl Driver {
    pub fn new(session: Session, period: Duration) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            period,
            ticker: None,
        }
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    pub async fn start_new_game(&mut self, difficulty: Difficulty, seed: Option<u32>) {
        self.disarm().await;
        self.session.lock().await.start_new_game(difficulty, seed);
        self.arm();
    }

    pub async fn pause(&mut self) -> bool {
        self.disarm().await;
        self.session.lock().await.pause()
    }

    pub async fn resume(&mut self) -> bool {
        let resumed = self.session.lock().await.resume();
        if resumed {
            self.disarm().await;
            self.arm();
        }
        resumed
    }

    pub async fn reset(&mut self) {
        self.disarm().await;
        self.session.lock().await.reset();
    }

    pub async fn dispatch(&self, mv: Move) -> bool {
        self.session.lock().await.dispatch(mv)
    }

    /// Stops ticking and hands back the session state for persistence.
    pub async fn shutdown(mut self) -> SessionSnapshot {
        self.disarm().await;
        self.session.lock().await.export()
    }

    fn arm(&mut self) {
        self.ticker = Some(TickLoop::spawn(Arc::clone(&self.session), self.period));
    }

    async fn disarm(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop().await;
        }
    }
}
