use std::future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Collapses a burst of triggers into one firing after `window` of quiet.
/// Each trigger replaces the pending deadline, so at most one firing is ever
/// scheduled.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn trigger(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves once the pending deadline passes and clears it. Pends forever
    /// while nothing is scheduled. Safe to drop and re-create inside
    /// `tokio::select!`: the deadline only clears on completion.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => future::pending::<()>().await,
        }
    }
}
