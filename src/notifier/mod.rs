//! Native change notifications for the current focus target.
//!
//! One subscription at a time: moving to another target tears the old one
//! down before the new one is installed, so events from a previous process
//! can only arrive from already-queued deliveries, and [`ChangeNotifier::accepts`]
//! filters those out.

pub mod debounce;

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::accessibility::{AccessibilityApi, AxEvent, ObserverHandle, ProcessHandle};
use crate::{log_debug, log_info, log_warn};

const ENABLE_LOGS: bool = true;

pub use debounce::Debouncer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierState {
    Unsubscribed,
    Subscribed { pid: i32 },
    Error { pid: i32, reason: String },
}

struct ActiveSubscription<E> {
    process: ProcessHandle,
    element: Option<E>,
    window: Option<E>,
    _handle: ObserverHandle,
}

pub struct ChangeNotifier<A: AccessibilityApi> {
    api: Arc<A>,
    events: UnboundedSender<AxEvent>,
    active: Option<ActiveSubscription<A::Element>>,
    state: NotifierState,
}

impl<A: AccessibilityApi> ChangeNotifier<A> {
    pub fn new(api: Arc<A>, events: UnboundedSender<AxEvent>) -> Self {
        Self {
            api,
            events,
            active: None,
            state: NotifierState::Unsubscribed,
        }
    }

    pub fn state(&self) -> &NotifierState {
        &self.state
    }

    /// Follows the given target. A no-op when already subscribed to exactly
    /// this target. After a failure the same process is not retried; the next
    /// application switch retries.
    pub fn observe(
        &mut self,
        process: &ProcessHandle,
        element: Option<&A::Element>,
        window: Option<&A::Element>,
    ) -> &NotifierState {
        if let Some(active) = &self.active {
            if active.process == *process
                && active.element.as_ref() == element
                && active.window.as_ref() == window
            {
                return &self.state;
            }
        }

        if let NotifierState::Error { pid, .. } = &self.state {
            if *pid == process.pid {
                return &self.state;
            }
        }

        self.teardown();

        match self
            .api
            .observe(process, element, window, self.events.clone())
        {
            Ok(handle) => {
                log_info!("subscribed to change notifications of {}", process);
                self.active = Some(ActiveSubscription {
                    process: process.clone(),
                    element: element.cloned(),
                    window: window.cloned(),
                    _handle: handle,
                });
                self.state = NotifierState::Subscribed { pid: process.pid };
            }
            Err(err) => {
                log_warn!(
                    "could not subscribe to notifications of {}: {}; will retry on next app switch",
                    process,
                    err
                );
                self.state = NotifierState::Error {
                    pid: process.pid,
                    reason: err.to_string(),
                };
            }
        }

        &self.state
    }

    pub fn unobserve(&mut self) {
        self.teardown();
        self.state = NotifierState::Unsubscribed;
    }

    /// Only events from the currently subscribed process count.
    pub fn accepts(&self, event: &AxEvent) -> bool {
        matches!(self.state, NotifierState::Subscribed { pid } if pid == event.pid)
    }

    /// True when notifications are unavailable and the caller should fall
    /// back to polling.
    pub fn needs_polling(&self) -> bool {
        matches!(self.state, NotifierState::Error { .. })
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            log_debug!("tearing down notifications of {}", active.process);
            drop(active);
        }
    }
}

impl<A: AccessibilityApi> Drop for ChangeNotifier<A> {
    fn drop(&mut self) {
        self.teardown();
    }
}
