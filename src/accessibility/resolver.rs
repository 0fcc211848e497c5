use std::sync::Arc;

use super::{AccessibilityApi, ProcessHandle};
use crate::log_trace;

const ENABLE_LOGS: bool = true;

/// Answers "who has keyboard focus right now". Each lookup can independently
/// come back empty, which is the usual state just after an application switch.
pub struct FocusResolver<A: AccessibilityApi> {
    api: Arc<A>,
}

impl<A: AccessibilityApi> Clone for FocusResolver<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: AccessibilityApi> FocusResolver<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn current_frontmost_process(&self) -> Option<ProcessHandle> {
        let process = self.api.frontmost_process();
        if process.is_none() {
            log_trace!("no frontmost application reported");
        }
        process
    }

    pub fn focused_element(&self, process: &ProcessHandle) -> Option<A::Element> {
        let element = self.api.focused_element(process);
        if element.is_none() {
            log_trace!("{} exposes no focused element", process);
        }
        element
    }

    pub fn containing_window(&self, element: &A::Element) -> Option<A::Element> {
        self.api.containing_window(element)
    }
}
