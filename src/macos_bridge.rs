//! macOS accessibility backend over ApplicationServices.
//!
//! Elements are retained `AXUIElementRef`s. Notification observers run on a
//! dedicated thread per observed process, each spinning its own run loop, and
//! forward events into the tracker's channel.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::ops::Range;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use core_foundation::array::{CFArrayGetCount, CFArrayGetTypeID, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation::base::{CFEqual, CFGetTypeID, CFRelease, CFRetain, CFTypeID, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::runloop::{
    kCFRunLoopDefaultMode, CFRunLoopAddSource, CFRunLoopGetCurrent, CFRunLoopRef,
    CFRunLoopRemoveSource, CFRunLoopRunInMode, CFRunLoopSourceRef, CFRunLoopStop,
};
use core_foundation::string::{CFString, CFStringGetTypeID, CFStringRef};
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::mpsc::UnboundedSender;

use crate::accessibility::{
    AccessibilityApi, Attribute, AttributeValue, AxEvent, AxEventKind, ObserverHandle,
    ProcessHandle, SubscribeError,
};
use crate::geometry::{Point, Rect, Size};

type AXUIElementRef = *const c_void;
type AXObserverRef = *mut c_void;
type AXValueRef = *const c_void;
type AXError = i32;

type AXObserverCallback = unsafe extern "C" fn(
    observer: AXObserverRef,
    element: AXUIElementRef,
    notification: CFStringRef,
    refcon: *mut c_void,
);

const K_AX_ERROR_SUCCESS: AXError = 0;
const K_AX_ERROR_INVALID_UI_ELEMENT: AXError = -25202;
const K_AX_ERROR_CANNOT_COMPLETE: AXError = -25204;
const K_AX_ERROR_NOTIFICATION_UNSUPPORTED: AXError = -25207;
const K_AX_ERROR_NOTIFICATION_ALREADY_REGISTERED: AXError = -25209;
const K_AX_ERROR_API_DISABLED: AXError = -25211;

const K_AX_VALUE_CGPOINT_TYPE: u32 = 1;
const K_AX_VALUE_CGSIZE_TYPE: u32 = 2;
const K_AX_VALUE_CGRECT_TYPE: u32 = 3;
const K_AX_VALUE_CFRANGE_TYPE: u32 = 4;

/// Run loop slice between checks of the command queue.
const OBSERVER_SLICE_SECS: f64 = 0.25;
/// Longest the tracker waits for an observer thread to confirm a subscription.
const OBSERVER_SETUP_TIMEOUT: Duration = Duration::from_secs(1);

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

#[repr(C)]
#[derive(Clone, Copy)]
struct CFRange {
    location: isize,
    length: isize,
}

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrustedWithOptions(options: CFTypeRef) -> bool;
    fn AXUIElementCreateSystemWide() -> AXUIElementRef;
    fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    fn AXUIElementGetPid(element: AXUIElementRef, pid: *mut i32) -> AXError;
    fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> AXError;
    fn AXUIElementCopyParameterizedAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        parameter: CFTypeRef,
        result: *mut CFTypeRef,
    ) -> AXError;
    fn AXUIElementGetTypeID() -> CFTypeID;
    fn AXValueCreate(the_type: u32, value_ptr: *const c_void) -> AXValueRef;
    fn AXValueGetValue(value: AXValueRef, the_type: u32, value_ptr: *mut c_void) -> bool;
    fn AXObserverCreate(
        application: i32,
        callback: AXObserverCallback,
        out_observer: *mut AXObserverRef,
    ) -> AXError;
    fn AXObserverAddNotification(
        observer: AXObserverRef,
        element: AXUIElementRef,
        notification: CFStringRef,
        refcon: *mut c_void,
    ) -> AXError;
    fn AXObserverRemoveNotification(
        observer: AXObserverRef,
        element: AXUIElementRef,
        notification: CFStringRef,
    ) -> AXError;
    fn AXObserverGetRunLoopSource(observer: AXObserverRef) -> CFRunLoopSourceRef;
}

/// A retained accessibility element of some process.
pub struct AxElement(AXUIElementRef);

// AXUIElementRef is an immutable CF object; the AX API may be called from any thread.
unsafe impl Send for AxElement {}
unsafe impl Sync for AxElement {}

impl AxElement {
    /// Takes ownership of a +1 reference.
    unsafe fn from_create_rule(raw: CFTypeRef) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        if CFGetTypeID(raw) != AXUIElementGetTypeID() {
            CFRelease(raw);
            return None;
        }
        Some(Self(raw))
    }

    /// Retains a borrowed reference.
    unsafe fn from_get_rule(raw: CFTypeRef) -> Option<Self> {
        if raw.is_null() || CFGetTypeID(raw) != AXUIElementGetTypeID() {
            return None;
        }
        CFRetain(raw);
        Some(Self(raw))
    }

    fn as_ptr(&self) -> AXUIElementRef {
        self.0
    }

    fn copy_attribute(&self, name: &str) -> Option<CFTypeRef> {
        let attribute = CFString::new(name);
        let mut value: CFTypeRef = ptr::null();
        let err = unsafe {
            AXUIElementCopyAttributeValue(self.0, attribute.as_concrete_TypeRef(), &mut value)
        };

        if err != K_AX_ERROR_SUCCESS || value.is_null() {
            return None;
        }
        Some(value)
    }

    fn element_attribute(&self, name: &str) -> Option<AxElement> {
        let value = self.copy_attribute(name)?;
        unsafe { AxElement::from_create_rule(value) }
    }
}

impl Clone for AxElement {
    fn clone(&self) -> Self {
        unsafe { CFRetain(self.0) };
        Self(self.0)
    }
}

impl Drop for AxElement {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0) };
    }
}

impl PartialEq for AxElement {
    fn eq(&self, other: &Self) -> bool {
        unsafe { CFEqual(self.0, other.0) != 0 }
    }
}

impl fmt::Debug for AxElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AxElement({:p})", self.0)
    }
}

pub struct MacAccessibility {
    system: Mutex<System>,
    names: Mutex<HashMap<i32, String>>,
    observers: Arc<Mutex<HashMap<i32, ObserverThread>>>,
    next_subscription: AtomicU64,
}

impl Default for MacAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

impl MacAccessibility {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            names: Mutex::new(HashMap::new()),
            observers: Arc::new(Mutex::new(HashMap::new())),
            next_subscription: AtomicU64::new(1),
        }
    }

    fn process_name(&self, pid: i32) -> Option<String> {
        if let Some(name) = lock(&self.names).get(&pid) {
            return Some(name.clone());
        }

        let sys_pid = Pid::from_u32(u32::try_from(pid).ok()?);
        let name = {
            let mut system = lock(&self.system);
            system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]));
            system
                .process(sys_pid)
                .map(|process| process.name().to_string_lossy().into_owned())?
        };

        lock(&self.names).insert(pid, name.clone());
        Some(name)
    }
}

impl Drop for MacAccessibility {
    fn drop(&mut self) {
        for (_, thread) in lock(&self.observers).drain() {
            thread.send(ObserverCommand::Shutdown);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl AccessibilityApi for MacAccessibility {
    type Element = AxElement;

    fn is_trusted(&self, prompt: bool) -> bool {
        let key = CFString::from_static_string("AXTrustedCheckOptionPrompt");
        let value = if prompt {
            CFBoolean::true_value()
        } else {
            CFBoolean::false_value()
        };
        let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);
        unsafe { AXIsProcessTrustedWithOptions(options.as_CFTypeRef()) }
    }

    fn frontmost_process(&self) -> Option<ProcessHandle> {
        let system_wide = unsafe { AxElement::from_create_rule(AXUIElementCreateSystemWide())? };
        let app = system_wide.element_attribute("AXFocusedApplication")?;

        let mut pid: i32 = 0;
        let err = unsafe { AXUIElementGetPid(app.as_ptr(), &mut pid) };
        if err != K_AX_ERROR_SUCCESS {
            return None;
        }

        Some(match self.process_name(pid) {
            Some(name) => ProcessHandle::with_name(pid, name),
            None => ProcessHandle::new(pid),
        })
    }

    fn focused_element(&self, process: &ProcessHandle) -> Option<AxElement> {
        let app = unsafe { AxElement::from_create_rule(AXUIElementCreateApplication(process.pid))? };
        app.element_attribute("AXFocusedUIElement")
    }

    fn containing_window(&self, element: &AxElement) -> Option<AxElement> {
        if let Some(AttributeValue::Text(role)) = self.attribute(element, Attribute::Role) {
            if role == "AXWindow" {
                return Some(element.clone());
            }
        }
        element.element_attribute("AXWindow")
    }

    fn attribute(&self, element: &AxElement, attribute: Attribute) -> Option<AttributeValue<AxElement>> {
        let value = element.copy_attribute(attribute.platform_name())?;

        unsafe {
            match attribute {
                Attribute::Role | Attribute::Value => {
                    let text = take_string(value)?;
                    Some(AttributeValue::Text(text))
                }
                Attribute::Position => {
                    let mut point = CGPoint::new(0.0, 0.0);
                    let ok = take_ax_value(value, K_AX_VALUE_CGPOINT_TYPE, &mut point);
                    ok.then(|| AttributeValue::Point(Point::new(point.x, point.y)))
                }
                Attribute::Size => {
                    let mut size = CGSize::new(0.0, 0.0);
                    let ok = take_ax_value(value, K_AX_VALUE_CGSIZE_TYPE, &mut size);
                    ok.then(|| AttributeValue::Size(Size::new(size.width, size.height)))
                }
                Attribute::Children => take_elements(value).map(AttributeValue::Elements),
            }
        }
    }

    fn bounds_for_range(&self, element: &AxElement, range: Range<usize>) -> Option<Rect> {
        let location = isize::try_from(range.start).ok()?;
        let length = isize::try_from(range.end.checked_sub(range.start)?).ok()?;
        let cf_range = CFRange { location, length };

        unsafe {
            let parameter = AXValueCreate(
                K_AX_VALUE_CFRANGE_TYPE,
                &cf_range as *const CFRange as *const c_void,
            );
            if parameter.is_null() {
                return None;
            }

            let attribute = CFString::from_static_string("AXBoundsForRange");
            let mut result: CFTypeRef = ptr::null();
            let err = AXUIElementCopyParameterizedAttributeValue(
                element.as_ptr(),
                attribute.as_concrete_TypeRef(),
                parameter,
                &mut result,
            );
            CFRelease(parameter);

            if err != K_AX_ERROR_SUCCESS || result.is_null() {
                log_debug!("AXBoundsForRange failed with {}", err);
                return None;
            }

            let mut rect = CGRect::new(&CGPoint::new(0.0, 0.0), &CGSize::new(0.0, 0.0));
            if !take_ax_value(result, K_AX_VALUE_CGRECT_TYPE, &mut rect) {
                return None;
            }

            Some(Rect::new(
                rect.origin.x,
                rect.origin.y,
                rect.size.width,
                rect.size.height,
            ))
        }
    }

    fn screen_height(&self) -> Option<f64> {
        let height = CGDisplay::main().bounds().size.height;
        (height > 0.0).then_some(height)
    }

    fn observe(
        &self,
        process: &ProcessHandle,
        element: Option<&AxElement>,
        window: Option<&AxElement>,
        events: UnboundedSender<AxEvent>,
    ) -> Result<ObserverHandle, SubscribeError> {
        if !self.is_trusted(false) {
            return Err(SubscribeError::PermissionDenied);
        }

        let pid = process.pid;
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = sync_channel(1);

        {
            let mut observers = lock(&self.observers);
            retire_idle(&mut observers, pid);

            let thread = match observers.entry(pid) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(ObserverThread::spawn(pid)?),
            };

            let registration = Registration {
                id,
                element: element.cloned(),
                window: window.cloned(),
                events,
            };
            if !thread.send(ObserverCommand::Add(registration, reply_tx)) {
                observers.remove(&pid);
                return Err(SubscribeError::ProcessGone(pid));
            }
            thread.subscriptions += 1;
        }

        let observers = Arc::clone(&self.observers);
        let handle = ObserverHandle::new(pid, move || release_subscription(&observers, pid, id));

        match reply_rx.recv_timeout(OBSERVER_SETUP_TIMEOUT) {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                log_warn!("observer for pid {} did not answer within {:?}", pid, OBSERVER_SETUP_TIMEOUT);
                Err(SubscribeError::Platform(K_AX_ERROR_CANNOT_COMPLETE))
            }
        }
    }
}

/// Stops the run loop of an observer thread. Retained, so stopping a loop
/// whose thread has already exited is harmless.
struct RunLoopToken(CFRunLoopRef);

// CFRunLoopStop is documented as callable from any thread.
unsafe impl Send for RunLoopToken {}

impl RunLoopToken {
    /// Retains the calling thread's run loop.
    unsafe fn current() -> Self {
        let run_loop = CFRunLoopGetCurrent();
        CFRetain(run_loop as CFTypeRef);
        Self(run_loop)
    }

    fn stop(&self) {
        unsafe { CFRunLoopStop(self.0) };
    }
}

impl Drop for RunLoopToken {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as CFTypeRef) };
    }
}

struct Registration {
    id: u64,
    element: Option<AxElement>,
    window: Option<AxElement>,
    events: UnboundedSender<AxEvent>,
}

enum ObserverCommand {
    Add(Registration, SyncSender<Result<(), SubscribeError>>),
    Remove(u64),
    Shutdown,
}

/// One observer thread per process. Focus moving between elements of the
/// same process only adds and removes registrations on it; the thread is
/// retired once the tracker subscribes to another process.
struct ObserverThread {
    commands: Sender<ObserverCommand>,
    run_loop: RunLoopToken,
    subscriptions: usize,
}

impl ObserverThread {
    fn spawn(pid: i32) -> Result<Self, SubscribeError> {
        let (commands, command_rx) = channel();
        let (ready_tx, ready_rx) = sync_channel(1);

        thread::Builder::new()
            .name(format!("ax-observer-{}", pid))
            .spawn(move || run_observer(pid, command_rx, ready_tx))
            .map_err(|err| {
                log_error!("failed to spawn observer thread for pid {}: {}", pid, err);
                SubscribeError::Platform(K_AX_ERROR_CANNOT_COMPLETE)
            })?;

        let run_loop = match ready_rx.recv_timeout(OBSERVER_SETUP_TIMEOUT) {
            Ok(Ok(run_loop)) => run_loop,
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(SubscribeError::Platform(K_AX_ERROR_CANNOT_COMPLETE)),
        };

        Ok(Self {
            commands,
            run_loop,
            subscriptions: 0,
        })
    }

    /// Queues a command and wakes the run loop so it is picked up at once.
    fn send(&self, command: ObserverCommand) -> bool {
        let sent = self.commands.send(command).is_ok();
        self.run_loop.stop();
        sent
    }
}

fn release_subscription(observers: &Mutex<HashMap<i32, ObserverThread>>, pid: i32, id: u64) {
    let mut observers = lock(observers);
    if let Some(thread) = observers.get_mut(&pid) {
        thread.subscriptions = thread.subscriptions.saturating_sub(1);
        if !thread.send(ObserverCommand::Remove(id)) {
            observers.remove(&pid);
        }
    }
}

/// Shuts down threads of other processes that no longer carry a
/// subscription. Nothing waits for them to exit.
fn retire_idle(observers: &mut HashMap<i32, ObserverThread>, keep: i32) {
    observers.retain(|pid, thread| {
        if *pid == keep || thread.subscriptions > 0 {
            return true;
        }
        log_debug!("retiring observer thread for pid {}", pid);
        thread.send(ObserverCommand::Shutdown);
        false
    });
}

struct CallbackContext {
    pid: i32,
    events: UnboundedSender<AxEvent>,
}

/// Notifications registered for one subscription. The boxed context is the
/// refcon handed to the observer and must outlive the registrations.
struct ActiveRegistration {
    _context: Box<CallbackContext>,
    registered: Vec<(AxElement, CFString)>,
}

unsafe extern "C" fn observer_callback(
    _observer: AXObserverRef,
    _element: AXUIElementRef,
    notification: CFStringRef,
    refcon: *mut c_void,
) {
    if refcon.is_null() || notification.is_null() {
        return;
    }

    let context = &*(refcon as *const CallbackContext);
    let name = CFString::wrap_under_get_rule(notification).to_string();
    if let Some(kind) = AxEventKind::from_platform_name(&name) {
        let _ = context.events.send(AxEvent {
            pid: context.pid,
            kind,
        });
    }
}

fn run_observer(
    pid: i32,
    commands: Receiver<ObserverCommand>,
    ready: SyncSender<Result<RunLoopToken, SubscribeError>>,
) {
    let mut observer: AXObserverRef = ptr::null_mut();
    let err = unsafe { AXObserverCreate(pid, observer_callback, &mut observer) };
    if err != K_AX_ERROR_SUCCESS || observer.is_null() {
        let _ = ready.send(Err(subscribe_error(err, pid)));
        return;
    }

    let Some(app) = (unsafe { AxElement::from_create_rule(AXUIElementCreateApplication(pid)) }) else {
        unsafe { CFRelease(observer as CFTypeRef) };
        let _ = ready.send(Err(SubscribeError::ProcessGone(pid)));
        return;
    };

    let source = unsafe { AXObserverGetRunLoopSource(observer) };
    let run_loop = unsafe {
        CFRunLoopAddSource(CFRunLoopGetCurrent(), source, kCFRunLoopDefaultMode);
        RunLoopToken::current()
    };

    let mut registrations: HashMap<u64, ActiveRegistration> = HashMap::new();

    if ready.send(Ok(run_loop)).is_ok() {
        'run: loop {
            loop {
                match commands.try_recv() {
                    Ok(ObserverCommand::Add(registration, reply)) => {
                        let id = registration.id;
                        let result = register(observer, &app, pid, registration)
                            .map(|active| {
                                registrations.insert(id, active);
                            });
                        let _ = reply.send(result);
                    }
                    Ok(ObserverCommand::Remove(id)) => {
                        if let Some(active) = registrations.remove(&id) {
                            unregister(observer, &active);
                        }
                    }
                    Ok(ObserverCommand::Shutdown) | Err(TryRecvError::Disconnected) => break 'run,
                    Err(TryRecvError::Empty) => break,
                }
            }

            unsafe { CFRunLoopRunInMode(kCFRunLoopDefaultMode, OBSERVER_SLICE_SECS, 0) };
        }
    }

    for active in registrations.values() {
        unregister(observer, active);
    }
    unsafe {
        CFRunLoopRemoveSource(CFRunLoopGetCurrent(), source, kCFRunLoopDefaultMode);
        CFRelease(observer as CFTypeRef);
    }
    log_debug!("observer thread for pid {} exited", pid);
}

fn register(
    observer: AXObserverRef,
    app: &AxElement,
    pid: i32,
    registration: Registration,
) -> Result<ActiveRegistration, SubscribeError> {
    let context = Box::new(CallbackContext {
        pid,
        events: registration.events,
    });
    let refcon = &*context as *const CallbackContext as *mut c_void;

    let mut registered: Vec<(AxElement, CFString)> = Vec::new();
    let mut failure = None;

    for kind in AxEventKind::ALL {
        let targets: Vec<&AxElement> = if kind.targets_window() {
            vec![registration.window.as_ref().unwrap_or(app)]
        } else {
            std::iter::once(app).chain(registration.element.as_ref()).collect()
        };

        for target in targets {
            let name = CFString::from_static_string(kind.platform_name());
            let err = unsafe {
                AXObserverAddNotification(observer, target.as_ptr(), name.as_concrete_TypeRef(), refcon)
            };
            match err {
                K_AX_ERROR_SUCCESS | K_AX_ERROR_NOTIFICATION_ALREADY_REGISTERED => {
                    registered.push((target.clone(), name));
                }
                K_AX_ERROR_NOTIFICATION_UNSUPPORTED => {
                    log_debug!("{} not supported by element of pid {}", kind.platform_name(), pid);
                }
                other => failure = Some(other),
            }
        }
    }

    if registered.is_empty() {
        let err = failure.unwrap_or(K_AX_ERROR_NOTIFICATION_UNSUPPORTED);
        return Err(subscribe_error(err, pid));
    }

    Ok(ActiveRegistration {
        _context: context,
        registered,
    })
}

fn unregister(observer: AXObserverRef, active: &ActiveRegistration) {
    for (target, name) in &active.registered {
        unsafe {
            AXObserverRemoveNotification(observer, target.as_ptr(), name.as_concrete_TypeRef());
        }
    }
}

fn subscribe_error(err: AXError, pid: i32) -> SubscribeError {
    match err {
        K_AX_ERROR_API_DISABLED => SubscribeError::PermissionDenied,
        K_AX_ERROR_INVALID_UI_ELEMENT | K_AX_ERROR_CANNOT_COMPLETE => SubscribeError::ProcessGone(pid),
        K_AX_ERROR_NOTIFICATION_UNSUPPORTED => SubscribeError::Unsupported,
        other => SubscribeError::Platform(other),
    }
}

/// Consumes a +1 CFString.
unsafe fn take_string(value: CFTypeRef) -> Option<String> {
    if CFGetTypeID(value) != CFStringGetTypeID() {
        CFRelease(value);
        return None;
    }
    Some(CFString::wrap_under_create_rule(value as CFStringRef).to_string())
}

/// Consumes a +1 AXValue, unpacking it into `out`.
unsafe fn take_ax_value<T>(value: CFTypeRef, the_type: u32, out: &mut T) -> bool {
    let ok = AXValueGetValue(value, the_type, out as *mut T as *mut c_void);
    CFRelease(value);
    ok
}

/// Consumes a +1 CFArray of elements.
unsafe fn take_elements(value: CFTypeRef) -> Option<Vec<AxElement>> {
    if CFGetTypeID(value) != CFArrayGetTypeID() {
        CFRelease(value);
        return None;
    }

    let array = value as CFArrayRef;
    let count = CFArrayGetCount(array);
    let elements = (0..count)
        .filter_map(|index| AxElement::from_get_rule(CFArrayGetValueAtIndex(array, index)))
        .collect();

    CFRelease(value);
    Some(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ax_errors_map_to_subscribe_errors() {
        assert!(matches!(
            subscribe_error(K_AX_ERROR_API_DISABLED, 3),
            SubscribeError::PermissionDenied
        ));
        assert!(matches!(
            subscribe_error(K_AX_ERROR_INVALID_UI_ELEMENT, 3),
            SubscribeError::ProcessGone(3)
        ));
        assert!(matches!(
            subscribe_error(K_AX_ERROR_NOTIFICATION_UNSUPPORTED, 3),
            SubscribeError::Unsupported
        ));
        assert!(matches!(subscribe_error(-25200, 3), SubscribeError::Platform(-25200)));
    }

    #[test]
    fn retiring_keeps_busy_and_current_threads() {
        let mut observers = HashMap::new();
        for pid in [1, 2, 3] {
            let (commands, _rx) = channel();
            let run_loop = unsafe { RunLoopToken::current() };
            observers.insert(
                pid,
                ObserverThread {
                    commands,
                    run_loop,
                    subscriptions: usize::from(pid == 2),
                },
            );
        }

        retire_idle(&mut observers, 3);

        let mut kept: Vec<i32> = observers.keys().copied().collect();
        kept.sort();
        assert_eq!(kept, vec![2, 3]);
    }
}
