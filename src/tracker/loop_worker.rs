use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::accessibility::{AccessibilityApi, FocusResolver};
use crate::gateway::{lookup_relevant, LookupGateway};
use crate::models::Note;
use crate::notifier::{ChangeNotifier, Debouncer};
use crate::overlay::{LookupOutcome, LookupRequest, NoteFetch, OverlayPresenter, Reconciler, UiEvent};
use crate::settings::Settings;

use super::TrackerStats;

// Set to false to silence the per-event chatter of the tracking loop
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Results of work spawned off the loop, applied back on it.
enum LoopMessage {
    Lookup(LookupOutcome),
    NoteFetched { fallback: Note, fetched: Option<Note> },
}

pub async fn tracking_loop<A, P>(
    api: Arc<A>,
    gateway: Arc<dyn LookupGateway>,
    presenter: P,
    settings: Settings,
    mut ui_rx: UnboundedReceiver<UiEvent>,
    stats: Arc<TrackerStats>,
    cancel_token: CancellationToken,
) where
    A: AccessibilityApi,
    P: OverlayPresenter,
{
    let (ax_tx, mut ax_rx) = mpsc::unbounded_channel();
    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();

    let resolver = FocusResolver::new(Arc::clone(&api));
    let mut notifier = ChangeNotifier::new(Arc::clone(&api), ax_tx);
    let mut reconciler = Reconciler::new(api, presenter, settings.word_padding, settings.show_border);

    let mut change = Debouncer::new(settings.change_debounce());
    let mut hover = Debouncer::new(settings.hover_debounce());
    let mut poll = tokio::time::interval(settings.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let batch_size = settings.lookup_batch_size;
    let timeout = settings.gateway_timeout();
    let mut frontmost: Option<i32> = None;

    log_info!("tracking loop started");
    change.trigger();

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("tracking loop shutting down");
                break;
            }
            _ = poll.tick() => {
                let pid = resolver.current_frontmost_process().map(|process| process.pid);
                if pid != frontmost {
                    log_debug!("frontmost application changed: {:?} -> {:?}", frontmost, pid);
                    frontmost = pid;
                    change.trigger();
                } else if notifier.needs_polling() {
                    change.trigger();
                }
            }
            Some(event) = ax_rx.recv() => {
                if notifier.accepts(&event) {
                    change.trigger();
                } else {
                    log_debug!("ignoring {:?} from pid {}", event.kind, event.pid);
                }
            }
            _ = change.fired() => {
                stats.record_pass();
                let pass = reconciler.reconcile();

                frontmost = pass.process.as_ref().map(|process| process.pid);
                match &pass.process {
                    Some(process) => {
                        notifier.observe(process, pass.element.as_ref(), pass.window.as_ref());
                    }
                    None => notifier.unobserve(),
                }

                if let Some(request) = pass.lookup {
                    spawn_lookup(Arc::clone(&gateway), request, batch_size, timeout, msg_tx.clone());
                }
            }
            Some(message) = msg_rx.recv() => {
                match message {
                    LoopMessage::Lookup(outcome) => {
                        let applied = reconciler.apply_lookup(outcome);
                        stats.record_lookup(applied);
                    }
                    LoopMessage::NoteFetched { fallback, fetched } => {
                        reconciler.open_note(fetched.unwrap_or(fallback));
                    }
                }
            }
            Some(event) = ui_rx.recv() => {
                if let Some(fetch) = reconciler.handle_ui_event(event) {
                    spawn_note_fetch(Arc::clone(&gateway), fetch, timeout, msg_tx.clone());
                }

                if reconciler.suggestion_expiring() {
                    hover.trigger();
                } else {
                    hover.cancel();
                }
            }
            _ = hover.fired() => {
                reconciler.hover_expired();
            }
        }
    }

    reconciler.shutdown();
    notifier.unobserve();
}

fn spawn_lookup(
    gateway: Arc<dyn LookupGateway>,
    request: LookupRequest,
    batch_size: usize,
    timeout: Duration,
    tx: UnboundedSender<LoopMessage>,
) {
    tokio::spawn(async move {
        let matches = lookup_relevant(gateway.as_ref(), &request.words, batch_size, timeout).await;
        let outcome = LookupOutcome {
            generation: request.generation,
            matches,
        };
        if tx.send(LoopMessage::Lookup(outcome)).is_err() {
            log_debug!("tracking loop gone, dropping lookup for generation {}", request.generation);
        }
    });
}

fn spawn_note_fetch(
    gateway: Arc<dyn LookupGateway>,
    fetch: NoteFetch,
    timeout: Duration,
    tx: UnboundedSender<LoopMessage>,
) {
    tokio::spawn(async move {
        let fetched = match tokio::time::timeout(timeout, gateway.get_note(&fetch.word)).await {
            Ok(Ok(note)) => note,
            Ok(Err(err)) => {
                log_warn!("fetching note for '{}' failed: {}", fetch.word, err);
                None
            }
            Err(_) => {
                log_warn!("fetching note for '{}' timed out after {:?}", fetch.word, timeout);
                None
            }
        };

        let _ = tx.send(LoopMessage::NoteFetched {
            fallback: fetch.fallback,
            fetched,
        });
    });
}
