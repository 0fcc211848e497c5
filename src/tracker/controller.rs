use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::accessibility::AccessibilityApi;
use crate::gateway::LookupGateway;
use crate::overlay::{OverlayPresenter, UiEvent};
use crate::settings::Settings;

use super::loop_worker::tracking_loop;
use super::TrackerStats;

/// Starts and stops the focus track. At most one tracking loop runs per
/// controller.
pub struct TrackerController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    ui_tx: Option<UnboundedSender<UiEvent>>,
    stats: Arc<TrackerStats>,
}

impl Default for TrackerController {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            ui_tx: None,
            stats: Arc::new(TrackerStats::default()),
        }
    }

    pub async fn start<A, P>(
        &mut self,
        api: Arc<A>,
        gateway: Arc<dyn LookupGateway>,
        presenter: P,
        settings: &Settings,
    ) -> Result<()>
    where
        A: AccessibilityApi,
        P: OverlayPresenter,
    {
        if self.handle.is_some() {
            bail!("tracking already active");
        }

        spawn_initialize(Arc::clone(&gateway), settings);

        let cancel_token = CancellationToken::new();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        self.stats = Arc::new(TrackerStats::default());

        let handle = tokio::spawn(tracking_loop(
            api,
            gateway,
            presenter,
            settings.clone(),
            ui_rx,
            Arc::clone(&self.stats),
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.ui_tx = Some(ui_tx);
        info!("focus tracking started");
        Ok(())
    }

    /// Channel for pointer and click input from the presentation layer.
    pub fn ui_events(&self) -> Option<UnboundedSender<UiEvent>> {
        self.ui_tx.clone()
    }

    pub fn stats(&self) -> Arc<TrackerStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancels the loop and waits until it has removed every window and
    /// released its subscription.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.ui_tx = None;

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("tracking loop task failed to join")?;
            info!("focus tracking stopped");
        }
        Ok(())
    }
}

/// The lookup service builds its index on `/initialize`. Failure only means
/// lookups may be slow or empty, so it is logged and otherwise ignored.
fn spawn_initialize(gateway: Arc<dyn LookupGateway>, settings: &Settings) {
    let timeout = settings.gateway_timeout();
    tokio::spawn(async move {
        match tokio::time::timeout(timeout, gateway.initialize()).await {
            Ok(Ok(message)) => info!("lookup service initialised: {}", message),
            Ok(Err(err)) => warn!("lookup service initialisation failed: {}", err),
            Err(_) => warn!("lookup service initialisation timed out after {:?}", timeout),
        }
    });
}
