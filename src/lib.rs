pub mod accessibility;
pub mod gateway;
pub mod geometry;
#[cfg(target_os = "macos")]
pub mod macos_bridge;
pub mod models;
pub mod notifier;
pub mod overlay;
pub mod settings;
pub mod tracker;
mod utils;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use accessibility::AccessibilityApi;
use gateway::LookupGateway;
use overlay::OverlayPresenter;
use settings::Settings;
use tracker::TrackerController;

const PERMISSION_RECHECK: Duration = Duration::from_secs(2);

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("wordlens starting up...");

    let settings = Settings::load().context("failed to load settings")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(run_platform(settings))
}

#[cfg(target_os = "macos")]
async fn run_platform(settings: Settings) -> Result<()> {
    use gateway::HttpGateway;
    use macos_bridge::MacAccessibility;
    use overlay::LoggingPresenter;

    let api = Arc::new(MacAccessibility::new());
    let gateway: Arc<dyn LookupGateway> = Arc::new(
        HttpGateway::new(settings.gateway_url.clone(), settings.gateway_timeout())
            .context("failed to build lookup client")?,
    );

    track_until_shutdown(api, gateway, LoggingPresenter, &settings, shutdown_signal()).await
}

#[cfg(not(target_os = "macos"))]
async fn run_platform(_settings: Settings) -> Result<()> {
    anyhow::bail!("focus tracking needs the macOS accessibility service and is only available on macOS")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
}

/// Waits for accessibility permission, tracks focus until `shutdown`
/// resolves, then removes every overlay.
pub async fn track_until_shutdown<A, P, F>(
    api: Arc<A>,
    gateway: Arc<dyn LookupGateway>,
    presenter: P,
    settings: &Settings,
    shutdown: F,
) -> Result<()>
where
    A: AccessibilityApi,
    P: OverlayPresenter,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    if !wait_for_permission(api.as_ref(), settings.prompt_for_permission, shutdown.as_mut()).await {
        info!("shut down before accessibility permission was granted");
        return Ok(());
    }

    let mut controller = TrackerController::new();
    controller
        .start(api, gateway, presenter, settings)
        .await
        .context("failed to start focus tracking")?;

    shutdown.await;
    info!("shutdown requested");
    controller.stop().await
}

/// Returns false if `shutdown` resolved first.
async fn wait_for_permission<A, F>(api: &A, prompt: bool, mut shutdown: Pin<&mut F>) -> bool
where
    A: AccessibilityApi,
    F: Future<Output = ()>,
{
    if api.is_trusted(prompt) {
        info!("accessibility permission granted");
        return true;
    }

    warn!(
        "accessibility permission missing: allow wordlens under System Settings > Privacy & Security > Accessibility, tracking starts as soon as it is granted"
    );

    let mut ticker = tokio::time::interval(PERMISSION_RECHECK);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => return false,
            _ = ticker.tick() => {
                if api.is_trusted(false) {
                    info!("accessibility permission granted");
                    return true;
                }
            }
        }
    }
}
