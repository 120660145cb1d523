//! Expiry commands: a single sweep pass, and the sweeper daemon.

use anyhow::{Context, Result};
use editlock_core::ExpirySweeper;
use serde_json::json;
use tokio::sync::broadcast;

use super::print_json;
use crate::AppContext;

pub async fn sweep(ctx: &AppContext) -> Result<i32> {
    let report = ExpirySweeper::from_config(ctx.coordinator().clone(), &ctx.config.lock)?
        .run_once()
        .await
        .context("Failed to sweep expired locks")?;

    print_json(&json!({ "swept": report.swept }))?;
    Ok(0)
}

/// Run the sweeper until SIGINT/SIGTERM. With `once`, run a single pass in
/// the foreground and fail if it fails.
pub async fn serve(ctx: &AppContext, once: bool) -> Result<i32> {
    let sweeper = ExpirySweeper::from_config(ctx.coordinator().clone(), &ctx.config.lock)?;

    if once {
        let report = sweeper
            .run_once()
            .await
            .context("Failed to sweep expired locks")?;
        print_json(&report)?;
        return Ok(0);
    }

    let handle = sweeper.spawn();
    let (mut sigint, mut sigterm) = signal_channels()?;
    tokio::select! {
        _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
    }

    let last = handle.last_report();
    handle.shutdown().await;

    if let Some(report) = last {
        print_json(&report)?;
    }
    Ok(0)
}

/// Receivers that fire on SIGINT and SIGTERM.
fn signal_channels() -> Result<(broadcast::Receiver<()>, broadcast::Receiver<()>)> {
    let (sigint_tx, sigint_rx) = broadcast::channel(1);
    let (sigterm_tx, sigterm_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = sigint_tx.send(());
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to set up SIGTERM handler")?;
        tokio::spawn(async move {
            if sigterm.recv().await.is_some() {
                let _ = sigterm_tx.send(());
            }
        });
    }
    #[cfg(not(unix))]
    tokio::spawn(async move {
        let _sigterm_tx = sigterm_tx;
        std::future::pending::<()>().await;
    });

    Ok((sigint_rx, sigterm_rx))
}
