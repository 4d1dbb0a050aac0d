use anyhow::{bail, Context, Result};
use std::{future::Future, process::Stdio};
use tokio::process::{Child, Command};
use tracing::{error, info, instrument};

use crate::config::{DashboardSettings, Settings};
use crate::insight::load_insights;

/// `<command> run <app> --server.port <port> --server.address <address>`, stdio inherited.
pub fn launch_command(dashboard: &DashboardSettings) -> Command {
    let mut cmd = Command::new(&dashboard.command);
    cmd.arg("run")
        .arg(&dashboard.app)
        .arg("--server.port")
        .arg(dashboard.port.to_string())
        .arg("--server.address")
        .arg(&dashboard.address)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    cmd
}

/// Run the dashboard until it exits or the user presses Ctrl-C.
#[instrument(level = "info", skip(dashboard), fields(command = %dashboard.command, port = dashboard.port))]
pub async fn launch(dashboard: &DashboardSettings) -> Result<()> {
    let mut child = match launch_command(dashboard).spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(
                "could not start {:?}: {}. Install it (e.g. `pip install streamlit`) or point DASHBOARD_COMMAND at it",
                dashboard.command, e
            );
            return Err(e).with_context(|| format!("spawning {}", dashboard.command));
        }
    };
    info!(
        "dashboard on http://{}:{} (Ctrl-C to stop)",
        dashboard.address, dashboard.port
    );

    supervise(&mut child, tokio::signal::ctrl_c()).await
}

/// Wait for `child` to exit, or stop it when `interrupt` resolves first.
///
/// An interrupt is a clean stop; a child that exits unsuccessfully is an error.
pub async fn supervise<F>(child: &mut Child, interrupt: F) -> Result<()>
where
    F: Future,
{
    tokio::select! {
        status = child.wait() => {
            let status = status.context("waiting for dashboard")?;
            if !status.success() {
                bail!("dashboard exited with {}", status);
            }
            info!("dashboard exited");
        }
        _ = interrupt => {
            info!("interrupted; stopping dashboard");
            if let Err(e) = child.kill().await {
                error!("failed to stop dashboard: {}", e);
            }
        }
    }
    Ok(())
}

/// Load the sector insights, report which are available, then launch.
pub async fn run(settings: &Settings) -> Result<()> {
    let insights = load_insights(&settings.insights_dir)?;
    let sectors: Vec<&str> = insights.keys().map(String::as_str).collect();
    info!(sectors = ?sectors, "insights available");
    launch(&settings.dashboard).await
}
