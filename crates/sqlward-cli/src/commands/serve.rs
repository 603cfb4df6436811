//! `sqlward serve` - start the gateway.

use anyhow::Context;
use sqlward_adapter_mysql::MySqlConnector;
use sqlward_audit::AuditLogger;
use sqlward_core::{GatewayConfig, SettingsStore};
use sqlward_proxy::GatewayProxy;
use sqlward_session::SessionServices;
use std::path::PathBuf;
use std::sync::Arc;

/// Rule settings backed by the configured rules file, when there is one.
fn settings_store(config: &GatewayConfig) -> SettingsStore {
    match &config.rules_file {
        Some(path) => SettingsStore::with_source(config.rules.clone(), path.clone()),
        None => SettingsStore::new(config.rules.clone()),
    }
}

/// Re-read the rules file on SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(settings: Arc<SettingsStore>) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            if let Err(e) = settings.reload() {
                tracing::warn!(error = %e, "Rule settings reload failed");
            }
        }
    });
    Ok(())
}

/// Start the gateway and run until interrupted.
pub async fn serve(config_path: PathBuf) -> anyhow::Result<()> {
    tracing::info!(config = %config_path.display(), "Loading configuration");
    let config = GatewayConfig::load_with_context(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let audit = AuditLogger::new(config.audit.clone())?;
    let settings = Arc::new(settings_store(&config));
    #[cfg(unix)]
    spawn_reload_on_hangup(settings.clone())?;

    let connector = Arc::new(MySqlConnector::from_config(&config.execution));
    let services = Arc::new(SessionServices::new(&config, settings, connector, audit));

    tracing::info!(
        listen_port = config.proxy.listen_port,
        rules_file = ?config.rules_file,
        audit_enabled = config.audit.enabled,
        "Starting sqlward gateway"
    );

    let proxy = GatewayProxy::new(config.proxy.clone(), services);
    tokio::select! {
        result = proxy.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
