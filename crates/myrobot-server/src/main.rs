//! `myrobot-server` – runs the stub control endpoint until Ctrl-C.

use myrobot_middleware::ServiceBus;
use myrobot_server::{StubResponder, config};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); MYROBOT_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("MYROBOT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load_or_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, path = %config::config_path().display(), "config unreadable; using defaults");
            let mut cfg = config::ServerConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Stub responder ────────────────────────────────────────────────────
    let services = ServiceBus::new(cfg.queue_depth);
    let responder = match StubResponder::advertise(&services, &cfg) {
        Ok(responder) => responder,
        Err(e) => {
            error!(error = %e, service = %cfg.service_name, "failed to advertise service");
            std::process::exit(1);
        }
    };
    let serving = responder.spawn();

    // ── Ctrl-C ────────────────────────────────────────────────────────────
    let (stop_tx, mut stop_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; terminate the process to stop");
        if let Err(e) = serving.await {
            error!(error = %e, "responder task failed");
        }
        return;
    }

    if stop_rx.wait_for(|stop| *stop).await.is_ok() {
        info!(node = %cfg.node_name, "Ctrl-C received; shutting down");
    }
    services.unadvertise(&cfg.service_name);
    if let Err(e) = serving.await {
        error!(error = %e, "responder task failed");
    }
}
