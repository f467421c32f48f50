use std::sync::Arc;

use registry_http::RegistryClient;
use source_kafka::KafkaSource;
use tailcat_engine::{PayloadDecoder, SessionSummary, run_session};
use tokio_util::sync::CancellationToken;

use super::config::{Config, StreamArgs};
use super::error::TailcatError;

// ═══════════════════════════════════════════════════════════════
//  Streaming command
// ═══════════════════════════════════════════════════════════════

pub async fn run(config: &Config, args: &StreamArgs) -> Result<SessionSummary, TailcatError> {
    let topic = args.topic()?;
    let mode = args.mode();
    let options = args.session_options(config);

    let source = KafkaSource::connect(&config.kafka())?;
    let registry = RegistryClient::new(config.schema_registry.clone())?;
    let mut decoder = PayloadDecoder::new(Arc::new(registry));

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    if mode.follows() {
        tracing::info!(topic, %mode, "following topic, press Ctrl+C to exit");
    } else {
        tracing::info!(topic, %mode, "reading topic");
    }

    let summary = run_session(
        &source,
        &mut decoder,
        topic,
        mode,
        std::io::stdout(),
        options,
        &cancel,
    )
    .await?;
    Ok(summary)
}

/// Cancel `token` on Ctrl+C or SIGTERM.
///
/// A second interrupt exits at once with status 130 without waiting for the
/// session, so stdout may end with an unclosed array.
fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("interrupt received, closing output");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("second interrupt, exiting");
            std::process::exit(130);
        }
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
