use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use attune_cache::ResultCache;
use attune_core::config::SessionConfig;
use attune_core::events::EventKind;
use attune_core::model::Modality;
use attune_session::biometric::{BiometricAdapter, SimulatedWearable};
use attune_session::capture::{CaptureAdapter, SimulatedCamera};
use attune_session::SessionOrchestrator;
use attune_telemetry::{init_telemetry, MetricsRecorder, TelemetryConfig};
use attune_transport::{AnalysisChannel, ChannelConfig, WsConnector};

#[derive(Parser, Debug)]
#[command(name = "attune", about = "Real-time multi-modal session analysis client")]
struct Args {
    /// WebSocket endpoint of the analysis backend.
    #[arg(long, default_value = "ws://127.0.0.1:8765/analysis")]
    backend_url: String,

    /// Session type recorded with the session.
    #[arg(long, default_value = "individual")]
    session_type: String,

    /// Patient identifier attached to the session.
    #[arg(long)]
    patient_id: Option<String>,

    /// Result cache path. Defaults to ~/.attune/cache.db.
    #[arg(long)]
    cache_path: Option<PathBuf>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Seconds between rolling-summary log lines.
    #[arg(long, default_value_t = 10)]
    summary_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_telemetry(&TelemetryConfig {
        json: args.json_logs,
        ..Default::default()
    });
    tracing::info!(backend = %args.backend_url, "starting attune client");

    let cache_path = args
        .cache_path
        .unwrap_or_else(|| dirs_home().join(".attune").join("cache.db"));
    let cache = ResultCache::open(&cache_path)?;

    let metrics = Arc::new(MetricsRecorder::new());
    let (channel, events) = AnalysisChannel::new(
        Box::new(WsConnector::new(&args.backend_url)),
        ChannelConfig::default(),
        Arc::clone(&metrics),
    );
    let channel = Arc::new(channel);

    let capture = Arc::new(CaptureAdapter::new(Arc::new(SimulatedCamera::new())));
    let biometric = Arc::new(BiometricAdapter::new(Arc::new(SimulatedWearable::new())));

    let orchestrator = Arc::new(
        SessionOrchestrator::new(Arc::clone(&channel), Arc::clone(&metrics))
            .with_cache(cache)
            .with_capture(capture)
            .with_biometric(biometric),
    );
    let _event_loop = orchestrator.run(events);

    orchestrator.subscribe(EventKind::AnalysisComplete, |result| {
        if let Ok(payload) = serde_json::to_string(result) {
            tracing::info!(payload = %payload, "comprehensive analysis received");
        }
    });

    channel.connect().await;

    let mut config = SessionConfig::default();
    config.session.session_type = args.session_type;
    config.session.patient_id = args.patient_id;
    let session_id = orchestrator.start_session(config);
    tracing::info!(session_id = %session_id, "session running, ctrl-c to stop");

    let mut summary_ticker =
        tokio::time::interval(Duration::from_secs(args.summary_interval_secs.max(1)));
    summary_ticker.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = summary_ticker.tick() => {
                for modality in [Modality::Video, Modality::Biometric, Modality::Text] {
                    if let Some(summary) = orchestrator.summary(modality) {
                        tracing::info!(
                            modality = %modality,
                            samples = summary.samples,
                            latest = ?summary.latest,
                            trend = ?summary.trend.map(|t| t.direction),
                            "rolling summary"
                        );
                    }
                }
            }
        }
    }

    orchestrator.stop_session();
    channel.close();
    tracing::info!(metrics = ?metrics.snapshot(), "shut down");
    Ok(())
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
