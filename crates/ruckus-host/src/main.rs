use tracing_subscriber::EnvFilter;

use ruckus_host::config::HostConfig;
use ruckus_host::game_loop::{build_session, default_registry, run_session, simulate};
use ruckus_host::pump::FramePump;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("Ruckus host starting");

    let config = HostConfig::load();
    config.validate();

    let registry = default_registry();
    if registry.is_empty() {
        tracing::error!("no game modes compiled in; enable the coin-rush or hot-potato feature");
        std::process::exit(1);
    }
    tracing::info!(
        modes = ?registry.kinds(),
        players = config.players.names.len(),
        rounds = config.session.total_rounds,
        "session configured"
    );

    let mut session = build_session(&config, registry);
    let mut pump = FramePump::new(&config.pump);

    let report = if config.run.headless {
        let max_frames = (config.run.max_session_secs * config.pump.frame_rate_hz).ceil() as u64;
        simulate(&mut session, &mut pump, config.pump.frame_dt(), max_frames)
    } else {
        run_session(&mut session, &mut pump, config.pump.frame_rate_hz).await
    };

    match report.outcome {
        Some(outcome) => match serde_json::to_string(&outcome) {
            Ok(json) => tracing::info!(frames = report.frames, outcome = %json, "session finished"),
            Err(e) => tracing::error!(error = %e, "failed to encode outcome"),
        },
        None => {
            tracing::warn!(frames = report.frames, "session ended without an outcome");
            std::process::exit(1);
        },
    }
}
