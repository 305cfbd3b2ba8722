pub mod ai;
pub mod api;
pub mod bank;
pub mod config;
pub mod error;
pub mod grader;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod output;
pub mod requirements;
pub mod sandbox;
pub mod structural;
pub mod syntax;

use std::{net::SocketAddr, sync::Arc};

use axum::Router;

use crate::engine::{
    ai::AiGrader, api::routes, bank::ChallengeBank, config::EngineConfig, grader::ExecutionGrader,
    ledger::Ledger, metrics::MetricsRegistry, sandbox::ProcessSandbox,
};

pub async fn run() -> anyhow::Result<()> {
    let config = EngineConfig::from_env();
    init_tracing(&config);

    let bank = Arc::new(ChallengeBank::seeded());
    let ledger = Arc::new(Ledger::new(config.badge_audit_path.clone()));
    let metrics = Arc::new(MetricsRegistry::new());
    let sandbox = ProcessSandbox::new(&config);
    let grader = Arc::new(ExecutionGrader::new(
        sandbox,
        config.sandbox_timeout(),
        metrics.clone(),
    ));

    let ai = AiGrader::from_env();
    match &ai {
        Some(ai) => tracing::info!(base_url = %ai.base_url(), model = %ai.model(), "AI grading adapter enabled"),
        None => tracing::info!("AI grading adapter disabled, deterministic grading only"),
    }

    let app: Router = routes(bank, ledger, metrics, grader, ai);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let local = listener
        .local_addr()
        .unwrap_or(SocketAddr::from(([0, 0, 0, 0], 0)));
    tracing::info!(bind = %local, "challenge grading engine ready");
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(config: &EngineConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .init();
}
