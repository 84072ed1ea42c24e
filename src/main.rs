use std::sync::Arc;

use anyhow::Context;

use nutribot_relay::agent::{AgentClient, AzureAgentClient};
use nutribot_relay::config::{AgentCredential, RelayConfig};
use nutribot_relay::preferences::{InMemoryPreferenceStore, PreferenceStore};
use nutribot_relay::relay::{RelayState, TurnOrchestrator, relay_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let config = RelayConfig::from_env().context("invalid relay configuration")?;

    eprintln!("🥗 NutriBot relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Agent: {} ({})", config.agent.agent_id, config.agent.endpoint);
    eprintln!(
        "   Auth: {}",
        match config.agent.credential {
            AgentCredential::Bearer(_) => "bearer token",
            AgentCredential::ApiKey(_) => "api key",
            AgentCredential::None => "none",
        }
    );
    eprintln!("   Turn timeout: {}s", config.turn_timeout.as_secs());
    eprintln!("   Chat API: http://{}/api/chat\n", config.bind_addr);

    let agent: Arc<dyn AgentClient> = Arc::new(
        AzureAgentClient::new(config.agent.clone()).context("failed to build agent client")?,
    );
    let store: Arc<dyn PreferenceStore> = Arc::new(InMemoryPreferenceStore::new());
    let orchestrator = Arc::new(TurnOrchestrator::new(agent, store, config.turn_timeout));

    let app = relay_app(RelayState { orchestrator }, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Relay server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Relay server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
