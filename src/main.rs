use std::sync::Arc;

use anyhow::Context;
use hub_onboarding::config::ServiceConfig;
use hub_onboarding::error::Result;
use hub_onboarding::onboarding::{HttpResolver, OnboardingManager, onboarding_routes};
use hub_onboarding::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env().context("Invalid configuration")?;

    eprintln!("🧭 Hub Onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/status", config.port);
    eprintln!("   Database: {}", config.db_path.display());
    match config.resolver_base_url.as_deref() {
        Some(base_url) => eprintln!("   Resolvers: {}", base_url),
        None => eprintln!("   Resolvers: disabled"),
    }

    let manager = build_manager(&config)
        .await
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    let manager = Arc::new(manager);
    manager.load().await;

    let app = onboarding_routes(manager);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the database and wire the manager with the configured resolvers.
async fn build_manager(config: &ServiceConfig) -> Result<OnboardingManager> {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    let mut manager = OnboardingManager::new(db, config.user_id.clone())
        .with_user_email(config.user_email.clone());

    if let Some(base_url) = config.resolver_base_url.as_deref() {
        let resolver = Arc::new(HttpResolver::new(base_url, config.resolver_token.clone()));
        manager = manager
            .with_prefill_resolver(resolver.clone())
            .with_org_chart_resolver(resolver);
    }

    Ok(manager)
}
