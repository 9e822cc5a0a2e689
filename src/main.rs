use doc_translator::models::LanguageSet;
use doc_translator::translation::{
    BreakerSettings, GenerateOptions, OllamaEndpoint, RetryPolicy,
};
use doc_translator::{
    AppConfig, AppState, DocumentTranslator, ModelRegistry, ResilientClient, SessionStore,
    SessionSweeper, TranslationCache,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// `RUST_LOG` directives plus the configured level for this crate.
fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive(format!("doc_translator={}", level).parse()?))
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let filter = env_filter(&config.logging.level)?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = arg_value(&args, "--config").unwrap_or("config.toml");
    // Reported once the subscriber is installed.
    let (config, load_error) = match AppConfig::load_from_file(config_path) {
        Ok(config) => (config.with_env_overrides(), None),
        Err(e) => (AppConfig::default().with_env_overrides(), Some(e)),
    };
    init_tracing(&config)?;
    match load_error {
        None => tracing::info!(name = %config.server.name, config = %config_path, "Loaded configuration"),
        Some(e) => tracing::warn!(config = %config_path, error = %e, "Failed to load config file, using defaults"),
    }

    let port = arg_value(&args, "--port")
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(config.server.port);
    let bind_addr = arg_value(&args, "--bind")
        .unwrap_or(config.server.bind_addr.as_str())
        .to_string();

    let registry = Arc::new(ModelRegistry::with_overrides(&config.models));
    let languages = Arc::new(LanguageSet::new(config.languages.clone()));
    let endpoint = Arc::new(OllamaEndpoint::new(config.inference.endpoint.clone())?);

    let client = ResilientClient::new(endpoint, registry.clone(), languages)
        .with_breaker(BreakerSettings::from(&config.breaker))
        .with_policy(RetryPolicy::from(&config.breaker))
        .with_options(GenerateOptions::from(&config.inference));

    let mut events = client.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(?event, "Client event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Client event monitor lagging")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let cache = if config.cache.enabled {
        match TranslationCache::from_config(&config.cache) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "Translation cache unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    tracing::info!(
        models = registry.list().len(),
        endpoint = %config.inference.endpoint,
        cache = cache.is_some(),
        "Translation pipeline ready"
    );

    let translator = Arc::new(DocumentTranslator::new(Arc::new(client), cache));
    let store = SessionStore::new();

    SessionSweeper::new(store.clone(), Duration::from_secs(config.sessions.ttl_secs))
        .start_background_sweep(Duration::from_secs(config.sessions.sweep_interval_secs));

    doc_translator::server::serve(AppState::new(store, translator.clone()), &bind_addr, port).await?;

    if let Some(cache) = translator.cache() {
        cache.flush().await;
    }

    tracing::info!("Server shutting down");
    Ok(())
}
