mod config;
mod routes;
mod state;
mod translate;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::state::AppState;
use crate::translate::TranslatorFactory;

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = dotenvy::dotenv().ok();
    let settings = Settings::load()?;

    let default_filter = if settings.debug_mode {
        "translator_backend=debug,tower_http=debug"
    } else {
        "translator_backend=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Some(path) = env_file {
        info!("Loaded environment from {}", path.display());
    }
    info!(
        "Loaded settings: model={}, cache={}, device={}",
        settings.model_name, settings.transformers_cache, settings.device
    );

    let app_state = AppState::new(settings.clone());

    // The listener is only bound once the model is in place; a load failure ends
    // the process here.
    let factory_settings = settings.clone();
    let translator = tokio::task::spawn_blocking(move || TranslatorFactory::create(&factory_settings))
        .await
        .context("Model loading task panicked")?
        .context("Failed to initialize translator")?;
    app_state.mark_ready(Arc::new(translator));
    info!("Translator ready");

    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = bind_listener(&settings).await?;
    info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// `api_host` may be an IP address or a hostname.
async fn bind_listener(settings: &Settings) -> Result<TcpListener> {
    TcpListener::bind((settings.api_host.as_str(), settings.api_port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                settings.api_host, settings.api_port
            )
        })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use ::config::{Config, File, FileFormat};

    use super::*;

    fn settings_for(host: &str) -> Settings {
        let json = serde_json::json!({
            "model_name": "scripted",
            "api_host": host,
            "api_port": 0,
        });
        Settings::from_builder(
            Config::builder().add_source(File::from_str(&json.to_string(), FileFormat::Json)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn binds_to_a_hostname() {
        let listener = bind_listener(&settings_for("localhost")).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn binds_to_an_ip_address() {
        let listener = bind_listener(&settings_for("127.0.0.1")).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn unresolvable_host_names_the_address() {
        let err = bind_listener(&settings_for("no-such-host.invalid"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no-such-host.invalid"));
    }
}
