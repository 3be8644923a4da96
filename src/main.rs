use apple_auth_server::{create_app, Config};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("apple_auth_server=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    let bind_address = config.bind_address;
    tracing::info!(
        backend_url = %config.backend_url,
        frontend_url = %config.frontend_url,
        redirect_uri = %config.apple.redirect_uri.as_str(),
        "starting Sign in with Apple backend"
    );

    let app = create_app(config)?.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::debug!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
