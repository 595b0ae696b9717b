use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use joint_hub::{
    AppState,
    config::Config,
    database,
    gateway::{Gateway, GeminiProvider},
    router::create_router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    let store = database::connect(&config)
        .await
        .expect("Failed to connect to the datastore");

    let provider = GeminiProvider::new(&config).expect("Failed to build generation client");
    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set, generation endpoints will fail");
    }
    if !config.require_auth_for_generation {
        tracing::info!("Generation endpoints are open to unauthenticated callers");
    }

    let state = AppState {
        gateway: Gateway::new(Arc::new(provider), config.persona_instruction.clone()),
        config: config.clone(),
        store,
    };

    let app = create_router(state);

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
