use std::sync::Arc;
use taskboard_shell::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    gateway::{GatewayState, HttpApiGateway},
    navigation::{History, NavigationListener},
    routes,
    session::{SessionHandle, SessionStore},
    storage::{FileTokenStore, TokenStoreState},
};
use tokio::{net::TcpListener, sync::Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, the Session Store and its collaborators, the
/// navigation listener, startup resolution, and finally the HTTP surface.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskboard_shell=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Shell starting in {:?} mode against {}", config.env, config.api_base_url);

    // 4. Backend Gateway & Token Slot
    let gateway = HttpApiGateway::new(&config.api_base_url, config.api_timeout)
        .expect("FATAL: Failed to build the HTTP client.");
    let gateway = Arc::new(gateway) as GatewayState;
    let tokens = Arc::new(FileTokenStore::new(config.token_store_path.clone())) as TokenStoreState;

    // 5. Session Store (one per process)
    let session: SessionHandle = Arc::new(SessionStore::from_config(gateway, tokens, &config));

    // 6. Navigation Listener: subscribed before resolution so it sees every transition.
    let history = Arc::new(Mutex::new(History::new(routes::ROOT)));
    let listener = NavigationListener::new(session.subscribe(), history.clone());
    tokio::spawn(listener.run());

    // 7. Startup Resolution (Initializing → Resolving → Ready | Unauthenticated)
    let resolving = session.clone();
    tokio::spawn(async move {
        if let Err(e) = resolving.resolve().await {
            tracing::warn!(error = %e, "Startup resolution did not complete");
        }
    });

    // 8. Router and Server Startup
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        session,
        history,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Could not bind the shell address. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
