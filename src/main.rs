use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use gamebox_backend::{
    AppState,
    auth::AuthGate,
    cache::{CacheBackend, CacheError, MemoryCache, RedisCache},
    config::Config,
    database::{
        self, MemorySessionRepository, MemoryUserRepository, PgSessionRepository,
        PgUserRepository, SessionRepository, UserRepository,
    },
    router::create_router,
    tasks::BackgroundTasks,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Repositories = (Arc<dyn UserRepository>, Arc<dyn SessionRepository>);

async fn repositories(config: &Config) -> Result<Repositories, sqlx::Error> {
    match &config.database_url {
        Some(url) => {
            let pool = database::connect(url, config.db_max_connections).await?;
            info!("Connected to Postgres");
            Ok((
                Arc::new(PgUserRepository::new(pool.clone())),
                Arc::new(PgSessionRepository::new(pool)),
            ))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory stores; data is lost on restart");
            Ok((
                Arc::new(MemoryUserRepository::new()),
                Arc::new(MemorySessionRepository::new()),
            ))
        }
    }
}

fn cache_backend(
    config: &Config,
    tasks: &mut BackgroundTasks,
) -> Result<Arc<dyn CacheBackend>, CacheError> {
    match &config.redis_url {
        Some(url) => {
            info!("Using Redis cache");
            Ok(Arc::new(RedisCache::open(url)?))
        }
        None => {
            info!("REDIS_URL not set, using in-process cache");
            let cache = MemoryCache::new();
            cache.start_sweeper(tasks, config.cache_sweep_interval());
            Ok(Arc::new(cache))
        }
    }
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Shutdown signal received");
        }
        _ = token.cancelled() => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env()?;

    #[cfg(debug_assertions)]
    info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    info!("Running in production mode with CORS disabled");

    let shutdown = CancellationToken::new();
    let mut tasks = BackgroundTasks::new(shutdown.clone());

    let (users, sessions) = repositories(&config).await?;
    let cache = cache_backend(&config, &mut tasks)?;

    let gate = AuthGate::from_config(&config, users, sessions, cache);
    gate.start_session_sweeper(&mut tasks, config.session_sweep_interval());
    info!(tasks = tasks.len(), "Background tasks started");

    let state = AppState::new(config, gate);
    let app = create_router(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    tasks.shutdown().await;
    info!("Server stopped");
    Ok(())
}
