use std::sync::Arc;

use taskdeck::auth::service::AuthService;
use taskdeck::auth::store::InMemorySessionStore;
use taskdeck::config::Config;
use taskdeck::shared::AppState;
use taskdeck::todo::repository::InMemoryTodoRepository;
use taskdeck::todo::service::TodoService;
use taskdeck::user::repository::InMemoryUserRepository;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskdeck=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting taskdeck API server");

    // Create shared application state with dependency injection
    // Easy to switch between implementations:
    let user_repository = Arc::new(InMemoryUserRepository::new());
    let todo_repository = Arc::new(InMemoryTodoRepository::new());
    let session_store = Arc::new(InMemorySessionStore::new());

    // For production with PostgreSQL and Redis:
    // let database_url = config.database.url.as_deref().expect("DATABASE_URL must be set");
    // let pool = sqlx::PgPool::connect(database_url).await.expect("Failed to connect to database");
    // let user_repository = Arc::new(taskdeck::user::repository::PostgresUserRepository::new(pool.clone()));
    // let todo_repository = Arc::new(taskdeck::todo::repository::PostgresTodoRepository::new(pool));
    // let redis_url = config.redis.url.as_deref().expect("REDIS_URL must be set");
    // let session_store = Arc::new(
    //     taskdeck::auth::store::RedisSessionStore::connect(redis_url)
    //         .await
    //         .expect("Failed to connect to Redis"),
    // );

    let auth = Arc::new(AuthService::new(
        user_repository,
        session_store,
        &config.auth,
    ));
    let todos = Arc::new(TodoService::new(todo_repository));
    let app_state = AppState::new(auth, todos);

    let app = taskdeck::router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!("Server running on http://{addr}");
    axum::serve(listener, app).await.unwrap();
}
