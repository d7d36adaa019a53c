pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod db;
pub mod jwt;

use api::{ApiState, create_api_router};
use auth::{Argon2Hasher, CredentialAuthenticator, TokenPolicy, TokenService};
use axum::Router;
use clock::Clock;
use db::Database;
use jsonwebtoken::Algorithm;
use jwt::JwtConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// HMAC algorithm tokens are signed with
    pub jwt_algorithm: Algorithm,
    /// Token lifetime and refresh settings
    pub token_policy: TokenPolicy,
    /// Time source for issuance and verification
    pub clock: Arc<dyn Clock>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret, config.jwt_algorithm));

    let state = ApiState {
        authenticator: CredentialAuthenticator::new(
            config.db.clone(),
            Arc::new(Argon2Hasher::new()),
            config.clock.clone(),
        ),
        tokens: TokenService::new(
            config.db.clone(),
            jwt,
            config.clock.clone(),
            config.token_policy,
        ),
    };

    create_api_router(state).layer(TraceLayer::new_for_http())
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
