//! Application startup and lifecycle management.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::error::AppError;
use crate::handlers;
use crate::services::UserRepository;

/// Shared application state. `/ping` does not touch the repository, but any
/// real user endpoint would reach it from here.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repository: UserRepository,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Connecting the repository also ensures the email index; either failure
    /// aborts startup.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let repository =
            UserRepository::connect(&config.mongodb.uri, &config.mongodb.database).await?;

        let state = AppState {
            config: config.clone(),
            repository,
        };

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("User service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a handle to the user repository.
    pub fn repository(&self) -> UserRepository {
        self.state.repository.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Router::new()
            .route("/ping", get(handlers::ping))
            .with_state(self.state);

        axum::serve(self.listener, router).await
    }
}
