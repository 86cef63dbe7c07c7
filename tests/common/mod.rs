use user_service::config::{Config, MongoConfig, ServerConfig};
use user_service::startup::Application;

pub fn test_mongodb_uri() -> String {
    std::env::var("TEST_MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub repository: user_service::services::UserRepository,
    pub db_name: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        // Use random port for testing (port 0) and a throwaway database
        let db_name = format!("user_test_{}", uuid::Uuid::new_v4());
        let config = Config {
            server: ServerConfig { port: 0 },
            mongodb: MongoConfig {
                uri: test_mongodb_uri(),
                database: db_name.clone(),
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let repository = app.repository();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the ping endpoint
        let client = reqwest::Client::new();
        let ping_url = format!("{}/ping", address);
        for _ in 0..50 {
            if client.get(&ping_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            repository,
            db_name,
        }
    }

    /// Cleanup test database after test completes.
    pub async fn cleanup(&self) {
        self.repository
            .database()
            .drop(None)
            .await
            .expect("Failed to drop test database");
    }
}
