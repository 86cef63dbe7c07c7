use std::sync::Arc;
use std::time::Duration;

use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};

use crate::error::AppError;
use crate::models::User;
use crate::services::clock::{Clock, SystemClock};

const USER_COLLECTION: &str = "user";
const EMAIL_ADDRESS_FIELD: &str = "email_address";
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Mediates all access to persisted user data. Owns one client handle for its
/// lifetime; concurrency safety is the driver's.
#[derive(Clone)]
pub struct UserRepository {
    client: MongoClient,
    db: Database,
    clock: Arc<dyn Clock>,
}

impl UserRepository {
    /// Connect and ensure the email index. No repository is returned if
    /// either step fails.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        Self::connect_with_clock(uri, database, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(
        uri: &str,
        database: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::DatabaseError(anyhow::Error::new(e))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");

        let repo = Self { client, db, clock };
        repo.ensure_indexes().await?;
        Ok(repo)
    }

    /// Idempotent: Mongo accepts re-creation of an index whose name and
    /// definition already match.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let email_index = IndexModel::builder()
            .keys(doc! { EMAIL_ADDRESS_FIELD: 1 })
            .options(
                IndexOptions::builder()
                    .name(EMAIL_ADDRESS_FIELD.to_string())
                    .unique(false)
                    .build(),
            )
            .build();

        self.users()
            .create_index(email_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create {} index: {}", EMAIL_ADDRESS_FIELD, e);
                AppError::DatabaseError(anyhow::Error::new(e))
            })?;

        Ok(())
    }

    /// Health check against the server, bounded internally at 2 seconds.
    pub async fn ping(&self) -> Result<(), AppError> {
        let admin_db = self.client.database("admin");
        let ping = admin_db.run_command(doc! { "ping": 1 }, None);

        match tokio::time::timeout(PING_TIMEOUT, ping).await {
            Ok(result) => {
                result.map_err(|e| {
                    tracing::error!("MongoDB health check failed: {}", e);
                    AppError::DatabaseError(anyhow::Error::new(e))
                })?;
                Ok(())
            }
            Err(_) => Err(AppError::DatabaseError(anyhow::anyhow!(
                "MongoDB health check timed out after {:?}",
                PING_TIMEOUT
            ))),
        }
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection(USER_COLLECTION)
    }

    pub fn database(&self) -> Database {
        self.db.clone()
    }

    /// Insert a new user. `created_at` is stamped from the repository clock;
    /// whatever the caller put there is ignored.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let record = User {
            id: None,
            created_at: self.clock.now(),
            ..user.clone()
        };

        self.users().insert_one(&record, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict(
                    anyhow::Error::new(e).context("user with this email already exists"),
                )
            } else {
                tracing::error!("Failed to insert user: {}", e);
                AppError::DatabaseError(anyhow::Error::new(e))
            }
        })?;

        Ok(())
    }

    /// Look up one user by exact email. The stored password never leaves the
    /// repository: it is cleared before the user is returned.
    pub async fn get_user(&self, email_address: &str) -> Result<Option<User>, AppError> {
        let user = self
            .users()
            .find_one(doc! { EMAIL_ADDRESS_FIELD: email_address }, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to find user: {}", e);
                AppError::DatabaseError(anyhow::Error::new(e))
            })?;

        Ok(user.map(|mut u| {
            u.password = String::new();
            u
        }))
    }

    /// Shut the underlying client down. Consumes the repository, so no
    /// operation can run after close.
    pub async fn close(self) {
        self.client.shutdown().await;
    }
}

/// Server code 11000: write rejected by a unique index.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) => write_error.code == 11000,
        _ => false,
    }
}
