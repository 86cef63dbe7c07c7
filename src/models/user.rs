use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One stored user record. `email_address` is the lookup key; `password` is
/// write-only and cleared before a read result leaves the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub password: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        first_name: String,
        last_name: String,
        email_address: String,
        password: String,
    ) -> Self {
        Self {
            id: None,
            first_name,
            last_name,
            email_address,
            password,
            // Placeholder only: the repository re-stamps this at insert time.
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, Bson};

    #[test]
    fn serializes_with_expected_attribute_names() {
        let user = User::new(
            "Ada".to_string(),
            "Lovelace".to_string(),
            "ada@example.com".to_string(),
            "hunter2".to_string(),
        );

        let doc = bson::to_document(&user).expect("Failed to serialize user");

        assert_eq!(doc.get_str("first_name").unwrap(), "Ada");
        assert_eq!(doc.get_str("last_name").unwrap(), "Lovelace");
        assert_eq!(doc.get_str("email_address").unwrap(), "ada@example.com");
        assert_eq!(doc.get_str("password").unwrap(), "hunter2");
        assert!(matches!(doc.get("created_at"), Some(Bson::DateTime(_))));
        assert!(!doc.contains_key("_id"));
    }

    #[test]
    fn round_trips_through_bson() {
        let user = User::new(
            "Grace".to_string(),
            "Hopper".to_string(),
            "grace@example.com".to_string(),
            "cobol".to_string(),
        );

        let doc = bson::to_document(&user).expect("Failed to serialize user");
        let decoded: User = bson::from_document(doc).expect("Failed to deserialize user");

        assert_eq!(decoded.email_address, "grace@example.com");
        assert_eq!(decoded.password, "cobol");
        // BSON datetimes carry millisecond precision
        assert_eq!(
            decoded.created_at.timestamp_millis(),
            user.created_at.timestamp_millis()
        );
    }
}
