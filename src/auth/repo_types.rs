use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Not serializable on purpose: the only
/// outward representation is `dto::PublicUser`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,                   // immutable, generated at insert
    pub identity: String,           // login email, unique, stored lowercase
    pub password: String,           // Argon2 PHC string over plaintext||salt
    pub salt: Vec<u8>,              // 16 random bytes, fixed per credential
    pub status: UserStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Enabled,
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(UserStatus::Enabled).expect("serialize"),
            serde_json::json!("enabled")
        );
        assert_eq!(
            serde_json::to_value(UserStatus::Disabled).expect("serialize"),
            serde_json::json!("disabled")
        );
    }
}
