use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{User, UserStatus};

/// Request body for the signup and forget-password confirmation endpoints.
#[derive(Debug, Deserialize)]
pub struct ConfirmationRequest {
    pub email: String,
    #[serde(rename = "verifyPageURL")]
    pub verify_page_url: String,
    #[serde(rename = "continue")]
    pub continuation: Option<String>,
}

/// Query string carrying a confirmation token.
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

/// Request body for completing signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub token: String,
    pub password: String,
}

/// Request body for setting a new password after a reset confirmation.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub token: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identity: String,
    pub password: String,
}

/// Response carrying a freshly issued confirmation token.
#[derive(Debug, Serialize)]
pub struct ConfirmationResponse {
    pub token: String,
}

/// Claims echoed back by the tokeninfo endpoints.
#[derive(Debug, Serialize)]
pub struct TokenInfoResponse {
    pub email: String,
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

/// Public part of the user returned to the client. Password and salt have
/// no field here, so they cannot leak.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub identity: String,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            identity: user.identity,
            status: user.status,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            identity: "alice@example.com".into(),
            password: "$argon2id$fake".into(),
            salt: vec![0u8; 16],
            status: UserStatus::Enabled,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn public_user_serializes_camel_case_without_credentials() {
        let value = serde_json::to_value(PublicUser::from(sample_user())).expect("serialize");
        assert!(value.get("id").is_some());
        assert_eq!(value["identity"], "alice@example.com");
        assert_eq!(value["status"], "enabled");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("password").is_none());
        assert!(value.get("salt").is_none());

        let created_at = value["createdAt"].as_str().expect("string timestamp");
        assert!(OffsetDateTime::parse(created_at, &Rfc3339).is_ok());
    }

    #[test]
    fn confirmation_request_accepts_wire_field_names() {
        let req: ConfirmationRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com",
            "verifyPageURL": "https://app.example.com/verify",
            "continue": "https://app.example.com/welcome"
        }))
        .expect("deserialize");
        assert_eq!(req.email, "alice@example.com");
        assert_eq!(req.verify_page_url, "https://app.example.com/verify");
        assert_eq!(
            req.continuation.as_deref(),
            Some("https://app.example.com/welcome")
        );

        let req: ConfirmationRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com",
            "verifyPageURL": "https://app.example.com/verify"
        }))
        .expect("deserialize without continue");
        assert!(req.continuation.is_none());
    }

    #[test]
    fn token_info_response_omits_absent_continuation() {
        let value = serde_json::to_value(TokenInfoResponse {
            email: "alice@example.com".into(),
            continuation: None,
        })
        .expect("serialize");
        assert!(value.get("continue").is_none());

        let value = serde_json::to_value(TokenInfoResponse {
            email: "alice@example.com".into(),
            continuation: Some("https://app.example.com/welcome".into()),
        })
        .expect("serialize");
        assert_eq!(value["continue"], "https://app.example.com/welcome");
    }
}
