use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password;
use crate::auth::repo_types::{User, UserStatus};

/// Outcome of an insert attempt, keyed on the identity uniqueness index.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(User),
    IdentityTaken,
}

impl User {
    /// Find a user by identity (exact match). Absence is not an error.
    pub async fn find_by_identity(db: &PgPool, identity: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, identity, password, salt, status, created_at, updated_at
            FROM users
            WHERE identity = $1
            "#,
        )
        .bind(identity)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with a freshly salted password hash. A concurrent
    /// insert of the same identity is resolved here, not by a pre-check:
    /// the unique index rejects the loser and we report `IdentityTaken`.
    pub async fn create(
        db: &PgPool,
        identity: &str,
        plain_password: &str,
        status: UserStatus,
    ) -> anyhow::Result<CreateOutcome> {
        let salt = password::generate_salt();
        let hash = password::hash_password(plain_password, &salt)?;
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, identity, password, salt, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, identity, password, salt, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(identity)
        .bind(&hash)
        .bind(salt.as_slice())
        .bind(status)
        .fetch_one(db)
        .await;

        match res {
            Ok(user) => Ok(CreateOutcome::Created(user)),
            Err(e) if is_unique_violation(&e) => Ok(CreateOutcome::IdentityTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Rehash and store a new password, keeping the user's stored salt.
    pub async fn reset_password(
        db: &PgPool,
        id: Uuid,
        new_plain: &str,
        salt: &[u8],
    ) -> anyhow::Result<u64> {
        let hash = password::hash_password(new_plain, salt)?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&hash)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Check a candidate plaintext against this record's salted hash.
    pub fn verify_password(&self, candidate: &str) -> anyhow::Result<bool> {
        password::verify_password(candidate, &self.salt, &self.password)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;
    use time::OffsetDateTime;

    #[test]
    fn user_verify_password_checks_salted_hash() {
        let salt = password::generate_salt();
        let hash = password::hash_password("pa55word", &salt).expect("hash");
        let user = User {
            id: Uuid::new_v4(),
            identity: "alice@example.com".into(),
            password: hash,
            salt: salt.to_vec(),
            status: UserStatus::Enabled,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        assert!(user.verify_password("pa55word").expect("verify"));
        assert!(!user.verify_password("wrong").expect("verify"));
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23503"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }
}
