use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};
use tracing::error;

pub const SALT_BYTES: usize = 16;

/// Fresh per-credential salt, appended to the plaintext before hashing.
pub fn generate_salt() -> [u8; SALT_BYTES] {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    salt
}

fn salted(plain: &str, salt: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(plain.len() + salt.len());
    input.extend_from_slice(plain.as_bytes());
    input.extend_from_slice(salt);
    input
}

pub fn hash_password(plain: &str, salt: &[u8]) -> anyhow::Result<String> {
    let phc_salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(&salted(plain, salt), &phc_salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, salt: &[u8], hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(&salted(plain, salt), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let salt = generate_salt();
        let hash = hash_password(password, &salt).expect("hashing should succeed");
        assert!(verify_password(password, &salt, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let salt = generate_salt();
        let hash = hash_password(password, &salt).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &salt, &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_rejects_wrong_salt() {
        let password = "correct-horse-battery-staple";
        let salt = generate_salt();
        let other_salt = generate_salt();
        let hash = hash_password(password, &salt).expect("hashing should succeed");
        assert!(!verify_password(password, &other_salt, &hash).expect("verify should not error"));
    }

    #[test]
    fn rehash_with_same_salt_differs_but_verifies() {
        // Reset keeps the stored salt; the PHC hash still embeds its own
        // fresh internal salt, so the stored string must change.
        let password = "Secur3P@ssw0rd!";
        let salt = generate_salt();
        let first = hash_password(password, &salt).expect("hashing should succeed");
        let second = hash_password(password, &salt).expect("hashing should succeed");
        assert_ne!(first, second);
        assert!(verify_password(password, &salt, &first).expect("verify should succeed"));
        assert!(verify_password(password, &salt, &second).expect("verify should succeed"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let salt = generate_salt();
        let err = verify_password("anything", &salt, "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn generate_salt_is_fixed_length_and_random() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), SALT_BYTES);
        assert_ne!(a, b);
    }
}
