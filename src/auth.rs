//! Operator authentication: password hashing and the users file.
//!
//! Credentials live in a small JSON file mapping usernames to an argon2
//! hash and a role; the `hash-password` CLI subcommand produces entries.
//! Session hardening (tokens, expiry) is out of scope; every login and
//! logout is audited instead.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};

/// One configured operator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub password_hash: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

/// The operator users file: username → entry
pub type Users = HashMap<String, UserEntry>;

/// Load the users file, failing loudly on malformed content
pub fn load_users(path: &Path) -> Result<Users> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read users file {}", path.display()))?;
    let users: Users = serde_json::from_str(&content)
        .with_context(|| format!("Malformed users file {}", path.display()))?;
    Ok(users)
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow!("Invalid password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Check a username/password pair against the users map.
/// Returns the role on success, None on unknown user or wrong password.
pub fn authenticate(users: &Users, username: &str, password: &str) -> Option<String> {
    let entry = users.get(username)?;
    match verify_password(password, &entry.password_hash) {
        Ok(true) => Some(entry.role.clone()),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_valid_hash() {
        let hash = hash_password("my-secure-password").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hash.len() > 50);
    }

    #[test]
    fn test_hash_password_different_each_time() {
        let hash1 = hash_password("same-password").unwrap();
        let hash2 = hash_password("same-password").unwrap();
        assert_ne!(hash1, hash2, "Hashes should differ due to random salt");
    }

    #[test]
    fn test_verify_password_correct() {
        let hash = hash_password("correct-password").unwrap();
        assert!(verify_password("correct-password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_incorrect() {
        let hash = hash_password("correct-password").unwrap();
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("any-password", "not-a-valid-hash");
        assert!(result.is_err());
    }

    fn users_with(username: &str, password: &str, role: &str) -> Users {
        let mut users = Users::new();
        users.insert(
            username.to_string(),
            UserEntry {
                password_hash: hash_password(password).unwrap(),
                role: role.to_string(),
            },
        );
        users
    }

    #[test]
    fn test_authenticate_known_user() {
        let users = users_with("mario", "segreto", "admin");
        assert_eq!(authenticate(&users, "mario", "segreto").as_deref(), Some("admin"));
    }

    #[test]
    fn test_authenticate_wrong_password() {
        let users = users_with("mario", "segreto", "admin");
        assert!(authenticate(&users, "mario", "sbagliato").is_none());
    }

    #[test]
    fn test_authenticate_unknown_user() {
        let users = users_with("mario", "segreto", "admin");
        assert!(authenticate(&users, "giulia", "segreto").is_none());
    }

    #[test]
    fn test_users_file_round_trip() {
        let users = users_with("mario", "segreto", "user");
        let json = serde_json::to_string(&users).unwrap();

        let dir = std::env::temp_dir().join("manutenza-users-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("users.json");
        std::fs::write(&path, &json).unwrap();

        let loaded = load_users(&path).unwrap();
        assert!(loaded.contains_key("mario"));
        assert_eq!(loaded["mario"].role, "user");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_role_defaults_to_user() {
        let json = r#"{"mario": {"passwordHash": "$argon2id$fake"}}"#;
        let users: Users = serde_json::from_str(json).unwrap();
        assert_eq!(users["mario"].role, "user");
    }
}
