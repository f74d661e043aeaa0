//! `Authentication`: account registration and credential checks.
//!
//! Credentials are kept as `sha256(salt || secret)` with a random per-account
//! salt, both base64 encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use concord_core::{Concept, ConceptError, Operation};
use rand::RngCore;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::user_account::{Credential, Directory, User};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    pub username: String,
    pub mit_kerberos: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(rename = "credential_data")]
    pub credential_data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCredentials {
    pub mit_kerberos: String,
    #[serde(rename = "credential_data")]
    pub credential_data: String,
}

pub struct Authentication {
    directory: Arc<RwLock<Directory>>,
}

impl Authentication {
    pub fn new(directory: Arc<RwLock<Directory>>) -> Self {
        Self { directory }
    }

    /// Create the account and its credential. Returns the new user id.
    pub async fn register_and_create_account(&self, args: Register) -> Result<String, ConceptError> {
        let username = args.username.trim().to_string();
        let kerberos = args.mit_kerberos.trim().to_ascii_lowercase();
        if username.is_empty() || kerberos.is_empty() {
            return Err(ConceptError::InvalidArguments(
                "username and mitKerberos are required".into(),
            ));
        }
        if args.credential_data.is_empty() {
            return Err(ConceptError::InvalidArguments("a password is required".into()));
        }

        let mut dir = self.directory.write().await;
        if dir.usernames.contains_key(&username) {
            return Err(ConceptError::Conflict(format!(
                "Username '{username}' already exists."
            )));
        }
        if dir.credentials.contains_key(&kerberos) {
            return Err(ConceptError::Conflict(format!(
                "Kerberos '{kerberos}' is already registered."
            )));
        }

        let user_id = Uuid::new_v4().to_string();
        let salt = new_salt();
        let digest = digest(&salt, &args.credential_data);
        dir.users.insert(
            user_id.clone(),
            User {
                user_id: user_id.clone(),
                username: username.clone(),
                mit_kerberos: kerberos.clone(),
                bio: args.bio.unwrap_or_default(),
                created_at: Utc::now(),
            },
        );
        dir.usernames.insert(username, user_id.clone());
        dir.credentials.insert(
            kerberos,
            Credential {
                user_id: user_id.clone(),
                salt,
                digest,
            },
        );
        tracing::debug!(user_id = %user_id, "account registered");
        Ok(user_id)
    }

    pub async fn verify_credentials(&self, args: VerifyCredentials) -> Result<String, ConceptError> {
        let kerberos = args.mit_kerberos.trim().to_ascii_lowercase();
        let dir = self.directory.read().await;
        match dir.credentials.get(&kerberos) {
            Some(cred) if digest(&cred.salt, &args.credential_data) == cred.digest => {
                Ok(cred.user_id.clone())
            }
            _ => Err(ConceptError::Unauthorized("invalid credentials".into())),
        }
    }
}

fn new_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

fn digest(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    STANDARD.encode(hasher.finalize())
}

impl Concept for Authentication {
    fn name(&self) -> &'static str {
        "Authentication"
    }

    fn operations(self: Arc<Self>) -> Vec<Operation> {
        vec![
            Operation::bound("registerAndCreateAccount", &self, |c, a: Register| async move {
                c.register_and_create_account(a)
                    .await
                    .map(|id| json!({ "userID": id }))
            })
            .accepts(["username", "mitKerberos", "bio", "credential_data"])
            .returns(["userID"]),
            Operation::bound("verifyCredentials", &self, |c, a: VerifyCredentials| async move {
                c.verify_credentials(a)
                    .await
                    .map(|id| json!({ "userID": id }))
            })
            .accepts(["mitKerberos", "credential_data"])
            .returns(["userID"]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, kerberos: &str, password: &str) -> Register {
        Register {
            username: username.into(),
            mit_kerberos: kerberos.into(),
            bio: None,
            credential_data: password.into(),
        }
    }

    #[tokio::test]
    async fn register_then_verify() {
        let auth = Authentication::new(Directory::shared());
        let id = auth
            .register_and_create_account(register("ada", "Ada", "pw"))
            .await
            .unwrap();
        let verified = auth
            .verify_credentials(VerifyCredentials {
                mit_kerberos: "ada".into(),
                credential_data: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(id, verified);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_rejected() {
        let auth = Authentication::new(Directory::shared());
        auth.register_and_create_account(register("ada", "ada", "pw"))
            .await
            .unwrap();
        for (kerberos, password) in [("ada", "nope"), ("bob", "pw")] {
            let err = auth
                .verify_credentials(VerifyCredentials {
                    mit_kerberos: kerberos.into(),
                    credential_data: password.into(),
                })
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "invalid credentials");
        }
    }

    #[tokio::test]
    async fn duplicates_are_conflicts() {
        let auth = Authentication::new(Directory::shared());
        auth.register_and_create_account(register("ada", "ada", "pw"))
            .await
            .unwrap();
        let same_name = auth
            .register_and_create_account(register("ada", "other", "pw"))
            .await
            .unwrap_err();
        assert_eq!(same_name.to_string(), "Username 'ada' already exists.");
        let same_kerberos = auth
            .register_and_create_account(register("ada2", "ADA", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(same_kerberos, ConceptError::Conflict(_)));
    }

    #[test]
    fn digests_depend_on_salt() {
        assert_eq!(digest("s", "pw"), digest("s", "pw"));
        assert_ne!(digest("s1", "pw"), digest("s2", "pw"));
        assert_ne!(new_salt(), new_salt());
    }
}
