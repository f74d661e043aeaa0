//! `UserAccount`: public profile data. Accounts are created by
//! `Authentication`, which shares the same [`Directory`].

use chrono::{DateTime, Utc};
use concord_core::{Concept, ConceptError, Operation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: String,
    pub mit_kerberos: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

/// Salted credential digest for one account.
#[derive(Debug, Clone)]
pub(crate) struct Credential {
    pub user_id: String,
    pub salt: String,
    pub digest: String,
}

/// Account records shared by `UserAccount` and `Authentication`.
#[derive(Debug, Default)]
pub struct Directory {
    pub(crate) users: HashMap<String, User>,
    /// username → userID
    pub(crate) usernames: HashMap<String, String>,
    /// kerberos (lowercase) → credential
    pub(crate) credentials: HashMap<String, Credential>,
}

impl Directory {
    pub fn shared() -> Arc<RwLock<Directory>> {
        Arc::new(RwLock::new(Directory::default()))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GetUser {
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GetUserByUsername {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserProfile {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub bio: String,
}

// ---------------------------------------------------------------------------
// UserAccount
// ---------------------------------------------------------------------------

pub struct UserAccount {
    directory: Arc<RwLock<Directory>>,
}

impl UserAccount {
    pub fn new(directory: Arc<RwLock<Directory>>) -> Self {
        Self { directory }
    }

    pub async fn get_user(&self, args: GetUser) -> Result<User, ConceptError> {
        let dir = self.directory.read().await;
        dir.users
            .get(&args.user_id)
            .cloned()
            .ok_or_else(|| ConceptError::NotFound("User not found".into()))
    }

    pub async fn get_user_by_username(&self, args: GetUserByUsername) -> Result<User, ConceptError> {
        let dir = self.directory.read().await;
        dir.usernames
            .get(&args.username)
            .and_then(|id| dir.users.get(id))
            .cloned()
            .ok_or_else(|| ConceptError::NotFound("User not found".into()))
    }

    /// `false` when the account does not exist.
    pub async fn update_user_profile(&self, args: UpdateUserProfile) -> bool {
        let mut dir = self.directory.write().await;
        match dir.users.get_mut(&args.user_id) {
            Some(user) => {
                user.bio = args.bio;
                true
            }
            None => false,
        }
    }
}

impl Concept for UserAccount {
    fn name(&self) -> &'static str {
        "UserAccount"
    }

    fn operations(self: Arc<Self>) -> Vec<Operation> {
        vec![
            Operation::bound("getUser", &self, |c, a: GetUser| async move {
                c.get_user(a).await.map(|user| json!({ "user": user }))
            })
            .accepts(["userID"])
            .returns(["user"]),
            Operation::bound("getUserByUsername", &self, |c, a: GetUserByUsername| async move {
                c.get_user_by_username(a)
                    .await
                    .map(|user| json!({ "user": user }))
            })
            .accepts(["username"])
            .returns(["user"]),
            Operation::bound("updateUserProfile", &self, |c, a: UpdateUserProfile| async move {
                let success = c.update_user_profile(a).await;
                Ok::<_, ConceptError>(json!({ "success": success }))
            })
            .accepts(["userID", "bio"])
            .returns(["success"]),
        ]
    }
}
