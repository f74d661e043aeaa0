//! `Session`: bearer tokens with a fixed lifetime.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use concord_core::{Concept, ConceptError, Operation};
use rand::RngCore;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const SESSION_REQUIRED: &str = "Session required";

#[derive(Debug, Clone)]
struct SessionRow {
    user_id: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSession {
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenArgs {
    pub token: String,
}

/// `session` may be absent or null on unauthenticated requests.
#[derive(Debug, Deserialize)]
pub struct GetSessionUser {
    #[serde(default)]
    pub session: Value,
}

#[derive(Debug, Deserialize)]
pub struct EndAllUserSessions {
    #[serde(rename = "userID")]
    pub user_id: String,
}

pub struct Session {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionRow>>,
}

impl Session {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Lifetimes are capped at one hundred years.
    pub fn with_ttl_hours(hours: u64) -> Self {
        Self::new(Duration::hours(hours.min(876_000) as i64))
    }

    pub async fn create_session(&self, args: CreateSession) -> Result<String, ConceptError> {
        if args.user_id.is_empty() {
            return Err(ConceptError::InvalidArguments("Invalid user ID".into()));
        }
        let token = new_token();
        self.sessions.write().await.insert(
            token.clone(),
            SessionRow {
                user_id: args.user_id,
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(token)
    }

    /// The user behind a live token, if any. Expired tokens are evicted.
    pub async fn user_for(&self, token: &str) -> Option<String> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(row) if row.expires_at > now => return Some(row.user_id.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.sessions.write().await.remove(token);
        None
    }

    pub async fn validate_session(&self, args: TokenArgs) -> Result<String, ConceptError> {
        self.user_for(&args.token)
            .await
            .ok_or_else(|| ConceptError::Unauthorized("Invalid or expired session".into()))
    }

    pub async fn get_session_user(&self, args: GetSessionUser) -> Result<String, ConceptError> {
        let required = || ConceptError::Unauthorized(SESSION_REQUIRED.into());
        let token = args.session.as_str().filter(|t| !t.is_empty()).ok_or_else(required)?;
        self.user_for(token).await.ok_or_else(required)
    }

    pub async fn end_session(&self, args: TokenArgs) -> bool {
        self.sessions.write().await.remove(&args.token).is_some()
    }

    pub async fn end_all_user_sessions(&self, args: EndAllUserSessions) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, row| row.user_id != args.user_id);
        before - sessions.len()
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl Concept for Session {
    fn name(&self) -> &'static str {
        "Session"
    }

    fn operations(self: Arc<Self>) -> Vec<Operation> {
        vec![
            Operation::bound("createSession", &self, |c, a: CreateSession| async move {
                c.create_session(a).await.map(|token| json!({ "token": token }))
            })
            .accepts(["userID"])
            .returns(["token"]),
            Operation::bound("validateSession", &self, |c, a: TokenArgs| async move {
                c.validate_session(a).await.map(|id| json!({ "userID": id }))
            })
            .accepts(["token"])
            .returns(["userID"]),
            Operation::bound("getSessionUser", &self, |c, a: GetSessionUser| async move {
                c.get_session_user(a).await.map(|id| json!({ "userID": id }))
            })
            .accepts(["session"])
            .returns(["userID"]),
            Operation::bound("endSession", &self, |c, a: TokenArgs| async move {
                let success = c.end_session(a).await;
                Ok::<_, ConceptError>(json!({ "success": success }))
            })
            .accepts(["token"])
            .returns(["success"]),
            Operation::bound("endAllUserSessions", &self, |c, a: EndAllUserSessions| async move {
                let count = c.end_all_user_sessions(a).await;
                Ok::<_, ConceptError>(json!({ "count": count }))
            })
            .accepts(["userID"])
            .returns(["count"]),
        ]
    }
}
