//! Shared pieces of the synchronization modules: response sanitizers, the
//! template administrator check, and the request/session rule shapes every
//! protected route repeats.

use concord_core::{Config, Frame, Invocation, Pattern, SyncRule, Value, Var};
use serde_json::{json, Map};
use std::collections::BTreeSet;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Sanitizers
// ---------------------------------------------------------------------------

const USER_FIELDS: &[&str] = &["userID", "username", "mitKerberos", "bio", "createdAt"];
const POST_FIELDS: &[&str] = &[
    "postID",
    "authorID",
    "templateID",
    "title",
    "description",
    "imageURL",
    "createdAt",
];

fn project(value: &Value, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .map(|f| {
            let v = value.get(*f).cloned().unwrap_or(Value::Null);
            (f.to_string(), v)
        })
        .collect()
}

/// The public shape of a user record.
pub fn sanitize_user(user: &Value) -> Value {
    Value::Object(project(user, USER_FIELDS))
}

/// The public shape of a post. Posts enriched with their template also carry
/// `dormName` and `roomType`, defaulting to empty strings.
pub fn sanitize_post(post: &Value) -> Value {
    let mut out = project(post, POST_FIELDS);
    if post.get("dormName").is_some() || post.get("roomType").is_some() {
        for field in ["dormName", "roomType"] {
            let v = post
                .get(field)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| json!(""));
            out.insert(field.to_string(), v);
        }
    }
    Value::Object(out)
}

// ---------------------------------------------------------------------------
// Template administrators
// ---------------------------------------------------------------------------

/// Kerberos names allowed to manage room templates. Empty means everyone.
#[derive(Debug, Clone, Default)]
pub struct TemplateAdmins(Arc<BTreeSet<String>>);

impl TemplateAdmins {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(Arc::new(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_ascii_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        ))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.access.template_admins)
    }

    pub fn allows(&self, kerberos: &str) -> bool {
        self.0.is_empty() || self.0.contains(&kerberos.to_ascii_lowercase())
    }
}

/// `user` is a user record as returned by `UserAccount.getUser`.
pub fn is_template_admin(user: &Value, admins: &TemplateAdmins) -> bool {
    user.get("mitKerberos")
        .and_then(Value::as_str)
        .is_some_and(|k| admins.allows(k))
}

// ---------------------------------------------------------------------------
// Rule shapes
// ---------------------------------------------------------------------------

/// `Requesting.request` on `path`, binding the minted request id.
pub fn request_to(path: &'static str, request: Var) -> Pattern {
    Pattern::new("Requesting", "request")
        .input("path", path)
        .output_var(request)
}

/// `respond { request, success: false, error }`.
pub fn respond_error(request: Var, error: Var) -> Invocation {
    Invocation::new("Requesting", "respond")
        .arg_var(request)
        .arg("success", false)
        .arg_var(error)
}

/// Resolve the caller of a protected route from its session token.
pub fn authenticate(name: &str, path: &'static str) -> SyncRule {
    SyncRule::declare(|v| {
        let [request, session, user_id] = v.vars(["request", "session", "userID"]);
        SyncRule::new(name)
            .when(request_to(path, request).input_var(session))
            .then(
                Invocation::new("Session", "getSessionUser")
                    .arg_var(session)
                    .bind_var(user_id),
            )
    })
}

/// Answer a protected route whose session did not resolve.
pub fn session_required(name: &str, path: &'static str) -> SyncRule {
    SyncRule::declare(|v| {
        let [request, error] = v.vars(["request", "error"]);
        SyncRule::new(name)
            .when(request_to(path, request))
            .when(Pattern::new("Session", "getSessionUser").error(error))
            .then(respond_error(request, error))
    })
}

/// Answer `path` with the error message of a failed `concept.operation`.
pub fn respond_failure(
    name: &str,
    path: &'static str,
    concept: &'static str,
    operation: &'static str,
) -> SyncRule {
    SyncRule::declare(|v| {
        let [request, error] = v.vars(["request", "error"]);
        SyncRule::new(name)
            .when(request_to(path, request))
            .when(Pattern::new(concept, operation).error(error))
            .then(respond_error(request, error))
    })
}

/// Answer `path` with a fixed error when `concept.operation` reports
/// `success: false`.
pub fn respond_refused(
    name: &str,
    path: &'static str,
    concept: &'static str,
    operation: &'static str,
    field: &'static str,
    message: &'static str,
) -> SyncRule {
    SyncRule::declare(|v| {
        let [request, error] = v.vars(["request", "error"]);
        SyncRule::new(name)
            .when(request_to(path, request))
            .when(Pattern::new(concept, operation).output(field, false))
            .filter_map([error], move |f| Some(f.with(error, message)))
            .then(respond_error(request, error))
    })
}

/// Replace the binding of `var` with `f` applied to it; frames without a
/// binding are dropped.
pub fn reshape(frame: Frame, var: Var, f: impl Fn(&Value) -> Value) -> Option<Frame> {
    let value = f(frame.get(var)?);
    Some(frame.with(var, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_user_whitelists_fields() {
        let user = json!({
            "userID": "u1",
            "username": "ada",
            "mitKerberos": "ada",
            "bio": "",
            "createdAt": "2024-01-01T00:00:00Z",
            "salt": "secret",
        });
        let clean = sanitize_user(&user);
        assert!(clean.get("salt").is_none());
        assert_eq!(clean["username"], "ada");
    }

    #[test]
    fn sanitize_post_adds_template_fields_only_when_present() {
        let plain = sanitize_post(&json!({ "postID": "p1", "title": "Loft" }));
        assert!(plain.get("dormName").is_none());
        assert_eq!(plain["description"], Value::Null);

        let enriched = sanitize_post(&json!({ "postID": "p1", "dormName": "Baker" }));
        assert_eq!(enriched["dormName"], "Baker");
        assert_eq!(enriched["roomType"], "");
    }

    #[test]
    fn empty_admin_list_allows_everyone() {
        let user = json!({ "mitKerberos": "Bob" });
        assert!(is_template_admin(&user, &TemplateAdmins::default()));
        let admins = TemplateAdmins::new(["ALICE", " "]);
        assert!(!is_template_admin(&user, &admins));
        assert!(is_template_admin(&json!({ "mitKerberos": "alice" }), &admins));
        assert!(!is_template_admin(&json!({}), &admins));
    }
}
