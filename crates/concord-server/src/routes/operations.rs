use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Method};
use axum::Json;
use concord_core::{Outcome, Record, Value};
use std::collections::HashMap;

use crate::error::AppError;
use crate::requesting::REQUESTING;
use crate::route_table::RouteKind;
use crate::state::AppState;

/// GET|POST {base}/{concept}/{operation}
///
/// Excluded paths become a `Requesting.request` and wait for the matching
/// `respond`. Everything else calls the operation directly.
pub async fn call_operation(
    State(app): State<AppState>,
    Path((concept, operation)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if concept == REQUESTING {
        return Err(AppError::not_found(format!(
            "no operation '{concept}.{operation}' is registered"
        )));
    }

    let mut inputs: Record = if method == Method::GET {
        query
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    } else {
        parse_body(&body)?
    };
    if !inputs.contains_key("session") {
        if let Some(token) = session_token(&headers) {
            inputs.insert("session".into(), Value::String(token));
        }
    }

    let path = format!("{concept}/{operation}");
    match app.routes.classify(&path) {
        RouteKind::Excluded => {
            inputs.insert("method".into(), Value::String(method.to_string()));
            inputs.insert("path".into(), Value::String(format!("/{path}")));
            through_syncs(&app, inputs).await
        }
        kind => {
            tracing::debug!(%path, %kind, "direct call");
            let summary = app.engine.invoke(&concept, &operation, inputs).await?;
            match summary.outcome() {
                Some(Outcome::Ok { outputs }) => Ok(Json(Value::Object(outputs.clone()))),
                Some(Outcome::Err { error }) => Err(AppError::bad_request(error.clone())),
                None => Err(AppError(anyhow::anyhow!("flow {} has no root", summary.flow))),
            }
        }
    }
}

async fn through_syncs(app: &AppState, inputs: Record) -> Result<Json<Value>, AppError> {
    let flow = app.engine.begin(REQUESTING, "request", inputs).await?;
    let request = flow
        .root()
        .and_then(|r| r.output("request"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| AppError(anyhow::anyhow!("request was not assigned an id")))?;
    // Dropping the waiter on any exit, including a client disconnect that
    // cancels this future, releases the pending request.
    let mut waiter = app
        .requesting
        .subscribe(&request)
        .await
        .ok_or_else(|| AppError(anyhow::anyhow!("request {request} has no waiter")))?;

    tokio::spawn(async move {
        if let Err(e) = flow.settle().await {
            tracing::error!(error = %e, "flow failed");
        }
    });

    match tokio::time::timeout(app.response_timeout, waiter.recv()).await {
        Ok(Ok(payload)) => Ok(Json(Value::Object(payload))),
        Ok(Err(_)) => Err(AppError(anyhow::anyhow!(
            "request {request} was dropped before a response"
        ))),
        Err(_) => {
            tracing::warn!(%request, "no synchronization responded in time");
            Err(AppError::timeout(format!(
                "no response within {} ms",
                app.response_timeout.as_millis()
            )))
        }
    }
}

fn parse_body(body: &[u8]) -> Result<Record, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Record::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::bad_request("request body must be a JSON object")),
        Err(e) => Err(AppError::bad_request(format!("invalid JSON body: {e}"))),
    }
}

/// `Authorization: Bearer <token>` or `X-Session-Token: <token>`.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let explicit = headers.get("x-session-token").and_then(|v| v.to_str().ok());
    bearer
        .or(explicit)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn empty_body_is_an_empty_record() {
        assert!(parse_body(b"").unwrap().is_empty());
        assert!(parse_body(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(parse_body(b"[1, 2]").is_err());
        assert!(parse_body(b"{oops").is_err());
        assert_eq!(parse_body(br#"{"a": 1}"#).unwrap()["a"], 1);
    }

    #[test]
    fn session_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert("x-session-token", HeaderValue::from_static("abc"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }
}
