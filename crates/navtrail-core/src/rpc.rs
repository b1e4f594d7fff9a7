//! RPC dispatch
//!
//! Requests name an action and carry a JSON payload plus a correlation id.
//! Every response echoes the id and the action.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use navtrail_graph::SessionUpdate;
use navtrail_session::{ActivityOutcome, CreateSessionOptions, SettingsUpdate};

use crate::error::{CoreError, ErrorCode};
use crate::tracker::Tracker;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcResponse {
    pub id: Value,
    pub action: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    /// Machine-readable kind of `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    /// Wait before retrying, set for `cooldown` errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
}

impl RpcResponse {
    pub fn ok(request: &RpcRequest, data: Value) -> Self {
        Self {
            id: request.id.clone(),
            action: request.action.clone(),
            success: true,
            data: Some(data),
            error: None,
            code: None,
            remaining_ms: None,
        }
    }

    pub fn err(request: &RpcRequest, error: &CoreError) -> Self {
        Self {
            id: request.id.clone(),
            action: request.action.clone(),
            success: false,
            data: None,
            error: Some(error.to_string()),
            code: Some(error.code()),
            remaining_ms: error.remaining_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetSessions,
    CreateSession,
    UpdateSession,
    EndSession,
    SetCurrentSession,
    GetCurrentSession,
    GetLatestSession,
    SetLatestSession,
    SyncCurrentToLatest,
    SyncLatestToCurrent,
    DeleteSession,
    GetSessionStats,
    MarkSessionActivity,
    GetSessionGraph,
    GetSessionDetails,
    GetSettings,
    UpdateSettings,
}

impl Action {
    pub const ALL: [Action; 17] = [
        Action::GetSessions,
        Action::CreateSession,
        Action::UpdateSession,
        Action::EndSession,
        Action::SetCurrentSession,
        Action::GetCurrentSession,
        Action::GetLatestSession,
        Action::SetLatestSession,
        Action::SyncCurrentToLatest,
        Action::SyncLatestToCurrent,
        Action::DeleteSession,
        Action::GetSessionStats,
        Action::MarkSessionActivity,
        Action::GetSessionGraph,
        Action::GetSessionDetails,
        Action::GetSettings,
        Action::UpdateSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetSessions => "getSessions",
            Action::CreateSession => "createSession",
            Action::UpdateSession => "updateSession",
            Action::EndSession => "endSession",
            Action::SetCurrentSession => "setCurrentSession",
            Action::GetCurrentSession => "getCurrentSession",
            Action::GetLatestSession => "getLatestSession",
            Action::SetLatestSession => "setLatestSession",
            Action::SyncCurrentToLatest => "syncCurrentToLatest",
            Action::SyncLatestToCurrent => "syncLatestToCurrent",
            Action::DeleteSession => "deleteSession",
            Action::GetSessionStats => "getSessionStats",
            Action::MarkSessionActivity => "markSessionActivity",
            Action::GetSessionGraph => "getSessionGraph",
            Action::GetSessionDetails => "getSessionDetails",
            Action::GetSettings => "getSettings",
            Action::UpdateSettings => "updateSettings",
        }
    }

    /// Whether the reply waits on storage. Synchronous actions answer from
    /// memory and a host can close its reply channel right away.
    pub fn is_async(&self) -> bool {
        !matches!(self, Action::MarkSessionActivity | Action::GetSettings)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| CoreError::InvalidRequest(format!("unknown action: {s}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionIdPayload {
    session_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OptionalSessionIdPayload {
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSessionPayload {
    session_id: String,
    #[serde(default)]
    updates: SessionUpdate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteSessionPayload {
    session_id: String,
    #[serde(default)]
    confirm: bool,
}

/// Decode a payload; `null` reads as an empty object.
fn payload<T: DeserializeOwned>(value: &Value) -> Result<T> {
    let value = if value.is_null() { json!({}) } else { value.clone() };
    serde_json::from_value(value)
        .map_err(|e| CoreError::InvalidRequest(format!("malformed payload: {e}")))
}

fn to_data<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Run one request against the tracker. Never fails; errors become
/// `success: false` responses.
pub fn dispatch(tracker: &Tracker, request: &RpcRequest) -> RpcResponse {
    let action = match request.action.parse::<Action>() {
        Ok(action) => action,
        Err(e) => return RpcResponse::err(request, &e),
    };

    match handle(tracker, action, &request.payload) {
        Ok(data) => RpcResponse::ok(request, data),
        Err(e) => {
            tracing::warn!(action = %action, error = %e, "RPC request failed");
            RpcResponse::err(request, &e)
        }
    }
}

fn handle(tracker: &Tracker, action: Action, body: &Value) -> Result<Value> {
    let manager = tracker.session_manager();

    match action {
        Action::GetSessions => to_data(manager.sessions()?),
        Action::CreateSession => {
            let options: CreateSessionOptions = payload(body)?;
            to_data(manager.create_session(options)?)
        }
        Action::UpdateSession => {
            let p: UpdateSessionPayload = payload(body)?;
            to_data(manager.update_session(&p.session_id, &p.updates)?)
        }
        Action::EndSession => {
            let p: SessionIdPayload = payload(body)?;
            to_data(manager.end_session(&p.session_id)?)
        }
        Action::SetCurrentSession => {
            let p: OptionalSessionIdPayload = payload(body)?;
            to_data(manager.set_current_session(p.session_id.as_deref())?)
        }
        Action::GetCurrentSession => to_data(manager.current_session()),
        Action::GetLatestSession => to_data(manager.latest_session()),
        Action::SetLatestSession => {
            let p: OptionalSessionIdPayload = payload(body)?;
            to_data(manager.set_latest_session(p.session_id.as_deref())?)
        }
        Action::SyncCurrentToLatest => to_data(manager.sync_current_to_latest()?),
        Action::SyncLatestToCurrent => to_data(manager.sync_latest_to_current()?),
        Action::DeleteSession => {
            let p: DeleteSessionPayload = payload(body)?;
            if !p.confirm {
                return Err(CoreError::InvalidRequest(
                    "deleteSession requires confirm: true".into(),
                ));
            }
            to_data(manager.delete_session(&p.session_id)?)
        }
        Action::GetSessionStats => to_data(manager.session_stats()),
        Action::MarkSessionActivity => {
            let outcome = tracker.activity_monitor().record_activity()?;
            Ok(activity_json(outcome))
        }
        Action::GetSessionGraph => {
            let p: SessionIdPayload = payload(body)?;
            to_data(manager.session_graph(&p.session_id)?)
        }
        Action::GetSessionDetails => {
            let p: SessionIdPayload = payload(body)?;
            to_data(manager.session_details(&p.session_id)?)
        }
        Action::GetSettings => to_data(tracker.settings().get()),
        Action::UpdateSettings => {
            let update: SettingsUpdate = payload(body)?;
            to_data(tracker.settings().update(&update)?)
        }
    }
}

fn activity_json(outcome: Option<ActivityOutcome>) -> Value {
    match outcome {
        None => json!({ "status": "debounced" }),
        Some(ActivityOutcome::Continued { session_id }) => {
            json!({ "status": "continued", "sessionId": session_id })
        }
        Some(ActivityOutcome::Rotated { ended, created }) => json!({
            "status": "rotated",
            "endedSessionId": ended,
            "sessionId": created.id,
        }),
        Some(ActivityOutcome::Deferred) => json!({ "status": "deferred" }),
    }
}
