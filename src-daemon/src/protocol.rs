//! JSON-lines protocol
//!
//! Each input line is an RPC request (has `action`), a browser event, or a
//! host control message (both have `type`). Each RPC request produces exactly
//! one output line.

use serde::Deserialize;

use navtrail_core::{ActivitySignal, LiveTab, RpcRequest};

/// Messages about the host's state rather than user activity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Control {
    /// Every tab the browser has open right now.
    TabsSnapshot { tabs: Vec<LiveTab> },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Request(RpcRequest),
    Event(ActivitySignal),
    Control(Control),
}

pub fn parse_line(line: &str) -> Option<Result<Inbound, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line))
}
