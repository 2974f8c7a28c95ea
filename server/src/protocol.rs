use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use statecast_shared::{ClientId, Delta, InputSequence, Value};

/// A packet from a peer. Any combination of fields may be present; the
/// server handles them in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientMessage {
    /// Identity announcement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stored as received, never interpreted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<BTreeMap<String, Value>>,
    /// Asks for the full shared state and to join the session
    #[serde(skip_serializing_if = "is_false")]
    pub data_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_stream: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<InputSequence>,
    /// Partial update of the peer's home state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Delta>,
    /// Full update of the peer's home state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<Delta>,
}

/// A packet to a peer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ClientId>,
    #[serde(rename = "peer_connected", skip_serializing_if = "Option::is_none")]
    pub peer_connected: Option<ClientId>,
    #[serde(rename = "peer_joined", skip_serializing_if = "Option::is_none")]
    pub peer_joined: Option<ClientId>,
    #[serde(rename = "peer_disconnected", skip_serializing_if = "Option::is_none")]
    pub peer_disconnected: Option<ClientId>,
    #[serde(skip_serializing_if = "is_false")]
    pub full: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub version_ack: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<Delta>,
    #[serde(skip_serializing_if = "is_false")]
    pub join_ack: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_ack: Option<InputSequence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Delta>,
}

impl ServerMessage {
    pub fn id(id: ClientId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn peer_connected(id: ClientId) -> Self {
        Self {
            peer_connected: Some(id),
            ..Self::default()
        }
    }

    pub fn peer_joined(id: ClientId) -> Self {
        Self {
            peer_joined: Some(id),
            ..Self::default()
        }
    }

    pub fn peer_disconnected(id: ClientId) -> Self {
        Self {
            peer_disconnected: Some(id),
            ..Self::default()
        }
    }

    pub fn full(warning: &str) -> Self {
        Self {
            full: true,
            warning: Some(warning.to_string()),
            ..Self::default()
        }
    }

    pub fn warning(warning: &str) -> Self {
        Self {
            warning: Some(warning.to_string()),
            ..Self::default()
        }
    }

    pub fn version_ack() -> Self {
        Self {
            version_ack: true,
            ..Self::default()
        }
    }

    pub fn join_ack(exact: Option<Delta>) -> Self {
        Self {
            exact,
            join_ack: true,
            ..Self::default()
        }
    }

    pub fn input_ack(seq: InputSequence) -> Self {
        Self {
            input_ack: Some(seq),
            ..Self::default()
        }
    }

    pub fn message(message: Value) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }

    pub fn diff(diff: Delta) -> Self {
        Self {
            diff: Some(diff),
            ..Self::default()
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
