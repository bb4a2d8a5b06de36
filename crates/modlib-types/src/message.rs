//! # Wire Messages
//!
//! Every message exchanged with the host is a JSON object carrying a `type`
//! discriminator. Field names are part of the interoperability contract and
//! are reproduced exactly (`handlerId`, `isResult`, `contentType`).
//!
//! | type | direction | required fields |
//! |---|---|---|
//! | register | out | payload: {routes?, commands} |
//! | log | out | level, message |
//! | init | in | (arbitrary init payload) |
//! | invoke | in | handlerId, payload |
//! | response | out | id, payload, contentType? |
//! | intermoduleMessage | out/in | id, to?/from, isResult, payload |
//! | mpcRequest | in | id, payload:{command, params} |
//! | mpcResponse | in | id, payload |
//! | databaseQuery | out | id, payload(sql) |
//! | databaseResult / databaseError | in | id, payload |

use crate::correlation::CorrelationId;
use crate::errors::CodecError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fields of an `init` message with the `type` tag removed.
pub type InitPayload = Map<String, Value>;

/// A message on the module <-> host channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Module definition announced to the host.
    Register { payload: ModuleDefinition },

    /// Host-side log line.
    Log { level: LogLevel, message: String },

    /// Module loaded; carries whatever the host chose to send.
    Init(InitPayload),

    /// Host asks the module to run a registered route/command.
    Invoke(InvokeRequest),

    /// Reply to an earlier `invoke`.
    #[serde(rename_all = "camelCase")]
    Response {
        id: CorrelationId,
        #[serde(default)]
        payload: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },

    /// Module-to-module traffic routed by the host. Outbound requests carry
    /// `to`, replies to an `mpcRequest` carry `isResult: true`.
    #[serde(rename_all = "camelCase")]
    IntermoduleMessage {
        id: CorrelationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default)]
        is_result: bool,
        #[serde(default)]
        payload: Value,
    },

    /// Another module invokes a command on this one.
    MpcRequest { id: CorrelationId, payload: MpcCall },

    /// Result of an `mpc()` call issued by this module.
    MpcResponse {
        id: CorrelationId,
        #[serde(default)]
        payload: Value,
    },

    /// SQL submitted to the host database.
    DatabaseQuery { id: CorrelationId, payload: String },

    /// Successful query result.
    DatabaseResult {
        id: CorrelationId,
        #[serde(default)]
        payload: Value,
    },

    /// Failed query.
    DatabaseError {
        id: CorrelationId,
        #[serde(default)]
        payload: Value,
    },

    /// Any `type` this library does not understand.
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Build a `log` message.
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Build a `register` message.
    pub fn register(definition: ModuleDefinition) -> Self {
        Self::Register {
            payload: definition,
        }
    }

    /// Build an outbound inter-module request.
    pub fn mpc_call(id: CorrelationId, target: impl Into<String>, call: &MpcCall) -> Self {
        Self::IntermoduleMessage {
            id,
            to: Some(target.into()),
            from: None,
            is_result: false,
            payload: serde_json::json!({
                "command": call.command,
                "params": call.params,
            }),
        }
    }

    /// Build the reply to an inbound `mpcRequest`.
    pub fn mpc_result(id: CorrelationId, result: Value) -> Self {
        Self::IntermoduleMessage {
            id,
            to: None,
            from: None,
            is_result: true,
            payload: serde_json::json!({ "result": result }),
        }
    }

    /// Build an error reply to an inbound `mpcRequest`.
    pub fn mpc_error(id: CorrelationId, error: impl Into<String>) -> Self {
        Self::IntermoduleMessage {
            id,
            to: None,
            from: None,
            is_result: true,
            payload: serde_json::json!({ "error": error.into() }),
        }
    }

    /// Build a `response` to an `invoke`.
    pub fn response(id: CorrelationId, payload: Value, content_type: Option<String>) -> Self {
        Self::Response {
            id,
            payload,
            content_type,
        }
    }

    /// Build a `databaseQuery`.
    pub fn database_query(id: CorrelationId, sql: impl Into<String>) -> Self {
        Self::DatabaseQuery {
            id,
            payload: sql.into(),
        }
    }

    /// The wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Log { .. } => "log",
            Self::Init(_) => "init",
            Self::Invoke(_) => "invoke",
            Self::Response { .. } => "response",
            Self::IntermoduleMessage { .. } => "intermoduleMessage",
            Self::MpcRequest { .. } => "mpcRequest",
            Self::MpcResponse { .. } => "mpcResponse",
            Self::DatabaseQuery { .. } => "databaseQuery",
            Self::DatabaseResult { .. } => "databaseResult",
            Self::DatabaseError { .. } => "databaseError",
            Self::Unknown => "unknown",
        }
    }

    /// Correlation id of correlation-bearing variants.
    pub fn id(&self) -> Option<&CorrelationId> {
        match self {
            Self::Response { id, .. }
            | Self::IntermoduleMessage { id, .. }
            | Self::MpcRequest { id, .. }
            | Self::MpcResponse { id, .. }
            | Self::DatabaseQuery { id, .. }
            | Self::DatabaseResult { id, .. }
            | Self::DatabaseError { id, .. } => Some(id),
            Self::Invoke(request) => request.id.as_ref(),
            Self::Register { .. } | Self::Log { .. } | Self::Init(_) | Self::Unknown => None,
        }
    }

    /// Decode from a JSON value handed over by the host.
    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        serde_json::from_value(value).map_err(CodecError::Decode)
    }

    /// Encode into a JSON value.
    pub fn to_value(&self) -> Result<Value, CodecError> {
        serde_json::to_value(self).map_err(CodecError::Encode)
    }

    /// Decode one line of the process channel.
    pub fn from_json(line: &str) -> Result<Self, CodecError> {
        serde_json::from_str(line).map_err(CodecError::Decode)
    }

    /// Encode for the process channel (no trailing newline).
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Encode)
    }
}

/// Routes and commands a module exposes, sent once via `register`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Route entries are interpreted by the host only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Value>>,
    /// Command names other modules may call.
    #[serde(default)]
    pub commands: Vec<String>,
}

impl ModuleDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn with_route(mut self, route: Value) -> Self {
        self.routes.get_or_insert_with(Vec::new).push(route);
        self
    }
}

/// An `invoke` message with its tag stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Registered route/command handler to run.
    #[serde(rename = "handlerId")]
    pub handler_id: String,
    /// Id to echo back in the matching `response`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CorrelationId>,
    #[serde(default)]
    pub payload: Value,
    /// Any further fields the host attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Command name plus positional arguments of an inter-module call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpcCall {
    pub command: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Severity of a host-side log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}
