//! # Modlib Echo Module
//!
//! A module process for exercising a host. Speaks over stdin/stdout and logs
//! to stderr.
//!
//! ## Commands
//!
//! | Command | Result |
//! |---------|--------|
//! | `echo` | the params, unchanged |
//! | `sum` | sum of the numeric params |
//! | `relay` | calls `params[1]` on module `params[0]` with the remaining params |
//!
//! Every `invoke` is answered with the handler id and payload it carried.

use anyhow::{bail, Context, Result};
use modlib::{LogLevel, ModuleConfig, ModuleDefinition, ModuleSession};
use modlib_telemetry::{init_logging, TelemetryConfig};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// How long to keep answering after the host hangs up.
const DRAIN_LIMIT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::for_module("modlib-echo"))?;

    let session = ModuleSession::stdio(ModuleConfig::from_env())
        .context("failed to start module session")?;

    let responder = session.clone();
    session.on_invoke(move |request| {
        let Some(id) = request.id.clone() else {
            warn!(handler_id = %request.handler_id, "invoke without id, nothing to answer");
            return;
        };
        let body = json!({ "handlerId": request.handler_id, "payload": request.payload });
        if let Err(e) = responder.reply(&id, body, Some("application/json")) {
            warn!(error = %e, "Failed to answer invoke");
        }
    });

    let caller = session.clone();
    session.on_mpc_request(move |command, params| handle_command(caller.clone(), command, params));

    let logger = session.clone();
    session.on_loaded(move |fields| {
        let name = fields.get("name").and_then(Value::as_str).unwrap_or("unnamed");
        if let Err(e) = logger.log(format!("echo module loaded as {name}"), LogLevel::Info) {
            warn!(error = %e, "Failed to log to host");
        }
    });

    session.init_module(
        ModuleDefinition::new()
            .with_command("echo")
            .with_command("sum")
            .with_command("relay"),
    )?;

    info!("Echo module running");
    session.closed().await;

    // Replies still being computed and lines still queued for stdout would
    // be lost with the runtime
    if !session.drain(DRAIN_LIMIT).await {
        warn!(limit_ms = DRAIN_LIMIT.as_millis() as u64, "Exiting with replies still outstanding");
    }
    info!("Host closed the channel, exiting");
    Ok(())
}

async fn handle_command(session: ModuleSession, command: String, params: Vec<Value>) -> Result<Value> {
    match command.as_str() {
        "echo" => Ok(Value::Array(params)),
        "sum" => Ok(json!(params.iter().filter_map(Value::as_f64).sum::<f64>())),
        "relay" => {
            let mut params = params.into_iter();
            let target = next_string(&mut params).context("relay needs a target module")?;
            let inner = next_string(&mut params).context("relay needs a command")?;
            Ok(session.mpc(&target, &inner, params.collect()).await?)
        }
        other => bail!("unknown command {other}"),
    }
}

fn next_string(params: &mut impl Iterator<Item = Value>) -> Option<String> {
    match params.next()? {
        Value::String(s) => Some(s),
        _ => None,
    }
}
