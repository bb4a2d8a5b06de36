//! # Re-entrant Hooks
//!
//! Hooks run on behalf of the dispatch loop, yet may themselves start calls
//! whose responses must pass back through that same loop.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use modlib::{HostEnd, MemoryTransport, Message, ModuleConfig, ModuleSession};
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn connect(config: ModuleConfig) -> (ModuleSession, HostEnd) {
        let (transport, host) = MemoryTransport::pair();
        let session = ModuleSession::connect(Arc::new(transport), config).unwrap();
        (session, host)
    }

    async fn next_sent(host: &mut HostEnd) -> Value {
        host.recv_timeout(Duration::from_secs(1))
            .await
            .expect("module sent nothing")
            .to_value()
            .unwrap()
    }

    #[tokio::test]
    async fn test_mpc_request_hook_can_call_out() {
        let (session, mut host) = connect(ModuleConfig::default());

        // Answer "total" by asking another module for the price first
        let outbound = session.clone();
        session.on_mpc_request(move |command, params| {
            let price = outbound.mpc("pricing", "price", params);
            async move {
                let price = price.await?;
                let price = price.as_i64().unwrap_or_default();
                anyhow::Ok(json!({"command": command, "total": price * 2}))
            }
        });

        host.deliver_json(json!({
            "type": "mpcRequest",
            "id": "outer",
            "payload": {"command": "total", "params": ["sku-1"]}
        }))
        .unwrap();

        let nested = next_sent(&mut host).await;
        assert_eq!(nested["to"], "pricing");
        assert_eq!(nested["payload"]["params"], json!(["sku-1"]));

        host.deliver_json(json!({"type": "mpcResponse", "id": nested["id"], "payload": 21}))
            .unwrap();

        let reply = next_sent(&mut host).await;
        assert_eq!(reply["id"], "outer");
        assert_eq!(reply["isResult"], true);
        assert_eq!(reply["payload"]["result"], json!({"command": "total", "total": 42}));
    }

    #[tokio::test]
    async fn test_slow_hook_does_not_block_other_traffic() {
        let (session, mut host) = connect(ModuleConfig::default());
        let (release_tx, release_rx) = mpsc::unbounded_channel::<()>();
        let release_rx = Arc::new(tokio::sync::Mutex::new(release_rx));

        session.on_mpc_request(move |_command, _params| {
            let release = release_rx.clone();
            async move {
                release.lock().await.recv().await;
                anyhow::Ok(json!("released"))
            }
        });

        host.deliver_json(json!({"type": "mpcRequest", "id": "slow", "payload": {"command": "wait"}}))
            .unwrap();

        // A call made while the hook is parked still completes
        let call = session.mpc("peer", "ping", vec![]);
        let request = next_sent(&mut host).await;
        host.deliver_json(json!({"type": "mpcResponse", "id": request["id"], "payload": "pong"}))
            .unwrap();
        assert_eq!(
            timeout(Duration::from_secs(1), call).await.unwrap().unwrap(),
            json!("pong")
        );

        release_tx.send(()).unwrap();
        let reply = next_sent(&mut host).await;
        assert_eq!(reply["id"], "slow");
        assert_eq!(reply["payload"]["result"], "released");
    }

    #[tokio::test]
    async fn test_loaded_hook_can_start_calls() {
        let (session, mut host) = connect(ModuleConfig::default());
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let outbound = session.clone();
        session.on_loaded(move |fields| {
            let call = outbound.mpc("config", "get", vec![json!(fields.get("name"))]);
            let done = done_tx.clone();
            tokio::spawn(async move {
                let _ = done.send(call.await);
            });
        });

        host.deliver_json(json!({"type": "init", "name": "billing"})).unwrap();

        let request = next_sent(&mut host).await;
        assert_eq!(request["payload"]["params"], json!(["billing"]));
        host.deliver_json(json!({"type": "mpcResponse", "id": request["id"], "payload": {"currency": "EUR"}}))
            .unwrap();

        let result = timeout(Duration::from_secs(1), done_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.unwrap(), json!({"currency": "EUR"}));
    }

    #[tokio::test]
    async fn test_error_reply_policy_end_to_end() {
        let (session, mut host) = connect(ModuleConfig::default().with_error_replies());
        session.on_mpc_request(|command, _params| async move {
            match command.as_str() {
                "ok" => anyhow::Ok(json!(true)),
                other => Err(anyhow::anyhow!("unsupported command {other}")),
            }
        });

        host.deliver(Message::from_value(json!({
            "type": "mpcRequest", "id": "a", "payload": {"command": "nope"}
        })).unwrap())
        .unwrap();

        let reply = next_sent(&mut host).await;
        assert_eq!(
            reply,
            json!({
                "type": "intermoduleMessage",
                "id": "a",
                "isResult": true,
                "payload": {"error": "unsupported command nope"}
            })
        );
    }
}
