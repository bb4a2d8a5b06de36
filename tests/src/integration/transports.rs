//! # Transport Round Trips
//!
//! The same request/response flows exercised over both real transports:
//!
//! - `ProcessChannel`: a host process on the other end of a byte pipe,
//!   speaking one JSON message per line
//! - `HostTransport`: an in-process host API with a `"message"` event

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use modlib::testing::RecordingHost;
    use modlib::{
        LogLevel, ModuleConfig, ModuleDefinition, ModuleSession, ProcessChannel, MESSAGE_EVENT,
    };
    use serde_json::{json, Value};
    use tokio::io::{
        duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf,
        WriteHalf,
    };
    use tokio::time::timeout;

    // =============================================================================
    // PROCESS CHANNEL
    // =============================================================================

    /// Parent-process side of the pipe.
    struct PipeHost {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl PipeHost {
        async fn read(&mut self) -> Value {
            let line = timeout(Duration::from_secs(1), self.lines.next_line())
                .await
                .expect("timeout")
                .unwrap()
                .expect("pipe closed");
            serde_json::from_str(&line).unwrap()
        }

        async fn write(&mut self, value: Value) {
            let mut line = value.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.flush().await.unwrap();
        }
    }

    fn process_session(config: ModuleConfig) -> (ModuleSession, PipeHost) {
        let (module_io, host_io) = duplex(64 * 1024);
        let (module_rx, module_tx) = split(module_io);
        let (host_rx, host_tx) = split(host_io);

        let channel = ProcessChannel::new(module_rx, module_tx);
        let session = ModuleSession::connect(Arc::new(channel), config).unwrap();
        let host = PipeHost {
            lines: BufReader::new(host_rx).lines(),
            writer: host_tx,
        };
        (session, host)
    }

    #[tokio::test]
    async fn test_process_mpc_round_trip() {
        let (session, mut host) = process_session(ModuleConfig::default());

        let call = session.mpc("peerModule", "ping", vec![json!(1)]);
        let request = host.read().await;
        assert_eq!(request["type"], "intermoduleMessage");
        assert_eq!(request["to"], "peerModule");
        assert_eq!(request["payload"], json!({"command": "ping", "params": [1]}));

        host.write(json!({"type": "mpcResponse", "id": request["id"], "payload": "pong"}))
            .await;
        assert_eq!(call.await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn test_process_query_round_trip() {
        let (session, mut host) = process_session(ModuleConfig::default());

        let query = session.query("SELECT 1");
        let request = host.read().await;
        assert_eq!(request["type"], "databaseQuery");
        assert_eq!(request["payload"], "SELECT 1");

        host.write(json!({"type": "databaseResult", "id": request["id"], "payload": [[1]]}))
            .await;
        assert_eq!(query.await.unwrap(), json!([[1]]));
    }

    #[tokio::test]
    async fn test_process_mpc_request_is_answered() {
        let (session, mut host) = process_session(ModuleConfig::default());
        session.on_mpc_request(|command, _params| async move { anyhow::Ok(json!(command.len())) });

        host.write(json!({
            "type": "mpcRequest",
            "id": "r1",
            "payload": {"command": "length", "params": []}
        }))
        .await;

        assert_eq!(
            host.read().await,
            json!({"type": "intermoduleMessage", "id": "r1", "isResult": true, "payload": {"result": 6}})
        );
    }

    #[tokio::test]
    async fn test_process_skips_garbage_lines() {
        let (session, mut host) = process_session(ModuleConfig::default());

        let call = session.mpc("peer", "ping", vec![]);
        let request = host.read().await;

        host.writer.write_all(b"not json\n\n").await.unwrap();
        host.write(json!({"type": "somethingNew", "id": request["id"]})).await;
        host.write(json!({"type": "mpcResponse", "id": request["id"], "payload": true}))
            .await;

        assert_eq!(call.await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_process_fire_and_forget_order() {
        let (session, mut host) = process_session(ModuleConfig::default());

        session
            .init_module(ModuleDefinition::new().with_command("ping"))
            .unwrap();
        session.log("ready", LogLevel::Info).unwrap();

        assert_eq!(
            host.read().await,
            json!({"type": "register", "payload": {"commands": ["ping"]}})
        );
        assert_eq!(
            host.read().await,
            json!({"type": "log", "level": "info", "message": "ready"})
        );
    }

    #[tokio::test]
    async fn test_process_closed_when_host_hangs_up() {
        let (session, host) = process_session(ModuleConfig::default());
        drop(host);

        timeout(Duration::from_secs(1), session.closed())
            .await
            .expect("dispatch loop did not stop");
    }

    #[tokio::test]
    async fn test_process_drain_delivers_reply_after_hangup() {
        let (session, mut host) = process_session(ModuleConfig::default());
        session.on_mpc_request(|_command, _params| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            anyhow::Ok(json!("late"))
        });

        host.write(json!({"type": "mpcRequest", "id": "last", "payload": {"command": "slow"}}))
            .await;
        host.writer.shutdown().await.unwrap();

        timeout(Duration::from_secs(1), session.closed())
            .await
            .expect("dispatch loop did not stop");
        assert!(session.drain(Duration::from_secs(1)).await);

        let reply = host.read().await;
        assert_eq!(reply["id"], "last");
        assert_eq!(reply["payload"]["result"], "late");
    }

    // =============================================================================
    // HOST API
    // =============================================================================

    async fn wait_for_sent(host: &RecordingHost, count: usize) -> Vec<Value> {
        timeout(Duration::from_secs(1), async {
            loop {
                let sent = host.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("host never received the expected messages")
    }

    #[tokio::test]
    async fn test_host_api_subscribes_to_message_event() {
        let host = Arc::new(RecordingHost::new());
        let _session = ModuleSession::with_host(host.clone(), ModuleConfig::default()).unwrap();
        assert_eq!(host.listener_count(MESSAGE_EVENT), 1);
    }

    #[tokio::test]
    async fn test_host_api_mpc_round_trip() {
        let host = Arc::new(RecordingHost::new());
        let session = ModuleSession::with_host(host.clone(), ModuleConfig::default()).unwrap();

        let call = session.mpc("peer", "ping", vec![]);
        let sent = host.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "intermoduleMessage");

        host.emit(
            MESSAGE_EVENT,
            json!({"type": "mpcResponse", "id": sent[0]["id"], "payload": {"ok": 1}}),
        );
        assert_eq!(call.await.unwrap(), json!({"ok": 1}));
    }

    #[tokio::test]
    async fn test_host_api_query_failure() {
        let host = Arc::new(RecordingHost::new());
        let session = ModuleSession::with_host(host.clone(), ModuleConfig::default()).unwrap();

        let query = session.query("SELEKT");
        let id = host.take_sent()[0]["id"].clone();
        host.emit(
            MESSAGE_EVENT,
            json!({"type": "databaseError", "id": id, "payload": {"message": "syntax error"}}),
        );

        let err = query.await.unwrap_err();
        assert_eq!(err.to_string(), "syntax error");
    }

    #[tokio::test]
    async fn test_host_api_invoke_and_reply() {
        let host = Arc::new(RecordingHost::new());
        let session = ModuleSession::with_host(host.clone(), ModuleConfig::default()).unwrap();

        let responder = session.clone();
        session.on_invoke(move |request| {
            let id = request.id.clone().unwrap_or_default();
            responder
                .reply(&id, json!({"handled": request.handler_id}), Some("application/json"))
                .unwrap();
        });

        host.emit(
            MESSAGE_EVENT,
            json!({"type": "invoke", "handlerId": "users.list", "id": "m7", "payload": null}),
        );

        let sent = wait_for_sent(&host, 1).await;
        assert_eq!(
            sent[0],
            json!({
                "type": "response",
                "id": "m7",
                "payload": {"handled": "users.list"},
                "contentType": "application/json"
            })
        );
    }

    #[tokio::test]
    async fn test_host_api_ignores_undecodable_values() {
        let host = Arc::new(RecordingHost::new());
        let session = ModuleSession::with_host(host.clone(), ModuleConfig::default()).unwrap();

        let call = session.mpc("peer", "ping", vec![]);
        let id = host.take_sent()[0]["id"].clone();

        host.emit(MESSAGE_EVENT, json!(42));
        host.emit(MESSAGE_EVENT, json!({"type": "mpcResponse"}));
        host.emit(MESSAGE_EVENT, json!({"type": "mpcResponse", "id": id, "payload": "ok"}));

        assert_eq!(call.await.unwrap(), json!("ok"));
    }
}
