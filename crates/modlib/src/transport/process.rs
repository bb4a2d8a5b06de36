//! Process-channel transport.
//!
//! One JSON message per line. Outbound messages are encoded at `send` time
//! and written by a background task; a reader task decodes inbound lines and
//! feeds the single subscription. Lines that do not decode are logged and
//! skipped.
//!
//! Both tasks are spawned on construction, so a Tokio runtime must be
//! running.

use super::{Inbound, Transport};
use crate::error::TransportError;
use modlib_types::Message;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Newline-delimited JSON channel to the parent process.
pub struct ProcessChannel {
    outbound: mpsc::UnboundedSender<String>,
    /// Lines queued for the writer task and not yet flushed
    unwritten: Arc<AtomicUsize>,
    inbound: Mutex<Option<Inbound>>,
    reader: JoinHandle<()>,
}

impl ProcessChannel {
    /// Bind to this process's stdin (inbound) and stdout (outbound).
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Bind to an arbitrary reader/writer pair.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let unwritten = Arc::new(AtomicUsize::new(0));
        tokio::spawn(write_loop(writer, out_rx, unwritten.clone()));

        Self {
            outbound: out_tx,
            unwritten,
            inbound: Mutex::new(Some(in_rx)),
            reader: tokio::spawn(read_loop(reader, in_tx)),
        }
    }
}

impl Transport for ProcessChannel {
    fn send(&self, message: Message) -> Result<(), TransportError> {
        let line = message.to_json()?;
        self.unwritten.fetch_add(1, Ordering::AcqRel);
        self.outbound.send(line).map_err(|_| {
            self.unwritten.fetch_sub(1, Ordering::AcqRel);
            TransportError::Closed
        })
    }

    fn subscribe(&self) -> Result<Inbound, TransportError> {
        self.inbound
            .lock()
            .take()
            .ok_or(TransportError::AlreadySubscribed)
    }

    fn queued(&self) -> usize {
        self.unwritten.load(Ordering::Acquire)
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        // The writer drains what is queued and exits once the sender drops
        self.reader.abort();
    }
}

async fn read_loop<R>(reader: R, inbound: mpsc::UnboundedSender<Message>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match Message::from_json(line) {
                    Ok(message) => {
                        if inbound.send(message).is_err() {
                            debug!("Inbound subscriber dropped, stopping reader");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Dropping undecodable inbound line"),
                }
            }
            Ok(None) => {
                debug!("Host closed the process channel");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Error reading process channel");
                break;
            }
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<String>,
    unwritten: Arc<AtomicUsize>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = outbound.recv().await {
        line.push('\n');
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        unwritten.fetch_sub(1, Ordering::AcqRel);

        if let Err(e) = written {
            warn!(error = %e, "Error writing process channel, stopping writer");
            // Nothing queued behind this line will be written
            outbound.close();
            while outbound.try_recv().is_ok() {
                unwritten.fetch_sub(1, Ordering::AcqRel);
            }
            break;
        }
    }
}
