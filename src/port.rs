use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::fs::{File, OpenOptions};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{BytesCodec, Decoder};
use tracing::{debug, info_span, trace, warn, Instrument};

use crate::config::PortConfig;
use crate::error::Error;

/// Events emitted by a [`SerialPort`] over its broadcast channel.
///
/// `Open` is always observed before any `Data`.
/// `Closed` is emitted after the device descriptor has been released.
#[derive(Debug, Clone)]
pub enum PortEvent {
    /// The device is configured and the duplex channel is live.
    Open,

    /// A chunk arrived from the device.
    /// Chunks are delivered in arrival order with their byte boundaries
    /// as read, no re-framing.
    Data(Bytes),

    /// The readable side is exhausted. Writes are still accepted.
    End,

    /// A device-level error. Non-fatal: the port stays open.
    Error(Arc<Error>),

    /// The duplex channel is fully released.
    Closed,
}

/// A write request travelling to the device task.
struct WriteRequest {
    bytes: Vec<u8>,
    ack: oneshot::Sender<Result<(), Error>>,
}

/// Acknowledgement for a single [`SerialPort::write`].
///
/// Resolves once the device has accepted (flushed) the bytes,
/// not merely once they are enqueued.
pub struct WriteAck(oneshot::Receiver<Result<(), Error>>);

impl WriteAck {
    /// Wait until the write has been flushed to the device.
    ///
    /// If the port closes (or is dropped) while the write is still
    /// pending, this resolves with [`Error::PortClosed`] rather than
    /// hanging forever.
    pub async fn flushed(self) -> Result<(), Error> {
        self.0.await.unwrap_or(Err(Error::PortClosed))
    }
}

enum PortState {
    Uninitialized,
    Initializing,
    Open {
        outbox: mpsc::UnboundedSender<WriteRequest>,
        _pump: JoinHandle<()>,
    },
    Closed,
}

/// A duplex byte stream over a serial (TTY) device.
///
/// The device's line discipline is configured by spawning an external
/// `stty`-style tool; the device file itself is then opened for
/// simultaneous reading and writing.
///
/// Subscribe via [`SerialPort::events`] before calling
/// [`SerialPort::initialize`] to observe the full event sequence.
pub struct SerialPort {
    config: PortConfig,
    state: PortState,
    events_tx: broadcast::Sender<PortEvent>,

    // Writes issued before the port is open, in submission order.
    pending: VecDeque<WriteRequest>,
}

impl SerialPort {
    /// A port for the given configuration. No I/O happens yet.
    pub fn new(config: PortConfig) -> Self {
        let (events_tx, _) = broadcast::channel(1024);

        Self {
            config,
            state: PortState::Uninitialized,
            events_tx,
            pending: VecDeque::new(),
        }
    }

    /// The configuration this port was created with.
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Whether the duplex channel is currently live.
    pub fn is_open(&self) -> bool {
        matches!(self.state, PortState::Open { .. })
    }

    /// Subscribe to this port's lifecycle and data events.
    pub fn events(&self) -> broadcast::Receiver<PortEvent> {
        self.events_tx.subscribe()
    }

    /// Configure the line discipline and open the duplex channel.
    ///
    /// Opens the device for reading and writing, runs the external line
    /// configuration tool with the arguments computed from the
    /// configuration, and awaits its exit, bounded by the configured
    /// timeout. On success [`PortEvent::Open`] is emitted and writes
    /// issued before this point are flushed in submission order.
    ///
    /// Any failure releases the device descriptor, leaves the port
    /// `Uninitialized`, and is not retried internally.
    pub async fn initialize(&mut self) -> Result<(), Error> {
        if !matches!(self.state, PortState::Uninitialized) {
            return Err(Error::AlreadyInitialized);
        }

        // Validation happens before the device is touched.
        let args = self.config.stty_args()?;

        self.state = PortState::Initializing;

        let file = match self.configure_device(&args).await {
            Ok(file) => file,
            Err(e) => {
                self.state = PortState::Uninitialized;
                return Err(e);
            }
        };

        let (outbox, outbox_rx) = mpsc::unbounded_channel();

        // Open goes on the broadcast before the device task starts,
        // so no subscriber can observe data ahead of it.
        let _ = self.events_tx.send(PortEvent::Open);

        let pump = spawn_pump(
            self.config.device.clone(),
            file,
            outbox_rx,
            self.events_tx.clone(),
        );

        for request in self.pending.drain(..) {
            if let Err(mpsc::error::SendError(request)) = outbox.send(request) {
                let _ = request.ack.send(Err(Error::PortClosed));
            }
        }

        self.state = PortState::Open {
            outbox,
            _pump: pump,
        };

        Ok(())
    }

    /// Open the device and run the line configuration tool against it.
    ///
    /// The descriptor is dropped (closed) on every failure path.
    async fn configure_device(&self, args: &[String]) -> Result<File, Error> {
        debug!(device = %self.config.device, "Opening device");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.config.device)
            .await?;

        debug!(tool = %self.config.stty_path.display(), ?args, "Spawning line configuration tool");

        let mut child = Command::new(&self.config.stty_path)
            .args(args)
            .stdin(Stdio::null())
            .spawn()?;

        let status = match self.config.init_timeout {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_elapsed) => {
                    warn!("Line configuration tool timed out, killing it");
                    // SIGKILL, and reap.
                    let _ = child.kill().await;
                    return Err(Error::InitializationTimeout);
                }
            },
            None => child.wait().await?,
        };

        if status.success() {
            Ok(file)
        } else {
            Err(Error::ConfigurationFailed {
                exit_code: status.code().unwrap_or(-1),
            })
        }
    }

    /// Write bytes to the device.
    ///
    /// If the port is not yet open the write is deferred and flushed,
    /// in submission order, once it opens. Await the returned
    /// [`WriteAck`] for flush confirmation.
    pub fn write<B: Into<Vec<u8>>>(&mut self, bytes: B) -> WriteAck {
        let (ack_tx, ack_rx) = oneshot::channel();
        let request = WriteRequest {
            bytes: bytes.into(),
            ack: ack_tx,
        };

        match &self.state {
            PortState::Open { outbox, .. } => {
                if let Err(mpsc::error::SendError(request)) = outbox.send(request) {
                    let _ = request.ack.send(Err(Error::PortClosed));
                }
            }
            PortState::Closed => {
                let _ = request.ack.send(Err(Error::PortClosed));
            }
            PortState::Uninitialized | PortState::Initializing => {
                self.pending.push_back(request);
            }
        }

        WriteAck(ack_rx)
    }

    /// Close the duplex channel.
    ///
    /// Requires an open port. The device task finishes any write in
    /// flight, releases the descriptor, and then emits
    /// [`PortEvent::Closed`]. Closed is terminal: reinitializing this
    /// port is rejected with [`Error::AlreadyInitialized`].
    pub fn close(&mut self) -> Result<(), Error> {
        match std::mem::replace(&mut self.state, PortState::Closed) {
            PortState::Open { outbox, .. } => {
                // Dropping the outbox lets the device task drain and stop.
                drop(outbox);
                Ok(())
            }
            other => {
                self.state = other;
                Err(Error::NotOpen)
            }
        }
    }
}

/// Spawn the task owning the device descriptor.
///
/// Forwards inbound chunks to the event broadcast and serves write
/// requests from the outbox. Stops when the outbox is closed, releasing
/// the descriptor and emitting [`PortEvent::Closed`].
fn spawn_pump(
    device: String,
    file: File,
    mut outbox: mpsc::UnboundedReceiver<WriteRequest>,
    events: broadcast::Sender<PortEvent>,
) -> JoinHandle<()> {
    let span = info_span!("device", path = %device);

    tokio::spawn(
        async move {
            let mut framed = BytesCodec::new().framed(file);
            let mut readable = true;

            loop {
                tokio::select! {
                    chunk = framed.next(), if readable => match chunk {
                        Some(Ok(bytes)) => {
                            trace!(len = bytes.len(), "Chunk from device");
                            let _ = events.send(PortEvent::Data(bytes.freeze()));
                        }
                        Some(Err(e)) => {
                            warn!(?e, "Read error, readable side stops");
                            readable = false;
                            let _ = events.send(PortEvent::Error(Arc::new(e.into())));
                        }
                        None => {
                            trace!("Device end of input");
                            readable = false;
                            let _ = events.send(PortEvent::End);
                        }
                    },
                    request = outbox.recv() => match request {
                        Some(WriteRequest { bytes, ack }) => {
                            trace!(len = bytes.len(), "Chunk to device");
                            // `send` flushes, so the ack means accepted.
                            let result = framed.send(Bytes::from(bytes)).await.map_err(Error::from);
                            let _ = ack.send(result);
                        }
                        None => break,
                    },
                }
            }

            // Releases the descriptor before Closed goes out.
            drop(framed);

            debug!("Device task stopped");
            let _ = events.send(PortEvent::Closed);
        }
        .instrument(span),
    )
}
