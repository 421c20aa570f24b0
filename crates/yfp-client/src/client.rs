//! Main streaming client implementation

use bytes::Bytes;
use parking_lot::Mutex;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use yfp_core::{codec, ConnectData, Envelope, FrameHeader, Message};
use yfp_transport::{FrameWriter, TcpConfig, TcpTransport, TransportError, UdpConfig, UdpTransport};

use crate::builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::{self, ClientEvent, EventReceiver, EventSink};
use crate::receiver::ReceiveLoop;
use crate::state::{ConnectionState, StateCell};

/// How long `shutdown` waits for a session to close and workers to stop
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type SharedWriter = Arc<tokio::sync::Mutex<FrameWriter<TcpStream>>>;

/// The sockets of one live connection
struct Session {
    server: IpAddr,
    control: UdpTransport,
    stream: SharedWriter,
    receiver: JoinHandle<()>,
}

impl Session {
    /// Close the stream once any in-flight frame is written, then wait for
    /// the receive loop to notice the state change and drop its socket.
    async fn close(self) {
        let Session {
            server,
            control,
            stream,
            receiver,
        } = self;
        drop(control);

        if let Err(e) = stream.lock().await.shutdown().await {
            warn!("Error closing stream to {}: {}", server, e);
        }

        if let Err(e) = receiver.await {
            if !e.is_cancelled() {
                warn!("Control listener for {} ended abnormally: {}", server, e);
            }
        }

        debug!("Session with {} closed", server);
    }
}

/// State shared between the client handle and its background tasks
struct Inner {
    config: ClientConfig,
    state: StateCell,
    session: Mutex<Option<Session>>,
    events: EventSink,
    frames_sent: AtomicU64,
}

impl Inner {
    /// Flip to `Disconnected` and detach the current session, atomically
    /// with respect to `commit`. Connects still in flight become stale.
    fn detach(&self) -> Option<Session> {
        let mut session = self.session.lock();
        self.state.end_session();
        session.take()
    }

    /// Install a freshly opened session. Fails if a disconnect happened
    /// since `epoch` was taken or another connect won.
    fn commit(
        &self,
        epoch: u64,
        server: IpAddr,
        control: UdpTransport,
        writer: FrameWriter<TcpStream>,
    ) -> Result<()> {
        let mut session = self.session.lock();
        if self.state.epoch() != epoch {
            return Err(ClientError::ConnectionFailed("cancelled".into()));
        }
        if self.state.get().is_connected() {
            return Err(ClientError::ConnectionFailed("already connected".into()));
        }

        self.state.set(ConnectionState::Connected);
        self.events.post(ClientEvent::Connected);

        let receiver = tokio::spawn(
            ReceiveLoop {
                control: control.clone(),
                server: SocketAddr::new(server, self.config.server_port),
                state: self.state.watch(),
                events: self.events.clone(),
            }
            .run(),
        );

        *session = Some(Session {
            server,
            control,
            stream: Arc::new(tokio::sync::Mutex::new(writer)),
            receiver,
        });

        info!("Connected to {}", server);
        Ok(())
    }

    /// The stream writer, if a frame may be sent right now
    fn writer(&self) -> Option<SharedWriter> {
        let session = self.session.lock();
        if !self.state.get().is_connected() {
            return None;
        }
        session.as_ref().map(|s| s.stream.clone())
    }
}

/// A capture-device client for a YFP detection server.
///
/// All methods return immediately; the work runs on the client's own worker
/// pool and results come back as [`ClientEvent`]s on the paired
/// [`EventReceiver`].
///
/// ```ignore
/// let (client, events) = StreamClient::builder().device_name("Pixel").build()?;
/// client.discover();
/// while let Some(event) = events.recv() {
///     match event {
///         ClientEvent::ServerDiscovered(ip) => client.connect(ip),
///         ClientEvent::Connected => client.send_frame(jpeg, 1, 1920, 1080),
///         other => println!("{:?}", other),
///     }
/// }
/// ```
pub struct StreamClient {
    inner: Arc<Inner>,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl StreamClient {
    /// Create a client and its event queue
    pub fn new(config: ClientConfig) -> Result<(Self, EventReceiver)> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("yfp-worker")
            .enable_all()
            .build()
            .map_err(|e| ClientError::Runtime(e.to_string()))?;

        let (events, receiver) = events::channel();

        let client = Self {
            inner: Arc::new(Inner {
                config,
                state: StateCell::new(),
                session: Mutex::new(None),
                events,
                frames_sent: AtomicU64::new(0),
            }),
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        };

        Ok((client, receiver))
    }

    /// Create a builder
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Address of the connected server
    pub fn server(&self) -> Option<IpAddr> {
        self.inner.session.lock().as_ref().map(|s| s.server)
    }

    /// Frames fully written to the stream since the client was created
    pub fn frames_sent(&self) -> u64 {
        self.inner.frames_sent.load(Ordering::Relaxed)
    }

    /// Look for a server on the local network.
    ///
    /// Posts `ServerDiscovered` with the first responder's address, or
    /// `Error(DiscoveryFailed)` if nobody answers in time. Connecting is left
    /// to the consumer.
    pub fn discover(&self) {
        let inner = self.inner.clone();

        // A live session keeps its state; discovery only reports
        let tracked = inner.state.set_if(
            |s| matches!(s, ConnectionState::Idle | ConnectionState::Disconnected),
            ConnectionState::Discovering,
        );

        self.handle.spawn(async move {
            let result = yfp_discovery::discover(&inner.config.discovery()).await;

            if tracked {
                inner
                    .state
                    .set_if(|s| s == ConnectionState::Discovering, ConnectionState::Idle);
            }

            match result {
                Ok(server) => {
                    inner.events.post(ClientEvent::ServerDiscovered(server.ip()));
                }
                Err(e) => {
                    warn!("Discovery failed: {}", e);
                    inner
                        .events
                        .post(ClientEvent::Error(ClientError::DiscoveryFailed(e.to_string())));
                }
            }
        });
    }

    /// Open a session with the server at `server`.
    ///
    /// Sends CONNECT on the control channel, opens the bulk stream, then
    /// posts `Connected` and starts listening. An existing session is
    /// disconnected first. A `disconnect` before the attempt completes
    /// cancels it with `ConnectionFailed`.
    pub fn connect(&self, server: IpAddr) {
        if self.is_connected() {
            info!("Replacing session with {}", server);
            self.disconnect();
        }

        let inner = self.inner.clone();
        let epoch = inner.state.epoch();
        self.handle.spawn(async move {
            let opened = open_session(&inner.config, server)
                .await
                .and_then(|(control, writer)| inner.commit(epoch, server, control, writer));

            if let Err(e) = opened {
                warn!("Connection to {} failed: {}", server, e);
                // A cancelled attempt leaves the state to whoever cancelled it
                if inner.state.epoch() == epoch {
                    inner
                        .state
                        .set_if(|s| !s.is_connected(), ConnectionState::Disconnected);
                }
                inner.events.post(ClientEvent::Error(e));
            }
        });
    }

    /// Send one encoded frame to the server.
    ///
    /// Dropped silently when not connected. A failed write posts
    /// `Error(SendFailed)` and leaves the connection state alone.
    pub fn send_frame(&self, payload: impl Into<Bytes>, frame_id: i64, width: u32, height: u32) {
        let Some(stream) = self.inner.writer() else {
            debug!("Not connected, dropping frame {}", frame_id);
            return;
        };

        let header = FrameHeader {
            frame_id,
            width,
            height,
            format: self.inner.config.frame_format.clone(),
            quality: self.inner.config.frame_quality,
        };
        let payload = payload.into();
        let inner = self.inner.clone();

        self.handle.spawn(async move {
            match write_frame(&stream, header, &payload).await {
                Ok(()) => {
                    inner.frames_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!("Failed to send frame {}: {}", frame_id, e);
                    inner
                        .events
                        .post(ClientEvent::Error(ClientError::SendFailed(e.to_string())));
                }
            }
        });
    }

    /// End the current session, if any.
    ///
    /// The state becomes `Disconnected` before anything is closed, so the
    /// receive loop exits quietly. Always posts exactly one `Disconnected`.
    pub fn disconnect(&self) {
        if let Some(session) = self.inner.detach() {
            info!("Disconnecting from {}", session.server);
            self.handle.spawn(session.close());
        }
        self.inner.events.post(ClientEvent::Disconnected);
    }

    /// Disconnect and stop the worker pool.
    ///
    /// Blocks for a bounded time while the session closes.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context, such
    /// as a task on another tokio runtime. Drop the client there instead.
    pub fn shutdown(mut self) {
        let session = self.inner.detach();
        if let Some(runtime) = self.runtime.take() {
            if let Some(session) = session {
                info!("Disconnecting from {}", session.server);
                runtime.block_on(async {
                    if tokio::time::timeout(SHUTDOWN_GRACE, session.close()).await.is_err() {
                        warn!("Session did not close within {:?}", SHUTDOWN_GRACE);
                    }
                });
            }
            self.inner.events.post(ClientEvent::Disconnected);
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
        info!("Client shut down");
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            drop(self.inner.detach());
            runtime.shutdown_background();
        }
    }
}

/// Announce ourselves on the control channel and open the bulk stream
async fn open_session(
    config: &ClientConfig,
    server: IpAddr,
) -> Result<(UdpTransport, FrameWriter<TcpStream>)> {
    let target = SocketAddr::new(server, config.server_port);
    let local = if server.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };

    let control = UdpTransport::bind_with_config(
        local,
        UdpConfig {
            recv_buffer_size: config.recv_buffer_size,
        },
    )
    .await
    .map_err(connection_failed)?;

    let connect = codec::encode(&Envelope::new(Message::Connect(ConnectData {
        device_id: config.device_id.clone(),
        resolution_width: config.resolution_width,
        resolution_height: config.resolution_height,
    })))
    .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

    control
        .send_to(&connect, target)
        .await
        .map_err(connection_failed)?;
    debug!("Sent CONNECT to {}", target);

    let stream = TcpTransport::with_config(TcpConfig {
        connect_timeout: config.connect_timeout(),
        ..Default::default()
    })
    .connect(target)
    .await
    .map_err(connection_failed)?;

    Ok((control, FrameWriter::new(stream)))
}

async fn write_frame(
    stream: &SharedWriter,
    header: FrameHeader,
    payload: &[u8],
) -> std::result::Result<(), TransportError> {
    let frame_id = header.frame_id;
    let header = codec::encode(&Envelope::new(Message::Frame(header)))?;
    stream.lock().await.write_frame(&header, payload).await?;
    debug!("Frame {} sent: {} bytes", frame_id, payload.len());
    Ok(())
}

fn connection_failed(e: TransportError) -> ClientError {
    ClientError::ConnectionFailed(e.to_string())
}
