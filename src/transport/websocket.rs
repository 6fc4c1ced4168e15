//! WebSocket transport
//!
//! Implements the topic-multicast endpoints the broker and clients are built
//! on. Responsibilities:
//! - `InboundSocket`: accept publisher connections and funnel every frame
//!   they send into one queue
//! - `OutboundSocket`: accept subscriber connections, record their topic
//!   subscriptions and multicast frames through the `Fanout` registry
//! - `connect`: open a client-side connection, split into a cloneable send
//!   half (`Connection`) and a read half (`Inbox`)
//!
//! Every message on the wire is a JSON-encoded `WireMessage` text frame.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::transport::context::Context;
use crate::transport::fanout::{Fanout, Peer};
use crate::transport::message::{Frame, WireMessage};
use crate::utils::error::TransportError;

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn lock(fanout: &Mutex<Fanout>) -> MutexGuard<'_, Fanout> {
    fanout.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The publisher-facing side of a broker.
#[derive(Debug)]
pub struct InboundSocket {
    local_addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Frame>,
    context: Context,
    acceptor: JoinHandle<()>,
}

impl InboundSocket {
    pub async fn bind(addr: &str, context: &Context) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = mpsc::unbounded_channel();

        info!("Inbound side listening on ws://{local_addr}");
        let acceptor = tokio::spawn(accept_publishers(listener, tx, context.clone()));

        Ok(Self {
            local_addr,
            frames: rx,
            context: context.clone(),
            acceptor,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until a publisher sends a frame or the context is terminated.
    pub async fn receive(&mut self) -> Result<Frame, TransportError> {
        if self.context.is_terminated() {
            return Err(TransportError::ContextClosed);
        }
        tokio::select! {
            _ = self.context.closed() => Err(TransportError::ContextClosed),
            frame = self.frames.recv() => frame.ok_or(TransportError::ConnectionClosed),
        }
    }

    pub fn close(self) {
        self.acceptor.abort();
        debug!("Inbound side {} closed", self.local_addr);
    }
}

async fn accept_publishers(
    listener: TcpListener,
    frames: mpsc::UnboundedSender<Frame>,
    context: Context,
) {
    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = context.closed() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Inbound accept failed: {e}");
                    continue;
                }
            },
        };

        let frames = frames.clone();
        let context = context.clone();

        tokio::spawn(async move {
            let mut ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake error from {peer_addr}: {e}");
                    return;
                }
            };
            debug!("Publisher {peer_addr} connected");

            loop {
                let msg = tokio::select! {
                    _ = context.closed() => break,
                    msg = ws_stream.next() => msg,
                };

                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<WireMessage>(text.as_str()) {
                            Ok(WireMessage::Frame(frame)) => {
                                if frames.send(frame).is_err() {
                                    break;
                                }
                            }
                            Ok(other) => {
                                debug!("Ignoring {other:?} from publisher {peer_addr}")
                            }
                            Err(e) => warn!("Invalid message from publisher {peer_addr}: {e}"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Publisher {peer_addr} read error: {e}");
                        break;
                    }
                }
            }

            let _ = ws_stream.close(None).await;
            debug!("Publisher {peer_addr} disconnected");
        });
    }
}

/// The subscriber-facing side of a broker.
#[derive(Debug)]
pub struct OutboundSocket {
    local_addr: SocketAddr,
    fanout: Arc<Mutex<Fanout>>,
    acceptor: JoinHandle<()>,
}

impl OutboundSocket {
    pub async fn bind(addr: &str, context: &Context) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let fanout = Arc::new(Mutex::new(Fanout::new()));

        info!("Outbound side listening on ws://{local_addr}");
        let acceptor = tokio::spawn(accept_subscribers(
            listener,
            fanout.clone(),
            context.clone(),
        ));

        Ok(Self {
            local_addr,
            fanout,
            acceptor,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Multicast `frame` to every connection subscribed to its topic.
    pub fn send(&self, frame: Frame) -> usize {
        lock(&self.fanout).publish(frame)
    }

    pub fn close(self) {
        self.acceptor.abort();
        lock(&self.fanout).clear();
        debug!("Outbound side {} closed", self.local_addr);
    }
}

async fn accept_subscribers(listener: TcpListener, fanout: Arc<Mutex<Fanout>>, context: Context) {
    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = context.closed() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Outbound accept failed: {e}");
                    continue;
                }
            },
        };

        let fanout = fanout.clone();
        let context = context.clone();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake error from {peer_addr}: {e}");
                    return;
                }
            };
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
            let peer = Peer::new(tx);
            let peer_id = peer.id.clone();
            lock(&fanout).register_peer(peer);
            debug!("Subscriber {peer_id} connected from {peer_addr}");

            let writer = {
                let peer_id = peer_id.clone();
                tokio::spawn(async move {
                    while let Some(msg) = rx.recv().await {
                        if let Err(e) = ws_sender.send(msg).await {
                            debug!("Failed to send message to {peer_id}: {e}");
                            break;
                        }
                    }
                    let _ = ws_sender.close().await;
                })
            };

            loop {
                let msg = tokio::select! {
                    _ = context.closed() => break,
                    msg = ws_receiver.next() => msg,
                };

                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<WireMessage>(text.as_str()) {
                            Ok(WireMessage::Subscribe { topic }) => {
                                lock(&fanout).subscribe(&topic, peer_id.clone());
                                debug!("{peer_id} subscribed to {topic}");
                            }
                            Ok(WireMessage::Unsubscribe { topic }) => {
                                lock(&fanout).unsubscribe(&topic, &peer_id);
                                debug!("{peer_id} unsubscribed from {topic}");
                            }
                            Ok(WireMessage::Frame(frame)) => {
                                warn!(
                                    "{peer_id} published on the outbound side; dropping frame for {}",
                                    frame.topic
                                );
                            }
                            Err(e) => warn!("Invalid message from {peer_id}: {e}"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("{peer_id} read error: {e}");
                        break;
                    }
                }
            }

            // dropping the peer's queue lets the writer flush and close
            lock(&fanout).cleanup_peer(&peer_id);
            let _ = writer.await;
        });
    }
}

/// Send half of a client-side connection. Cheap to clone; every clone feeds
/// the same writer task, so messages leave in the order they were queued.
#[derive(Debug, Clone)]
pub struct Connection {
    peer: String,
    outgoing: mpsc::UnboundedSender<WsMessage>,
}

/// Read half of a client-side connection.
pub struct Inbox {
    peer: String,
    stream: SplitStream<ClientStream>,
}

/// Connect to a broker endpoint at `addr` (`host:port`).
pub async fn connect(addr: &str) -> Result<(Connection, Inbox), TransportError> {
    let url = format!("ws://{addr}");
    let (ws_stream, _response) = connect_async(url.as_str()).await?;
    let (mut ws_sender, ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let peer = addr.to_string();
    {
        let peer = peer.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = msg.is_close();
                if let Err(e) = ws_sender.send(msg).await {
                    debug!("Failed to send message to {peer}: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
        });
    }
    debug!("Connected to {url}");

    Ok((
        Connection {
            peer: peer.clone(),
            outgoing: tx,
        },
        Inbox {
            peer,
            stream: ws_receiver,
        },
    ))
}

impl Connection {
    fn post(&self, msg: &WireMessage) -> Result<(), TransportError> {
        let text = serde_json::to_string(msg)?;
        self.outgoing
            .send(WsMessage::text(text))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    pub fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.post(&WireMessage::Frame(frame))
    }

    pub fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.post(&WireMessage::Subscribe {
            topic: topic.to_string(),
        })
    }

    pub fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.post(&WireMessage::Unsubscribe {
            topic: topic.to_string(),
        })
    }

    /// Queue a close frame behind everything already sent.
    pub fn close(&self) {
        if self.outgoing.send(WsMessage::Close(None)).is_err() {
            debug!("Connection to {} already closed", self.peer);
        }
    }
}

impl Inbox {
    /// Block until the next frame arrives. Malformed messages are skipped.
    pub async fn receive(&mut self) -> Result<Frame, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<WireMessage>(text.as_str()) {
                        Ok(WireMessage::Frame(frame)) => return Ok(frame),
                        Ok(other) => debug!("Ignoring {other:?} from {}", self.peer),
                        Err(e) => warn!("Invalid message from {}: {e}", self.peer),
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::ConnectionClosed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}
