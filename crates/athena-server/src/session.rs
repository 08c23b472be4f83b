//! One connection's lifecycle.
//!
//! A session registers its [`Client`], greets it with `decryptor`, then runs
//! two halves: a writer task draining the client's outbound channel into the
//! transport, and the read loop feeding transport bytes through a
//! [`PacketDecoder`] into the packet handlers. The read loop ends on peer
//! close, transport error, undecodable or oversize input, idle timeout,
//! rate limit, or an explicit close from anywhere in the server. Whatever
//! ends it, disconnect cleanup runs exactly once.
//!
//! Every transport write is bounded by [`WRITE_TIMEOUT`]. A peer that stops
//! reading is closed, and a writer still stuck at teardown is aborted, so a
//! session never outlives its client.
//!
//! Transports hand the session a byte stream and a text sink, so raw TCP
//! and WebSocket connections share everything from framing up.

use std::{io, pin::pin, sync::Arc, time::Duration};

use athena_core::Environment;
use athena_proto::{Packet, PacketDecoder};
use bytes::{Bytes, BytesMut};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

use crate::{
    client::{Client, OUTBOUND_CAPACITY, Outbound},
    error::ServerError,
    handlers,
    server::Server,
};

/// Read buffer size for byte-stream transports.
const READ_CHUNK: usize = 4096;

/// Longest a single transport write, or the final flush, may take.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a read loop stopped.
#[derive(Debug)]
enum Ended {
    /// Peer closed the transport.
    PeerClosed,
    /// The server closed the client.
    Closed,
    /// No packet within the idle timeout.
    Idle,
}

/// Run a session over any byte-stream transport until it ends.
pub async fn run_io<E, T>(server: Arc<Server<E>>, ipid: String, io: T)
where
    E: Environment,
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(io);
    let inbound = futures::stream::unfold(read, |mut read| async move {
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        match read.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(buf.freeze()), read)),
            Err(e) => Some((Err(e), read)),
        }
    });
    let outbound = futures::sink::unfold(write, |mut write, text: String| async move {
        write.write_all(text.as_bytes()).await?;
        Ok::<_, io::Error>(write)
    });
    run(server, ipid, inbound, outbound).await;
}

/// Run a session until it ends.
///
/// `inbound` yields transport bytes in arrival order with arbitrary
/// boundaries; `outbound` accepts encoded packet text.
pub async fn run<E, R, W>(server: Arc<Server<E>>, ipid: String, inbound: R, outbound: W)
where
    E: Environment,
    R: Stream<Item = io::Result<Bytes>> + Send,
    W: Sink<String, Error = io::Error> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let id = server.clients().next_id();
    let client = Arc::new(Client::new(id, ipid, Arc::clone(server.name()), server.limits(), tx));
    server.clients().add(Arc::clone(&client));
    tracing::debug!("Connection {id} from {}", client.ipid());

    client.send(&Packet::new("decryptor").field("34"));
    let mut writer = tokio::spawn(write_loop(Arc::clone(&client), rx, outbound));

    match read_loop(&server, &client, inbound).await {
        Ok(ended) => tracing::debug!("Connection {id} ended: {ended:?}"),
        Err(e) => tracing::debug!("Connection {id} dropped: {e}"),
    }

    server.disconnect(&client);
    client.close();
    match tokio::time::timeout(WRITE_TIMEOUT, &mut writer).await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => tracing::warn!("Writer task for connection {id} failed: {e}"),
        Err(_) => {
            tracing::debug!("Connection {id} did not flush in time, dropping it");
            writer.abort();
        },
    }
}

async fn write_loop<W>(client: Arc<Client>, mut rx: mpsc::Receiver<Outbound>, sink: W)
where
    W: Sink<String, Error = io::Error>,
{
    let mut sink = pin!(sink);
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Packet(text) => match tokio::time::timeout(WRITE_TIMEOUT, sink.send(text)).await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => {
                    tracing::debug!("Write to {} failed: {e}", client.ipid());
                    client.close();
                    return;
                },
                Err(_) => {
                    tracing::debug!("Write to {} timed out", client.ipid());
                    client.close();
                    return;
                },
            },
            Outbound::Close => break,
        }
    }
    let _ = tokio::time::timeout(WRITE_TIMEOUT, sink.close()).await;
}

/// Resolves after `timeout`, or never when idling is allowed.
async fn idle<E: Environment>(env: &E, timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => env.sleep(timeout).await,
        None => std::future::pending().await,
    }
}

async fn read_loop<E, R>(server: &Arc<Server<E>>, client: &Arc<Client>, inbound: R) -> Result<Ended, ServerError>
where
    E: Environment,
    R: Stream<Item = io::Result<Bytes>>,
{
    let config = &server.config().server;
    let timeout = (config.idle_timeout_secs > 0).then(|| Duration::from_secs(config.idle_timeout_secs));
    let mut decoder = PacketDecoder::new(config.max_packet_size);
    let mut inbound = pin!(inbound);

    loop {
        let bytes = tokio::select! {
            () = client.closed() => return Ok(Ended::Closed),
            () = idle(server.env(), timeout) => {
                client.close();
                return Ok(Ended::Idle);
            },
            next = inbound.next() => match next {
                Some(bytes) => bytes?,
                None => return Ok(Ended::PeerClosed),
            },
        };

        decoder.extend(&bytes);
        while let Some(packet) = decoder.next_packet()? {
            if client.is_joined() && client.check_rate(server.now()).is_err() {
                tracing::info!("Rate limit exceeded by {}", client.ipid());
                server.kick(client, "Rate limit exceeded.");
                return Ok(Ended::Closed);
            }
            handlers::handle(server, client, &packet);
            if client.is_closing() {
                return Ok(Ended::Closed);
            }
        }
    }
}
