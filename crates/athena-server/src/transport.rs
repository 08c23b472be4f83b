//! TCP and WebSocket listeners.
//!
//! Both listeners accept connections, derive the client's IPID and hand the
//! connection to [`session`]. WebSocket frames are treated as opaque bytes in
//! both directions; outbound packets go out as binary frames so no UTF-8
//! validation is imposed on protocol content.
//!
//! A listener that fails to bind or stops accepting reports through
//! [`Server::fatal`]; a failure on one connection only ends that connection.

use std::{io, net::SocketAddr, sync::Arc};

use athena_core::Environment;
use bytes::Bytes;
use futures::{SinkExt, StreamExt, future};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};

use crate::{error::ServerError, ipid, server::Server, session};

/// Bind a listener.
///
/// # Errors
///
/// `ServerError::Bind` if the address is unusable.
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind { addr: addr.to_string(), source })
}

/// Bind the raw TCP listener and serve it in the background.
///
/// Returns the bound address.
///
/// # Errors
///
/// `ServerError::Bind` if the address is unusable.
pub async fn listen_tcp<E: Environment>(server: &Arc<Server<E>>, addr: &str) -> Result<SocketAddr, ServerError> {
    let listener = bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!("TCP listener on {local}");
    tokio::spawn(accept_tcp(Arc::clone(server), listener, local));
    Ok(local)
}

/// Bind the WebSocket listener and serve it in the background.
///
/// Returns the bound address.
///
/// # Errors
///
/// `ServerError::Bind` if the address is unusable.
pub async fn listen_ws<E: Environment>(server: &Arc<Server<E>>, addr: &str) -> Result<SocketAddr, ServerError> {
    let listener = bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!("WebSocket listener on {local}");
    tokio::spawn(accept_ws(Arc::clone(server), listener, local));
    Ok(local)
}

async fn accept_tcp<E: Environment>(server: Arc<Server<E>>, listener: TcpListener, local: SocketAddr) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!("set_nodelay failed for {peer}: {e}");
                }
                let ipid = ipid::ipid(&peer.to_string());
                tokio::spawn(session::run_io(Arc::clone(&server), ipid, stream));
            },
            Err(source) => {
                server.fatal(ServerError::Accept { addr: local, source });
                return;
            },
        }
    }
}

async fn accept_ws<E: Environment>(server: Arc<Server<E>>, listener: TcpListener, local: SocketAddr) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    if let Err(e) = ws_session(server, stream, peer).await {
                        tracing::debug!("WebSocket connection from {peer} failed: {e}");
                    }
                });
            },
            Err(source) => {
                server.fatal(ServerError::Accept { addr: local, source });
                return;
            },
        }
    }
}

/// Headers the handshake callback pulls out of the upgrade request.
#[derive(Debug, Default)]
struct Handshake {
    forwarded_for: Option<String>,
    real_ip: Option<String>,
}

fn header(request: &Request, name: &str) -> Option<String> {
    request.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn ws_session<E: Environment>(
    server: Arc<Server<E>>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), ServerError> {
    let mut handshake = Handshake::default();
    let origins = server.origins().clone();
    let check = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let origin = header(request, "origin");
        let host = header(request, "host");
        if !origins.permits(origin.as_deref(), host.as_deref()) {
            tracing::warn!("Rejected WebSocket from {peer} with origin {origin:?}");
            let mut refusal = ErrorResponse::new(Some("Origin not allowed".to_string()));
            *refusal.status_mut() = StatusCode::FORBIDDEN;
            return Err(refusal);
        }
        handshake.forwarded_for = header(request, "x-forwarded-for");
        handshake.real_ip = header(request, "x-real-ip");
        Ok(response)
    };
    let ws = accept_hdr_async(stream, check).await.map_err(|e| ServerError::WebSocket(e.to_string()))?;

    let address = ipid::real_ip(
        peer,
        handshake.forwarded_for.as_deref(),
        handshake.real_ip.as_deref(),
        server.config().server.reverse_proxy_mode,
    );
    let ipid = ipid::ipid(&address);

    let (sink, stream) = ws.split();
    let inbound = stream
        .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Binary(bytes)) => Some(Ok(bytes)),
                Ok(Message::Text(text)) => Some(Ok(Bytes::from(text))),
                Ok(_) => None,
                Err(e) => Some(Err(io::Error::other(e))),
            })
        });
    let outbound = sink
        .sink_map_err(io::Error::other)
        .with(|text: String| future::ready(Ok::<_, io::Error>(Message::binary(text))));

    session::run(server, ipid, inbound, outbound).await;
    Ok(())
}
