// Minimal HTTPS responder used by `wileedot run`

use std::{convert::Infallible, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use log::{debug, error, info};
use wileedot::{IncomingConnection, TlsListener, error::WileedotError};

use crate::error::CliError;

/// Accept connections until Ctrl-C is received
pub async fn serve(listener: TlsListener) -> Result<(), CliError> {
    let listener = Arc::new(listener);
    if let Some(addr) = listener.local_addr().await {
        info!("Serving https://{} on {addr}", listener.domain());
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                listener.close().await;
                listener.stop_renewal();
                return Ok(());
            }
            incoming = listener.accept() => match incoming {
                Ok(incoming) => {
                    tokio::spawn(handle(incoming));
                }
                Err(WileedotError::ListenerClosed) => return Ok(()),
                Err(e) => error!("{e}"),
            }
        }
    }
}

async fn handle(incoming: IncomingConnection) {
    let peer_addr = incoming.peer_addr();

    let stream = match incoming.handshake().await {
        Ok(Some(stream)) => stream,
        Ok(None) => return,
        Err(e) => {
            debug!("Dropping connection from {peer_addr}: {e}");
            return;
        }
    };

    let io = TokioIo::new(stream);
    let conn = http1::Builder::new().serve_connection(io, service_fn(hello));

    if let Err(e) = conn.await {
        error!("{}", CliError::Http(e));
    }
}

async fn hello(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    debug!("{} {}", req.method(), req.uri().path());

    let body = greeting(req.uri().path());
    Ok(Response::new(Full::new(Bytes::from(body))))
}

fn greeting(path: &str) -> String {
    format!("Hello, {}!", path.strip_prefix('/').unwrap_or(path))
}
