use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::dispatch::{is_client_error, Dispatcher};
use crate::wire::{read_request, write_response, Status};

/// TCP front end for a [`Dispatcher`].
///
/// One task per connection. Requests on a connection are answered in the
/// order they arrive; the dispatch itself runs on the blocking pool because
/// loading archive contents may touch the disk.
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    max_response_size: usize,
}

impl Server {
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: Dispatcher,
        max_response_size: usize,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
            max_response_size,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        info!(addr = %self.local_addr()?, "archive server listening");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down archive server");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.context("failed to accept connection")?;
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let max = self.max_response_size;
                    tokio::spawn(async move {
                        debug!(%peer, "connection opened");
                        match serve_connection(stream, peer, dispatcher, max).await {
                            Ok(()) => debug!(%peer, "connection closed"),
                            Err(e) => warn!(%peer, error = %format!("{e:#}"), "connection failed"),
                        }
                    });
                }
            }
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(std::future::pending()).await
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    max_response_size: usize,
) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;
    let (mut rd, wr) = stream.into_split();
    let mut wr = BufWriter::new(wr);

    while let Some(request) = read_request(&mut rd).await? {
        debug!(%peer, channel = request.channel, id = request.id, "archive request");

        let d = Arc::clone(&dispatcher);
        let outcome = tokio::task::spawn_blocking(move || d.dispatch(request)).await;

        match outcome {
            Ok(Ok(response)) if response.data.len() > max_response_size => {
                warn!(
                    %peer,
                    channel = request.channel,
                    id = request.id,
                    len = response.data.len(),
                    "response exceeds size limit"
                );
                let msg = format!(
                    "response of {} bytes exceeds limit {}",
                    response.data.len(),
                    max_response_size
                );
                let (channel, id) = (request.channel, request.id);
                write_response(&mut wr, channel, id, Status::Internal, msg.as_bytes()).await?;
            }
            Ok(Ok(response)) => {
                write_response(&mut wr, response.channel, response.id, Status::Ok, &response.data)
                    .await?;
            }
            Ok(Err(err)) => {
                if is_client_error(&err) {
                    debug!(
                        %peer,
                        channel = request.channel,
                        id = request.id,
                        error = %err,
                        "request rejected"
                    );
                } else {
                    warn!(
                        %peer,
                        channel = request.channel,
                        id = request.id,
                        error = %err,
                        "request failed"
                    );
                }
                let status = Status::of(&err);
                let msg = err.to_string();
                write_response(&mut wr, request.channel, request.id, status, msg.as_bytes()).await?;
            }
            Err(join) => {
                error!(
                    %peer,
                    channel = request.channel,
                    id = request.id,
                    error = %join,
                    "dispatch task failed"
                );
                let msg = b"internal error";
                write_response(&mut wr, request.channel, request.id, Status::Internal, msg).await?;
            }
        }
        wr.flush().await?;
    }
    Ok(())
}
