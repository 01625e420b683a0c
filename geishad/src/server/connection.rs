//! Protocol dispatcher for one connection
//!
//! Newline-delimited JSON: one request per line, one response per line.
//! A `Subscribe` request switches the connection into event mode for the
//! rest of its life: the server writes one event tag per line and reads
//! nothing further.

use futures::{SinkExt, StreamExt};
use geisha_common::{Event, Method, Request, Response};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ServerContext;
use crate::error::{Error, Result};

/// Longest accepted request line
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

type Lines = Framed<TcpStream, LinesCodec>;

/// How the request phase ended
enum Outcome {
    Closed,
    Subscribe,
}

/// Run the dispatcher until the peer leaves, the connection fails, or
/// `shutdown` fires
pub async fn handle_connection(
    stream: TcpStream,
    context: ServerContext,
    shutdown: CancellationToken,
) {
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    match serve_requests(&mut lines, &context, &shutdown).await {
        Ok(Outcome::Subscribe) => {
            let events = context.bus.subscribe();
            stream_events(lines, events, &shutdown).await;
        }
        Ok(Outcome::Closed) => {}
        Err(e) => debug!("Dropping connection: {}", e),
    }
}

async fn serve_requests(
    lines: &mut Lines,
    context: &ServerContext,
    shutdown: &CancellationToken,
) -> Result<Outcome> {
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return Ok(Outcome::Closed),
            next = timeout(context.idle_timeout, lines.next()) => match next {
                Err(_) => return Err(Error::Protocol("idle timeout".to_string())),
                Ok(None) => return Ok(Outcome::Closed),
                Ok(Some(Err(e))) => return Err(Error::Protocol(e.to_string())),
                Ok(Some(Ok(line))) => line,
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(&line) {
            Ok(request) => request,
            // Valid JSON of the wrong shape is a bad request, not a broken stream
            Err(e) if e.is_data() => {
                debug!("Malformed request: {}", e);
                send_response(lines, &Response::err()).await?;
                continue;
            }
            Err(e) => return Err(Error::Protocol(format!("undecodable request: {e}"))),
        };

        if request.method == Method::Subscribe {
            return Ok(Outcome::Subscribe);
        }

        let response = context.player.request(request).await?;
        send_response(lines, &response).await?;
    }
}

async fn send_response(lines: &mut Lines, response: &Response) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| Error::Protocol(format!("failed to encode response: {e}")))?;
    lines
        .send(json)
        .await
        .map_err(|e| Error::Protocol(e.to_string()))
}

/// Write event tags until the bus drops our sink, the peer goes away, or
/// shutdown
async fn stream_events(
    mut lines: Lines,
    mut events: mpsc::Receiver<Event>,
    shutdown: &CancellationToken,
) {
    debug!("Connection subscribed");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("Subscriber dropped by event bus");
                    break;
                };
                if let Err(e) = lines.send(event.tag()).await {
                    debug!("Event write failed: {}", e);
                    break;
                }
            }
            incoming = lines.next() => match incoming {
                // Anything sent after subscribing is ignored
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }
}
