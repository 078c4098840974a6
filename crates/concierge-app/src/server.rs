// WebSocket server for the browser front end.
//
// Every connection gets its own task. Text frames are JSON requests handled
// in arrival order; responses are queued on a channel drained by a writer
// task so a long chat stream never blocks on the socket directly.

use std::sync::Arc;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::app::AppContext;

/// Outbound frames buffered per connection.
const OUTBOUND_BUFFER: usize = 256;

/// Bind `127.0.0.1:{port}`.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    info!("WebSocket server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections forever, serving each on its own task.
pub async fn run(listener: TcpListener, ctx: Arc<AppContext>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let addr = addr.to_string();
        debug!("Accepted TCP connection from {addr}");

        let ctx = ctx.clone();
        tokio::spawn(async move {
            serve_connection(stream, &addr, &ctx).await;
            info!("Client {addr} disconnected");
        });
    }
}

async fn serve_connection(stream: TcpStream, addr: &str, ctx: &AppContext) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };
    info!("Client {addr} connected");

    let (mut write, read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let writer_addr = addr.to_string();
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = write.send(Message::Text(frame.into())).await {
                warn!("WebSocket write to {writer_addr} failed: {e}");
                break;
            }
        }
        let _ = write.close().await;
    });

    process_message_stream(read, ctx, &out_tx, addr).await;

    drop(out_tx);
    let _ = writer.await;
}

/// Handle raw WebSocket [`Message`] items from any [`Stream`], writing
/// response frames to `out`. Returns when the client closes, the stream
/// errors or `out` is closed. No I/O of its own, so tests drive it with
/// in-memory streams.
pub async fn process_message_stream<St>(
    mut stream: St,
    ctx: &AppContext,
    out: &mpsc::Sender<String>,
    addr: &str,
) where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if ctx.handle_frame(text.as_str(), out).await.is_err() {
                    debug!("Client {addr} output closed");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Binary, Ping, Pong and raw frames carry no requests.
            }
        }
    }
}
