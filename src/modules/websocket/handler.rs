/// WebSocket HTTP Handler
///
/// Upgrades the request and runs the bidirectional loop:
/// - Inbound:  Client -> WebSocket -> parse ClientMessage -> Session Actor
/// - Outbound: Server Actor -> Session Actor -> mpsc channel -> WebSocket -> Client
use actix::{Actor, Addr};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use tokio::sync::mpsc;

use super::events::{Heartbeat, Shutdown};
use super::message::ClientMessage;
use super::server::WebSocketServer;
use super::session::{SessionConfig, WebSocketSession};

/// `GET /ws`. Authentication happens in-band with an `auth` frame.
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Addr<WebSocketServer>>,
    config: web::Data<SessionConfig>,
) -> Result<HttpResponse, Error> {
    tracing::debug!("WebSocket upgrade request from {:?}", req.peer_addr());

    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let addr =
        WebSocketSession::new(server.get_ref().clone(), tx, config.into_inner()).start();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(client_msg) => addr.do_send(client_msg),
                                Err(e) => {
                                    tracing::warn!(
                                        "Cannot parse client message: {} - raw: {}",
                                        e,
                                        text.chars().take(100).collect::<String>()
                                    );
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            addr.do_send(Heartbeat);
                            if let Err(e) = ws_session.pong(&data).await {
                                tracing::error!("Cannot send pong: {}", e);
                                break;
                            }
                        }

                        Some(Ok(Message::Pong(_))) => addr.do_send(Heartbeat),

                        Some(Ok(Message::Close(reason))) => {
                            tracing::info!("WebSocket close frame: {:?}", reason);
                            break;
                        }

                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!("Binary messages are not supported");
                        }

                        Some(Ok(Message::Continuation(_) | Message::Nop)) => {}

                        Some(Err(e)) => {
                            tracing::error!("WebSocket protocol error: {}", e);
                            break;
                        }

                        None => break,
                    }
                }

                outbound = rx.recv() => {
                    // `None` once the session actor stopped (heartbeat timeout)
                    let Some(json) = outbound else { break };
                    if ws_session.text(json).await.is_err() {
                        tracing::error!("Cannot write to WebSocket client");
                        break;
                    }
                }
            }
        }

        addr.do_send(Shutdown);
        let _ = ws_session.close(None).await;
        tracing::debug!("WebSocket message loop finished");
    });

    Ok(response)
}
