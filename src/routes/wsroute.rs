use crate::models::message::{Attachment, NewMessage};
use crate::state::AppState;
use crate::websocket::message_types::{WsInboundEvent, WsOutboundEvent};
use crate::websocket::ConnectionId;
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::{Duration, Instant};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

// Fan-out payload forwarded from the registry channel to this session.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct FanoutPayload(String);

// Direct reply to this session only (errors, acks).
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct SessionReply(String);

/// One actor per live connection. The actor owns nothing durable: room
/// membership lives in the registry, messages in the store.
struct WsSession {
    conn_id: ConnectionId,
    state: AppState,
    hb: Instant,
}

impl WsSession {
    fn new(state: AppState) -> Self {
        Self {
            conn_id: ConnectionId::new(),
            state,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(connection = %act.conn_id, "WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_event(&self, evt: WsInboundEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let state = self.state.clone();
        let conn_id = self.conn_id;
        let addr = ctx.address();

        actix::spawn(async move {
            match evt {
                WsInboundEvent::JoinRoom { room_id } => {
                    state.registry.join(conn_id, &room_id).await;
                }
                WsInboundEvent::LeaveRoom { room_id: _ } => {
                    state.registry.leave(conn_id).await;
                }
                WsInboundEvent::SendMessage {
                    room_id,
                    sender_id,
                    receiver_id,
                    message,
                    attachment_url,
                    attachment_kind,
                } => {
                    let result = submit_message(
                        &state,
                        room_id,
                        sender_id,
                        receiver_id,
                        message,
                        attachment_url,
                        attachment_kind,
                    )
                    .await;

                    if let Err(e) = result {
                        tracing::warn!(error = %e, connection = %conn_id, "send_message failed");
                        let reply = WsOutboundEvent::Error {
                            detail: e.to_string(),
                        };
                        if let Ok(json) = serde_json::to_string(&reply) {
                            addr.do_send(SessionReply(json));
                        }
                    }
                }
            }
        });
    }
}

/// Persist-then-publish: the store append is the durability point; fan-out
/// happens only for the persisted record, so a client can never see a live
/// message that was silently lost. A slow store delays delivery but never
/// forks history.
async fn submit_message(
    state: &AppState,
    room_id: String,
    sender_id: String,
    receiver_id: String,
    message: String,
    attachment_url: Option<String>,
    attachment_kind: Option<crate::models::message::AttachmentKind>,
) -> Result<(), crate::error::AppError> {
    let attachment = match (attachment_url, attachment_kind) {
        (Some(url), Some(kind)) => Some(Attachment { url, kind }),
        (Some(_), None) => {
            return Err(crate::error::AppError::BadRequest(
                "attachment_kind is required with attachment_url".into(),
            ));
        }
        (None, Some(_)) => {
            return Err(crate::error::AppError::BadRequest(
                "attachment_url is required with attachment_kind".into(),
            ));
        }
        (None, None) => None,
    };

    if message.is_empty() && attachment.is_none() {
        return Err(crate::error::AppError::BadRequest(
            "message must carry text or an attachment".into(),
        ));
    }

    let persisted = state
        .store
        .append(NewMessage {
            room_id: room_id.clone(),
            sender_id,
            receiver_id,
            body: message,
            attachment,
        })
        .await?;

    let event = WsOutboundEvent::ReceiveMessage { message: persisted };
    let payload = serde_json::to_string(&event).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize fanout event");
        crate::error::AppError::Internal
    })?;

    let delivered = state.registry.publish(&room_id, payload).await;
    tracing::debug!(room = %room_id, delivered, "message fanned out");
    Ok(())
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(connection = %self.conn_id, "WebSocket session started");
        self.hb(ctx);

        // Bridge the registry channel into this actor's mailbox.
        let registry = self.state.registry.clone();
        let conn_id = self.conn_id;
        let addr = ctx.address();
        actix::spawn(async move {
            let mut rx = registry.register(conn_id).await;
            while let Some(payload) = rx.recv().await {
                addr.do_send(FanoutPayload(payload));
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(connection = %self.conn_id, "WebSocket session stopped");
        let registry = self.state.registry.clone();
        let conn_id = self.conn_id;
        actix::spawn(async move {
            registry.disconnect(conn_id).await;
        });
    }
}

impl Handler<FanoutPayload> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: FanoutPayload, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<SessionReply> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: SessionReply, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsInboundEvent>(&text) {
                Ok(evt) => self.handle_event(evt, ctx),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse WS message");
                    let reply = WsOutboundEvent::Error {
                        detail: format!("unrecognized event: {e}"),
                    };
                    if let Ok(json) = serde_json::to_string(&reply) {
                        ctx.text(json);
                    }
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(?reason, "WebSocket close received");
                ctx.stop();
            }
            _ => {}
        }
    }
}

#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    // Identity/session issuance happens upstream; by the time a socket
    // reaches this service the caller is already authenticated.
    let session = WsSession::new(state.as_ref().clone());
    ws::start(session, &req, stream)
}
