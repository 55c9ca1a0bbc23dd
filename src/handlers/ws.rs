use crate::handlers::auth::{validate_jwt, Claims};
use crate::models::all_models::UserRole;
use actix::{Actor, AsyncContext, StreamHandler};
use actix_web::{web, Error, HttpMessage, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// WebSocket session struct
struct WebSocketSession {
    user_id: Option<Uuid>,
    role: Option<UserRole>,
    tx: Option<UnboundedSender<ws::Message>>,
    authenticated: bool,
}

/// Shared map of active WebSocket connections.
type UserSocketMap = Arc<Mutex<HashMap<Uuid, (UserRole, UnboundedSender<ws::Message>)>>>;
lazy_static! {
    static ref USER_SOCKETS: UserSocketMap = Arc::new(Mutex::new(HashMap::new()));
}

#[derive(Deserialize, Serialize)]
struct WebSocketClientMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    payload: Value,
}

impl Actor for WebSocketSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if self.authenticated {
            if let (Some(user_id), Some(role)) = (self.user_id, self.role) {
                info!("WebSocket connection started for user: {}", user_id);

                let (tx, rx): (UnboundedSender<ws::Message>, UnboundedReceiver<ws::Message>) =
                    unbounded();
                self.tx = Some(tx.clone());

                {
                    let mut sockets = USER_SOCKETS.lock().unwrap();
                    sockets.insert(user_id, (role, tx));
                    info!("Active WebSocket connections: {}", sockets.len());
                }

                ctx.add_stream(rx.map(|m| Ok(m)));

                let response = serde_json::json!({
                    "type": "connected",
                    "payload": {
                        "user_id": user_id.to_string(),
                        "role": role
                    }
                });
                ctx.text(serde_json::to_string(&response).unwrap());
            } else {
                error!("WebSocket session marked as authenticated but missing user_id or role");
                ctx.close(None);
            }
        } else {
            warn!("Rejecting unauthenticated WebSocket connection");
            ctx.close(None);
        }
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        if let Some(user_id) = self.user_id {
            info!("WebSocket disconnected: {}", user_id);
            USER_SOCKETS.lock().unwrap().remove(&user_id);
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                debug!("Received text message: {}", text);
                match serde_json::from_str::<WebSocketClientMessage>(&text) {
                    Ok(client_message) => {
                        // The socket is push-only for lifecycle events; the
                        // only inbound message we answer is a keepalive.
                        if client_message.message_type == "ping" {
                            let response = serde_json::json!({ "type": "pong" });
                            ctx.text(serde_json::to_string(&response).unwrap());
                        }
                    }
                    Err(e) => {
                        error!("Invalid message format: {}", e);
                        let response = serde_json::json!({
                            "type": "error",
                            "payload": {
                                "message": "Invalid message format"
                            }
                        });
                        ctx.text(serde_json::to_string(&response).unwrap());
                    }
                }
            }
            Ok(ws::Message::Ping(msg)) => {
                debug!("Ping received");
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                debug!("Pong received");
            }
            Ok(ws::Message::Binary(bin)) => {
                debug!("Binary message received, length: {}", bin.len());
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Close message received: {:?}", reason);
                ctx.close(reason);
            }
            Ok(ws::Message::Continuation(_)) => {
                debug!("Continuation message received");
            }
            Ok(ws::Message::Nop) => {
                debug!("Nop message received");
            }
            Err(e) => {
                error!("Error in WebSocket message: {}", e);
            }
        }
    }
}

/// WebSocket connection handler
pub async fn ws_connect(req: HttpRequest, stream: web::Payload) -> Result<HttpResponse, Error> {
    info!("WebSocket connection request received");

    // Normal path: the auth middleware already put claims on the request
    if let Some(claims) = req.extensions().get::<Claims>() {
        let session = WebSocketSession {
            user_id: Some(claims.id),
            role: Some(claims.role),
            tx: None,
            authenticated: true,
        };
        return ws::start(session, &req, stream);
    }

    // Fallback for clients that cannot send cookies on the upgrade request:
    // a JWT smuggled through the websocket subprotocol list.
    if let Some(protocols) = req.headers().get("sec-websocket-protocol") {
        if let Ok(protocols_str) = protocols.to_str() {
            for protocol in protocols_str.split(',').map(|s| s.trim()) {
                if let Some(token) = protocol.strip_prefix("token-") {
                    match validate_jwt(token) {
                        Ok(claims) => {
                            info!("WebSocket authenticated via protocol: {}", claims.id);
                            let session = WebSocketSession {
                                user_id: Some(claims.id),
                                role: Some(claims.role),
                                tx: None,
                                authenticated: true,
                            };
                            return ws::start(session, &req, stream);
                        }
                        Err(e) => {
                            error!("Invalid token in WebSocket protocol: {}", e);
                        }
                    }
                }
            }
        }
    }

    warn!("WebSocket connection attempt without valid authentication");
    let session = WebSocketSession {
        user_id: None,
        role: None,
        tx: None,
        authenticated: false,
    };
    ws::start(session, &req, stream)
}

///  Send a payload to a single user
pub async fn send_to_user(user_id: &Uuid, payload: Value) -> Result<(), String> {
    let msg_str = match serde_json::to_string(&payload) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to serialize payload for user {}: {}", user_id, e);
            return Err(format!("Serialization error: {}", e));
        }
    };

    let sockets = match USER_SOCKETS.lock() {
        Ok(guard) => guard,
        Err(e) => {
            error!("Failed to acquire lock on USER_SOCKETS: {}", e);
            return Err("Internal server error: Failed to acquire lock".to_string());
        }
    };

    if let Some((_, tx)) = sockets.get(user_id) {
        match tx.unbounded_send(ws::Message::Text(msg_str.into())) {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Failed to send message to user {}: {}", user_id, e);
                Err(format!("Send error: {}", e))
            }
        }
    } else {
        debug!("User {} not connected", user_id);
        Err(format!("User {} not connected", user_id))
    }
}

///  Send a payload to all connected users with a specific role
pub async fn send_to_role(role: &UserRole, payload: Value) -> Result<usize, String> {
    let msg_str = match serde_json::to_string(&payload) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to serialize payload for role {:?}: {}", role, e);
            return Err(format!("Serialization error: {}", e));
        }
    };

    let sockets = match USER_SOCKETS.lock() {
        Ok(guard) => guard,
        Err(e) => {
            error!("Failed to acquire lock on USER_SOCKETS: {}", e);
            return Err("Internal server error: Failed to acquire lock".to_string());
        }
    };

    let mut success_count = 0;
    for (user_id, (user_role, tx)) in sockets.iter() {
        if user_role == role {
            match tx.unbounded_send(ws::Message::Text(msg_str.clone().into())) {
                Ok(_) => success_count += 1,
                Err(e) => error!("Failed to send message to user {}: {}", user_id, e),
            }
        }
    }

    Ok(success_count)
}

/// ws routes
pub fn init_ws_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/ws").route("/connect", web::get().to(ws_connect)));
}
