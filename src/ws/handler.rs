//! WebSocket upgrade handler and per-connection session

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{PlayerConnection, RoomHandle};
use crate::lobby::RoomRegistry;
use crate::util::rate_limit::CommandRateLimiter;
use crate::util::time::ROOM_CLEANUP_DELAY;
use crate::ws::protocol::{ClientMsg, Role, ServerMsg};

/// Outbound messages buffered per connection before new ones are dropped
const OUTBOUND_CAPACITY: usize = 128;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.rooms))
}

/// The room a connection is seated in
struct Seat {
    handle: RoomHandle,
    role: Role,
}

/// Per-connection command routing
struct Session {
    conn: PlayerConnection,
    rooms: Arc<RoomRegistry>,
    seat: Option<Seat>,
}

impl Session {
    fn new(conn: PlayerConnection, rooms: Arc<RoomRegistry>) -> Self {
        Self {
            conn,
            rooms,
            seat: None,
        }
    }

    async fn handle(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::CreateRoom { name } => {
                if self.already_seated() {
                    return;
                }
                let name = name.unwrap_or_else(|| "Player 1".to_string());
                let code = self.rooms.create_room(name, self.conn.clone());
                self.seat = self.rooms.get(&code).map(|handle| Seat {
                    handle,
                    role: Role::P1,
                });
                self.conn.send(ServerMsg::RoomCreated {
                    code,
                    role: Role::P1,
                });
            }
            ClientMsg::JoinRoom { code, name } => {
                if self.already_seated() {
                    return;
                }
                let name = name.unwrap_or_else(|| "Player 2".to_string());
                match self.rooms.join_room(&code, name, self.conn.clone()).await {
                    Ok((handle, role)) => self.seat = Some(Seat { handle, role }),
                    Err(e) => {
                        debug!(conn_id = %self.conn.id, code = %code, error = %e, "Join refused");
                        self.conn.send(ServerMsg::Error { msg: e.to_string() });
                    }
                }
            }
            ClientMsg::Spawn {
                archetype_id,
                row,
                col,
            } => {
                if let Some(seat) = &self.seat {
                    seat.handle.spawn(seat.role, archetype_id, row, col).await;
                }
            }
            ClientMsg::Ping => {
                self.conn.send(ServerMsg::Pong);
            }
        }
    }

    fn already_seated(&self) -> bool {
        if let Some(seat) = &self.seat {
            warn!(conn_id = %self.conn.id, room = %seat.handle.code, "Connection already in a room");
            return true;
        }
        false
    }

    /// Tell the room we left and schedule its cleanup check
    async fn close(self) {
        let Some(seat) = self.seat else {
            return;
        };
        seat.handle.disconnect(seat.role).await;

        let rooms = self.rooms;
        let code = seat.handle.code;
        tokio::spawn(async move {
            tokio::time::sleep(ROOM_CLEANUP_DELAY).await;
            rooms.remove_if_abandoned(&code).await;
        });
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, rooms: Arc<RoomRegistry>) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_CAPACITY);
    let mut session = Session::new(PlayerConnection::new(conn_id, out_tx), rooms);

    // Writer task: room and session messages -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = CommandRateLimiter::new();

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(conn_id = %conn_id, "Rate limited client message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => session.handle(client_msg).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Closing the writer closes the connection for every room holding it
    writer_handle.abort();
    let _ = writer_handle.await;

    session.close().await;
    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
