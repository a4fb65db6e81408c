//! Room actor: one task per room serializes commands and timers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{Role, ServerMsg, UnitSnapshot};

use super::round::{RoundController, RoundPhase};

/// Players per room
pub const ROOM_CAPACITY: usize = 2;

/// Room errors surfaced to the requesting connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,

    #[error("Room is full")]
    Full,
}

/// Send half of a client connection. Delivery is fire-and-forget.
#[derive(Debug, Clone)]
pub struct PlayerConnection {
    pub id: Uuid,
    tx: mpsc::Sender<ServerMsg>,
}

impl PlayerConnection {
    pub fn new(id: Uuid, tx: mpsc::Sender<ServerMsg>) -> Self {
        Self { id, tx }
    }

    /// Queue a message; returns false if it was skipped
    pub fn send(&self, msg: ServerMsg) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "Outbound queue full, dropping message");
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// A seated player
#[derive(Debug, Clone)]
pub struct Player {
    pub role: Role,
    pub name: String,
    pub conn: PlayerConnection,
}

/// Commands accepted by a room task
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        name: String,
        conn: PlayerConnection,
        reply: oneshot::Sender<Result<Role, RoomError>>,
    },
    Spawn {
        role: Role,
        archetype_id: String,
        row: i32,
        col: i32,
    },
    Disconnect {
        role: Role,
    },
    /// Stop the room if no player connection is open; replies whether it stopped
    CloseIfAbandoned {
        reply: oneshot::Sender<bool>,
    },
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub code: String,
    cmd_tx: mpsc::Sender<RoomCommand>,
    player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    pub async fn join(&self, name: String, conn: PlayerConnection) -> Result<Role, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::Join { name, conn, reply })
            .await
            .map_err(|_| RoomError::NotFound)?;
        // A room that stops before answering is gone
        rx.await.unwrap_or(Err(RoomError::NotFound))
    }

    pub async fn spawn(&self, role: Role, archetype_id: String, row: i32, col: i32) {
        let cmd = RoomCommand::Spawn {
            role,
            archetype_id,
            row,
            col,
        };
        if self.cmd_tx.send(cmd).await.is_err() {
            debug!(room = %self.code, "Spawn for closed room ignored");
        }
    }

    pub async fn disconnect(&self, role: Role) {
        if self.cmd_tx.send(RoomCommand::Disconnect { role }).await.is_err() {
            debug!(room = %self.code, role = %role, "Disconnect for closed room ignored");
        }
    }

    pub async fn close_if_abandoned(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(RoomCommand::CloseIfAbandoned { reply })
            .await
            .is_err()
        {
            return true;
        }
        rx.await.unwrap_or(true)
    }
}

/// The authoritative room
pub struct Room {
    code: String,
    players: Vec<Player>,
    round: RoundController,
    inbox: mpsc::Receiver<RoomCommand>,
    player_count: Arc<AtomicUsize>,
}

impl Room {
    /// Create a room seating `creator` as p1
    pub fn new(code: String, creator_name: String, creator: PlayerConnection) -> (Self, RoomHandle) {
        let (cmd_tx, inbox) = mpsc::channel(256);
        let player_count = Arc::new(AtomicUsize::new(1));

        let handle = RoomHandle {
            code: code.clone(),
            cmd_tx,
            player_count: player_count.clone(),
        };

        let room = Self {
            round: RoundController::new(code.clone()),
            code,
            players: vec![Player {
                role: Role::P1,
                name: creator_name,
                conn: creator,
            }],
            inbox,
            player_count,
        };

        (room, handle)
    }

    /// Run until the room is closed. Dropping the room drops every timer.
    pub async fn run(mut self) {
        info!(room = %self.code, "Room opened");

        loop {
            tokio::select! {
                biased;
                cmd = self.inbox.recv() => match cmd {
                    Some(RoomCommand::CloseIfAbandoned { reply }) => {
                        let abandoned = self.is_abandoned();
                        let _ = reply.send(abandoned);
                        if abandoned {
                            break;
                        }
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                event = self.round.next_event() => {
                    for msg in self.round.handle(event) {
                        self.broadcast(&msg);
                    }
                }
            }
        }

        self.round.shutdown();
        info!(room = %self.code, "Room closed");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { name, conn, reply } => self.handle_join(name, conn, reply),
            RoomCommand::Spawn {
                role,
                archetype_id,
                row,
                col,
            } => self.handle_spawn(role, &archetype_id, row, col),
            RoomCommand::Disconnect { role } => self.handle_disconnect(role),
            RoomCommand::CloseIfAbandoned { reply } => {
                let _ = reply.send(self.is_abandoned());
            }
        }
    }

    fn handle_join(
        &mut self,
        name: String,
        conn: PlayerConnection,
        reply: oneshot::Sender<Result<Role, RoomError>>,
    ) {
        // A room whose creator already left is only waiting to be swept
        if self.round.phase() == RoundPhase::Halted || self.is_abandoned() {
            debug!(room = %self.code, "Join refused, room abandoned");
            let _ = reply.send(Err(RoomError::NotFound));
            return;
        }
        if self.players.len() >= ROOM_CAPACITY {
            let _ = reply.send(Err(RoomError::Full));
            return;
        }

        let role = Role::P2;
        conn.send(ServerMsg::JoinedRoom {
            code: self.code.clone(),
            role,
        });
        self.broadcast_except(role, &ServerMsg::OpponentJoined { name: name.clone() });

        self.players.push(Player { role, name, conn });
        self.player_count.store(self.players.len(), Ordering::Relaxed);
        let _ = reply.send(Ok(role));

        info!(room = %self.code, role = %role, "Player joined room");

        let p1_name = self.name_of(Role::P1).to_string();
        let p2_name = self.name_of(Role::P2).to_string();
        if !self.round.begin_match(&p1_name, &p2_name) {
            warn!(room = %self.code, phase = ?self.round.phase(), "Match already under way");
        }
    }

    fn handle_spawn(&mut self, role: Role, archetype_id: &str, row: i32, col: i32) {
        match self.round.try_spawn(role, archetype_id, row, col) {
            Ok(unit) => {
                debug!(room = %self.code, role = %role, unit_id = unit.id, archetype = unit.archetype_id, row, col, "Unit spawned");
                self.broadcast(&ServerMsg::UnitSpawned {
                    unit: UnitSnapshot::from(&unit),
                });
            }
            Err(err) => match err.denial_reason() {
                Some(reason) => {
                    debug!(room = %self.code, role = %role, %reason, "Spawn denied");
                    self.send_to(role, ServerMsg::SpawnDenied { reason });
                }
                None => debug!(room = %self.code, role = %role, error = %err, "Spawn ignored"),
            },
        }
    }

    fn handle_disconnect(&mut self, role: Role) {
        info!(room = %self.code, role = %role, "Player disconnected");
        self.round.halt();
        self.broadcast_except(role, &ServerMsg::OpponentDisconnected);
    }

    fn is_abandoned(&self) -> bool {
        self.players.iter().all(|p| !p.conn.is_open())
    }

    fn name_of(&self, role: Role) -> &str {
        self.players
            .iter()
            .find(|p| p.role == role)
            .map(|p| p.name.as_str())
            .unwrap_or_default()
    }

    fn send_to(&self, role: Role, msg: ServerMsg) {
        if let Some(player) = self.players.iter().find(|p| p.role == role) {
            player.conn.send(msg);
        }
    }

    fn broadcast(&self, msg: &ServerMsg) {
        for player in &self.players {
            player.conn.send(msg.clone());
        }
    }

    fn broadcast_except(&self, role: Role, msg: &ServerMsg) {
        for player in self.players.iter().filter(|p| p.role != role) {
            player.conn.send(msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::assert_ok;

    fn connection() -> (PlayerConnection, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(1024);
        (PlayerConnection::new(Uuid::new_v4(), tx), rx)
    }

    fn open_room() -> (RoomHandle, mpsc::Receiver<ServerMsg>) {
        let (conn, rx) = connection();
        let (room, handle) = Room::new("WXYZ".into(), "Ann".into(), conn);
        tokio::spawn(room.run());
        (handle, rx)
    }

    async fn next_matching(
        rx: &mut mpsc::Receiver<ServerMsg>,
        pred: impl Fn(&ServerMsg) -> bool,
    ) -> ServerMsg {
        loop {
            let msg = rx.recv().await.expect("connection closed");
            if pred(&msg) {
                return msg;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn join_starts_the_match() {
        let (handle, mut p1_rx) = open_room();
        let (conn, mut p2_rx) = connection();

        let role = assert_ok!(handle.join("Bo".into(), conn).await);
        assert_eq!(role, Role::P2);
        assert_eq!(handle.player_count(), 2);

        assert_eq!(
            p2_rx.recv().await,
            Some(ServerMsg::JoinedRoom {
                code: "WXYZ".into(),
                role: Role::P2
            })
        );
        assert_eq!(
            p1_rx.recv().await,
            Some(ServerMsg::OpponentJoined { name: "Bo".into() })
        );

        let start = ServerMsg::GameStart {
            p1_name: "Ann".into(),
            p2_name: "Bo".into(),
        };
        assert_eq!(p1_rx.recv().await, Some(start.clone()));
        assert_eq!(p2_rx.recv().await, Some(start));

        let round = ServerMsg::RoundStart {
            round: 1,
            time_left: 20,
            p1_stars: 0,
            p2_stars: 0,
        };
        assert_eq!(p1_rx.recv().await, Some(round.clone()));
        assert_eq!(p2_rx.recv().await, Some(round));
    }

    #[tokio::test(start_paused = true)]
    async fn third_player_is_turned_away() {
        let (handle, _p1_rx) = open_room();
        let (conn, _p2_rx) = connection();
        assert_ok!(handle.join("Bo".into(), conn).await);

        let (conn, _p3_rx) = connection();
        assert_eq!(handle.join("Cy".into(), conn).await, Err(RoomError::Full));
        assert_eq!(handle.player_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn spawns_are_broadcast_or_denied_to_the_sender() {
        let (handle, mut p1_rx) = open_room();
        let (conn, mut p2_rx) = connection();
        assert_ok!(handle.join("Bo".into(), conn).await);
        next_matching(&mut p1_rx, |m| matches!(m, ServerMsg::RoundStart { .. })).await;
        next_matching(&mut p2_rx, |m| matches!(m, ServerMsg::RoundStart { .. })).await;

        handle.spawn(Role::P1, "tank".into(), 5, 5).await;
        let spawned = next_matching(&mut p2_rx, |m| matches!(m, ServerMsg::UnitSpawned { .. })).await;
        match spawned {
            ServerMsg::UnitSpawned { unit } => {
                assert_eq!((unit.id, unit.row, unit.col, unit.hp), (0, 5, 5, 220));
                assert_eq!(unit.team, Role::P1);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        handle.spawn(Role::P2, "archer".into(), 7, 3).await;
        handle.spawn(Role::P2, "archer".into(), 3, 3).await;
        assert_eq!(
            next_matching(&mut p2_rx, |m| matches!(
                m,
                ServerMsg::SpawnDenied { .. } | ServerMsg::UnitSpawned { .. }
            ))
            .await,
            ServerMsg::SpawnDenied {
                reason: "Wrong zone".into()
            }
        );
        let spawned = next_matching(&mut p1_rx, |m| {
            matches!(m, ServerMsg::UnitSpawned { unit } if unit.team == Role::P2)
        })
        .await;
        assert!(matches!(spawned, ServerMsg::UnitSpawned { unit } if unit.id == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_archetype_is_silent() {
        let (handle, mut p1_rx) = open_room();
        let (conn, _p2_rx) = connection();
        assert_ok!(handle.join("Bo".into(), conn).await);
        next_matching(&mut p1_rx, |m| matches!(m, ServerMsg::RoundStart { .. })).await;

        handle.spawn(Role::P1, "dragon".into(), 5, 5).await;
        handle.spawn(Role::P1, "soldier".into(), 6, 6).await;
        let msg = next_matching(&mut p1_rx, |m| {
            matches!(m, ServerMsg::UnitSpawned { .. } | ServerMsg::SpawnDenied { .. })
        })
        .await;
        assert!(matches!(msg, ServerMsg::UnitSpawned { unit } if unit.archetype_id == "soldier" && unit.id == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_halts_match_and_notifies_opponent() {
        let (handle, mut p1_rx) = open_room();
        let (conn, p2_rx) = connection();
        assert_ok!(handle.join("Bo".into(), conn).await);
        next_matching(&mut p1_rx, |m| matches!(m, ServerMsg::RoundStart { .. })).await;

        drop(p2_rx);
        handle.disconnect(Role::P2).await;
        next_matching(&mut p1_rx, |m| matches!(m, ServerMsg::OpponentDisconnected)).await;

        // No timer survives the halt
        assert!(timeout(Duration::from_secs(30), p1_rx.recv()).await.is_err());

        assert!(!handle.close_if_abandoned().await);
        assert!(handle.is_running());

        drop(p1_rx);
        assert!(handle.close_if_abandoned().await);
        tokio::task::yield_now().await;
        assert!(!handle.is_running());
        assert_eq!(handle.join("Cy".into(), connection().0).await, Err(RoomError::NotFound));
        // Late disconnects for a stopped room are dropped quietly
        handle.disconnect(Role::P1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn join_after_creator_left_is_refused() {
        let (handle, p1_rx) = open_room();
        drop(p1_rx);
        handle.disconnect(Role::P1).await;

        let (conn, mut p2_rx) = connection();
        assert_eq!(handle.join("Bo".into(), conn).await, Err(RoomError::NotFound));
        // The joiner was never seated, so nothing was sent and nothing holds its connection
        assert_eq!(p2_rx.recv().await, None);
        assert_eq!(handle.player_count(), 1);
        assert!(handle.close_if_abandoned().await);
    }

    #[tokio::test(start_paused = true)]
    async fn join_into_a_dead_connection_is_refused() {
        let (handle, p1_rx) = open_room();
        // Socket gone, disconnect not yet delivered
        drop(p1_rx);

        let (conn, _p2_rx) = connection();
        assert_eq!(handle.join("Bo".into(), conn).await, Err(RoomError::NotFound));
        assert_eq!(handle.player_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_between_rounds_cancels_the_next_round() {
        let (handle, mut p1_rx) = open_room();
        let (conn, p2_rx) = connection();
        assert_ok!(handle.join("Bo".into(), conn).await);
        next_matching(&mut p1_rx, |m| matches!(m, ServerMsg::RoundEnd { round: 1, .. })).await;

        drop(p2_rx);
        handle.disconnect(Role::P2).await;
        next_matching(&mut p1_rx, |m| matches!(m, ServerMsg::OpponentDisconnected)).await;

        assert!(timeout(Duration::from_secs(30), p1_rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_after_deciding_round_still_ends_the_game() {
        let (handle, mut p1_rx) = open_room();
        let (conn, p2_rx) = connection();
        assert_ok!(handle.join("Bo".into(), conn).await);

        for _ in 0..2 {
            next_matching(&mut p1_rx, |m| matches!(m, ServerMsg::RoundStart { .. })).await;
            handle.spawn(Role::P1, "tank".into(), 9, 0).await;
            next_matching(&mut p1_rx, |m| matches!(m, ServerMsg::RoundEnd { .. })).await;
        }

        drop(p2_rx);
        handle.disconnect(Role::P2).await;

        let mut seen = Vec::new();
        loop {
            let msg = p1_rx.recv().await.expect("connection closed");
            let done = matches!(msg, ServerMsg::GameOver { .. });
            seen.push(msg);
            if done {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                ServerMsg::OpponentDisconnected,
                ServerMsg::GameOver {
                    p1_stars: 2,
                    p2_stars: 0
                }
            ]
        );

        assert!(timeout(Duration::from_secs(30), p1_rx.recv()).await.is_err());
    }
}
