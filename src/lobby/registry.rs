//! Registry of live rooms, keyed by room code

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::game::room::{PlayerConnection, Room, RoomError, RoomHandle};
use crate::ws::protocol::Role;

use super::code;

/// Process-wide entry point for creating, finding and removing rooms
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    rng: Mutex<ChaCha8Rng>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }

    /// Registry with reproducible room codes
    #[cfg(test)]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            rooms: DashMap::new(),
            rng: Mutex::new(rng),
        }
    }

    /// Open a room with `creator` seated as p1 and return its code
    pub fn create_room(&self, creator_name: String, creator: PlayerConnection) -> String {
        let (room, code) = loop {
            let code = code::generate(&mut *self.rng.lock());
            match self.rooms.entry(code.clone()) {
                Entry::Vacant(slot) => {
                    let (room, handle) = Room::new(code.clone(), creator_name, creator);
                    slot.insert(handle);
                    break (room, code);
                }
                Entry::Occupied(_) => continue,
            }
        };

        tokio::spawn(room.run());
        info!(room = %code, active_rooms = self.rooms.len(), "Room created");
        code
    }

    /// Seat a second player in the room with `code` (any case)
    pub async fn join_room(
        &self,
        code: &str,
        name: String,
        conn: PlayerConnection,
    ) -> Result<(RoomHandle, Role), RoomError> {
        let handle = self.get(code).ok_or(RoomError::NotFound)?;
        let role = handle.join(name, conn).await?;
        Ok((handle, role))
    }

    /// Remove the room if none of its players is still connected
    pub async fn remove_if_abandoned(&self, code: &str) -> bool {
        let Some(handle) = self.get(code) else {
            return false;
        };
        if !handle.close_if_abandoned().await {
            return false;
        }

        self.rooms.remove(&handle.code);
        info!(room = %handle.code, active_rooms = self.rooms.len(), "Room removed");
        true
    }

    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms
            .get(&code::normalize(code))
            .map(|r| r.value().clone())
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// (code, player count) per room, ordered by code
    pub fn summaries(&self) -> Vec<(String, usize)> {
        let mut rooms: Vec<(String, usize)> = self
            .rooms
            .iter()
            .map(|r| (r.key().clone(), r.value().player_count()))
            .collect();
        rooms.sort();
        rooms
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::ServerMsg;
    use tokio::sync::mpsc;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    fn connection() -> (PlayerConnection, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(1024);
        (PlayerConnection::new(Uuid::new_v4(), tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn codes_never_collide() {
        let registry = RoomRegistry::with_seed(3);
        let (conn, _rx) = connection();
        let first = registry.create_room("Ann".into(), conn);

        // Replay the generator so the next draw repeats the live code
        *registry.rng.lock() = ChaCha8Rng::seed_from_u64(3);
        let (conn, _rx2) = connection();
        let second = registry.create_room("Bo".into(), conn);

        assert_ne!(first, second);
        assert_eq!(registry.active_rooms(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn join_is_case_insensitive() {
        let registry = RoomRegistry::with_seed(11);
        let (conn, _p1_rx) = connection();
        let code = registry.create_room("Ann".into(), conn);

        let (conn, _p2_rx) = connection();
        let (handle, role) = assert_ok!(
            registry
                .join_room(&code.to_ascii_lowercase(), "Bo".into(), conn)
                .await
        );
        assert_eq!(role, Role::P2);
        assert_eq!(handle.code, code);
        assert_eq!(registry.total_players(), 2);
        assert_eq!(registry.summaries(), vec![(code, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn join_errors() {
        let registry = RoomRegistry::with_seed(5);
        let (conn, _rx) = connection();
        assert_eq!(
            registry.join_room("ZZZZ", "Bo".into(), conn).await.err(),
            Some(RoomError::NotFound)
        );

        let (conn, _p1_rx) = connection();
        let code = registry.create_room("Ann".into(), conn);
        let (conn, _p2_rx) = connection();
        assert_ok!(registry.join_room(&code, "Bo".into(), conn).await);

        let (conn, _p3_rx) = connection();
        let err = registry.join_room(&code, "Cy".into(), conn).await.err();
        assert_eq!(err, Some(RoomError::Full));
        assert_eq!(err.map(|e| e.to_string()).as_deref(), Some("Room is full"));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_rooms_are_removed_only_when_everyone_left() {
        let registry = RoomRegistry::with_seed(9);
        let (conn, p1_rx) = connection();
        let code = registry.create_room("Ann".into(), conn);
        let (conn, p2_rx) = connection();
        let (handle, _) = assert_ok!(registry.join_room(&code, "Bo".into(), conn).await);

        drop(p2_rx);
        handle.disconnect(Role::P2).await;
        assert!(!registry.remove_if_abandoned(&code).await);
        assert!(registry.get(&code).is_some());

        drop(p1_rx);
        assert!(registry.remove_if_abandoned(&code).await);
        assert!(registry.get(&code).is_none());
        assert_eq!(registry.active_rooms(), 0);

        // Already gone
        assert!(!registry.remove_if_abandoned(&code).await);
    }
}
