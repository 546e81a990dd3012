use crate::error::AskError;
use crate::protocol::{MemberInfo, ServerMessage};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use landlord_core::PlayerId;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub type ConnId = u64;
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug)]
struct Connection {
    outbox: Option<Outbox>,
    inbox_tx: mpsc::Sender<String>,
    inbox_rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
    closed: CancellationToken,
}

impl Connection {
    fn new(outbox: Option<Outbox>, capacity: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(capacity.max(1));
        Self {
            outbox,
            inbox_tx,
            inbox_rx: tokio::sync::Mutex::new(inbox_rx),
            closed: CancellationToken::new(),
        }
    }
}

#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    score: AtomicI64,
    room_id: AtomicU64,
    online: AtomicBool,
    reading: AtomicBool,
    session: AtomicBool,
    conn: RwLock<Arc<Connection>>,
    inbox_capacity: usize,
}

pub struct ReadGuard<'a> {
    player: &'a Player,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.player.reading.store(false, Ordering::SeqCst);
    }
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, outbox: Option<Outbox>, inbox_capacity: usize) -> Self {
        Self {
            id,
            name: name.into(),
            score: AtomicI64::new(0),
            room_id: AtomicU64::new(0),
            online: AtomicBool::new(true),
            reading: AtomicBool::new(false),
            session: AtomicBool::new(false),
            conn: RwLock::new(Arc::new(Connection::new(outbox, inbox_capacity))),
            inbox_capacity,
        }
    }

    fn connection(&self) -> Arc<Connection> {
        self.conn.read().clone()
    }

    /// Swaps in a fresh connection for a returning player. Any read pending on
    /// the old one ends with `Disconnected`.
    pub fn attach(&self, outbox: Option<Outbox>) {
        let fresh = Arc::new(Connection::new(outbox, self.inbox_capacity));
        let old = std::mem::replace(&mut *self.conn.write(), fresh);
        old.closed.cancel();
        self.online.store(true, Ordering::SeqCst);
    }

    pub fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
        self.connection().closed.cancel();
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn room_id(&self) -> u64 {
        self.room_id.load(Ordering::SeqCst)
    }

    pub fn set_room(&self, room_id: u64) {
        self.room_id.store(room_id, Ordering::SeqCst);
    }

    pub fn score(&self) -> i64 {
        self.score.load(Ordering::SeqCst)
    }

    // False if a session task already drives this player.
    pub fn claim_session(&self) -> bool {
        !self.session.swap(true, Ordering::SeqCst)
    }

    pub fn release_session(&self) {
        self.session.store(false, Ordering::SeqCst);
    }

    pub fn info(&self, owner: bool) -> MemberInfo {
        MemberInfo {
            id: self.id,
            name: self.name.clone(),
            score: self.score(),
            online: self.is_online(),
            owner,
        }
    }

    fn send(&self, msg: ServerMessage) -> Result<(), AskError> {
        match &self.connection().outbox {
            Some(outbox) => outbox.send(msg).map_err(|_| AskError::Disconnected),
            None => Ok(()),
        }
    }

    pub fn write(&self, text: impl Into<String>) -> Result<(), AskError> {
        self.send(ServerMessage::Text { body: text.into() })
    }

    pub fn write_object<T: Serialize>(&self, value: &T) -> Result<(), AskError> {
        let value = serde_json::to_value(value).map_err(|_| AskError::Disconnected)?;
        self.send(ServerMessage::Object { value })
    }

    pub fn write_error(&self, err: &dyn Display) -> Result<(), AskError> {
        self.send(ServerMessage::Error {
            message: err.to_string(),
        })
    }

    /// Queues a line typed by the client. Lines arriving while nobody is
    /// reading, or beyond the inbound capacity, are dropped.
    pub fn deliver(&self, text: String) -> bool {
        if !self.reading.load(Ordering::SeqCst) {
            debug!(player_id = self.id, "input dropped, no prompt open");
            return false;
        }
        self.connection().inbox_tx.try_send(text).is_ok()
    }

    /// Opens the inbound queue. Open it before writing a prompt so an
    /// immediate answer is not lost.
    pub fn transaction(&self) -> ReadGuard<'_> {
        self.reading.store(true, Ordering::SeqCst);
        ReadGuard { player: self }
    }

    pub async fn ask(&self, timeout: Option<Duration>) -> Result<String, AskError> {
        let _guard = self.transaction();
        self.read_next(timeout).await
    }

    // `None` waits until an answer or a disconnect.
    pub async fn read_next(&self, timeout: Option<Duration>) -> Result<String, AskError> {
        let conn = self.connection();
        if conn.closed.is_cancelled() {
            return Err(AskError::Disconnected);
        }
        let mut inbox = conn.inbox_rx.lock().await;
        let next = async {
            tokio::select! {
                biased;
                _ = conn.closed.cancelled() => None,
                line = inbox.recv() => line,
            }
        };
        let line = match timeout {
            Some(limit) => tokio::time::timeout(limit, next)
                .await
                .map_err(|_| AskError::Timeout)?,
            None => next.await,
        };
        let line = line.ok_or(AskError::Disconnected)?;
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("e") {
            return Err(AskError::Exit);
        }
        Ok(line.to_string())
    }
}

#[derive(Debug, Default)]
pub struct PlayerDirectory {
    players: DashMap<PlayerId, Arc<Player>>,
    connections: DashMap<ConnId, PlayerId>,
    inbox_capacity: usize,
}

impl PlayerDirectory {
    pub fn new(inbox_capacity: usize) -> Self {
        Self {
            players: DashMap::new(),
            connections: DashMap::new(),
            inbox_capacity,
        }
    }

    /// Binds `conn` to player `id`. Repeating the call for the same
    /// connection returns the bound player unchanged; a new connection for a
    /// known id reuses that player's record.
    pub fn connect(&self, conn: ConnId, id: PlayerId, name: &str, outbox: Option<Outbox>) -> Arc<Player> {
        if let Some(player) = self.connections.get(&conn).and_then(|bound| self.get(*bound)) {
            return player;
        }
        let player = match self.players.entry(id) {
            Entry::Occupied(entry) => {
                let player = entry.get().clone();
                drop(entry);
                player.attach(outbox);
                info!(player_id = id, conn_id = conn, "player reconnected");
                player
            }
            Entry::Vacant(entry) => {
                let player = Arc::new(Player::new(id, name, outbox, self.inbox_capacity));
                entry.insert(player.clone());
                info!(player_id = id, conn_id = conn, name = %player.name, "player connected");
                player
            }
        };
        self.connections.insert(conn, id);
        player
    }

    pub fn disconnect(&self, conn: ConnId) -> Option<Arc<Player>> {
        let (_, id) = self.connections.remove(&conn)?;
        if self.connections.iter().any(|bound| *bound.value() == id) {
            return None;
        }
        self.get(id)
    }

    pub fn get(&self, id: PlayerId) -> Option<Arc<Player>> {
        self.players.get(&id).map(|player| player.clone())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

pub fn display_name_for_user(user_id: u64) -> String {
    const ADJECTIVES: &[&str] = &[
        "Brave", "Calm", "Swift", "Mighty", "Lucky", "Clever", "Silent", "Fierce", "Nimble",
        "Rapid", "Steady", "Bold", "Witty", "Sunny", "Vivid", "Lively",
    ];
    const NOUNS: &[&str] = &[
        "Landlord", "Farmer", "Miller", "Tenant", "Baron", "Reeve", "Drover", "Ploughman",
        "Shepherd", "Steward", "Squire", "Cotter",
    ];

    let adjective = ADJECTIVES[(user_id as usize) % ADJECTIVES.len()];
    let noun = NOUNS[(user_id.rotate_left(13) as usize) % NOUNS.len()];
    format!("{adjective}{noun}{}", user_id % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_idempotent_per_connection() {
        let directory = PlayerDirectory::new(4);
        let first = directory.connect(1, 7, "ann", None);
        let again = directory.connect(1, 7, "ann", None);
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn returning_id_reuses_record() {
        let directory = PlayerDirectory::new(4);
        let first = directory.connect(1, 7, "ann", None);
        first.set_room(3);
        first.go_offline();
        let back = directory.connect(2, 7, "ignored", None);
        assert!(Arc::ptr_eq(&first, &back));
        assert!(back.is_online());
        assert_eq!(back.room_id(), 3);
        assert_eq!(back.name, "ann");
    }

    #[test]
    fn only_one_session_per_player() {
        let player = Player::new(1, "ann", None, 2);
        assert!(player.claim_session());
        assert!(!player.claim_session());
        player.release_session();
        assert!(player.claim_session());
    }

    #[test]
    fn stale_connection_does_not_unbind_a_reconnected_player() {
        let directory = PlayerDirectory::new(4);
        directory.connect(1, 7, "ann", None);
        directory.connect(2, 7, "ann", None);
        assert!(directory.disconnect(1).is_none());
        assert_eq!(directory.disconnect(2).map(|player| player.id), Some(7));
        assert!(directory.disconnect(2).is_none());
    }

    #[test]
    fn input_is_dropped_outside_a_prompt() {
        let player = Player::new(1, "ann", None, 2);
        assert!(!player.deliver("y".into()));
        let _guard = player.transaction();
        assert!(player.deliver("y".into()));
    }

    #[tokio::test]
    async fn ask_returns_trimmed_line() {
        let player = Player::new(1, "ann", None, 2);
        let guard = player.transaction();
        player.deliver("  33 \n".into());
        assert_eq!(player.read_next(None).await, Ok("33".to_string()));
        drop(guard);
    }

    #[tokio::test]
    async fn exit_keyword_is_reported() {
        let player = Player::new(1, "ann", None, 2);
        let _guard = player.transaction();
        player.deliver("E".into());
        assert_eq!(player.read_next(None).await, Err(AskError::Exit));
    }

    #[tokio::test(start_paused = true)]
    async fn ask_times_out() {
        let player = Player::new(1, "ann", None, 2);
        let result = player.ask(Some(Duration::from_secs(3))).await;
        assert_eq!(result, Err(AskError::Timeout));
    }

    #[tokio::test]
    async fn offline_interrupts_a_blocking_read() {
        let player = Arc::new(Player::new(1, "ann", None, 2));
        let reader = {
            let player = player.clone();
            tokio::spawn(async move { player.ask(None).await })
        };
        tokio::task::yield_now().await;
        player.go_offline();
        assert_eq!(reader.await.unwrap(), Err(AskError::Disconnected));
        assert!(!player.is_online());
    }

    #[test]
    fn writes_fail_once_the_socket_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Player::new(1, "ann", Some(tx), 2);
        assert!(player.write("hi").is_ok());
        drop(rx);
        assert_eq!(player.write("hi"), Err(AskError::Disconnected));
    }

    #[test]
    fn display_name_is_stable() {
        assert_eq!(display_name_for_user(42), display_name_for_user(42));
        assert!(!display_name_for_user(1).is_empty());
    }
}
