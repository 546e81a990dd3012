use crate::config::LobbyConfig;
use crate::engine::init_game;
use crate::error::RoomError;
use crate::players::{ConnId, Outbox, Player, PlayerDirectory};
use crate::protocol::{MemberInfo, RoomSummary};
use crate::table::Table;
use dashmap::DashMap;
use landlord_core::{LandlordRules, PlayerId, RuleSet, TeamRules};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub type RoomId = u64;

pub const PROP_LAIZI: &str = "laizi";
pub const PROP_SKILL: &str = "skill";
pub const PROP_DONT_SHUFFLE: &str = "dont_shuffle";
pub const ROOM_PROPERTIES: [&str; 3] = [PROP_LAIZI, PROP_SKILL, PROP_DONT_SHUFFLE];
pub const MAX_PASSWORD_LEN: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RoomState {
    Waiting,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GameKind {
    LaiZi,
    Skill,
}

impl GameKind {
    pub fn name(self) -> &'static str {
        match self {
            GameKind::LaiZi => "laizi",
            GameKind::Skill => "skill",
        }
    }

    fn default_properties(self) -> BTreeMap<String, bool> {
        let on: &[&str] = match self {
            GameKind::LaiZi => &[PROP_LAIZI],
            GameKind::Skill => &[PROP_LAIZI, PROP_DONT_SHUFFLE, PROP_SKILL],
        };
        on.iter().map(|key| (key.to_string(), true)).collect()
    }
}

/// Everything behind a room's lock.
#[derive(Debug)]
pub struct RoomInner {
    pub state: RoomState,
    pub creator: PlayerId,
    pub capacity: usize,
    pub password: String,
    pub active_at: Instant,
    pub table: Option<Table>,
    properties: BTreeMap<String, bool>,
    members: BTreeSet<PlayerId>,
    players: usize,
    destroyed: bool,
}

impl RoomInner {
    pub fn members(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.members.iter().copied()
    }

    pub fn player_count(&self) -> usize {
        self.players
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.members.contains(&player)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn property(&self, key: &str) -> bool {
        self.properties.get(key).copied().unwrap_or(false)
    }

    pub fn properties(&self) -> &BTreeMap<String, bool> {
        &self.properties
    }

    pub fn set_property(&mut self, key: &str, value: bool) -> bool {
        if !ROOM_PROPERTIES.contains(&key) {
            return false;
        }
        self.properties.insert(key.to_string(), value);
        true
    }

    pub fn touch(&mut self) {
        self.active_at = Instant::now();
    }

    pub fn rules(&self) -> Arc<dyn RuleSet> {
        if self.property(PROP_SKILL) {
            Arc::new(TeamRules)
        } else {
            Arc::new(LandlordRules)
        }
    }

    fn add_member(&mut self, player: PlayerId) {
        if self.members.insert(player) {
            self.players += 1;
        }
    }

    fn remove_member(&mut self, player: PlayerId) -> bool {
        let removed = self.members.remove(&player);
        if removed {
            self.players -= 1;
        }
        removed
    }
}

#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub kind: GameKind,
    inner: Mutex<RoomInner>,
}

impl Room {
    fn new(id: RoomId, kind: GameKind, creator: PlayerId, password: String, capacity: usize) -> Self {
        Self {
            id,
            kind,
            inner: Mutex::new(RoomInner {
                state: RoomState::Waiting,
                creator,
                capacity,
                password,
                active_at: Instant::now(),
                table: None,
                properties: kind.default_properties(),
                members: BTreeSet::new(),
                players: 0,
                destroyed: false,
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, RoomInner> {
        self.inner.lock()
    }

    pub fn state(&self) -> RoomState {
        self.inner.lock().state
    }

    pub fn summary(&self) -> RoomSummary {
        let inner = self.inner.lock();
        RoomSummary {
            id: self.id,
            kind: self.kind.name().to_string(),
            state: format!("{:?}", inner.state),
            players: inner.players,
            capacity: inner.capacity,
            owner: inner.creator,
            locked: !inner.password.is_empty(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub remaining: usize,
    pub new_creator: Option<PlayerId>,
    pub destroyed: bool,
}

pub fn should_reap(active_at: Instant, now: Instant, ttl: Duration, any_online: bool) -> bool {
    now.saturating_duration_since(active_at) > ttl || !any_online
}

#[derive(Debug)]
pub struct RoomManager {
    players: PlayerDirectory,
    rooms: DashMap<RoomId, Arc<Room>>,
    next_room_id: AtomicU64,
    config: LobbyConfig,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(LobbyConfig::default())
    }
}

impl RoomManager {
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            players: PlayerDirectory::new(config.inbox_capacity),
            rooms: DashMap::new(),
            next_room_id: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn players(&self) -> &PlayerDirectory {
        &self.players
    }

    pub fn connect(&self, conn: ConnId, id: PlayerId, name: &str, outbox: Option<Outbox>) -> Arc<Player> {
        self.players.connect(conn, id, name, outbox)
    }

    pub fn disconnect(&self, conn: ConnId) {
        if let Some(player) = self.players.disconnect(conn) {
            self.offline(player.id);
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<Arc<Player>> {
        self.players.get(id)
    }

    pub fn room(&self, id: RoomId) -> Option<Arc<Room>> {
        self.rooms.get(&id).map(|room| room.clone())
    }

    pub fn rooms(&self) -> Vec<Arc<Room>> {
        let mut rooms: Vec<Arc<Room>> = self.rooms.iter().map(|room| room.value().clone()).collect();
        rooms.sort_by_key(|room| room.id);
        rooms
    }

    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.rooms().iter().map(|room| room.summary()).collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_members(&self, id: RoomId) -> Option<Vec<PlayerId>> {
        let room = self.room(id)?;
        let inner = room.lock();
        let members = inner.members().collect();
        Some(members)
    }

    pub fn member_infos(&self, id: RoomId) -> Vec<MemberInfo> {
        let Some(room) = self.room(id) else {
            return Vec::new();
        };
        let (members, creator) = {
            let inner = room.lock();
            (inner.members().collect::<Vec<_>>(), inner.creator)
        };
        members
            .into_iter()
            .filter_map(|member| self.player(member))
            .map(|player| player.info(player.id == creator))
            .collect()
    }

    /// Creates a room owned by `creator`, who is seated before the room
    /// becomes visible. A password over the length limit is dropped.
    pub fn create_room(
        &self,
        creator: PlayerId,
        kind: GameKind,
        password: &str,
        capacity: usize,
    ) -> Result<Arc<Room>, RoomError> {
        let player = self.player(creator).ok_or(RoomError::PlayerNotFound)?;
        let password = if password.chars().count() > MAX_PASSWORD_LEN {
            String::new()
        } else {
            password.to_string()
        };
        let id = self.next_room_id.fetch_add(1, Ordering::SeqCst) + 1;
        let room = Arc::new(Room::new(id, kind, creator, password, capacity));
        {
            let mut inner = room.lock();
            inner.add_member(creator);
            player.set_room(id);
            self.rooms.insert(id, room.clone());
        }
        info!(room_id = id, player_id = creator, kind = kind.name(), "room created");
        Ok(room)
    }

    /// Seats `player_id` in `room_id`. Checks run under the room lock in the
    /// order: missing room, running, full, wrong password.
    pub fn join_room(&self, room_id: RoomId, player_id: PlayerId, password: &str) -> Result<(), RoomError> {
        let player = self.player(player_id).ok_or(RoomError::PlayerNotFound)?;
        let room = self.room(room_id).ok_or(RoomError::NotFound)?;
        let mut inner = room.lock();
        if inner.destroyed {
            return Err(RoomError::NotFound);
        }
        inner.touch();
        if inner.is_member(player_id) {
            return Err(RoomError::AlreadyJoined);
        }
        if inner.state == RoomState::Running {
            return Err(RoomError::Running);
        }
        if inner.capacity > 0 && inner.players >= inner.capacity {
            return Err(RoomError::Full);
        }
        if !inner.password.is_empty() && inner.password != password {
            return Err(RoomError::WrongPassword);
        }
        inner.add_member(player_id);
        player.set_room(room_id);
        debug!(room_id, player_id, players = inner.players, "player joined room");
        Ok(())
    }

    /// Seated players stay put until their round ends.
    pub fn leave_room(&self, room_id: RoomId, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let room = self.room(room_id).ok_or(RoomError::NotFound)?;
        let mut inner = room.lock();
        if !inner.is_member(player_id) {
            return Err(RoomError::PlayerNotFound);
        }
        if inner.state == RoomState::Running {
            return Err(RoomError::Running);
        }
        let outcome = self
            .leave_locked(&room, &mut inner, player_id)
            .ok_or(RoomError::PlayerNotFound)?;
        if !outcome.destroyed {
            self.reap_locked(&room, &mut inner, Instant::now());
        }
        Ok(outcome)
    }

    fn leave_locked(&self, room: &Room, inner: &mut RoomInner, player_id: PlayerId) -> Option<LeaveOutcome> {
        if !inner.remove_member(player_id) {
            return None;
        }
        if let Some(player) = self.player(player_id) {
            if player.room_id() == room.id {
                player.set_room(0);
            }
        }
        debug!(room_id = room.id, player_id, remaining = inner.players, "player left room");
        if inner.players == 0 {
            self.destroy_locked(room, inner, "empty");
            return Some(LeaveOutcome {
                remaining: 0,
                new_creator: None,
                destroyed: true,
            });
        }
        let mut new_creator = None;
        if inner.creator == player_id {
            let next = inner.members().next();
            if let Some(next) = next {
                inner.creator = next;
                new_creator = Some(next);
            }
        }
        Some(LeaveOutcome {
            remaining: inner.players,
            new_creator,
            destroyed: false,
        })
    }

    fn destroy_locked(&self, room: &Room, inner: &mut RoomInner, reason: &str) {
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        self.rooms.remove(&room.id);
        if let Some(table) = inner.table.take() {
            table.close();
        }
        for member in inner.members.iter() {
            if let Some(player) = self.player(*member) {
                if player.room_id() == room.id {
                    player.set_room(0);
                }
            }
        }
        inner.members.clear();
        inner.players = 0;
        info!(room_id = room.id, reason, "room destroyed");
    }

    fn any_online(&self, inner: &RoomInner) -> bool {
        inner
            .members()
            .filter_map(|member| self.player(member))
            .any(|player| player.is_online())
    }

    fn reap_locked(&self, room: &Room, inner: &mut RoomInner, now: Instant) -> bool {
        if inner.destroyed {
            return true;
        }
        let any_online = self.any_online(inner);
        if !should_reap(inner.active_at, now, self.config.room_ttl, any_online) {
            return false;
        }
        let reason = if any_online { "idle timeout" } else { "no member online" };
        info!(room_id = room.id, reason, "reaping room");
        self.destroy_locked(room, inner, reason);
        true
    }

    /// Takes a player offline. A waiting room lets them go; a running one
    /// keeps the seat so their turns fall back to defaults.
    pub fn offline(&self, player_id: PlayerId) {
        let Some(player) = self.player(player_id) else {
            return;
        };
        info!(player_id, "player offline");
        let Some(room) = self.room(player.room_id()) else {
            player.go_offline();
            return;
        };
        // A round starting after this point still sees the member seated.
        let mut inner = room.lock();
        player.go_offline();
        self.broadcast_locked(&mut inner, &format!("{} lost connection!\n", player.name), &[player_id]);
        if inner.state == RoomState::Waiting {
            self.leave_locked(&room, &mut inner, player_id);
        }
        self.reap_locked(&room, &mut inner, Instant::now());
    }

    // Returns how many rooms were destroyed.
    pub fn reap(&self, now: Instant) -> usize {
        self.rooms()
            .iter()
            .filter(|room| {
                let mut inner = room.lock();
                !inner.destroyed && self.reap_locked(room, &mut inner, now)
            })
            .count()
    }

    pub fn spawn_reaper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reaped = manager.reap(Instant::now());
                if reaped > 0 {
                    info!(reaped, "room sweep finished");
                }
            }
        })
    }

    fn broadcast_locked(&self, inner: &mut RoomInner, text: &str, exclude: &[PlayerId]) {
        inner.touch();
        for member in inner.members() {
            if exclude.contains(&member) {
                continue;
            }
            if let Some(player) = self.player(member) {
                let _ = player.write(text);
            }
        }
    }

    /// Sends a line to every member outside `exclude`. Refreshes the room's
    /// activity.
    pub fn broadcast(&self, room_id: RoomId, text: &str, exclude: &[PlayerId]) {
        if let Some(room) = self.room(room_id) {
            let mut inner = room.lock();
            self.broadcast_locked(&mut inner, text, exclude);
        }
    }

    /// Like `broadcast` for a structured value, without touching activity.
    pub fn broadcast_object<T: Serialize>(&self, room_id: RoomId, value: &T, exclude: &[PlayerId]) {
        let Some(members) = self.room_members(room_id) else {
            return;
        };
        for member in members.into_iter().filter(|member| !exclude.contains(member)) {
            if let Some(player) = self.player(member) {
                let _ = player.write_object(value);
            }
        }
    }

    fn owned_room(&self, room_id: RoomId, requester: PlayerId) -> Result<Arc<Room>, RoomError> {
        let room = self.room(room_id).ok_or(RoomError::NotFound)?;
        if room.lock().creator != requester {
            return Err(RoomError::NotCreator);
        }
        Ok(room)
    }

    pub fn set_property(&self, room_id: RoomId, requester: PlayerId, key: &str, value: bool) -> Result<bool, RoomError> {
        let room = self.owned_room(room_id, requester)?;
        let mut inner = room.lock();
        Ok(inner.set_property(key, value))
    }

    pub fn set_password(&self, room_id: RoomId, requester: PlayerId, password: &str) -> Result<(), RoomError> {
        let room = self.owned_room(room_id, requester)?;
        let mut inner = room.lock();
        if password.chars().count() > MAX_PASSWORD_LEN {
            inner.password.clear();
            return Err(RoomError::PasswordTooLong);
        }
        inner.password = password.to_string();
        Ok(())
    }

    pub fn set_capacity(&self, room_id: RoomId, requester: PlayerId, capacity: usize) -> Result<(), RoomError> {
        let room = self.owned_room(room_id, requester)?;
        if capacity < 2 || capacity > self.config.max_players {
            return Err(RoomError::InvalidCapacity);
        }
        room.lock().capacity = capacity;
        Ok(())
    }

    pub fn start_game(&self, room_id: RoomId, requester: PlayerId, seed: u64) -> Result<(), RoomError> {
        let room = self.room(room_id).ok_or(RoomError::NotFound)?;
        let mut inner = room.lock();
        if inner.destroyed {
            return Err(RoomError::NotFound);
        }
        if inner.creator != requester {
            return Err(RoomError::NotCreator);
        }
        if inner.state == RoomState::Running {
            return Err(RoomError::Running);
        }
        if inner.players < 2 {
            return Err(RoomError::NotReady);
        }
        let rules = inner.rules();
        let table = init_game(&inner, rules, seed)?;
        inner.table = Some(table);
        inner.state = RoomState::Running;
        inner.touch();
        info!(room_id, players = inner.players, "round started");
        Ok(())
    }
}
