//! Room registry: creates, finds, lists, and destroys rooms.

use std::collections::HashMap;

use arena_protocol::{PlayerId, RoomId, RoomSnapshot};
use rand::Rng;
use tracing::info;

use crate::{Room, RoomConfig, RoomError};

/// Longest room name kept, in characters. Longer names are truncated.
pub const MAX_ROOM_NAME_CHARS: usize = 48;

/// What happened when a player left their room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: RoomId,
    /// A live round was voided; the caller must cancel its timer.
    pub voided_round: bool,
    /// The room became empty and was removed.
    pub destroyed: bool,
}

/// Owns every live room and the player → room index.
///
/// Membership only changes through [`join`](Self::join),
/// [`create_for`](Self::create_for), and [`leave`](Self::leave), which keeps
/// the index and each room's roster in agreement. A room is removed as soon
/// as its last player leaves.
#[derive(Debug)]
pub struct RoomRegistry {
    config: RoomConfig,
    rooms: HashMap<RoomId, Room>,
    /// Creation order, for stable listings.
    order: Vec<RoomId>,
    player_rooms: HashMap<PlayerId, RoomId>,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: config.validated(),
            rooms: HashMap::new(),
            order: Vec::new(),
            player_rooms: HashMap::new(),
        }
    }

    pub fn config(&self) -> RoomConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Creates an empty room and returns its id.
    ///
    /// A blank `name` becomes `"Room <n>"`; a blank `password` means the
    /// room is open.
    pub fn create(
        &mut self,
        name: Option<&str>,
        password: Option<&str>,
    ) -> RoomId {
        let id = self.fresh_id();
        let name = self.room_name(name);
        let password = password.filter(|pw| !pw.trim().is_empty());

        let room = Room::new(id.clone(), name, password, self.config);
        info!(
            room_id = %id,
            room_name = %room.name(),
            has_password = room.has_password(),
            "room created"
        );
        self.rooms.insert(id.clone(), room);
        self.order.push(id.clone());
        id
    }

    /// Creates a room and seats `owner` in it.
    ///
    /// # Errors
    /// `AlreadyInRoom` if `owner` already sits somewhere; nothing is created
    /// in that case.
    pub fn create_for(
        &mut self,
        owner: PlayerId,
        name: Option<&str>,
        password: Option<&str>,
    ) -> Result<RoomId, RoomError> {
        if let Some(current) = self.player_rooms.get(&owner) {
            return Err(RoomError::AlreadyInRoom(current.clone()));
        }
        let id = self.create(name, password);
        self.join(owner, &id, password)?;
        Ok(id)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Removes a room outright, unindexing anyone still seated in it.
    pub fn remove(&mut self, room_id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(room_id)?;
        self.order.retain(|id| id != room_id);
        for player in room.players() {
            self.player_rooms.remove(player);
        }
        info!(room_id = %room_id, "room removed");
        Some(room)
    }

    /// The room `player` sits in, if any.
    pub fn room_of(&self, player: PlayerId) -> Option<&RoomId> {
        self.player_rooms.get(&player)
    }

    /// The room `player` sits in, for mutation.
    ///
    /// # Errors
    /// `NotInRoom` if the player is not seated anywhere.
    pub fn room_of_mut(
        &mut self,
        player: PlayerId,
    ) -> Result<&mut Room, RoomError> {
        let room_id =
            self.player_rooms.get(&player).ok_or(RoomError::NotInRoom)?;
        self.rooms.get_mut(room_id).ok_or(RoomError::NotInRoom)
    }

    /// Seats `player` in `room_id`.
    ///
    /// Checks, in order: the player is not already seated, the room exists,
    /// it has a free seat, the password matches, and no round is live.
    /// Nothing is mutated on failure.
    pub fn join(
        &mut self,
        player: PlayerId,
        room_id: &RoomId,
        password: Option<&str>,
    ) -> Result<&Room, RoomError> {
        if let Some(current) = self.player_rooms.get(&player) {
            return Err(RoomError::AlreadyInRoom(current.clone()));
        }
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        if room.is_full() {
            return Err(RoomError::RoomFull(RoomConfig::CAPACITY));
        }
        if !room.verify_password(password) {
            return Err(RoomError::WrongPassword);
        }

        room.add_player(player)?;
        self.player_rooms.insert(player, room_id.clone());
        info!(%player, room_id = %room_id, "player joined room");
        Ok(&*room)
    }

    /// Unseats `player` from whatever room they are in, removing the room
    /// if that leaves it empty.
    ///
    /// # Errors
    /// `NotInRoom` if the player is not seated anywhere.
    pub fn leave(&mut self, player: PlayerId) -> Result<Departure, RoomError> {
        let room_id = self
            .player_rooms
            .remove(&player)
            .ok_or(RoomError::NotInRoom)?;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let voided_round = room.remove_player(player)?;
        let destroyed = room.is_empty();
        info!(%player, room_id = %room_id, voided_round, "player left room");
        if destroyed {
            self.remove(&room_id);
        }

        Ok(Departure {
            room_id,
            voided_round,
            destroyed,
        })
    }

    /// Snapshots of every live room in creation order, full rooms included.
    pub fn list(
        &self,
        name_of: impl Fn(PlayerId) -> String,
    ) -> Vec<RoomSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.rooms.get(id))
            .map(|room| room.snapshot(&name_of))
            .collect()
    }

    fn room_name(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.chars().take(MAX_ROOM_NAME_CHARS).collect(),
            None => format!("Room {}", self.rooms.len() + 1),
        }
    }

    /// Eight lowercase hex characters, redrawn until unused.
    fn fresh_id(&self) -> RoomId {
        let mut rng = rand::rng();
        loop {
            let id = RoomId(format!("{:08x}", rng.random::<u32>()));
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
