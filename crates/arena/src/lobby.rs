//! The lobby: one task that owns every session, room, and round timer.
//!
//! Connection handlers never touch game state. They forward
//! [`LobbyCommand`]s through a [`LobbyHandle`], and the lobby applies them
//! one at a time together with round-timer expiries. Two players choosing
//! at the same instant, or a choice racing a timeout, are therefore just
//! two events in a queue.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use arena_protocol::{
    Choice, ClientMessage, PlayerId, RoomId, RoomSnapshot, ServerMessage,
};
use arena_room::{
    ChoiceProgress, ReadyProgress, Room, RoomError, RoomRegistry, RoomState,
    RoundResult,
};
use arena_session::{PlayerSender, SessionManager, validate_name};
use arena_timer::{Expiry, RoundTimers};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{ArenaError, ServerConfig};

/// Longest chat line relayed, in characters, after trimming.
pub const MAX_CHAT_CHARS: usize = 500;

const COMMAND_BUFFER: usize = 1024;

/// A request from a connection handler.
#[derive(Debug)]
pub enum LobbyCommand {
    /// Register a new connection. The lobby replies with the player id.
    Connect {
        outbound: PlayerSender,
        reply: oneshot::Sender<PlayerId>,
    },
    /// A decoded client message.
    Message {
        player_id: PlayerId,
        msg: ClientMessage,
    },
    /// The connection is gone.
    Disconnect { player_id: PlayerId },
}

/// Cloneable sender side of the lobby.
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    /// Registers a connection and returns its player id. The `player_id`
    /// welcome is queued on `outbound` before this returns.
    pub async fn connect(
        &self,
        outbound: PlayerSender,
    ) -> Result<PlayerId, ArenaError> {
        let (reply, rx) = oneshot::channel();
        self.command(LobbyCommand::Connect { outbound, reply })
            .await?;
        rx.await.map_err(|_| ArenaError::LobbyUnavailable)
    }

    pub async fn send(
        &self,
        player_id: PlayerId,
        msg: ClientMessage,
    ) -> Result<(), ArenaError> {
        self.command(LobbyCommand::Message { player_id, msg }).await
    }

    pub async fn disconnect(
        &self,
        player_id: PlayerId,
    ) -> Result<(), ArenaError> {
        self.command(LobbyCommand::Disconnect { player_id }).await
    }

    /// Non-blocking disconnect for contexts that cannot await.
    pub fn try_disconnect(&self, player_id: PlayerId) -> bool {
        self.sender
            .try_send(LobbyCommand::Disconnect { player_id })
            .is_ok()
    }

    async fn command(&self, cmd: LobbyCommand) -> Result<(), ArenaError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| ArenaError::LobbyUnavailable)
    }
}

/// The lobby state. Only ever touched from its own task.
#[derive(Debug)]
pub struct Lobby {
    sessions: SessionManager,
    rooms: RoomRegistry,
    timers: RoundTimers<RoomId>,
    receiver: mpsc::Receiver<LobbyCommand>,
}

impl Lobby {
    /// Spawns the lobby task. It runs until every [`LobbyHandle`] is
    /// dropped.
    pub fn spawn(config: &ServerConfig) -> (LobbyHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let lobby = Self {
            sessions: SessionManager::new(),
            rooms: RoomRegistry::new(config.room_config()),
            timers: RoundTimers::new(config.round_timeout),
            receiver,
        };
        let task = tokio::spawn(lobby.run());
        (LobbyHandle { sender }, task)
    }

    async fn run(mut self) {
        info!(
            best_of = self.rooms.config().best_of,
            round_timeout = ?self.timers.duration(),
            "lobby started"
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                expiry = self.timers.expired() => {
                    if self.timers.claim(&expiry) {
                        self.on_round_expired(expiry);
                    }
                }
            }
        }

        info!(players = self.sessions.len(), "lobby stopped");
    }

    fn handle_command(&mut self, cmd: LobbyCommand) {
        match cmd {
            LobbyCommand::Connect { outbound, reply } => {
                let player_id = self.sessions.connect(outbound);
                self.sessions
                    .send(player_id, ServerMessage::Welcome { player_id });
                if reply.send(player_id).is_err() {
                    // The handler went away before learning its id.
                    self.handle_disconnect(player_id);
                }
            }
            LobbyCommand::Message { player_id, msg } => {
                self.dispatch(player_id, msg)
            }
            LobbyCommand::Disconnect { player_id } => {
                self.handle_disconnect(player_id)
            }
        }
    }

    fn dispatch(&mut self, player_id: PlayerId, msg: ClientMessage) {
        if !self.sessions.contains(player_id) {
            debug!(%player_id, "message from unknown player dropped");
            return;
        }

        let kind = msg.kind();
        debug!(%player_id, kind, "request");

        let result = match msg {
            ClientMessage::GetRooms => {
                self.send_rooms_list(player_id);
                Ok(())
            }
            ClientMessage::CreateRoom {
                room_name,
                password,
            } => self.create_room(
                player_id,
                room_name.as_deref(),
                password.as_deref(),
            ),
            ClientMessage::JoinRoom { room_id, password } => {
                self.join_room(player_id, &room_id, password.as_deref())
            }
            ClientMessage::LeaveRoom => self.leave_room(player_id),
            ClientMessage::Ready => self.ready(player_id, false),
            ClientMessage::NewGame => self.ready(player_id, true),
            ClientMessage::Choice { choice } => {
                self.submit_choice(player_id, choice)
            }
            ClientMessage::SetName { name } => self.set_name(player_id, &name),
            ClientMessage::Chat { message } => self.chat(player_id, &message),
            ClientMessage::Ping { t } => {
                let t = t.unwrap_or_else(epoch_millis);
                self.sessions.send(player_id, ServerMessage::Pong { t });
                Ok(())
            }
        };

        if let Err(e) = result {
            if e.is_user_facing() {
                debug!(%player_id, kind, error = %e, "request refused");
                self.sessions
                    .send(player_id, ServerMessage::error(e.to_string()));
            } else {
                warn!(%player_id, kind, error = %e, "request failed");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Rooms
    // ---------------------------------------------------------------------

    fn create_room(
        &mut self,
        player_id: PlayerId,
        name: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), ArenaError> {
        let room_id = self.rooms.create_for(player_id, name, password)?;

        self.broadcast_rooms_list();
        if let Some(room) = self.rooms.get(&room_id) {
            let room = snapshot_of(room, &self.sessions);
            self.sessions
                .send(player_id, ServerMessage::RoomCreated { room });
        }
        Ok(())
    }

    fn join_room(
        &mut self,
        player_id: PlayerId,
        room_id: &RoomId,
        password: Option<&str>,
    ) -> Result<(), ArenaError> {
        // Only a join that would otherwise succeed is refused for its name.
        if self.rooms.room_of(player_id).is_none() {
            if let Some(room) = self.rooms.get(room_id) {
                let name = self.sessions.name_of(player_id);
                if !room.is_full()
                    && room.verify_password(password)
                    && name_taken(room, &self.sessions, player_id, &name)
                {
                    return Err(RoomError::NameTaken(name).into());
                }
            }
        }
        self.rooms.join(player_id, room_id, password)?;

        let player_name = self.sessions.name_of(player_id);
        self.notify_room(room_id, |room| ServerMessage::PlayerJoined {
            player_name,
            room,
        });
        self.broadcast_rooms_list();
        Ok(())
    }

    fn leave_room(&mut self, player_id: PlayerId) -> Result<(), ArenaError> {
        let departure = self.rooms.leave(player_id)?;
        if self.timers.cancel(&departure.room_id) {
            debug!(room_id = %departure.room_id, "round timer disarmed");
        }

        if !departure.destroyed {
            let player_name = self.sessions.name_of(player_id);
            self.notify_room(&departure.room_id, |room| {
                ServerMessage::PlayerLeft { player_name, room }
            });
        }
        self.broadcast_rooms_list();
        Ok(())
    }

    fn handle_disconnect(&mut self, player_id: PlayerId) {
        if self.rooms.room_of(player_id).is_some() {
            if let Err(e) = self.leave_room(player_id) {
                warn!(%player_id, error = %e, "leave on disconnect failed");
            }
        }
        if let Err(e) = self.sessions.disconnect(player_id) {
            debug!(%player_id, error = %e, "duplicate disconnect");
        }
    }

    // ---------------------------------------------------------------------
    // Rounds
    // ---------------------------------------------------------------------

    /// `ready` and `new_game` differ only in the notification they emit
    /// and in never reporting a first game.
    fn ready(
        &mut self,
        player_id: PlayerId,
        rematch: bool,
    ) -> Result<(), ArenaError> {
        let room = self.rooms.room_of_mut(player_id)?;
        let progress = room.mark_ready(player_id)?;
        let room_id = room.id().clone();

        if progress == ReadyProgress::Ignored {
            debug!(%player_id, room_id = %room_id, "ready ignored mid-round");
            return Ok(());
        }

        let player_name = self.sessions.name_of(player_id);
        self.notify_room(&room_id, |room| {
            if rematch {
                ServerMessage::PlayerReadyForNewGame { player_name, room }
            } else {
                ServerMessage::PlayerReady { player_name, room }
            }
        });

        if let ReadyProgress::Started { is_first_game } = progress {
            self.start_round(&room_id, is_first_game && !rematch);
        }
        Ok(())
    }

    fn start_round(&mut self, room_id: &RoomId, is_first_game: bool) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        let msg = ServerMessage::GameStart {
            room: snapshot_of(room, &self.sessions),
            is_first_game,
            both_ready: true,
            series: room.series_snapshot(),
        };
        self.sessions.send_to(room.players(), &msg);

        let generation = self.timers.start(room_id.clone());
        info!(room_id = %room_id, generation, is_first_game, "round started");
    }

    fn submit_choice(
        &mut self,
        player_id: PlayerId,
        choice: Choice,
    ) -> Result<(), ArenaError> {
        let room = self.rooms.room_of_mut(player_id)?;
        let progress = room.submit_choice(player_id, choice)?;
        let room_id = room.id().clone();

        let player_name = self.sessions.name_of(player_id);
        self.send_to_room(&room_id, ServerMessage::PlayerChose { player_name });

        if progress == ChoiceProgress::Complete {
            self.timers.cancel(&room_id);
            self.finish_round(&room_id);
        }
        Ok(())
    }

    /// A claimed expiry: fill in whoever has not chosen, then resolve.
    fn on_round_expired(&mut self, expiry: Expiry<RoomId>) {
        let room_id = expiry.key;
        let Some(room) = self.rooms.get_mut(&room_id) else {
            debug!(room_id = %room_id, "round timer for a removed room");
            return;
        };
        if room.state() != RoomState::Playing {
            debug!(room_id = %room_id, "round timer outside a round");
            return;
        }

        let filled = room.fill_missing_choices(&mut rand::rng());
        info!(room_id = %room_id, auto_picked = filled.len(), "round timed out");

        for (player_id, _) in filled {
            let player_name = self.sessions.name_of(player_id);
            self.send_to_room(
                &room_id,
                ServerMessage::PlayerChose { player_name },
            );
        }
        self.finish_round(&room_id);
    }

    fn finish_round(&mut self, room_id: &RoomId) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        let result = match room.resolve_round() {
            Ok(result) => result,
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "round not resolved");
                return;
            }
        };

        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        let msg = game_result(room, &result, &self.sessions);
        self.sessions.send_to(room.players(), &msg);

        info!(room_id = %room_id, "round resolved");
        if let Some(winner) = result.series_winner {
            info!(room_id = %room_id, %winner, "series won");
        }

        self.notify_room(room_id, |room| ServerMessage::RoomUpdated { room });
    }

    // ---------------------------------------------------------------------
    // Players
    // ---------------------------------------------------------------------

    fn set_name(
        &mut self,
        player_id: PlayerId,
        raw: &str,
    ) -> Result<(), ArenaError> {
        let name = validate_name(raw)?;
        let room_id = self.rooms.room_of(player_id).cloned();
        if let Some(room) = room_id.as_ref().and_then(|id| self.rooms.get(id)) {
            if name_taken(room, &self.sessions, player_id, &name) {
                return Err(RoomError::NameTaken(name).into());
            }
        }

        let player_name = self.sessions.rename(player_id, &name)?.to_owned();
        if let Some(room_id) = room_id {
            self.notify_room(&room_id, |room| ServerMessage::PlayerRenamed {
                player_name,
                room,
            });
        }
        Ok(())
    }

    fn chat(&mut self, player_id: PlayerId, raw: &str) -> Result<(), ArenaError> {
        let room_id = self
            .rooms
            .room_of(player_id)
            .cloned()
            .ok_or(RoomError::NotInRoom)?;

        let message = raw.trim();
        if message.is_empty() {
            return Ok(());
        }
        if message.chars().count() > MAX_CHAT_CHARS {
            return Err(ArenaError::InvalidRequest(format!(
                "message must be at most {MAX_CHAT_CHARS} characters"
            )));
        }

        let player_name = self.sessions.name_of(player_id);
        self.send_to_room(
            &room_id,
            ServerMessage::Chat {
                player_name,
                message: message.to_owned(),
            },
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Fan-out
    // ---------------------------------------------------------------------

    fn send_rooms_list(&self, player_id: PlayerId) {
        let rooms = self.rooms.list(|p| self.sessions.name_of(p));
        self.sessions
            .send(player_id, ServerMessage::RoomsList { rooms });
    }

    fn broadcast_rooms_list(&self) {
        let rooms = self.rooms.list(|p| self.sessions.name_of(p));
        self.sessions
            .broadcast(&ServerMessage::RoomsList { rooms });
    }

    fn send_to_room(&self, room_id: &RoomId, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            self.sessions.send_to(room.players(), &msg);
        }
    }

    /// Sends every occupant a message built around a fresh snapshot.
    fn notify_room(
        &self,
        room_id: &RoomId,
        make: impl FnOnce(RoomSnapshot) -> ServerMessage,
    ) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };
        let msg = make(snapshot_of(room, &self.sessions));
        self.sessions.send_to(room.players(), &msg);
    }
}

fn snapshot_of(room: &Room, sessions: &SessionManager) -> RoomSnapshot {
    room.snapshot(|p| sessions.name_of(p))
}

/// Whether someone other than `player_id` in `room` already goes by `name`.
///
/// Results and scores are keyed by display name, so names must be unique
/// within a room.
fn name_taken(
    room: &Room,
    sessions: &SessionManager,
    player_id: PlayerId,
    name: &str,
) -> bool {
    room.players()
        .iter()
        .any(|&p| p != player_id && sessions.name_of(p) == name)
}

fn game_result(
    room: &Room,
    result: &RoundResult,
    sessions: &SessionManager,
) -> ServerMessage {
    let choices: BTreeMap<_, _> = result
        .choices
        .iter()
        .map(|(p, c)| (sessions.name_of(*p), *c))
        .collect();
    let results: BTreeMap<_, _> = result
        .outcomes
        .iter()
        .map(|(p, o)| (sessions.name_of(*p), *o))
        .collect();
    let scores: BTreeMap<_, _> = room
        .players()
        .iter()
        .map(|p| (sessions.name_of(*p), room.score_of(*p)))
        .collect();

    ServerMessage::GameResult {
        choices,
        results,
        scores,
        series: room.series_snapshot(),
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use arena_protocol::{GameState, Outcome};
    use tokio::time::timeout;

    use super::*;

    const ROUND: Duration = Duration::from_secs(10);

    struct Client {
        id: PlayerId,
        rx: mpsc::UnboundedReceiver<ServerMessage>,
    }

    impl Client {
        async fn recv(&mut self) -> ServerMessage {
            timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("no message within 1s")
                .expect("outbound channel closed")
        }

        /// Skips messages until one matches.
        async fn until(
            &mut self,
            pred: impl Fn(&ServerMessage) -> bool,
        ) -> ServerMessage {
            loop {
                let msg = self.recv().await;
                if pred(&msg) {
                    return msg;
                }
            }
        }

        /// Like [`until`](Self::until), but waits up to `within` in total
        /// instead of 1s per message.
        async fn until_within(
            &mut self,
            within: Duration,
            pred: impl Fn(&ServerMessage) -> bool,
        ) -> Option<ServerMessage> {
            timeout(within, async {
                while let Some(msg) = self.rx.recv().await {
                    if pred(&msg) {
                        return Some(msg);
                    }
                }
                None
            })
            .await
            .ok()
            .flatten()
        }

        /// Drains everything that arrives within `within`.
        async fn drain(&mut self, within: Duration) -> Vec<ServerMessage> {
            let mut seen = Vec::new();
            while let Ok(Some(msg)) = timeout(within, self.rx.recv()).await {
                seen.push(msg);
            }
            seen
        }
    }

    fn spawn_lobby() -> LobbyHandle {
        let config = ServerConfig {
            round_timeout: ROUND,
            ..ServerConfig::default()
        };
        Lobby::spawn(&config).0
    }

    async fn connect(lobby: &LobbyHandle) -> Client {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = lobby.connect(tx).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Welcome { player_id: id })
        );
        Client { id, rx }
    }

    async fn send(lobby: &LobbyHandle, c: &Client, msg: ClientMessage) {
        lobby.send(c.id, msg).await.unwrap();
    }

    /// Two players seated in a fresh room; returns its id.
    async fn seat_pair(
        lobby: &LobbyHandle,
        x: &mut Client,
        y: &mut Client,
    ) -> RoomId {
        send(lobby, x, ClientMessage::CreateRoom {
            room_name: Some("Duel".into()),
            password: None,
        })
        .await;
        let ServerMessage::RoomCreated { room } = x
            .until(|m| matches!(m, ServerMessage::RoomCreated { .. }))
            .await
        else {
            unreachable!()
        };

        send(lobby, y, ClientMessage::JoinRoom {
            room_id: room.room_id.clone(),
            password: None,
        })
        .await;
        y.until(|m| matches!(m, ServerMessage::PlayerJoined { .. }))
            .await;
        x.until(|m| matches!(m, ServerMessage::PlayerJoined { .. }))
            .await;
        room.room_id
    }

    async fn start(lobby: &LobbyHandle, x: &mut Client, y: &mut Client) {
        send(lobby, x, ClientMessage::Ready).await;
        send(lobby, y, ClientMessage::Ready).await;
        x.until(|m| matches!(m, ServerMessage::GameStart { .. })).await;
        y.until(|m| matches!(m, ServerMessage::GameStart { .. })).await;
    }

    fn is_error(m: &ServerMessage) -> bool {
        matches!(m, ServerMessage::Error { .. })
    }

    fn is_result(m: &ServerMessage) -> bool {
        matches!(m, ServerMessage::GameResult { .. })
    }

    // =====================================================================
    // Connect / rooms
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_connect_issues_distinct_ids() {
        let lobby = spawn_lobby();
        let a = connect(&lobby).await;
        let b = connect(&lobby).await;
        assert_ne!(a.id, b.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_broadcasts_list_then_confirms() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut bystander = connect(&lobby).await;

        send(&lobby, &x, ClientMessage::CreateRoom {
            room_name: Some("Duel".into()),
            password: None,
        })
        .await;

        let ServerMessage::RoomsList { rooms } = x.recv().await else {
            panic!("expected rooms_list first");
        };
        assert_eq!(rooms.len(), 1);
        let ServerMessage::RoomCreated { room } = x.recv().await else {
            panic!("expected room_created");
        };
        assert_eq!(room.room_name, "Duel");
        assert_eq!(room.players.len(), 1);

        let ServerMessage::RoomsList { rooms } = bystander.recv().await else {
            panic!("bystander should see the new room");
        };
        assert_eq!(rooms[0].room_id, room.room_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_missing_room_is_error() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        send(&lobby, &x, ClientMessage::JoinRoom {
            room_id: RoomId::from("deadbeef"),
            password: None,
        })
        .await;
        let ServerMessage::Error { message } = x.recv().await else {
            panic!("expected error");
        };
        assert_eq!(message, "room deadbeef does not exist");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_password_is_refused() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;

        send(&lobby, &x, ClientMessage::CreateRoom {
            room_name: None,
            password: Some("hunter2".into()),
        })
        .await;
        let ServerMessage::RoomCreated { room } = x
            .until(|m| matches!(m, ServerMessage::RoomCreated { .. }))
            .await
        else {
            unreachable!()
        };
        assert!(room.has_password);

        send(&lobby, &y, ClientMessage::JoinRoom {
            room_id: room.room_id,
            password: Some("guess".into()),
        })
        .await;
        assert_eq!(
            y.until(is_error).await,
            ServerMessage::error("incorrect room password")
        );
    }

    // =====================================================================
    // Rounds
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_full_round_by_choices() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;

        send(&lobby, &x, ClientMessage::Ready).await;
        send(&lobby, &y, ClientMessage::Ready).await;
        let ServerMessage::GameStart {
            is_first_game,
            both_ready,
            series,
            room,
        } = x.until(|m| matches!(m, ServerMessage::GameStart { .. })).await
        else {
            unreachable!()
        };
        assert!(is_first_game);
        assert!(both_ready);
        assert_eq!(room.game_state, GameState::Playing);
        assert!(series.wins.values().all(|w| *w == 0));
        y.until(|m| matches!(m, ServerMessage::GameStart { .. })).await;

        send(&lobby, &x, ClientMessage::Choice { choice: Choice::Rock })
            .await;
        send(&lobby, &y, ClientMessage::Choice {
            choice: Choice::Scissors,
        })
        .await;

        let ServerMessage::GameResult {
            choices, results, ..
        } = y.until(is_result).await
        else {
            unreachable!()
        };
        let x_name = default_name_of(&x);
        let y_name = default_name_of(&y);
        assert_eq!(choices.len(), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(choices[&x_name], Choice::Rock);
        assert_eq!(results[&x_name], Outcome::Win);
        assert_eq!(results[&y_name], Outcome::Lose);

        let ServerMessage::RoomUpdated { room } = y.recv().await else {
            panic!("room_updated follows game_result");
        };
        assert_eq!(room.game_state, GameState::Waiting);
    }

    fn default_name_of(c: &Client) -> String {
        arena_session::default_name(c.id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_auto_picks_missing_choice() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;
        start(&lobby, &mut x, &mut y).await;

        send(&lobby, &x, ClientMessage::Choice {
            choice: Choice::Paper,
        })
        .await;

        let msg = x.until_within(ROUND * 2, is_result).await;
        let Some(ServerMessage::GameResult { choices, .. }) = msg else {
            panic!("round should resolve on its own");
        };
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[&default_name_of(&x)], Choice::Paper);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_mid_round_is_ignored() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;
        start(&lobby, &mut x, &mut y).await;

        send(&lobby, &x, ClientMessage::Ready).await;
        send(&lobby, &x, ClientMessage::Ping { t: Some(5) }).await;
        assert_eq!(x.recv().await, ServerMessage::Pong { t: 5 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_choice_is_refused() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;
        start(&lobby, &mut x, &mut y).await;

        send(&lobby, &x, ClientMessage::Choice { choice: Choice::Rock })
            .await;
        send(&lobby, &x, ClientMessage::Choice {
            choice: Choice::Paper,
        })
        .await;
        assert_eq!(
            x.until(is_error).await,
            ServerMessage::error("you have already chosen this round")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_game_is_never_first_game() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;
        start(&lobby, &mut x, &mut y).await;

        send(&lobby, &x, ClientMessage::Choice { choice: Choice::Rock })
            .await;
        send(&lobby, &y, ClientMessage::Choice { choice: Choice::Rock })
            .await;
        x.until(is_result).await;

        send(&lobby, &x, ClientMessage::NewGame).await;
        send(&lobby, &y, ClientMessage::NewGame).await;
        x.until(|m| {
            matches!(m, ServerMessage::PlayerReadyForNewGame { .. })
        })
        .await;
        let ServerMessage::GameStart { is_first_game, .. } = x
            .until(|m| matches!(m, ServerMessage::GameStart { .. }))
            .await
        else {
            unreachable!()
        };
        assert!(!is_first_game);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_mid_round_voids_it() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;
        start(&lobby, &mut x, &mut y).await;

        lobby.disconnect(y.id).await.unwrap();

        let ServerMessage::PlayerLeft { room, .. } = x
            .until(|m| matches!(m, ServerMessage::PlayerLeft { .. }))
            .await
        else {
            unreachable!()
        };
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.game_state, GameState::Waiting);

        let later = x.drain(ROUND * 3).await;
        assert!(!later.iter().any(is_result), "voided round resolved");
    }

    // =====================================================================
    // Names / chat / ping
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_rename_is_announced_to_room() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;

        send(&lobby, &x, ClientMessage::SetName { name: " Ana ".into() })
            .await;
        let ServerMessage::PlayerRenamed { player_name, room } = y
            .until(|m| matches!(m, ServerMessage::PlayerRenamed { .. }))
            .await
        else {
            unreachable!()
        };
        assert_eq!(player_name, "Ana");
        assert!(room.players.iter().any(|p| p.name == "Ana"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_name_is_refused() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        send(&lobby, &x, ClientMessage::SetName { name: "   ".into() })
            .await;
        assert!(is_error(&x.recv().await));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_to_roommates_name_is_refused() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;

        send(&lobby, &y, ClientMessage::SetName {
            name: format!(" {} ", default_name_of(&x)),
        })
        .await;
        let ServerMessage::Error { message } = y.until(is_error).await else {
            unreachable!()
        };
        assert!(message.contains(&default_name_of(&x)));

        // The old name stands, so a round still keys both players apart.
        start(&lobby, &mut x, &mut y).await;
        send(&lobby, &x, ClientMessage::Choice { choice: Choice::Paper })
            .await;
        send(&lobby, &y, ClientMessage::Choice { choice: Choice::Rock })
            .await;
        let ServerMessage::GameResult { results, scores, .. } =
            x.until(is_result).await
        else {
            unreachable!()
        };
        assert_eq!(results.len(), 2);
        assert_eq!(scores.len(), 2);
        assert_eq!(results[&default_name_of(&y)], Outcome::Lose);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_outside_room_may_reuse_a_name() {
        let lobby = spawn_lobby();
        let x = connect(&lobby).await;
        let mut y = connect(&lobby).await;

        send(&lobby, &y, ClientMessage::SetName {
            name: default_name_of(&x),
        })
        .await;
        send(&lobby, &y, ClientMessage::Ping { t: Some(1) }).await;
        assert_eq!(y.recv().await, ServerMessage::Pong { t: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_with_taken_name_is_refused() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;

        send(&lobby, &x, ClientMessage::CreateRoom {
            room_name: None,
            password: None,
        })
        .await;
        let ServerMessage::RoomCreated { room } = x
            .until(|m| matches!(m, ServerMessage::RoomCreated { .. }))
            .await
        else {
            unreachable!()
        };

        send(&lobby, &y, ClientMessage::SetName {
            name: default_name_of(&x),
        })
        .await;
        send(&lobby, &y, ClientMessage::JoinRoom {
            room_id: room.room_id.clone(),
            password: None,
        })
        .await;
        let ServerMessage::Error { message } = y.until(is_error).await else {
            unreachable!()
        };
        assert!(message.contains("already taken"));

        // A fresh name gets the seat.
        send(&lobby, &y, ClientMessage::SetName { name: "Ana".into() })
            .await;
        send(&lobby, &y, ClientMessage::JoinRoom {
            room_id: room.room_id,
            password: None,
        })
        .await;
        let ServerMessage::PlayerJoined { player_name, room } = x
            .until(|m| matches!(m, ServerMessage::PlayerJoined { .. }))
            .await
        else {
            unreachable!()
        };
        assert_eq!(player_name, "Ana");
        assert_eq!(room.players.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_requires_room() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        send(&lobby, &x, ClientMessage::Chat {
            message: "hi".into(),
        })
        .await;
        assert_eq!(
            x.recv().await,
            ServerMessage::error("you are not in a room")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_is_trimmed_and_relayed() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;

        send(&lobby, &x, ClientMessage::Chat {
            message: "  gg  ".into(),
        })
        .await;
        assert_eq!(
            y.until(|m| matches!(m, ServerMessage::Chat { .. })).await,
            ServerMessage::Chat {
                player_name: default_name_of(&x),
                message: "gg".into(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_too_long_is_refused() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        let mut y = connect(&lobby).await;
        seat_pair(&lobby, &mut x, &mut y).await;

        send(&lobby, &x, ClientMessage::Chat {
            message: "a".repeat(MAX_CHAT_CHARS + 1),
        })
        .await;
        assert!(is_error(&x.until(is_error).await));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_without_t_uses_clock() {
        let lobby = spawn_lobby();
        let mut x = connect(&lobby).await;
        send(&lobby, &x, ClientMessage::Ping { t: None }).await;
        let ServerMessage::Pong { t } = x.recv().await else {
            panic!("expected pong");
        };
        assert!(t > 0);
    }
}
