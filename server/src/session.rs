use crate::engine::TurnEngine;
use crate::error::{AskError, EngineError, RoomError};
use crate::players::Player;
use crate::rooms::{GameKind, RoomManager, RoomState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const WAITING_POLL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Screen {
    Home,
    Join,
    New,
    Waiting,
    Game,
}

fn resume_screen(player: &Player) -> Screen {
    if player.room_id() != 0 {
        Screen::Waiting
    } else {
        Screen::Home
    }
}

/// Walks a player through the lobby screens until they go offline. Call it
/// only after [`Player::claim_session`] succeeded; a reconnect while it runs
/// is picked up by the same loop.
pub async fn run(rooms: Arc<RoomManager>, engine: Arc<TurnEngine>, player: Arc<Player>) {
    let mut screen = resume_screen(&player);
    loop {
        let step = match screen {
            Screen::Home => home(&player).await,
            Screen::Join => join(&rooms, &player).await,
            Screen::New => new_room(&rooms, &player).await,
            Screen::Waiting => waiting(&rooms, &player).await,
            Screen::Game => game(&rooms, &engine, &player).await,
        };
        screen = match step {
            Ok(next) => next,
            // A seat in a running round is played out, online or not.
            Err(AskError::Exit | AskError::Disconnected) if holds_seat(&rooms, &player) => Screen::Game,
            Err(AskError::Exit) => back_from(&rooms, &player, screen),
            Err(AskError::Timeout) => screen,
            Err(AskError::Disconnected) => {
                if player.is_online() {
                    resume_screen(&player)
                } else {
                    player.release_session();
                    if player.is_online() && player.claim_session() {
                        resume_screen(&player)
                    } else {
                        break;
                    }
                }
            }
        };
    }
    debug!(player_id = player.id, "session ended");
}

fn back_from(rooms: &RoomManager, player: &Player, screen: Screen) -> Screen {
    match screen {
        Screen::Home | Screen::Join | Screen::New => Screen::Home,
        Screen::Waiting => {
            leave(rooms, player);
            Screen::Home
        }
        Screen::Game => Screen::Game,
    }
}

fn holds_seat(rooms: &RoomManager, player: &Player) -> bool {
    let Some(room) = rooms.room(player.room_id()) else {
        return false;
    };
    let inner = room.lock();
    inner.state == RoomState::Running
        && inner
            .table
            .as_ref()
            .is_some_and(|table| table.game.players.contains(&player.id))
}

fn leave(rooms: &RoomManager, player: &Player) {
    let room_id = player.room_id();
    let Ok(outcome) = rooms.leave_room(room_id, player.id) else {
        return;
    };
    if outcome.destroyed {
        return;
    }
    rooms.broadcast(
        room_id,
        &format!("{} left the room, {} players remain\n", player.name, outcome.remaining),
        &[],
    );
    if let Some(owner) = outcome.new_creator.and_then(|id| rooms.player(id)) {
        rooms.broadcast(room_id, &format!("{} is the new room owner\n", owner.name), &[]);
    }
}

async fn home(player: &Player) -> Result<Screen, AskError> {
    player.write("1. Join a room\n2. Create a room\n")?;
    let answer = player.ask(None).await?;
    match answer.as_str() {
        "1" => Ok(Screen::Join),
        "2" => Ok(Screen::New),
        _ => {
            player.write_error(&"choose 1 or 2")?;
            Ok(Screen::Home)
        }
    }
}

async fn join(rooms: &RoomManager, player: &Player) -> Result<Screen, AskError> {
    player.write_object(&rooms.room_summaries())?;
    player.write("Enter the id of the room to join\n")?;
    let answer = player.ask(None).await?;
    let Ok(room_id) = answer.parse::<u64>() else {
        player.write_error(&"room id must be a number")?;
        return Ok(Screen::Join);
    };
    let locked = rooms
        .room(room_id)
        .map(|room| room.summary().locked)
        .unwrap_or(false);
    let password = if locked {
        player.write("Password:\n")?;
        player.ask(None).await?
    } else {
        String::new()
    };
    match rooms.join_room(room_id, player.id, &password) {
        Ok(()) => {
            let count = rooms.room_members(room_id).map(|members| members.len()).unwrap_or(0);
            rooms.broadcast(
                room_id,
                &format!("{} joined the room, {count} players now\n", player.name),
                &[],
            );
            Ok(Screen::Waiting)
        }
        Err(err) => {
            player.write_error(&err)?;
            Ok(Screen::Join)
        }
    }
}

async fn new_room(rooms: &RoomManager, player: &Player) -> Result<Screen, AskError> {
    player.write("1. LaiZi\n2. Skill\n")?;
    let kind = match player.ask(None).await?.as_str() {
        "1" => GameKind::LaiZi,
        "2" => GameKind::Skill,
        _ => {
            player.write_error(&"choose 1 or 2")?;
            return Ok(Screen::New);
        }
    };
    match rooms.create_room(player.id, kind, "", 0) {
        Ok(room) => {
            player.write(format!("Created room {}\n", room.id))?;
            Ok(Screen::Waiting)
        }
        Err(err) => {
            player.write_error(&err)?;
            Ok(Screen::Home)
        }
    }
}

/// Lobby of one room. Polls so a round started by the owner pulls every
/// member into the game screen.
async fn waiting(rooms: &RoomManager, player: &Player) -> Result<Screen, AskError> {
    let _reading = player.transaction();
    loop {
        let read = player.read_next(Some(WAITING_POLL)).await;
        let room_id = player.room_id();
        let room = rooms.room(room_id);
        if room.as_ref().is_some_and(|room| room.state() == RoomState::Running) {
            return Ok(Screen::Game);
        }
        let line = match read {
            Ok(line) => line,
            Err(AskError::Timeout) => String::new(),
            Err(err) => return Err(err),
        };
        if room.is_none() {
            player.write_error(&RoomError::NotFound)?;
            return Ok(Screen::Home);
        }
        if line.is_empty() {
            continue;
        }
        match waiting_command(rooms, player, room_id, &line) {
            Ok(Some(next)) => return Ok(next),
            Ok(None) => {}
            Err(err) => player.write_error(&err)?,
        }
    }
}

fn waiting_command(
    rooms: &RoomManager,
    player: &Player,
    room_id: u64,
    line: &str,
) -> Result<Option<Screen>, RoomError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["ls"] | ["v"] => {
            let _ = player.write_object(&rooms.member_infos(room_id));
            if let Some(room) = rooms.room(room_id) {
                let _ = player.write_object(room.lock().properties());
            }
        }
        ["s"] | ["start"] => {
            rooms.start_game(room_id, player.id, rand::random())?;
            return Ok(Some(Screen::Game));
        }
        ["set", "password"] => rooms.set_password(room_id, player.id, "")?,
        ["set", "password", password] => rooms.set_password(room_id, player.id, password)?,
        ["set", "players", count] => {
            let capacity = count.parse().map_err(|_| RoomError::InvalidCapacity)?;
            rooms.set_capacity(room_id, player.id, capacity)?;
        }
        ["set", key, value @ ("on" | "off")] => {
            if !rooms.set_property(room_id, player.id, key, *value == "on")? {
                let _ = player.write(format!("unknown property {key}\n"));
            }
        }
        _ => rooms.broadcast(room_id, &format!("{} says: {line}\n", player.name), &[]),
    }
    Ok(None)
}

async fn game(rooms: &RoomManager, engine: &TurnEngine, player: &Arc<Player>) -> Result<Screen, AskError> {
    match engine.run(player).await {
        Ok(()) => Ok(Screen::Waiting),
        Err(EngineError::Disconnected) => {
            info!(player_id = player.id, "player left after disconnecting mid-round");
            leave(rooms, player);
            Err(AskError::Disconnected)
        }
        Err(err) => {
            warn!(player_id = player.id, %err, "round aborted");
            let _ = player.write_error(&err);
            if !player.is_online() {
                return Err(AskError::Disconnected);
            }
            leave(rooms, player);
            Ok(Screen::Home)
        }
    }
}
