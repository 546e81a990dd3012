//! Turn-token driven round loop.
//!
//! Every seated player runs [`TurnEngine::run`] on their own task. A player
//! only touches the round while holding their token, and passes it on only
//! after their change to the [`Game`] is stored under the room lock.

use crate::config::EngineConfig;
use crate::error::{EngineError, RoomError};
use crate::players::Player;
use crate::rooms::{Room, RoomInner, RoomManager, RoomState, PROP_SKILL};
use crate::table::{Phase, Table};
use landlord_core::{
    format_hand, format_played, BidTurn, Game, GameError, PlayOutcome, PlayerId, RuleSet,
};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Deals a round for the room's current members and queues the opener's
/// first bid token.
pub fn init_game(room: &RoomInner, rules: Arc<dyn RuleSet>, seed: u64) -> Result<Table, RoomError> {
    let players: Vec<PlayerId> = room.members().collect();
    let game = Game::new(players, rules, seed)?;
    let opener = game.opener;
    let table = Table::new(game);
    table.hand(opener, Phase::Bid);
    Ok(table)
}

pub struct TurnEngine {
    rooms: Arc<RoomManager>,
    config: EngineConfig,
}

impl TurnEngine {
    pub fn new(rooms: Arc<RoomManager>, config: EngineConfig) -> Self {
        Self { rooms, config }
    }

    pub async fn run(&self, player: &Arc<Player>) -> Result<(), EngineError> {
        let room = self
            .rooms
            .room(player.room_id())
            .ok_or(EngineError::RoomGone)?;
        let (token, intro) = {
            let inner = room.lock();
            let table = inner.table.as_ref().ok_or(EngineError::RoomGone)?;
            let token = table.token(player.id).ok_or(EngineError::RoomGone)?;
            (token, deal_notice(&table.game, player.id))
        };
        let _ = player.write(format!("Game starting!\n{intro}"));

        loop {
            let Some(phase) = token.take().await else {
                debug!(player_id = player.id, "token queue closed");
                return Err(EngineError::Closed);
            };
            debug!(player_id = player.id, room_id = room.id, ?phase, "token taken");
            match phase {
                Phase::Bid | Phase::Reset => self.handle_bid(&room, player).await?,
                Phase::Play => self.handle_play(&room, player).await?,
                Phase::WaitExit => break,
            }
        }
        if !player.is_online() {
            return Err(EngineError::Disconnected);
        }
        Ok(())
    }

    fn with_table<T>(room: &Room, f: impl FnOnce(&mut Table) -> T) -> Result<T, EngineError> {
        let mut inner = room.lock();
        let table = inner.table.as_mut().ok_or(EngineError::RoomGone)?;
        Ok(f(table))
    }

    fn hand_off(&self, room: &Room, next: PlayerId, phase: Phase) -> Result<(), EngineError> {
        let handed = Self::with_table(room, |table| table.hand(next, phase))?;
        if !handed {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.rooms
            .player(id)
            .map(|player| player.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    async fn handle_bid(&self, room: &Room, player: &Arc<Player>) -> Result<(), EngineError> {
        let turn = Self::with_table(room, |table| table.game.begin_bid(player.id))??;
        match turn {
            BidTurn::Ask => {
                self.rooms.broadcast(
                    room.id,
                    &format!("Waiting for {} to decide on the landlord seat...\n", player.name),
                    &[player.id],
                );
                let accepted = {
                    let _reading = player.transaction();
                    let _ = player.write("Would you like to be the landlord? (y or n)\n");
                    match player.read_next(Some(self.config.bid_timeout)).await {
                        Ok(answer) => answer.eq_ignore_ascii_case("y"),
                        Err(err) => {
                            debug!(player_id = player.id, %err, "bid defaulted to decline");
                            false
                        }
                    }
                };
                let next = Self::with_table(room, |table| table.game.record_bid(player.id, accepted))??;
                let verb = if accepted { "bids for" } else { "declines" };
                self.rooms
                    .broadcast(room.id, &format!("{} {verb} the landlord seat\n", player.name), &[]);
                self.hand_off(room, next, Phase::Bid)
            }
            BidTurn::Restart { opener } => {
                info!(room_id = room.id, "nobody bid, dealing again");
                self.rooms.broadcast(
                    room.id,
                    "Nobody wants to be the landlord. Dealing again!\n",
                    &[],
                );
                let notices = Self::with_table(room, |table| {
                    table
                        .game
                        .players
                        .iter()
                        .map(|id| (*id, deal_notice(&table.game, *id)))
                        .collect::<Vec<_>>()
                })?;
                for (id, notice) in notices {
                    if let Some(seated) = self.rooms.player(id) {
                        let _ = seated.write(notice);
                    }
                }
                self.hand_off(room, opener, Phase::Reset)
            }
            BidTurn::TieBreak { next } => {
                self.rooms.broadcast(
                    room.id,
                    &format!("Several bids! {} decides the landlord seat\n", self.name_of(next)),
                    &[],
                );
                self.hand_off(room, next, Phase::Bid)
            }
            BidTurn::Landlord(crowning) => {
                let extra = crowning
                    .additional
                    .iter()
                    .map(|card| card.rank.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                self.rooms.broadcast(
                    room.id,
                    &format!(
                        "{} is the landlord and takes the extra cards: {extra}\nThe second universal card is: {}\n",
                        self.name_of(crowning.landlord),
                        crowning.universal
                    ),
                    &[],
                );
                self.hand_off(room, crowning.landlord, Phase::Play)
            }
        }
    }

    async fn handle_play(&self, room: &Room, player: &Arc<Player>) -> Result<(), EngineError> {
        let deadline = Instant::now() + self.config.play_timeout;
        let _reading = player.transaction();
        loop {
            let prompt = Self::with_table(room, |table| {
                play_prompt(&table.game, player.id, deadline, |id| self.name_of(id))
            })?;
            let _ = player.write(prompt);

            let remaining = deadline.saturating_duration_since(Instant::now());
            let (answer, defaulted) = match player.read_next(Some(remaining)).await {
                Ok(answer) => (answer.to_lowercase(), false),
                Err(err) => {
                    debug!(player_id = player.id, %err, "play defaulted");
                    let action = Self::with_table(room, |table| table.game.default_action(player.id))?;
                    (action, true)
                }
            };

            if answer == "ls" || answer == "v" {
                let view = {
                    let inner = room.lock();
                    let skill = inner.property(PROP_SKILL);
                    let table = inner.table.as_ref().ok_or(EngineError::RoomGone)?;
                    table_view(&table.game, player.id, skill, |id| self.name_of(id))
                };
                let _ = player.write(view);
                continue;
            }

            let result = Self::with_table(room, |table| table.game.play(player.id, &answer))?;
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(err @ (GameError::InvalidFaces | GameError::MustPlay | GameError::MustBeatPrevious))
                    if !defaulted =>
                {
                    let _ = player.write_error(&err);
                    continue;
                }
                Err(err) => {
                    warn!(player_id = player.id, %err, "play rejected");
                    return Err(err.into());
                }
            };

            return match outcome {
                PlayOutcome::Passed { next } => {
                    self.rooms.broadcast(
                        room.id,
                        &format!("{} passed. Next player is {}\n", player.name, self.name_of(next)),
                        &[],
                    );
                    self.hand_off(room, next, Phase::Play)
                }
                PlayOutcome::Played {
                    cards,
                    next: Some(next),
                    ..
                } => {
                    self.rooms.broadcast(
                        room.id,
                        &format!(
                            "{} played {}. Next player is {}\n",
                            player.name,
                            format_played(&cards),
                            self.name_of(next)
                        ),
                        &[],
                    );
                    self.hand_off(room, next, Phase::Play)
                }
                PlayOutcome::Played { cards, next: None, .. } => {
                    self.finish_round(room, player, &format_played(&cards))
                }
            };
        }
    }

    fn finish_round(&self, room: &Room, player: &Player, played: &str) -> Result<(), EngineError> {
        let (table, team) = {
            let mut inner = room.lock();
            let skill = inner.property(PROP_SKILL);
            let table = inner.table.take().ok_or(EngineError::RoomGone)?;
            inner.state = RoomState::Waiting;
            inner.touch();
            let team = team_label(&table.game, player.id, skill);
            (table, team)
        };
        info!(
            room_id = room.id,
            winner = player.id,
            winners = ?table.game.winners(),
            %team,
            "round finished"
        );
        self.rooms.broadcast(
            room.id,
            &format!("{} played {played}. The {team} wins the game!\n", player.name),
            &[],
        );
        table.release_all(Phase::WaitExit);
        table.close();
        Ok(())
    }
}

fn universals_line(game: &Game) -> String {
    game.universals
        .iter()
        .map(|rank| rank.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn deal_notice(game: &Game, player: PlayerId) -> String {
    format!(
        "The universal card is: {}\nYour cards: {}\n",
        universals_line(game),
        format_hand(game.hand(player))
    )
}

fn play_prompt(
    game: &Game,
    player: PlayerId,
    deadline: Instant,
    name_of: impl Fn(PlayerId) -> String,
) -> String {
    let mut prompt = String::new();
    if !game.is_master(player) && !game.last_played.is_empty() {
        if let Some(last) = game.last_player {
            prompt.push_str(&format!(
                "{} played: {}\n",
                name_of(last),
                format_played(&game.last_played)
            ));
        }
    }
    let secs = deadline.saturating_duration_since(Instant::now()).as_secs();
    prompt.push_str(&format!("Timeout: {secs}s, it's your turn to play\n"));
    prompt.push_str(&format!("Your cards: {}\n", format_hand(game.hand(player))));
    prompt
}

fn team_label(game: &Game, player: PlayerId, skill: bool) -> String {
    if skill {
        format!("team{}", game.group(player))
    } else if game.is_landlord(player) {
        "landlord".to_string()
    } else {
        "peasants".to_string()
    }
}

/// Standings plus the per-rank count of cards the viewer cannot see.
fn table_view(game: &Game, viewer: PlayerId, skill: bool, name_of: impl Fn(PlayerId) -> String) -> String {
    let mut view = String::new();
    for id in game.players.iter() {
        let marker = if *id == viewer { "*" } else { " " };
        let identity = if skill {
            format!("team{}", game.group(*id))
        } else if game.is_landlord(*id) {
            "landlord".to_string()
        } else {
            "peasant".to_string()
        };
        view.push_str(&format!(
            "{marker}{:<16} {:>3} cards  {identity}\n",
            name_of(*id),
            game.hand(*id).len()
        ));
    }
    let surplus = game
        .surplus_for(viewer)
        .into_iter()
        .map(|(rank, count)| format!("{rank}:{count}"))
        .collect::<Vec<_>>()
        .join(" ");
    view.push_str(&format!("Remaining: {surplus}\n"));
    view.push_str(&format!("Universal cards: {}\n", universals_line(game)));
    view
}

impl std::fmt::Debug for TurnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnEngine").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landlord_core::LandlordRules;

    #[test]
    fn view_marks_viewer_and_lists_surplus() {
        let game = Game::new(vec![1, 2, 3], Arc::new(LandlordRules), 3).unwrap();
        let view = table_view(&game, 2, false, |id| format!("p{id}"));
        assert!(view.contains("*p2"));
        assert!(view.contains(" p1"));
        assert!(view.contains("Remaining: 3:"));
        assert!(view.contains("Universal cards:"));
    }

    #[test]
    fn team_labels_follow_rules() {
        let game = Game::new(vec![1, 2], Arc::new(LandlordRules), 3).unwrap();
        assert_eq!(team_label(&game, 1, false), "peasants");
        assert_eq!(team_label(&game, 1, true), "team0");
    }
}
