use crate::card::{decks_for, Card, Rank, RANKS_BY_STRENGTH};
use crate::faces::{parse_faces, Face};
use crate::hand::{deal, rank_counts, select, set_universals, sort_hand, RemainingCounts, SelectedCard};
use crate::rules::RuleSet;
use crate::GameError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub type PlayerId = u64;

pub const PEASANT_GROUP: u8 = 0;
pub const LANDLORD_GROUP: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Bidding,
    Playing,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BidTurn {
    /// Ask the holder whether they want the landlord seat.
    Ask,
    /// Nobody bid: the shoe was redealt and `opener` starts a fresh pass.
    Restart { opener: PlayerId },
    /// Bidding settled; the landlord starts playing.
    Landlord(Crowning),
    /// Several players bid; `next` gets the deciding bid.
    TieBreak { next: PlayerId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crowning {
    pub landlord: PlayerId,
    pub additional: Vec<Card>,
    pub universal: Rank,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
    Passed {
        next: PlayerId,
    },
    /// `next` is `None` when the play emptied the hand and won the round.
    Played {
        cards: Vec<SelectedCard>,
        face: Face,
        next: Option<PlayerId>,
    },
}

#[derive(Clone, Debug)]
pub struct Game {
    pub players: Vec<PlayerId>,
    pub groups: HashMap<PlayerId, u8>,
    pub hands: HashMap<PlayerId, Vec<Card>>,
    pub universals: Vec<Rank>,
    pub additional: Vec<Card>,
    pub decks: usize,
    pub multiple: u32,
    pub opener: PlayerId,
    pub first_player: Option<PlayerId>,
    pub last_player: Option<PlayerId>,
    pub first_rob: Option<PlayerId>,
    pub last_rob: Option<PlayerId>,
    pub final_rob: bool,
    pub last_face: Option<Face>,
    pub last_played: Vec<SelectedCard>,
    pub discards: Vec<Card>,
    pub mnemonic: RemainingCounts,
    pub phase: RoundPhase,
    pub winner: Option<PlayerId>,
    rules: Arc<dyn RuleSet>,
    rng: StdRng,
}

impl Game {
    pub fn new(
        players: Vec<PlayerId>,
        rules: Arc<dyn RuleSet>,
        seed: u64,
    ) -> Result<Self, GameError> {
        let decks = decks_for(players.len());
        let mut game = Game {
            opener: players.first().copied().unwrap_or_default(),
            players,
            groups: HashMap::new(),
            hands: HashMap::new(),
            universals: Vec::new(),
            additional: Vec::new(),
            decks,
            multiple: 1,
            first_player: None,
            last_player: None,
            first_rob: None,
            last_rob: None,
            final_rob: false,
            last_face: None,
            last_played: Vec::new(),
            discards: Vec::new(),
            mnemonic: RemainingCounts::full_shoe(decks),
            phase: RoundPhase::Bidding,
            winner: None,
            rules,
            rng: StdRng::seed_from_u64(seed),
        };
        game.deal_fresh()?;
        Ok(game)
    }

    pub fn rules(&self) -> &dyn RuleSet {
        self.rules.as_ref()
    }

    fn deal_fresh(&mut self) -> Result<(), GameError> {
        let dealt = deal(self.players.len(), self.decks, self.rules.as_ref(), &mut self.rng)?;
        let universal = Rank::random_suited(&mut self.rng, &[]);
        self.universals = vec![universal];
        self.hands.clear();
        self.groups.clear();
        for (player, mut hand) in self.players.iter().zip(dealt.hands) {
            set_universals(&mut hand, &self.universals);
            sort_hand(&mut hand, self.rules.as_ref());
            self.hands.insert(*player, hand);
            self.groups.insert(*player, PEASANT_GROUP);
        }
        self.additional = dealt.reserved;
        self.mnemonic = RemainingCounts::full_shoe(self.decks);
        self.discards.clear();
        self.multiple = 1;
        self.first_player = None;
        self.last_player = None;
        self.first_rob = None;
        self.last_rob = None;
        self.final_rob = false;
        self.last_face = None;
        self.last_played.clear();
        self.phase = RoundPhase::Bidding;
        self.winner = None;
        if let Some(opener) = self.players.choose(&mut self.rng) {
            self.opener = *opener;
        }
        Ok(())
    }

    fn expect_phase(&self, phase: RoundPhase) -> Result<(), GameError> {
        if self.phase != phase {
            return Err(GameError::WrongPhase);
        }
        Ok(())
    }

    fn expect_player(&self, player: PlayerId) -> Result<(), GameError> {
        if !self.players.contains(&player) {
            return Err(GameError::UnknownPlayer);
        }
        Ok(())
    }

    pub fn next_player(&self, current: PlayerId) -> PlayerId {
        let idx = self
            .players
            .iter()
            .position(|player| *player == current)
            .unwrap_or(0);
        self.players[(idx + 1) % self.players.len()]
    }

    pub fn hand(&self, player: PlayerId) -> &[Card] {
        self.hands.get(&player).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_landlord(&self, player: PlayerId) -> bool {
        self.groups.get(&player) == Some(&LANDLORD_GROUP)
    }

    pub fn group(&self, player: PlayerId) -> u8 {
        self.groups.get(&player).copied().unwrap_or(PEASANT_GROUP)
    }

    pub fn winners(&self) -> Vec<PlayerId> {
        match self.winner {
            Some(winner) => {
                let group = self.group(winner);
                self.players
                    .iter()
                    .copied()
                    .filter(|player| self.group(*player) == group)
                    .collect()
            }
            None => Vec::new(),
        }
    }

    pub fn begin_bid(&mut self, player: PlayerId) -> Result<BidTurn, GameError> {
        self.expect_phase(RoundPhase::Bidding)?;
        self.expect_player(player)?;
        if self.first_player == Some(player) && !self.final_rob {
            return match (self.first_rob, self.last_rob) {
                (None, _) => {
                    self.deal_fresh()?;
                    Ok(BidTurn::Restart {
                        opener: self.opener,
                    })
                }
                (Some(first), Some(last)) if first == last => {
                    Ok(BidTurn::Landlord(self.crown(first)))
                }
                (Some(first), _) => {
                    self.final_rob = true;
                    Ok(BidTurn::TieBreak { next: first })
                }
            };
        }
        if self.first_player.is_none() {
            self.first_player = Some(player);
        }
        Ok(BidTurn::Ask)
    }

    pub fn record_bid(&mut self, player: PlayerId, accepted: bool) -> Result<PlayerId, GameError> {
        self.expect_phase(RoundPhase::Bidding)?;
        self.expect_player(player)?;
        if accepted {
            self.first_rob.get_or_insert(player);
            self.last_rob = Some(player);
            self.multiple = self.multiple.saturating_mul(2);
        }
        if self.final_rob {
            self.final_rob = false;
            self.first_rob = self.last_rob;
            return Ok(self.first_player.unwrap_or(player));
        }
        Ok(self.next_player(player))
    }

    fn crown(&mut self, landlord: PlayerId) -> Crowning {
        let universal = Rank::random_suited(&mut self.rng, &self.universals);
        self.universals.push(universal);
        self.first_player = Some(landlord);
        self.last_player = Some(landlord);
        self.groups.insert(landlord, LANDLORD_GROUP);
        let additional = self.additional.clone();
        self.hands
            .entry(landlord)
            .or_default()
            .extend(additional.iter().copied());
        for hand in self.hands.values_mut() {
            set_universals(hand, &self.universals);
            sort_hand(hand, self.rules.as_ref());
        }
        self.phase = RoundPhase::Playing;
        Crowning {
            landlord,
            additional,
            universal,
        }
    }

    /// A master must open a new combination and may not pass.
    pub fn is_master(&self, player: PlayerId) -> bool {
        self.last_player.map_or(true, |last| last == player)
    }

    /// What `player` does when the prompt runs out: the lowest card for a
    /// master, a pass otherwise.
    pub fn default_action(&self, player: PlayerId) -> String {
        match self.hand(player).first() {
            Some(card) if self.is_master(player) => card.rank.alias().to_string(),
            _ => "p".to_string(),
        }
    }

    pub fn play(&mut self, player: PlayerId, input: &str) -> Result<PlayOutcome, GameError> {
        self.expect_phase(RoundPhase::Playing)?;
        self.expect_player(player)?;
        let input: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let master = self.is_master(player);
        if input == "p" || input == "pass" {
            if master {
                return Err(GameError::MustPlay);
            }
            return Ok(PlayOutcome::Passed {
                next: self.next_player(player),
            });
        }

        let selection = select(self.hand(player), &input)?;
        let candidates = parse_faces(&selection.played_ranks(), self.rules.as_ref());
        if candidates.is_empty() {
            return Err(GameError::InvalidFaces);
        }
        let face = match self.last_face {
            Some(last) if !master => candidates
                .into_iter()
                .find(|face| face.beats(&last))
                .ok_or(GameError::MustBeatPrevious)?,
            _ => candidates[0],
        };

        for sel in selection.played.iter() {
            self.mnemonic.consume(sel.card.rank);
        }
        let mut remaining = selection.remaining;
        sort_hand(&mut remaining, self.rules.as_ref());
        let won = remaining.is_empty();
        self.hands.insert(player, remaining);
        self.discards
            .extend(selection.played.iter().map(|sel| sel.card));
        self.last_player = Some(player);
        self.last_face = Some(face);
        self.last_played = selection.played.clone();

        let next = if won {
            self.phase = RoundPhase::Finished;
            self.winner = Some(player);
            None
        } else {
            Some(self.next_player(player))
        };
        Ok(PlayOutcome::Played {
            cards: selection.played,
            face,
            next,
        })
    }

    /// Per-rank count of unplayed cards `viewer` does not hold, low to high.
    pub fn surplus_for(&self, viewer: PlayerId) -> Vec<(Rank, usize)> {
        let own = rank_counts(self.hand(viewer));
        RANKS_BY_STRENGTH
            .iter()
            .map(|rank| {
                let held = own.get(rank).copied().unwrap_or(0);
                (*rank, self.mnemonic.get(*rank).saturating_sub(held))
            })
            .collect()
    }
}
