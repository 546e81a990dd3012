use crate::card::{copies_in_shoe, shoe, Card, Rank, RANKS_BY_STRENGTH};
use crate::rules::RuleSet;
use crate::GameError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tags every card whose rank is in `universals` as a wildcard and clears the
/// tag on the rest.
pub fn set_universals(hand: &mut [Card], universals: &[Rank]) {
    for card in hand.iter_mut() {
        card.universal = universals.contains(&card.rank);
    }
}

pub fn sort_hand(hand: &mut [Card], rules: &dyn RuleSet) {
    hand.sort_by_key(|card| (card.universal, rules.value(card.rank), card.suit.order()));
}

pub fn format_hand(hand: &[Card]) -> String {
    hand.iter()
        .map(|card| {
            if card.universal {
                format!("{}*", card.rank)
            } else {
                card.rank.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedCard {
    pub card: Card,
    pub played_as: Rank,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub played: Vec<SelectedCard>,
    pub remaining: Vec<Card>,
}

impl Selection {
    pub fn played_ranks(&self) -> Vec<Rank> {
        self.played.iter().map(|sel| sel.played_as).collect()
    }
}

pub fn format_played(played: &[SelectedCard]) -> String {
    played
        .iter()
        .map(|sel| {
            if sel.card.universal {
                format!("{}*", sel.played_as)
            } else {
                sel.played_as.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Picks cards for `aliases`, one alias character per card. An exact plain
/// card is preferred; a wildcard stands in only when none is left, and never
/// for a joker.
pub fn select(hand: &[Card], aliases: &str) -> Result<Selection, GameError> {
    let mut plain: BTreeMap<Rank, Vec<Card>> = BTreeMap::new();
    let mut universals: Vec<Card> = Vec::new();
    for card in hand.iter() {
        if card.universal {
            universals.push(*card);
        } else {
            plain.entry(card.rank).or_default().push(*card);
        }
    }
    universals.reverse();

    let mut played = Vec::with_capacity(aliases.len());
    for alias in aliases.chars() {
        let rank = Rank::from_alias(alias).ok_or(GameError::InvalidFaces)?;
        if let Some(card) = plain.get_mut(&rank).and_then(|cards| cards.pop()) {
            played.push(SelectedCard {
                card,
                played_as: rank,
            });
            continue;
        }
        if rank.is_joker() {
            return Err(GameError::InvalidFaces);
        }
        let card = universals.pop().ok_or(GameError::InvalidFaces)?;
        played.push(SelectedCard {
            card,
            played_as: rank,
        });
    }
    if played.is_empty() {
        return Err(GameError::InvalidFaces);
    }

    let mut remaining: Vec<Card> = plain.into_values().flatten().collect();
    universals.reverse();
    remaining.extend(universals);
    Ok(Selection { played, remaining })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingCounts {
    counts: BTreeMap<Rank, usize>,
}

impl RemainingCounts {
    pub fn full_shoe(decks: usize) -> Self {
        let counts = RANKS_BY_STRENGTH
            .iter()
            .map(|rank| (*rank, copies_in_shoe(*rank, decks)))
            .collect();
        RemainingCounts { counts }
    }

    pub fn get(&self, rank: Rank) -> usize {
        self.counts.get(&rank).copied().unwrap_or(0)
    }

    pub fn consume(&mut self, rank: Rank) {
        if let Some(count) = self.counts.get_mut(&rank) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rank, usize)> + '_ {
        self.counts.iter().map(|(rank, count)| (*rank, *count))
    }
}

pub fn rank_counts<'a>(cards: impl IntoIterator<Item = &'a Card>) -> BTreeMap<Rank, usize> {
    let mut counts = BTreeMap::new();
    for card in cards {
        *counts.entry(card.rank).or_insert(0) += 1;
    }
    counts
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deal {
    pub hands: Vec<Vec<Card>>,
    pub reserved: Vec<Card>,
    pub decks: usize,
}

/// Splits a shuffled shoe of `decks` decks across `players` hands, setting
/// the remainder aside when the rules reserve a stack.
pub fn deal<R: Rng + ?Sized>(
    players: usize,
    decks: usize,
    rules: &dyn RuleSet,
    rng: &mut R,
) -> Result<Deal, GameError> {
    if players < 2 || decks == 0 {
        return Err(GameError::PlayerCountMismatch);
    }
    let mut cards = shoe(decks, rng);
    let total = cards.len();
    let per_player = if rules.reserved() {
        total.saturating_sub(3 * decks) / players
    } else {
        if total % players != 0 {
            return Err(GameError::PlayerCountMismatch);
        }
        total / players
    };
    if per_player == 0 {
        return Err(GameError::PlayerCountMismatch);
    }

    let mut hands: Vec<Vec<Card>> = (0..players)
        .map(|_| Vec::with_capacity(per_player))
        .collect();
    for (i, card) in cards.drain(..per_player * players).enumerate() {
        hands[i % players].push(card);
    }
    Ok(Deal {
        hands,
        reserved: cards,
        decks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;
    use crate::rules::{LandlordRules, TeamRules};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    fn sample_hand() -> Vec<Card> {
        let mut hand = vec![
            card(Rank::Three, Suit::Clubs),
            card(Rank::Three, Suit::Hearts),
            card(Rank::Seven, Suit::Spades),
            card(Rank::Ace, Suit::Diamonds),
            card(Rank::Nine, Suit::Clubs),
        ];
        set_universals(&mut hand, &[Rank::Nine]);
        hand
    }

    #[test]
    fn deal_gives_17_cards_each_and_3_reserved() {
        let mut rng = StdRng::seed_from_u64(42);
        let deal = deal(3, 1, &LandlordRules, &mut rng).unwrap();
        assert_eq!(deal.hands.len(), 3);
        assert!(deal.hands.iter().all(|hand| hand.len() == 17));
        assert_eq!(deal.reserved.len(), 3);
    }

    #[test]
    fn deal_without_reserved_stack_splits_exactly() {
        let mut rng = StdRng::seed_from_u64(42);
        let deal = deal(2, 1, &TeamRules, &mut rng).unwrap();
        assert!(deal.hands.iter().all(|hand| hand.len() == 27));
        assert!(deal.reserved.is_empty());

        let uneven = super::deal(4, 1, &TeamRules, &mut rng);
        assert_eq!(uneven.err(), Some(GameError::PlayerCountMismatch));
    }

    #[test]
    fn deal_rejects_lonely_player() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = deal(1, 1, &LandlordRules, &mut rng);
        assert_eq!(result.err(), Some(GameError::PlayerCountMismatch));
    }

    #[test]
    fn wildcards_sort_last() {
        let mut hand = sample_hand();
        sort_hand(&mut hand, &LandlordRules);
        let ranks: Vec<Rank> = hand.iter().map(|c| c.rank).collect();
        assert_eq!(
            ranks,
            vec![Rank::Three, Rank::Three, Rank::Seven, Rank::Ace, Rank::Nine]
        );
        assert_eq!(format_hand(&hand), "3 3 7 A 9*");
    }

    #[test]
    fn select_prefers_exact_cards() {
        let hand = sample_hand();
        let selection = select(&hand, "33").unwrap();
        assert!(selection.played.iter().all(|sel| !sel.card.universal));
        assert_eq!(selection.remaining.len(), 3);
    }

    #[test]
    fn select_falls_back_to_wildcard() {
        let hand = sample_hand();
        let selection = select(&hand, "333").unwrap();
        assert_eq!(selection.played_ranks(), vec![Rank::Three; 3]);
        let substituted = selection.played[2];
        assert!(substituted.card.universal);
        assert_eq!(substituted.card.rank, Rank::Nine);
        assert_eq!(format_played(&selection.played), "3 3 3*");
    }

    #[test]
    fn select_rejects_missing_rank_and_unknown_alias() {
        let hand = sample_hand();
        assert_eq!(select(&hand, "kk").err(), Some(GameError::InvalidFaces));
        assert_eq!(select(&hand, "?").err(), Some(GameError::InvalidFaces));
        assert_eq!(select(&hand, "").err(), Some(GameError::InvalidFaces));
    }

    #[test]
    fn wildcards_never_become_jokers() {
        let hand = sample_hand();
        assert_eq!(select(&hand, "x").err(), Some(GameError::InvalidFaces));
    }

    #[test]
    fn consuming_every_dealt_card_empties_the_counts() {
        let mut rng = StdRng::seed_from_u64(9);
        let deal = deal(3, 1, &LandlordRules, &mut rng).unwrap();
        let mut remaining = RemainingCounts::full_shoe(deal.decks);
        assert_eq!(remaining.total(), 54);
        for card in deal.hands.iter().flatten().chain(deal.reserved.iter()) {
            remaining.consume(card.rank);
        }
        assert_eq!(remaining.total(), 0);
        assert!(remaining.iter().all(|(_, count)| count == 0));
    }
}
