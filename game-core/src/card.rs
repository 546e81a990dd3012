use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
    Joker,
}

impl Suit {
    pub(crate) fn order(&self) -> u8 {
        match self {
            Suit::Clubs => 1,
            Suit::Diamonds => 2,
            Suit::Hearts => 3,
            Suit::Spades => 4,
            Suit::Joker => 5,
        }
    }

    fn to_char(&self) -> char {
        match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
            Suit::Joker => 'J',
        }
    }
}

/// Card identity. The discriminant is the rank key used by the wire aliases
/// and the remaining-count table; ordering between ranks is the rule set's job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Ace = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
    BlackJoker = 14,
    RedJoker = 15,
}

pub const SUITED_RANKS: [Rank; 13] = [
    Rank::Ace,
    Rank::Two,
    Rank::Three,
    Rank::Four,
    Rank::Five,
    Rank::Six,
    Rank::Seven,
    Rank::Eight,
    Rank::Nine,
    Rank::Ten,
    Rank::Jack,
    Rank::Queen,
    Rank::King,
];

pub const RANKS_BY_STRENGTH: [Rank; 15] = [
    Rank::Three,
    Rank::Four,
    Rank::Five,
    Rank::Six,
    Rank::Seven,
    Rank::Eight,
    Rank::Nine,
    Rank::Ten,
    Rank::Jack,
    Rank::Queen,
    Rank::King,
    Rank::Ace,
    Rank::Two,
    Rank::BlackJoker,
    Rank::RedJoker,
];

impl Rank {
    pub fn key(&self) -> u8 {
        *self as u8
    }

    pub fn from_alias(alias: char) -> Option<Self> {
        match alias.to_ascii_lowercase() {
            'a' | '1' => Some(Rank::Ace),
            '2' => Some(Rank::Two),
            '3' => Some(Rank::Three),
            '4' => Some(Rank::Four),
            '5' => Some(Rank::Five),
            '6' => Some(Rank::Six),
            '7' => Some(Rank::Seven),
            '8' => Some(Rank::Eight),
            '9' => Some(Rank::Nine),
            '0' | 't' => Some(Rank::Ten),
            'j' => Some(Rank::Jack),
            'q' => Some(Rank::Queen),
            'k' => Some(Rank::King),
            's' => Some(Rank::BlackJoker),
            'x' => Some(Rank::RedJoker),
            _ => None,
        }
    }

    pub fn alias(&self) -> char {
        match self {
            Rank::Ace => 'a',
            Rank::Two => '2',
            Rank::Three => '3',
            Rank::Four => '4',
            Rank::Five => '5',
            Rank::Six => '6',
            Rank::Seven => '7',
            Rank::Eight => '8',
            Rank::Nine => '9',
            Rank::Ten => '0',
            Rank::Jack => 'j',
            Rank::Queen => 'q',
            Rank::King => 'k',
            Rank::BlackJoker => 's',
            Rank::RedJoker => 'x',
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::BlackJoker => "BJ",
            Rank::RedJoker => "RJ",
        }
    }

    pub fn is_joker(&self) -> bool {
        matches!(self, Rank::BlackJoker | Rank::RedJoker)
    }

    pub fn random_suited<R: Rng + ?Sized>(rng: &mut R, exclude: &[Rank]) -> Rank {
        let candidates: Vec<Rank> = SUITED_RANKS
            .iter()
            .copied()
            .filter(|rank| !exclude.contains(rank))
            .collect();
        candidates
            .choose(rng)
            .copied()
            .unwrap_or(SUITED_RANKS[0])
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// A physical card. `universal` marks it as a wildcard for the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
    #[serde(default)]
    pub universal: bool,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Card {
            rank,
            suit,
            universal: false,
        }
    }

    pub fn code(&self) -> String {
        if self.rank.is_joker() {
            return self.rank.to_str().to_string();
        }
        format!("{}{}", self.suit.to_char(), self.rank.to_str())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

pub fn standard_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(54);
    let suits = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
    for suit in suits.iter() {
        for rank in SUITED_RANKS.iter() {
            deck.push(Card::new(*rank, *suit));
        }
    }
    deck.push(Card::new(Rank::BlackJoker, Suit::Joker));
    deck.push(Card::new(Rank::RedJoker, Suit::Joker));
    deck
}

pub fn shoe<R: Rng + ?Sized>(decks: usize, rng: &mut R) -> Vec<Card> {
    let mut cards = Vec::with_capacity(54 * decks);
    for _ in 0..decks {
        cards.extend(standard_deck());
    }
    cards.shuffle(rng);
    cards
}

pub fn decks_for(players: usize) -> usize {
    players.div_ceil(3).max(1)
}

pub fn copies_in_shoe(rank: Rank, decks: usize) -> usize {
    if rank.is_joker() {
        decks
    } else {
        4 * decks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn deck_has_54_cards() {
        assert_eq!(standard_deck().len(), 54);
    }

    #[test]
    fn deck_has_two_jokers() {
        let jokers = standard_deck()
            .iter()
            .filter(|c| c.rank.is_joker())
            .count();
        assert_eq!(jokers, 2);
    }

    #[test]
    fn shoe_scales_with_decks() {
        let mut rng = StdRng::seed_from_u64(1);
        let cards = shoe(2, &mut rng);
        assert_eq!(cards.len(), 108);
        let aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();
        assert_eq!(aces, copies_in_shoe(Rank::Ace, 2));
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        assert_eq!(Rank::from_alias('A'), Some(Rank::Ace));
        assert_eq!(Rank::from_alias('t'), Some(Rank::Ten));
        assert_eq!(Rank::from_alias('0'), Some(Rank::Ten));
        assert_eq!(Rank::from_alias('X'), Some(Rank::RedJoker));
        assert_eq!(Rank::from_alias('z'), None);
        for rank in RANKS_BY_STRENGTH {
            assert_eq!(Rank::from_alias(rank.alias()), Some(rank));
        }
    }

    #[test]
    fn random_suited_never_picks_jokers_or_excluded() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let rank = Rank::random_suited(&mut rng, &[Rank::Three]);
            assert!(!rank.is_joker());
            assert_ne!(rank, Rank::Three);
        }
    }

    #[test]
    fn decks_grow_every_three_players() {
        assert_eq!(decks_for(2), 1);
        assert_eq!(decks_for(3), 1);
        assert_eq!(decks_for(4), 2);
        assert_eq!(decks_for(6), 2);
        assert_eq!(decks_for(7), 3);
    }

    #[test]
    fn joker_codes_have_no_suit() {
        assert_eq!(Card::new(Rank::BlackJoker, Suit::Joker).code(), "BJ");
        assert_eq!(Card::new(Rank::Ace, Suit::Spades).code(), "SA");
    }
}
