use crate::card::Rank;
use std::fmt;

pub trait RuleSet: fmt::Debug + Send + Sync {
    /// Ordinal strength of a rank; higher beats lower.
    fn value(&self, rank: Rank) -> u8;

    /// Whether `values` (sorted ascending, distinct) form a straight whose
    /// every step holds `width` copies.
    fn is_straight(&self, values: &[u8], width: usize) -> bool;

    fn straight_bounds(&self) -> (u8, u8);

    /// Whether dealing sets a stack aside for the bid winner.
    fn reserved(&self) -> bool;
}

fn landlord_value(rank: Rank) -> u8 {
    match rank {
        Rank::Ace => 12,
        Rank::Two => 13,
        Rank::BlackJoker => 14,
        Rank::RedJoker => 15,
        other => other.key() - 2,
    }
}

fn contiguous_run(values: &[u8], width: usize, ceiling: u8) -> bool {
    let Some(last) = values.last() else {
        return false;
    };
    if *last > ceiling || values.windows(2).any(|pair| pair[1] != pair[0] + 1) {
        return false;
    }
    match width {
        1 => values.len() >= 5,
        2 => values.len() >= 3,
        w if w > 2 => values.len() >= 2,
        _ => false,
    }
}

/// The wildcard landlord variant: three players share one deck plus a
/// reserved stack that goes to whoever wins the bidding.
#[derive(Clone, Copy, Debug, Default)]
pub struct LandlordRules;

impl RuleSet for LandlordRules {
    fn value(&self, rank: Rank) -> u8 {
        landlord_value(rank)
    }

    fn is_straight(&self, values: &[u8], width: usize) -> bool {
        contiguous_run(values, width, self.straight_bounds().1)
    }

    fn straight_bounds(&self) -> (u8, u8) {
        (1, 12)
    }

    fn reserved(&self) -> bool {
        true
    }
}

/// Team play: every card is dealt and straights may climb through the Two.
#[derive(Clone, Copy, Debug, Default)]
pub struct TeamRules;

impl RuleSet for TeamRules {
    fn value(&self, rank: Rank) -> u8 {
        landlord_value(rank)
    }

    fn is_straight(&self, values: &[u8], width: usize) -> bool {
        contiguous_run(values, width, self.straight_bounds().1)
    }

    fn straight_bounds(&self) -> (u8, u8) {
        (1, 13)
    }

    fn reserved(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ace_and_two_rank_above_king() {
        let rules = LandlordRules;
        assert_eq!(rules.value(Rank::Three), 1);
        assert_eq!(rules.value(Rank::King), 11);
        assert!(rules.value(Rank::Ace) > rules.value(Rank::King));
        assert!(rules.value(Rank::Two) > rules.value(Rank::Ace));
        assert!(rules.value(Rank::RedJoker) > rules.value(Rank::BlackJoker));
    }

    #[test]
    fn single_straights_need_five() {
        let rules = LandlordRules;
        assert!(rules.is_straight(&[1, 2, 3, 4, 5], 1));
        assert!(!rules.is_straight(&[1, 2, 3, 4], 1));
        assert!(!rules.is_straight(&[1, 2, 4, 5, 6], 1));
    }

    #[test]
    fn wider_straights_need_fewer_steps() {
        let rules = LandlordRules;
        assert!(rules.is_straight(&[3, 4, 5], 2));
        assert!(!rules.is_straight(&[3, 4], 2));
        assert!(rules.is_straight(&[7, 8], 3));
        assert!(!rules.is_straight(&[7], 3));
    }

    #[test]
    fn straights_stop_at_ace_unless_team_rules() {
        let through_two = [9, 10, 11, 12, 13];
        assert!(!LandlordRules.is_straight(&through_two, 1));
        assert!(TeamRules.is_straight(&through_two, 1));
        assert!(!TeamRules.is_straight(&[11, 12, 13, 14, 15], 1));
    }

    #[test]
    fn only_landlord_rules_reserve_cards() {
        assert!(LandlordRules.reserved());
        assert!(!TeamRules.reserved());
    }
}
