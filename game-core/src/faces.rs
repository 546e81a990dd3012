use crate::card::Rank;
use crate::rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceKind {
    Single,
    Pair,
    Triple,
    Straight,
    Union3,
    Union4,
    Bomb,
    JokerBomb,
}

/// One interpretation of a played card set.
///
/// `main` is the rule value of the highest rank in the main group. For
/// straights `width` is the copies per step and `length` the run length; for
/// unions `width` is the kicker width and `length` the number of main groups;
/// for bombs `length` is the card count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Face {
    pub kind: FaceKind,
    pub main: u8,
    pub width: usize,
    pub length: usize,
}

impl Face {
    pub fn is_bomb(&self) -> bool {
        matches!(self.kind, FaceKind::Bomb | FaceKind::JokerBomb)
    }

    pub fn beats(&self, prev: &Face) -> bool {
        use FaceKind::*;
        match (self.kind, prev.kind) {
            (JokerBomb, JokerBomb) => self.length > prev.length,
            (JokerBomb, _) => true,
            (_, JokerBomb) => false,
            (Bomb, Bomb) => (self.length, self.main) > (prev.length, prev.main),
            (Bomb, _) => true,
            (_, Bomb) => false,
            (next, last) => {
                next == last
                    && self.width == prev.width
                    && self.length == prev.length
                    && self.main > prev.main
            }
        }
    }
}

fn counts_by_value(ranks: &[Rank], rules: &dyn RuleSet) -> BTreeMap<u8, usize> {
    let mut counts = BTreeMap::new();
    for rank in ranks.iter() {
        *counts.entry(rules.value(*rank)).or_insert(0) += 1;
    }
    counts
}

fn push_unique(faces: &mut Vec<Face>, face: Face) {
    if !faces.contains(&face) {
        faces.push(face);
    }
}

/// Every face `ranks` can be read as, bombs first. Empty when the set is not
/// a legal play.
pub fn parse_faces(ranks: &[Rank], rules: &dyn RuleSet) -> Vec<Face> {
    let mut faces = Vec::new();
    let total = ranks.len();
    if total == 0 {
        return faces;
    }
    let counts = counts_by_value(ranks, rules);

    if total >= 2
        && ranks.iter().all(|rank| rank.is_joker())
        && ranks.contains(&Rank::BlackJoker)
        && ranks.contains(&Rank::RedJoker)
    {
        push_unique(
            &mut faces,
            Face {
                kind: FaceKind::JokerBomb,
                main: rules.value(Rank::RedJoker),
                width: 1,
                length: total,
            },
        );
    }

    if counts.len() == 1 {
        if let Some(&value) = counts.keys().next() {
            let (kind, length) = match total {
                1 => (FaceKind::Single, 1),
                2 => (FaceKind::Pair, 1),
                3 => (FaceKind::Triple, 1),
                _ => (FaceKind::Bomb, total),
            };
            push_unique(
                &mut faces,
                Face {
                    kind,
                    main: value,
                    width: total.min(3),
                    length,
                },
            );
        }
    }

    if counts.len() >= 2 {
        let width = counts.values().next().copied().unwrap_or(0);
        if counts.values().all(|count| *count == width) {
            let values: Vec<u8> = counts.keys().copied().collect();
            if rules.is_straight(&values, width) {
                push_unique(
                    &mut faces,
                    Face {
                        kind: FaceKind::Straight,
                        main: values[values.len() - 1],
                        width,
                        length: values.len(),
                    },
                );
            }
        }
    }

    parse_union3(&counts, total, rules, &mut faces);
    parse_union4(&counts, total, &mut faces);

    faces.sort_by_key(|face| !face.is_bomb());
    faces
}

fn parse_union3(
    counts: &BTreeMap<u8, usize>,
    total: usize,
    rules: &dyn RuleSet,
    faces: &mut Vec<Face>,
) {
    let triples: Vec<u8> = counts
        .iter()
        .filter(|(_, count)| **count >= 3)
        .map(|(value, _)| *value)
        .collect();
    for start in 0..triples.len() {
        for end in start..triples.len() {
            let run = &triples[start..=end];
            let steps = run.len();
            if steps > 1 && !rules.is_straight(run, 3) {
                continue;
            }
            if total < 3 * steps {
                continue;
            }
            let mut rest = counts.clone();
            for value in run.iter() {
                if let Some(count) = rest.get_mut(value) {
                    *count -= 3;
                }
            }
            let rest_total = total - 3 * steps;
            let width = if rest_total == steps {
                1
            } else if rest_total == 2 * steps && rest.values().all(|count| count % 2 == 0) {
                2
            } else {
                continue;
            };
            push_unique(
                faces,
                Face {
                    kind: FaceKind::Union3,
                    main: run[steps - 1],
                    width,
                    length: steps,
                },
            );
        }
    }
}

fn parse_union4(counts: &BTreeMap<u8, usize>, total: usize, faces: &mut Vec<Face>) {
    if total != 6 && total != 8 {
        return;
    }
    for (value, count) in counts.iter() {
        if *count < 4 {
            continue;
        }
        let mut rest = counts.clone();
        rest.insert(*value, count - 4);
        let width = if total == 6 {
            1
        } else if rest.values().all(|count| count % 2 == 0) {
            2
        } else {
            continue;
        };
        push_unique(
            faces,
            Face {
                kind: FaceKind::Union4,
                main: *value,
                width,
                length: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::LandlordRules;
    use Rank::*;

    fn faces(ranks: &[Rank]) -> Vec<Face> {
        parse_faces(ranks, &LandlordRules)
    }

    fn first(ranks: &[Rank]) -> Face {
        faces(ranks)[0]
    }

    #[test]
    fn classify_single_pair_triple() {
        assert_eq!(first(&[Three]).kind, FaceKind::Single);
        assert_eq!(first(&[Four, Four]).kind, FaceKind::Pair);
        assert_eq!(first(&[Five, Five, Five]).kind, FaceKind::Triple);
    }

    #[test]
    fn classify_bomb_counts_cards() {
        let bomb = first(&[Eight, Eight, Eight, Eight]);
        assert_eq!(bomb.kind, FaceKind::Bomb);
        assert_eq!(bomb.length, 4);
    }

    #[test]
    fn classify_joker_bomb() {
        let face = first(&[BlackJoker, RedJoker]);
        assert_eq!(face.kind, FaceKind::JokerBomb);
    }

    #[test]
    fn classify_straight() {
        let face = first(&[Three, Four, Five, Six, Seven]);
        assert_eq!(face.kind, FaceKind::Straight);
        assert_eq!(face.width, 1);
        assert_eq!(face.length, 5);
    }

    #[test]
    fn straight_may_end_on_ace_but_not_two() {
        assert_eq!(first(&[Ten, Jack, Queen, King, Ace]).kind, FaceKind::Straight);
        assert!(faces(&[Jack, Queen, King, Ace, Two]).is_empty());
    }

    #[test]
    fn classify_double_straight() {
        let face = first(&[Three, Three, Four, Four, Five, Five]);
        assert_eq!(face.kind, FaceKind::Straight);
        assert_eq!(face.width, 2);
        assert_eq!(face.length, 3);
    }

    #[test]
    fn plain_airplane_is_a_triple_straight() {
        let face = first(&[Three, Three, Three, Four, Four, Four]);
        assert_eq!(face.kind, FaceKind::Straight);
        assert_eq!(face.width, 3);
        assert_eq!(face.length, 2);
    }

    #[test]
    fn classify_triple_with_kickers() {
        let single = first(&[Six, Six, Six, Nine]);
        assert_eq!(single.kind, FaceKind::Union3);
        assert_eq!(single.width, 1);
        let pair = first(&[Seven, Seven, Seven, Nine, Nine]);
        assert_eq!(pair.kind, FaceKind::Union3);
        assert_eq!(pair.width, 2);
    }

    #[test]
    fn airplane_with_wings() {
        let face = first(&[Three, Three, Three, Four, Four, Four, Nine, King]);
        assert_eq!(face.kind, FaceKind::Union3);
        assert_eq!(face.length, 2);
        assert_eq!(face.main, LandlordRules.value(Four));
    }

    #[test]
    fn four_with_two() {
        let singles = first(&[Nine, Nine, Nine, Nine, Three, Four]);
        assert_eq!(singles.kind, FaceKind::Union4);
        assert_eq!(singles.width, 1);
        let pairs = faces(&[Ten, Ten, Ten, Ten, Three, Three, Four, Four]);
        assert!(pairs
            .iter()
            .any(|face| face.kind == FaceKind::Union4 && face.width == 2));
    }

    #[test]
    fn ambiguous_sets_yield_every_reading() {
        let readings = faces(&[Three, Three, Three, Three, Four, Four, Four, Four]);
        assert!(readings.iter().any(|face| face.kind == FaceKind::Union4));
        assert!(readings.iter().any(|face| face.kind == FaceKind::Union3));
    }

    #[test]
    fn rejects_invalid_sets() {
        assert!(faces(&[Three, Three, Four]).is_empty());
        assert!(faces(&[Three, Three, Three, Three, Four]).is_empty());
        assert!(faces(&[]).is_empty());
    }

    #[test]
    fn higher_single_beats_lower() {
        assert!(first(&[Four]).beats(&first(&[Three])));
        assert!(!first(&[Three]).beats(&first(&[Four])));
        assert!(first(&[Two]).beats(&first(&[Ace])));
    }

    #[test]
    fn shapes_must_match() {
        assert!(!first(&[Four, Four]).beats(&first(&[Three])));
        let short = first(&[Three, Four, Five, Six, Seven]);
        let long = first(&[Four, Five, Six, Seven, Eight, Nine]);
        assert!(!long.beats(&short));
        let same_length = first(&[Four, Five, Six, Seven, Eight]);
        assert!(same_length.beats(&short));
    }

    #[test]
    fn bomb_beats_non_bomb() {
        let bomb = first(&[Three, Three, Three, Three]);
        assert!(bomb.beats(&first(&[King])));
        assert!(bomb.beats(&first(&[Ten, Jack, Queen, King, Ace])));
        assert!(!first(&[Two, Two]).beats(&bomb));
    }

    #[test]
    fn larger_bomb_beats_smaller() {
        let fours = first(&[Four, Four, Four, Four]);
        let fives = first(&[Three, Three, Three, Three, Three]);
        assert!(fives.beats(&fours));
        assert!(first(&[Five, Five, Five, Five]).beats(&fours));
    }

    #[test]
    fn joker_bomb_beats_bombs() {
        let bomb = first(&[Two, Two, Two, Two]);
        let rocket = first(&[BlackJoker, RedJoker]);
        assert!(rocket.beats(&bomb));
        assert!(!bomb.beats(&rocket));
    }
}
