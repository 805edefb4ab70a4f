use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::position::Position;
use crate::types::{BoardKind, Piece, Square};

/// One visual change between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Move {
        #[serde(rename = "source")]
        from: Square,
        #[serde(rename = "destination")]
        to: Square,
        piece: Piece,
    },
    Add {
        #[serde(rename = "square")]
        at: Square,
        piece: Piece,
    },
    #[serde(rename = "clear")]
    Remove {
        #[serde(rename = "square")]
        at: Square,
        piece: Piece,
    },
}

impl Operation {
    pub fn piece(&self) -> Piece {
        match *self {
            Operation::Move { piece, .. }
            | Operation::Add { piece, .. }
            | Operation::Remove { piece, .. } => piece,
        }
    }
}

/// Computes the operations that turn `old` into `new`.
///
/// Pieces present in `new` are first matched against the closest remaining
/// piece of the same kind in `old` and become moves; unmatched new pieces are
/// added and unmatched old pieces cleared. A cleared square that is also a
/// move destination (a captured piece) is left to the move.
///
/// Output order: moves by destination, then adds, then removes, each
/// ascending.
pub fn diff(old: &Position, new: &Position, kind: BoardKind) -> Vec<Operation> {
    let mut sources: BTreeMap<Square, Piece> = old
        .iter()
        .filter(|&(square, piece)| new.get(square) != Some(piece))
        .collect();
    let mut targets: BTreeMap<Square, Piece> = new
        .iter()
        .filter(|&(square, piece)| old.get(square) != Some(piece))
        .collect();

    let mut operations = Vec::new();
    let mut moved_to = BTreeSet::new();

    let pending: Vec<(Square, Piece)> = targets.iter().map(|(&s, &p)| (s, p)).collect();
    for (to, piece) in pending {
        let Some(from) = closest(&sources, piece, to, kind) else {
            continue;
        };
        sources.remove(&from);
        targets.remove(&to);
        moved_to.insert(to);
        operations.push(Operation::Move { from, to, piece });
    }

    operations.extend(
        targets
            .into_iter()
            .map(|(at, piece)| Operation::Add { at, piece }),
    );
    operations.extend(
        sources
            .into_iter()
            .filter(|(at, _)| !moved_to.contains(at))
            .map(|(at, piece)| Operation::Remove { at, piece }),
    );

    operations
}

/// Applies `operations` to a copy of `position` as one set: every cleared
/// square and move source is vacated before any destination is filled.
pub fn apply(position: &Position, operations: &[Operation]) -> Position {
    let mut next = position.clone();
    for operation in operations {
        match *operation {
            Operation::Move { from, .. } => {
                next.remove(from);
            }
            Operation::Remove { at, .. } => {
                next.remove(at);
            }
            Operation::Add { .. } => {}
        }
    }
    for operation in operations {
        match *operation {
            Operation::Move { to, piece, .. } => {
                next.insert(to, piece);
            }
            Operation::Add { at, piece } => {
                next.insert(at, piece);
            }
            Operation::Remove { .. } => {}
        }
    }
    next
}

/// Chebyshev distance between the digit-derived coordinates of two squares.
///
/// A square's leading digit is looked up in the board's column alphabet
/// (1-based, 0 when absent) and the remaining digits form the second
/// coordinate. This only approximates board geometry.
pub fn square_distance(a: Square, b: Square, kind: BoardKind) -> u32 {
    let (ax, ay) = coordinates(a, kind);
    let (bx, by) = coordinates(b, kind);
    ax.abs_diff(bx).max(ay.abs_diff(by))
}

fn coordinates(square: Square, kind: BoardKind) -> (u32, u32) {
    let digits = square.number().to_string();
    let (lead, rest) = digits.split_at(1);
    let x = lead
        .chars()
        .next()
        .and_then(|c| kind.columns().find(c))
        .map_or(0, |index| index as u32 + 1);
    let y = rest.parse().unwrap_or(0);
    (x, y)
}

/// Ties go to the lowest square number.
fn closest(
    candidates: &BTreeMap<Square, Piece>,
    piece: Piece,
    target: Square,
    kind: BoardKind,
) -> Option<Square> {
    candidates
        .iter()
        .filter(|&(_, &candidate)| candidate == piece)
        .min_by_key(|&(&square, _)| square_distance(square, target, kind))
        .map(|(&square, _)| square)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rank, Side};

    fn sq(number: u32) -> Square {
        Square::new(number, BoardKind::Draughts).unwrap()
    }

    fn position(entries: &[(u32, Piece)]) -> Position {
        entries.iter().map(|&(n, piece)| (sq(n), piece)).collect()
    }

    /// Deterministic pseudo-random positions (64-bit LCG).
    fn sample_positions(seed: u64, count: usize, kind: BoardKind) -> Vec<Position> {
        let pieces = [
            Piece::LIGHT_MAN,
            Piece::LIGHT_KING,
            Piece::DARK_MAN,
            Piece::DARK_KING,
        ];
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as u32
        };

        (0..count)
            .map(|_| {
                let mut position = Position::new();
                for number in 1..=kind.squares() as u32 {
                    if next() % 3 == 0 {
                        let piece = pieces[(next() % 4) as usize];
                        position.insert(Square::new(number, kind).unwrap(), piece);
                    }
                }
                position
            })
            .collect()
    }

    #[test]
    fn identical_positions_need_no_operations() {
        let start = Position::start(BoardKind::Draughts);
        assert!(diff(&start, &start, BoardKind::Draughts).is_empty());
        assert!(diff(&Position::new(), &Position::new(), BoardKind::Draughts).is_empty());
    }

    #[test]
    fn single_relocation_is_a_move() {
        let old = position(&[(5, Piece::LIGHT_MAN)]);
        let new = position(&[(9, Piece::LIGHT_MAN)]);

        assert_eq!(
            diff(&old, &new, BoardKind::Draughts),
            vec![Operation::Move {
                from: sq(5),
                to: sq(9),
                piece: Piece::LIGHT_MAN
            }]
        );
    }

    #[test]
    fn untouched_pieces_are_ignored() {
        let old = position(&[(1, Piece::LIGHT_MAN), (31, Piece::DARK_MAN)]);
        let new = position(&[(5, Piece::LIGHT_MAN), (31, Piece::DARK_MAN)]);

        assert_eq!(
            diff(&old, &new, BoardKind::Draughts),
            vec![Operation::Move {
                from: sq(1),
                to: sq(5),
                piece: Piece::LIGHT_MAN
            }]
        );
    }

    #[test]
    fn capture_does_not_clear_the_landing_square() {
        let old = position(&[(1, Piece::LIGHT_MAN), (31, Piece::DARK_MAN)]);
        let new = position(&[(31, Piece::LIGHT_MAN)]);

        let operations = diff(&old, &new, BoardKind::Draughts);

        assert_eq!(
            operations,
            vec![Operation::Move {
                from: sq(1),
                to: sq(31),
                piece: Piece::LIGHT_MAN
            }]
        );
        assert_eq!(apply(&old, &operations), new);
    }

    #[test]
    fn rank_must_match_for_a_move() {
        let old = position(&[(5, Piece::LIGHT_MAN)]);
        let new = position(&[(9, Piece::LIGHT_KING)]);

        assert_eq!(
            diff(&old, &new, BoardKind::Draughts),
            vec![
                Operation::Add {
                    at: sq(9),
                    piece: Piece::LIGHT_KING
                },
                Operation::Remove {
                    at: sq(5),
                    piece: Piece::LIGHT_MAN
                },
            ]
        );
    }

    #[test]
    fn promotion_in_place_clears_then_adds() {
        let old = position(&[(3, Piece::LIGHT_MAN)]);
        let new = position(&[(3, Piece::LIGHT_KING)]);

        let operations = diff(&old, &new, BoardKind::Draughts);

        assert_eq!(
            operations,
            vec![
                Operation::Add {
                    at: sq(3),
                    piece: Piece::LIGHT_KING
                },
                Operation::Remove {
                    at: sq(3),
                    piece: Piece::LIGHT_MAN
                },
            ]
        );
        assert_eq!(apply(&old, &operations), new);
    }

    #[test]
    fn surplus_pieces_become_adds_or_removes() {
        let old = position(&[(10, Piece::DARK_MAN)]);
        let new = position(&[(10, Piece::DARK_MAN), (20, Piece::DARK_MAN), (21, Piece::DARK_MAN)]);

        let added = diff(&old, &new, BoardKind::Draughts);
        assert!(added.iter().all(|op| matches!(op, Operation::Add { .. })));
        assert_eq!(added.len(), 2);

        let removed = diff(&new, &old, BoardKind::Draughts);
        assert!(removed.iter().all(|op| matches!(op, Operation::Remove { .. })));
        assert_eq!(removed.len(), 2);
    }

    #[test]
    fn closest_candidate_wins() {
        // 12 -> (2, 2), 45 -> (5, 5), 44 -> (5, 4)
        let old = position(&[(12, Piece::DARK_MAN), (45, Piece::DARK_MAN)]);
        let new = position(&[(44, Piece::DARK_MAN)]);

        assert_eq!(
            diff(&old, &new, BoardKind::Draughts),
            vec![
                Operation::Move {
                    from: sq(45),
                    to: sq(44),
                    piece: Piece::DARK_MAN
                },
                Operation::Remove {
                    at: sq(12),
                    piece: Piece::DARK_MAN
                },
            ]
        );
    }

    #[test]
    fn equidistant_candidates_resolve_to_lowest_square() {
        // 12 -> (2, 2), 32 -> (4, 2), 22 -> (3, 2)
        let old = position(&[(12, Piece::LIGHT_MAN), (32, Piece::LIGHT_MAN)]);
        let new = position(&[(22, Piece::LIGHT_MAN)]);

        let operations = diff(&old, &new, BoardKind::Draughts);

        assert_eq!(
            operations[0],
            Operation::Move {
                from: sq(12),
                to: sq(22),
                piece: Piece::LIGHT_MAN
            }
        );
        assert_eq!(
            operations[1],
            Operation::Remove {
                at: sq(32),
                piece: Piece::LIGHT_MAN
            }
        );
    }

    #[test]
    fn distance_uses_leading_digit_and_remainder() {
        let kind = BoardKind::Draughts;
        // 1 -> (2, 0), 5 -> (6, 0)
        assert_eq!(square_distance(sq(1), sq(5), kind), 4);
        // 12 -> (2, 2), 47 -> (5, 7)
        assert_eq!(square_distance(sq(12), sq(47), kind), 5);
        assert_eq!(square_distance(sq(30), sq(30), kind), 0);
    }

    #[test]
    fn digits_outside_the_checkers_alphabet_map_to_zero() {
        let kind = BoardKind::Checkers;
        // 9 -> (0, 0), 1 -> (2, 0)
        assert_eq!(square_distance(sq(9), sq(1), kind), 2);
        // 8 -> (0, 0), 7 -> (8, 0)
        assert_eq!(square_distance(sq(8), sq(7), kind), 8);
    }

    #[test]
    fn applying_the_diff_reaches_the_new_position() {
        for kind in [BoardKind::Draughts, BoardKind::Checkers] {
            let samples = sample_positions(0x5eed_u64 + kind.squares() as u64, 24, kind);
            for old in &samples {
                for new in &samples {
                    let operations = diff(old, new, kind);
                    assert_eq!(&apply(old, &operations), new);
                }
            }
        }
    }

    #[test]
    fn no_square_is_targeted_or_vacated_twice() {
        let kind = BoardKind::Draughts;
        let samples = sample_positions(42, 16, kind);
        for old in &samples {
            for new in &samples {
                let operations = diff(old, new, kind);
                let mut targets = BTreeSet::new();
                let mut vacated = BTreeSet::new();
                for op in &operations {
                    match *op {
                        Operation::Move { from, to, .. } => {
                            assert!(targets.insert(to));
                            assert!(vacated.insert(from));
                        }
                        Operation::Add { at, .. } => assert!(targets.insert(at)),
                        Operation::Remove { at, .. } => assert!(vacated.insert(at)),
                    }
                }
            }
        }
    }

    #[test]
    fn diff_does_not_touch_inputs() {
        let old = Position::start(BoardKind::Checkers);
        let new = Position::new();
        let before = (old.clone(), new.clone());

        let operations = diff(&old, &new, BoardKind::Checkers);

        assert_eq!(operations.len(), 24);
        assert_eq!((old, new), before);
    }

    #[test]
    fn operations_serialize_as_tagged_records() {
        let mv = Operation::Move {
            from: sq(1),
            to: sq(5),
            piece: Piece::new(Side::Light, Rank::Man),
        };
        let clear = Operation::Remove {
            at: sq(31),
            piece: Piece::DARK_KING,
        };

        assert_eq!(
            serde_json::to_string(&mv).unwrap(),
            r#"{"type":"move","source":1,"destination":5,"piece":"w"}"#
        );
        assert_eq!(
            serde_json::to_string(&clear).unwrap(),
            r#"{"type":"clear","square":31,"piece":"B"}"#
        );
        assert_eq!(clear.piece(), Piece::DARK_KING);
    }
}
