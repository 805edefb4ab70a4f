//! Compact position notation.
//!
//! ```text
//! W:W31-50:B1-20
//! │ │      └ dark pieces: squares 1 through 20
//! │ └ light pieces: squares 31 through 50
//! └ side to move (ignored by the position model)
//! ```
//!
//! Square lists are comma separated. `K12` is a king on 12; `31-50` is an
//! inclusive range of men.

use thiserror::Error;

use crate::position::{Position, PositionError};
use crate::types::{BoardKind, Piece, Rank, Side, Square};

/// Keyword accepted in place of a notation string for the initial setup.
pub const START_KEYWORD: &str = "start";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("notation is empty")]
    Empty,
    #[error("expected 2 or 3 sections separated by ':', found {0}")]
    SectionCount(usize),
    #[error("invalid side marker in section {0:?}")]
    InvalidSide(String),
    #[error("invalid square token {0:?}")]
    InvalidToken(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Position(#[from] PositionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Single { number: u32, rank: Rank },
    Range { first: u32, last: u32 },
}

/// Parses `text` into a position on a `kind` board.
///
/// Anything from the first `.` on and trailing whitespace are ignored.
/// Squares that do not exist on the board are dropped rather than rejected.
pub fn decode(text: &str, kind: BoardKind) -> Result<Position, DecodeError> {
    let text = text.split('.').next().unwrap_or_default().trim_end();

    if text.eq_ignore_ascii_case(START_KEYWORD) || text == kind.start_notation() {
        return Ok(Position::start(kind));
    }
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }

    let sections: Vec<&str> = text.split(':').collect();
    if !(2..=3).contains(&sections.len()) {
        return Err(DecodeError::SectionCount(sections.len()));
    }

    let turn = sections[0];
    if turn.len() != 1 || turn.chars().next().and_then(Side::from_marker).is_none() {
        return Err(DecodeError::InvalidSide(turn.to_string()));
    }

    let mut position = Position::new();
    for section in &sections[1..] {
        let mut chars = section.chars();
        let side = chars
            .next()
            .and_then(Side::from_marker)
            .ok_or_else(|| DecodeError::InvalidSide(section.to_string()))?;
        let list = chars.as_str();
        if list.is_empty() {
            continue;
        }

        for token in list.split(',') {
            match parse_token(token)? {
                Token::Single { number, rank } => {
                    place(&mut position, number, Piece::new(side, rank), kind);
                }
                Token::Range { first, last } => {
                    let last = last.min(kind.squares() as u32);
                    for number in first..=last {
                        place(&mut position, number, Piece::new(side, Rank::Man), kind);
                    }
                }
            }
        }
    }

    Ok(position)
}

/// Writes `position` as notation, light side first.
///
/// Fails when `position` holds a square that does not exist on a `kind`
/// board.
pub fn encode(position: &Position, kind: BoardKind) -> Result<String, EncodeError> {
    position.check(kind)?;
    Ok(format(position))
}

/// Validates host-supplied `(square, piece code)` pairs as a whole and
/// encodes them.
pub fn encode_raw<I, K, V>(entries: I, kind: BoardKind) -> Result<String, EncodeError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let position = Position::validate(entries, kind)?;
    Ok(format(&position))
}

pub(crate) fn format(position: &Position) -> String {
    let light = side_list(position, Side::Light);
    let dark = side_list(position, Side::Dark);
    format!(
        "{}:{}{}:{}{}",
        Side::Light.marker(),
        Side::Light.marker(),
        light,
        Side::Dark.marker(),
        dark
    )
}

fn side_list(position: &Position, side: Side) -> String {
    position
        .iter()
        .filter(|(_, piece)| piece.side == side)
        .map(|(square, piece)| {
            if piece.is_king() {
                format!("K{square}")
            } else {
                square.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn place(position: &mut Position, number: u32, piece: Piece, kind: BoardKind) {
    match Square::new(number, kind) {
        Some(square) => {
            position.insert(square, piece);
        }
        None => log::debug!("dropping square {number} outside the {kind} board"),
    }
}

fn parse_token(token: &str) -> Result<Token, DecodeError> {
    let invalid = || DecodeError::InvalidToken(token.to_string());
    let (rank, body) = match token.strip_prefix('K') {
        Some(rest) => (Rank::King, rest),
        None => (Rank::Man, token),
    };

    match body.split_once('-') {
        // Ranges are always men, even behind a `K`.
        Some((first, last)) => Ok(Token::Range {
            first: parse_number(first).ok_or_else(invalid)?,
            last: parse_number(last).ok_or_else(invalid)?,
        }),
        None => Ok(Token::Single {
            number: parse_number(body).ok_or_else(invalid)?,
            rank,
        }),
    }
}

/// Decimal digits only. Values too large for `u32` saturate; they are off
/// every board anyway.
fn parse_number(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits.bytes().fold(0u32, |acc, b| {
        acc.saturating_mul(10).saturating_add((b - b'0') as u32)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(number: u32) -> Square {
        Square::new(number, BoardKind::Draughts).unwrap()
    }

    fn position(entries: &[(u32, Piece)]) -> Position {
        entries.iter().map(|&(n, piece)| (sq(n), piece)).collect()
    }

    #[test]
    fn decode_expands_ranges_and_kings() {
        let decoded = decode("W:WK1,2-5:BK31,32-35", BoardKind::Draughts).unwrap();

        assert_eq!(decoded.len(), 10);
        assert_eq!(decoded.get(sq(1)), Some(Piece::LIGHT_KING));
        assert_eq!(decoded.get(sq(2)), Some(Piece::LIGHT_MAN));
        assert_eq!(decoded.get(sq(5)), Some(Piece::LIGHT_MAN));
        assert_eq!(decoded.get(sq(31)), Some(Piece::DARK_KING));
        assert_eq!(decoded.get(sq(35)), Some(Piece::DARK_MAN));
    }

    #[test]
    fn side_marker_not_token_order_decides_color() {
        let decoded = decode("B:B1,2:W49,50", BoardKind::Draughts).unwrap();

        assert_eq!(decoded.get(sq(1)), Some(Piece::DARK_MAN));
        assert_eq!(decoded.get(sq(50)), Some(Piece::LIGHT_MAN));
    }

    #[test]
    fn start_keyword_and_literal_decode_to_initial_setup() {
        for kind in [BoardKind::Draughts, BoardKind::Checkers] {
            let start = Position::start(kind);
            assert_eq!(decode("start", kind).unwrap(), start);
            assert_eq!(decode("START", kind).unwrap(), start);
            assert_eq!(decode(kind.start_notation(), kind).unwrap(), start);
        }
    }

    #[test]
    fn decode_ignores_suffix_and_trailing_whitespace() {
        let decoded = decode("W:W31:B1.extra stuff", BoardKind::Draughts).unwrap();
        assert_eq!(decoded, position(&[(31, Piece::LIGHT_MAN), (1, Piece::DARK_MAN)]));

        let decoded = decode("W:W31:B1  \n", BoardKind::Draughts).unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn decode_accepts_a_single_side_and_empty_lists() {
        let decoded = decode("W:W31-33", BoardKind::Draughts).unwrap();
        assert_eq!(decoded.len(), 3);

        assert!(decode("W:W:B", BoardKind::Draughts).unwrap().is_empty());
        assert_eq!(decode("W:W1:B", BoardKind::Draughts).unwrap().len(), 1);
    }

    #[test]
    fn decode_rejects_malformed_notation() {
        let cases = [
            ("", DecodeError::Empty),
            ("incomplete", DecodeError::SectionCount(1)),
            ("W:", DecodeError::InvalidSide(String::new())),
            ("W::", DecodeError::InvalidSide(String::new())),
            ("X:W31-50:B1-20", DecodeError::InvalidSide("X".to_string())),
            ("W:X31-50:B1-20", DecodeError::InvalidSide("X31-50".to_string())),
            ("W:W31--50:B1-20", DecodeError::InvalidToken("31--50".to_string())),
            ("W:W31-50:B1-20:extra", DecodeError::SectionCount(4)),
            ("W:W-5-5:B1-20", DecodeError::InvalidToken("-5-5".to_string())),
            ("W:Wa-z:B1-20", DecodeError::InvalidToken("a-z".to_string())),
            ("W:W1,,2:B3", DecodeError::InvalidToken(String::new())),
            ("W W31-50 B1-20", DecodeError::SectionCount(1)),
        ];

        for (text, expected) in cases {
            assert_eq!(decode(text, BoardKind::Draughts), Err(expected), "{text:?}");
        }
    }

    #[test]
    fn decode_drops_squares_off_the_board() {
        let decoded = decode("W:W31-70:B1-20", BoardKind::Draughts).unwrap();
        assert_eq!(decoded.count(Side::Light), (20, 0));

        let decoded = decode("W:W60-70,K99:B1", BoardKind::Draughts).unwrap();
        assert_eq!(decoded.len(), 1);

        let decoded = decode("W:W31-99999999999:B1", BoardKind::Draughts).unwrap();
        assert_eq!(decoded.count(Side::Light), (20, 0));

        let decoded = decode("W:W30-40:B1-12", BoardKind::Checkers).unwrap();
        assert_eq!(decoded.count(Side::Light), (3, 0));
    }

    #[test]
    fn backwards_range_is_empty() {
        let decoded = decode("W:W50-31:B1-20", BoardKind::Draughts).unwrap();

        assert_eq!(decoded.count(Side::Light), (0, 0));
        assert_eq!(decoded.count(Side::Dark), (20, 0));
    }

    #[test]
    fn encode_sorts_numerically_with_kings_inline() {
        let pos = position(&[
            (40, Piece::LIGHT_MAN),
            (5, Piece::LIGHT_KING),
            (12, Piece::LIGHT_MAN),
            (31, Piece::DARK_MAN),
            (3, Piece::DARK_KING),
        ]);

        assert_eq!(encode(&pos, BoardKind::Draughts).unwrap(), "W:WK5,12,40:BK3,31");
    }

    #[test]
    fn encode_empty_board_keeps_both_markers() {
        assert_eq!(encode(&Position::new(), BoardKind::Draughts).unwrap(), "W:W:B");
    }

    #[test]
    fn encode_two_sided_scenario() {
        let pos = position(&[(1, Piece::LIGHT_MAN), (31, Piece::DARK_MAN)]);

        assert_eq!(encode(&pos, BoardKind::Draughts).unwrap(), "W:W1:B31");
    }

    #[test]
    fn encode_rejects_squares_off_the_board() {
        let pos = position(&[(40, Piece::LIGHT_MAN)]);

        let err = encode(&pos, BoardKind::Checkers).unwrap_err();
        assert!(err.to_string().contains("off the checkers board"));
    }

    #[test]
    fn encode_raw_validates_the_whole_structure() {
        assert_eq!(
            encode_raw([("1", "w"), ("31", "b")], BoardKind::Draughts).unwrap(),
            "W:W1:B31"
        );
        assert!(encode_raw([("1", "w"), ("31", "z")], BoardKind::Draughts).is_err());
        assert!(encode_raw([("1", "w"), ("51", "b")], BoardKind::Draughts).is_err());
    }

    #[test]
    fn decode_of_encode_preserves_position() {
        let samples = [
            Position::start(BoardKind::Draughts),
            Position::new(),
            position(&[
                (1, Piece::LIGHT_KING),
                (2, Piece::LIGHT_MAN),
                (27, Piece::DARK_KING),
                (50, Piece::DARK_MAN),
            ]),
        ];

        for pos in samples {
            let text = encode(&pos, BoardKind::Draughts).unwrap();
            assert_eq!(decode(&text, BoardKind::Draughts).unwrap(), pos, "{text}");
        }

        let checkers = Position::start(BoardKind::Checkers);
        let text = encode(&checkers, BoardKind::Checkers).unwrap();
        assert_eq!(decode(&text, BoardKind::Checkers).unwrap(), checkers);
    }
}
