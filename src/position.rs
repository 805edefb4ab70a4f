use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use crate::types::{BoardKind, Piece, Rank, Side, Square};

static DRAUGHTS_START: Lazy<Position> = Lazy::new(|| {
    let mut position = Position::new();
    position.fill(1..=20, Piece::DARK_MAN, BoardKind::Draughts);
    position.fill(31..=50, Piece::LIGHT_MAN, BoardKind::Draughts);
    position
});

static CHECKERS_START: Lazy<Position> = Lazy::new(|| {
    let mut position = Position::new();
    position.fill(1..=12, Piece::DARK_MAN, BoardKind::Checkers);
    position.fill(21..=32, Piece::LIGHT_MAN, BoardKind::Checkers);
    position
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("invalid square {0:?}")]
    InvalidSquare(String),
    #[error("invalid piece {code:?} on square {square:?}")]
    InvalidPiece { square: String, code: String },
    #[error("square {square} is off the {kind} board")]
    OffBoard { square: Square, kind: BoardKind },
    #[error("invalid move {0:?}")]
    InvalidMove(String),
}

/// Sparse board state: which piece stands on which square.
///
/// Empty squares are simply absent. Entries are kept in ascending square
/// order, which is also the order every consumer iterates in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pieces: BTreeMap<Square, Piece>,
}

impl Position {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial setup for `kind`.
    pub fn start(kind: BoardKind) -> Self {
        match kind {
            BoardKind::Draughts => DRAUGHTS_START.clone(),
            BoardKind::Checkers => CHECKERS_START.clone(),
        }
    }

    /// Builds a position from host-supplied `(square, piece code)` pairs,
    /// dropping every entry that is not valid on a `kind` board.
    pub fn sanitize<I, K, V>(entries: I, kind: BoardKind) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut position = Self::new();
        for (key, code) in entries {
            match parse_entry(key.as_ref(), code.as_ref(), kind) {
                Ok((square, piece)) => {
                    position.pieces.insert(square, piece);
                }
                Err(err) => log::debug!("dropping position entry: {err}"),
            }
        }
        position
    }

    /// Like [`Position::sanitize`] but fails on the first invalid entry.
    pub fn validate<I, K, V>(entries: I, kind: BoardKind) -> Result<Self, PositionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut position = Self::new();
        for (key, code) in entries {
            let (square, piece) = parse_entry(key.as_ref(), code.as_ref(), kind)?;
            position.pieces.insert(square, piece);
        }
        Ok(position)
    }

    pub fn get(&self, square: Square) -> Option<Piece> {
        self.pieces.get(&square).copied()
    }

    pub fn insert(&mut self, square: Square, piece: Piece) -> Option<Piece> {
        self.pieces.insert(square, piece)
    }

    pub fn remove(&mut self, square: Square) -> Option<Piece> {
        self.pieces.remove(&square)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Pieces in ascending square order.
    pub fn iter(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.pieces.iter().map(|(&square, &piece)| (square, piece))
    }

    /// Number of pieces of `side`, split into `(men, kings)`.
    pub fn count(&self, side: Side) -> (usize, usize) {
        self.pieces
            .values()
            .filter(|piece| piece.side == side)
            .fold((0, 0), |(men, kings), piece| match piece.rank {
                Rank::Man => (men + 1, kings),
                Rank::King => (men, kings + 1),
            })
    }

    /// Fails with the first square that does not exist on a `kind` board.
    pub fn check(&self, kind: BoardKind) -> Result<(), PositionError> {
        match self.pieces.keys().find(|square| !square.is_on(kind)) {
            Some(&square) => Err(PositionError::OffBoard { square, kind }),
            None => Ok(()),
        }
    }

    /// Drops every square that does not exist on a `kind` board.
    pub fn on_board(mut self, kind: BoardKind) -> Self {
        self.pieces.retain(|square, _| square.is_on(kind));
        self
    }

    /// Returns a copy with every relocation applied in ascending source
    /// order. A relocation from an empty square is skipped.
    pub fn relocated(&self, moves: &[Relocation]) -> Self {
        // A later move from the same source replaces an earlier one.
        let by_source: BTreeMap<Square, Square> =
            moves.iter().map(|mv| (mv.from, mv.to)).collect();

        let mut next = self.clone();
        for (from, to) in by_source {
            if let Some(piece) = next.pieces.remove(&from) {
                next.pieces.insert(to, piece);
            }
        }
        next
    }

    fn fill(&mut self, squares: std::ops::RangeInclusive<u32>, piece: Piece, kind: BoardKind) {
        for number in squares {
            if let Some(square) = Square::new(number, kind) {
                self.pieces.insert(square, piece);
            }
        }
    }
}

impl FromIterator<(Square, Piece)> for Position {
    fn from_iter<T: IntoIterator<Item = (Square, Piece)>>(iter: T) -> Self {
        Self {
            pieces: iter.into_iter().collect(),
        }
    }
}

/// Serialized as an object keyed by square number, e.g. `{"1": "w"}`.
impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pieces.len()))?;
        for (square, piece) in &self.pieces {
            map.serialize_entry(&square.to_string(), piece)?;
        }
        map.end()
    }
}

/// A piece relocation written as `<from>-<to>` or `<from>x<to>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub from: Square,
    pub to: Square,
}

impl Relocation {
    pub fn parse(text: &str, kind: BoardKind) -> Result<Self, PositionError> {
        let invalid = || PositionError::InvalidMove(text.to_string());
        let mut parts = text.split(['-', 'x']);
        let (Some(from), Some(to), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let from = parse_move_square(from, kind).ok_or_else(invalid)?;
        let to = parse_move_square(to, kind).ok_or_else(invalid)?;
        Ok(Self { from, to })
    }
}

fn parse_move_square(text: &str, kind: BoardKind) -> Option<Square> {
    let digits = text.strip_prefix('K').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Square::new(digits.parse().ok()?, kind)
}

fn parse_entry(key: &str, code: &str, kind: BoardKind) -> Result<(Square, Piece), PositionError> {
    let square = key
        .parse::<u32>()
        .ok()
        .filter(|_| key.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|number| Square::new(number, kind))
        .ok_or_else(|| PositionError::InvalidSquare(key.to_string()))?;
    let piece = code
        .parse::<Piece>()
        .map_err(|_| PositionError::InvalidPiece {
            square: key.to_string(),
            code: code.to_string(),
        })?;
    Ok((square, piece))
}
