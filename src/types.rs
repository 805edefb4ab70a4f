use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest square number on any supported board.
pub const MAX_SQUARES: u8 = 50;

/// Which player a piece belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Light,
    Dark,
}

impl Side {
    /// Section marker used by the notation (`W` for light, `B` for dark).
    pub fn marker(self) -> char {
        match self {
            Side::Light => 'W',
            Side::Dark => 'B',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'W' => Some(Side::Light),
            'B' => Some(Side::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Man,
    King,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid piece code {0:?} (expected one of w, W, b, B)")]
pub struct ParsePieceError(pub String);

/// A piece on the board.
///
/// On the wire a piece is a single-letter code: lower case for a man,
/// upper case for a king, `w` for the light side and `b` for the dark side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct Piece {
    pub side: Side,
    pub rank: Rank,
}

impl Piece {
    pub const LIGHT_MAN: Piece = Piece::new(Side::Light, Rank::Man);
    pub const LIGHT_KING: Piece = Piece::new(Side::Light, Rank::King);
    pub const DARK_MAN: Piece = Piece::new(Side::Dark, Rank::Man);
    pub const DARK_KING: Piece = Piece::new(Side::Dark, Rank::King);

    pub const fn new(side: Side, rank: Rank) -> Self {
        Self { side, rank }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'w' => Some(Self::LIGHT_MAN),
            'W' => Some(Self::LIGHT_KING),
            'b' => Some(Self::DARK_MAN),
            'B' => Some(Self::DARK_KING),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match (self.side, self.rank) {
            (Side::Light, Rank::Man) => 'w',
            (Side::Light, Rank::King) => 'W',
            (Side::Dark, Rank::Man) => 'b',
            (Side::Dark, Rank::King) => 'B',
        }
    }

    pub fn is_king(self) -> bool {
        self.rank == Rank::King
    }
}

impl FromStr for Piece {
    type Err = ParsePieceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => {
                Piece::from_code(code).ok_or_else(|| ParsePieceError(s.to_string()))
            }
            _ => Err(ParsePieceError(s.to_string())),
        }
    }
}

impl From<Piece> for String {
    fn from(piece: Piece) -> Self {
        piece.code().to_string()
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A playable (dark) square, numbered from 1 independently of orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Square(u8);

impl Square {
    /// Returns the square numbered `number` if it exists on a `kind` board.
    pub fn new(number: u32, kind: BoardKind) -> Option<Self> {
        if (1..=kind.squares() as u32).contains(&number) {
            Some(Self(number as u8))
        } else {
            None
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn is_on(self, kind: BoardKind) -> bool {
        self.0 <= kind.squares()
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported boards. The choice is fixed for the lifetime of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardKind {
    /// International draughts, 10x10.
    #[default]
    Draughts,
    /// English checkers, 8x8.
    Checkers,
}

impl BoardKind {
    pub fn size(self) -> u8 {
        match self {
            BoardKind::Draughts => 10,
            BoardKind::Checkers => 8,
        }
    }

    /// Number of playable squares (`size² / 2`).
    pub fn squares(self) -> u8 {
        self.size() * self.size() / 2
    }

    /// Column alphabet used by the square distance heuristic.
    pub fn columns(self) -> &'static str {
        match self {
            BoardKind::Draughts => "0123456789",
            BoardKind::Checkers => "01234567",
        }
    }

    /// Notation of the initial setup.
    pub fn start_notation(self) -> &'static str {
        match self {
            BoardKind::Draughts => "W:W31-50:B1-20",
            BoardKind::Checkers => "W:W21-32:B1-12",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BoardKind::Draughts => "draughts",
            BoardKind::Checkers => "checkers",
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} {value:?}")]
pub struct ParseNameError {
    pub what: &'static str,
    pub value: String,
}

impl FromStr for BoardKind {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draughts" => Ok(BoardKind::Draughts),
            "checkers" => Ok(BoardKind::Checkers),
            _ => Err(ParseNameError {
                what: "board",
                value: s.to_string(),
            }),
        }
    }
}

/// Which side of the board faces the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    White,
    Black,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::White => Orientation::Black,
            Orientation::Black => Orientation::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::White => "white",
            Orientation::Black => "black",
        }
    }
}

impl FromStr for Orientation {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => Ok(Orientation::White),
            "black" => Ok(Orientation::Black),
            _ => Err(ParseNameError {
                what: "orientation",
                value: s.to_string(),
            }),
        }
    }
}
