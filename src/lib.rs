use wasm_bindgen::prelude::*;

pub mod config;
pub mod controller;
pub mod diff;
pub mod error;
pub mod notation;
pub mod position;
pub mod scheduler;
pub mod types;
pub mod wasm;

pub use config::{AnimationSpeed, BoardConfig};
pub use controller::{BoardController, Observer, Surface};
pub use diff::Operation;
pub use error::{BoardError, HostError};
pub use position::Position;
pub use types::{BoardKind, Orientation, Piece, Square};

#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
