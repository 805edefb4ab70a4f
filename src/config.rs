use std::time::Duration;

use serde::Deserialize;

use crate::diff::Operation;
use crate::types::{BoardKind, Orientation};

/// Extra time a batch gets on top of its slowest effect before the
/// watchdog forces it to complete.
pub const WATCHDOG_MARGIN: Duration = Duration::from_millis(1000);

const FAST_MS: u64 = 200;
const SLOW_MS: u64 = 600;

/// Effect duration: `"fast"`, `"slow"` or a number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "SpeedRepr")]
pub enum AnimationSpeed {
    Fast,
    Slow,
    Millis(u64),
}

impl AnimationSpeed {
    pub fn duration(self) -> Duration {
        match self {
            AnimationSpeed::Fast => Duration::from_millis(FAST_MS),
            AnimationSpeed::Slow => Duration::from_millis(SLOW_MS),
            AnimationSpeed::Millis(ms) => Duration::from_millis(ms),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpeedRepr {
    Named(String),
    Millis(f64),
}

impl TryFrom<SpeedRepr> for AnimationSpeed {
    type Error = String;

    fn try_from(value: SpeedRepr) -> Result<Self, Self::Error> {
        match value {
            SpeedRepr::Named(name) => match name.as_str() {
                "fast" => Ok(AnimationSpeed::Fast),
                "slow" => Ok(AnimationSpeed::Slow),
                _ => Err(format!("unknown animation speed {name:?}")),
            },
            SpeedRepr::Millis(ms) if ms.is_finite() && ms >= 0.0 && ms.fract() == 0.0 => {
                Ok(AnimationSpeed::Millis(ms as u64))
            }
            SpeedRepr::Millis(ms) => Err(format!("invalid animation speed {ms}")),
        }
    }
}

/// Board settings, deserializable from a host object such as
/// `{ board: "checkers", moveSpeed: "fast" }`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardConfig {
    pub board: BoardKind,
    pub orientation: Orientation,
    /// Notation string or `"start"`; the board starts empty when absent.
    pub position: Option<String>,
    pub appear_speed: AnimationSpeed,
    pub move_speed: AnimationSpeed,
    pub trash_speed: AnimationSpeed,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            board: BoardKind::default(),
            orientation: Orientation::default(),
            position: None,
            appear_speed: AnimationSpeed::Millis(200),
            move_speed: AnimationSpeed::Millis(200),
            trash_speed: AnimationSpeed::Millis(100),
        }
    }
}

impl BoardConfig {
    pub fn effect_duration(&self, operation: &Operation) -> Duration {
        match operation {
            Operation::Move { .. } => self.move_speed.duration(),
            Operation::Add { .. } => self.appear_speed.duration(),
            Operation::Remove { .. } => self.trash_speed.duration(),
        }
    }

    /// How long a batch may run before the watchdog completes it.
    pub fn watchdog_window(&self) -> Duration {
        let slowest = [self.appear_speed, self.move_speed, self.trash_speed]
            .into_iter()
            .map(AnimationSpeed::duration)
            .max()
            .unwrap_or_default();
        slowest + WATCHDOG_MARGIN
    }
}
