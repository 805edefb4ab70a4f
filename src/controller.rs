use std::time::Duration;

use web_time::Instant;

use crate::config::BoardConfig;
use crate::diff::{self, Operation};
use crate::error::{BoardError, HostError};
use crate::notation::{self, DecodeError};
use crate::position::{Position, Relocation};
use crate::scheduler::{EffectTicket, Scheduler};
use crate::types::{BoardKind, Orientation};

/// The host's drawing surface.
pub trait Surface {
    /// Redraws every piece of `position` at once.
    fn render(&mut self, position: &Position, orientation: Orientation);

    /// Starts the visual effect for one operation. The host reports its end
    /// through [`BoardController::complete_effect`] with the same ticket.
    /// An error counts as an effect that already finished.
    fn run_effect(
        &mut self,
        ticket: EffectTicket,
        operation: &Operation,
        duration: Duration,
    ) -> Result<(), HostError>;
}

/// Receives the board's notifications. Every position handed over is a
/// snapshot owned by the observer.
pub trait Observer {
    fn position_changed(&mut self, _old: Position, _new: Position) -> Result<(), HostError> {
        Ok(())
    }

    fn batch_complete(&mut self, _old: Position, _new: Position) -> Result<(), HostError> {
        Ok(())
    }

    fn error(&mut self, _error: &BoardError) {}
}

impl Observer for () {}

/// Owns the logical position and keeps the surface in step with it.
pub struct BoardController<S, O = ()> {
    config: BoardConfig,
    position: Position,
    orientation: Orientation,
    scheduler: Scheduler,
    surface: S,
    observer: O,
}

impl<S: Surface, O: Observer> BoardController<S, O> {
    pub fn new(config: BoardConfig, surface: S, observer: O) -> Self {
        let mut controller = Self {
            orientation: config.orientation,
            position: Position::new(),
            scheduler: Scheduler::new(),
            config,
            surface,
            observer,
        };

        if let Some(text) = controller.config.position.clone() {
            match notation::decode(&text, controller.kind()) {
                Ok(position) => controller.position = position,
                Err(err) => controller.report(BoardError::InvalidConfigPosition {
                    value: text,
                    reason: err.to_string(),
                }),
            }
        }

        controller.redraw();
        controller
    }

    pub fn kind(&self) -> BoardKind {
        self.config.board
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Snapshot of the logical position. During a batch this is already the
    /// destination.
    pub fn position(&self) -> Position {
        self.position.clone()
    }

    pub fn fen(&self) -> String {
        notation::format(&self.position)
    }

    /// Replaces the position. Squares that do not exist on this board are
    /// dropped.
    ///
    /// Without animation the position is committed and drawn right away,
    /// even while a batch runs. With animation the change becomes a batch of
    /// effects, or waits behind the running batch.
    pub fn set_position(&mut self, position: Position, animate: bool, now: Instant) {
        let position = position.on_board(self.kind());

        if !animate {
            self.commit(position);
            self.redraw();
            return;
        }

        if self.scheduler.is_busy() {
            log::debug!(
                "queueing position update behind running batch ({} waiting)",
                self.scheduler.queued() + 1
            );
            self.scheduler.enqueue(position);
            return;
        }

        self.launch(position, now);
    }

    /// Decodes `text` and sets the resulting position.
    pub fn set_notation(
        &mut self,
        text: &str,
        animate: bool,
        now: Instant,
    ) -> Result<(), DecodeError> {
        let position = notation::decode(text, self.kind())?;
        self.set_position(position, animate, now);
        Ok(())
    }

    pub fn start(&mut self, animate: bool, now: Instant) {
        self.set_position(Position::start(self.kind()), animate, now);
    }

    pub fn clear(&mut self, animate: bool, now: Instant) {
        self.set_position(Position::new(), animate, now);
    }

    /// Relocates pieces given as `"<from>-<to>"` or `"<from>x<to>"` and
    /// returns the resulting position. Malformed moves are reported and
    /// skipped.
    pub fn move_pieces<I, T>(&mut self, moves: I, animate: bool, now: Instant) -> Position
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut relocations = Vec::new();
        for text in moves {
            let text = text.as_ref();
            match Relocation::parse(text, self.kind()) {
                Ok(relocation) => relocations.push(relocation),
                Err(_) => self.report(BoardError::InvalidMove(text.to_string())),
            }
        }

        let next = self.position.relocated(&relocations);
        self.set_position(next.clone(), animate, now);
        next
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
        self.redraw();
    }

    pub fn flip(&mut self) -> Orientation {
        self.set_orientation(self.orientation.flipped());
        self.orientation
    }

    pub fn is_animating(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Number of animated updates waiting for the running batch.
    pub fn queued(&self) -> usize {
        self.scheduler.queued()
    }

    /// True when a completed batch left queued updates for the next
    /// [`poll`](Self::poll).
    pub fn needs_poll(&self) -> bool {
        self.scheduler.has_resumable()
    }

    /// When [`poll`](Self::poll) must run at the latest for the watchdog.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Reports that the effect behind `ticket` finished.
    ///
    /// Queued updates are not started from here; they wait for the next
    /// [`poll`](Self::poll).
    pub fn complete_effect(&mut self, ticket: EffectTicket) {
        if self.scheduler.finish(ticket) {
            self.finish_batch();
        }
    }

    /// Fires the watchdog if the running batch is overdue, then starts
    /// queued updates in order until one of them begins a new batch.
    pub fn poll(&mut self, now: Instant) {
        if self.scheduler.expire(now) {
            log::debug!("watchdog completed a batch with effects still outstanding");
            self.finish_batch();
        }

        while !self.scheduler.is_running() {
            let Some(position) = self.scheduler.take_resumable() else {
                break;
            };
            self.launch(position, now);
        }
    }

    /// Sends `error` through the reporting side channel.
    pub fn report(&mut self, error: BoardError) {
        log::warn!("draughtsboard error {}: {error}", error.code());
        self.observer.error(&error);
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Tears the board down. The running batch and every queued update are
    /// dropped without notifications; the surface is handed back.
    pub fn destroy(mut self) -> S {
        let dropped = self.scheduler.cancel();
        log::debug!("board destroyed, {dropped} queued update(s) dropped");
        self.surface
    }

    fn launch(&mut self, position: Position, now: Instant) {
        let operations = diff::diff(&self.position, &position, self.kind());
        if operations.is_empty() {
            self.commit(position);
            return;
        }

        let effects = self.scheduler.begin(
            self.position.clone(),
            position.clone(),
            &operations,
            now,
            self.config.watchdog_window(),
        );
        log::debug!("starting batch of {} effect(s)", effects.len());
        self.commit(position);

        for (ticket, operation) in effects {
            let duration = self.config.effect_duration(&operation);
            if let Err(source) = self.surface.run_effect(ticket, &operation, duration) {
                self.report(BoardError::Effect { operation, source });
                self.scheduler.finish(ticket);
            }
        }

        self.finish_batch();
    }

    /// Wraps up the running batch if its barrier has been reached.
    fn finish_batch(&mut self) {
        let Some(batch) = self.scheduler.take_completed() else {
            return;
        };
        self.redraw();
        log::debug!(
            "batch {} complete{}",
            batch.id,
            if batch.forced { " (forced)" } else { "" }
        );

        if let Err(source) = self.observer.batch_complete(batch.before, batch.after) {
            self.report(BoardError::Observer {
                hook: "onMoveEnd",
                source,
            });
        }
    }

    fn commit(&mut self, position: Position) {
        let changed = notation::format(&self.position) != notation::format(&position);
        let old = std::mem::replace(&mut self.position, position);
        if !changed {
            return;
        }

        let new = self.position.clone();
        if let Err(source) = self.observer.position_changed(old, new) {
            self.report(BoardError::Observer {
                hook: "onChange",
                source,
            });
        }
    }

    fn redraw(&mut self) {
        self.surface.render(&self.position, self.orientation);
    }
}
