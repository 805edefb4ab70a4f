use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use web_time::Instant;

use crate::diff::Operation;
use crate::position::Position;

/// Identifies one effect of one batch. Hosts hand it back to report that the
/// effect finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EffectTicket {
    pub batch: u32,
    pub index: u32,
}

/// A batch whose effects have all finished, or that the watchdog gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedBatch {
    pub id: u32,
    pub before: Position,
    pub after: Position,
    pub forced: bool,
}

#[derive(Debug)]
struct Batch {
    id: u32,
    before: Position,
    after: Position,
    finished: Vec<bool>,
    remaining: usize,
    deadline: Instant,
    forced: bool,
}

/// Serializes animated transitions: at most one batch runs at a time and
/// animated updates that arrive meanwhile wait in FIFO order.
///
/// The scheduler only keeps the books. Launching effects, committing
/// positions and notifying observers is up to the owner, which drives it
/// with [`begin`](Self::begin), [`finish`](Self::finish),
/// [`expire`](Self::expire) and [`take_completed`](Self::take_completed).
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u32,
    running: Option<Batch>,
    queue: VecDeque<Position>,
    resumable: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// True while a batch runs or queued updates are still waiting to be
    /// resumed; new animated updates must queue behind them.
    pub fn is_busy(&self) -> bool {
        self.running.is_some() || self.resumable
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// True when a queued update is ready for [`take_resumable`](Self::take_resumable).
    pub fn has_resumable(&self) -> bool {
        self.resumable && self.running.is_none()
    }

    /// Watchdog deadline of the running batch.
    pub fn deadline(&self) -> Option<Instant> {
        self.running.as_ref().map(|batch| batch.deadline)
    }

    /// Starts a batch and returns one ticket per operation, in order.
    ///
    /// Must only be called while no batch is running.
    pub fn begin(
        &mut self,
        before: Position,
        after: Position,
        operations: &[Operation],
        now: Instant,
        window: Duration,
    ) -> Vec<(EffectTicket, Operation)> {
        debug_assert!(self.running.is_none(), "a batch is already running");

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.running = Some(Batch {
            id,
            before,
            after,
            finished: vec![false; operations.len()],
            remaining: operations.len(),
            deadline: now + window,
            forced: false,
        });

        operations
            .iter()
            .enumerate()
            .map(|(index, &operation)| {
                let ticket = EffectTicket {
                    batch: id,
                    index: index as u32,
                };
                (ticket, operation)
            })
            .collect()
    }

    /// Records one finished effect. Returns `true` once every effect of the
    /// running batch has finished. Stale and repeated tickets are ignored.
    pub fn finish(&mut self, ticket: EffectTicket) -> bool {
        let Some(batch) = self.running.as_mut() else {
            return false;
        };
        if batch.id != ticket.batch {
            return false;
        }
        let Some(done) = batch.finished.get_mut(ticket.index as usize) else {
            return false;
        };
        if !*done {
            *done = true;
            batch.remaining -= 1;
        }
        batch.remaining == 0
    }

    /// Treats every outstanding effect as finished if the running batch is
    /// past its deadline. Returns `true` when that happened.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.running.as_mut() {
            Some(batch) if batch.remaining > 0 && now >= batch.deadline => {
                batch.finished.fill(true);
                batch.remaining = 0;
                batch.forced = true;
                true
            }
            _ => false,
        }
    }

    /// Ends the running batch if all its effects finished. The oldest queued
    /// update becomes resumable.
    pub fn take_completed(&mut self) -> Option<CompletedBatch> {
        if self.running.as_ref()?.remaining > 0 {
            return None;
        }
        let batch = self.running.take()?;
        self.resumable = !self.queue.is_empty();
        Some(CompletedBatch {
            id: batch.id,
            before: batch.before,
            after: batch.after,
            forced: batch.forced,
        })
    }

    pub fn enqueue(&mut self, position: Position) {
        self.queue.push_back(position);
    }

    /// Hands out the oldest queued update once the previous batch completed.
    pub fn take_resumable(&mut self) -> Option<Position> {
        if !self.has_resumable() {
            return None;
        }
        let update = self.queue.pop_front();
        self.resumable = !self.queue.is_empty();
        update
    }

    /// Drops the running batch and every queued update. Returns how many
    /// queued updates were discarded.
    pub fn cancel(&mut self) -> usize {
        self.running = None;
        self.resumable = false;
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}
