//! JavaScript bindings.
//!
//! The host draws the board and runs effects; this side keeps the position,
//! the batches and the queue. Host callbacks are collected while the board
//! updates and called once the update is over, so a callback may call back
//! into the board. Queued updates and the watchdog run on a timer the board
//! arms itself.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use gloo_timers::callback::Timeout;
use js_sys::{Array, Function, Object};
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_time::Instant;

use crate::config::BoardConfig;
use crate::controller::{BoardController, Observer, Surface};
use crate::diff::Operation;
use crate::error::{BoardError, HostError};
use crate::notation;
use crate::position::Position;
use crate::scheduler::EffectTicket;
use crate::types::{BoardKind, Orientation};

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::new().serialize_maps_as_objects(true))
        .map_err(JsValue::from)
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn describe(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn host_error(value: JsValue) -> HostError {
    HostError::new(describe(&value))
}

/// `[square, code]` pairs of a plain object. Empty squares (`null` or
/// `undefined`) are skipped; any other non-string value is kept in printed
/// form so it fails as a piece code.
fn raw_entries(object: &Object) -> Vec<(String, String)> {
    Object::entries(object)
        .iter()
        .filter_map(|entry| {
            let pair: Array = entry.unchecked_into();
            let code = pair.get(1);
            if code.is_null() || code.is_undefined() {
                return None;
            }
            let key = pair.get(0).as_string().unwrap_or_default();
            let code = code.as_string().unwrap_or_else(|| describe(&code));
            Some((key, code))
        })
        .collect()
}

fn parse_kind(board: Option<String>) -> Result<BoardKind, JsValue> {
    match board {
        Some(name) => name.parse().map_err(js_error),
        None => Ok(BoardKind::default()),
    }
}

fn millis_until(deadline: Instant) -> u32 {
    let millis = deadline.saturating_duration_since(Instant::now()).as_millis();
    u32::try_from(millis).unwrap_or(u32::MAX).saturating_add(1)
}

/// A host callback waiting to be called.
enum HostCall {
    Render(Position, Orientation),
    Effect {
        ticket: EffectTicket,
        operation: Operation,
        duration: Duration,
    },
    Changed(Position, Position),
    MoveEnd(Position, Position),
    Error(BoardError),
}

type Outbox = Rc<RefCell<VecDeque<HostCall>>>;

struct JsSurface {
    outbox: Outbox,
}

impl Surface for JsSurface {
    fn render(&mut self, position: &Position, orientation: Orientation) {
        self.outbox
            .borrow_mut()
            .push_back(HostCall::Render(position.clone(), orientation));
    }

    fn run_effect(
        &mut self,
        ticket: EffectTicket,
        operation: &Operation,
        duration: Duration,
    ) -> Result<(), HostError> {
        self.outbox.borrow_mut().push_back(HostCall::Effect {
            ticket,
            operation: *operation,
            duration,
        });
        Ok(())
    }
}

struct JsObserver {
    outbox: Outbox,
}

impl Observer for JsObserver {
    fn position_changed(&mut self, old: Position, new: Position) -> Result<(), HostError> {
        self.outbox.borrow_mut().push_back(HostCall::Changed(old, new));
        Ok(())
    }

    fn batch_complete(&mut self, old: Position, new: Position) -> Result<(), HostError> {
        self.outbox.borrow_mut().push_back(HostCall::MoveEnd(old, new));
        Ok(())
    }

    fn error(&mut self, error: &BoardError) {
        self.outbox
            .borrow_mut()
            .push_back(HostCall::Error(error.clone()));
    }
}

struct Callbacks {
    render: Function,
    run_effect: Function,
    on_change: Option<Function>,
    on_move_end: Option<Function>,
    on_error: Option<Function>,
}

type Controller = BoardController<JsSurface, JsObserver>;

struct Shared {
    controller: RefCell<Controller>,
    callbacks: RefCell<Callbacks>,
    outbox: Outbox,
    timer: RefCell<Option<Timeout>>,
    // The timeout whose callback is running; dropping it there would free
    // the closure mid-call.
    spent: RefCell<Option<Timeout>>,
}

impl Shared {
    /// Runs `change` on the controller, then calls the host back and rearms
    /// the timer.
    fn update<R>(self: &Rc<Self>, change: impl FnOnce(&mut Controller) -> R) -> R {
        let result = change(&mut *self.controller.borrow_mut());
        self.flush();
        self.rearm();
        result
    }

    fn flush(&self) {
        loop {
            let Some(call) = self.outbox.borrow_mut().pop_front() else {
                break;
            };
            self.deliver(call);
        }
    }

    fn deliver(&self, call: HostCall) {
        match call {
            HostCall::Render(position, orientation) => {
                let render = self.callbacks.borrow().render.clone();
                let result = to_js(&position).and_then(|position| {
                    render.call2(
                        &JsValue::NULL,
                        &position,
                        &JsValue::from_str(orientation.as_str()),
                    )
                });
                if let Err(err) = result {
                    log::warn!("render callback failed: {}", describe(&err));
                }
            }
            HostCall::Effect {
                ticket,
                operation,
                duration,
            } => {
                let run_effect = self.callbacks.borrow().run_effect.clone();
                if let Err(err) = start_effect(&run_effect, ticket, &operation, duration) {
                    let mut controller = self.controller.borrow_mut();
                    controller.report(BoardError::Effect {
                        operation,
                        source: host_error(err),
                    });
                    controller.complete_effect(ticket);
                }
            }
            HostCall::Changed(old, new) => {
                let callback = self.callbacks.borrow().on_change.clone();
                self.notify(callback, "onChange", old, new);
            }
            HostCall::MoveEnd(old, new) => {
                let callback = self.callbacks.borrow().on_move_end.clone();
                self.notify(callback, "onMoveEnd", old, new);
            }
            HostCall::Error(error) => {
                let Some(callback) = self.callbacks.borrow().on_error.clone() else {
                    return;
                };
                let code = JsValue::from_f64(f64::from(error.code()));
                let message = JsValue::from_str(&error.to_string());
                if let Err(err) = callback.call2(&JsValue::NULL, &code, &message) {
                    log::warn!("onError callback failed: {}", describe(&err));
                }
            }
        }
    }

    fn notify(&self, callback: Option<Function>, hook: &'static str, old: Position, new: Position) {
        let Some(callback) = callback else {
            return;
        };
        let result = to_js(&old).and_then(|old| {
            let new = to_js(&new)?;
            callback.call2(&JsValue::NULL, &old, &new)
        });
        if let Err(err) = result {
            self.controller.borrow_mut().report(BoardError::Observer {
                hook,
                source: host_error(err),
            });
        }
    }

    /// Arms the timer for the next poll: right away when queued updates are
    /// ready, at the watchdog deadline while a batch runs, not at all
    /// otherwise.
    fn rearm(self: &Rc<Self>) {
        let delay = {
            let controller = self.controller.borrow();
            if controller.needs_poll() {
                Some(0)
            } else {
                controller.next_deadline().map(millis_until)
            }
        };

        let timer = delay.map(|millis| {
            let shared = Rc::downgrade(self);
            Timeout::new(millis, move || {
                if let Some(shared) = shared.upgrade() {
                    shared.fire();
                }
            })
        });
        drop(self.timer.replace(timer));
    }

    fn fire(self: &Rc<Self>) {
        let running = self.timer.take();
        drop(self.spent.replace(running));
        self.update(|controller| controller.poll(Instant::now()));
    }
}

fn start_effect(
    run_effect: &Function,
    ticket: EffectTicket,
    operation: &Operation,
    duration: Duration,
) -> Result<JsValue, JsValue> {
    let operation = to_js(operation)?;
    let ticket = to_js(&ticket)?;
    run_effect.call3(
        &JsValue::NULL,
        &operation,
        &JsValue::from_f64(duration.as_millis() as f64),
        &ticket,
    )
}

#[wasm_bindgen]
pub struct DraughtsBoard {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl DraughtsBoard {
    /// `render(position, orientation)` redraws every piece;
    /// `runEffect(operation, durationMs, ticket)` starts one effect, whose
    /// end the host reports with `completeEffect(ticket.batch, ticket.index)`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: JsValue,
        render: Function,
        run_effect: Function,
    ) -> Result<DraughtsBoard, JsValue> {
        let config: BoardConfig = if config.is_undefined() || config.is_null() {
            BoardConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        let outbox = Outbox::default();
        let surface = JsSurface {
            outbox: outbox.clone(),
        };
        let observer = JsObserver {
            outbox: outbox.clone(),
        };
        let shared = Rc::new(Shared {
            controller: RefCell::new(BoardController::new(config, surface, observer)),
            callbacks: RefCell::new(Callbacks {
                render,
                run_effect,
                on_change: None,
                on_move_end: None,
                on_error: None,
            }),
            outbox,
            timer: RefCell::new(None),
            spent: RefCell::new(None),
        });
        shared.flush();
        Ok(DraughtsBoard { shared })
    }

    #[wasm_bindgen(setter = onChange)]
    pub fn set_on_change(&self, callback: Option<Function>) {
        self.shared.callbacks.borrow_mut().on_change = callback;
    }

    #[wasm_bindgen(setter = onMoveEnd)]
    pub fn set_on_move_end(&self, callback: Option<Function>) {
        self.shared.callbacks.borrow_mut().on_move_end = callback;
    }

    #[wasm_bindgen(setter = onError)]
    pub fn set_on_error(&self, callback: Option<Function>) {
        self.shared.callbacks.borrow_mut().on_error = callback;
    }

    pub fn position(&self) -> Result<JsValue, JsValue> {
        to_js(&self.shared.controller.borrow().position())
    }

    /// Accepts a notation string, `"start"` or a `{ square: code }` object.
    /// Invalid object entries are dropped; a bad string or any other value
    /// is reported and ignored.
    #[wasm_bindgen(js_name = setPosition)]
    pub fn set_position(&self, value: JsValue, animate: Option<bool>) {
        let animate = animate.unwrap_or(true);
        let now = Instant::now();
        let kind = self.shared.controller.borrow().kind();

        let result = if let Some(text) = value.as_string() {
            notation::decode(&text, kind).map_err(|err| err.to_string())
        } else if let Some(object) = value.dyn_ref::<Object>() {
            Ok(Position::sanitize(raw_entries(object), kind))
        } else {
            Err(format!("unsupported value {}", describe(&value)))
        };

        self.shared.update(|controller| match result {
            Ok(position) => controller.set_position(position, animate, now),
            Err(reason) => controller.report(BoardError::InvalidPosition(reason)),
        });
    }

    pub fn fen(&self) -> String {
        self.shared.controller.borrow().fen()
    }

    pub fn start(&self, animate: Option<bool>) {
        let animate = animate.unwrap_or(true);
        self.shared
            .update(|controller| controller.start(animate, Instant::now()));
    }

    pub fn clear(&self, animate: Option<bool>) {
        let animate = animate.unwrap_or(true);
        self.shared
            .update(|controller| controller.clear(animate, Instant::now()));
    }

    /// Moves pieces given as `"27-31"` or `"23x32"` and returns the new
    /// position.
    #[wasm_bindgen(js_name = "move")]
    pub fn move_pieces(&self, moves: Array, animate: Option<bool>) -> Result<JsValue, JsValue> {
        let animate = animate.unwrap_or(true);
        let moves: Vec<String> = moves
            .iter()
            .map(|value| value.as_string().unwrap_or_default())
            .collect();
        let position = self
            .shared
            .update(|controller| controller.move_pieces(moves, animate, Instant::now()));
        to_js(&position)
    }

    pub fn orientation(&self) -> String {
        self.shared
            .controller
            .borrow()
            .orientation()
            .as_str()
            .to_string()
    }

    /// Sets `"white"`, `"black"` or `"flip"`; returns the resulting
    /// orientation.
    #[wasm_bindgen(js_name = setOrientation)]
    pub fn set_orientation(&self, value: &str) -> String {
        self.shared.update(|controller| {
            if value == "flip" {
                controller.flip();
            } else {
                match value.parse::<Orientation>() {
                    Ok(orientation) => controller.set_orientation(orientation),
                    Err(_) => controller.report(BoardError::InvalidOrientation(value.to_string())),
                }
            }
        });
        self.orientation()
    }

    pub fn flip(&self) -> String {
        self.shared
            .update(|controller| controller.flip())
            .as_str()
            .to_string()
    }

    #[wasm_bindgen(js_name = completeEffect)]
    pub fn complete_effect(&self, batch: u32, index: u32) {
        self.shared
            .update(|controller| controller.complete_effect(EffectTicket { batch, index }));
    }

    /// Polls right away instead of waiting for the board's own timer.
    pub fn tick(&self) {
        self.shared
            .update(|controller| controller.poll(Instant::now()));
    }

    /// Milliseconds until the watchdog fires, if a batch runs.
    #[wasm_bindgen(js_name = nextDeadlineMs)]
    pub fn next_deadline_ms(&self) -> Option<f64> {
        self.shared
            .controller
            .borrow()
            .next_deadline()
            .map(|deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .as_secs_f64()
                    * 1000.0
            })
    }

    #[wasm_bindgen(js_name = isAnimating)]
    pub fn is_animating(&self) -> bool {
        self.shared.controller.borrow().is_animating()
    }

    /// Number of animated updates waiting for the running batch.
    pub fn queued(&self) -> usize {
        self.shared.controller.borrow().queued()
    }

    /// Cancels the timer and drops pending work and callbacks without
    /// notifying anyone.
    pub fn destroy(self) {
        drop(self.shared.timer.take());
        self.shared.outbox.borrow_mut().clear();
        match Rc::try_unwrap(self.shared) {
            Ok(shared) => {
                shared.controller.into_inner().destroy();
            }
            Err(_) => log::warn!("board destroyed while still in use"),
        }
    }
}

/// Decodes a notation string into a `{ square: code }` object.
#[wasm_bindgen(js_name = fenToObj)]
pub fn fen_to_obj(fen: &str, board: Option<String>) -> Result<JsValue, JsValue> {
    let kind = parse_kind(board)?;
    let position = notation::decode(fen, kind).map_err(js_error)?;
    to_js(&position)
}

/// Encodes a `{ square: code }` object. Empty squares are skipped; any
/// other invalid entry fails the whole object.
#[wasm_bindgen(js_name = objToFen)]
pub fn obj_to_fen(obj: &Object, board: Option<String>) -> Result<String, JsValue> {
    let kind = parse_kind(board)?;
    notation::encode_raw(raw_entries(obj), kind).map_err(js_error)
}
