use std::cell::Cell;

use super::error::DomError;

/// Where an event currently is in its dispatch.
///
/// `Capturing` exists for script compatibility; dispatch never enters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

impl Phase {
    /// The numeric `eventPhase` value scripts observe.
    pub fn code(self) -> u16 {
        match self {
            Phase::None => 0,
            Phase::Capturing => 1,
            Phase::AtTarget => 2,
            Phase::Bubbling => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventInit {
    pub bubbles: bool,
    /// Raised by the host rather than by a script.
    pub trusted: bool,
}

/// One in-flight event occurrence.
///
/// State transitions go through `&self` so listeners, which only ever see a
/// shared reference, can cancel or stop the event. Both transitions are one
/// way. `bubbles` itself never changes: stopping propagation is tracked
/// separately.
#[derive(Debug)]
pub struct Event {
    event_type: String,
    bubbles: bool,
    trusted: bool,
    do_default: Cell<bool>,
    propagation_stopped: Cell<bool>,
    phase: Cell<Phase>,
    dispatched: Cell<bool>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::with_init(event_type, EventInit::default())
    }

    pub fn with_init(event_type: impl Into<String>, init: EventInit) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles: init.bubbles,
            trusted: init.trusted,
            do_default: Cell::new(true),
            propagation_stopped: Cell::new(false),
            phase: Cell::new(Phase::None),
            dispatched: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// False once any listener called [`Event::prevent_default`].
    pub fn default_allowed(&self) -> bool {
        self.do_default.get()
    }

    pub fn default_prevented(&self) -> bool {
        !self.do_default.get()
    }

    pub fn prevent_default(&self) {
        self.do_default.set(false);
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    /// Whether ancestors should still see the event.
    pub fn should_propagate(&self) -> bool {
        self.bubbles && !self.propagation_stopped.get()
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.set(phase);
    }

    pub(crate) fn begin_dispatch(&self) -> Result<(), DomError> {
        if self.dispatched.replace(true) {
            return Err(DomError::InvalidState(format!(
                "event '{}' has already been dispatched",
                self.event_type
            )));
        }
        Ok(())
    }
}
