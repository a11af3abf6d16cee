//! Sequential continuation scheduler
//!
//! Holds the ordered frontier of species for a run and a cursor into it.
//! Exactly one species is active at a time; the cursor advances when that
//! species reaches a terminal outcome, whether it succeeded or failed.
//!
//! ```text
//! Idle -> Dispatching(0) -> Waiting(0) -> Dispatching(1) -> ... -> Drained
//! ```

use crate::state::EntityId;

/// Where the run is in its frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Nothing dispatched yet
    Idle,
    /// Discovering the species at this cursor position
    Dispatching(usize),
    /// Fragment fetches for this cursor position are in flight
    Waiting(usize),
    /// The cursor passed the end of the frontier
    Drained,
}

/// Frontier and cursor for one run
#[derive(Debug)]
pub struct Scheduler {
    frontier: Vec<EntityId>,
    state: ControllerState,
}

impl Scheduler {
    pub fn new(frontier: Vec<EntityId>) -> Self {
        Self {
            frontier,
            state: ControllerState::Idle,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_drained(&self) -> bool {
        self.state == ControllerState::Drained
    }

    /// Species at the cursor, while one is active
    pub fn current(&self) -> Option<&EntityId> {
        match self.state {
            ControllerState::Dispatching(i) | ControllerState::Waiting(i) => self.frontier.get(i),
            ControllerState::Idle | ControllerState::Drained => None,
        }
    }

    /// Number of species not yet dispatched
    pub fn remaining(&self) -> usize {
        match self.state {
            ControllerState::Idle => self.frontier.len(),
            ControllerState::Dispatching(i) | ControllerState::Waiting(i) => {
                self.frontier.len().saturating_sub(i + 1)
            }
            ControllerState::Drained => 0,
        }
    }

    /// Dispatches the first species; returns None if the frontier is empty
    pub fn start(&mut self) -> Option<EntityId> {
        if self.state != ControllerState::Idle {
            return self.current().cloned();
        }
        self.dispatch(0)
    }

    /// Marks the active species as waiting on its fragment fetches
    pub fn begin_waiting(&mut self) {
        if let ControllerState::Dispatching(i) = self.state {
            self.state = ControllerState::Waiting(i);
        }
    }

    /// Moves past the active species and dispatches the next one
    ///
    /// Returns None once the frontier is drained.
    pub fn advance(&mut self) -> Option<EntityId> {
        match self.state {
            ControllerState::Idle => self.dispatch(0),
            ControllerState::Dispatching(i) | ControllerState::Waiting(i) => self.dispatch(i + 1),
            ControllerState::Drained => None,
        }
    }

    /// Stops the run early
    pub fn drain(&mut self) {
        self.state = ControllerState::Drained;
    }

    fn dispatch(&mut self, index: usize) -> Option<EntityId> {
        match self.frontier.get(index) {
            Some(id) => {
                self.state = ControllerState::Dispatching(index);
                Some(id.clone())
            }
            None => {
                self.state = ControllerState::Drained;
                None
            }
        }
    }
}
