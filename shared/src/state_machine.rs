//! Connection Lifecycle State Machine
//!
//! Defines the valid lifecycle transitions of a peer connection and records
//! which trigger started its teardown.

use std::fmt;

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, not yet supervised
    Initializing,
    /// Registered and (if bonding is enabled) supervised by its primary bond
    Active,
    /// Teardown in progress
    Deleting,
    /// Teardown complete, no longer registered
    Deleted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Initializing => write!(f, "initializing"),
            ConnectionState::Active => write!(f, "active"),
            ConnectionState::Deleting => write!(f, "deleting"),
            ConnectionState::Deleted => write!(f, "deleted"),
        }
    }
}

/// What caused a connection to be torn down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownTrigger {
    /// Application or registry asked for it
    Explicit,
    /// The primary bond stopped receiving heartbeats
    PrimaryBondBroken,
    /// A bridge bond stopped receiving heartbeats
    BridgeBondBroken { label: String },
    /// The registry is shutting down
    RegistryShutdown,
    /// A new connection was created at the same key
    Replaced,
    /// The primary bond could not be started
    BondStartFailed,
}

impl fmt::Display for TeardownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownTrigger::Explicit => write!(f, "explicit delete"),
            TeardownTrigger::PrimaryBondBroken => write!(f, "bond broken"),
            TeardownTrigger::BridgeBondBroken { label } => {
                write!(f, "bridge \"{}\" bond broken", label)
            }
            TeardownTrigger::RegistryShutdown => write!(f, "registry shutdown"),
            TeardownTrigger::Replaced => write!(f, "replaced"),
            TeardownTrigger::BondStartFailed => write!(f, "bond failed to start"),
        }
    }
}

/// Events that can trigger lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Connection registered and its primary bond (if any) started
    Activated,
    /// First teardown trigger observed
    TeardownStarted(TeardownTrigger),
    /// Every teardown stage has run
    TeardownFinished,
}

/// Result of a transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(ConnectionState),
    /// Transition was invalid from current state
    Invalid {
        from: ConnectionState,
        event: LifecycleEvent,
    },
}

impl TransitionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TransitionResult::Success(_))
    }
}

/// Lifecycle state machine for one connection
#[derive(Debug)]
pub struct LifecycleMachine {
    current_state: ConnectionState,
    trigger: Option<TeardownTrigger>,
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMachine {
    /// Create a new state machine in Initializing state
    pub fn new() -> Self {
        Self {
            current_state: ConnectionState::Initializing,
            trigger: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.current_state
    }

    /// The trigger that started teardown, once teardown has started
    pub fn trigger(&self) -> Option<&TeardownTrigger> {
        self.trigger.as_ref()
    }

    /// True while the connection has not begun tearing down
    pub fn is_live(&self) -> bool {
        matches!(
            self.current_state,
            ConnectionState::Initializing | ConnectionState::Active
        )
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LifecycleEvent) -> TransitionResult {
        match self.get_next_state(&event) {
            Some(state) => {
                if let LifecycleEvent::TeardownStarted(trigger) = event {
                    self.trigger = Some(trigger);
                }
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    fn get_next_state(&self, event: &LifecycleEvent) -> Option<ConnectionState> {
        use ConnectionState::*;

        match (self.current_state, event) {
            (Initializing, LifecycleEvent::Activated) => Some(Active),

            // Teardown may start before activation (e.g. bond failed to start)
            (Initializing | Active, LifecycleEvent::TeardownStarted(_)) => Some(Deleting),

            (Deleting, LifecycleEvent::TeardownFinished) => Some(Deleted),

            _ => None,
        }
    }
}

/// Check if a transition from one state to another is valid
pub fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;

    matches!(
        (from, to),
        (Initializing, Active)
            | (Initializing, Deleting)
            | (Active, Deleting)
            | (Deleting, Deleted)
    )
}
