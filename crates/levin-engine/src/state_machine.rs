//! Condition-driven activity state machine.
//!
//! State is a pure function of five booleans, evaluated in priority order
//! whenever a condition actually changes. Updates return the transition (if
//! any) so the caller applies session actions on the same thread,
//! exactly once per change, with re-entry impossible by construction.

/// Activity mode of the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Disabled by the operator.
    Off,
    /// Enabled but blocked by power or network policy.
    Paused,
    /// Ready, with nothing to transfer.
    Idle,
    /// Uploads only; the disk budget is exhausted.
    Seeding,
    /// Full activity.
    Downloading,
}

impl State {
    /// Lowercase wire/display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Paused => "paused",
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Downloading => "downloading",
        }
    }
}

/// A state change produced by a condition update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the update.
    pub from: State,
    /// State after the update.
    pub to: State,
}

/// The five conditions and the state they induce.
#[derive(Debug)]
pub struct StateMachine {
    state: State,
    enabled: bool,
    battery_ok: bool,
    network_ok: bool,
    has_torrents: bool,
    storage_ok: bool,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// All conditions false; state [`State::Off`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: State::Off,
            enabled: false,
            battery_ok: false,
            network_ok: false,
            has_torrents: false,
            storage_ok: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Update the operator enable flag.
    pub fn update_enabled(&mut self, enabled: bool) -> Option<Transition> {
        if self.enabled == enabled {
            return None;
        }
        self.enabled = enabled;
        self.evaluate()
    }

    /// Update the power-policy condition.
    pub fn update_battery(&mut self, ok: bool) -> Option<Transition> {
        if self.battery_ok == ok {
            return None;
        }
        self.battery_ok = ok;
        self.evaluate()
    }

    /// Update the network-policy condition.
    pub fn update_network(&mut self, ok: bool) -> Option<Transition> {
        if self.network_ok == ok {
            return None;
        }
        self.network_ok = ok;
        self.evaluate()
    }

    /// Update whether the session holds any torrents.
    pub fn update_has_torrents(&mut self, has: bool) -> Option<Transition> {
        if self.has_torrents == has {
            return None;
        }
        self.has_torrents = has;
        self.evaluate()
    }

    /// Update the disk-budget condition.
    pub fn update_storage(&mut self, ok: bool) -> Option<Transition> {
        if self.storage_ok == ok {
            return None;
        }
        self.storage_ok = ok;
        self.evaluate()
    }

    fn evaluate(&mut self) -> Option<Transition> {
        let new_state = if !self.enabled {
            State::Off
        } else if !self.battery_ok || !self.network_ok {
            State::Paused
        } else if !self.has_torrents {
            State::Idle
        } else if !self.storage_ok {
            State::Seeding
        } else {
            State::Downloading
        };

        if new_state == self.state {
            return None;
        }
        let transition = Transition {
            from: self.state,
            to: new_state,
        };
        self.state = new_state;
        Some(transition)
    }
}
