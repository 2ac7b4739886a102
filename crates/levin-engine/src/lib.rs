#![forbid(unsafe_code)]

//! Core of the levin daemon.
//!
//! The engine owns the pieces the rest of the system orbits around: the
//! condition-driven [`StateMachine`], the pure [`BudgetPolicy`] calculator
//! with its deletion safety net, the persistent [`Statistics`] record, and
//! the [`Engine`] orchestrator that wires them to a torrent session and a
//! watch directory, one tick at a time.

mod budget;
mod engine;
mod state_machine;
mod stats;

pub use budget::{delete_to_free, BudgetPolicy, DiskBudgetResult, HYSTERESIS_BYTES};
pub use engine::{Engine, EngineStatus, STATS_SAVE_INTERVAL_TICKS};
pub use state_machine::{State, StateMachine, Transition};
pub use stats::Statistics;
