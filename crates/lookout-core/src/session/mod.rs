mod machine;
mod runner;

pub use machine::{RunContext, SessionEvent, SessionMachine, next_phase, transition};
pub use runner::{Session, SessionParts, SessionSettings};
