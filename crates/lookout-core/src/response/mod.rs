mod controller;
mod plan;

pub use controller::{ExecutionOutcome, InputDriver, ResponseController};
pub use plan::{PlanBuilder, match_option, parse_bool};
