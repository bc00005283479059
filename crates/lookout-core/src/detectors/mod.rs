mod heuristic;
mod template;

pub use heuristic::{HeuristicTextDetector, TextHeuristics, parse_option};
pub use template::TemplateDetector;
