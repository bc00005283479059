pub mod cache;
pub mod detectors;
pub mod error;
pub mod normalize;
pub mod recognition;
pub mod response;
pub mod safety;
pub mod session;

#[cfg(test)]
mod tests;
