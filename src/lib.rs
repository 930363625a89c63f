//! Single-target network reachability monitor.
//!
//! Probes one host on a fixed interval, keeps the most recent outcomes
//! in a bounded ring, and derives a discrete status level plus a
//! sparkline geometry from the recent window. The [`manager::Manager`]
//! runs the loop; everything consumers need is readable concurrently
//! while it runs.

pub mod config;
pub mod history;
pub mod manager;
pub mod probe;
pub mod status;

pub use history::{History, Sample};
pub use manager::Manager;
pub use probe::ProbeMode;
pub use status::StatusLevel;
