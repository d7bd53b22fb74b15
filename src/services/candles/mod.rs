pub mod gate;
pub mod loader;
pub mod planner;
pub mod resolution;
