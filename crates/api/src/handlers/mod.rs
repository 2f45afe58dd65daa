pub mod generation;
pub mod maintenance;
pub mod queue;
