pub mod config;
pub mod logging;

pub mod broadcast;
pub mod control;
pub mod error;
pub mod extractor;
pub mod job;
pub mod orchestrator;
pub mod queue;
pub mod worker;

pub use orchestrator::{Analysis, Orchestrator};
