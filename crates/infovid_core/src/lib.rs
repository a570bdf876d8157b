//! infovid core - orchestration backend for infographic video generation.
//!
//! This crate contains all business logic with zero UI dependencies.
//! A generation request becomes a workflow: an ordered list of steps
//! (script, infographics, subtitles, synthesis, optional upload) that run
//! one after another as jobs on a queue.

pub mod config;
pub mod logging;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod render;
pub mod script;
pub mod subtitles;
pub mod upload;
pub mod workflow;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
