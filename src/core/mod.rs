//! Engine components, from text segmentation up to the orchestrator.

pub mod config;
pub mod fallback;
pub mod grammar;
pub mod markers;
pub mod noise;
pub mod pipeline;
pub mod prompt;
pub mod schedule;
pub mod text;
pub mod validator;
