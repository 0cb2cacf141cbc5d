//! Core translation engine module

pub mod client;
pub mod config;
pub mod cost;
pub mod errors;
pub mod evaluator;
pub mod mock;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod token_tracker;
