#![warn(rust_2018_idioms)]

pub mod adapter;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod port;
pub mod producer;
pub mod sql;

pub use pipeline::{Destination, FailureReason, PipelineOrchestrator, RunOutcome};
