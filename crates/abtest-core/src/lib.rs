//! A/B Tester Core - routing engine and blind-test state for listening tests
//!
//! Compare several correlated sources through one output: a single selector
//! picks the audible input group, gains ramp without clicks, and an optional
//! blind mode hides channel identity behind a shuffled order with ratings.

pub mod blind;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod kvt;
pub mod port;
pub mod rating;
pub mod types;

pub use error::{TesterError, TesterResult};
pub use types::*;
