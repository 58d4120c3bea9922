//! Scenario tests for the chandler-engine crate.

mod concurrency;
mod helpers;
