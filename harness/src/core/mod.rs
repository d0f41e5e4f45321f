//! Deterministic, pure logic shared by the harness core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod action_parser;
pub mod canonical;
pub mod cfi;
pub mod merkle;
pub mod plan_parser;
pub mod review;
pub mod state;
pub mod types;
