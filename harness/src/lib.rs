//! Merkle-committed, CFI-gated agent execution harness.
//!
//! A planning model proposes a free-text plan; the harness turns it into a
//! committed, safety-reviewed sequence of tool calls and guarantees that what
//! executes cannot silently diverge from what was committed. The architecture
//! keeps the same split throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (canonical hashing, Merkle
//!   commitment, the two free-text grammars, the CFI gate). No I/O.
//! - **[`io`]**: Side-effecting collaborators (model adapters, tool registry,
//!   prompts, configuration, run logs).
//!
//! [`orchestrator`] composes both into the request lifecycle.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
