//! apiwatch
//!
//! Model-based detection of breaking API changes in dynamically-typed
//! libraries. Two phases:
//!
//! - **`model-gen`**: execute a client (a test suite or example program)
//!   against an interposed library and record every boundary interaction
//!   as a typed access-path model.
//! - **`check`**: replay that model against another version of the
//!   library, synthesizing client inputs on demand, and report every
//!   path whose observed type no longer matches.
//!
//! The engines live in the `apiwatch-core` crate; the embedded script
//! runtime in `apiwatch-script`. This crate is the CLI and run
//! orchestration.

pub mod args;
pub mod runner;
