//! apiwatch core
//!
//! The two engines behind model-based API regression detection:
//!
//! - **Tracing**: run a client program against a mediated library and
//!   record every boundary interaction as a typed access path, with
//!   ρ-relations linking arguments back to the paths that produced
//!   them, and structural-hash compression to collapse repetitive call
//!   subtrees.
//! - **Replay**: rebuild the model against a new library version,
//!   synthesizing client-supplied values on demand and reporting every
//!   site where the observed type no longer matches the recorded one.
//!
//! # Core Modules
//!
//! - [`lattice`]: type tags, classification, compatibility
//! - [`path`]: access-path components, variance, ρ-relations
//! - [`tree`]: the prefix-shared path tree
//! - [`compress`]: structural hashing and duplicate-call collapse
//! - [`tracer`]: the interposition mediator
//! - [`bridge`]: module resolution and client execution
//! - [`model`]: replay-side tree reconstruction
//! - [`replay`]: the demand-ordered replayer
//! - [`persist`]: the JSON model format
//! - [`report`]: breaking-path records
//!
//! # Example
//!
//! ```ignore
//! use apiwatch_core::bridge::{discover_clients, BridgeConfig, HostBridge};
//! use apiwatch_core::tracer::TraceSession;
//! use apiwatch_script::Interpreter;
//!
//! let bridge = HostBridge::new(BridgeConfig::new("leftpad"));
//! let session = TraceSession::new();
//! let mut interp = Interpreter::new();
//! let clients = discover_clients("tests/clients".as_ref())?;
//! bridge.execute_clients(&mut interp, &session, &clients)?;
//! let (tree, rho) = session.finish();
//! ```

pub mod bridge;
pub mod compress;
pub mod lattice;
pub mod model;
pub mod path;
pub mod persist;
pub mod replay;
pub mod report;
mod synth;
pub mod tracer;
pub mod tree;

pub use bridge::{discover_clients, BridgeConfig, HostBridge};
pub use compress::{compress, CompressionPolicy};
pub use lattice::{classify, compatible, TypeTag};
pub use model::{ModelError, ModelTree};
pub use path::{AccessPath, PathComponent, RhoRelation, Variance};
pub use persist::{ModelFile, ModelStats};
pub use replay::{LibrarySource, Replayer};
pub use report::{BreakageKind, BreakingPath, CheckReport};
pub use tracer::TraceSession;
pub use tree::PathTree;
