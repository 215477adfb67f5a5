//! Derived-metric expression language.
//!
//! Hosts expose performance metrics under dotted names; this crate lets
//! users define new *derived* metrics as expressions over existing ones
//! (`disk.util = rate(disk.dev.total_bytes)`), with value type, units,
//! semantics and instance domain fully inferred from the operands.
//!
//! # Pipeline
//!
//! ```text
//! text ── lexer ──> tokens ── parser ──> static AST ──> registry
//!                                                          │ open_context
//!                                                          ▼
//!                        host MetricSource ──> resolve ──> bound AST
//! ```
//!
//! Registration parses and stores a static AST. Opening a context clones
//! it, resolves every metric name through the host's
//! [`MetricSource`](resolve::MetricSource) oracle, and runs the semantic
//! analyser (type promotion, unit-dimension checks, scale reconciliation,
//! counter-semantics legality, instance-domain unification). The bound
//! tree carries per-node descriptors and the scale factors a numeric
//! evaluator applies at sample time; the evaluator itself lives with the
//! host.
//!
//! # Example
//!
//! ```
//! use metra_dsl::{MetricRegistry, MetricSource};
//!
//! # fn demo(host: &dyn MetricSource) {
//! let registry = MetricRegistry::new();
//! registry
//!     .register("disk.util", "rate(disk.dev.total_bytes)")
//!     .expect("well-formed expression");
//! let context = registry.open_context(host);
//! # }
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod resolve;

pub use error::{last_error, DeriveError};
pub use registry::{Child, ContextBindings, ContextEntry, LookupError, MetricRegistry};
pub use resolve::{BoundExpr, MetricSource};
