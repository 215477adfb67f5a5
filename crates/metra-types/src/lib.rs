//! Shared metric metadata types.
//!
//! This crate holds the semantic vocabulary used across the workspace:
//! packed metric ids, value types and the C-like promotion table, value
//! semantics, unit dimensions with per-dimension scales, descriptors, and
//! validated dotted names. It performs no I/O and keeps no global state.

pub mod desc;
pub mod id;
pub mod name;
pub mod units;

pub use desc::{promote, Descriptor, InstanceDomain, Semantics, ValueType};
pub use id::{MetricId, DYNAMIC_DOMAIN};
pub use name::{is_valid_name, MetricName, NameError};
pub use units::{count_factor, SpaceScale, TimeScale, Units};
