//! Metric descriptors: value type, semantics, instance domain.
//!
//! A [`Descriptor`] is the metadata tuple reported for every metric and for
//! every node of a bound expression tree. Interior nodes carry descriptors
//! computed by the semantic analyser from their operands.

use crate::id::MetricId;
use crate::units::Units;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concrete type of a metric value.
///
/// The six numeric types participate in arithmetic; the remaining variants
/// exist so hosts can expose non-arithmetic metrics, which the analyser
/// rejects as operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Signed 32-bit integer
    I32,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 64-bit integer
    U64,
    /// Single-precision float
    F32,
    /// Double-precision float
    F64,
    /// Null-terminated string (host metrics only)
    String,
    /// Event records (host metrics only)
    Event,
}

impl ValueType {
    /// Check if values of this type participate in arithmetic.
    pub fn is_numeric(self) -> bool {
        !matches!(self, ValueType::String | ValueType::Event)
    }

    /// Promotion rank, wider-and-unsigned winning.
    fn rank(self) -> u8 {
        match self {
            ValueType::I32 => 0,
            ValueType::U32 => 1,
            ValueType::I64 => 2,
            ValueType::U64 => 3,
            ValueType::F32 => 4,
            ValueType::F64 => 5,
            ValueType::String | ValueType::Event => u8::MAX,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::I32 => "32",
            ValueType::U32 => "U32",
            ValueType::I64 => "64",
            ValueType::U64 => "U64",
            ValueType::F32 => "FLOAT",
            ValueType::F64 => "DOUBLE",
            ValueType::String => "STRING",
            ValueType::Event => "EVENT",
        };
        write!(f, "{}", name)
    }
}

/// Result type of a binary arithmetic operation, following the usual C
/// rules: any double operand makes a double, any float a float, otherwise
/// the wider (and on a tie, unsigned) integer type wins.
///
/// Symmetric: `promote(a, b) == promote(b, a)`. Callers must reject
/// non-numeric operands first.
pub fn promote(a: ValueType, b: ValueType) -> ValueType {
    debug_assert!(a.is_numeric() && b.is_numeric());
    if a.rank() >= b.rank() {
        a
    } else {
        b
    }
}

/// Value semantics of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semantics {
    /// Monotone cumulative value; consumers sample-convert to a rate
    Counter,
    /// Point-in-time value
    Instant,
    /// Value that persists until explicitly changed
    Discrete,
}

impl Semantics {
    /// Counters get special operator-legality treatment in the analyser.
    pub fn is_counter(self) -> bool {
        matches!(self, Semantics::Counter)
    }
}

/// Instance domain identifier. Metrics without an instance domain (scalar
/// metrics) carry `None` wherever an `Option<InstanceDomain>` appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceDomain(pub u32);

impl fmt::Display for InstanceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata for the value produced by a metric or an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Metric id; `None` for literals and unnamed interior nodes
    pub id: Option<MetricId>,
    /// Concrete value type
    pub value_type: ValueType,
    /// Instance domain; `None` for scalar values
    pub indom: Option<InstanceDomain>,
    /// Value semantics
    pub semantics: Semantics,
    /// Unit of the value
    pub units: Units,
}

impl Descriptor {
    /// Descriptor for a numeric literal of the given type and units.
    ///
    /// Literals are discrete (they never change), scalar, and carry no id.
    pub fn literal(value_type: ValueType, units: Units) -> Descriptor {
        Descriptor {
            id: None,
            value_type,
            indom: None,
            semantics: Semantics::Discrete,
            units,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMERIC: [ValueType; 6] = [
        ValueType::I32,
        ValueType::U32,
        ValueType::I64,
        ValueType::U64,
        ValueType::F32,
        ValueType::F64,
    ];

    #[test]
    fn test_promotion_symmetric() {
        for &a in &NUMERIC {
            for &b in &NUMERIC {
                assert_eq!(promote(a, b), promote(b, a), "{:?} vs {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_promotion_widens() {
        assert_eq!(promote(ValueType::I32, ValueType::U32), ValueType::U32);
        assert_eq!(promote(ValueType::U32, ValueType::I64), ValueType::I64);
        assert_eq!(promote(ValueType::I64, ValueType::U64), ValueType::U64);
        assert_eq!(promote(ValueType::U64, ValueType::F32), ValueType::F32);
        assert_eq!(promote(ValueType::F32, ValueType::F64), ValueType::F64);
        assert_eq!(promote(ValueType::I32, ValueType::I32), ValueType::I32);
    }

    #[test]
    fn test_promotion_idempotent() {
        for &a in &NUMERIC {
            assert_eq!(promote(a, a), a);
        }
    }

    #[test]
    fn test_non_numeric() {
        assert!(!ValueType::String.is_numeric());
        assert!(!ValueType::Event.is_numeric());
        assert!(ValueType::U64.is_numeric());
    }

    #[test]
    fn test_literal_descriptor() {
        let d = Descriptor::literal(ValueType::U32, Units::NONE);
        assert_eq!(d.id, None);
        assert_eq!(d.semantics, Semantics::Discrete);
        assert_eq!(d.indom, None);
    }
}
