//! Name resolution and per-context binding.
//!
//! A static [`Expr`](crate::ast::Expr) carries no metric metadata. Opening
//! a context binds it: the tree is cloned node by node, every `Name` leaf
//! is resolved through the host's [`MetricSource`] oracle, and the
//! semantic analyser ([`check`]) runs bottom-up over the interior nodes,
//! computing each node's [`Descriptor`] and accumulating the scale factors
//! the evaluator applies at sample time.
//!
//! Literal text is shared between the static tree and its bound clones
//! (`Arc<str>`); a bound tree never owns literal storage of its own.
//!
//! # What this pass does NOT do
//!
//! - No evaluation: [`EvalState`] is scratch for the external evaluator.
//! - No recovery: the first semantic error abandons the binding, and the
//!   registry records the registration as disabled for that context only.

pub(crate) mod check;

#[cfg(test)]
mod tests;

use crate::ast::{BinOp, Expr, ExprKind, Func, UnOp};
use metra_types::{Descriptor, MetricId, ValueType};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Host oracle resolving metric names and metadata for one context.
///
/// # Contract
///
/// `lookup_name` must resolve against the host's *own* namespace only. The
/// registry also uses it to detect collisions between a derived name and a
/// real host metric, so a host that consults derived metrics during its own
/// lookup must short-circuit before doing so; otherwise every derived
/// registration would appear to clash with itself.
///
/// Both oracles may block (they are called with the registry lock held) and
/// must be thread-safe.
pub trait MetricSource {
    /// Resolve a dotted metric name to an id, or `None` if unknown.
    fn lookup_name(&self, name: &str) -> Option<MetricId>;

    /// Fetch the descriptor for a previously resolved id.
    fn lookup_desc(&self, id: MetricId) -> Option<Descriptor>;
}

/// Which operand of a binary operator an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Left operand
    Left,
    /// Right operand
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Semantic failure category; the display strings are stable and published
/// through the error channel verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticErrorKind {
    /// `* /` between two counters
    #[error("Illegal operator for counters")]
    CounterOperator,
    /// `+ -` (or `/` with the counter on the right) mixing counter and
    /// non-counter
    #[error("Illegal operator for counter and non-counter")]
    MixedCounterOperator,
    /// Operand of a binary operator is not numeric
    #[error("Non-arithmetic type for {0} operand")]
    NonArithmetic(Side),
    /// Unit dimensions disagree
    #[error("Dimensions are not the same")]
    DimensionMismatch,
    /// Counter scaled by a dimensioned non-counter
    #[error("Non-counter and not dimensionless for {0} operand")]
    NotDimensionless(Side),
    /// Conflicting instance domains
    #[error("Operands should have the same instance domain")]
    InstanceDomainMismatch,
    /// Ternary branches with different value types
    #[error("Different types for ternary operands")]
    TernaryTypeMismatch,
    /// Ternary branches with different instance domains
    #[error("Different instance domains for ternary operands")]
    TernaryInstanceDomainMismatch,
    /// Ternary branches with different semantics
    #[error("Different semantics for ternary operands")]
    TernarySemanticsMismatch,
    /// Ternary branches with different units in the named dimension
    #[error("Different units or scale ({0}) for ternary operands")]
    TernaryUnitsMismatch(&'static str),
    /// Ternary guard is not numeric
    #[error("Non-arithmetic operand for ternary guard")]
    TernaryGuardType,
    /// Multi-valued guard selecting between scalar branches
    #[error("Non-scalar ternary guard with scalar expressions")]
    TernaryGuardIndom,
    /// Function or unary operand is not numeric
    #[error("Non-arithmetic operand for {0}")]
    NonArithmeticOperand(&'static str),
    /// `rate()` operand with a time dimension other than 0 or 1
    #[error("Incorrect time dimension for operand")]
    TimeDimension,
    /// Host could not resolve a metric name in this context
    #[error("Cannot resolve name")]
    UnresolvedName,
}

/// Semantic failure with an echo of the operand it refers to (a numeric
/// literal, a metric name, or `<expr>` for interior nodes).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operand}: {kind}")]
pub struct SemanticError {
    /// Failure category carrying the stable diagnostic
    pub kind: SemanticErrorKind,
    /// Operand echo
    pub operand: String,
}

impl SemanticError {
    pub(crate) fn new(kind: SemanticErrorKind, at: &BoundExpr) -> SemanticError {
        SemanticError {
            kind,
            operand: echo(&at.kind),
        }
    }
}

/// Render an operand for diagnostics.
fn echo(kind: &BoundKind) -> String {
    match kind {
        BoundKind::Integer { text, .. } | BoundKind::Double { text, .. } => text.to_string(),
        BoundKind::Name { name } => name.to_string(),
        _ => "<expr>".to_string(),
    }
}

/// Evaluator scratch attached to every bound node.
///
/// `mul_scale` and `div_scale` are the accumulated unit-reconciliation
/// factors applied to each sample of this node; `time_scale` is the length
/// in seconds of one of the operand's time units, consumed by `rate()`.
/// The sample bookkeeping fields belong to the evaluator and start empty.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalState {
    /// Multiply each sample value by this factor
    pub mul_scale: i64,
    /// Divide each sample value by this factor
    pub div_scale: i64,
    /// Seconds per operand time unit (rate nodes only)
    pub time_scale: f64,
    /// Instance count of the current sample
    pub current_samples: usize,
    /// Instance count of the retained previous sample
    pub last_samples: usize,
    /// Timestamp of the current sample
    pub timestamp: Option<std::time::SystemTime>,
    /// Timestamp of the retained previous sample
    pub last_timestamp: Option<std::time::SystemTime>,
}

impl Default for EvalState {
    fn default() -> Self {
        EvalState {
            mul_scale: 1,
            div_scale: 1,
            time_scale: 1.0,
            current_samples: 0,
            last_samples: 0,
            timestamp: None,
            last_timestamp: None,
        }
    }
}

/// Per-context bound expression node.
///
/// Structurally a clone of a static [`Expr`] with every name resolved, a
/// descriptor on every node, and evaluator scratch.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundExpr {
    /// Node kind and children
    pub kind: BoundKind,
    /// Metadata of the value this node produces
    pub desc: Descriptor,
    /// Evaluator must retain the previous sample of this node
    pub save_last: bool,
    /// Evaluator scratch
    pub state: EvalState,
}

impl BoundExpr {
    /// Whether this node is a numeric literal leaf.
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, BoundKind::Integer { .. } | BoundKind::Double { .. })
    }
}

/// Node kind of a bound expression.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundKind {
    /// Integer constant (text shared with the static tree)
    Integer {
        /// Literal text
        text: Arc<str>,
        /// Parsed value
        value: u32,
    },
    /// Floating constant (text shared with the static tree)
    Double {
        /// Literal text
        text: Arc<str>,
        /// Parsed value
        value: f64,
    },
    /// Resolved metric reference; the id lives in the node's descriptor
    Name {
        /// Metric name (shared with the static tree)
        name: Arc<str>,
    },
    /// Binary operator
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        left: Box<BoundExpr>,
        /// Right operand
        right: Box<BoundExpr>,
    },
    /// Unary operator
    Unary {
        /// Operator
        op: UnOp,
        /// Operand
        operand: Box<BoundExpr>,
    },
    /// Conditional
    Cond {
        /// Guard expression
        guard: Box<BoundExpr>,
        /// Value when the guard is non-zero
        then: Box<BoundExpr>,
        /// Value when the guard is zero
        other: Box<BoundExpr>,
    },
    /// Function application
    Call {
        /// Function
        func: Func,
        /// Argument
        arg: Box<BoundExpr>,
    },
}

/// Bind a static expression under one context.
///
/// Clones the tree, resolves every `Name` leaf through `source`, and runs
/// the semantic checks bottom-up. On failure the partial clone is dropped
/// and the error describes the first offending node.
pub fn bind(expr: &Expr, source: &dyn MetricSource) -> Result<BoundExpr, SemanticError> {
    let bound = match &expr.kind {
        ExprKind::Integer { text, value, units } => BoundExpr {
            kind: BoundKind::Integer {
                text: Arc::clone(text),
                value: *value,
            },
            desc: Descriptor::literal(ValueType::U32, *units),
            save_last: expr.save_last,
            state: EvalState::default(),
        },

        ExprKind::Double { text, value, units } => BoundExpr {
            kind: BoundKind::Double {
                text: Arc::clone(text),
                value: *value,
            },
            desc: Descriptor::literal(ValueType::F64, *units),
            save_last: expr.save_last,
            state: EvalState::default(),
        },

        ExprKind::Name(name) => {
            let unresolved = || SemanticError {
                kind: SemanticErrorKind::UnresolvedName,
                operand: name.to_string(),
            };
            let id = source.lookup_name(name).ok_or_else(unresolved)?;
            let mut desc = source.lookup_desc(id).ok_or_else(unresolved)?;
            desc.id = Some(id);
            BoundExpr {
                kind: BoundKind::Name {
                    name: Arc::clone(name),
                },
                desc,
                save_last: expr.save_last,
                state: EvalState::default(),
            }
        }

        ExprKind::Binary { op, left, right } => {
            let mut left = bind(left, source)?;
            let mut right = bind(right, source)?;
            let desc = check::map_desc_binary(*op, &mut left, &mut right)?;
            BoundExpr {
                kind: BoundKind::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                desc,
                save_last: expr.save_last,
                state: EvalState::default(),
            }
        }

        ExprKind::Unary { op, operand } => {
            let operand = bind(operand, source)?;
            let desc = check::map_desc_unary(*op, &operand)?;
            BoundExpr {
                kind: BoundKind::Unary {
                    op: *op,
                    operand: Box::new(operand),
                },
                desc,
                save_last: expr.save_last,
                state: EvalState::default(),
            }
        }

        ExprKind::Cond { guard, then, other } => {
            let guard = bind(guard, source)?;
            let then = bind(then, source)?;
            let other = bind(other, source)?;
            let desc = check::map_desc_cond(&guard, &then, &other)?;
            BoundExpr {
                kind: BoundKind::Cond {
                    guard: Box::new(guard),
                    then: Box::new(then),
                    other: Box::new(other),
                },
                desc,
                save_last: expr.save_last,
                state: EvalState::default(),
            }
        }

        ExprKind::Call { func, arg } => {
            let mut arg = bind(arg, source)?;
            if let Func::Anon(value_type) = func {
                // The synthesised anon child inherits the tagged type.
                arg.desc.value_type = *value_type;
            }
            let desc = check::map_desc_call(*func, &arg)?;

            let mut state = EvalState::default();
            if matches!(func, Func::Rate) && arg.desc.units.dim_time == 1 {
                state.time_scale = arg.desc.units.scale_time.seconds_per_unit();
            }

            BoundExpr {
                kind: BoundKind::Call {
                    func: *func,
                    arg: Box::new(arg),
                },
                desc,
                save_last: expr.save_last,
                state,
            }
        }
    };

    Ok(bound)
}
