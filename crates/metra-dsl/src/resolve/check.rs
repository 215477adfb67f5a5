//! Semantic checks: operator legality, type promotion, unit reconciliation.
//!
//! Runs bottom-up over a bound tree. [`map_desc_binary`] validates a binary
//! node against its operands' semantics, types, dimensions and instance
//! domains, then calls [`map_units`] to reconcile mismatched scales: the
//! operand at the smaller scale is rescaled up by accumulating an integer
//! factor into its [`EvalState`](super::EvalState), and any rescale forces
//! the node's result type to `F64` (the evaluator does the scaled
//! arithmetic in doubles).

use super::{BoundExpr, SemanticError, SemanticErrorKind, Side};
use crate::ast::{BinOp, Func, UnOp};
use metra_types::{
    count_factor, promote, Descriptor, Semantics, TimeScale, Units, ValueType,
};

/// Compute the descriptor of a binary node, rescaling operands as needed.
pub(crate) fn map_desc_binary(
    op: BinOp,
    left: &mut BoundExpr,
    right: &mut BoundExpr,
) -> Result<Descriptor, SemanticError> {
    let left_counter = left.desc.semantics.is_counter();
    let right_counter = right.desc.semantics.is_counter();

    // Operator legality against counter semantics. Relational and boolean
    // operators are always legal here.
    if op.is_arith() {
        match (left_counter, right_counter) {
            (true, true) if !matches!(op, BinOp::Add | BinOp::Sub) => {
                return Err(SemanticError::new(SemanticErrorKind::CounterOperator, left));
            }
            (true, false) if !matches!(op, BinOp::Mul | BinOp::Div) => {
                return Err(SemanticError::new(
                    SemanticErrorKind::MixedCounterOperator,
                    left,
                ));
            }
            (false, true) if !matches!(op, BinOp::Mul) => {
                return Err(SemanticError::new(
                    SemanticErrorKind::MixedCounterOperator,
                    right,
                ));
            }
            _ => {}
        }
    }

    // The candidate operand contributes the fields no rule overrides:
    // prefer a non-literal operand, else the right one.
    let candidate_is_left = !left.is_literal();

    let semantics = if !left_counter && !right_counter {
        if left.desc.semantics == Semantics::Discrete
            && right.desc.semantics == Semantics::Discrete
        {
            Semantics::Discrete
        } else {
            Semantics::Instant
        }
    } else if candidate_is_left {
        left.desc.semantics
    } else {
        right.desc.semantics
    };

    if !left.desc.value_type.is_numeric() {
        return Err(SemanticError::new(
            SemanticErrorKind::NonArithmetic(Side::Left),
            left,
        ));
    }
    if !right.desc.value_type.is_numeric() {
        return Err(SemanticError::new(
            SemanticErrorKind::NonArithmetic(Side::Right),
            right,
        ));
    }

    let mut value_type = if matches!(op, BinOp::Div) {
        ValueType::F64
    } else if op.is_relational() || op.is_boolean() {
        ValueType::U32
    } else {
        promote(left.desc.value_type, right.desc.value_type)
    };

    // Addition, subtraction and comparison need equal dimensions, except
    // that a numeric literal adapts to the other operand.
    if matches!(op, BinOp::Add | BinOp::Sub) || op.is_relational() {
        let literal_involved = left.is_literal() || right.is_literal();
        if !literal_involved && !left.desc.units.same_dimensions(&right.desc.units) {
            return Err(SemanticError::new(
                SemanticErrorKind::DimensionMismatch,
                left,
            ));
        }
    }

    // Boolean operands must be dimensionless.
    if op.is_boolean()
        && (!left.desc.units.is_dimensionless() || !right.desc.units.is_dimensionless())
    {
        return Err(SemanticError::new(
            SemanticErrorKind::DimensionMismatch,
            left,
        ));
    }

    // Scaling a counter: the non-counter factor must be dimensionless.
    if matches!(op, BinOp::Mul | BinOp::Div) || op.is_relational() {
        if left_counter && !right_counter && !right.desc.units.is_dimensionless() {
            return Err(SemanticError::new(
                SemanticErrorKind::NotDimensionless(Side::Right),
                right,
            ));
        }
        if !left_counter && right_counter && !left.desc.units.is_dimensionless() {
            return Err(SemanticError::new(
                SemanticErrorKind::NotDimensionless(Side::Left),
                left,
            ));
        }
    }

    map_units(left, right, &mut value_type);

    let units = match op {
        BinOp::Mul => left.desc.units.multiply(&right.desc.units),
        BinOp::Div => left.desc.units.divide(&right.desc.units),
        _ if candidate_is_left => left.desc.units,
        _ => right.desc.units,
    };

    let indom = match (left.desc.indom, right.desc.indom) {
        (Some(l), Some(r)) if l != r => {
            return Err(SemanticError::new(
                SemanticErrorKind::InstanceDomainMismatch,
                left,
            ));
        }
        (Some(l), _) => Some(l),
        (None, r) => r,
    };

    Ok(Descriptor {
        id: None,
        value_type,
        indom,
        semantics,
        units,
    })
}

/// Reconcile operand scales dimension by dimension.
///
/// Where both operands carry a dimension at different scales, the operand
/// at the smaller scale is brought up to the larger one by accumulating
/// the step factor into its scratch: `mul_scale` when the dimension sits
/// in a denominator (exponent < 0), `div_scale` when in a numerator. One
/// pass reaches the fixed point; any rescale forces `F64`.
pub(crate) fn map_units(left: &mut BoundExpr, right: &mut BoundExpr, value_type: &mut ValueType) {
    let mut rescaled = false;

    // Space
    if left.desc.units.dim_space != 0
        && right.desc.units.dim_space != 0
        && left.desc.units.scale_space != right.desc.units.scale_space
    {
        let (small, target) = if left.desc.units.scale_space < right.desc.units.scale_space {
            (&mut *left, right.desc.units.scale_space)
        } else {
            (&mut *right, left.desc.units.scale_space)
        };
        let factor = small.desc.units.scale_space.factor_to(target);
        if small.desc.units.dim_space < 0 {
            small.state.mul_scale *= factor;
        } else {
            small.state.div_scale *= factor;
        }
        small.desc.units.scale_space = target;
        rescaled = true;
    }

    // Time
    if left.desc.units.dim_time != 0
        && right.desc.units.dim_time != 0
        && left.desc.units.scale_time != right.desc.units.scale_time
    {
        let (small, target) = if left.desc.units.scale_time < right.desc.units.scale_time {
            (&mut *left, right.desc.units.scale_time)
        } else {
            (&mut *right, left.desc.units.scale_time)
        };
        let factor = small.desc.units.scale_time.factor_to(target);
        if small.desc.units.dim_time < 0 {
            small.state.mul_scale *= factor;
        } else {
            small.state.div_scale *= factor;
        }
        small.desc.units.scale_time = target;
        rescaled = true;
    }

    // Count
    if left.desc.units.dim_count != 0
        && right.desc.units.dim_count != 0
        && left.desc.units.scale_count != right.desc.units.scale_count
    {
        let (small, target) = if left.desc.units.scale_count < right.desc.units.scale_count {
            (&mut *left, right.desc.units.scale_count)
        } else {
            (&mut *right, left.desc.units.scale_count)
        };
        let factor = count_factor(small.desc.units.scale_count, target);
        if small.desc.units.dim_count < 0 {
            small.state.mul_scale *= factor;
        } else {
            small.state.div_scale *= factor;
        }
        small.desc.units.scale_count = target;
        rescaled = true;
    }

    if rescaled {
        *value_type = ValueType::F64;
    }
}

/// Compute the descriptor of a ternary node.
///
/// The two branches must agree exactly (type, units with scales, semantics,
/// non-null instance domains); the guard must be numeric and may only be
/// multi-valued when a branch is.
pub(crate) fn map_desc_cond(
    guard: &BoundExpr,
    then: &BoundExpr,
    other: &BoundExpr,
) -> Result<Descriptor, SemanticError> {
    if !guard.desc.value_type.is_numeric() {
        return Err(SemanticError::new(
            SemanticErrorKind::TernaryGuardType,
            guard,
        ));
    }
    if guard.desc.indom.is_some() && then.desc.indom.is_none() && other.desc.indom.is_none() {
        return Err(SemanticError::new(
            SemanticErrorKind::TernaryGuardIndom,
            guard,
        ));
    }

    if then.desc.value_type != other.desc.value_type {
        return Err(SemanticError::new(
            SemanticErrorKind::TernaryTypeMismatch,
            then,
        ));
    }

    let (tu, ou) = (&then.desc.units, &other.desc.units);
    for (dim, mismatch) in [
        ("space", tu.dim_space != ou.dim_space || tu.scale_space != ou.scale_space),
        ("time", tu.dim_time != ou.dim_time || tu.scale_time != ou.scale_time),
        ("count", tu.dim_count != ou.dim_count || tu.scale_count != ou.scale_count),
    ] {
        if mismatch {
            return Err(SemanticError::new(
                SemanticErrorKind::TernaryUnitsMismatch(dim),
                then,
            ));
        }
    }

    if then.desc.semantics != other.desc.semantics {
        return Err(SemanticError::new(
            SemanticErrorKind::TernarySemanticsMismatch,
            then,
        ));
    }

    let indom = match (then.desc.indom, other.desc.indom) {
        (Some(t), Some(o)) if t != o => {
            return Err(SemanticError::new(
                SemanticErrorKind::TernaryInstanceDomainMismatch,
                then,
            ));
        }
        (Some(t), _) => Some(t),
        (None, o) => o,
    };

    Ok(Descriptor {
        id: None,
        indom,
        ..then.desc
    })
}

/// Compute the descriptor of a unary node.
///
/// Negating an unsigned type yields the signed type of the same width;
/// `!` always yields `U32`.
pub(crate) fn map_desc_unary(op: UnOp, operand: &BoundExpr) -> Result<Descriptor, SemanticError> {
    let what = match op {
        UnOp::Neg => "unary negation",
        UnOp::Not => "unary not",
    };
    if !operand.desc.value_type.is_numeric() {
        return Err(SemanticError::new(
            SemanticErrorKind::NonArithmeticOperand(what),
            operand,
        ));
    }

    let value_type = match op {
        UnOp::Neg => match operand.desc.value_type {
            ValueType::U32 => ValueType::I32,
            ValueType::U64 => ValueType::I64,
            other => other,
        },
        UnOp::Not => ValueType::U32,
    };

    Ok(Descriptor {
        id: None,
        value_type,
        ..operand.desc
    })
}

/// Compute the descriptor of a function node.
pub(crate) fn map_desc_call(func: Func, arg: &BoundExpr) -> Result<Descriptor, SemanticError> {
    let desc = match func {
        // Instance count: fixed metadata regardless of the operand.
        Func::Count => Descriptor {
            id: None,
            value_type: ValueType::U32,
            indom: None,
            semantics: Semantics::Instant,
            units: Units::count(0),
        },

        // Take a counter at face value.
        Func::Instant => {
            let mut desc = arg.desc;
            desc.id = None;
            if desc.semantics == Semantics::Counter {
                desc.semantics = Semantics::Instant;
            }
            desc
        }

        Func::Avg | Func::Sum | Func::Min | Func::Max => {
            if !arg.desc.value_type.is_numeric() {
                return Err(SemanticError::new(
                    SemanticErrorKind::NonArithmeticOperand(func.keyword()),
                    arg,
                ));
            }
            let mut desc = arg.desc;
            desc.id = None;
            desc.semantics = Semantics::Instant;
            desc.indom = None;
            if matches!(func, Func::Avg) {
                desc.value_type = ValueType::F32;
            }
            desc
        }

        Func::Rate => {
            if !arg.desc.value_type.is_numeric() {
                return Err(SemanticError::new(
                    SemanticErrorKind::NonArithmeticOperand("rate"),
                    arg,
                ));
            }
            if !matches!(arg.desc.units.dim_time, 0 | 1) {
                return Err(SemanticError::new(SemanticErrorKind::TimeDimension, arg));
            }
            let mut desc = arg.desc;
            desc.id = None;
            desc.value_type = ValueType::F64;
            desc.semantics = Semantics::Instant;
            desc.units.dim_time -= 1;
            desc.units.scale_time = if desc.units.dim_time == 0 {
                TimeScale::default()
            } else {
                TimeScale::Sec
            };
            desc
        }

        Func::Delta => {
            if !arg.desc.value_type.is_numeric() {
                return Err(SemanticError::new(
                    SemanticErrorKind::NonArithmeticOperand("delta"),
                    arg,
                ));
            }
            let mut desc = arg.desc;
            desc.id = None;
            desc.semantics = Semantics::Instant;
            desc
        }

        // The synthesised child already carries the tagged type.
        Func::Anon(_) => Descriptor {
            id: None,
            ..arg.desc
        },
    };

    Ok(desc)
}
