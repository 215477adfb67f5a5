//! Static expression trees.
//!
//! The parser produces one [`Expr`] per registration. Static trees own
//! their literal text (as `Arc<str>`, so per-context bound clones can share
//! it) and carry no metric metadata; descriptors appear only on bound trees
//! after name resolution (see [`crate::resolve`]).
//!
//! `Display` pretty-prints an expression with minimal parentheses; parsing
//! the result reproduces the same tree.

use metra_types::{Units, ValueType};
use std::fmt;
use std::sync::Arc;

/// Byte range of a node in the registration's expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Byte offset of the first token of the node
    pub start: u32,
    /// Byte offset one past the node's last token
    pub end: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(start: u32, end: u32) -> Span {
        Span { start, end }
    }
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `!=`
    Ne,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinOp {
    /// `+ - * /`
    pub fn is_arith(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    /// `< <= == >= > !=`
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Le | BinOp::Eq | BinOp::Ge | BinOp::Gt | BinOp::Ne
        )
    }

    /// `&& ||`
    pub fn is_boolean(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    /// Source symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Ge => ">=",
            BinOp::Gt => ">",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// `-`
    Neg,
    /// `!`
    Not,
}

/// Expression function.
///
/// All functions take a single metric-name argument except `anon`, whose
/// argument is a value-type tag carried on the variant; its child is a
/// synthesised integer leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    /// Average over instances
    Avg,
    /// Number of instances
    Count,
    /// Difference since the previous sample
    Delta,
    /// Maximum over instances
    Max,
    /// Minimum over instances
    Min,
    /// Sum over instances
    Sum,
    /// Time rate of change since the previous sample
    Rate,
    /// Counter value taken at face value
    Instant,
    /// Anonymous metric of the tagged type
    Anon(ValueType),
}

impl Func {
    /// Source keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Func::Avg => "avg",
            Func::Count => "count",
            Func::Delta => "delta",
            Func::Max => "max",
            Func::Min => "min",
            Func::Sum => "sum",
            Func::Rate => "rate",
            Func::Instant => "instant",
            Func::Anon(_) => "anon",
        }
    }
}

/// Parse an `anon()` type tag.
pub fn anon_type_tag(tag: &str) -> Option<ValueType> {
    let vt = match tag {
        "PM_TYPE_32" => ValueType::I32,
        "PM_TYPE_U32" => ValueType::U32,
        "PM_TYPE_64" => ValueType::I64,
        "PM_TYPE_U64" => ValueType::U64,
        "PM_TYPE_FLOAT" => ValueType::F32,
        "PM_TYPE_DOUBLE" => ValueType::F64,
        _ => return None,
    };
    Some(vt)
}

/// Static expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Node kind and children
    pub kind: ExprKind,
    /// Source range
    pub span: Span,
    /// Evaluator must retain the previous sample of this node (set on the
    /// argument of every function)
    pub save_last: bool,
}

impl Expr {
    /// Create a node with `save_last` clear.
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr {
            kind,
            span,
            save_last: false,
        }
    }

    /// Whether this node is a numeric literal leaf.
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Integer { .. } | ExprKind::Double { .. })
    }
}

/// Node kind of a static expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Unsigned integer constant with optional units clause
    Integer {
        /// Literal text as written
        text: Arc<str>,
        /// Parsed value
        value: u32,
        /// Units clause (dimensionless if absent)
        units: Units,
    },
    /// Floating constant with optional units clause
    Double {
        /// Literal text as written
        text: Arc<str>,
        /// Parsed value
        value: f64,
        /// Units clause (dimensionless if absent)
        units: Units,
    },
    /// Metric name, resolved per context at bind time
    Name(Arc<str>),
    /// Binary operator
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary operator
    Unary {
        /// Operator
        op: UnOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Conditional `guard ? then : other`
    Cond {
        /// Guard expression
        guard: Box<Expr>,
        /// Value when the guard is non-zero
        then: Box<Expr>,
        /// Value when the guard is zero
        other: Box<Expr>,
    },
    /// Function application
    Call {
        /// Function
        func: Func,
        /// Argument (a `Name` leaf; for `anon`, a synthesised `Integer`)
        arg: Box<Expr>,
    },
}

/// Binding strength used for minimal parenthesisation.
fn prec(kind: &ExprKind) -> u8 {
    match kind {
        ExprKind::Cond { .. } => 1,
        ExprKind::Binary { op, .. } if op.is_boolean() => 2,
        ExprKind::Unary { op: UnOp::Not, .. } => 3,
        ExprKind::Binary { op, .. } if op.is_relational() => 4,
        ExprKind::Binary {
            op: BinOp::Add | BinOp::Sub,
            ..
        } => 5,
        ExprKind::Binary { .. } => 6,
        ExprKind::Unary { .. } => 7,
        _ => 8,
    }
}

fn fmt_child(f: &mut fmt::Formatter<'_>, child: &Expr, min: u8) -> fmt::Result {
    if prec(&child.kind) < min {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let my = prec(&self.kind);
        match &self.kind {
            ExprKind::Integer { text, units, .. } | ExprKind::Double { text, units, .. } => {
                write!(f, "{}", text)?;
                if !units.is_dimensionless() {
                    write!(f, " {}", units)?;
                }
                Ok(())
            }
            ExprKind::Name(name) => write!(f, "{}", name),
            ExprKind::Binary { op, left, right } => {
                fmt_child(f, left, my)?;
                write!(f, " {} ", op.symbol())?;
                // Left associativity: the right child needs parens at equal
                // precedence.
                fmt_child(f, right, my + 1)
            }
            ExprKind::Unary { op, operand } => match op {
                UnOp::Neg => {
                    write!(f, "-")?;
                    fmt_child(f, operand, my)
                }
                UnOp::Not => {
                    write!(f, "!")?;
                    fmt_child(f, operand, my + 1)
                }
            },
            ExprKind::Cond { guard, then, other } => {
                fmt_child(f, guard, my + 1)?;
                write!(f, " ? ")?;
                fmt_child(f, then, my + 1)?;
                write!(f, " : ")?;
                fmt_child(f, other, my)
            }
            ExprKind::Call { func, arg } => match func {
                Func::Anon(vt) => write!(f, "anon(PM_TYPE_{})", vt),
                _ => write!(f, "{}({})", func.keyword(), arg),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Expr {
        Expr::new(ExprKind::Name(Arc::from(s)), Span::default())
    }

    fn binary(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(l),
                right: Box::new(r),
            },
            Span::default(),
        )
    }

    #[test]
    fn test_display_precedence() {
        // (a + b) * c needs parens; a + b * c does not.
        let sum = binary(BinOp::Add, name("a"), name("b"));
        let prod = binary(BinOp::Mul, sum.clone(), name("c"));
        assert_eq!(prod.to_string(), "(a + b) * c");

        let prod2 = binary(BinOp::Mul, name("b"), name("c"));
        let sum2 = binary(BinOp::Add, name("a"), prod2);
        assert_eq!(sum2.to_string(), "a + b * c");
    }

    #[test]
    fn test_display_left_assoc() {
        // a - (b - c) keeps its parens, (a - b) - c loses them.
        let inner = binary(BinOp::Sub, name("b"), name("c"));
        let outer = binary(BinOp::Sub, name("a"), inner);
        assert_eq!(outer.to_string(), "a - (b - c)");

        let inner2 = binary(BinOp::Sub, name("a"), name("b"));
        let outer2 = binary(BinOp::Sub, inner2, name("c"));
        assert_eq!(outer2.to_string(), "a - b - c");
    }

    #[test]
    fn test_display_call_and_anon() {
        let call = Expr::new(
            ExprKind::Call {
                func: Func::Rate,
                arg: Box::new(name("disk.dev.total")),
            },
            Span::default(),
        );
        assert_eq!(call.to_string(), "rate(disk.dev.total)");

        let anon = Expr::new(
            ExprKind::Call {
                func: Func::Anon(ValueType::U64),
                arg: Box::new(Expr::new(
                    ExprKind::Integer {
                        text: Arc::from("0"),
                        value: 0,
                        units: Units::NONE,
                    },
                    Span::default(),
                )),
            },
            Span::default(),
        );
        assert_eq!(anon.to_string(), "anon(PM_TYPE_U64)");
    }

    #[test]
    fn test_anon_type_tags() {
        assert_eq!(anon_type_tag("PM_TYPE_U64"), Some(ValueType::U64));
        assert_eq!(anon_type_tag("PM_TYPE_32"), Some(ValueType::I32));
        assert_eq!(anon_type_tag("PM_TYPE_DOUBLE"), Some(ValueType::F64));
        assert_eq!(anon_type_tag("PM_TYPE_STRING"), None);
    }
}
