use super::*;
use crate::parser;
use metra_types::{InstanceDomain, Semantics, SpaceScale, TimeScale, Units};
use std::collections::HashMap;

/// Host oracle backed by a plain map.
struct FakeSource {
    metrics: HashMap<String, Descriptor>,
}

impl FakeSource {
    fn new() -> FakeSource {
        FakeSource {
            metrics: HashMap::new(),
        }
    }

    fn add(&mut self, name: &str, desc: Descriptor) -> &mut Self {
        let id = MetricId::from_parts(false, 60, 0, (self.metrics.len() + 1) as u16);
        self.metrics.insert(
            name.to_string(),
            Descriptor {
                id: Some(id),
                ..desc
            },
        );
        self
    }
}

impl MetricSource for FakeSource {
    fn lookup_name(&self, name: &str) -> Option<MetricId> {
        self.metrics.get(name).and_then(|d| d.id)
    }

    fn lookup_desc(&self, id: MetricId) -> Option<Descriptor> {
        self.metrics.values().find(|d| d.id == Some(id)).copied()
    }
}

fn counter(value_type: ValueType, units: Units, indom: Option<u32>) -> Descriptor {
    Descriptor {
        id: None,
        value_type,
        indom: indom.map(InstanceDomain),
        semantics: Semantics::Counter,
        units,
    }
}

fn instant(value_type: ValueType, units: Units, indom: Option<u32>) -> Descriptor {
    Descriptor {
        id: None,
        value_type,
        indom: indom.map(InstanceDomain),
        semantics: Semantics::Instant,
        units,
    }
}

fn bind_expr(source: &FakeSource, text: &str) -> Result<BoundExpr, SemanticError> {
    let expr = parser::parse(text).expect("expression must parse");
    bind(&expr, source)
}

fn bind_ok(source: &FakeSource, text: &str) -> BoundExpr {
    match bind_expr(source, text) {
        Ok(b) => b,
        Err(e) => panic!("bind({:?}) failed: {}", text, e),
    }
}

fn bind_err(source: &FakeSource, text: &str) -> SemanticError {
    match bind_expr(source, text) {
        Ok(_) => panic!("bind({:?}) unexpectedly succeeded", text),
        Err(e) => e,
    }
}

fn msec() -> Units {
    Units::time(TimeScale::Msec)
}

#[test]
fn test_counter_addition() {
    let mut s = FakeSource::new();
    s.add("kernel.all.cpu.user", counter(ValueType::U64, msec(), Some(2)))
        .add("kernel.all.cpu.sys", counter(ValueType::U64, msec(), Some(2)));

    let b = bind_ok(&s, "kernel.all.cpu.user + kernel.all.cpu.sys");
    assert_eq!(b.desc.value_type, ValueType::U64);
    assert_eq!(b.desc.semantics, Semantics::Counter);
    assert_eq!(b.desc.units, msec());
    assert_eq!(b.desc.indom, Some(InstanceDomain(2)));
}

#[test]
fn test_counter_product_rejected() {
    let mut s = FakeSource::new();
    s.add("a", counter(ValueType::U64, Units::NONE, None))
        .add("b", counter(ValueType::U64, Units::NONE, None));

    let e = bind_err(&s, "a * b");
    assert_eq!(e.kind, SemanticErrorKind::CounterOperator);
    assert_eq!(e.to_string(), "a: Illegal operator for counters");
}

#[test]
fn test_counter_mixed_addition_rejected() {
    let mut s = FakeSource::new();
    s.add("ctr", counter(ValueType::U64, Units::NONE, None))
        .add("val", instant(ValueType::U32, Units::NONE, None));

    let e = bind_err(&s, "ctr + val");
    assert_eq!(e.kind, SemanticErrorKind::MixedCounterOperator);

    // Dividing a non-counter by a counter is also out.
    let e = bind_err(&s, "val / ctr");
    assert_eq!(e.kind, SemanticErrorKind::MixedCounterOperator);

    // Scaling a counter by a non-counter is fine.
    let b = bind_ok(&s, "ctr * val");
    assert_eq!(b.desc.semantics, Semantics::Counter);
}

#[test]
fn test_counter_scaled_by_dimensioned_operand() {
    let mut s = FakeSource::new();
    s.add("ctr", counter(ValueType::U64, Units::NONE, None))
        .add("busy", instant(ValueType::F64, msec(), None));

    let e = bind_err(&s, "ctr * busy");
    assert_eq!(e.kind, SemanticErrorKind::NotDimensionless(Side::Right));
    assert_eq!(
        e.to_string(),
        "busy: Non-counter and not dimensionless for right operand"
    );

    let e = bind_err(&s, "busy * ctr");
    assert_eq!(e.kind, SemanticErrorKind::NotDimensionless(Side::Left));
}

#[test]
fn test_division_always_f64() {
    let mut s = FakeSource::new();
    s.add("a", instant(ValueType::U32, Units::NONE, None))
        .add("b", instant(ValueType::U32, Units::NONE, None));

    let b = bind_ok(&s, "a / b");
    assert_eq!(b.desc.value_type, ValueType::F64);
}

#[test]
fn test_relational_and_boolean_u32() {
    let mut s = FakeSource::new();
    s.add("a", instant(ValueType::F64, Units::NONE, None))
        .add("b", instant(ValueType::F64, Units::NONE, None));

    for text in ["a < b", "a == b", "a != b", "a >= b", "a && b", "a || b"] {
        let b = bind_ok(&s, text);
        assert_eq!(b.desc.value_type, ValueType::U32, "{}", text);
    }
}

#[test]
fn test_boolean_requires_dimensionless() {
    let mut s = FakeSource::new();
    s.add("busy", instant(ValueType::F64, msec(), None))
        .add("flag", instant(ValueType::U32, Units::NONE, None));

    let e = bind_err(&s, "busy && flag");
    assert_eq!(e.kind, SemanticErrorKind::DimensionMismatch);
}

#[test]
fn test_addition_dimension_mismatch() {
    let mut s = FakeSource::new();
    s.add("busy", instant(ValueType::F64, msec(), None))
        .add("mem", instant(ValueType::F64, Units::space(SpaceScale::Byte), None));

    let e = bind_err(&s, "busy + mem");
    assert_eq!(e.kind, SemanticErrorKind::DimensionMismatch);
    assert_eq!(e.to_string(), "busy: Dimensions are not the same");
}

#[test]
fn test_literal_adapts_in_addition() {
    let s = FakeSource::new();

    // A dimensionless literal against a dimensioned literal is accepted;
    // the result inherits the right operand's units and stays integral
    // because no rescale was needed.
    let b = bind_ok(&s, "1 + 2 sec");
    assert_eq!(b.desc.value_type, ValueType::U32);
    assert_eq!(b.desc.units.dim_time, 1);
    assert_eq!(b.desc.units.scale_time, TimeScale::Sec);
    assert_eq!(b.desc.semantics, Semantics::Discrete);
}

#[test]
fn test_scale_reconciliation() {
    let mut s = FakeSource::new();
    s.add("cached", instant(ValueType::U64, Units::space(SpaceScale::KByte), None))
        .add("free", instant(ValueType::U64, Units::space(SpaceScale::Byte), None));

    let b = bind_ok(&s, "cached + free");
    // The byte-scaled operand was divided up to kbytes; result is forced
    // to double.
    assert_eq!(b.desc.value_type, ValueType::F64);
    assert_eq!(b.desc.units.scale_space, SpaceScale::KByte);

    match &b.kind {
        BoundKind::Binary { left, right, .. } => {
            assert_eq!(left.state.div_scale, 1);
            assert_eq!(right.state.div_scale, 1024);
            assert_eq!(right.state.mul_scale, 1);
            // Fixed point: both operands now agree.
            assert_eq!(left.desc.units.scale_space, SpaceScale::KByte);
            assert_eq!(right.desc.units.scale_space, SpaceScale::KByte);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_scale_reconciliation_denominator() {
    let mut s = FakeSource::new();
    s.add(
        "slow",
        instant(ValueType::F64, Units::NONE.divide(&Units::time(TimeScale::Sec)), None),
    )
    .add(
        "fast",
        instant(ValueType::F64, Units::NONE.divide(&Units::time(TimeScale::Msec)), None),
    );

    let b = bind_ok(&s, "slow + fast");
    match &b.kind {
        BoundKind::Binary { right, .. } => {
            // Denominator dimension rescales through mul_scale.
            assert_eq!(right.state.mul_scale, 1000);
            assert_eq!(right.state.div_scale, 1);
            assert_eq!(right.desc.units.scale_time, TimeScale::Sec);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_map_units_fixed_point() {
    let mut s = FakeSource::new();
    s.add("a", instant(ValueType::U64, Units::space(SpaceScale::KByte), None))
        .add("b", instant(ValueType::U64, Units::space(SpaceScale::Byte), None));

    let b = bind_ok(&s, "a + b");
    let (mut left, mut right) = match b.kind {
        BoundKind::Binary { left, right, .. } => (*left, *right),
        other => panic!("unexpected {:?}", other),
    };

    // A second pass over already reconciled operands changes nothing.
    let before = (left.clone(), right.clone());
    let mut vt = ValueType::U64;
    check::map_units(&mut left, &mut right, &mut vt);
    assert_eq!(vt, ValueType::U64);
    assert_eq!(before.0, left);
    assert_eq!(before.1, right);
}

#[test]
fn test_multiplication_dimensions_add() {
    let mut s = FakeSource::new();
    s.add("tput", instant(ValueType::F64, Units::space(SpaceScale::Byte), None))
        .add(
            "per_sec",
            instant(ValueType::F64, Units::NONE.divide(&Units::time(TimeScale::Sec)), None),
        );

    let b = bind_ok(&s, "tput * per_sec");
    assert_eq!(b.desc.units.dim_space, 1);
    assert_eq!(b.desc.units.dim_time, -1);
    // Time scale inherited from the right operand.
    assert_eq!(b.desc.units.scale_time, TimeScale::Sec);

    let b = bind_ok(&s, "tput / tput");
    assert!(b.desc.units.is_dimensionless());
}

#[test]
fn test_indom_rules() {
    let mut s = FakeSource::new();
    s.add("per_disk", instant(ValueType::U64, Units::NONE, Some(1)))
        .add("per_cpu", instant(ValueType::U64, Units::NONE, Some(2)))
        .add("scalar", instant(ValueType::U64, Units::NONE, None));

    let e = bind_err(&s, "per_disk + per_cpu");
    assert_eq!(e.kind, SemanticErrorKind::InstanceDomainMismatch);

    let b = bind_ok(&s, "per_disk + scalar");
    assert_eq!(b.desc.indom, Some(InstanceDomain(1)));

    let b = bind_ok(&s, "scalar + per_cpu");
    assert_eq!(b.desc.indom, Some(InstanceDomain(2)));
}

#[test]
fn test_ternary_rules() {
    let mut s = FakeSource::new();
    s.add("guard", instant(ValueType::U32, Units::NONE, None))
        .add("b", instant(ValueType::U64, Units::NONE, Some(1)))
        .add("c", instant(ValueType::U64, Units::NONE, Some(2)))
        .add("c_same", instant(ValueType::U64, Units::NONE, Some(1)))
        .add("wide", instant(ValueType::F64, Units::NONE, Some(1)))
        .add("ctr", counter(ValueType::U64, Units::NONE, Some(1)))
        .add("timed", instant(ValueType::U64, msec(), Some(1)));

    let e = bind_err(&s, "guard > 0 ? b : c");
    assert_eq!(e.kind, SemanticErrorKind::TernaryInstanceDomainMismatch);

    let e = bind_err(&s, "guard > 0 ? b : wide");
    assert_eq!(e.kind, SemanticErrorKind::TernaryTypeMismatch);

    let e = bind_err(&s, "guard > 0 ? b : ctr");
    assert_eq!(e.kind, SemanticErrorKind::TernarySemanticsMismatch);

    let e = bind_err(&s, "guard > 0 ? b : timed");
    assert_eq!(e.kind, SemanticErrorKind::TernaryUnitsMismatch("time"));
    assert_eq!(
        e.to_string(),
        "b: Different units or scale (time) for ternary operands"
    );

    let b = bind_ok(&s, "guard > 0 ? b : c_same");
    assert_eq!(b.desc.value_type, ValueType::U64);
    assert_eq!(b.desc.indom, Some(InstanceDomain(1)));
}

#[test]
fn test_ternary_guard_rules() {
    let mut s = FakeSource::new();
    s.add("per_disk", instant(ValueType::U32, Units::NONE, Some(1)))
        .add("x", instant(ValueType::U32, Units::NONE, None))
        .add("y", instant(ValueType::U32, Units::NONE, None));

    // Multi-valued guard over scalar branches is rejected.
    let e = bind_err(&s, "per_disk ? x : y");
    assert_eq!(e.kind, SemanticErrorKind::TernaryGuardIndom);

    // Scalar guard over multi-valued branches is fine the other way round.
    let mut s2 = FakeSource::new();
    s2.add("flag", instant(ValueType::U32, Units::NONE, None))
        .add("m1", instant(ValueType::U32, Units::NONE, Some(3)))
        .add("m2", instant(ValueType::U32, Units::NONE, Some(3)));
    let b = bind_ok(&s2, "flag ? m1 : m2");
    assert_eq!(b.desc.indom, Some(InstanceDomain(3)));
}

#[test]
fn test_unary_negation_types() {
    let mut s = FakeSource::new();
    s.add("u32", instant(ValueType::U32, Units::NONE, None))
        .add("u64", instant(ValueType::U64, Units::NONE, None))
        .add("f32", instant(ValueType::F32, Units::NONE, None));

    assert_eq!(bind_ok(&s, "-u32").desc.value_type, ValueType::I32);
    assert_eq!(bind_ok(&s, "-u64").desc.value_type, ValueType::I64);
    assert_eq!(bind_ok(&s, "-f32").desc.value_type, ValueType::F32);
    assert_eq!(bind_ok(&s, "!u32").desc.value_type, ValueType::U32);
}

#[test]
fn test_non_arithmetic_operands() {
    let mut s = FakeSource::new();
    s.add("text", instant(ValueType::String, Units::NONE, None))
        .add("num", instant(ValueType::U32, Units::NONE, None));

    let e = bind_err(&s, "text + num");
    assert_eq!(e.kind, SemanticErrorKind::NonArithmetic(Side::Left));
    assert_eq!(e.to_string(), "text: Non-arithmetic type for left operand");

    let e = bind_err(&s, "num + text");
    assert_eq!(e.kind, SemanticErrorKind::NonArithmetic(Side::Right));

    let e = bind_err(&s, "-text");
    assert_eq!(
        e.kind,
        SemanticErrorKind::NonArithmeticOperand("unary negation")
    );

    let e = bind_err(&s, "sum(text)");
    assert_eq!(e.kind, SemanticErrorKind::NonArithmeticOperand("sum"));
}

#[test]
fn test_count_function() {
    let mut s = FakeSource::new();
    s.add("per_disk", instant(ValueType::String, Units::NONE, Some(1)));

    // count() never looks at the operand type.
    let b = bind_ok(&s, "count(per_disk)");
    assert_eq!(b.desc.value_type, ValueType::U32);
    assert_eq!(b.desc.semantics, Semantics::Instant);
    assert_eq!(b.desc.indom, None);
    assert_eq!(b.desc.units, Units::count(0));
}

#[test]
fn test_aggregate_functions() {
    let mut s = FakeSource::new();
    s.add("per_disk", instant(ValueType::U64, msec(), Some(1)));

    let b = bind_ok(&s, "avg(per_disk)");
    assert_eq!(b.desc.value_type, ValueType::F32);
    assert_eq!(b.desc.indom, None);
    assert_eq!(b.desc.units, msec());

    let b = bind_ok(&s, "sum(per_disk)");
    assert_eq!(b.desc.value_type, ValueType::U64);
    assert_eq!(b.desc.indom, None);
    assert_eq!(b.desc.semantics, Semantics::Instant);
}

#[test]
fn test_rate_descriptor() {
    let mut s = FakeSource::new();
    s.add(
        "disk.dev.total_bytes",
        counter(ValueType::U64, Units::space(SpaceScale::Byte), Some(1)),
    )
    .add("busy_time", counter(ValueType::U64, msec(), None))
    .add("area", instant(ValueType::U64, Units { dim_time: 2, ..Units::NONE }, None));

    let b = bind_ok(&s, "rate(disk.dev.total_bytes)");
    assert_eq!(b.desc.value_type, ValueType::F64);
    assert_eq!(b.desc.semantics, Semantics::Instant);
    assert_eq!(b.desc.indom, Some(InstanceDomain(1)));
    assert_eq!(b.desc.units.dim_space, 1);
    assert_eq!(b.desc.units.dim_time, -1);
    assert_eq!(b.desc.units.scale_time, TimeScale::Sec);

    // Time-dimensioned operand drops back to dimensionless time.
    let b = bind_ok(&s, "rate(busy_time)");
    assert_eq!(b.desc.units.dim_time, 0);
    assert_eq!(b.desc.units.scale_time, TimeScale::Nsec);
    // time_scale converts operand msec into seconds for the evaluator.
    assert_eq!(b.state.time_scale, 1e-3);

    let e = bind_err(&s, "rate(area)");
    assert_eq!(e.kind, SemanticErrorKind::TimeDimension);
    assert_eq!(e.to_string(), "area: Incorrect time dimension for operand");
}

#[test]
fn test_delta_and_instant() {
    let mut s = FakeSource::new();
    s.add("ctr", counter(ValueType::U64, msec(), Some(1)));

    let b = bind_ok(&s, "delta(ctr)");
    assert_eq!(b.desc.semantics, Semantics::Instant);
    assert_eq!(b.desc.value_type, ValueType::U64);
    assert_eq!(b.desc.units, msec());
    assert_eq!(b.desc.indom, Some(InstanceDomain(1)));

    let b = bind_ok(&s, "instant(ctr)");
    assert_eq!(b.desc.semantics, Semantics::Instant);
    assert_eq!(b.desc.value_type, ValueType::U64);
}

#[test]
fn test_anon_descriptor() {
    let s = FakeSource::new();

    let b = bind_ok(&s, "anon(PM_TYPE_U64)");
    assert_eq!(b.desc.value_type, ValueType::U64);
    assert_eq!(b.desc.indom, None);
    assert_eq!(b.desc.id, None);
    match &b.kind {
        BoundKind::Call { arg, .. } => {
            assert_eq!(arg.desc.value_type, ValueType::U64);
            assert!(arg.save_last);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unresolved_name() {
    let s = FakeSource::new();
    let e = bind_err(&s, "no.such.metric + 1");
    assert_eq!(e.kind, SemanticErrorKind::UnresolvedName);
    assert_eq!(e.operand, "no.such.metric");
}

#[test]
fn test_binder_idempotent() {
    let mut s = FakeSource::new();
    s.add("a", counter(ValueType::U64, Units::space(SpaceScale::KByte), Some(1)))
        .add("b", counter(ValueType::U64, Units::space(SpaceScale::Byte), Some(1)));

    let expr = parser::parse("a + b").unwrap();
    let first = bind(&expr, &s).unwrap();
    drop(first.clone());
    let again = bind(&expr, &s).unwrap();
    assert_eq!(first, again);
}

#[test]
fn test_save_last_survives_binding() {
    let mut s = FakeSource::new();
    s.add("m", counter(ValueType::U64, Units::NONE, Some(1)));

    let b = bind_ok(&s, "rate(m)");
    match &b.kind {
        BoundKind::Call { arg, .. } => assert!(arg.save_last),
        other => panic!("unexpected {:?}", other),
    }
}
