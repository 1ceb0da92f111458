use super::*;
use crate::value::Value;

#[test]
fn field_ref_builds_compare_nodes() {
    let pred = FieldRef::new("name").eq("Alice");

    assert_eq!(
        pred,
        Predicate::Compare(ComparePredicate::new(
            "name",
            CompareOp::Eq,
            Value::Text("Alice".into())
        ))
    );
}

#[test]
fn operators_compose_into_and_or_not() {
    let name = FieldRef::new("name");
    let age = FieldRef::new("age");

    let pred = (name.eq("Alice") & age.gt(30_i64)) | !age.is_null();

    let Predicate::Or(branches) = pred else {
        panic!("expected OR at the top");
    };
    assert!(matches!(branches[0], Predicate::And(ref inner) if inner.len() == 2));
    assert!(matches!(branches[1], Predicate::Not(_)));
}

#[test]
fn conjoin_flattens_successive_filters() {
    let first = FieldRef::new("a").eq(1_i64);
    let second = FieldRef::new("b").eq(2_i64);
    let third = FieldRef::new("c").eq(3_i64);

    let combined = Predicate::conjoin(Some(Predicate::conjoin(Some(first), second)), third);

    let Predicate::And(preds) = combined else {
        panic!("expected AND");
    };
    assert_eq!(preds.len(), 3);
}

#[test]
fn fields_lists_every_path_in_order() {
    let pred = FieldRef::new("name").eq("x") & FieldRef::new("manager.name").is_not_null();

    assert_eq!(pred.fields(), ["name", "manager.name"]);
}

#[test]
fn variables_and_raw_fragments_keep_their_operand_kind() {
    let Predicate::Compare(var) = FieldRef::new("name").eq_var("who") else {
        panic!("expected compare");
    };
    assert_eq!(var.operand, Operand::Variable("who".into()));

    let Predicate::Compare(raw) = FieldRef::new("age").compare_raw(CompareOp::Gt, "18") else {
        panic!("expected compare");
    };
    assert_eq!(raw.operand, Operand::Raw("18".into()));
}

#[test]
fn compare_op_tags_are_stable() {
    assert_eq!(CompareOp::Eq.tag(), 0x01);
    assert_eq!(CompareOp::EndsWith.tag(), 0x0b);
    assert!(CompareOp::StartsWith.is_pattern());
    assert!(CompareOp::NotIn.is_membership());
}
