//! Expressions inside statements: grouping, nested calls, string operands
//! and user-defined operators.

use quill_sema::build;
use quill_sema::ty;
use quill_sema::{Atom, BlockEntry, Expression, Session};

fn push_call(sess: &mut Session, name: &str, args: Vec<Expression>) {
    let stmt = build::stmt(sess, name, args);
    sess.push_main(BlockEntry::Statement(stmt));
}

fn declare_int(sess: &mut Session, name: &str, value: &str) {
    let args = vec![build::infix(sess, name), build::infix(sess, value)];
    push_call(sess, "integer", args);
}

fn main_arg(sess: &Session, entry: usize, arg: usize) -> &Expression {
    match &sess.main().unwrap().entries()[entry] {
        BlockEntry::Statement(s) => &s.args[arg],
        other => panic!("expected a statement, got {:?}", other),
    }
}

fn operator_names(sess: &Session, e: &Expression) -> Vec<String> {
    e.atoms
        .iter()
        .filter_map(|a| match a {
            Atom::Operator(op) => Some(sess.text(op.name).to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn grouping_overrides_precedence() {
    let mut sess = Session::new();
    declare_int(&mut sess, "lo", "1");
    declare_int(&mut sess, "hi", "2");
    declare_int(&mut sess, "k", "3");

    let sum = build::infix(&mut sess, "lo + hi");
    let times = build::op(&mut sess, "*");
    let k = build::ident(&mut sess, "k");
    let grouped = build::expr(vec![build::paren(sum), times, k]);
    let target = build::infix(&mut sess, "scaled");
    push_call(&mut sess, "integer", vec![target, grouped]);

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    let e = main_arg(&sess, 3, 1);
    assert_eq!(e.ty(), Some(ty::INTEGER));
    assert!(matches!(e.atoms[0], Atom::Paren(_)));
    assert_eq!(operator_names(&sess, e), vec!["*"]);
    assert!(e.is_resolved());
}

#[test]
fn call_results_are_operands() {
    let mut sess = Session::new();
    let mut area = sess.new_function("area").unwrap();
    area.params.push(build::param(&mut sess, "side", "integer"));
    area.ret = Some(build::infix(&mut sess, "side * side"));
    sess.declare_function(area);

    let arg = build::infix(&mut sess, "4");
    let call = build::call(&mut sess, "area", vec![arg]);
    let plus = build::op(&mut sess, "+");
    let e = build::expr(vec![call, plus, build::int(1)]);
    let target = build::infix(&mut sess, "total");
    push_call(&mut sess, "integer", vec![target, e]);

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    let e = main_arg(&sess, 0, 1);
    assert_eq!(e.ty(), Some(ty::INTEGER));
    match &e.atoms[0] {
        Atom::Statement(stmt) => assert_eq!(stmt.resolved(), Some("area")),
        other => panic!("expected the call first, got {:?}", other),
    }
}

#[test]
fn strings_concatenate() {
    let mut sess = Session::new();
    let target = build::infix(&mut sess, "greeting");
    push_call(&mut sess, "string", vec![target, build::expr(vec![build::string("hello")])]);
    let greeting = build::ident(&mut sess, "greeting");
    let plus = build::op(&mut sess, "+");
    let joined = build::expr(vec![greeting, plus, build::string(", world")]);
    let target = build::infix(&mut sess, "line");
    push_call(&mut sess, "string", vec![target, joined]);

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    assert_eq!(main_arg(&sess, 1, 1).ty(), Some(ty::STRING));
}

#[test]
fn comparisons_feed_boolean_operators() {
    let mut sess = Session::new();
    declare_int(&mut sess, "low", "1");
    let target = build::infix(&mut sess, "ok");
    let test = build::infix(&mut sess, "low < 10 && ! false");
    push_call(&mut sess, "boolean", vec![target, test]);

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    let e = main_arg(&sess, 1, 1);
    assert_eq!(e.ty(), Some(ty::BOOLEAN));
    assert_eq!(operator_names(&sess, e), vec!["<", "!", "&&"]);
}

#[test]
fn user_operator_overload_applies_to_structures() {
    let mut sess = Session::new();
    let integer = build::ty(&mut sess, "integer");
    build::structure(&mut sess, "Vec2", &[("dx", integer.clone()), ("dy", integer)]).unwrap();

    let mut dot = sess.new_function("*").unwrap();
    dot.params.push(build::param(&mut sess, "u", "Vec2"));
    dot.params.push(build::param(&mut sess, "w", "Vec2"));
    dot.ret = Some(build::infix(&mut sess, "u.dx * w.dx + u.dy * w.dy"));
    sess.declare_function(dot);

    for (name, x, y) in [("left", "1", "2"), ("right", "3", "4")] {
        let args = vec![
            build::infix(&mut sess, name),
            build::infix(&mut sess, x),
            build::infix(&mut sess, y),
        ];
        push_call(&mut sess, "Vec2", args);
    }
    let product = build::infix(&mut sess, "left * right");
    let target = build::infix(&mut sess, "product");
    push_call(&mut sess, "integer", vec![target, product]);

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    let e = main_arg(&sess, 2, 1);
    assert_eq!(e.ty(), Some(ty::INTEGER));
    match &e.atoms[2] {
        Atom::Operator(op) => assert_eq!(op.resolved(), Some("*$6")),
        other => panic!("expected the operator last, got {:?}", other),
    }
}
