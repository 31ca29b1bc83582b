//! Structures: synthesized constructors and accessors, member access and
//! assignment through accessor chains.

use quill_sema::assignment::Assignment;
use quill_sema::build;
use quill_sema::expr::Atom;
use quill_sema::function::{FunctionTag, ParamKind};
use quill_sema::ty;
use quill_sema::{BlockEntry, SemanticErrorKind, Session, Statement, ROOT};

// ── Helpers ────────────────────────────────────────────────────────────

fn point(sess: &mut Session) -> quill_sema::TypeId {
    let integer = build::ty(sess, "integer");
    build::structure(sess, "Point", &[("x", integer.clone()), ("y", integer)]).unwrap()
}

fn main_statement(sess: &Session, index: usize) -> &Statement {
    match &sess.main().unwrap().entries()[index] {
        BlockEntry::Statement(s) => s,
        other => panic!("expected a statement, got {:?}", other),
    }
}

fn push_call(sess: &mut Session, name: &str, args: &[&str]) {
    let args = args.iter().map(|a| build::infix(sess, a)).collect();
    let stmt = build::stmt(sess, name, args);
    sess.push_main(BlockEntry::Statement(stmt));
}

// ── Synthesis ──────────────────────────────────────────────────────────

#[test]
fn point_gets_constructors_and_accessors() {
    let mut sess = Session::new();
    let point = point(&mut sess);
    sess.run_compile_time_pass().unwrap();

    let functions = sess.root().functions();
    let raw = sess.interner.get("Point").unwrap();
    assert_eq!(functions.overloads_of(raw), vec!["Point", "Point$1", "Point$2"]);

    let (primary, ret) = functions.signature_of("Point").unwrap();
    let tys: Vec<_> = primary.iter().map(|p| p.ty).collect();
    assert_eq!(tys, vec![ty::IDENTIFIER, ty::INTEGER, ty::INTEGER]);
    assert_eq!(ret, Some(point));

    let (anonymous, _) = functions.signature_of("Point$1").unwrap();
    let tys: Vec<_> = anonymous.iter().map(|p| p.ty).collect();
    assert_eq!(tys, vec![ty::INTEGER, ty::INTEGER]);

    for member in ["x", "y"] {
        let accessor = sess.function_by_name(member).unwrap();
        assert_eq!(accessor.param_sigs()[0].ty, point);
        assert_eq!(accessor.param_sigs()[0].kind, ParamKind::Reference);
        assert_eq!(accessor.return_type(), Some(ty::INTEGER));
        assert!(matches!(accessor.tags[0], FunctionTag::Accessor { .. }));
        let body = accessor.ret.as_ref().unwrap();
        assert!(matches!(body.atoms.as_slice(), [Atom::StructCopy { .. }]));
    }
}

#[test]
fn structure_layout_is_recorded() {
    let mut sess = Session::new();
    let point = point(&mut sess);
    sess.run_compile_time_pass().unwrap();
    let s = sess.root().types().structure(point).unwrap();
    let names: Vec<_> = s.layout().iter().map(|(m, _)| sess.text(*m)).collect();
    assert_eq!(names, vec!["x", "y"]);
    assert_eq!(s.constructors().unwrap().copy, "Point$2");
}

// ── Use sites ──────────────────────────────────────────────────────────

#[test]
fn constructor_call_declares_and_accessors_read() {
    let mut sess = Session::new();
    let point = point(&mut sess);
    push_call(&mut sess, "Point", &["origin", "1", "2"]);
    push_call(&mut sess, "integer", &["total", "origin.x + origin.y"]);

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());

    let ctor = main_statement(&sess, 0);
    assert_eq!(ctor.resolved(), Some("Point"));
    assert_eq!(ctor.ty(), Some(point));

    let origin = sess.interner.get("origin").unwrap();
    let site = sess.main_site();
    assert_eq!(sess.lookup_variable(site, origin).unwrap().unwrap().ty, point);

    let sum = &main_statement(&sess, 1).args[1];
    assert_eq!(sum.ty(), Some(ty::INTEGER));
    assert!(sum.is_resolved());
}

#[test]
fn anonymous_constructor_builds_a_value() {
    let mut sess = Session::new();
    let point = point(&mut sess);
    let inner = build::infix(&mut sess, "3");
    let inner2 = build::infix(&mut sess, "4");
    let anonymous = build::call(&mut sess, "Point", vec![inner, inner2]);
    let corner = build::infix(&mut sess, "corner");
    let copy = build::stmt(
        &mut sess,
        "Point",
        vec![corner, build::expr(vec![anonymous])],
    );
    sess.push_main(BlockEntry::Statement(copy));

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    let stmt = main_statement(&sess, 0);
    assert_eq!(stmt.resolved(), Some("Point$2"));
    match &stmt.args[1].atoms[0] {
        Atom::Statement(inner) => {
            assert_eq!(inner.resolved(), Some("Point$1"));
            assert_eq!(inner.ty(), Some(point));
        }
        other => panic!("expected a nested statement, got {:?}", other),
    }
}

#[test]
fn visible_names_feed_the_anonymous_constructor() {
    let mut sess = Session::new();
    let point = point(&mut sess);
    push_call(&mut sess, "integer", &["px", "1"]);
    push_call(&mut sess, "integer", &["py", "2"]);
    push_call(&mut sess, "Point", &["px", "py"]);
    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());

    let stmt = main_statement(&sess, 2);
    assert_eq!(stmt.resolved(), Some("Point$1"));
    assert_eq!(stmt.ty(), Some(point));
    let px = sess.interner.get("px").unwrap();
    let var = sess.lookup_variable(sess.main_site(), px).unwrap().unwrap();
    assert_eq!(var.ty, ty::INTEGER);
}

#[test]
fn member_assignment_goes_through_the_accessor() {
    let mut sess = Session::new();
    point(&mut sess);
    push_call(&mut sess, "Point", &["cursor", "0", "0"]);
    let lhs = build::infix(&mut sess, "cursor.y");
    let rhs = build::infix(&mut sess, "cursor.x + 1");
    sess.push_main(BlockEntry::Assignment(Assignment::new(
        lhs,
        rhs,
        rowan::TextRange::empty(0.into()),
    )));

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    match &sess.main().unwrap().entries()[1] {
        BlockEntry::Assignment(a) => {
            assert!(a.lhs.is_lvalue());
            assert_eq!(a.lhs.ty(), Some(ty::INTEGER));
            assert!(matches!(a.lhs.atoms[0], Atom::Reference(_)));
        }
        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn unknown_member_is_reported() {
    let mut sess = Session::new();
    point(&mut sess);
    push_call(&mut sess, "Point", &["spot", "1", "1"]);
    push_call(&mut sess, "integer", &["depth", "spot.z"]);

    assert!(!sess.check().unwrap());
    assert!(sess.diagnostics.errors().iter().any(|e| e.kind
        == SemanticErrorKind::UnknownMember {
            ty: "Point".into(),
            member: "z".into()
        }));
}

#[test]
fn member_names_are_function_names() {
    let mut sess = Session::new();
    point(&mut sess);
    push_call(&mut sess, "integer", &["x", "5"]);
    sess.run_compile_time_pass().unwrap();
    assert!(matches!(
        &sess.diagnostics.errors()[0].kind,
        SemanticErrorKind::ShadowedName { name, .. } if name == "x"
    ));
    let x = sess.interner.get("x").unwrap();
    assert!(sess
        .ns(ROOT)
        .unwrap()
        .scopes()
        .lookup(sess.global_scope(), x)
        .unwrap()
        .is_none());
}
