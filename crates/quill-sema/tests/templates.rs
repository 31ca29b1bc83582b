//! Type and function templates: memoized instances, constructors of
//! instances and template misuse.

use quill_sema::build;
use quill_sema::function::Param;
use quill_sema::structure::Member;
use quill_sema::template::{TemplateBody, TypeTemplate};
use quill_sema::ty;
use quill_sema::{BlockEntry, SemanticErrorKind, Session, Statement};

fn nowhere() -> rowan::TextRange {
    rowan::TextRange::empty(0.into())
}

fn pair(sess: &mut Session) {
    let name = sess.intern("Pair");
    let params = vec![build::type_param(sess, "A"), build::type_param(sess, "B")];
    let members = vec![
        Member::Variable {
            name: sess.intern("first"),
            ty: build::ty(sess, "A"),
            loc: nowhere(),
        },
        Member::Variable {
            name: sess.intern("second"),
            ty: build::ty(sess, "B"),
            loc: nowhere(),
        },
    ];
    assert!(sess.declare_type_template(TypeTemplate::new(
        name,
        params,
        TemplateBody::Structure(members),
        nowhere(),
    )));
}

fn identity(sess: &mut Session) {
    let mut f = sess.new_function("id").unwrap();
    f.template_params.push(build::type_param(sess, "T"));
    f.params.push(build::param(sess, "value", "T"));
    f.ret = Some(build::infix(sess, "value"));
    sess.declare_function(f);
}

fn push_generic_call(sess: &mut Session, name: &str, targs: &[&str], args: &[&str]) {
    let targs = targs.iter().map(|t| build::ty(sess, t)).collect();
    let args = args.iter().map(|a| build::infix(sess, a)).collect();
    let stmt = build::stmt(sess, name, args).with_template_args(targs);
    sess.push_main(BlockEntry::Statement(stmt));
}

fn main_statement(sess: &Session, index: usize) -> &Statement {
    match &sess.main().unwrap().entries()[index] {
        BlockEntry::Statement(s) => s,
        other => panic!("expected a statement, got {:?}", other),
    }
}

fn instance_count(sess: &Session) -> usize {
    sess.root()
        .functions()
        .iter()
        .filter(|f| f.instance_of().is_some())
        .count()
}

// ── Type templates ─────────────────────────────────────────────────────

#[test]
fn instance_constructor_declares_the_variable() {
    let mut sess = Session::new();
    pair(&mut sess);
    push_generic_call(&mut sess, "Pair", &["integer", "real"], &["pr", "1", "2.5"]);
    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());

    let stmt = main_statement(&sess, 0);
    assert_eq!(stmt.resolved(), Some("Pair<integer, real>"));
    let pr = sess.interner.get("pr").unwrap();
    let var = sess.lookup_variable(sess.main_site(), pr).unwrap().unwrap();
    assert_eq!(Some(var.ty), stmt.ty());
    assert_eq!(sess.type_name(var.ty).unwrap(), "Pair<integer, real>");
}

#[test]
fn generic_parameter_type_shares_the_instance() {
    let mut sess = Session::new();
    pair(&mut sess);
    let integer = build::ty(&mut sess, "integer");
    let real = build::ty(&mut sess, "real");
    let mut first_of = sess.new_function("first_of").unwrap();
    first_of.params.push(Param::Named {
        name: sess.intern("p"),
        ty: build::generic(&mut sess, "Pair", vec![integer, real]),
        reference: false,
        loc: nowhere(),
    });
    first_of.ret = Some(build::infix(&mut sess, "p.first"));
    sess.declare_function(first_of);

    push_generic_call(&mut sess, "Pair", &["integer", "real"], &["both", "3", "0.5"]);
    let arg = build::infix(&mut sess, "both");
    let call = build::stmt(&mut sess, "first_of", vec![arg]);
    sess.push_main(BlockEntry::Statement(call));
    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());

    let stmt = main_statement(&sess, 1);
    assert_eq!(stmt.resolved(), Some("first_of"));
    assert_eq!(stmt.ty(), Some(ty::INTEGER));

    let manifest = sess.manifest().unwrap();
    assert_eq!(manifest.instances.len(), 1);
    assert_eq!(manifest.instances[0].template, "Pair");
    assert_eq!(manifest.instances[0].args, vec!["integer", "real"]);
}

#[test]
fn sum_template_instances_name_their_constructors() {
    let mut sess = Session::new();
    let name = sess.intern("Either");
    let params = vec![build::type_param(&mut sess, "L"), build::type_param(&mut sess, "R")];
    let bases = vec![build::ty(&mut sess, "L"), build::ty(&mut sess, "R")];
    sess.declare_type_template(TypeTemplate::new(
        name,
        params,
        TemplateBody::Sum(bases),
        nowhere(),
    ));
    push_generic_call(&mut sess, "Either", &["integer", "string"], &["outcome", "4"]);
    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    assert_eq!(
        main_statement(&sess, 0).resolved(),
        Some("Either<integer, string>.integer")
    );
}

#[test]
fn unused_type_template_is_reported() {
    let mut sess = Session::new();
    pair(&mut sess);
    assert!(!sess.check().unwrap());
    assert_eq!(
        sess.diagnostics.errors()[0].kind,
        SemanticErrorKind::TemplateNeverInstantiated {
            name: "Pair".into()
        }
    );
}

#[test]
fn unused_template_check_can_be_disabled() {
    let mut sess = Session::new();
    sess.config.require_template_instantiation = false;
    pair(&mut sess);
    assert!(sess.check().unwrap());
}

// ── Function templates ─────────────────────────────────────────────────

#[test]
fn equal_arguments_reuse_one_function_instance() {
    let mut sess = Session::new();
    identity(&mut sess);
    push_generic_call(&mut sess, "id", &["real"], &["2.5"]);
    push_generic_call(&mut sess, "id", &["real"], &["1.0"]);
    push_generic_call(&mut sess, "id", &["integer"], &["3"]);
    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());

    assert_eq!(main_statement(&sess, 0).resolved(), Some("id<real>"));
    assert_eq!(main_statement(&sess, 1).resolved(), Some("id<real>"));
    assert_eq!(main_statement(&sess, 2).resolved(), Some("id<integer>"));
    assert_eq!(main_statement(&sess, 0).ty(), Some(ty::REAL));
    assert_eq!(main_statement(&sess, 2).ty(), Some(ty::INTEGER));
    assert_eq!(instance_count(&sess), 2);
}

#[test]
fn template_function_is_left_out_of_the_manifest() {
    let mut sess = Session::new();
    identity(&mut sess);
    push_generic_call(&mut sess, "id", &["integer"], &["8"]);
    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());

    let manifest = sess.manifest().unwrap();
    let names: Vec<&str> = manifest.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["id<integer>"]);
}

#[test]
fn template_arguments_on_a_plain_function_are_rejected() {
    let mut sess = Session::new();
    let mut f = sess.new_function("area").unwrap();
    f.params.push(build::param(&mut sess, "side", "integer"));
    f.ret = Some(build::infix(&mut sess, "side * side"));
    sess.declare_function(f);
    push_generic_call(&mut sess, "area", &["integer"], &["2"]);

    assert!(!sess.check().unwrap());
    assert_eq!(
        sess.diagnostics.errors()[0].kind,
        SemanticErrorKind::NotATemplate {
            name: "area".into()
        }
    );
}

#[test]
fn wrong_template_argument_count_is_reported() {
    let mut sess = Session::new();
    identity(&mut sess);
    push_generic_call(&mut sess, "id", &["integer", "real"], &["1"]);
    assert!(!sess.check().unwrap());
    assert!(matches!(
        sess.diagnostics.errors()[0].kind,
        SemanticErrorKind::TemplateArity {
            expected: 1,
            found: 2,
            ..
        }
    ));
}
