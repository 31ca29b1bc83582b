//! Scoping: nested blocks, sibling isolation, function scopes and the
//! no-shadowing rule.

use quill_sema::build;
use quill_sema::error::ShadowKind;
use quill_sema::ty;
use quill_sema::{BlockEntry, CodeBlock, SemanticErrorKind, Session};

fn call(sess: &mut Session, name: &str, args: &[&str]) -> BlockEntry {
    let args = args.iter().map(|a| build::infix(sess, a)).collect();
    BlockEntry::Statement(build::stmt(sess, name, args))
}

fn block(sess: &mut Session, entries: Vec<BlockEntry>) -> CodeBlock {
    let global = sess.global_scope();
    let mut block = sess.new_block(global).unwrap();
    for entry in entries {
        block.push(entry);
    }
    block
}

fn shadowed(sess: &Session) -> Vec<(String, ShadowKind)> {
    sess.diagnostics
        .errors()
        .iter()
        .filter_map(|e| match &e.kind {
            SemanticErrorKind::ShadowedName { name, shadows } => Some((name.clone(), *shadows)),
            _ => None,
        })
        .collect()
}

#[test]
fn inner_block_sees_outer_variables() {
    let mut sess = Session::new();
    let entry = call(&mut sess, "integer", &["steps", "0"]);
    sess.push_main(entry);
    let bump = call(&mut sess, "++", &["steps"]);
    let inner = block(&mut sess, vec![bump]);
    sess.push_main(BlockEntry::Block(inner));
    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
}

#[test]
fn sibling_blocks_do_not_share_variables() {
    let mut sess = Session::new();
    let declare = call(&mut sess, "integer", &["scratch", "1"]);
    let first = block(&mut sess, vec![declare]);
    let read = call(&mut sess, "integer", &["copy", "scratch"]);
    let second = block(&mut sess, vec![read]);
    sess.push_main(BlockEntry::Block(first));
    sess.push_main(BlockEntry::Block(second));

    assert!(!sess.check().unwrap());
    assert_eq!(
        sess.diagnostics.errors()[0].kind,
        SemanticErrorKind::UnresolvedIdentifier {
            name: "scratch".into()
        }
    );
}

#[test]
fn sibling_blocks_may_reuse_a_name() {
    let mut sess = Session::new();
    let a = call(&mut sess, "integer", &["tmp", "1"]);
    let b = call(&mut sess, "real", &["tmp", "2.0"]);
    let first = block(&mut sess, vec![a]);
    let second = block(&mut sess, vec![b]);
    sess.push_main(BlockEntry::Block(first));
    sess.push_main(BlockEntry::Block(second));
    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
}

#[test]
fn redeclaring_a_visible_variable_is_rejected() {
    let mut sess = Session::new();
    let site = sess.main_site();
    assert!(build::declare(&mut sess, site, "level", ty::INTEGER).unwrap());
    let inner = sess.new_block(site.scope).unwrap();
    let inner_site = site.in_scope(inner.scope());
    assert!(!build::declare(&mut sess, inner_site, "level", ty::REAL).unwrap());
    assert_eq!(shadowed(&sess), vec![("level".to_string(), ShadowKind::Variable)]);

    let level = sess.intern("level");
    let var = sess.lookup_variable(inner_site, level).unwrap().unwrap();
    assert_eq!(var.ty, ty::INTEGER);
}

#[test]
fn constructor_cannot_redeclare_an_outer_variable() {
    let mut sess = Session::new();
    let outer = call(&mut sess, "integer", &["level", "0"]);
    sess.push_main(outer);
    let again = call(&mut sess, "integer", &["level", "1"]);
    let inner = block(&mut sess, vec![again]);
    sess.push_main(BlockEntry::Block(inner));

    assert!(!sess.check().unwrap());
    assert_eq!(shadowed(&sess), vec![("level".to_string(), ShadowKind::Variable)]);
}

#[test]
fn constructor_cannot_redeclare_in_the_same_scope() {
    let mut sess = Session::new();
    let first = call(&mut sess, "integer", &["tally", "0"]);
    let second = call(&mut sess, "real", &["tally", "1.5"]);
    sess.push_main(first);
    sess.push_main(second);

    assert!(!sess.check().unwrap());
    assert_eq!(shadowed(&sess), vec![("tally".to_string(), ShadowKind::Variable)]);
    let tally = sess.interner.get("tally").unwrap();
    let var = sess.lookup_variable(sess.main_site(), tally).unwrap().unwrap();
    assert_eq!(var.ty, ty::INTEGER);
}

#[test]
fn variable_named_like_a_type_is_rejected() {
    let mut sess = Session::new();
    let integer = build::ty(&mut sess, "integer");
    build::structure(&mut sess, "Point", &[("px", integer)]).unwrap();
    let entry = call(&mut sess, "integer", &["Point", "1"]);
    sess.push_main(entry);
    sess.run_compile_time_pass().unwrap();
    assert_eq!(shadowed(&sess), vec![("Point".to_string(), ShadowKind::Type)]);
}

#[test]
fn parameter_named_like_a_function_is_rejected() {
    let mut sess = Session::new();
    let mut helper = sess.new_function("helper").unwrap();
    helper.ret = Some(build::infix(&mut sess, "1"));
    sess.declare_function(helper);

    let mut user = sess.new_function("user").unwrap();
    user.params.push(build::param(&mut sess, "helper", "integer"));
    user.ret = Some(build::infix(&mut sess, "2"));
    sess.declare_function(user);

    assert!(!sess.check().unwrap());
    assert_eq!(shadowed(&sess), vec![("helper".to_string(), ShadowKind::Function)]);
}

#[test]
fn function_bodies_do_not_see_top_level_variables() {
    let mut sess = Session::new();
    let entry = call(&mut sess, "integer", &["limit", "3"]);
    sess.push_main(entry);
    let mut peek = sess.new_function("peek").unwrap();
    peek.ret = Some(build::infix(&mut sess, "limit"));
    sess.declare_function(peek);

    assert!(!sess.check().unwrap());
    assert!(sess.diagnostics.errors().iter().any(|e| e.kind
        == SemanticErrorKind::UnresolvedIdentifier {
            name: "limit".into()
        }));
}

#[test]
fn parameters_are_visible_in_the_body() {
    let mut sess = Session::new();
    let mut twice = sess.new_function("twice").unwrap();
    twice.params.push(build::param(&mut sess, "amount", "integer"));
    let mut body = sess.new_block(twice.scope.unwrap()).unwrap();
    let args = vec![build::infix(&mut sess, "doubled"), build::infix(&mut sess, "amount * 2")];
    body.push(BlockEntry::Statement(build::stmt(&mut sess, "integer", args)));
    twice.body = Some(body);
    twice.ret = Some(build::infix(&mut sess, "amount"));
    let fid = sess.declare_function(twice);

    assert!(sess.check().unwrap(), "{:?}", sess.diagnostics.errors());
    let f = sess.function(fid).unwrap();
    assert_eq!(f.return_type(), Some(ty::INTEGER));
    let doubled = sess.interner.get("doubled").unwrap();
    let global = sess.main_site();
    assert!(sess.lookup_variable(global, doubled).unwrap().is_none());
}
