//! Primitive types, intrinsic operators and primitive constructors.

use rowan::TextRange;

use crate::function::{Function, FunctionTag, ParamKind, ParamSig};
use crate::namespace::Session;
use crate::ty::{self, TypeId};

const ARITHMETIC: [&str; 4] = ["+", "-", "*", "/"];
const ORDERING: [&str; 4] = ["<", ">", "<=", ">="];
const EQUALITY: [&str; 2] = ["==", "!="];

fn value(ty: TypeId) -> ParamSig {
    ParamSig {
        ty,
        kind: ParamKind::Value,
    }
}

fn intrinsic(sess: &mut Session, name: &str, params: Vec<ParamSig>, ret: TypeId) {
    let raw = sess.intern(name);
    let f = Function::generated(
        raw,
        params,
        ret,
        vec![FunctionTag::Intrinsic],
        TextRange::empty(0.into()),
    );
    sess.add_generated(f);
}

pub(crate) fn install(sess: &mut Session) {
    sess.namespaces[0]
        .types
        .install_primitives(&mut sess.interner);

    let numeric: Vec<TypeId> = ty::INTEGER_TYPES
        .iter()
        .chain(ty::REAL_TYPES.iter())
        .copied()
        .collect();

    for &t in &numeric {
        for op in ARITHMETIC {
            intrinsic(sess, op, vec![value(t), value(t)], t);
        }
        for op in ORDERING.iter().chain(EQUALITY.iter()) {
            intrinsic(sess, op, vec![value(t), value(t)], ty::BOOLEAN);
        }
        intrinsic(sess, "-", vec![value(t)], t);
        for op in ["++", "--"] {
            let slot = ParamSig {
                ty: t,
                kind: ParamKind::Reference,
            };
            intrinsic(sess, op, vec![slot], t);
        }
    }
    for t in ty::INTEGER_TYPES {
        intrinsic(sess, "%", vec![value(t), value(t)], t);
    }
    for t in [ty::BOOLEAN, ty::STRING] {
        for op in EQUALITY {
            intrinsic(sess, op, vec![value(t), value(t)], ty::BOOLEAN);
        }
    }
    intrinsic(sess, "+", vec![value(ty::STRING), value(ty::STRING)], ty::STRING);
    for op in ["&&", "||"] {
        intrinsic(sess, op, vec![value(ty::BOOLEAN), value(ty::BOOLEAN)], ty::BOOLEAN);
    }
    intrinsic(sess, "!", vec![value(ty::BOOLEAN)], ty::BOOLEAN);

    // `integer(count, 0)` declares `count`.
    for (name, t) in ty::PRIMITIVES {
        if t == ty::VOID || t == ty::IDENTIFIER {
            continue;
        }
        let raw = sess.intern(name);
        let f = Function::generated(
            raw,
            vec![value(ty::IDENTIFIER), value(t)],
            t,
            vec![
                FunctionTag::Constructor {
                    ty: t,
                    declares: true,
                },
                FunctionTag::Intrinsic,
            ],
            TextRange::empty(0.into()),
        );
        sess.add_generated(f);
    }
    log::debug!("installed {} built-in functions", sess.table().len());
}
