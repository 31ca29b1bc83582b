//! Algebraic sum types and their constructor overloads.
//!
//! For a sum `S` with bases `B1..Bn` the compile-time pass registers, per
//! base, a real constructor `S.Bi(identifier, Bi)` and a virtual overload
//! `S(identifier, Bi)` that the statement resolver remaps to the real one.
//! A final "any base" overload `S(identifier, S)` copies a value of the sum.
//! All of them declare the variable named by their first argument.

use quill_common::Symbol;
use rowan::TextRange;

use crate::error::{InternalError, SemaResult};
use crate::function::{Function, FunctionTag, ParamKind, ParamSig};
use crate::namespace::{Session, ROOT};
use crate::ty::{self, TypeId, TypeRef};

#[derive(Clone, Debug, PartialEq)]
pub struct SumType {
    pub name: Symbol,
    /// Base types as written in the defining clause.
    pub bases: Vec<TypeRef>,
    pub loc: TextRange,
    pub(crate) resolved: Vec<TypeId>,
    pub(crate) generated: bool,
    /// Real per-base constructor names, parallel to `resolved`.
    pub(crate) constructors: Vec<String>,
}

impl SumType {
    pub fn new(name: Symbol, bases: Vec<TypeRef>, loc: TextRange) -> SumType {
        SumType {
            name,
            bases,
            loc,
            resolved: Vec::new(),
            generated: false,
            constructors: Vec::new(),
        }
    }

    pub fn resolved_bases(&self) -> &[TypeId] {
        &self.resolved
    }

    pub fn constructors(&self) -> &[String] {
        &self.constructors
    }
}

impl Session {
    /// Resolve a sum's bases and register its constructor overloads.
    /// Runs once per sum.
    pub(crate) fn generate_sum_constructors(&mut self, id: TypeId) -> SemaResult<()> {
        let (name, bases, loc) = match self.types().sum(id) {
            Some(s) if s.generated => return Ok(()),
            Some(s) => (s.name, s.bases.clone(), s.loc),
            None => return Err(InternalError::UnnamedType(id)),
        };
        if let Some(s) = self.types_mut().sum_mut(id) {
            s.generated = true;
        }
        let sum_name = self.text(name).to_string();
        log::debug!("generate constructors of sum `{}`", sum_name);

        let mut resolved = Vec::with_capacity(bases.len());
        for base in &bases {
            if let Some(t) = self.resolve_type_ref(ROOT, base)? {
                if !resolved.contains(&t) {
                    resolved.push(t);
                }
            }
        }
        if let Some(s) = self.types_mut().sum_mut(id) {
            s.resolved = resolved.clone();
        }

        let tags = vec![FunctionTag::Constructor {
            ty: id,
            declares: true,
        }];
        let mut constructors = Vec::with_capacity(resolved.len());
        for &base in &resolved {
            let sig = vec![
                ParamSig {
                    ty: ty::IDENTIFIER,
                    kind: ParamKind::Value,
                },
                ParamSig {
                    ty: base,
                    kind: ParamKind::Value,
                },
            ];
            let real_raw = format!("{}.{}", sum_name, self.type_name(base)?);
            let real_raw = self.intern(&real_raw);
            self.types_mut().add_sum_ctor_name(real_raw, id);
            let real = self.add_generated(Function::generated(
                real_raw,
                sig.clone(),
                id,
                tags.clone(),
                loc,
            ));
            let virtual_name =
                self.add_generated(Function::generated(name, sig, id, tags.clone(), loc));
            log::trace!("sum constructor {} -> {}", virtual_name, real);
            self.types_mut()
                .ctor_indirections
                .insert(virtual_name, real.clone());
            constructors.push(real);
        }

        let any_base = vec![
            ParamSig {
                ty: ty::IDENTIFIER,
                kind: ParamKind::Value,
            },
            ParamSig {
                ty: id,
                kind: ParamKind::Value,
            },
        ];
        self.add_generated(Function::generated(name, any_base, id, tags, loc));

        if let Some(s) = self.types_mut().sum_mut(id) {
            s.constructors = constructors;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> TextRange {
        TextRange::empty(0.into())
    }

    fn shape(sess: &mut Session) -> TypeId {
        let name = sess.intern("Number");
        let bases = ["integer", "real"]
            .iter()
            .map(|b| TypeRef::named(sess.intern(b), loc()))
            .collect::<Vec<_>>();
        sess.declare_sum(SumType::new(name, bases, loc())).unwrap()
    }

    #[test]
    fn one_real_constructor_per_base() {
        let mut sess = Session::new();
        let id = shape(&mut sess);
        sess.generate_sum_constructors(id).unwrap();
        let sum = sess.types().sum(id).unwrap();
        assert_eq!(sum.resolved_bases(), &[ty::INTEGER, ty::REAL]);
        assert_eq!(sum.constructors(), &["Number.integer", "Number.real"]);
    }

    #[test]
    fn virtual_overloads_map_to_real_constructors() {
        let mut sess = Session::new();
        let id = shape(&mut sess);
        sess.generate_sum_constructors(id).unwrap();
        let types = sess.types();
        assert_eq!(types.ctor_indirection("Number"), Some("Number.integer"));
        assert_eq!(types.ctor_indirection("Number$1"), Some("Number.real"));
        // the any-base overload has no indirection
        assert_eq!(types.ctor_indirection("Number$2"), None);
        let number = sess.interner.get("Number").unwrap();
        assert_eq!(sess.table().overloads_of(number).len(), 3);
    }

    #[test]
    fn base_relation_is_transitive() {
        let mut sess = Session::new();
        let inner = shape(&mut sess);
        let outer_name = sess.intern("Value");
        let number = sess.intern("Number");
        let boolean = sess.intern("boolean");
        let outer = sess
            .declare_sum(SumType::new(
                outer_name,
                vec![TypeRef::named(number, loc()), TypeRef::named(boolean, loc())],
                loc(),
            ))
            .unwrap();
        sess.run_type_compile_time_pass().unwrap();
        let types = sess.types();
        assert!(types.is_base_of(outer, inner));
        assert!(types.is_base_of(outer, ty::REAL));
        assert!(!types.is_base_of(inner, ty::BOOLEAN));
    }
}
