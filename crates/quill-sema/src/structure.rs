//! Structures, strong aliases and their synthesized support functions.
//!
//! Every concrete structure gets, once and on first compile-time execution,
//! a primary constructor `S(identifier, members...)` that declares the
//! named variable, an anonymous constructor `S(members...)`, a copy
//! constructor `S(identifier, S)` and one accessor per member whose body is
//! a single structure-copy marker.

use quill_common::Symbol;
use rowan::TextRange;
use serde::Serialize;

use crate::error::{InternalError, SemaResult};
use crate::expr::{Atom, Expression};
use crate::function::{Function, FunctionTag, ParamKind, ParamSig};
use crate::namespace::{Session, ROOT};
use crate::ty::{self, TypeId, TypeRef};

/// One member of a structure.
#[derive(Clone, Debug, PartialEq)]
pub enum Member {
    Variable {
        name: Symbol,
        ty: TypeRef,
        loc: TextRange,
    },
    /// A member holding a function; its type is the signature.
    FunctionRef {
        name: Symbol,
        params: Vec<TypeRef>,
        ret: TypeRef,
        loc: TextRange,
    },
}

impl Member {
    pub fn name(&self) -> Symbol {
        match self {
            Member::Variable { name, .. } | Member::FunctionRef { name, .. } => *name,
        }
    }

    pub fn loc(&self) -> TextRange {
        match self {
            Member::Variable { loc, .. } | Member::FunctionRef { loc, .. } => *loc,
        }
    }

    /// Apply template bindings to every type reference of the member.
    pub(crate) fn substitute(
        &self,
        bindings: &rustc_hash::FxHashMap<Symbol, TypeId>,
    ) -> Member {
        match self {
            Member::Variable { name, ty, loc } => Member::Variable {
                name: *name,
                ty: ty.substitute(bindings),
                loc: *loc,
            },
            Member::FunctionRef {
                name,
                params,
                ret,
                loc,
            } => Member::FunctionRef {
                name: *name,
                params: params.iter().map(|p| p.substitute(bindings)).collect(),
                ret: ret.substitute(bindings),
                loc: *loc,
            },
        }
    }
}

/// Mangled names of the constructors synthesized for a type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConstructorNames {
    pub primary: String,
    pub anonymous: String,
    pub copy: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Structure {
    pub name: Symbol,
    pub members: Vec<Member>,
    pub loc: TextRange,
    /// Member name and resolved type, in declaration order.
    pub(crate) layout: Vec<(Symbol, TypeId)>,
    pub(crate) constructors: Option<ConstructorNames>,
    pub(crate) synthesized: bool,
}

impl Structure {
    pub fn new(name: Symbol, members: Vec<Member>, loc: TextRange) -> Structure {
        Structure {
            name,
            members,
            loc,
            layout: Vec::new(),
            constructors: None,
            synthesized: false,
        }
    }

    pub fn layout(&self) -> &[(Symbol, TypeId)] {
        &self.layout
    }

    pub fn constructors(&self) -> Option<&ConstructorNames> {
        self.constructors.as_ref()
    }

    pub fn member_type(&self, member: Symbol) -> Option<TypeId> {
        self.layout
            .iter()
            .find(|(name, _)| *name == member)
            .map(|(_, ty)| *ty)
    }
}

/// A strong alias: nominally distinct, same representation.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub name: Symbol,
    pub representation: TypeRef,
    pub loc: TextRange,
    pub(crate) resolved: Option<TypeId>,
    pub(crate) constructors: Option<ConstructorNames>,
}

impl Unit {
    pub fn new(name: Symbol, representation: TypeRef, loc: TextRange) -> Unit {
        Unit {
            name,
            representation,
            loc,
            resolved: None,
            constructors: None,
        }
    }

    pub fn constructors(&self) -> Option<&ConstructorNames> {
        self.constructors.as_ref()
    }
}

fn value(ty: TypeId) -> ParamSig {
    ParamSig {
        ty,
        kind: ParamKind::Value,
    }
}

impl Session {
    /// Register the three constructors of `ty` taking `fields`.
    fn synthesize_constructors(
        &mut self,
        ty: TypeId,
        raw: Symbol,
        fields: &[TypeId],
        loc: TextRange,
    ) -> ConstructorNames {
        let mut primary_sig = vec![value(ty::IDENTIFIER)];
        primary_sig.extend(fields.iter().map(|&t| value(t)));
        let anonymous_sig: Vec<ParamSig> = fields.iter().map(|&t| value(t)).collect();
        let copy_sig = vec![value(ty::IDENTIFIER), value(ty)];

        let declaring = |declares| vec![FunctionTag::Constructor { ty, declares }];
        let primary = self.add_generated(Function::generated(
            raw,
            primary_sig,
            ty,
            declaring(true),
            loc,
        ));
        let anonymous =
            self.add_generated(Function::generated(raw, anonymous_sig, ty, declaring(false), loc));
        let copy = self.add_generated(Function::generated(raw, copy_sig, ty, declaring(true), loc));
        ConstructorNames {
            primary,
            anonymous,
            copy,
        }
    }

    /// Resolve the layout of a structure (or structure instance) and
    /// register its constructors and accessors. Runs once per structure.
    pub(crate) fn synthesize_structure(&mut self, id: TypeId) -> SemaResult<()> {
        let (name, members, loc) = match self.types().structure(id) {
            Some(s) if s.synthesized => return Ok(()),
            Some(s) => (s.name, s.members.clone(), s.loc),
            None => return Err(InternalError::UnnamedType(id)),
        };
        if let Some(s) = self.types_mut().structure_mut(id) {
            s.synthesized = true;
        }
        log::debug!("synthesize structure `{}`", self.text(name));

        let mut layout = Vec::with_capacity(members.len());
        let mut complete = true;
        for member in &members {
            let resolved = match member {
                Member::Variable { ty, .. } => self.resolve_type_ref(ROOT, ty)?,
                Member::FunctionRef { params, ret, .. } => {
                    let mut param_tys = Vec::with_capacity(params.len());
                    for p in params {
                        if let Some(t) = self.resolve_type_ref(ROOT, p)? {
                            param_tys.push(t);
                        }
                    }
                    match self.resolve_type_ref(ROOT, ret)? {
                        Some(ret) if param_tys.len() == params.len() => {
                            Some(self.signature_type(param_tys, ret)?)
                        }
                        _ => None,
                    }
                }
            };
            match resolved {
                Some(t) => layout.push((member.name(), t)),
                None => complete = false,
            }
        }
        if !complete {
            return Ok(());
        }

        let fields: Vec<TypeId> = layout.iter().map(|(_, t)| *t).collect();
        let ctors = self.synthesize_constructors(id, name, &fields, loc);

        for &(member, member_ty) in &layout {
            let ret = Expression::marker(
                Atom::StructCopy {
                    structure: id,
                    member,
                    ty: member_ty,
                },
                member_ty,
                loc,
            );
            let mut accessor = Function::generated(
                member,
                vec![ParamSig {
                    ty: id,
                    kind: ParamKind::Reference,
                }],
                member_ty,
                vec![FunctionTag::Accessor {
                    structure: id,
                    member,
                }],
                loc,
            );
            accessor.ret = Some(ret);
            let function = self.add_generated(accessor);
            self.types_mut().accessors.insert(
                (id, member),
                crate::type_space::AccessorInfo {
                    function,
                    ty: member_ty,
                },
            );
        }

        let s = self
            .types_mut()
            .structure_mut(id)
            .ok_or(InternalError::UnnamedType(id))?;
        s.layout = layout;
        s.constructors = Some(ctors);
        Ok(())
    }

    /// Resolve a unit's representation and register its constructors.
    pub(crate) fn synthesize_unit(&mut self, id: TypeId) -> SemaResult<()> {
        let (name, representation, loc) = match self.types().unit(id) {
            Some(u) if u.constructors.is_some() || u.resolved.is_some() => return Ok(()),
            Some(u) => (u.name, u.representation.clone(), u.loc),
            None => return Err(InternalError::UnnamedType(id)),
        };
        let Some(repr) = self.resolve_type_ref(ROOT, &representation)? else {
            return Ok(());
        };
        let ctors = self.synthesize_constructors(id, name, &[repr], loc);
        if let Some(unit) = self.types_mut().units.get_mut(id.ordinal() as usize) {
            unit.resolved = Some(repr);
            unit.constructors = Some(ctors);
        }
        Ok(())
    }
}
