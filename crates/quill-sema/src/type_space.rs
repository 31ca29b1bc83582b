//! The type space: every type identity of a namespace and its name.
//!
//! Only the root namespace allocates identities. Child namespaces use their
//! type space for weak bindings of template parameters and nothing else.

use quill_common::{Interner, Symbol};
use rowan::TextRange;
use rustc_hash::FxHashMap;

use crate::error::{InternalError, SemaResult, SemanticErrorKind};
use crate::namespace::{NamespaceId, Session, ROOT};
use crate::structure::{Structure, Unit};
use crate::sum_type::SumType;
use crate::template::{InstanceBody, TemplateInstance, TypeTemplate};
use crate::ty::{self, TypeFamily, TypeId, TypeRef, TypeRefKind};

/// A weak alias: another name for an existing identity.
#[derive(Clone, Debug, PartialEq)]
pub struct WeakAlias {
    pub name: Symbol,
    pub target: TypeRef,
}

/// A higher-order function signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

/// The accessor function synthesized for one structure member.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessorInfo {
    pub function: String,
    pub ty: TypeId,
}

#[derive(Debug, Default)]
pub struct TypeSpace {
    names: FxHashMap<TypeId, Symbol>,
    primitives: FxHashMap<Symbol, TypeId>,
    pub(crate) structures: Vec<Structure>,
    structure_names: FxHashMap<Symbol, TypeId>,
    pub(crate) weak_aliases: Vec<WeakAlias>,
    weak: FxHashMap<Symbol, TypeId>,
    pub(crate) units: Vec<Unit>,
    unit_names: FxHashMap<Symbol, TypeId>,
    pub(crate) sums: Vec<SumType>,
    sum_names: FxHashMap<Symbol, TypeId>,
    pub(crate) templates: Vec<TypeTemplate>,
    template_names: FxHashMap<Symbol, usize>,
    pub(crate) instances: Vec<TemplateInstance>,
    instance_names: FxHashMap<Symbol, TypeId>,
    instance_memo: FxHashMap<(Symbol, Vec<TypeId>), TypeId>,
    signatures: Vec<Signature>,
    signature_ids: FxHashMap<Signature, TypeId>,
    pub(crate) accessors: FxHashMap<(TypeId, Symbol), AccessorInfo>,
    /// Virtual sum constructor overload -> real per-base constructor.
    pub(crate) ctor_indirections: FxHashMap<String, String>,
    /// `Sum.Base` constructor names -> the sum they construct.
    sum_ctor_names: FxHashMap<Symbol, TypeId>,
    pub(crate) compile_time_done: bool,
}

impl TypeSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn install_primitives(&mut self, interner: &mut Interner) {
        for (name, id) in ty::PRIMITIVES {
            let sym = interner.intern(name);
            self.primitives.insert(sym, id);
            self.names.insert(id, sym);
        }
    }

    /// Whether `name` is taken by any declaration in this space.
    pub fn is_declared(&self, name: Symbol) -> bool {
        self.primitives.contains_key(&name)
            || self.structure_names.contains_key(&name)
            || self.weak.contains_key(&name)
            || self.weak_aliases.iter().any(|a| a.name == name)
            || self.unit_names.contains_key(&name)
            || self.sum_names.contains_key(&name)
            || self.template_names.contains_key(&name)
            || self.instance_names.contains_key(&name)
    }

    /// Resolve a name. Primitives win over structures, then weak aliases,
    /// units, sums, template instances and finally sum constructor names.
    pub fn resolve(&self, name: Symbol) -> Option<TypeId> {
        self.primitives
            .get(&name)
            .or_else(|| self.structure_names.get(&name))
            .or_else(|| self.weak.get(&name))
            .or_else(|| self.unit_names.get(&name))
            .or_else(|| self.sum_names.get(&name))
            .or_else(|| self.instance_names.get(&name))
            .or_else(|| self.sum_ctor_names.get(&name))
            .copied()
    }

    pub fn name_of(&self, id: TypeId) -> SemaResult<Symbol> {
        self.names
            .get(&id)
            .copied()
            .ok_or(InternalError::UnnamedType(id))
    }

    pub fn template(&self, name: Symbol) -> Option<&TypeTemplate> {
        self.template_names.get(&name).map(|&i| &self.templates[i])
    }

    pub(crate) fn template_mut(&mut self, name: Symbol) -> Option<&mut TypeTemplate> {
        match self.template_names.get(&name) {
            Some(&i) => self.templates.get_mut(i),
            None => None,
        }
    }

    fn next_id(family: TypeFamily, len: usize) -> TypeId {
        TypeId::new(family, len as u32)
    }

    pub(crate) fn add_structure(&mut self, structure: Structure) -> Option<TypeId> {
        if self.is_declared(structure.name) {
            return None;
        }
        let id = Self::next_id(TypeFamily::Structure, self.structures.len());
        self.names.insert(id, structure.name);
        self.structure_names.insert(structure.name, id);
        self.structures.push(structure);
        Some(id)
    }

    pub(crate) fn add_unit(&mut self, unit: Unit) -> Option<TypeId> {
        if self.is_declared(unit.name) {
            return None;
        }
        let id = Self::next_id(TypeFamily::Unit, self.units.len());
        self.names.insert(id, unit.name);
        self.unit_names.insert(unit.name, id);
        self.units.push(unit);
        Some(id)
    }

    pub(crate) fn add_sum(&mut self, sum: SumType) -> Option<TypeId> {
        if self.is_declared(sum.name) {
            return None;
        }
        let id = Self::next_id(TypeFamily::Sum, self.sums.len());
        self.names.insert(id, sum.name);
        self.sum_names.insert(sum.name, id);
        self.sums.push(sum);
        Some(id)
    }

    pub(crate) fn add_weak_alias(&mut self, alias: WeakAlias) -> bool {
        if self.is_declared(alias.name) {
            return false;
        }
        self.weak_aliases.push(alias);
        true
    }

    /// Bind `name` to an existing identity without allocating a new one.
    pub fn bind_weak(&mut self, name: Symbol, id: TypeId) {
        self.weak.insert(name, id);
    }

    pub(crate) fn add_template(&mut self, template: TypeTemplate) -> bool {
        if self.is_declared(template.name) {
            return false;
        }
        self.template_names
            .insert(template.name, self.templates.len());
        self.templates.push(template);
        true
    }

    pub(crate) fn add_instance(&mut self, instance: TemplateInstance) -> TypeId {
        let id = Self::next_id(TypeFamily::Instance, self.instances.len());
        self.names.insert(id, instance.name);
        self.instance_names.insert(instance.name, id);
        self.instance_memo
            .insert((instance.template, instance.args.clone()), id);
        self.instances.push(instance);
        id
    }

    pub fn lookup_instance(&self, template: Symbol, args: &[TypeId]) -> Option<TypeId> {
        self.instance_memo.get(&(template, args.to_vec())).copied()
    }

    pub fn instance(&self, id: TypeId) -> Option<&TemplateInstance> {
        if id.family() != TypeFamily::Instance {
            return None;
        }
        self.instances.get(id.ordinal() as usize)
    }

    /// Argument vector an instance was created with, by instance name.
    pub fn instance_args(&self, template: Symbol, instance: Symbol) -> Option<&[TypeId]> {
        let id = self.instance_names.get(&instance)?;
        let inst = self.instance(*id)?;
        (inst.template == template).then_some(inst.args.as_slice())
    }

    pub(crate) fn add_sum_ctor_name(&mut self, name: Symbol, sum: TypeId) {
        self.sum_ctor_names.insert(name, sum);
    }

    /// The record layout of a structure or structure-template instance.
    pub fn structure(&self, id: TypeId) -> Option<&Structure> {
        match id.family() {
            TypeFamily::Structure => self.structures.get(id.ordinal() as usize),
            TypeFamily::Instance => match &self.instance(id)?.body {
                InstanceBody::Structure(s) => Some(s),
                InstanceBody::Sum(_) => None,
            },
            _ => None,
        }
    }

    pub(crate) fn structure_mut(&mut self, id: TypeId) -> Option<&mut Structure> {
        match id.family() {
            TypeFamily::Structure => self.structures.get_mut(id.ordinal() as usize),
            TypeFamily::Instance => match &mut self.instances.get_mut(id.ordinal() as usize)?.body {
                InstanceBody::Structure(s) => Some(s),
                InstanceBody::Sum(_) => None,
            },
            _ => None,
        }
    }

    pub fn sum(&self, id: TypeId) -> Option<&SumType> {
        match id.family() {
            TypeFamily::Sum => self.sums.get(id.ordinal() as usize),
            TypeFamily::Instance => match &self.instance(id)?.body {
                InstanceBody::Sum(s) => Some(s),
                InstanceBody::Structure(_) => None,
            },
            _ => None,
        }
    }

    pub(crate) fn sum_mut(&mut self, id: TypeId) -> Option<&mut SumType> {
        match id.family() {
            TypeFamily::Sum => self.sums.get_mut(id.ordinal() as usize),
            TypeFamily::Instance => match &mut self.instances.get_mut(id.ordinal() as usize)?.body {
                InstanceBody::Sum(s) => Some(s),
                InstanceBody::Structure(_) => None,
            },
            _ => None,
        }
    }

    pub fn is_sum(&self, id: TypeId) -> bool {
        self.sum(id).is_some()
    }

    /// Resolved base types of a sum type.
    pub fn sum_bases(&self, id: TypeId) -> Option<&[TypeId]> {
        self.sum(id).map(|s| s.resolved.as_slice())
    }

    /// Whether `base` is a base of `sum`, directly or through a nested sum.
    pub fn is_base_of(&self, sum: TypeId, base: TypeId) -> bool {
        let mut stack = vec![sum];
        let mut seen = Vec::new();
        while let Some(current) = stack.pop() {
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            if let Some(bases) = self.sum_bases(current) {
                if bases.contains(&base) {
                    return true;
                }
                stack.extend(bases.iter().copied().filter(|b| self.is_sum(*b)));
            }
        }
        false
    }

    pub fn unit(&self, id: TypeId) -> Option<&Unit> {
        if id.family() != TypeFamily::Unit {
            return None;
        }
        self.units.get(id.ordinal() as usize)
    }

    /// The representation type behind a strong alias.
    pub fn strong_representation_of(&self, id: TypeId) -> Option<TypeId> {
        self.unit(id).and_then(|u| u.resolved)
    }

    pub fn signature(&self, id: TypeId) -> Option<&Signature> {
        if id.family() != TypeFamily::Function {
            return None;
        }
        self.signatures.get(id.ordinal() as usize)
    }

    pub fn accessor(&self, structure: TypeId, member: Symbol) -> Option<&AccessorInfo> {
        self.accessors.get(&(structure, member))
    }

    pub fn ctor_indirection(&self, name: &str) -> Option<&str> {
        self.ctor_indirections.get(name).map(String::as_str)
    }

    /// All identities with a registered name.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ── Session-level type operations ──────────────────────────────────────

impl Session {
    /// Intern a function signature type, allocating it on first use.
    pub fn signature_type(&mut self, params: Vec<TypeId>, ret: TypeId) -> SemaResult<TypeId> {
        let sig = Signature { params, ret };
        if let Some(&id) = self.types().signature_ids.get(&sig) {
            return Ok(id);
        }
        let names = self.type_names(&sig.params)?;
        let text = format!("({}) -> {}", names.join(", "), self.type_name(sig.ret)?);
        let sym = self.intern(&text);
        let types = self.types_mut();
        let id = TypeSpace::next_id(TypeFamily::Function, types.signatures.len());
        types.names.insert(id, sym);
        types.signature_ids.insert(sig.clone(), id);
        types.signatures.push(sig);
        Ok(id)
    }

    /// Resolve a type reference as seen from `ns`, instantiating templates
    /// on demand. Reports and returns `None` on failure.
    pub fn resolve_type_ref(&mut self, ns: NamespaceId, r: &TypeRef) -> SemaResult<Option<TypeId>> {
        match &r.kind {
            TypeRefKind::Resolved(id) => Ok(Some(*id)),
            TypeRefKind::Named { name, args } if args.is_empty() => {
                if let Some(id) = self.resolve_type_name(ns, *name)? {
                    return Ok(Some(id));
                }
                let kind = if self.types().template(*name).is_some() {
                    SemanticErrorKind::MissingTemplateArguments {
                        name: self.text(*name).to_string(),
                    }
                } else {
                    SemanticErrorKind::UnknownType {
                        name: self.text(*name).to_string(),
                    }
                };
                self.diagnostics.report_at(r.loc, kind);
                Ok(None)
            }
            TypeRefKind::Named { name, args } => {
                let mut resolved = Vec::with_capacity(args.len());
                for arg in args {
                    match self.resolve_type_ref(ns, arg)? {
                        Some(id) => resolved.push(id),
                        None => return Ok(None),
                    }
                }
                if self.types().template(*name).is_some() {
                    return self.instantiate_type(*name, resolved, r.loc);
                }
                let kind = if self.resolve_type_name(ns, *name)?.is_some() {
                    SemanticErrorKind::NotATemplate {
                        name: self.text(*name).to_string(),
                    }
                } else {
                    SemanticErrorKind::UnknownType {
                        name: self.text(*name).to_string(),
                    }
                };
                self.diagnostics.report_at(r.loc, kind);
                Ok(None)
            }
            TypeRefKind::Function { params, ret } => {
                let mut resolved = Vec::with_capacity(params.len());
                for p in params {
                    match self.resolve_type_ref(ns, p)? {
                        Some(id) => resolved.push(id),
                        None => return Ok(None),
                    }
                }
                match self.resolve_type_ref(ns, ret)? {
                    Some(ret) => self.signature_type(resolved, ret).map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    // ── Declarations ───────────────────────────────────────────────────

    fn report_duplicate_type(&mut self, name: Symbol, loc: TextRange) {
        let name = self.text(name).to_string();
        self.diagnostics.report_at(
            loc,
            SemanticErrorKind::DuplicateName { name, what: "type" },
        );
    }

    pub fn declare_structure(&mut self, structure: Structure) -> Option<TypeId> {
        let (name, loc) = (structure.name, structure.loc);
        let id = self.types_mut().add_structure(structure);
        if id.is_none() {
            self.report_duplicate_type(name, loc);
        }
        id
    }

    pub fn declare_unit(&mut self, unit: Unit) -> Option<TypeId> {
        let (name, loc) = (unit.name, unit.loc);
        let id = self.types_mut().add_unit(unit);
        if id.is_none() {
            self.report_duplicate_type(name, loc);
        }
        id
    }

    pub fn declare_sum(&mut self, sum: SumType) -> Option<TypeId> {
        let (name, loc) = (sum.name, sum.loc);
        let id = self.types_mut().add_sum(sum);
        if id.is_none() {
            self.report_duplicate_type(name, loc);
        }
        id
    }

    pub fn declare_alias(&mut self, name: Symbol, target: TypeRef) -> bool {
        let loc = target.loc;
        let ok = self.types_mut().add_weak_alias(WeakAlias { name, target });
        if !ok {
            self.report_duplicate_type(name, loc);
        }
        ok
    }

    pub fn declare_type_template(&mut self, template: TypeTemplate) -> bool {
        let (name, loc) = (template.name, template.loc);
        let ok = self.types_mut().add_template(template);
        if !ok {
            self.report_duplicate_type(name, loc);
        }
        ok
    }

    // ── Passes ─────────────────────────────────────────────────────────

    /// Resolve aliases, synthesize constructors and accessors of every
    /// structure and unit, and generate sum type constructors. Runs once.
    pub(crate) fn run_type_compile_time_pass(&mut self) -> SemaResult<()> {
        if self.types().compile_time_done {
            return Ok(());
        }
        self.types_mut().compile_time_done = true;

        let aliases = self.types().weak_aliases.clone();
        for alias in aliases {
            if let Some(id) = self.resolve_type_ref(ROOT, &alias.target)? {
                self.types_mut().bind_weak(alias.name, id);
            }
        }

        for ordinal in 0..self.types().units.len() {
            self.synthesize_unit(TypeId::new(TypeFamily::Unit, ordinal as u32))?;
        }
        for ordinal in 0..self.types().structures.len() {
            self.synthesize_structure(TypeId::new(TypeFamily::Structure, ordinal as u32))?;
        }
        for ordinal in 0..self.types().sums.len() {
            self.generate_sum_constructors(TypeId::new(TypeFamily::Sum, ordinal as u32))?;
        }
        Ok(())
    }

    /// Report duplicate members and structures whose layout failed.
    pub(crate) fn validate_types(&mut self) -> SemaResult<bool> {
        let mut ok = true;
        let mut reports = Vec::new();
        let types = self.types();
        let all_structures = types
            .structures
            .iter()
            .chain(types.instances.iter().filter_map(|i| match &i.body {
                InstanceBody::Structure(s) => Some(s),
                InstanceBody::Sum(_) => None,
            }));
        for structure in all_structures {
            let mut seen = Vec::new();
            for member in &structure.members {
                if seen.contains(&member.name()) {
                    reports.push((
                        member.loc(),
                        SemanticErrorKind::DuplicateName {
                            name: self.text(member.name()).to_string(),
                            what: "member",
                        },
                    ));
                }
                seen.push(member.name());
            }
            ok &= structure.constructors.is_some();
        }
        for sum in &types.sums {
            ok &= sum.generated;
        }
        for (loc, kind) in reports {
            self.diagnostics.report_at(loc, kind);
            ok = false;
        }
        Ok(ok)
    }

    /// Report type templates no code instantiated.
    pub(crate) fn check_unused_templates(&mut self) -> SemaResult<bool> {
        if !self.config.require_template_instantiation {
            return Ok(true);
        }
        let unused: Vec<(Symbol, TextRange)> = self
            .types()
            .templates
            .iter()
            .filter(|t| t.instances.is_empty())
            .map(|t| (t.name, t.loc))
            .collect();
        for (name, loc) in &unused {
            let name = self.text(*name).to_string();
            self.diagnostics
                .report_at(*loc, SemanticErrorKind::TemplateNeverInstantiated { name });
        }
        Ok(unused.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::Member;

    fn loc() -> TextRange {
        TextRange::empty(0.into())
    }

    #[test]
    fn primitives_resolve_first() {
        let sess = Session::new();
        let integer = sess.interner.get("integer").unwrap();
        assert_eq!(sess.types().resolve(integer), Some(ty::INTEGER));
        assert_eq!(sess.type_name(ty::STRING).unwrap(), "string");
    }

    #[test]
    fn unnamed_identity_is_internal() {
        let sess = Session::new();
        let bogus = TypeId::new(TypeFamily::Structure, 99);
        assert_eq!(
            sess.type_name(bogus).unwrap_err(),
            InternalError::UnnamedType(bogus)
        );
    }

    #[test]
    fn duplicate_type_names_are_reported() {
        let mut sess = Session::new();
        let name = sess.intern("Point");
        assert!(sess.declare_structure(Structure::new(name, Vec::new(), loc())).is_some());
        assert!(sess.declare_structure(Structure::new(name, Vec::new(), loc())).is_none());
        let integer = sess.intern("integer");
        assert!(sess.declare_sum(SumType::new(integer, Vec::new(), loc())).is_none());
        assert_eq!(sess.diagnostics.len(), 2);
    }

    #[test]
    fn signatures_are_interned_with_synthetic_names() {
        let mut sess = Session::new();
        let a = sess.signature_type(vec![ty::INTEGER], ty::INTEGER).unwrap();
        let b = sess.signature_type(vec![ty::INTEGER], ty::INTEGER).unwrap();
        let c = sess.signature_type(vec![ty::REAL], ty::INTEGER).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.family(), TypeFamily::Function);
        assert_eq!(sess.type_name(a).unwrap(), "(integer) -> integer");
    }

    #[test]
    fn weak_aliases_share_identity() {
        let mut sess = Session::new();
        let count = sess.intern("Count");
        let integer = sess.intern("integer");
        sess.declare_alias(count, TypeRef::named(integer, loc()));
        sess.run_type_compile_time_pass().unwrap();
        assert_eq!(sess.types().resolve(count), Some(ty::INTEGER));
    }

    #[test]
    fn unknown_member_type_is_reported() {
        let mut sess = Session::new();
        let name = sess.intern("Holder");
        let field = sess.intern("value");
        let missing = sess.intern("Missing");
        let members = vec![Member::Variable {
            name: field,
            ty: TypeRef::named(missing, loc()),
            loc: loc(),
        }];
        sess.declare_structure(Structure::new(name, members, loc()));
        sess.run_type_compile_time_pass().unwrap();
        assert!(matches!(
            &sess.diagnostics.errors()[0].kind,
            SemanticErrorKind::UnknownType { name } if name == "Missing"
        ));
    }
}
