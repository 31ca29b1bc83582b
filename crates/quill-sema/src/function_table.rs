//! The function table: overload registration, mangling and the generated
//! runtime dispatchers.

use std::collections::VecDeque;

use quill_common::Symbol;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{InternalError, SemaResult};
use crate::function::{Function, FunctionId, ParamKind, ParamSig};
use crate::namespace::{NamespaceId, Session, ROOT};
use crate::ty::TypeId;

/// A generated dispatcher choosing an overload by the runtime subtype of
/// sum-typed arguments.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TypeMatcher {
    pub name: String,
    pub raw_name: String,
    pub candidates: Vec<String>,
}

/// A generated dispatcher routing calls of `target` to literal-pattern
/// overloads when the argument value matches at runtime.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatternMatcher {
    pub name: String,
    pub target: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: Vec<Function>,
    by_name: FxHashMap<String, u32>,
    /// Raw name -> overload indices in registration order.
    overloads: FxHashMap<Symbol, Vec<u32>>,
    counters: FxHashMap<Symbol, u32>,
    /// Raw names with at least one literal-pattern overload.
    static_patterns: Vec<Symbol>,
    type_matchers: Vec<TypeMatcher>,
    type_matcher_index: FxHashMap<Symbol, usize>,
    pattern_matchers: Vec<PatternMatcher>,
    pub(crate) pending_instances: VecDeque<FunctionId>,
    pub(crate) function_instances: FxHashMap<(FunctionId, Vec<TypeId>), FunctionId>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get(&self, index: u32) -> SemaResult<&Function> {
        self.functions
            .get(index as usize)
            .ok_or_else(|| InternalError::UnknownFunction {
                name: format!("#{}", index),
            })
    }

    pub(crate) fn get_mut(&mut self, index: u32) -> SemaResult<&mut Function> {
        self.functions
            .get_mut(index as usize)
            .ok_or_else(|| InternalError::UnknownFunction {
                name: format!("#{}", index),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn index_of(&self, mangled: &str) -> Option<u32> {
        self.by_name.get(mangled).copied()
    }

    pub fn by_name(&self, mangled: &str) -> Option<&Function> {
        self.index_of(mangled)
            .and_then(|i| self.functions.get(i as usize))
    }

    /// The mangled name for the next overload of `raw`: the raw name itself
    /// for the first, `raw$N` afterwards.
    pub fn create_overload_name(&mut self, raw: Symbol, raw_text: &str) -> String {
        loop {
            let counter = self.counters.entry(raw).or_insert(0);
            let name = if *counter == 0 {
                raw_text.to_string()
            } else {
                format!("{}${}", raw_text, counter)
            };
            *counter += 1;
            if !self.by_name.contains_key(&name) {
                return name;
            }
        }
    }

    /// Register `function` under `mangled`. A taken name is a mangling bug.
    pub fn register(&mut self, mangled: String, function: Function) -> SemaResult<u32> {
        if self.by_name.contains_key(&mangled) {
            return Err(InternalError::DuplicateMangledName { name: mangled });
        }
        Ok(self.insert(mangled, function))
    }

    fn insert(&mut self, mangled: String, mut function: Function) -> u32 {
        let index = self.functions.len() as u32;
        let raw = function.raw_name;
        if function.has_pattern_params() && !self.static_patterns.contains(&raw) {
            self.static_patterns.push(raw);
        }
        function.name = mangled.clone();
        self.by_name.insert(mangled, index);
        self.overloads.entry(raw).or_default().push(index);
        self.functions.push(function);
        index
    }

    pub fn has_raw_name(&self, raw: Symbol) -> bool {
        self.overloads.contains_key(&raw)
    }

    /// Mangled names of every overload of `raw`, in registration order.
    pub fn overloads_of(&self, raw: Symbol) -> Vec<&str> {
        self.overload_indices(raw)
            .iter()
            .filter_map(|&i| self.functions.get(i as usize))
            .map(|f| f.name())
            .collect()
    }

    pub fn overload_indices(&self, raw: Symbol) -> &[u32] {
        self.overloads.get(&raw).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parameter slots and return type of an overload.
    pub fn signature_of(&self, mangled: &str) -> Option<(&[ParamSig], Option<TypeId>)> {
        self.by_name(mangled)
            .map(|f| (f.param_sigs(), f.return_type()))
    }

    pub fn static_pattern_names(&self) -> &[Symbol] {
        &self.static_patterns
    }

    pub fn type_matchers(&self) -> &[TypeMatcher] {
        &self.type_matchers
    }

    pub fn type_matcher(&self, raw: Symbol) -> Option<&TypeMatcher> {
        self.type_matcher_index
            .get(&raw)
            .map(|&i| &self.type_matchers[i])
    }

    pub fn pattern_matchers(&self) -> &[PatternMatcher] {
        &self.pattern_matchers
    }
}

impl Session {
    /// Register `function` as the next overload of its raw name in the root
    /// table.
    pub(crate) fn add_function(&mut self, function: Function) -> FunctionId {
        let raw_text = self.text(function.raw_name).to_string();
        let table = self.table_mut();
        let mangled = table.create_overload_name(function.raw_name, &raw_text);
        log::trace!("register overload `{}`", mangled);
        FunctionId::new(ROOT, table.insert(mangled, function))
    }

    /// Like [`Session::add_function`], returning the mangled name.
    pub(crate) fn add_generated(&mut self, function: Function) -> String {
        let fid = self.add_function(function);
        self.table()
            .get(fid.index())
            .map(|f| f.name().to_string())
            .unwrap_or_default()
    }

    pub fn function_by_name(&self, mangled: &str) -> Option<&Function> {
        self.table().by_name(mangled)
    }

    pub fn function_id(&self, mangled: &str) -> Option<FunctionId> {
        self.table()
            .index_of(mangled)
            .map(|i| FunctionId::new(ROOT, i))
    }

    /// Every overload of `raw` visible from `ns`.
    pub fn overloads(&self, ns: NamespaceId, raw: Symbol) -> SemaResult<Vec<FunctionId>> {
        let mut found = Vec::new();
        for id in self.chain(ns)? {
            let table = &self.ns(id)?.functions;
            found.extend(
                table
                    .overload_indices(raw)
                    .iter()
                    .map(|&i| FunctionId::new(id, i)),
            );
        }
        Ok(found)
    }

    /// Allocate (or extend) the type matcher serving `raw`. Always lives in
    /// the root table so one dispatcher serves the whole unit.
    pub(crate) fn allocate_type_matcher(&mut self, raw: Symbol, candidates: Vec<String>) -> String {
        let raw_text = self.text(raw).to_string();
        let table = self.table_mut();
        if let Some(&i) = table.type_matcher_index.get(&raw) {
            let matcher = &mut table.type_matchers[i];
            for c in candidates {
                if !matcher.candidates.contains(&c) {
                    matcher.candidates.push(c);
                }
            }
            return matcher.name.clone();
        }
        let name = format!("{}$match", raw_text);
        log::debug!("allocate type matcher `{}` over {:?}", name, candidates);
        table.type_matcher_index.insert(raw, table.type_matchers.len());
        table.type_matchers.push(TypeMatcher {
            name: name.clone(),
            raw_name: raw_text,
            candidates,
        });
        name
    }

    /// Whether `other` can fall back to the literal-pattern overload
    /// `pattern`: same arity, same types, except that each literal of
    /// `pattern` must fit the corresponding parameter type of `other`.
    pub(crate) fn dynamic_pattern_compatible(
        &self,
        pattern: FunctionId,
        other: FunctionId,
    ) -> SemaResult<bool> {
        let p = self.function(pattern)?.param_sigs();
        let o = self.function(other)?.param_sigs();
        if p.len() != o.len() {
            return Ok(false);
        }
        Ok(p.iter().zip(o).all(|(ps, os)| match (&ps.kind, &os.kind) {
            (ParamKind::Pattern(_), ParamKind::Pattern(_)) => false,
            (ParamKind::Pattern(value), _) => value.fits(os.ty),
            (_, ParamKind::Pattern(_)) => false,
            _ => ps.ty == os.ty,
        }))
    }

    /// Mark overloads that need a generated runtime pattern dispatcher.
    /// Runs after every function's compile-time pass.
    pub(crate) fn detect_dynamic_patterns(&mut self) -> SemaResult<()> {
        let raws = self.table().static_patterns.clone();
        for raw in raws {
            let ids: Vec<FunctionId> = self
                .table()
                .overload_indices(raw)
                .iter()
                .map(|&i| FunctionId::new(ROOT, i))
                .collect();
            let (patterns, others): (Vec<_>, Vec<_>) = ids
                .into_iter()
                .filter(|&fid| self.function(fid).map(|f| !f.is_template()).unwrap_or(false))
                .partition(|&fid| {
                    self.function(fid)
                        .map(|f| f.has_pattern_params())
                        .unwrap_or(false)
                });
            for other in others {
                let mut compatible = Vec::new();
                for &pattern in &patterns {
                    if self.dynamic_pattern_compatible(pattern, other)? {
                        compatible.push(self.function(pattern)?.name().to_string());
                    }
                }
                if compatible.is_empty() {
                    continue;
                }
                let target = self.function(other)?.name().to_string();
                let name = format!("{}$pattern", target);
                log::debug!("dynamic pattern dispatcher `{}` over {:?}", name, compatible);
                self.function_mut(other)?.pattern_dispatcher = Some(name.clone());
                self.table_mut().pattern_matchers.push(PatternMatcher {
                    name,
                    target,
                    patterns: compatible,
                });
            }
        }
        Ok(())
    }

    /// Fully infer every queued template instance, including instances
    /// queued while draining.
    pub(crate) fn drain_pending_instances(&mut self) -> SemaResult<bool> {
        let mut ok = true;
        while let Some(fid) = self.table_mut().pending_instances.pop_front() {
            log::debug!("infer pending instance {}", fid);
            ok &= self.infer_function(fid)?;
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use crate::ty;
    use rowan::TextRange;

    fn loc() -> TextRange {
        TextRange::empty(0.into())
    }

    fn sig(ty: TypeId) -> ParamSig {
        ParamSig {
            ty,
            kind: ParamKind::Value,
        }
    }

    fn generated(raw: quill_common::Symbol, param: TypeId, ret: TypeId) -> Function {
        Function::generated(raw, vec![sig(param)], ret, vec![], loc())
    }

    #[test]
    fn overload_names_are_suffixed_after_the_first() {
        let mut sess = Session::new();
        let raw = sess.intern("area");
        let a = sess.add_generated(generated(raw, ty::INTEGER, ty::INTEGER));
        let b = sess.add_generated(generated(raw, ty::REAL, ty::REAL));
        assert_eq!(a, "area");
        assert_eq!(b, "area$1");
        assert_eq!(sess.table().overloads_of(raw), vec!["area", "area$1"]);
        let (params, ret) = sess.table().signature_of("area$1").unwrap();
        assert_eq!(params[0].ty, ty::REAL);
        assert_eq!(ret, Some(ty::REAL));
    }

    #[test]
    fn duplicate_mangled_names_are_internal_errors() {
        let mut table = FunctionTable::new();
        let mut sess = Session::new();
        let raw = sess.intern("f");
        table.register("f".into(), Function::new(raw, loc())).unwrap();
        let err = table.register("f".into(), Function::new(raw, loc())).unwrap_err();
        assert_eq!(err, InternalError::DuplicateMangledName { name: "f".into() });
    }

    #[test]
    fn type_matchers_are_memoized_per_raw_name() {
        let mut sess = Session::new();
        let raw = sess.intern("draw");
        let first = sess.allocate_type_matcher(raw, vec!["draw".into()]);
        let second = sess.allocate_type_matcher(raw, vec!["draw".into(), "draw$1".into()]);
        assert_eq!(first, "draw$match");
        assert_eq!(first, second);
        let matcher = sess.table().type_matcher(raw).unwrap();
        assert_eq!(matcher.candidates, vec!["draw", "draw$1"]);
        assert_eq!(sess.table().type_matchers().len(), 1);
    }

    #[test]
    fn pattern_siblings_get_dispatchers() {
        let mut sess = Session::new();
        let raw = sess.intern("fib");
        let mut zero = Function::generated(
            raw,
            vec![ParamSig {
                ty: ty::INTEGER,
                kind: ParamKind::Pattern(crate::literal::LiteralValue::Integer(0)),
            }],
            ty::INTEGER,
            vec![],
            loc(),
        );
        zero.params.push(crate::function::Param::Pattern {
            value: crate::literal::LiteralValue::Integer(0),
            loc: loc(),
        });
        sess.add_function(zero);
        sess.add_generated(generated(raw, ty::INTEGER, ty::INTEGER));
        sess.add_generated(generated(raw, ty::BOOLEAN, ty::INTEGER));

        sess.detect_dynamic_patterns().unwrap();
        assert_eq!(
            sess.function_by_name("fib$1").unwrap().pattern_dispatcher(),
            Some("fib$1$pattern")
        );
        assert_eq!(sess.function_by_name("fib$2").unwrap().pattern_dispatcher(), None);
        let matchers = sess.table().pattern_matchers();
        assert_eq!(matchers.len(), 1);
        assert_eq!(matchers[0].patterns, vec!["fib"]);
    }
}
