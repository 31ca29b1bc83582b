//! Functions and their inference passes.
//!
//! A function is inferred at three granularities: parameters only,
//! parameters and return type (its externally visible signature), and in
//! full including the body. Each pass runs at most once. Template functions
//! succeed trivially at every granularity until instantiated.

use std::fmt;

use quill_common::Symbol;
use rowan::TextRange;
use rustc_hash::FxHashMap;

use crate::code_block::CodeBlock;
use crate::error::{InternalError, SemaResult, SemanticErrorKind};
use crate::expr::{Atom, Expression, StatementContext};
use crate::literal::LiteralValue;
use crate::namespace::{NamespaceId, Session, Site, ROOT};
use crate::scope::{Variable, VariableOrigin};
use crate::template::TemplateParam;
use crate::ty::{self, TypeId, TypeRef};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId {
    ns: NamespaceId,
    index: u32,
}

impl FunctionId {
    pub(crate) fn new(ns: NamespaceId, index: u32) -> FunctionId {
        FunctionId { ns, index }
    }

    /// The namespace whose table holds the function.
    pub fn ns(self) -> NamespaceId {
        self.ns
    }

    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:fn{}", self.ns, self.index)
    }
}

/// Compiler hooks attached to a function.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionTag {
    /// Constructs `ty`. When `declares` is set, the compile-time pass of a
    /// call declares the variable named by the first argument.
    Constructor { ty: TypeId, declares: bool },
    Accessor { structure: TypeId, member: Symbol },
    /// Implemented by the code generator.
    Intrinsic,
}

/// A formal parameter as written in source.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Named {
        name: Symbol,
        ty: TypeRef,
        reference: bool,
        loc: TextRange,
    },
    /// A higher-order parameter with its own signature.
    Function {
        name: Symbol,
        params: Vec<TypeRef>,
        ret: TypeRef,
        loc: TextRange,
    },
    /// A literal the argument must statically equal.
    Pattern { value: LiteralValue, loc: TextRange },
}

impl Param {
    pub fn name(&self) -> Option<Symbol> {
        match self {
            Param::Named { name, .. } | Param::Function { name, .. } => Some(*name),
            Param::Pattern { .. } => None,
        }
    }

    pub fn loc(&self) -> TextRange {
        match self {
            Param::Named { loc, .. } | Param::Function { loc, .. } | Param::Pattern { loc, .. } => {
                *loc
            }
        }
    }

    pub(crate) fn substitute(&self, bindings: &FxHashMap<Symbol, TypeId>) -> Param {
        match self {
            Param::Named {
                name,
                ty,
                reference,
                loc,
            } => Param::Named {
                name: *name,
                ty: ty.substitute(bindings),
                reference: *reference,
                loc: *loc,
            },
            Param::Function {
                name,
                params,
                ret,
                loc,
            } => Param::Function {
                name: *name,
                params: params.iter().map(|p| p.substitute(bindings)).collect(),
                ret: ret.substitute(bindings),
                loc: *loc,
            },
            Param::Pattern { .. } => self.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParamKind {
    Value,
    Reference,
    Function,
    Pattern(LiteralValue),
}

/// A resolved parameter slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSig {
    pub ty: TypeId,
    pub kind: ParamKind,
}

/// Progress of a memoized pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Progress {
    #[default]
    Pending,
    InProgress,
    /// Finished; the flag records success.
    Done(bool),
}

#[derive(Clone, Debug)]
pub struct Function {
    pub(crate) name: String,
    pub raw_name: Symbol,
    pub params: Vec<Param>,
    pub template_params: Vec<TemplateParam>,
    pub declared_return: Option<TypeRef>,
    pub ret: Option<Expression>,
    pub body: Option<CodeBlock>,
    pub tags: Vec<FunctionTag>,
    pub loc: TextRange,
    /// Root scope of the parameters. Absent for generated functions.
    pub scope: Option<crate::scope::ScopeId>,
    pub(crate) home: NamespaceId,
    pub(crate) param_sigs: Vec<ParamSig>,
    pub(crate) return_type: Option<TypeId>,
    pub(crate) return_hint: Option<TypeId>,
    pub(crate) compile_time_done: bool,
    pub(crate) params_pass: Progress,
    pub(crate) signature_pass: Progress,
    pub(crate) full_pass: Progress,
    pub(crate) inferring_return: bool,
    pub(crate) recursion_detected: bool,
    pub(crate) instance_of: Option<FunctionId>,
    pub(crate) template_args: Vec<TypeId>,
    pub(crate) pattern_dispatcher: Option<String>,
}

impl Function {
    pub fn new(raw_name: Symbol, loc: TextRange) -> Function {
        Function {
            name: String::new(),
            raw_name,
            params: Vec::new(),
            template_params: Vec::new(),
            declared_return: None,
            ret: None,
            body: None,
            tags: Vec::new(),
            loc,
            scope: None,
            home: ROOT,
            param_sigs: Vec::new(),
            return_type: None,
            return_hint: None,
            compile_time_done: false,
            params_pass: Progress::Pending,
            signature_pass: Progress::Pending,
            full_pass: Progress::Pending,
            inferring_return: false,
            recursion_detected: false,
            instance_of: None,
            template_args: Vec::new(),
            pattern_dispatcher: None,
        }
    }

    /// A compiler-synthesized function with a known signature and no body.
    pub(crate) fn generated(
        raw_name: Symbol,
        params: Vec<ParamSig>,
        ret: TypeId,
        tags: Vec<FunctionTag>,
        loc: TextRange,
    ) -> Function {
        let mut f = Function::new(raw_name, loc);
        f.param_sigs = params;
        f.return_type = Some(ret);
        f.tags = tags;
        f.compile_time_done = true;
        f.params_pass = Progress::Done(true);
        f.signature_pass = Progress::Done(true);
        f.full_pass = Progress::Done(true);
        f
    }

    /// The mangled name, unique per overload.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_template(&self) -> bool {
        !self.template_params.is_empty()
    }

    pub fn arity(&self) -> usize {
        match self.params_pass {
            Progress::Done(_) => self.param_sigs.len(),
            _ => self.params.len(),
        }
    }

    pub fn param_sigs(&self) -> &[ParamSig] {
        &self.param_sigs
    }

    pub fn return_type(&self) -> Option<TypeId> {
        self.return_type
    }

    pub fn has_pattern_params(&self) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, Param::Pattern { .. }))
            || self
                .param_sigs
                .iter()
                .any(|p| matches!(p.kind, ParamKind::Pattern(_)))
    }

    /// Name of the generated runtime pattern dispatcher, if one is needed.
    pub fn pattern_dispatcher(&self) -> Option<&str> {
        self.pattern_dispatcher.as_deref()
    }

    pub fn recursion_detected(&self) -> bool {
        self.recursion_detected
    }

    pub fn instance_of(&self) -> Option<FunctionId> {
        self.instance_of
    }

    pub fn template_args(&self) -> &[TypeId] {
        &self.template_args
    }

    pub fn signature_state(&self) -> Progress {
        self.signature_pass
    }

    pub fn inference_state(&self) -> Progress {
        self.full_pass
    }

    /// The type this function constructs and whether it declares a variable.
    pub fn constructor(&self) -> Option<(TypeId, bool)> {
        self.tags.iter().find_map(|t| match t {
            FunctionTag::Constructor { ty, declares } => Some((*ty, *declares)),
            _ => None,
        })
    }
}

// ── Passes ─────────────────────────────────────────────────────────────

impl Session {
    /// A user function named `name` with a fresh parameter scope.
    pub fn new_function(&mut self, name: &str) -> SemaResult<Function> {
        let raw = self.intern(name);
        let mut f = Function::new(raw, TextRange::empty(0.into()));
        f.scope = Some(self.new_scope(None)?);
        Ok(f)
    }

    /// Register a parsed function as a new overload of its raw name.
    pub fn declare_function(&mut self, function: Function) -> FunctionId {
        self.add_function(function)
    }

    pub fn function(&self, fid: FunctionId) -> SemaResult<&Function> {
        self.ns(fid.ns)?.functions.get(fid.index)
    }

    pub(crate) fn function_mut(&mut self, fid: FunctionId) -> SemaResult<&mut Function> {
        self.ns_mut(fid.ns)?.functions.get_mut(fid.index)
    }

    fn function_site(&self, fid: FunctionId) -> SemaResult<Site> {
        let f = self.function(fid)?;
        match f.scope {
            Some(scope) => Ok(Site {
                ns: f.home,
                scope,
                function: Some(fid),
            }),
            None => Err(InternalError::UnknownFunction {
                name: f.name.clone(),
            }),
        }
    }

    /// Execute the compile-time effects of a function's body and return
    /// expression, once.
    pub(crate) fn function_compile_time_pass(&mut self, fid: FunctionId) -> SemaResult<()> {
        let f = self.function(fid)?;
        if f.compile_time_done || f.is_template() {
            return Ok(());
        }
        self.function_mut(fid)?.compile_time_done = true;
        self.infer_parameters(fid)?;
        let site = self.function_site(fid)?;

        if let Some(mut body) = self.function_mut(fid)?.body.take() {
            let result = body.run_compile_time_pass(self, site);
            self.function_mut(fid)?.body = Some(body);
            result?;
        }
        if let Some(mut ret) = self.function_mut(fid)?.ret.take() {
            let result = ret.run_compile_time_pass(self, site);
            self.function_mut(fid)?.ret = Some(ret);
            result?;
        }
        Ok(())
    }

    /// Resolve parameter types and declare the parameters in the function
    /// scope. Does not look at the return expression or body.
    pub fn infer_parameters(&mut self, fid: FunctionId) -> SemaResult<bool> {
        let f = self.function(fid)?;
        if f.is_template() {
            return Ok(true);
        }
        match f.params_pass {
            Progress::Done(ok) => return Ok(ok),
            Progress::InProgress => return Ok(true),
            Progress::Pending => {}
        }
        let (params, home, scope) = (f.params.clone(), f.home, f.scope);
        self.function_mut(fid)?.params_pass = Progress::InProgress;

        let mut ok = true;
        let mut sigs = Vec::with_capacity(params.len());
        let mut seen: Vec<Symbol> = Vec::new();
        for param in &params {
            let sig = match param {
                Param::Named { ty, reference, .. } => {
                    let kind = if *reference {
                        ParamKind::Reference
                    } else {
                        ParamKind::Value
                    };
                    self.resolve_type_ref(home, ty)?
                        .map(|ty| ParamSig { ty, kind })
                }
                Param::Function { params, ret, .. } => {
                    let mut tys = Vec::with_capacity(params.len());
                    for p in params {
                        if let Some(t) = self.resolve_type_ref(home, p)? {
                            tys.push(t);
                        }
                    }
                    match self.resolve_type_ref(home, ret)? {
                        Some(ret) if tys.len() == params.len() => Some(ParamSig {
                            ty: self.signature_type(tys, ret)?,
                            kind: ParamKind::Function,
                        }),
                        _ => None,
                    }
                }
                Param::Pattern { value, .. } => Some(ParamSig {
                    ty: value.default_type(),
                    kind: ParamKind::Pattern(value.clone()),
                }),
            };
            let Some(sig) = sig else {
                ok = false;
                sigs.push(ParamSig {
                    ty: ty::VOID,
                    kind: ParamKind::Value,
                });
                continue;
            };

            if let (Some(name), Some(scope)) = (param.name(), scope) {
                self.diagnostics.set_context(param.loc());
                if seen.contains(&name) {
                    let text = self.text(name).to_string();
                    self.diagnostics.report(SemanticErrorKind::DuplicateName {
                        name: text,
                        what: "parameter",
                    });
                    ok = false;
                } else {
                    seen.push(name);
                    let var = Variable {
                        name: self.text(name).to_string(),
                        symbol: name,
                        ty: sig.ty,
                        origin: VariableOrigin::Parameter,
                        reference: sig.kind == ParamKind::Reference,
                    };
                    ok &= self.add_variable(home, scope, var)?;
                }
            }
            sigs.push(sig);
        }

        let f = self.function_mut(fid)?;
        f.param_sigs = sigs;
        f.params_pass = Progress::Done(ok);
        Ok(ok)
    }

    /// Infer parameters and return type. Re-entrant calls, as made by a
    /// recursive function, get the best-known return type instead.
    pub fn infer_signature(&mut self, fid: FunctionId) -> SemaResult<Option<TypeId>> {
        let f = self.function(fid)?;
        if f.is_template() {
            return Ok(None);
        }
        match f.signature_pass {
            Progress::Done(_) => return Ok(f.return_type),
            Progress::InProgress => return self.best_known_return(fid),
            Progress::Pending => {}
        }
        log::debug!("infer signature of `{}`", f.name);
        self.function_mut(fid)?.signature_pass = Progress::InProgress;

        let (ret, ok) = self.infer_signature_inner(fid)?;
        let f = self.function_mut(fid)?;
        f.return_type = ret;
        f.signature_pass = Progress::Done(ok && ret.is_some());
        Ok(ret)
    }

    fn infer_signature_inner(&mut self, fid: FunctionId) -> SemaResult<(Option<TypeId>, bool)> {
        let mut ok = self.infer_parameters(fid)?;
        self.function_compile_time_pass(fid)?;
        let site = self.function_site(fid)?;

        let f = self.function(fid)?;
        let (declared_ref, loc) = (f.declared_return.clone(), f.loc);
        let declared = match &declared_ref {
            Some(r) => {
                let d = self.resolve_type_ref(site.ns, r)?;
                ok &= d.is_some();
                d
            }
            None => None,
        };

        let mut inferred = None;
        let mut has_ret = false;
        if let Some(mut expr) = self.function_mut(fid)?.ret.take() {
            has_ret = true;
            self.function_mut(fid)?.inferring_return = true;
            let result = expr.infer_in(self, site, StatementContext::Return);
            inferred = expr.ty();
            if let (Some(d), Some(i)) = (declared, inferred) {
                if d != i {
                    if self.coerce_to(&mut expr, d) {
                        inferred = Some(d);
                    } else {
                        self.diagnostics.report_at(
                            loc,
                            SemanticErrorKind::TypeMismatch {
                                expected: self.type_name(d)?,
                                found: self.type_name(i)?,
                            },
                        );
                        ok = false;
                    }
                }
            }
            let f = self.function_mut(fid)?;
            f.inferring_return = false;
            f.ret = Some(expr);
            ok &= result?;
        }

        let ret = match (declared, inferred) {
            (Some(d), _) => Some(d),
            (None, Some(i)) => Some(i),
            (None, None) if !has_ret => Some(ty::VOID),
            (None, None) => None,
        };

        if let Some(t) = ret.filter(|t| *t != ty::VOID) {
            let symbol = self.intern("return");
            self.ns_mut(site.ns)?.scopes.insert(
                site.scope,
                Variable {
                    name: "return".to_string(),
                    symbol,
                    ty: t,
                    origin: VariableOrigin::Return,
                    reference: false,
                },
            )?;
        }
        Ok((ret, ok))
    }

    /// Make `expr` (already inferred) produce `target`: demote a bare
    /// literal or annotate an upcast into a sum type.
    pub(crate) fn coerce_to(&mut self, expr: &mut Expression, target: TypeId) -> bool {
        let Some(found) = expr.ty() else {
            return false;
        };
        if found == target {
            return true;
        }
        if self.config.literal_demotion {
            if let Some(lit) = expr.single_literal_mut() {
                if lit.demote(target) {
                    expr.ty = Some(target);
                    return true;
                }
            }
        }
        if self.types().is_base_of(target, found) {
            expr.atoms.push(Atom::TypeAnnotation(target));
            expr.ty = Some(target);
            return true;
        }
        false
    }

    /// Return type of a function whose signature is still being inferred:
    /// the declared type, the return-position hint or the type of a
    /// literal-pattern sibling overload.
    fn best_known_return(&mut self, fid: FunctionId) -> SemaResult<Option<TypeId>> {
        let f = self.function_mut(fid)?;
        f.recursion_detected = true;
        let (declared, hint, raw, home, name) = (
            f.declared_return.clone(),
            f.return_hint,
            f.raw_name,
            f.home,
            f.name.clone(),
        );
        log::trace!("recursive signature request for `{}`", name);
        if let Some(r) = declared {
            if let Some(t) = self.resolve_type_ref(home, &r)? {
                return Ok(Some(t));
            }
        }
        if let Some(t) = hint {
            return Ok(Some(t));
        }
        for sibling in self.overloads(home, raw)? {
            if sibling == fid {
                continue;
            }
            let s = self.function(sibling)?;
            if !s.has_pattern_params() || s.signature_pass == Progress::InProgress {
                continue;
            }
            if !self.dynamic_pattern_compatible(sibling, fid)? {
                continue;
            }
            if let Some(t) = self.infer_signature(sibling)? {
                return Ok(Some(t));
            }
        }
        let raw_text = self.text(raw).to_string();
        self.diagnostics
            .report(SemanticErrorKind::RecursiveInference { name: raw_text });
        Ok(None)
    }

    /// Full inference: signature and body. Idempotent.
    pub fn infer_function(&mut self, fid: FunctionId) -> SemaResult<bool> {
        let f = self.function(fid)?;
        if f.is_template() {
            return Ok(true);
        }
        match f.full_pass {
            Progress::Done(ok) => return Ok(ok),
            Progress::InProgress => return Ok(true),
            Progress::Pending => {}
        }
        self.function_mut(fid)?.full_pass = Progress::InProgress;

        self.infer_signature(fid)?;
        let mut ok = self.function(fid)?.signature_pass == Progress::Done(true);
        if let Some(mut body) = self.function_mut(fid)?.body.take() {
            let site = self.function_site(fid)?;
            let result = body.run_type_inference(self, site);
            self.function_mut(fid)?.body = Some(body);
            ok &= result?;
        }
        self.function_mut(fid)?.full_pass = Progress::Done(ok);
        Ok(ok)
    }

    /// Whether a function reached a fully resolved state.
    pub(crate) fn validate_function(&self, fid: FunctionId) -> SemaResult<bool> {
        let f = self.function(fid)?;
        if f.is_template() {
            return Ok(true);
        }
        let mut ok = f.full_pass == Progress::Done(true);
        if let Some(body) = &f.body {
            ok &= body.validate(self)?;
        }
        if let Some(ret) = &f.ret {
            ok &= ret.is_resolved();
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build;

    #[test]
    fn generated_functions_are_already_inferred() {
        let mut sess = Session::new();
        let raw = sess.intern("make");
        let f = Function::generated(
            raw,
            vec![ParamSig {
                ty: ty::INTEGER,
                kind: ParamKind::Value,
            }],
            ty::REAL,
            Vec::new(),
            TextRange::empty(0.into()),
        );
        let fid = sess.declare_function(f);
        assert_eq!(sess.infer_signature(fid).unwrap(), Some(ty::REAL));
        assert!(sess.infer_function(fid).unwrap());
        assert_eq!(sess.function(fid).unwrap().arity(), 1);
    }

    #[test]
    fn parameters_are_declared_in_the_function_scope() {
        let mut sess = Session::new();
        let mut f = sess.new_function("scale").unwrap();
        f.params.push(build::param(&mut sess, "factor", "real"));
        f.params.push(build::ref_param(&mut sess, "target", "real"));
        let scope = f.scope.unwrap();
        let fid = sess.declare_function(f);

        assert!(sess.infer_parameters(fid).unwrap());
        let sigs = sess.function(fid).unwrap().param_sigs().to_vec();
        assert_eq!(sigs[0].ty, ty::REAL);
        assert_eq!(sigs[1].kind, ParamKind::Reference);
        let vars = sess.ns(ROOT).unwrap().scopes.variables(scope).unwrap();
        assert_eq!(vars.len(), 2);
        assert!(vars[1].reference);
    }

    #[test]
    fn duplicate_parameters_are_reported() {
        let mut sess = Session::new();
        let mut f = sess.new_function("twice").unwrap();
        f.params.push(build::param(&mut sess, "a", "integer"));
        f.params.push(build::param(&mut sess, "a", "integer"));
        let fid = sess.declare_function(f);
        assert!(!sess.infer_parameters(fid).unwrap());
        assert!(matches!(
            sess.diagnostics.errors()[0].kind,
            SemanticErrorKind::DuplicateName { what: "parameter", .. }
        ));
    }

    #[test]
    fn declared_return_type_is_checked() {
        let mut sess = Session::new();
        let mut f = sess.new_function("flag").unwrap();
        f.declared_return = Some(build::ty(&mut sess, "boolean"));
        f.ret = Some(build::expr(vec![build::int(3)]));
        let fid = sess.declare_function(f);
        sess.run_compile_time_pass().unwrap();
        assert_eq!(sess.infer_signature(fid).unwrap(), Some(ty::BOOLEAN));
        assert!(matches!(
            sess.diagnostics.errors()[0].kind,
            SemanticErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn declared_return_demotes_literals() {
        let mut sess = Session::new();
        let mut f = sess.new_function("small").unwrap();
        f.declared_return = Some(build::ty(&mut sess, "byte"));
        f.ret = Some(build::expr(vec![build::int(3)]));
        let fid = sess.declare_function(f);
        sess.run_compile_time_pass().unwrap();
        assert_eq!(sess.infer_signature(fid).unwrap(), Some(ty::BYTE));
        assert!(!sess.diagnostics.has_errors());
    }

    #[test]
    fn templates_short_circuit() {
        let mut sess = Session::new();
        let mut f = sess.new_function("id").unwrap();
        f.template_params.push(build::type_param(&mut sess, "T"));
        f.params.push(build::param(&mut sess, "x", "T"));
        let fid = sess.declare_function(f);
        assert!(sess.infer_parameters(fid).unwrap());
        assert_eq!(sess.infer_signature(fid).unwrap(), None);
        assert!(sess.infer_function(fid).unwrap());
        assert!(!sess.diagnostics.has_errors());
    }
}
