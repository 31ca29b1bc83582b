//! Statements: named invocations and their overload resolution.
//!
//! Resolution collects every arity-compatible overload, classifies each
//! argument against each parameter slot and ranks the surviving
//! candidates: literal-pattern matches first, then exact matches, then
//! matches that needed a literal demotion, then matches that upcast an
//! argument into a sum type. When only sum decompositions match, the call
//! is routed through a generated type matcher instead.

use quill_common::Symbol;
use rowan::TextRange;
use rustc_hash::FxHashMap;

use crate::error::{SemaResult, SemanticErrorKind};
use crate::expr::{concrete_overloads, Atom, Expression, StatementContext};
use crate::function::{FunctionId, ParamKind, ParamSig, Progress};
use crate::namespace::{Session, Site};
use crate::scope::{Variable, VariableOrigin};
use crate::ty::{self, TypeId, TypeRef};

/// A call routed through a generated runtime type matcher.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatch {
    pub matcher: String,
    pub candidates: Vec<String>,
    /// Number of base-type combinations the matcher covers.
    pub permutations: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub name: Symbol,
    pub args: Vec<Expression>,
    /// Explicit template arguments, as in `make<integer>(x)`.
    pub template_args: Vec<TypeRef>,
    pub loc: TextRange,
    /// Raw name after template instantiation.
    pub(crate) lookup: Option<Symbol>,
    pub(crate) resolved: Option<String>,
    pub(crate) ty: Option<TypeId>,
    pub(crate) state: Progress,
    pub(crate) compile_time_done: bool,
    pub(crate) dispatch: Option<Dispatch>,
    /// Calls a variable of function type rather than an overload.
    pub(crate) invocation: bool,
    /// The first argument names the variable this call declares.
    pub(crate) declaring: bool,
}

/// How one argument fits one parameter slot.
#[derive(Clone, Debug, PartialEq)]
enum Slot {
    Exact,
    Pattern,
    Narrow(TypeId),
    Upcast(TypeId),
    /// A sum-typed argument passed to one of its bases.
    Decompose,
    /// An overloaded function name bound to the overload with this
    /// signature.
    FunctionRef(String, TypeId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Pattern,
    Exact,
    Narrowed,
    Upcast,
    Decompose,
}

#[derive(Debug)]
struct Candidate {
    fid: FunctionId,
    params: Vec<ParamSig>,
    slots: Vec<Slot>,
}

impl Candidate {
    fn tier(&self) -> Tier {
        let has = |f: fn(&Slot) -> bool| self.slots.iter().any(f);
        if has(|s| matches!(s, Slot::Decompose)) {
            Tier::Decompose
        } else if has(|s| matches!(s, Slot::Pattern)) {
            Tier::Pattern
        } else if has(|s| matches!(s, Slot::Upcast(_))) {
            Tier::Upcast
        } else if has(|s| matches!(s, Slot::Narrow(_))) {
            Tier::Narrowed
        } else {
            Tier::Exact
        }
    }
}

impl Statement {
    pub fn new(name: Symbol, args: Vec<Expression>, loc: TextRange) -> Statement {
        Statement {
            name,
            args,
            template_args: Vec::new(),
            loc,
            lookup: None,
            resolved: None,
            ty: None,
            state: Progress::Pending,
            compile_time_done: false,
            dispatch: None,
            invocation: false,
            declaring: false,
        }
    }

    pub fn with_template_args(mut self, args: Vec<TypeRef>) -> Statement {
        self.template_args = args;
        self
    }

    /// Mangled name of the bound overload or dispatcher.
    pub fn resolved(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    pub fn ty(&self) -> Option<TypeId> {
        self.ty
    }

    pub fn dispatch(&self) -> Option<&Dispatch> {
        self.dispatch.as_ref()
    }

    pub fn is_invocation(&self) -> bool {
        self.invocation
    }

    pub fn is_resolved(&self) -> bool {
        self.state == Progress::Done(true)
            && self.ty.is_some()
            && (self.resolved.is_some() || self.invocation)
            && self.args.iter().all(Expression::is_resolved)
    }

    pub(crate) fn substitute(&self, bindings: &FxHashMap<Symbol, TypeId>) -> Statement {
        Statement::new(
            self.name,
            self.args.iter().map(|a| a.substitute(bindings)).collect(),
            self.loc,
        )
        .with_template_args(
            self.template_args
                .iter()
                .map(|t| t.substitute(bindings))
                .collect(),
        )
    }

    // ── Compile-time pass ──────────────────────────────────────────────

    /// Instantiate templates named by explicit arguments and declare the
    /// variable a declaring constructor names. Runs once.
    pub fn run_compile_time_pass(&mut self, sess: &mut Session, site: Site) -> SemaResult<()> {
        if self.compile_time_done {
            return Ok(());
        }
        self.compile_time_done = true;
        for arg in &mut self.args {
            arg.run_compile_time_pass(sess, site)?;
        }
        if !self.template_args.is_empty() {
            let mut args = Vec::with_capacity(self.template_args.len());
            for r in &self.template_args {
                match sess.resolve_type_ref(site.ns, r)? {
                    Some(t) => args.push(t),
                    None => return Ok(()),
                }
            }
            self.lookup = sess.instantiate_for_call(site, self.name, args, self.loc)?;
            if self.lookup.is_none() {
                return Ok(());
            }
        }
        self.declare_constructed(sess, site)
    }

    /// Declare the variable named by the first argument of a declaring
    /// constructor. A visible name is left alone only when an overload of
    /// the same arity takes it as a value; otherwise redeclaring it is
    /// reported as shadowing.
    fn declare_constructed(&mut self, sess: &mut Session, site: Site) -> SemaResult<()> {
        let Some(first) = self.args.first().and_then(Expression::bare_ident) else {
            return Ok(());
        };
        let (name, loc) = (first.name, first.loc);
        let lookup = self.lookup.unwrap_or(self.name);
        let mut constructed = None;
        let mut plain = false;
        for fid in concrete_overloads(sess, site, lookup)? {
            let f = sess.function(fid)?;
            if f.arity() != self.args.len() {
                continue;
            }
            match f.constructor() {
                Some((ty, true)) => constructed = constructed.or(Some(ty)),
                _ => plain = true,
            }
        }
        let Some(ty) = constructed else {
            return Ok(());
        };
        if plain && sess.lookup_variable(site, name)?.is_some() {
            return Ok(());
        }
        self.declaring = true;
        let text = sess.text(name).to_string();
        log::trace!("constructor `{}` declares `{}`", sess.text(lookup), text);
        sess.diagnostics.set_context(loc);
        let var = Variable {
            name: text,
            symbol: name,
            ty,
            origin: VariableOrigin::Local,
            reference: false,
        };
        sess.add_variable(site.ns, site.scope, var)?;
        Ok(())
    }

    // ── Inference ──────────────────────────────────────────────────────

    /// Resolve the statement to one overload, a type matcher or a
    /// function-typed variable. Idempotent.
    pub fn infer(
        &mut self,
        sess: &mut Session,
        site: Site,
        ctx: StatementContext,
    ) -> SemaResult<bool> {
        match self.state {
            Progress::Done(ok) => return Ok(ok),
            Progress::InProgress => return Ok(self.ty.is_some()),
            Progress::Pending => {}
        }
        self.state = Progress::InProgress;
        let ok = self.infer_inner(sess, site, ctx)?;
        self.state = Progress::Done(ok);
        Ok(ok)
    }

    fn infer_inner(
        &mut self,
        sess: &mut Session,
        site: Site,
        ctx: StatementContext,
    ) -> SemaResult<bool> {
        self.run_compile_time_pass(sess, site)?;
        if ctx == StatementContext::Return {
            hint_return(sess, site, self.lookup.unwrap_or(self.name))?;
        }
        if !self.template_args.is_empty() && self.lookup.is_none() {
            return Ok(false);
        }
        let lookup = self.lookup.unwrap_or(self.name);
        let overloads = concrete_overloads(sess, site, lookup)?;
        if overloads.is_empty() {
            return self.infer_invocation(sess, site, lookup);
        }

        let mut arity_matches = Vec::new();
        for fid in overloads {
            sess.infer_parameters(fid)?;
            let f = sess.function(fid)?;
            if f.arity() == self.args.len() {
                arity_matches.push((fid, f.param_sigs().to_vec()));
            }
        }
        if !self.infer_args(sess, site, &arity_matches)? {
            return Ok(false);
        }

        let mut matched = Vec::new();
        'candidates: for (fid, params) in arity_matches {
            let mut slots = Vec::with_capacity(params.len());
            for (param, arg) in params.iter().zip(&self.args) {
                match classify(sess, site, param, arg)? {
                    Some(slot) => slots.push(slot),
                    None => continue 'candidates,
                }
            }
            log::trace!("candidate `{}`: {:?}", sess.function(fid)?.name(), slots);
            matched.push(Candidate { fid, params, slots });
        }

        sess.diagnostics.set_context(self.loc);
        let best = matched
            .iter()
            .map(Candidate::tier)
            .filter(|t| *t != Tier::Decompose)
            .min();
        if let Some(tier) = best {
            let mut top: Vec<Candidate> =
                matched.into_iter().filter(|c| c.tier() == tier).collect();
            if tier == Tier::Upcast && top.len() > 1 {
                top = most_specific(sess, top);
            }
            if top.len() > 1 {
                let candidates = top
                    .iter()
                    .map(|c| sess.function(c.fid).map(|f| f.name().to_string()))
                    .collect::<SemaResult<Vec<_>>>()?;
                let name = sess.text(self.name).to_string();
                sess.diagnostics
                    .report(SemanticErrorKind::AmbiguousOverload { name, candidates });
                return Ok(false);
            }
            return match top.pop() {
                Some(candidate) => self.bind(sess, candidate),
                None => Ok(false),
            };
        }
        if !matched.is_empty() {
            return self.dispatch_on_sums(sess, lookup, matched);
        }

        let args = self.arg_names(sess)?;
        let name = sess.text(self.name).to_string();
        sess.diagnostics
            .report(SemanticErrorKind::NoMatchingOverload { name, args });
        Ok(false)
    }

    /// Infer every argument. A bare name in a slot that declares a
    /// variable is not looked up.
    fn infer_args(
        &mut self,
        sess: &mut Session,
        site: Site,
        candidates: &[(FunctionId, Vec<ParamSig>)],
    ) -> SemaResult<bool> {
        let mut ok = true;
        for (i, arg) in self.args.iter_mut().enumerate() {
            if arg.bare_ident().is_some() {
                let declares = |p: &Vec<ParamSig>| p.get(i).map(|s| s.ty) == Some(ty::IDENTIFIER);
                let all = !candidates.is_empty() && candidates.iter().all(|(_, p)| declares(p));
                if all || (i == 0 && self.declaring) {
                    arg.mark_identifier();
                    continue;
                }
            }
            ok &= arg.infer_in(sess, site, StatementContext::Parameter)?;
        }
        Ok(ok)
    }

    fn arg_names(&self, sess: &Session) -> SemaResult<Vec<String>> {
        self.args
            .iter()
            .map(|a| match (a.ty(), a.bare_ident()) {
                (Some(t), _) => sess.type_name(t),
                (None, Some(id)) => Ok(sess.text(id.name).to_string()),
                (None, None) => Ok("?".to_string()),
            })
            .collect()
    }

    /// Bind to one overload: apply demotions and upcasts, bind function
    /// references and reference parameters.
    fn bind(&mut self, sess: &mut Session, candidate: Candidate) -> SemaResult<bool> {
        let mut ok = true;
        for (i, slot) in candidate.slots.iter().enumerate() {
            let arg = &mut self.args[i];
            match slot {
                Slot::Narrow(t) | Slot::Upcast(t) => ok &= sess.coerce_to(arg, *t),
                Slot::FunctionRef(name, sig) => arg.bind_function(name.clone(), *sig),
                _ => {}
            }
            if candidate.params[i].kind == ParamKind::Reference && !arg.bind_reference() {
                sess.diagnostics
                    .report_at(arg.loc, SemanticErrorKind::NotAnLvalue);
                ok = false;
            }
        }
        let ret = sess.infer_signature(candidate.fid)?;
        let mut name = sess.function(candidate.fid)?.name().to_string();
        if let Some(real) = sess.types().ctor_indirection(&name) {
            name = real.to_string();
        }
        log::trace!("`{}` bound to `{}`", sess.text(self.name), name);
        self.resolved = Some(name);
        self.ty = ret;
        Ok(ok && ret.is_some())
    }

    /// Route a call with sum-typed arguments through a type matcher, after
    /// checking that every combination of base types has an overload.
    fn dispatch_on_sums(
        &mut self,
        sess: &mut Session,
        lookup: Symbol,
        matched: Vec<Candidate>,
    ) -> SemaResult<bool> {
        let positions: Vec<usize> = (0..self.args.len())
            .filter(|&i| matched.iter().any(|c| c.slots[i] == Slot::Decompose))
            .collect();
        let mut bases = Vec::with_capacity(positions.len());
        for &i in &positions {
            let sum = self.args[i].ty().unwrap_or(ty::VOID);
            bases.push(sess.types().sum_bases(sum).unwrap_or(&[]).to_vec());
        }
        let permutations: usize = bases.iter().map(Vec::len).product();

        let arg_names = self.arg_names(sess)?;
        let raw = sess.text(self.name).to_string();
        let mut covering: Vec<usize> = Vec::new();
        let mut missing = Vec::new();
        for combo in 0..permutations {
            let mut rest = combo;
            let mut picked = Vec::with_capacity(positions.len());
            for choices in &bases {
                picked.push(choices[rest % choices.len()]);
                rest /= choices.len();
            }
            let cover = matched.iter().position(|c| {
                positions
                    .iter()
                    .zip(&picked)
                    .all(|(&i, &base)| c.params[i].ty == base)
            });
            match cover {
                Some(index) if !covering.contains(&index) => covering.push(index),
                Some(_) => {}
                None => {
                    let mut shown = arg_names.clone();
                    for (&i, &base) in positions.iter().zip(&picked) {
                        shown[i] = sess.type_name(base)?;
                    }
                    missing.push(format!("{}({})", raw, shown.join(", ")));
                }
            }
        }
        if !missing.is_empty() {
            sess.diagnostics.report(SemanticErrorKind::MissingSumDecomposition {
                name: raw,
                missing,
            });
            return Ok(false);
        }

        let mut candidates = Vec::with_capacity(covering.len());
        let mut ret: Option<TypeId> = None;
        let mut ok = true;
        for &index in &covering {
            let fid = matched[index].fid;
            candidates.push(sess.function(fid)?.name().to_string());
            let found = sess.infer_signature(fid)?;
            match (ret, found) {
                (_, None) => ok = false,
                (None, Some(t)) => ret = Some(t),
                (Some(expected), Some(t)) if expected != t => {
                    let kind = SemanticErrorKind::TypeMismatch {
                        expected: sess.type_name(expected)?,
                        found: sess.type_name(t)?,
                    };
                    sess.diagnostics.report(kind);
                    ok = false;
                }
                _ => {}
            }
        }

        for &i in &positions {
            let Some(sum) = self.args[i].ty() else {
                continue;
            };
            let arg = &mut self.args[i];
            if arg.atoms.last() != Some(&Atom::TypeAnnotation(sum)) {
                arg.atoms.push(Atom::TypeAnnotation(sum));
            }
        }

        let matcher = sess.allocate_type_matcher(lookup, candidates.clone());
        self.resolved = Some(matcher.clone());
        self.ty = ret;
        self.dispatch = Some(Dispatch {
            matcher,
            candidates,
            permutations,
        });
        Ok(ok && ret.is_some())
    }

    /// No overloads: call a variable of function type.
    fn infer_invocation(
        &mut self,
        sess: &mut Session,
        site: Site,
        lookup: Symbol,
    ) -> SemaResult<bool> {
        let mut ok = true;
        for arg in &mut self.args {
            ok &= arg.infer_in(sess, site, StatementContext::Parameter)?;
        }
        let name = sess.text(lookup).to_string();
        let Some(var) = sess.lookup_variable(site, lookup)? else {
            sess.diagnostics
                .report_at(self.loc, SemanticErrorKind::UnresolvedIdentifier { name });
            return Ok(false);
        };
        let Some(signature) = sess.types().signature(var.ty).cloned() else {
            let ty = sess.type_name(var.ty)?;
            sess.diagnostics
                .report_at(self.loc, SemanticErrorKind::NotCallable { name, ty });
            return Ok(false);
        };
        if !ok {
            return Ok(false);
        }

        let mut fits = self.args.len() == signature.params.len();
        if fits {
            for (arg, &param) in self.args.iter_mut().zip(&signature.params) {
                fits &= sess.coerce_to(arg, param);
            }
        }
        if !fits {
            let args = self.arg_names(sess)?;
            sess.diagnostics
                .report_at(self.loc, SemanticErrorKind::NoMatchingOverload { name, args });
            return Ok(false);
        }
        self.invocation = true;
        self.ty = Some(signature.ret);
        Ok(true)
    }
}

/// Classify how `arg` fits `param`, or `None` when it cannot.
fn classify(
    sess: &mut Session,
    site: Site,
    param: &ParamSig,
    arg: &Expression,
) -> SemaResult<Option<Slot>> {
    if let ParamKind::Pattern(value) = &param.kind {
        let hit = arg.bare_literal().is_some_and(|l| l.matches_pattern(value));
        return Ok(hit.then_some(Slot::Pattern));
    }
    if param.kind == ParamKind::Function && arg.ty().is_none() {
        let Some(id) = arg.bare_ident() else {
            return Ok(None);
        };
        let mut fitting = Vec::new();
        for fid in concrete_overloads(sess, site, id.name)? {
            if sess.function_value_type(fid)? == Some(param.ty) {
                fitting.push(sess.function(fid)?.name().to_string());
            }
        }
        return Ok(match fitting.as_slice() {
            [name] => Some(Slot::FunctionRef(name.clone(), param.ty)),
            _ => None,
        });
    }

    let Some(ty) = arg.ty() else {
        return Ok(None);
    };
    let types = sess.types();
    let slot = if ty == param.ty {
        Some(Slot::Exact)
    } else if sess.config.literal_demotion
        && arg.bare_literal().is_some_and(|l| l.can_demote(param.ty))
    {
        Some(Slot::Narrow(param.ty))
    } else if types.is_base_of(param.ty, ty) {
        Some(Slot::Upcast(param.ty))
    } else if types.sum_bases(ty).is_some_and(|b| b.contains(&param.ty)) {
        Some(Slot::Decompose)
    } else {
        None
    };
    Ok(slot)
}

/// Keep the upcast candidates whose every parameter is the same as, or a
/// base of, the matching parameter of each other candidate. `Value(v, n)`
/// with `n: integer` prefers the `Number` slot over the any-base `Value`
/// slot when `Number` is a base of `Value`.
fn most_specific(sess: &Session, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let types = sess.types();
    let narrower = |a: &Candidate, b: &Candidate| {
        a.params
            .iter()
            .zip(&b.params)
            .all(|(pa, pb)| pa.ty == pb.ty || types.is_base_of(pb.ty, pa.ty))
    };
    let keep: Vec<bool> = candidates
        .iter()
        .map(|c| candidates.iter().all(|other| narrower(c, other)))
        .collect();
    if !keep.contains(&true) {
        return candidates;
    }
    candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect()
}

/// A constructor call in return position names the function's return
/// type. Record it as a hint so recursive calls inside its arguments can
/// be typed before the return expression is finished.
fn hint_return(sess: &mut Session, site: Site, name: Symbol) -> SemaResult<()> {
    let Some(fid) = site.function else {
        return Ok(());
    };
    if sess.function(fid)?.return_hint.is_some() {
        return Ok(());
    }
    if let Some(t) = sess.resolve_type_name(site.ns, name)? {
        sess.function_mut(fid)?.return_hint = Some(t);
    }
    Ok(())
}
