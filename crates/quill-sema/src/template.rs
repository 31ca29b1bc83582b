//! Generic templates and their memoized instantiation.
//!
//! Type templates (structures and sums) are instantiated into the root type
//! space under a synthetic name such as `Pair<integer, real>`. Function
//! templates are instantiated into a fresh child namespace that binds each
//! template parameter weakly to its argument, so the copied body resolves
//! `T` to the concrete type without touching the root. Requests with an
//! equal argument vector return the earlier instance.

use quill_common::Symbol;
use rowan::TextRange;
use rustc_hash::FxHashMap;

use crate::error::{SemaResult, SemanticErrorKind};
use crate::function::{Function, FunctionId, Progress};
use crate::namespace::{Session, Site};
use crate::structure::{Member, Structure};
use crate::sum_type::SumType;
use crate::ty::{TypeId, TypeRef};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TemplateParamKind {
    /// Any type.
    Type,
    /// Only sum types are accepted.
    Sum,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateParam {
    pub name: Symbol,
    pub kind: TemplateParamKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TemplateBody {
    Structure(Vec<Member>),
    Sum(Vec<TypeRef>),
}

/// A structure or sum type with template parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeTemplate {
    pub name: Symbol,
    pub params: Vec<TemplateParam>,
    pub body: TemplateBody,
    pub loc: TextRange,
    pub(crate) instances: Vec<TypeId>,
}

impl TypeTemplate {
    pub fn new(
        name: Symbol,
        params: Vec<TemplateParam>,
        body: TemplateBody,
        loc: TextRange,
    ) -> TypeTemplate {
        TypeTemplate {
            name,
            params,
            body,
            loc,
            instances: Vec::new(),
        }
    }

    pub fn instances(&self) -> &[TypeId] {
        &self.instances
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InstanceBody {
    Structure(Structure),
    Sum(SumType),
}

/// A concrete type produced from a template.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateInstance {
    pub template: Symbol,
    pub name: Symbol,
    pub args: Vec<TypeId>,
    pub body: InstanceBody,
}

fn bindings(params: &[TemplateParam], args: &[TypeId]) -> FxHashMap<Symbol, TypeId> {
    params
        .iter()
        .zip(args)
        .map(|(p, &a)| (p.name, a))
        .collect()
}

impl Session {
    /// `name<arg, ...>` with the registered names of `args`.
    fn instance_name(&self, name: Symbol, args: &[TypeId]) -> SemaResult<String> {
        Ok(format!(
            "{}<{}>",
            self.text(name),
            self.type_names(args)?.join(", ")
        ))
    }

    /// Check argument count and kinds against template parameters.
    fn check_template_args(
        &mut self,
        name: Symbol,
        params: &[TemplateParam],
        args: &[TypeId],
        loc: TextRange,
    ) -> SemaResult<bool> {
        if params.len() != args.len() {
            let name = self.text(name).to_string();
            self.diagnostics.report_at(
                loc,
                SemanticErrorKind::TemplateArity {
                    name,
                    expected: params.len(),
                    found: args.len(),
                },
            );
            return Ok(false);
        }
        for (param, &arg) in params.iter().zip(args) {
            if param.kind == TemplateParamKind::Sum && !self.types().is_sum(arg) {
                let kind = SemanticErrorKind::TemplateArgumentKind {
                    name: self.text(name).to_string(),
                    param: self.text(param.name).to_string(),
                    found: self.type_name(arg)?,
                };
                self.diagnostics.report_at(loc, kind);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_template_depth(&mut self, name: Symbol, loc: TextRange) -> bool {
        if self.template_depth < self.config.max_template_depth {
            return true;
        }
        let kind = SemanticErrorKind::TemplateDepthExceeded {
            name: self.text(name).to_string(),
            depth: self.template_depth,
        };
        self.diagnostics.report_at(loc, kind);
        false
    }

    /// Instantiate a type template, or return the memoized instance.
    pub fn instantiate_type(
        &mut self,
        template: Symbol,
        args: Vec<TypeId>,
        loc: TextRange,
    ) -> SemaResult<Option<TypeId>> {
        let Some(tpl) = self.types().template(template) else {
            let name = self.text(template).to_string();
            self.diagnostics
                .report_at(loc, SemanticErrorKind::NotATemplate { name });
            return Ok(None);
        };
        let (params, body) = (tpl.params.clone(), tpl.body.clone());
        if !self.check_template_args(template, &params, &args, loc)? {
            return Ok(None);
        }
        if let Some(id) = self.types().lookup_instance(template, &args) {
            return Ok(Some(id));
        }
        if !self.check_template_depth(template, loc) {
            return Ok(None);
        }

        let name = self.instance_name(template, &args)?;
        log::debug!("instantiate type `{}`", name);
        let name = self.intern(&name);
        let bound = bindings(&params, &args);
        let body = match body {
            TemplateBody::Structure(members) => InstanceBody::Structure(Structure::new(
                name,
                members.iter().map(|m| m.substitute(&bound)).collect(),
                loc,
            )),
            TemplateBody::Sum(bases) => InstanceBody::Sum(SumType::new(
                name,
                bases.iter().map(|b| b.substitute(&bound)).collect(),
                loc,
            )),
        };
        let is_structure = matches!(body, InstanceBody::Structure(_));
        let id = self.types_mut().add_instance(TemplateInstance {
            template,
            name,
            args,
            body,
        });
        if let Some(tpl) = self.types_mut().template_mut(template) {
            tpl.instances.push(id);
        }

        self.template_depth += 1;
        let result = if is_structure {
            self.synthesize_structure(id)
        } else {
            self.generate_sum_constructors(id)
        };
        self.template_depth -= 1;
        result?;
        Ok(Some(id))
    }

    /// Instantiate a function template into its own child namespace and
    /// infer its signature there. Body inference is queued.
    pub fn instantiate_function(
        &mut self,
        template_fid: FunctionId,
        args: Vec<TypeId>,
        loc: TextRange,
    ) -> SemaResult<Option<FunctionId>> {
        let tpl = self.function(template_fid)?.clone();
        if !self.check_template_args(tpl.raw_name, &tpl.template_params, &args, loc)? {
            return Ok(None);
        }
        let key = (template_fid, args.clone());
        if let Some(&fid) = self.table().function_instances.get(&key) {
            return Ok(Some(fid));
        }
        if !self.check_template_depth(tpl.raw_name, loc) {
            return Ok(None);
        }

        let raw = self.instance_name(tpl.raw_name, &args)?;
        log::debug!("instantiate function `{}`", raw);
        let ns = self.new_namespace(tpl.home)?;
        for (param, &arg) in tpl.template_params.iter().zip(&args) {
            self.ns_mut(ns)?.types.bind_weak(param.name, arg);
        }

        let mut scopes = std::mem::take(&mut self.ns_mut(ns)?.scopes);
        let forked = match tpl.scope {
            Some(scope) => self.ns(tpl.home)?.scopes.fork(scope, &mut scopes),
            None => Ok(FxHashMap::default()),
        };
        self.ns_mut(ns)?.scopes = scopes;
        let forked = forked?;

        let bound = bindings(&tpl.template_params, &args);
        let raw = self.intern(&raw);
        let mut instance = Function::new(raw, tpl.loc);
        instance.params = tpl.params.iter().map(|p| p.substitute(&bound)).collect();
        instance.declared_return = tpl.declared_return.as_ref().map(|r| r.substitute(&bound));
        instance.ret = tpl.ret.as_ref().map(|e| e.substitute(&bound));
        instance.body = match &tpl.body {
            Some(b) => Some(b.substitute(&bound, &forked)?),
            None => None,
        };
        instance.tags = tpl.tags.clone();
        instance.scope = tpl.scope.and_then(|s| forked.get(&s).copied());
        instance.home = ns;
        instance.instance_of = Some(template_fid);
        instance.template_args = args;

        let fid = self.add_function(instance);
        self.table_mut().function_instances.insert(key, fid);

        self.template_depth += 1;
        let result = self.infer_signature(fid);
        self.template_depth -= 1;
        result?;
        if self.function(fid)?.full_pass == Progress::Pending {
            self.table_mut().pending_instances.push_back(fid);
        }
        Ok(Some(fid))
    }

    /// Resolve explicit template arguments on a call. Returns the raw name
    /// the call should be looked up under: the instance type's name for a
    /// type template, or the shared instance raw name for function
    /// templates.
    pub(crate) fn instantiate_for_call(
        &mut self,
        site: Site,
        name: Symbol,
        args: Vec<TypeId>,
        loc: TextRange,
    ) -> SemaResult<Option<Symbol>> {
        if self.types().template(name).is_some() {
            return match self.instantiate_type(name, args, loc)? {
                Some(id) => Ok(Some(self.types().name_of(id)?)),
                None => Ok(None),
            };
        }

        let mut templates = Vec::new();
        for fid in self.overloads(site.ns, name)? {
            let f = self.function(fid)?;
            if f.is_template() {
                templates.push((fid, f.template_params.len()));
            }
        }
        let Some(&(_, expected)) = templates.first() else {
            let name = self.text(name).to_string();
            self.diagnostics
                .report_at(loc, SemanticErrorKind::NotATemplate { name });
            return Ok(None);
        };

        let before = self.diagnostics.len();
        let mut raw = None;
        for (fid, count) in templates {
            if count != args.len() {
                continue;
            }
            if let Some(instance) = self.instantiate_function(fid, args.clone(), loc)? {
                raw = Some(self.function(instance)?.raw_name);
            }
        }
        if raw.is_none() && self.diagnostics.len() == before {
            let name = self.text(name).to_string();
            self.diagnostics.report_at(
                loc,
                SemanticErrorKind::TemplateArity {
                    name,
                    expected,
                    found: args.len(),
                },
            );
        }
        Ok(raw)
    }
}
