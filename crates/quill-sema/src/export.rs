//! The read-only view handed to code generation.
//!
//! A [`Manifest`] is a plain snapshot of the analysed unit with every
//! identity spelled out as a name. Intrinsic functions are left out; the
//! code generator implements them itself.

use serde::Serialize;

use crate::error::SemaResult;
use crate::function::{FunctionTag, ParamKind};
use crate::function_table::{PatternMatcher, TypeMatcher};
use crate::namespace::Session;
use crate::scope::{ScopeId, VariableOrigin};
use crate::structure::{ConstructorNames, Structure};
use crate::template::InstanceBody;

#[derive(Debug, Serialize)]
pub struct ParamEntry {
    pub ty: String,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FunctionEntry {
    pub name: String,
    pub raw_name: String,
    pub params: Vec<ParamEntry>,
    pub ret: Option<String>,
    pub tags: Vec<String>,
    pub type_matcher: Option<String>,
    pub pattern_dispatcher: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemberEntry {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Serialize)]
pub struct StructureEntry {
    pub name: String,
    pub members: Vec<MemberEntry>,
    pub constructors: Option<ConstructorNames>,
}

#[derive(Debug, Serialize)]
pub struct SumEntry {
    pub name: String,
    pub bases: Vec<String>,
    pub constructors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InstanceEntry {
    pub name: String,
    pub template: String,
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct VariableEntry {
    pub name: String,
    pub ty: String,
    pub origin: VariableOrigin,
    pub reference: bool,
}

#[derive(Debug, Serialize)]
pub struct ScopeEntry {
    pub namespace: u32,
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub variables: Vec<VariableEntry>,
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub functions: Vec<FunctionEntry>,
    pub type_matchers: Vec<TypeMatcher>,
    pub pattern_matchers: Vec<PatternMatcher>,
    pub structures: Vec<StructureEntry>,
    pub sums: Vec<SumEntry>,
    pub instances: Vec<InstanceEntry>,
    pub scopes: Vec<ScopeEntry>,
}

impl Manifest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Session {
    /// Snapshot the unit for code generation. Run after [`Session::check`].
    pub fn manifest(&self) -> SemaResult<Manifest> {
        let table = self.table();
        let types = self.types();

        let mut functions = Vec::new();
        for f in table.iter() {
            if f.is_template() || f.tags.contains(&FunctionTag::Intrinsic) {
                continue;
            }
            let mut params = Vec::with_capacity(f.param_sigs().len());
            for sig in f.param_sigs() {
                let kind = match sig.kind {
                    ParamKind::Value => "value",
                    ParamKind::Reference => "reference",
                    ParamKind::Function => "function",
                    ParamKind::Pattern(_) => "pattern",
                };
                params.push(ParamEntry {
                    ty: self.type_name(sig.ty)?,
                    kind,
                });
            }
            let mut tags = Vec::with_capacity(f.tags.len());
            for tag in &f.tags {
                tags.push(match tag {
                    FunctionTag::Constructor { ty, .. } => {
                        format!("constructor({})", self.type_name(*ty)?)
                    }
                    FunctionTag::Accessor { structure, member } => format!(
                        "accessor({}.{})",
                        self.type_name(*structure)?,
                        self.text(*member)
                    ),
                    FunctionTag::Intrinsic => "intrinsic".to_string(),
                });
            }
            functions.push(FunctionEntry {
                name: f.name().to_string(),
                raw_name: self.text(f.raw_name).to_string(),
                params,
                ret: f.return_type().map(|t| self.type_name(t)).transpose()?,
                tags,
                type_matcher: table.type_matcher(f.raw_name).map(|m| m.name.clone()),
                pattern_dispatcher: f.pattern_dispatcher().map(String::from),
            });
        }

        let mut structures = Vec::new();
        for s in &types.structures {
            structures.push(self.structure_entry(self.text(s.name).to_string(), s)?);
        }
        let mut sums = Vec::new();
        for s in &types.sums {
            sums.push(SumEntry {
                name: self.text(s.name).to_string(),
                bases: self.type_names(s.resolved_bases())?,
                constructors: s.constructors().to_vec(),
            });
        }
        let mut instances = Vec::new();
        for inst in &types.instances {
            let name = self.text(inst.name).to_string();
            match &inst.body {
                InstanceBody::Structure(s) => {
                    structures.push(self.structure_entry(name.clone(), s)?)
                }
                InstanceBody::Sum(s) => sums.push(SumEntry {
                    name: name.clone(),
                    bases: self.type_names(s.resolved_bases())?,
                    constructors: s.constructors().to_vec(),
                }),
            }
            instances.push(InstanceEntry {
                name,
                template: self.text(inst.template).to_string(),
                args: self.type_names(&inst.args)?,
            });
        }

        let mut scopes = Vec::new();
        for ns in &self.namespaces {
            for id in ns.scopes.ids() {
                let mut variables = Vec::new();
                for var in ns.scopes.variables(id)? {
                    variables.push(VariableEntry {
                        name: var.name.clone(),
                        ty: self.type_name(var.ty)?,
                        origin: var.origin,
                        reference: var.reference,
                    });
                }
                scopes.push(ScopeEntry {
                    namespace: ns.id.index(),
                    id,
                    parent: ns.scopes.parent(id)?,
                    variables,
                });
            }
        }

        log::debug!(
            "manifest: {} functions, {} structures, {} sums",
            functions.len(),
            structures.len(),
            sums.len()
        );
        Ok(Manifest {
            functions,
            type_matchers: table.type_matchers().to_vec(),
            pattern_matchers: table.pattern_matchers().to_vec(),
            structures,
            sums,
            instances,
            scopes,
        })
    }

    fn structure_entry(&self, name: String, s: &Structure) -> SemaResult<StructureEntry> {
        let mut members = Vec::with_capacity(s.layout().len());
        for &(member, ty) in s.layout() {
            members.push(MemberEntry {
                name: self.text(member).to_string(),
                ty: self.type_name(ty)?,
            });
        }
        Ok(StructureEntry {
            name,
            members,
            constructors: s.constructors().cloned(),
        })
    }
}
