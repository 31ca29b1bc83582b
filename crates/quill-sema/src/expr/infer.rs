//! Expression type inference.
//!
//! After coalescing, the atom list is split into operands (prefix
//! operators, one primary atom, postfix accessors and annotations) joined
//! by binary operators. Prefix operators are always unary, infix ones
//! always binary. Operands are inferred left to right, unary operators
//! inside-out, then binary operators in precedence order, each bound to one
//! overload (exact match first, then a unique literal demotion). Finally
//! the atoms are rewritten into evaluation order.

use std::mem;

use crate::error::{InternalError, SemaResult, SemanticErrorKind};
use crate::function::FunctionId;
use crate::namespace::{Session, Site};
use crate::ty::TypeId;

use super::precedence::{self, InfixOperator, Token};
use super::{Atom, ExprState, Expression, OperatorKind, StatementContext};

/// Atom indices of one operand.
#[derive(Debug, Default)]
struct Operand {
    prefix: Vec<usize>,
    primary: usize,
    postfix: Vec<usize>,
}

#[derive(Copy, Clone, Debug)]
struct BinaryOp {
    atom: usize,
    precedence: u8,
    right: bool,
}

impl InfixOperator for BinaryOp {
    fn precedence(self) -> u8 {
        self.precedence
    }

    fn right_associative(self) -> bool {
        self.right
    }
}

/// An inferred sub-expression.
#[derive(Debug)]
struct Value {
    ty: Option<TypeId>,
    /// Atom index when the value is a bare literal, open to demotion.
    literal: Option<usize>,
    /// Atom indices in evaluation order.
    order: Vec<usize>,
}

impl Expression {
    /// Infer the expression's type. Idempotent: a finished expression
    /// returns its earlier outcome without side effects.
    pub fn infer_in(
        &mut self,
        sess: &mut Session,
        site: Site,
        ctx: StatementContext,
    ) -> SemaResult<bool> {
        match self.state {
            ExprState::InferenceDone => return Ok(self.ok),
            ExprState::InferenceInProgress => {
                self.recursion_detected = true;
                return Ok(self.ty.is_some());
            }
            ExprState::Uncoalesced | ExprState::Coalesced => {}
        }
        self.run_compile_time_pass(sess, site)?;
        let coalesced = self.coalesce(sess, site)?;

        self.state = ExprState::InferenceInProgress;
        let result = self.infer_atoms(sess, site, ctx);
        self.state = ExprState::InferenceDone;
        self.ok = coalesced && result?;
        Ok(self.ok)
    }

    fn infer_atoms(
        &mut self,
        sess: &mut Session,
        site: Site,
        ctx: StatementContext,
    ) -> SemaResult<bool> {
        if self.atoms.is_empty() {
            return Err(InternalError::MalformedExpression("empty expression"));
        }
        if ctx == StatementContext::Parameter && self.defer_overloaded_name(sess, site)? {
            return Ok(true);
        }

        let tokens = self.split(sess)?;
        let sole = tokens.len() == 1;
        let mut infix = Vec::with_capacity(tokens.len());
        for token in tokens {
            infix.push(match token {
                Token::Operand(operand) => {
                    Token::Operand(self.infer_operand(sess, site, operand, ctx, sole)?)
                }
                Token::Operator(op) => Token::Operator(op),
            });
        }

        let mut stack: Vec<Value> = Vec::new();
        for token in precedence::to_postfix(infix) {
            match token {
                Token::Operand(value) => stack.push(value),
                Token::Operator(op) => {
                    let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                        return Err(InternalError::MalformedExpression(
                            "binary operator without operands",
                        ));
                    };
                    let ty = match (lhs.ty, rhs.ty) {
                        (Some(l), Some(r)) => self.resolve_operator(
                            sess,
                            site,
                            op.atom,
                            &[(l, lhs.literal), (r, rhs.literal)],
                        )?,
                        _ => None,
                    };
                    let mut order = lhs.order;
                    order.extend(rhs.order);
                    order.push(op.atom);
                    stack.push(Value {
                        ty,
                        literal: None,
                        order,
                    });
                }
            }
        }
        let value = match (stack.pop(), stack.is_empty()) {
            (Some(value), true) => value,
            _ => {
                return Err(InternalError::MalformedExpression(
                    "operands without operator",
                ))
            }
        };

        self.reorder(&value.order);
        self.ty = value.ty;
        if let ([Atom::Ident(id)], Some(_)) = (self.atoms.as_slice(), self.ty) {
            self.function_ref = id.function.clone();
        }
        Ok(self.ty.is_some())
    }

    /// A lone overloaded function name passed as an argument is left
    /// untyped; the enclosing statement picks the overload.
    fn defer_overloaded_name(&mut self, sess: &mut Session, site: Site) -> SemaResult<bool> {
        let [Atom::Ident(id)] = self.atoms.as_slice() else {
            return Ok(false);
        };
        if sess.lookup_variable(site, id.name)?.is_some() {
            return Ok(false);
        }
        let count = concrete_overloads(sess, site, id.name)?.len();
        Ok(count > 1)
    }

    /// Split the atoms into operands and binary operators, classifying
    /// every operator by position.
    fn split(&mut self, sess: &Session) -> SemaResult<Vec<Token<Operand, BinaryOp>>> {
        let mut tokens: Vec<Token<Operand, BinaryOp>> = Vec::new();
        let mut prefix = Vec::new();
        let mut expect_operand = true;
        for (index, atom) in self.atoms.iter_mut().enumerate() {
            match atom {
                Atom::Operator(op) if op.kind == OperatorKind::MemberAccess => {
                    return Err(InternalError::MalformedExpression(
                        "member access survived coalescing",
                    ))
                }
                Atom::Operator(op) if op.kind == OperatorKind::Accessor => {
                    attach_postfix(&mut tokens, expect_operand, index)?
                }
                Atom::TypeAnnotation(_) => attach_postfix(&mut tokens, expect_operand, index)?,
                Atom::Operator(op) => {
                    if expect_operand {
                        op.kind = OperatorKind::Unary;
                        prefix.push(index);
                    } else {
                        op.kind = OperatorKind::Binary;
                        let name = sess.text(op.name);
                        tokens.push(Token::Operator(BinaryOp {
                            atom: index,
                            precedence: precedence::precedence(name),
                            right: precedence::right_associative(name),
                        }));
                        expect_operand = true;
                    }
                }
                _ => {
                    if !expect_operand {
                        return Err(InternalError::MalformedExpression("adjacent operands"));
                    }
                    tokens.push(Token::Operand(Operand {
                        prefix: mem::take(&mut prefix),
                        primary: index,
                        postfix: Vec::new(),
                    }));
                    expect_operand = false;
                }
            }
        }
        if expect_operand {
            return Err(InternalError::MalformedExpression(
                "operator without operand",
            ));
        }
        Ok(tokens)
    }

    fn infer_operand(
        &mut self,
        sess: &mut Session,
        site: Site,
        operand: Operand,
        ctx: StatementContext,
        sole: bool,
    ) -> SemaResult<Value> {
        let bare = operand.prefix.is_empty() && operand.postfix.is_empty();
        let primary_ctx = if sole && bare {
            ctx
        } else {
            StatementContext::Expression
        };
        let mut ty = self.infer_primary(sess, site, operand.primary, primary_ctx)?;
        let mut literal = match self.atoms[operand.primary] {
            Atom::Literal(_) if operand.postfix.is_empty() => Some(operand.primary),
            _ => None,
        };

        for &index in &operand.postfix {
            ty = match (&self.atoms[index], ty) {
                (_, None) => None,
                (Atom::Operator(op), Some(_)) => op.ty,
                (Atom::TypeAnnotation(t), Some(_)) => Some(*t),
                _ => None,
            };
        }
        for &index in operand.prefix.iter().rev() {
            ty = match ty {
                Some(t) => self.resolve_operator(sess, site, index, &[(t, literal)])?,
                None => None,
            };
            literal = None;
        }

        let mut order = Vec::with_capacity(1 + operand.postfix.len() + operand.prefix.len());
        order.push(operand.primary);
        order.extend(&operand.postfix);
        order.extend(operand.prefix.iter().rev());
        Ok(Value {
            ty,
            literal: if bare { literal } else { None },
            order,
        })
    }

    fn infer_primary(
        &mut self,
        sess: &mut Session,
        site: Site,
        index: usize,
        ctx: StatementContext,
    ) -> SemaResult<Option<TypeId>> {
        match &mut self.atoms[index] {
            Atom::Literal(lit) => Ok(Some(lit.ty)),
            Atom::StructCopy { ty, .. } => Ok(Some(*ty)),
            Atom::Reference(id) | Atom::Ident(id) => {
                if id.ty.is_some() {
                    return Ok(id.ty);
                }
                if let Some(var) = sess.lookup_variable(site, id.name)? {
                    id.ty = Some(var.ty);
                    return Ok(id.ty);
                }
                let candidates = concrete_overloads(sess, site, id.name)?;
                let name = sess.text(id.name).to_string();
                match candidates.as_slice() {
                    [] => {
                        sess.diagnostics
                            .report_at(id.loc, SemanticErrorKind::UnresolvedIdentifier { name });
                        Ok(None)
                    }
                    [fid] => {
                        let Some(signature) = sess.function_value_type(*fid)? else {
                            return Ok(None);
                        };
                        id.function = Some(sess.function(*fid)?.name().to_string());
                        id.ty = Some(signature);
                        Ok(id.ty)
                    }
                    many => {
                        let candidates = many
                            .iter()
                            .map(|&f| sess.function(f).map(|f| f.name().to_string()))
                            .collect::<SemaResult<Vec<_>>>()?;
                        sess.diagnostics.report_at(
                            id.loc,
                            SemanticErrorKind::AmbiguousOverload { name, candidates },
                        );
                        Ok(None)
                    }
                }
            }
            Atom::Statement(stmt) => {
                stmt.infer(sess, site, ctx)?;
                Ok(stmt.ty())
            }
            Atom::Paren(expr) => {
                expr.infer_in(sess, site, StatementContext::Expression)?;
                Ok(expr.ty())
            }
            Atom::Operator(_) | Atom::TypeAnnotation(_) => Err(
                InternalError::MalformedExpression("operator in operand position"),
            ),
        }
    }

    /// Bind the operator atom at `index` to the overload taking `operands`.
    /// Each operand carries the atom index of its literal when it is a bare
    /// literal open to demotion.
    fn resolve_operator(
        &mut self,
        sess: &mut Session,
        site: Site,
        index: usize,
        operands: &[(TypeId, Option<usize>)],
    ) -> SemaResult<Option<TypeId>> {
        let (name, loc) = match &self.atoms[index] {
            Atom::Operator(op) => (op.name, op.loc),
            _ => return Err(InternalError::MalformedExpression("operator index")),
        };
        sess.diagnostics.set_context(loc);
        let text = sess.text(name).to_string();
        let arity = operands.len();

        let mut candidates = Vec::new();
        for fid in concrete_overloads(sess, site, name)? {
            sess.infer_parameters(fid)?;
            let f = sess.function(fid)?;
            if f.arity() == arity {
                let params: Vec<TypeId> = f.param_sigs().iter().map(|p| p.ty).collect();
                candidates.push((fid, params));
            }
        }
        if candidates.is_empty() {
            sess.diagnostics
                .report(SemanticErrorKind::InvalidOperator { name: text, arity });
            return Ok(None);
        }

        let exact: Vec<FunctionId> = candidates
            .iter()
            .filter(|(_, params)| params.iter().zip(operands).all(|(p, (t, _))| p == t))
            .map(|(fid, _)| *fid)
            .collect();
        let chosen = match exact.as_slice() {
            [fid] => Some(*fid),
            [] if sess.config.literal_demotion => {
                let narrowed: Vec<(FunctionId, Vec<(usize, TypeId)>)> = candidates
                    .iter()
                    .filter_map(|(fid, params)| {
                        self.demotions(params, operands).map(|d| (*fid, d))
                    })
                    .collect();
                match narrowed.as_slice() {
                    [(fid, demotions)] => {
                        for &(atom, target) in demotions {
                            if let Atom::Literal(lit) = &mut self.atoms[atom] {
                                lit.demote(target);
                            }
                        }
                        Some(*fid)
                    }
                    [] => None,
                    many => {
                        let ids: Vec<FunctionId> = many.iter().map(|(f, _)| *f).collect();
                        return report_ambiguous(sess, text, &ids).map(|_| None);
                    }
                }
            }
            [] => None,
            many => return report_ambiguous(sess, text, many).map(|_| None),
        };

        let Some(fid) = chosen else {
            let tys: Vec<TypeId> = operands.iter().map(|(t, _)| *t).collect();
            let args = sess.type_names(&tys)?;
            sess.diagnostics
                .report(SemanticErrorKind::NoMatchingOverload { name: text, args });
            return Ok(None);
        };
        let ret = sess.infer_signature(fid)?;
        let mangled = sess.function(fid)?.name().to_string();
        log::trace!("operator `{}` bound to `{}`", text, mangled);
        if let Atom::Operator(op) = &mut self.atoms[index] {
            op.resolved = Some(mangled);
            op.ty = ret;
        }
        Ok(ret)
    }

    /// Literal demotions that make `operands` fit `params`, if any are
    /// needed and all are legal.
    fn demotions(
        &self,
        params: &[TypeId],
        operands: &[(TypeId, Option<usize>)],
    ) -> Option<Vec<(usize, TypeId)>> {
        let mut demotions = Vec::new();
        for (&param, &(ty, literal)) in params.iter().zip(operands) {
            if param == ty {
                continue;
            }
            let atom = literal?;
            match &self.atoms[atom] {
                Atom::Literal(lit) if lit.can_demote(param) => demotions.push((atom, param)),
                _ => return None,
            }
        }
        (!demotions.is_empty()).then_some(demotions)
    }

    /// Permute the atoms into `order`.
    fn reorder(&mut self, order: &[usize]) {
        let mut slots: Vec<Option<Atom>> = self.atoms.drain(..).map(Some).collect();
        self.atoms = order.iter().filter_map(|&i| slots[i].take()).collect();
    }
}

fn report_ambiguous(sess: &mut Session, name: String, fids: &[FunctionId]) -> SemaResult<()> {
    let candidates = fids
        .iter()
        .map(|&f| sess.function(f).map(|f| f.name().to_string()))
        .collect::<SemaResult<Vec<_>>>()?;
    sess.diagnostics
        .report(SemanticErrorKind::AmbiguousOverload { name, candidates });
    Ok(())
}

fn attach_postfix(
    tokens: &mut [Token<Operand, BinaryOp>],
    expect_operand: bool,
    index: usize,
) -> SemaResult<()> {
    match tokens.last_mut() {
        Some(Token::Operand(operand)) if !expect_operand => {
            operand.postfix.push(index);
            Ok(())
        }
        _ => Err(InternalError::MalformedExpression(
            "postfix atom without operand",
        )),
    }
}

/// Non-template overloads of `name` visible from `site`.
pub(crate) fn concrete_overloads(
    sess: &Session,
    site: Site,
    name: quill_common::Symbol,
) -> SemaResult<Vec<FunctionId>> {
    let mut found = Vec::new();
    for fid in sess.overloads(site.ns, name)? {
        if !sess.function(fid)?.is_template() {
            found.push(fid);
        }
    }
    Ok(found)
}

impl Session {
    /// The signature type of a function used as a value.
    pub(crate) fn function_value_type(&mut self, fid: FunctionId) -> SemaResult<Option<TypeId>> {
        self.infer_parameters(fid)?;
        let Some(ret) = self.infer_signature(fid)? else {
            return Ok(None);
        };
        let params: Vec<TypeId> = self.function(fid)?.param_sigs().iter().map(|p| p.ty).collect();
        self.signature_type(params, ret).map(Some)
    }
}
