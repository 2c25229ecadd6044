// SPDX-License-Identifier: MIT

//! Static cost estimation
//!
//! Walks a checked expression and computes the range of cost units the
//! interpreter can charge for it, using the size bounds carried by the
//! environment's [`DeclType`]s. Collections or strings without a declared
//! bound are assumed to be as large as possible, which saturates the estimate.

use std::fmt;

use super::ast::{Ast, BinaryOp, ComprehensionKind, Expr, ExprKind, Literal};
use super::env::Env;
use super::error::ExprError;
use super::library::{self, SizedOperand};
use super::types::{DeclKind, DeclType, Type};

/// Lower and upper bound of the cost of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CostEstimate {
    pub min: u64,
    pub max: u64,
}

impl CostEstimate {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(cost: u64) -> Self {
        Self::new(cost, cost)
    }

    fn add(self, other: CostEstimate) -> Self {
        Self::new(
            self.min.saturating_add(other.min),
            self.max.saturating_add(other.max),
        )
    }

    fn plus(self, units: u64) -> Self {
        self.add(Self::fixed(units))
    }

    /// Either of two alternatives is evaluated
    fn union(self, other: CostEstimate) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Estimate the cost of evaluating a checked expression
pub(crate) fn estimate(ast: &Ast, env: &Env) -> Result<CostEstimate, ExprError> {
    let mut estimator = Estimator {
        ast,
        env,
        scopes: Vec::new(),
    };
    Ok(estimator.visit(ast.root())?.cost)
}

/// Cost of a node plus what is statically known about its value's size
struct Node {
    cost: CostEstimate,
    decl: Option<DeclType>,
}

impl Node {
    fn new(cost: CostEstimate, decl: Option<DeclType>) -> Self {
        Self { cost, decl }
    }

    /// Upper bound on the value's size
    fn max_size(&self) -> u64 {
        self.decl
            .as_ref()
            .and_then(|d| d.max_size)
            .unwrap_or(u64::MAX)
    }
}

struct Estimator<'a> {
    ast: &'a Ast,
    env: &'a Env,
    scopes: Vec<(String, Option<DeclType>)>,
}

fn may_be_string(ty: &Type) -> bool {
    matches!(ty, Type::String | Type::Dyn)
}

fn larger(a: Option<DeclType>, b: Option<DeclType>) -> Option<DeclType> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if b.max_size.unwrap_or(u64::MAX) > a.max_size.unwrap_or(u64::MAX) {
                Some(b)
            } else {
                Some(a)
            }
        }
        _ => None,
    }
}

fn common_decl(decls: impl IntoIterator<Item = Option<DeclType>>) -> DeclType {
    let mut decls = decls.into_iter();
    let Some(first) = decls.next().flatten() else {
        return DeclType::dyn_type();
    };
    if decls.all(|d| d.as_ref() == Some(&first)) {
        first
    } else {
        DeclType::dyn_type()
    }
}

impl<'a> Estimator<'a> {
    fn visit(&mut self, expr: &Expr) -> Result<Node, ExprError> {
        match &expr.kind {
            ExprKind::Literal(Literal::String(s)) => Ok(Node::new(
                CostEstimate::fixed(0),
                Some(DeclType::string().with_max_size(s.chars().count() as u64)),
            )),
            ExprKind::Literal(_) => Ok(Node::new(CostEstimate::fixed(0), None)),
            ExprKind::Ident(name) => {
                let decl = match self.scopes.iter().rev().find(|(var, _)| var == name) {
                    Some((_, decl)) => decl.clone(),
                    None => Some(self.env.variable(name).cloned().ok_or_else(|| {
                        ExprError::Cost(format!("unknown variable '{}'", name))
                    })?),
                };
                Ok(Node::new(CostEstimate::fixed(1), decl))
            }
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                let operand = self.visit(operand)?;
                let decl = if *test_only {
                    None
                } else {
                    operand.decl.as_ref().and_then(|d| match &d.kind {
                        DeclKind::Object { .. } => d.field(field).map(|f| f.decl.clone()),
                        DeclKind::Map { value, .. } => Some((**value).clone()),
                        _ => None,
                    })
                };
                Ok(Node::new(operand.cost.plus(1), decl))
            }
            ExprKind::Index { operand, index } => {
                let operand = self.visit(operand)?;
                let index = self.visit(index)?;
                let decl = operand.decl.as_ref().and_then(|d| d.element().cloned());
                Ok(Node::new(operand.cost.add(index.cost).plus(1), decl))
            }
            ExprKind::Unary { operand, .. } => {
                let operand = self.visit(operand)?;
                Ok(Node::new(operand.cost.plus(1), None))
            }
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right),
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.visit(condition)?;
                let then = self.visit(then)?;
                let otherwise = self.visit(otherwise)?;
                Ok(Node::new(
                    condition.cost.plus(1).add(then.cost.union(otherwise.cost)),
                    larger(then.decl, otherwise.decl),
                ))
            }
            ExprKind::Call {
                target,
                function,
                args,
            } => {
                let target = target.as_ref().map(|t| self.visit(t)).transpose()?;
                let args = args
                    .iter()
                    .map(|a| self.visit(a))
                    .collect::<Result<Vec<_>, _>>()?;

                let mut cost = CostEstimate::fixed(1);
                if let Some(target) = &target {
                    cost = cost.add(target.cost);
                }
                for arg in &args {
                    cost = cost.add(arg.cost);
                }
                let sized = match library::sized_operand(function) {
                    Some(SizedOperand::Receiver) => target.as_ref(),
                    Some(SizedOperand::FirstArg) => args.first(),
                    None => None,
                };
                if let Some(sized) = sized {
                    cost.max = cost
                        .max
                        .saturating_add(library::traversal_cost(sized.max_size()));
                }

                let decl = match function.as_str() {
                    "lowerAscii" | "upperAscii" => target.and_then(|t| t.decl),
                    _ => None,
                };
                Ok(Node::new(cost, decl))
            }
            ExprKind::List(items) => {
                let mut cost = CostEstimate::fixed(1);
                let mut decls = Vec::with_capacity(items.len());
                for item in items {
                    let node = self.visit(item)?;
                    cost = cost.add(node.cost);
                    decls.push(node.decl);
                }
                let decl = DeclType::list(common_decl(decls), items.len() as u64);
                Ok(Node::new(cost, Some(decl)))
            }
            ExprKind::Map(entries) => {
                let mut cost = CostEstimate::fixed(1);
                let mut keys = Vec::with_capacity(entries.len());
                let mut values = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = self.visit(k)?;
                    let value = self.visit(v)?;
                    cost = cost.add(key.cost).add(value.cost);
                    keys.push(key.decl);
                    values.push(value.decl);
                }
                let decl = DeclType::map(
                    common_decl(keys),
                    common_decl(values),
                    entries.len() as u64,
                );
                Ok(Node::new(cost, Some(decl)))
            }
            ExprKind::Comprehension {
                kind,
                range,
                var,
                body,
            } => {
                let range = self.visit(range)?;
                let count = range.max_size();
                let var_decl = range.decl.as_ref().and_then(|d| match &d.kind {
                    DeclKind::List(elem) => Some((**elem).clone()),
                    DeclKind::Map { key, .. } => Some((**key).clone()),
                    _ => None,
                });

                self.scopes.push((var.clone(), var_decl.clone()));
                let body = self.visit(body);
                self.scopes.pop();
                let body = body?;

                let per_iteration = body.cost.max.saturating_add(1);
                let cost = CostEstimate::new(
                    range.cost.min,
                    range
                        .cost
                        .max
                        .saturating_add(count.saturating_mul(per_iteration)),
                );
                let decl = match kind {
                    ComprehensionKind::Map => Some(DeclType::list(
                        body.decl.unwrap_or_else(DeclType::dyn_type),
                        count,
                    )),
                    ComprehensionKind::Filter => Some(DeclType::list(
                        var_decl.unwrap_or_else(DeclType::dyn_type),
                        count,
                    )),
                    _ => None,
                };
                Ok(Node::new(cost, decl))
            }
            ExprKind::Bind { var, init, body } => {
                let init = self.visit(init)?;
                self.scopes.push((var.clone(), init.decl));
                let body = self.visit(body);
                self.scopes.pop();
                let body = body?;
                Ok(Node::new(init.cost.add(body.cost), body.decl))
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Node, ExprError> {
        let strings = may_be_string(&self.ast.type_of(left.id))
            && may_be_string(&self.ast.type_of(right.id));
        let l = self.visit(left)?;
        let r = self.visit(right)?;

        let node = match op {
            BinaryOp::And | BinaryOp::Or => Node::new(
                CostEstimate::new(
                    l.cost.min.saturating_add(1),
                    l.cost.max.saturating_add(r.cost.max).saturating_add(1),
                ),
                None,
            ),
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                let mut cost = l.cost.add(r.cost).plus(1);
                if strings {
                    let size = l.max_size().min(r.max_size());
                    cost.max = cost.max.saturating_add(library::traversal_cost(size));
                }
                Node::new(cost, None)
            }
            BinaryOp::In => Node::new(l.cost.add(r.cost).plus(1), None),
            BinaryOp::Add => {
                let decl = match (&l.decl, &r.decl) {
                    (Some(a), Some(b)) if strings => a
                        .max_size
                        .zip(b.max_size)
                        .map(|(x, y)| DeclType::string().with_max_size(x.saturating_add(y))),
                    _ => None,
                };
                Node::new(l.cost.add(r.cost).plus(1), decl)
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                Node::new(l.cost.add(r.cost).plus(1), None)
            }
        };
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::env::{EnvOption, EnvSet, EnvType, PlatformVersion, VersionedOptions};
    use crate::expr::library::Library;
    use crate::expr::types::DeclField;
    use std::sync::Arc;

    fn test_env() -> Arc<Env> {
        let unbounded = DeclType {
            kind: DeclKind::List(Box::new(DeclType::string())),
            max_size: None,
        };
        let object = DeclType::object(
            "test.Item",
            [
                DeclField::new("name", DeclType::string().with_max_size(20), true),
                DeclField::new(
                    "tags",
                    DeclType::list(DeclType::string().with_max_size(10), 4),
                    true,
                ),
                DeclField::new("free", unbounded, true),
            ],
        );
        EnvSet::base(PlatformVersion::new(1, 31))
            .extend(vec![VersionedOptions {
                introduced_version: PlatformVersion::new(1, 31),
                options: vec![
                    EnvOption::variable("item", object.clone()),
                    EnvOption::Library(Library::Bindings),
                ],
                decl_types: vec![object],
            }])
            .unwrap()
            .env(EnvType::StoredExpressions)
            .unwrap()
    }

    fn cost_of(source: &str) -> CostEstimate {
        let env = test_env();
        let ast = env.compile(source).unwrap();
        env.estimate_cost(&ast).unwrap()
    }

    #[test]
    fn test_literal_is_free() {
        assert_eq!(cost_of("true"), CostEstimate::fixed(0));
    }

    #[test]
    fn test_string_comparison_uses_smaller_bound() {
        // ident + select + operator, plus ceil(min(20, 3) / 10)
        assert_eq!(cost_of("item.name == 'abc'"), CostEstimate::new(3, 4));
    }

    #[test]
    fn test_string_function_uses_receiver_bound() {
        assert_eq!(cost_of("item.name.startsWith('a')"), CostEstimate::new(3, 5));
    }

    #[test]
    fn test_comprehension_scales_with_declared_size() {
        // range 2, then 4 iterations of (body 3 + 1)
        assert_eq!(cost_of("item.tags.all(t, t == 'x')"), CostEstimate::new(2, 18));
    }

    #[test]
    fn test_unbounded_range_saturates() {
        assert_eq!(cost_of("item.free.exists(x, true)").max, u64::MAX);
    }

    #[test]
    fn test_short_circuit_min() {
        let cost = cost_of("false && item.name == 'a'");
        assert_eq!(cost.min, 1);
        assert_eq!(cost.max, 5);
    }

    #[test]
    fn test_bind_adds_init_and_body() {
        assert_eq!(cost_of("cel.bind(n, item.name, n == n)").max, 7);
    }

    #[test]
    fn test_estimates_are_stable() {
        let source = "item.tags.exists(t, t.startsWith('gpu')) || item.name == 'x'";
        assert_eq!(cost_of(source), cost_of(source));
    }

    #[test]
    fn test_display() {
        assert_eq!(CostEstimate::new(1, 7).to_string(), "[1, 7]");
    }
}
