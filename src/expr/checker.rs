// SPDX-License-Identifier: MIT

//! Static type checker
//!
//! Assigns a [`Type`] to every node and collects all type errors. A node
//! that fails to check is typed `dyn` so one mistake does not cascade.

use std::collections::HashMap;

use super::ast::{BinaryOp, ComprehensionKind, Expr, ExprId, ExprKind, Literal, UnaryOp};
use super::env::Env;
use super::error::Issues;
use super::types::Type;

/// Type-check an expression against an environment
pub(crate) fn check(
    root: &Expr,
    env: &Env,
    source: &str,
) -> Result<HashMap<ExprId, Type>, Issues> {
    let mut checker = Checker {
        env,
        types: HashMap::new(),
        scopes: Vec::new(),
        issues: Issues::new(source),
    };
    checker.check(root);
    if checker.issues.is_empty() {
        Ok(checker.types)
    } else {
        Err(checker.issues)
    }
}

struct Checker<'a> {
    env: &'a Env,
    types: HashMap<ExprId, Type>,
    /// Comprehension and `cel.bind` variables, innermost last
    scopes: Vec<(String, Type)>,
    issues: Issues,
}

fn format_args(types: &[Type]) -> String {
    types
        .iter()
        .map(Type::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_bool_like(ty: &Type) -> bool {
    matches!(ty, Type::Bool | Type::Dyn)
}

fn is_orderable(left: &Type, right: &Type) -> bool {
    match (left, right) {
        (Type::Dyn, _) | (_, Type::Dyn) => true,
        (a, b) if a.is_numeric() && b.is_numeric() => true,
        (Type::Quantity, b) if b.is_numeric() || *b == Type::Quantity => true,
        (a, Type::Quantity) if a.is_numeric() => true,
        (Type::String, Type::String) | (Type::Bool, Type::Bool) => true,
        (Type::Semver, Type::Semver) => true,
        _ => false,
    }
}

impl<'a> Checker<'a> {
    fn error(&mut self, expr: &Expr, message: impl Into<String>) -> Type {
        self.issues.push(expr.span, message);
        Type::Dyn
    }

    fn no_overload(&mut self, expr: &Expr, function: impl std::fmt::Display, args: &[Type]) -> Type {
        let message = format!(
            "found no matching overload for '{}' applied to '({})'",
            function,
            format_args(args)
        );
        self.error(expr, message)
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find(|(var, _)| var == name)
            .map(|(_, ty)| ty.clone())
            .or_else(|| self.env.variable(name).map(|decl| decl.cel_type()))
    }

    fn check(&mut self, expr: &Expr) -> Type {
        let ty = self.check_kind(expr);
        self.types.insert(expr.id, ty.clone());
        ty
    }

    fn check_kind(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Null => Type::Null,
                Literal::Bool(_) => Type::Bool,
                Literal::Int(_) => Type::Int,
                Literal::Double(_) => Type::Double,
                Literal::String(_) => Type::String,
            },
            ExprKind::Ident(name) => match self.lookup(name) {
                Some(ty) => ty,
                None => self.error(expr, format!("undeclared reference to '{}'", name)),
            },
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                let operand_ty = self.check(operand);
                let field_ty = self.select(expr, &operand_ty, field);
                if *test_only {
                    Type::Bool
                } else {
                    field_ty
                }
            }
            ExprKind::Index { operand, index } => {
                let operand_ty = self.check(operand);
                let index_ty = self.check(index);
                self.index(expr, operand_ty, index_ty)
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check(operand);
                match (op, &operand_ty) {
                    (_, Type::Dyn) => match op {
                        UnaryOp::Not => Type::Bool,
                        UnaryOp::Neg => Type::Dyn,
                    },
                    (UnaryOp::Not, Type::Bool) => Type::Bool,
                    (UnaryOp::Neg, Type::Int) => Type::Int,
                    (UnaryOp::Neg, Type::Double) => Type::Double,
                    _ => {
                        let name = format!("{}_", op);
                        self.no_overload(expr, name, &[operand_ty])
                    }
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left_ty = self.check(left);
                let right_ty = self.check(right);
                self.binary(expr, *op, left_ty, right_ty)
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition_ty = self.check(condition);
                if !is_bool_like(&condition_ty) {
                    self.no_overload(expr, "_?_:_", &[condition_ty]);
                }
                let then_ty = self.check(then);
                let otherwise_ty = self.check(otherwise);
                then_ty.join(&otherwise_ty)
            }
            ExprKind::Call {
                target,
                function,
                args,
            } => {
                let target_ty = target.as_ref().map(|t| self.check(t));
                let arg_tys: Vec<Type> = args.iter().map(|a| self.check(a)).collect();
                self.call(expr, function, target_ty, arg_tys)
            }
            ExprKind::List(items) => {
                let mut elem: Option<Type> = None;
                for item in items {
                    let ty = self.check(item);
                    elem = Some(match elem {
                        None => ty,
                        Some(prev) => prev.join(&ty),
                    });
                }
                Type::list(elem.unwrap_or(Type::Dyn))
            }
            ExprKind::Map(entries) => {
                let mut key: Option<Type> = None;
                let mut value: Option<Type> = None;
                for (k, v) in entries {
                    let key_ty = self.check(k);
                    if !matches!(key_ty, Type::String | Type::Int | Type::Bool | Type::Dyn) {
                        self.error(k, format!("unsupported map key type '{}'", key_ty));
                    }
                    let value_ty = self.check(v);
                    key = Some(key.map_or(key_ty.clone(), |prev| prev.join(&key_ty)));
                    value = Some(value.map_or(value_ty.clone(), |prev| prev.join(&value_ty)));
                }
                Type::map(key.unwrap_or(Type::Dyn), value.unwrap_or(Type::Dyn))
            }
            ExprKind::Comprehension {
                kind,
                range,
                var,
                body,
            } => {
                let range_ty = self.check(range);
                let var_ty = match &range_ty {
                    Type::List(elem) => (**elem).clone(),
                    Type::Map(key, _) => (**key).clone(),
                    Type::Dyn => Type::Dyn,
                    other => {
                        let message = format!(
                            "expression of type '{}' cannot be the range of a comprehension",
                            other
                        );
                        self.error(range, message)
                    }
                };
                self.scopes.push((var.clone(), var_ty.clone()));
                let body_ty = self.check(body);
                self.scopes.pop();

                match kind {
                    ComprehensionKind::Map => Type::list(body_ty),
                    ComprehensionKind::All
                    | ComprehensionKind::Exists
                    | ComprehensionKind::ExistsOne
                    | ComprehensionKind::Filter => {
                        if !is_bool_like(&body_ty) {
                            self.error(
                                body,
                                format!("comprehension predicate must be bool, found '{}'", body_ty),
                            );
                        }
                        if *kind == ComprehensionKind::Filter {
                            Type::list(var_ty)
                        } else {
                            Type::Bool
                        }
                    }
                }
            }
            ExprKind::Bind { var, init, body } => {
                let init_ty = self.check(init);
                self.scopes.push((var.clone(), init_ty));
                let body_ty = self.check(body);
                self.scopes.pop();
                body_ty
            }
        }
    }

    fn select(&mut self, expr: &Expr, operand_ty: &Type, field: &str) -> Type {
        match operand_ty {
            Type::Object(name) => {
                let field_ty = self
                    .env
                    .decl_type(name)
                    .and_then(|decl| decl.field(field))
                    .map(|f| f.decl.cel_type());
                match field_ty {
                    Some(ty) => ty,
                    None => self.error(expr, format!("undefined field '{}'", field)),
                }
            }
            Type::Map(key, value) if key.is_compatible(&Type::String) => (**value).clone(),
            Type::Dyn => Type::Dyn,
            other => self.error(
                expr,
                format!("type '{}' does not support field selection", other),
            ),
        }
    }

    fn index(&mut self, expr: &Expr, operand_ty: Type, index_ty: Type) -> Type {
        match &operand_ty {
            Type::Map(key, value) if key.is_compatible(&index_ty) => (**value).clone(),
            Type::List(elem) if matches!(index_ty, Type::Int | Type::Dyn) => (**elem).clone(),
            Type::Dyn => Type::Dyn,
            _ => self.no_overload(expr, "_[_]", &[operand_ty.clone(), index_ty.clone()]),
        }
    }

    fn binary(&mut self, expr: &Expr, op: BinaryOp, left: Type, right: Type) -> Type {
        let ok = match op {
            BinaryOp::And | BinaryOp::Or => is_bool_like(&left) && is_bool_like(&right),
            BinaryOp::Eq | BinaryOp::Ne => left.is_compatible(&right),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                is_orderable(&left, &right)
            }
            BinaryOp::In => match &right {
                Type::List(elem) => elem.is_compatible(&left),
                Type::Map(key, _) => key.is_compatible(&left),
                Type::Dyn => true,
                _ => false,
            },
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                return self.arithmetic(expr, op, left, right);
            }
        };
        if ok {
            Type::Bool
        } else {
            self.no_overload(expr, op, &[left, right])
        }
    }

    fn arithmetic(&mut self, expr: &Expr, op: BinaryOp, left: Type, right: Type) -> Type {
        match (&left, &right) {
            (Type::Int, Type::Int) => Type::Int,
            (Type::Double, Type::Double) if op != BinaryOp::Rem => Type::Double,
            (Type::String, Type::String) if op == BinaryOp::Add => Type::String,
            (Type::List(a), Type::List(b)) if op == BinaryOp::Add => Type::list(a.join(b)),
            (Type::Dyn, other) | (other, Type::Dyn)
                if matches!(
                    other,
                    Type::Dyn | Type::Int | Type::Double | Type::String | Type::List(_)
                ) =>
            {
                Type::Dyn
            }
            _ => self.no_overload(expr, op, &[left.clone(), right.clone()]),
        }
    }

    fn call(
        &mut self,
        expr: &Expr,
        function: &str,
        target: Option<Type>,
        args: Vec<Type>,
    ) -> Type {
        let Some(decl) = self.env.function(function) else {
            return self.error(expr, format!("undeclared reference to '{}'", function));
        };
        let results: Vec<Type> = decl
            .overloads
            .iter()
            .filter(|o| o.accepts(target.as_ref(), &args))
            .map(|o| o.result.clone())
            .collect();

        match results.split_first() {
            Some((first, rest)) if rest.iter().all(|r| r == first) => first.clone(),
            Some(_) => Type::Dyn,
            None => {
                let applied = match &target {
                    Some(t) => format!("{}.({})", t, format_args(&args)),
                    None => format!("({})", format_args(&args)),
                };
                self.error(
                    expr,
                    format!(
                        "found no matching overload for '{}' applied to '{}'",
                        function, applied
                    ),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::env::{EnvOption, EnvSet, EnvType, PlatformVersion, VersionedOptions};
    use crate::expr::library::Library;
    use crate::expr::types::{DeclField, DeclType};
    use std::sync::Arc;

    fn test_env() -> Arc<Env> {
        let object = DeclType::object(
            "test.Item",
            [
                DeclField::new("name", DeclType::string(), true),
                DeclField::new(
                    "labels",
                    DeclType::map(DeclType::string(), DeclType::dyn_type(), 4),
                    true,
                ),
                DeclField::new("size", DeclType::quantity(), true),
            ],
        );
        EnvSet::base(PlatformVersion::new(1, 31))
            .extend(vec![VersionedOptions {
                introduced_version: PlatformVersion::new(1, 31),
                options: vec![
                    EnvOption::variable("item", object.clone()),
                    EnvOption::Library(Library::Bindings),
                    EnvOption::Library(Library::Semver),
                ],
                decl_types: vec![object],
            }])
            .unwrap()
            .env(EnvType::StoredExpressions)
            .unwrap()
    }

    fn output_type(source: &str) -> Type {
        test_env().compile(source).unwrap().output_type()
    }

    fn error_of(source: &str) -> String {
        test_env().compile(source).unwrap_err().to_string()
    }

    #[test]
    fn test_field_types() {
        assert_eq!(output_type("item.name"), Type::String);
        assert_eq!(output_type("item.labels"), Type::map(Type::String, Type::Dyn));
        assert_eq!(output_type("item.labels['x']"), Type::Dyn);
        assert_eq!(output_type("item.labels.x"), Type::Dyn);
        assert_eq!(output_type("item.size"), Type::Quantity);
    }

    #[test]
    fn test_comparisons_are_bool() {
        assert_eq!(output_type("item.name == 'a'"), Type::Bool);
        assert_eq!(output_type("item.size > 8"), Type::Bool);
        assert_eq!(output_type("item.labels['x'] > 8"), Type::Bool);
        assert_eq!(output_type("'a' in item.labels"), Type::Bool);
    }

    #[test]
    fn test_undeclared_reference() {
        assert!(error_of("other.name == 'a'").contains("undeclared reference to 'other'"));
    }

    #[test]
    fn test_undefined_field() {
        assert!(error_of("item.missing == 'a'").contains("undefined field 'missing'"));
    }

    #[test]
    fn test_mismatched_equality() {
        let err = error_of("item.name == 1");
        assert!(err.contains("found no matching overload for '_==_' applied to '(string, int)'"));
    }

    #[test]
    fn test_ordering_rejects_strings_against_ints() {
        assert!(error_of("item.name < 1").contains("'_<_'"));
    }

    #[test]
    fn test_function_overloads() {
        assert_eq!(output_type("item.name.startsWith('a')"), Type::Bool);
        assert_eq!(output_type("item.size.compareTo(quantity('1'))"), Type::Int);
        assert_eq!(output_type("semver('1.0.0').major()"), Type::Int);
        let err = error_of("item.size.startsWith('a')");
        assert!(err.contains(
            "found no matching overload for 'startsWith' applied to 'kubernetes.Quantity.(string)'"
        ));
    }

    #[test]
    fn test_dyn_receiver_resolves_shared_name_to_dyn() {
        assert_eq!(output_type("item.labels['v'].compareTo(item.labels['w'])"), Type::Int);
        assert_eq!(output_type("item.labels['v'].add(1)"), Type::Quantity);
    }

    #[test]
    fn test_comprehensions() {
        assert_eq!(output_type("item.labels.all(k, k.startsWith('a'))"), Type::Bool);
        assert_eq!(output_type("[1, 2].map(x, x * 2)"), Type::list(Type::Int));
        assert_eq!(output_type("[1, 2].filter(x, x > 1)"), Type::list(Type::Int));
        assert!(error_of("[1, 2].all(x, x + 1)").contains("comprehension predicate must be bool"));
        assert!(error_of("item.name.all(x, true)").contains("cannot be the range"));
    }

    #[test]
    fn test_comprehension_variable_is_scoped() {
        assert!(error_of("[1].all(x, true) && x == 1").contains("undeclared reference to 'x'"));
    }

    #[test]
    fn test_bind() {
        assert_eq!(
            output_type("cel.bind(l, item.labels, l['a'] == 'b' && l['c'] == 'd')"),
            Type::Bool
        );
    }

    #[test]
    fn test_conditional_join() {
        assert_eq!(output_type("true ? 1 : 2"), Type::Int);
        assert_eq!(output_type("true ? 1 : 'a'"), Type::Dyn);
    }

    #[test]
    fn test_multiple_errors_reported() {
        let issues = test_env().compile("a == b").unwrap_err();
        assert_eq!(issues.errors().len(), 2);
    }

    #[test]
    fn test_has_is_bool() {
        assert_eq!(output_type("has(item.labels.x)"), Type::Bool);
    }
}
