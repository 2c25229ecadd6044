// SPDX-License-Identifier: MIT

//! Tree-walking interpreter
//!
//! A [`Program`] is an immutable, checked expression plus its runtime limits.
//! It can be evaluated concurrently by any number of callers; each call owns
//! its own cost counter and variable scopes.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ast::{Ast, BinaryOp, ComprehensionKind, Expr, ExprKind, Literal, UnaryOp};
use super::error::{EvalError, ExprError};
use super::library::{self, SizedOperand};
use super::value::{MapKey, Value, ValueMap};

/// How many comprehension iterations pass between cancellation checks
pub const DEFAULT_INTERRUPT_CHECK_FREQUENCY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramOptions {
    /// Abort once the actual cost exceeds this many units
    pub cost_limit: Option<u64>,
    pub interrupt_check_frequency: u64,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            cost_limit: None,
            interrupt_check_frequency: DEFAULT_INTERRUPT_CHECK_FREQUENCY,
        }
    }
}

/// Variable bindings for one evaluation
pub trait Activation {
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// Activation backed by a hash map
#[derive(Debug, Clone, Default)]
pub struct MapActivation {
    vars: HashMap<String, Value>,
}

impl MapActivation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }
}

impl Activation for MapActivation {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }
}

/// Shared flag to abort evaluations from another thread or task
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancellation signal and deadline for one evaluation
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl EvalContext {
    /// Context that never cancels on its own
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now().checked_add(timeout);
        Self { deadline, ..self }
    }

    pub fn with_deadline(self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self
        }
    }

    pub fn with_cancel(self, cancel: CancelToken) -> Self {
        Self { cancel, ..self }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails once the context is cancelled or past its deadline
    pub fn check(&self) -> Result<(), EvalError> {
        if self.cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(EvalError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Bookkeeping of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalDetails {
    pub actual_cost: u64,
}

/// Outcome of [`Program::eval`]
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub result: Result<Value, EvalError>,
    pub details: EvalDetails,
}

/// An executable expression
#[derive(Debug, Clone)]
pub struct Program {
    ast: Arc<Ast>,
    options: ProgramOptions,
}

impl Program {
    pub(crate) fn new(ast: Arc<Ast>, options: ProgramOptions) -> Result<Self, ExprError> {
        if options.interrupt_check_frequency == 0 {
            return Err(ExprError::Program(
                "interrupt check frequency must be positive".to_string(),
            ));
        }
        Ok(Self { ast, options })
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn cost_limit(&self) -> Option<u64> {
        self.options.cost_limit
    }

    pub fn eval(&self, activation: &dyn Activation, ctx: &EvalContext) -> Evaluation {
        let mut interpreter = Interpreter {
            activation,
            ctx,
            cost_limit: self.options.cost_limit,
            check_frequency: self.options.interrupt_check_frequency,
            cost: 0,
            iterations: 0,
            scopes: Vec::new(),
        };
        let result = ctx.check().and_then(|()| interpreter.eval(self.ast.root()));
        Evaluation {
            result,
            details: EvalDetails {
                actual_cost: interpreter.cost,
            },
        }
    }
}

struct Interpreter<'a> {
    activation: &'a dyn Activation,
    ctx: &'a EvalContext,
    cost_limit: Option<u64>,
    check_frequency: u64,
    cost: u64,
    iterations: u64,
    scopes: Vec<(String, Value)>,
}

fn overload(function: impl Into<String>, values: &[&Value]) -> EvalError {
    let names: Vec<&str> = values.iter().map(|v| v.type_name()).collect();
    EvalError::no_such_overload(function, &names)
}

fn string_size(value: &Value) -> Option<u64> {
    match value {
        Value::String(_) => Some(value.size()),
        _ => None,
    }
}

/// Outcome of one boolean operand where errors may still be absorbed
enum Operand {
    Bool(bool),
    Error(EvalError),
}

impl<'a> Interpreter<'a> {
    fn charge(&mut self, units: u64) -> Result<(), EvalError> {
        self.cost = self.cost.saturating_add(units);
        match self.cost_limit {
            Some(limit) if self.cost > limit => Err(EvalError::CostLimitExceeded),
            _ => Ok(()),
        }
    }

    fn tick(&mut self) -> Result<(), EvalError> {
        self.iterations += 1;
        if self.iterations % self.check_frequency == 0 {
            self.ctx.check()?;
        }
        Ok(())
    }

    fn eval_in_scope(&mut self, var: &str, value: Value, body: &Expr) -> Result<Value, EvalError> {
        self.scopes.push((var.to_string(), value));
        let result = self.eval(body);
        self.scopes.pop();
        result
    }

    /// Evaluate an operand of a commutative boolean operator
    fn operand(&mut self, expr: &Expr, function: &str) -> Result<Operand, EvalError> {
        match self.eval(expr) {
            Ok(Value::Bool(b)) => Ok(Operand::Bool(b)),
            Ok(other) => Ok(Operand::Error(overload(function, &[&other]))),
            Err(e) if e.is_interruption() => Err(e),
            Err(e) => Ok(Operand::Error(e)),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Double(d) => Value::Double(*d),
                Literal::String(s) => Value::string(s),
            }),
            ExprKind::Ident(name) => {
                self.charge(1)?;
                if let Some((_, value)) = self.scopes.iter().rev().find(|(var, _)| var == name) {
                    return Ok(value.clone());
                }
                self.activation
                    .resolve(name)
                    .ok_or_else(|| EvalError::NoSuchAttribute(name.clone()))
            }
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                let operand = self.eval(operand)?;
                self.charge(1)?;
                let key = Value::string(field);
                match operand {
                    Value::Map(map) if *test_only => Ok(Value::Bool(map.contains(&key))),
                    Value::Map(map) => map
                        .find(&key)
                        .ok_or_else(|| EvalError::NoSuchKey(field.clone())),
                    other if *test_only => Err(overload("has", &[&other])),
                    other => Err(EvalError::NoSuchAttribute(format!(
                        "{} on {}",
                        field,
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Index { operand, index } => {
                let operand = self.eval(operand)?;
                let index = self.eval(index)?;
                self.charge(1)?;
                match (&operand, &index) {
                    (Value::Map(map), _) => map
                        .find(&index)
                        .ok_or_else(|| EvalError::NoSuchKey(index.to_string())),
                    (Value::List(items), Value::Int(i)) => usize::try_from(*i)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or(EvalError::IndexOutOfRange(*i)),
                    _ => Err(overload("_[_]", &[&operand, &index])),
                }
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                self.charge(1)?;
                match (op, &value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => {
                        i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow)
                    }
                    (UnaryOp::Neg, Value::Double(d)) => Ok(Value::Double(-d)),
                    _ => Err(overload(format!("{}_", op), &[&value])),
                }
            }
            ExprKind::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => self.logical(*op, left, right),
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.charge(1)?;
                self.binary(*op, left, right)
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.eval(condition)?;
                self.charge(1)?;
                match condition {
                    Value::Bool(true) => self.eval(then),
                    Value::Bool(false) => self.eval(otherwise),
                    other => Err(overload("_?_:_", &[&other])),
                }
            }
            ExprKind::Call {
                target,
                function,
                args,
            } => {
                let target = match target {
                    Some(t) => Some(self.eval(t)?),
                    None => None,
                };
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.charge(1)?;
                let sized = match library::sized_operand(function) {
                    Some(SizedOperand::Receiver) => target.as_ref().and_then(string_size),
                    Some(SizedOperand::FirstArg) => args.first().and_then(string_size),
                    None => None,
                };
                if let Some(size) = sized {
                    self.charge(library::traversal_cost(size))?;
                }
                library::call(function, target.as_ref(), &args)
            }
            ExprKind::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                self.charge(1)?;
                Ok(Value::list(items))
            }
            ExprKind::Map(entries) => {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    let key = self.eval(k)?;
                    let value = self.eval(v)?;
                    let key = MapKey::from_value(&key).ok_or_else(|| {
                        EvalError::function("map", format!("unsupported key type '{}'", key.type_name()))
                    })?;
                    if map.contains_key(&key) {
                        return Err(EvalError::function(
                            "map",
                            format!("repeated key {}", key.to_value()),
                        ));
                    }
                    map.insert(key, value);
                }
                self.charge(1)?;
                Ok(map.into_iter().collect::<ValueMap>().into_value())
            }
            ExprKind::Comprehension {
                kind,
                range,
                var,
                body,
            } => {
                let range = self.eval(range)?;
                let items = match &range {
                    Value::List(items) => items.as_ref().clone(),
                    Value::Map(map) => map.keys(),
                    other => return Err(overload(comprehension_name(*kind), &[other])),
                };
                self.comprehension(*kind, items, var, body)
            }
            ExprKind::Bind { var, init, body } => {
                let value = self.eval(init)?;
                self.eval_in_scope(var, value, body)
            }
        }
    }

    fn logical(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        let function = op.to_string();
        // the value that decides the result on its own
        let decisive = op == BinaryOp::Or;

        let left = self.operand(left, &function)?;
        if let Operand::Bool(b) = left {
            if b == decisive {
                self.charge(1)?;
                return Ok(Value::Bool(b));
            }
        }
        let right = self.operand(right, &function)?;
        self.charge(1)?;

        match (left, right) {
            (_, Operand::Bool(b)) if b == decisive => Ok(Value::Bool(b)),
            (Operand::Bool(_), Operand::Bool(b)) => Ok(Value::Bool(b)),
            (Operand::Error(e), _) | (_, Operand::Error(e)) => Err(e),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
        if op == BinaryOp::Eq || op == BinaryOp::Ne || op.is_ordering() {
            if let (Some(l), Some(r)) = (string_size(&left), string_size(&right)) {
                self.charge(library::traversal_cost(l.min(r)))?;
            }
        }

        let function = op.to_string();
        match op {
            BinaryOp::Eq => Ok(Value::Bool(left.equals(&right))),
            BinaryOp::Ne => Ok(Value::Bool(!left.equals(&right))),
            BinaryOp::Lt => Ok(Value::Bool(left.compare(&right, &function)?.is_lt())),
            BinaryOp::Le => Ok(Value::Bool(left.compare(&right, &function)?.is_le())),
            BinaryOp::Gt => Ok(Value::Bool(left.compare(&right, &function)?.is_gt())),
            BinaryOp::Ge => Ok(Value::Bool(left.compare(&right, &function)?.is_ge())),
            BinaryOp::In => match &right {
                Value::List(items) => Ok(Value::Bool(items.iter().any(|i| i.equals(&left)))),
                Value::Map(map) => Ok(Value::Bool(map.contains(&left))),
                _ => Err(overload(function, &[&left, &right])),
            },
            _ => arithmetic(op, &function, left, right),
        }
    }

    fn comprehension(
        &mut self,
        kind: ComprehensionKind,
        items: Vec<Value>,
        var: &str,
        body: &Expr,
    ) -> Result<Value, EvalError> {
        let name = comprehension_name(kind);
        let mut count = 0usize;
        let mut deferred: Option<EvalError> = None;
        let mut collected = Vec::new();

        for item in items {
            self.tick()?;
            self.charge(1)?;
            let result = self.eval_in_scope(var, item.clone(), body);
            match kind {
                ComprehensionKind::All | ComprehensionKind::Exists => {
                    let decisive = kind == ComprehensionKind::Exists;
                    match result {
                        Ok(Value::Bool(b)) if b == decisive => return Ok(Value::Bool(b)),
                        Ok(Value::Bool(_)) => {}
                        Ok(other) => {
                            deferred.get_or_insert_with(|| overload(name, &[&other]));
                        }
                        Err(e) if e.is_interruption() => return Err(e),
                        Err(e) => {
                            deferred.get_or_insert(e);
                        }
                    }
                }
                ComprehensionKind::ExistsOne => match result? {
                    Value::Bool(true) => count += 1,
                    Value::Bool(false) => {}
                    other => return Err(overload(name, &[&other])),
                },
                ComprehensionKind::Map => collected.push(result?),
                ComprehensionKind::Filter => match result? {
                    Value::Bool(true) => collected.push(item),
                    Value::Bool(false) => {}
                    other => return Err(overload(name, &[&other])),
                },
            }
        }

        match kind {
            ComprehensionKind::All | ComprehensionKind::Exists => match deferred {
                Some(e) => Err(e),
                None => Ok(Value::Bool(kind == ComprehensionKind::All)),
            },
            ComprehensionKind::ExistsOne => Ok(Value::Bool(count == 1)),
            ComprehensionKind::Map | ComprehensionKind::Filter => Ok(Value::list(collected)),
        }
    }
}

fn comprehension_name(kind: ComprehensionKind) -> &'static str {
    match kind {
        ComprehensionKind::All => "all",
        ComprehensionKind::Exists => "exists",
        ComprehensionKind::ExistsOne => "exists_one",
        ComprehensionKind::Map => "map",
        ComprehensionKind::Filter => "filter",
    }
}

fn arithmetic(op: BinaryOp, function: &str, left: Value, right: Value) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(EvalError::DivideByZero),
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Rem => a.checked_rem(b),
                _ => return Err(overload(function, &[&left, &right])),
            };
            result.map(Value::Int).ok_or(EvalError::Overflow)
        }
        (Value::Double(a), Value::Double(b)) => match op {
            BinaryOp::Add => Ok(Value::Double(a + b)),
            BinaryOp::Sub => Ok(Value::Double(a - b)),
            BinaryOp::Mul => Ok(Value::Double(a * b)),
            BinaryOp::Div => Ok(Value::Double(a / b)),
            _ => Err(overload(function, &[&left, &right])),
        },
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::string(format!("{}{}", a, b)))
        }
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            Ok(Value::list(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => Err(overload(function, &[&left, &right])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::env::{Env, EnvOption, EnvSet, EnvType, PlatformVersion, VersionedOptions};
    use crate::expr::library::Library;
    use crate::expr::types::DeclType;

    fn test_env() -> Arc<Env> {
        EnvSet::base(PlatformVersion::new(1, 31))
            .extend(vec![VersionedOptions {
                introduced_version: PlatformVersion::new(1, 31),
                options: vec![
                    EnvOption::variable("x", DeclType::dyn_type()),
                    EnvOption::variable(
                        "labels",
                        DeclType::map(DeclType::string(), DeclType::string(), 8),
                    ),
                    EnvOption::Library(Library::Bindings),
                    EnvOption::Library(Library::Semver),
                ],
                decl_types: Vec::new(),
            }])
            .unwrap()
            .env(EnvType::StoredExpressions)
            .unwrap()
    }

    fn labels() -> Value {
        let mut map = ValueMap::new();
        map.insert("zone", "a");
        map.insert("tier", "gold");
        map.into_value()
    }

    fn run_with(source: &str, options: ProgramOptions, ctx: &EvalContext) -> Evaluation {
        let env = test_env();
        let ast = env.compile(source).unwrap();
        let program = env.program(&ast, options).unwrap();
        let activation = MapActivation::new()
            .with("x", Value::Int(3))
            .with("labels", labels());
        program.eval(&activation, ctx)
    }

    fn run(source: &str) -> Result<Value, EvalError> {
        run_with(source, ProgramOptions::default(), &EvalContext::background()).result
    }

    fn run_bool(source: &str) -> bool {
        run(source).unwrap().as_bool().unwrap()
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        assert!(run_bool("x * 2 + 1 == 7"));
        assert!(run_bool("10 / x == 3 && 10 % x == 1"));
        assert!(run_bool("2.5 > x - 1"));
        assert!(run_bool("'ab' + 'c' == 'abc'"));
        assert!(run_bool("[1] + [2] == [1, 2]"));
    }

    #[test]
    fn test_runtime_errors() {
        assert_eq!(run("x / 0").unwrap_err(), EvalError::DivideByZero);
        assert_eq!(
            run("9223372036854775807 + x").unwrap_err(),
            EvalError::Overflow
        );
        assert_eq!(run("[1, 2][5]").unwrap_err(), EvalError::IndexOutOfRange(5));
        assert_eq!(
            run("labels['missing'] == 'a'").unwrap_err(),
            EvalError::NoSuchKey("\"missing\"".to_string())
        );
    }

    #[test]
    fn test_logical_operators_absorb_errors() {
        assert!(!run_bool("labels['missing'] == 'a' && false"));
        assert!(!run_bool("false && labels['missing'] == 'a'"));
        assert!(run_bool("labels['missing'] == 'a' || true"));
        assert!(run("labels['missing'] == 'a' && true").is_err());
    }

    #[test]
    fn test_membership_and_has() {
        assert!(run_bool("'zone' in labels"));
        assert!(!run_bool("'rack' in labels"));
        assert!(run_bool("has(labels.tier) && !has(labels.rack)"));
        assert!(run_bool("2 in [1, 2, 3]"));
    }

    #[test]
    fn test_comprehensions() {
        assert!(run_bool("labels.all(k, k.size() == 4)"));
        assert!(run_bool("labels.exists(k, labels[k] == 'gold')"));
        assert!(run_bool("[1, 2, 3].exists_one(i, i > 2)"));
        assert!(run_bool("[1, 2, 3].map(i, i * 2) == [2, 4, 6]"));
        assert!(run_bool("[1, 2, 3].filter(i, i != 2) == [1, 3]"));
    }

    #[test]
    fn test_bind_and_conditional() {
        assert!(run_bool("cel.bind(z, labels.zone, z == 'a' ? true : false)"));
    }

    #[test]
    fn test_library_calls() {
        assert!(run_bool("semver('1.2.3').isLessThan(semver('1.10.0'))"));
        assert!(run_bool("quantity('1Gi').compareTo(quantity('1G')) == 1"));
        assert!(run_bool("quantity('2').add(x) > 4"));
    }

    #[test]
    fn test_actual_cost_is_reported() {
        let eval = run_with(
            "labels.zone == 'a'",
            ProgramOptions::default(),
            &EvalContext::background(),
        );
        // ident + select + operator + ceil(1 / 10)
        assert_eq!(eval.details.actual_cost, 4);
        assert_eq!(eval.result.unwrap().as_bool(), Some(true));
    }

    #[test]
    fn test_cost_limit_aborts() {
        let options = ProgramOptions {
            cost_limit: Some(10),
            ..ProgramOptions::default()
        };
        let eval = run_with(
            "[1, 2, 3, 4, 5, 6, 7, 8].all(i, i > 0)",
            options,
            &EvalContext::background(),
        );
        assert_eq!(eval.result.unwrap_err(), EvalError::CostLimitExceeded);
        assert!(eval.details.actual_cost > 10);
    }

    #[test]
    fn test_cost_limit_is_not_absorbed_by_logical_operators() {
        let options = ProgramOptions {
            cost_limit: Some(3),
            ..ProgramOptions::default()
        };
        let eval = run_with(
            "[1, 2, 3].all(i, i > 0) || true",
            options,
            &EvalContext::background(),
        );
        assert_eq!(eval.result.unwrap_err(), EvalError::CostLimitExceeded);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = EvalContext::background().with_cancel(token);
        let eval = run_with("true", ProgramOptions::default(), &ctx);
        assert_eq!(eval.result.unwrap_err(), EvalError::Cancelled);
        assert_eq!(eval.details.actual_cost, 0);
    }

    #[test]
    fn test_past_deadline() {
        let options = ProgramOptions {
            interrupt_check_frequency: 1,
            ..ProgramOptions::default()
        };
        let past = Instant::now();
        let ctx = EvalContext::background().with_deadline(past);
        let eval = run_with("[1, 2].all(i, true)", options, &ctx);
        assert_eq!(eval.result.unwrap_err(), EvalError::DeadlineExceeded);
    }

    #[test]
    fn test_zero_check_frequency_rejected() {
        let env = test_env();
        let ast = env.compile("true").unwrap();
        let options = ProgramOptions {
            interrupt_check_frequency: 0,
            ..ProgramOptions::default()
        };
        assert!(matches!(
            env.program(&ast, options),
            Err(ExprError::Program(_))
        ));
    }

    #[test]
    fn test_program_is_reusable() {
        let env = test_env();
        let ast = env.compile("x > 2").unwrap();
        let program = env.program(&ast, ProgramOptions::default()).unwrap();
        for value in [1i64, 3, 5] {
            let activation = MapActivation::new().with("x", value);
            let eval = program.eval(&activation, &EvalContext::background());
            assert_eq!(eval.result.unwrap().as_bool(), Some(value > 2));
        }
    }
}
