// SPDX-License-Identifier: MIT

//! Function libraries
//!
//! Each [`Library`] contributes function declarations for the checker and the
//! matching runtime implementations. Which libraries are available is decided
//! by the environment version.

use std::cmp::Ordering;

use super::error::EvalError;
use super::quantity::Quantity;
use super::types::Type;
use super::value::Value;

/// Optional language features, enabled per environment version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Library {
    /// Conversions and `size`
    Core,
    /// String helpers such as `startsWith`
    Strings,
    /// `quantity()` and quantity member functions
    Quantity,
    /// `semver()` and semantic version member functions
    Semver,
    /// The `cel.bind()` macro
    Bindings,
}

/// One typed signature of a function
#[derive(Debug, Clone, PartialEq)]
pub struct Overload {
    pub receiver: Option<Type>,
    pub params: Vec<Type>,
    pub result: Type,
}

impl Overload {
    fn global(params: Vec<Type>, result: Type) -> Self {
        Self {
            receiver: None,
            params,
            result,
        }
    }

    fn member(receiver: Type, params: Vec<Type>, result: Type) -> Self {
        Self {
            receiver: Some(receiver),
            params,
            result,
        }
    }

    /// Whether the overload accepts the given argument types
    pub fn accepts(&self, receiver: Option<&Type>, args: &[Type]) -> bool {
        let receiver_ok = match (&self.receiver, receiver) {
            (None, None) => true,
            (Some(expected), Some(actual)) => expected.is_compatible(actual),
            _ => false,
        };
        receiver_ok
            && self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(expected, actual)| expected.is_compatible(actual))
    }
}

/// All overloads of one function name
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: &'static str,
    pub overloads: Vec<Overload>,
}

impl FunctionDecl {
    fn new(name: &'static str, overloads: Vec<Overload>) -> Self {
        Self { name, overloads }
    }
}

impl Library {
    pub fn functions(self) -> Vec<FunctionDecl> {
        use Type as T;
        let any_list = || Type::list(T::Dyn);
        let any_map = || Type::map(T::Dyn, T::Dyn);
        match self {
            Library::Core => vec![
                FunctionDecl::new(
                    "size",
                    vec![
                        Overload::global(vec![T::String], T::Int),
                        Overload::global(vec![any_list()], T::Int),
                        Overload::global(vec![any_map()], T::Int),
                        Overload::member(T::String, vec![], T::Int),
                        Overload::member(any_list(), vec![], T::Int),
                        Overload::member(any_map(), vec![], T::Int),
                    ],
                ),
                FunctionDecl::new(
                    "int",
                    vec![
                        Overload::global(vec![T::Int], T::Int),
                        Overload::global(vec![T::Double], T::Int),
                        Overload::global(vec![T::String], T::Int),
                    ],
                ),
                FunctionDecl::new(
                    "double",
                    vec![
                        Overload::global(vec![T::Int], T::Double),
                        Overload::global(vec![T::Double], T::Double),
                        Overload::global(vec![T::String], T::Double),
                    ],
                ),
                FunctionDecl::new(
                    "string",
                    vec![
                        Overload::global(vec![T::Int], T::String),
                        Overload::global(vec![T::Double], T::String),
                        Overload::global(vec![T::Bool], T::String),
                        Overload::global(vec![T::String], T::String),
                    ],
                ),
            ],
            Library::Strings => ["contains", "startsWith", "endsWith"]
                .into_iter()
                .map(|name| {
                    FunctionDecl::new(name, vec![Overload::member(T::String, vec![T::String], T::Bool)])
                })
                .chain(["lowerAscii", "upperAscii"].into_iter().map(|name| {
                    FunctionDecl::new(name, vec![Overload::member(T::String, vec![], T::String)])
                }))
                .collect(),
            Library::Quantity => vec![
                FunctionDecl::new("quantity", vec![Overload::global(vec![T::String], T::Quantity)]),
                FunctionDecl::new("isQuantity", vec![Overload::global(vec![T::String], T::Bool)]),
                FunctionDecl::new(
                    "compareTo",
                    vec![Overload::member(T::Quantity, vec![T::Quantity], T::Int)],
                ),
                FunctionDecl::new(
                    "isGreaterThan",
                    vec![Overload::member(T::Quantity, vec![T::Quantity], T::Bool)],
                ),
                FunctionDecl::new(
                    "isLessThan",
                    vec![Overload::member(T::Quantity, vec![T::Quantity], T::Bool)],
                ),
                FunctionDecl::new(
                    "add",
                    vec![
                        Overload::member(T::Quantity, vec![T::Quantity], T::Quantity),
                        Overload::member(T::Quantity, vec![T::Int], T::Quantity),
                    ],
                ),
                FunctionDecl::new(
                    "sub",
                    vec![
                        Overload::member(T::Quantity, vec![T::Quantity], T::Quantity),
                        Overload::member(T::Quantity, vec![T::Int], T::Quantity),
                    ],
                ),
                FunctionDecl::new("sign", vec![Overload::member(T::Quantity, vec![], T::Int)]),
                FunctionDecl::new("isInteger", vec![Overload::member(T::Quantity, vec![], T::Bool)]),
                FunctionDecl::new("asInteger", vec![Overload::member(T::Quantity, vec![], T::Int)]),
                FunctionDecl::new(
                    "asApproximateFloat",
                    vec![Overload::member(T::Quantity, vec![], T::Double)],
                ),
            ],
            Library::Semver => vec![
                FunctionDecl::new("semver", vec![Overload::global(vec![T::String], T::Semver)]),
                FunctionDecl::new("isSemver", vec![Overload::global(vec![T::String], T::Bool)]),
                FunctionDecl::new("major", vec![Overload::member(T::Semver, vec![], T::Int)]),
                FunctionDecl::new("minor", vec![Overload::member(T::Semver, vec![], T::Int)]),
                FunctionDecl::new("patch", vec![Overload::member(T::Semver, vec![], T::Int)]),
                FunctionDecl::new("compareTo", vec![Overload::member(T::Semver, vec![T::Semver], T::Int)]),
                FunctionDecl::new(
                    "isGreaterThan",
                    vec![Overload::member(T::Semver, vec![T::Semver], T::Bool)],
                ),
                FunctionDecl::new(
                    "isLessThan",
                    vec![Overload::member(T::Semver, vec![T::Semver], T::Bool)],
                ),
            ],
            Library::Bindings => Vec::new(),
        }
    }
}

/// Which operand's size drives a function's extra cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SizedOperand {
    Receiver,
    FirstArg,
}

pub(crate) fn sized_operand(function: &str) -> Option<SizedOperand> {
    match function {
        "contains" | "startsWith" | "endsWith" | "lowerAscii" | "upperAscii" => {
            Some(SizedOperand::Receiver)
        }
        "quantity" | "isQuantity" | "semver" | "isSemver" | "int" | "double" => {
            Some(SizedOperand::FirstArg)
        }
        _ => None,
    }
}

/// Cost of walking a string or collection of the given size
pub(crate) fn traversal_cost(size: u64) -> u64 {
    size.div_ceil(10)
}

fn ordering_to_int(ordering: Ordering) -> Value {
    Value::Int(match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

fn no_overload(function: &str, target: Option<&Value>, args: &[Value]) -> EvalError {
    let names: Vec<&str> = target
        .into_iter()
        .chain(args.iter())
        .map(Value::type_name)
        .collect();
    EvalError::no_such_overload(function, &names)
}

fn parse_quantity(text: &str) -> Result<Quantity, EvalError> {
    text.parse::<Quantity>()
        .map_err(|e| EvalError::function("quantity", e.to_string()))
}

fn parse_semver(text: &str) -> Result<semver::Version, EvalError> {
    semver::Version::parse(text).map_err(|e| EvalError::function("semver", e.to_string()))
}

fn quantity_operand(value: &Value) -> Option<Quantity> {
    match value {
        Value::Quantity(q) => Some(q.clone()),
        Value::Int(i) => Some(Quantity::from_int(*i)),
        _ => None,
    }
}

/// Run a declared function against runtime values
pub(crate) fn call(
    function: &str,
    target: Option<&Value>,
    args: &[Value],
) -> Result<Value, EvalError> {
    let overflow = || EvalError::function(function, "quantity out of range");
    let result = match (function, target, args) {
        ("size", None, [arg]) | ("size", Some(arg), []) => match arg {
            Value::String(_) | Value::List(_) | Value::Map(_) => {
                Value::Int(i64::try_from(arg.size()).map_err(|_| EvalError::Overflow)?)
            }
            _ => return Err(no_overload(function, target, args)),
        },
        ("int", None, [arg]) => match arg {
            Value::Int(i) => Value::Int(*i),
            Value::Double(d) => {
                if !d.is_finite() || *d >= i64::MAX as f64 || *d < i64::MIN as f64 {
                    return Err(EvalError::Overflow);
                }
                Value::Int(d.trunc() as i64)
            }
            Value::String(s) => Value::Int(
                s.parse()
                    .map_err(|_| EvalError::function("int", format!("cannot parse '{}'", s)))?,
            ),
            _ => return Err(no_overload(function, target, args)),
        },
        ("double", None, [arg]) => match arg {
            Value::Int(i) => Value::Double(*i as f64),
            Value::Double(d) => Value::Double(*d),
            Value::String(s) => Value::Double(
                s.parse()
                    .map_err(|_| EvalError::function("double", format!("cannot parse '{}'", s)))?,
            ),
            _ => return Err(no_overload(function, target, args)),
        },
        ("string", None, [arg]) => match arg {
            Value::String(s) => Value::String(s.clone()),
            Value::Int(_) | Value::Double(_) | Value::Bool(_) => Value::string(arg.to_string()),
            _ => return Err(no_overload(function, target, args)),
        },
        ("contains", Some(Value::String(s)), [Value::String(sub)]) => {
            Value::Bool(s.contains(&**sub))
        }
        ("startsWith", Some(Value::String(s)), [Value::String(prefix)]) => {
            Value::Bool(s.starts_with(&**prefix))
        }
        ("endsWith", Some(Value::String(s)), [Value::String(suffix)]) => {
            Value::Bool(s.ends_with(&**suffix))
        }
        ("lowerAscii", Some(Value::String(s)), []) => Value::string(s.to_ascii_lowercase()),
        ("upperAscii", Some(Value::String(s)), []) => Value::string(s.to_ascii_uppercase()),

        ("quantity", None, [Value::String(s)]) => Value::Quantity(parse_quantity(s)?),
        ("isQuantity", None, [Value::String(s)]) => Value::Bool(s.parse::<Quantity>().is_ok()),
        ("compareTo", Some(Value::Quantity(a)), [Value::Quantity(b)]) => ordering_to_int(a.cmp(b)),
        ("isGreaterThan", Some(Value::Quantity(a)), [Value::Quantity(b)]) => Value::Bool(a > b),
        ("isLessThan", Some(Value::Quantity(a)), [Value::Quantity(b)]) => Value::Bool(a < b),
        ("add", Some(Value::Quantity(a)), [other]) => {
            let b = quantity_operand(other).ok_or_else(|| no_overload(function, target, args))?;
            Value::Quantity(a.checked_add(&b).ok_or_else(overflow)?)
        }
        ("sub", Some(Value::Quantity(a)), [other]) => {
            let b = quantity_operand(other).ok_or_else(|| no_overload(function, target, args))?;
            Value::Quantity(a.checked_sub(&b).ok_or_else(overflow)?)
        }
        ("sign", Some(Value::Quantity(q)), []) => Value::Int(q.sign()),
        ("isInteger", Some(Value::Quantity(q)), []) => Value::Bool(q.as_integer().is_some()),
        ("asInteger", Some(Value::Quantity(q)), []) => Value::Int(q.as_integer().ok_or_else(
            || EvalError::function("asInteger", format!("cannot convert '{}' to an int", q)),
        )?),
        ("asApproximateFloat", Some(Value::Quantity(q)), []) => {
            Value::Double(q.as_approximate_f64())
        }

        ("semver", None, [Value::String(s)]) => Value::from(parse_semver(s)?),
        ("isSemver", None, [Value::String(s)]) => {
            Value::Bool(semver::Version::parse(s).is_ok())
        }
        ("major", Some(Value::Semver(v)), []) => {
            Value::Int(i64::try_from(v.major).map_err(|_| EvalError::Overflow)?)
        }
        ("minor", Some(Value::Semver(v)), []) => {
            Value::Int(i64::try_from(v.minor).map_err(|_| EvalError::Overflow)?)
        }
        ("patch", Some(Value::Semver(v)), []) => {
            Value::Int(i64::try_from(v.patch).map_err(|_| EvalError::Overflow)?)
        }
        ("compareTo", Some(Value::Semver(a)), [Value::Semver(b)]) => ordering_to_int(a.cmp(b)),
        ("isGreaterThan", Some(Value::Semver(a)), [Value::Semver(b)]) => Value::Bool(a > b),
        ("isLessThan", Some(Value::Semver(a)), [Value::Semver(b)]) => Value::Bool(a < b),

        _ => return Err(no_overload(function, target, args)),
    };
    Ok(result)
}
