// SPDX-License-Identifier: MIT

//! Expression language for device selectors
//!
//! A small, side-effect-free, CEL-like language with static types, a cost
//! model and cancellable evaluation. The usual flow is:
//! - build an [`Env`] (usually through an [`EnvSet`])
//! - `env.compile(text)` to parse and type-check into an [`Ast`]
//! - `env.program(&ast, options)` to get an executable [`Program`]
//! - `program.eval(&activation, &ctx)` per input

mod ast;
mod checker;
mod cost;
mod env;
mod error;
mod interpreter;
mod lexer;
mod library;
mod parser;
mod quantity;
mod types;
mod value;

pub use ast::{Ast, Span};
pub use cost::CostEstimate;
pub use env::{
    base_options, Env, EnvOption, EnvSet, EnvType, PlatformVersion, VersionedOptions,
};
pub use error::{EvalError, ExprError, Issue, Issues};
pub use interpreter::{
    Activation, CancelToken, EvalContext, EvalDetails, Evaluation, MapActivation, Program,
    ProgramOptions, DEFAULT_INTERRUPT_CHECK_FREQUENCY,
};
pub use library::Library;
pub use parser::MAX_SOURCE_CODE_POINTS;
pub use quantity::{Quantity, QuantityError};
pub use types::{DeclField, DeclKind, DeclType, Type};
pub use value::{MapKey, MapValue, Mapper, Value, ValueMap};
