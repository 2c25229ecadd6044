// SPDX-License-Identifier: MIT

//! The expression engine as seen by device selection
//!
//! Selection owns the device schema, normalization, default lookups and the
//! conversion of results to bool. Parsing, checking, costing and running an
//! expression all go through [`Engine`] and [`Runnable`]; [`Env`] and
//! [`Program`] are the built-in implementations.

use std::fmt;
use std::sync::Arc;

use crate::expr::{
    Activation, Ast, CostEstimate, Env, EvalContext, Evaluation, ExprError, Issues, MapValue,
    Program, ProgramOptions,
};

/// Compiles expression text against one declared schema
pub trait Engine: Send + Sync + fmt::Debug {
    /// Parse and type-check `text`
    fn check(&self, text: &str) -> Result<Ast, Issues>;

    /// Build an executable program from a checked expression
    fn instantiate(
        &self,
        ast: &Ast,
        options: ProgramOptions,
    ) -> Result<Arc<dyn Runnable>, ExprError>;

    /// Worst-case cost under the schema's declared bounds
    fn estimate_cost(&self, ast: &Ast) -> Result<CostEstimate, ExprError>;

    /// Map standing in for an absent domain
    fn empty_map(&self) -> MapValue;
}

/// A compiled expression that can be run against bindings
pub trait Runnable: Send + Sync + fmt::Debug {
    /// Run under `ctx`, which may cancel or time out the evaluation
    fn run(&self, bindings: &dyn Activation, ctx: &EvalContext) -> Evaluation;

    fn cost_limit(&self) -> Option<u64>;
}

impl Engine for Env {
    fn check(&self, text: &str) -> Result<Ast, Issues> {
        self.compile(text)
    }

    fn instantiate(
        &self,
        ast: &Ast,
        options: ProgramOptions,
    ) -> Result<Arc<dyn Runnable>, ExprError> {
        let program = self.program(ast, options)?;
        Ok(Arc::new(program))
    }

    fn estimate_cost(&self, ast: &Ast) -> Result<CostEstimate, ExprError> {
        Env::estimate_cost(self, ast)
    }

    fn empty_map(&self) -> MapValue {
        Env::empty_map(self)
    }
}

impl Runnable for Program {
    fn run(&self, bindings: &dyn Activation, ctx: &EvalContext) -> Evaluation {
        self.eval(bindings, ctx)
    }

    fn cost_limit(&self) -> Option<u64> {
        Program::cost_limit(self)
    }
}
