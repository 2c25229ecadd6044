// SPDX-License-Identifier: MIT

//! Error types for the expression engine
//!
//! Compile-time problems are collected as [`Issues`] (one [`Issue`] per
//! diagnostic, each with a source location). Everything that can go wrong
//! while running a program is an [`EvalError`].

use std::fmt;
use thiserror::Error;

use super::ast::Span;

/// A single parse or type-check diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub span: Span,
    pub message: String,
}

/// Diagnostics produced while compiling an expression
#[derive(Debug, Clone, PartialEq)]
pub struct Issues {
    source: String,
    errors: Vec<Issue>,
}

impl Issues {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            errors: Vec::new(),
        }
    }

    pub fn single(source: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        let mut issues = Self::new(source);
        issues.push(span, message);
        issues
    }

    pub fn push(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(Issue {
            span,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Issue] {
        &self.errors
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "ERROR: <input>:{}:{}: {}",
                issue.span.line, issue.span.column, issue.message
            )?;
            if let Some(line) = self.source.lines().nth(issue.span.line.saturating_sub(1) as usize)
            {
                let pad = " ".repeat(issue.span.column.saturating_sub(1) as usize);
                write!(f, "\n | {}\n | {}^", line, pad)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Issues {}

/// Errors from the environment and program construction layer
#[derive(Debug, Error)]
pub enum ExprError {
    /// Parse or type-check failure
    #[error("{0}")]
    Compile(#[from] Issues),

    /// Invalid environment declaration (conflicting variables, unknown types)
    #[error("environment error: {0}")]
    Environment(String),

    /// Program could not be instantiated from a checked AST
    #[error("program error: {0}")]
    Program(String),

    /// Static cost estimation failed
    #[error("cost estimation error: {0}")]
    Cost(String),
}

/// Runtime evaluation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("no such attribute: {0}")]
    NoSuchAttribute(String),

    #[error("found no matching overload for '{function}' applied to ({args})")]
    NoSuchOverload { function: String, args: String },

    #[error("index out of range: {0}")]
    IndexOutOfRange(i64),

    #[error("division by zero")]
    DivideByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("{function}: {message}")]
    Function { function: String, message: String },

    #[error("operation cancelled: actual cost limit exceeded")]
    CostLimitExceeded,

    #[error("operation interrupted")]
    Cancelled,

    #[error("operation interrupted: deadline exceeded")]
    DeadlineExceeded,
}

impl EvalError {
    pub fn no_such_overload(function: impl Into<String>, args: &[&str]) -> Self {
        Self::NoSuchOverload {
            function: function.into(),
            args: args.join(", "),
        }
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            function: function.into(),
            message: message.into(),
        }
    }

    /// True for errors raised by the runtime guards rather than by the expression itself
    pub fn is_interruption(&self) -> bool {
        matches!(
            self,
            Self::CostLimitExceeded | Self::Cancelled | Self::DeadlineExceeded
        )
    }
}
