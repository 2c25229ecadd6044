// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for selector expressions

use std::collections::HashMap;
use std::fmt;

use super::types::Type;

/// Unique id of a node within one parsed expression
pub type ExprId = usize;

/// 1-based source location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// An expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    /// `operand.field`; `test_only` is set for `has(operand.field)`
    Select {
        operand: Box<Expr>,
        field: String,
        test_only: bool,
    },
    Index {
        operand: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Global call `f(args)` or receiver call `target.f(args)`
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    /// Expanded `range.all(var, body)` style macros
    Comprehension {
        kind: ComprehensionKind,
        range: Box<Expr>,
        var: String,
        body: Box<Expr>,
    },
    /// Expanded `cel.bind(var, init, body)`
    Bind {
        var: String,
        init: Box<Expr>,
        body: Box<Expr>,
    },
}

/// Literal values in expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    In,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Mul | Self::Div | Self::Rem | Self::Add | Self::Sub
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    All,
    Exists,
    ExistsOne,
    Map,
    Filter,
}

impl ComprehensionKind {
    pub fn from_macro(name: &str) -> Option<Self> {
        match name {
            "all" => Some(Self::All),
            "exists" => Some(Self::Exists),
            "exists_one" => Some(Self::ExistsOne),
            "map" => Some(Self::Map),
            "filter" => Some(Self::Filter),
            _ => None,
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Neg => write!(f, "-"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::In => "in",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "_{}_", s)
    }
}

/// A parsed and type-checked expression
#[derive(Debug, Clone)]
pub struct Ast {
    source: String,
    root: Expr,
    types: HashMap<ExprId, Type>,
}

impl Ast {
    pub(crate) fn new(source: String, root: Expr, types: HashMap<ExprId, Type>) -> Self {
        Self {
            source,
            root,
            types,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Static type of the whole expression
    pub fn output_type(&self) -> Type {
        self.type_of(self.root.id)
    }

    /// Static type of one node; unchecked nodes are `dyn`
    pub fn type_of(&self, id: ExprId) -> Type {
        self.types.get(&id).cloned().unwrap_or(Type::Dyn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_display() {
        assert_eq!(BinaryOp::Eq.to_string(), "_==_");
        assert_eq!(BinaryOp::And.to_string(), "_&&_");
        assert_eq!(BinaryOp::In.to_string(), "_in_");
    }

    #[test]
    fn test_macro_names() {
        assert_eq!(
            ComprehensionKind::from_macro("exists_one"),
            Some(ComprehensionKind::ExistsOne)
        );
        assert_eq!(ComprehensionKind::from_macro("size"), None);
    }

    #[test]
    fn test_output_type_defaults_to_dyn() {
        let root = Expr {
            id: 1,
            span: Span::new(1, 1),
            kind: ExprKind::Literal(Literal::Bool(true)),
        };
        let ast = Ast::new("true".to_string(), root, HashMap::new());
        assert_eq!(ast.output_type(), Type::Dyn);
    }
}
