// SPDX-License-Identifier: MIT

//! Recursive-descent parser for selector expressions
//!
//! Precedence, lowest first:
//! - `c ? a : b`
//! - `||`
//! - `&&`
//! - `< <= > >= == != in`
//! - `+ -`
//! - `* / %`
//! - `! -` (unary)
//! - `.field`, `.call()`, `[index]`
//!
//! Macros (`has`, `all`, `exists`, `exists_one`, `map`, `filter` and, when
//! enabled, `cel.bind`) are expanded into dedicated nodes while parsing.

use super::ast::{BinaryOp, ComprehensionKind, Expr, ExprId, ExprKind, Literal, Span, UnaryOp};
use super::error::Issues;
use super::lexer::{tokenize, Spanned, Token};

/// Nesting limit for the parsed tree: parentheses, operator chains and
/// member chains all count
const MAX_DEPTH: usize = 100;

/// Longest accepted expression, in code points
pub const MAX_SOURCE_CODE_POINTS: usize = 100_000;

/// Parser switches derived from the environment's libraries
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Expand `cel.bind(var, init, body)`
    pub bindings: bool,
}

/// Parse an expression string into an AST
pub fn parse(source: &str, options: ParserOptions) -> Result<Expr, Issues> {
    let size = source.chars().count();
    if size > MAX_SOURCE_CODE_POINTS {
        return Err(Issues::single(
            String::new(),
            Span::new(1, 1),
            format!(
                "expression code point size exceeds limit: size: {}, limit {}",
                size, MAX_SOURCE_CODE_POINTS
            ),
        ));
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        next_id: 1,
        depth: 0,
        options,
    };
    let expr = parser.expr()?;
    let trailing = parser.peek();
    if trailing.token != Token::Eof {
        return Err(parser.error_at(
            trailing.span,
            format!("unexpected token '{}'", trailing.token.describe()),
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    next_id: ExprId,
    depth: usize,
    options: ParserOptions,
}

type ParseResult = Result<Expr, Issues>;

impl<'a> Parser<'a> {
    fn peek(&self) -> Spanned {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .cloned()
            .unwrap_or(Spanned {
                token: Token::Eof,
                span: Span::default(),
            })
    }

    fn advance(&mut self) -> Spanned {
        let current = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        current
    }

    fn check(&self, token: &Token) -> bool {
        &self.peek().token == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<Span, Issues> {
        let next = self.peek();
        if next.token == token {
            self.advance();
            Ok(next.span)
        } else {
            Err(self.error_at(
                next.span,
                format!(
                    "expected '{}' but found '{}'",
                    token.describe(),
                    next.token.describe()
                ),
            ))
        }
    }

    fn error_at(&self, span: Span, message: impl Into<String>) -> Issues {
        Issues::single(self.source, span, message)
    }

    fn node(&mut self, span: Span, kind: ExprKind) -> Expr {
        let id = self.next_id;
        self.next_id += 1;
        Expr { id, span, kind }
    }

    fn enter(&mut self, span: Span) -> Result<(), Issues> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error_at(span, "expression recursion limit exceeded"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Run a loop that stacks nodes on the left; every `enter` it makes is
    /// undone when it returns
    fn chain(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult) -> ParseResult {
        let depth = self.depth;
        let result = parse(self);
        self.depth = depth;
        result
    }

    fn expr(&mut self) -> ParseResult {
        let span = self.peek().span;
        self.enter(span)?;
        let result = self.conditional();
        self.leave();
        result
    }

    fn conditional(&mut self) -> ParseResult {
        let condition = self.or()?;
        if !self.check(&Token::Question) {
            return Ok(condition);
        }
        let span = self.advance().span;
        let then = self.or()?;
        self.expect(Token::Colon)?;
        let otherwise = self.expr()?;
        Ok(self.node(
            span,
            ExprKind::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        ))
    }

    fn or(&mut self) -> ParseResult {
        self.chain(|p| {
            let mut left = p.and()?;
            while p.check(&Token::OrOr) {
                let span = p.advance().span;
                p.enter(span)?;
                let right = p.and()?;
                left = p.binary(span, BinaryOp::Or, left, right);
            }
            Ok(left)
        })
    }

    fn and(&mut self) -> ParseResult {
        self.chain(|p| {
            let mut left = p.relation()?;
            while p.check(&Token::AndAnd) {
                let span = p.advance().span;
                p.enter(span)?;
                let right = p.relation()?;
                left = p.binary(span, BinaryOp::And, left, right);
            }
            Ok(left)
        })
    }

    fn relation(&mut self) -> ParseResult {
        self.chain(|p| {
            let mut left = p.addition()?;
            loop {
                let op = match p.peek().token {
                    Token::Lt => BinaryOp::Lt,
                    Token::Le => BinaryOp::Le,
                    Token::Gt => BinaryOp::Gt,
                    Token::Ge => BinaryOp::Ge,
                    Token::EqEq => BinaryOp::Eq,
                    Token::NotEq => BinaryOp::Ne,
                    Token::In => BinaryOp::In,
                    _ => return Ok(left),
                };
                let span = p.advance().span;
                p.enter(span)?;
                let right = p.addition()?;
                left = p.binary(span, op, left, right);
            }
        })
    }

    fn addition(&mut self) -> ParseResult {
        self.chain(|p| {
            let mut left = p.multiplication()?;
            loop {
                let op = match p.peek().token {
                    Token::Plus => BinaryOp::Add,
                    Token::Minus => BinaryOp::Sub,
                    _ => return Ok(left),
                };
                let span = p.advance().span;
                p.enter(span)?;
                let right = p.multiplication()?;
                left = p.binary(span, op, left, right);
            }
        })
    }

    fn multiplication(&mut self) -> ParseResult {
        self.chain(|p| {
            let mut left = p.unary()?;
            loop {
                let op = match p.peek().token {
                    Token::Star => BinaryOp::Mul,
                    Token::Slash => BinaryOp::Div,
                    Token::Percent => BinaryOp::Rem,
                    _ => return Ok(left),
                };
                let span = p.advance().span;
                p.enter(span)?;
                let right = p.unary()?;
                left = p.binary(span, op, left, right);
            }
        })
    }

    fn unary(&mut self) -> ParseResult {
        let next = self.peek();
        match next.token {
            Token::Bang => {
                self.advance();
                self.enter(next.span)?;
                let operand = self.unary();
                self.leave();
                Ok(self.node(
                    next.span,
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand?),
                    },
                ))
            }
            Token::Minus => {
                self.advance();
                // Fold negative numeric literals so i64::MIN is expressible
                if let Token::Int(n) = self.peek().token {
                    if !self.is_member_continuation(1) {
                        self.advance();
                        let value = 0i64.checked_sub_unsigned(n).ok_or_else(|| {
                            self.error_at(next.span, format!("invalid int literal '-{}'", n))
                        })?;
                        return Ok(self.node(next.span, ExprKind::Literal(Literal::Int(value))));
                    }
                }
                self.enter(next.span)?;
                let operand = self.unary();
                self.leave();
                Ok(self.node(
                    next.span,
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand?),
                    },
                ))
            }
            _ => self.member(),
        }
    }

    fn is_member_continuation(&self, offset: usize) -> bool {
        matches!(
            self.tokens.get(self.pos + offset).map(|s| &s.token),
            Some(Token::Dot) | Some(Token::LBracket)
        )
    }

    fn member(&mut self) -> ParseResult {
        self.chain(|p| {
            let mut operand = p.primary()?;
            loop {
                let next = p.peek();
                match next.token {
                    Token::Dot => {
                        p.advance();
                        p.enter(next.span)?;
                        let name_tok = p.advance();
                        let Token::Ident(name) = name_tok.token else {
                            return Err(p.error_at(
                                name_tok.span,
                                format!(
                                    "expected identifier after '.' but found '{}'",
                                    name_tok.token.describe()
                                ),
                            ));
                        };
                        if p.eat(&Token::LParen) {
                            let args = p.arguments()?;
                            operand = p.receiver_call(name_tok.span, operand, name, args)?;
                        } else {
                            operand = p.node(
                                name_tok.span,
                                ExprKind::Select {
                                    operand: Box::new(operand),
                                    field: name,
                                    test_only: false,
                                },
                            );
                        }
                    }
                    Token::LBracket => {
                        p.advance();
                        p.enter(next.span)?;
                        let index = p.expr()?;
                        p.expect(Token::RBracket)?;
                        operand = p.node(
                            next.span,
                            ExprKind::Index {
                                operand: Box::new(operand),
                                index: Box::new(index),
                            },
                        );
                    }
                    _ => return Ok(operand),
                }
            }
        })
    }

    /// Arguments after an already consumed `(`
    fn arguments(&mut self) -> Result<Vec<Expr>, Issues> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen)?;
            return Ok(args);
        }
    }

    fn receiver_call(
        &mut self,
        span: Span,
        target: Expr,
        function: String,
        args: Vec<Expr>,
    ) -> ParseResult {
        let args = match ComprehensionKind::from_macro(&function) {
            Some(kind) => match <[Expr; 2]>::try_from(args) {
                Ok([var, body]) => {
                    let ExprKind::Ident(var) = var.kind else {
                        return Err(self.error_at(var.span, "argument must be a simple name"));
                    };
                    return Ok(self.node(
                        span,
                        ExprKind::Comprehension {
                            kind,
                            range: Box::new(target),
                            var,
                            body: Box::new(body),
                        },
                    ));
                }
                Err(args) => args,
            },
            None => args,
        };

        if self.options.bindings
            && function == "bind"
            && matches!(&target.kind, ExprKind::Ident(ns) if ns == "cel")
        {
            let [var, init, body] = <[Expr; 3]>::try_from(args)
                .map_err(|_| self.error_at(span, "cel.bind() requires 3 arguments"))?;
            let ExprKind::Ident(var) = var.kind else {
                return Err(self.error_at(
                    var.span,
                    "cel.bind() variable name must be a simple identifier",
                ));
            };
            return Ok(self.node(
                span,
                ExprKind::Bind {
                    var,
                    init: Box::new(init),
                    body: Box::new(body),
                },
            ));
        }

        Ok(self.node(
            span,
            ExprKind::Call {
                target: Some(Box::new(target)),
                function,
                args,
            },
        ))
    }

    fn primary(&mut self) -> ParseResult {
        let next = self.advance();
        let span = next.span;
        match next.token {
            Token::Int(n) => {
                let value = i64::try_from(n)
                    .map_err(|_| self.error_at(span, format!("invalid int literal '{}'", n)))?;
                Ok(self.node(span, ExprKind::Literal(Literal::Int(value))))
            }
            Token::Double(d) => Ok(self.node(span, ExprKind::Literal(Literal::Double(d)))),
            Token::String(s) => Ok(self.node(span, ExprKind::Literal(Literal::String(s)))),
            Token::True => Ok(self.node(span, ExprKind::Literal(Literal::Bool(true)))),
            Token::False => Ok(self.node(span, ExprKind::Literal(Literal::Bool(false)))),
            Token::Null => Ok(self.node(span, ExprKind::Literal(Literal::Null))),
            Token::Ident(name) => {
                if !self.eat(&Token::LParen) {
                    return Ok(self.node(span, ExprKind::Ident(name)));
                }
                let args = self.arguments()?;
                if name == "has" {
                    return self.has_macro(span, args);
                }
                Ok(self.node(
                    span,
                    ExprKind::Call {
                        target: None,
                        function: name,
                        args,
                    },
                ))
            }
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expr()?);
                        if self.eat(&Token::Comma) {
                            if self.eat(&Token::RBracket) {
                                break;
                            }
                            continue;
                        }
                        self.expect(Token::RBracket)?;
                        break;
                    }
                }
                Ok(self.node(span, ExprKind::List(items)))
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = self.expr()?;
                        self.expect(Token::Colon)?;
                        let value = self.expr()?;
                        entries.push((key, value));
                        if self.eat(&Token::Comma) {
                            if self.eat(&Token::RBrace) {
                                break;
                            }
                            continue;
                        }
                        self.expect(Token::RBrace)?;
                        break;
                    }
                }
                Ok(self.node(span, ExprKind::Map(entries)))
            }
            other => Err(self.error_at(
                span,
                format!("unexpected token '{}'", other.describe()),
            )),
        }
    }

    fn has_macro(&mut self, span: Span, mut args: Vec<Expr>) -> ParseResult {
        if args.len() != 1 {
            return Err(self.error_at(span, "has() requires exactly one argument"));
        }
        let arg = args.remove(0);
        match arg.kind {
            ExprKind::Select { operand, field, .. } => Ok(self.node(
                span,
                ExprKind::Select {
                    operand,
                    field,
                    test_only: true,
                },
            )),
            _ => Err(self.error_at(arg.span, "invalid argument to has() macro")),
        }
    }

    fn binary(&mut self, span: Span, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.node(
            span,
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_default(input: &str) -> Expr {
        parse(input, ParserOptions { bindings: true }).unwrap()
    }

    #[test]
    fn test_parse_index_chain() {
        let expr = parse_default(r#"device.attributes["gpu.example.com"]["model"]"#);
        let ExprKind::Index { operand, index } = expr.kind else {
            panic!("Expected index expression");
        };
        assert_eq!(
            index.kind,
            ExprKind::Literal(Literal::String("model".into()))
        );
        assert!(matches!(operand.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn test_precedence() {
        let expr = parse_default("a || b && c == 1 + 2 * 3");
        let ExprKind::Binary { op, right, .. } = expr.kind else {
            panic!("Expected binary expression");
        };
        assert_eq!(op, BinaryOp::Or);
        let ExprKind::Binary { op, right, .. } = right.kind else {
            panic!("Expected binary expression");
        };
        assert_eq!(op, BinaryOp::And);
        let ExprKind::Binary { op, right, .. } = right.kind else {
            panic!("Expected binary expression");
        };
        assert_eq!(op, BinaryOp::Eq);
        let ExprKind::Binary { op, .. } = right.kind else {
            panic!("Expected binary expression");
        };
        assert_eq!(op, BinaryOp::Add);
    }

    #[test]
    fn test_negative_literal_folding() {
        let expr = parse_default("-9223372036854775808");
        assert_eq!(expr.kind, ExprKind::Literal(Literal::Int(i64::MIN)));
    }

    #[test]
    fn test_int_literal_out_of_range() {
        assert!(parse("9223372036854775808", ParserOptions::default()).is_err());
    }

    #[test]
    fn test_has_macro() {
        let expr = parse_default("has(device.driver)");
        assert!(matches!(
            expr.kind,
            ExprKind::Select {
                test_only: true,
                ..
            }
        ));
    }

    #[test]
    fn test_has_macro_requires_select() {
        let err = parse("has(device)", ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("invalid argument to has() macro"));
    }

    #[test]
    fn test_comprehension_macro() {
        let expr = parse_default("[1, 2].all(x, x > 0)");
        let ExprKind::Comprehension { kind, var, .. } = expr.kind else {
            panic!("Expected comprehension");
        };
        assert_eq!(kind, ComprehensionKind::All);
        assert_eq!(var, "x");
    }

    #[test]
    fn test_bind_macro_only_when_enabled() {
        let expr = parse_default("cel.bind(x, 1, x == 1)");
        assert!(matches!(expr.kind, ExprKind::Bind { .. }));

        let expr = parse("cel.bind(x, 1, x == 1)", ParserOptions::default()).unwrap();
        assert!(matches!(expr.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_conditional() {
        let expr = parse_default("a ? 1 : 2");
        assert!(matches!(expr.kind, ExprKind::Conditional { .. }));
    }

    #[test]
    fn test_map_and_list_literals() {
        let expr = parse_default("{'a': [1, 2,], 'b': []}");
        let ExprKind::Map(entries) = expr.kind else {
            panic!("Expected map literal");
        };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse("a b", ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unexpected token 'b'"));
    }

    #[test]
    fn test_long_operator_chains_hit_depth_limit() {
        let and_chain = vec!["a == 'x'"; 3000].join(" && ");
        let err = parse(&and_chain, ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("recursion limit"));

        let sum = vec!["1"; 3000].join(" + ");
        let err = parse(&sum, ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("recursion limit"));
    }

    #[test]
    fn test_long_member_chains_hit_depth_limit() {
        let index_chain = format!("a['d']{}", "['x']".repeat(3000));
        let err = parse(&index_chain, ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("recursion limit"));

        let select_chain = format!("a{}", ".b".repeat(3000));
        let err = parse(&select_chain, ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("recursion limit"));
    }

    #[test]
    fn test_nested_parentheses_hit_depth_limit() {
        let nested = format!("{}a{}", "(".repeat(500), ")".repeat(500));
        let err = parse(&nested, ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("recursion limit"));
    }

    #[test]
    fn test_chain_depth_is_released() {
        // siblings do not accumulate depth: each list item is its own chain
        let item = vec!["a"; 60].join(" && ");
        let list = format!("[{}]", vec![item.as_str(); 10].join(", "));
        assert!(parse(&list, ParserOptions::default()).is_ok());
    }

    #[test]
    fn test_source_size_limit() {
        let source = format!("'{}'", "x".repeat(MAX_SOURCE_CODE_POINTS));
        let err = parse(&source, ParserOptions::default()).unwrap_err();
        assert!(err
            .to_string()
            .contains("expression code point size exceeds limit"));
    }

    #[test]
    fn test_unique_ids() {
        let expr = parse_default("a == b");
        let ExprKind::Binary { left, right, .. } = &expr.kind else {
            panic!("Expected binary expression");
        };
        assert_ne!(left.id, right.id);
        assert_ne!(left.id, expr.id);
    }
}
