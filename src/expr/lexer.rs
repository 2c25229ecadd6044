// SPDX-License-Identifier: MIT

//! Tokenizer for selector expressions

use super::ast::Span;
use super::error::Issues;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Unsigned so that `-9223372036854775808` can be folded by the parser
    Int(u64),
    Double(f64),
    String(String),
    Ident(String),
    True,
    False,
    Null,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Question,
    Bang,
    Minus,
    Plus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Eof,
}

impl Token {
    /// Text used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            Token::Int(n) => n.to_string(),
            Token::Double(d) => d.to_string(),
            Token::String(s) => format!("'{}'", s),
            Token::Ident(s) => s.clone(),
            Token::True => "true".into(),
            Token::False => "false".into(),
            Token::Null => "null".into(),
            Token::In => "in".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),
            Token::LBrace => "{".into(),
            Token::RBrace => "}".into(),
            Token::Dot => ".".into(),
            Token::Comma => ",".into(),
            Token::Colon => ":".into(),
            Token::Question => "?".into(),
            Token::Bang => "!".into(),
            Token::Minus => "-".into(),
            Token::Plus => "+".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Percent => "%".into(),
            Token::Lt => "<".into(),
            Token::Le => "<=".into(),
            Token::Gt => ">".into(),
            Token::Ge => ">=".into(),
            Token::EqEq => "==".into(),
            Token::NotEq => "!=".into(),
            Token::AndAnd => "&&".into(),
            Token::OrOr => "||".into(),
            Token::Eof => "end of input".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

/// Split an expression into tokens, always terminated by [`Token::Eof`]
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, Issues> {
    let mut lexer = Lexer {
        source,
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let spanned = lexer.next_token()?;
        let done = spanned.token == Token::Eof;
        tokens.push(spanned);
        if done {
            return Ok(tokens);
        }
    }
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, span: Span, message: impl Into<String>) -> Issues {
        Issues::single(self.source, span, message)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Spanned, Issues> {
        self.skip_whitespace_and_comments();
        let span = Span::new(self.line, self.column);
        let Some(c) = self.peek() else {
            return Ok(Spanned {
                token: Token::Eof,
                span,
            });
        };

        let token = match c {
            '0'..='9' => self.number(span)?,
            '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number(span)?,
            '\'' | '"' => self.string(span)?,
            c if c.is_alphabetic() || c == '_' => self.ident(),
            _ => self.punct(span)?,
        };
        Ok(Spanned { token, span })
    }

    fn punct(&mut self, span: Span) -> Result<Token, Issues> {
        let c = self.bump().unwrap_or_default();
        let next = self.peek();
        let two = |lexer: &mut Self, token: Token| {
            lexer.bump();
            token
        };
        let token = match (c, next) {
            ('<', Some('=')) => two(self, Token::Le),
            ('>', Some('=')) => two(self, Token::Ge),
            ('=', Some('=')) => two(self, Token::EqEq),
            ('!', Some('=')) => two(self, Token::NotEq),
            ('&', Some('&')) => two(self, Token::AndAnd),
            ('|', Some('|')) => two(self, Token::OrOr),
            ('(', _) => Token::LParen,
            (')', _) => Token::RParen,
            ('[', _) => Token::LBracket,
            (']', _) => Token::RBracket,
            ('{', _) => Token::LBrace,
            ('}', _) => Token::RBrace,
            ('.', _) => Token::Dot,
            (',', _) => Token::Comma,
            (':', _) => Token::Colon,
            ('?', _) => Token::Question,
            ('!', _) => Token::Bang,
            ('-', _) => Token::Minus,
            ('+', _) => Token::Plus,
            ('*', _) => Token::Star,
            ('/', _) => Token::Slash,
            ('%', _) => Token::Percent,
            ('<', _) => Token::Lt,
            ('>', _) => Token::Gt,
            ('=', _) => return Err(self.error(span, "unexpected '=', did you mean '=='?")),
            (other, _) => {
                return Err(self.error(span, format!("token recognition error at: '{}'", other)))
            }
        };
        Ok(token)
    }

    fn ident(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match name.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "in" => Token::In,
            _ => Token::Ident(name),
        }
    }

    fn number(&mut self, span: Span) -> Result<Token, Issues> {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                digits.push(c);
                self.bump();
            }
            return u64::from_str_radix(&digits, 16)
                .map(Token::Int)
                .map_err(|_| self.error(span, format!("invalid hex literal '0x{}'", digits)));
        }

        let mut text = String::new();
        let mut is_double = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.'
                && !is_double
                && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
            {
                is_double = true;
                text.push(c);
                self.bump();
            } else if (c == 'e' || c == 'E')
                && (self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
                    || (matches!(self.peek_at(1), Some('+') | Some('-'))
                        && self.peek_at(2).is_some_and(|d| d.is_ascii_digit())))
            {
                is_double = true;
                text.push(c);
                self.bump();
                if let Some(sign) = self.peek().filter(|s| *s == '+' || *s == '-') {
                    text.push(sign);
                    self.bump();
                }
            } else {
                break;
            }
        }

        if is_double {
            text.parse::<f64>()
                .map(Token::Double)
                .map_err(|_| self.error(span, format!("invalid double literal '{}'", text)))
        } else {
            text.parse::<u64>()
                .map(Token::Int)
                .map_err(|_| self.error(span, format!("invalid int literal '{}'", text)))
        }
    }

    fn string(&mut self, span: Span) -> Result<Token, Issues> {
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error(span, "unterminated string literal")),
                Some(c) if c == quote => return Ok(Token::String(value)),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        other => {
                            return Err(self.error(
                                span,
                                format!("invalid escape sequence '\\{}'", other.unwrap_or(' ')),
                            ))
                        }
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
    }
}
