use super::error::{RenderError, Result};
use super::lexer::{tokenize, Token};
use serde_json::Value;

/// Deepest nesting of parentheses, sequences, filter arguments and unary
/// operators accepted in one expression.
pub const MAX_NESTING: usize = 64;

/// Longest expression accepted, in tokens. Bounds operator chains, which
/// nest without parentheses.
pub const MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    List(Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Filter {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

/// Parse the inside of a `{{ ... }}` block.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let reason = if tokens.is_empty() {
        Some("empty expression".to_string())
    } else if tokens.len() > MAX_TOKENS {
        Some(format!("expression longer than {MAX_TOKENS} tokens"))
    } else {
        None
    };
    if let Some(reason) = reason {
        return Err(RenderError::Syntax {
            expr: source.to_string(),
            reason,
        });
    }

    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected token {token:?}")));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}")))
        }
    }

    fn error(&self, reason: String) -> RenderError {
        RenderError::Syntax {
            expr: self.source.to_string(),
            reason,
        }
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.not()?;
        while self.eat(&Token::And) {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.nested(Self::not)?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.additive()?;

        let op = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Eq), _) => BinaryOp::Eq,
            (Some(Token::Ne), _) => BinaryOp::Ne,
            (Some(Token::Lt), _) => BinaryOp::Lt,
            (Some(Token::Le), _) => BinaryOp::Le,
            (Some(Token::Gt), _) => BinaryOp::Gt,
            (Some(Token::Ge), _) => BinaryOp::Ge,
            (Some(Token::In), _) => BinaryOp::In,
            (Some(Token::Not), Some(Token::In)) => {
                self.pos += 1;
                BinaryOp::NotIn
            }
            _ => return Ok(left),
        };
        self.pos += 1;

        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.nested(Self::unary)?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                expr = match self.advance() {
                    Some(Token::Ident(name)) => Expr::Attr(Box::new(expr), name),
                    Some(Token::Int(i)) => {
                        Expr::Index(Box::new(expr), Box::new(Expr::Literal(Value::from(i))))
                    }
                    other => return Err(self.error(format!("expected attribute, found {other:?}"))),
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.nested(|p| {
                    let index = p.or()?;
                    p.expect(&Token::RBracket)?;
                    Ok(index)
                })?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat(&Token::Pipe) {
                let name = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    other => return Err(self.error(format!("expected filter name, found {other:?}"))),
                };
                let args = if self.eat(&Token::LParen) {
                    self.nested(|p| p.arguments(&Token::RParen))?
                } else {
                    Vec::new()
                };
                expr = Expr::Filter {
                    input: Box::new(expr),
                    name,
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::from(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::from(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::LParen) => self.nested(|p| {
                let inner = p.or()?;
                p.expect(&Token::RParen)?;
                Ok(inner)
            }),
            Some(Token::LBracket) => Ok(Expr::List(
                self.nested(|p| p.arguments(&Token::RBracket))?,
            )),
            Some(other) => Err(self.error(format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of expression".to_string())),
        }
    }

    /// Comma separated expressions up to `close`, which is consumed.
    fn arguments(&mut self, close: &Token) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.or()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma)?;
        }
    }
}
