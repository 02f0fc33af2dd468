//! Recursive-descent parser turning tokens into an [`Expr`] tree.
//!
//! Precedence, loosest to tightest: `or` < `and` < `not` < comparisons < `+ -` <
//! `* / // % @` < unary `- not` < `**` < postfix (call / attr / index).

use super::ast::{BinOp, BoolOp, CmpOp, Expr, UnOp};
use super::lexer::{LexError, Lexer, Tok};

#[derive(Debug, Clone)]
pub struct ParseError(pub String);

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        Self(e.0)
    }
}

pub struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

/// Parses `src` as a full expression; fails if trailing tokens remain.
pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let toks = Lexer::new(src).tokenize()?;
    let mut p = Parser { toks, pos: 0 };
    let e = p.expr()?;
    if p.cur() != &Tok::Eof {
        return Err(ParseError(format!("unexpected trailing token {:?}", p.cur())));
    }
    Ok(e)
}

impl Parser {
    fn cur(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: &Tok) -> Result<(), ParseError> {
        if self.cur() == t {
            self.bump();
            Ok(())
        } else {
            Err(ParseError(format!("expected {t:?}, found {:?}", self.cur())))
        }
    }

    pub fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while *self.cur() == Tok::Or {
            self.bump();
            let rhs = self.and_expr()?;
            lhs = Expr::BoolOp(BoolOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.not_expr()?;
        while *self.cur() == Tok::And {
            self.bump();
            let rhs = self.not_expr()?;
            lhs = Expr::BoolOp(BoolOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if *self.cur() == Tok::Not {
            self.bump();
            let inner = self.not_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.compare_expr()
    }

    fn compare_expr(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.additive_expr()?;
        let op = match self.cur() {
            Tok::Eq => CmpOp::Eq,
            Tok::Ne => CmpOp::Ne,
            Tok::Lt => CmpOp::Lt,
            Tok::Le => CmpOp::Le,
            Tok::Gt => CmpOp::Gt,
            Tok::Ge => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.additive_expr()?;
        Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)))
    }

    fn additive_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.multiplicative_expr()?;
        loop {
            let op = match self.cur() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.multiplicative_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.cur() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::SlashSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                Tok::At => BinOp::MatMul,
                _ => break,
            };
            self.bump();
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        if *self.cur() == Tok::Minus {
            self.bump();
            let inner = self.unary_expr()?;
            return Ok(Expr::Unary(UnOp::Neg, Box::new(inner)));
        }
        if *self.cur() == Tok::Plus {
            self.bump();
            return self.unary_expr();
        }
        self.power_expr()
    }

    fn power_expr(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.postfix_expr()?;
        if *self.cur() == Tok::StarStar {
            self.bump();
            // right-associative
            let rhs = self.unary_expr()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut base = self.primary_expr()?;
        loop {
            match self.cur() {
                Tok::Dot => {
                    self.bump();
                    let name = self.ident_name()?;
                    if *self.cur() == Tok::LParen {
                        let args = self.call_args()?;
                        if let Expr::Ident(module) = &base {
                            base = Expr::Call(
                                Box::new(Expr::Dotted(module.clone(), name)),
                                args,
                            );
                        } else {
                            base = Expr::MethodCall(Box::new(base), name, args);
                        }
                    } else {
                        base = Expr::Attr(Box::new(base), name);
                    }
                }
                Tok::LParen => {
                    let args = self.call_args()?;
                    base = Expr::Call(Box::new(base), args);
                }
                Tok::LBracket => {
                    self.bump();
                    base = self.index_or_slice(base)?;
                    self.eat(&Tok::RBracket)?;
                }
                _ => break,
            }
        }
        Ok(base)
    }

    fn index_or_slice(&mut self, base: Expr) -> Result<Expr, ParseError> {
        let start = if *self.cur() == Tok::Colon { None } else { Some(Box::new(self.expr()?)) };
        if *self.cur() != Tok::Colon {
            // plain index, no slice
            return Ok(Expr::Index(Box::new(base), start.expect("checked above")));
        }
        self.bump(); // ':'
        let stop = if matches!(self.cur(), Tok::RBracket | Tok::Colon) {
            None
        } else {
            Some(Box::new(self.expr()?))
        };
        let step = if *self.cur() == Tok::Colon {
            self.bump();
            if *self.cur() == Tok::RBracket { None } else { Some(Box::new(self.expr()?)) }
        } else {
            None
        };
        Ok(Expr::Slice(Box::new(base), start, stop, step))
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.eat(&Tok::LParen)?;
        let mut args = Vec::new();
        if *self.cur() != Tok::RParen {
            args.push(self.expr()?);
            while *self.cur() == Tok::Comma {
                self.bump();
                if *self.cur() == Tok::RParen {
                    break;
                }
                args.push(self.expr()?);
            }
        }
        self.eat(&Tok::RParen)?;
        Ok(args)
    }

    fn ident_name(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Tok::Ident(s) => Ok(s),
            other => Err(ParseError(format!("expected identifier, found {other:?}"))),
        }
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.bump() {
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::True => Ok(Expr::Bool(true)),
            Tok::False => Ok(Expr::Bool(false)),
            Tok::Ident(name) => Ok(Expr::Ident(name)),
            Tok::LParen => {
                let mut items = vec![self.expr()?];
                let mut is_tuple = false;
                while *self.cur() == Tok::Comma {
                    is_tuple = true;
                    self.bump();
                    if *self.cur() == Tok::RParen {
                        break;
                    }
                    items.push(self.expr()?);
                }
                self.eat(&Tok::RParen)?;
                if is_tuple {
                    Ok(Expr::Tuple(items))
                } else {
                    Ok(items.into_iter().next().expect("at least one item"))
                }
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                if *self.cur() != Tok::RBracket {
                    items.push(self.expr()?);
                    while *self.cur() == Tok::Comma {
                        self.bump();
                        if *self.cur() == Tok::RBracket {
                            break;
                        }
                        items.push(self.expr()?);
                    }
                }
                self.eat(&Tok::RBracket)?;
                Ok(Expr::List(items))
            }
            other => Err(ParseError(format!("unexpected token {other:?}"))),
        }
    }
}
