//! Recursive-descent parser
//!
//! Precedence, lowest first: assignment, `||`, `&&`, equality, comparison,
//! additive, multiplicative, unary (`!`, `-`), method call, primary.
//!
//! Like Ruby, a bare identifier is a local variable only if an assignment to
//! it was seen earlier in the same scope; otherwise it is a method call.

use super::ast::{Begin, Call, Expr, MethodDef, RescueClause};
use super::lexer::{line_of, tokenize, Spanned, Token};
use super::ParseError;
use rustc_hash::FxHashSet;
use std::rc::Rc;

type PResult<T> = Result<T, ParseError>;

/// Parse a whole program
pub fn parse(src: &str) -> Result<Vec<Expr>, ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
        scopes: vec![FxHashSet::default()],
    };

    let body = parser.statements(&[])?;
    if parser.peek().is_some() {
        return Err(parser.unexpected());
    }
    Ok(body)
}

struct Parser<'src> {
    src: &'src str,
    tokens: Vec<Spanned>,
    pos: usize,
    scopes: Vec<FxHashSet<String>>,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Newline => "newline".to_string(),
        Token::Semicolon => "';'".to_string(),
        Token::Ident(name) | Token::Constant(name) | Token::Ivar(name) => format!("'{}'", name),
        Token::Int(n) => format!("integer literal {}", n),
        Token::Str(_) => "string literal".to_string(),
        Token::Def => "'def'".to_string(),
        Token::Class => "'class'".to_string(),
        Token::End => "'end'".to_string(),
        Token::If => "'if'".to_string(),
        Token::Elsif => "'elsif'".to_string(),
        Token::Else => "'else'".to_string(),
        Token::Then => "'then'".to_string(),
        Token::Begin => "'begin'".to_string(),
        Token::Rescue => "'rescue'".to_string(),
        Token::Ensure => "'ensure'".to_string(),
        other => format!("{:?}", other),
    }
}

fn operator_name(token: &Token) -> Option<&'static str> {
    Some(match token {
        Token::EqualEqual => "==",
        Token::BangEqual => "!=",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Less => "<",
        Token::Greater => ">",
        Token::LessEqual => "<=",
        Token::GreaterEqual => ">=",
        _ => return None,
    })
}

fn binop(lhs: Expr, name: &str, rhs: Expr) -> Expr {
    Expr::Call(Call {
        recv: Some(Box::new(lhs)),
        name: name.to_string(),
        args: vec![rhs],
        vcall: false,
    })
}

impl<'src> Parser<'src> {
    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> PResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn line(&self) -> usize {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|s| s.span.start)
            .unwrap_or(self.src.len());
        line_of(self.src, offset)
    }

    fn unexpected(&self) -> ParseError {
        let message = match self.peek() {
            Some(token) => format!("syntax error, unexpected {}", describe(token)),
            None => "syntax error, unexpected end-of-input".to_string(),
        };
        ParseError::new(self.line(), message)
    }

    fn skip_terms(&mut self) {
        while matches!(self.peek(), Some(Token::Newline | Token::Semicolon)) {
            self.pos += 1;
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&Token::Newline) {
            self.pos += 1;
        }
    }

    // ------------------------------------------------------------------
    // Local variable scopes
    // ------------------------------------------------------------------

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|s| s.contains(name))
    }

    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.scopes.push(FxHashSet::default());
        let result = f(self);
        self.scopes.pop();
        result
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parse statements until EOF or one of `terminators` (left unconsumed)
    fn statements(&mut self, terminators: &[Token]) -> PResult<Vec<Expr>> {
        let mut body = Vec::new();
        loop {
            self.skip_terms();
            match self.peek() {
                None => break,
                Some(t) if terminators.contains(t) => break,
                _ => {}
            }

            body.push(self.expr()?);

            match self.peek() {
                None | Some(Token::Newline | Token::Semicolon) => {}
                Some(t) if terminators.contains(t) => {}
                _ => return Err(self.unexpected()),
            }
        }
        Ok(body)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self) -> PResult<Expr> {
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::Ident(name)), Some(Token::Equal)) => {
                let name = name.clone();
                self.pos += 2;
                self.skip_newlines();
                self.declare(&name);
                let value = self.expr()?;
                Ok(Expr::AssignLocal(name, Box::new(value)))
            }
            (Some(Token::Ivar(name)), Some(Token::Equal)) => {
                let name = name.clone();
                self.pos += 2;
                self.skip_newlines();
                let value = self.expr()?;
                Ok(Expr::AssignIvar(name, Box::new(value)))
            }
            _ => self.or_expr(),
        }
    }

    fn or_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::PipePipe) {
            self.skip_newlines();
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.equality()?;
        while self.eat(&Token::AmpAmp) {
            self.skip_newlines();
            let rhs = self.equality()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqualEqual) => "==",
                Some(Token::BangEqual) => "!=",
                _ => break,
            };
            self.pos += 1;
            self.skip_newlines();
            let rhs = self.comparison()?;
            lhs = binop(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => "<",
                Some(Token::Greater) => ">",
                Some(Token::LessEqual) => "<=",
                Some(Token::GreaterEqual) => ">=",
                _ => break,
            };
            self.pos += 1;
            self.skip_newlines();
            let rhs = self.additive()?;
            lhs = binop(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => "+",
                Some(Token::Minus) => "-",
                _ => break,
            };
            self.pos += 1;
            self.skip_newlines();
            let rhs = self.multiplicative()?;
            lhs = binop(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::Star) {
            self.skip_newlines();
            let rhs = self.unary()?;
            lhs = binop(lhs, "*", rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.eat(&Token::Bang) {
            let operand = self.unary()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        if self.eat(&Token::Minus) {
            if let Some(Token::Int(n)) = self.peek() {
                let n = *n;
                self.pos += 1;
                return Ok(Expr::Int(n.wrapping_neg()));
            }
            let operand = self.unary()?;
            return Ok(Expr::Call(Call {
                recv: Some(Box::new(operand)),
                name: "-@".to_string(),
                args: Vec::new(),
                vcall: false,
            }));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        while self.eat(&Token::Dot) {
            self.skip_newlines();
            let name = match self.advance() {
                Some(Token::Ident(name)) | Some(Token::Constant(name)) => name,
                Some(Token::Class) => "class".to_string(),
                Some(token) => match operator_name(&token) {
                    Some(op) => op.to_string(),
                    None => {
                        self.pos -= 1;
                        return Err(self.unexpected());
                    }
                },
                None => return Err(self.unexpected()),
            };
            let args = self.call_args()?.unwrap_or_default();
            expr = Expr::Call(Call {
                recv: Some(Box::new(expr)),
                name,
                args,
                vcall: false,
            });
        }
        Ok(expr)
    }

    fn starts_command_arg(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Int(_)
                    | Token::Str(_)
                    | Token::Constant(_)
                    | Token::Ident(_)
                    | Token::Ivar(_)
                    | Token::Nil
                    | Token::True
                    | Token::False
                    | Token::SelfKw
            )
        )
    }

    /// Parenthesized or command-style arguments, if any follow
    fn call_args(&mut self) -> PResult<Option<Vec<Expr>>> {
        if self.eat(&Token::LeftParen) {
            let mut args = Vec::new();
            self.skip_newlines();
            if self.eat(&Token::RightParen) {
                return Ok(Some(args));
            }
            loop {
                self.skip_newlines();
                args.push(self.expr()?);
                self.skip_newlines();
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RightParen)?;
                break;
            }
            return Ok(Some(args));
        }

        if self.starts_command_arg() {
            let mut args = vec![self.expr()?];
            while self.eat(&Token::Comma) {
                self.skip_newlines();
                args.push(self.expr()?);
            }
            return Ok(Some(args));
        }

        Ok(None)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = match self.advance() {
            Some(token) => token,
            None => return Err(self.unexpected()),
        };

        match token {
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Str(s) => Ok(Expr::Str(Rc::from(s))),
            Token::Nil => Ok(Expr::Nil),
            Token::True => Ok(Expr::True),
            Token::False => Ok(Expr::False),
            Token::SelfKw => Ok(Expr::SelfRef),
            Token::Ivar(name) => Ok(Expr::Ivar(name)),
            Token::Constant(name) => Ok(Expr::Const(name)),
            Token::Ident(name) => {
                if self.is_local(&name) && !self.check(&Token::LeftParen) {
                    return Ok(Expr::Local(name));
                }
                Ok(match self.call_args()? {
                    Some(args) => Expr::Call(Call {
                        recv: None,
                        name,
                        args,
                        vcall: false,
                    }),
                    None => Expr::Call(Call {
                        recv: None,
                        name,
                        args: Vec::new(),
                        vcall: true,
                    }),
                })
            }
            Token::LeftParen => {
                self.skip_newlines();
                let inner = self.expr()?;
                self.skip_newlines();
                self.expect(&Token::RightParen)?;
                Ok(inner)
            }
            Token::If => self.if_rest(),
            Token::Def => self.def_rest(),
            Token::Class => self.class_rest(),
            Token::Begin => self.begin_rest(),
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    /// After `if` / `elsif`; consumes the closing `end`
    fn if_rest(&mut self) -> PResult<Expr> {
        let cond = self.expr()?;
        self.eat(&Token::Then);
        let then_body = self.statements(&[Token::Elsif, Token::Else, Token::End])?;

        let else_body = match self.advance() {
            Some(Token::Elsif) => vec![self.if_rest()?],
            Some(Token::Else) => {
                let body = self.statements(&[Token::End])?;
                self.expect(&Token::End)?;
                body
            }
            Some(Token::End) => Vec::new(),
            Some(_) => {
                self.pos -= 1;
                return Err(self.unexpected());
            }
            None => return Err(self.unexpected()),
        };

        Ok(Expr::If {
            cond: Box::new(cond),
            then_body,
            else_body,
        })
    }

    fn def_rest(&mut self) -> PResult<Expr> {
        let name = match self.advance() {
            Some(Token::Ident(name)) | Some(Token::Constant(name)) => name,
            Some(token) => match operator_name(&token) {
                Some(op) => op.to_string(),
                None => {
                    self.pos -= 1;
                    return Err(self.unexpected());
                }
            },
            None => return Err(self.unexpected()),
        };

        let def = self.scoped(|p| {
            let mut params = Vec::new();
            if p.eat(&Token::LeftParen) {
                while let Some(Token::Ident(param)) = p.peek() {
                    params.push(param.clone());
                    p.pos += 1;
                    if !p.eat(&Token::Comma) {
                        break;
                    }
                }
                p.expect(&Token::RightParen)?;
            } else {
                while let Some(Token::Ident(param)) = p.peek() {
                    params.push(param.clone());
                    p.pos += 1;
                    if !p.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            for param in &params {
                p.declare(param);
            }

            let body = p.statements(&[Token::End])?;
            p.expect(&Token::End)?;
            Ok(MethodDef { name, params, body })
        })?;

        Ok(Expr::Def(Rc::new(def)))
    }

    fn class_rest(&mut self) -> PResult<Expr> {
        let name = match self.advance() {
            Some(Token::Constant(name)) => name,
            Some(_) => {
                self.pos -= 1;
                return Err(ParseError::new(self.line(), "class/module name must be CONSTANT"));
            }
            None => return Err(self.unexpected()),
        };

        let superclass = if self.eat(&Token::Less) {
            Some(Box::new(self.expr()?))
        } else {
            None
        };

        let body = self.scoped(|p| {
            let body = p.statements(&[Token::End])?;
            p.expect(&Token::End)?;
            Ok(body)
        })?;

        Ok(Expr::Class {
            name,
            superclass,
            body,
        })
    }

    fn begin_rest(&mut self) -> PResult<Expr> {
        const CLAUSE_END: [Token; 4] = [Token::Rescue, Token::Else, Token::Ensure, Token::End];

        let body = self.statements(&CLAUSE_END)?;

        let mut rescues = Vec::new();
        while self.eat(&Token::Rescue) {
            let mut classes = Vec::new();
            while !matches!(
                self.peek(),
                None | Some(Token::Arrow | Token::Newline | Token::Semicolon | Token::Then)
            ) {
                classes.push(self.or_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
                self.skip_newlines();
            }

            let var = if self.eat(&Token::Arrow) {
                match self.advance() {
                    Some(Token::Ident(name)) => {
                        self.declare(&name);
                        Some(name)
                    }
                    Some(_) => {
                        self.pos -= 1;
                        return Err(self.unexpected());
                    }
                    None => return Err(self.unexpected()),
                }
            } else {
                None
            };
            self.eat(&Token::Then);

            let body = self.statements(&CLAUSE_END)?;
            rescues.push(RescueClause { classes, var, body });
        }

        let else_body = if self.eat(&Token::Else) {
            Some(self.statements(&[Token::Ensure, Token::End])?)
        } else {
            None
        };

        let ensure = if self.eat(&Token::Ensure) {
            Some(self.statements(&[Token::End])?)
        } else {
            None
        };

        self.expect(&Token::End)?;

        Ok(Expr::Begin(Box::new(Begin {
            body,
            rescues,
            else_body,
            ensure,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(recv: Option<Expr>, name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call(Call {
            recv: recv.map(Box::new),
            name: name.to_string(),
            args,
            vcall: false,
        })
    }

    #[test]
    fn test_locals_versus_calls() {
        let program = parse("x = 1\nx\ny").unwrap();
        assert_eq!(program[0], Expr::AssignLocal("x".into(), Box::new(Expr::Int(1))));
        assert_eq!(program[1], Expr::Local("x".into()));
        assert_eq!(
            program[2],
            Expr::Call(Call {
                recv: None,
                name: "y".into(),
                args: vec![],
                vcall: true,
            })
        );
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3 == 7").unwrap();
        let product = call(Some(Expr::Int(2)), "*", vec![Expr::Int(3)]);
        let sum = call(Some(Expr::Int(1)), "+", vec![product]);
        assert_eq!(program[0], call(Some(sum), "==", vec![Expr::Int(7)]));
    }

    #[test]
    fn test_command_call() {
        let program = parse("raise ArgumentError, 'bad'").unwrap();
        assert_eq!(
            program[0],
            call(
                None,
                "raise",
                vec![Expr::Const("ArgumentError".into()), Expr::Str(Rc::from("bad"))]
            )
        );
    }

    #[test]
    fn test_method_chain() {
        let program = parse("e.class.name").unwrap();
        match &program[0] {
            Expr::Call(c) => assert_eq!(c.name, "name"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_class_and_def() {
        let src = "class Foo < Object\n  def bar(a, b)\n    a + b\n  end\nend";
        let program = parse(src).unwrap();
        match &program[0] {
            Expr::Class { name, superclass, body } => {
                assert_eq!(name, "Foo");
                assert_eq!(superclass.as_deref(), Some(&Expr::Const("Object".into())));
                match &body[0] {
                    Expr::Def(def) => {
                        assert_eq!(def.name, "bar");
                        assert_eq!(def.params, vec!["a".to_string(), "b".to_string()]);
                        assert_eq!(def.body[0], call(Some(Expr::Local("a".into())), "+", vec![Expr::Local("b".into())]));
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_begin_rescue_ensure() {
        let src = "begin\n  raise 'x'\nrescue TypeError, ArgumentError => e\n  1\nrescue => e\n  2\nelse\n  3\nensure\n  4\nend";
        let program = parse(src).unwrap();
        match &program[0] {
            Expr::Begin(b) => {
                assert_eq!(b.rescues.len(), 2);
                assert_eq!(b.rescues[0].classes.len(), 2);
                assert_eq!(b.rescues[0].var.as_deref(), Some("e"));
                assert!(b.rescues[1].classes.is_empty());
                assert_eq!(b.else_body, Some(vec![Expr::Int(3)]));
                assert_eq!(b.ensure, Some(vec![Expr::Int(4)]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_if_elsif_else() {
        let program = parse("if a\n 1\nelsif b\n 2\nelse\n 3\nend").unwrap();
        match &program[0] {
            Expr::If { else_body, .. } => match &else_body[0] {
                Expr::If { else_body, .. } => assert_eq!(else_body, &vec![Expr::Int(3)]),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_def_scope_is_isolated() {
        let program = parse("x = 1\ndef foo\n  x\nend").unwrap();
        match &program[1] {
            Expr::Def(def) => assert!(matches!(&def.body[0], Expr::Call(c) if c.vcall)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse("def foo\n  1 +\n").unwrap_err();
        assert!(err.message.contains("unexpected end-of-input"), "{}", err);

        let err = parse("x = (1\ny").unwrap_err();
        assert_eq!(err.line, 2);

        let err = parse("1 2").unwrap_err();
        assert!(err.message.contains("integer literal 2"), "{}", err);
    }
}
