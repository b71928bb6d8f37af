//! Restricted tree-walking interpreter for submitted solutions.
//!
//! Runs the JS-like subset that arena questions use: a single top-level
//! `function`, variable declarations, assignment, `if`/`else`, `while`,
//! `for`, `return`, numbers/strings/booleans/null/arrays, indexing,
//! `.length`, the usual arithmetic/comparison/logical operators, the
//! ternary operator, and recursion into the declared function.
//!
//! There is no host access of any kind, and every execution is bounded by
//! a step budget, so a submission can neither reach the filesystem or
//! network nor hang the evaluator.

use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;

/// Upper bound on interpreter steps per function call (including recursion).
pub const STEP_BUDGET: u64 = 250_000;

const MAX_CALL_DEPTH: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct InterpError(pub String);

impl fmt::Display for InterpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for InterpError {}

fn err<T>(msg: impl Into<String>) -> Result<T, InterpError> {
    Err(InterpError(msg.into()))
}

// ---------------------------------------------------------------------------
// Lexer

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Function,
    Let,
    Const,
    Var,
    If,
    Else,
    While,
    For,
    Return,
    True,
    False,
    Null,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Dot,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PlusPlus,
    MinusMinus,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
}

fn lex(src: &str) -> Result<Vec<Token>, InterpError> {
    let chars: Vec<char> = src.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                match text.parse::<f64>() {
                    Ok(n) => toks.push(Token::Num(n)),
                    Err(_) => return err(format!("invalid number literal: {text}")),
                }
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        None => return err("unterminated string literal"),
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            i += 1;
                            match chars.get(i) {
                                Some('n') => s.push('\n'),
                                Some('t') => s.push('\t'),
                                Some(&ch) => s.push(ch),
                                None => return err("unterminated string literal"),
                            }
                            i += 1;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                toks.push(Token::Str(s));
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                toks.push(match word.as_str() {
                    "function" => Token::Function,
                    "let" => Token::Let,
                    "const" => Token::Const,
                    "var" => Token::Var,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "while" => Token::While,
                    "for" => Token::For,
                    "return" => Token::Return,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            _ => {
                let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
                let three: String = chars[i..chars.len().min(i + 3)].iter().collect();
                // Strict equality in this subset is the same as loose equality
                if three == "===" {
                    toks.push(Token::EqEq);
                    i += 3;
                    continue;
                }
                if three == "!==" {
                    toks.push(Token::NotEq);
                    i += 3;
                    continue;
                }
                let (tok, len) = match two.as_str() {
                    "==" => (Token::EqEq, 2),
                    "!=" => (Token::NotEq, 2),
                    "<=" => (Token::Le, 2),
                    ">=" => (Token::Ge, 2),
                    "&&" => (Token::AndAnd, 2),
                    "||" => (Token::OrOr, 2),
                    "+=" => (Token::PlusEq, 2),
                    "-=" => (Token::MinusEq, 2),
                    "*=" => (Token::StarEq, 2),
                    "/=" => (Token::SlashEq, 2),
                    "++" => (Token::PlusPlus, 2),
                    "--" => (Token::MinusMinus, 2),
                    _ => match c {
                        '(' => (Token::LParen, 1),
                        ')' => (Token::RParen, 1),
                        '{' => (Token::LBrace, 1),
                        '}' => (Token::RBrace, 1),
                        '[' => (Token::LBracket, 1),
                        ']' => (Token::RBracket, 1),
                        ',' => (Token::Comma, 1),
                        ';' => (Token::Semi, 1),
                        '.' => (Token::Dot, 1),
                        '?' => (Token::Question, 1),
                        ':' => (Token::Colon, 1),
                        '+' => (Token::Plus, 1),
                        '-' => (Token::Minus, 1),
                        '*' => (Token::Star, 1),
                        '/' => (Token::Slash, 1),
                        '%' => (Token::Percent, 1),
                        '=' => (Token::Assign, 1),
                        '<' => (Token::Lt, 1),
                        '>' => (Token::Gt, 1),
                        '!' => (Token::Not, 1),
                        _ => return err(format!("unexpected character: {c}")),
                    },
                };
                toks.push(tok);
                i += len;
            }
        }
    }

    Ok(toks)
}

// ---------------------------------------------------------------------------
// AST

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
enum Expr {
    Lit(Value),
    Array(Vec<Expr>),
    Ident(String),
    Index(Box<Expr>, Box<Expr>),
    Length(Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
enum Target {
    Var(String),
    Index(String, Expr),
}

#[derive(Debug, Clone)]
enum Stmt {
    Decl(String, Expr),
    Assign(Target, Option<BinOp>, Expr),
    Incr(Target, f64),
    If(Expr, Vec<Stmt>, Vec<Stmt>),
    While(Expr, Vec<Stmt>),
    For(Box<Stmt>, Expr, Box<Stmt>, Vec<Stmt>),
    Return(Option<Expr>),
    Expr(Expr),
}

/// A parsed top-level function ready for invocation.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    params: Vec<String>,
    body: Vec<Stmt>,
}

// ---------------------------------------------------------------------------
// Parser

struct Parser {
    toks: Vec<Token>,
    pos: usize,
}

/// Parse the single top-level function declaration in `src`.
pub fn parse_function(src: &str) -> Result<Function, InterpError> {
    let toks = lex(src)?;
    let mut p = Parser { toks, pos: 0 };
    let func = p.function()?;
    // Tolerate trailing semicolons, nothing else
    while p.peek() == Some(&Token::Semi) {
        p.pos += 1;
    }
    if p.pos != p.toks.len() {
        return err("unexpected tokens after function body");
    }
    Ok(func)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, InterpError> {
        let tok = self
            .toks
            .get(self.pos)
            .cloned()
            .ok_or_else(|| InterpError("unexpected end of input".to_string()))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, want: Token) -> Result<(), InterpError> {
        let got = self.next()?;
        if got == want {
            Ok(())
        } else {
            err(format!("expected {want:?}, found {got:?}"))
        }
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<String, InterpError> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => err(format!("expected identifier, found {other:?}")),
        }
    }

    fn function(&mut self) -> Result<Function, InterpError> {
        self.expect(Token::Function)?;
        let name = self.ident()?;
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                params.push(self.ident()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }
        let body = self.block()?;
        Ok(Function { name, params, body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, InterpError> {
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&Token::RBrace) {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt, InterpError> {
        match self.peek() {
            Some(Token::Let) | Some(Token::Const) | Some(Token::Var) => {
                let stmt = self.declaration()?;
                self.eat(&Token::Semi);
                Ok(stmt)
            }
            Some(Token::If) => self.if_statement(),
            Some(Token::While) => {
                self.pos += 1;
                self.expect(Token::LParen)?;
                let cond = self.expression()?;
                self.expect(Token::RParen)?;
                let body = self.block()?;
                Ok(Stmt::While(cond, body))
            }
            Some(Token::For) => {
                self.pos += 1;
                self.expect(Token::LParen)?;
                let init = self.simple_statement()?;
                self.expect(Token::Semi)?;
                let cond = self.expression()?;
                self.expect(Token::Semi)?;
                let step = self.simple_statement()?;
                self.expect(Token::RParen)?;
                let body = self.block()?;
                Ok(Stmt::For(Box::new(init), cond, Box::new(step), body))
            }
            Some(Token::Return) => {
                self.pos += 1;
                let value = if self.peek() == Some(&Token::Semi) || self.peek() == Some(&Token::RBrace)
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.eat(&Token::Semi);
                Ok(Stmt::Return(value))
            }
            _ => {
                let stmt = self.simple_statement()?;
                self.eat(&Token::Semi);
                Ok(stmt)
            }
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, InterpError> {
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let cond = self.expression()?;
        self.expect(Token::RParen)?;
        let then_branch = self.block()?;
        let else_branch = if self.eat(&Token::Else) {
            if self.peek() == Some(&Token::If) {
                vec![self.if_statement()?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If(cond, then_branch, else_branch))
    }

    fn declaration(&mut self) -> Result<Stmt, InterpError> {
        self.pos += 1; // let / const / var
        let name = self.ident()?;
        self.expect(Token::Assign)?;
        let value = self.expression()?;
        Ok(Stmt::Decl(name, value))
    }

    /// A declaration, assignment, increment, or bare expression — the forms
    /// allowed inside `for(..)` clauses as well as standalone.
    fn simple_statement(&mut self) -> Result<Stmt, InterpError> {
        if matches!(
            self.peek(),
            Some(Token::Let) | Some(Token::Const) | Some(Token::Var)
        ) {
            return self.declaration();
        }

        let expr = self.expression()?;
        let op = match self.peek() {
            Some(Token::Assign) => Some(None),
            Some(Token::PlusEq) => Some(Some(BinOp::Add)),
            Some(Token::MinusEq) => Some(Some(BinOp::Sub)),
            Some(Token::StarEq) => Some(Some(BinOp::Mul)),
            Some(Token::SlashEq) => Some(Some(BinOp::Div)),
            Some(Token::PlusPlus) => {
                self.pos += 1;
                return Ok(Stmt::Incr(Self::as_target(expr)?, 1.0));
            }
            Some(Token::MinusMinus) => {
                self.pos += 1;
                return Ok(Stmt::Incr(Self::as_target(expr)?, -1.0));
            }
            _ => None,
        };

        match op {
            Some(compound) => {
                self.pos += 1;
                let value = self.expression()?;
                Ok(Stmt::Assign(Self::as_target(expr)?, compound, value))
            }
            None => Ok(Stmt::Expr(expr)),
        }
    }

    fn as_target(expr: Expr) -> Result<Target, InterpError> {
        match expr {
            Expr::Ident(name) => Ok(Target::Var(name)),
            Expr::Index(base, idx) => match *base {
                Expr::Ident(name) => Ok(Target::Index(name, *idx)),
                _ => err("invalid assignment target"),
            },
            _ => err("invalid assignment target"),
        }
    }

    fn expression(&mut self) -> Result<Expr, InterpError> {
        let cond = self.or_expr()?;
        if self.eat(&Token::Question) {
            let then = self.expression()?;
            self.expect(Token::Colon)?;
            let otherwise = self.expression()?;
            return Ok(Expr::Ternary(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    fn or_expr(&mut self) -> Result<Expr, InterpError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::OrOr) {
            let right = self.and_expr()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, InterpError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, InterpError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let right = self.comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, InterpError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Ge) => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, InterpError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, InterpError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, InterpError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.unary()?)))
            }
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Not, Box::new(self.unary()?)))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, InterpError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let idx = self.expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(idx));
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let prop = self.ident()?;
                    if prop != "length" {
                        return err(format!("unsupported property: {prop}"));
                    }
                    expr = Expr::Length(Box::new(expr));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, InterpError> {
        match self.next()? {
            Token::Num(n) => Ok(Expr::Lit(number_value(n)?)),
            Token::Str(s) => Ok(Expr::Lit(Value::String(s))),
            Token::True => Ok(Expr::Lit(Value::Bool(true))),
            Token::False => Ok(Expr::Lit(Value::Bool(false))),
            Token::Null => Ok(Expr::Lit(Value::Null)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            self.expect(Token::Comma)?;
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => err(format!("unexpected token: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation

enum Flow {
    Normal,
    Return(Value),
}

type Scope = Vec<HashMap<String, Value>>;

/// One bounded execution of a parsed function. The step counter is shared
/// across recursive calls, so a single budget covers the whole invocation.
pub struct Interp<'a> {
    func: &'a Function,
    steps: u64,
    budget: u64,
}

impl<'a> Interp<'a> {
    pub fn new(func: &'a Function) -> Self {
        Self::with_budget(func, STEP_BUDGET)
    }

    pub fn with_budget(func: &'a Function, budget: u64) -> Self {
        Self {
            func,
            steps: 0,
            budget,
        }
    }

    pub fn call(&mut self, args: &[Value]) -> Result<Value, InterpError> {
        self.call_at_depth(args, 0)
    }

    fn call_at_depth(&mut self, args: &[Value], depth: usize) -> Result<Value, InterpError> {
        if depth > MAX_CALL_DEPTH {
            return err("maximum recursion depth exceeded");
        }

        let mut locals = HashMap::new();
        for (i, param) in self.func.params.iter().enumerate() {
            locals.insert(param.clone(), args.get(i).cloned().unwrap_or(Value::Null));
        }
        let mut scope: Scope = vec![locals];

        match self.exec_block(&self.func.body.clone(), &mut scope, depth)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }

    fn tick(&mut self) -> Result<(), InterpError> {
        self.steps += 1;
        if self.steps > self.budget {
            err("step budget exceeded")
        } else {
            Ok(())
        }
    }

    fn exec_block(
        &mut self,
        stmts: &[Stmt],
        scope: &mut Scope,
        depth: usize,
    ) -> Result<Flow, InterpError> {
        scope.push(HashMap::new());
        let result = self.exec_stmts(stmts, scope, depth);
        scope.pop();
        result
    }

    fn exec_stmts(
        &mut self,
        stmts: &[Stmt],
        scope: &mut Scope,
        depth: usize,
    ) -> Result<Flow, InterpError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec_stmt(stmt, scope, depth)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        scope: &mut Scope,
        depth: usize,
    ) -> Result<Flow, InterpError> {
        self.tick()?;
        match stmt {
            Stmt::Decl(name, expr) => {
                let value = self.eval(expr, scope, depth)?;
                if let Some(frame) = scope.last_mut() {
                    frame.insert(name.clone(), value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Assign(target, op, expr) => {
                let mut value = self.eval(expr, scope, depth)?;
                if let Some(op) = op {
                    let current = self.read_target(target, scope, depth)?;
                    value = binary_op(*op, &current, &value)?;
                }
                self.write_target(target, value, scope, depth)?;
                Ok(Flow::Normal)
            }
            Stmt::Incr(target, delta) => {
                let current = self.read_target(target, scope, depth)?;
                let n = as_number(&current)
                    .ok_or_else(|| InterpError("cannot increment a non-number".to_string()))?;
                self.write_target(target, number_value(n + delta)?, scope, depth)?;
                Ok(Flow::Normal)
            }
            Stmt::If(cond, then_branch, else_branch) => {
                let cond = self.eval(cond, scope, depth)?;
                if truthy(&cond) {
                    self.exec_block(then_branch, scope, depth)
                } else {
                    self.exec_block(else_branch, scope, depth)
                }
            }
            Stmt::While(cond, body) => {
                loop {
                    self.tick()?;
                    let cond = self.eval(cond, scope, depth)?;
                    if !truthy(&cond) {
                        break;
                    }
                    if let Flow::Return(value) = self.exec_block(body, scope, depth)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For(init, cond, step, body) => {
                scope.push(HashMap::new());
                let result = (|| {
                    self.exec_stmt(init, scope, depth)?;
                    loop {
                        self.tick()?;
                        let cond = self.eval(cond, scope, depth)?;
                        if !truthy(&cond) {
                            break;
                        }
                        if let Flow::Return(value) = self.exec_block(body, scope, depth)? {
                            return Ok(Flow::Return(value));
                        }
                        self.exec_stmt(step, scope, depth)?;
                    }
                    Ok(Flow::Normal)
                })();
                scope.pop();
                result
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scope, depth)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scope, depth)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn read_target(
        &mut self,
        target: &Target,
        scope: &mut Scope,
        depth: usize,
    ) -> Result<Value, InterpError> {
        match target {
            Target::Var(name) => lookup(scope, name),
            Target::Index(name, idx_expr) => {
                let idx = self.eval(idx_expr, scope, depth)?;
                let base = lookup(scope, name)?;
                index_value(&base, &idx)
            }
        }
    }

    fn write_target(
        &mut self,
        target: &Target,
        value: Value,
        scope: &mut Scope,
        depth: usize,
    ) -> Result<(), InterpError> {
        match target {
            Target::Var(name) => {
                for frame in scope.iter_mut().rev() {
                    if let Some(slot) = frame.get_mut(name) {
                        *slot = value;
                        return Ok(());
                    }
                }
                err(format!("{name} is not defined"))
            }
            Target::Index(name, idx_expr) => {
                let idx = self.eval(idx_expr, scope, depth)?;
                let idx = as_number(&idx)
                    .filter(|n| n.fract() == 0.0 && *n >= 0.0)
                    .ok_or_else(|| InterpError("array index must be a non-negative integer".to_string()))?
                    as usize;
                for frame in scope.iter_mut().rev() {
                    if let Some(Value::Array(items)) = frame.get_mut(name) {
                        if idx < items.len() {
                            items[idx] = value;
                        } else if idx == items.len() {
                            items.push(value);
                        } else {
                            return err("array index out of bounds");
                        }
                        return Ok(());
                    }
                }
                err(format!("{name} is not an array"))
            }
        }
    }

    fn eval(&mut self, expr: &Expr, scope: &mut Scope, depth: usize) -> Result<Value, InterpError> {
        self.tick()?;
        match expr {
            Expr::Lit(value) => Ok(value.clone()),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope, depth)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Ident(name) => lookup(scope, name),
            Expr::Index(base, idx) => {
                let base = self.eval(base, scope, depth)?;
                let idx = self.eval(idx, scope, depth)?;
                index_value(&base, &idx)
            }
            Expr::Length(base) => {
                let base = self.eval(base, scope, depth)?;
                match base {
                    Value::Array(items) => number_value(items.len() as f64),
                    Value::String(s) => number_value(s.chars().count() as f64),
                    other => err(format!("no length on {}", type_name(&other))),
                }
            }
            Expr::Call(name, args) => {
                if name != &self.func.name {
                    return err(format!("{name} is not a function"));
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope, depth)?);
                }
                self.call_at_depth(&values, depth + 1)
            }
            Expr::Unary(op, inner) => {
                let value = self.eval(inner, scope, depth)?;
                match op {
                    UnOp::Neg => {
                        let n = as_number(&value)
                            .ok_or_else(|| InterpError("cannot negate a non-number".to_string()))?;
                        number_value(-n)
                    }
                    UnOp::Not => Ok(Value::Bool(!truthy(&value))),
                }
            }
            Expr::Binary(op, left, right) => {
                // Short-circuit logical operators
                match op {
                    BinOp::And => {
                        let left = self.eval(left, scope, depth)?;
                        if !truthy(&left) {
                            return Ok(Value::Bool(false));
                        }
                        let right = self.eval(right, scope, depth)?;
                        Ok(Value::Bool(truthy(&right)))
                    }
                    BinOp::Or => {
                        let left = self.eval(left, scope, depth)?;
                        if truthy(&left) {
                            return Ok(Value::Bool(true));
                        }
                        let right = self.eval(right, scope, depth)?;
                        Ok(Value::Bool(truthy(&right)))
                    }
                    _ => {
                        let left = self.eval(left, scope, depth)?;
                        let right = self.eval(right, scope, depth)?;
                        binary_op(*op, &left, &right)
                    }
                }
            }
            Expr::Ternary(cond, then, otherwise) => {
                let cond = self.eval(cond, scope, depth)?;
                if truthy(&cond) {
                    self.eval(then, scope, depth)
                } else {
                    self.eval(otherwise, scope, depth)
                }
            }
        }
    }
}

fn lookup(scope: &Scope, name: &str) -> Result<Value, InterpError> {
    for frame in scope.iter().rev() {
        if let Some(value) = frame.get(name) {
            return Ok(value.clone());
        }
    }
    err(format!("{name} is not defined"))
}

fn index_value(base: &Value, idx: &Value) -> Result<Value, InterpError> {
    let idx = match as_number(idx) {
        Some(n) if n.fract() == 0.0 && n >= 0.0 => n as usize,
        _ => return Ok(Value::Null),
    };
    match base {
        Value::Array(items) => Ok(items.get(idx).cloned().unwrap_or(Value::Null)),
        Value::String(s) => Ok(s
            .chars()
            .nth(idx)
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        other => err(format!("cannot index {}", type_name(other))),
    }
}

fn binary_op(op: BinOp, left: &Value, right: &Value) -> Result<Value, InterpError> {
    match op {
        BinOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", display(left), display(right))))
            }
            _ => {
                let (a, b) = both_numbers(left, right)?;
                number_value(a + b)
            }
        },
        BinOp::Sub => {
            let (a, b) = both_numbers(left, right)?;
            number_value(a - b)
        }
        BinOp::Mul => {
            let (a, b) = both_numbers(left, right)?;
            number_value(a * b)
        }
        BinOp::Div => {
            let (a, b) = both_numbers(left, right)?;
            number_value(a / b)
        }
        BinOp::Rem => {
            let (a, b) = both_numbers(left, right)?;
            number_value(a % b)
        }
        BinOp::Eq => Ok(Value::Bool(canon(left) == canon(right))),
        BinOp::Ne => Ok(Value::Bool(canon(left) != canon(right))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => {
                    let (a, b) = both_numbers(left, right)?;
                    a.partial_cmp(&b)
                        .ok_or_else(|| InterpError("incomparable values".to_string()))?
                }
            };
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        BinOp::And | BinOp::Or => unreachable!("handled with short-circuiting"),
    }
}

fn both_numbers(left: &Value, right: &Value) -> Result<(f64, f64), InterpError> {
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => err(format!(
            "arithmetic on non-numbers: {} and {}",
            type_name(left),
            type_name(right)
        )),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build a number value, collapsing integral floats to integers so that
/// structural equality treats `5.0` and `5` as the same value.
fn number_value(n: f64) -> Result<Value, InterpError> {
    if !n.is_finite() {
        return err("arithmetic produced a non-finite number");
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Ok(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n)
            .map(Value::Number)
            .ok_or_else(|| InterpError("invalid number".to_string()))
    }
}

/// Normalize numbers recursively so structural comparison ignores the
/// integer/float representation split in serde_json.
pub fn canon(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                Value::Number(Number::from(f as i64))
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canon).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), canon(v))).collect())
        }
        _ => value.clone(),
    }
}
