//! Restricted expression language for CONDITION nodes.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and (("or" | "||") and)*
//! and     := not (("and" | "&&") not)*
//! not     := ("not" | "!") not | compare
//! compare := sum (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not in") sum)*
//! sum     := term (("+" | "-") term)*
//! term    := unary (("*" | "/" | "%") unary)*
//! unary   := "-" unary | postfix
//! postfix := primary ("." ident | "[" or "]")*
//! primary := number | string | true | false | null | ident | "(" or ")"
//! ```
//!
//! Identifiers resolve only against the scope handed to [`evaluate`]; there
//! are no function calls, assignments or attribute lookups outside JSON
//! objects.

use serde_json::{Map, Number, Value};

const MAX_DEPTH: usize = 64;
/// Operator and accessor nodes allowed in one expression
const MAX_NODES: usize = 512;

/// Errors from parsing or evaluating a condition
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("name '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("no field '{0}'")]
    MissingField(String),

    #[error("index {0} out of range")]
    IndexOutOfRange(i64),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,
}

type ExprResult<T> = Result<T, ExpressionError>;

/// Parse and evaluate `source` against `scope`, returning its truthiness
pub fn evaluate_condition(source: &str, scope: &Map<String, Value>) -> ExprResult<bool> {
    evaluate(source, scope).map(|v| truthy(&v))
}

/// Parse and evaluate `source` against `scope`
pub fn evaluate(source: &str, scope: &Map<String, Value>) -> ExprResult<Value> {
    let expr = parse(source)?;
    eval(&expr, scope)
}

/// Python-style truthiness of a JSON value
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Value),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
}

fn tokenize(source: &str) -> ExprResult<Vec<(usize, Token)>> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            let mut seen_dot = false;
            while i < chars.len() {
                let d = chars[i].1;
                if d.is_ascii_digit() {
                    i += 1;
                } else if d == '.'
                    && !seen_dot
                    && chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit())
                {
                    seen_dot = true;
                    i += 1;
                } else {
                    break;
                }
            }
            let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
            tokens.push((offset, Token::Number(parse_number(&text, offset)?)));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
            tokens.push((offset, Token::Ident(text)));
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let mut text = String::new();
            i += 1;
            loop {
                let Some(&(_, ch)) = chars.get(i) else {
                    return Err(syntax(offset, "unterminated string literal"));
                };
                i += 1;
                if ch == quote {
                    break;
                }
                if ch == '\\' {
                    let Some(&(_, escaped)) = chars.get(i) else {
                        return Err(syntax(offset, "unterminated string literal"));
                    };
                    i += 1;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    text.push(ch);
                }
            }
            tokens.push((offset, Token::Str(text)));
            continue;
        }

        let next = chars.get(i + 1).map(|(_, c)| *c);
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Op("=="), 2),
            ('!', Some('=')) => (Token::Op("!="), 2),
            ('<', Some('=')) => (Token::Op("<="), 2),
            ('>', Some('=')) => (Token::Op(">="), 2),
            ('&', Some('&')) => (Token::Op("and"), 2),
            ('|', Some('|')) => (Token::Op("or"), 2),
            ('<', _) => (Token::Op("<"), 1),
            ('>', _) => (Token::Op(">"), 1),
            ('!', _) => (Token::Op("not"), 1),
            ('+', _) => (Token::Op("+"), 1),
            ('-', _) => (Token::Op("-"), 1),
            ('*', _) => (Token::Op("*"), 1),
            ('/', _) => (Token::Op("/"), 1),
            ('%', _) => (Token::Op("%"), 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('.', _) => (Token::Dot, 1),
            _ => return Err(syntax(offset, format!("unexpected character '{}'", c))),
        };
        tokens.push((offset, token));
        i += width;
    }

    Ok(tokens)
}

fn parse_number(text: &str, offset: usize) -> ExprResult<Value> {
    if text.contains('.') {
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| syntax(offset, format!("invalid number '{}'", text)))
    } else {
        text.parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| syntax(offset, format!("invalid number '{}'", text)))
    }
}

fn syntax(offset: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        offset,
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
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
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Var(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
    nodes: usize,
    end: usize,
}

fn parse(source: &str) -> ExprResult<Expr> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        depth: 0,
        nodes: 0,
        end: source.len(),
    };

    if parser.tokens.is_empty() {
        return Err(syntax(0, "empty expression"));
    }

    let expr = parser.or()?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
        return Err(syntax(*offset, format!("unexpected token {:?}", token)));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Token::Op(o)) if *o == op)
    }

    fn descend(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax(self.offset(), "expression nested too deeply"));
        }
        Ok(())
    }

    /// Count a composite node against the size limit
    fn build(&mut self, expr: Expr) -> ExprResult<Expr> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(syntax(self.offset(), "expression too long"));
        }
        Ok(expr)
    }

    fn or(&mut self) -> ExprResult<Expr> {
        self.descend()?;
        let mut left = self.and()?;
        while self.at_keyword("or") || self.at_op("or") {
            self.advance();
            let right = self.and()?;
            left = self.build(Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right)))?;
        }
        self.depth -= 1;
        Ok(left)
    }

    fn and(&mut self) -> ExprResult<Expr> {
        let mut left = self.not()?;
        while self.at_keyword("and") || self.at_op("and") {
            self.advance();
            let right = self.not()?;
            left = self.build(Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right)))?;
        }
        Ok(left)
    }

    fn not(&mut self) -> ExprResult<Expr> {
        if self.at_keyword("not") || self.at_op("not") {
            self.advance();
            self.descend()?;
            let inner = self.not()?;
            self.depth -= 1;
            return self.build(Expr::Not(Box::new(inner)));
        }
        self.compare()
    }

    fn next_is_keyword(&self, word: &str) -> bool {
        matches!(self.tokens.get(self.pos + 1), Some((_, Token::Ident(w))) if w == word)
    }

    fn compare_op(&mut self) -> Option<BinaryOp> {
        let (op, width) = match self.peek()? {
            Token::Op("==") => (BinaryOp::Eq, 1),
            Token::Op("!=") => (BinaryOp::Ne, 1),
            Token::Op("<") => (BinaryOp::Lt, 1),
            Token::Op("<=") => (BinaryOp::Le, 1),
            Token::Op(">") => (BinaryOp::Gt, 1),
            Token::Op(">=") => (BinaryOp::Ge, 1),
            Token::Ident(w) if w == "in" => (BinaryOp::In, 1),
            Token::Ident(w) if w == "not" && self.next_is_keyword("in") => (BinaryOp::NotIn, 2),
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }

    fn compare(&mut self) -> ExprResult<Expr> {
        let mut left = self.sum()?;
        while let Some(op) = self.compare_op() {
            let right = self.sum()?;
            left = self.build(Expr::Binary(op, Box::new(left), Box::new(right)))?;
        }
        Ok(left)
    }

    fn sum(&mut self) -> ExprResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = if self.at_op("+") {
                BinaryOp::Add
            } else if self.at_op("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            self.advance();
            let right = self.term()?;
            left = self.build(Expr::Binary(op, Box::new(left), Box::new(right)))?;
        }
        Ok(left)
    }

    fn term(&mut self) -> ExprResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.at_op("*") {
                BinaryOp::Mul
            } else if self.at_op("/") {
                BinaryOp::Div
            } else if self.at_op("%") {
                BinaryOp::Rem
            } else {
                break;
            };
            self.advance();
            let right = self.unary()?;
            left = self.build(Expr::Binary(op, Box::new(left), Box::new(right)))?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> ExprResult<Expr> {
        if self.at_op("-") {
            self.advance();
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return self.build(Expr::Neg(Box::new(inner)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ExprResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let offset = self.offset();
                    match self.advance() {
                        Some(Token::Ident(name)) => {
                            expr = self.build(Expr::Field(Box::new(expr), name))?
                        }
                        _ => return Err(syntax(offset, "expected field name after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.or()?;
                    self.expect(Token::RBracket, "expected ']'")?;
                    expr = self.build(Expr::Index(Box::new(expr), Box::new(index)))?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn expect(&mut self, token: Token, message: &str) -> ExprResult<()> {
        let offset = self.offset();
        if self.peek() == Some(&token) {
            self.advance();
            Ok(())
        } else {
            Err(syntax(offset, message))
        }
    }

    fn primary(&mut self) -> ExprResult<Expr> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(n)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" | "True" => Expr::Literal(Value::Bool(true)),
                "false" | "False" => Expr::Literal(Value::Bool(false)),
                "null" | "None" => Expr::Literal(Value::Null),
                "and" | "or" | "not" | "in" => {
                    return Err(syntax(offset, format!("unexpected keyword '{}'", name)))
                }
                _ => Expr::Var(name),
            }),
            Some(Token::LParen) => {
                let inner = self.or()?;
                self.expect(Token::RParen, "expected ')'")?;
                Ok(inner)
            }
            Some(token) => Err(syntax(offset, format!("unexpected token {:?}", token))),
            None => Err(syntax(offset, "unexpected end of expression")),
        }
    }
}

fn eval(expr: &Expr, scope: &Map<String, Value>) -> ExprResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| ExpressionError::UndefinedVariable(name.clone())),
        Expr::Field(target, name) => match eval(target, scope)? {
            Value::Object(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| ExpressionError::MissingField(name.clone())),
            other => Err(ExpressionError::TypeMismatch(format!(
                "cannot read field '{}' of {}",
                name,
                type_name(&other)
            ))),
        },
        Expr::Index(target, index) => {
            let target = eval(target, scope)?;
            let index = eval(index, scope)?;
            index_value(target, index)
        }
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, scope)?))),
        Expr::Neg(inner) => match eval(inner, scope)? {
            Value::Number(n) => match n.as_i64() {
                Some(i) => i
                    .checked_neg()
                    .map(|v| Value::Number(v.into()))
                    .ok_or_else(|| ExpressionError::TypeMismatch("integer overflow".into())),
                None => float(-n.as_f64().unwrap_or(0.0)),
            },
            other => Err(ExpressionError::TypeMismatch(format!(
                "cannot negate {}",
                type_name(&other)
            ))),
        },
        Expr::Binary(BinaryOp::Or, left, right) => {
            let left = eval(left, scope)?;
            if truthy(&left) {
                Ok(left)
            } else {
                eval(right, scope)
            }
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            let left = eval(left, scope)?;
            if truthy(&left) {
                eval(right, scope)
            } else {
                Ok(left)
            }
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            binary(*op, left, right)
        }
    }
}

fn index_value(target: Value, index: Value) -> ExprResult<Value> {
    match (&target, &index) {
        (Value::Object(map), Value::String(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| ExpressionError::MissingField(key.clone())),
        (Value::Array(items), Value::Number(n)) => {
            let i = n.as_i64().ok_or_else(|| {
                ExpressionError::TypeMismatch("array index must be an integer".into())
            })?;
            let resolved = if i < 0 { items.len() as i64 + i } else { i };
            usize::try_from(resolved)
                .ok()
                .and_then(|r| items.get(r))
                .cloned()
                .ok_or(ExpressionError::IndexOutOfRange(i))
        }
        _ => Err(ExpressionError::TypeMismatch(format!(
            "cannot index {} with {}",
            type_name(&target),
            type_name(&index)
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> ExprResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&left, &right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::In => contains(&right, &left).map(Value::Bool),
        BinaryOp::NotIn => contains(&right, &left).map(|c| Value::Bool(!c)),
        BinaryOp::Add => match (&left, &right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => arithmetic(op, &left, &right),
        },
        _ => arithmetic(op, &left, &right),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> ExprResult<Value> {
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(ExpressionError::TypeMismatch(format!(
            "unsupported operands {} and {}",
            type_name(left),
            type_name(right)
        )));
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Rem if y == 0 => return Err(ExpressionError::DivisionByZero),
            BinaryOp::Rem => x.checked_rem_euclid(y),
            _ => None,
        };
        if let Some(v) = exact {
            return Ok(Value::Number(v.into()));
        }
    }

    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    match op {
        BinaryOp::Add => float(x + y),
        BinaryOp::Sub => float(x - y),
        BinaryOp::Mul => float(x * y),
        BinaryOp::Div | BinaryOp::Rem if y == 0.0 => Err(ExpressionError::DivisionByZero),
        BinaryOp::Div => float(x / y),
        _ => float(x.rem_euclid(y)),
    }
}

fn float(f: f64) -> ExprResult<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::TypeMismatch("non-finite result".into()))
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> ExprResult<std::cmp::Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or_else(|| ExpressionError::TypeMismatch("incomparable numbers".into())),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ExpressionError::TypeMismatch(format!(
            "cannot order {} and {}",
            type_name(left),
            type_name(right)
        ))),
    }
}

fn contains(haystack: &Value, needle: &Value) -> ExprResult<bool> {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => Ok(h.contains(n.as_str())),
        (Value::Array(items), _) => Ok(items.iter().any(|item| loose_eq(item, needle))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(ExpressionError::TypeMismatch(format!(
            "cannot test membership of {} in {}",
            type_name(needle),
            type_name(haystack)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
