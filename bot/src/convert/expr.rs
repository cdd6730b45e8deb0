//! Sandboxed arithmetic for conversion formulas.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | '+' unary | power
//! power   := atom ('^' unary)?
//! atom    := number | 'x' | func '(' expr ')' | '(' expr ')'
//! func    := abs | sqrt | ln | log | exp
//! ```
//!
//! The only name that resolves is the variable `x` and the fixed function
//! set above. Anything else is a parse error.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// Why a formula could not be parsed or evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("unexpected '{0}'")]
    UnexpectedToken(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NotFinite,

    #[error("formula is nested too deeply")]
    TooDeep,

    #[error("formula has too many operations")]
    TooLong,
}

const MAX_DEPTH: usize = 64;
const MAX_OPERATIONS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Abs,
    Sqrt,
    Ln,
    Log,
    Exp,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Self::Abs),
            "sqrt" => Some(Self::Sqrt),
            "ln" => Some(Self::Ln),
            "log" => Some(Self::Log),
            "exp" => Some(Self::Exp),
            _ => None,
        }
    }

    fn apply(self, v: f64) -> f64 {
        match self {
            Self::Abs => v.abs(),
            Self::Sqrt => v.sqrt(),
            Self::Ln => v.ln(),
            Self::Log => v.log10(),
            Self::Exp => v.exp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    X,
    Func(Func),
    Op(char),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::X => write!(f, "x"),
            Self::Func(func) => write!(f, "{func:?}"),
            Self::Op(c) => write!(f, "{c}"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(exp_end) = exponent_end(&chars) {
                    while chars.peek().is_some_and(|&(i, _)| i < exp_end) {
                        chars.next();
                    }
                    end = exp_end;
                }
                let text = &src[start..end];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::UnexpectedToken(text.to_string()))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = &src[start..end];
                if name == "x" {
                    tokens.push(Token::X);
                } else if let Some(func) = Func::lookup(name) {
                    tokens.push(Token::Func(func));
                } else {
                    return Err(EvalError::UnknownName(name.to_string()));
                }
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            other => return Err(EvalError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

/// End offset of an `e`/`E` exponent suffix starting at the next character,
/// if one with at least one digit follows.
fn exponent_end(chars: &Peekable<CharIndices<'_>>) -> Option<usize> {
    let mut ahead = chars.clone();
    match ahead.next() {
        Some((_, 'e' | 'E')) => {}
        _ => return None,
    }
    if let Some(&(_, '+' | '-')) = ahead.peek() {
        ahead.next();
    }
    let mut end = None;
    while let Some(&(i, d)) = ahead.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        end = Some(i + 1);
        ahead.next();
    }
    end
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    X,
    Neg(Box<Node>),
    Call(Func, Box<Node>),
    Binary(char, Box<Node>, Box<Node>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    operations: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::TooDeep);
        }
        Ok(())
    }

    /// Count one binary operation. Operator chains build left-deep trees, so
    /// this bounds evaluation depth where `descend` cannot.
    fn operation(&mut self) -> Result<(), EvalError> {
        self.operations += 1;
        if self.operations > MAX_OPERATIONS {
            return Err(EvalError::TooLong);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Node, EvalError> {
        self.descend()?;
        let mut node = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            self.operation()?;
            node = Node::Binary(op, Box::new(node), Box::new(self.term()?));
        }
        self.depth -= 1;
        Ok(node)
    }

    fn term(&mut self) -> Result<Node, EvalError> {
        let mut node = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            self.operation()?;
            node = Node::Binary(op, Box::new(node), Box::new(self.unary()?));
        }
        Ok(node)
    }

    fn unary(&mut self) -> Result<Node, EvalError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Node::Neg(Box::new(inner)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node, EvalError> {
        let base = self.atom()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            self.operation()?;
            self.descend()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(Node::Binary('^', Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Node, EvalError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Node::Num(n)),
            Some(Token::X) => Ok(Node::X),
            Some(Token::Func(func)) => {
                self.expect_lparen()?;
                let arg = self.expr()?;
                self.expect_rparen()?;
                Ok(Node::Call(func, Box::new(arg)))
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            Some(other) => Err(EvalError::UnexpectedToken(other.to_string())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    fn expect_lparen(&mut self) -> Result<(), EvalError> {
        match self.next() {
            Some(Token::LParen) => Ok(()),
            Some(other) => Err(EvalError::UnexpectedToken(other.to_string())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), EvalError> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            Some(other) => Err(EvalError::UnexpectedToken(other.to_string())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

/// A parsed formula over the single variable `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    root: Node,
}

impl Formula {
    pub fn parse(src: &str) -> Result<Self, EvalError> {
        let mut parser = Parser {
            tokens: tokenize(src)?,
            pos: 0,
            depth: 0,
            operations: 0,
        };
        let root = parser.expr()?;
        if let Some(extra) = parser.peek() {
            return Err(EvalError::UnexpectedToken(extra.to_string()));
        }
        Ok(Self { root })
    }

    /// Evaluate with `x` bound to `x`.
    pub fn eval(&self, x: f64) -> Result<f64, EvalError> {
        let value = eval_node(&self.root, x)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NotFinite)
        }
    }
}

fn eval_node(node: &Node, x: f64) -> Result<f64, EvalError> {
    Ok(match node {
        Node::Num(n) => *n,
        Node::X => x,
        Node::Neg(inner) => -eval_node(inner, x)?,
        Node::Call(func, arg) => func.apply(eval_node(arg, x)?),
        Node::Binary(op, lhs, rhs) => {
            let l = eval_node(lhs, x)?;
            let r = eval_node(rhs, x)?;
            match op {
                '+' => l + r,
                '-' => l - r,
                '*' => l * r,
                '/' => {
                    if r == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    l / r
                }
                _ => l.powf(r),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str, x: f64) -> f64 {
        Formula::parse(src).unwrap().eval(x).unwrap()
    }

    #[test]
    fn test_precedence_and_parentheses() {
        assert!((eval("1 + 2 * 3", 0.0) - 7.0).abs() < 1e-9);
        assert!((eval("(1 + 2) * 3", 0.0) - 9.0).abs() < 1e-9);
        assert!((eval("10 - 4 - 3", 0.0) - 3.0).abs() < 1e-9);
        assert!((eval("8 / 4 / 2", 0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_variable_binding() {
        assert!((eval("((x-32)*5)/9", 98.6) - 37.0).abs() < 1e-9);
        assert!((eval("x * 1.8 + 32", 100.0) - 212.0).abs() < 1e-9);
    }

    #[test]
    fn test_exponent_notation() {
        assert!((eval("x * 1e3", 2.0) - 2000.0).abs() < 1e-9);
        assert!((eval("x * 2.5E-1", 4.0) - 1.0).abs() < 1e-9);
        assert!((eval("1e+2 - x", 1.0) - 99.0).abs() < 1e-9);
        assert_eq!(Formula::parse("x * 1e308").unwrap().eval(10.0), Err(EvalError::NotFinite));
        assert_eq!(Formula::parse("2e"), Err(EvalError::UnknownName("e".into())));
        assert_eq!(Formula::parse("2ex"), Err(EvalError::UnknownName("ex".into())));
    }

    #[test]
    fn test_unary_and_power() {
        assert!((eval("-x", 3.0) + 3.0).abs() < 1e-9);
        assert!((eval("2 ^ 3", 0.0) - 8.0).abs() < 1e-9);
        assert!((eval("-2 ^ 2", 0.0) + 4.0).abs() < 1e-9);
        assert!((eval("2 ^ -1", 0.0) - 0.5).abs() < 1e-9);
        assert!((eval("x - -1", 1.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_functions() {
        assert!((eval("sqrt(x)", 16.0) - 4.0).abs() < 1e-9);
        assert!((eval("abs(x - 10)", 4.0) - 6.0).abs() < 1e-9);
        assert!((eval("log(x)", 1000.0) - 3.0).abs() < 1e-9);
        assert!((eval("ln(exp(x))", 2.5) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_unknown_names() {
        assert_eq!(
            Formula::parse("x + y"),
            Err(EvalError::UnknownName("y".into()))
        );
        assert!(matches!(
            Formula::parse("__import__(os)"),
            Err(EvalError::UnexpectedChar('_'))
        ));
        assert!(matches!(
            Formula::parse("open(x)"),
            Err(EvalError::UnknownName(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert_eq!(Formula::parse(""), Err(EvalError::UnexpectedEnd));
        assert_eq!(Formula::parse("(x + 1"), Err(EvalError::UnexpectedEnd));
        assert!(matches!(Formula::parse("x + 1)"), Err(EvalError::UnexpectedToken(_))));
        assert!(matches!(Formula::parse("x $ 2"), Err(EvalError::UnexpectedChar('$'))));
        assert!(matches!(Formula::parse("1..2"), Err(EvalError::UnexpectedToken(_))));
        assert!(matches!(Formula::parse("sqrt x"), Err(EvalError::UnexpectedToken(_))));
    }

    #[test]
    fn test_division_by_zero() {
        let formula = Formula::parse("1 / (x - 1)").unwrap();
        assert_eq!(formula.eval(1.0), Err(EvalError::DivisionByZero));
        assert!(formula.eval(2.0).is_ok());
    }

    #[test]
    fn test_non_finite_results_rejected() {
        let formula = Formula::parse("sqrt(x)").unwrap();
        assert_eq!(formula.eval(-1.0), Err(EvalError::NotFinite));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(Formula::parse(&deep), Err(EvalError::TooDeep));

        let negations = format!("{}x", "-".repeat(200));
        assert_eq!(Formula::parse(&negations), Err(EvalError::TooDeep));
    }

    #[test]
    fn test_long_operator_chains_rejected() {
        let sum = vec!["x"; 20_000].join("+");
        assert_eq!(Formula::parse(&sum), Err(EvalError::TooLong));

        let product = vec!["x"; 20_000].join("*");
        assert_eq!(Formula::parse(&product), Err(EvalError::TooLong));

        let within = vec!["x"; 100].join("+");
        assert!((eval(&within, 1.0) - 100.0).abs() < 1e-9);
    }
}
