// A transform is a single function call over the probe's raw string output:
// `round(x)`, `abs(x)`, `min(x, 0)`, and so on, with numeric-literal or
// nested-call arguments. This replaces the original collector's `eval`
// over a namespace of `float/int/str/len/abs/round/min/max` with a closed
// set of operators and no code execution.

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    fn as_f64(&self) -> Result<f64, Error> {
        match self {
            Value::Integer(n) => Ok(*n as f64),
            Value::Float(n) => Ok(*n),
            Value::Text(s) => s
                .parse()
                .map_err(|_| Error::new(ErrorKind::ProbeFailure, "transform: not a number")),
        }
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Input,
    Literal(f64),
    Call(Op, Vec<Expr>),
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Float,
    Int,
    Len,
    Abs,
    Round,
    Min,
    Max,
}

impl Op {
    fn parse(name: &str) -> Result<Self, Error> {
        match name {
            "float" => Ok(Op::Float),
            "int" => Ok(Op::Int),
            "len" => Ok(Op::Len),
            "abs" => Ok(Op::Abs),
            "round" => Ok(Op::Round),
            "min" => Ok(Op::Min),
            "max" => Ok(Op::Max),
            other => Err(Error::from_string(
                ErrorKind::ProbeFailure,
                format!("transform: unknown operation '{other}'"),
            )),
        }
    }
}

/// Parse a transform expression. Grammar:
/// `expr := "x" | number | ident "(" expr ("," expr)* ")"`.
pub fn parse(source: &str) -> Result<Transform, Error> {
    let mut parser = Parser { chars: source.trim().chars().collect(), pos: 0 };
    let expr = parser.parse_expr()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(Error::new(ErrorKind::ProbeFailure, "transform: trailing input"));
    }
    Ok(Transform(expr))
}

#[derive(Debug, Clone)]
pub struct Transform(Expr);

impl Transform {
    /// Apply the transform to a raw probe value, returning either a
    /// number or, for `int`, a whole-number-looking integer.
    pub fn apply(&self, input: &str) -> Result<Value, Error> {
        eval(&self.0, input)
    }
}

fn eval(expr: &Expr, input: &str) -> Result<Value, Error> {
    match expr {
        Expr::Input => Ok(Value::Text(input.to_string())),
        Expr::Literal(n) => Ok(Value::Float(*n)),
        Expr::Call(op, args) => eval_call(*op, args, input),
    }
}

fn eval_call(op: Op, args: &[Expr], input: &str) -> Result<Value, Error> {
    let arity_error = || Error::new(ErrorKind::ProbeFailure, "transform: wrong argument count");
    match op {
        Op::Float => {
            let [a] = args else { return Err(arity_error()) };
            Ok(Value::Float(eval(a, input)?.as_f64()?))
        }
        Op::Int => {
            let [a] = args else { return Err(arity_error()) };
            #[allow(clippy::cast_possible_truncation)]
            Ok(Value::Integer(eval(a, input)?.as_f64()? as i64))
        }
        Op::Len => {
            let [a] = args else { return Err(arity_error()) };
            match eval(a, input)? {
                Value::Text(s) => Ok(Value::Integer(s.chars().count() as i64)),
                _ => Err(Error::new(ErrorKind::ProbeFailure, "transform: len() requires a string")),
            }
        }
        Op::Abs => {
            let [a] = args else { return Err(arity_error()) };
            Ok(Value::Float(eval(a, input)?.as_f64()?.abs()))
        }
        Op::Round => {
            let [a] = args else { return Err(arity_error()) };
            Ok(Value::Float(eval(a, input)?.as_f64()?.round()))
        }
        Op::Min => {
            let [a, b] = args else { return Err(arity_error()) };
            Ok(Value::Float(eval(a, input)?.as_f64()?.min(eval(b, input)?.as_f64()?)))
        }
        Op::Max => {
            let [a, b] = args else { return Err(arity_error()) };
            Ok(Value::Float(eval(a, input)?.as_f64()?.max(eval(b, input)?.as_f64()?)))
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        self.skip_ws();
        if self.peek() == Some('x') && !self.chars.get(self.pos + 1).is_some_and(char::is_ascii_alphanumeric) {
            self.pos += 1;
            return Ok(Expr::Input);
        }
        if self.peek().is_some_and(|c| c.is_ascii_digit() || c == '-') {
            return self.parse_number();
        }
        self.parse_call()
    }

    fn parse_number(&mut self) -> Result<Expr, Error> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse()
            .map(Expr::Literal)
            .map_err(|_| Error::new(ErrorKind::ProbeFailure, "transform: malformed number"))
    }

    fn parse_call(&mut self) -> Result<Expr, Error> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if name.is_empty() {
            return Err(Error::new(ErrorKind::ProbeFailure, "transform: expected identifier"));
        }
        let op = Op::parse(&name)?;
        self.skip_ws();
        if self.peek() != Some('(') {
            return Err(Error::new(ErrorKind::ProbeFailure, "transform: expected '('"));
        }
        self.pos += 1;

        let mut args = Vec::new();
        loop {
            self.skip_ws();
            args.push(self.parse_expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(')') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(Error::new(ErrorKind::ProbeFailure, "transform: expected ',' or ')'")),
            }
        }
        Ok(Expr::Call(op, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_input_to_nearest_integer() {
        let t = parse("round(x)").unwrap();
        assert_eq!(t.apply("41.6").unwrap(), Value::Float(42.0));
    }

    #[test]
    fn clamps_with_min_and_max() {
        let t = parse("max(min(x, 100), 0)").unwrap();
        assert_eq!(t.apply("150").unwrap(), Value::Float(100.0));
        assert_eq!(t.apply("-5").unwrap(), Value::Float(0.0));
    }

    #[test]
    fn len_reports_character_count() {
        let t = parse("len(x)").unwrap();
        assert_eq!(t.apply("hello").unwrap(), Value::Integer(5));
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        assert!(parse("eval(x)").is_err());
    }

    #[test]
    fn bare_identifier_other_than_x_is_rejected() {
        assert!(parse("os.system(x)").is_err());
    }
}
