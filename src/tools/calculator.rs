//! Arithmetic expression evaluator backing the `calculate` tool
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := '-' factor | '+' factor | '(' expr ')' | number
//! ```

use anyhow::{anyhow, bail, Result};

/// Deepest allowed nesting of parentheses and unary signs
const MAX_DEPTH: usize = 64;

const MAX_LENGTH: usize = 1024;

/// Evaluates an arithmetic expression of numbers, `+ - * /` and parentheses
pub fn evaluate(expression: &str) -> Result<f64> {
    if let Some(c) = expression
        .chars()
        .find(|c| !(c.is_ascii_digit() || "+-*/.() ".contains(*c)))
    {
        bail!("Invalid character '{}' in expression", c);
    }

    if expression.trim().is_empty() {
        bail!("Empty expression");
    }

    if expression.len() > MAX_LENGTH {
        bail!("Expression longer than {} characters", MAX_LENGTH);
    }

    let mut parser = Parser {
        chars: expression.chars().collect(),
        pos: 0,
        depth: 0,
    };

    let value = parser.expr()?;
    if let Some(c) = parser.peek() {
        bail!("Unexpected '{}' at position {}", c, parser.pos + 1);
    }
    if !value.is_finite() {
        bail!("Result is not a finite number");
    }
    Ok(value)
}

/// Formats a result, printing whole numbers without a fractional part
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Next non-blank character
    fn peek(&mut self) -> Option<char> {
        while self.chars.get(self.pos) == Some(&' ') {
            self.pos += 1;
        }
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == '+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '*' {
                value *= rhs;
            } else {
                if rhs == 0.0 {
                    bail!("Division by zero");
                }
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64> {
        if self.depth >= MAX_DEPTH {
            bail!("Expression nested too deeply");
        }
        self.depth += 1;
        let value = self.nested_factor();
        self.depth -= 1;
        value
    }

    fn nested_factor(&mut self) -> Result<f64> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('+') => {
                self.pos += 1;
                self.factor()
            }
            Some('(') => {
                self.pos += 1;
                let value = self.expr()?;
                match self.bump() {
                    Some(')') => Ok(value),
                    _ => Err(anyhow!("Missing closing parenthesis")),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(anyhow!("Unexpected '{}' at position {}", c, self.pos + 1)),
            None => Err(anyhow!("Unexpected end of expression")),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        while matches!(self.chars.get(self.pos), Some(c) if c.is_ascii_digit() || *c == '.') {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| anyhow!("Invalid number '{}'", literal))
    }
}
