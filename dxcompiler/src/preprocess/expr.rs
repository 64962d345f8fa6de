//! Integer expression evaluation for `#if` and `#elif`

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Ident(String),
    Op(&'static str),
}

const OPERATORS: [&str; 24] = [
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "(", ")", "!", "~", "-", "+", "*", "/", "%",
    "<", ">", "&", "^", "|", "?", ":",
];

fn lex(text: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let mut chars: Peekable<Chars<'_>> = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() {
            let mut literal = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_alphanumeric()) {
                literal.push(d);
                chars.next();
            }
            toks.push(Tok::Num(parse_number(&literal)?));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_alphanumeric() || **d == '_') {
                ident.push(d);
                chars.next();
            }
            toks.push(Tok::Ident(ident));
        } else {
            let rest: String = chars.clone().take(2).collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| format!("invalid token '{c}' in preprocessor expression"))?;
            for _ in 0..op.len() {
                chars.next();
            }
            toks.push(Tok::Op(*op));
        }
    }
    Ok(toks)
}

fn parse_number(literal: &str) -> Result<i64, String> {
    let digits = literal.trim_end_matches(['u', 'U', 'l', 'L']);
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or(digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse()
    };
    parsed.map_err(|_| format!("invalid integer constant '{literal}'"))
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.toks.get(self.pos) {
            Some(Tok::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn expect(&mut self, op: &str) -> Result<(), String> {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected '{op}' in preprocessor expression"))
        }
    }

    fn ternary(&mut self) -> Result<i64, String> {
        let cond = self.binary(0)?;
        if self.peek_op() != Some("?") {
            return Ok(cond);
        }
        self.pos += 1;
        let then = self.ternary()?;
        self.expect(":")?;
        let otherwise = self.ternary()?;
        Ok(if cond != 0 { then } else { otherwise })
    }

    fn binary(&mut self, min_prec: u8) -> Result<i64, String> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_op() {
            let Some(prec) = precedence(op) else { break };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, String> {
        match self.toks.get(self.pos).cloned() {
            Some(Tok::Op("!")) => {
                self.pos += 1;
                Ok((self.unary()? == 0) as i64)
            }
            Some(Tok::Op("~")) => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(Tok::Op("-")) => {
                self.pos += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            Some(Tok::Op("+")) => {
                self.pos += 1;
                self.unary()
            }
            Some(Tok::Op("(")) => {
                self.pos += 1;
                let value = self.ternary()?;
                self.expect(")")?;
                Ok(value)
            }
            Some(Tok::Num(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Tok::Ident(name)) => {
                self.pos += 1;
                Ok(if name == "true" { 1 } else { 0 })
            }
            Some(Tok::Op(op)) => Err(format!("unexpected '{op}' in preprocessor expression")),
            None => Err("expected value in preprocessor expression".to_string()),
        }
    }
}

fn precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    })
}

fn apply(op: &str, a: i64, b: i64) -> Result<i64, String> {
    Ok(match op {
        "||" => (a != 0 || b != 0) as i64,
        "&&" => (a != 0 && b != 0) as i64,
        "|" => a | b,
        "^" => a ^ b,
        "&" => a & b,
        "==" => (a == b) as i64,
        "!=" => (a != b) as i64,
        "<" => (a < b) as i64,
        ">" => (a > b) as i64,
        "<=" => (a <= b) as i64,
        ">=" => (a >= b) as i64,
        "<<" => a.wrapping_shl(b as u32),
        ">>" => a.wrapping_shr(b as u32),
        "+" => a.wrapping_add(b),
        "-" => a.wrapping_sub(b),
        "*" => a.wrapping_mul(b),
        "/" | "%" if b == 0 => return Err("division by zero in preprocessor expression".into()),
        "/" => a.wrapping_div(b),
        "%" => a.wrapping_rem(b),
        _ => return Err(format!("unsupported operator '{op}'")),
    })
}

/// Evaluates a fully macro-expanded condition.
///
/// Identifiers left after expansion evaluate to 0, except `true`.
pub(crate) fn evaluate(text: &str) -> Result<i64, String> {
    let toks = lex(text)?;
    if toks.is_empty() {
        return Err("#if with no expression".to_string());
    }
    let mut parser = Parser { toks, pos: 0 };
    let value = parser.ternary()?;
    if parser.pos != parser.toks.len() {
        return Err("extra tokens at end of preprocessor expression".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), 7);
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), 9);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3);
        assert_eq!(evaluate("1 << 4 | 1").unwrap(), 17);
    }

    #[test]
    fn test_logic_and_ternary() {
        assert_eq!(evaluate("!0 && (2 > 1)").unwrap(), 1);
        assert_eq!(evaluate("0 || UNDEFINED").unwrap(), 0);
        assert_eq!(evaluate("1 ? 5 : 6").unwrap(), 5);
        assert_eq!(evaluate("0x10 == 16").unwrap(), 1);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("").is_err());
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1").is_err());
        assert!(evaluate("1 2").is_err());
    }
}
