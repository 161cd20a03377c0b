//! Boolean expressions over named variables: `&`, `|`, `!` and parentheses.
//!
//! Used by conditional validators (`Required::if_`, `Required::unless`,
//! `CantBeCombinedWith`), where every variable is an argument alias.
//!
//! There is no operator precedence. A group is evaluated left to right and
//! stops as soon as its value is decided: a `false` operand in front of `&`,
//! or a `true` operand in front of `|`.

use std::fmt;

use crate::tokenizer::{TokenKind, Tokenizer, WhitespaceBehavior};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExpressionError {
    message: String,
}

impl ExpressionError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Resolves a variable name to its truth value.
pub trait VariableResolver {
    fn resolve(&self, name: &str) -> bool;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> bool,
{
    fn resolve(&self, name: &str) -> bool {
        self(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    fn symbol(self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Variable { name: String, negated: bool },
    Group(Box<BooleanExpression>),
}

impl Operand {
    fn evaluate(&self, resolver: &dyn VariableResolver) -> bool {
        match self {
            Self::Variable { name, negated } => resolver.resolve(name) != *negated,
            Self::Group(group) => group.evaluate(resolver),
        }
    }
}

/// A parsed group: `[!] operand (op operand)*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanExpression {
    negated: bool,
    first: Operand,
    rest: Vec<(Operator, Operand)>,
}

impl BooleanExpression {
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let tokenizer = Tokenizer::new()
            .delimiters(['(', ')', '&', '|', '!'])
            .whitespace(WhitespaceBehavior::DelimitAndExclude);
        let tokens = tokenizer
            .tokenize(input)
            .map_err(|e| ExpressionError::new(e.to_string()))?;

        let tokens: Vec<Tok> = tokens
            .into_iter()
            .map(|t| match (t.kind, t.value.as_str()) {
                (TokenKind::Delimiter, "(") => Tok::Open,
                (TokenKind::Delimiter, ")") => Tok::Close,
                (TokenKind::Delimiter, "&") => Tok::Op(Operator::And),
                (TokenKind::Delimiter, "|") => Tok::Op(Operator::Or),
                (TokenKind::Delimiter, "!") => Tok::Not,
                _ => Tok::Var(t.value),
            })
            .collect();

        if tokens.is_empty() {
            return Err(ExpressionError::new("Empty expression"));
        }

        let mut pos = 0;
        let group = parse_group(&tokens, &mut pos, 0)?;
        Ok(group)
    }

    /// Evaluate against `resolver`, short-circuiting per group.
    pub fn evaluate(&self, resolver: &dyn VariableResolver) -> bool {
        let mut acc = self.first.evaluate(resolver);
        for (op, operand) in &self.rest {
            match op {
                Operator::And if !acc => return self.negated,
                Operator::Or if acc => return !self.negated,
                _ => acc = operand.evaluate(resolver),
            }
        }
        acc != self.negated
    }

    /// Every variable name referenced anywhere in the expression, in order.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        for operand in std::iter::once(&self.first).chain(self.rest.iter().map(|(_, o)| o)) {
            match operand {
                Operand::Variable { name, .. } => out.push(name.as_str()),
                Operand::Group(group) => group.collect_variables(out),
            }
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    fn fmt_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", OperandDisplay(&self.first))?;
        for (op, operand) in &self.rest {
            write!(f, " {} {}", op.symbol(), OperandDisplay(operand))?;
        }
        Ok(())
    }
}

impl fmt::Display for BooleanExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!(")?;
            self.fmt_body(f)?;
            f.write_str(")")
        } else {
            self.fmt_body(f)
        }
    }
}

impl std::str::FromStr for BooleanExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct OperandDisplay<'a>(&'a Operand);

impl fmt::Display for OperandDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Operand::Variable { name, negated } => {
                if *negated {
                    f.write_str("!")?;
                }
                if needs_quotes(name) {
                    write!(f, "\"{name}\"")
                } else {
                    f.write_str(name)
                }
            }
            Operand::Group(group) if group.negated => write!(f, "{group}"),
            Operand::Group(group) => {
                f.write_str("(")?;
                group.fmt_body(f)?;
                f.write_str(")")
            }
        }
    }
}

fn needs_quotes(name: &str) -> bool {
    name.is_empty()
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '&' | '|' | '!' | '"'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Open,
    Close,
    Op(Operator),
    Not,
    Var(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    Start,
    Operand,
    Op,
    Not,
}

fn push_operand(
    operand: Operand,
    first: &mut Option<Operand>,
    rest: &mut Vec<(Operator, Operand)>,
    pending_op: &mut Option<Operator>,
) -> Result<(), ExpressionError> {
    match (first.is_some(), pending_op.take()) {
        (false, _) => *first = Some(operand),
        (true, Some(op)) => rest.push((op, operand)),
        (true, None) => {
            return Err(ExpressionError::new(
                "Expected an operator '&' or '|' between two operands",
            ));
        }
    }
    Ok(())
}

fn parse_group(
    tokens: &[Tok],
    pos: &mut usize,
    depth: usize,
) -> Result<BooleanExpression, ExpressionError> {
    let mut first: Option<Operand> = None;
    let mut rest: Vec<(Operator, Operand)> = Vec::new();
    let mut pending_op: Option<Operator> = None;
    let mut negate_next = false;
    let mut prev = Prev::Start;

    while *pos < tokens.len() {
        let tok = &tokens[*pos];
        *pos += 1;

        match tok {
            Tok::Open => {
                let mut inner = parse_group(tokens, pos, depth + 1)?;
                if negate_next {
                    inner.negated = !inner.negated;
                    negate_next = false;
                }
                let operand = Operand::Group(Box::new(inner));
                push_operand(operand, &mut first, &mut rest, &mut pending_op)?;
                prev = Prev::Operand;
            }
            Tok::Close => {
                if depth == 0 {
                    return Err(ExpressionError::new("Unexpected closing parenthesis"));
                }
                if prev == Prev::Start {
                    return Err(ExpressionError::new("Empty group"));
                }
                return finish(first, rest, pending_op, negate_next);
            }
            Tok::Not => {
                if prev == Prev::Not {
                    return Err(ExpressionError::new(
                        "You cannot have two consecutive negation operators '!!'",
                    ));
                }
                negate_next = true;
                prev = Prev::Not;
            }
            Tok::Op(op) => {
                match prev {
                    Prev::Not => {
                        return Err(ExpressionError::new(
                            "You cannot have an operator '&' or '|' after a negation '!'",
                        ));
                    }
                    Prev::Op => {
                        return Err(ExpressionError::new(
                            "You cannot have two consecutive operators '&&' or '||', use '&' or '|'",
                        ));
                    }
                    Prev::Start => {
                        return Err(ExpressionError::new(
                            "Expression cannot start with an operator",
                        ));
                    }
                    Prev::Operand => {}
                }
                pending_op = Some(*op);
                prev = Prev::Op;
            }
            Tok::Var(name) => {
                let operand = Operand::Variable {
                    name: name.clone(),
                    negated: negate_next,
                };
                negate_next = false;
                push_operand(operand, &mut first, &mut rest, &mut pending_op)?;
                prev = Prev::Operand;
            }
        }
    }

    if depth > 0 {
        return Err(ExpressionError::new("missing at least 1 closing parenthesis"));
    }
    finish(first, rest, pending_op, negate_next)
}

fn finish(
    first: Option<Operand>,
    rest: Vec<(Operator, Operand)>,
    pending_op: Option<Operator>,
    negate_next: bool,
) -> Result<BooleanExpression, ExpressionError> {
    if negate_next {
        return Err(ExpressionError::new("Expression cannot end with '!'"));
    }
    if pending_op.is_some() {
        return Err(ExpressionError::new("Expression cannot end with an operator"));
    }
    let first = first.ok_or_else(|| ExpressionError::new("Empty group"))?;
    Ok(BooleanExpression {
        negated: false,
        first,
        rest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn truth<'a>(pairs: &'a [(&'a str, bool)]) -> impl Fn(&str) -> bool + 'a {
        let map: HashMap<&str, bool> = pairs.iter().copied().collect();
        move |name: &str| map.get(name).copied().unwrap_or(false)
    }

    fn eval(expr: &str, pairs: &[(&str, bool)]) -> bool {
        BooleanExpression::parse(expr).unwrap().evaluate(&truth(pairs))
    }

    #[test]
    fn cake_round_trip() {
        let expr = BooleanExpression::parse("!(cake & eatIt)").unwrap();
        assert_eq!(expr.to_string(), "!(cake & eatIt)");
        assert!(!expr.evaluate(&truth(&[("cake", true), ("eatIt", true)])));
        assert!(expr.evaluate(&truth(&[("cake", true), ("eatIt", false)])));
        assert!(expr.evaluate(&truth(&[])));
    }

    #[test]
    fn display_normalizes_spacing() {
        let expr = BooleanExpression::parse("a&!b|(c   |d)").unwrap();
        assert_eq!(expr.to_string(), "a & !b | (c | d)");
        assert_eq!(expr.variables(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn quoted_names_are_literal() {
        let expr = BooleanExpression::parse(r#""a&b" | c"#).unwrap();
        assert_eq!(expr.variables(), ["a&b", "c"]);
        assert!(expr.evaluate(&truth(&[("a&b", true)])));
        assert_eq!(expr.to_string(), r#""a&b" | c"#);
    }

    #[test]
    fn evaluation_is_left_to_right_with_short_circuit() {
        assert!(eval("a | b", &[("b", true)]));
        assert!(!eval("a & b", &[("a", true)]));
        // `false &` decides the group even though a later `| c` is true.
        assert!(!eval("a & b | c", &[("c", true)]));
        // `true |` decides the group.
        assert!(eval("a | b & c", &[("a", true)]));
        assert!(eval("!a", &[]));
        assert!(!eval("!(a | b)", &[("b", true)]));
        assert!(eval("!(a & b) & c", &[("a", true), ("c", true)]));
    }

    #[test]
    fn parse_errors_have_exact_messages() {
        let cases = [
            ("(a & b", "missing at least 1 closing parenthesis"),
            ("a & b)", "Unexpected closing parenthesis"),
            ("a & ()", "Empty group"),
            ("a && b", "You cannot have two consecutive operators '&&' or '||', use '&' or '|'"),
            ("a || b", "You cannot have two consecutive operators '&&' or '||', use '&' or '|'"),
            ("!!a", "You cannot have two consecutive negation operators '!!'"),
            ("a & !| b", "You cannot have an operator '&' or '|' after a negation '!'"),
            ("a & !", "Expression cannot end with '!'"),
            ("a &", "Expression cannot end with an operator"),
            ("& a", "Expression cannot start with an operator"),
        ];
        for (input, message) in cases {
            let err = BooleanExpression::parse(input).unwrap_err();
            assert_eq!(err.message(), message, "input: {input}");
        }
    }

    #[test]
    fn adjacent_operands_are_rejected() {
        let err = BooleanExpression::parse("a b").unwrap_err();
        assert!(err.message().contains("Expected an operator"));
    }
}
