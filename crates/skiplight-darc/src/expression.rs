//! Flat boolean expressions over identities
//!
//! A rule expression is a sequence of identity tokens joined by `&` (AND) or
//! `|` (OR), evaluated strictly left to right with no precedence and no
//! grouping: `a | b & c` means `(a | b) & c`.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use skiplight_core::{LedgerError, Result};
use std::fmt;

/// Binary operator joining two tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Both sides must hold
    And,
    /// Either side may hold
    Or,
}

impl Operator {
    /// Textual symbol used in expressions
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::And => "&",
            Operator::Or => "|",
        }
    }

    fn parse(token: &str) -> Result<Self> {
        match token {
            "&" => Ok(Operator::And),
            "|" => Ok(Operator::Or),
            other => Err(LedgerError::argument(format!(
                "expected '&' or '|', found '{other}'"
            ))),
        }
    }

    /// Combine an accumulated value with the next operand
    pub fn apply(&self, acc: bool, next: bool) -> bool {
        match self {
            Operator::And => acc && next,
            Operator::Or => acc || next,
        }
    }

    /// Whether the outcome is already fixed, so the next operand can be skipped
    pub fn short_circuits(&self, acc: bool) -> bool {
        match self {
            Operator::And => !acc,
            Operator::Or => acc,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Stored text of a rule expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression(String);

impl Expression {
    /// Expression naming a single identity
    pub fn single(identity: &Identity) -> Self {
        Self(identity.to_string())
    }

    /// Expression joining several identities with one operator
    pub fn join(identities: &[Identity], op: Operator) -> Result<Self> {
        let (first, rest) = identities
            .split_first()
            .ok_or_else(|| LedgerError::argument("expression needs at least one identity"))?;
        Ok(rest
            .iter()
            .fold(Self::single(first), |expr, id| expr.append(op, id)))
    }

    /// Parse and validate expression text
    pub fn parse_str(text: &str) -> Result<Self> {
        let expression = Self(text.trim().to_string());
        expression.parse()?;
        Ok(expression)
    }

    /// New expression with `" <op> <identity>"` appended
    pub fn append(&self, op: Operator, identity: &Identity) -> Self {
        Self(format!("{} {op} {identity}", self.0))
    }

    /// The expression text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tokenize into identities and operators
    pub fn parse(&self) -> Result<ParsedExpression> {
        let mut tokens = self.0.split_whitespace();
        let first = tokens
            .next()
            .ok_or_else(|| LedgerError::argument("empty expression"))
            .and_then(parse_identity_token)?;

        let mut rest = Vec::new();
        while let Some(op_token) = tokens.next() {
            let op = Operator::parse(op_token)?;
            let identity = tokens
                .next()
                .ok_or_else(|| {
                    LedgerError::argument(format!("expression ends with operator '{op}'"))
                })
                .and_then(parse_identity_token)?;
            rest.push((op, identity));
        }
        Ok(ParsedExpression { first, rest })
    }
}

fn parse_identity_token(token: &str) -> Result<Identity> {
    if token.contains(['(', ')']) {
        return Err(LedgerError::argument(format!(
            "grouping is not supported in expressions: '{token}'"
        )));
    }
    token.parse()
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tokenized expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExpression {
    /// Leading identity
    pub first: Identity,
    /// Each following operator with its right-hand identity
    pub rest: Vec<(Operator, Identity)>,
}

impl ParsedExpression {
    /// Every identity token, in order
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        std::iter::once(&self.first).chain(self.rest.iter().map(|(_, id)| id))
    }

    /// Evaluate left to right with a synchronous token predicate
    pub fn evaluate<F>(&self, mut holds: F) -> bool
    where
        F: FnMut(&Identity) -> bool,
    {
        let mut acc = holds(&self.first);
        for (op, identity) in &self.rest {
            if op.short_circuits(acc) {
                continue;
            }
            acc = op.apply(acc, holds(identity));
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiplight_core::{signing_key_from_seed, DarcId};

    fn id(seed: u8) -> Identity {
        Identity::ed25519(signing_key_from_seed(&[seed; 32]).verifying_key())
    }

    #[test]
    fn test_append_builds_flat_text() {
        let expr = Expression::single(&id(1)).append(Operator::Or, &id(2));
        assert_eq!(expr.as_str(), format!("{} | {}", id(1), id(2)));
        let parsed = expr.parse().unwrap();
        assert_eq!(parsed.identities().count(), 2);
    }

    #[test]
    fn test_left_to_right_without_precedence() {
        // a | b & c with a=true, b=false, c=false: (a | b) & c = false,
        // whereas precedence-aware evaluation would give true.
        let expr = Expression::single(&id(1))
            .append(Operator::Or, &id(2))
            .append(Operator::And, &id(3));
        let parsed = expr.parse().unwrap();
        assert!(!parsed.evaluate(|identity| *identity == id(1)));
        assert!(parsed.evaluate(|identity| *identity == id(1) || *identity == id(3)));
    }

    #[test]
    fn test_join_and_requires_everyone() {
        let expr = Expression::join(&[id(1), id(2)], Operator::And).unwrap();
        let parsed = expr.parse().unwrap();
        assert!(!parsed.evaluate(|identity| *identity == id(1)));
        assert!(parsed.evaluate(|_| true));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expression::parse_str("").is_err());
        assert!(Expression::parse_str(&format!("{} &", id(1))).is_err());
        assert!(Expression::parse_str(&format!("{} ^ {}", id(1), id(2))).is_err());
        assert!(Expression::parse_str(&format!("({} | {})", id(1), id(2))).is_err());
        assert!(Expression::join(&[], Operator::Or).is_err());
    }

    #[test]
    fn test_delegated_tokens_parse() {
        let delegated = Identity::darc(DarcId::new([8u8; 32]));
        let expr = Expression::single(&id(1)).append(Operator::And, &delegated);
        let parsed = expr.parse().unwrap();
        assert_eq!(parsed.rest[0].1, delegated);
    }
}
