//! Access-control objects (Darcs)
//!
//! A Darc is a versioned, ordered list of `action -> expression` rules. Each
//! evolution produces a new version that keeps the base id of version 0 and
//! points back at its predecessor through `prev_id`.

use crate::expression::{Expression, Operator};
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use skiplight_core::{hash, serialization, DarcId, LedgerError, Result};

/// Rule consulted when a Darc is used as a delegated identity
pub const SIGN_ACTION: &str = "_sign";

/// Rule consulted when a Darc is evolved
pub const EVOLVE_ACTION: &str = "invoke:darc.evolve";

/// Contract kind under which Darcs are stored in global state
pub const DARC_CONTRACT: &str = "darc";

/// One `action -> expression` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Action name such as `spawn:value` or `_sign`
    pub action: String,
    /// Who may perform it
    pub expression: Expression,
}

/// Ordered rule list; order is part of the Darc id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    list: Vec<Rule>,
}

impl Rules {
    /// Empty rule list
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard initial rules: owners may evolve, signers may sign
    pub fn init(owners: &[Identity], signers: &[Identity]) -> Result<Self> {
        let mut rules = Self::new();
        rules.set_rule(EVOLVE_ACTION, Expression::join(owners, Operator::Or)?);
        rules.set_rule(SIGN_ACTION, Expression::join(signers, Operator::Or)?);
        Ok(rules)
    }

    /// Expression for an action
    pub fn get(&self, action: &str) -> Option<&Expression> {
        self.list
            .iter()
            .find(|rule| rule.action == action)
            .map(|rule| &rule.expression)
    }

    /// Whether a rule exists for the action
    pub fn contains(&self, action: &str) -> bool {
        self.get(action).is_some()
    }

    /// Replace the rule for an action, or add it at the end
    pub fn set_rule(&mut self, action: &str, expression: Expression) {
        match self.list.iter_mut().find(|rule| rule.action == action) {
            Some(rule) => rule.expression = expression,
            None => self.list.push(Rule {
                action: action.to_string(),
                expression,
            }),
        }
    }

    /// Append `" <op> <identity>"` to an existing rule, or create it
    pub fn append_to_rule(&mut self, action: &str, identity: &Identity, op: Operator) {
        let expression = match self.get(action) {
            Some(existing) => existing.append(op, identity),
            None => Expression::single(identity),
        };
        self.set_rule(action, expression);
    }

    /// Remove the rule for an action
    pub fn remove_rule(&mut self, action: &str) -> Result<()> {
        let before = self.list.len();
        self.list.retain(|rule| rule.action != action);
        if self.list.len() == before {
            return Err(LedgerError::argument(format!("no rule for action '{action}'")));
        }
        Ok(())
    }

    /// Iterate rules in order
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.list.iter()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// Versioned access-control object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Darc {
    version: u64,
    description: Vec<u8>,
    base_id: Option<DarcId>,
    prev_id: Option<DarcId>,
    rules: Rules,
}

impl Darc {
    /// Version-0 Darc
    pub fn new(rules: Rules, description: impl Into<Vec<u8>>) -> Self {
        Self {
            version: 0,
            description: description.into(),
            base_id: None,
            prev_id: None,
            rules,
        }
    }

    /// Content hash of this version
    pub fn id(&self) -> DarcId {
        let mut h = hash::hasher();
        h.update_u64_le(self.version);
        h.update_len_prefixed(&self.description);
        h.update_len_prefixed(self.base_id.as_ref().map_or(&[][..], |id| id.as_bytes()));
        h.update_len_prefixed(self.prev_id.as_ref().map_or(&[][..], |id| id.as_bytes()));
        for rule in self.rules.iter() {
            h.update_len_prefixed(rule.action.as_bytes());
            h.update_len_prefixed(rule.expression.as_str().as_bytes());
        }
        DarcId::new(h.finalize())
    }

    /// Id shared by every version; version 0's own id
    pub fn base_id(&self) -> DarcId {
        match self.base_id {
            Some(base) => base,
            None => self.id(),
        }
    }

    /// Id of the previous version, if any
    pub fn prev_id(&self) -> Option<DarcId> {
        self.prev_id
    }

    /// Version number, 0 for a fresh Darc
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Free-form description bytes
    pub fn description(&self) -> &[u8] {
        &self.description
    }

    /// Rules of this version
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Mutable rules; mutating changes [`Darc::id`], so do it before
    /// the version is signed or published
    pub fn rules_mut(&mut self) -> &mut Rules {
        &mut self.rules
    }

    /// Delegated identity naming this Darc
    pub fn identity(&self) -> Identity {
        Identity::darc(self.base_id())
    }

    /// Next version: same base id, version + 1, linked to this version
    pub fn evolve(&self) -> Darc {
        Darc {
            version: self.version + 1,
            description: self.description.clone(),
            base_id: Some(self.base_id()),
            prev_id: Some(self.id()),
            rules: self.rules.clone(),
        }
    }

    /// Whether `next` is a well-formed successor of this version
    pub fn check_successor(&self, next: &Darc) -> Result<()> {
        if next.base_id() != self.base_id() {
            return Err(LedgerError::argument(format!(
                "evolution changes base id from {} to {}",
                self.base_id(),
                next.base_id()
            )));
        }
        if next.version != self.version + 1 {
            return Err(LedgerError::argument(format!(
                "evolution must go from version {} to {}, got {}",
                self.version,
                self.version + 1,
                next.version
            )));
        }
        if next.prev_id != Some(self.id()) {
            return Err(LedgerError::argument(
                "evolution does not link to the previous version",
            ));
        }
        Ok(())
    }

    /// Canonical encoding as stored in global state
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialization::to_vec(self)
    }

    /// Decode the canonical encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serialization::from_slice(bytes)
    }
}
