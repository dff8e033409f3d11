use std::collections::BTreeMap;
use std::fmt;

/// File operations that can be guarded by an access control list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Create,
    Delete,
    Read,
    Update,
}

/// How a secret is presented to the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretMethod {
    /// Card holder verification (a PIN).
    Chv,
    /// Secure-messaging key.
    SecureMessaging,
    /// External authentication key.
    AuthKey,
}

impl fmt::Display for SecretMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Chv => "PIN",
            Self::SecureMessaging => "secure messaging key",
            Self::AuthKey => "authentication key",
        };
        write!(f, "{s}")
    }
}

/// One entry of an access control list.
///
/// Entries are evaluated in list order: `Refuse` anywhere makes the
/// operation permanently refused, `Allow` terminates the chain
/// successfully, and every `Secret` entry before that must be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCondition {
    Allow,
    Refuse,
    Secret { method: SecretMethod, reference: u8 },
}

impl AccessCondition {
    /// Shorthand for a PIN requirement.
    pub const fn chv(reference: u8) -> Self {
        Self::Secret {
            method: SecretMethod::Chv,
            reference,
        }
    }
}

/// Ordered authentication requirements per file operation.
///
/// An operation with no rule is unprotected, matching the behaviour of
/// cards that report no access conditions for a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    rules: BTreeMap<Operation, Vec<AccessCondition>>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry chain for one operation, replacing any previous chain.
    pub fn rule(mut self, op: Operation, entries: &[AccessCondition]) -> Self {
        self.rules.insert(op, entries.to_vec());
        self
    }

    /// Prepend one entry to an operation's chain.
    pub fn require(&mut self, op: Operation, entry: AccessCondition) {
        self.rules.entry(op).or_default().insert(0, entry);
    }

    /// Entry chain for an operation; empty means unprotected.
    pub fn entries(&self, op: Operation) -> &[AccessCondition] {
        self.rules.get(&op).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_operation_is_unprotected() {
        let acl = Acl::new().rule(Operation::Update, &[AccessCondition::chv(1)]);
        assert!(acl.entries(Operation::Read).is_empty());
        assert_eq!(acl.entries(Operation::Update), &[AccessCondition::chv(1)]);
    }

    #[test]
    fn require_prepends() {
        let mut acl = Acl::new().rule(Operation::Update, &[AccessCondition::Allow]);
        acl.require(Operation::Update, AccessCondition::chv(2));
        assert_eq!(
            acl.entries(Operation::Update),
            &[AccessCondition::chv(2), AccessCondition::Allow]
        );
    }
}
