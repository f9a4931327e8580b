//! Request-scoped caller identity

use super::Account;

/// Resolved caller of a request
///
/// Built once by the authentication middleware and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    /// No credential was presented
    Anonymous,
    /// A bearer token resolved to this account
    Account(Account),
}

impl Identity {
    /// The resolved account, if any
    pub fn account(&self) -> Option<&Account> {
        match self {
            Identity::Anonymous => None,
            Identity::Account(account) => Some(account),
        }
    }

    /// Take the resolved account, if any
    pub fn into_account(self) -> Option<Account> {
        match self {
            Identity::Anonymous => None,
            Identity::Account(account) => Some(account),
        }
    }
}
