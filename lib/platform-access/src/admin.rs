//! Static administrator allow-list.

use std::collections::HashSet;

use crate::account::normalize_email;

/// Lower-cased administrator emails, parsed once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    emails: HashSet<String>,
}

impl AdminAllowList {
    /// Parses a comma-separated list.
    ///
    /// Entries are trimmed and lower-cased; empty entries are dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let emails = raw
            .split(',')
            .map(normalize_email)
            .filter(|entry| !entry.is_empty())
            .collect();
        Self { emails }
    }

    /// Returns true if `email` is an administrator, ignoring case.
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}
