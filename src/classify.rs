//! Transient-vs-terminal classification of transport failures.
//!
//! Only a server-side dropped connection is worth a reconnect. Each backend
//! names that condition differently, so the rules live in a table keyed by
//! [`BackendKind`] instead of a list of marker strings in the retry loop.

use std::collections::HashMap;

use crate::error::TransportError;
use crate::types::BackendKind;

/// Verdict on a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Server dropped the connection; reconnect and resubmit
    Transient,
    /// Anything else; surface immediately
    Terminal,
}

/// How one backend reports a dropped connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectRule {
    /// Substring of the driver message marking a disconnect
    pub message_marker: Option<String>,
    /// Native integer codes marking a disconnect
    pub codes: Vec<i64>,
}

impl DisconnectRule {
    pub fn marker(marker: impl Into<String>) -> Self {
        Self {
            message_marker: Some(marker.into()),
            codes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_codes(mut self, codes: impl IntoIterator<Item = i64>) -> Self {
        self.codes.extend(codes);
        self
    }

    #[must_use]
    pub fn matches(&self, err: &TransportError) -> bool {
        let by_message = self
            .message_marker
            .as_deref()
            .is_some_and(|marker| err.message.contains(marker));
        let by_code = err
            .code
            .as_numeric()
            .is_some_and(|code| self.codes.contains(&code));
        by_message || by_code
    }
}

/// Backend-indexed disconnect table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: HashMap<BackendKind, DisconnectRule>,
}

impl Default for Classifier {
    /// MySQL's "server has gone away" (2006) and the `PostgreSQL` client's
    /// unexpected-close message. `SQLite` runs in process and has no rule.
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            BackendKind::Mysql,
            DisconnectRule::marker("2006 MySQL").with_codes([2006]),
        );
        rules.insert(
            BackendKind::Postgres,
            DisconnectRule::marker("server closed the connection unexpectedly"),
        );
        Self { rules }
    }
}

impl Classifier {
    /// Table with no rules: every failure is terminal.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Replace the rule for `backend`.
    #[must_use]
    pub fn with_rule(mut self, backend: BackendKind, rule: DisconnectRule) -> Self {
        self.rules.insert(backend, rule);
        self
    }

    #[must_use]
    pub fn rule(&self, backend: BackendKind) -> Option<&DisconnectRule> {
        self.rules.get(&backend)
    }

    #[must_use]
    pub fn classify(&self, backend: BackendKind, err: &TransportError) -> Verdict {
        match self.rules.get(&backend) {
            Some(rule) if rule.matches(err) => Verdict::Transient,
            _ => Verdict::Terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn mysql_gone_away_is_transient() {
        let c = Classifier::default();
        let err = TransportError::new(
            "SQLSTATE[HY000]: General error: 2006 MySQL server has gone away",
            ErrorCode::State("HY000".into()),
        );
        assert_eq!(c.classify(BackendKind::Mysql, &err), Verdict::Transient);
    }

    #[test]
    fn mysql_code_alone_is_transient() {
        let c = Classifier::default();
        let err = TransportError::new("gone", ErrorCode::Numeric(2006));
        assert_eq!(c.classify(BackendKind::Mysql, &err), Verdict::Transient);
    }

    #[test]
    fn syntax_error_is_terminal() {
        let c = Classifier::default();
        let err =
            TransportError::new("You have an error in your SQL syntax", ErrorCode::Numeric(1064));
        assert_eq!(c.classify(BackendKind::Mysql, &err), Verdict::Terminal);
    }

    #[test]
    fn marker_is_scoped_to_its_backend() {
        let c = Classifier::default();
        let err = TransportError::new("2006 MySQL server has gone away", ErrorCode::Missing);
        assert_eq!(c.classify(BackendKind::Sqlite, &err), Verdict::Terminal);
        assert_eq!(c.classify(BackendKind::Postgres, &err), Verdict::Terminal);
    }

    #[test]
    fn rules_can_be_overridden() {
        let c = Classifier::empty()
            .with_rule(BackendKind::Sqlite, DisconnectRule::default().with_codes([10]));
        let err = TransportError::new("disk I/O error", ErrorCode::Numeric(10));
        assert_eq!(c.classify(BackendKind::Sqlite, &err), Verdict::Transient);
        assert!(c.rule(BackendKind::Mysql).is_none());
    }
}
