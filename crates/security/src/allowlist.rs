//! Admin allowlist — who may use privileged directives.
//!
//! Identities are compared exactly: chat usernames are case-sensitive on
//! the server, so `Owner` and `owner` are different players.

/// Result of checking an identity against the admin list.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCheck {
    Allowed,
    Denied { identity: String, reason: String },
}

impl AdminCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdminCheck::Allowed)
    }
}

/// The configured set of privileged identities.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    admins: Vec<String>,
}

impl AdminPolicy {
    pub fn new(admins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether `identity` may use a privileged directive.
    ///
    /// Rules:
    /// - Empty list → deny all
    /// - Otherwise the identity must be listed
    ///
    /// Denials are written to the `audit` log target.
    pub fn check(&self, identity: &str) -> AdminCheck {
        let result = if self.admins.is_empty() {
            AdminCheck::Denied {
                identity: identity.into(),
                reason: "No admins configured (deny by default)".into(),
            }
        } else if self.admins.iter().any(|a| a == identity) {
            AdminCheck::Allowed
        } else {
            AdminCheck::Denied {
                identity: identity.into(),
                reason: format!(
                    "'{}' is not an admin ({} configured)",
                    identity,
                    self.admins.len()
                ),
            }
        };

        if let AdminCheck::Denied { reason, .. } = &result {
            tracing::warn!(target: "audit", identity, reason = %reason, "privileged request denied");
        }

        result
    }

    pub fn admins(&self) -> &[String] {
        &self.admins
    }
}
