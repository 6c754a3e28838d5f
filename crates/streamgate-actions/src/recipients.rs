//! Recipient token handling.
//!
//! Recipient lists are stored as tokens (`org:acme`, `user:jdoe`,
//! `email:ops@example.com`). Older action payloads carry a dict shape
//! (`{"org": ..., "users": [...], "emails": [...]}`), sometimes as a
//! JSON string; [`normalize`] folds every shape into the token form at
//! the dispatch boundary.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientToken {
    /// Every member of the named organization.
    Org(String),
    /// One account, by user slug.
    User(String),
    /// A literal address.
    Email(String),
}

impl std::str::FromStr for RecipientToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("org", rest)) => Ok(RecipientToken::Org(rest.to_string())),
            Some(("user", rest)) => Ok(RecipientToken::User(rest.to_string())),
            Some(("email", rest)) => Ok(RecipientToken::Email(rest.to_string())),
            _ => Err(format!("unknown recipient token: {s}")),
        }
    }
}

impl std::fmt::Display for RecipientToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientToken::Org(v) => write!(f, "org:{v}"),
            RecipientToken::User(v) => write!(f, "user:{v}"),
            RecipientToken::Email(v) => write!(f, "email:{v}"),
        }
    }
}

/// Normalizes any stored recipient shape into tokens. Unparseable
/// entries are logged and skipped; a shape that is not a list, dict or
/// JSON string yields an empty list.
pub fn normalize(value: &Value) -> Vec<RecipientToken> {
    let value = match value {
        // A stringified dict from very old payloads.
        Value::String(s) if s.starts_with('{') => match serde_json::from_str(s) {
            Ok(parsed) => return normalize(&parsed),
            Err(e) => {
                tracing::warn!(error = %e, "Badly formatted recipient string");
                return Vec::new();
            }
        },
        other => other,
    };

    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter_map(|raw| match raw.parse() {
                Ok(token) => Some(token),
                Err(e) => {
                    tracing::warn!(token = %raw, error = %e, "Skipping recipient token");
                    None
                }
            })
            .collect(),
        Value::Object(map) => {
            let mut tokens = Vec::new();
            if let Some(org) = map.get("org").and_then(|v| v.as_str()) {
                tokens.push(RecipientToken::Org(org.to_string()));
            }
            if let Some(users) = map.get("users").and_then(|v| v.as_array()) {
                for user in users.iter().filter_map(|v| v.as_str()) {
                    tokens.push(RecipientToken::User(user.to_string()));
                }
            }
            if let Some(emails) = map.get("emails").and_then(|v| v.as_array()) {
                for email in emails.iter().filter_map(|v| v.as_str()) {
                    tokens.push(RecipientToken::Email(email.to_string()));
                }
            }
            tokens
        }
        other => {
            tracing::warn!(shape = %other, "Badly formatted recipient list");
            Vec::new()
        }
    }
}

/// Resolves recipient tokens to concrete addresses. Org and user tokens
/// need a membership lookup; the engine does not own that data, so it is
/// injected here.
pub trait MemberDirectory: Send + Sync {
    fn emails_for(&self, tokens: &[RecipientToken], org: &str) -> Vec<String>;
}

/// Fixed-table [`MemberDirectory`] for tests and single-tenant setups.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    /// org slug -> member addresses
    orgs: std::collections::HashMap<String, Vec<String>>,
    /// user slug -> address
    users: std::collections::HashMap<String, String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org(mut self, org: &str, members: &[&str]) -> Self {
        self.orgs.insert(
            org.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn with_user(mut self, user: &str, email: &str) -> Self {
        self.users.insert(user.to_string(), email.to_string());
        self
    }
}

impl MemberDirectory for MemoryDirectory {
    fn emails_for(&self, tokens: &[RecipientToken], org: &str) -> Vec<String> {
        let mut emails = Vec::new();
        for token in tokens {
            match token {
                RecipientToken::Org(slug) => {
                    if slug != org {
                        tracing::warn!(token = %token, org = %org, "Recipient org does not match");
                        continue;
                    }
                    if let Some(members) = self.orgs.get(slug) {
                        emails.extend(members.iter().cloned());
                    }
                }
                RecipientToken::User(slug) => {
                    if let Some(email) = self.users.get(slug) {
                        emails.push(email.clone());
                    } else {
                        tracing::warn!(user = %slug, "Unknown recipient user");
                    }
                }
                RecipientToken::Email(addr) => emails.push(addr.clone()),
            }
        }
        emails.sort();
        emails.dedup();
        emails
    }
}
