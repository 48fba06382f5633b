// Opaque identity context carried through operations (spec.md Non-goals).
//
// The core never interprets these fields; it only forwards them to
// collaborators (tool backends, approval policies) that care about
// authorization. This is deliberately NOT an access-control model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityContext {
    /// Opaque principal identifier (user id, service account id, ...).
    pub principal: Option<String>,
    /// Free-form key/value attributes forwarded to collaborators.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl IdentityContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_principal(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            attributes: HashMap::new(),
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
