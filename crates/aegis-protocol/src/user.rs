//! Resource-owner representation

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The pre-authenticated end user an authorization code was minted for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier (the `sub` claim source).
    pub id: String,
    /// Login name.
    pub username: String,
    /// Owning security domain.
    pub domain: String,
    /// Profile attributes carried into token claims and templating.
    pub additional_information: HashMap<String, serde_json::Value>,
}

impl User {
    /// Minimal user for embedding and tests.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            domain: domain.into(),
            additional_information: HashMap::new(),
        }
    }
}
