//! Identity supplied by the external identity provider.

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use crate::message::{ANONYMOUS_NAME, Message};

/// The signed-in user, used to stamp outgoing messages and to tell own
/// messages apart from everyone else's.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

impl Identity {
    /// Build an identity, defaulting a missing or blank display name.
    #[must_use]
    pub fn new(user_id: impl Into<String>, display_name: Option<&str>) -> Self {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_NAME)
            .to_owned();
        Self { user_id: user_id.into(), display_name }
    }

    #[must_use]
    pub fn owns(&self, message: &Message) -> bool {
        message.sender == self.user_id
    }
}
