//! Signed-in user as shown by the views.

use linkvault_storage::SessionMeta;
use serde::{Deserialize, Serialize};

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
    /// `full_name` from the provider metadata.
    pub full_name: Option<String>,
}

impl UserIdentity {
    /// `full_name`, else email, else "User".
    pub fn display_name(&self) -> String {
        non_blank(&self.full_name)
            .or_else(|| non_blank(&self.email))
            .unwrap_or("User")
            .to_string()
    }

    /// First letter of the first two words of the display name.
    pub fn initials(&self) -> String {
        let name = self.display_name();
        let mut parts = name.split_whitespace();
        let first = parts
            .next()
            .and_then(|p| p.chars().next())
            .unwrap_or('U');
        let second = parts.next().and_then(|p| p.chars().next());

        let mut initials = first.to_string();
        initials.extend(second);
        initials
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl From<&SessionMeta> for UserIdentity {
    fn from(meta: &SessionMeta) -> Self {
        Self {
            id: meta.user_id.clone(),
            email: meta.email.clone(),
            full_name: meta.full_name.clone(),
        }
    }
}
