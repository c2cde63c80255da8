//! Bearer credential lookup

use parking_lot::RwLock;

use crate::database::Database;

/// Settings key under which the bearer token is stored
pub const TOKEN_KEY: &str = "token";

/// Source of the bearer token attached to trusted requests.
///
/// `None` means no `Authorization` header is ever added.
pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// In-process token holder
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    token: RwLock<Option<String>>,
}

impl MemoryCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

impl CredentialStore for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().clone().filter(|t| !t.is_empty())
    }
}

/// Token persisted in the settings table
#[derive(Clone)]
pub struct SettingsCredentials {
    db: Database,
}

impl SettingsCredentials {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn store_token(&self, token: &str) -> crate::Result<()> {
        self.db.set_setting(TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> crate::Result<()> {
        self.db.delete_setting(TOKEN_KEY).map(|_| ())
    }
}

impl CredentialStore for SettingsCredentials {
    fn token(&self) -> Option<String> {
        match self.db.get_setting(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored token");
                None
            }
        }
    }
}
