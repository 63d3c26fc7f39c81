use crate::error::{LedgerError, Result};
use crate::types::PlayerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Seed for balances in groups that were never registered.
    pub default_starting_balance: i64,
    pub default_prefix: String,
    /// Privileged accounts: unlimited funds, may run admin adjustments.
    pub admin_ids: Vec<PlayerId>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_starting_balance: 1000,
            default_prefix: "!".to_string(),
            admin_ids: Vec::new(),
        }
    }
}

impl LedgerConfig {
    pub fn with_admins(admin_ids: impl IntoIterator<Item = PlayerId>) -> Self {
        let mut config = Self::default();
        config.admin_ids = admin_ids.into_iter().collect();
        config
    }

    pub fn is_admin(&self, player: PlayerId) -> bool {
        self.admin_ids.contains(&player)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_starting_balance < 0 {
            return Err(LedgerError::config(
                "Default starting balance cannot be negative",
            ));
        }

        if self.default_prefix.trim().is_empty() {
            return Err(LedgerError::config("Command prefix cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_starting_balance, 1000);
        assert!(!config.is_admin(PlayerId(1)));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = LedgerConfig::default();
        config.default_starting_balance = -1;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::with_admins([PlayerId(5)]);
        assert!(config.is_admin(PlayerId(5)));
        config.default_prefix = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LedgerConfig = serde_json::from_str(r#"{"admin_ids":[7]}"#).unwrap();
        assert_eq!(config.default_prefix, "!");
        assert!(config.is_admin(PlayerId(7)));
    }
}
