use crate::core::{Amount, Difficulty, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use crate::error::{LedgerError, Result};
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";

const NODE_ADDRESS_KEY: &str = "FASTCHAIN_NODE_ADDRESS";
const DIFFICULTY_KEY: &str = "FASTCHAIN_DIFFICULTY";
const MINING_REWARD_KEY: &str = "FASTCHAIN_MINING_REWARD";
const MINER_ADDRESS_KEY: &str = "FASTCHAIN_MINER_ADDRESS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    node_address: String,
    difficulty: String,
    mining_reward: Amount,
    miner_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_address: DEFAULT_NODE_ADDR.to_string(),
            difficulty: DEFAULT_DIFFICULTY.to_string(),
            mining_reward: DEFAULT_MINING_REWARD,
            miner_address: None,
        }
    }
}

impl Config {
    /// Defaults overridden by the environment; bad values are logged and skipped
    pub fn new() -> Config {
        let mut config = Config::default();
        if let Err(e) = config.apply_env(|key| env::var(key).ok()) {
            warn!("Ignoring environment configuration: {e}");
            config = Config::default();
        }
        config
    }

    /// Defaults overridden by the environment, failing on bad values
    pub fn from_env() -> Result<Config> {
        let mut config = Config::default();
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Read a TOML file, then apply environment overrides on top
    pub fn load(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let mut config = Config::from_toml_str(&contents)?;
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.node_address = addr;
        }
        if let Some(prefix) = lookup(DIFFICULTY_KEY) {
            self.difficulty = prefix;
        }
        if let Some(reward) = lookup(MINING_REWARD_KEY) {
            self.mining_reward = reward.trim().parse().map_err(|e| {
                LedgerError::Config(format!("{MINING_REWARD_KEY} must be an integer: {e}"))
            })?;
        }
        if let Some(miner) = lookup(MINER_ADDRESS_KEY) {
            self.miner_address = Some(miner);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        Difficulty::new(&self.difficulty)?;
        if self.node_address.is_empty() {
            return Err(LedgerError::Config(
                "Node address must not be empty".to_string(),
            ));
        }
        if matches!(&self.miner_address, Some(addr) if addr.is_empty()) {
            return Err(LedgerError::Config(
                "Miner address must not be empty when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_node_addr(&self) -> &str {
        self.node_address.as_str()
    }

    pub fn set_node_addr(&mut self, addr: String) {
        self.node_address = addr;
    }

    pub fn get_difficulty(&self) -> Result<Difficulty> {
        Difficulty::new(&self.difficulty)
    }

    pub fn set_difficulty(&mut self, prefix: &str) -> Result<()> {
        Difficulty::new(prefix)?;
        self.difficulty = prefix.to_string();
        Ok(())
    }

    pub fn get_mining_reward(&self) -> Amount {
        self.mining_reward
    }

    pub fn set_mining_reward(&mut self, reward: Amount) {
        self.mining_reward = reward;
    }

    pub fn get_mining_addr(&self) -> Option<&str> {
        self.miner_address.as_deref()
    }

    pub fn set_mining_addr(&mut self, addr: String) {
        self.miner_address = Some(addr);
    }

    pub fn is_miner(&self) -> bool {
        self.miner_address.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.get_node_addr(), "127.0.0.1:2001");
        assert_eq!(config.get_difficulty().unwrap().prefix(), "00000");
        assert_eq!(config.get_mining_reward(), DEFAULT_MINING_REWARD);
        assert!(!config.is_miner());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(lookup_from(&[
                (NODE_ADDRESS_KEY, "127.0.0.1:3000"),
                (DIFFICULTY_KEY, "000"),
                (MINING_REWARD_KEY, "50"),
                (MINER_ADDRESS_KEY, "miner-1"),
            ]))
            .unwrap();

        assert_eq!(config.get_node_addr(), "127.0.0.1:3000");
        assert_eq!(config.get_difficulty().unwrap().prefix(), "000");
        assert_eq!(config.get_mining_reward(), 50);
        assert_eq!(config.get_mining_addr(), Some("miner-1"));
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config
            .apply_env(lookup_from(&[(MINING_REWARD_KEY, "fifty")]))
            .is_err());

        let mut config = Config::default();
        assert!(config
            .apply_env(lookup_from(&[(DIFFICULTY_KEY, "zz")]))
            .is_err());
    }

    #[test]
    fn test_toml_partial_file_keeps_defaults() {
        let config = Config::from_toml_str("difficulty = \"00\"\nmining_reward = 7\n").unwrap();
        assert_eq!(config.get_difficulty().unwrap().prefix(), "00");
        assert_eq!(config.get_mining_reward(), 7);
        assert_eq!(config.get_node_addr(), DEFAULT_NODE_ADDR);
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        assert!(Config::from_toml_str("dificulty = \"00\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fastchain.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "node_address = \"127.0.0.1:4000\"").unwrap();
        writeln!(file, "miner_address = \"m\"").unwrap();

        drop(file);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.get_node_addr(), "127.0.0.1:4000");
        assert!(config.is_miner());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_set_difficulty_validates() {
        let mut config = Config::default();
        assert!(config.set_difficulty("0").is_ok());
        assert!(config.set_difficulty("").is_err());
        assert_eq!(config.get_difficulty().unwrap().prefix(), "0");
    }
}
