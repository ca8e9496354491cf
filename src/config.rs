use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::difficulty::DifficultyTier;
use crate::engine::mastery::ReviewPolicy;
use crate::engine::piece::PieceType;
use crate::session::progress::DEFAULT_SESSION_HISTORY_CAP;

pub const MAX_SESSION_HISTORY_CAP: usize = 1000;
const AUTO_TIER: &str = "auto";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_session_history_cap")]
    pub session_history_cap: usize,
    #[serde(default = "default_review_policy")]
    pub review_policy: String,
    #[serde(default = "default_difficulty_tier")]
    pub difficulty_tier: String,
    #[serde(default = "default_adaptive_bias")]
    pub adaptive_bias: bool,
    #[serde(default = "default_retry_on_fault")]
    pub retry_on_fault: bool,
    #[serde(default = "default_pieces")]
    pub pieces: Vec<String>,
}

fn default_session_history_cap() -> usize {
    DEFAULT_SESSION_HISTORY_CAP
}
fn default_review_policy() -> String {
    ReviewPolicy::Canonical.as_str().to_string()
}
fn default_difficulty_tier() -> String {
    AUTO_TIER.to_string()
}
fn default_adaptive_bias() -> bool {
    true
}
fn default_retry_on_fault() -> bool {
    false
}
fn default_pieces() -> Vec<String> {
    PieceType::all().iter().map(|p| p.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_history_cap: default_session_history_cap(),
            review_policy: default_review_policy(),
            difficulty_tier: default_difficulty_tier(),
            adaptive_bias: default_adaptive_bias(),
            retry_on_fault: default_retry_on_fault(),
            pieces: default_pieces(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.validate();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("finessr")
            .join("config.toml")
    }

    /// Normalize values after deserialization: clamp the history cap, reset
    /// unknown keys to defaults and drop unknown piece names.
    pub fn validate(&mut self) {
        self.session_history_cap = self.session_history_cap.clamp(1, MAX_SESSION_HISTORY_CAP);

        match ReviewPolicy::from_key(&self.review_policy) {
            Some(policy) => self.review_policy = policy.as_str().to_string(),
            None => self.review_policy = default_review_policy(),
        }

        let tier = self.difficulty_tier.trim().to_ascii_lowercase();
        self.difficulty_tier = match DifficultyTier::from_key(&tier) {
            Some(tier) => tier.to_key().to_string(),
            None => default_difficulty_tier(),
        };

        self.pieces = self.enabled_pieces().iter().map(|p| p.to_string()).collect();
    }

    pub fn review_policy(&self) -> ReviewPolicy {
        ReviewPolicy::from_key(&self.review_policy).unwrap_or_default()
    }

    /// `None` means the adapter picks the tier.
    pub fn manual_tier(&self) -> Option<DifficultyTier> {
        DifficultyTier::from_key(&self.difficulty_tier)
    }

    /// Enabled pieces in canonical order, deduplicated. Falls back to all
    /// seven when nothing valid is configured.
    pub fn enabled_pieces(&self) -> Vec<PieceType> {
        let wanted: Vec<PieceType> = self
            .pieces
            .iter()
            .filter_map(|name| name.parse::<PieceType>().ok())
            .collect();
        if wanted.is_empty() {
            return PieceType::all().to_vec();
        }
        PieceType::all()
            .iter()
            .copied()
            .filter(|p| wanted.contains(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde_defaults_from_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.session_history_cap, 50);
        assert_eq!(config.review_policy, "canonical");
        assert_eq!(config.difficulty_tier, "auto");
        assert!(config.adaptive_bias);
        assert!(!config.retry_on_fault);
        assert_eq!(config.enabled_pieces().len(), 7);
    }

    #[test]
    fn test_config_partial_file() {
        let toml_str = r#"
review_policy = "lenient"
pieces = ["t", "L"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.review_policy(), ReviewPolicy::Lenient);
        assert_eq!(config.enabled_pieces(), vec![PieceType::T, PieceType::L]);
        assert_eq!(config.session_history_cap, 50);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.session_history_cap, deserialized.session_history_cap);
        assert_eq!(config.pieces, deserialized.pieces);
        assert_eq!(config.difficulty_tier, deserialized.difficulty_tier);
    }

    #[test]
    fn test_validate_clamps_and_resets() {
        let mut config = Config::default();
        config.session_history_cap = 0;
        config.review_policy = "brutal".to_string();
        config.difficulty_tier = "Nightmare".to_string();
        config.validate();
        assert_eq!(config.session_history_cap, 1);
        assert_eq!(config.review_policy, "canonical");
        assert_eq!(config.difficulty_tier, "auto");

        config.session_history_cap = 5000;
        config.validate();
        assert_eq!(config.session_history_cap, MAX_SESSION_HISTORY_CAP);
    }

    #[test]
    fn test_manual_tier() {
        let mut config = Config::default();
        assert_eq!(config.manual_tier(), None);
        config.difficulty_tier = " Hardcore ".to_string();
        config.validate();
        assert_eq!(config.difficulty_tier, "hardcore");
        assert_eq!(config.manual_tier(), Some(DifficultyTier::Hardcore));
    }

    #[test]
    fn test_pieces_unknown_dropped_and_empty_means_all() {
        let mut config = Config::default();
        config.pieces = vec!["X".into(), "s".into(), "S".into(), "i".into()];
        config.validate();
        assert_eq!(config.pieces, vec!["I".to_string(), "S".to_string()]);

        config.pieces = vec!["?".into()];
        config.validate();
        assert_eq!(config.enabled_pieces().len(), 7);
        assert_eq!(config.pieces.len(), 7);
    }
}
