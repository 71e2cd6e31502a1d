//! Proof-of-work mining configuration

use crate::pow::miner::DEFAULT_CHECK_INTERVAL;
use crate::pow::MiningControl;
use crate::traits::LeadingZeroBytes;
use crate::{ConsensusError, ConsensusResult};
use ledger_core::Nonce;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Length of a SHA-256 block hash in bytes
pub const HASH_LEN: usize = 32;

/// Largest integer a TOML file can hold
pub const MAX_TOML_INTEGER: u64 = i64::MAX as u64;

/// Proof-of-work mining configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Required number of leading zero bytes
    pub difficulty: usize,
    /// Abort a search after this many milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Attempts between cancellation/deadline checks
    pub check_interval: u64,
    /// Last nonce to try; the full u64 space when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nonce: Option<Nonce>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: 3,
            timeout_ms: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
            max_nonce: None,
        }
    }
}

impl MiningConfig {
    /// Create a configuration with the given difficulty
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConsensusResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConsensusError::Config(format!("Failed to read config file: {}", e)))?;

        let config: MiningConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConsensusResult<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)
            .map_err(|e| ConsensusError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConsensusResult<()> {
        if self.difficulty > HASH_LEN {
            return Err(ConsensusError::Config(format!(
                "Difficulty {} exceeds the {}-byte hash length",
                self.difficulty, HASH_LEN
            )));
        }

        if self.check_interval == 0 {
            return Err(ConsensusError::Config(
                "Check interval must be greater than 0".to_string(),
            ));
        }

        if self.timeout_ms == Some(0) {
            return Err(ConsensusError::Config(
                "Timeout must be greater than 0 when set".to_string(),
            ));
        }

        if let Some(timeout_ms) = self.timeout_ms.filter(|ms| *ms > MAX_TOML_INTEGER) {
            return Err(ConsensusError::Config(format!(
                "Timeout {}ms exceeds {}",
                timeout_ms, MAX_TOML_INTEGER
            )));
        }

        if let Some(max_nonce) = self.max_nonce.filter(|n| *n > MAX_TOML_INTEGER) {
            return Err(ConsensusError::Config(format!(
                "Max nonce {} exceeds {}; leave it unset to search every nonce",
                max_nonce, MAX_TOML_INTEGER
            )));
        }

        Ok(())
    }

    /// Build the validator described by this configuration
    pub fn validator(&self) -> LeadingZeroBytes {
        LeadingZeroBytes::new(self.difficulty)
    }

    /// Timeout as Duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Deadline for a search starting now
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout()
            .and_then(|timeout| Instant::now().checked_add(timeout))
    }

    /// Mining control for a search starting now
    pub fn control(&self, token: CancellationToken) -> MiningControl {
        let control = MiningControl::new(token)
            .with_check_interval(self.check_interval)
            .with_max_nonce(self.max_nonce.unwrap_or(Nonce::MAX));
        match self.deadline() {
            Some(deadline) => control.with_deadline(deadline),
            None => control,
        }
    }

    /// Set difficulty
    pub fn with_difficulty(mut self, difficulty: usize) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Set timeout, saturating at the largest storable value
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.timeout_ms = Some(millis.min(MAX_TOML_INTEGER));
        self
    }

    /// Set check interval
    pub fn with_check_interval(mut self, interval: u64) -> Self {
        self.check_interval = interval;
        self
    }

    /// Bound the nonce search space; `Nonce::MAX` means unbounded
    pub fn with_max_nonce(mut self, max_nonce: Nonce) -> Self {
        self.max_nonce = (max_nonce != Nonce::MAX).then_some(max_nonce);
        self
    }
}
