use std::{env, sync::Arc};

use tokio::sync::Semaphore;
use torus_core::VerifyLimits;

use crate::ScoreStore;

pub(crate) const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub(crate) const DEFAULT_DATA_DIR: &str = "data";
// A maximal replay (20k inputs) encodes to well under 1 MiB.
pub(crate) const DEFAULT_JSON_LIMIT_BYTES: usize = 2 * 1024 * 1024;
pub(crate) const DEFAULT_DAILY_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPolicy {
    pub(crate) limits: VerifyLimits,
    pub(crate) daily_max_attempts: u32,
}

impl Default for ServerPolicy {
    fn default() -> Self {
        Self {
            limits: VerifyLimits::default(),
            daily_max_attempts: DEFAULT_DAILY_MAX_ATTEMPTS,
        }
    }
}

impl ServerPolicy {
    /// Oracle limits can only be tightened; values above the built-in
    /// ceilings are clamped to them.
    pub(crate) fn from_env() -> Self {
        let defaults = VerifyLimits::default();
        let requested = VerifyLimits {
            max_final_time: read_env_u64("MAX_FINAL_TIME", defaults.max_final_time),
            max_inputs: read_env_usize("MAX_INPUTS", defaults.max_inputs),
        };
        let limits = requested.clamped();
        if limits != requested {
            tracing::warn!(
                "MAX_FINAL_TIME/MAX_INPUTS above the oracle ceilings ({}/{}); clamping.",
                defaults.max_final_time,
                defaults.max_inputs
            );
        }

        Self {
            limits,
            daily_max_attempts: read_env_u32("DAILY_MAX_ATTEMPTS", DEFAULT_DAILY_MAX_ATTEMPTS),
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) scores: Arc<ScoreStore>,
    pub(crate) oracle_semaphore: Arc<Semaphore>,
    pub(crate) oracle_concurrency: usize,
    pub(crate) policy: ServerPolicy,
    pub(crate) score_key: Option<String>,
}

impl AppState {
    pub(crate) fn new(
        scores: ScoreStore,
        oracle_concurrency: usize,
        policy: ServerPolicy,
        score_key: Option<String>,
    ) -> Self {
        let oracle_concurrency = oracle_concurrency.max(1);
        Self {
            scores: Arc::new(scores),
            oracle_semaphore: Arc::new(Semaphore::new(oracle_concurrency)),
            oracle_concurrency,
            policy,
            score_key,
        }
    }

    pub(crate) fn auth_required(&self) -> bool {
        self.score_key.is_some()
    }
}

pub(crate) fn default_oracle_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

pub(crate) fn read_env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
