use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://us-central1-api-skinstric-ai.cloudfunctions.net";

const PHASE_ONE_PATH: &str = "skinstricPhaseOne";
const PHASE_TWO_PATH: &str = "skinstricPhaseTwo";

/// Endpoints of the remote analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Receives `{name, location}`
    pub phase_one_url: String,
    /// Receives `{image}` and answers with demographic probabilities
    pub phase_two_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::with_base(DEFAULT_API_BASE)
    }
}

impl ApiConfig {
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            phase_one_url: format!("{}/{}", base, PHASE_ONE_PATH),
            phase_two_url: format!("{}/{}", base, PHASE_TWO_PATH),
        }
    }

    /// Read overrides from the environment.
    ///
    /// `SKINSTRIC_API_BASE` replaces the host for both endpoints;
    /// `SKINSTRIC_PHASE_ONE_URL` / `SKINSTRIC_PHASE_TWO_URL` win over it.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = match non_empty("SKINSTRIC_API_BASE") {
            Some(base) => Self::with_base(&base),
            None => Self::default(),
        };
        if let Some(url) = non_empty("SKINSTRIC_PHASE_ONE_URL") {
            config.phase_one_url = url;
        }
        if let Some(url) = non_empty("SKINSTRIC_PHASE_TWO_URL") {
            config.phase_two_url = url;
        }
        config
    }
}
