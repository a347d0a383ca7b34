//! Provider configuration for butterfly-pairs
//!
//! Endpoints, time bounds and throttling for the routing providers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::{suggest_correction, Error, Result};

/// Public OSRM demo server
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Routing provider selected for a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Public OSRM routing endpoint
    PublicRouting,
    /// Credentialed matrix/route service
    MatrixService,
}

impl ProviderKind {
    const NAMES: [(&'static str, ProviderKind); 4] = [
        ("public-routing", ProviderKind::PublicRouting),
        ("osrm", ProviderKind::PublicRouting),
        ("matrix-service", ProviderKind::MatrixService),
        ("matrix", ProviderKind::MatrixService),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::PublicRouting => "public-routing",
            ProviderKind::MatrixService => "matrix-service",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        if let Some((_, kind)) = Self::NAMES.iter().find(|(name, _)| *name == wanted) {
            return Ok(*kind);
        }

        let message = match suggest_correction(s, Self::NAMES.iter().map(|(name, _)| *name)) {
            Some(suggestion) => format!("Unknown provider '{s}'. Did you mean '{suggestion}'?"),
            None => format!("Unknown provider '{s}'. Use 'public-routing' or 'matrix-service'"),
        };
        Err(Error::InvalidInput(message))
    }
}

/// Retry policy for transient provider failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure (0 disables retries)
    pub max_retries: u32,

    /// Delay before the first retry, doubled on each subsequent one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Configuration for routing providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the OSRM server
    pub osrm_base_url: String,

    /// Base URL of the matrix service; required when that provider is selected
    pub matrix_base_url: Option<String>,

    /// Upper bound on a single provider call
    pub request_timeout: Duration,

    /// TCP connect timeout for the HTTP client
    pub connect_timeout: Duration,

    /// Pause between calls against the public OSRM server
    pub osrm_delay: Duration,

    /// Pause between calls against the matrix service
    pub matrix_delay: Duration,

    pub retry: RetryPolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            osrm_base_url: DEFAULT_OSRM_URL.to_string(),
            matrix_base_url: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            // The public demo server allows roughly one request per second
            osrm_delay: Duration::from_millis(1000),
            matrix_delay: Duration::from_millis(250),
            retry: RetryPolicy::default(),
        }
    }
}

impl ProviderConfig {
    /// Inter-call delay applied by the controller for the given provider
    pub fn delay_for(&self, kind: ProviderKind) -> Duration {
        match kind {
            ProviderKind::PublicRouting => self.osrm_delay,
            ProviderKind::MatrixService => self.matrix_delay,
        }
    }
}
