//! Distance providers
//!
//! A provider resolves one [`PairTask`] into a distance and travel time. The
//! batch controller only sees the [`DistanceProvider`] trait; concrete
//! implementations are chosen at run start from a [`ProviderKind`].

pub mod matrix;
pub mod osrm;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::config::{ProviderConfig, ProviderKind};
use crate::core::error::{Error, ProviderError, Result};
use crate::core::http::build_client;
use crate::core::pairs::{PairTask, TravelTime};

pub use matrix::MatrixProvider;
pub use osrm::OsrmProvider;

/// Opaque credential for authenticated providers
///
/// The token is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token; blank input yields `None`
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token.trim().to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Normalised result of one lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub distance_km: f64,
    pub duration: TravelTime,
}

/// Capability to resolve a single node pair
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Whether a non-empty credential must be supplied before a batch starts
    fn requires_credential(&self) -> bool {
        false
    }

    /// Pause the controller applies between two consecutive calls
    fn call_delay(&self) -> Duration;

    /// Check preconditions before any task is dispatched
    fn validate(&self, credential: Option<&Credential>) -> Result<()> {
        if self.requires_credential() && credential.is_none() {
            return Err(Error::Validation(format!(
                "provider '{}' requires an API credential",
                self.name()
            )));
        }
        Ok(())
    }

    async fn resolve(
        &self,
        task: &PairTask,
        credential: Option<&Credential>,
    ) -> std::result::Result<Resolution, ProviderError>;
}

/// Build the provider registered for `kind`
pub fn build_provider(kind: ProviderKind, config: &ProviderConfig) -> Result<Arc<dyn DistanceProvider>> {
    let client = build_client(config)?;
    let delay = config.delay_for(kind);

    let provider: Arc<dyn DistanceProvider> = match kind {
        ProviderKind::PublicRouting => {
            Arc::new(OsrmProvider::new(client, &config.osrm_base_url, delay))
        }
        ProviderKind::MatrixService => Arc::new(MatrixProvider::new(
            client,
            config.matrix_base_url.as_deref(),
            delay,
        )),
    };
    Ok(provider)
}

/// Round to a fixed number of decimal places
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejects_blank() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-token").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(***)");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(7.25, 1), 7.3);
        assert_eq!(round_to(0.0, 2), 0.0);
    }

    #[test]
    fn test_build_provider_kinds() {
        let config = ProviderConfig::default();

        let osrm = build_provider(ProviderKind::PublicRouting, &config).unwrap();
        assert_eq!(osrm.name(), "public-routing");
        assert!(!osrm.requires_credential());
        assert_eq!(osrm.call_delay(), config.osrm_delay);

        let matrix = build_provider(ProviderKind::MatrixService, &config).unwrap();
        assert_eq!(matrix.name(), "matrix-service");
        assert!(matrix.requires_credential());
        assert_eq!(matrix.call_delay(), config.matrix_delay);
    }
}
