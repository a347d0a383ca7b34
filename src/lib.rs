//! # Butterfly-pairs Library
//!
//! Pairwise travel distances between a set of named locations, computed one
//! directed pair at a time against a routing provider.
//!
//! ## Features
//!
//! - **Pluggable providers**: public OSRM routing or a credentialed matrix service
//! - **Cooperative control**: pause, resume and stop without losing or repeating work
//! - **Throttling**: provider-specific delay between calls, cancellable by stop
//! - **Failure isolation**: a failed lookup leaves its pair unresolved, the batch goes on
//! - **Progress tracking**: push updates through a [`ProgressSink`]
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use butterfly_pairs::{Node, ProviderConfig, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let nodes = vec![
//!         Node::new("Brussels", 50.8503, 4.3517),
//!         Node::new("Antwerp", 51.2194, 4.4025),
//!     ];
//!
//!     let rows = butterfly_pairs::compute_pairs(
//!         &nodes,
//!         ProviderKind::PublicRouting,
//!         &ProviderConfig::default(),
//!         None,
//!     )
//!     .await?;
//!
//!     for row in rows {
//!         println!("{} -> {}: {} km", row.from_name, row.to_name, row.distance_km);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Controlling a Batch
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use butterfly_pairs::{BatchController, BatchOptions, NullSink, ProviderConfig, ProviderKind};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProviderConfig::default();
//! let controller = Arc::new(BatchController::new(Arc::new(NullSink), BatchOptions::from(&config)));
//!
//! let nodes = butterfly_pairs::read_nodes("warehouses.csv")?;
//! controller.load(&nodes).await;
//!
//! let provider = butterfly_pairs::build_provider(ProviderKind::PublicRouting, &config)?;
//! controller.start(provider.clone(), None).await?;
//! controller.pause();
//! controller.start(provider, None).await?; // resume
//! controller.wait().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

pub use crate::core::config::{ProviderConfig, ProviderKind, RetryPolicy, DEFAULT_OSRM_URL};
pub use crate::core::controller::{
    BatchController, BatchOptions, BatchSnapshot, RunState, StartOutcome,
};
pub use crate::core::error::{Error, ProviderError, Result};
pub use crate::core::export::{
    check_overwrite_permission, write_csv, write_rows, OverwriteBehavior, DEFAULT_EXPORT_FILE,
};
pub use crate::core::ingest::{read_nodes, read_nodes_from_reader};
pub use crate::core::pairs::{generate, Node, PairTask, TaskStatus, TravelTime};
pub use crate::core::provider::{
    build_provider, Credential, DistanceProvider, MatrixProvider, OsrmProvider, Resolution,
};
pub use crate::core::sink::{exportable_rows, ExportRow, NullSink, ProgressSink};

// Internal modules
mod core;

/// Resolve every ordered pair of `nodes` and return the resolved rows
///
/// Runs a batch to completion with no external control. Pairs the provider
/// could not resolve are left out of the result.
///
/// # Arguments
/// * `nodes` - Locations to pair up
/// * `kind` - Provider to query
/// * `config` - Endpoints, timeouts and throttling
/// * `credential` - API token, required for [`ProviderKind::MatrixService`]
pub async fn compute_pairs(
    nodes: &[Node],
    kind: ProviderKind,
    config: &ProviderConfig,
    credential: Option<&str>,
) -> Result<Vec<ExportRow>> {
    let provider = build_provider(kind, config)?;
    let controller = BatchController::new(Arc::new(NullSink), BatchOptions::from(config));

    controller.load(nodes).await;
    controller
        .start(provider, credential.and_then(Credential::new))
        .await?;
    controller.wait().await;

    Ok(controller.export_rows())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_compute_pairs_rejects_missing_credential() {
        let config = ProviderConfig {
            matrix_base_url: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        };
        let nodes = vec![Node::new("A", 0.0, 0.0), Node::new("B", 1.0, 1.0)];

        let result = compute_pairs(&nodes, ProviderKind::MatrixService, &config, Some("  ")).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_compute_pairs_single_node() {
        let nodes = vec![Node::new("Solo", 50.0, 4.0)];
        let rows = compute_pairs(&nodes, ProviderKind::PublicRouting, &ProviderConfig::default(), None)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
