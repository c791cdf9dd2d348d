//! Marginalia Client - drives bookmark and note synchronization.
//!
//! This crate runs sync cycles around the pure reconciliation in
//! `marginalia-engine`: it fetches the local journal and the server's
//! mutation log through collaborator ports, reconciles each resource type,
//! pushes pending local mutations in one request and hands the outcome back
//! to storage.
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use marginalia_client::{HttpTransport, SyncConfig, SyncPipeline, SyncService};
//! # use marginalia_client::ports::*;
//! # async fn example(
//! #     auth: Arc<dyn AuthenticationDataFetcher>,
//! #     dates: Arc<dyn LocalModificationDateFetcher>,
//! #     adapters: Vec<Arc<dyn marginalia_client::SyncResourceAdapter>>,
//! # ) -> marginalia_client::Result<()> {
//! marginalia_client::init_tracing();
//! let config = SyncConfig::load()?;
//! let transport = Arc::new(HttpTransport::new(&config)?);
//!
//! let pipeline = adapters
//!     .into_iter()
//!     .fold(SyncPipeline::new(transport, auth), |p, a| p.with_adapter(a));
//!
//! let service = SyncService::start(pipeline, dates, true);
//! service.on_app_start();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod decode;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod scheduler;
pub mod transport;

pub use adapter::{ResourceAdapter, ResourceSyncPlan, SyncResourceAdapter};
pub use config::{ConfigError, SyncConfig};
pub use decode::{CodecDecoder, CollectionBookmarkDecoder, RemoteDecoder};
pub use error::{Result, SyncError};
pub use pipeline::{CycleOutcome, CycleReport, SyncPipeline};
pub use ports::{
    AuthHeaders, AuthenticationDataFetcher, LocalDataFetcher, LocalModificationDateFetcher,
    MutationsPage, ResultNotifier, SyncToken, SyncTransport,
};
pub use scheduler::{ServiceStatus, SyncService};
pub use transport::HttpTransport;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber.
///
/// Honors `RUST_LOG`; does nothing if a subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marginalia_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
