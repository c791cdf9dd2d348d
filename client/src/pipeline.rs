//! One synchronization cycle across every resource adapter.
//!
//! # Cycle
//!
//! 1. Skip entirely when logged out
//! 2. Fetch the remote mutations newer than the token
//! 3. Build every adapter's plan concurrently
//! 4. Push the union of all pending local mutations in one request
//! 5. Hand each plan its slice of the acknowledgements and complete them
//!    concurrently
//!
//! Fetch and push are shared, so their failure fails the whole cycle. A
//! failure inside one resource is reported through that adapter and leaves
//! the others untouched, but still keeps the token from advancing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use marginalia_engine::SyncMutation;
use tracing::{error, info, instrument, warn};

use crate::adapter::{ResourceSyncPlan, SyncResourceAdapter};
use crate::error::{Result, SyncError};
use crate::ports::{AuthenticationDataFetcher, SyncToken, SyncTransport};

/// Summary of a successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Token to use for the next cycle
    pub token: SyncToken,
    /// Remote mutations received for all resources
    pub pulled: usize,
    /// Local mutations pushed for all resources
    pub pushed: usize,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Not logged in; nothing was attempted.
    Skipped,
    Completed(CycleReport),
}

/// Drives sync cycles against one endpoint and authentication context.
#[derive(Clone)]
pub struct SyncPipeline {
    adapters: Vec<Arc<dyn SyncResourceAdapter>>,
    transport: Arc<dyn SyncTransport>,
    auth: Arc<dyn AuthenticationDataFetcher>,
}

impl SyncPipeline {
    pub fn new(
        transport: Arc<dyn SyncTransport>,
        auth: Arc<dyn AuthenticationDataFetcher>,
    ) -> Self {
        Self {
            adapters: Vec::new(),
            transport,
            auth,
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn SyncResourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn adapters(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.adapters.iter().map(|a| a.resource())
    }

    /// Run one cycle starting from `token`.
    ///
    /// Returns the new token inside [`CycleOutcome::Completed`] only when
    /// every resource succeeded.
    #[instrument(skip(self), fields(cycle_id = %uuid::Uuid::new_v4()))]
    pub async fn run(&self, token: Option<SyncToken>) -> Result<CycleOutcome> {
        if !self.auth.is_logged_in().await {
            info!("Not logged in, skipping sync cycle");
            return Ok(CycleOutcome::Skipped);
        }

        match self.run_logged_in(token).await {
            Ok(report) => {
                info!(
                    token = %report.token,
                    pulled = report.pulled,
                    pushed = report.pushed,
                    "Sync cycle completed"
                );
                Ok(CycleOutcome::Completed(report))
            }
            Err(e) => {
                error!(error = %e, "Sync cycle failed");
                Err(e)
            }
        }
    }

    async fn run_logged_in(&self, token: Option<SyncToken>) -> Result<CycleReport> {
        let fetched = async {
            let headers = self.auth.fetch_authentication_headers().await?;
            let page = self.transport.get_mutations(token, &headers).await?;
            Ok::<_, SyncError>((headers, page))
        }
        .await;
        let (headers, page) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                self.fail_all(&e).await;
                return Err(e);
            }
        };
        let pulled = page.mutations.len();

        let mut failed = Vec::new();
        let mut planned = Vec::new();
        let built = join_all(
            self.adapters
                .iter()
                .map(|adapter| adapter.build_plan(token, &page.mutations)),
        )
        .await;
        for (adapter, result) in self.adapters.iter().zip(built) {
            match result {
                Ok(plan) => planned.push((adapter, plan)),
                Err(e) => {
                    warn!(resource = adapter.resource(), error = %e, "Failed to build sync plan");
                    adapter.did_fail(&e.to_string()).await;
                    failed.push(adapter.resource().to_string());
                }
            }
        }

        let pushes: Vec<Vec<SyncMutation>> = planned
            .iter()
            .map(|(_, plan)| plan.mutations_to_push())
            .collect();
        let outbound: Vec<SyncMutation> = pushes.iter().flatten().cloned().collect();
        let pushed = outbound.len();

        let (new_token, mut acknowledgements) = if outbound.is_empty() {
            (page.last_mutation_at, Vec::new())
        } else {
            let ack = match self
                .transport
                .post_mutations(&outbound, Some(page.last_mutation_at), &headers)
                .await
            {
                Ok(ack) => ack,
                Err(e) => {
                    self.fail_planned(&planned, &e).await;
                    return Err(e);
                }
            };
            if ack.mutations.len() != outbound.len() {
                let e = SyncError::Protocol(format!(
                    "pushed {} mutations, {} acknowledged",
                    outbound.len(),
                    ack.mutations.len()
                ));
                self.fail_planned(&planned, &e).await;
                return Err(e);
            }
            (ack.last_mutation_at, ack.mutations)
        };

        let mut slices = Vec::with_capacity(pushes.len());
        for push in &pushes {
            let rest = acknowledgements.split_off(push.len());
            slices.push(std::mem::replace(&mut acknowledgements, rest));
        }

        let completed = join_all(
            planned
                .iter()
                .zip(slices)
                .map(|((_, plan), slice)| plan.complete(new_token, slice)),
        )
        .await;
        for ((adapter, _), result) in planned.iter().zip(completed) {
            if let Err(e) = result {
                warn!(resource = adapter.resource(), error = %e, "Failed to complete sync plan");
                adapter.did_fail(&e.to_string()).await;
                failed.push(adapter.resource().to_string());
            }
        }

        if !failed.is_empty() {
            return Err(SyncError::Incomplete { failed });
        }

        Ok(CycleReport {
            token: new_token,
            pulled,
            pushed,
            finished_at: Utc::now(),
        })
    }

    async fn fail_all(&self, err: &SyncError) {
        let message = err.to_string();
        join_all(self.adapters.iter().map(|a| a.did_fail(&message))).await;
    }

    async fn fail_planned(
        &self,
        planned: &[(&Arc<dyn SyncResourceAdapter>, Box<dyn ResourceSyncPlan>)],
        err: &SyncError,
    ) {
        let message = err.to_string();
        join_all(planned.iter().map(|(a, _)| a.did_fail(&message))).await;
    }
}
