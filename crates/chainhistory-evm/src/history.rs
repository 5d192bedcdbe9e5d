//! `EventHistory`: the timeline assembler.
//!
//! Owns two memo caches: subject → timeline and block → timestamp. A
//! reconstruction runs in two stages:
//!
//! 1. every primary lookup is queried concurrently;
//! 2. each lookup's handler decodes its records, issuing correlation queries
//!    concurrently across records.
//!
//! The results are flattened, each distinct block's timestamp is resolved
//! once, and the events are sorted newest first with same-block ties broken
//! by order rank (higher first) and then by discovery order.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use alloy_primitives::Address;
use chainhistory_core::{HistoryError, MemoCache, NetworkProfile, RecordSource, Subject, Timeline};

use crate::handlers::{handler_for, DecodeContext, PendingEvent};
use crate::registry::{Lookup, LookupRegistry};

/// Reconstructs and caches timelines for one network.
pub struct EventHistory {
    assembler: Assembler,
    timelines: MemoCache<Subject, Arc<Timeline>>,
}

impl EventHistory {
    pub fn new(source: Arc<dyn RecordSource>, profile: NetworkProfile) -> Self {
        Self {
            assembler: Assembler {
                source,
                registry: Arc::new(LookupRegistry::new(Arc::new(profile))),
                timestamps: Arc::new(MemoCache::new()),
            },
            timelines: MemoCache::new(),
        }
    }

    /// Engine for a built-in network, by name or chain id.
    pub fn for_network(source: Arc<dyn RecordSource>, network: &str) -> Result<Self, HistoryError> {
        let profile = NetworkProfile::builtin(network)
            .ok_or_else(|| HistoryError::UnknownNetwork(network.to_string()))?;
        Ok(Self::new(source, profile))
    }

    pub fn profile(&self) -> &NetworkProfile {
        self.assembler.registry.profile()
    }

    /// Timeline of `subject`, newest first.
    ///
    /// Repeated calls return the same `Arc` until the subject is
    /// invalidated. Concurrent calls for one subject share a single
    /// computation. A failed computation is not kept.
    pub async fn reconstruct(&self, subject: Subject) -> Result<Arc<Timeline>, HistoryError> {
        let assembler = self.assembler.clone();
        let key = subject.clone();
        self.timelines
            .get_or_try_insert_with(key, move || assembler.assemble(subject))
            .await
    }

    pub async fn vault(&self, vault_id: u64) -> Result<Arc<Timeline>, HistoryError> {
        self.reconstruct(Subject::Vault(vault_id)).await
    }

    pub async fn savings(&self, account: Address) -> Result<Arc<Timeline>, HistoryError> {
        self.reconstruct(Subject::Savings(account)).await
    }

    /// Drop the cached timeline of `subject`. Returns `true` if one existed.
    pub fn invalidate(&self, subject: &Subject) -> bool {
        self.timelines.invalidate(subject)
    }

    /// Drop every cached timeline and block timestamp.
    pub fn invalidate_all(&self) {
        self.timelines.clear();
        self.assembler.timestamps.clear();
    }

    /// Number of cached (or in-flight) timelines.
    pub fn cached_timelines(&self) -> usize {
        self.timelines.len()
    }

    /// Number of cached (or in-flight) block timestamps.
    pub fn cached_timestamps(&self) -> usize {
        self.assembler.timestamps.len()
    }
}

// ─── Assembler ───────────────────────────────────────────────────────────────

/// The pieces a reconstruction needs, cheap to clone into a cached future.
#[derive(Clone)]
struct Assembler {
    source: Arc<dyn RecordSource>,
    registry: Arc<LookupRegistry>,
    timestamps: Arc<MemoCache<u64, i64>>,
}

impl Assembler {
    async fn assemble(self, subject: Subject) -> Result<Arc<Timeline>, HistoryError> {
        let lookups = self.registry.build(&subject, self.source.as_ref()).await?;
        let ctx = DecodeContext {
            subject: &subject,
            source: self.source.as_ref(),
            contracts: &self.registry.profile().contracts,
        };

        let queries: Vec<_> = lookups
            .iter()
            .filter(|lookup| !lookup.filter.is_empty_range())
            .map(|lookup| self.run_lookup(&ctx, lookup))
            .collect();
        let batches = try_join_all(queries).await?;
        let mut pending: Vec<PendingEvent> = batches.into_iter().flatten().collect();

        let blocks: BTreeSet<u64> = pending.iter().map(|e| e.block_number).collect();
        let stamp_tasks: Vec<_> = blocks.into_iter().map(|block| self.timestamp(block)).collect();
        let stamps: HashMap<u64, i64> = try_join_all(stamp_tasks).await?.into_iter().collect();

        // Stable: equal keys keep discovery order.
        pending.sort_by(|a, b| {
            b.block_number
                .cmp(&a.block_number)
                .then_with(|| b.order_rank().cmp(&a.order_rank()))
        });

        let events = pending
            .into_iter()
            .map(|e| {
                let ts = stamps.get(&e.block_number).copied().unwrap_or_default();
                e.into_event(subject.clone(), ts)
            })
            .collect::<Vec<_>>();

        info!(
            subject = %subject,
            network = %self.registry.profile().name,
            events = events.len(),
            "timeline reconstructed"
        );
        Ok(Arc::new(Timeline { subject, events }))
    }

    async fn run_lookup(
        &self,
        ctx: &DecodeContext<'_>,
        lookup: &Lookup,
    ) -> Result<Vec<PendingEvent>, HistoryError> {
        let records = self.source.query_records(&lookup.filter).await?;
        debug!(
            subject = %ctx.subject,
            lookup = %lookup.kind,
            records = records.len(),
            "lookup returned"
        );
        handler_for(lookup.kind).decode(ctx, records).await
    }

    async fn timestamp(&self, block: u64) -> Result<(u64, i64), HistoryError> {
        let source = self.source.clone();
        let ts = self
            .timestamps
            .get_or_try_insert_with(block, move || async move {
                Ok(source.block_timestamp(block).await?)
            })
            .await?;
        Ok((block, ts))
    }
}
