//! Proof-engine counters for profiling compiled games.
//!
//! With the `tracing` feature every [`ProofGraph`](crate::graph::ProofGraph)
//! counts its work here; without it the recorders are empty inline
//! functions and [`ProofMetrics::report`] returns zeros.
//!
//! ```rust,ignore
//! let outcome = sim.rollout();
//! println!("{}", sim.metrics().report());
//! ```

#[cfg(feature = "tracing")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counters for one compiled graph.
///
/// All counters use relaxed ordering; the graph is single-threaded, the
/// atomics only make the struct shareable with a reporting thread.
#[cfg(feature = "tracing")]
pub struct ProofMetrics {
    /// Disjunction proofs started
    pub or_proofs: AtomicU64,
    /// Conjunction proofs started
    pub and_proofs: AtomicU64,
    /// Merge steps executed
    pub merge_steps: AtomicU64,
    /// Rows written into accumulators by merges
    pub rows_produced: AtomicU64,
    /// Candidate rows rejected by filters or distinct checks
    pub filter_rejections: AtomicU64,
    /// Filters dropped for low hit rate
    pub filters_dropped: AtomicU64,
    /// Learning rewrites downgraded to a fixed mode
    pub mode_downgrades: AtomicU64,
    /// Recursive subtrees compiled on demand
    pub recurrence_expansions: AtomicU64,
    /// Recursive subtrees taken from the idle pool
    pub recurrence_pool_hits: AtomicU64,
    /// Extra rounds run to reach a recursive fixpoint
    pub fixpoint_rounds: AtomicU64,
    /// Deepest nesting of active recursive frames
    pub max_recursion_depth: AtomicU64,
    /// Disjunctions answered from a shared reuse slot
    pub reuse_hits: AtomicU64,
    /// Simulation ticks advanced
    pub ticks: AtomicU64,
}

#[cfg(feature = "tracing")]
impl ProofMetrics {
    pub fn new() -> Self {
        Self {
            or_proofs: AtomicU64::new(0),
            and_proofs: AtomicU64::new(0),
            merge_steps: AtomicU64::new(0),
            rows_produced: AtomicU64::new(0),
            filter_rejections: AtomicU64::new(0),
            filters_dropped: AtomicU64::new(0),
            mode_downgrades: AtomicU64::new(0),
            recurrence_expansions: AtomicU64::new(0),
            recurrence_pool_hits: AtomicU64::new(0),
            fixpoint_rounds: AtomicU64::new(0),
            max_recursion_depth: AtomicU64::new(0),
            reuse_hits: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_or_proof(&self) {
        self.or_proofs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_and_proof(&self) {
        self.and_proofs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_merge(&self, rows: usize) {
        self.merge_steps.fetch_add(1, Ordering::Relaxed);
        self.rows_produced.fetch_add(rows as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_filter_rejections(&self, n: u64) {
        self.filter_rejections.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_filters_dropped(&self, n: u64) {
        self.filters_dropped.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_mode_downgrade(&self) {
        self.mode_downgrades.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_recurrence_expansion(&self) {
        self.recurrence_expansions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_recurrence_pool_hit(&self) {
        self.recurrence_pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fixpoint_round(&self) {
        self.fixpoint_rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Raise the recorded recursion depth if `depth` is deeper.
    #[inline]
    pub fn update_max_recursion_depth(&self, depth: u64) {
        let mut current = self.max_recursion_depth.load(Ordering::Relaxed);
        while depth > current {
            match self.max_recursion_depth.compare_exchange_weak(
                current,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(c) => current = c,
            }
        }
    }

    #[inline]
    pub fn record_reuse_hit(&self) {
        self.reuse_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            or_proofs: self.or_proofs.load(Ordering::Relaxed),
            and_proofs: self.and_proofs.load(Ordering::Relaxed),
            merge_steps: self.merge_steps.load(Ordering::Relaxed),
            rows_produced: self.rows_produced.load(Ordering::Relaxed),
            filter_rejections: self.filter_rejections.load(Ordering::Relaxed),
            filters_dropped: self.filters_dropped.load(Ordering::Relaxed),
            mode_downgrades: self.mode_downgrades.load(Ordering::Relaxed),
            recurrence_expansions: self.recurrence_expansions.load(Ordering::Relaxed),
            recurrence_pool_hits: self.recurrence_pool_hits.load(Ordering::Relaxed),
            fixpoint_rounds: self.fixpoint_rounds.load(Ordering::Relaxed),
            max_recursion_depth: self.max_recursion_depth.load(Ordering::Relaxed),
            reuse_hits: self.reuse_hits.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.or_proofs,
            &self.and_proofs,
            &self.merge_steps,
            &self.rows_produced,
            &self.filter_rejections,
            &self.filters_dropped,
            &self.mode_downgrades,
            &self.recurrence_expansions,
            &self.recurrence_pool_hits,
            &self.fixpoint_rounds,
            &self.max_recursion_depth,
            &self.reuse_hits,
            &self.ticks,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(feature = "tracing")]
impl Default for ProofMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the counters at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsReport {
    pub or_proofs: u64,
    pub and_proofs: u64,
    pub merge_steps: u64,
    pub rows_produced: u64,
    pub filter_rejections: u64,
    pub filters_dropped: u64,
    pub mode_downgrades: u64,
    pub recurrence_expansions: u64,
    pub recurrence_pool_hits: u64,
    pub fixpoint_rounds: u64,
    pub max_recursion_depth: u64,
    pub reuse_hits: u64,
    pub ticks: u64,
}

impl MetricsReport {
    /// Share of candidate rows that filters let through.
    pub fn filter_pass_rate(&self) -> f64 {
        let total = self.rows_produced + self.filter_rejections;
        if total == 0 {
            1.0
        } else {
            self.rows_produced as f64 / total as f64
        }
    }

    /// Share of recursive subtree requests served from the pool.
    pub fn pool_hit_rate(&self) -> f64 {
        let total = self.recurrence_expansions + self.recurrence_pool_hits;
        if total == 0 {
            0.0
        } else {
            self.recurrence_pool_hits as f64 / total as f64
        }
    }

    /// Fold another graph's counters into this one. Depth keeps the maximum.
    pub fn absorb(&mut self, other: &MetricsReport) {
        self.or_proofs += other.or_proofs;
        self.and_proofs += other.and_proofs;
        self.merge_steps += other.merge_steps;
        self.rows_produced += other.rows_produced;
        self.filter_rejections += other.filter_rejections;
        self.filters_dropped += other.filters_dropped;
        self.mode_downgrades += other.mode_downgrades;
        self.recurrence_expansions += other.recurrence_expansions;
        self.recurrence_pool_hits += other.recurrence_pool_hits;
        self.fixpoint_rounds += other.fixpoint_rounds;
        self.max_recursion_depth = self.max_recursion_depth.max(other.max_recursion_depth);
        self.reuse_hits += other.reuse_hits;
        self.ticks += other.ticks;
    }

    pub fn merges_per_tick(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.merge_steps as f64 / self.ticks as f64
        }
    }
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Proof Metrics ===")?;
        writeln!(
            f,
            "Proofs:             {} disjunctions, {} conjunctions",
            self.or_proofs, self.and_proofs
        )?;
        writeln!(
            f,
            "Merges:             {} steps, {} rows ({:.1} per tick)",
            self.merge_steps,
            self.rows_produced,
            self.merges_per_tick()
        )?;
        writeln!(
            f,
            "Filters:            {} rejections ({:.1}% pass), {} dropped, {} downgrades",
            self.filter_rejections,
            self.filter_pass_rate() * 100.0,
            self.filters_dropped,
            self.mode_downgrades
        )?;
        writeln!(
            f,
            "Recursion:          {} expansions, {} pool hits, {} fixpoint rounds, max depth {}",
            self.recurrence_expansions,
            self.recurrence_pool_hits,
            self.fixpoint_rounds,
            self.max_recursion_depth
        )?;
        writeln!(f, "Reuse hits:         {}", self.reuse_hits)?;
        writeln!(f, "Ticks:              {}", self.ticks)?;
        Ok(())
    }
}

#[cfg(not(feature = "tracing"))]
pub struct ProofMetrics;

#[cfg(not(feature = "tracing"))]
impl ProofMetrics {
    #[inline]
    pub fn new() -> Self {
        ProofMetrics
    }
    #[inline]
    pub fn record_or_proof(&self) {}
    #[inline]
    pub fn record_and_proof(&self) {}
    #[inline]
    pub fn record_merge(&self, _rows: usize) {}
    #[inline]
    pub fn record_filter_rejections(&self, _n: u64) {}
    #[inline]
    pub fn record_filters_dropped(&self, _n: u64) {}
    #[inline]
    pub fn record_mode_downgrade(&self) {}
    #[inline]
    pub fn record_recurrence_expansion(&self) {}
    #[inline]
    pub fn record_recurrence_pool_hit(&self) {}
    #[inline]
    pub fn record_fixpoint_round(&self) {}
    #[inline]
    pub fn update_max_recursion_depth(&self, _depth: u64) {}
    #[inline]
    pub fn record_reuse_hit(&self) {}
    #[inline]
    pub fn record_tick(&self) {}
    #[inline]
    pub fn report(&self) -> MetricsReport {
        MetricsReport::default()
    }
    #[inline]
    pub fn reset(&self) {}
}

#[cfg(not(feature = "tracing"))]
impl Default for ProofMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
