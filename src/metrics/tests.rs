use super::*;

#[test]
fn metrics_report_default() {
    let report = MetricsReport::default();
    assert_eq!(report.or_proofs, 0);
    assert_eq!(report.ticks, 0);
}

#[test]
fn metrics_report_rates() {
    let mut report = MetricsReport::default();

    assert_eq!(report.filter_pass_rate(), 1.0);
    assert_eq!(report.pool_hit_rate(), 0.0);
    assert_eq!(report.merges_per_tick(), 0.0);

    report.rows_produced = 3;
    report.filter_rejections = 1;
    assert!((report.filter_pass_rate() - 0.75).abs() < 0.001);

    report.recurrence_expansions = 1;
    report.recurrence_pool_hits = 3;
    assert!((report.pool_hit_rate() - 0.75).abs() < 0.001);

    report.merge_steps = 40;
    report.ticks = 4;
    assert!((report.merges_per_tick() - 10.0).abs() < 0.001);
}

#[test]
fn absorbed_reports_add_up() {
    let mut total = MetricsReport {
        merge_steps: 4,
        max_recursion_depth: 6,
        ticks: 2,
        ..Default::default()
    };
    total.absorb(&MetricsReport {
        merge_steps: 10,
        max_recursion_depth: 3,
        ticks: 5,
        ..Default::default()
    });
    assert_eq!(total.merge_steps, 14);
    assert_eq!(total.ticks, 7);
    assert_eq!(total.max_recursion_depth, 6);
}

#[test]
fn metrics_report_display() {
    let report = MetricsReport {
        or_proofs: 120,
        merge_steps: 50,
        reuse_hits: 9,
        ..Default::default()
    };

    let output = format!("{}", report);
    assert!(output.contains("Proofs:"));
    assert!(output.contains("120"));
    assert!(output.contains("Reuse hits:"));
}

#[cfg(not(feature = "tracing"))]
#[test]
fn disabled_metrics_report_zeros() {
    let metrics = ProofMetrics::new();
    metrics.record_or_proof();
    metrics.record_merge(10);
    assert_eq!(metrics.report(), MetricsReport::default());
}

#[cfg(feature = "tracing")]
#[test]
fn proof_metrics_basic_operations() {
    let metrics = ProofMetrics::new();

    metrics.record_or_proof();
    metrics.record_or_proof();
    metrics.record_merge(5);
    metrics.record_filter_rejections(2);

    let report = metrics.report();
    assert_eq!(report.or_proofs, 2);
    assert_eq!(report.merge_steps, 1);
    assert_eq!(report.rows_produced, 5);
    assert_eq!(report.filter_rejections, 2);
}

#[cfg(feature = "tracing")]
#[test]
fn proof_metrics_max_depth_tracking() {
    let metrics = ProofMetrics::new();

    metrics.update_max_recursion_depth(5);
    assert_eq!(metrics.max_recursion_depth.load(Ordering::Relaxed), 5);

    metrics.update_max_recursion_depth(3);
    assert_eq!(metrics.max_recursion_depth.load(Ordering::Relaxed), 5);

    metrics.update_max_recursion_depth(10);
    assert_eq!(metrics.max_recursion_depth.load(Ordering::Relaxed), 10);
}

#[cfg(feature = "tracing")]
#[test]
fn proof_metrics_reset() {
    let metrics = ProofMetrics::new();

    metrics.record_tick();
    metrics.record_reuse_hit();
    metrics.reset();
    assert_eq!(metrics.report(), MetricsReport::default());
}
