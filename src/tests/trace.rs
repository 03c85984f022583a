use super::*;

#[test]
fn log_statements_accept_fields() {
    let relation = "cell";
    debug!(rows = 3, %relation, "disjunction proved");
    info!(ticks = 7, "rollout finished");
    warn!(player = 1, text = "(mark 4 4)", "scripted move has no match");

    let _outer = info_span!("rollout", seed = 11).entered();
    let _inner = debug_span!("prove_or", relation = 7).entered();
}

#[test]
fn subscriber_can_be_installed_twice() {
    init_subscriber("warn");
    init_subscriber("debug");
}

#[cfg(not(feature = "tracing"))]
#[test]
fn flamegraph_without_feature() {
    assert!(init_flamegraph("rollouts.folded").is_ok());
    assert!(init_flamegraph("").is_err());
}
