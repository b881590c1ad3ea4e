use mirador::WatchTelemetry;

#[test]
fn renders_prometheus_exposition_text() {
    let mut telemetry = WatchTelemetry::default();
    telemetry.incr_packages();
    telemetry.incr_packages();
    telemetry.incr_upserts();
    telemetry.set_queue_depth(7);
    telemetry.record_progress(42);
    telemetry.set_total_sequence(99);
    telemetry.record_handler_duration(15);

    let exposition = telemetry.render_metrics();
    assert!(exposition.contains("mirador_packages_total 2\n"));
    assert!(exposition.contains("mirador_upserts_total 1\n"));
    assert!(exposition.contains("mirador_queue_depth 7\n"));
    assert!(exposition.contains("mirador_last_processed_seq 42\n"));
    assert!(exposition.contains("mirador_total_sequence 99\n"));
    assert!(exposition.contains("mirador_handler_runs_total 1\n"));
    assert!(exposition.contains("mirador_handler_duration_ms_last 15\n"));
}

#[test]
fn pause_transitions_count_edges_not_levels() {
    let mut telemetry = WatchTelemetry::default();
    telemetry.set_feed_paused(true);
    telemetry.set_feed_paused(true);
    telemetry.set_feed_paused(false);
    telemetry.set_feed_paused(false);
    telemetry.set_feed_paused(true);
    assert_eq!(telemetry.feed_pauses_total(), 2);
    assert_eq!(telemetry.feed_resumes_total(), 1);
    assert!(telemetry.feed_paused());
    assert!(telemetry.render_metrics().contains("mirador_feed_paused 1\n"));
}

#[test]
fn handler_durations_accumulate() {
    let mut telemetry = WatchTelemetry::default();
    telemetry.record_handler_duration(10);
    telemetry.record_handler_duration(30);
    assert_eq!(telemetry.handler_runs_total(), 2);
    let exposition = telemetry.render_metrics();
    assert!(exposition.contains("mirador_handler_duration_ms_total 40\n"));
    assert!(exposition.contains("mirador_handler_duration_ms_last 30\n"));
}
