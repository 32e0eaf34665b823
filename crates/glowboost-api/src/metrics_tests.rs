use super::*;

#[test]
fn test_independent_registries() {
    // Two instances must not collide on registration.
    let first = ServiceMetrics::new().unwrap();
    let second = ServiceMetrics::new().unwrap();

    first.record_delivery("synced", Duration::from_millis(5));

    assert_eq!(first.deliveries("synced"), 1);
    assert_eq!(second.deliveries("synced"), 0);
}

#[test]
fn test_render_includes_outcome_labels() {
    let metrics = ServiceMetrics::new().unwrap();
    metrics.record_delivery("ignored", Duration::from_millis(1));
    metrics.record_delivery("salon_not_found", Duration::from_millis(2));

    let text = metrics.render().unwrap();

    assert!(text.contains("glowboost_webhook_deliveries_total{outcome=\"ignored\"} 1"));
    assert!(text.contains("glowboost_webhook_deliveries_total{outcome=\"salon_not_found\"} 1"));
    assert!(text.contains("glowboost_webhook_duration_seconds_count 2"));
}
