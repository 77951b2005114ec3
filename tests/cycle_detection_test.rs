mod common;

use common::{entry, id, registry_with, v};
use swapline::component::ComponentId;
use swapline::registry::RegistryError;

fn chain(cycle: &[ComponentId]) -> Vec<&str> {
    cycle.iter().map(|c| c.as_str()).collect()
}

#[tokio::test]
async fn test_cycle_is_reported_before_anything_initializes() {
    let (registry, recorder) = registry_with(vec![
        entry("a", &[v(1, 0, 0)], &["b"], &[]),
        entry("b", &[v(1, 0, 0)], &["c"], &[]),
        entry("c", &[v(1, 0, 0)], &["a"], &[]),
    ])
    .await;

    match registry.load(&id("a"), None).await {
        Err(RegistryError::CircularDependency { cycle }) => {
            assert_eq!(chain(&cycle), vec!["a", "b", "c", "a"]);
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
    assert_eq!(registry.loaded_count().await, 0);
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_cycle_through_owned_child_is_detected() {
    let (registry, recorder) = registry_with(vec![
        entry("panel", &[v(1, 0, 0)], &[], &["panel.chart"]),
        entry("panel.chart", &[v(1, 0, 0)], &["sampler"], &[]),
        entry("sampler", &[v(1, 0, 0)], &["panel"], &[]),
    ])
    .await;

    match registry.load(&id("panel"), None).await {
        Err(RegistryError::CircularDependency { cycle }) => {
            assert_eq!(chain(&cycle), vec!["panel", "sampler", "panel"]);
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_unrelated_components_still_load_after_cycle() {
    let (registry, _) = registry_with(vec![
        entry("a", &[v(1, 0, 0)], &["b"], &[]),
        entry("b", &[v(1, 0, 0)], &["a"], &[]),
        entry("free", &[v(1, 0, 0)], &[], &[]),
    ])
    .await;

    assert!(registry.load(&id("b"), None).await.is_err());
    registry.load(&id("free"), None).await.unwrap();
    assert_eq!(registry.loaded_count().await, 1);
}

#[tokio::test]
async fn test_diamond_is_not_a_cycle() {
    let (registry, recorder) = registry_with(vec![
        entry("top", &[v(1, 0, 0)], &["left", "right"], &[]),
        entry("left", &[v(1, 0, 0)], &["base"], &[]),
        entry("right", &[v(1, 0, 0)], &["base"], &[]),
        entry("base", &[v(1, 0, 0)], &[], &[]),
    ])
    .await;

    registry.load(&id("top"), None).await.unwrap();
    assert_eq!(registry.loaded_count().await, 4);
    assert_eq!(recorder.events_with("init:base").len(), 1);
    assert_eq!(recorder.events_with("init:")[0], "init:base@1.0.0");
}

#[tokio::test]
async fn test_missing_dependency_fails_whole_load() {
    let (registry, _) = registry_with(vec![
        entry("app", &[v(1, 0, 0)], &["core", "ghost"], &[]),
        entry("core", &[v(1, 0, 0)], &[], &[]),
    ])
    .await;

    match registry.load(&id("app"), None).await {
        Err(RegistryError::NotFound { identifier, .. }) => assert_eq!(identifier, id("ghost")),
        other => panic!("expected not found, got {:?}", other),
    }
    assert_eq!(registry.loaded_count().await, 0);
}
