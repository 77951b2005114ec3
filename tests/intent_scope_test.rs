//! Text to intent to build plan, over the built-in vocabulary.

use std::sync::Arc;
use std::time::Duration;

use swapline::component::{BuildLevel, ComponentId, ComponentPath};
use swapline::intent::{ChangeAction, IntentParser, Vocabulary};
use swapline::scope::{ComponentIndex, DurationTable, IndexNode, ScopeAnalyzer};

fn path(s: &str) -> ComponentPath {
    ComponentPath::parse(s).unwrap()
}

fn vocabulary_analyzer() -> ScopeAnalyzer {
    let index = ComponentIndex::from_vocabulary(&Vocabulary::system_health());
    ScopeAnalyzer::new(Arc::new(index), DurationTable::default())
}

#[test]
fn test_memory_bar_color_fix_end_to_end() {
    let parser = IntentParser::system_health().unwrap();
    let intent = parser.parse("Fix the memory bar color!");

    assert!(!intent.requires_clarification());
    assert_eq!(intent.target_path(), "systemHealth.memory.display.bar.color");
    assert_eq!(intent.level, BuildLevel::Property);
    assert_eq!(intent.action, ChangeAction::Fix);
    assert!(intent.matched_keywords.contains(&"memory".to_string()));

    let plan = vocabulary_analyzer().plan_intent(&intent).unwrap();
    assert_eq!(plan.level, BuildLevel::Property);
    assert_eq!(plan.action, ChangeAction::Fix);
    assert!(plan.hot_swappable);
    assert_eq!(plan.estimated_duration, Duration::from_secs(15));
    let affected: Vec<String> = plan.affected_components.iter().map(ToString::to_string).collect();
    assert_eq!(
        affected,
        vec![
            "systemHealth",
            "systemHealth.memory",
            "systemHealth.memory.display",
            "systemHealth.memory.display.bar",
            "systemHealth.memory.display.bar.color",
        ]
    );
    assert_eq!(plan.tests_to_run, affected);
    assert_eq!(
        plan.component,
        Some(ComponentId::new("systemHealth.memory.display.bar.color"))
    );
}

#[test]
fn test_vague_text_needs_clarification() {
    let parser = IntentParser::system_health().unwrap();
    for text in ["make it nicer", "", "   ", "fix the display"] {
        let intent = parser.parse(text);
        assert!(intent.requires_clarification(), "{:?}", text);
        assert!(vocabulary_analyzer().plan_intent(&intent).is_none());
    }
}

#[test]
fn test_synonyms_select_the_same_target() {
    let parser = IntentParser::system_health().unwrap();
    let a = parser.parse("repair the ram meter colour");
    let b = parser.parse("fix memory bar color");
    assert_eq!(a.target_path(), b.target_path());
    assert_eq!(a.action, b.action);
}

#[test]
fn test_deeper_targets_never_estimate_longer() {
    let analyzer = vocabulary_analyzer();
    let chain = [
        "systemHealth.memory",
        "systemHealth.memory.display",
        "systemHealth.memory.display.bar",
        "systemHealth.memory.display.bar.color",
    ];
    let plans: Vec<_> = chain
        .iter()
        .map(|p| analyzer.analyze(&path(p), ChangeAction::Update))
        .collect();
    for pair in plans.windows(2) {
        assert!(pair[1].estimated_duration <= pair[0].estimated_duration);
        assert!(pair[1].affected_components.len() > pair[0].affected_components.len());
        assert!(pair[1].level.granularity() <= pair[0].level.granularity());
    }
}

#[test]
fn test_non_swappable_ancestor_marks_plan() {
    let mut index = ComponentIndex::new();
    index.insert(&path("kernel"), IndexNode::default().with_hot_swappable(false));
    index.insert(&path("kernel.sched.policy"), IndexNode::default().with_files(["sched/policy.rs"]));
    let analyzer = ScopeAnalyzer::new(Arc::new(index), DurationTable::default());

    let plan = analyzer.analyze(&path("kernel.sched.policy"), ChangeAction::Fix);
    assert!(!plan.hot_swappable);
    assert_eq!(plan.files.len(), 1);
}

#[test]
fn test_dependents_join_the_affected_set() {
    let mut index = ComponentIndex::from_vocabulary(&Vocabulary::system_health());
    index.insert(
        &path("systemHealth.cpu.display"),
        IndexNode::default().with_depends_on(vec![path("systemHealth.memory.sampler")]),
    );
    let analyzer = ScopeAnalyzer::new(Arc::new(index), DurationTable::default());

    let plan = analyzer.analyze(&path("systemHealth.memory.sampler"), ChangeAction::Update);
    let affected: Vec<String> = plan.affected_components.iter().map(ToString::to_string).collect();
    assert!(affected.contains(&"systemHealth.cpu.display".to_string()));
    assert!(plan.tests_to_run.contains(&"systemHealth.cpu.display".to_string()));
}

#[test]
fn test_unindexed_target_yields_empty_plan() {
    let plan = vocabulary_analyzer().analyze(&path("systemHealth.gpu"), ChangeAction::Add);
    assert!(plan.is_empty());
    assert!(plan.tests_to_run.is_empty());
    assert_eq!(plan.estimated_duration, Duration::ZERO);
}
