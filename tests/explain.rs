//! Tests for the execution plan explanation.

use anyhow::Result;
use ironset::testing::*;
use ironset::*;

#[test]
fn test_explain_source_and_transforms() -> Result<()> {
    let env = TestEnvironment::with_parallelism(3)?;
    let data = env
        .from_elements(1..=5)
        .map(|x: &i32| x * 2)
        .filter(|x: &i32| *x > 4);

    let explanation = data.explain();
    let kinds: Vec<&str> = explanation.steps.iter().map(|s| s.kind.as_str()).collect();
    assert_eq!(kinds, vec!["Source", "Map", "Filter"]);
    assert_eq!(explanation.output_partitions(), 3);
    assert!(!explanation.object_reuse);

    println!("{explanation}");
    Ok(())
}

#[test]
fn test_explain_marks_broadcast_side() -> Result<()> {
    let env = TestEnvironment::with_parallelism(2)?;
    let outer = env.from_elements(1..=4).parallelism(4)?;
    let tiny = env.from_elements(vec!['a', 'b']).map(|c: &char| c.to_ascii_uppercase());

    let explanation = outer.cross(&tiny).explain();
    let cross = explanation.steps.last().expect("cross step");
    assert_eq!(cross.kind, "Cross");
    assert_eq!(cross.partitions, 4);
    assert_eq!(cross.depth, 0);

    let broadcast: Vec<&str> = explanation
        .steps
        .iter()
        .filter(|s| s.broadcast)
        .map(|s| s.kind.as_str())
        .collect();
    assert_eq!(broadcast, vec!["Source", "Map"]);
    assert!(explanation.steps.iter().filter(|s| s.kind == "Source").all(|s| s.depth == 1));

    let text = explanation.to_string();
    assert!(text.contains("[BROADCAST]"));
    assert!(text.contains("EXECUTION PLAN EXPLANATION"));
    Ok(())
}

#[test]
fn test_explain_cross_with_huge_broadcasts_first_operand() -> Result<()> {
    let env = TestEnvironment::with_parallelism(2)?;
    let small = env.from_elements(vec![1u8]);
    let big = env.from_elements(0..100u32).parallelism(6)?;

    let explanation = small.cross_with_huge(&big).explain();
    assert_eq!(explanation.output_partitions(), 6);
    let broadcast_sources: Vec<NodeId> = explanation
        .steps
        .iter()
        .filter(|s| s.broadcast)
        .map(|s| s.node)
        .collect();
    assert_eq!(broadcast_sources, vec![small.id()]);
    Ok(())
}

#[test]
fn test_explain_does_not_execute() -> Result<()> {
    let env = TestEnvironment::new();
    let data = env
        .from_elements(1..=3)
        .try_map(|_: &i32| -> Result<i32> { anyhow::bail!("must not run") });
    let explanation = data.explain();
    assert_eq!(explanation.count_kind("TryMap"), 1);
    assert!(env.last_job_result().is_none());
    Ok(())
}

#[test]
fn test_explain_reflects_object_reuse_and_rebalance() -> Result<()> {
    let env = TestEnvironment::with_parallelism(5)?.reusing_objects();
    let data = env.from_elements(1..=10).map(|x: &i32| *x).parallelism(2)?;
    let explanation = data.explain();
    assert!(explanation.object_reuse);
    assert_eq!(explanation.count_kind("Rebalance"), 1);
    assert_eq!(explanation.output_partitions(), 2);
    assert_eq!(explanation.default_parallelism, 5);
    Ok(())
}
