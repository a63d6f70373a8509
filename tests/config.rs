use anyhow::Result;
use ironset::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn environment_from_json_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("ironset.json");
    fs::write(
        &path,
        r#"{
            "parallelism": 5,
            "object_reuse": false,
            "max_collect_elements": 1000
        }"#,
    )?;

    let env = ExecutionEnvironment::with_config(ExecutionConfig::from_json_file(&path)?)?;
    assert_eq!(env.parallelism(), 5);
    assert!(!env.is_object_reuse_enabled());
    assert_eq!(env.config().max_collect_elements, Some(1000));
    assert_eq!(env.config().worker_threads, None);

    let data = env.from_elements(1..=10);
    assert_eq!(data.count()?, 10);
    assert_eq!(env.last_job_result().map(|j| j.partitions), Some(5));
    Ok(())
}

#[test]
fn config_round_trips_through_json() -> Result<()> {
    let cfg = ExecutionConfig::default()
        .with_parallelism(3)?
        .with_object_reuse(true)
        .with_worker_threads(Some(2));
    let text = serde_json::to_string(&cfg)?;
    assert_eq!(ExecutionConfig::from_json_str(&text)?, cfg);
    Ok(())
}

#[test]
fn invalid_json_configs_are_rejected() {
    for bad in [
        r#"{ "parallelism": 0 }"#,
        r#"{ "worker_threads": 0 }"#,
        r#"{ "paralelism": 4 }"#,
        r#"{ "parallelism": -2 }"#,
        "not json",
    ] {
        assert!(
            matches!(ExecutionConfig::from_json_str(bad), Err(DatasetError::Configuration(_))),
            "accepted {bad}"
        );
    }
}

#[test]
fn missing_config_file_is_a_configuration_error() -> Result<()> {
    let dir = tempdir()?;
    let err = ExecutionConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, DatasetError::Configuration(_)));
    Ok(())
}

#[test]
fn set_config_swaps_settings_for_later_actions() -> Result<()> {
    let env = ExecutionEnvironment::new();
    let data = env.from_elements(vec![1, 2, 3]);
    env.set_config(ExecutionConfig::default().with_parallelism(2)?)?;
    data.collect()?;
    assert_eq!(env.last_job_result().map(|j| j.partitions), Some(2));

    let invalid = ExecutionConfig {
        parallelism: 0,
        ..ExecutionConfig::default()
    };
    assert!(env.set_config(invalid).is_err());
    assert_eq!(env.parallelism(), 2);
    Ok(())
}
