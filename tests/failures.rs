use anyhow::{Result, anyhow, bail};
use ironset::testing::*;
use ironset::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn zero_or_negative_parallelism_is_a_configuration_error() {
    let env = ExecutionEnvironment::new();
    let data = env.from_elements(1..=10);

    assert!(matches!(data.clone().parallelism(0), Err(DatasetError::Configuration(_))));
    assert!(matches!(data.clone().parallelism(-1), Err(DatasetError::Configuration(_))));
    assert!(matches!(env.set_parallelism(0), Err(DatasetError::Configuration(_))));
    assert!(matches!(env.set_parallelism(-5i64), Err(DatasetError::Configuration(_))));
    assert!(env.last_job_result().is_none(), "nothing ran");
}

#[test]
fn configuration_error_is_raised_before_any_task_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let env = ExecutionEnvironment::new();
    let counted = {
        let calls = Arc::clone(&calls);
        env.from_elements(1..=4).map(move |x: &i32| {
            calls.fetch_add(1, Ordering::SeqCst);
            *x
        })
    };
    assert!(counted.parallelism(0).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failing_partition_aborts_collect() -> Result<()> {
    let env = TestEnvironment::with_parallelism(5)?;
    let data = env.from_elements(1..=10).try_map(|x: &i32| {
        if *x == 7 {
            bail!("bad element {x}");
        }
        Ok(*x)
    });

    let err = data.collect().unwrap_err();
    match err {
        DatasetError::PartitionExecution { partition, source } => {
            // 10 elements over 5 partitions: 7 lands in partition 3.
            assert_eq!(partition, 3);
            assert!(source.to_string().contains("bad element 7"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(env.last_job_result().is_none(), "failed actions record no job");
    Ok(())
}

#[test]
fn failing_partition_aborts_count() -> Result<()> {
    let env = TestEnvironment::with_parallelism(4)?;
    let data = env
        .from_elements(0..40)
        .try_map(|x: &i32| if *x % 13 == 12 { Err(anyhow!("boom")) } else { Ok(*x) });
    assert!(matches!(data.count(), Err(DatasetError::PartitionExecution { .. })));
    Ok(())
}

#[test]
fn only_one_error_surfaces_when_every_partition_fails() -> Result<()> {
    let env = TestEnvironment::with_parallelism(8)?;
    let data = env
        .from_elements(0..64)
        .try_map(|x: &i32| -> Result<i32> { bail!("element {x} rejected") });

    let err = data.collect().unwrap_err();
    let DatasetError::PartitionExecution { partition, source } = err else {
        panic!("expected a partition failure");
    };
    assert!(partition < 8);
    assert!(source.to_string().contains("rejected"));
    Ok(())
}

#[test]
fn failure_inside_cross_function_aborts_the_action() -> Result<()> {
    let env = TestEnvironment::with_parallelism(3)?;
    let a = env.from_elements(1..=6);
    let b = env.from_elements(1..=6);
    let quotients = a.cross_with(&b, |x, y| {
        if *y == 4 && *x == 5 {
            bail!("refusing {x}/{y}");
        }
        Ok(x / y)
    });
    assert!(matches!(
        quotients.collect(),
        Err(DatasetError::PartitionExecution { .. })
    ));
    Ok(())
}

#[test]
fn failure_on_broadcast_side_aborts_the_cross() -> Result<()> {
    let env = TestEnvironment::with_parallelism(2)?;
    let a = env.from_elements(1..=3);
    let b = env
        .from_elements(1..=3)
        .try_map(|x: &i32| -> Result<i32> { bail!("broadcast {x} unavailable") });
    let err = a.cross(&b).count().unwrap_err();
    assert!(err.to_string().contains("unavailable"), "{err}");
    Ok(())
}

#[test]
fn panicking_user_code_becomes_partition_error() -> Result<()> {
    let env = TestEnvironment::with_parallelism(2)?;
    let data = env.from_elements(1..=4).map(|x: &i32| {
        assert!(*x != 3, "three is not allowed");
        *x
    });
    let err = data.collect().unwrap_err();
    assert!(matches!(err, DatasetError::PartitionExecution { partition: 1, .. }));
    assert!(err.to_string().contains("three is not allowed"));
    Ok(())
}

#[test]
fn collect_limit_raises_result_too_large() -> Result<()> {
    let env = TestEnvironment::with_parallelism(4)?;
    env.set_max_collect_elements(Some(50));
    let a = env.from_elements(1..=10);
    let b = env.from_elements(1..=10);

    // count() is not bounded by the collect limit.
    assert_eq!(a.cross(&b).count()?, 100);
    let err = a.cross(&b).collect().unwrap_err();
    assert!(matches!(err, DatasetError::ResultTooLarge { limit: 50, .. }), "{err}");

    env.set_max_collect_elements(Some(100));
    assert_collection_size(&a.cross(&b).collect()?, 100);
    Ok(())
}

#[test]
fn datasets_stay_usable_after_a_failed_action() -> Result<()> {
    let env = TestEnvironment::with_parallelism(2)?;
    let data = env.from_elements(1..=6);
    let broken = data.clone().try_map(|_: &i32| -> Result<i32> { bail!("nope") });
    assert!(broken.count().is_err());
    assert_eq!(data.count()?, 6);
    Ok(())
}
