use anyhow::{Result, bail};
use ironset::testing::*;
use std::io;
use std::sync::{Arc, Mutex};

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut b) = self.0.lock() {
            b.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (Captured, tracing::subscriber::DefaultGuard) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter("ironset=debug")
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (captured, tracing::subscriber::set_default(subscriber))
}

#[test]
fn actions_log_start_and_finish() -> Result<()> {
    let (logs, _guard) = capture_logs();
    let env = TestEnvironment::with_parallelism(2)?;
    let a = env.from_elements(1..=3);
    let b = env.from_elements(1..=2);
    assert_eq!(a.cross(&b).collect()?.len(), 6);

    let text = logs.text();
    assert!(text.contains("action started"), "{text}");
    assert!(text.contains("action finished"), "{text}");
    assert!(text.contains("action=collect"), "{text}");
    assert!(text.contains("elements=6"), "{text}");
    assert!(text.contains("materialized cross broadcast side"), "{text}");
    Ok(())
}

#[test]
fn failures_are_logged_as_warnings() -> Result<()> {
    let (logs, _guard) = capture_logs();
    let env = TestEnvironment::with_parallelism(2)?;
    let data = env
        .from_elements(1..=4)
        .try_map(|_: &i32| -> Result<i32> { bail!("disk on fire") });
    assert!(data.count().is_err());

    let text = logs.text();
    assert!(text.contains("WARN"), "{text}");
    assert!(text.contains("action failed"), "{text}");
    assert!(text.contains("disk on fire"), "{text}");
    Ok(())
}
