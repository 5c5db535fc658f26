//! Failure isolation for units of work.
//!
//! Every per-page, per-field and per-region step of the pipeline runs through
//! [`attempt`]: an error or a panic is logged, recorded as a [`Diagnostic`]
//! and turned into `None` so the caller can substitute its empty result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::error::{Error, Result};
use crate::model::{Diagnostic, Stage};

/// Run `f`, degrading errors and panics into a diagnostic.
pub(crate) fn attempt<T, F>(
    stage: Stage,
    page: Option<u32>,
    diagnostics: &mut Vec<Diagnostic>,
    f: F,
) -> Option<T>
where
    F: FnOnce() -> Result<T>,
{
    let message = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(err)) => err.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    match page {
        Some(page_no) => log::warn!("{:?} failed on page {}: {}", stage, page_no, message),
        None => log::warn!("{:?} failed: {}", stage, message),
    }
    diagnostics.push(Diagnostic::new(stage, page, message));
    None
}

/// Run `f` on a helper thread and give up after `timeout`.
///
/// With no timeout the work runs inline. A timed-out helper is abandoned;
/// its eventual result is dropped with the channel.
pub fn with_timeout<T, F>(timeout: Option<Duration>, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let Some(limit) = timeout else {
        return f();
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::Builder::new()
        .name("pdfsig-bounded".to_string())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f));
            let _ = tx.send(outcome);
        })?;

    match rx.recv_timeout(limit) {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(Error::Other(format!(
            "worker panicked: {}",
            panic_message(payload.as_ref())
        ))),
        Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(limit)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(Error::Other("worker exited without a result".to_string()))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_passes_value_through() {
        let mut diags = Vec::new();
        let value = attempt(Stage::Tables, Some(1), &mut diags, || Ok(7));
        assert_eq!(value, Some(7));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_attempt_records_error() {
        let mut diags = Vec::new();
        let value: Option<u8> = attempt(Stage::Ocr, Some(3), &mut diags, || {
            Err(Error::Ocr("engine missing".into()))
        });
        assert!(value.is_none());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].stage, Stage::Ocr);
        assert_eq!(diags[0].page, Some(3));
        assert!(diags[0].message.contains("engine missing"));
    }

    #[test]
    fn test_attempt_contains_panic() {
        let mut diags = Vec::new();
        let value: Option<()> = attempt(Stage::Signatures, None, &mut diags, || {
            panic!("bad field object")
        });
        assert!(value.is_none());
        assert!(diags[0].message.contains("bad field object"));
    }

    #[test]
    fn test_with_timeout_inline() {
        assert_eq!(with_timeout(None, || Ok(1)).unwrap(), 1);
    }

    #[test]
    fn test_with_timeout_finishes_in_time() {
        let value = with_timeout(Some(Duration::from_secs(5)), || Ok("done")).unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout(Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[test]
    fn test_with_timeout_reports_worker_panic() {
        let result: Result<()> =
            with_timeout(Some(Duration::from_secs(5)), || panic!("boom"));
        match result {
            Err(Error::Other(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
