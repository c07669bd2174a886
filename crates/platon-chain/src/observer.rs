// SPDX-License-Identifier: MIT OR Apache-2.0
//! Optional process-global observer for metrics/tracing integrations that
//! live outside this crate.

use std::sync::{Arc, OnceLock, RwLock};

use platon_context::AuditEntry;

/// Observer invoked with a read-only view of every [`AuditEntry`] as it is
/// appended by [`crate::Chain::process_pre`]/`process_post`.
///
/// Implementations must be cheap and non-blocking: this runs inline on the
/// dispatch hot path. Install via [`set_observer`]; at most one observer is
/// active at a time, process-wide.
pub trait PipelineObserver: Send + Sync {
    /// Called once per audit entry, immediately after it is appended.
    fn on_audit_entry(&self, entry: &AuditEntry);
}

static OBSERVER: OnceLock<RwLock<Option<Arc<dyn PipelineObserver>>>> = OnceLock::new();

/// Install or clear the global pipeline observer.
///
/// Passing `Some(...)` installs the observer; passing `None` clears it.
pub fn set_observer(observer: Option<Arc<dyn PipelineObserver>>) {
    let cell = OBSERVER.get_or_init(|| RwLock::new(None));
    *cell.write().expect("observer lock poisoned") = observer;
}

pub(crate) fn notify(entry: &AuditEntry) {
    let Some(cell) = OBSERVER.get() else {
        return;
    };
    if let Some(observer) = cell.read().expect("observer lock poisoned").as_ref() {
        observer.on_audit_entry(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platon_context::Phase;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingObserver(Arc<AtomicUsize>);
    impl PipelineObserver for CountingObserver {
        fn on_audit_entry(&self, _entry: &AuditEntry) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    // Serialises tests in this module: the observer is a single process-global slot.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn installed_observer_receives_entries_then_clears() {
        let _guard = TEST_LOCK.lock().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        set_observer(Some(Arc::new(CountingObserver(count.clone()))));

        notify(&AuditEntry::new("h1", Phase::Pre, 1));
        notify(&AuditEntry::new("h2", Phase::Pre, 1));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        set_observer(None);
        notify(&AuditEntry::new("h3", Phase::Pre, 1));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
