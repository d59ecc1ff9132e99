use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use tracing::trace;

/// Something that named numeric values can be written into
///
/// Every write replaces the previous value of the gauge with the same name. Implementations must
/// be safe to write from the collection task while the exposition side reads concurrently.
pub trait GaugeSink: Send + Sync {
    fn set_gauge(&self, name: &str, value: f64);
}

impl<S> GaugeSink for Arc<S>
where
    S: GaugeSink + ?Sized,
{
    fn set_gauge(&self, name: &str, value: f64) {
        (**self).set_gauge(name, value)
    }
}

/// A [`GaugeSink`] that keeps the latest value of every gauge in memory
///
/// Used as the test double for the real metrics backend.
#[derive(Debug, Default)]
pub struct MemorySink {
    values: RwLock<BTreeMap<String, f64>>,
    writes: AtomicU64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest value written for `name`, if any
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// A copy of all gauges at this point in time
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Total number of [`GaugeSink::set_gauge`] calls so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl GaugeSink for MemorySink {
    fn set_gauge(&self, name: &str, value: f64) {
        trace!(%name, %value, "Setting gauge");
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}
