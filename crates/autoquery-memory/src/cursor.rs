use autoquery::{DataRow, Result};
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

/// Forward-only cursor over an in-memory result set.
///
/// Counts itself in `open` while alive, so callers can verify that abandoned
/// streams release their cursor.
pub struct Cursor {
    rows: Box<dyn Iterator<Item = DataRow> + Send>,
    open: Arc<AtomicUsize>,
    model: &'static str,
}

impl Cursor {
    pub fn new(
        model: &'static str,
        rows: impl Iterator<Item = DataRow> + Send + 'static,
        open: Arc<AtomicUsize>,
    ) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        debug!("Opened cursor over {}", model);
        Self {
            rows: Box::new(rows),
            open,
            model,
        }
    }
}

impl Stream for Cursor {
    type Item = Result<DataRow>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.rows.next().map(Ok))
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        debug!("Released cursor over {}", self.model);
    }
}
