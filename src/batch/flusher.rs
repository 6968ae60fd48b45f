//! Background flusher shared by all batching sinks
//!
//! One thread per sink, alive for the sink's lifetime, multiplexing three
//! sources: incoming items, the periodic flush timer, and the shutdown
//! signal. The pending batch is owned exclusively by this thread, so no
//! lock guards it, and at most one flush is ever in progress per sink.

use crate::core::error::{LoggerError, Result};
use crate::core::metrics::SinkMetrics;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Delivery seam between the flusher and a concrete sink.
///
/// `deliver` sends one encoded batch to the remote endpoint. `redirect`
/// receives the whole batch after a failed delivery; implementations must
/// route it to the synchronous local path only, never back onto this or
/// any other network sink's queue.
pub trait BatchSink: Send + 'static {
    type Item: Send + 'static;

    fn name(&self) -> &str;

    fn deliver(&mut self, batch: &[Self::Item]) -> Result<()>;

    fn redirect(&mut self, batch: Vec<Self::Item>, error: &LoggerError);
}

/// Handle to a running flusher thread
///
/// Dropping the handle without calling [`FlusherHandle::shutdown`] still
/// signals the thread and waits up to the default shutdown timeout.
pub struct FlusherHandle {
    name: String,
    shutdown: Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FlusherHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the flusher to perform one final flush and exit, waiting up to
    /// `timeout` for the thread to finish.
    ///
    /// Returns `true` if the thread exited cleanly within the timeout.
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        self.signal_and_join(timeout)
    }

    fn signal_and_join(&mut self, timeout: Duration) -> bool {
        let _ = self.shutdown.try_send(());

        let Some(handle) = self.thread.take() else {
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    eprintln!(
                        "[FANLOG ERROR] {} flusher thread panicked during shutdown",
                        self.name
                    );
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[FANLOG WARNING] {} flusher did not finish within {:?}. \
                     Remaining events may be lost.",
                    self.name, timeout
                );
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for FlusherHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.signal_and_join(crate::core::dispatcher::DEFAULT_SHUTDOWN_TIMEOUT);
        }
    }
}

pub struct Flusher;

impl Flusher {
    /// Spawn the background thread for one sink.
    ///
    /// The loop accumulates items, flushes the pending batch on every timer
    /// tick, and on shutdown drains whatever already reached the channel
    /// before one final flush. Items arriving after the thread exits see a
    /// disconnected channel at the producer side.
    pub fn spawn<S: BatchSink>(
        mut sink: S,
        items: Receiver<S::Item>,
        batch_wait: Duration,
        metrics: Arc<SinkMetrics>,
    ) -> FlusherHandle {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let name = sink.name().to_string();

        let thread = thread::spawn(move || {
            let ticker = tick(batch_wait);
            let mut pending: Vec<S::Item> = Vec::new();

            loop {
                select! {
                    recv(items) -> msg => match msg {
                        Ok(item) => pending.push(item),
                        Err(_) => {
                            // All producers gone; flush what is left and stop
                            Self::flush(&mut sink, &mut pending, &metrics);
                            break;
                        }
                    },
                    recv(ticker) -> _ => {
                        Self::flush(&mut sink, &mut pending, &metrics);
                    },
                    recv(shutdown_rx) -> _ => {
                        while let Ok(item) = items.try_recv() {
                            pending.push(item);
                        }
                        Self::flush(&mut sink, &mut pending, &metrics);
                        break;
                    },
                }
            }
        });

        FlusherHandle {
            name,
            shutdown: shutdown_tx,
            thread: Some(thread),
        }
    }

    fn flush<S: BatchSink>(sink: &mut S, pending: &mut Vec<S::Item>, metrics: &SinkMetrics) {
        if pending.is_empty() {
            return;
        }

        // Snapshot-and-clear: the accumulator is empty from this point on,
        // whatever the send outcome. A failed batch goes to the fallback
        // path, never back into the accumulator.
        let batch = std::mem::take(pending);

        match sink.deliver(&batch) {
            Ok(()) => {
                metrics.record_batch_sent();
            }
            Err(error) => {
                metrics.record_batch_failed();
                sink.redirect(batch, &error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::queue::{EventQueue, OverflowPolicy};
    use parking_lot::Mutex;

    /// Test sink recording every delivered batch and every redirect
    struct RecordingSink {
        delivered: Arc<Mutex<Vec<Vec<u32>>>>,
        redirected: Arc<Mutex<Vec<Vec<u32>>>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new() -> (Self, Arc<Mutex<Vec<Vec<u32>>>>, Arc<Mutex<Vec<Vec<u32>>>>) {
            let delivered = Arc::new(Mutex::new(Vec::new()));
            let redirected = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    delivered: Arc::clone(&delivered),
                    redirected: Arc::clone(&redirected),
                    fail: false,
                },
                delivered,
                redirected,
            )
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    impl BatchSink for RecordingSink {
        type Item = u32;

        fn name(&self) -> &str {
            "recording"
        }

        fn deliver(&mut self, batch: &[u32]) -> Result<()> {
            if self.fail {
                return Err(LoggerError::delivery("test", "simulated failure"));
            }
            self.delivered.lock().push(batch.to_vec());
            Ok(())
        }

        fn redirect(&mut self, batch: Vec<u32>, _error: &LoggerError) {
            self.redirected.lock().push(batch);
        }
    }

    fn spawn_with_queue(
        sink: RecordingSink,
        batch_wait: Duration,
    ) -> (EventQueue<u32>, FlusherHandle, Arc<SinkMetrics>) {
        let metrics = Arc::new(SinkMetrics::new());
        let (queue, receiver) =
            EventQueue::bounded("recording", 64, OverflowPolicy::DropNewest, Arc::clone(&metrics));
        let handle = Flusher::spawn(sink, receiver, batch_wait, Arc::clone(&metrics));
        (queue, handle, metrics)
    }

    #[test]
    fn test_tick_flushes_batch_in_arrival_order() {
        let (sink, delivered, _) = RecordingSink::new();
        let (queue, handle, metrics) = spawn_with_queue(sink, Duration::from_millis(50));

        for i in 0..5 {
            queue.enqueue(i);
        }

        thread::sleep(Duration::from_millis(150));

        {
            let batches = delivered.lock();
            assert_eq!(batches.len(), 1, "one non-empty tick, one flush");
            assert_eq!(batches[0], vec![0, 1, 2, 3, 4]);
        }
        assert_eq!(metrics.batches_sent(), 1);

        assert!(handle.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_empty_ticks_do_not_flush() {
        let (sink, delivered, _) = RecordingSink::new();
        let (_queue, handle, metrics) = spawn_with_queue(sink, Duration::from_millis(20));

        thread::sleep(Duration::from_millis(120));

        assert!(delivered.lock().is_empty());
        assert_eq!(metrics.batches_sent(), 0);

        assert!(handle.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_each_tick_flushes_at_most_once() {
        let (sink, delivered, _) = RecordingSink::new();
        let (queue, handle, _) = spawn_with_queue(sink, Duration::from_millis(60));

        queue.enqueue(1);
        thread::sleep(Duration::from_millis(90));
        queue.enqueue(2);
        queue.enqueue(3);
        thread::sleep(Duration::from_millis(90));

        {
            let batches = delivered.lock();
            assert_eq!(batches.len(), 2);
            assert_eq!(batches[0], vec![1]);
            assert_eq!(batches[1], vec![2, 3]);
        }

        assert!(handle.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_failed_delivery_redirects_whole_batch_once() {
        let (sink, delivered, redirected) = RecordingSink::new();
        let (queue, handle, metrics) = spawn_with_queue(sink.failing(), Duration::from_millis(50));

        queue.enqueue(7);
        queue.enqueue(8);

        // Wait across several ticks: the failed batch must not be retried
        // from the accumulator.
        thread::sleep(Duration::from_millis(220));

        assert!(delivered.lock().is_empty());
        {
            let batches = redirected.lock();
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0], vec![7, 8]);
        }
        assert_eq!(metrics.batches_failed(), 1);

        assert!(handle.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_shutdown_drains_and_flushes_pending() {
        let (sink, delivered, _) = RecordingSink::new();
        // Long batch wait: only the shutdown path can flush
        let (queue, handle, _) = spawn_with_queue(sink, Duration::from_secs(60));

        for i in 0..3 {
            queue.enqueue(i);
        }

        assert!(handle.shutdown(Duration::from_secs(1)));

        let batches = delivered.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![0, 1, 2]);
    }

    #[test]
    fn test_events_after_shutdown_are_rejected() {
        let (sink, delivered, _) = RecordingSink::new();
        let (queue, handle, metrics) = spawn_with_queue(sink, Duration::from_millis(50));

        queue.enqueue(1);
        assert!(handle.shutdown(Duration::from_secs(1)));

        queue.enqueue(2);
        queue.enqueue(3);

        let batches = delivered.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![1]);
        assert_eq!(metrics.dropped_count(), 2);
    }
}
