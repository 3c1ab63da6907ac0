// src/tasks/mod.rs

use crossbeam_channel::{bounded, Receiver, TryRecvError};

/// Completion token for a closure running on the rayon pool.
///
/// The tick thread polls `is_completed` without ever blocking. Dropping
/// the handle abandons the worker: it keeps running but its result is
/// discarded when it tries to send into the closed channel.
pub struct TaskHandle<T> {
    rx: Receiver<T>,
    result: Option<T>,
    disconnected: bool,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        rayon::spawn(move || {
            // The receiver may be gone after a hard clear.
            let _ = tx.send(job());
        });
        Self {
            rx,
            result: None,
            disconnected: false,
        }
    }

    fn poll(&mut self) {
        if self.result.is_some() || self.disconnected {
            return;
        }
        match self.rx.try_recv() {
            Ok(value) => self.result = Some(value),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                log::error!("worker dropped its result channel without sending");
                self.disconnected = true;
            }
        }
    }

    pub fn is_completed(&mut self) -> bool {
        self.poll();
        self.result.is_some()
    }

    /// The worker result, once. Returns `None` until completed and after
    /// the result has been taken.
    pub fn take(&mut self) -> Option<T> {
        self.poll();
        self.result.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_task_completes_and_yields_once() {
        let mut handle = TaskHandle::spawn(|| 21 * 2);
        let mut waited = 0;
        while !handle.is_completed() && waited < 2000 {
            std::thread::sleep(Duration::from_millis(5));
            waited += 5;
        }
        assert_eq!(handle.take(), Some(42));
        assert_eq!(handle.take(), None);
    }

    #[test]
    fn test_pending_task_reports_incomplete() {
        let mut handle = TaskHandle::spawn(|| {
            std::thread::sleep(Duration::from_millis(200));
            1
        });
        // Polling immediately must not block on the worker.
        let polled_at = std::time::Instant::now();
        let _ = handle.is_completed();
        assert!(polled_at.elapsed() < Duration::from_millis(100));
    }
}
