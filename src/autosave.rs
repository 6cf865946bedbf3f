//! Periodic background save.
//!
//! A single thread calls [`CraftEngine::save`] every interval until the
//! handle is stopped or dropped. Saves of an unchanged state are no-ops, so
//! the rolling backup only moves when something actually changed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::engine::CraftEngine;

/// Handle to a running autosave thread.
pub struct AutosaveHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AutosaveHandle {
    /// Stop the thread, perform a last save, and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                tracing::warn!("autosave thread panicked");
            }
        }
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

/// Spawn the autosave thread for `engine`.
pub fn spawn_autosave(engine: &Arc<CraftEngine>, interval: Duration) -> AutosaveHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let engine = Arc::clone(engine);

    let thread = std::thread::Builder::new()
        .name("craft-autosave".into())
        .spawn(move || {
            tracing::debug!(interval_ms = interval.as_millis() as u64, "autosave started");
            while !flag.load(Ordering::Relaxed) {
                std::thread::park_timeout(interval);
                if let Err(e) = engine.save() {
                    tracing::warn!(error = %e, "autosave failed");
                }
            }
            tracing::debug!("autosave stopped");
        });

    let thread = match thread {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "could not spawn autosave thread");
            None
        }
    };

    AutosaveHandle { shutdown, thread }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::event::NullSink;

    #[test]
    fn stop_joins_the_thread() {
        let engine = Arc::new(CraftEngine::new(EngineConfig::default(), Arc::new(NullSink)).unwrap());
        let handle = spawn_autosave(&engine, Duration::from_millis(10));
        assert!(handle.is_running());
        engine.combine("Water", "Fire").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        handle.stop();
        assert!(engine.is_discovered("Steam"));
    }

    #[test]
    fn drop_stops_the_thread() {
        let engine = Arc::new(CraftEngine::new(EngineConfig::default(), Arc::new(NullSink)).unwrap());
        {
            let _handle = spawn_autosave(&engine, Duration::from_secs(60));
        }
        // The thread held the only other reference.
        assert_eq!(Arc::strong_count(&engine), 1);
    }
}
