//! Cooperative pause/resume/cancel observed at state transitions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// The job was cancelled while work was in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobInterrupted;

/// Shared flags for one job. Workers call [`JobControl::checkpoint`]
/// before every state transition: a pause blocks there until resumed,
/// a cancel surfaces as [`JobInterrupted`].
#[derive(Debug, Default)]
pub struct ControlFlags {
    paused: AtomicBool,
    cancelled: AtomicBool,
    resume: Notify,
}

impl ControlFlags {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume.notify_waiters();
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // Unblock workers parked on a pause so they can observe the cancel
        self.resume.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Worker-side view of the control flags.
#[derive(Clone)]
pub struct JobControl {
    flags: Arc<ControlFlags>,
}

impl JobControl {
    pub fn new(flags: Arc<ControlFlags>) -> Self {
        Self { flags }
    }

    /// Suspension point. Returns once the job is neither paused nor
    /// cancelled; a cancel wins over a pause.
    pub async fn checkpoint(&self) -> Result<(), JobInterrupted> {
        loop {
            if self.flags.is_cancelled() {
                return Err(JobInterrupted);
            }
            if !self.flags.is_paused() {
                return Ok(());
            }
            // Register for the wake-up before re-checking, so a resume
            // between the check and the await is not lost
            let notified = self.flags.resume.notified();
            if !self.flags.is_paused() || self.flags.is_cancelled() {
                continue;
            }
            notified.await;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_checkpoint_passes_when_running() {
        let control = JobControl::new(Arc::new(ControlFlags::default()));
        assert!(control.checkpoint().await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_interrupts() {
        let flags = Arc::new(ControlFlags::default());
        flags.cancel();
        let control = JobControl::new(flags);
        assert_eq!(control.checkpoint().await, Err(JobInterrupted));
    }

    #[tokio::test]
    async fn test_pause_blocks_until_resume() {
        let flags = Arc::new(ControlFlags::default());
        flags.pause();
        let control = JobControl::new(Arc::clone(&flags));

        let waiter = tokio::spawn(async move { control.checkpoint().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        flags.resume();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_unblocks_paused_worker() {
        let flags = Arc::new(ControlFlags::default());
        flags.pause();
        let control = JobControl::new(Arc::clone(&flags));

        let waiter = tokio::spawn(async move { control.checkpoint().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        flags.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(JobInterrupted));
    }
}
