use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Periodic tick source for the elapsed-duration counter.
///
/// Ticks are pushed onto the provided channel; consumers decide what a tick
/// means. `stop` is idempotent and safe when the timer is not running. No
/// drift correction: "approximately periodic" is all observers need, since
/// only full-second increments are visible.
pub struct SessionTimer {
    task: Option<JoinHandle<()>>,
}

impl SessionTimer {
    /// Start ticking every `period` into `tx`.
    pub fn start(period: Duration, tx: mpsc::UnboundedSender<()>) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(()).is_err() {
                    break;
                }
            }
        });

        Self { task: Some(task) }
    }

    /// Halt tick delivery. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
