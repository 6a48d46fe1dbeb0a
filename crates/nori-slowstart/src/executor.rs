//! Submission of drain tasks.
//!
//! A drain is a blocking sequential read of the buffer file that runs to
//! completion on its own. Anything that can run one closure to completion
//! independently of the caller can host it.

use std::io;
use std::thread;

/// A unit of blocking work submitted by a queue.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync + 'static {
    fn execute(&self, task: Task) -> io::Result<()>;
}

/// Runs tasks on the tokio blocking pool of the runtime behind the handle.
impl Executor for tokio::runtime::Handle {
    fn execute(&self, task: Task) -> io::Result<()> {
        // The drain owns everything it needs; the join handle is not awaited.
        drop(self.spawn_blocking(task));
        Ok(())
    }
}

/// Runs every task on a freshly spawned, named OS thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) -> io::Result<()> {
        thread::Builder::new()
            .name("slowstart-drain".to_string())
            .spawn(task)
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_thread_executor_runs_task() {
        let (tx, rx) = mpsc::channel();
        ThreadExecutor
            .execute(Box::new(move || {
                tx.send(thread::current().name().map(str::to_string)).unwrap();
            }))
            .unwrap();

        assert_eq!(rx.recv().unwrap().as_deref(), Some("slowstart-drain"));
    }

    #[tokio::test]
    async fn test_tokio_handle_runs_task() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::runtime::Handle::current()
            .execute(Box::new(move || {
                let _ = tx.send(42);
            }))
            .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
    }
}
