// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct PoolError {
    context: &'static str,
    message: String,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.message)
    }
}

impl Error for PoolError {}

/// Bounded set of blocking render workers. Callers queue for a permit
/// instead of being turned away.
#[derive(Clone)]
pub struct RenderPool {
    permits: Arc<Semaphore>,
}

impl RenderPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<F, R>(&self, context: &'static str, task: F) -> Result<R, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| PoolError {
                context,
                message: format!("render pool closed: {}", err),
            })?;
        Self::spawn_with_permit(context, permit, task).await
    }

    async fn spawn_with_permit<F, R>(
        context: &'static str,
        permit: OwnedSemaphorePermit,
        task: F,
    ) -> Result<R, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        })
        .await
        .map_err(|err| PoolError {
            context,
            message: format!("render task failed: {}", err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_task_waits_for_a_permit() {
        let pool = RenderPool::new(1);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let (hold_tx, hold_rx) = std::sync::mpsc::channel::<()>();
        let pool_clone = pool.clone();

        let hold_task = tokio::spawn(async move {
            pool_clone
                .run("hold", move || {
                    let _ = ready_tx.send(());
                    let _ = hold_rx.recv();
                    1
                })
                .await
        });

        ready_rx.await.expect("ready signal");
        assert_eq!(pool.available(), 0);

        let second = tokio::spawn({
            let pool = pool.clone();
            async move { pool.run("second", || 2).await }
        });
        let _ = hold_tx.send(());

        assert_eq!(hold_task.await.expect("join").expect("first"), 1);
        assert_eq!(second.await.expect("join").expect("second"), 2);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn panicking_task_is_an_error() {
        let pool = RenderPool::new(1);
        let err = pool
            .run("boom", || -> () { panic!("boom") })
            .await
            .expect_err("panic surfaces");
        assert!(err.to_string().starts_with("boom:"));
        assert_eq!(pool.available(), 1);
    }
}
