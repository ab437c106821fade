// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::web::Bytes;
use futures_util::future::poll_fn;
use futures_util::task::AtomicWaker;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const FAILED: u8 = 2;

/// What the producer has done by the time the consumer first looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStart {
    /// Output is available or the walk completed; the response can be committed.
    Ready,
    /// The walk failed before the response was committed.
    Failed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Fragment {
    Data(Bytes),
    End,
    Failed,
}

/// Single-producer, single-consumer FIFO between a render task and the
/// response body.
///
/// The producer pushes fragments and then calls [`finish`](Self::finish) or
/// [`fail`](Self::fail) exactly once. The consumer parks on an [`AtomicWaker`]
/// while the queue is empty and is woken by every push and by completion.
pub struct FragmentQueue {
    fragments: Mutex<VecDeque<Bytes>>,
    state: AtomicU8,
    closed: AtomicBool,
    waker: AtomicWaker,
}

impl Default for FragmentQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentQueue {
    pub fn new() -> Self {
        Self {
            fragments: Mutex::new(VecDeque::new()),
            state: AtomicU8::new(RUNNING),
            closed: AtomicBool::new(false),
            waker: AtomicWaker::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Bytes>> {
        match self.fragments.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns `false` once the consumer has gone away.
    pub fn push(&self, fragment: Bytes) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.lock().push_back(fragment);
        self.waker.wake();
        true
    }

    pub fn finish(&self) {
        self.complete(FINISHED);
    }

    pub fn fail(&self) {
        self.complete(FAILED);
    }

    fn complete(&self, outcome: u8) {
        if self
            .state
            .compare_exchange(RUNNING, outcome, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.waker.wake();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.load(Ordering::Acquire) != RUNNING
    }

    /// Called by the consumer when it stops reading; later pushes are refused.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.lock().clear();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn poll_fragment(&self, cx: &mut Context<'_>) -> Poll<Fragment> {
        self.waker.register(cx.waker());
        // Read the state before popping: a completed state observed here
        // guarantees every fragment pushed before completion is visible.
        let state = self.state.load(Ordering::Acquire);
        if let Some(fragment) = self.lock().pop_front() {
            return Poll::Ready(Fragment::Data(fragment));
        }
        match state {
            RUNNING => Poll::Pending,
            FINISHED => Poll::Ready(Fragment::End),
            _ => Poll::Ready(Fragment::Failed),
        }
    }

    pub fn poll_start(&self, cx: &mut Context<'_>) -> Poll<StreamStart> {
        self.waker.register(cx.waker());
        match self.state.load(Ordering::Acquire) {
            FAILED => Poll::Ready(StreamStart::Failed),
            FINISHED => Poll::Ready(StreamStart::Ready),
            _ if !self.lock().is_empty() => Poll::Ready(StreamStart::Ready),
            _ => Poll::Pending,
        }
    }

    /// Waits for the first fragment or for completion, whichever comes first.
    pub async fn started(&self) -> StreamStart {
        poll_fn(|cx| self.poll_start(cx)).await
    }

    #[cfg(test)]
    async fn next_fragment(&self) -> Fragment {
        poll_fn(|cx| self.poll_fragment(cx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fragments_arrive_in_push_order() {
        let queue = Arc::new(FragmentQueue::new());
        let producer = queue.clone();
        let handle = std::thread::spawn(move || {
            for part in ["F1", "F2", "F3"] {
                std::thread::sleep(Duration::from_millis(5));
                assert!(producer.push(Bytes::from_static(part.as_bytes())));
            }
            producer.finish();
        });

        assert_eq!(queue.started().await, StreamStart::Ready);
        let mut collected = Vec::new();
        loop {
            match queue.next_fragment().await {
                Fragment::Data(bytes) => collected.extend_from_slice(&bytes),
                Fragment::End => break,
                Fragment::Failed => panic!("unexpected failure"),
            }
        }
        handle.join().expect("producer");
        assert_eq!(collected, b"F1F2F3");
    }

    #[tokio::test]
    async fn failure_before_output_is_reported_at_start() {
        let queue = FragmentQueue::new();
        queue.fail();
        assert_eq!(queue.started().await, StreamStart::Failed);
        assert_eq!(queue.next_fragment().await, Fragment::Failed);
    }

    #[tokio::test]
    async fn completion_is_sticky() {
        let queue = FragmentQueue::new();
        queue.finish();
        queue.fail();
        assert_eq!(queue.started().await, StreamStart::Ready);
        assert_eq!(queue.next_fragment().await, Fragment::End);
    }

    #[test]
    fn closed_queue_refuses_fragments() {
        let queue = FragmentQueue::new();
        assert!(queue.push(Bytes::from_static(b"a")));
        queue.close();
        assert!(queue.is_closed());
        assert!(!queue.push(Bytes::from_static(b"b")));
    }
}
