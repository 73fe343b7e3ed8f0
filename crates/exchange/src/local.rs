//! In-process process group backed by threads.
//!
//! [`LocalGroup`] builds `size` communicators that share a set of
//! mailboxes, one per destination rank, each holding a FIFO queue per
//! source rank. Sends push onto the destination's queue and never block.
//! Receives wait on the destination's condvar until the queue for the
//! requested source is non-empty.
//!
//! When a communicator is dropped (its thread finished or panicked) it is
//! marked departed. A receive from a departed rank with nothing queued
//! fails with [`ExchangeError::Disconnected`] instead of hanging.

use std::collections::VecDeque;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex as ParkingMutex};
use tracing::error;

use crate::comm::Communicator;
use crate::error::{ExchangeError, Result};

/// Default limit on how long a receive waits.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(60);

struct Mailbox {
    /// Pending messages indexed by source rank
    queues: ParkingMutex<Vec<VecDeque<Vec<u8>>>>,
    ready: Condvar,
}

struct Shared {
    mailboxes: Vec<Mailbox>,
    departed: Vec<AtomicBool>,
}

impl Shared {
    fn new(size: usize) -> Self {
        Shared {
            mailboxes: (0..size)
                .map(|_| Mailbox {
                    queues: ParkingMutex::new(vec![VecDeque::new(); size]),
                    ready: Condvar::new(),
                })
                .collect(),
            departed: (0..size).map(|_| AtomicBool::new(false)).collect(),
        }
    }
}

/// One member of a [`LocalGroup`]
pub struct LocalComm {
    rank: usize,
    shared: Arc<Shared>,
    timeout: Duration,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.shared.mailboxes.len())
            .finish()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    fn send_bytes(&self, dest: usize, data: Vec<u8>) -> Result<()> {
        let mailbox = self
            .shared
            .mailboxes
            .get(dest)
            .ok_or(ExchangeError::InvalidRank {
                rank: dest as i64,
                size: self.size(),
            })?;
        let mut queues = mailbox.queues.lock();
        queues[self.rank].push_back(data);
        mailbox.ready.notify_all();
        Ok(())
    }

    fn recv_bytes(&self, src: usize) -> Result<Vec<u8>> {
        let size = self.size();
        if src >= size {
            return Err(ExchangeError::InvalidRank {
                rank: src as i64,
                size,
            });
        }
        let mailbox = &self.shared.mailboxes[self.rank];
        let deadline = Instant::now() + self.timeout;
        let mut queues = mailbox.queues.lock();
        loop {
            if let Some(msg) = queues[src].pop_front() {
                return Ok(msg);
            }
            if self.shared.departed[src].load(AtomicOrdering::Acquire) {
                return Err(ExchangeError::Disconnected { peer: src });
            }
            if mailbox.ready.wait_until(&mut queues, deadline).timed_out() {
                if let Some(msg) = queues[src].pop_front() {
                    return Ok(msg);
                }
                error!(target: "kvtree::exchange", rank = self.rank, src, "Receive timed out");
                return Err(ExchangeError::Timeout { peer: src });
            }
        }
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        self.shared.departed[self.rank].store(true, AtomicOrdering::Release);
        // Lock each mailbox before notifying so a receiver between its
        // departed check and its wait cannot miss the wakeup.
        for mailbox in &self.shared.mailboxes {
            let _queues = mailbox.queues.lock();
            mailbox.ready.notify_all();
        }
    }
}

/// A fixed-size group of in-process communicators
pub struct LocalGroup {
    comms: Vec<LocalComm>,
}

impl LocalGroup {
    /// Create a group of `size` members.
    pub fn new(size: usize) -> Self {
        let shared = Arc::new(Shared::new(size));
        LocalGroup {
            comms: (0..size)
                .map(|rank| LocalComm {
                    rank,
                    shared: Arc::clone(&shared),
                    timeout: DEFAULT_RECV_TIMEOUT,
                })
                .collect(),
        }
    }

    /// Set how long a receive waits before failing (builder pattern).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        for comm in &mut self.comms {
            comm.timeout = timeout;
        }
        self
    }

    /// Number of members.
    pub fn size(&self) -> usize {
        self.comms.len()
    }

    /// Hand out the communicators, ordered by rank.
    pub fn into_comms(self) -> Vec<LocalComm> {
        self.comms
    }

    /// Run `f` once per member, each on its own thread, and collect the
    /// results in rank order.
    ///
    /// A panic on any member is re-raised on the caller after all threads
    /// have finished.
    pub fn spawn<F, R>(self, f: F) -> Vec<R>
    where
        F: Fn(&LocalComm) -> R + Sync,
        R: Send,
    {
        let f = &f;
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .comms
                .into_iter()
                .map(|comm| scope.spawn(move || f(&comm)))
                .collect();

            let mut results = Vec::with_capacity(handles.len());
            let mut first_panic = None;
            for handle in handles {
                match handle.join() {
                    Ok(r) => results.push(r),
                    Err(payload) => {
                        first_panic.get_or_insert(payload);
                    }
                }
            }
            if let Some(payload) = first_panic {
                panic::resume_unwind(payload);
            }
            results
        })
    }

    /// Shorthand for `LocalGroup::new(size).spawn(f)`.
    pub fn run<F, R>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(&LocalComm) -> R + Sync,
        R: Send,
    {
        LocalGroup::new(size).spawn(f)
    }
}
