// SPDX-License-Identifier: GPL-3.0-only

//! Keep-only-latest frame hand-off
//!
//! A depth-1 queue between the camera callback and the analysis loop. Pushing
//! into a full slot displaces the waiting frame, and the displaced frame is
//! released immediately. At most one frame is ever waiting for analysis.

use super::frame_handle::FrameHandle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, trace};

#[derive(Default)]
struct SlotState {
    frame: Option<FrameHandle>,
    closed: bool,
}

/// Single-consumer, overwrite-on-full frame slot
#[derive(Default)]
pub struct LatestFrameSlot {
    state: Mutex<SlotState>,
    notify: Notify,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl LatestFrameSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Offer a frame to the analysis loop
    ///
    /// Returns `false` if the slot is closed; the frame is released in that case.
    pub fn push(&self, frame: FrameHandle) -> bool {
        let displaced = {
            let mut state = self.lock();
            if state.closed {
                drop(state);
                frame.close();
                return false;
            }
            state.frame.replace(frame)
        };

        if let Some(old) = displaced {
            let count = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(sequence = old.sequence(), dropped = count, "Analyzer busy, dropping frame");
            old.close();
        }

        self.notify.notify_one();
        true
    }

    /// Wait for the next frame
    ///
    /// Returns `None` once the slot is closed.
    pub async fn recv(&self) -> Option<FrameHandle> {
        loop {
            {
                let mut state = self.lock();
                if let Some(frame) = state.frame.take() {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Take the waiting frame without blocking
    pub fn try_recv(&self) -> Option<FrameHandle> {
        let frame = self.lock().frame.take();
        if frame.is_some() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    /// Stop accepting frames and release anything still waiting
    pub fn close(&self) {
        let pending = {
            let mut state = self.lock();
            state.closed = true;
            state.frame.take()
        };
        if let Some(frame) = pending {
            frame.close();
        }
        debug!(
            delivered = self.delivered(),
            dropped = self.dropped(),
            "Frame slot closed"
        );
        self.notify.notify_one();
    }

    /// Frames handed to the consumer
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Frames displaced before the consumer got to them
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::SensorRotation;
    use crate::frame_processor::frame_handle::{FrameRelease, ReleaseCounter};

    fn frame(sequence: u64, counter: &Arc<ReleaseCounter>) -> FrameHandle {
        let releaser: Arc<dyn FrameRelease> = counter.clone();
        FrameHandle::new(None, SensorRotation::None, sequence, Some(releaser))
    }

    #[test]
    fn test_push_overwrites_and_releases_displaced() {
        let counter = ReleaseCounter::new();
        let slot = LatestFrameSlot::new();

        assert!(slot.push(frame(1, &counter)));
        assert!(slot.push(frame(2, &counter)));
        assert!(slot.push(frame(3, &counter)));

        assert_eq!(slot.dropped(), 2);
        assert_eq!(counter.released(), 2);

        let latest = slot.try_recv().unwrap();
        assert_eq!(latest.sequence(), 3);
        assert!(slot.try_recv().is_none());
    }

    #[test]
    fn test_push_after_close_releases_frame() {
        let counter = ReleaseCounter::new();
        let slot = LatestFrameSlot::new();
        slot.close();
        assert!(!slot.push(frame(1, &counter)));
        assert_eq!(counter.released(), 1);
    }

    #[test]
    fn test_close_releases_pending() {
        let counter = ReleaseCounter::new();
        let slot = LatestFrameSlot::new();
        slot.push(frame(1, &counter));
        slot.close();
        assert_eq!(counter.released(), 1);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let counter = ReleaseCounter::new();
        let slot = LatestFrameSlot::new();

        let consumer = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move { slot.recv().await.map(|f| f.sequence()) })
        };

        tokio::task::yield_now().await;
        slot.push(frame(7, &counter));

        assert_eq!(consumer.await.unwrap(), Some(7));
        assert_eq!(slot.delivered(), 1);
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_close() {
        let slot = LatestFrameSlot::new();
        let consumer = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move { slot.recv().await.is_none() })
        };
        tokio::task::yield_now().await;
        slot.close();
        assert!(consumer.await.unwrap());
    }
}
