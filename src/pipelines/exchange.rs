// SPDX-License-Identifier: GPL-3.0-only

//! Hand-off of processed frames from the capture context to the render context
//!
//! The capture side owns a spare [`ProcessedFrame`] and writes into it; on
//! publish the spare takes the place of the published frame and the previous
//! one goes back to the capture side for reuse. Readers only ever see a
//! complete frame behind an `Arc`, never a buffer that is being written.
//!
//! Admission is a single atomic flag: while one frame is being converted and
//! transformed, further raw frames are turned away.

use crate::media::buffers::{ProcessedFrame, Snapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Marks a frame as in flight; releases the marker on drop
#[must_use = "dropping the guard ends admission immediately"]
pub struct AdmissionGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Most recent publication as seen by the render path
#[derive(Debug, Clone)]
pub struct LatestFrame {
    pub frame: Arc<ProcessedFrame>,
    /// The texture must be reallocated before this frame is uploaded
    pub reinitialize: bool,
}

#[derive(Default)]
struct Slot {
    frame: Option<Arc<ProcessedFrame>>,
    reinitialize: bool,
}

/// Shared state between the capture and render contexts
#[derive(Default)]
pub struct FrameExchange {
    in_flight: AtomicBool,
    slot: Mutex<Slot>,
}

impl FrameExchange {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Try to mark a frame as in flight. `None` means one already is and the
    /// caller must drop its frame.
    pub fn try_admit(&self) -> Option<AdmissionGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AdmissionGuard {
                flag: &self.in_flight,
            })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Publish `frame`.
    ///
    /// On success returns the previously published frame (if any) so the
    /// caller can reuse its storage. A frame from an older epoch, or not
    /// newer than what is already published in the same epoch, is refused
    /// and handed back in `Err`.
    pub fn publish(
        &self,
        frame: Arc<ProcessedFrame>,
    ) -> Result<Option<Arc<ProcessedFrame>>, Arc<ProcessedFrame>> {
        let mut slot = self.slot();

        if let Some(current) = slot.frame.as_ref() {
            let superseded = frame.epoch < current.epoch
                || (frame.epoch == current.epoch && frame.sequence <= current.sequence);
            if superseded {
                return Err(frame);
            }
            if frame.epoch != current.epoch || frame.resolution() != current.resolution() {
                slot.reinitialize = true;
            }
        } else {
            slot.reinitialize = true;
        }

        Ok(slot.frame.replace(frame))
    }

    /// Latest publication for the render path, consuming the reinitialize mark
    pub fn latest(&self) -> Option<LatestFrame> {
        let mut slot = self.slot();
        let frame = Arc::clone(slot.frame.as_ref()?);
        let reinitialize = std::mem::take(&mut slot.reinitialize);
        Some(LatestFrame {
            frame,
            reinitialize,
        })
    }

    /// Copy of the latest published frame, or `None` before the first one.
    ///
    /// Only the `Arc` clone happens under the lock.
    pub fn snapshot(&self) -> Option<Snapshot> {
        let frame = self.slot().frame.clone()?;
        Some(Snapshot::from_frame(&frame))
    }

    /// Forget the published frame (used when a session ends)
    pub fn clear(&self) {
        let mut slot = self.slot();
        slot.frame = None;
        slot.reinitialize = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::Resolution;

    fn frame(res: Resolution, epoch: u64, sequence: u64, fill: u8) -> Arc<ProcessedFrame> {
        let mut f = ProcessedFrame::new(res, epoch);
        f.sequence = sequence;
        f.rgba.fill(fill);
        Arc::new(f)
    }

    const R1: Resolution = Resolution::new(4, 2);
    const R2: Resolution = Resolution::new(2, 2);

    #[test]
    fn test_single_admission() {
        let exchange = FrameExchange::new();
        let guard = exchange.try_admit();
        assert!(guard.is_some());
        assert!(exchange.is_busy());
        assert!(exchange.try_admit().is_none());
        drop(guard);
        assert!(!exchange.is_busy());
        assert!(exchange.try_admit().is_some());
    }

    #[test]
    fn test_publish_returns_previous() {
        let exchange = FrameExchange::new();
        assert!(matches!(exchange.publish(frame(R1, 0, 1, 1)), Ok(None)));
        let previous = exchange.publish(frame(R1, 0, 2, 2)).unwrap().unwrap();
        assert_eq!(previous.sequence, 1);
        assert_eq!(exchange.latest().unwrap().frame.sequence, 2);
    }

    #[test]
    fn test_rejects_older_sequence_and_epoch() {
        let exchange = FrameExchange::new();
        exchange.publish(frame(R1, 1, 5, 0)).unwrap();

        let rejected = exchange.publish(frame(R1, 1, 5, 0)).unwrap_err();
        assert_eq!(rejected.sequence, 5);
        assert!(exchange.publish(frame(R1, 1, 4, 0)).is_err());
        assert!(exchange.publish(frame(R1, 0, 99, 0)).is_err());

        // A new epoch restarts sequence ordering
        assert!(exchange.publish(frame(R2, 2, 1, 0)).is_ok());
    }

    #[test]
    fn test_reinitialize_on_first_and_epoch_change() {
        let exchange = FrameExchange::new();
        assert!(exchange.latest().is_none());

        exchange.publish(frame(R1, 0, 1, 0)).unwrap();
        assert!(exchange.latest().unwrap().reinitialize);
        assert!(!exchange.latest().unwrap().reinitialize);

        exchange.publish(frame(R1, 0, 2, 0)).unwrap();
        assert!(!exchange.latest().unwrap().reinitialize);

        exchange.publish(frame(R2, 1, 3, 0)).unwrap();
        let latest = exchange.latest().unwrap();
        assert!(latest.reinitialize);
        assert_eq!(latest.frame.width, 2);
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let exchange = FrameExchange::new();
        assert!(exchange.snapshot().is_none());

        exchange.publish(frame(R1, 0, 1, 7)).unwrap();
        let snapshot = exchange.snapshot().unwrap();
        assert_eq!(snapshot.rgba.len(), R1.rgba_len());

        // The capture side gets the old buffer back and overwrites it
        exchange.publish(frame(R1, 0, 2, 9)).unwrap();
        assert!(snapshot.rgba.iter().all(|&b| b == 7));
        assert!(exchange.snapshot().unwrap().rgba.iter().all(|&b| b == 9));
    }

    #[test]
    fn test_clear() {
        let exchange = FrameExchange::new();
        exchange.publish(frame(R1, 0, 1, 0)).unwrap();
        exchange.clear();
        assert!(exchange.snapshot().is_none());
        assert!(exchange.latest().is_none());
    }
}
