//! View state: the single source of truth the overlay and the informational
//! display consume.
//!
//! All pipeline state lives in this one shared container; there are no
//! module-level globals. The sampler, client and renderer each hold a clone
//! of the handle.
//!
//! Responses can land out of order, or after capture was toggled off. Every
//! submission therefore carries a [`RequestToken`] and a batch commits only
//! when capture is still on, the token belongs to the current on-period, and
//! it is newer than the last committed response. Everything else is dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::FailurePolicy;
use crate::detect::DetectionBatch;
use crate::overlay::DisplayFrame;

/// Two-state capture flag. Off means no sampling and a cleared overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    On,
    Off,
}

/// Identity of one in-flight submission.
///
/// `epoch` counts on-periods (bumped every time capture turns on), `seq`
/// counts submissions within the current on-period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestToken {
    epoch: u64,
    seq: u64,
}

/// Read-only view of the current state, taken under one lock.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    pub capture: CaptureState,
    pub batch: DetectionBatch,
    pub display: Option<DisplayFrame>,
    pub status: Option<String>,
    pub revision: u64,
}

#[derive(Debug)]
struct Inner {
    capture: CaptureState,
    epoch: u64,
    next_seq: u64,
    last_committed_seq: u64,
    batch: DetectionBatch,
    display: Option<DisplayFrame>,
    status: Option<String>,
    revision: u64,
}

/// Shared, cloneable handle to the pipeline state.
#[derive(Clone, Debug)]
pub struct ViewState {
    inner: Arc<Mutex<Inner>>,
}

impl ViewState {
    pub fn new(initial: CaptureState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capture: initial,
                epoch: 0,
                next_seq: 0,
                last_committed_seq: 0,
                batch: DetectionBatch::empty(),
                display: None,
                status: None,
                revision: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capture(&self) -> CaptureState {
        self.lock().capture
    }

    pub fn is_on(&self) -> bool {
        self.lock().capture == CaptureState::On
    }

    /// Flips the capture flag.
    ///
    /// Turning off clears the displayed detections immediately; turning on
    /// opens a fresh epoch so responses from the previous on-period can no
    /// longer commit.
    pub fn set_capture(&self, capture: CaptureState) {
        let mut inner = self.lock();
        if inner.capture == capture {
            return;
        }
        inner.capture = capture;
        match capture {
            CaptureState::Off => {
                inner.batch = DetectionBatch::empty();
            }
            CaptureState::On => {
                inner.epoch += 1;
                inner.next_seq = 0;
                inner.last_committed_seq = 0;
            }
        }
        inner.revision += 1;
    }

    /// Issues a token for one submission, or `None` while capture is off.
    pub fn begin_request(&self) -> Option<RequestToken> {
        let mut inner = self.lock();
        if inner.capture != CaptureState::On {
            return None;
        }
        inner.next_seq += 1;
        Some(RequestToken {
            epoch: inner.epoch,
            seq: inner.next_seq,
        })
    }

    /// Commits a batch if its token is still current.
    ///
    /// Returns false (and drops the batch) when capture is off, the token is
    /// from an earlier on-period, or a newer response already committed.
    pub fn commit_batch(&self, token: RequestToken, batch: DetectionBatch) -> bool {
        let mut inner = self.lock();
        if inner.capture != CaptureState::On
            || token.epoch != inner.epoch
            || token.seq <= inner.last_committed_seq
        {
            return false;
        }
        inner.last_committed_seq = token.seq;
        inner.batch = batch;
        inner.revision += 1;
        true
    }

    /// Records a failed submission.
    ///
    /// Under [`FailurePolicy::Retain`] the current batch stays as-is; under
    /// [`FailurePolicy::Clear`] it is cleared, but only if the token is still
    /// current, so a stale failure cannot wipe fresher detections.
    pub fn record_failure(&self, token: RequestToken, message: &str, policy: FailurePolicy) {
        let mut inner = self.lock();
        inner.status = Some(message.to_string());
        if policy == FailurePolicy::Clear
            && inner.capture == CaptureState::On
            && token.epoch == inner.epoch
            && token.seq > inner.last_committed_seq
        {
            inner.last_committed_seq = token.seq;
            inner.batch = DetectionBatch::empty();
        }
        inner.revision += 1;
    }

    /// Updates the display dimensions from the latest captured frame.
    pub fn set_display(&self, display: DisplayFrame) {
        let mut inner = self.lock();
        if inner.display != Some(display) {
            inner.display = Some(display);
            inner.revision += 1;
        }
    }

    pub fn set_status(&self, message: impl Into<String>) {
        let mut inner = self.lock();
        inner.status = Some(message.into());
        inner.revision += 1;
    }

    pub fn batch(&self) -> DetectionBatch {
        self.lock().batch.clone()
    }

    pub fn display(&self) -> Option<DisplayFrame> {
        self.lock().display
    }

    /// Monotonic counter bumped on every visible change; consumers redraw
    /// when it moves.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.lock();
        StateSnapshot {
            capture: inner.capture,
            batch: inner.batch.clone(),
            display: inner.display,
            status: inner.status.clone(),
            revision: inner.revision,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
