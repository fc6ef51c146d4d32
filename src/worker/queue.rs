//! Bounded job queue between the frame producer and the extraction workers.
//!
//! Uses a `sync_channel`, so a producer blocks once `capacity` frames are
//! waiting instead of buffering without limit.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

/// One frame waiting for extraction.
#[derive(Debug, Clone)]
pub struct FrameJob {
    /// Image file holding the frame
    pub path: PathBuf,
    /// Position of the frame in the input sequence
    pub index: u32,
    /// When the frame was captured
    pub captured_at: DateTime<Local>,
}

impl FrameJob {
    /// Creates a job stamped with the current time.
    pub fn new(path: PathBuf, index: u32) -> Self {
        Self {
            path,
            index,
            captured_at: Local::now(),
        }
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Local>) -> Self {
        self.captured_at = captured_at;
        self
    }
}

/// Receiving end shared by all workers.
pub type SharedReceiver = Arc<Mutex<Receiver<FrameJob>>>;

/// Creates a bounded queue. A capacity of zero makes every send a rendezvous.
pub fn create_job_queue(capacity: usize) -> (SyncSender<FrameJob>, SharedReceiver) {
    let (sender, receiver) = sync_channel(capacity);
    (sender, Arc::new(Mutex::new(receiver)))
}
