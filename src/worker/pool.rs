//! Fixed-size pool of extraction threads fed by the bounded job queue.
//!
//! Finished records come back over a result channel as soon as each frame is
//! done, so callers can write them out while later frames are still running.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{channel, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::queue::{create_job_queue, FrameJob, SharedReceiver};
use crate::pipeline::{FrameExtractor, TelemetryRecord};

pub struct FramePool {
    sender: Option<SyncSender<FrameJob>>,
    workers: Vec<JoinHandle<()>>,
    results: Receiver<TelemetryRecord>,
}

impl FramePool {
    /// Spawns `workers` threads (at least one) sharing `extractor`.
    pub fn start(extractor: FrameExtractor, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = create_job_queue(capacity);
        let (result_sender, results) = channel();
        let extractor = Arc::new(extractor);

        let workers = (0..workers.max(1))
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let extractor = Arc::clone(&extractor);
                let results = result_sender.clone();
                thread::spawn(move || run_worker(id, receiver, extractor, results))
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
            results,
        }
    }

    /// Queues a frame, blocking while the queue is full.
    pub fn submit(&self, job: FrameJob) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("frame pool already finished"))?;
        sender
            .send(job)
            .map_err(|e| anyhow!("all workers have exited, frame {} dropped", e.0.index))
    }

    /// Hands every record finished so far to `sink` without waiting.
    /// Returns how many were delivered.
    pub fn drain_completed<F>(&self, mut sink: F) -> Result<usize>
    where
        F: FnMut(TelemetryRecord) -> Result<()>,
    {
        let mut delivered = 0;
        for record in self.results.try_iter() {
            sink(record)?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Closes the queue and hands each remaining record to `sink` as its
    /// frame completes, in completion order. Returns how many were delivered.
    pub fn finish_into<F>(mut self, mut sink: F) -> Result<usize>
    where
        F: FnMut(TelemetryRecord) -> Result<()>,
    {
        drop(self.sender.take());

        // Ends once every worker has exited and dropped its result sender
        let mut delivered = 0;
        for record in self.results.iter() {
            sink(record)?;
            delivered += 1;
        }

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("A frame worker panicked");
            }
        }
        Ok(delivered)
    }

    /// Closes the queue, waits for the workers and returns the records in
    /// frame order.
    pub fn finish(self) -> Vec<TelemetryRecord> {
        let mut records = Vec::new();
        let collected = self.finish_into(|record| {
            records.push(record);
            Ok(())
        });
        if let Err(e) = collected {
            warn!("Collecting frame records failed: {}", e);
        }
        records.sort_by_key(|r| r.frame_index);
        records
    }
}

/// Worker loop: runs until the queue is closed and drained, or nobody is
/// listening for results any more.
fn run_worker(
    id: usize,
    receiver: SharedReceiver,
    extractor: Arc<FrameExtractor>,
    results: Sender<TelemetryRecord>,
) {
    debug!("Frame worker {} started", id);

    loop {
        // Hold the lock only while waiting for the next job
        let job = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        let Ok(job) = job else {
            break;
        };

        let frame = match image::open(&job.path) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame worker {}: failed to load {}: {}", id, job.path.display(), e);
                continue; // Skip this frame, continue with next
            }
        };

        let mut record = extractor.extract(&frame, job.index, job.captured_at);
        record.source = Some(job.path.display().to_string());

        info!(
            "Frame {} done: {} fields, {} riders, {} errors",
            job.index,
            record.fields.values().filter(|f| f.is_present()).count(),
            record.leaderboard.len(),
            record.errors.len()
        );

        if results.send(record).is_err() {
            debug!("Frame worker {}: result receiver closed", id);
            break;
        }
    }

    debug!("Frame worker {} finished", id);
}
