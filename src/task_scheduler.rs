use crate::errors::Result;
use crate::render_cache::{rasterize, PixelSize, ScaleKey};
use image::RgbaImage;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// A rasterization request handed to a background worker.
#[derive(Debug)]
pub struct RasterJob {
    pub job_id: u64,
    /// Source image generation the job was created for.
    pub generation: u64,
    pub scale: ScaleKey,
    pub size: PixelSize,
    pub source: Arc<RgbaImage>,
}

/// A finished rasterization, delivered back to the owning thread.
#[derive(Debug)]
pub struct RasterResult {
    pub job_id: u64,
    pub generation: u64,
    pub scale: ScaleKey,
    pub size: PixelSize,
    pub bitmap: Arc<RgbaImage>,
}

struct JobQueue {
    jobs: Mutex<VecDeque<RasterJob>>,
    available: Condvar,
    running: AtomicBool,
}

/// Worker pool for off-thread rasterization.
///
/// Results come back over a channel and are only ever consumed by whoever
/// owns the scheduler, so shared cache state never leaves that thread.
pub struct RasterScheduler {
    queue: Arc<JobQueue>,
    result_rx: Receiver<RasterResult>,
    next_job_id: u64,
    workers: Vec<thread::JoinHandle<()>>,
}

impl RasterScheduler {
    pub fn new(num_workers: usize) -> Result<Self> {
        let (result_tx, result_rx) = mpsc::channel();
        let queue = Arc::new(JobQueue {
            jobs: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let mut workers = Vec::with_capacity(num_workers.max(1));
        for i in 0..num_workers.max(1) {
            let queue = Arc::clone(&queue);
            let result_tx = result_tx.clone();
            let worker = thread::Builder::new()
                .name(format!("raster-worker-{}", i))
                .spawn(move || Self::worker_loop(queue, result_tx))?;
            workers.push(worker);
        }
        tracing::debug!(workers = workers.len(), "raster scheduler started");

        Ok(Self {
            queue,
            result_rx,
            next_job_id: 0,
            workers,
        })
    }

    fn worker_loop(queue: Arc<JobQueue>, result_tx: Sender<RasterResult>) {
        loop {
            let job = {
                let mut jobs = queue.jobs.lock().unwrap_or_else(PoisonError::into_inner);
                loop {
                    if !queue.running.load(Ordering::Acquire) {
                        return;
                    }
                    if let Some(job) = jobs.pop_front() {
                        break job;
                    }
                    jobs = queue
                        .available
                        .wait(jobs)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            };

            let started = std::time::Instant::now();
            let bitmap = rasterize(&job.source, job.size);
            tracing::trace!(
                job = job.job_id,
                size = %job.size,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "rasterized"
            );

            let result = RasterResult {
                job_id: job.job_id,
                generation: job.generation,
                scale: job.scale,
                size: job.size,
                bitmap: Arc::new(bitmap),
            };
            if result_tx.send(result).is_err() {
                // Owner is gone.
                return;
            }
        }
    }

    pub fn submit(&mut self, generation: u64, scale: ScaleKey, size: PixelSize, source: Arc<RgbaImage>) -> u64 {
        let job_id = self.next_job_id;
        self.next_job_id += 1;

        let job = RasterJob {
            job_id,
            generation,
            scale,
            size,
            source,
        };
        self.queue
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(job);
        self.queue.available.notify_one();
        job_id
    }

    /// Drops queued jobs that have not started and belong to another generation.
    pub fn discard_stale(&self, generation: u64) -> usize {
        let mut jobs = self.queue.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|job| job.generation == generation);
        before - jobs.len()
    }

    pub fn try_recv_result(&self) -> Option<RasterResult> {
        self.result_rx.try_recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<RasterResult> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn queue_size(&self) -> usize {
        self.queue.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for RasterScheduler {
    fn drop(&mut self) {
        self.queue.running.store(false, Ordering::Release);
        {
            // Take the lock so no worker misses the wakeup between its check and wait.
            let _jobs = self.queue.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            self.queue.available.notify_all();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn source() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(64, 32, Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn test_jobs_complete_in_background() {
        let mut scheduler = RasterScheduler::new(2).unwrap();
        let size = PixelSize::new(16, 8);
        let id = scheduler.submit(3, ScaleKey::from(1.0), size, source());

        let result = scheduler.recv_result_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.job_id, id);
        assert_eq!(result.generation, 3);
        assert_eq!(result.bitmap.dimensions(), (16, 8));
    }

    #[test]
    fn test_discard_stale_keeps_current_generation() {
        // The worker may already have taken jobs; only the queue is checked.
        let mut scheduler = RasterScheduler::new(1).unwrap();
        for generation in [1, 1, 2] {
            scheduler.submit(generation, ScaleKey::from(1.0), PixelSize::new(4, 4), source());
        }
        scheduler.discard_stale(2);
        assert!(scheduler.queue_size() <= 1);
    }

    #[test]
    fn test_shutdown_joins_workers() {
        let scheduler = RasterScheduler::new(3).unwrap();
        assert_eq!(scheduler.worker_count(), 3);
        drop(scheduler);
    }
}
