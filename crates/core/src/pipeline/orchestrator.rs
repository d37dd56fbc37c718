use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::pipeline::detection_loop::{DetectionLoop, LoopExit, LoopState};
use crate::pipeline::status::Status;
use crate::recognition::domain::known_face_set::KnownFaceSet;
use crate::video::infrastructure::jpeg_encoder::{encode_jpeg, DEFAULT_JPEG_QUALITY};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("failed to spawn detection thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("detection worker panicked; restart the process")]
    WorkerLost,
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
    #[error("failed to reload identities: {0}")]
    Reload(String),
}

enum Worker {
    Idle(Box<DetectionLoop>),
    Running(JoinHandle<(DetectionLoop, LoopExit)>),
    /// Another caller is joining the thread with the lock released.
    Joining,
    Lost,
}

/// Control surface over a single detection worker.
///
/// The orchestrator owns the [`DetectionLoop`] while it is idle and hands it
/// to a dedicated thread on `start()`; the thread hands it back when it
/// exits, so a stopped or finished loop can be restarted. Readers poll the
/// latest snapshot and status without touching the worker.
pub struct Orchestrator {
    state: Arc<LoopState>,
    known_faces: Arc<KnownFaceSet>,
    worker: Mutex<Worker>,
    joined: Condvar,
    jpeg_quality: u8,
}

impl Orchestrator {
    pub fn new(detection_loop: DetectionLoop) -> Self {
        Self {
            state: Arc::new(LoopState::new()),
            known_faces: Arc::clone(detection_loop.known_faces()),
            worker: Mutex::new(Worker::Idle(Box::new(detection_loop))),
            joined: Condvar::new(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Starts the detection worker. Returns `Ok(false)` if it is already
    /// running.
    pub fn start(&self) -> Result<bool, OrchestratorError> {
        let mut worker = self.lock_worker();
        loop {
            match &*worker {
                Worker::Running(handle) if !handle.is_finished() && self.state.is_active() => {
                    return Ok(false)
                }
                Worker::Joining if self.state.is_active() => return Ok(false),
                Worker::Joining => worker = self.wait_joined(worker),
                _ => break,
            }
        }

        let mut detection_loop = match std::mem::replace(&mut *worker, Worker::Lost) {
            Worker::Idle(detection_loop) => detection_loop,
            Worker::Running(handle) => {
                // Finished, or stop() was requested but not joined yet.
                self.state.set_active(false);
                let (detection_loop, exit) =
                    handle.join().map_err(|_| OrchestratorError::WorkerLost)?;
                log::debug!("Previous detection run ended: {exit:?}");
                Box::new(detection_loop)
            }
            Worker::Joining | Worker::Lost => return Err(OrchestratorError::WorkerLost),
        };

        self.state.set_active(true);
        let state = Arc::clone(&self.state);
        let spawned = std::thread::Builder::new()
            .name("detection".to_string())
            .spawn(move || {
                let exit = detection_loop.run(&state);
                (*detection_loop, exit)
            });

        match spawned {
            Ok(handle) => {
                log::info!("Detection started");
                *worker = Worker::Running(handle);
                Ok(true)
            }
            Err(e) => {
                self.state.set_active(false);
                Err(OrchestratorError::Spawn(e))
            }
        }
    }

    /// Signals the worker to stop and waits for it to release the camera.
    /// Stopping an idle orchestrator is a no-op.
    pub fn stop(&self) -> Result<Option<LoopExit>, OrchestratorError> {
        self.state.set_active(false);
        self.join_worker()
    }

    /// Waits for the worker to exit on its own (end of stream or camera
    /// failure) without asking it to stop.
    pub fn wait(&self) -> Result<Option<LoopExit>, OrchestratorError> {
        self.join_worker()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_active()
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn known_faces(&self) -> &Arc<KnownFaceSet> {
        &self.known_faces
    }

    /// Replaces the known face set from the identity store. On failure the
    /// previous set stays in use.
    pub fn reload_identities(&self) -> Result<usize, OrchestratorError> {
        self.known_faces
            .reload()
            .map_err(|e| OrchestratorError::Reload(e.to_string()))
    }

    /// Latest annotated frame as JPEG, or `None` before the first frame.
    pub fn latest_frame(&self) -> Result<Option<Vec<u8>>, OrchestratorError> {
        match self.state.snapshot().latest() {
            Some(frame) => self.encode(&frame).map(Some),
            None => Ok(None),
        }
    }

    /// Blocks until a frame newer than `seen_version` is published, returning
    /// its version and JPEG bytes, or `None` on timeout.
    pub fn wait_for_frame(
        &self,
        seen_version: u64,
        timeout: Duration,
    ) -> Result<Option<(u64, Vec<u8>)>, OrchestratorError> {
        match self.state.snapshot().wait_newer(seen_version, timeout) {
            Some((version, frame)) => Ok(Some((version, self.encode(&frame)?))),
            None => Ok(None),
        }
    }

    fn encode(&self, frame: &crate::shared::frame::Frame) -> Result<Vec<u8>, OrchestratorError> {
        encode_jpeg(frame, self.jpeg_quality).map_err(|e| OrchestratorError::Encode(e.to_string()))
    }

    /// Joins the worker thread without holding the lock, so `start()` and
    /// other controls stay responsive while a long run is awaited.
    fn join_worker(&self) -> Result<Option<LoopExit>, OrchestratorError> {
        let mut worker = self.lock_worker();
        while matches!(*worker, Worker::Joining) {
            worker = self.wait_joined(worker);
        }
        let handle = match std::mem::replace(&mut *worker, Worker::Joining) {
            Worker::Running(handle) => handle,
            Worker::Lost => {
                *worker = Worker::Lost;
                return Err(OrchestratorError::WorkerLost);
            }
            idle => {
                *worker = idle;
                return Ok(None);
            }
        };
        drop(worker);

        let joined = handle.join();
        let mut worker = self.lock_worker();
        let result = match joined {
            Ok((detection_loop, exit)) => {
                *worker = Worker::Idle(Box::new(detection_loop));
                Ok(Some(exit))
            }
            Err(_) => {
                *worker = Worker::Lost;
                Err(OrchestratorError::WorkerLost)
            }
        };
        drop(worker);
        self.joined.notify_all();
        result
    }

    fn wait_joined<'a>(&self, guard: MutexGuard<'a, Worker>) -> MutexGuard<'a, Worker> {
        self.joined.wait(guard).unwrap_or_else(|e| e.into_inner())
    }

    fn lock_worker(&self) -> MutexGuard<'_, Worker> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Detection worker did not shut down cleanly: {e}");
        }
    }
}
