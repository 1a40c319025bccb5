// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runs presented frames, either on the presenting thread or on a render thread.

use super::submission::FrameSubmission;
use crate::backend::RenderBackend;
use crate::error::RenderError;
use crate::stats::FrameStats;
use crate::utils;
use crate::vertex_layout::VertexLayoutRegistry;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

enum RenderMessage {
    Frame(Box<FrameSubmission>),
    Flush(flume::Sender<()>),
}

struct RenderThread {
    sender: Option<flume::Sender<RenderMessage>>,
    handle: Option<JoinHandle<()>>,
}

/// Executes frames on a backend and keeps the frame counters.
///
/// In threaded mode the queue between the presenting thread and the render
/// thread holds at most `queue_depth` frames; `submit` blocks while it is full.
pub struct FrameExecutor {
    backend: Arc<dyn RenderBackend>,
    layouts: Arc<VertexLayoutRegistry>,
    stats: Arc<Mutex<FrameStats>>,
    thread: Option<RenderThread>,
}

impl FrameExecutor {
    /// An executor running frames on the thread that presents them.
    pub fn immediate(backend: Arc<dyn RenderBackend>, layouts: Arc<VertexLayoutRegistry>) -> Self {
        Self {
            backend,
            layouts,
            stats: Arc::new(Mutex::new(FrameStats::default())),
            thread: None,
        }
    }

    /// An executor feeding a dedicated render thread.
    pub fn threaded(
        backend: Arc<dyn RenderBackend>,
        layouts: Arc<VertexLayoutRegistry>,
        queue_depth: u32,
    ) -> Result<Self, RenderError> {
        let mut executor = Self::immediate(backend, layouts);
        let (sender, receiver) = flume::bounded::<RenderMessage>(queue_depth.max(1) as usize);

        let backend = Arc::clone(&executor.backend);
        let layouts = Arc::clone(&executor.layouts);
        let stats = Arc::clone(&executor.stats);
        let handle = thread::Builder::new()
            .name("rhi-render".into())
            .spawn(move || {
                log::info!("Render thread started.");
                while let Ok(message) = receiver.recv() {
                    match message {
                        RenderMessage::Frame(frame) => {
                            // Errors are already logged and the frame rejected.
                            let _ = run_frame(backend.as_ref(), &layouts, &stats, &frame);
                        }
                        RenderMessage::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                log::info!("Render thread stopped.");
            })
            .map_err(|e| {
                RenderError::InitializationFailed(format!("Failed to spawn render thread: {e}"))
            })?;

        executor.thread = Some(RenderThread {
            sender: Some(sender),
            handle: Some(handle),
        });
        Ok(executor)
    }

    /// `true` when frames run on a render thread.
    pub fn is_threaded(&self) -> bool {
        self.thread.is_some()
    }

    /// Shared frame counters.
    pub fn stats(&self) -> FrameStats {
        *utils::lock(&self.stats)
    }

    /// Executes `frame` now, or queues it for the render thread.
    ///
    /// In immediate mode a failed replay is returned after the frame was
    /// rejected; in threaded mode it is only logged.
    pub fn submit(&self, frame: FrameSubmission) -> Result<(), RenderError> {
        match self.sender() {
            Some(sender) => sender
                .send(RenderMessage::Frame(Box::new(frame)))
                .map_err(|_| RenderError::Internal("Render thread is gone".into())),
            None => run_frame(self.backend.as_ref(), &self.layouts, &self.stats, &frame),
        }
    }

    /// Drops `frame` without executing it.
    pub fn reject(&self, frame: FrameSubmission) {
        log::debug!("Rejecting frame {}", frame.number());
        self.backend.reject_frame(&frame);
        utils::lock(&self.stats).record_rejected(frame.number());
    }

    /// Blocks until every queued frame has executed.
    pub fn flush(&self) -> Result<(), RenderError> {
        let Some(sender) = self.sender() else {
            return Ok(());
        };
        let (done_tx, done_rx) = flume::bounded(1);
        sender
            .send(RenderMessage::Flush(done_tx))
            .map_err(|_| RenderError::Internal("Render thread is gone".into()))?;
        done_rx
            .recv()
            .map_err(|_| RenderError::Internal("Render thread stopped during flush".into()))
    }

    fn sender(&self) -> Option<&flume::Sender<RenderMessage>> {
        self.thread.as_ref().and_then(|t| t.sender.as_ref())
    }
}

impl std::fmt::Debug for FrameExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameExecutor")
            .field("backend", &self.backend)
            .field("threaded", &self.is_threaded())
            .finish()
    }
}

impl Drop for FrameExecutor {
    fn drop(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            // Closing the channel ends the render loop once the queue is drained.
            drop(thread.sender.take());
            if let Some(handle) = thread.handle.take() {
                if handle.join().is_err() {
                    log::error!("Render thread panicked.");
                }
            }
        }
    }
}

fn run_frame(
    backend: &dyn RenderBackend,
    layouts: &VertexLayoutRegistry,
    stats: &Mutex<FrameStats>,
    frame: &FrameSubmission,
) -> Result<(), RenderError> {
    match backend.execute_frame(frame, layouts) {
        Ok(replay) => {
            log::trace!(
                "Frame {} executed: {} passes, {} draws",
                frame.number(),
                frame.passes().len(),
                replay.draws
            );
            utils::lock(stats).record_executed(frame.number(), &replay);
            Ok(())
        }
        Err(e) => {
            log::error!("Frame {} failed to execute: {e}", frame.number());
            backend.reject_frame(frame);
            utils::lock(stats).record_rejected(frame.number());
            Err(e)
        }
    }
}
