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

//! Frames: the unit handed from the recording side to the executing side.

use crate::api::RenderPassConfig;
use crate::command::{replay, CommandBuffer, NativeDevice, ReplayStats};
use crate::error::RenderError;
use crate::handle::{HPerfQuerySet, HRenderPass, HSyncObject};
use crate::vertex_layout::VertexLayoutRegistry;
use std::sync::Arc;

/// Collects the passes begun during the current frame.
#[derive(Debug, Default)]
pub struct FrameBuilder {
    number: u64,
    passes: Vec<HRenderPass>,
    perf_query_set: HPerfQuerySet,
}

impl FrameBuilder {
    /// Starts at frame 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of the frame being built.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Queues a begun pass.
    pub fn add_pass(&mut self, pass: HRenderPass) {
        self.passes.push(pass);
    }

    /// Attaches a perf query set to the frame.
    pub fn set_perf_query_set(&mut self, set: HPerfQuerySet) {
        self.perf_query_set = set;
    }

    /// Takes the queued passes and perf query set, and moves on to the next frame number.
    pub fn finish(&mut self) -> (u64, Vec<HRenderPass>, HPerfQuerySet) {
        let number = self.number;
        self.number += 1;
        (
            number,
            std::mem::take(&mut self.passes),
            std::mem::take(&mut self.perf_query_set),
        )
    }
}

/// A pass moved out of the device pools at present time.
#[derive(Debug, Clone)]
pub struct SubmittedPass {
    /// Handle the pass had while it was recorded.
    pub handle: HRenderPass,
    /// Configuration of the pass.
    pub config: Arc<RenderPassConfig>,
    /// Sealed command buffers in recording order.
    pub command_buffers: Vec<CommandBuffer>,
}

impl SubmittedPass {
    /// Submission priority.
    pub fn priority(&self) -> i32 {
        self.config.priority
    }
}

/// Everything the executing side needs to run one frame.
///
/// Command buffers are owned values here: once a frame is built the
/// recording side has no way to reach them.
#[derive(Debug, Clone)]
pub struct FrameSubmission {
    number: u64,
    passes: Vec<SubmittedPass>,
    sync: HSyncObject,
    perf_query_set: HPerfQuerySet,
}

impl FrameSubmission {
    /// Builds a frame, ordering passes by ascending priority.
    ///
    /// The sort is stable: passes of equal priority keep the order in which
    /// they were begun.
    pub fn new(
        number: u64,
        mut passes: Vec<SubmittedPass>,
        sync: HSyncObject,
        perf_query_set: HPerfQuerySet,
    ) -> Self {
        passes.sort_by_key(SubmittedPass::priority);
        Self {
            number,
            passes,
            sync,
            perf_query_set,
        }
    }

    /// Frame number.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Passes in execution order.
    pub fn passes(&self) -> &[SubmittedPass] {
        &self.passes
    }

    /// Frame-level sync object, possibly invalid.
    pub fn sync(&self) -> HSyncObject {
        self.sync
    }

    /// Perf query set receiving the frame timestamps, possibly invalid.
    pub fn perf_query_set(&self) -> HPerfQuerySet {
        self.perf_query_set
    }

    /// Every valid sync object the frame signals: the frame's own and those
    /// attached to its command buffers.
    pub fn sync_objects(&self) -> impl Iterator<Item = HSyncObject> + '_ {
        std::iter::once(self.sync)
            .chain(
                self.passes
                    .iter()
                    .flat_map(|p| p.command_buffers.iter().map(CommandBuffer::sync)),
            )
            .filter(|s| s.is_valid())
    }

    /// Total number of command buffers.
    pub fn command_buffer_count(&self) -> usize {
        self.passes.iter().map(|p| p.command_buffers.len()).sum()
    }

    /// `true` when the frame carries no pass.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Replays every command buffer, pass by pass, onto `device`.
    pub fn replay(
        &self,
        device: &mut dyn NativeDevice,
        layouts: &VertexLayoutRegistry,
    ) -> Result<ReplayStats, RenderError> {
        let mut stats = ReplayStats::default();
        for pass in &self.passes {
            for buffer in &pass.command_buffers {
                stats.merge(&replay(buffer, device, layouts)?);
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;

    fn pass(index: u16, priority: i32) -> SubmittedPass {
        SubmittedPass {
            handle: Handle::new(index, 1),
            config: Arc::new(RenderPassConfig {
                priority,
                ..Default::default()
            }),
            command_buffers: Vec::new(),
        }
    }

    #[test]
    fn test_passes_sorted_by_ascending_priority() {
        let frame = FrameSubmission::new(
            0,
            vec![pass(0, 5), pass(1, -1), pass(2, 3)],
            HSyncObject::INVALID,
            HPerfQuerySet::INVALID,
        );
        let order: Vec<i32> = frame.passes().iter().map(SubmittedPass::priority).collect();
        assert_eq!(order, vec![-1, 3, 5]);
    }

    #[test]
    fn test_equal_priorities_keep_begin_order() {
        let frame = FrameSubmission::new(
            0,
            vec![pass(0, 1), pass(1, 0), pass(2, 1), pass(3, 0)],
            HSyncObject::INVALID,
            HPerfQuerySet::INVALID,
        );
        let order: Vec<u16> = frame.passes().iter().map(|p| p.handle.index()).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_builder_hands_out_consecutive_frames() {
        let mut builder = FrameBuilder::new();
        builder.add_pass(Handle::new(0, 1));
        builder.set_perf_query_set(Handle::new(2, 1));

        let (number, passes, perf) = builder.finish();
        assert_eq!(number, 0);
        assert_eq!(passes.len(), 1);
        assert!(perf.is_valid());

        let (number, passes, perf) = builder.finish();
        assert_eq!(number, 1);
        assert!(passes.is_empty());
        assert!(!perf.is_valid(), "the perf query set applies to one frame only");
    }

    #[test]
    fn test_sync_objects_skip_invalid_handles() {
        let mut buffer = CommandBuffer::new(Arc::new(RenderPassConfig::default()));
        buffer.begin();
        buffer.end(Handle::new(4, 1)).unwrap();
        let mut submitted = pass(0, 0);
        submitted.command_buffers.push(buffer);

        let frame = FrameSubmission::new(
            7,
            vec![submitted],
            HSyncObject::INVALID,
            HPerfQuerySet::INVALID,
        );

        let syncs: Vec<_> = frame.sync_objects().collect();
        assert_eq!(syncs, vec![Handle::new(4, 1)]);
        assert_eq!(frame.command_buffer_count(), 1);
    }
}
