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

//! Per-frame counters reported by the executing side.

use crate::command::ReplayStats;

/// Running totals of executed and rejected frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Frames replayed onto the backend.
    pub frames_executed: u64,
    /// Frames dropped without execution (suspended device or failed replay).
    pub frames_rejected: u64,
    /// Number of the most recent frame that reached the executor.
    pub last_frame: u64,
    /// Counters of the most recent executed frame.
    pub last: ReplayStats,
    /// Counters accumulated over every executed frame.
    pub total: ReplayStats,
}

impl FrameStats {
    /// Records a successfully executed frame.
    pub fn record_executed(&mut self, frame: u64, stats: &ReplayStats) {
        self.frames_executed += 1;
        self.last_frame = frame;
        self.last = *stats;
        self.total.merge(stats);
    }

    /// Records a frame that was rejected.
    pub fn record_rejected(&mut self, frame: u64) {
        self.frames_rejected += 1;
        self.last_frame = frame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_accumulate_and_last_is_replaced() {
        let mut stats = FrameStats::default();
        let one = ReplayStats {
            draws: 2,
            primitives: 10,
            ..Default::default()
        };
        let two = ReplayStats {
            draws: 1,
            primitives: 4,
            ..Default::default()
        };

        stats.record_executed(1, &one);
        stats.record_executed(2, &two);
        stats.record_rejected(3);

        assert_eq!(stats.frames_executed, 2);
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.last_frame, 3);
        assert_eq!(stats.last.draws, 1);
        assert_eq!(stats.total.draws, 3);
        assert_eq!(stats.total.primitives, 14);
    }
}
