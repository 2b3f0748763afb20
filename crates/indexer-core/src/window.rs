//! The recent-block window: a bounded, in-memory record of the tip of a chain
//! used to detect reorgs and to drive bounded backfill after a gap or a
//! dropped subscription. See the pipeline variants for how it is driven.

use {
    alloy_primitives::B256,
    chrono::{DateTime, Utc},
    std::collections::VecDeque,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("block number {got} is not newer than the current tip {tip}")]
    TooLowBlockNumber { tip: u64, got: u64 },
    #[error("cannot backfill to {anchor}: window has no entries")]
    NoBlocksToBackfill { anchor: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    /// Most recently observed tip, not yet superseded by a newer tip.
    New,
    /// Older than the tip, not yet confirmed by a subsequent block fetch.
    Backfilling,
    /// Either superseded by a newer tip, or confirmed via backfill.
    Processed,
}

#[derive(Clone, Debug)]
pub struct WindowEntry {
    pub number: u64,
    pub hash: Option<B256>,
    pub timestamp: Option<DateTime<Utc>>,
    pub state: BlockState,
}

/// A sliding window of the last `depth` block numbers, newest first.
pub struct RecentBlockWindow {
    depth: usize,
    entries: VecDeque<WindowEntry>,
}

impl RecentBlockWindow {
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn tip(&self) -> Option<&WindowEntry> {
        self.entries.front()
    }

    pub fn lookup(&self, number: u64) -> Option<&WindowEntry> {
        self.entries.iter().find(|e| e.number == number)
    }

    /// Record a new tip. Fills any gap between the previous tip and `number`
    /// with placeholder `Processed` entries (no hash/timestamp known), then
    /// pushes the new tip as `New`, demoting the previous tip to `Processed`.
    pub fn add_tip(
        &mut self,
        number: u64,
        hash: B256,
        timestamp: DateTime<Utc>,
    ) -> Result<(), WindowError> {
        if let Some(tip) = self.entries.front() {
            if number <= tip.number {
                return Err(WindowError::TooLowBlockNumber { tip: tip.number, got: number });
            }
        }
        if let Some(tip) = self.entries.front_mut() {
            if tip.state == BlockState::New {
                tip.state = BlockState::Processed;
            }
        }
        let gap_start = self.entries.front().map(|e| e.number + 1).unwrap_or(number);
        for gap_number in (gap_start..number).rev() {
            self.entries.push_front(WindowEntry {
                number: gap_number,
                hash: None,
                timestamp: None,
                state: BlockState::Processed,
            });
        }
        self.entries.push_front(WindowEntry {
            number,
            hash: Some(hash),
            timestamp: Some(timestamp),
            state: BlockState::New,
        });
        while self.entries.len() > self.depth {
            self.entries.pop_back();
        }
        Ok(())
    }

    /// Mark `anchor` and every retained entry strictly between the oldest
    /// retained block and `anchor` as `Backfilling`. Entries the window does
    /// not currently hold are left untouched; they simply never surface from
    /// [`Self::next_backfill`].
    pub fn start_backfill(&mut self, anchor: u64) -> Result<(), WindowError> {
        let Some(oldest) = self.entries.back().map(|e| e.number) else {
            return Err(WindowError::NoBlocksToBackfill { anchor });
        };
        if anchor < oldest {
            return Err(WindowError::TooLowBlockNumber { tip: oldest, got: anchor });
        }
        for entry in self.entries.iter_mut() {
            if entry.number == anchor || (entry.number > oldest && entry.number < anchor) {
                entry.state = BlockState::Backfilling;
            }
        }
        Ok(())
    }

    /// The highest-numbered block still awaiting backfill confirmation, if any.
    pub fn next_backfill(&self) -> Option<u64> {
        self.entries
            .iter()
            .filter(|e| e.state == BlockState::Backfilling)
            .map(|e| e.number)
            .max()
    }

    /// Record that `number` has been confirmed by backfill: store its hash and
    /// timestamp and transition it to `Processed`.
    pub fn confirm_backfill(&mut self, number: u64, hash: B256, timestamp: DateTime<Utc>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.number == number) {
            entry.hash = Some(hash);
            entry.timestamp = Some(timestamp);
            entry.state = BlockState::Processed;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    #[test]
    fn add_tip_rejects_non_increasing_numbers() {
        let mut window = RecentBlockWindow::new(8);
        window.add_tip(10, hash(1), Utc::now()).unwrap();
        let err = window.add_tip(10, hash(2), Utc::now()).unwrap_err();
        assert_eq!(err, WindowError::TooLowBlockNumber { tip: 10, got: 10 });
    }

    #[test]
    fn add_tip_fills_gaps_and_demotes_previous_tip() {
        let mut window = RecentBlockWindow::new(8);
        window.add_tip(10, hash(1), Utc::now()).unwrap();
        window.add_tip(13, hash(2), Utc::now()).unwrap();
        assert_eq!(window.len(), 4);
        assert_eq!(window.lookup(10).unwrap().state, BlockState::Processed);
        assert_eq!(window.lookup(11).unwrap().state, BlockState::Processed);
        assert!(window.lookup(11).unwrap().hash.is_none());
        assert_eq!(window.tip().unwrap().number, 13);
        assert_eq!(window.tip().unwrap().state, BlockState::New);
    }

    #[test]
    fn window_evicts_oldest_beyond_depth() {
        let mut window = RecentBlockWindow::new(2);
        window.add_tip(1, hash(1), Utc::now()).unwrap();
        window.add_tip(2, hash(2), Utc::now()).unwrap();
        window.add_tip(3, hash(3), Utc::now()).unwrap();
        assert_eq!(window.len(), 2);
        assert!(window.lookup(1).is_none());
    }

    #[test]
    fn start_backfill_requires_entries() {
        let mut window = RecentBlockWindow::new(8);
        let err = window.start_backfill(5).unwrap_err();
        assert_eq!(err, WindowError::NoBlocksToBackfill { anchor: 5 });
    }

    #[test]
    fn backfill_marks_range_and_next_backfill_returns_highest() {
        let mut window = RecentBlockWindow::new(8);
        window.add_tip(10, hash(1), Utc::now()).unwrap();
        window.add_tip(12, hash(2), Utc::now()).unwrap();
        window.start_backfill(12).unwrap();
        assert_eq!(window.next_backfill(), Some(12));
        window.confirm_backfill(12, hash(3), Utc::now());
        assert_eq!(window.lookup(12).unwrap().state, BlockState::Processed);
        assert_eq!(window.next_backfill(), None);
    }
}
