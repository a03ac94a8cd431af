use std::collections::{HashMap, VecDeque};

/// Discovery state of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Pending,
    InProgress,
    Implemented,
    Invalid,
}

/// Deduplicated FIFO of addresses still to visit.
///
/// An address is queued at most once over the lifetime of the
/// worklist: once it has any state, `push` ignores it.
#[derive(Debug, Default)]
pub struct Worklist {
    queue: VecDeque<u64>,
    state: HashMap<u64, VisitState>,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `addr` unless it was seen before. Returns true if queued.
    pub fn push(&mut self, addr: u64) -> bool {
        if self.state.contains_key(&addr) {
            return false;
        }
        self.state.insert(addr, VisitState::Pending);
        self.queue.push_back(addr);
        true
    }

    /// Next pending address, moved to `InProgress`.
    pub fn pop(&mut self) -> Option<u64> {
        let addr = self.queue.pop_front()?;
        self.state.insert(addr, VisitState::InProgress);
        Some(addr)
    }

    pub fn mark(&mut self, addr: u64, state: VisitState) {
        self.state.insert(addr, state);
    }

    pub fn state(&self, addr: u64) -> Option<VisitState> {
        self.state.get(&addr).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
