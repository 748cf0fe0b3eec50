use hashbrown::HashMap;

use crate::{
    operation::{AlreadySettled, Completion, Operation, OperationDraft},
    types::{OperationId, TimestampMs},
};

/// Store-level settlement failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Never issued, or already evicted.
    #[error("operation {0} is not in the store")]
    MissingOperation(OperationId),
    /// The operation already reached a terminal state.
    #[error(transparent)]
    AlreadySettled(#[from] AlreadySettled),
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    op: Operation,
}

/// Bounded id → operation map.
///
/// Every entry carries an insertion sequence so that operations created in
/// the same millisecond still have a total "newest" order.
#[derive(Debug)]
pub struct OperationStore {
    records: HashMap<OperationId, Entry>,
    next_seq: u64,
    max_history: usize,
}

impl OperationStore {
    /// A bound of zero is raised to one.
    pub fn new(max_history: usize) -> Self {
        Self {
            records: HashMap::new(),
            next_seq: 1,
            max_history: max_history.max(1),
        }
    }

    /// Current eviction bound.
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Changes the bound and evicts right away; returns the dropped ids.
    pub fn set_max_history(&mut self, max_history: usize) -> Vec<OperationId> {
        self.max_history = max_history.max(1);
        self.evict_overflow()
    }

    /// Creates a pending operation with a fresh id.
    pub fn insert(&mut self, draft: OperationDraft, now_ms: TimestampMs) -> &Operation {
        let mut id = OperationId::generate(now_ms);
        while self.records.contains_key(&id) {
            id = OperationId::generate(now_ms);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let op = Operation::pending(id.clone(), draft, now_ms);
        &self.records.entry(id).or_insert(Entry { seq, op }).op
    }

    /// Most recent still-pending operation recorded for `url`.
    ///
    /// Concurrent requests to the identical URL cannot be told apart; the
    /// newest one wins.
    pub fn find_pending_for_url(&self, url: &str) -> Option<&OperationId> {
        self.records
            .values()
            .filter(|e| !e.op.status().is_terminal() && e.op.network_info.url == url)
            .max_by_key(|e| (e.op.timestamp, e.seq))
            .map(|e| &e.op.id)
    }

    /// Applies a completion to a pending operation.
    pub fn settle(&mut self, id: &OperationId, completion: Completion) -> Result<&Operation, StoreError> {
        let entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingOperation(id.clone()))?;
        entry.op.settle(completion)?;
        Ok(&entry.op)
    }

    /// Drops the oldest operations beyond the bound; returns the dropped ids.
    pub fn evict_overflow(&mut self) -> Vec<OperationId> {
        if self.records.len() <= self.max_history {
            return Vec::new();
        }

        let mut order: Vec<(TimestampMs, u64, OperationId)> = self
            .records
            .values()
            .map(|e| (e.op.timestamp, e.seq, e.op.id.clone()))
            .collect();
        order.sort_unstable_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));

        let evicted: Vec<OperationId> = order
            .into_iter()
            .skip(self.max_history)
            .map(|(_, _, id)| id)
            .collect();
        for id in &evicted {
            self.records.remove(id);
        }
        evicted
    }

    /// Looks up one operation.
    pub fn get(&self, id: &OperationId) -> Option<&Operation> {
        self.records.get(id).map(|e| &e.op)
    }

    /// Owned copy of [`OperationStore::get`].
    pub fn get_cloned(&self, id: &OperationId) -> Option<Operation> {
        self.get(id).cloned()
    }

    /// All operations, newest first.
    pub fn newest_first(&self) -> Vec<&Operation> {
        let mut entries: Vec<&Entry> = self.records.values().collect();
        entries.sort_unstable_by(|a, b| (b.op.timestamp, b.seq).cmp(&(a.op.timestamp, a.seq)));
        entries.into_iter().map(|e| &e.op).collect()
    }

    /// All operations, oldest first (creation order).
    pub fn oldest_first(&self) -> Vec<&Operation> {
        let mut ops = self.newest_first();
        ops.reverse();
        ops
    }

    /// Unordered.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.records.values().map(|e| &e.op)
    }

    /// Number of stored operations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every operation. Sequence numbers keep counting.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
