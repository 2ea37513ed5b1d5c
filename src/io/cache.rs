//! Decompressed-block caches.
//!
//! Both policies share one `get`/`set` surface keyed by the compressed file
//! offset of a block. Files small enough to fit the memory budget use a plain
//! map that never evicts; larger files use a four-queue segmented LRU
//! (S4-LRU), which protects blocks that are hit repeatedly from being flushed
//! by one-pass scans. Population is the caller's job: `get` never loads.

use std::collections::HashMap;

const QUEUE_COUNT: usize = 4;
const NIL: usize = usize::MAX;

/// Cache of decompressed BGZF blocks, keyed by compressed file offset.
pub enum BlockCache {
    /// Unbounded mapping for files that fit the memory budget.
    Map(MapCache),
    /// Bounded segmented LRU for on-demand access to large files.
    Segmented(SegmentedLru),
}

impl BlockCache {
    /// Cache that retains every block it is given.
    pub fn unbounded(capacity: usize) -> Self {
        BlockCache::Map(MapCache::new(capacity))
    }

    /// Bounded cache holding at most `capacity` blocks across four queues.
    pub fn segmented(capacity: usize) -> Self {
        BlockCache::Segmented(SegmentedLru::new(capacity))
    }

    /// Look up a block. A hit on the segmented cache promotes the entry.
    pub fn get(&mut self, key: i64) -> Option<&[u8]> {
        match self {
            BlockCache::Map(cache) => cache.get(key),
            BlockCache::Segmented(cache) => cache.get(key),
        }
    }

    /// Store a block.
    pub fn set(&mut self, key: i64, value: Vec<u8>) {
        match self {
            BlockCache::Map(cache) => cache.set(key, value),
            BlockCache::Segmented(cache) => cache.set(key, value),
        }
    }
}

/// Unbounded block store for small files.
pub struct MapCache {
    data: HashMap<i64, Vec<u8>>,
}

impl MapCache {
    /// Create a map cache sized for roughly `capacity` blocks.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: HashMap::with_capacity(capacity),
        }
    }

    /// Look up a block.
    pub fn get(&self, key: i64) -> Option<&[u8]> {
        self.data.get(&key).map(Vec::as_slice)
    }

    /// Store a block.
    pub fn set(&mut self, key: i64, value: Vec<u8>) {
        self.data.insert(key, value);
    }
}

struct Node {
    key: i64,
    value: Vec<u8>,
    qid: usize,
    prev: usize,
    next: usize,
}

/// Segmented LRU over four promotion tiers (S4-LRU).
///
/// Every cached item lives in exactly one queue. New items enter at the front
/// of queue 0 and are only ever promoted one queue at a time on a hit; when
/// the next queue is full, the hit item trades places with that queue's tail
/// instead of growing it. Evictions only happen at queue 0's tail, so an item
/// must earn repeated hits to survive a scan of single-touch blocks.
pub struct SegmentedLru {
    cap: usize,
    lookup: HashMap<i64, usize>,
    nodes: Vec<Node>,
    heads: [usize; QUEUE_COUNT],
    tails: [usize; QUEUE_COUNT],
    lens: [usize; QUEUE_COUNT],
}

impl SegmentedLru {
    /// Create a cache with `capacity` total entries, split evenly across the
    /// four queues.
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.div_ceil(QUEUE_COUNT).max(1);
        Self {
            cap,
            lookup: HashMap::with_capacity(cap * QUEUE_COUNT),
            nodes: Vec::with_capacity(cap * QUEUE_COUNT),
            heads: [NIL; QUEUE_COUNT],
            tails: [NIL; QUEUE_COUNT],
            lens: [0; QUEUE_COUNT],
        }
    }

    /// Look up a block, promoting it one queue on a hit.
    pub fn get(&mut self, key: i64) -> Option<&[u8]> {
        let idx = *self.lookup.get(&key)?;
        let qid = self.nodes[idx].qid;

        if qid == QUEUE_COUNT - 1 {
            // Already at the top tier.
            self.move_to_front(idx);
            return Some(&self.nodes[idx].value);
        }

        if self.lens[qid + 1] < self.cap {
            // Room to move up a tier.
            self.detach(idx);
            self.attach_front(qid + 1, idx);
            return Some(&self.nodes[idx].value);
        }

        // Next tier is full: trade payloads with its tail. Both nodes keep
        // their queue and both move to their queue's front, so the requested
        // value ends up at the front of the next tier.
        let other = self.tails[qid + 1];
        self.swap_payload(idx, other);
        let demoted_key = self.nodes[idx].key;
        let promoted_key = self.nodes[other].key;
        self.lookup.insert(demoted_key, idx);
        self.lookup.insert(promoted_key, other);
        self.move_to_front(idx);
        self.move_to_front(other);
        Some(&self.nodes[other].value)
    }

    /// Store a block at the front of queue 0, reusing queue 0's tail entry
    /// when the queue is full.
    pub fn set(&mut self, key: i64, value: Vec<u8>) {
        if self.lens[0] < self.cap {
            let idx = self.nodes.len();
            self.nodes.push(Node {
                key,
                value,
                qid: 0,
                prev: NIL,
                next: NIL,
            });
            self.attach_front(0, idx);
            self.lookup.insert(key, idx);
            return;
        }

        let idx = self.tails[0];
        let old_key = self.nodes[idx].key;
        self.lookup.remove(&old_key);
        self.nodes[idx].key = key;
        self.nodes[idx].value = value;
        self.lookup.insert(key, idx);
        self.move_to_front(idx);
    }

    fn attach_front(&mut self, qid: usize, idx: usize) {
        let head = self.heads[qid];
        {
            let node = &mut self.nodes[idx];
            node.qid = qid;
            node.prev = NIL;
            node.next = head;
        }
        if head != NIL {
            self.nodes[head].prev = idx;
        } else {
            self.tails[qid] = idx;
        }
        self.heads[qid] = idx;
        self.lens[qid] += 1;
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next, qid) = {
            let node = &self.nodes[idx];
            (node.prev, node.next, node.qid)
        };
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.heads[qid] = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tails[qid] = prev;
        }
        self.lens[qid] -= 1;
    }

    fn move_to_front(&mut self, idx: usize) {
        let qid = self.nodes[idx].qid;
        if self.heads[qid] == idx {
            return;
        }
        self.detach(idx);
        self.attach_front(qid, idx);
    }

    /// Exchange key and value between two nodes, leaving queue membership and
    /// links untouched.
    fn swap_payload(&mut self, a: usize, b: usize) {
        debug_assert_ne!(a, b);
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.nodes.split_at_mut(hi);
        let x = &mut head[lo];
        let y = &mut tail[0];
        std::mem::swap(&mut x.key, &mut y.key);
        std::mem::swap(&mut x.value, &mut y.value);
    }

    #[cfg(test)]
    fn queue_of(&self, key: i64) -> Option<usize> {
        self.lookup.get(&key).map(|&idx| self.nodes[idx].qid)
    }

    #[cfg(test)]
    fn front_of_queue(&self, qid: usize) -> Option<i64> {
        let head = self.heads[qid];
        (head != NIL).then(|| self.nodes[head].key)
    }

    #[cfg(test)]
    fn total_len(&self) -> usize {
        self.lens.iter().sum()
    }

    #[cfg(test)]
    fn check_coherence(&self) {
        assert!(self.total_len() <= self.cap * QUEUE_COUNT);
        assert_eq!(self.lookup.len(), self.total_len());
        for (&key, &idx) in &self.lookup {
            assert_eq!(self.nodes[idx].key, key);
        }
        for qid in 0..QUEUE_COUNT {
            assert!(self.lens[qid] <= self.cap);
            // Walk the queue and confirm every node agrees on its qid.
            let mut idx = self.heads[qid];
            let mut count = 0;
            let mut prev = NIL;
            while idx != NIL {
                assert_eq!(self.nodes[idx].qid, qid);
                assert_eq!(self.nodes[idx].prev, prev);
                prev = idx;
                idx = self.nodes[idx].next;
                count += 1;
            }
            assert_eq!(count, self.lens[qid]);
            assert_eq!(self.tails[qid], prev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(n: u8) -> Vec<u8> {
        vec![n; 4]
    }

    #[test]
    fn test_map_cache_get_set() {
        let mut cache = BlockCache::unbounded(4);
        assert!(cache.get(0).is_none());
        cache.set(0, block(1));
        cache.set(65536, block(2));
        assert_eq!(cache.get(0), Some(&block(1)[..]));
        assert_eq!(cache.get(65536), Some(&block(2)[..]));
    }

    #[test]
    fn test_map_cache_never_evicts() {
        let mut cache = BlockCache::unbounded(1);
        for i in 0..100 {
            cache.set(i, block(i as u8));
        }
        for i in 0..100 {
            assert!(cache.get(i).is_some());
        }
    }

    #[test]
    fn test_segmented_insert_evicts_at_queue_zero_tail() {
        // Capacity 4 means one slot per queue: each insert after the first
        // reuses queue 0's only node and drops the previous key.
        let mut cache = SegmentedLru::new(4);
        for key in 1..=4 {
            cache.set(key, block(key as u8));
            cache.check_coherence();
        }
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_none());
        assert!(cache.get(3).is_none());
        assert_eq!(cache.get(4), Some(&block(4)[..]));
    }

    #[test]
    fn test_segmented_hits_climb_queues_then_stick_at_top() {
        let mut cache = SegmentedLru::new(4);
        cache.set(1, block(1));
        assert_eq!(cache.queue_of(1), Some(0));

        for expected_queue in 1..=3 {
            assert_eq!(cache.get(1), Some(&block(1)[..]));
            assert_eq!(cache.queue_of(1), Some(expected_queue));
            cache.check_coherence();
        }

        // A fourth hit stays at the front of the top queue.
        assert_eq!(cache.get(1), Some(&block(1)[..]));
        assert_eq!(cache.queue_of(1), Some(3));
        assert_eq!(cache.front_of_queue(3), Some(1));
        cache.check_coherence();
    }

    #[test]
    fn test_segmented_full_queue_swaps_with_tail() {
        // One slot per queue. Put key 1 in queue 1, then hit key 2 in
        // queue 0: queue 1 is full, so the two swap payloads in place.
        let mut cache = SegmentedLru::new(4);
        cache.set(1, block(1));
        cache.get(1);
        assert_eq!(cache.queue_of(1), Some(1));

        cache.set(2, block(2));
        assert_eq!(cache.get(2), Some(&block(2)[..]));
        cache.check_coherence();
        assert_eq!(cache.queue_of(2), Some(1));
        assert_eq!(cache.queue_of(1), Some(0));

        // Both keys still resolve to their own values after the swap.
        assert_eq!(cache.get(1), Some(&block(1)[..]));
        cache.check_coherence();
    }

    #[test]
    fn test_segmented_capacity_is_bounded() {
        let mut cache = SegmentedLru::new(16);
        for key in 0..1000 {
            cache.set(key, block((key % 251) as u8));
            if key % 3 == 0 {
                cache.get(key);
            }
            if key % 7 == 0 {
                cache.get(key - 1);
            }
        }
        cache.check_coherence();
        assert!(cache.total_len() <= 16);
    }

    #[test]
    fn test_segmented_scan_does_not_flush_promoted_entries() {
        let mut cache = SegmentedLru::new(8);
        cache.set(100, block(1));
        cache.get(100); // promote out of queue 0

        // A long single-touch scan churns queue 0 only.
        for key in 0..50 {
            cache.set(key, block(key as u8));
        }
        assert_eq!(cache.get(100), Some(&block(1)[..]));
        cache.check_coherence();
    }
}
