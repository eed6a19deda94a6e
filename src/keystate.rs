//! Per-node key state as seen by the coordinator.
//!
//! Double buffered: the aggregator writes payload words into the write half
//! while a cycle is in flight; a completed cycle publishes it, which yields
//! the per-slot change mask against the previous cycle and hands the fresh
//! words to readers. An aborted cycle never publishes, so readers only ever
//! see complete cycles.

use crate::config::MAX_NODES;

/// Published result of the last completed cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot<'a> {
    /// Payload word per node, index 0 = node nearest the coordinator.
    pub words: &'a [u8],

    /// Nodes present in that cycle.
    pub rabies: usize,
}

/// Double-buffered key words plus the change mask of the last publish.
pub struct KeyStates<const N: usize = MAX_NODES> {
    buffers: [[u8; N]; 2],

    /// Index of the buffer being filled.
    write: usize,

    /// XOR of the last two published cycles.
    edges: [u8; N],

    /// Nodes in the last published cycle.
    rabies: usize,
}

impl<const N: usize> KeyStates<N> {
    pub const fn new() -> Self {
        Self {
            buffers: [[0; N]; 2],
            write: 0,
            edges: [0; N],
            rabies: 0,
        }
    }

    /// Capacity in nodes.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Store `word` for node `idx` of the cycle in flight.
    ///
    /// Out-of-range indices are ignored; the aggregator resyncs before it
    /// would ever produce one.
    #[inline]
    pub fn write_slot(&mut self, idx: usize, word: u8) {
        if let Some(slot) = self.buffers[self.write].get_mut(idx) {
            *slot = word;
        }
    }

    /// Commit the cycle in flight with `count` nodes.
    ///
    /// Slots at and beyond `count` read as zero after publishing, so a node
    /// leaving the chain shows up as a release edge.
    pub fn publish(&mut self, count: usize) {
        let count = count.min(N);
        let write = self.write;
        let read = write ^ 1;

        self.buffers[write][count..].fill(0);
        for ((edge, fresh), old) in self
            .edges
            .iter_mut()
            .zip(&self.buffers[write])
            .zip(&self.buffers[read])
        {
            *edge = fresh ^ old;
        }

        self.rabies = count;
        self.write = read;
        self.buffers[read].fill(0);
    }

    /// Words of the last completed cycle.
    pub fn latest_snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            words: &self.buffers[self.write ^ 1][..self.rabies],
            rabies: self.rabies,
        }
    }

    /// Change mask per node between the last two completed cycles.
    pub fn edge_events(&self) -> &[u8] {
        &self.edges
    }

    /// Whether any payload bit of node `idx` changed in the last publish.
    #[inline]
    pub fn edge(&self, idx: usize) -> bool {
        self.edges.get(idx).is_some_and(|&e| e != 0)
    }
}

impl<const N: usize> Default for KeyStates<N> {
    fn default() -> Self {
        Self::new()
    }
}
