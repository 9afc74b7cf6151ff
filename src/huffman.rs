//! Length-limited canonical Huffman code construction for the encoder.
//!
//! Codes never exceed [`MAX_CODE_LEN`] bits. Lengths are assigned from the
//! order in which leaves leave the heap, so the code depends only on the
//! frequency table and the decoder can rebuild it from lengths alone.

use alloc::vec::Vec;

use crate::error::Error;
use crate::try_zeroed;

/// Longest code the format can describe.
pub(crate) const MAX_CODE_LEN: usize = 16;

/// Reusable scratch for building codes over alphabets of up to `capacity` symbols.
pub(crate) struct TreeBuilder {
    /// Min-heap of node ids, 1-based.
    heap: Vec<usize>,
    heap_size: usize,
    /// Leaf frequencies followed by internal node weights.
    freq: Vec<u32>,
    left: Vec<usize>,
    right: Vec<usize>,
    /// Leaves in the order they were popped, least frequent first.
    sorted: Vec<usize>,
    stack: Vec<(usize, usize)>,
    len_count: [u32; MAX_CODE_LEN + 1],
}

impl TreeBuilder {
    pub(crate) fn new(capacity: usize) -> Result<Self, Error> {
        let nodes = 2 * capacity - 1;
        Ok(Self {
            heap: try_zeroed(capacity + 1)?,
            heap_size: 0,
            freq: try_zeroed(nodes)?,
            left: try_zeroed(nodes)?,
            right: try_zeroed(nodes)?,
            sorted: Vec::with_capacity(capacity),
            stack: Vec::with_capacity(capacity),
            len_count: [0; MAX_CODE_LEN + 1],
        })
    }

    /// Builds code lengths and canonical codes for `freq`.
    ///
    /// Returns the root node. A root below `freq.len()` means fewer than two
    /// symbols occurred: the root is then the only symbol (or 0), every length
    /// is zero, and the caller sends the table in its single-symbol form.
    pub(crate) fn build(&mut self, freq: &[u32], lens: &mut [u8], codes: &mut [u16]) -> usize {
        let n = freq.len();
        debug_assert!(n <= self.heap.len() - 1);
        debug_assert!(lens.len() == n && codes.len() == n);

        self.freq[..n].copy_from_slice(freq);
        lens.fill(0);

        self.heap_size = 0;
        self.heap[1] = 0;
        for (symbol, &f) in freq.iter().enumerate() {
            if f != 0 {
                self.heap_size += 1;
                self.heap[self.heap_size] = symbol;
            }
        }

        if self.heap_size < 2 {
            let root = self.heap[1];
            codes[root] = 0;
            return root;
        }

        for i in (1..=self.heap_size / 2).rev() {
            self.down_heap(i);
        }

        self.sorted.clear();
        let mut avail = n;
        let root = loop {
            let first = self.heap[1];
            if first < n {
                self.sorted.push(first);
            }
            self.heap[1] = self.heap[self.heap_size];
            self.heap_size -= 1;
            self.down_heap(1);

            let second = self.heap[1];
            if second < n {
                self.sorted.push(second);
            }

            let parent = avail;
            avail += 1;
            self.freq[parent] = self.freq[first] + self.freq[second];
            self.heap[1] = parent;
            self.down_heap(1);
            self.left[parent] = first;
            self.right[parent] = second;

            if self.heap_size <= 1 {
                break parent;
            }
        };

        self.make_len(root, n, lens);
        self.make_code(lens, codes);
        root
    }

    /// Sifts the entry at `i` down the heap.
    fn down_heap(&mut self, mut i: usize) {
        let k = self.heap[i];
        loop {
            let mut j = 2 * i;
            if j > self.heap_size {
                break;
            }
            if j < self.heap_size && self.freq[self.heap[j]] > self.freq[self.heap[j + 1]] {
                j += 1;
            }
            if self.freq[k] <= self.freq[self.heap[j]] {
                break;
            }
            self.heap[i] = self.heap[j];
            i = j;
        }
        self.heap[i] = k;
    }

    /// Counts leaves per depth, folds anything deeper than the limit back
    /// until the Kraft sum is exactly `2^16`, then hands out lengths.
    fn make_len(&mut self, root: usize, n: usize, lens: &mut [u8]) {
        self.len_count = [0; MAX_CODE_LEN + 1];

        self.stack.clear();
        self.stack.push((root, 0));
        while let Some((node, depth)) = self.stack.pop() {
            if node < n {
                self.len_count[depth.min(MAX_CODE_LEN)] += 1;
            } else {
                self.stack.push((self.right[node], depth + 1));
                self.stack.push((self.left[node], depth + 1));
            }
        }

        let mut sum: u32 = (1..=MAX_CODE_LEN)
            .map(|len| self.len_count[len] << (MAX_CODE_LEN - len))
            .sum();

        while sum != 1 << MAX_CODE_LEN {
            self.len_count[MAX_CODE_LEN] -= 1;
            for len in (1..MAX_CODE_LEN).rev() {
                if self.len_count[len] != 0 {
                    self.len_count[len] -= 1;
                    self.len_count[len + 1] += 2;
                    break;
                }
            }
            sum -= 1;
        }

        let mut leaves = self.sorted.iter();
        for len in (1..=MAX_CODE_LEN).rev() {
            for _ in 0..self.len_count[len] {
                if let Some(&symbol) = leaves.next() {
                    lens[symbol] = len as u8;
                }
            }
        }
    }

    /// Assigns canonical codes: shorter first, ties broken by symbol order.
    fn make_code(&self, lens: &[u8], codes: &mut [u16]) {
        let mut start = [0u16; MAX_CODE_LEN + 2];
        for len in 1..=MAX_CODE_LEN {
            start[len + 1] = start[len].wrapping_add(self.len_count[len] as u16) << 1;
        }
        for (code, &len) in codes.iter_mut().zip(lens) {
            let len = len as usize;
            *code = start[len];
            start[len] = start[len].wrapping_add(1);
        }
    }
}

/// Kraft sum of a length set scaled to 16 bits. A complete code sums to `2^16`.
pub(crate) fn kraft_sum(lens: &[u8]) -> u32 {
    lens.iter()
        .filter(|&&len| len != 0)
        .map(|&len| 1u32 << (MAX_CODE_LEN - len as usize))
        .sum()
}
