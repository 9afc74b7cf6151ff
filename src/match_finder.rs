//! Longest-match search over the sliding window.
//!
//! Every window position is a leaf of a Patricia-style tree whose edges are
//! keyed by the next byte. Children of a node are threaded through
//! hash buckets (`hash(parent, byte)`) as doubly linked lists. Internal nodes
//! record the depth at which they branch (`level`) and the most recent
//! position that passed through them (`position`), which is what lets a
//! lookup report the nearest match.
//!
//! Node ids share one index space:
//!
//! * `1..W` internal nodes, handed out by [`NodePool`]
//! * `W..W + 256` one root per leading byte (only `level`/`position` used)
//! * `W..2W` leaves, one per window slot (only `parent`/`prev`/`next` used)
//! * `2W..` hash bucket heads (only `next` used)
//!
//! Roots and leaves overlap in index space but never in the arrays they use.

use alloc::vec::Vec;

use crate::error::Error;
use crate::format::{Format, MAX_MATCH};
use crate::try_zeroed;

/// Null node id. Slot 0 of `parent` doubles as the search sentinel in [`MatchFinder::child`].
const NIL: u32 = 0;

/// Marks a `position` entry whose ancestors still need a refresh on deletion.
const PERC_FLAG: u32 = 0x8000_0000;

/// Free list of internal node ids.
///
/// Ids come back out in last-released-first order, starting from 1.
struct NodePool {
    free: Vec<u32>,
}

impl NodePool {
    fn new(window: usize) -> Result<Self, Error> {
        let mut free = Vec::new();
        free.try_reserve_exact(window)
            .map_err(|_| Error::OutOfMemory)?;
        free.extend((1..window as u32).rev());
        Ok(Self { free })
    }

    /// Takes an unused internal node.
    fn alloc(&mut self) -> u32 {
        // The tree never holds more internal nodes than window slots.
        debug_assert!(!self.free.is_empty(), "internal node pool exhausted");
        self.free.pop().unwrap_or(NIL)
    }

    fn release(&mut self, node: u32) {
        debug_assert!(node != NIL);
        self.free.push(node);
    }
}

/// Window buffer, match tree, and the cursor over the input.
pub(crate) struct MatchFinder<'a> {
    input: &'a [u8],
    /// Bytes of `input` already copied into `text`.
    consumed: usize,

    window: usize,
    window_bits: u32,

    /// `2W + MAX_MATCH` bytes. The current position always lies in `W..2W`,
    /// so a match never has to wrap.
    text: Vec<u8>,
    level: Vec<u16>,
    child_count: Vec<u16>,
    position: Vec<u32>,
    parent: Vec<u32>,
    prev: Vec<u32>,
    next: Vec<u32>,
    pool: NodePool,

    pos: usize,
    match_len: usize,
    match_pos: usize,
    /// Input bytes from `pos` onwards not yet passed.
    remainder: usize,
}

impl<'a> MatchFinder<'a> {
    /// Allocates the window and tree arena for `format` and primes the first position.
    pub(crate) fn new(input: &'a [u8], format: Format) -> Result<Self, Error> {
        let window = format.window_size();
        let window_bits = format.window_bits();
        let max_hash = 3 * window + (window / 512 + 1) * u8::MAX as usize;

        let mut finder = Self {
            input,
            consumed: 0,
            window,
            window_bits,
            text: try_zeroed(2 * window + MAX_MATCH)?,
            level: try_zeroed(window + 256)?,
            child_count: try_zeroed(window)?,
            position: try_zeroed(window + 256)?,
            parent: try_zeroed(2 * window)?,
            prev: try_zeroed(2 * window)?,
            next: try_zeroed(max_hash + 1)?,
            pool: NodePool::new(window)?,
            pos: window,
            match_len: 0,
            match_pos: 0,
            remainder: 0,
        };

        finder.level[window..].fill(1);
        finder.remainder = finder.read_input(window, window + MAX_MATCH);
        finder.insert_node();
        Ok(finder)
    }

    #[inline]
    pub(crate) const fn remainder(&self) -> usize {
        self.remainder
    }

    /// Length of the best match for the current position.
    #[inline]
    pub(crate) const fn match_len(&self) -> usize {
        self.match_len
    }

    /// Window index of the best match for the current position.
    #[inline]
    pub(crate) const fn match_pos(&self) -> usize {
        self.match_pos
    }

    /// The byte just before the current position.
    #[inline]
    pub(crate) fn previous_byte(&self) -> u8 {
        self.text[self.pos - 1]
    }

    /// Backward distance, minus one, from the previous position to `match_pos`.
    #[inline]
    pub(crate) const fn distance_from(&self, match_pos: usize) -> usize {
        self.pos.wrapping_sub(match_pos).wrapping_sub(2) & (self.window - 1)
    }

    /// Clips the current match to the input that is actually left.
    #[inline]
    pub(crate) fn clamp_to_remainder(&mut self) {
        self.match_len = self.match_len.min(self.remainder);
    }

    /// Moves to the next position: slides the window when the cursor reaches
    /// its end, evicts the slot falling out of the window, and inserts the new
    /// position, updating the best match.
    pub(crate) fn advance(&mut self) {
        self.remainder -= 1;
        self.pos += 1;
        if self.pos == 2 * self.window {
            let w = self.window;
            self.text.copy_within(w..2 * w + MAX_MATCH, 0);
            let n = self.read_input(w + MAX_MATCH, w);
            self.remainder += n;
            self.pos = w;
        }
        self.delete_node();
        self.insert_node();
    }

    /// Copies up to `max` input bytes into `text[at..]`.
    fn read_input(&mut self, at: usize, max: usize) -> usize {
        let n = max.min(self.input.len() - self.consumed);
        self.text[at..at + n].copy_from_slice(&self.input[self.consumed..self.consumed + n]);
        self.consumed += n;
        n
    }

    #[inline]
    fn hash(&self, node: u32, byte: u8) -> usize {
        node as usize + ((byte as usize) << (self.window_bits - 9)) + 2 * self.window
    }

    /// The child of `q` reached through `byte`, or [`NIL`].
    fn child(&mut self, q: u32, byte: u8) -> u32 {
        let mut r = self.next[self.hash(q, byte)];
        self.parent[NIL as usize] = q;
        while self.parent[r as usize] != q {
            r = self.next[r as usize];
        }
        r
    }

    fn make_child(&mut self, q: u32, byte: u8, r: u32) {
        let h = self.hash(q, byte);
        let old_head = self.next[h];
        self.next[h] = r;
        self.next[r as usize] = old_head;
        self.prev[old_head as usize] = r;
        self.prev[r as usize] = h as u32;
        self.parent[r as usize] = q;
        // Roots never collapse, so only internal nodes keep a count.
        if (q as usize) < self.window {
            self.child_count[q as usize] += 1;
        }
    }

    /// Inserts an internal node above `old` at the divergence depth `match_len`,
    /// with `old` and the current position as its two children.
    fn split(&mut self, old: u32) {
        let new = self.pool.alloc();
        let (o, nw) = (old as usize, new as usize);

        self.child_count[nw] = 0;
        let t = self.prev[o];
        self.prev[nw] = t;
        self.next[t as usize] = new;
        let t = self.next[o];
        self.next[nw] = t;
        self.prev[t as usize] = new;
        self.parent[nw] = self.parent[o];
        self.level[nw] = self.match_len as u16;
        self.position[nw] = self.pos as u32;

        let old_byte = self.text[self.match_pos + self.match_len];
        let new_byte = self.text[self.pos + self.match_len];
        self.make_child(new, old_byte, old);
        self.make_child(new, new_byte, self.pos as u32);
    }

    /// Inserts the current position and leaves the longest match in
    /// `match_len`/`match_pos`.
    fn insert_node(&mut self) {
        let w = self.window;
        let pos = self.pos;
        let mut q: u32;
        let mut r: u32;

        if self.match_len >= 4 {
            // The previous match continues one byte later: start from the leaf
            // after the old match and climb to the node covering `match_len - 1`.
            self.match_len -= 1;
            r = ((self.match_pos + 1) | w) as u32;
            q = self.parent[r as usize];
            while q == NIL {
                r = self.next[r as usize];
                q = self.parent[r as usize];
            }
            while self.level[q as usize] as usize >= self.match_len {
                r = q;
                q = self.parent[q as usize];
            }
            let mut t = q;
            while self.position[t as usize] & PERC_FLAG != 0 {
                self.position[t as usize] = pos as u32;
                t = self.parent[t as usize];
            }
            if (t as usize) < w {
                self.position[t as usize] = pos as u32 | PERC_FLAG;
            }
        } else {
            q = (self.text[pos] as usize + w) as u32;
            let byte = self.text[pos + 1];
            r = self.child(q, byte);
            if r == NIL {
                self.make_child(q, byte, pos as u32);
                self.match_len = 1;
                return;
            }
            self.match_len = 2;
        }

        loop {
            let limit = if r as usize >= w {
                self.match_pos = r as usize;
                MAX_MATCH
            } else {
                self.match_pos = (self.position[r as usize] & !PERC_FLAG) as usize;
                self.level[r as usize] as usize
            };
            if self.match_pos >= pos {
                self.match_pos -= w;
            }

            while self.match_len < limit {
                if self.text[pos + self.match_len] != self.text[self.match_pos + self.match_len] {
                    self.split(r);
                    return;
                }
                self.match_len += 1;
            }

            if self.match_len >= MAX_MATCH {
                break;
            }

            self.position[r as usize] = pos as u32;
            q = r;
            let byte = self.text[pos + self.match_len];
            r = self.child(q, byte);
            if r == NIL {
                self.make_child(q, byte, pos as u32);
                return;
            }
            self.match_len += 1;
        }

        // Full-length match: the current position takes over leaf `r`'s place.
        // `next[r]` then forwards to its replacement.
        let (r, p) = (r as usize, pos as u32);
        let t = self.prev[r];
        self.prev[pos] = t;
        self.next[t as usize] = p;
        let t = self.next[r];
        self.next[pos] = t;
        self.prev[t as usize] = p;
        self.parent[pos] = q;
        self.parent[r] = NIL;
        self.next[r] = p;
    }

    /// Removes the leaf for the window slot at the current position, collapsing
    /// its parent when only one child remains.
    fn delete_node(&mut self) {
        let w = self.window;
        let pos = self.pos;

        if self.parent[pos] == NIL {
            return;
        }

        let r = self.prev[pos];
        let s = self.next[pos];
        self.next[r as usize] = s;
        self.prev[s as usize] = r;

        let r = self.parent[pos] as usize;
        self.parent[pos] = NIL;
        if r >= w {
            return;
        }
        self.child_count[r] -= 1;
        if self.child_count[r] > 1 {
            return;
        }

        let mut t = (self.position[r] & !PERC_FLAG) as usize;
        if t >= pos {
            t -= w;
        }

        // Propagate the freshest position to ancestors still flagged.
        let mut s = t;
        let mut q = self.parent[r] as usize;
        let mut u = self.position[q];
        while u & PERC_FLAG != 0 {
            let mut up = (u & !PERC_FLAG) as usize;
            if up >= pos {
                up -= w;
            }
            s = s.max(up);
            self.position[q] = (s | w) as u32;
            q = self.parent[q] as usize;
            u = self.position[q];
        }
        if q < w {
            let mut up = u as usize;
            if up >= pos {
                up -= w;
            }
            s = s.max(up);
            self.position[q] = (s | w) as u32 | PERC_FLAG;
        }

        // Splice the surviving child into `r`'s place and recycle `r`.
        let survivor = self.child(r as u32, self.text[t + self.level[r] as usize]);
        let sv = survivor as usize;
        let t = self.prev[sv];
        let u = self.next[sv];
        self.next[t as usize] = u;
        self.prev[u as usize] = t;
        let t = self.prev[r];
        self.next[t as usize] = survivor;
        self.prev[sv] = t;
        let t = self.next[r];
        self.prev[t as usize] = survivor;
        self.next[sv] = t;
        self.parent[sv] = self.parent[r];
        self.parent[r] = NIL;
        self.pool.release(r as u32);
    }
}
