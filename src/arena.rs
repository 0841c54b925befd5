//! Bump-pointer staging arena.
//!
//! Transient strings and buffers that cross the host boundary are staged here
//! so that a whole conversion can be released as one unit, with no per-item
//! deallocation bookkeeping. The arena is monotonic: nothing is freed until
//! the arena itself is finalized (or dropped), and freed space is never
//! reused while the arena is live.

/// Default floor for fresh block capacity, in bytes.
pub const DEFAULT_MIN_BLOCK: usize = 4096;

/// Bookkeeping reserve counted into fresh block sizing.
const BLOCK_HEADER: usize = std::mem::size_of::<Block>();

/// Handle to a region staged in an [`Arena`], valid until the arena is
/// finalized. Spans are never released individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    block: u32,
    offset: u32,
    len: u32,
}

impl Span {
    /// Length of the staged region in bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug)]
struct Block {
    storage: Box<[u8]>,
    used: usize,
}

impl Block {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    fn free(&self) -> usize {
        self.storage.len() - self.used
    }
}

/// Monotonic bump allocator over an owned list of blocks.
///
/// Growth policy: when no block exists, or the allocation head lacks room,
/// a new head block is pushed with capacity
/// `max(min_block, next_power_of_two(size + header))`. Blocks are only ever
/// released together, by [`Arena::finalize`] or by dropping the arena.
#[derive(Debug)]
pub struct Arena {
    blocks: Vec<Block>,
    min_block: usize,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    pub fn new() -> Self {
        Self::with_min_block(DEFAULT_MIN_BLOCK)
    }

    /// Arena whose fresh blocks are at least `min_block` bytes.
    pub fn with_min_block(min_block: usize) -> Self {
        Self {
            blocks: Vec::new(),
            min_block,
        }
    }

    /// Stages `size` bytes and returns a span over them. The returned region
    /// is zero-initialized. Spans index with `u32`, so a single request is
    /// capped at `u32::MAX` bytes (checked in debug builds). Underlying
    /// allocation failure is fatal, matching the allocation-failure policy of
    /// the engines this crate bridges to.
    pub fn alloc(&mut self, size: usize) -> Span {
        debug_assert!(
            size <= u32::MAX as usize,
            "staging request of {size} bytes exceeds span range"
        );
        if self.blocks.last().map_or(true, |head| head.free() < size) {
            let capacity = (size + BLOCK_HEADER).next_power_of_two().max(self.min_block);
            self.blocks.push(Block::with_capacity(capacity));
        }
        // 上面保证了头块有足够空间
        let block = self.blocks.len() - 1;
        let head = &mut self.blocks[block];
        let span = Span {
            block: block as u32,
            offset: head.used as u32,
            len: size as u32,
        };
        head.used += size;
        span
    }

    /// Stages a copy of `bytes`.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Span {
        let span = self.alloc(bytes.len());
        let start = span.offset as usize;
        let head = &mut self.blocks[span.block as usize];
        head.storage[start..start + bytes.len()].copy_from_slice(bytes);
        span
    }

    /// Stages a copy of `s` with a trailing NUL, so the staged bytes can be
    /// handed to engines with C-string expectations. The returned span covers
    /// the text without the terminator.
    pub fn push_str(&mut self, s: &str) -> Span {
        let staged = self.alloc(s.len() + 1);
        let start = staged.offset as usize;
        let head = &mut self.blocks[staged.block as usize];
        head.storage[start..start + s.len()].copy_from_slice(s.as_bytes());
        head.storage[start + s.len()] = 0;
        Span {
            len: s.len() as u32,
            ..staged
        }
    }

    /// Resolves a span to its staged bytes.
    pub fn get(&self, span: Span) -> &[u8] {
        let start = span.offset as usize;
        &self.blocks[span.block as usize].storage[start..start + span.len()]
    }

    /// Resolves a span staged by [`Arena::push_str`] back to text.
    pub fn get_str(&self, span: Span) -> &str {
        // push_str only stages valid UTF-8
        std::str::from_utf8(self.get(span)).unwrap_or_default()
    }

    /// Total bytes handed out across all `alloc` calls.
    pub fn allocated(&self) -> usize {
        self.blocks.iter().map(|b| b.used).sum()
    }

    /// Total capacity across all blocks.
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(|b| b.storage.len()).sum()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Releases every block as one unit. Dropping the arena has the same
    /// effect; finalizing an arena that never allocated is a no-op.
    pub fn finalize(self) {
        tracing::trace!(
            target: "bridge",
            blocks = self.block_count(),
            bytes = self.allocated(),
            "arena finalized"
        );
    }
}
