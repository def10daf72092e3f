use {
    candle_core::{DType, Tensor},
    std::{
        fmt,
        sync::{
            Arc,
            atomic::{AtomicU64, AtomicUsize, Ordering},
        },
    },
};

/// Role of an intermediate buffer in the frame chain, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    RawPixels,
    Resized,
    FloatCast,
    Scaled,
    Centered,
    Batched,
    Inferred,
    Unbatched,
    Rescaled,
    Shifted,
    Clipped,
}

impl BufferRole {
    pub const ALL: [BufferRole; 11] = [
        BufferRole::RawPixels,
        BufferRole::Resized,
        BufferRole::FloatCast,
        BufferRole::Scaled,
        BufferRole::Centered,
        BufferRole::Batched,
        BufferRole::Inferred,
        BufferRole::Unbatched,
        BufferRole::Rescaled,
        BufferRole::Shifted,
        BufferRole::Clipped,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferRole::RawPixels => "raw-pixels",
            BufferRole::Resized => "resized",
            BufferRole::FloatCast => "float-cast",
            BufferRole::Scaled => "scaled",
            BufferRole::Centered => "centered",
            BufferRole::Batched => "batched",
            BufferRole::Inferred => "inferred",
            BufferRole::Unbatched => "unbatched",
            BufferRole::Rescaled => "rescaled",
            BufferRole::Shifted => "shifted",
            BufferRole::Clipped => "clipped",
        }
    }
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One intermediate tensor, tagged with the role it plays.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    role: BufferRole,
    tensor: Tensor,
}

impl FrameBuffer {
    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn dims(&self) -> &[usize] {
        self.tensor.dims()
    }

    pub fn dtype(&self) -> DType {
        self.tensor.dtype()
    }
}

#[derive(Debug, Default)]
struct LedgerCounts {
    allocated: AtomicU64,
    released: AtomicU64,
    live: AtomicUsize,
    peak: AtomicUsize,
}

/// Shared allocation counters for every arena created from it.
#[derive(Debug, Clone, Default)]
pub struct BufferLedger {
    counts: Arc<LedgerCounts>,
}

impl BufferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocated(&self) -> u64 {
        self.counts.allocated.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.counts.released.load(Ordering::Relaxed)
    }

    /// Buffers currently held by some arena.
    pub fn live(&self) -> usize {
        self.counts.live.load(Ordering::Relaxed)
    }

    /// Highest `live` ever observed.
    pub fn peak(&self) -> usize {
        self.counts.peak.load(Ordering::Relaxed)
    }

    fn record_alloc(&self) {
        self.counts.allocated.fetch_add(1, Ordering::Relaxed);
        let live = self.counts.live.fetch_add(1, Ordering::Relaxed) + 1;
        self.counts.peak.fetch_max(live, Ordering::Relaxed);
    }

    fn record_release(&self) {
        self.counts.released.fetch_add(1, Ordering::Relaxed);
        self.counts.live.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Owner of every buffer one invocation creates.
///
/// Holds at most one buffer per role. Dropping the arena releases whatever is
/// still held, so early returns cannot leak.
pub struct BufferArena {
    ledger: BufferLedger,
    slots: [Option<FrameBuffer>; 11],
}

impl BufferArena {
    pub fn new(ledger: BufferLedger) -> Self {
        Self {
            ledger,
            slots: Default::default(),
        }
    }

    /// Store `tensor` under `role`, releasing a previous buffer with that role.
    pub fn alloc(&mut self, role: BufferRole, tensor: Tensor) -> &FrameBuffer {
        self.release(role);
        self.ledger.record_alloc();
        self.slots[role.index()].insert(FrameBuffer { role, tensor })
    }

    pub fn get(&self, role: BufferRole) -> Option<&FrameBuffer> {
        self.slots[role.index()].as_ref()
    }

    pub fn tensor(&self, role: BufferRole) -> Option<&Tensor> {
        self.get(role).map(FrameBuffer::tensor)
    }

    /// Release the buffer held under `role`. Returns whether one was held.
    pub fn release(&mut self, role: BufferRole) -> bool {
        match self.slots[role.index()].take() {
            Some(_) => {
                self.ledger.record_release();
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        for role in BufferRole::ALL {
            self.release(role);
        }
    }

    /// Number of buffers this arena currently holds.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn roles(&self) -> impl Iterator<Item = BufferRole> + '_ {
        self.slots.iter().flatten().map(FrameBuffer::role)
    }
}

impl Drop for BufferArena {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use {super::*, candle_core::Device};

    fn scalar(value: f32) -> Tensor {
        Tensor::new(&[value], &Device::Cpu).unwrap()
    }

    #[test]
    fn test_role_order_matches_index() {
        for (i, role) in BufferRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }

    #[test]
    fn test_arena_drop_releases_everything() {
        let ledger = BufferLedger::new();
        {
            let mut arena = BufferArena::new(ledger.clone());
            arena.alloc(BufferRole::RawPixels, scalar(1.0));
            arena.alloc(BufferRole::Resized, scalar(2.0));
            assert_eq!(arena.live(), 2);
            assert_eq!(ledger.live(), 2);
        }
        assert_eq!(ledger.live(), 0);
        assert_eq!(ledger.allocated(), 2);
        assert_eq!(ledger.released(), 2);
        assert_eq!(ledger.peak(), 2);
    }

    #[test]
    fn test_arena_one_buffer_per_role() {
        let ledger = BufferLedger::new();
        let mut arena = BufferArena::new(ledger.clone());
        arena.alloc(BufferRole::Scaled, scalar(1.0));
        arena.alloc(BufferRole::Scaled, scalar(2.0));
        assert_eq!(arena.live(), 1);
        assert_eq!(ledger.live(), 1);
        assert_eq!(ledger.released(), 1);
        let value = arena.tensor(BufferRole::Scaled).unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(value, vec![2.0]);
    }

    #[test]
    fn test_arena_early_release() {
        let ledger = BufferLedger::new();
        let mut arena = BufferArena::new(ledger.clone());
        arena.alloc(BufferRole::Batched, scalar(0.0));
        assert!(arena.release(BufferRole::Batched));
        assert!(!arena.release(BufferRole::Batched));
        assert_eq!(arena.roles().count(), 0);
        drop(arena);
        assert_eq!(ledger.allocated(), ledger.released());
    }
}
