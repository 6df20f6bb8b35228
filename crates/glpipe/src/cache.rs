//! Vertex cache slot assignment and triangle assembly.
use strum::FromRepr;

/// Primitive topologies, identified by their GL enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromRepr)]
#[repr(u32)]
pub enum Topology {
    #[default]
    Triangles = 0x4,
    TriangleStrip = 0x5,
    TriangleFan = 0x6,
    Quads = 0x7,
    QuadStrip = 0x8,
    Polygon = 0x9,
}

impl Topology {
    /// Whether the first vertex of the primitive is shared by every triangle.
    pub fn locks_first(self) -> bool {
        matches!(self, Self::TriangleFan | Self::Quads | Self::Polygon)
    }
}

/// The vertex store of the coprocessor, as seen by the dispatcher.
pub trait VertexCache {
    /// Returns the slot holding vertex `id`, assigning one if it is not resident. The flag is
    /// `true` when the slot was newly assigned and must be filled. Returns `None` if no slot can
    /// be assigned.
    fn lookup_or_assign(&mut self, id: u32) -> Option<(u8, bool)>;

    /// Feeds the most recently submitted slot to the assembler, returning the slots of a
    /// triangle once the topology has accumulated one.
    fn try_complete_triangle(&mut self, slot: u8) -> Option<[u8; 3]>;

    /// Forgets every resident vertex and starts a new primitive.
    fn reset(&mut self, topology: Topology);
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    id: Option<u32>,
    last_use: u64,
}

/// An LRU vertex cache with a single lockable slot.
#[derive(Debug, Clone)]
pub struct PrimitiveCache {
    slots: Vec<Slot>,
    clock: u64,
    locked: Option<u8>,
    lock_next: bool,

    topology: Topology,
    indices: [u8; 3],
    progress: usize,
    counter: u32,
}

impl PrimitiveCache {
    pub fn new(capacity: u32) -> Self {
        assert!(
            (4..=256).contains(&capacity),
            "vertex cache capacity must be within 4..=256"
        );

        Self {
            slots: vec![Slot::default(); capacity as usize],
            clock: 0,
            locked: None,
            lock_next: false,

            topology: Topology::default(),
            indices: [0; 3],
            progress: 0,
            counter: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// The slot protected from eviction, if any.
    pub fn locked(&self) -> Option<u8> {
        self.locked
    }

    fn pending(&self) -> &[u8] {
        &self.indices[..self.progress]
    }

    fn victim(&self) -> Option<u8> {
        if let Some(free) = self.slots.iter().position(|s| s.id.is_none()) {
            return Some(free as u8);
        }

        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u8, s))
            .filter(|(i, _)| Some(*i) != self.locked && !self.pending().contains(i))
            .min_by_key(|(_, s)| s.last_use)
            .map(|(i, _)| i)
    }
}

impl VertexCache for PrimitiveCache {
    fn lookup_or_assign(&mut self, id: u32) -> Option<(u8, bool)> {
        self.clock += 1;

        let (slot, new) = match self.slots.iter().position(|s| s.id == Some(id)) {
            Some(slot) => (slot as u8, false),
            None => {
                let slot = self.victim()?;
                self.slots[slot as usize].id = Some(id);
                (slot, true)
            }
        };

        self.slots[slot as usize].last_use = self.clock;
        if std::mem::take(&mut self.lock_next) {
            self.locked = Some(slot);
        }

        tracing::trace!(id, slot, new, "vertex cache lookup");
        Some((slot, new))
    }

    fn try_complete_triangle(&mut self, slot: u8) -> Option<[u8; 3]> {
        self.indices[self.progress] = slot;
        self.progress += 1;

        if self.progress < 3 {
            return None;
        }

        let triangle = self.indices;
        match self.topology {
            Topology::Triangles => self.progress = 0,
            Topology::TriangleStrip | Topology::QuadStrip => {
                self.indices[(self.counter % 2) as usize] = self.indices[2];
                self.progress = 2;
            }
            Topology::TriangleFan | Topology::Polygon => {
                self.indices[1] = self.indices[2];
                self.progress = 2;
            }
            Topology::Quads => {
                if self.counter % 2 == 0 {
                    self.indices[1] = self.indices[2];
                    self.progress = 2;
                } else {
                    self.progress = 0;
                    self.lock_next = true;
                }
            }
        }

        self.counter += 1;
        Some(triangle)
    }

    fn reset(&mut self, topology: Topology) {
        self.slots.fill(Slot::default());
        self.clock = 0;
        self.locked = None;
        self.lock_next = topology.locks_first();

        self.topology = topology;
        self.progress = 0;
        self.counter = 0;
    }
}
