mod attr;

use crate::{builder::attr::AttributeExt, layout::VertexLayout};
use glpipe::attrib::{self, AttributeClass};
use rspasm::{Ins, Reg};

/// Maximum number of instructions in a loader.
pub const MAX_LOADER_INS: usize = 10;

/// Registers the pipeline microcode sets up before running a loader.
pub mod regs {
    use rspasm::Reg;

    /// Points at the default vectors of the pipeline state.
    pub const DEFAULTS: Reg = 16;
    /// Points at the current-attribute registers of the pipeline state.
    pub const CURRENT: Reg = 17;
    /// Points at the attribute payload of the vertex command.
    pub const CMD: Reg = 20;
    /// Receives the packed normal.
    pub const NORMAL: Reg = 2;
    /// First destination vector register, one per attribute in wire order.
    pub const DST_BASE: Reg = 24;
}

/// A generated loader and the size of the vertex command it consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loader {
    pub code: Vec<Ins>,
    /// Size of the vertex command in bytes, header included.
    pub cmd_size: u32,
}

impl Loader {
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.code.iter().map(|ins| ins.encode())
    }
}

pub struct LoaderBuilder {
    layout: VertexLayout,
    code: Vec<Ins>,
    /// Offset of the next attribute relative to the command register.
    cmd_offset: u32,
    /// Payload bytes consumed so far.
    consumed: u32,
}

impl LoaderBuilder {
    pub fn new(layout: VertexLayout) -> Self {
        Self {
            layout,
            code: Vec::with_capacity(MAX_LOADER_INS),
            cmd_offset: 0,
            consumed: 0,
        }
    }

    fn emit(&mut self, ins: Ins) {
        assert!(self.code.len() < MAX_LOADER_INS, "loader too long");
        self.code.push(ins);
    }

    /// Advances the command register if the current offset is not a multiple of `alignment`.
    fn align(&mut self, alignment: u32) {
        if self.cmd_offset & (alignment - 1) != 0 {
            self.emit(Ins::addi(regs::CMD, regs::CMD, self.cmd_offset as i16));
            self.cmd_offset = 0;
        }
    }

    fn dst_vreg(class: AttributeClass) -> Reg {
        regs::DST_BASE + class.index() as Reg
    }

    fn load<A: AttributeExt>(&mut self) {
        match self.layout.size(A::CLASS) {
            None => A::set_default(self),
            Some(size) => {
                A::load(self, size);

                let footprint = A::CLASS.footprint(size);
                self.cmd_offset += footprint;
                self.consumed += footprint;
            }
        }
    }

    pub fn build(mut self) -> Loader {
        self.load::<attrib::Position>();
        self.load::<attrib::Color>();
        self.load::<attrib::TexCoord>();
        self.load::<attrib::Normal>();

        Loader {
            code: self.code,
            cmd_size: util::round_up(4 + self.consumed, 4),
        }
    }
}
