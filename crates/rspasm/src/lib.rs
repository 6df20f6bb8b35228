//! Encoding of the vector coprocessor (RSP) instructions emitted by generated vertex loaders.
//!
//! Only the handful of instructions a loader needs are modelled: the scalar `addi` and `lw`
//! and the `lwc2` family of vector loads.
use bitos::{
    bitos,
    integer::{u4, u5, u6, u7},
};
use strum::{FromRepr, VariantArray};

/// A scalar or vector register index.
pub type Reg = u8;

/// Primary opcodes (bits 26..32) of the supported instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Primary {
    Addi = 0b001000,
    Lw = 0b100011,
    Lwc2 = 0b110010,
}

/// Width of a vector load. The offset immediate of a vector load is expressed in units of this
/// width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, VariantArray)]
#[repr(u8)]
pub enum VectorLoad {
    /// `lbv`: 1 byte.
    Byte = 0,
    /// `lsv`: 2 bytes.
    Short = 1,
    /// `llv`: 4 bytes.
    Long = 2,
    /// `ldv`: 8 bytes.
    Double = 3,
    /// `lqv`: 16 bytes.
    Quad = 4,
}

impl VectorLoad {
    /// Size of the access in bytes.
    pub fn size(self) -> u32 {
        1 << self as u32
    }

    fn mnemonic(self) -> &'static str {
        match self {
            Self::Byte => "lbv",
            Self::Short => "lsv",
            Self::Long => "llv",
            Self::Double => "ldv",
            Self::Quad => "lqv",
        }
    }
}

/// I-type instruction format.
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Immediate {
    #[bits(0..16)]
    pub imm: u16,
    #[bits(16..21)]
    pub rt: u5,
    #[bits(21..26)]
    pub rs: u5,
    #[bits(26..32)]
    pub opcode: u6,
}

/// `lwc2` instruction format.
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VectorMemory {
    #[bits(0..7)]
    pub offset: u7,
    #[bits(7..11)]
    pub element: u4,
    #[bits(11..16)]
    pub op: u5,
    #[bits(16..21)]
    pub vt: u5,
    #[bits(21..26)]
    pub base: u5,
    #[bits(26..32)]
    pub opcode: u6,
}

fn reg(value: Reg) -> u5 {
    debug_assert!(value < 32, "register index out of range");
    u5::new(value & 0x1F)
}

fn opcode(primary: Primary) -> u6 {
    u6::new(primary as u8)
}

/// A single coprocessor instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ins {
    /// `addi rt, rs, imm`
    Addi { rt: Reg, rs: Reg, imm: i16 },
    /// `lw rt, offset(base)`
    Lw { rt: Reg, base: Reg, offset: i16 },
    /// `l?v $vt[element], offset(base)`. The effective byte offset is `offset * op.size()` and
    /// `element` is the first destination byte inside the vector register.
    Load {
        op: VectorLoad,
        vt: Reg,
        element: u8,
        offset: i8,
        base: Reg,
    },
}

impl Ins {
    pub fn addi(rt: Reg, rs: Reg, imm: i16) -> Self {
        Self::Addi { rt, rs, imm }
    }

    pub fn lw(rt: Reg, base: Reg, offset: i16) -> Self {
        Self::Lw { rt, base, offset }
    }

    pub fn load(op: VectorLoad, vt: Reg, element: u8, offset: i8, base: Reg) -> Self {
        Self::Load {
            op,
            vt,
            element,
            offset,
            base,
        }
    }

    pub fn lsv(vt: Reg, element: u8, offset: i8, base: Reg) -> Self {
        Self::load(VectorLoad::Short, vt, element, offset, base)
    }

    pub fn llv(vt: Reg, element: u8, offset: i8, base: Reg) -> Self {
        Self::load(VectorLoad::Long, vt, element, offset, base)
    }

    pub fn ldv(vt: Reg, element: u8, offset: i8, base: Reg) -> Self {
        Self::load(VectorLoad::Double, vt, element, offset, base)
    }

    /// Whether `offset` can be encoded in the 7-bit signed immediate of a vector load.
    pub fn fits_load_offset(offset: i32) -> bool {
        (-64..64).contains(&offset)
    }

    pub fn encode(self) -> u32 {
        match self {
            Self::Addi { rt, rs, imm } => Immediate::default()
                .with_opcode(opcode(Primary::Addi))
                .with_rs(reg(rs))
                .with_rt(reg(rt))
                .with_imm(imm as u16)
                .to_bits(),
            Self::Lw { rt, base, offset } => Immediate::default()
                .with_opcode(opcode(Primary::Lw))
                .with_rs(reg(base))
                .with_rt(reg(rt))
                .with_imm(offset as u16)
                .to_bits(),
            Self::Load {
                op,
                vt,
                element,
                offset,
                base,
            } => {
                debug_assert!(Self::fits_load_offset(offset as i32));
                debug_assert!(element < 16);

                VectorMemory::default()
                    .with_opcode(opcode(Primary::Lwc2))
                    .with_base(reg(base))
                    .with_vt(reg(vt))
                    .with_op(u5::new(op as u8))
                    .with_element(u4::new(element & 0xF))
                    .with_offset(u7::new(offset as u8 & 0x7F))
                    .to_bits()
            }
        }
    }

    /// Decodes an instruction previously produced by [`Ins::encode`]. Returns `None` for anything
    /// outside the supported subset.
    pub fn decode(word: u32) -> Option<Self> {
        let primary = Primary::from_repr((word >> 26) as u8)?;
        Some(match primary {
            Primary::Addi => {
                let ins = Immediate::from_bits(word);
                Self::Addi {
                    rt: ins.rt().value(),
                    rs: ins.rs().value(),
                    imm: ins.imm() as i16,
                }
            }
            Primary::Lw => {
                let ins = Immediate::from_bits(word);
                Self::Lw {
                    rt: ins.rt().value(),
                    base: ins.rs().value(),
                    offset: ins.imm() as i16,
                }
            }
            Primary::Lwc2 => {
                let ins = VectorMemory::from_bits(word);
                let op = VectorLoad::from_repr(ins.op().value())?;

                // sign extend the 7 bit offset
                let offset = ((ins.offset().value() << 1) as i8) >> 1;

                Self::Load {
                    op,
                    vt: ins.vt().value(),
                    element: ins.element().value(),
                    offset,
                    base: ins.base().value(),
                }
            }
        })
    }
}

impl std::fmt::Debug for Ins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Addi { rt, rs, imm } => write!(f, "addi ${rt}, ${rs}, {imm}"),
            Self::Lw { rt, base, offset } => write!(f, "lw ${rt}, {offset:#X}(${base})"),
            Self::Load {
                op,
                vt,
                element,
                offset,
                base,
            } => write!(
                f,
                "{} $v{vt}[{element}], {offset}(${base})",
                op.mnemonic()
            ),
        }
    }
}
