//! Layout of the pipeline state in the coprocessor's data memory.
use crate::attrib::AttributeClass;
use static_assertions::const_assert_eq;
use util::offset_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Current-attribute registers, already in wire format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct CurrentRegisters {
    pub position: [i16; 4],
    pub color: [i16; 4],
    pub texcoord: [i16; 4],
    pub normal: [u16; 4],
}

/// Pipeline state block. Loaders address it through the `defaults` and `current` registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct PipeState {
    /// Default vectors for partially specified attributes: `(0, 0, 0, 1.0)` in 10.5 fixed point
    /// for coordinates and `(0, 0, 0, 1.0)` in 0.15 fixed point for colors.
    pub defaults: [[i16; 4]; 2],
    pub current: CurrentRegisters,
}

const_assert_eq!(offset_of!(PipeState, current), 0x10);
const_assert_eq!(offset_of!(CurrentRegisters, color), 0x08);
const_assert_eq!(offset_of!(CurrentRegisters, normal), 0x18);
const_assert_eq!(size_of::<PipeState>(), 0x30);

impl Default for PipeState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipeState {
    pub fn new() -> Self {
        Self {
            defaults: [[0, 0, 0, 1 << crate::codec::COORD_SHIFT], [0, 0, 0, 0x7FFF]],
            current: CurrentRegisters::default(),
        }
    }

    /// Byte offset, relative to the default table, of the default vector of `class`.
    pub fn default_offset(class: AttributeClass) -> u32 {
        match class {
            AttributeClass::Color => offset_of!(PipeState, defaults[1]) as u32,
            _ => offset_of!(PipeState, defaults[0]) as u32,
        }
    }

    /// Byte offset, relative to the current-attribute registers, of the register of `class`.
    pub fn current_offset(class: AttributeClass) -> u32 {
        match class {
            AttributeClass::Position => offset_of!(CurrentRegisters, position) as u32,
            AttributeClass::Color => offset_of!(CurrentRegisters, color) as u32,
            AttributeClass::TexCoord => offset_of!(CurrentRegisters, texcoord) as u32,
            AttributeClass::Normal | AttributeClass::MatrixIndex => {
                offset_of!(CurrentRegisters, normal) as u32
            }
        }
    }

    /// Data memory offset, relative to the pipeline state, of the register of `class`.
    pub fn register_address(class: AttributeClass) -> u16 {
        (offset_of!(PipeState, current) as u32 + Self::current_offset(class)) as u16
    }
}
