use crate::stream::{CommandId, PipeCommand};
use serde::{Deserialize, Serialize};

/// Size of the overlay header preceding the command descriptor table.
pub const OVERLAY_HEADER_SIZE: u32 = 8;
/// Size of a single command descriptor.
pub const COMMAND_DESCRIPTOR_SIZE: u32 = 2;

/// Hardware constants of the pipeline overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overlay id of the pipeline in the command queue.
    pub overlay: u8,
    /// Number of slots in the coprocessor's vertex store.
    pub cache_capacity: u32,
    /// Bytes per vertex store slot. Slot offsets travel as half-words, so the offset of the last
    /// slot must fit in 16 bits.
    pub slot_stride: u32,
    /// Physical address of the pipeline microcode text segment.
    pub text_base: u32,
    /// Physical address of the pipeline overlay header in the queue's data segment.
    pub overlay_header: u32,
    /// Descriptor of the per-vertex command as built into the microcode.
    pub vtx_cmd_descriptor: u16,
    /// First logical id handed to immediate mode vertices.
    pub immediate_id_base: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overlay: 0x3,
            cache_capacity: 32,
            slot_stride: 40,
            text_base: 0x0010_4000,
            overlay_header: 0x0011_0A00,
            vtx_cmd_descriptor: 0x0244,
            immediate_id_base: 0x8000_0000,
        }
    }
}

impl Config {
    pub fn command(&self, command: PipeCommand) -> CommandId {
        CommandId::new(self.overlay, command)
    }

    /// Physical address of the per-vertex command's descriptor.
    pub fn vtx_cmd_descriptor_address(&self) -> u32 {
        self.overlay_header
            + OVERLAY_HEADER_SIZE
            + PipeCommand::SetPrimVtx as u32 * COMMAND_DESCRIPTOR_SIZE
    }

    /// Byte offset of `slot` in the vertex store.
    pub fn slot_offset(&self, slot: u8) -> u32 {
        slot as u32 * self.slot_stride
    }

    /// Byte offset of the last slot in the vertex store.
    pub fn last_slot_offset(&self) -> u32 {
        self.cache_capacity.saturating_sub(1) * self.slot_stride
    }
}
