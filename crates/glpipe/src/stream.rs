//! Framing of command packets for the coprocessor's command queue.
use crate::codec::HalfSink;
use bitos::{
    bitos,
    integer::{u4, u6, u10},
};
use strum::FromRepr;

/// Commands of the pipeline overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u8)]
pub enum PipeCommand {
    InitPipe = 0x0,
    DrawTri = 0x1,
    SetPrimVtx = 0x2,
    SetWord = 0x3,
    SetLong = 0x4,
    SetVtxLoader = 0x5,
    SetVtxCmdSize = 0x6,
}

/// The byte identifying a command in the queue.
#[bitos(8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandId {
    #[bits(0..4)]
    pub command: u4,
    #[bits(4..8)]
    pub overlay: u4,
}

impl CommandId {
    pub fn new(overlay: u8, command: PipeCommand) -> Self {
        Self::default()
            .with_overlay(u4::new(overlay & 0xF))
            .with_command(u4::new(command as u8))
    }

    /// The pipeline command, if this id names one.
    pub fn pipe_command(&self) -> Option<PipeCommand> {
        PipeCommand::from_repr(self.command().value())
    }
}

/// Entry of the dispatcher's per-command descriptor table.
#[bitos(16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandDescriptor {
    /// Address of the command handler.
    #[bits(0..10)]
    pub handler: u10,
    /// Size of the command in words.
    #[bits(10..16)]
    pub words: u6,
}

impl CommandDescriptor {
    /// Returns this descriptor with its size set to `bytes`, keeping the handler.
    pub fn with_size(self, bytes: u32) -> Self {
        self.with_words(u6::new(((bytes & 0xFC) >> 2) as u8))
    }
}

/// The asynchronous, strictly ordered command queue consuming framed packets.
pub trait Queue {
    /// Physical address the next submitted packet will be placed at.
    fn write_address(&self) -> u32;

    /// Appends a framed packet to the queue.
    fn submit(&mut self, words: &[u32]);
}

/// Writer of a half-word oriented packet. The header takes the first half-word.
pub struct CmdStream<'q> {
    queue: &'q mut dyn Queue,
    halves: Vec<u16>,
    declared: usize,
}

impl<'q> CmdStream<'q> {
    /// Starts a packet of `words` words.
    pub fn begin(queue: &'q mut dyn Queue, id: CommandId, words: u32) -> Self {
        assert!(words > 0);

        let declared = words as usize * 2;
        let mut halves = Vec::with_capacity(declared);
        halves.push((id.to_bits() as u16) << 8);

        Self {
            queue,
            halves,
            declared,
        }
    }

    pub fn put_half(&mut self, value: u16) {
        assert!(
            self.halves.len() < self.declared,
            "command stream overrun ({} half-words declared)",
            self.declared
        );

        self.halves.push(value);
    }

    /// Pads the packet to its declared size and submits it.
    pub fn end(mut self) {
        self.halves.resize(self.declared, 0);

        let words: Vec<u32> = self
            .halves
            .chunks_exact(2)
            .map(|pair| ((pair[0] as u32) << 16) | pair[1] as u32)
            .collect();

        self.queue.submit(&words);
    }
}

impl HalfSink for CmdStream<'_> {
    fn put_half(&mut self, value: u16) {
        CmdStream::put_half(self, value);
    }
}

/// Writer of a word oriented packet. The first argument shares word 0 with the command id.
pub struct Write<'q> {
    queue: &'q mut dyn Queue,
    address: u32,
    words: Vec<u32>,
    declared: usize,
    first: bool,
}

impl<'q> Write<'q> {
    pub fn begin(queue: &'q mut dyn Queue, id: CommandId, words: u32) -> Self {
        assert!(words > 0);

        let address = queue.write_address();
        let declared = words as usize;
        let mut buffer = Vec::with_capacity(declared);
        buffer.push((id.to_bits() as u32) << 24);

        Self {
            queue,
            address,
            words: buffer,
            declared,
            first: true,
        }
    }

    pub fn arg(&mut self, value: u32) {
        if self.first {
            debug_assert!(value < 1 << 24);
            self.words[0] |= value & 0x00FF_FFFF;
            self.first = false;
            return;
        }

        assert!(
            self.words.len() < self.declared,
            "command write overrun ({} words declared)",
            self.declared
        );

        self.words.push(value);
    }

    /// Physical address of the next word to be written.
    pub fn pointer(&self) -> u32 {
        let written = if self.first { 0 } else { self.words.len() };
        self.address + written as u32 * 4
    }

    /// Pads the packet to its declared size and submits it.
    pub fn end(mut self) {
        self.words.resize(self.declared, 0);
        self.queue.submit(&self.words);
    }
}

/// Writes a packet made of `args`.
pub fn write(queue: &mut dyn Queue, id: CommandId, args: &[u32]) {
    let mut w = Write::begin(queue, id, args.len() as u32);
    for &arg in args {
        w.arg(arg);
    }
    w.end();
}

/// A packet as recorded by a [`RecordingQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: u32,
    pub words: Vec<u32>,
}

impl Packet {
    pub fn id(&self) -> CommandId {
        CommandId::from_bits((self.words[0] >> 24) as u8)
    }

    pub fn command(&self) -> Option<PipeCommand> {
        self.id().pipe_command()
    }

    /// The packet as half-words, header included.
    pub fn halves(&self) -> impl Iterator<Item = u16> + '_ {
        self.words
            .iter()
            .flat_map(|w| [(w >> 16) as u16, *w as u16])
    }
}

/// A queue that keeps every submitted packet, placing them contiguously from a base address.
#[derive(Debug, Clone, Default)]
pub struct RecordingQueue {
    cursor: u32,
    packets: Vec<Packet>,
}

impl RecordingQueue {
    pub fn new(base: u32) -> Self {
        Self {
            cursor: base,
            packets: Vec::new(),
        }
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Packets of a given pipeline command, in submission order.
    pub fn of(&self, command: PipeCommand) -> impl Iterator<Item = &Packet> + '_ {
        self.packets
            .iter()
            .filter(move |p| p.command() == Some(command))
    }

    /// Removes and returns every recorded packet.
    pub fn take(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.packets)
    }
}

impl Queue for RecordingQueue {
    fn write_address(&self) -> u32 {
        self.cursor
    }

    fn submit(&mut self, words: &[u32]) {
        tracing::trace!(address = self.cursor, words = words.len(), "packet");

        self.packets.push(Packet {
            address: self.cursor,
            words: words.to_vec(),
        });
        self.cursor += words.len() as u32 * 4;
    }
}
