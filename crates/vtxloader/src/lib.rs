//! Generation of the per-vertex load programs run by the vector coprocessor.
//!
//! Whenever the set of attributes carried by vertex commands changes, a new loader is written
//! into the pipeline's instruction window and the dispatcher's descriptor of the vertex command
//! is patched with the new command size.
pub mod builder;
pub mod layout;

pub use builder::{Loader, LoaderBuilder, MAX_LOADER_INS};
pub use layout::VertexLayout;

use glpipe::{
    Config,
    stream::{self, CommandDescriptor, PipeCommand, Queue, Write},
};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;

/// Offset between the text segment base and the address the loader command expects.
const TEXT_BASE_BIAS: u32 = 0x1000;

/// Builds loaders and publishes them to the coprocessor.
pub struct Generator {
    loaders: FxHashMap<VertexLayout, Loader>,
    descriptor: CommandDescriptor,
    active: Option<VertexLayout>,
    cmd_size: u32,
    generations: u32,
}

impl Generator {
    pub fn new(config: &Config) -> Self {
        Self {
            loaders: FxHashMap::default(),
            descriptor: CommandDescriptor::from_bits(config.vtx_cmd_descriptor),
            active: None,
            cmd_size: 0,
            generations: 0,
        }
    }

    /// Returns the loader for `layout`, building it if needed.
    pub fn loader(&mut self, layout: VertexLayout) -> &Loader {
        match self.loaders.entry(layout) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => v.insert(LoaderBuilder::new(layout).build()),
        }
    }

    /// Size in bytes of vertex commands for the active layout.
    pub fn cmd_size(&self) -> u32 {
        self.cmd_size
    }

    /// The layout of the last published loader.
    pub fn active(&self) -> Option<VertexLayout> {
        self.active
    }

    /// The last published descriptor of the vertex command.
    pub fn descriptor(&self) -> CommandDescriptor {
        self.descriptor
    }

    /// How many times a loader has been published.
    pub fn generations(&self) -> u32 {
        self.generations
    }

    /// Publishes the loader for `layout` and patches the vertex command's size, returning the
    /// new size in bytes. Both are queued, so every command queued before keeps the old layout.
    pub fn regenerate(&mut self, queue: &mut dyn Queue, config: &Config, layout: VertexLayout) -> u32 {
        let _span = tracing::trace_span!("regenerate vertex loader").entered();

        let loader = self.loader(layout).clone();
        upload(queue, config, &loader);

        self.descriptor = self.descriptor.with_size(loader.cmd_size);
        stream::write(
            queue,
            config.command(PipeCommand::SetVtxCmdSize),
            &[
                self.descriptor.to_bits() as u32,
                config.vtx_cmd_descriptor_address(),
            ],
        );

        self.active = Some(layout);
        self.cmd_size = loader.cmd_size;
        self.generations += 1;

        tracing::debug!(
            ?layout,
            cmd_size = loader.cmd_size,
            instructions = loader.code.len(),
            "regenerated vertex loader"
        );

        loader.cmd_size
    }
}

/// Writes `loader` into the instruction window. The loader command takes the code address as
/// its second word and expects the code itself to be 8-byte aligned.
fn upload(queue: &mut dyn Queue, config: &Config, loader: &Loader) {
    let mut w = Write::begin(
        queue,
        config.command(PipeCommand::SetVtxLoader),
        3 + MAX_LOADER_INS as u32,
    );
    w.arg(config.text_base.wrapping_sub(TEXT_BASE_BIAS) & 0x00FF_FFFF);

    let pointer = w.pointer();
    let aligned = pointer & 0x7 == 0;
    w.arg(if aligned { pointer + 8 } else { pointer + 4 });
    if aligned {
        w.arg(0);
    }

    for word in loader.words() {
        w.arg(word);
    }

    w.end();
}
