//! Vertex submission for the RSP pipeline.
//!
//! [`Pipeline`] drives the vertex loader generator, the attribute codec and the vertex cache in
//! the order the coprocessor expects, and keeps the legacy current-attribute semantics: after a
//! batch, the current color, texture coordinate, normal and matrix index are those of the last
//! vertex drawn from arrays.
use glpipe::{
    Config, PipelineError,
    attrib::{Arrays, AttributeClass, AttributeValue, IndexBuffer},
    cache::{PrimitiveCache, Topology, VertexCache},
    codec,
    state::PipeState,
    stream::{self, CmdStream, PipeCommand, Queue},
};
use vtxloader::{Generator, VertexLayout};

/// What kind of vertices the current batch is made of. Decides which loader is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No vertex submitted since the batch began or since the last array draw.
    #[default]
    Indeterminate,
    /// Immediate mode vertices: the loader reads a position and nothing else.
    VertexImmediate,
    /// Single array elements: the loader reads every enabled array.
    ArrayElement,
}

/// Attributes with a current-attribute register.
const CURRENT_CLASSES: [AttributeClass; 4] = [
    AttributeClass::Color,
    AttributeClass::TexCoord,
    AttributeClass::Normal,
    AttributeClass::MatrixIndex,
];

/// Values of the enabled arrays with a current-attribute register at some index.
type Snapshot = [Option<AttributeValue>; CURRENT_CLASSES.len()];

fn snapshot(arrays: &Arrays, index: u32) -> Result<Snapshot, PipelineError> {
    let mut values = [None; CURRENT_CLASSES.len()];
    for (value, class) in values.iter_mut().zip(CURRENT_CLASSES) {
        let array = &arrays[class];
        if array.enabled() {
            *value = Some(array.value(index)?);
        }
    }

    Ok(values)
}

/// Checks that element `index` of every enabled array can be fetched.
fn check_elements(arrays: &Arrays, index: u32) -> Result<(), PipelineError> {
    for array in arrays.iter().filter(|a| a.enabled()) {
        array.element(index)?;
    }

    Ok(())
}

fn check_size(class: AttributeClass, value: &AttributeValue) -> Result<(), PipelineError> {
    if class.sizes().contains(&value.size()) {
        Ok(())
    } else {
        Err(PipelineError::InvalidSize {
            class,
            size: value.size(),
        })
    }
}

/// Starts a vertex command filling `slot`. The payload follows the slot's offset.
fn begin_vertex<'q>(
    queue: &'q mut dyn Queue,
    config: &Config,
    generator: &Generator,
    slot: u8,
) -> CmdStream<'q> {
    let mut s = CmdStream::begin(
        queue,
        config.command(PipeCommand::SetPrimVtx),
        generator.cmd_size() / 4,
    );
    s.put_half(config.slot_offset(slot) as u16);
    s
}

/// The vertex submission context. Errors are reported before anything is queued.
pub struct Pipeline<Q: Queue, C: VertexCache = PrimitiveCache> {
    config: Config,
    queue: Q,
    cache: C,
    generator: Generator,
    arrays: Arrays,
    current: [AttributeValue; AttributeClass::COUNT],
    mode: Mode,
    /// Array element whose attributes are yet to be copied into the current registers.
    pending: Option<u32>,
    /// Immediate mode vertices submitted in this batch.
    immediate_count: u32,
}

impl<Q: Queue> Pipeline<Q> {
    pub fn new(config: Config, queue: Q) -> Self {
        let cache = PrimitiveCache::new(config.cache_capacity);
        Self::with_cache(config, queue, cache)
    }
}

impl<Q: Queue, C: VertexCache> Pipeline<Q, C> {
    pub fn with_cache(config: Config, queue: Q, cache: C) -> Self {
        assert!(
            config.last_slot_offset() <= u16::MAX as u32,
            "vertex store slot offsets must fit in a half-word"
        );

        let generator = Generator::new(&config);
        Self {
            config,
            queue,
            cache,
            generator,
            arrays: Arrays::default(),
            current: [
                AttributeClass::Position,
                AttributeClass::Color,
                AttributeClass::TexCoord,
                AttributeClass::Normal,
                AttributeClass::MatrixIndex,
            ]
            .map(AttributeValue::initial),
            mode: Mode::Indeterminate,
            pending: None,
            immediate_count: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn arrays(&self) -> &Arrays {
        &self.arrays
    }

    pub fn arrays_mut(&mut self) -> &mut Arrays {
        &mut self.arrays
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The current-attribute register of `class`, as source values.
    pub fn current(&self, class: AttributeClass) -> &AttributeValue {
        &self.current[class.index()]
    }

    fn regenerate(&mut self, layout: VertexLayout) {
        self.generator.regenerate(&mut self.queue, &self.config, layout);
    }

    /// Sends `value` to the coprocessor's current register of `class`.
    fn publish(&mut self, class: AttributeClass, value: &AttributeValue) {
        let (command, words) = match class {
            AttributeClass::Color | AttributeClass::TexCoord => (PipeCommand::SetLong, 3),
            AttributeClass::Normal => (PipeCommand::SetWord, 2),
            AttributeClass::Position | AttributeClass::MatrixIndex => return,
        };

        let mut s = CmdStream::begin(&mut self.queue, self.config.command(command), words);
        s.put_half(PipeState::register_address(class));
        codec::encode_value(&mut s, class, value);
        s.end();
    }

    fn set_current(&mut self, class: AttributeClass, value: AttributeValue) {
        self.current[class.index()] = value;
        self.publish(class, &value);
    }

    fn restore(&mut self, snapshot: Snapshot) {
        for (value, class) in snapshot.into_iter().zip(CURRENT_CLASSES) {
            if let Some(value) = value {
                self.set_current(class, value);
            }
        }
    }

    /// Feeds `slot` to the assembler and draws the triangle it completes, if any.
    fn submit(&mut self, slot: u8) {
        let Some([a, b, c]) = self.cache.try_complete_triangle(slot) else {
            return;
        };

        let [a, b, c] = [a, b, c].map(|s| self.config.slot_offset(s));
        stream::write(
            &mut self.queue,
            self.config.command(PipeCommand::DrawTri),
            &[a, (b << 16) | c],
        );
    }

    /// Draws array element `index` as vertex `id`. Elements must have been checked.
    fn draw_element(&mut self, id: u32, index: u32) -> Result<(), PipelineError> {
        let Some((slot, new)) = self.cache.lookup_or_assign(id) else {
            tracing::warn!(id, index, "no vertex cache slot available, dropping vertex");
            return Ok(());
        };

        if new {
            let mut s = begin_vertex(&mut self.queue, &self.config, &self.generator, slot);
            for array in self.arrays.iter().filter(|a| a.enabled()) {
                array.encoder()(&mut s, array.element(index)?, array.size());
            }
            s.end();
        }

        self.submit(slot);
        Ok(())
    }

    /// Starts a batch of primitives of the given topology.
    pub fn begin(&mut self, topology: Topology) {
        stream::write(
            &mut self.queue,
            self.config.command(PipeCommand::InitPipe),
            &[topology as u32],
        );

        self.cache.reset(topology);
        self.pending = None;
        self.immediate_count = 0;
        self.mode = Mode::Indeterminate;
    }

    /// Ends the batch, settling the current-attribute registers.
    pub fn end(&mut self) -> Result<(), PipelineError> {
        if let Some(index) = self.pending {
            let values = snapshot(&self.arrays, index)?;
            self.pending = None;
            self.restore(values);
        }

        if self.mode == Mode::VertexImmediate {
            for class in CURRENT_CLASSES {
                let value = self.current[class.index()];
                self.publish(class, &value);
            }
        }

        Ok(())
    }

    /// Submits an immediate mode vertex at `position`. Every other attribute comes from the
    /// current registers.
    pub fn vertex(&mut self, position: AttributeValue) -> Result<(), PipelineError> {
        check_size(AttributeClass::Position, &position)?;
        let pending = self
            .pending
            .map(|index| snapshot(&self.arrays, index))
            .transpose()?;

        if self.mode != Mode::VertexImmediate {
            self.regenerate(VertexLayout::IMMEDIATE);
            self.mode = Mode::VertexImmediate;
        }

        if let Some(values) = pending {
            self.pending = None;
            self.restore(values);
        }

        let id = self
            .config
            .immediate_id_base
            .wrapping_add(self.immediate_count);
        self.immediate_count = self.immediate_count.wrapping_add(1);

        let Some((slot, new)) = self.cache.lookup_or_assign(id) else {
            tracing::warn!(id, "no vertex cache slot available, dropping vertex");
            return Ok(());
        };

        if new {
            let mut s = begin_vertex(&mut self.queue, &self.config, &self.generator, slot);
            codec::encode_value(&mut s, AttributeClass::Position, &position);
            s.end();
        }

        self.submit(slot);
        Ok(())
    }

    fn set_attrib(
        &mut self,
        class: AttributeClass,
        value: AttributeValue,
    ) -> Result<(), PipelineError> {
        check_size(class, &value)?;
        self.set_current(class, value);
        Ok(())
    }

    /// Sets the current color.
    pub fn color(&mut self, value: AttributeValue) -> Result<(), PipelineError> {
        self.set_attrib(AttributeClass::Color, value)
    }

    /// Sets the current texture coordinates.
    pub fn tex_coord(&mut self, value: AttributeValue) -> Result<(), PipelineError> {
        self.set_attrib(AttributeClass::TexCoord, value)
    }

    /// Sets the current normal.
    pub fn normal(&mut self, value: AttributeValue) -> Result<(), PipelineError> {
        self.set_attrib(AttributeClass::Normal, value)
    }

    /// Sets the current matrix index. It has no coprocessor register, so nothing is queued.
    pub fn mtx_index(&mut self, value: AttributeValue) -> Result<(), PipelineError> {
        self.set_attrib(AttributeClass::MatrixIndex, value)
    }

    /// Submits element `index` of the enabled arrays as a vertex. Its attributes become current
    /// once another vertex is submitted or the batch ends.
    pub fn array_element(&mut self, index: u32) -> Result<(), PipelineError> {
        check_elements(&self.arrays, index)?;
        let pending = self
            .pending
            .map(|index| snapshot(&self.arrays, index))
            .transpose()?;

        if self.mode != Mode::ArrayElement {
            self.regenerate(VertexLayout::from_arrays(&self.arrays));
            self.mode = Mode::ArrayElement;
        }

        if let Some(values) = pending {
            self.pending = None;
            self.restore(values);
        }

        self.draw_element(index, index)?;
        self.pending = Some(index);

        Ok(())
    }

    /// Draws `count` consecutive array elements starting at `first`.
    pub fn draw_arrays(&mut self, first: u32, count: u32) -> Result<(), PipelineError> {
        let _span = tracing::trace_span!("draw_arrays", first, count).entered();
        let Some(last) = count.checked_sub(1).map(|n| first.saturating_add(n)) else {
            return Ok(());
        };

        check_elements(&self.arrays, last)?;
        let values = snapshot(&self.arrays, last)?;

        if self.arrays[AttributeClass::Position].enabled() {
            self.regenerate(VertexLayout::from_arrays(&self.arrays));
            self.mode = Mode::Indeterminate;

            for index in first..=last {
                self.draw_element(index, index)?;
            }
        }

        self.restore(values);
        Ok(())
    }

    /// Draws the array elements named by the first `count` entries of `indices`.
    pub fn draw_elements(
        &mut self,
        indices: &IndexBuffer,
        count: usize,
    ) -> Result<(), PipelineError> {
        let _span = tracing::trace_span!("draw_elements", count).entered();
        if count == 0 {
            return Ok(());
        }

        if count > indices.len() {
            return Err(PipelineError::IndexOutOfBounds(indices.len()));
        }

        let list: Vec<u32> = (0..count).filter_map(|i| indices.read(i)).collect();
        let (Some(&max), Some(&last)) = (list.iter().max(), list.last()) else {
            return Ok(());
        };

        check_elements(&self.arrays, max)?;
        let values = snapshot(&self.arrays, last)?;

        if self.arrays[AttributeClass::Position].enabled() {
            self.regenerate(VertexLayout::from_arrays(&self.arrays));
            self.mode = Mode::Indeterminate;

            for index in list {
                self.draw_element(index, index)?;
            }
        }

        self.restore(values);
        Ok(())
    }
}
