use glpipe::{
    Config, PipelineError,
    attrib::{AttributeClass, AttributeValue, IndexBuffer, IndexType, SourceType},
    cache::{PrimitiveCache, Topology, VertexCache},
    stream::{Packet, PipeCommand, RecordingQueue},
};
use glrsp::{Mode, Pipeline};
use rspasm::Ins;
use std::sync::Arc;
use zerocopy::IntoBytes;

fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A primitive cache that records what the pipeline asks of it.
#[derive(Debug)]
struct Counting {
    inner: PrimitiveCache,
    assigned: u32,
    completed: Vec<u8>,
}

impl Counting {
    fn new() -> Self {
        Self {
            inner: PrimitiveCache::new(32),
            assigned: 0,
            completed: Vec::new(),
        }
    }
}

impl VertexCache for Counting {
    fn lookup_or_assign(&mut self, id: u32) -> Option<(u8, bool)> {
        let result = self.inner.lookup_or_assign(id);
        if let Some((_, true)) = result {
            self.assigned += 1;
        }

        result
    }

    fn try_complete_triangle(&mut self, slot: u8) -> Option<[u8; 3]> {
        self.completed.push(slot);
        self.inner.try_complete_triangle(slot)
    }

    fn reset(&mut self, topology: Topology) {
        self.inner.reset(topology);
    }
}

/// A vertex store with no room left.
struct Exhausted;

impl VertexCache for Exhausted {
    fn lookup_or_assign(&mut self, _: u32) -> Option<(u8, bool)> {
        None
    }

    fn try_complete_triangle(&mut self, _: u8) -> Option<[u8; 3]> {
        None
    }

    fn reset(&mut self, _: Topology) {}
}

fn pipeline<C: VertexCache>(cache: C) -> Pipeline<RecordingQueue, C> {
    setup();
    Pipeline::with_cache(Config::default(), RecordingQueue::new(0x1000), cache)
}

fn commands(packets: &[Packet]) -> Vec<PipeCommand> {
    packets.iter().filter_map(Packet::command).collect()
}

const POSITIONS: [f32; 18] = [
    1.0, 2.0, 3.0, //
    4.0, 5.0, 6.0, //
    7.0, 8.0, 9.0, //
    -1.0, -2.0, -3.0, //
    0.5, 0.5, 0.5, //
    0.0, 0.0, 0.0, //
];

const COLORS: [u8; 24] = [
    255, 0, 0, 255, //
    0, 255, 0, 255, //
    0, 0, 255, 255, //
    10, 20, 30, 40, //
    50, 60, 70, 80, //
    90, 100, 110, 120, //
];

/// Binds three float position components and four byte color components per vertex.
fn bind<C: VertexCache>(pipeline: &mut Pipeline<RecordingQueue, C>) {
    let arrays = pipeline.arrays_mut();
    arrays
        .set_pointer(
            AttributeClass::Position,
            3,
            SourceType::F32.tag(),
            0,
            Arc::from(POSITIONS.as_bytes()),
            0,
        )
        .unwrap();
    arrays
        .set_pointer(
            AttributeClass::Color,
            4,
            SourceType::U8.tag(),
            0,
            Arc::from(COLORS.as_bytes()),
            0,
        )
        .unwrap();
    arrays.enable(AttributeClass::Position);
    arrays.enable(AttributeClass::Color);
}

fn color_of(index: usize) -> AttributeValue {
    AttributeValue::new(&COLORS[index * 4..index * 4 + 4])
}

const TEXCOORDS: [f32; 12] = [
    0.0, 0.0, //
    0.5, 1.0, //
    2.0, -1.0, //
    3.0, 4.0, //
    -0.5, 0.25, //
    1.0, 1.0, //
];

const NORMALS: [i8; 18] = [
    0, 0, 127, //
    0, 127, 0, //
    -128, 0, 64, //
    1, 2, 3, //
    -1, -2, -3, //
    64, 64, 64, //
];

/// Binds two float texture coordinates and three byte normal components per vertex on top of
/// [`bind`].
fn bind_all<C: VertexCache>(pipeline: &mut Pipeline<RecordingQueue, C>) {
    bind(pipeline);

    let arrays = pipeline.arrays_mut();
    arrays
        .set_pointer(
            AttributeClass::TexCoord,
            2,
            SourceType::F32.tag(),
            0,
            Arc::from(TEXCOORDS.as_bytes()),
            0,
        )
        .unwrap();
    arrays
        .set_pointer(
            AttributeClass::Normal,
            3,
            SourceType::I8.tag(),
            0,
            Arc::from(NORMALS.as_bytes()),
            0,
        )
        .unwrap();
    arrays.enable(AttributeClass::TexCoord);
    arrays.enable(AttributeClass::Normal);
}

fn texcoord_of(index: usize) -> AttributeValue {
    AttributeValue::new(&TEXCOORDS[index * 2..index * 2 + 2])
}

fn normal_of(index: usize) -> AttributeValue {
    AttributeValue::new(&NORMALS[index * 3..index * 3 + 3])
}

fn assert_current<Q: glpipe::stream::Queue, C: VertexCache>(
    pipeline: &Pipeline<Q, C>,
    index: usize,
) {
    assert_eq!(*pipeline.current(AttributeClass::Color), color_of(index));
    assert_eq!(*pipeline.current(AttributeClass::TexCoord), texcoord_of(index));
    assert_eq!(*pipeline.current(AttributeClass::Normal), normal_of(index));
}

/// Payload half-words of a packet, header excluded.
fn payload(packet: &Packet) -> Vec<u16> {
    packet.halves().skip(1).collect()
}

#[test]
fn draw_arrays_end_to_end() {
    let mut pipeline = pipeline(Counting::new());
    bind(&mut pipeline);

    pipeline.begin(Topology::Triangles);
    pipeline.draw_arrays(0, 4).unwrap();

    assert_eq!(pipeline.generator().generations(), 1);
    assert_eq!(pipeline.generator().cmd_size(), 20);
    assert_eq!(pipeline.cache().assigned, 4);
    assert_eq!(pipeline.cache().completed, [0, 1, 2, 3]);
    assert_eq!(*pipeline.current(AttributeClass::Color), color_of(3));
    assert_eq!(pipeline.mode(), Mode::Indeterminate);

    let packets = pipeline.queue().packets();
    assert_eq!(
        commands(packets),
        [
            PipeCommand::InitPipe,
            PipeCommand::SetVtxLoader,
            PipeCommand::SetVtxCmdSize,
            PipeCommand::SetPrimVtx,
            PipeCommand::SetPrimVtx,
            PipeCommand::SetPrimVtx,
            PipeCommand::DrawTri,
            PipeCommand::SetPrimVtx,
            PipeCommand::SetLong,
        ]
    );

    assert_eq!(packets[0].words[0] & 0x00FF_FFFF, Topology::Triangles as u32);

    let first = pipeline.queue().of(PipeCommand::SetPrimVtx).next().unwrap();
    assert_eq!(first.words.len(), 5);
    assert_eq!(
        first.halves().skip(1).collect::<Vec<_>>(),
        [0, 0x20, 0x40, 0x60, 0x7F80, 0, 0, 0x7F80, 0]
    );

    let config = pipeline.config();
    let triangle = pipeline.queue().of(PipeCommand::DrawTri).next().unwrap();
    assert_eq!(triangle.words[0] & 0x00FF_FFFF, config.slot_offset(0));
    assert_eq!(
        triangle.words[1],
        (config.slot_offset(1) << 16) | config.slot_offset(2)
    );

    let restore = packets.last().unwrap();
    assert_eq!(
        restore.halves().skip(1).collect::<Vec<_>>(),
        [0x18, 10 << 7, 20 << 7, 30 << 7, 40 << 7]
    );
}

#[test]
fn repeated_elements_reuse_their_slot() {
    let mut pipeline = pipeline(Counting::new());
    bind(&mut pipeline);

    pipeline.begin(Topology::Triangles);
    pipeline.array_element(5).unwrap();
    pipeline.array_element(5).unwrap();

    assert_eq!(pipeline.mode(), Mode::ArrayElement);
    assert_eq!(pipeline.cache().assigned, 1);
    assert_eq!(pipeline.cache().completed, [0, 0]);
    assert_eq!(pipeline.queue().of(PipeCommand::SetPrimVtx).count(), 1);
    assert_eq!(pipeline.queue().of(PipeCommand::SetVtxLoader).count(), 1);
}

#[test]
fn array_element_attributes_become_current() {
    let mut pipeline = pipeline(Counting::new());
    bind_all(&mut pipeline);

    pipeline.begin(Topology::Triangles);
    pipeline.array_element(3).unwrap();

    for class in [
        AttributeClass::Color,
        AttributeClass::TexCoord,
        AttributeClass::Normal,
    ] {
        assert_eq!(
            *pipeline.current(class),
            AttributeValue::initial(class)
        );
    }
    assert_eq!(pipeline.queue().of(PipeCommand::SetLong).count(), 0);
    assert_eq!(pipeline.queue().of(PipeCommand::SetWord).count(), 0);

    pipeline.end().unwrap();
    assert_current(&pipeline, 3);
    assert_eq!(pipeline.queue().of(PipeCommand::SetLong).count(), 2);
    assert_eq!(pipeline.queue().of(PipeCommand::SetWord).count(), 1);
}

#[test]
fn next_array_element_resolves_the_pending_one() {
    let mut pipeline = pipeline(Counting::new());
    bind_all(&mut pipeline);

    pipeline.begin(Topology::Triangles);
    pipeline.array_element(1).unwrap();
    assert_eq!(pipeline.generator().cmd_size(), 28);

    let mark = pipeline.queue().packets().len();
    pipeline.array_element(2).unwrap();
    assert_current(&pipeline, 1);
    assert_eq!(pipeline.generator().generations(), 1);

    let packets = &pipeline.queue().packets()[mark..];
    assert_eq!(
        commands(packets),
        [
            PipeCommand::SetLong,
            PipeCommand::SetLong,
            PipeCommand::SetWord,
            PipeCommand::SetPrimVtx,
        ]
    );
    assert_eq!(payload(&packets[0]), [0x18, 0, 0x7F80, 0, 0x7F80]);
    assert_eq!(payload(&packets[1]), [0x20, 0x10, 0x20, 0, 0x20]);
    assert_eq!(payload(&packets[2]), [0x28, 0x007F, 0]);

    pipeline.end().unwrap();
    assert_current(&pipeline, 2);
}

#[test]
fn immediate_vertex_resolves_the_pending_element() {
    let mut pipeline = pipeline(Counting::new());
    bind_all(&mut pipeline);

    pipeline.begin(Topology::Triangles);
    pipeline.array_element(1).unwrap();
    pipeline.array_element(2).unwrap();

    let mark = pipeline.queue().packets().len();
    pipeline
        .vertex(AttributeValue::new(&[1.0f32, 1.0, 1.0]))
        .unwrap();
    assert_current(&pipeline, 2);
    assert_eq!(pipeline.mode(), Mode::VertexImmediate);
    assert_eq!(pipeline.generator().generations(), 2);
    assert_eq!(pipeline.generator().cmd_size(), 12);

    // the immediate loader is published before the resolved values and the new vertex
    let packets = &pipeline.queue().packets()[mark..];
    assert_eq!(
        commands(packets),
        [
            PipeCommand::SetVtxLoader,
            PipeCommand::SetVtxCmdSize,
            PipeCommand::SetLong,
            PipeCommand::SetLong,
            PipeCommand::SetWord,
            PipeCommand::SetPrimVtx,
            PipeCommand::DrawTri,
        ]
    );
    assert_eq!(payload(&packets[2]), [0x18, 0, 0, 0x7F80, 0x7F80]);
    assert_eq!(payload(&packets[3]), [0x20, 0x40, 0xFFE0, 0, 0x20]);
    assert_eq!(payload(&packets[4]), [0x28, 0x8000, 0x4000]);

    let mark = pipeline.queue().packets().len();
    pipeline.array_element(4).unwrap();
    pipeline.end().unwrap();
    assert_current(&pipeline, 4);
    assert_eq!(pipeline.generator().generations(), 3);
    assert_eq!(pipeline.generator().cmd_size(), 28);

    assert_eq!(
        commands(&pipeline.queue().packets()[mark..]),
        [
            PipeCommand::SetVtxLoader,
            PipeCommand::SetVtxCmdSize,
            PipeCommand::SetPrimVtx,
            PipeCommand::SetLong,
            PipeCommand::SetLong,
            PipeCommand::SetWord,
        ]
    );
}

#[test]
fn normal_packet() {
    let mut pipeline = pipeline(Counting::new());
    pipeline
        .normal(AttributeValue::new(&[1.0f32, -1.0, 0.0]))
        .unwrap();

    let id = pipeline.config().command(PipeCommand::SetWord);
    let packet = pipeline.queue().packets().last().unwrap();
    assert_eq!(
        packet.words,
        [((id.to_bits() as u32) << 24) | 0x28, 0x7F81_0000]
    );
}

#[test]
fn matrix_index_is_not_sent() {
    let mut pipeline = pipeline(Counting::new());
    pipeline.mtx_index(AttributeValue::new(&[3u8])).unwrap();

    assert!(pipeline.queue().packets().is_empty());
    assert_eq!(
        pipeline.current(AttributeClass::MatrixIndex).get::<u8>(0),
        Some(3)
    );
}

#[test]
fn disabling_an_array_resizes_vertex_commands() {
    let mut pipeline = pipeline(Counting::new());
    bind(&mut pipeline);

    let mut sizes = Vec::new();
    let mut draw = |pipeline: &mut Pipeline<RecordingQueue, Counting>| {
        pipeline.begin(Topology::Triangles);
        pipeline.draw_arrays(0, 3).unwrap();

        let patch = pipeline.queue().of(PipeCommand::SetVtxCmdSize).last().unwrap();
        sizes.push((pipeline.generator().cmd_size(), patch.words[0] & 0xFFFF));
    };

    draw(&mut pipeline);
    pipeline.arrays_mut().disable(AttributeClass::Color);
    draw(&mut pipeline);
    pipeline.arrays_mut().enable(AttributeClass::Color);
    draw(&mut pipeline);

    let descriptor = pipeline.config().vtx_cmd_descriptor as u32 & 0x3FF;
    assert_eq!(
        sizes,
        [
            (20, descriptor | (20 << 8)),
            (12, descriptor | (12 << 8)),
            (20, descriptor | (20 << 8)),
        ]
    );
}

#[test]
fn immediate_mode_sequence() {
    let mut pipeline = pipeline(Counting::new());

    pipeline.begin(Topology::Triangles);
    pipeline
        .color(AttributeValue::new(&[1.0f32, 0.0, 0.0]))
        .unwrap();
    pipeline.vertex(AttributeValue::new(&[1.0f32, 2.0, 3.0])).unwrap();
    pipeline.vertex(AttributeValue::new(&[4.0f32, 5.0])).unwrap();
    pipeline.vertex(AttributeValue::new(&[7i16, 8, 9, 1])).unwrap();
    assert_eq!(pipeline.mode(), Mode::VertexImmediate);
    pipeline.end().unwrap();

    let packets = pipeline.queue().packets();
    assert_eq!(
        commands(packets),
        [
            PipeCommand::InitPipe,
            PipeCommand::SetLong,
            PipeCommand::SetVtxLoader,
            PipeCommand::SetVtxCmdSize,
            PipeCommand::SetPrimVtx,
            PipeCommand::SetPrimVtx,
            PipeCommand::SetPrimVtx,
            PipeCommand::DrawTri,
            PipeCommand::SetLong,
            PipeCommand::SetLong,
            PipeCommand::SetWord,
        ]
    );

    // the loader packet starts at 0x1010, so its code follows the address word
    let loader = &packets[2];
    assert_eq!(
        format!("{:?}", Ins::decode(loader.words[2]).unwrap()),
        "ldv $v24[0], 0($20)"
    );

    let vertices: Vec<Vec<u16>> = pipeline
        .queue()
        .of(PipeCommand::SetPrimVtx)
        .map(|p| p.halves().skip(1).collect())
        .collect();

    let stride = pipeline.config().slot_stride as u16;
    assert_eq!(
        vertices,
        [
            vec![0, 0x20, 0x40, 0x60, 0x20],
            vec![stride, 0x80, 0xA0, 0, 0x20],
            vec![2 * stride, 0xE0, 0x100, 0x120, 0x20],
        ]
    );

    // the color set before the vertices is sent again once the batch ends
    let color = &packets[8];
    assert_eq!(
        color.halves().skip(1).collect::<Vec<_>>(),
        [0x18, 0x7FFF, 0, 0, 0x7FFF]
    );
}

#[test]
fn invalid_values_queue_nothing() {
    let mut pipeline = pipeline(Counting::new());

    assert!(matches!(
        pipeline.vertex(AttributeValue::new(&[1.0f32])),
        Err(PipelineError::InvalidSize {
            class: AttributeClass::Position,
            size: 1
        })
    ));
    assert!(matches!(
        pipeline.normal(AttributeValue::new(&[1i8, 0])),
        Err(PipelineError::InvalidSize {
            class: AttributeClass::Normal,
            size: 2
        })
    ));

    assert!(pipeline.queue().packets().is_empty());
    assert_eq!(pipeline.mode(), Mode::Indeterminate);
}

#[test]
fn missing_buffers_are_reported_before_drawing() {
    let mut pipeline = pipeline(Counting::new());
    pipeline.arrays_mut().enable(AttributeClass::Position);

    pipeline.begin(Topology::Triangles);
    let init = pipeline.queue_mut().take();
    assert_eq!(commands(&init), [PipeCommand::InitPipe]);

    assert!(matches!(
        pipeline.draw_arrays(0, 3),
        Err(PipelineError::MissingBuffer(AttributeClass::Position))
    ));
    assert!(matches!(
        pipeline.array_element(0),
        Err(PipelineError::MissingBuffer(AttributeClass::Position))
    ));

    assert!(pipeline.queue().packets().is_empty());
    assert_eq!(pipeline.generator().generations(), 0);
}

#[test]
fn out_of_bounds_elements() {
    let mut pipeline = pipeline(Counting::new());
    bind(&mut pipeline);

    assert!(matches!(
        pipeline.draw_arrays(4, 3),
        Err(PipelineError::ElementOutOfBounds { index: 6, .. })
    ));
    assert!(pipeline.queue().packets().is_empty());
}

#[test]
fn indexed_draws() {
    let mut pipeline = pipeline(Counting::new());
    bind(&mut pipeline);

    let indices: [u16; 6] = [0, 1, 2, 2, 1, 3];
    let buffer = IndexBuffer::new(IndexType::U16, indices.as_bytes());

    pipeline.begin(Topology::Triangles);
    pipeline.draw_elements(&buffer, 6).unwrap();

    assert_eq!(pipeline.cache().assigned, 4);
    assert_eq!(pipeline.cache().completed, [0, 1, 2, 2, 1, 3]);
    assert_eq!(pipeline.queue().of(PipeCommand::SetPrimVtx).count(), 4);
    assert_eq!(pipeline.queue().of(PipeCommand::DrawTri).count(), 2);
    assert_eq!(*pipeline.current(AttributeClass::Color), color_of(3));

    assert!(matches!(
        pipeline.draw_elements(&buffer, 7),
        Err(PipelineError::IndexOutOfBounds(6))
    ));
}

#[test]
fn last_vertex_becomes_current_on_cache_hit() {
    let mut pipeline = pipeline(Counting::new());
    bind(&mut pipeline);

    let indices: [u8; 6] = [0, 1, 2, 2, 1, 0];
    let buffer = IndexBuffer::new(IndexType::U8, &indices);

    pipeline.begin(Topology::Triangles);
    pipeline.draw_elements(&buffer, 6).unwrap();

    assert_eq!(pipeline.cache().assigned, 3);
    assert_eq!(pipeline.cache().completed, [0, 1, 2, 2, 1, 0]);
    assert_eq!(*pipeline.current(AttributeClass::Color), color_of(0));

    let packets = pipeline.queue().packets();
    assert_eq!(
        commands(packets),
        [
            PipeCommand::InitPipe,
            PipeCommand::SetVtxLoader,
            PipeCommand::SetVtxCmdSize,
            PipeCommand::SetPrimVtx,
            PipeCommand::SetPrimVtx,
            PipeCommand::SetPrimVtx,
            PipeCommand::DrawTri,
            PipeCommand::DrawTri,
            PipeCommand::SetLong,
        ]
    );
    assert_eq!(
        payload(packets.last().unwrap()),
        [0x18, 0x7F80, 0, 0, 0x7F80]
    );
}

#[test]
#[should_panic(expected = "slot offsets must fit in a half-word")]
fn oversized_vertex_store_is_rejected() {
    Pipeline::new(
        Config {
            slot_stride: 0x1000,
            ..Default::default()
        },
        RecordingQueue::default(),
    );
}

#[test]
fn disabled_positions_only_update_current_values() {
    let mut pipeline = pipeline(Counting::new());
    bind(&mut pipeline);
    pipeline.arrays_mut().disable(AttributeClass::Position);

    pipeline.begin(Topology::Triangles);
    pipeline.queue_mut().take();
    pipeline.draw_arrays(0, 3).unwrap();

    assert_eq!(
        commands(pipeline.queue().packets()),
        [PipeCommand::SetLong]
    );
    assert_eq!(*pipeline.current(AttributeClass::Color), color_of(2));
    assert_eq!(pipeline.cache().assigned, 0);
}

#[test]
fn exhausted_cache_drops_vertices() {
    let mut pipeline = pipeline(Exhausted);

    pipeline.begin(Topology::Triangles);
    for _ in 0..3 {
        pipeline
            .vertex(AttributeValue::new(&[0.0f32, 0.0, 0.0]))
            .unwrap();
    }

    assert_eq!(pipeline.queue().of(PipeCommand::SetPrimVtx).count(), 0);
    assert_eq!(pipeline.queue().of(PipeCommand::DrawTri).count(), 0);
}

#[test]
fn default_cache_matches_config() {
    let mut pipeline = Pipeline::new(
        Config {
            cache_capacity: 8,
            ..Default::default()
        },
        RecordingQueue::default(),
    );

    assert_eq!(pipeline.cache().capacity(), 8);
    pipeline.begin(Topology::Quads);
    assert_eq!(pipeline.cache().topology(), Topology::Quads);
}
