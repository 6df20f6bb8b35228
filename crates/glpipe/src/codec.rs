//! Conversion of source attribute components into the coprocessor's fixed point wire format.
//!
//! Positions and texture coordinates are signed 10.5 fixed point, colors are signed 0.15 fixed
//! point and normals are signed 0.7 fixed point packed two per half-word.
use crate::attrib::{AttributeClass, AttributeValue, SourceType};
use zerocopy::{FromBytes, IntoBytes};

/// Fractional bits of positions and texture coordinates.
pub const COORD_SHIFT: u32 = 5;

/// Something encoded half-words can be written to.
pub trait HalfSink {
    fn put_half(&mut self, value: u16);
}

impl HalfSink for Vec<u16> {
    fn put_half(&mut self, value: u16) {
        self.push(value);
    }
}

/// Encodes `count` components read from a source element.
pub type Encoder = fn(&mut dyn HalfSink, &[u8], u32);

trait Component: FromBytes + Copy {
    fn coord(self) -> u16;
    fn color(self) -> u16;
    fn normal(self) -> u8;
}

macro_rules! component {
    ($($ty:ty => |$v:ident| { coord: $coord:expr, color: $color:expr, normal: $normal:expr $(,)? })*) => {
        $(
            impl Component for $ty {
                #[inline(always)]
                fn coord(self) -> u16 {
                    let $v = self;
                    $coord
                }

                #[inline(always)]
                fn color(self) -> u16 {
                    let $v = self;
                    $color
                }

                #[inline(always)]
                fn normal(self) -> u8 {
                    let $v = self;
                    $normal
                }
            }
        )*
    };
}

component! {
    i8 => |v| {
        coord: ((v as i32) << COORD_SHIFT) as u16,
        color: ((v as i16) << 8) as u16,
        normal: v as u8,
    }
    u8 => |v| {
        coord: ((v as u32) << COORD_SHIFT) as u16,
        color: (v as u16) << 7,
        normal: v >> 1,
    }
    i16 => |v| {
        coord: ((v as i32) << COORD_SHIFT) as u16,
        color: v as u16,
        normal: (v >> 8) as u8,
    }
    u16 => |v| {
        coord: ((v as u32) << COORD_SHIFT) as u16,
        color: v >> 1,
        normal: (v >> 9) as u8,
    }
    i32 => |v| {
        coord: (v << COORD_SHIFT) as u16,
        color: (v >> 16) as u16,
        normal: (v >> 24) as u8,
    }
    u32 => |v| {
        coord: (v << COORD_SHIFT) as u16,
        color: (v >> 17) as u16,
        normal: (v >> 25) as u8,
    }
    f32 => |v| {
        coord: (v * (1 << COORD_SHIFT) as f32) as i32 as u16,
        color: (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16 as u16,
        normal: (v * i8::MAX as f32) as i32 as u8,
    }
    f64 => |v| {
        coord: (v * (1 << COORD_SHIFT) as f64) as i32 as u16,
        color: (v.clamp(-1.0, 1.0) * i16::MAX as f64) as i16 as u16,
        normal: (v * i8::MAX as f64) as i32 as u8,
    }
}

fn components<T: Component>(src: &[u8], count: u32) -> impl Iterator<Item = T> + '_ {
    src.chunks_exact(size_of::<T>())
        .take(count as usize)
        .filter_map(|bytes| T::read_from_bytes(bytes).ok())
}

fn coord<T: Component>(sink: &mut dyn HalfSink, src: &[u8], count: u32) {
    for value in components::<T>(src, count) {
        sink.put_half(value.coord());
    }
}

fn color<T: Component>(sink: &mut dyn HalfSink, src: &[u8], count: u32) {
    for value in components::<T>(src, count) {
        sink.put_half(value.color());
    }
}

/// Normals always take two half-words: `x << 8 | y` and `z << 8`.
fn normal<T: Component>(sink: &mut dyn HalfSink, src: &[u8], _: u32) {
    let mut values = components::<T>(src, 3).map(Component::normal);
    let mut next = || values.next().unwrap_or_default() as u16;
    let (x, y, z) = (next(), next(), next());

    sink.put_half((x << 8) | y);
    sink.put_half(z << 8);
}

fn ignore(_: &mut dyn HalfSink, _: &[u8], _: u32) {}

/// Returns the encoder of `class` for source data of type `ty`.
pub fn encoder(class: AttributeClass, ty: SourceType) -> Encoder {
    macro_rules! select {
        ($f:ident) => {
            match ty {
                SourceType::I8 => $f::<i8> as Encoder,
                SourceType::U8 => $f::<u8>,
                SourceType::I16 => $f::<i16>,
                SourceType::U16 => $f::<u16>,
                SourceType::I32 => $f::<i32>,
                SourceType::U32 => $f::<u32>,
                SourceType::F32 => $f::<f32>,
                SourceType::F64 => $f::<f64>,
            }
        };
    }

    match class {
        AttributeClass::Position | AttributeClass::TexCoord => select!(coord),
        AttributeClass::Color => select!(color),
        AttributeClass::Normal => select!(normal),
        // matrix indices are not sent to the coprocessor
        AttributeClass::MatrixIndex => ignore,
    }
}

/// Writes the default components of `class` from component `from` onwards.
pub fn encode_defaults(sink: &mut dyn HalfSink, class: AttributeClass, from: u32) {
    let Some(defaults) = class.defaults() else {
        return;
    };

    let tail = &defaults[(from as usize).min(defaults.len())..];
    encoder(class, SourceType::I16)(sink, tail.as_bytes(), tail.len() as u32);
}

/// Writes `value` followed by the default tail of `class`, always filling every component.
pub fn encode_value(sink: &mut dyn HalfSink, class: AttributeClass, value: &AttributeValue) {
    encoder(class, value.ty())(sink, value.bytes(), value.size());
    encode_defaults(sink, class, value.size());
}
