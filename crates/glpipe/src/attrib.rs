//! Vertex attributes, their source types and the array bindings they are fetched from.
use crate::PipelineError;
use crate::codec::{self, Encoder};
use std::ops::{Index, RangeInclusive};
use std::sync::Arc;
use strum::{FromRepr, VariantArray};
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// The closed set of per-vertex attributes, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, VariantArray)]
#[repr(u8)]
pub enum AttributeClass {
    Position = 0,
    Color = 1,
    TexCoord = 2,
    Normal = 3,
    MatrixIndex = 4,
}

impl AttributeClass {
    pub const COUNT: usize = Self::VARIANTS.len();

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Maximum number of components of this attribute.
    pub fn max_size(self) -> u32 {
        match self {
            Self::Normal => 3,
            _ => 4,
        }
    }

    /// Component counts accepted when binding an array or setting a value of this attribute.
    pub fn sizes(self) -> RangeInclusive<u32> {
        match self {
            Self::Position => 2..=4,
            Self::Color => 3..=4,
            Self::TexCoord | Self::MatrixIndex => 1..=4,
            Self::Normal => 3..=3,
        }
    }

    /// Whether an array of this attribute may hold elements of type `ty`.
    pub fn accepts(self, ty: SourceType) -> bool {
        use SourceType::*;
        match self {
            Self::Position | Self::TexCoord => matches!(ty, I16 | I32 | F32 | F64),
            Self::Normal => matches!(ty, I8 | I16 | I32 | F32 | F64),
            Self::Color => true,
            Self::MatrixIndex => matches!(ty, U8 | U16 | U32),
        }
    }

    /// Bytes occupied on the wire by `size` encoded components.
    pub fn footprint(self, size: u32) -> u32 {
        match self {
            Self::Normal => 4,
            Self::MatrixIndex => 0,
            _ => size * 2,
        }
    }

    /// Values of the components a shorter source vector leaves unspecified, as int16 source
    /// values. Normal and matrix index have no default tail.
    pub fn defaults(self) -> Option<[i16; 4]> {
        match self {
            Self::Position | Self::TexCoord => Some([0, 0, 0, 1]),
            Self::Color => Some([0, 0, 0, 0x7FFF]),
            Self::Normal | Self::MatrixIndex => None,
        }
    }
}

/// Numeric type of attribute source data, identified by its GL enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, VariantArray)]
#[repr(u32)]
pub enum SourceType {
    I8 = 0x1400,
    U8 = 0x1401,
    I16 = 0x1402,
    U16 = 0x1403,
    I32 = 0x1404,
    U32 = 0x1405,
    F32 = 0x1406,
    F64 = 0x140A,
}

impl SourceType {
    pub fn from_tag(tag: u32) -> Result<Self, PipelineError> {
        Self::from_repr(tag).ok_or(PipelineError::UnsupportedType(tag))
    }

    #[inline(always)]
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Size of a single component in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// A Rust type usable as an attribute component.
pub trait Element: IntoBytes + FromBytes + Immutable + Copy {
    const TYPE: SourceType;
}

macro_rules! element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: SourceType = SourceType::$variant;
            }
        )*
    };
}

element! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    f32 => F32,
    f64 => F64,
}

const MAX_VALUE_BYTES: usize = 4 * size_of::<f64>();

/// Up to four source-typed components of an attribute, kept before conversion.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AttributeValue {
    ty: SourceType,
    size: u8,
    data: [u8; MAX_VALUE_BYTES],
}

impl AttributeValue {
    pub fn new<T: Element>(values: &[T]) -> Self {
        assert!(
            (1..=4).contains(&values.len()),
            "attribute values have 1 to 4 components"
        );

        let bytes = values.as_bytes();
        let mut data = [0; MAX_VALUE_BYTES];
        data[..bytes.len()].copy_from_slice(bytes);

        Self {
            ty: T::TYPE,
            size: values.len() as u8,
            data,
        }
    }

    /// Builds a value of `class` from `size` components of type `tag` stored in `bytes`.
    pub fn from_raw(
        class: AttributeClass,
        tag: u32,
        bytes: &[u8],
        size: u32,
    ) -> Result<Self, PipelineError> {
        let ty = SourceType::from_tag(tag)?;
        if !class.accepts(ty) {
            return Err(PipelineError::UnsupportedType(tag));
        }

        let len = size as usize * ty.size();
        if !class.sizes().contains(&size) || bytes.len() < len {
            return Err(PipelineError::InvalidSize { class, size });
        }

        let mut data = [0; MAX_VALUE_BYTES];
        data[..len].copy_from_slice(&bytes[..len]);

        Ok(Self {
            ty,
            size: size as u8,
            data,
        })
    }

    #[inline(always)]
    pub fn ty(&self) -> SourceType {
        self.ty
    }

    #[inline(always)]
    pub fn size(&self) -> u32 {
        self.size as u32
    }

    /// The source bytes of the components.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.size as usize * self.ty.size()]
    }

    /// Returns component `index` if it exists and is of type `T`.
    pub fn get<T: Element>(&self, index: usize) -> Option<T> {
        if T::TYPE != self.ty || index >= self.size as usize {
            return None;
        }

        let start = index * size_of::<T>();
        T::read_from_bytes(&self.data[start..start + size_of::<T>()]).ok()
    }

    /// Value of the current-attribute register of `class` before anything sets it.
    pub fn initial(class: AttributeClass) -> Self {
        match class {
            AttributeClass::Position => Self::new(&[0.0f32, 0.0, 0.0, 1.0]),
            AttributeClass::Color => Self::new(&[1.0f32, 1.0, 1.0, 1.0]),
            AttributeClass::TexCoord => Self::new(&[0.0f32, 0.0, 0.0, 1.0]),
            AttributeClass::Normal => Self::new(&[0.0f32, 0.0, 1.0]),
            AttributeClass::MatrixIndex => Self::new(&[0u8]),
        }
    }
}

impl std::fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeValue")
            .field("ty", &self.ty)
            .field("size", &self.size)
            .field("bytes", &self.bytes())
            .finish()
    }
}

/// An attribute array binding.
#[derive(Clone)]
pub struct ArrayDescriptor {
    class: AttributeClass,
    enabled: bool,
    size: u32,
    ty: SourceType,
    stride: usize,
    offset: usize,
    buffer: Option<Arc<[u8]>>,
    encoder: Encoder,
}

impl ArrayDescriptor {
    fn new(class: AttributeClass) -> Self {
        let ty = match class {
            AttributeClass::MatrixIndex => SourceType::U8,
            _ => SourceType::F32,
        };

        Self {
            class,
            enabled: false,
            size: class.max_size(),
            ty,
            stride: 0,
            offset: 0,
            buffer: None,
            encoder: codec::encoder(class, ty),
        }
    }

    #[inline(always)]
    pub fn class(&self) -> AttributeClass {
        self.class
    }

    #[inline(always)]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline(always)]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline(always)]
    pub fn ty(&self) -> SourceType {
        self.ty
    }

    /// Encoder for this binding, resolved when it was bound.
    #[inline(always)]
    pub fn encoder(&self) -> Encoder {
        self.encoder
    }

    /// Size of a single element in bytes.
    pub fn element_size(&self) -> usize {
        self.size as usize * self.ty.size()
    }

    /// Distance between consecutive elements. A zero stride means tightly packed.
    pub fn stride(&self) -> usize {
        if self.stride == 0 {
            self.element_size()
        } else {
            self.stride
        }
    }

    /// Source bytes of element `index`.
    pub fn element(&self, index: u32) -> Result<&[u8], PipelineError> {
        let buffer = self
            .buffer
            .as_deref()
            .ok_or(PipelineError::MissingBuffer(self.class))?;

        let start = self.offset + index as usize * self.stride();
        buffer
            .get(start..start + self.element_size())
            .ok_or(PipelineError::ElementOutOfBounds {
                class: self.class,
                index,
            })
    }

    /// Element `index` as an attribute value.
    pub fn value(&self, index: u32) -> Result<AttributeValue, PipelineError> {
        let bytes = self.element(index)?;
        AttributeValue::from_raw(self.class, self.ty.tag(), bytes, self.size)
    }
}

impl std::fmt::Debug for ArrayDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayDescriptor")
            .field("class", &self.class)
            .field("enabled", &self.enabled)
            .field("size", &self.size)
            .field("ty", &self.ty)
            .field("stride", &self.stride)
            .field("offset", &self.offset)
            .field("buffer_len", &self.buffer.as_ref().map(|b| b.len()))
            .finish_non_exhaustive()
    }
}

/// Standard interleaved array formats, identified by their GL enum value.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, VariantArray)]
#[repr(u32)]
pub enum InterleavedFormat {
    V2F = 0x2A20,
    V3F = 0x2A21,
    C4UB_V2F = 0x2A22,
    C4UB_V3F = 0x2A23,
    C3F_V3F = 0x2A24,
    N3F_V3F = 0x2A25,
    C4F_N3F_V3F = 0x2A26,
    T2F_V3F = 0x2A27,
    T4F_V4F = 0x2A28,
    T2F_C4UB_V3F = 0x2A29,
    T2F_C3F_V3F = 0x2A2A,
    T2F_N3F_V3F = 0x2A2B,
    T2F_C4F_N3F_V3F = 0x2A2C,
    T4F_C4F_N3F_V4F = 0x2A2D,
}

struct InterleavedLayout {
    /// Texture coordinate size. Texture coordinates always start the vertex.
    texcoord: Option<u32>,
    /// Color size, type and offset.
    color: Option<(u32, SourceType, usize)>,
    /// Normal offset.
    normal: Option<usize>,
    /// Position size and offset.
    position: (u32, usize),
    stride: usize,
}

impl InterleavedFormat {
    fn layout(self) -> InterleavedLayout {
        const F: usize = size_of::<f32>();
        const C: usize = 4 * size_of::<u8>();

        let (texcoord, color, normal, position, stride) = match self {
            Self::V2F => (None, None, None, (2, 0), 2 * F),
            Self::V3F => (None, None, None, (3, 0), 3 * F),
            Self::C4UB_V2F => (None, Some((4, SourceType::U8, 0)), None, (2, C), C + 2 * F),
            Self::C4UB_V3F => (None, Some((4, SourceType::U8, 0)), None, (3, C), C + 3 * F),
            Self::C3F_V3F => (
                None,
                Some((3, SourceType::F32, 0)),
                None,
                (3, 3 * F),
                6 * F,
            ),
            Self::N3F_V3F => (None, None, Some(0), (3, 3 * F), 6 * F),
            Self::C4F_N3F_V3F => (
                None,
                Some((4, SourceType::F32, 0)),
                Some(4 * F),
                (3, 7 * F),
                10 * F,
            ),
            Self::T2F_V3F => (Some(2), None, None, (3, 2 * F), 5 * F),
            Self::T4F_V4F => (Some(4), None, None, (4, 4 * F), 8 * F),
            Self::T2F_C4UB_V3F => (
                Some(2),
                Some((4, SourceType::U8, 2 * F)),
                None,
                (3, C + 2 * F),
                C + 5 * F,
            ),
            Self::T2F_C3F_V3F => (
                Some(2),
                Some((3, SourceType::F32, 2 * F)),
                None,
                (3, 5 * F),
                8 * F,
            ),
            Self::T2F_N3F_V3F => (Some(2), None, Some(2 * F), (3, 5 * F), 8 * F),
            Self::T2F_C4F_N3F_V3F => (
                Some(2),
                Some((4, SourceType::F32, 2 * F)),
                Some(6 * F),
                (3, 9 * F),
                12 * F,
            ),
            Self::T4F_C4F_N3F_V4F => (
                Some(4),
                Some((4, SourceType::F32, 4 * F)),
                Some(8 * F),
                (4, 11 * F),
                15 * F,
            ),
        };

        InterleavedLayout {
            texcoord,
            color,
            normal,
            position,
            stride,
        }
    }

    /// Stride used when the caller passes a zero stride.
    pub fn default_stride(self) -> usize {
        self.layout().stride
    }
}

/// The array bindings of every attribute.
#[derive(Debug, Clone)]
pub struct Arrays {
    arrays: [ArrayDescriptor; AttributeClass::COUNT],
}

impl Default for Arrays {
    fn default() -> Self {
        Self {
            arrays: std::array::from_fn(|i| {
                ArrayDescriptor::new(AttributeClass::VARIANTS[i])
            }),
        }
    }
}

impl Arrays {
    /// Binds `buffer` as the source of `class`. Nothing changes if the binding is rejected.
    pub fn set_pointer(
        &mut self,
        class: AttributeClass,
        size: u32,
        tag: u32,
        stride: usize,
        buffer: Arc<[u8]>,
        offset: usize,
    ) -> Result<(), PipelineError> {
        if !class.sizes().contains(&size) {
            return Err(PipelineError::InvalidSize { class, size });
        }

        let ty = SourceType::from_tag(tag)?;
        if !class.accepts(ty) {
            return Err(PipelineError::UnsupportedType(tag));
        }

        let array = &mut self.arrays[class.index()];
        array.size = size;
        array.ty = ty;
        array.stride = stride;
        array.offset = offset;
        array.buffer = Some(buffer);
        array.encoder = codec::encoder(class, ty);

        Ok(())
    }

    pub fn enable(&mut self, class: AttributeClass) {
        self.arrays[class.index()].enabled = true;
    }

    pub fn disable(&mut self, class: AttributeClass) {
        self.arrays[class.index()].enabled = false;
    }

    /// Binds every attribute of an interleaved `format` to `buffer`, enabling the attributes
    /// the format contains and disabling the others. Matrix indices are left untouched.
    pub fn set_interleaved(
        &mut self,
        format: InterleavedFormat,
        stride: usize,
        buffer: Arc<[u8]>,
    ) -> Result<(), PipelineError> {
        let layout = format.layout();
        let stride = if stride == 0 { layout.stride } else { stride };
        let float = SourceType::F32.tag();

        match layout.texcoord {
            Some(size) => {
                self.enable(AttributeClass::TexCoord);
                self.set_pointer(
                    AttributeClass::TexCoord,
                    size,
                    float,
                    stride,
                    buffer.clone(),
                    0,
                )?;
            }
            None => self.disable(AttributeClass::TexCoord),
        }

        match layout.color {
            Some((size, ty, offset)) => {
                self.enable(AttributeClass::Color);
                self.set_pointer(
                    AttributeClass::Color,
                    size,
                    ty.tag(),
                    stride,
                    buffer.clone(),
                    offset,
                )?;
            }
            None => self.disable(AttributeClass::Color),
        }

        match layout.normal {
            Some(offset) => {
                self.enable(AttributeClass::Normal);
                self.set_pointer(
                    AttributeClass::Normal,
                    3,
                    float,
                    stride,
                    buffer.clone(),
                    offset,
                )?;
            }
            None => self.disable(AttributeClass::Normal),
        }

        let (size, offset) = layout.position;
        self.enable(AttributeClass::Position);
        self.set_pointer(AttributeClass::Position, size, float, stride, buffer, offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArrayDescriptor> {
        self.arrays.iter()
    }
}

impl Index<AttributeClass> for Arrays {
    type Output = ArrayDescriptor;

    fn index(&self, class: AttributeClass) -> &Self::Output {
        &self.arrays[class.index()]
    }
}

/// Width of the indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u32)]
pub enum IndexType {
    U8 = 0x1401,
    U16 = 0x1403,
    U32 = 0x1405,
}

impl IndexType {
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Indices of an indexed draw, in native byte order.
#[derive(Debug, Clone, Copy)]
pub struct IndexBuffer<'a> {
    ty: IndexType,
    data: &'a [u8],
}

impl<'a> IndexBuffer<'a> {
    pub fn new(ty: IndexType, data: &'a [u8]) -> Self {
        Self { ty, data }
    }

    pub fn from_tag(tag: u32, data: &'a [u8]) -> Result<Self, PipelineError> {
        let ty = IndexType::from_repr(tag).ok_or(PipelineError::UnsupportedType(tag))?;
        Ok(Self::new(ty, data))
    }

    #[inline(always)]
    pub fn ty(&self) -> IndexType {
        self.ty
    }

    /// Number of complete indices in the buffer.
    pub fn len(&self) -> usize {
        self.data.len() / self.ty.size()
    }

    /// Reads index `i`.
    pub fn read(&self, i: usize) -> Option<u32> {
        let size = self.ty.size();
        let bytes = self.data.get(i * size..(i + 1) * size)?;
        match self.ty {
            IndexType::U8 => Some(bytes[0] as u32),
            IndexType::U16 => u16::read_from_bytes(bytes).ok().map(u32::from),
            IndexType::U32 => u32::read_from_bytes(bytes).ok(),
        }
    }
}

/// A vertex attribute.
pub trait Attribute {
    const CLASS: AttributeClass;
}

pub struct Position;

impl Attribute for Position {
    const CLASS: AttributeClass = AttributeClass::Position;
}

pub struct Color;

impl Attribute for Color {
    const CLASS: AttributeClass = AttributeClass::Color;
}

pub struct TexCoord;

impl Attribute for TexCoord {
    const CLASS: AttributeClass = AttributeClass::TexCoord;
}

pub struct Normal;

impl Attribute for Normal {
    const CLASS: AttributeClass = AttributeClass::Normal;
}

pub struct MatrixIndex;

impl Attribute for MatrixIndex {
    const CLASS: AttributeClass = AttributeClass::MatrixIndex;
}
