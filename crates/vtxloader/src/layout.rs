use glpipe::attrib::{Arrays, AttributeClass};

/// The set of attributes a vertex command carries, and their component counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub position: Option<u8>,
    pub color: Option<u8>,
    pub texcoord: Option<u8>,
    pub normal: bool,
}

impl VertexLayout {
    /// Layout of immediate mode vertices: a full position and nothing else.
    pub const IMMEDIATE: Self = Self {
        position: Some(4),
        color: None,
        texcoord: None,
        normal: false,
    };

    pub fn from_arrays(arrays: &Arrays) -> Self {
        let size = |class: AttributeClass| {
            let array = &arrays[class];
            array.enabled().then_some(array.size() as u8)
        };

        Self {
            position: size(AttributeClass::Position),
            color: size(AttributeClass::Color),
            texcoord: size(AttributeClass::TexCoord),
            normal: arrays[AttributeClass::Normal].enabled(),
        }
    }

    /// Component count of `class` if it is carried by the vertex command.
    pub fn size(&self, class: AttributeClass) -> Option<u32> {
        match class {
            AttributeClass::Position => self.position.map(u32::from),
            AttributeClass::Color => self.color.map(u32::from),
            AttributeClass::TexCoord => self.texcoord.map(u32::from),
            AttributeClass::Normal => self.normal.then_some(3),
            AttributeClass::MatrixIndex => None,
        }
    }

    /// Size in bytes of a vertex command with this layout, header included.
    pub fn cmd_size(&self) -> u32 {
        let payload: u32 = [
            AttributeClass::Position,
            AttributeClass::Color,
            AttributeClass::TexCoord,
            AttributeClass::Normal,
        ]
        .into_iter()
        .filter_map(|class| self.size(class).map(|size| class.footprint(size)))
        .sum();

        util::round_up(4 + payload, 4)
    }
}
