//! Leaf components of the RSP vertex pipeline: attribute data model and encoding, command
//! framing, the vertex cache and the coprocessor's data layout.
pub mod attrib;
pub mod cache;
pub mod codec;
pub mod config;
pub mod state;
pub mod stream;

pub use config::Config;

use attrib::AttributeClass;
use easyerr::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported source type {f0:#06X}")]
    UnsupportedType(u32),
    #[error("invalid component count {size} for {class:?}")]
    InvalidSize { class: AttributeClass, size: u32 },
    #[error("element {index} of the {class:?} array is out of bounds")]
    ElementOutOfBounds { class: AttributeClass, index: u32 },
    #[error("the {f0:?} array is enabled but has no buffer bound")]
    MissingBuffer(AttributeClass),
    #[error("index {f0} is past the end of the index buffer")]
    IndexOutOfBounds(usize),
}
