use crate::builder::{LoaderBuilder, regs};
use glpipe::attrib::{self, Attribute};
use glpipe::state::PipeState;
use rspasm::Ins;

/// Loads a position, color or texture coordinate vector from the command payload, completing
/// vectors shorter than four components from the default table.
fn load_vector<A: Attribute>(builder: &mut LoaderBuilder, size: u32) {
    let dst = LoaderBuilder::dst_vreg(A::CLASS);
    let default = PipeState::default_offset(A::CLASS) as i8;

    builder.align(util::next_pow2(size * 2));
    let offset = builder.cmd_offset as i8;

    match size {
        1 => {
            builder.emit(Ins::ldv(dst, 0, default >> 3, regs::DEFAULTS));
            builder.emit(Ins::lsv(dst, 0, offset >> 1, regs::CMD));
        }
        2 => {
            builder.emit(Ins::llv(dst, 0, offset >> 2, regs::CMD));
            builder.emit(Ins::llv(dst, 4, (default >> 2) + 1, regs::DEFAULTS));
        }
        3 => {
            builder.emit(Ins::ldv(dst, 0, offset >> 3, regs::CMD));
            builder.emit(Ins::lsv(dst, 6, (default >> 1) + 3, regs::DEFAULTS));
        }
        4 => builder.emit(Ins::ldv(dst, 0, offset >> 3, regs::CMD)),
        _ => unreachable!("vectors have 1 to 4 components"),
    }
}

pub trait AttributeExt: Attribute {
    /// Loads the attribute from its current-attribute register.
    fn set_default(builder: &mut LoaderBuilder) {
        let dst = LoaderBuilder::dst_vreg(Self::CLASS);
        let offset = PipeState::current_offset(Self::CLASS) as i8;
        builder.emit(Ins::ldv(dst, 0, offset >> 3, regs::CURRENT));
    }

    /// Loads `size` components of the attribute from the command payload.
    fn load(builder: &mut LoaderBuilder, size: u32);
}

impl AttributeExt for attrib::Position {
    fn load(builder: &mut LoaderBuilder, size: u32) {
        load_vector::<Self>(builder, size);
    }
}

impl AttributeExt for attrib::Color {
    fn load(builder: &mut LoaderBuilder, size: u32) {
        load_vector::<Self>(builder, size);
    }
}

impl AttributeExt for attrib::TexCoord {
    fn load(builder: &mut LoaderBuilder, size: u32) {
        load_vector::<Self>(builder, size);
    }
}

impl AttributeExt for attrib::Normal {
    fn set_default(builder: &mut LoaderBuilder) {
        let offset = PipeState::current_offset(Self::CLASS) as i16;
        builder.emit(Ins::lw(regs::NORMAL, regs::CURRENT, offset));
    }

    fn load(builder: &mut LoaderBuilder, _: u32) {
        let offset = builder.cmd_offset as i16;
        builder.emit(Ins::lw(regs::NORMAL, regs::CMD, offset));
    }
}
