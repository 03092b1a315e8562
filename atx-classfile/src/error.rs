use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unexpected end of class data at offset {0:#x}")]
    UnexpectedEof(usize),

    #[error("Invalid magic: expected 0xCAFEBABE, found {0:#010x}")]
    InvalidMagic(u32),

    #[error("Invalid constant pool tag {0} at offset {1:#x}")]
    InvalidConstantTag(u8, usize),

    #[error("Constant pool index {0} out of range")]
    InvalidConstantIndex(u16),

    #[error("Constant pool entry {index} is not a {expected}")]
    ConstantMismatch { index: u16, expected: &'static str },

    #[error("Constant pool overflow: {0} entries")]
    ConstantPoolOverflow(usize),

    #[error("Invalid MUTF-8 encoding at offset {0:#x}")]
    InvalidMutf8(usize),

    #[error("Invalid opcode {opcode:#04x} at code offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },

    #[error("Truncated instruction at code offset {0}")]
    TruncatedInstruction(usize),

    #[error("Bootstrap method index {0} out of range")]
    InvalidBootstrapIndex(u16),

    #[error("Visitor event mismatch: {0}")]
    EventMismatch(String),

    #[error("Unsupported edit: {0}")]
    UnsupportedEdit(String),
}

pub type Result<T> = std::result::Result<T, Error>;
