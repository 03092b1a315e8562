//! JVM class-file reader, structural event stream and patching writer.
//!
//! A [`ClassReader`] parses a class file and replays its structure as
//! [`ClassVisitor`] events. Adapters sit between the reader and a
//! [`ClassWriter`], which writes the original bytes back with the edits the
//! events carry. [`ClassBuilder`] assembles class files from scratch.

pub mod access;
pub mod builder;
pub mod constant_pool;
mod cursor;
pub mod error;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
pub mod mutf8;
pub mod opcode;
pub mod reader;
pub mod visitor;
pub mod writer;

pub use access::AccessFlags;
pub use builder::{BootstrapHandle, ClassBuilder, Code};
pub use error::{Error, Result};
pub use reader::ClassReader;
pub use visitor::{
    BootstrapArg, ClassEvent, ClassHeader, ClassVersion, ClassVisitor, FieldDecl, Handle,
    HandleKind, InnerClass, InvokeDynamicInsn, InvokeKind, MethodDecl, MethodInsn,
};
pub use writer::ClassWriter;
