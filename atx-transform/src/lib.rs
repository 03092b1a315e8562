//! Access transforms for JVM class files.
//!
//! An [`AccessTransformSet`] records visibility and finality requests for
//! classes and their members. Sets are read from and written to directive
//! files with [`format`], moved between naming namespaces with [`remap`], and
//! applied to class files with [`AccessTransformer`] or [`transform_class`].

pub mod access;
pub mod error;
pub mod format;
pub mod manifest;
pub mod remap;
pub mod set;
pub mod transformer;

pub use access::{AccessChange, AccessTransform, ModifierChange};
pub use error::RemapError;
pub use remap::{remap, remap_text};
pub use set::{AccessTransformSet, ClassTransforms, MethodSignature};
pub use transformer::{AccessTransformer, transform_class};
