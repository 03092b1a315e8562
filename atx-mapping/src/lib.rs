//! Symbol tables mapping class and member names between namespaces.

pub mod descriptor;
pub mod error;
pub mod tree;

pub use error::MappingError;
pub use tree::{ClassId, MemoryMappingTree};

/// Read-only lookup of names across namespaces.
///
/// Namespaces are addressed by index into [`namespaces`](Self::namespaces).
/// Lookups return `None` when the element or its target name is unknown;
/// callers decide on the fallback.
pub trait SymbolTable {
    fn namespaces(&self) -> &[String];

    fn namespace_index(&self, name: &str) -> Option<usize> {
        self.namespaces().iter().position(|ns| ns == name)
    }

    fn class_name(&self, name: &str, from: usize, to: usize) -> Option<&str>;

    fn field_name(&self, owner: &str, name: &str, from: usize, to: usize) -> Option<&str>;

    /// `owner` and `descriptor` are given in namespace `from`.
    fn method_name(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
        from: usize,
        to: usize,
    ) -> Option<&str>;
}
