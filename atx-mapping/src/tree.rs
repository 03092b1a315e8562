//! In-memory mapping tree.

use std::collections::HashMap;

use crate::SymbolTable;
use crate::descriptor::remap_descriptor;
use crate::error::MappingError;

/// Handle to a class added to a [`MemoryMappingTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

#[derive(Debug, Clone)]
struct FieldMapping {
    names: Vec<String>,
}

#[derive(Debug, Clone)]
struct MethodMapping {
    /// Descriptor in the first namespace.
    descriptor: String,
    names: Vec<String>,
}

#[derive(Debug, Clone)]
struct ClassMapping {
    names: Vec<String>,
    fields: Vec<FieldMapping>,
    methods: Vec<MethodMapping>,
}

/// A symbol table built programmatically.
///
/// Every element carries one name per namespace; an empty name means the
/// element has no name in that namespace. Method descriptors are stored in
/// the first namespace and translated on lookup.
#[derive(Debug, Clone)]
pub struct MemoryMappingTree {
    namespaces: Vec<String>,
    classes: Vec<ClassMapping>,
    /// Per namespace: class name -> class.
    class_index: Vec<HashMap<String, usize>>,
}

impl MemoryMappingTree {
    pub fn new<S: AsRef<str>>(namespaces: &[S]) -> Result<Self, MappingError> {
        if namespaces.is_empty() {
            return Err(MappingError::NoNamespaces);
        }
        let mut names: Vec<String> = Vec::with_capacity(namespaces.len());
        for ns in namespaces {
            let ns = ns.as_ref();
            if names.iter().any(|n| n == ns) {
                return Err(MappingError::DuplicateNamespace(ns.to_owned()));
            }
            names.push(ns.to_owned());
        }
        Ok(Self {
            class_index: vec![HashMap::new(); names.len()],
            namespaces: names,
            classes: Vec::new(),
        })
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    fn check_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>, MappingError> {
        if names.len() != self.namespaces.len() {
            return Err(MappingError::NameCountMismatch {
                expected: self.namespaces.len(),
                found: names.len(),
            });
        }
        Ok(names.iter().map(|n| n.as_ref().to_owned()).collect())
    }

    fn class_mut(&mut self, id: ClassId) -> Result<&mut ClassMapping, MappingError> {
        self.classes
            .get_mut(id.0)
            .ok_or(MappingError::InvalidClassId(id.0))
    }

    /// Add a class with one name per namespace.
    pub fn add_class<S: AsRef<str>>(&mut self, names: &[S]) -> Result<ClassId, MappingError> {
        let names = self.check_names(names)?;
        for (ns, name) in names.iter().enumerate() {
            if !name.is_empty() && self.class_index[ns].contains_key(name) {
                log::debug!("class {name} already mapped in {}", self.namespaces[ns]);
                return Err(MappingError::DuplicateClass(name.clone()));
            }
        }
        let id = self.classes.len();
        for (ns, name) in names.iter().enumerate() {
            if !name.is_empty() {
                self.class_index[ns].insert(name.clone(), id);
            }
        }
        self.classes.push(ClassMapping {
            names,
            fields: Vec::new(),
            methods: Vec::new(),
        });
        Ok(ClassId(id))
    }

    pub fn add_field<S: AsRef<str>>(
        &mut self,
        class: ClassId,
        names: &[S],
    ) -> Result<(), MappingError> {
        let names = self.check_names(names)?;
        self.class_mut(class)?.fields.push(FieldMapping { names });
        Ok(())
    }

    /// Add a method; `descriptor` is in the first namespace.
    pub fn add_method<S: AsRef<str>>(
        &mut self,
        class: ClassId,
        descriptor: &str,
        names: &[S],
    ) -> Result<(), MappingError> {
        let names = self.check_names(names)?;
        self.class_mut(class)?.methods.push(MethodMapping {
            descriptor: descriptor.to_owned(),
            names,
        });
        Ok(())
    }

    fn find_class(&self, name: &str, ns: usize) -> Option<&ClassMapping> {
        let index = self.class_index.get(ns)?.get(name)?;
        Some(&self.classes[*index])
    }

    /// Translate a first-namespace descriptor into namespace `ns`.
    fn descriptor_in(&self, descriptor: &str, ns: usize) -> String {
        if ns == 0 {
            return descriptor.to_owned();
        }
        remap_descriptor(descriptor, |class| self.class_name(class, 0, ns))
    }
}

fn non_empty(name: &str) -> Option<&str> {
    (!name.is_empty()).then_some(name)
}

impl SymbolTable for MemoryMappingTree {
    fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    fn class_name(&self, name: &str, from: usize, to: usize) -> Option<&str> {
        self.find_class(name, from)
            .and_then(|c| c.names.get(to))
            .and_then(|n| non_empty(n))
    }

    fn field_name(&self, owner: &str, name: &str, from: usize, to: usize) -> Option<&str> {
        self.find_class(owner, from)?
            .fields
            .iter()
            .find(|f| f.names.get(from).is_some_and(|n| n == name))
            .and_then(|f| f.names.get(to))
            .and_then(|n| non_empty(n))
    }

    fn method_name(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
        from: usize,
        to: usize,
    ) -> Option<&str> {
        self.find_class(owner, from)?
            .methods
            .iter()
            .find(|m| {
                m.names.get(from).is_some_and(|n| n == name)
                    && self.descriptor_in(&m.descriptor, from) == descriptor
            })
            .and_then(|m| m.names.get(to))
            .and_then(|n| non_empty(n))
    }
}
