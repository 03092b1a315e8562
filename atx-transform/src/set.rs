//! Access transform sets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::access::AccessTransform;

/// A method name and descriptor, e.g. `foo` + `(I)V`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodSignature {
    pub name: String,
    pub descriptor: String,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Split `name(args)ret` at the first `(`.
    pub fn parse(s: &str) -> Option<Self> {
        let paren = s.find('(')?;
        let (name, descriptor) = s.split_at(paren);
        Some(Self::new(name, descriptor))
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

impl Serialize for MethodSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MethodSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("missing descriptor in {s:?}")))
    }
}

/// The transforms recorded for one class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassTransforms {
    #[serde(default, skip_serializing_if = "is_empty_transform")]
    class: AccessTransform,
    #[serde(default, skip_serializing_if = "is_empty_transform")]
    all_fields: AccessTransform,
    #[serde(default, skip_serializing_if = "is_empty_transform")]
    all_methods: AccessTransform,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, AccessTransform>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    methods: BTreeMap<MethodSignature, AccessTransform>,
}

fn is_empty_transform(t: &AccessTransform) -> bool {
    t.is_empty()
}

impl ClassTransforms {
    /// The class-level transform.
    pub fn get(&self) -> AccessTransform {
        self.class
    }

    pub fn merge(&mut self, transform: AccessTransform) {
        self.class = self.class.merge(transform);
    }

    pub fn all_fields(&self) -> AccessTransform {
        self.all_fields
    }

    pub fn merge_all_fields(&mut self, transform: AccessTransform) {
        self.all_fields = self.all_fields.merge(transform);
    }

    pub fn all_methods(&self) -> AccessTransform {
        self.all_methods
    }

    pub fn merge_all_methods(&mut self, transform: AccessTransform) {
        self.all_methods = self.all_methods.merge(transform);
    }

    /// The transform recorded for exactly this field, ignoring the wildcard.
    pub fn field(&self, name: &str) -> AccessTransform {
        self.fields.get(name).copied().unwrap_or_default()
    }

    pub fn merge_field(&mut self, name: impl Into<String>, transform: AccessTransform) {
        let entry = self.fields.entry(name.into()).or_default();
        *entry = entry.merge(transform);
    }

    /// The transform recorded for exactly this method, ignoring the wildcard.
    pub fn method(&self, signature: &MethodSignature) -> AccessTransform {
        self.methods.get(signature).copied().unwrap_or_default()
    }

    pub fn merge_method(&mut self, signature: MethodSignature, transform: AccessTransform) {
        let entry = self.methods.entry(signature).or_default();
        *entry = entry.merge(transform);
    }

    /// Wildcard merged with the field's own transform.
    pub fn effective_field(&self, name: &str) -> AccessTransform {
        self.all_fields.merge(self.field(name))
    }

    /// Wildcard merged with the method's own transform.
    pub fn effective_method(&self, signature: &MethodSignature) -> AccessTransform {
        self.all_methods.merge(self.method(signature))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, AccessTransform)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn methods(&self) -> impl Iterator<Item = (&MethodSignature, AccessTransform)> {
        self.methods.iter().map(|(k, v)| (k, *v))
    }

    /// Merge every transform of `other` into this entry.
    pub fn merge_from(&mut self, other: &ClassTransforms) {
        self.merge(other.class);
        self.merge_all_fields(other.all_fields);
        self.merge_all_methods(other.all_methods);
        for (name, t) in other.fields() {
            self.merge_field(name, t);
        }
        for (signature, t) in other.methods() {
            self.merge_method(signature.clone(), t);
        }
    }

    /// Whether every transform in this entry is empty.
    pub fn is_empty(&self) -> bool {
        self.class.is_empty()
            && self.all_fields.is_empty()
            && self.all_methods.is_empty()
            && self.fields.values().all(|t| t.is_empty())
            && self.methods.values().all(|t| t.is_empty())
    }
}

fn non_empty<K>(map: &BTreeMap<K, AccessTransform>) -> impl Iterator<Item = (&K, &AccessTransform)> {
    map.iter().filter(|(_, t)| !t.is_empty())
}

impl PartialEq for ClassTransforms {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
            && self.all_fields == other.all_fields
            && self.all_methods == other.all_methods
            && non_empty(&self.fields).eq(non_empty(&other.fields))
            && non_empty(&self.methods).eq(non_empty(&other.methods))
    }
}

impl Eq for ClassTransforms {}

/// Access transforms keyed by class name, in one namespace.
///
/// Equality is semantic: missing entries and entries holding only empty
/// transforms compare equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessTransformSet {
    classes: BTreeMap<String, ClassTransforms>,
}

impl AccessTransformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `name`, created empty if missing.
    pub fn get_or_create_class(&mut self, name: &str) -> &mut ClassTransforms {
        self.classes.entry(name.to_owned()).or_default()
    }

    pub fn get_class(&self, name: &str) -> Option<&ClassTransforms> {
        self.classes.get(name)
    }

    /// Classes in name order.
    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassTransforms)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge every entry of `other` into this set.
    pub fn merge_set(&mut self, other: &AccessTransformSet) {
        for (name, class) in other.classes() {
            self.get_or_create_class(name).merge_from(class);
        }
    }

    /// Number of class entries, including empty ones.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl PartialEq for AccessTransformSet {
    fn eq(&self, other: &Self) -> bool {
        visible(&self.classes).eq(visible(&other.classes))
    }
}

impl Eq for AccessTransformSet {}

fn visible(
    classes: &BTreeMap<String, ClassTransforms>,
) -> impl Iterator<Item = (&String, &ClassTransforms)> {
    classes.iter().filter(|(_, c)| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessChange, ModifierChange};

    const PUBLIC: AccessTransform = AccessTransform::of(AccessChange::Public);
    const PROTECTED: AccessTransform = AccessTransform::of(AccessChange::Protected);
    const REMOVE_FINAL: AccessTransform =
        AccessTransform::new(AccessChange::None, ModifierChange::Remove);

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn sets_are_shareable_between_threads() {
        assert_send_sync::<AccessTransformSet>();
        assert_send_sync::<ClassTransforms>();
        assert_send_sync::<MethodSignature>();
    }

    #[test]
    fn lazy_class_creation() {
        let mut set = AccessTransformSet::new();
        assert!(set.get_class("a/B").is_none());
        set.get_or_create_class("a/B").merge(PUBLIC);
        set.get_or_create_class("a/B").merge(PROTECTED);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get_class("a/B").unwrap().get(), PUBLIC);
    }

    #[test]
    fn effective_member_transforms() {
        let mut class = ClassTransforms::default();
        class.merge_all_fields(PROTECTED);
        class.merge_field("x", REMOVE_FINAL);
        class.merge_all_methods(REMOVE_FINAL);
        let foo = MethodSignature::new("foo", "()V");
        class.merge_method(foo.clone(), PUBLIC);

        assert_eq!(
            class.effective_field("x"),
            AccessTransform::new(AccessChange::Protected, ModifierChange::Remove)
        );
        assert_eq!(class.effective_field("y"), PROTECTED);
        assert_eq!(class.field("y"), AccessTransform::EMPTY);
        assert_eq!(
            class.effective_method(&foo),
            AccessTransform::new(AccessChange::Public, ModifierChange::Remove)
        );
        assert_eq!(
            class.effective_method(&MethodSignature::new("foo", "(I)V")),
            REMOVE_FINAL
        );
    }

    #[test]
    fn empty_entries_are_invisible_to_equality() {
        let mut a = AccessTransformSet::new();
        a.get_or_create_class("a/B").merge(PUBLIC);

        let mut b = a.clone();
        b.get_or_create_class("c/D");
        b.get_or_create_class("a/B")
            .merge_field("f", AccessTransform::EMPTY);
        assert_eq!(a, b);

        b.get_or_create_class("c/D").merge_all_methods(PUBLIC);
        assert_ne!(a, b);
    }

    #[test]
    fn merge_set_combines_entries() {
        let mut a = AccessTransformSet::new();
        a.get_or_create_class("a/B").merge_field("f", PROTECTED);
        let mut b = AccessTransformSet::new();
        b.get_or_create_class("a/B").merge_field("f", REMOVE_FINAL);
        b.get_or_create_class("c/D").merge(PUBLIC);

        a.merge_set(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(
            a.get_class("a/B").unwrap().field("f"),
            AccessTransform::new(AccessChange::Protected, ModifierChange::Remove)
        );
        assert_eq!(a.get_class("c/D").unwrap().get(), PUBLIC);
    }

    #[test]
    fn method_signature_parse() {
        let sig = MethodSignature::parse("foo(ILjava/lang/String;)V").unwrap();
        assert_eq!(sig.name, "foo");
        assert_eq!(sig.descriptor, "(ILjava/lang/String;)V");
        assert_eq!(sig.to_string(), "foo(ILjava/lang/String;)V");
        assert!(MethodSignature::parse("foo").is_none());
    }
}
