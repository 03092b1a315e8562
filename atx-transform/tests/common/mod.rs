use atx_classfile::fixtures;
use atx_classfile::{AccessFlags, ClassEvent, InvokeKind};

pub fn foo_class() -> Vec<u8> {
    fixtures::sample_class().unwrap()
}

pub fn events(data: &[u8]) -> Vec<ClassEvent> {
    fixtures::events(data).unwrap()
}

pub fn method_access(events: &[ClassEvent], name: &str) -> AccessFlags {
    events
        .iter()
        .find_map(|e| match e {
            ClassEvent::Method(m) if m.name == name => Some(m.access),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no method {name}"))
}

pub fn invocations(events: &[ClassEvent]) -> Vec<(String, InvokeKind)> {
    events
        .iter()
        .filter_map(|e| match e {
            ClassEvent::MethodInsn(i) => Some((format!("{}.{}", i.owner, i.name), i.kind)),
            _ => None,
        })
        .collect()
}
