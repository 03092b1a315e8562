//! Applying access transforms to class files.

use atx_classfile::{
    BootstrapArg, ClassHeader, ClassReader, ClassVisitor, ClassWriter, FieldDecl, HandleKind,
    InnerClass, InvokeDynamicInsn, InvokeKind, MethodDecl, MethodInsn,
};

use crate::access::{AccessChange, AccessTransform};
use crate::set::{AccessTransformSet, ClassTransforms, MethodSignature};

const CONSTRUCTOR: &str = "<init>";

/// Class visitor adapter that applies an [`AccessTransformSet`] to the events
/// it forwards.
///
/// Besides access flags it rewrites self-invocations that become invalid once
/// their target is no longer private: `invokespecial` on a widened method of
/// the visited class turns into `invokevirtual`, and `REF_invokeSpecial`
/// handles among bootstrap arguments into `REF_invokeVirtual`.
pub struct AccessTransformer<'s, V> {
    set: &'s AccessTransformSet,
    next: V,
    class_name: String,
    class: Option<&'s ClassTransforms>,
    rewritten_calls: usize,
}

impl<'s, V: ClassVisitor> AccessTransformer<'s, V> {
    pub fn new(set: &'s AccessTransformSet, next: V) -> Self {
        Self {
            set,
            next,
            class_name: String::new(),
            class: None,
            rewritten_calls: 0,
        }
    }

    pub fn into_inner(self) -> V {
        self.next
    }

    /// A transform of the visited class; empty if the set has no entry for it.
    fn transform(
        &self,
        lookup: impl FnOnce(&ClassTransforms) -> AccessTransform,
    ) -> AccessTransform {
        self.class.map(lookup).unwrap_or_default()
    }

    /// Whether a non-virtual call to `owner.name descriptor` must become virtual.
    ///
    /// Interface methods stay non-virtual: `invokevirtual` and
    /// `REF_invokeVirtual` cannot reference an `InterfaceMethodref`, while
    /// `invokespecial` on a method of the current interface remains valid
    /// whatever its access.
    fn devirtualize(&self, owner: &str, name: &str, descriptor: &str, is_interface: bool) -> bool {
        if owner != self.class_name || name == CONSTRUCTOR {
            return false;
        }
        let signature = MethodSignature::new(name, descriptor);
        if self.transform(|c| c.effective_method(&signature)).access() == AccessChange::None {
            return false;
        }
        if is_interface {
            log::debug!(
                "{}: keeping non-virtual call to interface method {name}{descriptor}",
                self.class_name
            );
            return false;
        }
        true
    }
}

impl<V: ClassVisitor> ClassVisitor for AccessTransformer<'_, V> {
    fn visit_header(&mut self, mut header: ClassHeader) {
        self.class = self.set.get_class(&header.name);
        self.class_name.clone_from(&header.name);
        header.access = self.transform(|c| c.get()).apply(header.access);
        self.next.visit_header(header);
    }

    fn visit_inner_class(&mut self, mut inner: InnerClass) {
        let t = self
            .set
            .get_class(&inner.name)
            .map(|c| c.get())
            .unwrap_or_default();
        inner.access = t.apply(inner.access);
        self.next.visit_inner_class(inner);
    }

    fn visit_field(&mut self, mut field: FieldDecl) {
        let t = self.transform(|c| c.effective_field(&field.name));
        field.access = t.apply(field.access);
        self.next.visit_field(field);
    }

    fn visit_method(&mut self, mut method: MethodDecl) {
        let signature = MethodSignature::new(method.name.as_str(), method.descriptor.as_str());
        let t = self.transform(|c| c.effective_method(&signature));
        method.access = t.apply(method.access);
        self.next.visit_method(method);
    }

    fn visit_method_insn(&mut self, mut insn: MethodInsn) {
        if insn.kind == InvokeKind::Special
            && self.devirtualize(&insn.owner, &insn.name, &insn.descriptor, insn.is_interface)
        {
            log::debug!(
                "{}: invokespecial {}{} -> invokevirtual",
                self.class_name,
                insn.name,
                insn.descriptor
            );
            insn.kind = InvokeKind::Virtual;
            self.rewritten_calls += 1;
        }
        self.next.visit_method_insn(insn);
    }

    fn visit_invoke_dynamic(&mut self, mut insn: InvokeDynamicInsn) {
        for arg in &mut insn.arguments {
            let BootstrapArg::Handle(handle) = arg else {
                continue;
            };
            if handle.kind == HandleKind::InvokeSpecial
                && self.devirtualize(
                    &handle.owner,
                    &handle.name,
                    &handle.descriptor,
                    handle.is_interface,
                )
            {
                log::debug!(
                    "{}: REF_invokeSpecial {}{} -> REF_invokeVirtual",
                    self.class_name,
                    handle.name,
                    handle.descriptor
                );
                handle.kind = HandleKind::InvokeVirtual;
                self.rewritten_calls += 1;
            }
        }
        self.next.visit_invoke_dynamic(insn);
    }

    fn visit_end(&mut self) {
        if self.rewritten_calls > 0 {
            log::debug!(
                "{}: rewrote {} call sites",
                self.class_name,
                self.rewritten_calls
            );
        }
        self.next.visit_end();
    }
}

/// Apply `set` to one class file.
///
/// Returns the input bytes unchanged when nothing in `set` concerns the class.
pub fn transform_class(
    data: &[u8],
    set: &AccessTransformSet,
) -> atx_classfile::Result<Vec<u8>> {
    let reader = ClassReader::new(data)?;
    let mut writer = ClassWriter::new(&reader);
    reader.accept(&mut AccessTransformer::new(set, &mut writer));
    writer.finish()
}
