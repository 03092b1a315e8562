//! Patching class writer.
//!
//! [`ClassWriter`] is the terminal visitor of a chain fed by a
//! [`ClassReader`]. It pairs each event with the reader's layout (events must
//! arrive in the order the reader emitted them, exactly once each) and
//! rewrites the original bytes in place. Supported edits are access flags,
//! switching between the same-width `invokevirtual`, `invokespecial` and
//! `invokestatic` opcodes, and changing the reference kind of bootstrap method
//! handles. Anything else is rejected with [`Error::UnsupportedEdit`].

use std::collections::BTreeMap;

use crate::access::AccessFlags;
use crate::constant_pool::{Constant, ConstantPool};
use crate::error::{Error, Result};
use crate::reader::{ClassReader, InsnLayout};
use crate::visitor::{
    BootstrapArg, ClassHeader, ClassVisitor, FieldDecl, Handle, HandleKind, InnerClass,
    InvokeDynamicInsn, InvokeKind, MethodDecl, MethodInsn,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Patch {
    U8(u8),
    U16(u16),
}

/// Writes the class a [`ClassReader`] parsed, with the edits carried by the
/// events it receives.
pub struct ClassWriter<'r, 'a> {
    reader: &'r ClassReader<'a>,
    pool: ConstantPool,
    patches: BTreeMap<usize, Patch>,
    header_seen: bool,
    next_inner: usize,
    next_field: usize,
    next_method: usize,
    next_insn: usize,
    error: Option<Error>,
}

impl<'r, 'a> ClassWriter<'r, 'a> {
    pub fn new(reader: &'r ClassReader<'a>) -> Self {
        Self {
            reader,
            pool: reader.constant_pool().clone(),
            patches: BTreeMap::new(),
            header_seen: false,
            next_inner: 0,
            next_field: 0,
            next_method: 0,
            next_insn: 0,
            error: None,
        }
    }

    /// Whether any received event differs from what the reader emitted.
    pub fn is_modified(&self) -> bool {
        !self.patches.is_empty()
    }

    /// Produce the class-file bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let r = self.reader;
        if !self.header_seen {
            return Err(Error::EventMismatch("class header was never visited".into()));
        }
        check_count("inner class", self.next_inner, r.inner_classes.len())?;
        check_count("field", self.next_field, r.fields.len())?;
        check_count("method", self.next_method, r.methods.len())?;
        if let Some(last) = self.next_method.checked_sub(1) {
            check_count("instruction", self.next_insn, r.methods[last].insns.len())?;
        }

        let data = r.data();
        let pool_end = r.pool_end();
        let original_count = r.constant_pool().count();
        let mut out = Vec::with_capacity(data.len() + 16);
        if self.pool.count() == original_count {
            out.extend_from_slice(data);
        } else {
            let count = u16::try_from(self.pool.count())
                .map_err(|_| Error::ConstantPoolOverflow(self.pool.count()))?;
            out.extend_from_slice(&data[..8]);
            out.extend_from_slice(&count.to_be_bytes());
            out.extend_from_slice(&data[10..pool_end]);
            self.pool.write_entries(original_count, &mut out)?;
            out.extend_from_slice(&data[pool_end..]);
        }
        let shift = out.len() - data.len();

        for (&pos, &patch) in &self.patches {
            let at = if pos >= pool_end { pos + shift } else { pos };
            match patch {
                Patch::U8(b) => out[at] = b,
                Patch::U16(v) => out[at..at + 2].copy_from_slice(&v.to_be_bytes()),
            }
        }

        log::trace!(
            "wrote class {}: {} patches, {} new constants",
            r.class_name(),
            self.patches.len(),
            self.pool.count() - original_count
        );
        Ok(out)
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn patch(&mut self, pos: usize, patch: Patch) -> Result<()> {
        match self.patches.insert(pos, patch) {
            Some(previous) if previous != patch => Err(Error::UnsupportedEdit(format!(
                "conflicting rewrites at offset {pos:#x}"
            ))),
            _ => Ok(()),
        }
    }

    fn patch_access(&mut self, pos: usize, from: AccessFlags, to: AccessFlags) -> Result<()> {
        if from == to {
            return Ok(());
        }
        self.patch(pos, Patch::U16(to.bits()))
    }

    fn header(&mut self, header: ClassHeader) -> Result<()> {
        if self.header_seen {
            return Err(Error::EventMismatch("class header visited twice".into()));
        }
        self.header_seen = true;
        let reader = self.reader;
        let slot = &reader.header;
        let original = &slot.event;
        if header.version != original.version
            || header.name != original.name
            || header.super_name != original.super_name
            || header.interfaces != original.interfaces
        {
            return Err(Error::UnsupportedEdit(format!(
                "class header of {} changed beyond access flags",
                original.name
            )));
        }
        self.patch_access(slot.pos, original.access, header.access)
    }

    fn inner_class(&mut self, inner: InnerClass) -> Result<()> {
        let reader = self.reader;
        let slot = reader.inner_classes.get(self.next_inner).ok_or_else(|| {
            Error::EventMismatch(format!("unexpected inner class record {}", inner.name))
        })?;
        self.next_inner += 1;
        let original = &slot.event;
        if inner.name != original.name
            || inner.outer_name != original.outer_name
            || inner.inner_name != original.inner_name
        {
            return Err(Error::UnsupportedEdit(format!(
                "inner class record {} renamed",
                original.name
            )));
        }
        self.patch_access(slot.pos, original.access, inner.access)
    }

    fn field(&mut self, field: FieldDecl) -> Result<()> {
        let reader = self.reader;
        let slot = reader
            .fields
            .get(self.next_field)
            .ok_or_else(|| Error::EventMismatch(format!("unexpected field {}", field.name)))?;
        self.next_field += 1;
        let original = &slot.event;
        if field.name != original.name || field.descriptor != original.descriptor {
            return Err(Error::UnsupportedEdit(format!(
                "field {} renamed",
                original.name
            )));
        }
        self.patch_access(slot.pos, original.access, field.access)
    }

    fn method(&mut self, method: MethodDecl) -> Result<()> {
        let reader = self.reader;
        if let Some(last) = self.next_method.checked_sub(1) {
            check_count("instruction", self.next_insn, reader.methods[last].insns.len())?;
        }
        let layout = reader.methods.get(self.next_method).ok_or_else(|| {
            Error::EventMismatch(format!(
                "unexpected method {}{}",
                method.name, method.descriptor
            ))
        })?;
        self.next_method += 1;
        self.next_insn = 0;
        let slot = &layout.decl;
        let original = &slot.event;
        if method.name != original.name || method.descriptor != original.descriptor {
            return Err(Error::UnsupportedEdit(format!(
                "method {}{} renamed",
                original.name, original.descriptor
            )));
        }
        self.patch_access(slot.pos, original.access, method.access)
    }

    fn next_insn(&mut self) -> Result<&'r InsnLayout> {
        let reader = self.reader;
        let method = self
            .next_method
            .checked_sub(1)
            .map(|i| &reader.methods[i])
            .ok_or_else(|| Error::EventMismatch("instruction outside of a method".into()))?;
        let insn = method.insns.get(self.next_insn).ok_or_else(|| {
            Error::EventMismatch(format!(
                "unexpected instruction in {}{}",
                method.decl.event.name, method.decl.event.descriptor
            ))
        })?;
        self.next_insn += 1;
        Ok(insn)
    }

    fn method_insn(&mut self, insn: MethodInsn) -> Result<()> {
        let InsnLayout::Method(slot) = self.next_insn()? else {
            return Err(Error::EventMismatch(format!(
                "expected invokedynamic, got invocation of {}.{}",
                insn.owner, insn.name
            )));
        };
        let original = &slot.event;
        if insn.owner != original.owner
            || insn.name != original.name
            || insn.descriptor != original.descriptor
            || insn.is_interface != original.is_interface
        {
            return Err(Error::UnsupportedEdit(format!(
                "invocation target {}.{}{} changed",
                original.owner, original.name, original.descriptor
            )));
        }
        if insn.kind == original.kind {
            return Ok(());
        }
        if insn.is_interface && insn.kind == InvokeKind::Virtual {
            return Err(Error::UnsupportedEdit(format!(
                "invokevirtual on interface method {}.{}{}",
                original.owner, original.name, original.descriptor
            )));
        }
        if !same_width(original.kind) || !same_width(insn.kind) {
            return Err(Error::UnsupportedEdit(format!(
                "cannot rewrite {:?} to {:?} in place",
                original.kind, insn.kind
            )));
        }
        self.patch(slot.pos, Patch::U8(insn.kind.opcode()))
    }

    fn invoke_dynamic(&mut self, insn: InvokeDynamicInsn) -> Result<()> {
        let InsnLayout::Dynamic {
            event: original,
            bootstrap_index,
        } = self.next_insn()?
        else {
            return Err(Error::EventMismatch(format!(
                "expected method invocation, got invokedynamic {}",
                insn.name
            )));
        };
        if insn.name != original.name
            || insn.descriptor != original.descriptor
            || insn.arguments.len() != original.arguments.len()
        {
            return Err(Error::UnsupportedEdit(format!(
                "invokedynamic {}{} changed",
                original.name, original.descriptor
            )));
        }
        let reader = self.reader;
        let layout = &reader.bootstrap_methods[*bootstrap_index as usize];
        self.rewrite_handle(layout.handle, &original.bootstrap, &insn.bootstrap)?;
        for ((slot, before), after) in layout
            .args
            .iter()
            .zip(&original.arguments)
            .zip(&insn.arguments)
        {
            match (before, after) {
                (BootstrapArg::Handle(b), BootstrapArg::Handle(a)) => {
                    self.rewrite_handle(*slot, b, a)?
                }
                (b, a) if b == a => {}
                _ => {
                    return Err(Error::UnsupportedEdit(format!(
                        "bootstrap argument of {} changed",
                        original.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Point the `u16` at `pos` to a method handle of `after.kind`.
    fn rewrite_handle(
        &mut self,
        (pos, index): (usize, u16),
        before: &Handle,
        after: &Handle,
    ) -> Result<()> {
        if before == after {
            return Ok(());
        }
        if before.owner != after.owner
            || before.name != after.name
            || before.descriptor != after.descriptor
            || before.is_interface != after.is_interface
        {
            return Err(Error::UnsupportedEdit(format!(
                "method handle {}.{}{} retargeted",
                before.owner, before.name, before.descriptor
            )));
        }
        if after.is_interface && after.kind == HandleKind::InvokeVirtual {
            return Err(Error::UnsupportedEdit(format!(
                "REF_invokeVirtual on interface method {}.{}{}",
                after.owner, after.name, after.descriptor
            )));
        }
        let reference_index = match self.pool.get(index)? {
            Constant::MethodHandle {
                reference_index, ..
            } => *reference_index,
            _ => {
                return Err(Error::ConstantMismatch {
                    index,
                    expected: "MethodHandle",
                });
            }
        };
        let new_index = self.pool.intern(Constant::MethodHandle {
            kind: after.kind.into(),
            reference_index,
        })?;
        self.patch(pos, Patch::U16(new_index))
    }
}

fn same_width(kind: InvokeKind) -> bool {
    !matches!(kind, InvokeKind::Interface)
}

fn check_count(what: &str, seen: usize, expected: usize) -> Result<()> {
    if seen == expected {
        Ok(())
    } else {
        Err(Error::EventMismatch(format!(
            "visited {seen} {what} events, class has {expected}"
        )))
    }
}

impl ClassVisitor for ClassWriter<'_, '_> {
    fn visit_header(&mut self, header: ClassHeader) {
        if self.error.is_none() {
            if let Err(e) = self.header(header) {
                self.fail(e);
            }
        }
    }

    fn visit_inner_class(&mut self, inner: InnerClass) {
        if self.error.is_none() {
            if let Err(e) = self.inner_class(inner) {
                self.fail(e);
            }
        }
    }

    fn visit_field(&mut self, field: FieldDecl) {
        if self.error.is_none() {
            if let Err(e) = self.field(field) {
                self.fail(e);
            }
        }
    }

    fn visit_method(&mut self, method: MethodDecl) {
        if self.error.is_none() {
            if let Err(e) = self.method(method) {
                self.fail(e);
            }
        }
    }

    fn visit_method_insn(&mut self, insn: MethodInsn) {
        if self.error.is_none() {
            if let Err(e) = self.method_insn(insn) {
                self.fail(e);
            }
        }
    }

    fn visit_invoke_dynamic(&mut self, insn: InvokeDynamicInsn) {
        if self.error.is_none() {
            if let Err(e) = self.invoke_dynamic(insn) {
                self.fail(e);
            }
        }
    }
}
