//! Class-file assembler.
//!
//! Builds small, structurally valid class files from scratch. Method bodies
//! are raw bytecode; `max_stack`/`max_locals` are taken as given and no
//! `StackMapTable` is produced, so the output targets readers and tools, not
//! the verifier.

use crate::access::AccessFlags;
use crate::constant_pool::{Constant, ConstantPool};
use crate::error::{Error, Result};
use crate::opcode;
use crate::reader::{ATTR_BOOTSTRAP_METHODS, ATTR_CODE, ATTR_INNER_CLASSES, MAGIC};
use crate::visitor::{ClassVersion, HandleKind};

/// Handle for a `BootstrapMethods` entry being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BootstrapHandle(pub(crate) u16);

/// A method body.
#[derive(Debug, Clone, Default)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytes: Vec<u8>,
}

impl Code {
    pub fn new(max_stack: u16, max_locals: u16) -> Self {
        Self {
            max_stack,
            max_locals,
            bytes: Vec::new(),
        }
    }

    /// Append a single-byte instruction.
    pub fn op(mut self, op: u8) -> Self {
        self.bytes.push(op);
        self
    }

    /// Append `invokevirtual`/`invokespecial`/`invokestatic` with a constant index.
    pub fn invoke(mut self, op: u8, method_ref: u16) -> Self {
        self.bytes.push(op);
        self.bytes.extend_from_slice(&method_ref.to_be_bytes());
        self
    }

    /// Append `invokeinterface` with its argument count.
    pub fn invoke_interface(mut self, method_ref: u16, arg_slots: u8) -> Self {
        self.bytes.push(opcode::INVOKEINTERFACE);
        self.bytes.extend_from_slice(&method_ref.to_be_bytes());
        self.bytes.extend_from_slice(&[arg_slots, 0]);
        self
    }

    /// Append `invokedynamic` for a `CONSTANT_InvokeDynamic` index.
    pub fn invoke_dynamic(mut self, call_site: u16) -> Self {
        self.bytes.push(opcode::INVOKEDYNAMIC);
        self.bytes.extend_from_slice(&call_site.to_be_bytes());
        self.bytes.extend_from_slice(&[0, 0]);
        self
    }

    /// Append raw instruction bytes.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }
}

struct MemberDef {
    access: AccessFlags,
    name_index: u16,
    descriptor_index: u16,
    code: Option<Code>,
}

struct InnerClassDef {
    inner_class_info_index: u16,
    outer_class_info_index: u16,
    inner_name_index: u16,
    access: AccessFlags,
}

/// Class-file builder.
pub struct ClassBuilder {
    version: ClassVersion,
    access: AccessFlags,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    pool: ConstantPool,
    fields: Vec<MemberDef>,
    methods: Vec<MemberDef>,
    inner_classes: Vec<InnerClassDef>,
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
}

impl ClassBuilder {
    /// Start a class. `super_name` of `None` is only valid for `java/lang/Object`.
    pub fn new(access: AccessFlags, name: &str, super_name: Option<&str>) -> Result<Self> {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(name)?;
        let super_class = match super_name {
            Some(s) => pool.intern_class(s)?,
            None => 0,
        };
        Ok(Self {
            version: ClassVersion::JAVA_17,
            access,
            this_class,
            super_class,
            interfaces: Vec::new(),
            pool,
            fields: Vec::new(),
            methods: Vec::new(),
            inner_classes: Vec::new(),
            bootstrap_methods: Vec::new(),
        })
    }

    pub fn set_version(&mut self, version: ClassVersion) {
        self.version = version;
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn add_interface(&mut self, name: &str) -> Result<()> {
        let index = self.pool.intern_class(name)?;
        self.interfaces.push(index);
        Ok(())
    }

    pub fn add_field(&mut self, access: AccessFlags, name: &str, descriptor: &str) -> Result<()> {
        let name_index = self.pool.intern_utf8(name)?;
        let descriptor_index = self.pool.intern_utf8(descriptor)?;
        self.fields.push(MemberDef {
            access,
            name_index,
            descriptor_index,
            code: None,
        });
        Ok(())
    }

    /// Add a method; `code` is `None` for abstract and native methods.
    pub fn add_method(
        &mut self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        code: Option<Code>,
    ) -> Result<()> {
        let name_index = self.pool.intern_utf8(name)?;
        let descriptor_index = self.pool.intern_utf8(descriptor)?;
        self.methods.push(MemberDef {
            access,
            name_index,
            descriptor_index,
            code,
        });
        Ok(())
    }

    pub fn add_inner_class(
        &mut self,
        name: &str,
        outer_name: Option<&str>,
        inner_name: Option<&str>,
        access: AccessFlags,
    ) -> Result<()> {
        let inner_class_info_index = self.pool.intern_class(name)?;
        let outer_class_info_index = match outer_name {
            Some(o) => self.pool.intern_class(o)?,
            None => 0,
        };
        let inner_name_index = match inner_name {
            Some(n) => self.pool.intern_utf8(n)?,
            None => 0,
        };
        self.inner_classes.push(InnerClassDef {
            inner_class_info_index,
            outer_class_info_index,
            inner_name_index,
            access,
        });
        Ok(())
    }

    pub fn class_ref(&mut self, name: &str) -> Result<u16> {
        self.pool.intern_class(name)
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.pool.intern_class(owner)?;
        let name_and_type_index = self.pool.intern_name_and_type(name, descriptor)?;
        self.pool.intern(Constant::FieldRef {
            class_index,
            name_and_type_index,
        })
    }

    pub fn method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<u16> {
        let class_index = self.pool.intern_class(owner)?;
        let name_and_type_index = self.pool.intern_name_and_type(name, descriptor)?;
        self.pool.intern(if is_interface {
            Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            }
        } else {
            Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
        })
    }

    pub fn method_handle(
        &mut self,
        kind: HandleKind,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<u16> {
        let reference_index = match kind {
            HandleKind::GetField
            | HandleKind::GetStatic
            | HandleKind::PutField
            | HandleKind::PutStatic => self.field_ref(owner, name, descriptor)?,
            _ => self.method_ref(owner, name, descriptor, is_interface)?,
        };
        self.pool.intern(Constant::MethodHandle {
            kind: kind.into(),
            reference_index,
        })
    }

    pub fn method_type(&mut self, descriptor: &str) -> Result<u16> {
        let descriptor_index = self.pool.intern_utf8(descriptor)?;
        self.pool.intern(Constant::MethodType { descriptor_index })
    }

    pub fn string(&mut self, value: &str) -> Result<u16> {
        let string_index = self.pool.intern_utf8(value)?;
        self.pool.intern(Constant::String { string_index })
    }

    /// Add a `BootstrapMethods` entry. `handle` and `args` are constant indices.
    pub fn add_bootstrap_method(&mut self, handle: u16, args: &[u16]) -> Result<BootstrapHandle> {
        let index = u16::try_from(self.bootstrap_methods.len())
            .map_err(|_| Error::InvalidBootstrapIndex(u16::MAX))?;
        self.bootstrap_methods.push((handle, args.to_vec()));
        Ok(BootstrapHandle(index))
    }

    /// A `CONSTANT_InvokeDynamic` call site for `invokedynamic`.
    pub fn invoke_dynamic(
        &mut self,
        bootstrap: BootstrapHandle,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let name_and_type_index = self.pool.intern_name_and_type(name, descriptor)?;
        self.pool.intern(Constant::InvokeDynamic {
            bootstrap_method_attr_index: bootstrap.0,
            name_and_type_index,
        })
    }

    /// Serialize the class file.
    pub fn build(mut self) -> Result<Vec<u8>> {
        let code_name = if self.methods.iter().any(|m| m.code.is_some()) {
            self.pool.intern_utf8(ATTR_CODE)?
        } else {
            0
        };
        let inner_classes_name = if self.inner_classes.is_empty() {
            0
        } else {
            self.pool.intern_utf8(ATTR_INNER_CLASSES)?
        };
        let bootstrap_name = if self.bootstrap_methods.is_empty() {
            0
        } else {
            self.pool.intern_utf8(ATTR_BOOTSTRAP_METHODS)?
        };

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&self.version.minor.to_be_bytes());
        out.extend_from_slice(&self.version.major.to_be_bytes());
        out.extend_from_slice(&(self.pool.count() as u16).to_be_bytes());
        self.pool.write_entries(1, &mut out)?;

        put_u16(&mut out, self.access.bits());
        put_u16(&mut out, self.this_class);
        put_u16(&mut out, self.super_class);
        put_len(&mut out, self.interfaces.len())?;
        for &i in &self.interfaces {
            put_u16(&mut out, i);
        }

        put_len(&mut out, self.fields.len())?;
        for f in &self.fields {
            put_u16(&mut out, f.access.bits());
            put_u16(&mut out, f.name_index);
            put_u16(&mut out, f.descriptor_index);
            put_u16(&mut out, 0);
        }

        put_len(&mut out, self.methods.len())?;
        for m in &self.methods {
            put_u16(&mut out, m.access.bits());
            put_u16(&mut out, m.name_index);
            put_u16(&mut out, m.descriptor_index);
            match &m.code {
                None => put_u16(&mut out, 0),
                Some(code) => {
                    put_u16(&mut out, 1);
                    put_u16(&mut out, code_name);
                    // max_stack, max_locals, code_length, code,
                    // exception_table_length, attributes_count
                    let len = 2 + 2 + 4 + code.bytes.len() + 2 + 2;
                    put_u32(&mut out, len)?;
                    put_u16(&mut out, code.max_stack);
                    put_u16(&mut out, code.max_locals);
                    put_u32(&mut out, code.bytes.len())?;
                    out.extend_from_slice(&code.bytes);
                    put_u16(&mut out, 0);
                    put_u16(&mut out, 0);
                }
            }
        }

        let attribute_count =
            usize::from(inner_classes_name != 0) + usize::from(bootstrap_name != 0);
        put_len(&mut out, attribute_count)?;
        if inner_classes_name != 0 {
            put_u16(&mut out, inner_classes_name);
            put_u32(&mut out, 2 + self.inner_classes.len() * 8)?;
            put_len(&mut out, self.inner_classes.len())?;
            for ic in &self.inner_classes {
                put_u16(&mut out, ic.inner_class_info_index);
                put_u16(&mut out, ic.outer_class_info_index);
                put_u16(&mut out, ic.inner_name_index);
                put_u16(&mut out, ic.access.bits());
            }
        }
        if bootstrap_name != 0 {
            put_u16(&mut out, bootstrap_name);
            let len: usize = 2 + self
                .bootstrap_methods
                .iter()
                .map(|(_, args)| 4 + args.len() * 2)
                .sum::<usize>();
            put_u32(&mut out, len)?;
            put_len(&mut out, self.bootstrap_methods.len())?;
            for (handle, args) in &self.bootstrap_methods {
                put_u16(&mut out, *handle);
                put_len(&mut out, args.len())?;
                for &a in args {
                    put_u16(&mut out, a);
                }
            }
        }

        Ok(out)
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let v = u16::try_from(len)
        .map_err(|_| Error::UnsupportedEdit(format!("table of {len} entries")))?;
    put_u16(out, v);
    Ok(())
}

fn put_u32(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let v = u32::try_from(len)
        .map_err(|_| Error::UnsupportedEdit(format!("attribute of {len} bytes")))?;
    out.extend_from_slice(&v.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ClassReader;

    #[test]
    fn minimal_class_parses() {
        let b = ClassBuilder::new(
            AccessFlags::PUBLIC | AccessFlags::SUPER,
            "net/example/Foo",
            Some("java/lang/Object"),
        )
        .unwrap();
        let bytes = b.build().unwrap();
        assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xba, 0xbe]);

        let reader = ClassReader::new(&bytes).unwrap();
        assert_eq!(reader.class_name(), "net/example/Foo");
        assert_eq!(reader.version(), ClassVersion::JAVA_17);
    }

    #[test]
    fn pool_count_covers_attribute_names() {
        let mut b = ClassBuilder::new(AccessFlags::PUBLIC, "A", Some("java/lang/Object")).unwrap();
        b.add_method(
            AccessFlags::PUBLIC,
            "run",
            "()V",
            Some(Code::new(0, 1).op(opcode::RETURN)),
        )
        .unwrap();
        let before = b.constant_pool().count();
        let bytes = b.build().unwrap();
        let reader = ClassReader::new(&bytes).unwrap();
        // "Code" is interned during build
        assert_eq!(reader.constant_pool().count(), before + 1);
    }
}
