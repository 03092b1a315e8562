//! Class-file reader.
//!
//! Parsing happens eagerly in [`ClassReader::new`]: every name an event needs
//! is resolved up front, so structural problems surface there and
//! [`ClassReader::accept`] cannot fail.

use crate::access::AccessFlags;
use crate::constant_pool::{Constant, ConstantPool};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::opcode::{self, instruction_length};
use crate::visitor::{
    BootstrapArg, ClassHeader, ClassVersion, ClassVisitor, FieldDecl, Handle, HandleKind,
    InnerClass, InvokeDynamicInsn, InvokeKind, MethodDecl, MethodInsn,
};

pub const MAGIC: u32 = 0xCAFE_BABE;

pub(crate) const ATTR_CODE: &str = "Code";
pub(crate) const ATTR_INNER_CLASSES: &str = "InnerClasses";
pub(crate) const ATTR_BOOTSTRAP_METHODS: &str = "BootstrapMethods";

/// An event together with the file offset of the bytes a writer may patch:
/// the access flags for declarations, the opcode for instructions.
#[derive(Debug, Clone)]
pub(crate) struct Slot<T> {
    pub(crate) event: T,
    pub(crate) pos: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum InsnLayout {
    Method(Slot<MethodInsn>),
    Dynamic {
        event: InvokeDynamicInsn,
        bootstrap_index: u16,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct MethodLayout {
    pub(crate) decl: Slot<MethodDecl>,
    pub(crate) insns: Vec<InsnLayout>,
}

/// One `BootstrapMethods` entry: constant indices and where they are stored.
#[derive(Debug, Clone)]
pub(crate) struct BootstrapLayout {
    pub(crate) handle: (usize, u16),
    pub(crate) args: Vec<(usize, u16)>,
}

/// Invocation instruction before its constants are resolved.
struct RawInsn {
    pos: usize,
    opcode: u8,
    index: u16,
}

/// A parsed class file borrowing its bytes.
pub struct ClassReader<'a> {
    data: &'a [u8],
    pool: ConstantPool,
    pool_end: usize,
    pub(crate) header: Slot<ClassHeader>,
    pub(crate) inner_classes: Vec<Slot<InnerClass>>,
    pub(crate) fields: Vec<Slot<FieldDecl>>,
    pub(crate) methods: Vec<MethodLayout>,
    pub(crate) bootstrap_methods: Vec<BootstrapLayout>,
}

impl<'a> ClassReader<'a> {
    /// Parse a class file.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut c = Cursor::new(data, 0);
        let magic = c.u32()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        let minor = c.u16()?;
        let major = c.u16()?;

        let (pool, pool_end) = ConstantPool::parse(data, c.pos())?;
        let mut c = Cursor::new(data, pool_end);

        let access_pos = c.pos();
        let access = AccessFlags::from_bits_retain(c.u16()?);
        let name = pool.class_name(c.u16()?)?.to_owned();
        let super_name = pool.optional_class_name(c.u16()?)?.map(str::to_owned);
        let interface_count = c.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(pool.class_name(c.u16()?)?.to_owned());
        }
        let header = Slot {
            event: ClassHeader {
                version: ClassVersion { major, minor },
                access,
                name,
                super_name,
                interfaces,
            },
            pos: access_pos,
        };

        let field_count = c.u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let pos = c.pos();
            let access = AccessFlags::from_bits_retain(c.u16()?);
            let name = pool.utf8(c.u16()?)?.to_owned();
            let descriptor = pool.utf8(c.u16()?)?.to_owned();
            let attribute_count = c.u16()?;
            for _ in 0..attribute_count {
                read_attribute(&mut c, &pool)?;
            }
            fields.push(Slot {
                event: FieldDecl {
                    access,
                    name,
                    descriptor,
                },
                pos,
            });
        }

        let method_count = c.u16()?;
        let mut declared = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let pos = c.pos();
            let access = AccessFlags::from_bits_retain(c.u16()?);
            let name = pool.utf8(c.u16()?)?.to_owned();
            let descriptor = pool.utf8(c.u16()?)?.to_owned();
            let attribute_count = c.u16()?;
            let mut raw = Vec::new();
            for _ in 0..attribute_count {
                let (attr_name, body_pos, body) = read_attribute(&mut c, &pool)?;
                if attr_name == ATTR_CODE {
                    scan_code(data, body_pos, body.len(), &mut raw)?;
                }
            }
            declared.push((
                Slot {
                    event: MethodDecl {
                        access,
                        name,
                        descriptor,
                    },
                    pos,
                },
                raw,
            ));
        }

        let mut inner_classes = Vec::new();
        let mut bootstrap_methods = Vec::new();
        let attribute_count = c.u16()?;
        for _ in 0..attribute_count {
            let (attr_name, body_pos, body) = read_attribute(&mut c, &pool)?;
            let mut a = Cursor::new(data, body_pos);
            match attr_name {
                ATTR_INNER_CLASSES => {
                    let count = a.u16()?;
                    for _ in 0..count {
                        let name = pool.class_name(a.u16()?)?.to_owned();
                        let outer_name = pool.optional_class_name(a.u16()?)?.map(str::to_owned);
                        let inner_name_index = a.u16()?;
                        let inner_name = if inner_name_index == 0 {
                            None
                        } else {
                            Some(pool.utf8(inner_name_index)?.to_owned())
                        };
                        let pos = a.pos();
                        let access = AccessFlags::from_bits_retain(a.u16()?);
                        inner_classes.push(Slot {
                            event: InnerClass {
                                name,
                                outer_name,
                                inner_name,
                                access,
                            },
                            pos,
                        });
                    }
                }
                ATTR_BOOTSTRAP_METHODS => {
                    let count = a.u16()?;
                    for _ in 0..count {
                        let handle = (a.pos(), a.u16()?);
                        let arg_count = a.u16()?;
                        let mut args = Vec::with_capacity(arg_count as usize);
                        for _ in 0..arg_count {
                            args.push((a.pos(), a.u16()?));
                        }
                        bootstrap_methods.push(BootstrapLayout { handle, args });
                    }
                }
                _ => {}
            }
            if a.pos() > body_pos + body.len() {
                return Err(Error::UnexpectedEof(body_pos + body.len()));
            }
        }

        let mut methods = Vec::with_capacity(declared.len());
        for (decl, raw) in declared {
            let mut insns = Vec::with_capacity(raw.len());
            for r in raw {
                insns.push(resolve_insn(&pool, &bootstrap_methods, r)?);
            }
            methods.push(MethodLayout { decl, insns });
        }

        log::trace!(
            "read class {}: {} fields, {} methods, {} constants",
            header.event.name,
            fields.len(),
            methods.len(),
            pool.count()
        );

        Ok(Self {
            data,
            pool,
            pool_end,
            header,
            inner_classes,
            fields,
            methods,
            bootstrap_methods,
        })
    }

    /// The raw class-file bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.pool
    }

    /// Offset of the first byte after the constant pool.
    pub(crate) fn pool_end(&self) -> usize {
        self.pool_end
    }

    /// Internal name of the class, e.g. `net/example/Foo`.
    pub fn class_name(&self) -> &str {
        &self.header.event.name
    }

    pub fn version(&self) -> ClassVersion {
        self.header.event.version
    }

    /// Emit the class structure to `visitor`.
    pub fn accept<V: ClassVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_header(self.header.event.clone());
        for inner in &self.inner_classes {
            visitor.visit_inner_class(inner.event.clone());
        }
        for field in &self.fields {
            visitor.visit_field(field.event.clone());
        }
        for method in &self.methods {
            visitor.visit_method(method.decl.event.clone());
            for insn in &method.insns {
                match insn {
                    InsnLayout::Method(slot) => visitor.visit_method_insn(slot.event.clone()),
                    InsnLayout::Dynamic { event, .. } => {
                        visitor.visit_invoke_dynamic(event.clone())
                    }
                }
            }
        }
        visitor.visit_end();
    }
}

impl std::fmt::Debug for ClassReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassReader")
            .field("name", &self.header.event.name)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Read one `attribute_info`, returning its name, body offset and body.
fn read_attribute<'a, 'p>(
    c: &mut Cursor<'a>,
    pool: &'p ConstantPool,
) -> Result<(&'p str, usize, &'a [u8])> {
    let name = pool.utf8(c.u16()?)?;
    let len = c.u32()? as usize;
    let body_pos = c.pos();
    let body = c.bytes(len)?;
    Ok((name, body_pos, body))
}

/// Collect the invocation instructions of a `Code` attribute body.
fn scan_code(data: &[u8], body_pos: usize, body_len: usize, out: &mut Vec<RawInsn>) -> Result<()> {
    let mut c = Cursor::new(data, body_pos);
    // max_stack, max_locals
    c.skip(4)?;
    let code_len = c.u32()? as usize;
    let code_start = c.pos();
    let code = c.bytes(code_len)?;
    if code_start + code_len > body_pos + body_len {
        return Err(Error::UnexpectedEof(body_pos + body_len));
    }

    let mut pc = 0;
    while pc < code.len() {
        let len = instruction_length(code, pc)?;
        let op = code[pc];
        if (opcode::INVOKEVIRTUAL..=opcode::INVOKEDYNAMIC).contains(&op) {
            out.push(RawInsn {
                pos: code_start + pc,
                opcode: op,
                index: u16::from_be_bytes([code[pc + 1], code[pc + 2]]),
            });
        }
        pc += len;
    }
    Ok(())
}

fn resolve_insn(
    pool: &ConstantPool,
    bootstrap_methods: &[BootstrapLayout],
    raw: RawInsn,
) -> Result<InsnLayout> {
    if raw.opcode == opcode::INVOKEDYNAMIC {
        let (bootstrap_index, nat_index) = match pool.get(raw.index)? {
            Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => (*bootstrap_method_attr_index, *name_and_type_index),
            _ => {
                return Err(Error::ConstantMismatch {
                    index: raw.index,
                    expected: "InvokeDynamic",
                });
            }
        };
        let layout = bootstrap_methods
            .get(bootstrap_index as usize)
            .ok_or(Error::InvalidBootstrapIndex(bootstrap_index))?;
        let (name, descriptor) = pool.name_and_type(nat_index)?;
        let bootstrap = resolve_handle(pool, layout.handle.1)?;
        let mut arguments = Vec::with_capacity(layout.args.len());
        for &(_, index) in &layout.args {
            arguments.push(resolve_bootstrap_arg(pool, index)?);
        }
        return Ok(InsnLayout::Dynamic {
            event: InvokeDynamicInsn {
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
                bootstrap,
                arguments,
            },
            bootstrap_index,
        });
    }

    if matches!(pool.get(raw.index)?, Constant::FieldRef { .. }) {
        return Err(Error::ConstantMismatch {
            index: raw.index,
            expected: "method reference",
        });
    }
    let member = pool.member_ref(raw.index)?;
    let kind = InvokeKind::from_opcode(raw.opcode).ok_or(Error::InvalidOpcode {
        opcode: raw.opcode,
        offset: raw.pos,
    })?;
    Ok(InsnLayout::Method(Slot {
        event: MethodInsn {
            kind,
            owner: member.owner.to_owned(),
            name: member.name.to_owned(),
            descriptor: member.descriptor.to_owned(),
            is_interface: member.is_interface,
        },
        pos: raw.pos,
    }))
}

pub(crate) fn resolve_handle(pool: &ConstantPool, index: u16) -> Result<Handle> {
    let (kind, reference_index) = match pool.get(index)? {
        Constant::MethodHandle {
            kind,
            reference_index,
        } => (*kind, *reference_index),
        _ => {
            return Err(Error::ConstantMismatch {
                index,
                expected: "MethodHandle",
            });
        }
    };
    let kind = HandleKind::from_u8(kind).ok_or(Error::ConstantMismatch {
        index,
        expected: "MethodHandle with a valid reference kind",
    })?;
    let member = pool.member_ref(reference_index)?;
    Ok(Handle {
        kind,
        owner: member.owner.to_owned(),
        name: member.name.to_owned(),
        descriptor: member.descriptor.to_owned(),
        is_interface: member.is_interface,
    })
}

fn resolve_bootstrap_arg(pool: &ConstantPool, index: u16) -> Result<BootstrapArg> {
    Ok(match pool.get(index)? {
        Constant::MethodHandle { .. } => BootstrapArg::Handle(resolve_handle(pool, index)?),
        Constant::MethodType { descriptor_index } => {
            BootstrapArg::MethodType(pool.utf8(*descriptor_index)?.to_owned())
        }
        _ => BootstrapArg::Constant(index),
    })
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{FOO, events, sample_class};
    use crate::*;

    fn sample_events() -> Vec<ClassEvent> {
        events(&sample_class().unwrap()).unwrap()
    }

    #[test]
    fn header_and_order() {
        let events = sample_events();
        let ClassEvent::Header(header) = &events[0] else {
            panic!("first event is {:?}", events[0]);
        };
        assert_eq!(header.name, FOO);
        assert_eq!(header.super_name.as_deref(), Some("java/lang/Object"));
        assert_eq!(header.interfaces, vec!["java/io/Serializable".to_string()]);
        assert_eq!(header.version, ClassVersion::JAVA_17);
        assert_eq!(events.last(), Some(&ClassEvent::End));

        // header, inner classes, fields, then methods
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                ClassEvent::Header(_) => "header",
                ClassEvent::InnerClass(_) => "inner",
                ClassEvent::Field(_) => "field",
                ClassEvent::Method(_) => "method",
                ClassEvent::MethodInsn(_) => "insn",
                ClassEvent::InvokeDynamic(_) => "indy",
                ClassEvent::End => "end",
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "header", "inner", "field", "field", "method", "insn", "method", "method", "insn",
                "insn", "method", "method", "indy", "end"
            ]
        );
    }

    #[test]
    fn member_declarations() {
        let events = sample_events();
        let fields: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ClassEvent::Field(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(fields[0].name, "count");
        assert_eq!(fields[0].descriptor, "I");
        assert_eq!(fields[0].access, AccessFlags::PRIVATE);
        assert_eq!(fields[1].access, AccessFlags::PRIVATE | AccessFlags::FINAL);

        let foo = events
            .iter()
            .find_map(|e| match e {
                ClassEvent::Method(m) if m.name == "foo" => Some(m),
                _ => None,
            })
            .unwrap();
        assert_eq!(foo.descriptor, "()V");
        assert_eq!(foo.access, AccessFlags::PRIVATE);
    }

    #[test]
    fn self_invokespecial() {
        let events = sample_events();
        let insns: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ClassEvent::MethodInsn(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(insns.len(), 3);
        assert_eq!(insns[0].owner, "java/lang/Object");
        assert_eq!(insns[0].name, "<init>");
        assert_eq!(
            insns[1],
            &MethodInsn {
                kind: InvokeKind::Special,
                owner: FOO.into(),
                name: "foo".into(),
                descriptor: "()V".into(),
                is_interface: false,
            }
        );
        assert_eq!((insns[2].owner.as_str(), insns[2].name.as_str()), (FOO, "<init>"));
    }

    #[test]
    fn lambda_bootstrap() {
        let events = sample_events();
        let indy = events
            .iter()
            .find_map(|e| match e {
                ClassEvent::InvokeDynamic(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(indy.name, "run");
        assert_eq!(indy.bootstrap.kind, HandleKind::InvokeStatic);
        assert_eq!(indy.bootstrap.name, "metafactory");
        assert_eq!(indy.arguments.len(), 3);
        assert_eq!(indy.arguments[0], BootstrapArg::MethodType("()V".into()));
        let BootstrapArg::Handle(handle) = &indy.arguments[1] else {
            panic!("expected handle, got {:?}", indy.arguments[1]);
        };
        assert_eq!(handle.kind, HandleKind::InvokeSpecial);
        assert_eq!(handle.owner, FOO);
        assert_eq!(handle.name, "lambda$run$0");
    }

    #[test]
    fn inner_class_record() {
        let events = sample_events();
        let ClassEvent::InnerClass(inner) = &events[1] else {
            panic!("expected inner class, got {:?}", events[1]);
        };
        assert_eq!(inner.name, "net/example/Foo$Inner");
        assert_eq!(inner.outer_name.as_deref(), Some(FOO));
        assert_eq!(inner.inner_name.as_deref(), Some("Inner"));
        assert_eq!(inner.access, AccessFlags::PRIVATE | AccessFlags::STATIC);
    }

    #[test]
    fn invalid_magic() {
        let mut data = sample_class().unwrap();
        data[0] = 0xde;
        assert!(matches!(
            ClassReader::new(&data),
            Err(Error::InvalidMagic(0xdefe_babe))
        ));
    }

    #[test]
    fn truncated() {
        let data = sample_class().unwrap();
        for len in [0, 3, 9, 40, data.len() - 1] {
            assert!(
                ClassReader::new(&data[..len]).is_err(),
                "prefix of {len} bytes parsed"
            );
        }
    }

    #[test]
    fn bad_constant_tag() {
        let mut data = sample_class().unwrap();
        // first entry follows magic, version and constant_pool_count
        data[10] = 2;
        assert!(matches!(
            ClassReader::new(&data),
            Err(Error::InvalidConstantTag(2, 10))
        ));
    }

    #[test]
    fn interface_invocation_is_reported() {
        let mut b = ClassBuilder::new(AccessFlags::PUBLIC, "A", Some("java/lang/Object")).unwrap();
        let size = b
            .method_ref("java/util/List", "size", "()I", true)
            .unwrap();
        b.add_method(
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            "len",
            "(Ljava/util/List;)I",
            Some(
                Code::new(1, 1)
                    .raw(&[opcode::ALOAD, 0])
                    .invoke_interface(size, 1)
                    .op(opcode::IRETURN),
            ),
        )
        .unwrap();
        let events = events(&b.build().unwrap()).unwrap();
        let insn = events
            .iter()
            .find_map(|e| match e {
                ClassEvent::MethodInsn(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(insn.kind, InvokeKind::Interface);
        assert!(insn.is_interface);
    }
}
