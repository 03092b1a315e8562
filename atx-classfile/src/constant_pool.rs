//! Constant pool (JVMS §4.4).

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::mutf8::{decode_mutf8, encode_mutf8};

// Constant pool tags
pub const TAG_UTF8: u8 = 1;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELDREF: u8 = 9;
pub const TAG_METHODREF: u8 = 10;
pub const TAG_INTERFACE_METHODREF: u8 = 11;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_DYNAMIC: u8 = 17;
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

/// One constant pool entry. Floating point values are kept as raw bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
    /// Slot 0 and the second slot of a `Long` or `Double`.
    Unusable,
}

impl Constant {
    /// Long and Double take two pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    /// Append the serialized form of this entry to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Constant::Utf8(s) => {
                let bytes = encode_mutf8(s);
                let len = u16::try_from(bytes.len())
                    .map_err(|_| Error::UnsupportedEdit(format!("string of {} bytes", bytes.len())))?;
                out.push(TAG_UTF8);
                out.extend_from_slice(&len.to_be_bytes());
                out.extend_from_slice(&bytes);
            }
            Constant::Integer(v) => {
                out.push(TAG_INTEGER);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Constant::Float(bits) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&bits.to_be_bytes());
            }
            Constant::Long(v) => {
                out.push(TAG_LONG);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Constant::Double(bits) => {
                out.push(TAG_DOUBLE);
                out.extend_from_slice(&bits.to_be_bytes());
            }
            Constant::Class { name_index } => push_u16(out, TAG_CLASS, *name_index),
            Constant::String { string_index } => push_u16(out, TAG_STRING, *string_index),
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            } => push_u16_pair(out, TAG_FIELDREF, *class_index, *name_and_type_index),
            Constant::MethodRef {
                class_index,
                name_and_type_index,
            } => push_u16_pair(out, TAG_METHODREF, *class_index, *name_and_type_index),
            Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => push_u16_pair(
                out,
                TAG_INTERFACE_METHODREF,
                *class_index,
                *name_and_type_index,
            ),
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => push_u16_pair(out, TAG_NAME_AND_TYPE, *name_index, *descriptor_index),
            Constant::MethodHandle {
                kind,
                reference_index,
            } => {
                out.push(TAG_METHOD_HANDLE);
                out.push(*kind);
                out.extend_from_slice(&reference_index.to_be_bytes());
            }
            Constant::MethodType { descriptor_index } => {
                push_u16(out, TAG_METHOD_TYPE, *descriptor_index)
            }
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => push_u16_pair(
                out,
                TAG_DYNAMIC,
                *bootstrap_method_attr_index,
                *name_and_type_index,
            ),
            Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => push_u16_pair(
                out,
                TAG_INVOKE_DYNAMIC,
                *bootstrap_method_attr_index,
                *name_and_type_index,
            ),
            Constant::Module { name_index } => push_u16(out, TAG_MODULE, *name_index),
            Constant::Package { name_index } => push_u16(out, TAG_PACKAGE, *name_index),
            Constant::Unusable => {}
        }
        Ok(())
    }
}

fn push_u16(out: &mut Vec<u8>, tag: u8, a: u16) {
    out.push(tag);
    out.extend_from_slice(&a.to_be_bytes());
}

fn push_u16_pair(out: &mut Vec<u8>, tag: u8, a: u16, b: u16) {
    push_u16(out, tag, a);
    out.extend_from_slice(&b.to_be_bytes());
}

/// A resolved field or method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'p> {
    pub owner: &'p str,
    pub name: &'p str,
    pub descriptor: &'p str,
    pub is_interface: bool,
}

/// The constant pool of one class. Index 0 is never valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// Parse `constant_pool_count` and the entries that follow, starting at `offset`.
    /// Returns the pool and the offset of the first byte after it.
    pub fn parse(data: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut c = Cursor::new(data, offset);
        let count = c.u16()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let tag_pos = c.pos();
            let tag = c.u8()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let len = c.u16()? as usize;
                    let start = c.pos();
                    let bytes = c.bytes(len)?;
                    Constant::Utf8(decode_mutf8(bytes, start)?)
                }
                TAG_INTEGER => Constant::Integer(c.u32()? as i32),
                TAG_FLOAT => Constant::Float(c.u32()?),
                TAG_LONG => {
                    let hi = c.u32()? as u64;
                    let lo = c.u32()? as u64;
                    Constant::Long(((hi << 32) | lo) as i64)
                }
                TAG_DOUBLE => {
                    let hi = c.u32()? as u64;
                    let lo = c.u32()? as u64;
                    Constant::Double((hi << 32) | lo)
                }
                TAG_CLASS => Constant::Class {
                    name_index: c.u16()?,
                },
                TAG_STRING => Constant::String {
                    string_index: c.u16()?,
                },
                TAG_FIELDREF => Constant::FieldRef {
                    class_index: c.u16()?,
                    name_and_type_index: c.u16()?,
                },
                TAG_METHODREF => Constant::MethodRef {
                    class_index: c.u16()?,
                    name_and_type_index: c.u16()?,
                },
                TAG_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                    class_index: c.u16()?,
                    name_and_type_index: c.u16()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name_index: c.u16()?,
                    descriptor_index: c.u16()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    kind: c.u8()?,
                    reference_index: c.u16()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType {
                    descriptor_index: c.u16()?,
                },
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap_method_attr_index: c.u16()?,
                    name_and_type_index: c.u16()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: c.u16()?,
                    name_and_type_index: c.u16()?,
                },
                TAG_MODULE => Constant::Module {
                    name_index: c.u16()?,
                },
                TAG_PACKAGE => Constant::Package {
                    name_index: c.u16()?,
                },
                _ => return Err(Error::InvalidConstantTag(tag, tag_pos)),
            };
            let wide = constant.is_wide();
            entries.push(constant);
            if wide {
                entries.push(Constant::Unusable);
            }
        }

        // A trailing Long/Double can overrun the declared count by one slot.
        if entries.len() > count.max(1) {
            return Err(Error::InvalidConstantIndex(count as u16));
        }

        Ok((Self { entries }, c.pos()))
    }

    /// The `constant_pool_count` value: one more than the highest valid index.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Constant] {
        &self.entries
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(index as usize) {
            None | Some(Constant::Unusable) => Err(Error::InvalidConstantIndex(index)),
            Some(c) => Ok(c),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(Error::ConstantMismatch {
                index,
                expected: "Utf8",
            }),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(Error::ConstantMismatch {
                index,
                expected: "Class",
            }),
        }
    }

    /// Like [`class_name`](Self::class_name), with index 0 meaning "absent".
    pub fn optional_class_name(&self, index: u16) -> Result<Option<&str>> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(Some)
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(Error::ConstantMismatch {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Resolve a `Fieldref`, `Methodref` or `InterfaceMethodref`.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (class_index, nat_index, is_interface) = match self.get(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index, false),
            Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index, true),
            _ => {
                return Err(Error::ConstantMismatch {
                    index,
                    expected: "member reference",
                });
            }
        };
        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok(MemberRef {
            owner,
            name,
            descriptor,
            is_interface,
        })
    }

    /// Index of an entry equal to `constant`, if present.
    pub fn find(&self, constant: &Constant) -> Option<u16> {
        self.entries
            .iter()
            .position(|c| c == constant)
            .filter(|&i| i != 0)
            .map(|i| i as u16)
    }

    /// Append `constant` unconditionally and return its index.
    pub fn push(&mut self, constant: Constant) -> Result<u16> {
        let index = self.entries.len();
        let needed = index + if constant.is_wide() { 2 } else { 1 };
        if needed > u16::MAX as usize {
            return Err(Error::ConstantPoolOverflow(needed));
        }
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index as u16)
    }

    /// Return the index of an existing equal entry, or append it.
    pub fn intern(&mut self, constant: Constant) -> Result<u16> {
        match self.find(&constant) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    pub fn intern_utf8(&mut self, s: &str) -> Result<u16> {
        self.intern(Constant::Utf8(s.to_owned()))
    }

    pub fn intern_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.intern_utf8(name)?;
        self.intern(Constant::Class { name_index })
    }

    pub fn intern_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.intern_utf8(name)?;
        let descriptor_index = self.intern_utf8(descriptor)?;
        self.intern(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    /// Serialize entries from index `from` onward (without the count).
    pub fn write_entries(&self, from: usize, out: &mut Vec<u8>) -> Result<()> {
        for entry in self.entries.iter().skip(from) {
            entry.write_to(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes(entries: &[Constant]) -> Vec<u8> {
        let mut pool = ConstantPool::new();
        for e in entries {
            pool.push(e.clone()).unwrap();
        }
        let mut out = (pool.count() as u16).to_be_bytes().to_vec();
        pool.write_entries(1, &mut out).unwrap();
        out
    }

    #[test]
    fn parse_long_takes_two_slots() {
        let data = pool_bytes(&[Constant::Long(-2), Constant::Utf8("x".into())]);
        let (pool, end) = ConstantPool::parse(&data, 0).unwrap();
        assert_eq!(end, data.len());
        assert_eq!(pool.count(), 4);
        assert_eq!(pool.get(1).unwrap(), &Constant::Long(-2));
        assert!(matches!(pool.get(2), Err(Error::InvalidConstantIndex(2))));
        assert_eq!(pool.utf8(3).unwrap(), "x");
    }

    #[test]
    fn resolve_method_ref() {
        let mut pool = ConstantPool::new();
        let class_index = pool.intern_class("net/example/Foo").unwrap();
        let nat = pool.intern_name_and_type("foo", "()V").unwrap();
        let r = pool
            .push(Constant::MethodRef {
                class_index,
                name_and_type_index: nat,
            })
            .unwrap();
        let m = pool.member_ref(r).unwrap();
        assert_eq!(m.owner, "net/example/Foo");
        assert_eq!(m.name, "foo");
        assert_eq!(m.descriptor, "()V");
        assert!(!m.is_interface);
    }

    #[test]
    fn intern_deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_class("A").unwrap();
        let b = pool.intern_class("A").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn type_mismatch() {
        let mut pool = ConstantPool::new();
        let i = pool.intern_utf8("A").unwrap();
        assert!(matches!(
            pool.class_name(i),
            Err(Error::ConstantMismatch { index: 1, .. })
        ));
        assert!(matches!(pool.utf8(0), Err(Error::InvalidConstantIndex(0))));
    }

    #[test]
    fn invalid_tag() {
        let data = [0x00, 0x02, 0x02, 0x00];
        assert!(matches!(
            ConstantPool::parse(&data, 0),
            Err(Error::InvalidConstantTag(2, 2))
        ));
    }
}
