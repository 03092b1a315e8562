//! Structural event stream for one class file.
//!
//! [`ClassReader::accept`](crate::ClassReader::accept) emits events in class
//! file order: the header, every `InnerClasses` record, every field, then each
//! method declaration followed by the invocation instructions of its body.
//! Adapters receive events by value and forward (possibly modified) events to
//! the next visitor in the chain.

use crate::access::AccessFlags;
use crate::opcode;

/// Class-file format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassVersion {
    pub major: u16,
    pub minor: u16,
}

impl ClassVersion {
    pub const JAVA_8: ClassVersion = ClassVersion {
        major: 52,
        minor: 0,
    };
    pub const JAVA_17: ClassVersion = ClassVersion {
        major: 61,
        minor: 0,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub version: ClassVersion,
    pub access: AccessFlags,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
}

/// One record of the `InnerClasses` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClass {
    pub name: String,
    pub outer_name: Option<String>,
    pub inner_name: Option<String>,
    pub access: AccessFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub access: AccessFlags,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub access: AccessFlags,
    pub name: String,
    pub descriptor: String,
}

/// Dispatch mode of a method invocation instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl InvokeKind {
    pub fn from_opcode(op: u8) -> Option<Self> {
        match op {
            opcode::INVOKEVIRTUAL => Some(Self::Virtual),
            opcode::INVOKESPECIAL => Some(Self::Special),
            opcode::INVOKESTATIC => Some(Self::Static),
            opcode::INVOKEINTERFACE => Some(Self::Interface),
            _ => None,
        }
    }

    pub fn opcode(self) -> u8 {
        match self {
            Self::Virtual => opcode::INVOKEVIRTUAL,
            Self::Special => opcode::INVOKESPECIAL,
            Self::Static => opcode::INVOKESTATIC,
            Self::Interface => opcode::INVOKEINTERFACE,
        }
    }
}

/// `invokevirtual`, `invokespecial`, `invokestatic` or `invokeinterface`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInsn {
    pub kind: InvokeKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_interface: bool,
}

/// Method handle reference kinds (JVMS §4.4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandleKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl HandleKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::GetField),
            2 => Some(Self::GetStatic),
            3 => Some(Self::PutField),
            4 => Some(Self::PutStatic),
            5 => Some(Self::InvokeVirtual),
            6 => Some(Self::InvokeStatic),
            7 => Some(Self::InvokeSpecial),
            8 => Some(Self::NewInvokeSpecial),
            9 => Some(Self::InvokeInterface),
            _ => None,
        }
    }
}

impl From<HandleKind> for u8 {
    #[inline]
    fn from(v: HandleKind) -> Self {
        v as u8
    }
}

/// A resolved `CONSTANT_MethodHandle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub kind: HandleKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_interface: bool,
}

/// A static argument of a bootstrap method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapArg {
    Handle(Handle),
    MethodType(String),
    /// Any other loadable constant, by constant pool index.
    Constant(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeDynamicInsn {
    pub name: String,
    pub descriptor: String,
    pub bootstrap: Handle,
    pub arguments: Vec<BootstrapArg>,
}

/// Receiver of class structure events.
pub trait ClassVisitor {
    fn visit_header(&mut self, header: ClassHeader);
    fn visit_inner_class(&mut self, inner: InnerClass);
    fn visit_field(&mut self, field: FieldDecl);
    /// Starts a method. Instruction events up to the next `visit_method`
    /// or `visit_end` belong to this method.
    fn visit_method(&mut self, method: MethodDecl);
    fn visit_method_insn(&mut self, insn: MethodInsn);
    fn visit_invoke_dynamic(&mut self, insn: InvokeDynamicInsn);
    fn visit_end(&mut self) {}
}

impl<V: ClassVisitor + ?Sized> ClassVisitor for &mut V {
    fn visit_header(&mut self, header: ClassHeader) {
        (**self).visit_header(header)
    }

    fn visit_inner_class(&mut self, inner: InnerClass) {
        (**self).visit_inner_class(inner)
    }

    fn visit_field(&mut self, field: FieldDecl) {
        (**self).visit_field(field)
    }

    fn visit_method(&mut self, method: MethodDecl) {
        (**self).visit_method(method)
    }

    fn visit_method_insn(&mut self, insn: MethodInsn) {
        (**self).visit_method_insn(insn)
    }

    fn visit_invoke_dynamic(&mut self, insn: InvokeDynamicInsn) {
        (**self).visit_invoke_dynamic(insn)
    }

    fn visit_end(&mut self) {
        (**self).visit_end()
    }
}

/// A recorded event, for visitors that collect the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassEvent {
    Header(ClassHeader),
    InnerClass(InnerClass),
    Field(FieldDecl),
    Method(MethodDecl),
    MethodInsn(MethodInsn),
    InvokeDynamic(InvokeDynamicInsn),
    End,
}

impl ClassVisitor for Vec<ClassEvent> {
    fn visit_header(&mut self, header: ClassHeader) {
        self.push(ClassEvent::Header(header));
    }

    fn visit_inner_class(&mut self, inner: InnerClass) {
        self.push(ClassEvent::InnerClass(inner));
    }

    fn visit_field(&mut self, field: FieldDecl) {
        self.push(ClassEvent::Field(field));
    }

    fn visit_method(&mut self, method: MethodDecl) {
        self.push(ClassEvent::Method(method));
    }

    fn visit_method_insn(&mut self, insn: MethodInsn) {
        self.push(ClassEvent::MethodInsn(insn));
    }

    fn visit_invoke_dynamic(&mut self, insn: InvokeDynamicInsn) {
        self.push(ClassEvent::InvokeDynamic(insn));
    }

    fn visit_end(&mut self) {
        self.push(ClassEvent::End);
    }
}
