//! Access flag bits from the JVM class-file format (JVMS §4.1, §4.5, §4.6).
//!
//! Several bits are shared between member kinds: `SUPER` on classes is
//! `SYNCHRONIZED` on methods, `VOLATILE` is `BRIDGE`, `TRANSIENT` is `VARARGS`.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u16 {
        /// Public: class, field, method.
        const PUBLIC = 0x0001;
        /// Private: field, method, nested class.
        const PRIVATE = 0x0002;
        /// Protected: field, method, nested class.
        const PROTECTED = 0x0004;
        /// Static: field, method, nested class.
        const STATIC = 0x0008;
        /// Final: class, field, method.
        const FINAL = 0x0010;
        /// Super: class.
        const SUPER = 0x0020;
        /// Synchronized: method.
        const SYNCHRONIZED = 0x0020;
        /// Volatile: field.
        const VOLATILE = 0x0040;
        /// Bridge: method.
        const BRIDGE = 0x0040;
        /// Transient: field.
        const TRANSIENT = 0x0080;
        /// Varargs: method.
        const VARARGS = 0x0080;
        /// Native: method.
        const NATIVE = 0x0100;
        /// Interface: class.
        const INTERFACE = 0x0200;
        /// Abstract: class, method.
        const ABSTRACT = 0x0400;
        /// Strict floating point: method.
        const STRICT = 0x0800;
        /// Synthetic: class, field, method.
        const SYNTHETIC = 0x1000;
        /// Annotation type: class.
        const ANNOTATION = 0x2000;
        /// Enum: class, field.
        const ENUM = 0x4000;
        /// Module: class.
        const MODULE = 0x8000;
    }
}

impl AccessFlags {
    /// The three bits that encode visibility. Package-private is none of them.
    pub const VISIBILITY: AccessFlags = AccessFlags::PUBLIC
        .union(AccessFlags::PRIVATE)
        .union(AccessFlags::PROTECTED);
}
