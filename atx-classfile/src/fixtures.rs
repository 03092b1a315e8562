//! Class files and helpers shared by the tests of this crate and its users.

use crate::access::AccessFlags;
use crate::builder::{ClassBuilder, Code};
use crate::error::Result;
use crate::opcode::{ALOAD_0, ARETURN, INVOKESPECIAL, NEW, RETURN};
use crate::reader::ClassReader;
use crate::visitor::{ClassEvent, ClassVisitor, HandleKind};
use crate::writer::ClassWriter;

pub const FOO: &str = "net/example/Foo";

const DUP: u8 = 0x59;
const POP: u8 = 0x57;

const METAFACTORY_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;\
Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;\
Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";

/// `net/example/Foo implements java/io/Serializable`:
///
/// - private fields `count` and `name`, the latter final;
/// - a constructor calling `Object.<init>`;
/// - a private `foo()V`, called from `bar()V` through `invokespecial`;
///   `bar` also constructs a `Foo`, so it holds a self `invokespecial <init>`;
/// - a synthetic private lambda body referenced by a `REF_invokeSpecial`
///   handle from the `invokedynamic` in `run()`;
/// - a private static inner class record for `Foo$Inner`.
pub fn sample_class() -> Result<Vec<u8>> {
    let mut b = ClassBuilder::new(
        AccessFlags::PUBLIC | AccessFlags::SUPER,
        FOO,
        Some("java/lang/Object"),
    )?;
    b.add_interface("java/io/Serializable")?;
    b.add_field(AccessFlags::PRIVATE, "count", "I")?;
    b.add_field(
        AccessFlags::PRIVATE | AccessFlags::FINAL,
        "name",
        "Ljava/lang/String;",
    )?;

    let object_init = b.method_ref("java/lang/Object", "<init>", "()V", false)?;
    b.add_method(
        AccessFlags::PUBLIC,
        "<init>",
        "()V",
        Some(
            Code::new(1, 1)
                .op(ALOAD_0)
                .invoke(INVOKESPECIAL, object_init)
                .op(RETURN),
        ),
    )?;

    b.add_method(
        AccessFlags::PRIVATE,
        "foo",
        "()V",
        Some(Code::new(0, 1).op(RETURN)),
    )?;

    let foo = b.method_ref(FOO, "foo", "()V", false)?;
    let self_init = b.method_ref(FOO, "<init>", "()V", false)?;
    let [hi, lo] = b.class_ref(FOO)?.to_be_bytes();
    b.add_method(
        AccessFlags::PUBLIC,
        "bar",
        "()V",
        Some(
            Code::new(2, 1)
                .op(ALOAD_0)
                .invoke(INVOKESPECIAL, foo)
                .raw(&[NEW, hi, lo, DUP])
                .invoke(INVOKESPECIAL, self_init)
                .op(POP)
                .op(RETURN),
        ),
    )?;

    b.add_method(
        AccessFlags::PRIVATE | AccessFlags::SYNTHETIC,
        "lambda$run$0",
        "()V",
        Some(Code::new(0, 1).op(RETURN)),
    )?;

    let metafactory = b.method_handle(
        HandleKind::InvokeStatic,
        "java/lang/invoke/LambdaMetafactory",
        "metafactory",
        METAFACTORY_DESC,
        false,
    )?;
    let erased = b.method_type("()V")?;
    let implementation =
        b.method_handle(HandleKind::InvokeSpecial, FOO, "lambda$run$0", "()V", false)?;
    let bsm = b.add_bootstrap_method(metafactory, &[erased, implementation, erased])?;
    let call_site = b.invoke_dynamic(bsm, "run", "(Lnet/example/Foo;)Ljava/lang/Runnable;")?;
    b.add_method(
        AccessFlags::PUBLIC,
        "run",
        "()Ljava/lang/Runnable;",
        Some(
            Code::new(1, 1)
                .op(ALOAD_0)
                .invoke_dynamic(call_site)
                .op(ARETURN),
        ),
    )?;

    b.add_inner_class(
        "net/example/Foo$Inner",
        Some(FOO),
        Some("Inner"),
        AccessFlags::PRIVATE | AccessFlags::STATIC,
    )?;

    b.build()
}

/// Every event the reader emits for `data`.
pub fn events(data: &[u8]) -> Result<Vec<ClassEvent>> {
    let reader = ClassReader::new(data)?;
    let mut events = Vec::new();
    reader.accept(&mut events);
    Ok(events)
}

/// Feed recorded events to `visitor`.
pub fn replay<V: ClassVisitor + ?Sized>(events: Vec<ClassEvent>, visitor: &mut V) {
    for event in events {
        match event {
            ClassEvent::Header(h) => visitor.visit_header(h),
            ClassEvent::InnerClass(i) => visitor.visit_inner_class(i),
            ClassEvent::Field(f) => visitor.visit_field(f),
            ClassEvent::Method(m) => visitor.visit_method(m),
            ClassEvent::MethodInsn(i) => visitor.visit_method_insn(i),
            ClassEvent::InvokeDynamic(i) => visitor.visit_invoke_dynamic(i),
            ClassEvent::End => visitor.visit_end(),
        }
    }
}

/// Write `data` back after passing its events through `edit`.
pub fn rewrite(data: &[u8], edit: impl FnOnce(&mut Vec<ClassEvent>)) -> Result<Vec<u8>> {
    let reader = ClassReader::new(data)?;
    let mut events = Vec::new();
    reader.accept(&mut events);
    edit(&mut events);
    let mut writer = ClassWriter::new(&reader);
    replay(events, &mut writer);
    writer.finish()
}
