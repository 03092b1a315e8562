mod common;

use atx_classfile::{AccessFlags, BootstrapArg, ClassEvent, Error, HandleKind, InvokeKind};
use atx_transform::{format, transform_class};
use common::*;

#[test]
fn widened_private_method_call_becomes_virtual() {
    let data = foo_class();
    let set = format::parse("public net/example/Foo foo()V\n");
    let out = transform_class(&data, &set).unwrap();
    assert_eq!(out.len(), data.len());

    let before = events(&data);
    let after = events(&out);
    assert_eq!(method_access(&after, "foo"), AccessFlags::PUBLIC);
    assert_eq!(
        invocations(&after),
        [
            ("java/lang/Object.<init>".to_string(), InvokeKind::Special),
            ("net/example/Foo.foo".to_string(), InvokeKind::Virtual),
            ("net/example/Foo.<init>".to_string(), InvokeKind::Special),
        ]
    );

    // everything else is unchanged
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        match (b, a) {
            (ClassEvent::Method(x), ClassEvent::Method(y)) if x.name == "foo" => {
                assert_eq!(x.descriptor, y.descriptor)
            }
            (ClassEvent::MethodInsn(x), ClassEvent::MethodInsn(y)) if x.name == "foo" => {
                assert_eq!(x.owner, y.owner)
            }
            _ => assert_eq!(b, a),
        }
    }
    let changed = data.iter().zip(&out).filter(|(x, y)| x != y).count();
    // access flags low byte and one opcode
    assert_eq!(changed, 2);
}

#[test]
fn applying_twice_is_applying_once() {
    let data = foo_class();
    let set = format::parse(
        "public-f net/example/Foo\n\
         public net/example/Foo *()\n\
         protected-f net/example/Foo name\n",
    );
    let once = transform_class(&data, &set).unwrap();
    let twice = transform_class(&once, &set).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn unrelated_set_leaves_bytes_alone() {
    let data = foo_class();
    let set = format::parse("public net/example/Other foo()V\npublic net/example/Foo missing()V\n");
    assert_eq!(transform_class(&data, &set).unwrap(), data);
}

#[test]
fn lambda_handle_is_devirtualized() {
    let data = foo_class();
    let set = format::parse("public net/example/Foo lambda$run$0()V\n");
    let out = transform_class(&data, &set).unwrap();
    let after = events(&out);
    assert_eq!(
        method_access(&after, "lambda$run$0"),
        AccessFlags::PUBLIC | AccessFlags::SYNTHETIC
    );
    let indy = after
        .iter()
        .find_map(|e| match e {
            ClassEvent::InvokeDynamic(i) => Some(i),
            _ => None,
        })
        .unwrap();
    let BootstrapArg::Handle(handle) = &indy.arguments[1] else {
        panic!("expected handle, got {:?}", indy.arguments[1]);
    };
    assert_eq!(handle.kind, HandleKind::InvokeVirtual);
    assert_eq!(handle.name, "lambda$run$0");
    // the plain invokespecial calls are untouched
    assert!(
        invocations(&after)
            .iter()
            .all(|(_, kind)| *kind == InvokeKind::Special)
    );
}

#[test]
fn constructors_are_never_devirtualized() {
    let data = foo_class();
    let set = format::parse("public net/example/Foo *()\n");
    let out = transform_class(&data, &set).unwrap();
    let after = events(&out);
    assert_eq!(
        invocations(&after),
        [
            ("java/lang/Object.<init>".to_string(), InvokeKind::Special),
            ("net/example/Foo.foo".to_string(), InvokeKind::Virtual),
            ("net/example/Foo.<init>".to_string(), InvokeKind::Special),
        ]
    );
    assert_eq!(method_access(&after, "<init>"), AccessFlags::PUBLIC);
}

#[test]
fn fields_inner_classes_and_header() {
    let data = foo_class();
    let set = format::parse(
        "-f net/example/Foo name\n\
         protected net/example/Foo$Inner\n\
         default+f net/example/Foo\n",
    );
    let after = events(&transform_class(&data, &set).unwrap());
    for e in &after {
        match e {
            ClassEvent::Header(h) => {
                assert_eq!(h.access, AccessFlags::SUPER | AccessFlags::FINAL)
            }
            ClassEvent::Field(f) => assert_eq!(f.access, AccessFlags::PRIVATE),
            ClassEvent::InnerClass(i) => {
                assert_eq!(i.access, AccessFlags::PROTECTED | AccessFlags::STATIC)
            }
            _ => {}
        }
    }
}

#[test]
fn reader_errors_propagate() {
    let set = format::parse("public net/example/Foo\n");
    assert!(matches!(
        transform_class(b"not a class", &set),
        Err(Error::InvalidMagic(_))
    ));
    let data = foo_class();
    assert!(matches!(
        transform_class(&data[..data.len() / 2], &set),
        Err(Error::UnexpectedEof(_))
    ));
}

#[test]
fn one_set_shared_across_threads() {
    let data = foo_class();
    let set = format::parse(
        "public net/example/Foo foo()V\n\
         public net/example/Foo lambda$run$0()V\n\
         -f net/example/Foo name\n",
    );
    let expected = transform_class(&data, &set).unwrap();
    assert_ne!(expected, data);

    let (data, set) = (&data, &set);
    let outputs: Vec<Vec<u8>> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| s.spawn(move || transform_class(data, set).unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert_eq!(outputs.len(), 8);
    for out in outputs {
        assert_eq!(out, expected);
    }
}
