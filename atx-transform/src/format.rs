//! Reader and writer for access transformer directive files.
//!
//! One directive per line:
//!
//! ```text
//! # comment
//! public net/example/Foo                 # the class itself
//! public-f net/example/Foo someField     # a field
//! protected net/example/Foo foo(I)V      # a method
//! public net/example/Foo *               # every field
//! public net/example/Foo *()             # every method
//! ```

use std::fmt;
use std::io::{self, BufRead, Write};

use crate::access::AccessTransform;
use crate::set::{AccessTransformSet, MethodSignature};

const WILDCARD: &str = "*";
const ALL_METHODS: &str = "*()";

/// Parse directives from `text`, merging them into `set`.
pub fn read_str(text: &str, set: &mut AccessTransformSet) {
    for (index, line) in text.lines().enumerate() {
        read_line(index + 1, line, set);
    }
}

/// Parse `text` into a new set.
pub fn parse(text: &str) -> AccessTransformSet {
    let mut set = AccessTransformSet::new();
    read_str(text, &mut set);
    set
}

/// Parse directives from a reader, merging them into `set`.
pub fn read<R: BufRead>(reader: R, set: &mut AccessTransformSet) -> io::Result<()> {
    for (index, line) in reader.lines().enumerate() {
        read_line(index + 1, &line?, set);
    }
    Ok(())
}

fn read_line(number: usize, line: &str, set: &mut AccessTransformSet) {
    let line = match line.find('#') {
        Some(comment) => &line[..comment],
        None => line,
    }
    .trim();
    if line.is_empty() {
        return;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let (token, class, member) = match parts.as_slice() {
        [token, class] => (*token, *class, None),
        [token, class, member] => (*token, *class, Some(*member)),
        _ => {
            log::warn!(
                "skipping access transformer line {number}: expected 2 or 3 fields, found {}",
                parts.len()
            );
            return;
        }
    };

    let transform = AccessTransform::parse_token(token);
    let entry = set.get_or_create_class(class);
    let Some(member) = member else {
        entry.merge(transform);
        return;
    };

    match member.find('(') {
        Some(paren) => {
            let (name, descriptor) = member.split_at(paren);
            // `name()` without a return type is treated as the method wildcard
            if name.starts_with(WILDCARD) || descriptor == "()" {
                entry.merge_all_methods(transform);
            } else {
                entry.merge_method(MethodSignature::new(name, descriptor), transform);
            }
        }
        None if member.starts_with(WILDCARD) => entry.merge_all_fields(transform),
        None => entry.merge_field(member, transform),
    }
}

/// Write `set` as directives, one per non-empty transform.
pub fn write<W: Write>(mut out: W, set: &AccessTransformSet) -> io::Result<()> {
    write!(out, "{set}")
}

/// Serialize `set` to a string.
pub fn to_string(set: &AccessTransformSet) -> String {
    set.to_string()
}

/// Directive-file serialization: classes in name order, each as its class
/// line, the field wildcard, the method wildcard, fields, then methods.
impl fmt::Display for AccessTransformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, class) in self.classes() {
            if !class.get().is_empty() {
                writeln!(f, "{} {name}", class.get())?;
            }
            if !class.all_fields().is_empty() {
                writeln!(f, "{} {name} {WILDCARD}", class.all_fields())?;
            }
            if !class.all_methods().is_empty() {
                writeln!(f, "{} {name} {ALL_METHODS}", class.all_methods())?;
            }
            for (field, t) in class.fields().filter(|(_, t)| !t.is_empty()) {
                writeln!(f, "{t} {name} {field}")?;
            }
            for (method, t) in class.methods().filter(|(_, t)| !t.is_empty()) {
                writeln!(f, "{t} {name} {method}")?;
            }
        }
        Ok(())
    }
}
