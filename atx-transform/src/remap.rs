//! Re-keying access transform sets between namespaces.

use atx_mapping::SymbolTable;
use atx_mapping::descriptor::remap_descriptor;

use crate::error::RemapError;
use crate::format;
use crate::set::{AccessTransformSet, MethodSignature};

fn namespace<T: SymbolTable + ?Sized>(table: &T, name: &str) -> Result<usize, RemapError> {
    table
        .namespace_index(name)
        .ok_or_else(|| RemapError::UnknownNamespace(name.to_owned()))
}

/// Produce a copy of `set`, keyed in namespace `from`, re-keyed in namespace `to`.
///
/// Names the table cannot resolve are kept as they are. Entries that land on
/// the same key are merged.
pub fn remap<T: SymbolTable + ?Sized>(
    set: &AccessTransformSet,
    table: &T,
    from: &str,
    to: &str,
) -> Result<AccessTransformSet, RemapError> {
    let src = namespace(table, from)?;
    let dst = namespace(table, to)?;
    if src == dst {
        return Ok(set.clone());
    }

    let mut out = AccessTransformSet::new();
    for (owner, class) in set.classes() {
        let owner_name = table.class_name(owner, src, dst).unwrap_or_else(|| {
            log::trace!("no {to} name for class {owner}");
            owner
        });
        let entry = out.get_or_create_class(owner_name);
        entry.merge(class.get());
        entry.merge_all_fields(class.all_fields());
        entry.merge_all_methods(class.all_methods());

        for (field, t) in class.fields() {
            let name = table.field_name(owner, field, src, dst).unwrap_or_else(|| {
                log::trace!("no {to} name for field {owner}.{field}");
                field
            });
            entry.merge_field(name, t);
        }

        for (method, t) in class.methods() {
            let name = table
                .method_name(owner, &method.name, &method.descriptor, src, dst)
                .unwrap_or_else(|| {
                    log::trace!("no {to} name for method {owner}.{method}");
                    method.name.as_str()
                });
            let descriptor =
                remap_descriptor(&method.descriptor, |c| table.class_name(c, src, dst));
            entry.merge_method(MethodSignature::new(name, descriptor), t);
        }
    }

    log::debug!(
        "remapped {} access transformer classes from {from} to {to}",
        out.len()
    );
    Ok(out)
}

/// Parse directive text keyed in `from`, remap it to `to` and serialize it.
pub fn remap_text<T: SymbolTable + ?Sized>(
    text: &str,
    table: &T,
    from: &str,
    to: &str,
) -> Result<String, RemapError> {
    let set = format::parse(text);
    remap(&set, table, from, to).map(|s| format::to_string(&s))
}
