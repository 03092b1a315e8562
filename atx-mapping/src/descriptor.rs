//! JVM type descriptor rewriting.

/// Rewrite every class reference (`L<name>;`) in a field or method descriptor
/// through `map`. Names `map` returns `None` for are kept.
///
/// Array and primitive markers pass through untouched. The scan is total: an
/// unterminated `L` segment is copied verbatim.
pub fn remap_descriptor<'t, F>(descriptor: &str, mut map: F) -> String
where
    F: FnMut(&str) -> Option<&'t str>,
{
    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        out.push_str(&rest[..=start]);
        let tail = &rest[start + 1..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let class = &tail[..end];
        out.push_str(map(class).unwrap_or(class));
        out.push(';');
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}
