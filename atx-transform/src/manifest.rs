//! Locating access transformer files through jar manifests.

use std::collections::BTreeMap;

/// Where a jar conventionally carries its access transformer.
pub const ACCESS_TRANSFORMER_PATH: &str = "META-INF/accesstransformer.cfg";

/// Main manifest attribute listing additional access transformer files.
pub const FML_AT_ATTRIBUTE: &str = "FMLAT";

const META_INF: &str = "META-INF/";

/// Parse the main section of a `MANIFEST.MF`.
///
/// Continuation lines (starting with a single space) are joined onto the
/// previous value. Parsing stops at the first blank line, which ends the main
/// section. Lines without a `: ` separator are ignored.
pub fn parse_main_attributes(manifest: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    let mut current: Option<(String, String)> = None;

    for line in manifest.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(rest);
            }
            continue;
        }
        if let Some((name, value)) = current.take() {
            attributes.insert(name, value);
        }
        match line.split_once(": ") {
            Some((name, value)) => current = Some((name.to_owned(), value.to_owned())),
            None => log::warn!("ignoring malformed manifest line {line:?}"),
        }
    }
    if let Some((name, value)) = current {
        attributes.insert(name, value);
    }
    attributes
}

/// Value of the main attribute `name`. Attribute names are case-insensitive.
pub fn main_attribute<'m>(
    attributes: &'m BTreeMap<String, String>,
    name: &str,
) -> Option<&'m str> {
    attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Jar paths of the access transformers a manifest names in its
/// [`FML_AT_ATTRIBUTE`], resolved under `META-INF/`.
pub fn access_transformer_paths(manifest: &str) -> Vec<String> {
    let attributes = parse_main_attributes(manifest);
    main_attribute(&attributes, FML_AT_ATTRIBUTE)
        .map(|value| {
            value
                .split_whitespace()
                .map(|name| format!("{META_INF}{name}"))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_section_only() {
        let attrs = parse_main_attributes(
            "Manifest-Version: 1.0\r\nFMLAT: a_at.cfg\r\n\r\nName: x/Y.class\r\nFMLAT: ignored\r\n",
        );
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["Manifest-Version"], "1.0");
        assert_eq!(attrs["FMLAT"], "a_at.cfg");
    }

    #[test]
    fn continuation_lines() {
        let attrs = parse_main_attributes(
            "FMLAT: first_at.cfg sec\n ond_at.cfg\nTweakClass: a.B\n",
        );
        assert_eq!(attrs["FMLAT"], "first_at.cfg second_at.cfg");
        assert_eq!(attrs["TweakClass"], "a.B");
    }

    #[test]
    fn transformer_paths() {
        assert_eq!(
            access_transformer_paths("Manifest-Version: 1.0\nFMLAT: one_at.cfg  two_at.cfg\n"),
            vec!["META-INF/one_at.cfg", "META-INF/two_at.cfg"]
        );
        assert!(access_transformer_paths("Manifest-Version: 1.0\n").is_empty());
    }

    #[test]
    fn attribute_names_ignore_case() {
        assert_eq!(
            access_transformer_paths("manifest-version: 1.0\nfmlat: a_at.cfg\n"),
            vec!["META-INF/a_at.cfg"]
        );
        let attrs = parse_main_attributes("FmlAt: b_at.cfg\n");
        assert_eq!(main_attribute(&attrs, "FMLAT"), Some("b_at.cfg"));
        assert_eq!(main_attribute(&attrs, "TweakClass"), None);
    }
}
