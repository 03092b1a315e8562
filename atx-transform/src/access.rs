//! Access transforms and their merge algebra.

use std::fmt;
use std::str::FromStr;

use atx_classfile::AccessFlags;
use serde::{Deserialize, Serialize};

/// A requested visibility.
///
/// Variants are ordered by visibility breadth, so the wider of two requests
/// is their maximum. `None` means "no request".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessChange {
    #[default]
    None,
    Private,
    PackagePrivate,
    Protected,
    Public,
}

impl AccessChange {
    /// Directive keyword; empty for `None`.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Private => "private",
            Self::PackagePrivate => "default",
            Self::Protected => "protected",
            Self::Public => "public",
        }
    }

    /// Keyword lookup. Unknown keywords are `None`.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "public" => Self::Public,
            "protected" => Self::Protected,
            "default" => Self::PackagePrivate,
            "private" => Self::Private,
            "" => Self::None,
            other => {
                log::debug!("unknown access keyword {other:?}, treating as no change");
                Self::None
            }
        }
    }

    /// The visibility bit this change sets (none for package-private).
    fn flag(self) -> AccessFlags {
        match self {
            Self::Public => AccessFlags::PUBLIC,
            Self::Protected => AccessFlags::PROTECTED,
            Self::Private => AccessFlags::PRIVATE,
            Self::PackagePrivate | Self::None => AccessFlags::empty(),
        }
    }
}

/// A request to add or remove the `final` modifier.
///
/// Ordered so that merging takes the maximum: `Remove` beats `Add` beats `None`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ModifierChange {
    #[default]
    None,
    Add,
    Remove,
}

impl ModifierChange {
    fn suffix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Add => "+f",
            Self::Remove => "-f",
        }
    }
}

/// An immutable (visibility, finality) request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessTransform {
    access: AccessChange,
    modifier: ModifierChange,
}

impl AccessTransform {
    /// The identity of [`merge`](Self::merge).
    pub const EMPTY: AccessTransform =
        AccessTransform::new(AccessChange::None, ModifierChange::None);

    pub const fn new(access: AccessChange, modifier: ModifierChange) -> Self {
        Self { access, modifier }
    }

    pub const fn of(access: AccessChange) -> Self {
        Self::new(access, ModifierChange::None)
    }

    pub fn access(self) -> AccessChange {
        self.access
    }

    pub fn modifier(self) -> ModifierChange {
        self.modifier
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// Combine two requests: the wider visibility wins, and removing `final`
    /// wins over adding it.
    pub fn merge(self, other: Self) -> Self {
        Self {
            access: self.access.max(other.access),
            modifier: self.modifier.max(other.modifier),
        }
    }

    /// Apply to class-file access flags.
    pub fn apply(self, flags: AccessFlags) -> AccessFlags {
        let mut flags = flags;
        if self.access != AccessChange::None {
            flags.remove(AccessFlags::VISIBILITY);
            flags.insert(self.access.flag());
        }
        match self.modifier {
            ModifierChange::None => {}
            ModifierChange::Add => flags.insert(AccessFlags::FINAL),
            ModifierChange::Remove => flags.remove(AccessFlags::FINAL),
        }
        flags
    }

    /// Parse a directive token such as `public`, `protected-f` or `+f`.
    ///
    /// Parsing is permissive: an unknown keyword leaves the access unchanged.
    /// A bare `-f` or `+f` is a final-only change with no access change. FML's
    /// legacy reader drops such tokens entirely; here they are kept so that
    /// [`Display`](fmt::Display) can write them back.
    pub fn parse_token(token: &str) -> Self {
        let (keyword, modifier) = if let Some(k) = token.strip_suffix("-f") {
            (k, ModifierChange::Remove)
        } else if let Some(k) = token.strip_suffix("+f") {
            (k, ModifierChange::Add)
        } else {
            (token, ModifierChange::None)
        };
        Self::new(AccessChange::from_keyword(keyword), modifier)
    }
}

/// Writes the directive token. With no access change only the `-f`/`+f`
/// suffix is written, which [`AccessTransform::parse_token`] reads back.
impl fmt::Display for AccessTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.access.keyword(), self.modifier.suffix())
    }
}

impl FromStr for AccessTransform {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_token(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PUBLIC: AccessTransform = AccessTransform::of(AccessChange::Public);

    fn any_access() -> impl Strategy<Value = AccessChange> {
        prop_oneof![
            Just(AccessChange::None),
            Just(AccessChange::Private),
            Just(AccessChange::PackagePrivate),
            Just(AccessChange::Protected),
            Just(AccessChange::Public),
        ]
    }

    fn any_modifier() -> impl Strategy<Value = ModifierChange> {
        prop_oneof![
            Just(ModifierChange::None),
            Just(ModifierChange::Add),
            Just(ModifierChange::Remove),
        ]
    }

    fn any_transform() -> impl Strategy<Value = AccessTransform> {
        (any_access(), any_modifier()).prop_map(|(a, m)| AccessTransform::new(a, m))
    }

    #[test]
    fn widest_access_and_remove_win() {
        let protected_remove =
            AccessTransform::new(AccessChange::Protected, ModifierChange::Remove);
        assert_eq!(
            PUBLIC.merge(protected_remove),
            AccessTransform::new(AccessChange::Public, ModifierChange::Remove)
        );
        let add = AccessTransform::new(AccessChange::None, ModifierChange::Add);
        let remove = AccessTransform::new(AccessChange::None, ModifierChange::Remove);
        assert_eq!(add.merge(remove), remove);
        assert_eq!(
            AccessTransform::of(AccessChange::Private)
                .merge(AccessTransform::of(AccessChange::PackagePrivate))
                .access(),
            AccessChange::PackagePrivate
        );
    }

    #[test]
    fn tokens() {
        assert_eq!(AccessTransform::parse_token("public"), PUBLIC);
        assert_eq!(
            AccessTransform::parse_token("protected-f"),
            AccessTransform::new(AccessChange::Protected, ModifierChange::Remove)
        );
        assert_eq!(
            AccessTransform::parse_token("default+f"),
            AccessTransform::new(AccessChange::PackagePrivate, ModifierChange::Add)
        );
        assert_eq!(
            AccessTransform::parse_token("-f"),
            AccessTransform::new(AccessChange::None, ModifierChange::Remove)
        );
        assert_eq!(AccessTransform::parse_token("publik"), AccessTransform::EMPTY);
        assert_eq!(
            "private".parse::<AccessTransform>(),
            Ok(AccessTransform::of(AccessChange::Private))
        );
    }

    #[test]
    fn display() {
        assert_eq!(PUBLIC.to_string(), "public");
        assert_eq!(
            AccessTransform::new(AccessChange::PackagePrivate, ModifierChange::Remove).to_string(),
            "default-f"
        );
        assert_eq!(
            AccessTransform::new(AccessChange::None, ModifierChange::Add).to_string(),
            "+f"
        );
    }

    #[test]
    fn apply_flags() {
        let flags = AccessFlags::PRIVATE | AccessFlags::FINAL | AccessFlags::STATIC;
        assert_eq!(
            AccessTransform::new(AccessChange::Public, ModifierChange::Remove).apply(flags),
            AccessFlags::PUBLIC | AccessFlags::STATIC
        );
        assert_eq!(
            AccessTransform::of(AccessChange::PackagePrivate).apply(flags),
            AccessFlags::FINAL | AccessFlags::STATIC
        );
        assert_eq!(
            AccessTransform::new(AccessChange::None, ModifierChange::Add)
                .apply(AccessFlags::PROTECTED),
            AccessFlags::PROTECTED | AccessFlags::FINAL
        );
        assert_eq!(AccessTransform::EMPTY.apply(flags), flags);
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in any_transform(), b in any_transform()) {
            prop_assert_eq!(a.merge(b), b.merge(a));
        }

        #[test]
        fn merge_is_associative(a in any_transform(), b in any_transform(), c in any_transform()) {
            prop_assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
        }

        #[test]
        fn merge_is_idempotent_with_identity(a in any_transform()) {
            prop_assert_eq!(a.merge(a), a);
            prop_assert_eq!(a.merge(AccessTransform::EMPTY), a);
            prop_assert_eq!(AccessTransform::EMPTY.merge(a), a);
        }

        #[test]
        fn token_round_trip(a in any_transform()) {
            prop_assert_eq!(AccessTransform::parse_token(&a.to_string()), a);
        }

        #[test]
        fn apply_is_idempotent(a in any_transform(), bits in any::<u16>()) {
            let flags = AccessFlags::from_bits_retain(bits);
            prop_assert_eq!(a.apply(a.apply(flags)), a.apply(flags));
        }
    }
}
