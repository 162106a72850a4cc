//! Rendering and parsing flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// A set of independent option flags, passed by value.
///
/// Bit positions match the ones cmark-gfm uses so that profiles stored as
/// plain integers stay interchangeable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(u32);

impl Options {
    /// No flags: single and double tildes both delimit strikethrough, code
    /// languages go into a `class` attribute, raw HTML is omitted.
    pub const DEFAULT: Options = Options(0);

    /// Code block language is emitted as `<pre lang="…">`.
    pub const GITHUB_PRE_LANG: Options = Options(1 << 11);

    /// Only `~~` runs delimit strikethrough.
    pub const STRIKETHROUGH_DOUBLE_TILDE: Options = Options(1 << 14);

    /// Raw HTML and dangerous link destinations are emitted verbatim.
    pub const UNSAFE: Options = Options(1 << 17);

    const ALL: u32 = Self::GITHUB_PRE_LANG.0 | Self::STRIKETHROUGH_DOUBLE_TILDE.0 | Self::UNSAFE.0;

    pub const fn empty() -> Self {
        Options(0)
    }

    /// Builds a set from raw bits, dropping unknown ones.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Options(bits & Self::ALL)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Options) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Options) -> Self {
        Options(self.0 | other.0)
    }

    pub fn insert(&mut self, other: Options) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Options) {
        self.0 &= !other.0;
    }

    /// The strict GFM profile: double-tilde strikethrough.
    pub const fn strict_gfm() -> Self {
        Self::STRIKETHROUGH_DOUBLE_TILDE
    }

    /// The strict profile plus `<pre lang="…">` code blocks.
    pub const fn github_pre_lang() -> Self {
        Self::STRIKETHROUGH_DOUBLE_TILDE.union(Self::GITHUB_PRE_LANG)
    }
}

impl BitOr for Options {
    type Output = Options;

    fn bitor(self, rhs: Options) -> Options {
        self.union(rhs)
    }
}

impl BitOrAssign for Options {
    fn bitor_assign(&mut self, rhs: Options) {
        self.insert(rhs);
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::GITHUB_PRE_LANG, "GITHUB_PRE_LANG"),
            (Self::STRIKETHROUGH_DOUBLE_TILDE, "STRIKETHROUGH_DOUBLE_TILDE"),
            (Self::UNSAFE, "UNSAFE"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "Options({})", set.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_built_from_flags() {
        assert!(Options::strict_gfm().contains(Options::STRIKETHROUGH_DOUBLE_TILDE));
        assert!(!Options::strict_gfm().contains(Options::GITHUB_PRE_LANG));
        let pre = Options::github_pre_lang();
        assert!(pre.contains(Options::STRIKETHROUGH_DOUBLE_TILDE));
        assert!(pre.contains(Options::GITHUB_PRE_LANG));
        assert!(!pre.contains(Options::UNSAFE));
    }

    #[test]
    fn insert_and_remove_toggle_single_flags() {
        let mut opts = Options::empty();
        opts |= Options::UNSAFE;
        assert!(opts.contains(Options::UNSAFE));
        opts.remove(Options::UNSAFE);
        assert_eq!(opts, Options::DEFAULT);
    }

    #[test]
    fn unknown_bits_are_dropped() {
        let opts = Options::from_bits_truncate(u32::MAX);
        assert_eq!(
            opts,
            Options::GITHUB_PRE_LANG | Options::STRIKETHROUGH_DOUBLE_TILDE | Options::UNSAFE
        );
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&Options::github_pre_lang()).unwrap();
        assert_eq!(json, ((1u32 << 11) | (1 << 14)).to_string());
        let back: Options = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Options::github_pre_lang());
    }

    #[test]
    fn debug_lists_flag_names() {
        assert_eq!(
            format!("{:?}", Options::github_pre_lang()),
            "Options(GITHUB_PRE_LANG | STRIKETHROUGH_DOUBLE_TILDE)"
        );
    }
}
