//! Allocation tags and tag sets.
//!
//! A [`Tag`] is a signed 64-bit value. The low range is reserved:
//!
//! | Raw value                          | Meaning                         |
//! |------------------------------------|---------------------------------|
//! | `0`                                | untagged                        |
//! | `1..USER_TAG_START`                | builtin categories              |
//! | `USER_TAG_START..=MAX_USER_TAG`    | anonymous user scope ids        |
//! | above `MAX_USER_TAG`, or negative  | interned name (index, number)   |
//!
//! Name tags pack the name index into the low 32 bits and the instance number
//! into the high 32 bits, so decoding needs no table lookup. Instance numbers
//! of 2^31 and up set the sign bit.

use std::fmt;

use crate::llm_check;

/// First raw value of the anonymous user scope range.
pub const USER_TAG_START: i64 = 100;

/// Last reserved raw value. Every name tag is strictly greater.
pub const MAX_USER_TAG: i64 = 255;

fn is_name_raw(raw: i64) -> bool {
    raw as u64 > MAX_USER_TAG as u64
}

/// A hierarchical memory category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tag(i64);

impl Tag {
    /// The untagged sentinel.
    pub const UNTAGGED: Tag = Tag(0);

    /// Wrap a raw tag value.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw tag value.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Whether this is the untagged sentinel.
    pub const fn is_untagged(self) -> bool {
        self.0 == 0
    }

    /// Encode an interned name as a tag.
    ///
    /// Panics (LLM902) if the packed value falls inside the reserved range;
    /// name tables must hand out ids that cannot collide with builtins.
    pub fn from_name(name: NameId) -> Self {
        let packed = (((name.number as u64) << 32) | name.index as u64) as i64;
        llm_check!(
            is_name_raw(packed),
            LLM902,
            "index={} number={} packed={}",
            name.index,
            name.number,
            packed
        );
        Self(packed)
    }

    /// Decode a name tag back into its interned name id.
    pub fn to_name(self) -> Option<NameId> {
        let raw = self.0 as u64;
        is_name_raw(self.0).then(|| NameId {
            index: (raw & 0xFFFF_FFFF) as u32,
            number: (raw >> 32) as u32,
        })
    }

    /// Classify this tag.
    pub fn kind(self) -> TagKind {
        if let Some(name) = self.to_name() {
            return TagKind::Name(name);
        }
        match self.0 {
            0 => TagKind::Untagged,
            raw => match BuiltinTag::from_raw(raw) {
                Some(builtin) => TagKind::Builtin(builtin),
                None => TagKind::User(raw),
            },
        }
    }
}

impl From<BuiltinTag> for Tag {
    fn from(tag: BuiltinTag) -> Self {
        Self(tag as i64)
    }
}

impl From<NameId> for Tag {
    fn from(name: NameId) -> Self {
        Self::from_name(name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TagKind::Untagged => write!(f, "Untagged"),
            TagKind::Builtin(builtin) => write!(f, "{}", builtin.csv_name()),
            TagKind::User(raw) => write!(f, "User({})", raw),
            TagKind::Name(name) => write!(f, "Name({}_{})", name.index, name.number),
        }
    }
}

/// What a tag value denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// The untagged sentinel.
    Untagged,
    /// One of the builtin categories.
    Builtin(BuiltinTag),
    /// A reserved id without a builtin meaning. Reported as `User Memory`.
    User(i64),
    /// An interned name.
    Name(NameId),
}

/// An interned name: table index plus instance number.
///
/// `index` identifies the string, `number` distinguishes instances of the
/// same string (`Mesh_0`, `Mesh_1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameId {
    /// Index of the string in the name table.
    pub index: u32,
    /// Instance number.
    pub number: u32,
}

impl NameId {
    /// Create a name id.
    pub const fn new(index: u32, number: u32) -> Self {
        Self { index, number }
    }
}

macro_rules! builtin_tags {
    ($( $(#[$doc:meta])* $variant:ident = $raw:literal, $stat:literal, $csv:literal; )+) => {
        /// Builtin tag categories.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i64)]
        pub enum BuiltinTag {
            $( $(#[$doc])* $variant = $raw, )+
        }

        impl BuiltinTag {
            /// Every builtin tag.
            pub const ALL: &'static [BuiltinTag] = &[$( BuiltinTag::$variant, )+];

            /// Look up a builtin by its raw value.
            pub const fn from_raw(raw: i64) -> Option<Self> {
                match raw {
                    $( $raw => Some(BuiltinTag::$variant), )+
                    _ => None,
                }
            }

            /// Name of the dedicated stat counter for this tag.
            pub const fn stat_name(self) -> &'static str {
                match self {
                    $( BuiltinTag::$variant => $stat, )+
                }
            }

            /// Column name used in CSV output.
            pub const fn csv_name(self) -> &'static str {
                match self {
                    $( BuiltinTag::$variant => $csv, )+
                }
            }
        }
    };
}

builtin_tags! {
    /// Small block allocator pages.
    SmallBinnedAllocation = 1, "Small Binned OS Memory", "SmallBinnedAllocation";
    /// Large allocations handed straight to the OS.
    LargeBinnedAllocation = 2, "Large (Non) Binned OS Memory", "LargeBinnedAllocation";
    /// Thread stacks.
    ThreadStack = 3, "Thread Stacks", "ThreadStack";
    /// Pools owned by the general purpose allocator.
    MallocPool = 4, "Malloc Pool", "MallocPool";
    /// Memory handed out by the general purpose allocator.
    Malloc = 5, "malloc", "Malloc";
    /// Executable image size, platform tracker.
    ProgramSizePlatform = 6, "Program Size", "ProgramSize";
    /// Executable image size, default tracker.
    ProgramSizeDefault = 7, "Program Size", "ProgramSize";
    /// Emergency out-of-memory reserve, platform tracker.
    BackupOomMemoryPoolPlatform = 8, "Backup OOM Pool", "BackupOOMMemoryPool";
    /// Emergency out-of-memory reserve, default tracker.
    BackupOomMemoryPoolDefault = 9, "Backup OOM Pool", "BackupOOMMemoryPool";
    /// Memory reserved for crash reporting.
    GenericPlatformMallocCrash = 10, "GenericPlatformMallocCrash", "GenericPlatformMallocCrash";
    /// Graphics API memory without a finer category.
    GraphicsMisc = 11, "Graphics Misc", "Graphics Misc";
    /// Audio memory without a finer category.
    AudioMisc = 12, "Audio Misc", "Audio Misc";
    /// Engine systems without a finer category.
    SystemMisc = 13, "System Misc", "System Misc";
    /// Game code without a finer category.
    GameMisc = 14, "Game Misc", "Game Misc";
}

/// Stat name used for reserved ids without a builtin meaning.
pub const USER_MEMORY_STAT: &str = "User Memory";

/// An orthogonal tagging dimension.
///
/// `None` is the ordinary scope tag dimension and is always on. The asset
/// sets are opt-in because they keep a second tag stack per thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagSet {
    /// Ordinary scope tags.
    None,
    /// Per-asset tags.
    Assets,
    /// Per-asset-class tags.
    AssetClasses,
}

impl TagSet {
    /// Number of tag sets.
    pub const COUNT: usize = 3;

    /// Every tag set.
    pub const ALL: [TagSet; Self::COUNT] = [TagSet::None, TagSet::Assets, TagSet::AssetClasses];

    /// Index into per-set arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parse a tag set name as used by `-llmtagsets=`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|set| set.name().eq_ignore_ascii_case(name))
    }

    /// The tag set's name.
    pub const fn name(self) -> &'static str {
        match self {
            TagSet::None => "None",
            TagSet::Assets => "Assets",
            TagSet::AssetClasses => "AssetClasses",
        }
    }

    /// Whether scopes of this set go on the asset stack.
    pub const fn uses_asset_stack(self) -> bool {
        matches!(self, TagSet::Assets | TagSet::AssetClasses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_round_trip() {
        for &builtin in BuiltinTag::ALL {
            let tag = Tag::from(builtin);
            assert_eq!(tag.kind(), TagKind::Builtin(builtin));
            assert!(tag.raw() < USER_TAG_START);
        }
    }

    #[test]
    fn test_name_round_trip() {
        let names = [
            NameId::new(MAX_USER_TAG as u32 + 1, 0),
            NameId::new(4096, 0),
            NameId::new(4096, 7),
            NameId::new(u32::MAX, 0x7FFF_FFFF),
            NameId::new(1, 3),
            NameId::new(MAX_USER_TAG as u32 + 1, 0x8000_0000),
            NameId::new(0, u32::MAX),
            NameId::new(u32::MAX, u32::MAX),
        ];
        for name in names {
            let tag = Tag::from_name(name);
            assert_eq!(tag.to_name(), Some(name));
            assert_eq!(tag.kind(), TagKind::Name(name));
        }
    }

    #[test]
    #[should_panic(expected = "LLM902")]
    fn test_name_in_reserved_range_is_fatal() {
        let _ = Tag::from_name(NameId::new(42, 0));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Tag::UNTAGGED.kind(), TagKind::Untagged);
        assert_eq!(Tag::from_raw(42).kind(), TagKind::User(42));
        assert_eq!(Tag::from_raw(MAX_USER_TAG).kind(), TagKind::User(MAX_USER_TAG));
        assert!(Tag::from_raw(MAX_USER_TAG).to_name().is_none());
    }

    #[test]
    fn test_tag_set_names() {
        assert_eq!(TagSet::from_name("assets"), Some(TagSet::Assets));
        assert_eq!(TagSet::from_name("AssetClasses"), Some(TagSet::AssetClasses));
        assert_eq!(TagSet::from_name("Textures"), None);
        assert!(!TagSet::None.uses_asset_stack());
        assert!(TagSet::AssetClasses.uses_asset_stack());
    }
}
