//! Name interning for name tags.

use std::collections::HashMap;

use crate::api::tag::{NameId, Tag, MAX_USER_TAG};
use crate::sync::mutex::Mutex;

/// Interns strings into [`NameId`]s and back.
///
/// Indices handed out must be above [`MAX_USER_TAG`] so that encoded name tags
/// never collide with builtin or user ids.
pub trait NameTable: Send + Sync {
    /// Intern a name, returning the same id for equal strings.
    fn intern(&self, name: &str) -> NameId;

    /// The string for an id, if this table produced it.
    fn resolve(&self, id: NameId) -> Option<String>;

    /// Intern a name and encode it as a tag.
    fn tag(&self, name: &str) -> Tag {
        Tag::from_name(self.intern(name))
    }
}

/// First index handed out by [`StdNameTable`].
pub const FIRST_NAME_INDEX: u32 = MAX_USER_TAG as u32 + 1;

#[derive(Default)]
struct Interned {
    names: Vec<String>,
    lookup: HashMap<String, u32>,
}

/// A simple in-process name table.
///
/// A trailing `_N` suffix becomes the instance number, so `Mesh_0` and
/// `Mesh_1` share an index and differ only in number. Numbers are stored
/// plus one so that an unsuffixed name has number 0.
#[derive(Default)]
pub struct StdNameTable {
    interned: Mutex<Interned>,
}

impl StdNameTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct base strings.
    pub fn len(&self) -> usize {
        self.interned.lock().names.len()
    }

    /// Whether nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn split_number(name: &str) -> (&str, u32) {
    if let Some((base, digits)) = name.rsplit_once('_') {
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'));
        if canonical && !base.is_empty() {
            if let Ok(number) = digits.parse::<u32>() {
                if number < u32::MAX {
                    return (base, number + 1);
                }
            }
        }
    }
    (name, 0)
}

impl NameTable for StdNameTable {
    fn intern(&self, name: &str) -> NameId {
        let (base, number) = split_number(name);
        let mut interned = self.interned.lock();
        if let Some(&index) = interned.lookup.get(base) {
            return NameId::new(index, number);
        }
        let index = FIRST_NAME_INDEX + interned.names.len() as u32;
        interned.names.push(base.to_string());
        interned.lookup.insert(base.to_string(), index);
        NameId::new(index, number)
    }

    fn resolve(&self, id: NameId) -> Option<String> {
        let position = id.index.checked_sub(FIRST_NAME_INDEX)? as usize;
        let interned = self.interned.lock();
        let base = interned.names.get(position)?;
        Some(match id.number {
            0 => base.clone(),
            number => format!("{}_{}", base, number - 1),
        })
    }
}
