//! Identifiers of registered types, members and generic parameters.
//!
//! Every name a [`TypePool`](crate::TypePool) hands out is owned by the
//! pool's [`NameTable`]. Names are only added while the pool is being
//! populated, so reads borrow straight from the table and dropping the pool
//! frees them. Names of synthesized members never enter the table; the
//! synthesized type owns those.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Index of a string in a [`NameTable`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// The empty string, present in every table.
    pub const EMPTY: Name = Name(0);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Deduplicating string table owned by one pool.
#[derive(Clone, Debug)]
pub struct NameTable {
    strings: Vec<Arc<str>>,
    ids: FxHashMap<Arc<str>, Name>,
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTable {
    pub fn new() -> Self {
        let empty: Arc<str> = Arc::from("");
        let mut ids = FxHashMap::default();
        ids.insert(Arc::clone(&empty), Name::EMPTY);
        Self {
            strings: vec![empty],
            ids,
        }
    }

    /// The name for `s`, adding it on first use.
    ///
    /// # Panics
    /// Panics if the table already holds `u32::MAX` strings.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&name) = self.ids.get(s) {
            return name;
        }
        let Ok(raw) = u32::try_from(self.strings.len()) else {
            panic!("name table exceeded {} entries", u32::MAX);
        };
        let name = Name(raw);
        let owned: Arc<str> = Arc::from(s);
        self.strings.push(Arc::clone(&owned));
        self.ids.insert(owned, name);
        name
    }

    /// The name for `s`, if it was ever added.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.ids.get(s).copied()
    }

    /// The string behind `name`. Names from another table resolve to `""`.
    pub fn lookup(&self, name: Name) -> &str {
        self.strings.get(name.index()).map_or("", |s| s)
    }

    /// Number of distinct strings, including the empty string.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Always `false`: the empty string is always present.
    pub fn is_empty(&self) -> bool {
        false
    }
}
