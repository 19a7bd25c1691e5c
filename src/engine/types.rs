//! Core Runtime Types, Identifiers, and Access Declarations
//!
//! This module defines the **fundamental types, identifiers, and access
//! declarations** used throughout the runtime. These definitions form the
//! *semantic backbone* of the system and are shared across all subsystems,
//! including entity management, the store, query caches, scheduling, and
//! systems.
//!
//! ## Design Philosophy
//!
//! The runtime is designed around:
//!
//! - **Name-keyed component storage**
//! - **Sorted name-slice signatures**
//! - **Stable numeric entity identifiers**
//! - **Explicit access declaration**
//!
//! Component types are identified by short symbolic names (interned
//! `&'static str`), unique per store. A *signature* is the normalised
//! (sorted, deduplicated) list of component names that keys a query cache.
//!
//! ## Queries and Access Control
//!
//! [`AccessTable`] describes *how* a system touches components (read-only or
//! read-write). The scheduler uses access tables for deterministic conflict
//! detection: two systems may share an execution batch only when no component
//! is write-accessed by one and touched at all by the other.

/// Globally unique entity identifier.
///
/// The value `0` is reserved to mean "no entity / invalidated handle"; valid
/// live ids fall in `[1, u32::MAX]`.
pub type EntityId = u32;

/// Reserved id meaning "no entity".
pub const NO_ENTITY: EntityId = 0;

/// Symbolic identifier for a component type, unique per store.
pub type ComponentName = &'static str;

/// Symbolic identifier for an event channel.
pub type EventName = &'static str;

/// Access mode a system declares for one component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Shared access: the component interior is only read.
    ReadOnly,
    /// Exclusive access: the component interior may be mutated.
    ReadWrite,
}

/// Declares the per-component access of a system.
///
/// Entries are kept sorted by component name and deduplicated; declaring the
/// same name twice keeps the stronger mode ([`Access::ReadWrite`] wins).
///
/// The scheduler treats a declared table as the source of truth: a body that
/// writes through a read-only declaration is a programmer error the scheduler
/// cannot detect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessTable {
    entries: Vec<(ComponentName, Access)>,
}

impl AccessTable {
    /// Creates an empty access table.
    #[inline]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Declares read-only access to `name`. Chainable.
    #[inline]
    pub fn read(mut self, name: ComponentName) -> Self {
        self.insert(name, Access::ReadOnly);
        self
    }

    /// Declares read-write access to `name`. Chainable.
    #[inline]
    pub fn write(mut self, name: ComponentName) -> Self {
        self.insert(name, Access::ReadWrite);
        self
    }

    /// Inserts an access declaration, upgrading an existing entry if needed.
    pub fn insert(&mut self, name: ComponentName, access: Access) {
        match self.entries.binary_search_by(|(n, _)| n.cmp(&name)) {
            Ok(position) => {
                if access == Access::ReadWrite {
                    self.entries[position].1 = Access::ReadWrite;
                }
            }
            Err(position) => self.entries.insert(position, (name, access)),
        }
    }

    /// Returns the number of declared component types.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the declared access for `name`, if any.
    pub fn access_of(&self, name: ComponentName) -> Option<Access> {
        self.entries
            .binary_search_by(|(n, _)| n.cmp(&name))
            .ok()
            .map(|position| self.entries[position].1)
    }

    /// Iterates over `(name, access)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentName, Access)> + '_ {
        self.entries.iter().copied()
    }

    /// Returns the normalised signature: the sorted list of declared names.
    pub fn signature(&self) -> Vec<ComponentName> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    /// Returns `true` if this access set conflicts with another.
    ///
    /// A conflict is any component with a `{RW, ·}` or `{·, RW}` overlap:
    /// write/write, write/read, or read/write on the same name.
    pub fn conflicts_with(&self, other: &AccessTable) -> bool {
        for (name, access) in self.iter() {
            match other.access_of(name) {
                Some(Access::ReadWrite) => return true,
                Some(Access::ReadOnly) if access == Access::ReadWrite => return true,
                _ => {}
            }
        }
        false
    }
}

/// Normalises a list of component names into a signature: sorted, deduplicated.
///
/// `[A, B]` and `[B, A]` normalise identically and therefore share one query
/// cache.
pub fn normalize_signature(names: &[ComponentName]) -> Vec<ComponentName> {
    let mut signature = names.to_vec();
    signature.sort_unstable();
    signature.dedup();
    signature
}
