//! # Components and the Type→Name Registry
//!
//! This module defines the component trait, the attached-component cell, and
//! the store-scoped registry that maps Rust component types to their symbolic
//! names.
//!
//! ## Component model
//! A component is a typed datum attached to exactly one entity at a time. A
//! freshly constructed component is a free `Box<dyn Component>`; attaching it
//! to an entity is the only transition from "free" to "attached" and produces
//! a [`ComponentSlot`] stamped with the component's name and owning entity.
//! Because attach consumes the box, attaching one instance twice is
//! unrepresentable.
//!
//! ## Interior access
//! Attached components are shared as [`SharedComponent`]
//! (`Arc<ComponentSlot>`). The slot wraps the value in an
//! [`AtomicRefCell`], giving dynamically checked shared reads and exclusive
//! writes during parallel batches. The scheduler's conflict rules make a
//! checked-borrow failure unreachable for systems that honour their declared
//! access; a violation panics, surfacing the undeclared write.
//!
//! ## Serialization hooks
//! Snapshot collaborators drive [`Component::pack`] / [`Component::unpack`] /
//! [`Component::convert`] through an [`Archive`]. The runtime never inspects
//! component interiors; snapshotting is pure delegation.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use atomic_refcell::{AtomicRef, AtomicRefCell, AtomicRefMut};

use crate::engine::error::RegistryError;
use crate::engine::types::{ComponentName, EntityId};

/// Type-erased key-value sink/source driven by the serialization hooks.
///
/// The snapshot layer owns the concrete archive; the runtime only forwards
/// it to component hooks.
pub trait Archive {
    /// Stores a value under `key`.
    fn put(&mut self, key: &str, value: Box<dyn Any + Send>);

    /// Removes and returns the value stored under `key`, if present.
    fn take(&mut self, key: &str) -> Option<Box<dyn Any + Send>>;
}

/// Upcast support for component trait objects.
///
/// Blanket-implemented for every `'static` type so component impls stay
/// one-liners.
pub trait AsAny: Any {
    /// Returns `self` as a shared [`Any`] reference.
    fn as_any(&self) -> &dyn Any;

    /// Returns `self` as an exclusive [`Any`] reference.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A typed datum attachable to an entity.
///
/// All hooks have no-op defaults; plain data components implement the trait
/// with an empty body:
///
/// ```rust
/// use ecs_runtime::Component;
///
/// struct Health { value: i32 }
/// impl Component for Health {}
/// # let _ = Health { value: 1 };
/// ```
pub trait Component: AsAny + Send + Sync {
    /// Writes this component's state into `archive`.
    fn pack(&self, _archive: &mut dyn Archive) {}

    /// Restores this component's state from `archive`.
    fn unpack(&mut self, _archive: &mut dyn Archive) {}

    /// Migrates archived state written by an older component revision.
    fn convert(&mut self, _archive: &mut dyn Archive) {}

    /// Self-check hook; `false` marks the instance as failed.
    fn test(&self) -> bool {
        true
    }
}

/// An attached component: value plus the identity stamped at attach time.
///
/// ## Invariants
/// - `owner` is the entity the component was attached to and never changes;
///   the component's observable identity ends at detach.
/// - The interior is read through [`ComponentSlot::read`] and mutated through
///   [`ComponentSlot::write`]; both are checked borrows.
pub struct ComponentSlot {
    name: ComponentName,
    owner: EntityId,
    value: AtomicRefCell<Box<dyn Component>>,
}

/// Shared handle to an attached component.
pub type SharedComponent = Arc<ComponentSlot>;

impl ComponentSlot {
    /// Stamps `value` with its name and owner. Attach is the only way a slot
    /// comes into existence.
    pub(crate) fn attach(
        name: ComponentName,
        owner: EntityId,
        value: Box<dyn Component>,
    ) -> SharedComponent {
        Arc::new(Self {
            name,
            owner,
            value: AtomicRefCell::new(value),
        })
    }

    /// Returns the component's type name.
    #[inline]
    pub fn name(&self) -> ComponentName {
        self.name
    }

    /// Returns the id of the owning entity.
    #[inline]
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Returns `true` if the stored value is a `T`.
    pub fn is<T: Component>(&self) -> bool {
        // Deref past the box: `Box<dyn Component>` is itself `Any`, and the
        // blanket `AsAny` impl would otherwise capture the box, not the value.
        (**self.value.borrow()).as_any().is::<T>()
    }

    /// Borrows the value as a `T`.
    ///
    /// ## Panics
    /// Panics if the stored value is not a `T`, or if an exclusive borrow is
    /// active (an undeclared concurrent write).
    pub fn read<T: Component>(&self) -> AtomicRef<'_, T> {
        AtomicRef::map(self.value.borrow(), |value| {
            (**value)
                .as_any()
                .downcast_ref::<T>()
                .expect("component type mismatch")
        })
    }

    /// Exclusively borrows the value as a `T`.
    ///
    /// Callers must hold `READ_WRITE` access to this component's type; the
    /// scheduler guarantees no other body touches it concurrently.
    ///
    /// ## Panics
    /// Panics if the stored value is not a `T`, or if any other borrow is
    /// active.
    pub fn write<T: Component>(&self) -> AtomicRefMut<'_, T> {
        AtomicRefMut::map(self.value.borrow_mut(), |value| {
            (**value)
                .as_any_mut()
                .downcast_mut::<T>()
                .expect("component type mismatch")
        })
    }

    /// Delegates [`Component::pack`] to the stored value.
    pub fn pack(&self, archive: &mut dyn Archive) {
        self.value.borrow().pack(archive);
    }

    /// Delegates [`Component::unpack`] to the stored value.
    pub fn unpack(&self, archive: &mut dyn Archive) {
        self.value.borrow_mut().unpack(archive);
    }

    /// Delegates [`Component::convert`] to the stored value.
    pub fn convert(&self, archive: &mut dyn Archive) {
        self.value.borrow_mut().convert(archive);
    }

    /// Delegates [`Component::test`] to the stored value.
    pub fn test(&self) -> bool {
        self.value.borrow().test()
    }
}

impl std::fmt::Debug for ComponentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSlot")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Store-scoped mapping between Rust component types and symbolic names.
///
/// ## Purpose
/// Resolves the name of a component instance when the caller attaches by
/// value without naming it (`Store::add`, `ADD_COMP` with a null name).
///
/// ## Invariants
/// - Names are unique per store.
/// - A type is bound to at most one name.
#[derive(Default)]
pub struct ComponentNames {
    by_type: HashMap<TypeId, ComponentName>,
    taken: HashMap<ComponentName, TypeId>,
}

impl ComponentNames {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds component type `T` to `name`.
    ///
    /// Re-registering the same pair is a no-op; rebinding either side is an
    /// error.
    pub fn register<T: Component>(&mut self, name: ComponentName) -> Result<(), RegistryError> {
        let type_id = TypeId::of::<T>();

        if let Some(&bound_to) = self.by_type.get(&type_id) {
            if bound_to == name {
                return Ok(());
            }
            return Err(RegistryError::TypeRegistered {
                type_name: type_name::<T>(),
                bound_to,
            });
        }

        if self.taken.contains_key(name) {
            return Err(RegistryError::NameTaken { name });
        }

        self.by_type.insert(type_id, name);
        self.taken.insert(name, type_id);
        Ok(())
    }

    /// Returns the registered name for component type `T`, if any.
    pub fn name_of<T: Component>(&self) -> Option<ComponentName> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Resolves the name of a component instance from its concrete type.
    pub fn name_of_value(&self, component: &dyn Component) -> Option<ComponentName> {
        self.by_type.get(&component.as_any().type_id()).copied()
    }

    /// Returns `true` if `name` is bound.
    pub fn is_registered(&self, name: ComponentName) -> bool {
        self.taken.contains_key(name)
    }
}
