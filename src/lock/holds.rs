use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
};

use crate::some_or;

use super::LockMode;

/// Identity of a lock mode type.
///
/// Requests share a hold bucket iff their modes have the same `ModeKind`. The
/// identity is the mode's `TypeId`; the type name is only kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct ModeKind {
    id: TypeId,
    name: &'static str,
}

impl ModeKind {
    pub fn of<M: LockMode>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: type_name::<M>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ModeKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModeKind {}

impl Hash for ModeKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Number of granted, not yet released units per mode kind.
///
/// A kind gets an explicit zero entry when its first request is enqueued and
/// the entry is never removed afterwards. Asking for a kind that was never
/// registered yields 0 as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldTable {
    counts: HashMap<ModeKind, usize>,
}

impl HoldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// holds of mode `M`
    pub fn get<M: LockMode>(&self) -> usize {
        self.count(ModeKind::of::<M>())
    }

    pub fn count(&self, kind: ModeKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// sum of holds over every kind
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_free(&self) -> bool {
        self.counts.values().all(|count| *count == 0)
    }

    /// registered kinds with their current count
    pub fn iter(&self) -> impl Iterator<Item = (ModeKind, usize)> + '_ {
        self.counts.iter().map(|(kind, count)| (*kind, *count))
    }

    pub(crate) fn register(&mut self, kind: ModeKind) {
        self.counts.entry(kind).or_insert(0);
    }

    pub(crate) fn acquire(&mut self, kind: ModeKind) -> usize {
        let count = self.counts.entry(kind).or_insert(0);
        *count += 1;
        *count
    }

    /// Panics if `kind` has no hold to give back. That is a broken caller
    /// invariant, never a runtime condition.
    pub(crate) fn release(&mut self, kind: ModeKind) -> usize {
        let count = some_or!(
            self.counts.get_mut(&kind),
            panic!("release of `{}` which was never registered", kind.name)
        );
        assert!(*count > 0, "release of `{}` without a hold", kind.name);

        *count -= 1;
        *count
    }
}
