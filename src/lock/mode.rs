use super::{HoldTable, LockMode};

/// Exclusive access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Mutex;

impl LockMode for Mutex {
    fn is_compatible(holds: &HoldTable) -> bool {
        holds.get::<Mutex>() == 0
    }
}

/// Shared access, excluded only by [`Write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Read;

impl LockMode for Read {
    fn is_compatible(holds: &HoldTable) -> bool {
        holds.get::<Write>() == 0
    }
}

/// Exclusive access with respect to [`Read`] and [`Write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Write;

impl LockMode for Write {
    fn is_compatible(holds: &HoldTable) -> bool {
        holds.get::<Read>() == 0 && holds.get::<Write>() == 0
    }
}

/// At most `N` holders at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Semaphore<const N: usize>;

impl<const N: usize> LockMode for Semaphore<N> {
    fn is_compatible(holds: &HoldTable) -> bool {
        holds.get::<Self>() < N
    }
}
