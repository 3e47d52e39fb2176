// -------------------------------------------------------------------
// Versioned
// -------------------------------------------------------------------

/// A value with a revision counter that advances on every tracked
/// mutation.
///
/// Engine-owned transient state (positions, pins, bound link handles)
/// is written through [`Versioned::get_untracked_mut`] so that only
/// persisted changes advance the revision.
#[derive(Debug, Clone, Default)]
pub struct Versioned<T> {
    version: u64,
    data: T,
}

impl<T> Versioned<T> {
    pub fn new(data: T) -> Self {
        Self { version: 0, data }
    }

    pub fn get(&self) -> &T {
        &self.data
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.version = self.version.wrapping_add(1);
        &mut self.data
    }

    /// Mutable access that leaves the revision untouched.
    pub fn get_untracked_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn set(&mut self, data: T) {
        self.data = data;
        self.version = self.version.wrapping_add(1);
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
