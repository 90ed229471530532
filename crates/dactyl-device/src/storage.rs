//! On-device print storage.
//!
//! An insertion-ordered table with at most one print per finger slot.
//! Listing returns the stored set in insertion order; enrolling a
//! finger that already has a slot replaces it in place.

use dactyl_core::{Error, Finger, Print, Result};

/// The enrolled-print table owned by a storage-capable device.
#[derive(Debug, Default)]
pub struct StorageTable {
    prints: Vec<Print>,
}

impl StorageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored prints.
    pub fn len(&self) -> usize {
        self.prints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prints.is_empty()
    }

    /// Store a print, replacing any print already in its finger slot.
    pub fn insert(&mut self, print: Print) {
        match self.slot_of(print.finger()) {
            Some(index) => self.prints[index] = print,
            None => self.prints.push(print),
        }
    }

    /// Stored prints in insertion order.
    pub fn list(&self) -> Vec<Print> {
        self.prints.clone()
    }

    /// Remove the stored print matching `print`.
    ///
    /// Matches by template content first, then by finger/username
    /// attribution, so a deserialized copy of a stored print deletes
    /// the original.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] when nothing matches.
    pub fn remove(&mut self, print: &Print) -> Result<Print> {
        let by_content = self.prints.iter().position(|stored| stored.equal(print));

        let index = by_content
            .or_else(|| {
                self.prints.iter().position(|stored| {
                    stored.finger() == print.finger() && stored.username() == print.username()
                })
            })
            .ok_or(Error::NotFound)?;

        Ok(self.prints.remove(index))
    }

    /// Empty the table. Clearing an already-empty table succeeds.
    pub fn clear(&mut self) {
        self.prints.clear();
    }

    fn slot_of(&self, finger: Finger) -> Option<usize> {
        self.prints.iter().position(|p| p.finger() == finger)
    }
}
