//! Keyed pseudo-random permutations, used to simulate the Controller's private shuffle.
//!
//! The permutation is generated by the key-scheduling loop of RC4: starting from the identity, each
//! position is swapped with a position derived from a running index, the current value and the
//! seed. The result is fully determined by `(len, seed)`, so a replay can regenerate the shuffle of
//! any turn in either navigation direction.

use serde::{Deserialize, Serialize};

use crate::Error;

/// A bijection on `[0, len)`, mapping each source position to its destination position.
///
/// The element originally at position `i` ends up at position `destinations[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permutation {
    destinations: Vec<usize>,
}

impl Permutation {
    /// Creates the permutation of `len` positions for the given seed.
    ///
    /// Negative seeds are normalized modulo `len`, so every integer seed yields a bijection.
    pub fn from_seed(len: usize, seed: i64) -> Self {
        let mut destinations: Vec<usize> = (0..len).collect();
        if len == 0 {
            return Self { destinations };
        }

        let modulus = len as i64;
        let seed = seed.rem_euclid(modulus);
        let mut j: i64 = 0;
        for i in 0..len {
            j = (j + destinations[i] as i64 + seed).rem_euclid(modulus);
            destinations.swap(i, j as usize);
        }
        Self { destinations }
    }

    /// The identity permutation on `len` positions.
    pub fn identity(len: usize) -> Self {
        Self {
            destinations: (0..len).collect(),
        }
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    /// Returns `true` if the permutation has no positions.
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// The destination of every source position.
    pub fn destinations(&self) -> &[usize] {
        &self.destinations
    }

    /// Returns `true` if the given position is not a fixed point of the permutation.
    pub fn moves(&self, position: usize) -> bool {
        self.destinations
            .get(position)
            .map_or(false, |&destination| destination != position)
    }

    /// Moves every element of `list` to its destination: `permuted[P[i]] = list[i]`.
    pub fn apply<T: Clone>(&self, list: &[T]) -> Result<Vec<T>, Error> {
        self.check_len(list.len())?;
        let mut permuted = list.to_vec();
        for (source, &destination) in self.destinations.iter().enumerate() {
            permuted[destination] = list[source].clone();
        }
        Ok(permuted)
    }

    /// Restores the original order of a permuted list: `list[i] = permuted[P[i]]`.
    ///
    /// This is the exact left inverse of [`Permutation::apply`].
    pub fn invert<T: Clone>(&self, permuted: &[T]) -> Result<Vec<T>, Error> {
        self.check_len(permuted.len())?;
        Ok(self
            .destinations
            .iter()
            .map(|&destination| permuted[destination].clone())
            .collect())
    }

    fn check_len(&self, got: usize) -> Result<(), Error> {
        if got == self.destinations.len() {
            Ok(())
        } else {
            Err(Error::SizeMismatch {
                expected: self.destinations.len(),
                got,
            })
        }
    }
}
