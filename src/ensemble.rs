//! Body store: one ordered list of bodies with "massive" and "small" index views.
//!
//! The views hold indices, not copies, so a body mutated through one view is seen through
//! the other. Sub-batches for the worker pool are carved out of an ensemble with
//! [`Ensemble::sub_batch`] and written back with [`Ensemble::absorb`].

use std::ops::Range;

use crate::body::Body;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ensemble {
    bodies: Vec<Body>,
    massive: Vec<usize>,
    small: Vec<usize>,
}

impl Ensemble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a body, classifying it by mass, and returns its index in the unified list.
    pub fn push(&mut self, body: Body) -> usize {
        let index = self.bodies.len();
        if body.is_massive() {
            self.massive.push(index);
        } else {
            self.small.push(index);
        }
        self.bodies.push(body);
        index
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.massive.clear();
        self.small.clear();
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    /// Unified indices of the massive bodies, in insertion order.
    pub fn massive_indices(&self) -> &[usize] {
        &self.massive
    }

    /// Unified indices of the small bodies, in insertion order.
    pub fn small_indices(&self) -> &[usize] {
        &self.small
    }

    pub fn small_len(&self) -> usize {
        self.small.len()
    }

    pub fn massive(&self) -> impl Iterator<Item = &Body> {
        self.massive.iter().map(|&i| &self.bodies[i])
    }

    pub fn small(&self) -> impl Iterator<Item = &Body> {
        self.small.iter().map(|&i| &self.bodies[i])
    }

    /// The `k`-th small body.
    pub fn small_body(&self, k: usize) -> Option<&Body> {
        self.small.get(k).map(|&i| &self.bodies[i])
    }

    pub fn small_body_mut(&mut self, k: usize) -> Option<&mut Body> {
        let index = *self.small.get(k)?;
        self.bodies.get_mut(index)
    }

    /// Builds an independent batch holding every massive body followed by the small bodies
    /// in `range` (indices into the small list).
    ///
    /// Gravity sums over the massive view first and the small view second, so the order of
    /// the unified list inside a batch does not affect the result.
    pub fn sub_batch(&self, range: Range<usize>) -> Ensemble {
        let mut batch = Ensemble::new();
        batch.bodies.reserve(self.massive.len() + range.len());
        for body in self.massive() {
            batch.push(*body);
        }
        for &i in &self.small[range] {
            batch.push(self.bodies[i]);
        }
        batch
    }

    /// Writes a finished batch back. Its small bodies land at `offset..`, and its massive
    /// bodies are copied too when `take_massive` is set.
    pub fn absorb(&mut self, batch: &Ensemble, offset: usize, take_massive: bool) {
        for (k, &local) in batch.small.iter().enumerate() {
            let index = self.small[offset + k];
            self.bodies[index] = batch.bodies[local];
        }
        if take_massive {
            for (k, &local) in batch.massive.iter().enumerate() {
                let index = self.massive[k];
                self.bodies[index] = batch.bodies[local];
            }
        }
    }
}
