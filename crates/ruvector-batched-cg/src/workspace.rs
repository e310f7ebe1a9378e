//! Grow-only scratch space for operator outputs.
//!
//! [`Workspace`] keeps one backing buffer per session. A request larger than
//! anything seen before grows the buffer to the new high-water mark; smaller
//! requests reuse it without touching the allocator. The buffer never
//! shrinks while the session lives and is freed when the session drops.

use tracing::debug;

use crate::element::Element;

/// Grow-only scratch buffer.
///
/// # Example
///
/// ```
/// use ruvector_batched_cg::workspace::Workspace;
///
/// let mut ws = Workspace::<f64>::new();
/// let (a, b) = ws.split_pair(128);
/// assert_eq!((a.len(), b.len()), (128, 128));
/// assert_eq!(ws.high_water_mark(), 256);
///
/// ws.split_pair(16);
/// assert_eq!(ws.high_water_mark(), 256);
/// assert_eq!(ws.grow_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Workspace<T> {
    buf: Vec<T>,
    grow_count: usize,
}

impl<T: Element> Workspace<T> {
    /// Empty workspace; nothing is allocated until the first request.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            grow_count: 0,
        }
    }

    /// Workspace pre-sized to `len` elements.
    pub fn with_capacity(len: usize) -> Self {
        let mut ws = Self::new();
        ws.reserve(len);
        ws
    }

    /// Make sure at least `len` elements are available.
    ///
    /// Grows the buffer to exactly `len` when it is smaller; never shrinks.
    pub fn reserve(&mut self, len: usize) {
        if len > self.buf.len() {
            debug!(
                from = self.buf.len(),
                to = len,
                bytes = len * std::mem::size_of::<T>(),
                "workspace grow"
            );
            self.buf.resize(len, T::zero());
            self.grow_count += 1;
        }
    }

    /// A zeroed scratch slice of `len` elements.
    pub fn slice(&mut self, len: usize) -> &mut [T] {
        self.reserve(len);
        let out = &mut self.buf[..len];
        out.fill(T::zero());
        out
    }

    /// Two disjoint zeroed scratch slices of `len` elements each.
    ///
    /// # Panics
    ///
    /// Panics if `2 * len` overflows `usize`.
    pub fn split_pair(&mut self, len: usize) -> (&mut [T], &mut [T]) {
        let total = len
            .checked_mul(2)
            .unwrap_or_else(|| panic!("Workspace::split_pair: 2 * {len} overflowed usize"));
        self.slice(total).split_at_mut(len)
    }

    /// Largest number of elements ever requested at once.
    pub fn high_water_mark(&self) -> usize {
        self.buf.len()
    }

    /// Allocated capacity in elements (at least the high-water mark).
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// How many times the buffer had to grow.
    pub fn grow_count(&self) -> usize {
        self.grow_count
    }

    /// Size of the backing buffer in bytes.
    pub fn bytes(&self) -> usize {
        self.buf.len() * std::mem::size_of::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_only_on_new_high_water_mark() {
        let mut ws = Workspace::<f32>::new();
        assert_eq!(ws.high_water_mark(), 0);

        ws.reserve(100);
        ws.reserve(50);
        ws.reserve(100);
        assert_eq!(ws.high_water_mark(), 100);
        assert_eq!(ws.grow_count(), 1);

        ws.reserve(101);
        assert_eq!(ws.high_water_mark(), 101);
        assert_eq!(ws.grow_count(), 2);
        assert!(ws.capacity() >= 101);
    }

    #[test]
    fn slices_are_zeroed_on_reuse() {
        let mut ws = Workspace::<f64>::new();
        ws.slice(4).fill(7.0);
        assert_eq!(ws.slice(4), &[0.0; 4]);
    }

    #[test]
    fn pair_is_disjoint() {
        let mut ws = Workspace::<f64>::with_capacity(10);
        let (a, b) = ws.split_pair(3);
        a.fill(1.0);
        b.fill(2.0);
        assert_eq!(a, &[1.0; 3]);
        assert_eq!(b, &[2.0; 3]);
        assert_eq!(ws.high_water_mark(), 10);
        assert_eq!(ws.bytes(), 80);
    }

    #[test]
    #[should_panic(expected = "overflowed usize")]
    fn pair_length_overflow_panics() {
        let mut ws = Workspace::<f32>::new();
        let _ = ws.split_pair(usize::MAX / 2 + 1);
    }
}
