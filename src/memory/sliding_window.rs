//! Bounded, overwrite-on-wrap memory indexed by a monotonic logical index
//!
//! A [`SlidingWindowMemory`] keeps the most recent `capacity` values that were
//! appended to it. Every append receives the next logical index (`0, 1, 2, ...`)
//! and lands in slot `index % capacity`, overwriting whatever was there. The
//! retrievable range is therefore always the contiguous interval
//! `[min_valid_index(), last_index()]`:
//!
//! ```text
//! capacity = 4, after appending 10 20 30 40 50
//!
//!   slot:    0    1    2    3
//!   value:  50   20   30   40
//!   index:   4    1    2    3        valid = [1, 4]
//! ```
//!
//! Reading an index below the interval fails because the value was overwritten
//! (the reader is too slow); reading above it fails because the value has not
//! been produced yet. Indices are never clamped.
//!
//! Each instance carries its own lock, so one producer can append while any
//! number of readers copy values out from other threads.
//!
//! # Example
//!
//! ```
//! use stratum_live::memory::SlidingWindowMemory;
//!
//! let memory = SlidingWindowMemory::<f64>::new(4)?;
//! memory.append_batch(&[10.0, 20.0, 30.0, 40.0])?;
//! memory.append(50.0)?;
//!
//! assert_eq!(memory.get(1)?, 20.0);
//! assert_eq!(memory.get(4)?, 50.0);
//! assert!(memory.get(0).unwrap_err().is_overwritten());
//! # Ok::<(), stratum_live::TrackerError>(())
//! ```

use crate::error::{Result, TrackerError};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

/// A value that can be stored in a [`SlidingWindowMemory`]
///
/// Scalars have no shape. Vector rows report their length so that a memory
/// configured for rows of `n` values can reject anything else.
pub trait Element: Clone + Send {
    /// Length of a vector element, `None` for scalars
    fn shape(&self) -> Option<usize> {
        None
    }
}

impl Element for f64 {}
impl Element for f32 {}
impl Element for i32 {}
impl Element for i64 {}
impl Element for bool {}

impl<T: Clone + Send> Element for Vec<T> {
    fn shape(&self) -> Option<usize> {
        Some(self.len())
    }
}

#[derive(Debug)]
struct Ring<T> {
    slots: Vec<T>,
    /// Index of the most recent append, -1 while empty
    last_index: i64,
}

impl<T> Ring<T> {
    fn min_valid(&self) -> i64 {
        (self.last_index - self.slots.len() as i64 + 1).max(0)
    }

    fn check(&self, index: i64) -> Result<usize> {
        let min_valid = self.min_valid();
        if index < min_valid || index > self.last_index {
            return Err(TrackerError::OutOfRange {
                index,
                min_valid,
                max_valid: self.last_index,
            });
        }
        Ok(self.slot(index))
    }

    fn slot(&self, index: i64) -> usize {
        (index as u64 % self.slots.len() as u64) as usize
    }

    fn push(&mut self, value: T) -> i64 {
        self.last_index += 1;
        let slot = self.slot(self.last_index);
        self.slots[slot] = value;
        self.last_index
    }
}

/// Bounded sliding-window store, see the [module docs](self)
#[derive(Debug)]
pub struct SlidingWindowMemory<T> {
    inner: Mutex<Ring<T>>,
    capacity: usize,
    shape: Option<usize>,
}

impl<T: Element + Default + Copy> SlidingWindowMemory<T> {
    /// Create an empty memory holding up to `capacity` scalar values
    ///
    /// Only scalars have a default shape. Row memories are built with
    /// [`with_row_len`](SlidingWindowMemory::with_row_len) or
    /// [`with_fill`](SlidingWindowMemory::with_fill):
    ///
    /// ```compile_fail
    /// use stratum_live::memory::SlidingWindowMemory;
    ///
    /// let rows = SlidingWindowMemory::<Vec<f64>>::new(8);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_fill(capacity, T::default())
    }
}

impl SlidingWindowMemory<Vec<f64>> {
    /// Create an empty memory holding up to `capacity` rows of exactly
    /// `row_len` values each
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `capacity` or `row_len` is zero.
    pub fn with_row_len(capacity: usize, row_len: usize) -> Result<Self> {
        if row_len == 0 {
            return Err(TrackerError::ConfigurationError(
                "row length must be > 0".to_string(),
            ));
        }
        Self::with_fill(capacity, vec![0.0; row_len])
    }

    /// Configured row length
    pub fn row_len(&self) -> usize {
        self.shape.unwrap_or(0)
    }
}

impl<T: Element> SlidingWindowMemory<T> {
    /// Create an empty memory whose storage is initialised with `fill`
    ///
    /// The shape of `fill` becomes the required shape of every appended value.
    pub fn with_fill(capacity: usize, fill: T) -> Result<Self> {
        if capacity == 0 {
            return Err(TrackerError::ConfigurationError(
                "memory capacity must be > 0".to_string(),
            ));
        }

        let shape = fill.shape();
        Ok(Self {
            inner: Mutex::new(Ring {
                slots: vec![fill; capacity],
                last_index: -1,
            }),
            capacity,
            shape,
        })
    }

    fn check_shape(&self, value: &T) -> Result<()> {
        match (self.shape, value.shape()) {
            (Some(expected), Some(actual)) if expected != actual => {
                Err(TrackerError::SizeMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Append a value at index `last_index() + 1` and return that index
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if a vector row has the wrong length.
    pub fn append(&self, value: T) -> Result<i64> {
        self.check_shape(&value)?;
        Ok(self.inner.lock().push(value))
    }

    /// Append every value in order, as one locked operation
    ///
    /// Returns the index of the last appended value (or `last_index()` if the
    /// batch is empty).
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if the batch is longer than the capacity (it
    /// would overwrite itself) or any row has the wrong length. Nothing is
    /// appended on error.
    pub fn append_batch(&self, values: &[T]) -> Result<i64> {
        if values.len() > self.capacity {
            return Err(TrackerError::SizeMismatch {
                expected: self.capacity,
                actual: values.len(),
            });
        }
        for value in values {
            self.check_shape(value)?;
        }

        let mut ring = self.inner.lock();
        for value in values {
            ring.push(value.clone());
        }
        Ok(ring.last_index)
    }

    /// Copy out the value at `index`
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `index` was overwritten or not yet written.
    pub fn get(&self, index: i64) -> Result<T> {
        let ring = self.inner.lock();
        let slot = ring.check(index)?;
        Ok(ring.slots[slot].clone())
    }

    /// Copy out `len` consecutive values starting at `start`
    ///
    /// The copy spans the wrap boundary transparently.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if either end of the range is not retrievable.
    pub fn get_range(&self, start: i64, len: usize) -> Result<Vec<T>> {
        if len == 0 {
            return Ok(Vec::new());
        }

        let ring = self.inner.lock();
        ring.check(start)?;
        ring.check(start + len as i64 - 1)?;

        let first = ring.slot(start);
        let mut out = Vec::with_capacity(len);
        let head = (self.capacity - first).min(len);
        out.extend_from_slice(&ring.slots[first..first + head]);
        out.extend_from_slice(&ring.slots[..len - head]);
        Ok(out)
    }

    /// Borrow the value at `index` without copying
    ///
    /// The returned guard holds this memory's lock: appends from other threads
    /// block until it is dropped, so consume the value and drop the guard
    /// immediately. Calling any other method of the same memory on the same
    /// thread while the guard is alive deadlocks.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` under the same rule as [`get`](Self::get).
    pub fn get_ref(&self, index: i64) -> Result<MappedMutexGuard<'_, T>> {
        let ring = self.inner.lock();
        let slot = ring.check(index)?;
        Ok(MutexGuard::map(ring, |ring| &mut ring.slots[slot]))
    }

    /// Replace the value at an already written, still retrievable index
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` under the same rule as [`get`](Self::get), or
    /// `SizeMismatch` for a row of the wrong length.
    pub fn overwrite(&self, index: i64, value: T) -> Result<()> {
        self.check_shape(&value)?;
        let mut ring = self.inner.lock();
        let slot = ring.check(index)?;
        ring.slots[slot] = value;
        Ok(())
    }

    /// Index of the most recent append, -1 while empty
    pub fn last_index(&self) -> i64 {
        self.inner.lock().last_index
    }

    /// First retrievable index (0 until the memory has wrapped)
    pub fn min_valid_index(&self) -> i64 {
        self.inner.lock().min_valid()
    }

    /// Both ends of the retrievable range, read under one lock
    ///
    /// The range is empty (`min > max`) before the first append.
    pub fn valid_range(&self) -> (i64, i64) {
        let ring = self.inner.lock();
        (ring.min_valid(), ring.last_index)
    }

    /// Maximum number of values held before overwriting starts
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Element + Copy> SlidingWindowMemory<T> {
    /// Copy the value at `index` into `out` without allocating
    pub fn get_into(&self, index: i64, out: &mut T) -> Result<()> {
        let ring = self.inner.lock();
        let slot = ring.check(index)?;
        *out = ring.slots[slot];
        Ok(())
    }
}
