//! Front/back buffer pool used for allocation-free snapshot publication.
//!
//! The front buffer is the most recently completed frame and may be shared
//! with any number of readers through snapshots. Writes always go to a spare
//! buffer that nobody else references, and the finished spare is swapped to
//! the front by reference. A buffer that a reader still holds is never handed
//! out for writing, so a published frame can not change under a reader.
//!
//! With one reader holding the previous frame (the usual engine hand-off) the
//! pool settles at three buffers and stops allocating.

use std::sync::Arc;

/// Maximum number of spare buffers retained after a swap.
const MAX_SPARES: usize = 3;

/// Shared, immutable frame handed to readers.
pub type SharedBuffer<T> = Arc<Vec<T>>;

/// Double-buffered storage with a small spare pool.
#[derive(Debug)]
pub struct SwapBuffers<T> {
    front: SharedBuffer<T>,
    spares: Vec<SharedBuffer<T>>,
    len: usize,
    allocations: u64,
}

impl<T: Clone + Default> SwapBuffers<T> {
    /// Create a buffer pair of `len` default-initialized elements each.
    pub fn new(len: usize) -> Self {
        Self {
            front: Arc::new(vec![T::default(); len]),
            spares: vec![Arc::new(vec![T::default(); len])],
            len,
            allocations: 2,
        }
    }

    /// Length of every buffer in the pool.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffers hold no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The most recently completed frame.
    pub fn front(&self) -> &SharedBuffer<T> {
        &self.front
    }

    /// Total number of buffers ever allocated by this pool.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Fill a back buffer with `fill` and, if it succeeds, make it the front.
    ///
    /// On error the back buffer is returned to the pool and the front is left
    /// untouched, so a failed pass is never visible.
    pub fn write_and_swap<E, F>(&mut self, fill: F) -> Result<(), E>
    where
        F: FnOnce(&mut [T]) -> Result<(), E>,
    {
        let mut back = self.acquire_back();
        // `back` is unshared here, so make_mut never clones.
        let result = fill(Arc::make_mut(&mut back).as_mut_slice());
        match result {
            Ok(()) => {
                let old_front = std::mem::replace(&mut self.front, back);
                self.retire(old_front);
                Ok(())
            }
            Err(e) => {
                self.retire(back);
                Err(e)
            }
        }
    }

    fn acquire_back(&mut self) -> SharedBuffer<T> {
        if let Some(i) = self
            .spares
            .iter_mut()
            .position(|b| Arc::get_mut(b).is_some())
        {
            return self.spares.swap_remove(i);
        }
        self.allocations += 1;
        tracing::trace!(allocations = self.allocations, "all spare buffers are shared; allocating");
        Arc::new(vec![T::default(); self.len])
    }

    fn retire(&mut self, buffer: SharedBuffer<T>) {
        self.spares.push(buffer);
        if self.spares.len() > MAX_SPARES {
            // Prefer dropping a buffer a reader still holds; it is freed when
            // the reader lets go.
            let idx = self
                .spares
                .iter()
                .position(|b| Arc::strong_count(b) > 1)
                .unwrap_or(0);
            self.spares.remove(idx);
        }
    }
}
