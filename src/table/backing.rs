//! Memory source for tracker bookkeeping.
//!
//! Tracker tables must never allocate through the allocator they observe, so
//! every byte they own comes from a [`BackingAlloc`]. The default,
//! [`SystemBacking`], calls `std::alloc::System` directly and therefore
//! bypasses any `#[global_allocator]`.

use std::alloc::{GlobalAlloc, Layout, System};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::llm_fatal;

/// Raw memory provider for tracker tables.
pub trait BackingAlloc: Send + Sync {
    /// Allocate a block. Returns null on failure.
    fn alloc(&self, layout: Layout) -> *mut u8;

    /// Release a block obtained from [`BackingAlloc::alloc`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `alloc` on this provider with the same `layout`,
    /// and must not be used afterwards.
    unsafe fn free(&self, ptr: *mut u8, layout: Layout);

    /// Whether this provider can serve requests at all. Tracking cannot be
    /// enabled on top of an unavailable provider.
    fn is_available(&self) -> bool {
        true
    }
}

/// Backing memory straight from the system allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBacking;

impl BackingAlloc for SystemBacking {
    fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: RawBuf never requests zero-sized layouts.
        unsafe { System.alloc(layout) }
    }

    unsafe fn free(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

/// Backing wrapper counting calls, used to check the table's hot path.
pub struct CountingBacking<B = SystemBacking> {
    inner: B,
    allocs: AtomicUsize,
    frees: AtomicUsize,
}

impl<B: BackingAlloc> CountingBacking<B> {
    /// Wrap a backing allocator.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    /// Number of `alloc` calls so far.
    pub fn allocs(&self) -> usize {
        self.allocs.load(Ordering::Relaxed)
    }

    /// Number of `free` calls so far.
    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::Relaxed)
    }
}

impl<B: BackingAlloc> BackingAlloc for CountingBacking<B> {
    fn alloc(&self, layout: Layout) -> *mut u8 {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        self.inner.alloc(layout)
    }

    unsafe fn free(&self, ptr: *mut u8, layout: Layout) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.inner.free(ptr, layout)
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

/// Fixed-length buffer of `Copy` values in backing memory.
///
/// Length is set at creation; growing means building a new buffer and
/// copying. A zero-length buffer owns no memory.
pub(crate) struct RawBuf<T: Copy> {
    ptr: NonNull<T>,
    len: usize,
    backing: Arc<dyn BackingAlloc>,
    _marker: PhantomData<T>,
}

impl<T: Copy> RawBuf<T> {
    /// Allocate `len` elements, each set to `fill`.
    pub fn filled(backing: Arc<dyn BackingAlloc>, len: usize, fill: T) -> Self {
        let ptr = if len == 0 || std::mem::size_of::<T>() == 0 {
            NonNull::dangling()
        } else {
            let layout = Self::layout(len);
            match NonNull::new(backing.alloc(layout).cast::<T>()) {
                Some(ptr) => ptr,
                None => llm_fatal!(LLM901, "requested {} bytes", layout.size()),
            }
        };
        for i in 0..len {
            // SAFETY: `i < len` and the block holds `len` elements.
            unsafe { ptr.as_ptr().add(i).write(fill) };
        }
        Self {
            ptr,
            len,
            backing,
            _marker: PhantomData,
        }
    }

    fn layout(len: usize) -> Layout {
        match Layout::array::<T>(len) {
            Ok(layout) => layout,
            Err(_) => llm_fatal!(LLM901, "{} elements overflow a layout", len),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Bytes of backing memory held.
    pub fn bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// The backing allocator this buffer draws from.
    pub fn backing(&self) -> &Arc<dyn BackingAlloc> {
        &self.backing
    }

    /// Give up ownership of the elements without freeing them.
    pub fn into_raw(self) -> NonNull<T> {
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: `this` is not used again, only its Arc is released.
        drop(unsafe { std::ptr::read(&this.backing) });
        this.ptr
    }

    /// Take back ownership of elements released with [`RawBuf::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must come from `into_raw` on a buffer created with
    /// `backing`, and the elements must not be owned elsewhere.
    pub unsafe fn from_raw(backing: Arc<dyn BackingAlloc>, ptr: NonNull<T>, len: usize) -> Self {
        Self {
            ptr,
            len,
            backing,
            _marker: PhantomData,
        }
    }
}

impl<T: Copy> std::ops::Deref for RawBuf<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: `ptr` holds `len` initialized elements (or is dangling with len 0).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Copy> std::ops::DerefMut for RawBuf<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Copy> Drop for RawBuf<T> {
    fn drop(&mut self) {
        if self.len > 0 && std::mem::size_of::<T>() > 0 {
            // SAFETY: allocated in `filled` with the same layout.
            unsafe {
                self.backing
                    .free(self.ptr.as_ptr().cast::<u8>(), Self::layout(self.len))
            };
        }
    }
}

// SAFETY: RawBuf uniquely owns its elements, like Box<[T]>.
unsafe impl<T: Copy + Send> Send for RawBuf<T> {}
unsafe impl<T: Copy + Sync> Sync for RawBuf<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_buf_fill_and_free() {
        let backing = Arc::new(CountingBacking::new(SystemBacking));
        {
            let mut buf = RawBuf::filled(backing.clone(), 16, u32::MAX);
            assert_eq!(buf.len(), 16);
            assert_eq!(buf.bytes(), 64);
            assert!(buf.iter().all(|&v| v == u32::MAX));
            buf[3] = 7;
            assert_eq!(buf[3], 7);
        }
        assert_eq!(backing.allocs(), 1);
        assert_eq!(backing.frees(), 1);
    }

    #[test]
    fn test_empty_buf_owns_nothing() {
        let backing = Arc::new(CountingBacking::new(SystemBacking));
        let buf: RawBuf<u64> = RawBuf::filled(backing.clone(), 0, 0);
        assert!(buf.is_empty());
        drop(buf);
        assert_eq!(backing.allocs(), 0);
        assert_eq!(backing.frees(), 0);
    }

    struct FailingBacking;

    impl BackingAlloc for FailingBacking {
        fn alloc(&self, _layout: Layout) -> *mut u8 {
            std::ptr::null_mut()
        }

        unsafe fn free(&self, _ptr: *mut u8, _layout: Layout) {}
    }

    #[test]
    #[should_panic(expected = "LLM901")]
    fn test_backing_failure_is_fatal() {
        let _ = RawBuf::filled(Arc::new(FailingBacking), 4, 0u8);
    }
}
