/*!
Owned Blocks - boundary-owned heap storage with a type-erased release

A success payload crosses the boundary as a bare pointer, and `free_result`
only ever sees that pointer. To release it without knowing the payload type,
every block carries a small header placed immediately before the value:

```text
base                        value (pointer handed to foreign code)
 |                           |
 v                           v
 [ padding | Header{release} ][ T ............ ]
```

The header holds a monomorphised `release` function that drops the `T` in
place (freeing any nested owned allocations through `T`'s `Drop`) and then
deallocates the whole block. Foreign callers read `T` at offset 0 of the
pointer they receive and never see the header.

One block is exactly one allocation and one deallocation.

C string buffers handed to foreign code (error messages, transferred log
lines, list entries) use the same idea with a length header instead of a
release function:

```text
base                  text (char* handed to foreign code)
 |                     |
 v                     v
 [ len: usize ][ bytes ... NUL ]
```

The receiver owns the bytes and may write to them, including moving the
NUL. The release size comes from the header, never from `strlen`.
*/

use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::ffi::{c_char, c_void};
use std::fmt;
use std::marker::PhantomData;
use std::mem::{ManuallyDrop, align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

#[repr(C)]
#[derive(Clone, Copy)]
struct Header {
    release: unsafe fn(NonNull<u8>),
}

/// Layout of the whole block and the offset of the value inside it
fn block_layout<T>() -> (Layout, usize) {
    let (layout, offset) = Layout::new::<Header>()
        .extend(Layout::new::<T>())
        .expect("owned block: payload layout overflows");
    (layout.pad_to_align(), offset)
}

/// # Safety
/// `value` must point at a live `T` inside a block created by `OwnedBlock::<T>::new`.
unsafe fn release_block<T>(value: NonNull<u8>) {
    let (layout, offset) = block_layout::<T>();
    unsafe {
        ptr::drop_in_place(value.as_ptr().cast::<T>());
        dealloc(value.as_ptr().sub(offset), layout);
    }
}

/// # Safety
/// `value` must be the value pointer of a live block.
unsafe fn header_of(value: NonNull<u8>) -> *const Header {
    unsafe { value.as_ptr().sub(size_of::<Header>()).cast::<Header>() }
}

/// Heap block owning a `T`, releasable later without knowing `T`
pub struct OwnedBlock<T> {
    value: NonNull<T>,
    _owns: PhantomData<T>,
}

impl<T> OwnedBlock<T> {
    /// Allocate a block and move `value` into it.
    /// Aborts through `handle_alloc_error` when the allocator fails.
    pub fn new(value: T) -> Self {
        let (layout, offset) = block_layout::<T>();

        // SAFETY: the layout is never zero-sized since it contains the header.
        let base = unsafe { alloc(layout) };
        if base.is_null() {
            handle_alloc_error(layout);
        }

        // SAFETY: `offset` is inside the allocation and aligned for `T`; the
        // header slot right before it is aligned because `offset` is a multiple
        // of both alignments and at least `size_of::<Header>()`.
        unsafe {
            let value_ptr = base.add(offset);
            value_ptr
                .sub(size_of::<Header>())
                .cast::<Header>()
                .write(Header {
                    release: release_block::<T>,
                });
            value_ptr.cast::<T>().write(value);
            Self {
                value: NonNull::new_unchecked(value_ptr.cast::<T>()),
                _owns: PhantomData,
            }
        }
    }

    /// Give up ownership, returning the pointer to the value
    pub fn into_raw(self) -> *mut T {
        let block = ManuallyDrop::new(self);
        block.value.as_ptr()
    }

    /// Reclaim a block previously leaked with `into_raw`
    ///
    /// # Safety
    /// `ptr` must come from `OwnedBlock::<T>::into_raw` and not have been
    /// reclaimed or released since.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        assert!(!ptr.is_null(), "OwnedBlock::from_raw: null pointer");
        Self {
            // SAFETY: checked non-null above.
            value: unsafe { NonNull::new_unchecked(ptr) },
            _owns: PhantomData,
        }
    }

    /// Forget the payload type, keeping ownership
    pub fn erase(self) -> ErasedBlock {
        ErasedBlock {
            value: ManuallyDrop::new(self).value.cast(),
        }
    }
}

impl<T> Deref for OwnedBlock<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the block owns a live `T` until dropped.
        unsafe { self.value.as_ref() }
    }
}

impl<T> DerefMut for OwnedBlock<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: unique ownership of the block.
        unsafe { self.value.as_mut() }
    }
}

impl<T> Drop for OwnedBlock<T> {
    fn drop(&mut self) {
        unsafe { release_block::<T>(self.value.cast()) }
    }
}

impl<T: fmt::Debug> fmt::Debug for OwnedBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedBlock").field(&**self).finish()
    }
}

// SAFETY: the block uniquely owns its `T`, like `Box<T>`.
unsafe impl<T: Send> Send for OwnedBlock<T> {}
unsafe impl<T: Sync> Sync for OwnedBlock<T> {}

/// Owned block whose payload type has been erased
pub struct ErasedBlock {
    value: NonNull<u8>,
}

impl ErasedBlock {
    pub fn as_ptr(&self) -> *mut c_void {
        self.value.as_ptr().cast()
    }

    /// Give up ownership, returning the pointer that crosses the boundary
    pub fn into_raw(self) -> *mut c_void {
        ManuallyDrop::new(self).as_ptr()
    }

    /// Reclaim a pointer produced by `into_raw` (or `OwnedBlock::into_raw`).
    /// Returns `None` for null.
    ///
    /// # Safety
    /// A non-null `ptr` must be the value pointer of a live owned block that
    /// nothing else will release.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr.cast::<u8>()).map(|value| Self { value })
    }
}

impl Drop for ErasedBlock {
    fn drop(&mut self) {
        unsafe {
            let release = (*header_of(self.value)).release;
            release(self.value);
        }
    }
}

impl fmt::Debug for ErasedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErasedBlock({:?})", self.value)
    }
}

const C_BUFFER_HEADER: usize = size_of::<usize>();

fn c_buffer_layout(len: usize) -> Layout {
    C_BUFFER_HEADER
        .checked_add(len)
        .and_then(|size| size.checked_add(1))
        .and_then(|size| Layout::from_size_align(size, align_of::<usize>()).ok())
        .expect("c buffer: length overflows")
}

/// Copy `bytes` into a new NUL-terminated buffer, dropping interior NUL
/// bytes. The buffer must be released with `free_c_buffer`.
pub fn alloc_c_buffer(bytes: &[u8]) -> NonNull<c_char> {
    let len = bytes.iter().filter(|&&b| b != 0).count();
    let layout = c_buffer_layout(len);

    // SAFETY: the layout always has room for the header.
    let base = unsafe { alloc(layout) };
    if base.is_null() {
        handle_alloc_error(layout);
    }

    // SAFETY: `base` is aligned for `usize` and the allocation holds the
    // header, `len` text bytes, and the terminator.
    unsafe {
        base.cast::<usize>().write(len);
        let text = base.add(C_BUFFER_HEADER);
        if len == bytes.len() {
            ptr::copy_nonoverlapping(bytes.as_ptr(), text, len);
        } else {
            for (i, &b) in bytes.iter().filter(|&&b| b != 0).enumerate() {
                text.add(i).write(b);
            }
        }
        text.add(len).write(0);
        NonNull::new_unchecked(text.cast::<c_char>())
    }
}

/// Release a buffer from `alloc_c_buffer`. Null is ignored. The contents
/// are not inspected, so a receiver that wrote into the buffer is fine.
///
/// # Safety
/// A non-null `text` must come from `alloc_c_buffer` and not have been
/// released before.
pub unsafe fn free_c_buffer(text: *mut c_char) {
    if text.is_null() {
        return;
    }
    unsafe {
        let base = text.cast::<u8>().sub(C_BUFFER_HEADER);
        let len = base.cast::<usize>().read();
        dealloc(base, c_buffer_layout(len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_value_is_readable_through_raw_pointer() {
        let block = OwnedBlock::new([7u64, 8, 9]);
        let raw = block.into_raw();
        unsafe {
            assert_eq!(*raw, [7, 8, 9]);
            drop(OwnedBlock::from_raw(raw));
        }
    }

    #[test]
    fn test_erased_release_runs_payload_drop() {
        let drops = Arc::new(AtomicUsize::new(0));
        let erased = OwnedBlock::new(DropCounter(drops.clone())).erase();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        let raw = erased.into_raw();
        let reclaimed = unsafe { ErasedBlock::from_raw(raw) }.expect("non-null");
        drop(reclaimed);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_over_aligned_payload() {
        #[repr(align(64))]
        struct Wide([u8; 3]);

        let block = OwnedBlock::new(Wide([1, 2, 3]));
        let raw = block.into_raw();
        assert_eq!(raw as usize % 64, 0);
        unsafe {
            assert_eq!((*raw).0, [1, 2, 3]);
            drop(ErasedBlock::from_raw(raw.cast()));
        }
    }

    #[test]
    fn test_zero_sized_payload() {
        let erased = OwnedBlock::new(()).erase();
        assert!(!erased.as_ptr().is_null());
    }

    #[test]
    fn test_null_reclaims_nothing() {
        assert!(unsafe { ErasedBlock::from_raw(ptr::null_mut()) }.is_none());
    }

    #[test]
    fn test_deref_mut() {
        let mut block = OwnedBlock::new(String::from("owned"));
        block.push_str(" block");
        assert_eq!(&*block, "owned block");
    }

    #[test]
    fn test_c_buffer_strips_nul_and_terminates() {
        let text = alloc_c_buffer(b"a\0b");
        unsafe {
            assert_eq!(std::ffi::CStr::from_ptr(text.as_ptr()).to_bytes_with_nul(), b"ab\0");
            free_c_buffer(text.as_ptr());
        }
    }

    #[test]
    fn test_c_buffer_release_ignores_contents() {
        let text = alloc_c_buffer(b"permission denied");
        unsafe {
            // The receiver truncates in place; the header still has the size.
            text.as_ptr().add(3).write(0);
            let len = text.as_ptr().cast::<u8>().sub(C_BUFFER_HEADER).cast::<usize>().read();
            assert_eq!(len, "permission denied".len());
            free_c_buffer(text.as_ptr());
            free_c_buffer(ptr::null_mut());
        }
    }
}
