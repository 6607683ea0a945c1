/*!
Payload Building Blocks - C-compatible values that own nested allocations

Domain operations often return payloads that themselves own memory, such as
a list of file entries where every entry owns its path string. These types
have a fixed `#[repr(C)]` layout foreign code can read, and a `Drop` that
frees the nested allocations, so wrapping them in an owned block gives
`free_result` the recursive release for free.

Memory Layout (64-bit):
- `OwnedStr`: 8 bytes, a nullable `char*`
- `OwnedArray<T>`: `items` pointer at offset 0, `count` (i32) at offset 8
*/

use crate::block::{alloc_c_buffer, free_c_buffer};
use std::ffi::{CStr, c_char};
use std::fmt;
use std::ptr;

/// Nullable owned UTF-8 C string
///
/// Interior NUL bytes are dropped on construction. The buffer is released
/// by its length header, so foreign code may write into it.
#[repr(transparent)]
pub struct OwnedStr(*mut c_char);

impl OwnedStr {
    pub fn new(text: &str) -> Self {
        Self(alloc_c_buffer(text.as_bytes()).as_ptr())
    }

    pub const fn null() -> Self {
        Self(ptr::null_mut())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.0
    }

    pub fn as_c_str(&self) -> Option<&CStr> {
        if self.0.is_null() {
            None
        } else {
            // SAFETY: non-null pointers always come from `alloc_c_buffer`.
            Some(unsafe { CStr::from_ptr(self.0) })
        }
    }

    /// Hand the buffer to foreign code
    pub fn into_raw(self) -> *mut c_char {
        std::mem::ManuallyDrop::new(self).0
    }

    /// # Safety
    /// `ptr` must be null or come from `OwnedStr::into_raw` and not be owned
    /// by anything else.
    pub unsafe fn from_raw(ptr: *mut c_char) -> Self {
        Self(ptr)
    }
}

impl Drop for OwnedStr {
    fn drop(&mut self) {
        unsafe { free_c_buffer(self.0) }
    }
}

impl Default for OwnedStr {
    fn default() -> Self {
        Self::null()
    }
}

impl Clone for OwnedStr {
    fn clone(&self) -> Self {
        match self.as_c_str() {
            Some(text) => Self(alloc_c_buffer(text.to_bytes()).as_ptr()),
            None => Self::null(),
        }
    }
}

impl PartialEq for OwnedStr {
    fn eq(&self, other: &Self) -> bool {
        self.as_c_str() == other.as_c_str()
    }
}

impl Eq for OwnedStr {}

impl From<&str> for OwnedStr {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Debug for OwnedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_c_str() {
            Some(s) => write!(f, "OwnedStr({s:?})"),
            None => write!(f, "OwnedStr(null)"),
        }
    }
}

// SAFETY: the string buffer is uniquely owned.
unsafe impl Send for OwnedStr {}
unsafe impl Sync for OwnedStr {}

/// Owned array with a C-compatible `{ items, count }` header.
/// An empty array has null `items`.
#[repr(C)]
pub struct OwnedArray<T> {
    items: *mut T,
    count: i32,
}

impl<T> OwnedArray<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            return Self::default();
        }
        let count = i32::try_from(items.len()).expect("OwnedArray: more than i32::MAX items");
        let slice = Box::into_raw(items.into_boxed_slice());
        Self {
            items: slice.cast::<T>(),
            count,
        }
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_null() || self.count == 0
    }

    pub fn as_slice(&self) -> &[T] {
        if self.is_empty() {
            &[]
        } else {
            // SAFETY: `items` came from a boxed slice of exactly `count` elements.
            unsafe { std::slice::from_raw_parts(self.items, self.len()) }
        }
    }
}

impl<T> Drop for OwnedArray<T> {
    fn drop(&mut self) {
        if self.items.is_null() {
            return;
        }
        // Dropping the boxed slice drops every element, then frees the array.
        unsafe {
            let _ = Box::from_raw(ptr::slice_from_raw_parts_mut(self.items, self.len()));
        }
    }
}

impl<T> Default for OwnedArray<T> {
    fn default() -> Self {
        Self {
            items: ptr::null_mut(),
            count: 0,
        }
    }
}

impl<T> FromIterator<T> for OwnedArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug> fmt::Debug for OwnedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

// SAFETY: the element buffer is uniquely owned, like `Box<[T]>`.
unsafe impl<T: Send> Send for OwnedArray<T> {}
unsafe impl<T: Sync> Sync for OwnedArray<T> {}

/// List of owned strings, e.g. the paths of enumerated file entries
pub type StringList = OwnedArray<OwnedStr>;
