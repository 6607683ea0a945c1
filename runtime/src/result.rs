/*!
Result Envelope - C-compatible tagged outcome of a boundary call

CRITICAL: `FfiResult` is read by foreign code that knows nothing about Rust
types. Its layout is fixed:

Memory Layout (64-bit):
- tag: 4 bytes (i32) at offset 0
- _padding: 4 bytes at offset 4
- payload union: 8 bytes at offset 8
  - data: *mut c_void         (SuccessHeap, null = no data)
  - inline_bits: usize        (SuccessInline, a value, never an address)
  - err: *mut FfiError        (Error)
  TOTAL: 16 bytes

`FfiError` is `{ message: *mut c_char at 0, code: i32 at 8 }`.

Inside Rust the outcome is the safe sum type `Outcome`; it is turned into
the raw layout only by `Outcome::into_ffi`, right where it crosses. Every
envelope handed out must be released exactly once with `free_result`.
*/

use crate::block::{ErasedBlock, OwnedBlock};
use crate::payload::OwnedStr;
use std::any::type_name;
use std::ffi::{CStr, c_char, c_void};
use std::fmt;
use std::mem::{MaybeUninit, size_of};
use std::ptr::{self, NonNull};

/// Discriminant stored in `FfiResult::tag`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTag {
    SuccessHeap = 0,
    Error = 1,
    SuccessInline = 2,
}

impl ResultTag {
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ResultTag::SuccessHeap),
            1 => Some(ResultTag::Error),
            2 => Some(ResultTag::SuccessInline),
            _ => None,
        }
    }
}

/// Error record referenced by an Error envelope - C layout
#[repr(C)]
#[derive(Debug)]
pub struct FfiError {
    pub message: *mut c_char,
    pub code: i32,
}

/// Payload union - every member lives at offset 0
#[repr(C)]
#[derive(Copy, Clone)]
pub union ResultPayload {
    pub data: *mut c_void,
    pub inline_bits: usize,
    pub err: *mut FfiError,
}

impl fmt::Debug for ResultPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<union>")
    }
}

/// Envelope as it crosses the boundary
///
/// The tag is stored raw so that a corrupted or unknown tag coming back from
/// foreign code is never materialised as an invalid Rust enum.
#[repr(C)]
#[derive(Debug)]
pub struct FfiResult {
    pub tag: i32,
    pub payload: ResultPayload,
}

/// Values that may be stored directly in the payload slot
///
/// # Safety
/// Implementors must be plain data without padding bytes, so that copying
/// their bytes into a `usize` yields fully initialised bits.
pub unsafe trait InlineValue: Copy {}

macro_rules! inline_value {
    ($($ty:ty),* $(,)?) => {
        $(unsafe impl InlineValue for $ty {})*
    };
}

inline_value!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, (),
);

unsafe impl<T> InlineValue for *const T {}
unsafe impl<T> InlineValue for *mut T {}

/// Bit pattern of a value stored in place of a pointer
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct InlineBits(usize);

impl InlineBits {
    /// Encode `value` into a pointer-sized slot.
    ///
    /// Panics if `T` is wider than a pointer: an inline payload is never
    /// freed, so silently moving it to the heap would leak or be misread.
    pub fn encode<T: InlineValue>(value: T) -> Self {
        assert!(
            size_of::<T>() <= size_of::<usize>(),
            "inline_success: {} is {} bytes, wider than the {}-byte payload slot",
            type_name::<T>(),
            size_of::<T>(),
            size_of::<usize>(),
        );
        let mut bits = 0usize;
        unsafe {
            ptr::copy_nonoverlapping(
                (&raw const value).cast::<u8>(),
                (&raw mut bits).cast::<u8>(),
                size_of::<T>(),
            );
        }
        Self(bits)
    }

    /// Decode the stored value.
    ///
    /// # Safety
    /// The bits must have been produced by `encode::<T>` (or be a valid `T`
    /// written by foreign code at the low addresses of the slot).
    pub unsafe fn decode<T: InlineValue>(self) -> T {
        assert!(
            size_of::<T>() <= size_of::<usize>(),
            "InlineBits::decode: {} does not fit the payload slot",
            type_name::<T>(),
        );
        let mut out = MaybeUninit::<T>::uninit();
        unsafe {
            ptr::copy_nonoverlapping(
                (&raw const self.0).cast::<u8>(),
                out.as_mut_ptr().cast::<u8>(),
                size_of::<T>(),
            );
            out.assume_init()
        }
    }

    pub const fn from_raw(bits: usize) -> Self {
        Self(bits)
    }

    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for InlineBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InlineBits({:#x})", self.0)
    }
}

/// Owned native failure: message plus integer code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    message: OwnedStr,
    code: i32,
}

impl ErrorRecord {
    /// Interior NUL bytes in `message` are dropped.
    pub fn new(message: &str, code: i32) -> Self {
        Self {
            message: OwnedStr::new(message),
            code,
        }
    }

    pub fn message(&self) -> &CStr {
        self.message.as_c_str().unwrap_or_default()
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

/// Domain errors that know their boundary error code
pub trait BoundaryError: fmt::Display {
    fn code(&self) -> i32;
}

/// Outcome of an operation before it crosses the boundary
#[derive(Debug)]
pub enum Outcome {
    /// Heap-owned success payload; `None` is a void success
    SuccessHeap(Option<ErasedBlock>),
    /// Success value encoded in the payload slot itself
    SuccessInline(InlineBits),
    Error(ErrorRecord),
}

impl Outcome {
    /// Move `value` into a new owned block
    pub fn success<T>(value: T) -> Self {
        Self::success_from_block(OwnedBlock::new(value))
    }

    /// Wrap a payload that was already built in owned memory, without copying
    pub fn success_from_block<T>(block: OwnedBlock<T>) -> Self {
        Outcome::SuccessHeap(Some(block.erase()))
    }

    /// Wrap a raw owned pointer without copying. Null yields a void success.
    ///
    /// # Safety
    /// A non-null `ptr` must come from `OwnedBlock::<T>::into_raw` and must
    /// not be used or released by anything else afterwards.
    pub unsafe fn success_from_owned_ptr<T>(ptr: *mut T) -> Self {
        Outcome::SuccessHeap(unsafe { ErasedBlock::from_raw(ptr.cast()) })
    }

    /// Store `value` in the payload slot. No allocation takes place.
    ///
    /// Panics if `T` is wider than a pointer.
    pub fn inline_success<T: InlineValue>(value: T) -> Self {
        Outcome::SuccessInline(InlineBits::encode(value))
    }

    /// Success without data - nothing to free
    pub const fn void_success() -> Self {
        Outcome::SuccessHeap(None)
    }

    pub fn error(message: &str, code: i32) -> Self {
        Outcome::Error(ErrorRecord::new(message, code))
    }

    /// Heap success for `Ok`, error envelope for `Err`
    pub fn from_result<T, E: BoundaryError>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(err) => Self::error(&err.to_string(), err.code()),
        }
    }

    pub fn tag(&self) -> ResultTag {
        match self {
            Outcome::SuccessHeap(_) => ResultTag::SuccessHeap,
            Outcome::SuccessInline(_) => ResultTag::SuccessInline,
            Outcome::Error(_) => ResultTag::Error,
        }
    }

    /// Lower into the boundary layout, handing ownership to the envelope
    pub fn into_ffi(self) -> FfiResult {
        let tag = self.tag() as i32;
        let payload = match self {
            Outcome::SuccessHeap(block) => ResultPayload {
                data: block.map_or(ptr::null_mut(), ErasedBlock::into_raw),
            },
            Outcome::SuccessInline(bits) => ResultPayload {
                inline_bits: bits.raw(),
            },
            Outcome::Error(record) => {
                let err = Box::new(FfiError {
                    message: record.message.into_raw(),
                    code: record.code,
                });
                ResultPayload {
                    err: Box::into_raw(err),
                }
            }
        };
        FfiResult { tag, payload }
    }
}

/// Borrowed, typed reading of a raw envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeView<'a> {
    Void,
    Heap(NonNull<c_void>),
    Inline(InlineBits),
    /// A null error record reads as `message: None, code: 0`
    Error {
        message: Option<&'a CStr>,
        code: i32,
    },
    Unknown(i32),
}

impl FfiResult {
    pub fn tag(&self) -> Option<ResultTag> {
        ResultTag::from_raw(self.tag)
    }

    /// Interpret the payload according to the tag.
    ///
    /// # Safety
    /// The envelope must come from `Outcome::into_ffi` (or follow the same
    /// layout rules) and must not have been released.
    pub unsafe fn view(&self) -> OutcomeView<'_> {
        match self.tag() {
            Some(ResultTag::SuccessHeap) => match NonNull::new(unsafe { self.payload.data }) {
                Some(data) => OutcomeView::Heap(data),
                None => OutcomeView::Void,
            },
            Some(ResultTag::SuccessInline) => {
                OutcomeView::Inline(InlineBits(unsafe { self.payload.inline_bits }))
            }
            Some(ResultTag::Error) => {
                let err = unsafe { self.payload.err };
                if err.is_null() {
                    return OutcomeView::Error {
                        message: None,
                        code: 0,
                    };
                }
                let record = unsafe { &*err };
                let message = if record.message.is_null() {
                    None
                } else {
                    Some(unsafe { CStr::from_ptr(record.message) })
                };
                OutcomeView::Error {
                    message,
                    code: record.code,
                }
            }
            None => OutcomeView::Unknown(self.tag),
        }
    }

    /// Free everything the envelope owns.
    ///
    /// Inline payloads are values and are never treated as addresses. Null
    /// pointers are tolerated at every level. Unknown tags free nothing.
    ///
    /// # Safety
    /// The envelope must come from `Outcome::into_ffi` and must not have been
    /// released before. It is consumed; its payload must not be used again.
    pub unsafe fn release(self) {
        match self.tag() {
            Some(ResultTag::SuccessInline) | None => {}
            Some(ResultTag::Error) => unsafe { release_error(self.payload.err) },
            Some(ResultTag::SuccessHeap) => {
                // Dropping the block releases nested allocations, then the block.
                drop(unsafe { ErasedBlock::from_raw(self.payload.data) });
            }
        }
    }
}

/// Message buffer first, then the record itself
unsafe fn release_error(err: *mut FfiError) {
    if err.is_null() {
        return;
    }
    let record = unsafe { Box::from_raw(err) };
    drop(unsafe { OwnedStr::from_raw(record.message) });
    drop(record);
}

/// Release an envelope returned by any boundary call
///
/// # Safety
/// `result` must be an envelope produced by this library, passed here
/// exactly once. It must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_result(result: FfiResult) {
    unsafe { result.release() }
}
