//! Exclusive ownership of one native handle.

use std::fmt;
use std::ptr::NonNull;

use crate::error::{PocketError, Result};

/// The three kinds of native resource the engine hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Model,
    VoiceState,
    Stream,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Model => "model",
            ResourceKind::VoiceState => "voice state",
            ResourceKind::Stream => "stream",
        })
    }
}

/// Owns at most one native pointer of type `T`.
///
/// Deliberately not `Clone`: the only way to get the pointer out for freeing
/// is [`NativeHandle::take`], which leaves the handle empty for good.
pub(crate) struct NativeHandle<T> {
    ptr: Option<NonNull<T>>,
    kind: ResourceKind,
}

// SAFETY: the pointer is never dereferenced on the Rust side. It is only passed
// back to the native engine, and every such call goes through the engine's call
// gate, so the engine never observes concurrent use of a handle.
unsafe impl<T> Send for NativeHandle<T> {}
unsafe impl<T> Sync for NativeHandle<T> {}

impl<T> NativeHandle<T> {
    /// Wrap a pointer returned by the engine; `None` for the null failure sentinel.
    pub(crate) fn from_raw(ptr: *mut T, kind: ResourceKind) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self {
            ptr: Some(ptr),
            kind,
        })
    }

    /// The live pointer, or [`PocketError::ResourceNotLive`] once released.
    #[inline]
    pub(crate) fn live(&self) -> Result<NonNull<T>> {
        self.ptr.ok_or(PocketError::ResourceNotLive(self.kind))
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.ptr.is_some()
    }

    /// Empty the handle, returning the pointer if it was still live.
    #[inline]
    pub(crate) fn take(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    #[inline]
    pub(crate) fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl<T> fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointer_is_not_a_handle() {
        assert!(NativeHandle::<u8>::from_raw(std::ptr::null_mut(), ResourceKind::Model).is_none());
    }

    #[test]
    fn take_empties_the_handle_once() {
        let mut value = 7u8;
        let mut handle = NativeHandle::from_raw(&mut value as *mut u8, ResourceKind::Stream)
            .expect("non-null pointer");

        assert!(handle.live().is_ok());
        assert!(handle.take().is_some());
        assert!(handle.take().is_none());
        assert!(matches!(
            handle.live(),
            Err(PocketError::ResourceNotLive(ResourceKind::Stream))
        ));
    }
}
