//! Auxiliary user data attached to graph objects
//!
//! Annotations are opaque, type-erased values owned by application code.
//! They are never serialized; writers detach them before a graph is cached.

use parking_lot::Mutex;
use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Type-erased user data
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Slot holding at most one piece of user data
#[derive(Default)]
pub struct Annotations {
    slot: Mutex<Option<UserData>>,
}

impl Annotations {
    /// Create an empty slot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach user data, replacing whatever was attached before
    pub fn attach(&self, data: UserData) {
        *self.slot.lock() = Some(data);
    }

    /// Currently attached data
    #[must_use]
    pub fn get(&self) -> Option<UserData> {
        self.slot.lock().clone()
    }

    /// Attached data downcast to a concrete type
    #[must_use]
    pub fn get_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get().and_then(|data| data.downcast::<T>().ok())
    }

    /// Check whether anything is attached
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Detach and return the attached data
    pub fn detach(&self) -> Option<UserData> {
        self.slot.lock().take()
    }

    /// Slot sharing the same attached data (used by shallow copies)
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            slot: Mutex::new(self.get()),
        }
    }
}

impl Debug for Annotations {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotations")
            .field("attached", &!self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker(u32);

    #[test]
    fn attach_and_detach() {
        let annotations = Annotations::new();
        assert!(annotations.is_empty());

        annotations.attach(Arc::new(Marker(7)));
        assert!(!annotations.is_empty());
        assert_eq!(annotations.get_as::<Marker>().as_deref(), Some(&Marker(7)));

        assert!(annotations.detach().is_some());
        assert!(annotations.is_empty());
        assert!(annotations.detach().is_none());
    }

    #[test]
    fn share_keeps_same_data() {
        let annotations = Annotations::new();
        annotations.attach(Arc::new(Marker(1)));

        let shared = annotations.share();
        shared.detach();

        assert!(shared.is_empty());
        assert!(!annotations.is_empty());
    }

    #[test]
    fn downcast_to_wrong_type_is_none() {
        let annotations = Annotations::new();
        annotations.attach(Arc::new(Marker(1)));
        assert!(annotations.get_as::<String>().is_none());
    }
}
