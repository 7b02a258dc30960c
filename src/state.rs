//! Avatar registry for the browser surface.
//!
//! JavaScript holds avatars by numeric handle. The registry owns them; the
//! wasm bindings are thin wrappers that look an avatar up and call the
//! plain Rust API on it. Keeping the registry a normal struct lets the
//! lookup logic be unit tested without the thread-local.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::avatar::Avatar;
use crate::bone::Skeleton;

/// Opaque avatar handle handed to JavaScript
pub type AvatarHandle = u32;

/// Avatars driven through the wasm bindings
#[derive(Default)]
pub struct AvatarRegistry {
    avatars: BTreeMap<AvatarHandle, Avatar<Skeleton>>,
    next_handle: AvatarHandle,
}

impl AvatarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an avatar and return its handle
    pub fn insert(&mut self, avatar: Avatar<Skeleton>) -> AvatarHandle {
        // 0 is never handed out so JavaScript can use it as "none"
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        while self.avatars.contains_key(&self.next_handle) {
            self.next_handle = self.next_handle.wrapping_add(1).max(1);
        }
        self.avatars.insert(self.next_handle, avatar);
        self.next_handle
    }

    /// Drop an avatar; false if the handle was unknown
    pub fn remove(&mut self, handle: AvatarHandle) -> bool {
        self.avatars.remove(&handle).is_some()
    }

    pub fn get(&self, handle: AvatarHandle) -> Option<&Avatar<Skeleton>> {
        self.avatars.get(&handle)
    }

    pub fn get_mut(&mut self, handle: AvatarHandle) -> Option<&mut Avatar<Skeleton>> {
        self.avatars.get_mut(&handle)
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }
}

// Global state access, thin wrapper for WASM bindings only
thread_local! {
    static AVATARS: RefCell<AvatarRegistry> = RefCell::new(AvatarRegistry::new());
}

/// Execute a closure with mutable access to the registry
pub fn with_registry<F, R>(f: F) -> R
where
    F: FnOnce(&mut AvatarRegistry) -> R,
{
    AVATARS.with(|registry| f(&mut registry.borrow_mut()))
}

/// Execute a closure with immutable access to one avatar
///
/// Returns None if the handle is unknown
pub fn with_avatar<F, R>(handle: AvatarHandle, f: F) -> Option<R>
where
    F: FnOnce(&Avatar<Skeleton>) -> R,
{
    AVATARS.with(|registry| registry.borrow().get(handle).map(f))
}

/// Execute a closure with mutable access to one avatar
///
/// Returns None if the handle is unknown
pub fn with_avatar_mut<F, R>(handle: AvatarHandle, f: F) -> Option<R>
where
    F: FnOnce(&mut Avatar<Skeleton>) -> R,
{
    AVATARS.with(|registry| registry.borrow_mut().get_mut(handle).map(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RigConfig;
    use wasm_bindgen_test::*;

    fn avatar() -> Avatar<Skeleton> {
        Avatar::new(Skeleton::default(), RigConfig::default())
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_handles_are_unique_and_non_zero() {
        let mut registry = AvatarRegistry::new();
        let a = registry.insert(avatar());
        let b = registry.insert(avatar());
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert!(registry.get(a).is_none());
        assert!(registry.get(b).is_some());
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_thread_local_access() {
        let handle = with_registry(|registry| registry.insert(avatar()));
        assert_eq!(with_avatar(handle, |a| a.leg_length()), Some(0.0));
        assert_eq!(with_avatar_mut(handle, |a| a.tick(0.1)), Some(false));

        assert!(with_registry(|registry| registry.remove(handle)));
        assert_eq!(with_avatar(handle, |a| a.leg_length()), None);
    }
}
