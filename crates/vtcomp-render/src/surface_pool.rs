#![forbid(unsafe_code)]

//! Surface arena.
//!
//! The compositor stores every window surface in a `SurfacePool` and hands
//! out compact [`SurfaceId`] handles. Widgets keep the handle, the
//! compositor keeps the z-order as a list of handles, and nobody holds a
//! pointer into the arena.
//!
//! - Slot reuse via free list
//! - Generation counters so a handle to a removed surface never resolves to
//!   a newer surface that reused the slot
//!
//! # Usage
//!
//! ```
//! use vtcomp_core::geometry::{Rect, Size};
//! use vtcomp_render::surface::Surface;
//! use vtcomp_render::surface_pool::SurfacePool;
//!
//! let mut pool = SurfacePool::new();
//! let id = pool.insert(Surface::create(Rect::new(0, 0, 4, 2), Size::ZERO).unwrap());
//! assert!(pool.get(id).is_some());
//!
//! pool.remove(id);
//! assert!(pool.get(id).is_none());
//! ```

use crate::surface::Surface;

/// Handle to a surface in a [`SurfacePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId {
    index: u32,
    generation: u32,
}

impl SurfaceId {
    /// Slot index inside the pool.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    surface: Option<Surface>,
}

/// Generational arena of surfaces.
#[derive(Debug, Clone, Default)]
pub struct SurfacePool {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
}

impl SurfacePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
        }
    }

    /// Number of live surfaces.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a surface and return its handle.
    pub fn insert(&mut self, surface: Surface) -> SurfaceId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.surface = Some(surface);
            return SurfaceId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            surface: Some(surface),
        });
        SurfaceId {
            index,
            generation: 0,
        }
    }

    /// Resolve a handle. Stale or foreign handles give `None`.
    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.surface.as_ref())
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.surface.as_mut())
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.get(id).is_some()
    }

    /// Take a surface out; its slot is recycled under a new generation.
    pub fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?;
        let surface = slot.surface.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        Some(surface)
    }

    /// Live surfaces with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SurfaceId, &Surface)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.surface.as_ref().map(|surface| {
                (
                    SurfaceId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    surface,
                )
            })
        })
    }

    /// Drop every surface. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.surface.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free_list.push(index as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtcomp_core::geometry::{Rect, Size};

    fn surface(w: u16) -> Surface {
        Surface::create(Rect::new(0, 0, w, 1), Size::ZERO).expect("alloc")
    }

    #[test]
    fn insert_and_get() {
        let mut pool = SurfacePool::new();
        let id = pool.insert(surface(3));
        assert_eq!(pool.get(id).map(Surface::width), Some(3));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn stale_handle_does_not_resolve_after_reuse() {
        let mut pool = SurfacePool::new();
        let old = pool.insert(surface(1));
        assert!(pool.remove(old).is_some());
        let new = pool.insert(surface(2));

        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert!(pool.get(old).is_none());
        assert!(pool.get_mut(old).is_none());
        assert!(pool.remove(old).is_none());
        assert_eq!(pool.get(new).map(Surface::width), Some(2));
    }

    #[test]
    fn double_remove_is_safe() {
        let mut pool = SurfacePool::new();
        let id = pool.insert(surface(1));
        assert!(pool.remove(id).is_some());
        assert!(pool.remove(id).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn iter_skips_free_slots() {
        let mut pool = SurfacePool::with_capacity(4);
        let a = pool.insert(surface(1));
        let b = pool.insert(surface(2));
        let c = pool.insert(surface(3));
        pool.remove(b);
        let ids: Vec<_> = pool.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn clear_invalidates_everything() {
        let mut pool = SurfacePool::new();
        let a = pool.insert(surface(1));
        pool.clear();
        assert!(pool.is_empty());
        assert!(!pool.contains(a));
        let b = pool.insert(surface(1));
        assert_ne!(a, b);
    }
}
