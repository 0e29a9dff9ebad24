//! Arena of buffers and images shared by the passes of a frame graph.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Index;

use rustfft::num_complex::Complex32;

use crate::error::ResourceError;
use crate::spectrum::GridExtent;
use crate::texture::Texture;

/// Typed index into an [`Arena`]
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// Complex-valued storage buffer sized to a grid
#[derive(Debug, Clone)]
pub struct StorageBuffer {
    label: String,
    extent: GridExtent,
    pub data: Vec<Complex32>,
}

impl StorageBuffer {
    pub fn new(label: impl Into<String>, extent: GridExtent) -> Self {
        Self {
            label: label.into(),
            extent,
            data: vec![Complex32::new(0.0, 0.0); extent.len()],
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    /// Size in bytes, as bound to a pass
    pub fn byte_size(&self) -> u64 {
        (self.data.len() * std::mem::size_of::<Complex32>()) as u64
    }
}

pub type BufferId = Handle<StorageBuffer>;
pub type ImageId = Handle<Texture>;

/// Anything stored in an arena carries a debug label
pub trait Labeled {
    const KIND: &'static str;
    fn label(&self) -> &str;
}

impl Labeled for StorageBuffer {
    const KIND: &'static str = "buffer";
    fn label(&self) -> &str {
        &self.label
    }
}

impl Labeled for Texture {
    const KIND: &'static str = "image";
    fn label(&self) -> &str {
        Texture::label(self)
    }
}

/// Append-only store addressed by [`Handle`]
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Labeled> Arena<T> {
    pub fn insert(&mut self, item: T) -> Handle<T> {
        self.items.push(item);
        Handle::new(self.items.len() as u32 - 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, handle: Handle<T>) -> Result<&T, ResourceError> {
        self.items
            .get(handle.index as usize)
            .ok_or_else(|| unknown::<T>(handle.index))
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut T, ResourceError> {
        self.items
            .get_mut(handle.index as usize)
            .ok_or_else(|| unknown::<T>(handle.index))
    }

    /// Borrow several distinct items mutably at once
    pub fn get_many_mut<const N: usize>(
        &mut self,
        handles: [Handle<T>; N],
    ) -> Result<[&mut T; N], ResourceError> {
        for (i, handle) in handles.iter().enumerate() {
            if handle.index as usize >= self.items.len() {
                return Err(unknown::<T>(handle.index));
            }
            if handles[..i].contains(handle) {
                return Err(ResourceError::Aliased {
                    kind: T::KIND,
                    index: handle.index,
                });
            }
        }

        let mut slots: Vec<Option<&mut T>> = self.items.iter_mut().map(Some).collect();
        let borrowed = handles
            .iter()
            .map(|handle| slots[handle.index as usize].take())
            .collect::<Option<Vec<_>>>()
            .ok_or(ResourceError::Aliased {
                kind: T::KIND,
                index: 0,
            })?;

        borrowed.try_into().map_err(|_| ResourceError::Aliased {
            kind: T::KIND,
            index: 0,
        })
    }

    /// Label of an item, or a placeholder for a stale handle
    pub fn label(&self, handle: Handle<T>) -> String {
        match self.get(handle) {
            Ok(item) => item.label().to_string(),
            Err(_) => format!("<{} {}>", T::KIND, handle.index),
        }
    }
}

/// Panics on a handle from another arena; owners index with handles they created
impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.items[handle.index as usize]
    }
}

fn unknown<T: Labeled>(index: u32) -> ResourceError {
    ResourceError::UnknownHandle {
        kind: T::KIND,
        index,
    }
}

/// Everything passes read and write during execution
#[derive(Debug, Clone, Default)]
pub struct Resources {
    pub buffers: Arena<StorageBuffer>,
    pub images: Arena<Texture>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_buffer(&mut self, label: impl Into<String>, extent: GridExtent) -> BufferId {
        self.buffers.insert(StorageBuffer::new(label, extent))
    }

    pub fn create_image(&mut self, texture: Texture) -> ImageId {
        self.images.insert(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_index_in_insertion_order() {
        let mut resources = Resources::new();
        let a = resources.create_buffer("a", GridExtent::square(2));
        let b = resources.create_buffer("b", GridExtent::square(4));

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(resources.buffers.get(b).unwrap().data.len(), 16);
        assert_eq!(resources.buffers.get(a).unwrap().byte_size(), 4 * 8);
    }

    #[test]
    fn test_get_many_mut_is_disjoint() {
        let mut resources = Resources::new();
        let a = resources.create_buffer("a", GridExtent::square(2));
        let b = resources.create_buffer("b", GridExtent::square(2));

        let [first, second] = resources.buffers.get_many_mut([b, a]).unwrap();
        first.data[0] = Complex32::new(1.0, 0.0);
        second.data[0] = Complex32::new(2.0, 0.0);

        assert_eq!(resources.buffers.get(b).unwrap().data[0].re, 1.0);
        assert_eq!(resources.buffers.get(a).unwrap().data[0].re, 2.0);
    }

    #[test]
    fn test_get_many_mut_rejects_aliasing() {
        let mut resources = Resources::new();
        let a = resources.create_buffer("a", GridExtent::square(2));

        assert_eq!(
            resources.buffers.get_many_mut([a, a]).unwrap_err(),
            ResourceError::Aliased {
                kind: "buffer",
                index: 0
            }
        );
    }

    #[test]
    fn test_unknown_handle() {
        let mut other = Resources::new();
        other.create_buffer("x", GridExtent::square(2));
        let stale = other.create_buffer("y", GridExtent::square(2));

        let resources = Resources::new();
        assert!(matches!(
            resources.buffers.get(stale),
            Err(ResourceError::UnknownHandle { index: 1, .. })
        ));
        assert_eq!(resources.buffers.label(stale), "<buffer 1>");
    }
}
