use std::collections::VecDeque;

use crate::objects::{ObjectId, Placed};

/// Pooled storage for streamed objects.
///
/// Records live in a slot vector; retired slots go on a free list and are
/// handed out again, so steady-state streaming stops allocating once the
/// window is full. A creation-ordered queue of `(id, slot)` pairs doubles as
/// the retirement cursor: objects are inserted in non-decreasing z, so
/// retiring from the front stops at the first object still in the window.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
    live: VecDeque<(ObjectId, usize)>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: VecDeque::new(),
        }
    }
}

impl<T: Placed> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            live: VecDeque::with_capacity(capacity),
        }
    }

    /// Store `value` under `id`. Ids must arrive in increasing order.
    pub fn insert(&mut self, id: ObjectId, value: T) {
        debug_assert!(
            self.live.back().is_none_or(|(last, _)| *last < id),
            "arena ids must increase"
        );
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(value);
                slot
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        };
        self.live.push_back((id, slot));
    }

    pub fn get(&self, id: ObjectId) -> Option<&T> {
        let index = self.live.binary_search_by_key(&id, |(id, _)| *id).ok()?;
        let (_, slot) = self.live[index];
        self.slots[slot].as_ref()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Retire every object with `z < min_z`, oldest first, appending their
    /// ids to `retired`. Stops at the first object still inside the window.
    pub fn retire_behind(&mut self, min_z: f32, retired: &mut Vec<ObjectId>) -> usize {
        let mut count = 0;
        while let Some(&(id, slot)) = self.live.front() {
            let behind = self.slots[slot].as_ref().is_none_or(|v| v.z() < min_z);
            if !behind {
                break;
            }
            self.live.pop_front();
            self.release(slot);
            retired.push(id);
            count += 1;
        }
        count
    }

    /// Retire everything, appending ids in creation order.
    pub fn clear(&mut self, retired: &mut Vec<ObjectId>) {
        while let Some((id, slot)) = self.live.pop_front() {
            self.release(slot);
            retired.push(id);
        }
    }

    fn release(&mut self, slot: usize) {
        self.slots[slot] = None;
        self.free.push(slot);
    }

    /// Live objects in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &T)> + '_ {
        self.live
            .iter()
            .filter_map(|(id, slot)| self.slots[*slot].as_ref().map(|v| (*id, v)))
    }

    /// Most recently inserted live object.
    pub fn last(&self) -> Option<(ObjectId, &T)> {
        let (id, slot) = *self.live.back()?;
        self.slots[slot].as_ref().map(|v| (id, v))
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Slots allocated so far, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
