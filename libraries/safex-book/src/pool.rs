use core::{fmt, mem};
use sails_rs::Vec;

/// Compact handle into a [`Pool`]. Slots are reused after [`Pool::take`];
/// anything that must survive slot reuse (order ids) is mapped onto slots
/// externally.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Slot(u32);

impl Slot {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.0)
    }
}

#[derive(Debug)]
enum Cell<T> {
    Used(T),
    Free(Option<Slot>),
}

/// Arena-style node pool: nodes live in one growable buffer and are
/// addressed by [`Slot`]. Freed slots form a LIFO free list, so steady-state
/// book activity performs no per-operation heap allocation.
#[derive(Debug)]
pub struct Pool<T> {
    cells: Vec<Cell<T>>,
    free_head: Option<Slot>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            free_head: None,
        }
    }
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, reusing a freed slot when one exists.
    pub fn insert(&mut self, value: T) -> Slot {
        match self.free_head {
            Some(slot) => {
                let cell = self
                    .cells
                    .get_mut(slot.as_usize())
                    .unwrap_or_else(|| panic!("pool free list out of bounds: {:?}", slot));
                match cell {
                    Cell::Free(next) => {
                        self.free_head = *next;
                        *cell = Cell::Used(value);
                        slot
                    }
                    Cell::Used(_) => {
                        panic!("pool free list points at a used slot: {:?}", slot)
                    }
                }
            }
            None => {
                let raw: u32 = self
                    .cells
                    .len()
                    .try_into()
                    .unwrap_or_else(|_| panic!("pool exhausted: more than {} slots", u32::MAX));
                self.cells.push(Cell::Used(value));
                Slot(raw)
            }
        }
    }

    pub fn get(&self, slot: Slot) -> Option<&T> {
        match self.cells.get(slot.as_usize())? {
            Cell::Used(value) => Some(value),
            Cell::Free(_) => None,
        }
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut T> {
        match self.cells.get_mut(slot.as_usize())? {
            Cell::Used(value) => Some(value),
            Cell::Free(_) => None,
        }
    }

    /// Remove and return the value at `slot`; the slot joins the free list.
    /// Taking an already-free slot is a no-op returning `None`.
    pub fn take(&mut self, slot: Slot) -> Option<T> {
        let cell = self.cells.get_mut(slot.as_usize())?;
        let old = mem::replace(cell, Cell::Free(self.free_head));
        match old {
            Cell::Used(value) => {
                self.free_head = Some(slot);
                Some(value)
            }
            Cell::Free(next) => {
                *cell = Cell::Free(next);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;

    fn assert_free_list_intact<T>(pool: &Pool<T>) {
        let mut seen: Vec<Slot> = Vec::new();
        let mut cur = pool.free_head;
        while let Some(slot) = cur {
            assert!(!seen.contains(&slot), "free list cycle at {:?}", slot);
            seen.push(slot);
            match pool
                .cells
                .get(slot.as_usize())
                .unwrap_or_else(|| panic!("free list out of bounds: {:?}", slot))
            {
                Cell::Free(next) => cur = *next,
                Cell::Used(_) => panic!("free list points at used slot: {:?}", slot),
            }
        }
        for (i, cell) in pool.cells.iter().enumerate() {
            if matches!(cell, Cell::Free(_)) {
                assert!(
                    seen.contains(&Slot::new(i as u32)),
                    "free slot {} unreachable from free head",
                    i
                );
            }
        }
    }

    #[test]
    fn reuses_freed_slots_lifo() {
        let mut pool = Pool::new();
        let a = pool.insert(10);
        let b = pool.insert(20);
        let c = pool.insert(30);

        assert_eq!(pool.take(b), Some(20));
        assert_eq!(pool.take(c), Some(30));
        assert_free_list_intact(&pool);

        assert_eq!(pool.insert(31), c);
        assert_eq!(pool.insert(21), b);
        assert_free_list_intact(&pool);

        assert_eq!(pool.get(a), Some(&10));
        assert_eq!(pool.get(b), Some(&21));
        assert_eq!(pool.get(c), Some(&31));
    }

    #[test]
    fn double_take_is_none() {
        let mut pool = Pool::new();
        let a = pool.insert(1);
        assert_eq!(pool.take(a), Some(1));
        assert_eq!(pool.take(a), None);
        assert_free_list_intact(&pool);

        // free list survives the double take
        let b = pool.insert(2);
        assert_eq!(b, a);
        assert_eq!(pool.get(b), Some(&2));
    }

    #[test]
    fn get_out_of_bounds_is_none() {
        let mut pool: Pool<u8> = Pool::new();
        assert_eq!(pool.get(Slot::new(0)), None);
        assert_eq!(pool.get_mut(Slot::new(7)), None);
        assert_eq!(pool.take(Slot::new(7)), None);
    }

    #[test]
    fn get_mut_writes_through() {
        let mut pool = Pool::new();
        let a = pool.insert(5);
        *pool.get_mut(a).unwrap() = 6;
        assert_eq!(pool.get(a), Some(&6));
    }

    #[test]
    fn buffer_does_not_grow_under_reuse() {
        let mut pool = Pool::new();
        let mut slots = Vec::new();
        for v in 0..256 {
            slots.push(pool.insert(v));
        }
        let len = pool.cells.len();
        for (k, slot) in slots.iter().enumerate() {
            if k % 2 == 1 {
                assert_eq!(pool.take(*slot), Some(k as i32));
            }
        }
        for v in 0..128 {
            pool.insert(1000 + v);
        }
        assert_eq!(pool.cells.len(), len);
        assert_free_list_intact(&pool);
    }
}
