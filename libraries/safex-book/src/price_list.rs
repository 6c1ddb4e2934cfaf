use sails_rs::collections::HashMap;
use sails_rs::Vec;

use safex_common::Price;

use crate::pool::{Pool, Slot};

#[derive(Debug)]
struct LevelNode {
    price: Price,
    prev: Option<Slot>,
    next: Option<Slot>,
}

/// Sorted intrusive doubly-linked list of the distinct prices currently
/// hosting at least one live order on one side of a book.
///
/// The head is always the best price: highest for bids, lowest for asks.
/// Insertion walks from the head, so activity clustered at the top of book
/// links in O(1) amortized; the list is never rescanned whole per call.
#[derive(Debug)]
pub struct PriceList {
    pool: Pool<LevelNode>,
    slots: HashMap<Price, Slot>,
    head: Option<Slot>,
    descending: bool,
}

impl PriceList {
    /// Bid side: best = highest price at head.
    pub fn bids() -> Self {
        Self::new(true)
    }

    /// Ask side: best = lowest price at head.
    pub fn asks() -> Self {
        Self::new(false)
    }

    fn new(descending: bool) -> Self {
        Self {
            pool: Pool::new(),
            slots: HashMap::new(),
            head: None,
            descending,
        }
    }

    fn better(&self, a: Price, b: Price) -> bool {
        if self.descending {
            a > b
        } else {
            a < b
        }
    }

    pub fn head(&self) -> Option<Price> {
        self.head.map(|slot| self.node(slot).price)
    }

    pub fn contains(&self, price: Price) -> bool {
        self.slots.contains_key(&price)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert `price` into sorted position. Idempotent: an already-listed
    /// price is a no-op.
    pub fn insert(&mut self, price: Price) {
        if self.slots.contains_key(&price) {
            return;
        }

        // Walk toward the tail until the first node `price` beats; the new
        // node links in just before it.
        let mut prev: Option<Slot> = None;
        let mut cur = self.head;
        while let Some(slot) = cur {
            let node = self.node(slot);
            if self.better(price, node.price) {
                break;
            }
            prev = Some(slot);
            cur = node.next;
        }

        let slot = self.pool.insert(LevelNode {
            price,
            prev,
            next: cur,
        });
        match prev {
            Some(p) => self.node_mut(p).next = Some(slot),
            None => self.head = Some(slot),
        }
        if let Some(n) = cur {
            self.node_mut(n).prev = Some(slot);
        }
        self.slots.insert(price, slot);
    }

    /// Neighbor of `price` toward the tail (the next-worse price), if any.
    pub fn next(&self, price: Price) -> Option<Price> {
        let slot = *self.slots.get(&price)?;
        self.node(slot).next.map(|n| self.node(n).price)
    }

    /// Unlink `price`. Unknown prices are a no-op.
    pub fn remove(&mut self, price: Price) {
        let Some(slot) = self.slots.remove(&price) else {
            return;
        };
        let (prev, next) = {
            let node = self.node(slot);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.node_mut(n).prev = prev;
        }
        self.pool.take(slot);
    }

    /// All listed prices, best first.
    pub fn prices(&self) -> Vec<Price> {
        let mut out = Vec::new();
        let mut cur = self.head;
        while let Some(slot) = cur {
            let node = self.node(slot);
            out.push(node.price);
            cur = node.next;
        }
        out
    }

    fn node(&self, slot: Slot) -> &LevelNode {
        self.pool.get(slot).expect("price level node must exist")
    }

    fn node_mut(&mut self, slot: Slot) -> &mut LevelNode {
        self.pool
            .get_mut(slot)
            .expect("price level node must exist")
    }
}
