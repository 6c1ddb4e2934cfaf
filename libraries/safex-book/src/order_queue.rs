use sails_rs::collections::HashMap;
use sails_rs::prelude::*;
use sails_rs::U256;

use safex_common::{OrderId, Price};

use crate::pool::{Pool, Slot};

/// A live resting order. The side is implicit in which side's store holds
/// the entry; `deposit` is denominated in the given asset of that side
/// (quote for bids, base for asks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEntry {
    pub id: OrderId,
    pub owner: ActorId,
    pub deposit: U256,
    pub price: Price,
}

#[derive(Debug)]
struct OrderNode {
    entry: OrderEntry,
    prev: Option<Slot>,
    next: Option<Slot>,
    linked: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Fifo {
    head: Option<Slot>,
    tail: Option<Slot>,
}

/// One side's order storage: an arena of order nodes, the
/// `id -> slot` sidecar that makes cancel O(1), and a FIFO queue per price.
///
/// Ids are issued monotonically starting at 1 and never reused, even though
/// the underlying slots are. Partial fills decrement the head in place and
/// never reorder the queue.
#[derive(Debug)]
pub struct OrderQueues {
    pool: Pool<OrderNode>,
    by_id: HashMap<OrderId, Slot>,
    fifos: HashMap<Price, Fifo>,
    next_id: OrderId,
}

impl Default for OrderQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderQueues {
    pub fn new() -> Self {
        Self {
            pool: Pool::new(),
            by_id: HashMap::new(),
            fifos: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate a fresh id and record for an order not yet queued.
    pub fn create_order(&mut self, owner: ActorId, deposit: U256) -> OrderId {
        let id = self.next_id;
        self.next_id += 1;
        let slot = self.pool.insert(OrderNode {
            entry: OrderEntry {
                id,
                owner,
                deposit,
                price: U256::zero(),
            },
            prev: None,
            next: None,
            linked: false,
        });
        self.by_id.insert(id, slot);
        id
    }

    /// Append order `id` to the FIFO at `price`. A zero `amount` drops the
    /// record instead of queueing it.
    pub fn insert_id(&mut self, price: Price, id: OrderId, amount: U256) {
        let Some(&slot) = self.by_id.get(&id) else {
            return;
        };
        if amount.is_zero() {
            self.by_id.remove(&id);
            self.pool.take(slot);
            return;
        }

        let fifo = self.fifos.entry(price).or_default();
        let tail = fifo.tail;
        {
            let node = self.pool.get_mut(slot).expect("order node must exist");
            node.entry.price = price;
            node.entry.deposit = amount;
            node.prev = tail;
            node.next = None;
            node.linked = true;
        }
        match tail {
            Some(t) => {
                self.pool.get_mut(t).expect("tail node must exist").next = Some(slot);
                self.fifos.get_mut(&price).expect("fifo must exist").tail = Some(slot);
            }
            None => {
                let fifo = self.fifos.get_mut(&price).expect("fifo must exist");
                fifo.head = Some(slot);
                fifo.tail = Some(slot);
            }
        }
    }

    pub fn head(&self, price: Price) -> Option<OrderId> {
        let fifo = self.fifos.get(&price)?;
        fifo.head.map(|slot| self.entry(slot).id)
    }

    pub fn is_empty(&self, price: Price) -> bool {
        self.fifos.get(&price).map_or(true, |f| f.head.is_none())
    }

    /// Unlink the head order at `price` and return its id. The record stays
    /// addressable by id until decreased to zero or deleted.
    pub fn fpop(&mut self, price: Price) -> Option<OrderId> {
        let fifo = self.fifos.get(&price)?;
        let slot = fifo.head?;
        self.unlink(price, slot);
        Some(self.entry(slot).id)
    }

    /// Subtract `by` from the order's deposit; a result of zero retires the
    /// record (and unlinks it if still queued). Only the current head of a
    /// queue may be decreased while linked.
    pub fn decrease_order(&mut self, price: Price, id: OrderId, by: U256) -> U256 {
        let Some(&slot) = self.by_id.get(&id) else {
            return U256::zero();
        };
        let (remaining, linked) = {
            let node = self.pool.get_mut(slot).expect("order node must exist");
            if node.linked {
                debug_assert_eq!(
                    self.fifos.get(&price).and_then(|f| f.head),
                    Some(slot),
                    "decrease_order must target the queue head"
                );
            }
            node.entry.deposit = node.entry.deposit.saturating_sub(by);
            (node.entry.deposit, node.linked)
        };
        if remaining.is_zero() {
            if linked {
                self.unlink(price, slot);
            }
            self.by_id.remove(&id);
            self.pool.take(slot);
        }
        remaining
    }

    /// Cancel path: unlink a live order wherever it sits in the queue and
    /// return its record. `None` for ids that are unknown or mid-execution.
    pub fn delete_order(&mut self, price: Price, id: OrderId) -> Option<OrderEntry> {
        let &slot = self.by_id.get(&id)?;
        let node = self.pool.get(slot).expect("order node must exist");
        if !node.linked || node.entry.price != price {
            return None;
        }
        self.unlink(price, slot);
        self.by_id.remove(&id);
        self.pool.take(slot).map(|node| node.entry)
    }

    pub fn get_order(&self, id: OrderId) -> Option<OrderEntry> {
        let &slot = self.by_id.get(&id)?;
        Some(*self.entry(slot))
    }

    /// Up to `n` entries at `price`, FIFO order.
    pub fn get_orders(&self, price: Price, n: u32) -> Vec<OrderEntry> {
        let mut out = Vec::new();
        let Some(fifo) = self.fifos.get(&price) else {
            return out;
        };
        let mut cur = fifo.head;
        while let Some(slot) = cur {
            if out.len() as u32 >= n {
                break;
            }
            let node = self.pool.get(slot).expect("order node must exist");
            out.push(node.entry);
            cur = node.next;
        }
        out
    }

    pub fn get_order_ids(&self, price: Price, n: u32) -> Vec<OrderId> {
        self.get_orders(price, n).iter().map(|o| o.id).collect()
    }

    /// Total resting deposit at `price`.
    pub fn level_depth(&self, price: Price) -> U256 {
        let mut total = U256::zero();
        let Some(fifo) = self.fifos.get(&price) else {
            return total;
        };
        let mut cur = fifo.head;
        while let Some(slot) = cur {
            let node = self.pool.get(slot).expect("order node must exist");
            total = total.saturating_add(node.entry.deposit);
            cur = node.next;
        }
        total
    }

    /// Number of ids issued so far.
    pub fn order_count(&self) -> u32 {
        self.next_id - 1
    }

    fn entry(&self, slot: Slot) -> &OrderEntry {
        &self.pool.get(slot).expect("order node must exist").entry
    }

    fn unlink(&mut self, price: Price, slot: Slot) {
        let (prev, next) = {
            let node = self.pool.get_mut(slot).expect("order node must exist");
            let links = (node.prev, node.next);
            node.prev = None;
            node.next = None;
            node.linked = false;
            links
        };
        match prev {
            Some(p) => self.pool.get_mut(p).expect("prev node must exist").next = next,
            None => self.fifos.get_mut(&price).expect("fifo must exist").head = next,
        }
        match next {
            Some(n) => self.pool.get_mut(n).expect("next node must exist").prev = prev,
            None => self.fifos.get_mut(&price).expect("fifo must exist").tail = prev,
        }
        let empty = self
            .fifos
            .get(&price)
            .map_or(false, |f| f.head.is_none());
        if empty {
            self.fifos.remove(&price);
        }
    }
}
