#![no_std]

extern crate alloc;

mod book;
mod math;
mod order_queue;
mod pool;
mod price_list;
mod registry;

pub use book::{Execution, Orderbook, Popped};
pub use math::{base_to_quote, quote_to_base};
pub use order_queue::{OrderEntry, OrderQueues};
pub use pool::{Pool, Slot};
pub use price_list::PriceList;
pub use registry::{PairInfo, Registry};
