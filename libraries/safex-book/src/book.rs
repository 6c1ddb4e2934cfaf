use sails_rs::prelude::*;
use sails_rs::U256;

use safex_common::{
    BookId, ExchangeError, OrderId, Price, Side, MAX_DECIMALS,
};

use crate::math::{base_to_quote, quote_to_base};
use crate::order_queue::{OrderEntry, OrderQueues};
use crate::price_list::PriceList;

/// Result of [`Orderbook::fpop`]: the head order at a level, the amount of
/// the taker's asset needed to consume it whole, and whether the pop left
/// the level empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Popped {
    pub id: OrderId,
    pub required: U256,
    pub clear: bool,
}

/// Settlement instruction returned by [`Orderbook::execute`]: pay the
/// taker's asset to `owner` and `pay_out` of the counter-asset to the
/// taker's recipient. The owning engine performs both moves; the book only
/// mutates its own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    pub owner: ActorId,
    pub pay_out: U256,
}

#[derive(Debug)]
struct BookSide {
    prices: PriceList,
    orders: OrderQueues,
}

/// Central limit order book for one (base, quote) pair.
///
/// Holds the sorted price lists and FIFO order queues for both sides, the
/// pair's decimal differential, and the last matched price. All mutations
/// are restricted to the owning engine, identified by actor id.
#[derive(Debug)]
pub struct Orderbook {
    id: BookId,
    engine: ActorId,
    base: ActorId,
    quote: ActorId,
    base_decimals: u8,
    quote_decimals: u8,
    dec_diff: U256,
    base_dec_ge_quote: bool,
    lmp: Option<Price>,
    bids: BookSide,
    asks: BookSide,
}

impl Orderbook {
    pub fn new(
        id: BookId,
        engine: ActorId,
        base: ActorId,
        quote: ActorId,
        base_decimals: u8,
        quote_decimals: u8,
    ) -> Result<Self, ExchangeError> {
        if base_decimals > MAX_DECIMALS || quote_decimals > MAX_DECIMALS {
            return Err(ExchangeError::InvalidDecimals {
                base: base_decimals,
                quote: quote_decimals,
            });
        }
        let diff = base_decimals.abs_diff(quote_decimals);
        Ok(Self {
            id,
            engine,
            base,
            quote,
            base_decimals,
            quote_decimals,
            dec_diff: U256::from(10u128.pow(diff as u32)),
            base_dec_ge_quote: base_decimals >= quote_decimals,
            lmp: None,
            bids: BookSide {
                prices: PriceList::bids(),
                orders: OrderQueues::new(),
            },
            asks: BookSide {
                prices: PriceList::asks(),
                orders: OrderQueues::new(),
            },
        })
    }

    fn only_engine(&self, caller: ActorId) -> Result<(), ExchangeError> {
        if caller != self.engine {
            return Err(ExchangeError::InvalidAccess {
                sender: caller,
                expected: self.engine,
            });
        }
        Ok(())
    }

    fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Rest a bid (deposit in quote) at `price`.
    pub fn place_bid(
        &mut self,
        caller: ActorId,
        owner: ActorId,
        price: Price,
        amount: U256,
    ) -> Result<OrderId, ExchangeError> {
        self.only_engine(caller)?;
        Ok(Self::place(&mut self.bids, owner, price, amount))
    }

    /// Rest an ask (deposit in base) at `price`.
    pub fn place_ask(
        &mut self,
        caller: ActorId,
        owner: ActorId,
        price: Price,
        amount: U256,
    ) -> Result<OrderId, ExchangeError> {
        self.only_engine(caller)?;
        Ok(Self::place(&mut self.asks, owner, price, amount))
    }

    fn place(side: &mut BookSide, owner: ActorId, price: Price, amount: U256) -> OrderId {
        let id = side.orders.create_order(owner, amount);
        side.orders.insert_id(price, id, amount);
        // membership invariant: list a price only while its queue is live
        if !side.orders.is_empty(price) {
            side.prices.insert(price);
        }
        id
    }

    /// Cancel `id` on `side` for `requester`, returning the refundable
    /// deposit. Only the order's owner may cancel.
    pub fn cancel(
        &mut self,
        caller: ActorId,
        side: Side,
        id: OrderId,
        requester: ActorId,
    ) -> Result<U256, ExchangeError> {
        self.only_engine(caller)?;
        let book_side = self.side_mut(side);
        let entry = book_side
            .orders
            .get_order(id)
            .ok_or(ExchangeError::OrderNotFound)?;
        if entry.owner != requester {
            return Err(ExchangeError::Unauthorized);
        }
        let entry = book_side
            .orders
            .delete_order(entry.price, id)
            .ok_or(ExchangeError::OrderNotFound)?;
        if book_side.orders.is_empty(entry.price) {
            book_side.prices.remove(entry.price);
        }
        Ok(entry.deposit)
    }

    /// Pop the head of `side`'s queue at `price` against `remaining` of the
    /// taker's asset.
    ///
    /// When `remaining` covers the head order it is unlinked here and
    /// retired by the matching `execute`; a partially consumable head stays
    /// queued. A head whose required amount truncates to zero is dropped as
    /// stale dust.
    pub fn fpop(
        &mut self,
        caller: ActorId,
        side: Side,
        price: Price,
        remaining: U256,
    ) -> Result<Popped, ExchangeError> {
        self.only_engine(caller)?;
        let required = {
            let book_side = self.side(side);
            let id = book_side
                .orders
                .head(price)
                .ok_or(ExchangeError::OrderNotFound)?;
            let entry = book_side
                .orders
                .get_order(id)
                .ok_or(ExchangeError::OrderNotFound)?;
            self.required_for(side, entry.deposit, price)?
        };

        let book_side = self.side_mut(side);
        let id = book_side
            .orders
            .head(price)
            .ok_or(ExchangeError::OrderNotFound)?;
        if required.is_zero() {
            let entry = book_side
                .orders
                .get_order(id)
                .ok_or(ExchangeError::OrderNotFound)?;
            book_side.orders.fpop(price);
            book_side.orders.decrease_order(price, id, entry.deposit);
            let clear = book_side.orders.is_empty(price);
            return Ok(Popped {
                id,
                required,
                clear,
            });
        }
        if remaining >= required {
            book_side.orders.fpop(price);
            let clear = book_side.orders.is_empty(price);
            Ok(Popped {
                id,
                required,
                clear,
            })
        } else {
            Ok(Popped {
                id,
                required,
                clear: false,
            })
        }
    }

    /// Settle `amount` of the taker's asset against resting order `id`.
    /// Decrements (or retires) the resting order and reports the owner and
    /// counter-asset amount the engine must pay out.
    pub fn execute(
        &mut self,
        caller: ActorId,
        id: OrderId,
        taker_side: Side,
        amount: U256,
        clear: bool,
    ) -> Result<Execution, ExchangeError> {
        self.only_engine(caller)?;
        let resting_side = taker_side.opposite();
        let entry = self
            .side(resting_side)
            .orders
            .get_order(id)
            .ok_or(ExchangeError::OrderNotFound)?;
        let required = self.required_for(resting_side, entry.deposit, entry.price)?;
        let pay_out = if amount >= required {
            // whole order consumed; the full deposit changes hands
            entry.deposit
        } else {
            self.counter_value(taker_side, amount, entry.price)?
        };

        let book_side = self.side_mut(resting_side);
        book_side.orders.decrease_order(entry.price, id, pay_out);
        if clear && book_side.orders.is_empty(entry.price) {
            book_side.prices.remove(entry.price);
        }
        Ok(Execution {
            owner: entry.owner,
            pay_out,
        })
    }

    pub fn set_lmp(&mut self, caller: ActorId, price: Price) -> Result<(), ExchangeError> {
        self.only_engine(caller)?;
        self.lmp = Some(price);
        Ok(())
    }

    /// Drop empty price levels from the head of `side` and return the
    /// resulting best price.
    pub fn clear_empty_head(
        &mut self,
        caller: ActorId,
        side: Side,
    ) -> Result<Option<Price>, ExchangeError> {
        self.only_engine(caller)?;
        let book_side = self.side_mut(side);
        loop {
            match book_side.prices.head() {
                None => return Ok(None),
                Some(price) if book_side.orders.is_empty(price) => {
                    book_side.prices.remove(price);
                }
                Some(price) => return Ok(Some(price)),
            }
        }
    }

    /// Amount of the taker's asset required to consume `deposit` resting on
    /// `resting_side` at `price`.
    fn required_for(
        &self,
        resting_side: Side,
        deposit: U256,
        price: Price,
    ) -> Result<U256, ExchangeError> {
        match resting_side {
            // resting ask deposits base; the bid taker pays quote
            Side::Ask => base_to_quote(deposit, price, self.dec_diff, self.base_dec_ge_quote),
            // resting bid deposits quote; the ask taker pays base
            Side::Bid => quote_to_base(deposit, price, self.dec_diff, self.base_dec_ge_quote),
        }
    }

    /// Counter-asset value of `amount` of the taker's asset at `price`.
    fn counter_value(
        &self,
        taker_side: Side,
        amount: U256,
        price: Price,
    ) -> Result<U256, ExchangeError> {
        match taker_side {
            Side::Bid => quote_to_base(amount, price, self.dec_diff, self.base_dec_ge_quote),
            Side::Ask => base_to_quote(amount, price, self.dec_diff, self.base_dec_ge_quote),
        }
    }

    /// Fixed-point conversion at an explicit price. `is_bid` follows the
    /// engine's taker convention: true converts base to quote, false quote
    /// to base.
    pub fn convert(
        &self,
        price: Price,
        amount: U256,
        is_bid: bool,
    ) -> Result<U256, ExchangeError> {
        if is_bid {
            base_to_quote(amount, price, self.dec_diff, self.base_dec_ge_quote)
        } else {
            quote_to_base(amount, price, self.dec_diff, self.base_dec_ge_quote)
        }
    }

    /// Conversion at the current mark price.
    pub fn asset_value(&self, amount: U256, is_bid: bool) -> Result<U256, ExchangeError> {
        let mp = self.mkt_price().ok_or(ExchangeError::NoLastMatchedPrice)?;
        self.convert(mp, amount, is_bid)
    }

    pub fn bid_head(&self) -> Option<Price> {
        self.bids.prices.head()
    }

    pub fn ask_head(&self) -> Option<Price> {
        self.asks.prices.head()
    }

    /// Best bid level with its aggregate resting quote.
    pub fn best_bid(&self) -> Option<(Price, U256)> {
        let price = self.bid_head()?;
        Some((price, self.bids.orders.level_depth(price)))
    }

    /// Best ask level with its aggregate resting base.
    pub fn best_ask(&self) -> Option<(Price, U256)> {
        let price = self.ask_head()?;
        Some((price, self.asks.orders.level_depth(price)))
    }

    /// Mark price: last matched price when one exists, else the best
    /// available head.
    pub fn mkt_price(&self) -> Option<Price> {
        self.lmp.or_else(|| self.bid_head()).or_else(|| self.ask_head())
    }

    pub fn is_empty(&self, side: Side, price: Price) -> bool {
        self.side(side).orders.is_empty(price)
    }

    pub fn get_order(&self, side: Side, id: OrderId) -> Option<OrderEntry> {
        self.side(side).orders.get_order(id)
    }

    pub fn get_orders(&self, side: Side, price: Price, n: u32) -> Vec<OrderEntry> {
        self.side(side).orders.get_orders(price, n)
    }

    pub fn get_order_ids(&self, side: Side, price: Price, n: u32) -> Vec<OrderId> {
        self.side(side).orders.get_order_ids(price, n)
    }

    /// Total resting deposit at the level.
    pub fn level_depth(&self, side: Side, price: Price) -> U256 {
        self.side(side).orders.level_depth(price)
    }

    /// All live price levels on `side`, best first.
    pub fn levels(&self, side: Side) -> Vec<Price> {
        self.side(side).prices.prices()
    }

    pub fn order_count(&self, side: Side) -> u32 {
        self.side(side).orders.order_count()
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn base(&self) -> ActorId {
        self.base
    }

    pub fn quote(&self) -> ActorId {
        self.quote
    }

    pub fn base_decimals(&self) -> u8 {
        self.base_decimals
    }

    pub fn quote_decimals(&self) -> u8 {
        self.quote_decimals
    }

    pub fn lmp(&self) -> Option<Price> {
        self.lmp
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use safex_common::PRICE_SCALE;

    const ENGINE: u64 = 77;

    fn actor(x: u64) -> ActorId {
        ActorId::from(x)
    }

    fn u(x: u128) -> U256 {
        U256::from(x)
    }

    fn e18(x: u128) -> U256 {
        U256::from(x) * U256::from(1_000_000_000_000_000_000u128)
    }

    fn p(x: u128) -> Price {
        U256::from(x * PRICE_SCALE)
    }

    fn book() -> Orderbook {
        Orderbook::new(0, actor(ENGINE), actor(100), actor(200), 18, 18).unwrap()
    }

    #[test]
    fn rejects_more_than_18_decimals() {
        let err = Orderbook::new(0, actor(ENGINE), actor(100), actor(200), 19, 6).unwrap_err();
        assert_eq!(err, ExchangeError::InvalidDecimals { base: 19, quote: 6 });
    }

    #[test]
    fn mutations_require_the_owning_engine() {
        let mut b = book();
        let err = b
            .place_ask(actor(1), actor(1), p(100), e18(1))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidAccess { .. }));
        let err = b.set_lmp(actor(1), p(100)).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidAccess { .. }));
        let err = b.cancel(actor(1), Side::Ask, 1, actor(1)).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidAccess { .. }));
    }

    #[test]
    fn place_lists_price_and_queues_order() {
        let mut b = book();
        let id = b
            .place_ask(actor(ENGINE), actor(1), p(100), e18(10))
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(b.ask_head(), Some(p(100)));
        assert_eq!(b.bid_head(), None);
        assert_eq!(b.get_order(Side::Ask, id).unwrap().deposit, e18(10));
        assert_eq!(b.level_depth(Side::Ask, p(100)), e18(10));
    }

    #[test]
    fn cancel_refunds_and_delists_empty_level() {
        let mut b = book();
        let id = b
            .place_ask(actor(ENGINE), actor(1), p(100), e18(7))
            .unwrap();
        let levels_before = b.levels(Side::Ask);
        assert_eq!(levels_before, [p(100)]);

        let refunded = b.cancel(actor(ENGINE), Side::Ask, id, actor(1)).unwrap();
        assert_eq!(refunded, e18(7));
        assert_eq!(b.ask_head(), None);
        assert!(b.levels(Side::Ask).is_empty());
        assert_eq!(b.get_order(Side::Ask, id), None);

        // id counter advanced, nothing else left behind
        assert_eq!(b.order_count(Side::Ask), 1);
    }

    #[test]
    fn cancel_by_non_owner_is_unauthorized() {
        let mut b = book();
        let id = b
            .place_ask(actor(ENGINE), actor(1), p(100), e18(7))
            .unwrap();
        let err = b.cancel(actor(ENGINE), Side::Ask, id, actor(2)).unwrap_err();
        assert_eq!(err, ExchangeError::Unauthorized);
        // order untouched
        assert_eq!(b.get_order(Side::Ask, id).unwrap().deposit, e18(7));
    }

    #[test]
    fn cancel_unknown_order_not_found() {
        let mut b = book();
        let err = b.cancel(actor(ENGINE), Side::Bid, 5, actor(1)).unwrap_err();
        assert_eq!(err, ExchangeError::OrderNotFound);
    }

    #[test]
    fn fpop_partial_leaves_head_linked() {
        let mut b = book();
        let id = b
            .place_ask(actor(ENGINE), actor(1), p(100), e18(10))
            .unwrap();
        // taker bid brings 3 quote; needs 1000 quote for the whole order
        let popped = b
            .fpop(actor(ENGINE), Side::Ask, p(100), e18(3))
            .unwrap();
        assert_eq!(popped.id, id);
        assert_eq!(popped.required, e18(1000));
        assert!(!popped.clear);
        assert_eq!(b.get_order_ids(Side::Ask, p(100), 10), [id]);
    }

    #[test]
    fn fpop_full_unlinks_and_execute_retires() {
        let mut b = book();
        let id = b
            .place_ask(actor(ENGINE), actor(1), p(100), e18(10))
            .unwrap();
        let popped = b
            .fpop(actor(ENGINE), Side::Ask, p(100), e18(1000))
            .unwrap();
        assert_eq!(popped.required, e18(1000));
        assert!(popped.clear);
        // unlinked but still addressable for settlement
        assert!(b.is_empty(Side::Ask, p(100)));
        assert!(b.get_order(Side::Ask, id).is_some());

        let exec = b
            .execute(actor(ENGINE), id, Side::Bid, e18(1000), popped.clear)
            .unwrap();
        assert_eq!(exec.owner, actor(1));
        assert_eq!(exec.pay_out, e18(10));
        assert_eq!(b.get_order(Side::Ask, id), None);
        assert_eq!(b.ask_head(), None);
    }

    #[test]
    fn execute_partial_decrements_head() {
        let mut b = book();
        let id = b
            .place_ask(actor(ENGINE), actor(1), p(100), e18(10))
            .unwrap();
        let popped = b
            .fpop(actor(ENGINE), Side::Ask, p(100), e18(300))
            .unwrap();
        assert!(!popped.clear);

        let exec = b
            .execute(actor(ENGINE), id, Side::Bid, e18(300), false)
            .unwrap();
        assert_eq!(exec.pay_out, e18(3));
        let entry = b.get_order(Side::Ask, id).unwrap();
        assert_eq!(entry.deposit, e18(7));
        // still at head
        assert_eq!(b.get_order_ids(Side::Ask, p(100), 10), [id]);
    }

    #[test]
    fn clear_empty_head_skips_drained_levels() {
        let mut b = book();
        let a = b
            .place_ask(actor(ENGINE), actor(1), p(100), e18(1))
            .unwrap();
        b.place_ask(actor(ENGINE), actor(2), p(110), e18(1))
            .unwrap();

        // drain the 100 level through fpop + execute without clear
        let popped = b
            .fpop(actor(ENGINE), Side::Ask, p(100), e18(100))
            .unwrap();
        b.execute(actor(ENGINE), a, Side::Bid, e18(100), false)
            .unwrap();
        assert!(popped.clear);

        let head = b.clear_empty_head(actor(ENGINE), Side::Ask).unwrap();
        assert_eq!(head, Some(p(110)));
        assert_eq!(b.levels(Side::Ask), [p(110)]);
    }

    #[test]
    fn mkt_price_prefers_lmp_then_heads() {
        let mut b = book();
        assert_eq!(b.mkt_price(), None);

        b.place_ask(actor(ENGINE), actor(1), p(105), e18(1))
            .unwrap();
        assert_eq!(b.mkt_price(), Some(p(105)));

        b.place_bid(actor(ENGINE), actor(2), p(95), e18(95))
            .unwrap();
        // bid head takes precedence over ask head
        assert_eq!(b.mkt_price(), Some(p(95)));

        b.set_lmp(actor(ENGINE), p(100)).unwrap();
        assert_eq!(b.mkt_price(), Some(p(100)));
    }

    #[test]
    fn book_never_crossed_at_rest_after_place() {
        let mut b = book();
        b.place_bid(actor(ENGINE), actor(1), p(95), e18(95))
            .unwrap();
        b.place_ask(actor(ENGINE), actor(2), p(105), e18(1))
            .unwrap();
        let (bid, ask) = (b.bid_head().unwrap(), b.ask_head().unwrap());
        assert!(bid <= ask);
    }

    #[test]
    fn convert_directions() {
        let b = book();
        // base -> quote multiplies by price
        assert_eq!(
            b.convert(p(100), e18(2), true).unwrap(),
            e18(200)
        );
        // quote -> base divides
        assert_eq!(
            b.convert(p(100), e18(200), false).unwrap(),
            e18(2)
        );
    }
}
