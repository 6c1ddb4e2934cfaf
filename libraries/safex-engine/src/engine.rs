use core::cmp::{max, min};
use core::mem;

use sails_rs::prelude::*;
use sails_rs::U256;

use safex_book::{Orderbook, Registry};
use safex_common::{
    mul_div_floor, BookId, Event, ExchangeError, OrderId, Price, Side, TokenId, FEE_DENOM,
    MAX_MATCHES,
};

use crate::config::EngineConfig;
use crate::ports::{Assets, FeeBridge, NativeWrapper};

/// Outcome of a limit or market order: the price any residual was (or would
/// have been) rested at, the amount of the given asset consumed by
/// matching, and the amount left resting on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub struct OrderResult {
    pub make_price: Price,
    pub matched: U256,
    pub placed: U256,
}

/// One element of a bulk cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub struct CancelRequest {
    pub base: TokenId,
    pub quote: TokenId,
    pub side: Side,
    pub order_id: OrderId,
    pub uid: u32,
}

/// The protocol core: deposits with fees, the bounded match loop, the
/// make-or-refund decision, and cancel/rematch. Holds the pair registry and
/// consults the external collaborators through the seam traits.
///
/// Every public operation runs to completion under `&mut self`; nested
/// entry through a collaborator is rejected with `Reentrancy`.
pub struct MatchingEngine<A: Assets, F: FeeBridge, N: NativeWrapper> {
    config: EngineConfig,
    registry: Registry,
    assets: A,
    fees: F,
    native: N,
    events: Vec<Event>,
    entered: bool,
}

impl<A: Assets, F: FeeBridge, N: NativeWrapper> MatchingEngine<A, F, N> {
    pub fn new(config: EngineConfig, assets: A, fees: F, native: N) -> Self {
        Self {
            config,
            registry: Registry::new(),
            assets,
            fees,
            native,
            events: Vec::new(),
            entered: false,
        }
    }

    /// Resolve the orderbook for `(base, quote)`, creating it on first use.
    /// Idempotent: an existing pair returns its handle unchanged.
    pub fn add_pair(&mut self, base: TokenId, quote: TokenId) -> Result<BookId, ExchangeError> {
        if let Some(id) = self.registry.get(base, quote) {
            return Ok(id);
        }
        let base_decimals = self.assets.decimals(base)?;
        let quote_decimals = self.assets.decimals(quote)?;
        let id = self
            .registry
            .create(self.config.id, base, quote, base_decimals, quote_decimals)?;
        self.events.push(Event::PairAdded {
            orderbook: id,
            base,
            quote,
            base_decimals,
            quote_decimals,
        });
        Ok(id)
    }

    pub fn limit_buy(
        &mut self,
        sender: ActorId,
        value: U256,
        base: TokenId,
        quote: TokenId,
        price: Price,
        quote_amount: U256,
        is_maker: bool,
        n: u32,
        uid: u32,
        recipient: ActorId,
    ) -> Result<OrderResult, ExchangeError> {
        self.enter()?;
        let out = self.limit_inner(
            sender,
            value,
            base,
            quote,
            price,
            quote_amount,
            is_maker,
            n,
            uid,
            recipient,
            Side::Bid,
        );
        self.leave();
        out
    }

    pub fn limit_sell(
        &mut self,
        sender: ActorId,
        value: U256,
        base: TokenId,
        quote: TokenId,
        price: Price,
        base_amount: U256,
        is_maker: bool,
        n: u32,
        uid: u32,
        recipient: ActorId,
    ) -> Result<OrderResult, ExchangeError> {
        self.enter()?;
        let out = self.limit_inner(
            sender,
            value,
            base,
            quote,
            price,
            base_amount,
            is_maker,
            n,
            uid,
            recipient,
            Side::Ask,
        );
        self.leave();
        out
    }

    pub fn market_buy(
        &mut self,
        sender: ActorId,
        value: U256,
        base: TokenId,
        quote: TokenId,
        quote_amount: U256,
        is_maker: bool,
        n: u32,
        uid: u32,
        recipient: ActorId,
    ) -> Result<OrderResult, ExchangeError> {
        self.enter()?;
        let out = self.market_inner(
            sender,
            value,
            base,
            quote,
            quote_amount,
            is_maker,
            n,
            uid,
            recipient,
            Side::Bid,
        );
        self.leave();
        out
    }

    pub fn market_sell(
        &mut self,
        sender: ActorId,
        value: U256,
        base: TokenId,
        quote: TokenId,
        base_amount: U256,
        is_maker: bool,
        n: u32,
        uid: u32,
        recipient: ActorId,
    ) -> Result<OrderResult, ExchangeError> {
        self.enter()?;
        let out = self.market_inner(
            sender,
            value,
            base,
            quote,
            base_amount,
            is_maker,
            n,
            uid,
            recipient,
            Side::Ask,
        );
        self.leave();
        out
    }

    /// Cancel a resting order and refund its deposit to the owner.
    pub fn cancel_order(
        &mut self,
        sender: ActorId,
        base: TokenId,
        quote: TokenId,
        side: Side,
        order_id: OrderId,
        uid: u32,
    ) -> Result<U256, ExchangeError> {
        self.enter()?;
        let out = self.cancel_inner(sender, base, quote, side, order_id, uid);
        self.leave();
        out
    }

    /// Bulk cancel with per-element status. A failing element does not roll
    /// back earlier cancels.
    pub fn cancel_orders(
        &mut self,
        sender: ActorId,
        requests: Vec<CancelRequest>,
    ) -> Vec<Result<U256, ExchangeError>> {
        if let Err(err) = self.enter() {
            return requests.iter().map(|_| Err(err.clone())).collect();
        }
        let out = requests
            .into_iter()
            .map(|r| self.cancel_inner(sender, r.base, r.quote, r.side, r.order_id, r.uid))
            .collect();
        self.leave();
        out
    }

    /// Cancel and immediately re-enter the order as the corresponding limit
    /// or market operation, with the sender as recipient.
    pub fn rematch_order(
        &mut self,
        sender: ActorId,
        base: TokenId,
        quote: TokenId,
        side: Side,
        order_id: OrderId,
        is_market: bool,
        is_maker: bool,
        n: u32,
        uid: u32,
    ) -> Result<OrderResult, ExchangeError> {
        self.enter()?;
        let out = self.rematch_inner(sender, base, quote, side, order_id, is_market, is_maker, n, uid);
        self.leave();
        out
    }

    /// Mark price of a pair: last matched price, else the best available
    /// head.
    pub fn mkt_price(&self, base: TokenId, quote: TokenId) -> Result<Price, ExchangeError> {
        let id = self
            .registry
            .get(base, quote)
            .ok_or(ExchangeError::InvalidPair { base, quote })?;
        self.book(id)
            .mkt_price()
            .ok_or(ExchangeError::NoLastMatchedPrice)
    }

    /// Mark-price conversion shortcut: identity for `base == quote`, zero
    /// for unknown pairs or priceless books.
    pub fn convert(&self, base: TokenId, quote: TokenId, amount: U256, is_bid: bool) -> U256 {
        if base == quote {
            return amount;
        }
        let Some(id) = self.registry.get(base, quote) else {
            return U256::zero();
        };
        self.book(id).asset_value(amount, is_bid).unwrap_or_default()
    }

    /// Drain the event journal accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        mem::take(&mut self.events)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn fees(&self) -> &F {
        &self.fees
    }

    fn enter(&mut self) -> Result<(), ExchangeError> {
        if self.entered {
            return Err(ExchangeError::Reentrancy);
        }
        self.entered = true;
        Ok(())
    }

    fn leave(&mut self) {
        self.entered = false;
    }

    fn book(&self, id: BookId) -> &Orderbook {
        self.registry.get_by_id(id).expect("resolved orderbook")
    }

    fn book_mut(&mut self, id: BookId) -> &mut Orderbook {
        self.registry.book_mut(id).expect("resolved orderbook")
    }

    fn market_inner(
        &mut self,
        sender: ActorId,
        value: U256,
        base: TokenId,
        quote: TokenId,
        amount: U256,
        is_maker: bool,
        n: u32,
        uid: u32,
        recipient: ActorId,
        side: Side,
    ) -> Result<OrderResult, ExchangeError> {
        let book_id = self.add_pair(base, quote)?;
        let mp = self
            .book(book_id)
            .mkt_price()
            .ok_or(ExchangeError::NoLastMatchedPrice)?;
        // synthesize a limit 10% through the mark
        let limit = match side {
            Side::Bid => mul_div_floor(mp, U256::from(11u8), U256::from(10u8))?,
            Side::Ask => mul_div_floor(mp, U256::from(9u8), U256::from(10u8))?,
        };
        self.limit_inner(
            sender, value, base, quote, limit, amount, is_maker, n, uid, recipient, side,
        )
    }

    fn limit_inner(
        &mut self,
        sender: ActorId,
        value: U256,
        base: TokenId,
        quote: TokenId,
        price: Price,
        amount: U256,
        is_maker: bool,
        n: u32,
        uid: u32,
        recipient: ActorId,
        side: Side,
    ) -> Result<OrderResult, ExchangeError> {
        let book_id = self.add_pair(base, quote)?;

        // preconditions before any asset moves
        if n > MAX_MATCHES {
            return Err(ExchangeError::TooManyMatches { n });
        }
        if price.is_zero() {
            return Err(ExchangeError::InvalidPrice);
        }
        self.check_spread(book_id, side, price)?;

        let net = self.deposit(sender, value, book_id, side, price, amount, is_maker, uid)?;
        let (remaining, bid_head, ask_head) =
            self.match_loop(book_id, sender, recipient, side, price, net, n)?;

        // residual rests at the limit unless snapping to the opposite head
        // is safer
        let make_price = match side {
            Side::Bid => ask_head.map_or(price, |head| min(price, head)),
            Side::Ask => bid_head.map_or(price, |head| max(price, head)),
        };
        let placed = self.det_make(book_id, recipient, side, make_price, remaining, is_maker)?;

        Ok(OrderResult {
            make_price,
            matched: net
                .checked_sub(remaining)
                .ok_or(ExchangeError::Overflow)?,
            placed,
        })
    }

    /// ±10% band around the last matched price; books without an LMP accept
    /// any limit.
    fn check_spread(
        &self,
        book_id: BookId,
        side: Side,
        limit_price: Price,
    ) -> Result<(), ExchangeError> {
        let Some(lmp) = self.book(book_id).lmp() else {
            return Ok(());
        };
        match side {
            Side::Bid => {
                let floor = mul_div_floor(lmp, U256::from(9u8), U256::from(10u8))?;
                if limit_price < floor {
                    return Err(ExchangeError::BidPriceTooLow {
                        limit: limit_price,
                        lmp,
                        floor,
                    });
                }
            }
            Side::Ask => {
                let ceiling = mul_div_floor(lmp, U256::from(11u8), U256::from(10u8))?;
                if limit_price > ceiling {
                    return Err(ExchangeError::AskPriceTooHigh {
                        limit: limit_price,
                        lmp,
                        ceiling,
                    });
                }
            }
        }
        Ok(())
    }

    /// Pull the deposit into custody, charge the fee, and report it.
    /// Returns the net amount available for matching.
    fn deposit(
        &mut self,
        sender: ActorId,
        value: U256,
        book_id: BookId,
        side: Side,
        price: Price,
        amount: U256,
        is_maker: bool,
        uid: u32,
    ) -> Result<U256, ExchangeError> {
        let (given, min_required) = {
            let book = self.book(book_id);
            let given = if side.is_bid() {
                book.quote()
            } else {
                book.base()
            };
            // the given amount must be worth more than one atom of the
            // opposite asset, or matching would truncate it to dust
            let min_required = book.convert(price, U256::one(), side.is_bid())?;
            (given, min_required)
        };
        if amount <= min_required {
            return Err(ExchangeError::OrderSizeTooSmall {
                amount,
                min: min_required,
            });
        }

        let fee = if uid != 0 && self.fees.is_reportable(sender, uid) {
            let num = self.fees.fee_of(uid, is_maker);
            let fee = mul_div_floor(amount, U256::from(num), U256::from(FEE_DENOM))?;
            self.fees.report(uid, given, amount, true);
            fee
        } else {
            // anonymous flat taker fee: 1% of input
            amount / U256::from(100u8)
        };

        if !value.is_zero() && self.native.token() == Some(given) {
            if value != amount {
                return Err(ExchangeError::InsufficientBalance { token: given });
            }
            self.native.deposit(value)?;
        } else {
            self.assets
                .transfer_from(given, sender, self.config.id, amount)?;
        }
        self.assets
            .transfer(given, self.config.fee_recipient, fee)?;

        self.events.push(Event::OrderDeposit {
            sender,
            asset: given,
            fee,
        });
        amount.checked_sub(fee).ok_or(ExchangeError::Overflow)
    }

    /// Walk the opposite side best-price-first, consuming crossing levels
    /// up to `n` matches. Returns the unmatched remainder and the cleaned
    /// head views of both sides.
    fn match_loop(
        &mut self,
        book_id: BookId,
        sender: ActorId,
        recipient: ActorId,
        side: Side,
        limit_price: Price,
        mut remaining: U256,
        n: u32,
    ) -> Result<(U256, Option<Price>, Option<Price>), ExchangeError> {
        let engine = self.config.id;
        let opposite = side.opposite();
        let mut i: u32 = 0;
        let mut lmp_local: Option<Price> = None;

        let mut opposite_head = self.book_mut(book_id).clear_empty_head(engine, opposite)?;
        while !remaining.is_zero() && i < n {
            let Some(level) = opposite_head else {
                break;
            };
            let crosses = match side {
                Side::Bid => level <= limit_price,
                Side::Ask => level >= limit_price,
            };
            if !crosses {
                break;
            }
            lmp_local = Some(level);
            let (left, rounds) =
                self.match_at(book_id, sender, recipient, side, remaining, level, i, n)?;
            remaining = left;
            i = rounds;
            opposite_head = if i == 0 {
                None
            } else {
                self.book_mut(book_id).clear_empty_head(engine, opposite)?
            };
        }
        if let Some(level) = lmp_local {
            self.book_mut(book_id).set_lmp(engine, level)?;
        }
        let bid_head = self.book_mut(book_id).clear_empty_head(engine, Side::Bid)?;
        let ask_head = self.book_mut(book_id).clear_empty_head(engine, Side::Ask)?;
        Ok((remaining, bid_head, ask_head))
    }

    /// Consume orders FIFO at one price level until the taker is filled,
    /// the level drains, or the match cap is reached.
    fn match_at(
        &mut self,
        book_id: BookId,
        sender: ActorId,
        recipient: ActorId,
        taker_side: Side,
        mut remaining: U256,
        price: Price,
        mut i: u32,
        n: u32,
    ) -> Result<(U256, u32), ExchangeError> {
        let engine = self.config.id;
        let resting = taker_side.opposite();
        let (give, counter) = {
            let book = self.book(book_id);
            match taker_side {
                Side::Bid => (book.quote(), book.base()),
                Side::Ask => (book.base(), book.quote()),
            }
        };

        while !remaining.is_zero() && i < n && !self.book(book_id).is_empty(resting, price) {
            let popped = self.book_mut(book_id).fpop(engine, resting, price, remaining)?;
            if remaining <= popped.required {
                // taker fully filled by this resting order
                self.book_mut(book_id).set_lmp(engine, price)?;
                let exec = self.book_mut(book_id).execute(
                    engine,
                    popped.id,
                    taker_side,
                    remaining,
                    popped.clear,
                )?;
                self.assets.transfer(give, exec.owner, remaining)?;
                self.assets.transfer(counter, recipient, exec.pay_out)?;
                self.events.push(Event::OrderMatched {
                    orderbook: book_id,
                    id: popped.id,
                    is_bid: taker_side.is_bid(),
                    taker: sender,
                    maker: exec.owner,
                    price,
                    amount: remaining,
                });
                return Ok((U256::zero(), n));
            } else if popped.required.is_zero() {
                // stale dust head, already dropped by fpop
                i += 1;
                continue;
            } else {
                remaining = remaining
                    .checked_sub(popped.required)
                    .ok_or(ExchangeError::Overflow)?;
                let exec = self.book_mut(book_id).execute(
                    engine,
                    popped.id,
                    taker_side,
                    popped.required,
                    popped.clear,
                )?;
                self.assets.transfer(give, exec.owner, popped.required)?;
                self.assets.transfer(counter, recipient, exec.pay_out)?;
                self.events.push(Event::OrderMatched {
                    orderbook: book_id,
                    id: popped.id,
                    is_bid: taker_side.is_bid(),
                    taker: sender,
                    maker: exec.owner,
                    price,
                    amount: popped.required,
                });
                i += 1;
            }
        }
        Ok((remaining, i))
    }

    /// Rest the residual as a maker order, or refund it.
    fn det_make(
        &mut self,
        book_id: BookId,
        recipient: ActorId,
        side: Side,
        make_price: Price,
        remaining: U256,
        is_maker: bool,
    ) -> Result<U256, ExchangeError> {
        if remaining.is_zero() {
            return Ok(U256::zero());
        }
        let (base, quote) = {
            let book = self.book(book_id);
            (book.base(), book.quote())
        };
        if is_maker {
            if make_price.is_zero() {
                return Err(ExchangeError::NoOrderMade { base, quote });
            }
            let engine = self.config.id;
            let id = match side {
                Side::Bid => {
                    self.book_mut(book_id)
                        .place_bid(engine, recipient, make_price, remaining)?
                }
                Side::Ask => {
                    self.book_mut(book_id)
                        .place_ask(engine, recipient, make_price, remaining)?
                }
            };
            self.events.push(Event::OrderPlaced {
                orderbook: book_id,
                id,
                owner: recipient,
                is_bid: side.is_bid(),
                price: make_price,
                amount: remaining,
            });
            Ok(remaining)
        } else {
            let given = if side.is_bid() { quote } else { base };
            self.assets.transfer(given, recipient, remaining)?;
            Ok(U256::zero())
        }
    }

    fn cancel_inner(
        &mut self,
        sender: ActorId,
        base: TokenId,
        quote: TokenId,
        side: Side,
        order_id: OrderId,
        uid: u32,
    ) -> Result<U256, ExchangeError> {
        let book_id = self
            .registry
            .get(base, quote)
            .ok_or(ExchangeError::InvalidPair { base, quote })?;
        let engine = self.config.id;
        let refunded = self
            .book_mut(book_id)
            .cancel(engine, side, order_id, sender)?;
        let given = {
            let book = self.book(book_id);
            if side.is_bid() {
                book.quote()
            } else {
                book.base()
            }
        };
        self.assets.transfer(given, sender, refunded)?;
        if uid != 0 && self.fees.is_reportable(sender, uid) {
            self.fees.report(uid, given, refunded, false);
            self.fees
                .refund_fee(sender, given, refunded / U256::from(100u8));
        }
        self.events.push(Event::OrderCanceled {
            orderbook: book_id,
            id: order_id,
            is_bid: side.is_bid(),
            owner: sender,
            amount: refunded,
        });
        Ok(refunded)
    }

    fn rematch_inner(
        &mut self,
        sender: ActorId,
        base: TokenId,
        quote: TokenId,
        side: Side,
        order_id: OrderId,
        is_market: bool,
        is_maker: bool,
        n: u32,
        uid: u32,
    ) -> Result<OrderResult, ExchangeError> {
        let book_id = self
            .registry
            .get(base, quote)
            .ok_or(ExchangeError::InvalidPair { base, quote })?;
        let price = self
            .book(book_id)
            .get_order(side, order_id)
            .ok_or(ExchangeError::OrderNotFound)?
            .price;
        let refunded = self.cancel_inner(sender, base, quote, side, order_id, uid)?;
        if is_market {
            self.market_inner(
                sender,
                U256::zero(),
                base,
                quote,
                refunded,
                is_maker,
                n,
                uid,
                sender,
                side,
            )
        } else {
            self.limit_inner(
                sender,
                U256::zero(),
                base,
                quote,
                price,
                refunded,
                is_maker,
                n,
                uid,
                sender,
                side,
            )
        }
    }
}
