#![no_std]

extern crate alloc;

use sails_rs::prelude::*;
use sails_rs::U256;

/// Opaque fungible asset identity. Tokens are tagged by actor id, the same
/// way trader accounts are.
pub type TokenId = ActorId;
/// Compact per-side order id. 0 is reserved and never issued.
pub type OrderId = u32;
/// Stable orderbook handle assigned by the registry.
pub type BookId = u32;
/// Unsigned price with 8 implied decimals: 1 base unit corresponds to
/// `price / 1e8` quote units, normalized by the pair's decimal differential.
pub type Price = U256;

/// Fixed-point scale of [`Price`].
pub const PRICE_SCALE: u128 = 100_000_000;
/// Denominator for fee numerators reported by the fee oracle.
pub const FEE_DENOM: u128 = 1_000_000;
/// Default taker fee when `uid == 0`: 1% of input (`FEE_DENOM / 100`).
pub const DEFAULT_FEE_NUM: u128 = 10_000;
/// Hard cap on matched orders per public call.
pub const MAX_MATCHES: u32 = 20;
/// Spread band around the last matched price, as numerator over
/// [`SPREAD_DENOM`]: new limit prices must stay within ±10% of LMP.
pub const SPREAD_NUM: u128 = 1;
pub const SPREAD_DENOM: u128 = 10;
/// Assets with more than 18 decimals are rejected at pair creation.
pub const MAX_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// A bid deposits quote and receives base; an ask is the mirror.
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }
}

/// floor(a * b / denom) with overflow checking.
pub fn mul_div_floor(a: U256, b: U256, denom: U256) -> Result<U256, ExchangeError> {
    if denom.is_zero() {
        return Err(ExchangeError::Overflow);
    }
    let prod = a.checked_mul(b).ok_or(ExchangeError::Overflow)?;
    Ok(prod / denom)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    TooManyMatches { n: u32 },
    InvalidPair { base: TokenId, quote: TokenId },
    PairExists { base: TokenId, quote: TokenId },
    NoOrderMade { base: TokenId, quote: TokenId },
    OrderSizeTooSmall { amount: U256, min: U256 },
    BidPriceTooLow { limit: Price, lmp: Price, floor: Price },
    AskPriceTooHigh { limit: Price, lmp: Price, ceiling: Price },
    InvalidAccess { sender: ActorId, expected: ActorId },
    Unauthorized,
    OrderNotFound,
    InvalidDecimals { base: u8, quote: u8 },
    InvalidPrice,
    NoLastMatchedPrice,
    Reentrancy,
    Overflow,
    InsufficientBalance { token: TokenId },
}

/// Observable event stream. Field order is stable and part of the wire
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub enum Event {
    PairAdded {
        orderbook: BookId,
        base: TokenId,
        quote: TokenId,
        base_decimals: u8,
        quote_decimals: u8,
    },
    OrderDeposit {
        sender: ActorId,
        asset: TokenId,
        fee: U256,
    },
    OrderPlaced {
        orderbook: BookId,
        id: OrderId,
        owner: ActorId,
        is_bid: bool,
        price: Price,
        amount: U256,
    },
    OrderMatched {
        orderbook: BookId,
        id: OrderId,
        is_bid: bool,
        taker: ActorId,
        maker: ActorId,
        price: Price,
        amount: U256,
    },
    OrderCanceled {
        orderbook: BookId,
        id: OrderId,
        is_bid: bool,
        owner: ActorId,
        amount: U256,
    },
}
