use sails_rs::U256;

use safex_common::{mul_div_floor, ExchangeError, Price, PRICE_SCALE};

/// Quote value of a base amount: `amount * price / 1e8`, normalized by the
/// pair's decimal differential. Truncating.
pub fn base_to_quote(
    amount: U256,
    price: Price,
    dec_diff: U256,
    base_dec_ge_quote: bool,
) -> Result<U256, ExchangeError> {
    if price.is_zero() {
        return Err(ExchangeError::InvalidPrice);
    }
    let scaled = mul_div_floor(amount, price, U256::from(PRICE_SCALE))?;
    if base_dec_ge_quote {
        Ok(scaled / dec_diff)
    } else {
        scaled.checked_mul(dec_diff).ok_or(ExchangeError::Overflow)
    }
}

/// Base value of a quote amount: `amount * 1e8 / price`, normalized by the
/// pair's decimal differential. Truncating.
pub fn quote_to_base(
    amount: U256,
    price: Price,
    dec_diff: U256,
    base_dec_ge_quote: bool,
) -> Result<U256, ExchangeError> {
    if price.is_zero() {
        return Err(ExchangeError::InvalidPrice);
    }
    let scaled = mul_div_floor(amount, U256::from(PRICE_SCALE), price)?;
    if base_dec_ge_quote {
        scaled.checked_mul(dec_diff).ok_or(ExchangeError::Overflow)
    } else {
        Ok(scaled / dec_diff)
    }
}
