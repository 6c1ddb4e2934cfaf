use sails_rs::prelude::*;
use sails_rs::U256;

use safex_common::{ExchangeError, TokenId};

/// Fungible asset capability consumed by the engine: move balances and read
/// decimals. `transfer` spends the engine's own holdings; `transfer_from`
/// pulls a depositor's funds into custody. Failures propagate unchanged.
pub trait Assets {
    fn transfer(&mut self, token: TokenId, to: ActorId, amount: U256) -> Result<(), ExchangeError>;
    fn transfer_from(
        &mut self,
        token: TokenId,
        from: ActorId,
        to: ActorId,
        amount: U256,
    ) -> Result<(), ExchangeError>;
    fn decimals(&self, token: TokenId) -> Result<u8, ExchangeError>;
}

/// Boundary to the external membership registry and revenue accountant:
/// fee-tier lookups plus the reporting sink for collected and refunded fees.
pub trait FeeBridge {
    fn is_reportable(&self, sender: ActorId, uid: u32) -> bool;
    /// Fee numerator against [`safex_common::FEE_DENOM`].
    fn fee_of(&self, uid: u32, is_maker: bool) -> u32;
    fn report(&mut self, uid: u32, token: TokenId, amount: U256, is_add: bool);
    fn refund_fee(&mut self, to: ActorId, token: TokenId, amount: U256);
}

/// Wrapped-native token shim, used only to bridge native-value callers into
/// the normal token path.
pub trait NativeWrapper {
    /// Identity of the wrapped token, or `None` when the deployment has no
    /// native bridge.
    fn token(&self) -> Option<TokenId>;
    fn deposit(&mut self, value: U256) -> Result<(), ExchangeError>;
    fn withdraw(&mut self, amount: U256) -> Result<(), ExchangeError>;
    fn transfer(&mut self, to: ActorId, value: U256) -> Result<(), ExchangeError>;
}

/// Engines deployed without a wrapped native token.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNative;

impl NativeWrapper for NoNative {
    fn token(&self) -> Option<TokenId> {
        None
    }

    fn deposit(&mut self, _value: U256) -> Result<(), ExchangeError> {
        Ok(())
    }

    fn withdraw(&mut self, _amount: U256) -> Result<(), ExchangeError> {
        Ok(())
    }

    fn transfer(&mut self, _to: ActorId, _value: U256) -> Result<(), ExchangeError> {
        Ok(())
    }
}
