use sails_rs::prelude::*;

/// Chain yield shim options, constructor-time configuration only. None of
/// these reach the matching path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldMode {
    Automatic,
    Void,
    Claimable,
}

/// Chain gas shim options, constructor-time configuration only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasMode {
    Void,
    Claimable,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The engine's own account: deposit custodian and the id orderbooks
    /// accept mutations from.
    pub id: ActorId,
    /// Treasury receiving collected fees.
    pub fee_recipient: ActorId,
    pub yield_mode: YieldMode,
    pub gas_mode: GasMode,
    pub governor: Option<ActorId>,
}

impl EngineConfig {
    pub fn new(id: ActorId, fee_recipient: ActorId) -> Self {
        Self {
            id,
            fee_recipient,
            yield_mode: YieldMode::Void,
            gas_mode: GasMode::Void,
            governor: None,
        }
    }
}
