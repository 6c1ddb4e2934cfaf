#![no_std]

extern crate alloc;

mod config;
mod engine;
mod ports;

pub use config::{EngineConfig, GasMode, YieldMode};
pub use engine::{CancelRequest, MatchingEngine, OrderResult};
pub use ports::{Assets, FeeBridge, NativeWrapper, NoNative};
