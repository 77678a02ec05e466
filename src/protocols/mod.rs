//! Protocol layer: masking coefficients and the key-exchange state machine.

pub mod key_exchange;
pub mod masking;

pub use key_exchange::{
    DiffieHellman, ExchangeState, KeyExchange, Party, PrivateKey, PublicKey, Role, SharedSecret,
};
pub use masking::sample_masking_element;
