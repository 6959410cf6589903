#[macro_use]
extern crate serde;

mod code_shares;
mod config;
mod context;
mod elgamal;
mod error;
mod exactly_once;
mod group;
mod hash;
mod kdf;
mod keygen;
mod lcc_share;
mod lvcc_hash;
mod lvcc_share;
mod message;
mod mixnet;
mod node;
mod orchestrator;
mod proof;
mod serde_hex;
mod setup;
mod signed;
mod store;
mod util;
mod verification_card;

pub use code_shares::*;
pub use config::*;
pub use context::*;
pub use elgamal::*;
pub use error::*;
pub use exactly_once::*;
pub use group::*;
pub use hash::*;
pub use kdf::*;
pub use keygen::*;
pub use lcc_share::*;
pub use lvcc_hash::*;
pub use lvcc_share::*;
pub use message::*;
pub use mixnet::*;
pub use node::*;
pub use orchestrator::*;
pub use proof::*;
pub use serde_hex::*;
pub use setup::*;
pub use signed::*;
pub use store::*;
pub use util::*;
pub use verification_card::*;

#[cfg(test)]
mod tests;
