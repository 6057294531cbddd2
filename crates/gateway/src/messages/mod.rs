//! Wire message types exchanged with an exchange adapter

pub mod account;
pub mod market;
pub mod order;
