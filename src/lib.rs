pub mod auto_bet;

pub mod config;

pub mod dice_service;

pub mod error;

pub mod ledger;

pub mod odds;

pub mod resolver;

pub mod seed;

pub mod session;

pub mod test_helpers;

pub mod verify;
