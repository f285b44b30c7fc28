/// Wallet accounts and their balances.
/// Balances are modified using events, which are created by handling adjustments.
pub mod account;

/// Raw operations as they arrive from outside, and their validation into
/// [`command::WalletCommand`].
pub mod command;

/// Settings loaded from file and environment.
pub mod config;

/// Distance-based fare computation for transit tickets.
pub mod fare;

/// PIN re-verification in front of sensitive operations.
pub mod gate;

/// Append-only transaction history, plus "in memory" implementation.
pub mod ledger;

/// Transit network catalogue, ticket memos and ticket validity.
pub mod transit;

/// Money movement operations that tie accounts, ledger and gate together.
pub mod wallet;

/// Operation processor interface, plus "in memory" implementation.
/// Coordinates command parsing, PIN checks and wallet operations.
///
/// NOTE: Technically this interface is not necessary, but it is a good
/// integration point to replace the in memory implementation with
/// something persistent.
pub mod processor;

/// Ideally, this module should exist in its own crate, as a way to
/// bootstrap core logic. However, it is used by the integration test,
/// so it lives here.
pub mod bin_utils;
