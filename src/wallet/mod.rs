use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{AccountError, AccountId, AccountStore},
    command::CommandError,
    fare::FareError,
    gate::GateError,
    ledger::{LedgerError, TransactionRecord},
    transit::Ticket,
};

mod operations;

pub use operations::Wallet;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no signed-in account")]
    Unauthenticated,
    #[error("no account registered for contact `{0}`")]
    ContactNotFound(String),
    #[error("{0} is required")]
    MissingReference(&'static str),
    #[error("cannot transfer to the sending account")]
    SelfTransfer,
    #[error("commit failed and was rolled back: {0}")]
    CommitFailed(#[source] LedgerError),
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Fare(#[from] FareError),
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Maps the caller's context to the acting account.
pub trait IdentityResolver {
    fn current_account(&self) -> Option<AccountId>;
}

impl IdentityResolver for AccountId {
    fn current_account(&self) -> Option<AccountId> {
        Some(*self)
    }
}

impl IdentityResolver for Option<AccountId> {
    fn current_account(&self) -> Option<AccountId> {
        *self
    }
}

/// Maps a peer's contact identifier to their account.
pub trait ContactDirectory {
    fn resolve(&self, contact: &str) -> Option<AccountId>;
}

impl ContactDirectory for AccountStore {
    fn resolve(&self, contact: &str) -> Option<AccountId> {
        self.find_by_contact(contact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPurchase {
    pub record: TransactionRecord,
    /// Discounted fare actually debited.
    pub fare_charged: Decimal,
    pub valid_until: DateTime<Utc>,
}

impl TicketPurchase {
    pub fn ticket(&self) -> Option<Ticket> {
        Ticket::from_record(&self.record)
    }
}
