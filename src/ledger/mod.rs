use std::{collections::VecDeque, fmt};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::account::AccountId;

pub mod in_memory;

pub type TransactionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    TopUp,
    Sent,
    Received,
    MerchantPayment,
    BillPayment,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::TopUp => "top_up",
            TransactionKind::Sent => "sent",
            TransactionKind::Received => "received",
            TransactionKind::MerchantPayment => "merchant_payment",
            TransactionKind::BillPayment => "bill_payment",
        };
        f.write_str(name)
    }
}

/// Only completed entries are recorded for now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionStatus {
    #[default]
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub counterparty: Option<String>,
    /// Machine identifier of the other party: peer contact, merchant id, biller account.
    pub counterparty_ref: Option<String>,
    pub memo: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// A record that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub counterparty: Option<String>,
    pub counterparty_ref: Option<String>,
    pub memo: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewTransaction {
    pub fn new(account_id: AccountId, kind: TransactionKind, amount: Decimal) -> Self {
        Self {
            account_id,
            kind,
            amount,
            counterparty: None,
            counterparty_ref: None,
            memo: None,
            created_at: None,
        }
    }

    pub fn counterparty(mut self, name: impl Into<String>) -> Self {
        self.counterparty = Some(name.into());
        self
    }

    pub fn counterparty_ref(mut self, reference: impl Into<String>) -> Self {
        self.counterparty_ref = Some(reference.into());
        self
    }

    pub fn memo(mut self, memo: Option<String>) -> Self {
        self.memo = memo;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger storage unavailable: {0}")]
    Unavailable(String),
    #[error("malformed ledger entry: {0}")]
    Malformed(String),
}

/// Append-only transaction storage.
///
/// NOTE: the in-memory ledger is the only implementation shipped with the crate, the trait
/// is the seam where a durable store plugs in.
pub trait TransactionLedger: Send + Sync {
    /// Appends every entry or none of them, assigning ids and missing timestamps.
    fn append(&self, entries: Vec<NewTransaction>) -> Result<Vec<TransactionRecord>, LedgerError>;

    /// Up to `limit` records of `account_id`, newest first, strictly older than `before`.
    fn page(
        &self,
        account_id: AccountId,
        before: Option<TransactionId>,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;
}

/// History view buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindBucket {
    #[default]
    All,
    Sent,
    /// Money coming in: peer transfers and top-ups.
    Received,
    /// Money going to merchants and billers.
    Bills,
}

impl KindBucket {
    pub fn contains(self, kind: TransactionKind) -> bool {
        match self {
            KindBucket::All => true,
            KindBucket::Sent => kind == TransactionKind::Sent,
            KindBucket::Received => {
                matches!(kind, TransactionKind::Received | TransactionKind::TopUp)
            }
            KindBucket::Bills => matches!(
                kind,
                TransactionKind::BillPayment | TransactionKind::MerchantPayment
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub bucket: KindBucket,
    /// Case-insensitive substring matched against counterparty, its reference and the memo.
    pub search: Option<String>,
}

impl TransactionFilter {
    pub fn bucket(bucket: KindBucket) -> Self {
        Self {
            bucket,
            search: None,
        }
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.search = (!query.trim().is_empty()).then(|| query.trim().to_lowercase());
        self
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if !self.bucket.contains(record.kind) {
            return false;
        }
        let Some(query) = &self.search else {
            return true;
        };
        [&record.counterparty, &record.counterparty_ref, &record.memo]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(query.as_str()))
    }
}

/// Lazy newest-first walk over one account's records.
///
/// Pages are fetched from the ledger on demand, so the whole history is never held in
/// memory. [`History::rewind`] starts the walk over.
#[derive(Debug)]
pub struct History<'l, L: ?Sized> {
    ledger: &'l L,
    account_id: AccountId,
    filter: TransactionFilter,
    page_size: usize,
    cursor: Option<TransactionId>,
    buffer: VecDeque<TransactionRecord>,
    exhausted: bool,
}

impl<'l, L> History<'l, L>
where
    L: TransactionLedger + ?Sized,
{
    pub fn new(
        ledger: &'l L,
        account_id: AccountId,
        filter: TransactionFilter,
        page_size: usize,
    ) -> Self {
        Self {
            ledger,
            account_id,
            filter,
            page_size: page_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn rewind(&mut self) {
        self.cursor = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    fn fetch_page(&mut self) -> Result<(), LedgerError> {
        let page = self
            .ledger
            .page(self.account_id, self.cursor, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(last.id);
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<L> Iterator for History<'_, L>
where
    L: TransactionLedger + ?Sized,
{
    type Item = Result<TransactionRecord, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                if self.filter.matches(&record) {
                    return Some(Ok(record));
                }
                continue;
            }
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
    }
}
