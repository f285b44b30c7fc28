use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::account::AccountId;

use super::{
    LedgerError, NewTransaction, TransactionId, TransactionLedger, TransactionRecord,
    TransactionStatus,
};

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<TransactionRecord>,
    // positions into `records`, ascending by id
    by_account: HashMap<AccountId, Vec<usize>>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionLedger for InMemoryLedger {
    fn append(&self, entries: Vec<NewTransaction>) -> Result<Vec<TransactionRecord>, LedgerError> {
        if let Some(entry) = entries.iter().find(|entry| entry.amount <= Decimal::ZERO) {
            return Err(LedgerError::Malformed(format!(
                "{} of {} for account {} is not positive",
                entry.kind, entry.amount, entry.account_id
            )));
        }

        let now = Utc::now();
        let mut state = self.state.write();
        let mut appended = Vec::with_capacity(entries.len());
        for entry in entries {
            let position = state.records.len();
            let record = TransactionRecord {
                id: position as TransactionId + 1,
                account_id: entry.account_id,
                kind: entry.kind,
                amount: entry.amount,
                counterparty: entry.counterparty,
                counterparty_ref: entry.counterparty_ref,
                memo: entry.memo,
                status: TransactionStatus::Completed,
                created_at: entry.created_at.unwrap_or(now),
            };
            state
                .by_account
                .entry(record.account_id)
                .or_default()
                .push(position);
            state.records.push(record.clone());
            appended.push(record);
        }
        Ok(appended)
    }

    fn page(
        &self,
        account_id: AccountId,
        before: Option<TransactionId>,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let state = self.state.read();
        let Some(positions) = state.by_account.get(&account_id) else {
            return Ok(Vec::new());
        };
        let end = match before {
            Some(before) => positions.partition_point(|&pos| state.records[pos].id < before),
            None => positions.len(),
        };
        Ok(positions[..end]
            .iter()
            .rev()
            .take(limit)
            .map(|&pos| state.records[pos].clone())
            .collect())
    }
}
