use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, MutexGuard, RwLock};
use rust_decimal::Decimal;
use thiserror::Error;

pub type AccountId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEventKind {
    Credited,
    Debited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEvent {
    amount: Decimal,
    kind: AccountEventKind,
}

impl AccountEvent {
    /// The event that undoes this one.
    pub fn reversed(&self) -> Self {
        let kind = match self.kind {
            AccountEventKind::Credited => AccountEventKind::Debited,
            AccountEventKind::Debited => AccountEventKind::Credited,
        };
        Self {
            amount: self.amount,
            kind,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("account {0} not found")]
    NotFound(AccountId),
    #[error("account {0} already exists")]
    AlreadyExists(AccountId),
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientFunds { have: Decimal, need: Decimal },
    #[error("opening balance {0} is negative")]
    NegativeOpeningBalance(Decimal),
    #[error("contact `{0}` is already registered")]
    ContactTaken(String),
    #[error("crediting {amount} would overflow balance {balance}")]
    BalanceOverflow { balance: Decimal, amount: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    holder_name: String,
    contact: String,
    balance: Decimal,
}

impl Account {
    pub fn new(
        id: AccountId,
        holder_name: impl Into<String>,
        contact: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Self {
            id,
            holder_name: holder_name.into(),
            contact: contact.into(),
            balance,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn apply(&mut self, event: &AccountEvent) {
        match event.kind {
            AccountEventKind::Credited => self.balance += event.amount,
            AccountEventKind::Debited => self.balance -= event.amount,
        }
    }

    /// Validates `balance += delta` and returns the event that performs it.
    pub fn handle_adjustment(&self, delta: Decimal) -> Result<AccountEvent, AccountError> {
        if delta.is_sign_negative() {
            let need = -delta;
            if self.balance < need {
                return Err(AccountError::InsufficientFunds {
                    have: self.balance,
                    need,
                });
            }
            Ok(AccountEvent {
                amount: need,
                kind: AccountEventKind::Debited,
            })
        } else {
            if self.balance.checked_add(delta).is_none() {
                return Err(AccountError::BalanceOverflow {
                    balance: self.balance,
                    amount: delta,
                });
            }
            Ok(AccountEvent {
                amount: delta,
                kind: AccountEventKind::Credited,
            })
        }
    }
}

/// Balance records, one mutex per account.
///
/// Readers and writers of the same account serialize on that account's mutex, so a
/// read-check-write never interleaves with another writer. Multi-account units lock in
/// ascending id order.
#[derive(Debug, Default)]
pub struct AccountStore {
    index: RwLock<AccountIndex>,
}

#[derive(Debug, Default)]
struct AccountIndex {
    by_id: HashMap<AccountId, Arc<Mutex<Account>>>,
    // contacts are immutable once opened, so this never goes stale
    by_contact: HashMap<String, AccountId>,
}

impl AccountStore {
    pub fn open_account(&self, account: Account) -> Result<(), AccountError> {
        if account.balance.is_sign_negative() {
            return Err(AccountError::NegativeOpeningBalance(account.balance));
        }
        let contact = account.contact.trim().to_string();
        let mut index = self.index.write();
        if index.by_id.contains_key(&account.id) {
            return Err(AccountError::AlreadyExists(account.id));
        }
        if index.by_contact.contains_key(&contact) {
            return Err(AccountError::ContactTaken(contact));
        }
        index.by_contact.insert(contact, account.id);
        index.by_id.insert(account.id, Arc::new(Mutex::new(account)));
        Ok(())
    }

    pub fn account(&self, id: AccountId) -> Result<Account, AccountError> {
        let handle = self.handle(id)?;
        let account = handle.lock().clone();
        Ok(account)
    }

    pub fn get_balance(&self, id: AccountId) -> Result<Decimal, AccountError> {
        let handle = self.handle(id)?;
        let balance = handle.lock().balance;
        Ok(balance)
    }

    /// Applies `balance += delta` and returns the resulting balance.
    pub fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Decimal, AccountError> {
        self.with_locked(&[id], |accounts| -> Result<Decimal, AccountError> {
            let account = &mut accounts[0];
            let event = account.handle_adjustment(delta)?;
            account.apply(&event);
            Ok(account.balance)
        })?
    }

    pub fn find_by_contact(&self, contact: &str) -> Option<AccountId> {
        self.index.read().by_contact.get(contact.trim()).copied()
    }

    /// Snapshot of every account, ordered by id.
    pub fn snapshot(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .index
            .read()
            .by_id
            .values()
            .map(|account| account.lock().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    /// Runs `f` with every account in `ids` locked. Guards are handed over in the order of
    /// `ids`. `ids` must not contain duplicates.
    pub(crate) fn with_locked<R>(
        &self,
        ids: &[AccountId],
        f: impl FnOnce(&mut [MutexGuard<'_, Account>]) -> R,
    ) -> Result<R, AccountError> {
        let handles = {
            let index = self.index.read();
            ids.iter()
                .map(|id| index.by_id.get(id).cloned().ok_or(AccountError::NotFound(*id)))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut order: Vec<usize> = (0..ids.len()).collect();
        order.sort_by_key(|&pos| ids[pos]);
        debug_assert!(order.windows(2).all(|w| ids[w[0]] != ids[w[1]]));

        let mut locked: Vec<(usize, MutexGuard<'_, Account>)> = order
            .into_iter()
            .map(|pos| (pos, handles[pos].lock()))
            .collect();
        locked.sort_by_key(|(pos, _)| *pos);
        let mut guards: Vec<MutexGuard<'_, Account>> =
            locked.into_iter().map(|(_, guard)| guard).collect();

        Ok(f(&mut guards))
    }

    fn handle(&self, id: AccountId) -> Result<Arc<Mutex<Account>>, AccountError> {
        self.index
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(AccountError::NotFound(id))
    }
}
