use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::{
    account::{Account, AccountError, AccountId, AccountStore},
    command::validate_amount,
    config::WalletConfig,
    fare::FareSchedule,
    gate::{AuthorizationGate, CredentialValidator},
    ledger::{
        History, LedgerError, NewTransaction, TransactionFilter, TransactionKind,
        TransactionLedger, TransactionRecord, in_memory::InMemoryLedger,
    },
    transit::{RouteMemo, TICKET_VALIDITY_MINUTES, TransitNetwork},
};

use super::{ContactDirectory, IdentityResolver, TicketPurchase, WalletError};

const TOP_UP_MEMO: &str = "Added to wallet";

/// One balance adjustment together with the record that explains it.
struct Leg {
    delta: Decimal,
    entry: NewTransaction,
}

impl Leg {
    fn credit(entry: NewTransaction) -> Self {
        Self {
            delta: entry.amount,
            entry,
        }
    }

    fn debit(entry: NewTransaction) -> Self {
        Self {
            delta: -entry.amount,
            entry,
        }
    }
}

/// Money movement over an account store and a transaction ledger.
///
/// Every operation validates before touching any balance, and commits its balance changes
/// together with their ledger records: if the ledger refuses the append, the balances are
/// restored and [`WalletError::CommitFailed`] is returned.
pub struct Wallet<L = InMemoryLedger> {
    accounts: AccountStore,
    ledger: L,
    fares: FareSchedule,
    network: TransitNetwork,
    page_size: usize,
}

impl Wallet<InMemoryLedger> {
    pub fn in_memory(config: &WalletConfig) -> Self {
        Self::new(InMemoryLedger::default(), config)
    }
}

impl<L> Wallet<L>
where
    L: TransactionLedger,
{
    pub fn new(ledger: L, config: &WalletConfig) -> Self {
        Self {
            accounts: AccountStore::default(),
            ledger,
            fares: config.fares.clone(),
            network: TransitNetwork::kolkata_metro(),
            page_size: config.history_page_size,
        }
    }

    pub fn with_network(mut self, network: TransitNetwork) -> Self {
        self.network = network;
        self
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn fares(&self) -> &FareSchedule {
        &self.fares
    }

    pub fn network(&self) -> &TransitNetwork {
        &self.network
    }

    pub fn open_account(
        &self,
        id: AccountId,
        holder_name: &str,
        contact: &str,
        opening_balance: Decimal,
    ) -> Result<(), WalletError> {
        if !opening_balance.is_zero() {
            validate_amount(opening_balance)?;
        }
        self.accounts
            .open_account(Account::new(id, holder_name, contact, opening_balance))?;
        info!(account_id = id, %opening_balance, "account opened");
        Ok(())
    }

    pub fn get_balance(&self, actor: &impl IdentityResolver) -> Result<Decimal, WalletError> {
        let account_id = Self::resolve(actor)?;
        Ok(self.accounts.get_balance(account_id)?)
    }

    pub fn top_up(
        &self,
        actor: &impl IdentityResolver,
        amount: Decimal,
    ) -> Result<TransactionRecord, WalletError> {
        let account_id = Self::resolve(actor)?;
        let amount = validate_amount(amount)?;
        let entry = NewTransaction::new(account_id, TransactionKind::TopUp, amount)
            .memo(Some(TOP_UP_MEMO.to_string()));
        let [record] = self.commit([Leg::credit(entry)])?;
        Ok(record)
    }

    /// Moves `amount` to the account registered under `recipient_contact`, returning the
    /// `sent` and `received` records.
    pub fn transfer(
        &self,
        sender: &impl IdentityResolver,
        directory: &impl ContactDirectory,
        recipient_contact: &str,
        amount: Decimal,
        memo: Option<&str>,
    ) -> Result<(TransactionRecord, TransactionRecord), WalletError> {
        let sender_id = Self::resolve(sender)?;
        let amount = validate_amount(amount)?;
        let recipient_id = directory
            .resolve(recipient_contact)
            .ok_or_else(|| WalletError::ContactNotFound(recipient_contact.to_string()))?;
        if recipient_id == sender_id {
            return Err(WalletError::SelfTransfer);
        }

        let payer = self.accounts.account(sender_id)?;
        if payer.balance() < amount {
            return Err(AccountError::InsufficientFunds {
                have: payer.balance(),
                need: amount,
            }
            .into());
        }
        let payee = self.accounts.account(recipient_id)?;

        let at = Utc::now();
        let memo = memo.map(str::to_owned);
        let sent = NewTransaction::new(sender_id, TransactionKind::Sent, amount)
            .counterparty(payee.holder_name())
            .counterparty_ref(payee.contact())
            .memo(memo.clone())
            .at(at);
        let received = NewTransaction::new(recipient_id, TransactionKind::Received, amount)
            .counterparty(payer.holder_name())
            .counterparty_ref(payer.contact())
            .memo(memo)
            .at(at);

        let [sent, received] = self.commit([Leg::debit(sent), Leg::credit(received)])?;
        Ok((sent, received))
    }

    /// Pays an external merchant once `gate` approves.
    pub fn pay_merchant<V>(
        &self,
        payer: &impl IdentityResolver,
        merchant_ref: &str,
        amount: Decimal,
        gate: &mut AuthorizationGate<'_, V>,
    ) -> Result<TransactionRecord, WalletError>
    where
        V: CredentialValidator + ?Sized,
    {
        let payer_id = Self::resolve(payer)?;
        Self::ensure_gate_account(gate, payer_id)?;
        let merchant_ref = Self::required(merchant_ref, "merchant reference")?;
        let amount = validate_amount(amount)?;
        self.ensure_funds(payer_id, amount)?;

        let entry = NewTransaction::new(payer_id, TransactionKind::MerchantPayment, amount)
            .counterparty(merchant_ref)
            .counterparty_ref(merchant_ref)
            .memo(Some(format!("Payment to {merchant_ref}")));
        let [record] = gate.submit(|| self.commit([Leg::debit(entry)]))?;
        Ok(record)
    }

    pub fn pay_bill(
        &self,
        payer: &impl IdentityResolver,
        biller_ref: &str,
        account_ref: &str,
        amount: Decimal,
    ) -> Result<TransactionRecord, WalletError> {
        let payer_id = Self::resolve(payer)?;
        let biller_ref = Self::required(biller_ref, "biller")?;
        let account_ref = Self::required(account_ref, "biller account reference")?;
        let amount = validate_amount(amount)?;
        self.ensure_funds(payer_id, amount)?;

        let entry = NewTransaction::new(payer_id, TransactionKind::BillPayment, amount)
            .counterparty(biller_ref)
            .counterparty_ref(account_ref)
            .memo(Some(format!("Bill payment for {account_ref}")));
        let [record] = self.commit([Leg::debit(entry)])?;
        Ok(record)
    }

    /// Buys a single-journey ticket on `line`, charging the discounted fare once `gate`
    /// approves. The record's memo carries the route as a [`RouteMemo`].
    pub fn purchase_ticket<V>(
        &self,
        payer: &impl IdentityResolver,
        line: &str,
        from: &str,
        to: &str,
        gate: &mut AuthorizationGate<'_, V>,
    ) -> Result<TicketPurchase, WalletError>
    where
        V: CredentialValidator + ?Sized,
    {
        let payer_id = Self::resolve(payer)?;
        Self::ensure_gate_account(gate, payer_id)?;
        let transit_line = self.network.line(line)?;
        let fare = self.fares.fare(transit_line, from, to)?;
        let charge = validate_amount(self.fares.discounted(fare))?;
        debug!(line, from, to, %fare, %charge, "ticket priced");
        self.ensure_funds(payer_id, charge)?;

        let memo = RouteMemo::metro(from, to, transit_line.name());
        let entry = NewTransaction::new(payer_id, TransactionKind::BillPayment, charge)
            .counterparty(self.network.operator())
            .counterparty_ref(transit_line.key())
            .memo(Some(memo.to_string()));
        let [record] = gate.submit(|| self.commit([Leg::debit(entry)]))?;

        let valid_until = record.created_at + Duration::minutes(TICKET_VALIDITY_MINUTES);
        Ok(TicketPurchase {
            record,
            fare_charged: charge,
            valid_until,
        })
    }

    /// Newest-first history of the acting account, fetched lazily page by page.
    pub fn list_transactions(
        &self,
        actor: &impl IdentityResolver,
        filter: TransactionFilter,
    ) -> Result<History<'_, L>, WalletError> {
        let account_id = Self::resolve(actor)?;
        self.accounts.get_balance(account_id)?;
        Ok(History::new(
            &self.ledger,
            account_id,
            filter,
            self.page_size,
        ))
    }

    pub fn recent_transactions(
        &self,
        actor: &impl IdentityResolver,
        count: usize,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        self.list_transactions(actor, TransactionFilter::default())?
            .take(count)
            .collect::<Result<_, _>>()
            .map_err(WalletError::Ledger)
    }

    fn resolve(actor: &impl IdentityResolver) -> Result<AccountId, WalletError> {
        actor.current_account().ok_or(WalletError::Unauthenticated)
    }

    fn required<'a>(value: &'a str, what: &'static str) -> Result<&'a str, WalletError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(WalletError::MissingReference(what));
        }
        Ok(value)
    }

    // the secret must have been checked against the paying account
    fn ensure_gate_account<V>(
        gate: &AuthorizationGate<'_, V>,
        payer_id: AccountId,
    ) -> Result<(), WalletError>
    where
        V: CredentialValidator + ?Sized,
    {
        if gate.account_id() != payer_id {
            return Err(WalletError::Unauthenticated);
        }
        Ok(())
    }

    fn ensure_funds(&self, account_id: AccountId, amount: Decimal) -> Result<(), WalletError> {
        let have = self.accounts.get_balance(account_id)?;
        if have < amount {
            return Err(AccountError::InsufficientFunds { have, need: amount }.into());
        }
        Ok(())
    }

    /// Applies every leg's balance change and appends every leg's record as one unit.
    fn commit<const N: usize>(&self, legs: [Leg; N]) -> Result<[TransactionRecord; N], WalletError> {
        let ids = legs.each_ref().map(|leg| leg.entry.account_id);
        self.accounts
            .with_locked(&ids, |accounts| -> Result<[TransactionRecord; N], WalletError> {
                let events = accounts
                    .iter()
                    .zip(&legs)
                    .map(|(account, leg)| account.handle_adjustment(leg.delta))
                    .collect::<Result<Vec<_>, _>>()?;
                for (account, event) in accounts.iter_mut().zip(&events) {
                    account.apply(event);
                }

                let entries = legs.into_iter().map(|leg| leg.entry).collect();
                let appended = self.ledger.append(entries).and_then(|records| {
                    <[TransactionRecord; N]>::try_from(records).map_err(|records| {
                        LedgerError::Malformed(format!(
                            "expected {N} records, ledger returned {}",
                            records.len()
                        ))
                    })
                });

                match appended {
                    Ok(records) => {
                        for record in &records {
                            info!(
                                transaction_id = record.id,
                                account_id = record.account_id,
                                kind = %record.kind,
                                amount = %record.amount,
                                "transaction committed"
                            );
                        }
                        Ok(records)
                    }
                    Err(err) => {
                        for (account, event) in accounts.iter_mut().zip(&events) {
                            account.apply(&event.reversed());
                        }
                        warn!(error = %err, accounts = ?ids, "ledger append failed, balances restored");
                        Err(WalletError::CommitFailed(err))
                    }
                }
            })?
    }
}
