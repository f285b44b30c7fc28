use std::collections::HashMap;

use tracing::debug;

use crate::{
    account::AccountId,
    command::{RawCommand, WalletCommand},
    config::WalletConfig,
    gate::{AuthorizationGate, CredentialValidator, GateConfig},
    wallet::{Wallet, WalletError},
};

use super::{OperationProcessError, OperationProcessor};

/// PINs registered when accounts are opened.
#[derive(Debug, Default)]
pub struct PinBook {
    pins: HashMap<AccountId, String>,
}

impl PinBook {
    pub fn register(&mut self, account_id: AccountId, pin: String) {
        self.pins.insert(account_id, pin);
    }
}

impl CredentialValidator for PinBook {
    fn verify(&self, account_id: AccountId, secret: &str) -> bool {
        self.pins.get(&account_id).is_some_and(|pin| pin == secret)
    }
}

pub struct InMemoryOperationProcessor {
    pub wallet: Wallet,
    pins: PinBook,
    gate: GateConfig,
}

impl InMemoryOperationProcessor {
    pub fn new(config: &WalletConfig) -> Self {
        Self {
            wallet: Wallet::in_memory(config),
            pins: PinBook::default(),
            gate: config.gate.clone(),
        }
    }

    fn gate_with_pin(
        &self,
        account_id: AccountId,
        pin: &str,
    ) -> Result<AuthorizationGate<'_, PinBook>, WalletError> {
        let mut gate = AuthorizationGate::new(account_id, &self.pins, self.gate.clone());
        gate.enter(pin)?;
        Ok(gate)
    }
}

impl OperationProcessor for InMemoryOperationProcessor {
    fn process_operation(&mut self, raw: RawCommand) -> Result<(), OperationProcessError> {
        debug!(kind = ?raw.kind, account = raw.account, "processing operation");
        match WalletCommand::parse(raw)? {
            WalletCommand::Open {
                account,
                holder_name,
                contact,
                opening_balance,
                pin,
            } => {
                self.wallet
                    .open_account(account, &holder_name, &contact, opening_balance)?;
                if let Some(pin) = pin {
                    self.pins.register(account, pin);
                }
            }
            WalletCommand::TopUp { account, amount } => {
                self.wallet.top_up(&account, amount)?;
            }
            WalletCommand::Transfer {
                sender,
                recipient_contact,
                amount,
                memo,
            } => {
                self.wallet.transfer(
                    &sender,
                    self.wallet.accounts(),
                    &recipient_contact,
                    amount,
                    memo.as_deref(),
                )?;
            }
            WalletCommand::PayMerchant {
                payer,
                merchant_ref,
                amount,
                pin,
            } => {
                let mut gate = self.gate_with_pin(payer, &pin)?;
                self.wallet
                    .pay_merchant(&payer, &merchant_ref, amount, &mut gate)?;
            }
            WalletCommand::PayBill {
                payer,
                biller_ref,
                account_ref,
                amount,
            } => {
                self.wallet
                    .pay_bill(&payer, &biller_ref, &account_ref, amount)?;
            }
            WalletCommand::PurchaseTicket {
                payer,
                line,
                from,
                to,
                pin,
            } => {
                let mut gate = self.gate_with_pin(payer, &pin)?;
                self.wallet
                    .purchase_ticket(&payer, &line, &from, &to, &mut gate)?;
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::{
        command::{CommandError, OperationKind},
        gate::GateError,
        ledger::{TransactionFilter, TransactionKind},
    };

    use super::*;

    fn open(account: AccountId, name: &str, contact: &str, balance: i64, pin: &str) -> RawCommand {
        RawCommand {
            amount: Some(Decimal::from(balance)),
            counterparty: Some(name.to_string()),
            reference: Some(contact.to_string()),
            pin: Some(pin.to_string()),
            ..RawCommand::new(OperationKind::Open, account)
        }
    }

    #[test]
    fn process_some_operations() {
        let mut processor = InMemoryOperationProcessor::new(&WalletConfig::default());
        processor
            .process_operation(open(1, "Asha", "+919800000001", 100, "1234"))
            .unwrap();
        processor
            .process_operation(open(2, "Ravi", "+919800000002", 0, "4321"))
            .unwrap();

        processor
            .process_operation(RawCommand {
                amount: Some(Decimal::from(40)),
                reference: Some("+919800000002".to_string()),
                ..RawCommand::new(OperationKind::Transfer, 1)
            })
            .unwrap();

        // Ravi's PIN does not open Asha's gate
        let err = processor
            .process_operation(RawCommand {
                amount: Some(Decimal::from(10)),
                counterparty: Some("MERCH123".to_string()),
                pin: Some("4321".to_string()),
                ..RawCommand::new(OperationKind::Merchant, 1)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            OperationProcessError::WalletErr(WalletError::Gate(GateError::AuthMismatch {
                remaining: 2
            }))
        ));

        processor
            .process_operation(RawCommand {
                line: Some("purple".to_string()),
                from: Some("Joka".to_string()),
                to: Some("Esplanade".to_string()),
                pin: Some("1234".to_string()),
                ..RawCommand::new(OperationKind::Ticket, 1)
            })
            .unwrap();

        let err = processor
            .process_operation(RawCommand::new(OperationKind::TopUp, 2))
            .unwrap_err();
        assert!(matches!(
            err,
            OperationProcessError::CommandErr(CommandError::AmountRequired {
                kind: OperationKind::TopUp
            })
        ));

        let wallet = &processor.wallet;
        assert_eq!(wallet.get_balance(&1).unwrap(), Decimal::from(33));
        assert_eq!(wallet.get_balance(&2).unwrap(), Decimal::from(40));
        let kinds: Vec<_> = wallet
            .list_transactions(&1, TransactionFilter::default())
            .unwrap()
            .map(|record| record.unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![TransactionKind::BillPayment, TransactionKind::Sent]
        );
    }

    #[test]
    fn unknown_pin_holder_never_verifies() {
        let pins = PinBook::default();
        assert!(!pins.verify(1, "1234"));
    }
}
