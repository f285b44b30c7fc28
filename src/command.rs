use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::account::AccountId;

/// Amounts carry at most this many fractional digits (paise/cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Open,
    TopUp,
    Transfer,
    Merchant,
    Bill,
    Ticket,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Amount is required for {kind:?}")]
    AmountRequired { kind: OperationKind },
    #[error("invalid amount {amount}: must be positive with at most 2 decimal places")]
    InvalidAmount { amount: Decimal },
    #[error("`{field}` is required for {kind:?}")]
    MissingField {
        kind: OperationKind,
        field: &'static str,
    },
}

/// Rejects non-positive amounts and amounts finer than the minor unit.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, CommandError> {
    if amount <= Decimal::ZERO || amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(CommandError::InvalidAmount { amount });
    }
    Ok(amount)
}

/// One wallet operation as it arrives from outside, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCommand {
    #[serde(rename = "op")]
    pub kind: OperationKind,
    pub account: AccountId,
    pub amount: Option<Decimal>,
    /// Holder name, merchant or biller, depending on the operation.
    pub counterparty: Option<String>,
    /// Contact, recipient contact or biller account reference.
    pub reference: Option<String>,
    pub pin: Option<String>,
    pub memo: Option<String>,
    pub line: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RawCommand {
    pub fn new(kind: OperationKind, account: AccountId) -> Self {
        Self {
            kind,
            account,
            amount: None,
            counterparty: None,
            reference: None,
            pin: None,
            memo: None,
            line: None,
            from: None,
            to: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletCommand {
    Open {
        account: AccountId,
        holder_name: String,
        contact: String,
        opening_balance: Decimal,
        pin: Option<String>,
    },
    TopUp {
        account: AccountId,
        amount: Decimal,
    },
    Transfer {
        sender: AccountId,
        recipient_contact: String,
        amount: Decimal,
        memo: Option<String>,
    },
    PayMerchant {
        payer: AccountId,
        merchant_ref: String,
        amount: Decimal,
        pin: String,
    },
    PayBill {
        payer: AccountId,
        biller_ref: String,
        account_ref: String,
        amount: Decimal,
    },
    PurchaseTicket {
        payer: AccountId,
        line: String,
        from: String,
        to: String,
        pin: String,
    },
}

impl WalletCommand {
    pub fn parse(raw: RawCommand) -> Result<Self, CommandError> {
        let kind = raw.kind;
        let field = |value: Option<String>, name: &'static str| {
            value
                .filter(|value| !value.trim().is_empty())
                .ok_or(CommandError::MissingField { kind, field: name })
        };
        let amount = |amount: Option<Decimal>| {
            amount
                .ok_or(CommandError::AmountRequired { kind })
                .and_then(validate_amount)
        };

        match kind {
            OperationKind::Open => Ok(Self::Open {
                account: raw.account,
                holder_name: field(raw.counterparty, "counterparty")?,
                contact: field(raw.reference, "reference")?,
                opening_balance: raw.amount.unwrap_or_default(),
                pin: raw.pin.filter(|pin| !pin.is_empty()),
            }),
            OperationKind::TopUp => Ok(Self::TopUp {
                account: raw.account,
                amount: amount(raw.amount)?,
            }),
            OperationKind::Transfer => Ok(Self::Transfer {
                sender: raw.account,
                recipient_contact: field(raw.reference, "reference")?,
                amount: amount(raw.amount)?,
                memo: raw.memo.filter(|memo| !memo.trim().is_empty()),
            }),
            OperationKind::Merchant => Ok(Self::PayMerchant {
                payer: raw.account,
                merchant_ref: field(raw.counterparty, "counterparty")?,
                amount: amount(raw.amount)?,
                pin: field(raw.pin, "pin")?,
            }),
            OperationKind::Bill => Ok(Self::PayBill {
                payer: raw.account,
                biller_ref: field(raw.counterparty, "counterparty")?,
                account_ref: field(raw.reference, "reference")?,
                amount: amount(raw.amount)?,
            }),
            OperationKind::Ticket => Ok(Self::PurchaseTicket {
                payer: raw.account,
                line: field(raw.line, "line")?,
                from: field(raw.from, "from")?,
                to: field(raw.to, "to")?,
                pin: field(raw.pin, "pin")?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: OperationKind) -> RawCommand {
        RawCommand::new(kind, 1)
    }

    #[test]
    fn amounts() {
        assert!(validate_amount(Decimal::new(50000, 2)).is_ok());
        assert!(validate_amount(Decimal::new(1500, 3)).is_ok()); // 1.500
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::NEGATIVE_ONE).is_err());
        assert_eq!(
            validate_amount(Decimal::new(1001, 3)),
            Err(CommandError::InvalidAmount {
                amount: Decimal::new(1001, 3)
            })
        );
    }

    #[test]
    fn parse_top_up() {
        let cmd = WalletCommand::parse(RawCommand {
            amount: Some(Decimal::from(500)),
            ..raw(OperationKind::TopUp)
        })
        .unwrap();
        assert_eq!(
            cmd,
            WalletCommand::TopUp {
                account: 1,
                amount: Decimal::from(500)
            }
        );

        let err = WalletCommand::parse(raw(OperationKind::TopUp)).unwrap_err();
        assert_eq!(
            err,
            CommandError::AmountRequired {
                kind: OperationKind::TopUp
            }
        );
        assert_eq!(err.to_string(), "Amount is required for TopUp");
    }

    #[test]
    fn parse_requires_fields() {
        let err = WalletCommand::parse(RawCommand {
            amount: Some(Decimal::from(10)),
            counterparty: Some("MERCH123".to_string()),
            pin: Some(String::new()),
            ..raw(OperationKind::Merchant)
        })
        .unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingField {
                kind: OperationKind::Merchant,
                field: "pin"
            }
        );

        let err = WalletCommand::parse(RawCommand {
            line: Some("green".to_string()),
            from: Some("Sector V".to_string()),
            pin: Some("1234".to_string()),
            ..raw(OperationKind::Ticket)
        })
        .unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingField {
                kind: OperationKind::Ticket,
                field: "to"
            }
        );
    }

    #[test]
    fn parse_transfer_drops_blank_memo() {
        let cmd = WalletCommand::parse(RawCommand {
            amount: Some(Decimal::from(100)),
            reference: Some("+919800000002".to_string()),
            memo: Some("  ".to_string()),
            ..raw(OperationKind::Transfer)
        })
        .unwrap();
        assert_eq!(
            cmd,
            WalletCommand::Transfer {
                sender: 1,
                recipient_contact: "+919800000002".to_string(),
                amount: Decimal::from(100),
                memo: None
            }
        );
    }
}
