use std::io::Write;

use crate::account::{Account, AccountId};
use anyhow::Context;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, PartialEq, Serialize)]
pub struct AccountRow {
    pub account: AccountId,
    pub holder: String,
    pub balance: Decimal,
}

impl From<Account> for AccountRow {
    fn from(account: Account) -> Self {
        Self {
            account: account.id(),
            holder: account.holder_name().to_string(),
            // 1500.00 prints as 1500
            balance: account.balance().normalize(),
        }
    }
}

/// Writes final balances as `account,holder,balance`, one row per account.
pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl IntoIterator<Item = Account>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = csv::Writer::from_writer(output);
    for row in accounts.into_iter().map(AccountRow::from) {
        let account = row.account;
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write balance of account {account}"))?;
    }
    writer.flush().context("Failed to flush balances")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_normalized_balances() {
        let mut output = Vec::new();
        print_accounts(
            &mut output,
            [
                Account::new(1, "Asha", "+919800000001", Decimal::new(117250, 2)),
                Account::new(2, "Ravi", "+919800000002", Decimal::new(150000, 2)),
            ],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,holder,balance\n1,Asha,1172.5\n2,Ravi,1500\n"
        );
    }
}
