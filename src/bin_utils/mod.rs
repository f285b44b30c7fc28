//! This module could be a separate crate on its own, to bootstrap [`wallet_ledger`] within the
//! binary, but it also drives the integration tests, so it lives here.

use std::io::{Read, Write};

use crate::{
    config::WalletConfig,
    processor::{
        OperationProcessError, OperationProcessor,
        in_memory_processor::InMemoryOperationProcessor,
    },
};
use anyhow::{Context, Result};
use csv_parser::CsvOperationParser;
use csv_printer::print_accounts;
pub mod csv_parser;
pub mod csv_printer;

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: WalletConfig,
    pub error_printer: Box<dyn FnMut(u64, OperationProcessError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    /// Replays every operation, then prints final balances ordered by account id.
    pub fn run(mut self) -> Result<()> {
        let parser = CsvOperationParser::new(self.input);

        let mut processor = InMemoryOperationProcessor::new(&self.config);

        for (line, row) in parser {
            let raw = row.with_context(|| format!("Malformed operation at line {line}"))?;
            if let Err(err) = processor.process_operation(raw) {
                (self.error_printer)(line, err);
            }
        }

        print_accounts(self.output, processor.wallet.accounts().snapshot())
    }
}
