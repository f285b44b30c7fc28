use thiserror::Error;

use crate::{
    command::{CommandError, RawCommand},
    wallet::WalletError,
};

pub mod in_memory_processor;

#[derive(Debug, Error)]
pub enum OperationProcessError {
    #[error(transparent)]
    CommandErr(#[from] CommandError),
    #[error(transparent)]
    WalletErr(#[from] WalletError),
}

pub trait OperationProcessor {
    fn process_operation(&mut self, raw: RawCommand) -> Result<(), OperationProcessError>;
}
