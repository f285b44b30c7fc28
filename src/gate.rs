use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::account::AccountId;

/// Checks a submitted secret against the account's stored credential.
pub trait CredentialValidator {
    fn verify(&self, account_id: AccountId, secret: &str) -> bool;
}

impl<F> CredentialValidator for F
where
    F: Fn(AccountId, &str) -> bool,
{
    fn verify(&self, account_id: AccountId, secret: &str) -> bool {
        self(account_id, secret)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub secret_length: usize,
    pub max_failures: u8,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            secret_length: 4,
            max_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Collecting,
    Verifying,
    Approved,
    Rejected,
    Locked,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("PIN must be {expected} digits, got {entered}")]
    IncompleteInput { expected: usize, entered: usize },
    #[error("PIN may only contain digits, got {0:?}")]
    InvalidCharacter(char),
    #[error("wrong PIN, {remaining} attempts remaining")]
    AuthMismatch { remaining: u8 },
    #[error("too many incorrect attempts, authorization is locked")]
    AuthLocked,
    #[error("authorization was cancelled")]
    AuthCancelled,
}

/// PIN re-verification in front of one pending operation.
///
/// The gate knows nothing about the operation it protects: [`AuthorizationGate::submit`]
/// takes the operation as a continuation and runs it once the secret matches. After
/// `max_failures` mismatches the gate locks until [`AuthorizationGate::reset`].
pub struct AuthorizationGate<'v, V: ?Sized> {
    account_id: AccountId,
    validator: &'v V,
    config: GateConfig,
    state: GateState,
    secret: String,
    failure_count: u8,
}

impl<'v, V> AuthorizationGate<'v, V>
where
    V: CredentialValidator + ?Sized,
{
    pub fn new(account_id: AccountId, validator: &'v V, config: GateConfig) -> Self {
        Self {
            account_id,
            validator,
            config,
            state: GateState::Collecting,
            secret: String::new(),
            failure_count: 0,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn failure_count(&self) -> u8 {
        self.failure_count
    }

    pub fn remaining_attempts(&self) -> u8 {
        self.config.max_failures.saturating_sub(self.failure_count)
    }

    pub fn entered_len(&self) -> usize {
        self.secret.len()
    }

    /// Digits past the secret length are ignored.
    pub fn push_digit(&mut self, digit: char) -> Result<(), GateError> {
        self.ensure_open()?;
        if !digit.is_ascii_digit() {
            return Err(GateError::InvalidCharacter(digit));
        }
        if self.secret.len() < self.config.secret_length {
            self.secret.push(digit);
        }
        Ok(())
    }

    pub fn pop_digit(&mut self) -> Result<(), GateError> {
        self.ensure_open()?;
        self.secret.pop();
        Ok(())
    }

    /// Replaces the current input with `secret`. Invalid input leaves the current one intact.
    pub fn enter(&mut self, secret: &str) -> Result<(), GateError> {
        self.ensure_open()?;
        if let Some(invalid) = secret.chars().find(|c| !c.is_ascii_digit()) {
            return Err(GateError::InvalidCharacter(invalid));
        }
        self.secret = secret.chars().take(self.config.secret_length).collect();
        Ok(())
    }

    /// Verifies the collected secret and, on a match, runs `on_approved` exactly once.
    pub fn submit<T, E>(&mut self, on_approved: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<GateError>,
    {
        self.ensure_open()?;
        if self.secret.len() < self.config.secret_length {
            return Err(GateError::IncompleteInput {
                expected: self.config.secret_length,
                entered: self.secret.len(),
            }
            .into());
        }

        self.state = GateState::Verifying;
        let matched = self.validator.verify(self.account_id, &self.secret);
        self.secret.clear();

        if matched {
            debug!(account_id = self.account_id, "authorization approved");
            self.state = GateState::Approved;
            let result = on_approved();
            self.reset();
            return result;
        }

        self.failure_count += 1;
        if self.failure_count >= self.config.max_failures {
            warn!(
                account_id = self.account_id,
                failures = self.failure_count,
                "authorization locked"
            );
            self.state = GateState::Locked;
            return Err(GateError::AuthLocked.into());
        }
        self.state = GateState::Collecting;
        Err(GateError::AuthMismatch {
            remaining: self.remaining_attempts(),
        }
        .into())
    }

    /// Abandons the pending operation. A locked gate stays locked.
    pub fn cancel(&mut self) {
        if self.state == GateState::Locked {
            return;
        }
        self.state = GateState::Rejected;
        self.secret.clear();
        self.failure_count = 0;
    }

    /// Fresh gate, as when the dialog is reopened.
    pub fn reset(&mut self) {
        self.state = GateState::Collecting;
        self.secret.clear();
        self.failure_count = 0;
    }

    fn ensure_open(&self) -> Result<(), GateError> {
        match self.state {
            GateState::Locked => Err(GateError::AuthLocked),
            GateState::Rejected => Err(GateError::AuthCancelled),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    type Validator = fn(AccountId, &str) -> bool;

    static PIN_1234: Validator = |_, secret| secret == "1234";

    fn gate() -> AuthorizationGate<'static, Validator> {
        AuthorizationGate::new(1, &PIN_1234, GateConfig::default())
    }

    #[test]
    fn incomplete_input_keeps_collecting() {
        let mut gate = gate();
        gate.enter("12").unwrap();
        let err = gate.submit(|| Ok::<_, GateError>(())).unwrap_err();
        assert_eq!(
            err,
            GateError::IncompleteInput {
                expected: 4,
                entered: 2
            }
        );
        assert_eq!(gate.state(), GateState::Collecting);
        assert_eq!(gate.failure_count(), 0);
    }

    #[test]
    fn input_is_digits_only_and_capped() {
        let mut gate = gate();
        assert_eq!(gate.push_digit('x'), Err(GateError::InvalidCharacter('x')));
        gate.enter("123456").unwrap();
        assert_eq!(gate.entered_len(), 4);
        gate.pop_digit().unwrap();
        assert_eq!(gate.entered_len(), 3);
    }

    #[test]
    fn invalid_entry_keeps_previous_input() {
        let mut gate = gate();
        gate.enter("98").unwrap();
        assert_eq!(gate.enter("12a4"), Err(GateError::InvalidCharacter('a')));
        assert_eq!(gate.entered_len(), 2);

        gate.enter("1234").unwrap();
        assert!(gate.submit(|| Ok::<_, GateError>(())).is_ok());
    }

    #[test]
    fn closed_gate_ignores_edits() {
        let mut cancelled = gate();
        cancelled.enter("12").unwrap();
        cancelled.cancel();
        assert_eq!(cancelled.pop_digit(), Err(GateError::AuthCancelled));

        let mut locked = gate();
        for _ in 0..3 {
            locked.enter("0000").unwrap();
            let _ = locked.submit(|| Ok::<_, GateError>(()));
        }
        assert_eq!(locked.pop_digit(), Err(GateError::AuthLocked));
    }

    #[test]
    fn approval_runs_continuation_once() {
        let mut gate = gate();
        let calls = Cell::new(0);

        gate.enter("9999").unwrap();
        let err = gate
            .submit(|| {
                calls.set(calls.get() + 1);
                Ok::<_, GateError>(())
            })
            .unwrap_err();
        assert_eq!(err, GateError::AuthMismatch { remaining: 2 });
        assert_eq!(calls.get(), 0);

        gate.enter("1234").unwrap();
        let value = gate
            .submit(|| {
                calls.set(calls.get() + 1);
                Ok::<_, GateError>(42)
            })
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.get(), 1);
        assert_eq!(gate.state(), GateState::Collecting);
        assert_eq!(gate.failure_count(), 0);
        assert_eq!(gate.entered_len(), 0);
    }

    #[test]
    fn three_mismatches_lock() {
        let mut gate = gate();
        for remaining in [2, 1] {
            gate.enter("0000").unwrap();
            let err = gate.submit(|| Ok::<_, GateError>(())).unwrap_err();
            assert_eq!(err, GateError::AuthMismatch { remaining });
        }
        gate.enter("0000").unwrap();
        let err = gate.submit(|| Ok::<_, GateError>(())).unwrap_err();
        assert_eq!(err, GateError::AuthLocked);
        assert_eq!(gate.state(), GateState::Locked);

        assert_eq!(gate.enter("1234"), Err(GateError::AuthLocked));
        let err = gate.submit(|| Ok::<_, GateError>(())).unwrap_err();
        assert_eq!(err, GateError::AuthLocked);

        // cancel does not lift the lock, only an explicit reset does
        gate.cancel();
        assert_eq!(gate.state(), GateState::Locked);
        gate.reset();
        gate.enter("1234").unwrap();
        assert!(gate.submit(|| Ok::<_, GateError>(())).is_ok());
    }

    #[test]
    fn cancel_discards_pending_operation() {
        let mut gate = gate();
        gate.enter("0000").unwrap();
        let _ = gate.submit(|| Ok::<_, GateError>(()));
        gate.enter("12").unwrap();
        gate.cancel();
        assert_eq!(gate.state(), GateState::Rejected);
        assert_eq!(gate.failure_count(), 0);

        let ran = Cell::new(false);
        let err = gate
            .submit(|| {
                ran.set(true);
                Ok::<_, GateError>(())
            })
            .unwrap_err();
        assert_eq!(err, GateError::AuthCancelled);
        assert!(!ran.get());
    }

    #[test]
    fn validator_receives_gate_account() {
        let validator = |account_id: AccountId, secret: &str| account_id == 7 && secret == "4321";
        let mut gate = AuthorizationGate::new(7, &validator, GateConfig::default());
        gate.enter("4321").unwrap();
        assert!(gate.submit(|| Ok::<_, GateError>(())).is_ok());

        let mut other = AuthorizationGate::new(8, &validator, GateConfig::default());
        other.enter("4321").unwrap();
        assert!(other.submit(|| Ok::<_, GateError>(())).is_err());
    }
}
