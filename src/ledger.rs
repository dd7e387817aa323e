//! Mutation executor: the local side effect a saga commits

use crate::{AccountId, MutationError, OperationKind};

/// Applies the local effect of a completed journal entry.
///
/// Implementations do not deduplicate: the participant state machine
/// guarantees `apply` runs at most once per journal entry.
pub trait MutationExecutor: Send + Sync + 'static {
    /// Credit (`Deposit`) or debit (`Withdraw`) `amount` on the account
    fn apply(
        &self,
        account_id: &AccountId,
        amount: u64,
        kind: OperationKind,
    ) -> Result<(), MutationError>;
}

/// In-memory account ledger
pub struct InMemoryLedger {
    balances: std::sync::Mutex<std::collections::HashMap<AccountId, u64>>,
}

impl InMemoryLedger {
    /// Ledger with no accounts
    pub fn new() -> Self {
        Self {
            balances: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Open (or reset) an account with the given balance
    pub fn open_account(&self, account_id: AccountId, balance: u64) -> Result<(), MutationError> {
        let mut balances = self.balances.lock().map_err(|e| MutationError::Backend(e.to_string().into()))?;
        balances.insert(account_id, balance);
        Ok(())
    }

    /// Current balance, or `None` for an unknown account
    pub fn balance(&self, account_id: &AccountId) -> Option<u64> {
        let balances = self.balances.lock().ok()?;
        balances.get(account_id).copied()
    }
}

impl MutationExecutor for InMemoryLedger {
    fn apply(
        &self,
        account_id: &AccountId,
        amount: u64,
        kind: OperationKind,
    ) -> Result<(), MutationError> {
        let mut balances = self.balances.lock().map_err(|e| MutationError::Backend(e.to_string().into()))?;
        let balance = balances
            .get_mut(account_id)
            .ok_or_else(|| MutationError::AccountNotFound(account_id.as_str().into()))?;

        *balance = match kind {
            OperationKind::Deposit => balance
                .checked_add(amount)
                .ok_or_else(|| MutationError::Overflow(account_id.as_str().into()))?,
            OperationKind::Withdraw => {
                balance
                    .checked_sub(amount)
                    .ok_or_else(|| MutationError::InsufficientFunds {
                        account: account_id.as_str().into(),
                        balance: *balance,
                        requested: amount,
                    })?
            }
        };

        tracing::debug!(account = %account_id, %kind, amount, balance = *balance, "Ledger updated");
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_and_withdraw() {
        let ledger = InMemoryLedger::new();
        let acct = AccountId::new("acct-A");
        ledger.open_account(acct.clone(), 10).unwrap();

        ledger.apply(&acct, 100, OperationKind::Deposit).unwrap();
        assert_eq!(ledger.balance(&acct), Some(110));

        ledger.apply(&acct, 30, OperationKind::Withdraw).unwrap();
        assert_eq!(ledger.balance(&acct), Some(80));
    }

    #[test]
    fn test_withdraw_insufficient_funds_leaves_balance() {
        let ledger = InMemoryLedger::new();
        let acct = AccountId::new("acct-B");
        ledger.open_account(acct.clone(), 20).unwrap();

        let err = ledger.apply(&acct, 50, OperationKind::Withdraw).unwrap_err();
        assert_eq!(
            err,
            MutationError::InsufficientFunds {
                account: "acct-B".into(),
                balance: 20,
                requested: 50,
            }
        );
        assert_eq!(ledger.balance(&acct), Some(20));
    }

    #[test]
    fn test_unknown_account() {
        let ledger = InMemoryLedger::new();
        let err = ledger
            .apply(&AccountId::new("ghost"), 1, OperationKind::Deposit)
            .unwrap_err();
        assert!(matches!(err, MutationError::AccountNotFound(_)));
    }

    #[test]
    fn test_deposit_overflow() {
        let ledger = InMemoryLedger::new();
        let acct = AccountId::new("acct-C");
        ledger.open_account(acct.clone(), u64::MAX).unwrap();
        assert!(matches!(
            ledger.apply(&acct, 1, OperationKind::Deposit),
            Err(MutationError::Overflow(_))
        ));
        assert_eq!(ledger.balance(&acct), Some(u64::MAX));
    }
}
