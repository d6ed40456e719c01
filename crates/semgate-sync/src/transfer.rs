// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Moving balances between accounts without deadlock.
//!
//! Every account owns one lock and an identity fixed when the `Bank`
//! opened it. A transfer locks the lower identity first, whatever the
//! direction of the transfer, so no cycle of waiting transfers can form.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::TransferError;

/// Ordering key of an account. Unique within its `Bank`, never reused.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(u64);

impl AccountId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct#{}", self.0)
    }
}

/// An account: identity plus a balance behind the account's own lock.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    balance: Mutex<u64>,
}

impl Account {
    fn new(id: AccountId, balance: u64) -> Self {
        Self {
            id,
            balance: Mutex::new(balance),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> u64 {
        *self.lock()
    }

    /// Add `amount` under this account's lock alone.
    pub fn deposit(&self, amount: u64) -> Result<u64, TransferError> {
        let mut balance = self.lock();
        *balance = balance
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow(self.id))?;
        debug!(account = %self.id, amount, balance = *balance, "deposit");
        Ok(*balance)
    }

    /// Take `amount` out, refusing to go negative.
    pub fn withdraw(&self, amount: u64) -> Result<u64, TransferError> {
        let mut balance = self.lock();
        if *balance < amount {
            return Err(TransferError::InsufficientFunds {
                account: self.id,
                available: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        debug!(account = %self.id, amount, balance = *balance, "withdraw");
        Ok(*balance)
    }

    /// Shorthand for `transfer(self, destination, amount)`.
    pub fn transfer_to(&self, destination: &Account, amount: u64) -> Result<Receipt, TransferError> {
        transfer(self, destination, amount)
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.balance.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a completed transfer did, with balances as of the moment both
/// locks were still held.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: u64,
    pub source_balance: u64,
    pub destination_balance: u64,
}

/// Move `amount` from `source` to `destination`.
///
/// Both locks are taken in identity order and released in reverse. On any
/// error neither balance has changed.
pub fn transfer(
    source: &Account,
    destination: &Account,
    amount: u64,
) -> Result<Receipt, TransferError> {
    if source.id == destination.id {
        return Err(TransferError::SameAccount(source.id));
    }

    let source_first = source.id < destination.id;
    let (first, second) = if source_first {
        (source, destination)
    } else {
        (destination, source)
    };
    let mut first_guard = first.lock();
    let mut second_guard = second.lock();
    let (src, dst) = if source_first {
        (&mut *first_guard, &mut *second_guard)
    } else {
        (&mut *second_guard, &mut *first_guard)
    };

    let result = if *src < amount {
        Err(TransferError::InsufficientFunds {
            account: source.id,
            available: *src,
            requested: amount,
        })
    } else if let Some(credited) = dst.checked_add(amount) {
        *src -= amount;
        *dst = credited;
        Ok(Receipt {
            source: source.id,
            destination: destination.id,
            amount,
            source_balance: *src,
            destination_balance: *dst,
        })
    } else {
        Err(TransferError::BalanceOverflow(destination.id))
    };

    drop(second_guard);
    drop(first_guard);

    match &result {
        Ok(receipt) => debug!(
            from = %receipt.source,
            to = %receipt.destination,
            amount,
            "transfer complete"
        ),
        Err(err) => debug!(%err, "transfer refused"),
    }
    result
}

/// Issues account identities and keeps every account it opened.
///
/// Create one per set of accounts that transfer among themselves and pass
/// it by reference; identities from different banks are not comparable.
#[derive(Debug, Default)]
pub struct Bank {
    accounts: Mutex<Vec<Arc<Account>>>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account with the next identity in sequence.
    pub fn open(&self, initial_balance: u64) -> Arc<Account> {
        let mut accounts = self.lock_accounts();
        let id = AccountId(accounts.len() as u64 + 1);
        let account = Arc::new(Account::new(id, initial_balance));
        accounts.push(account.clone());
        debug!(account = %id, initial_balance, "account opened");
        account
    }

    pub fn accounts(&self) -> Vec<Arc<Account>> {
        self.lock_accounts().clone()
    }

    pub fn get(&self, id: AccountId) -> Option<Arc<Account>> {
        self.lock_accounts().iter().find(|a| a.id == id).cloned()
    }

    /// Sum of all balances, read as one consistent snapshot.
    ///
    /// Holds every account lock at once, taken in identity order like a
    /// transfer, so it can run alongside transfers without deadlock.
    pub fn total(&self) -> u128 {
        let accounts = self.accounts();
        let guards: Vec<_> = accounts.iter().map(|a| a.lock()).collect();
        let total = guards.iter().map(|b| u128::from(**b)).sum();
        for guard in guards.into_iter().rev() {
            drop(guard);
        }
        total
    }

    fn lock_accounts(&self) -> MutexGuard<'_, Vec<Arc<Account>>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
