//! Token movement collaborator. The ledger only records positions; the custodian holds the
//! tokens and is asked to move them.

use idstake_types::custody::TokenLedger;
use idstake_types::Address;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodianError {
    #[error("account holds {available}, needs {requested}")]
    InsufficientBalance { requested: u128, available: u128 },
    #[error("custody pool holds {available}, needs {requested}")]
    InsufficientCustody { requested: u128, available: u128 },
    #[error("balance overflow")]
    Overflow,
    #[error("{0}")]
    Rejected(String),
}

pub trait TokenCustodian {
    /// Pulls `amount` from `account` into custody.
    fn deposit_from(&mut self, account: &Address, amount: u128) -> Result<(), CustodianError>;
    /// Returns `amount` from custody to `account`.
    fn withdraw_to(&mut self, account: &Address, amount: u128) -> Result<(), CustodianError>;
    /// Irreversibly removes `amount` from custody.
    fn burn(&mut self, amount: u128) -> Result<(), CustodianError>;
}

impl TokenCustodian for TokenLedger {
    fn deposit_from(&mut self, account: &Address, amount: u128) -> Result<(), CustodianError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(CustodianError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or(CustodianError::Overflow)?;
        self.balances.insert(*account, available - amount);
        self.custody = custody;
        Ok(())
    }

    fn withdraw_to(&mut self, account: &Address, amount: u128) -> Result<(), CustodianError> {
        if self.custody < amount {
            return Err(CustodianError::InsufficientCustody {
                requested: amount,
                available: self.custody,
            });
        }
        let balance = self
            .balance_of(account)
            .checked_add(amount)
            .ok_or(CustodianError::Overflow)?;
        self.custody -= amount;
        self.balances.insert(*account, balance);
        Ok(())
    }

    fn burn(&mut self, amount: u128) -> Result<(), CustodianError> {
        if self.custody < amount {
            return Err(CustodianError::InsufficientCustody {
                requested: amount,
                available: self.custody,
            });
        }
        let burned = self
            .burned
            .checked_add(amount)
            .ok_or(CustodianError::Overflow)?;
        self.custody -= amount;
        self.burned = burned;
        Ok(())
    }
}
