//! Transaction builder: recipients in, signed transaction out.
//!
//! 1. Add recipients (address + amount)
//! 2. [`build`](TransactionBuilder::build) selects coins and computes fee and change
//! 3. [`sign`](TransactionBuilder::sign) signs every input
//! 4. [`verify_signed`](TransactionBuilder::verify_signed) re-checks the result
//!
//! Building is pure: nothing is reserved or spent here.

use std::collections::HashSet;

use tracing::debug;

use beao_core::address::Address;
use beao_core::constants::{
    DEFAULT_TX_FEE_PER_KB, DUST_THRESHOLD, FREE_RELAY_MAX_SIZE, MAX_MONEY, MIN_RELAY_FEE_PER_KB,
    TX_VERSION,
};
use beao_core::crypto::{KeyPair, sign_transaction_input, verify_transaction_input};
use beao_core::types::{Hash256, OutPoint, Transaction, TxInput, TxOutput};

use crate::coin_selection::{Candidate, CoinSelector};
use crate::error::WalletError;

/// Serialized size of everything but inputs and outputs (upper bound).
pub const TX_OVERHEAD_SIZE: usize = 12;
/// Signed input: outpoint, 64-byte signature, 32-byte key, length prefixes.
pub const INPUT_SIZE: usize = 140;
pub const OUTPUT_SIZE: usize = 42;

pub fn estimate_size(inputs: usize, outputs: usize) -> usize {
    TX_OVERHEAD_SIZE + inputs * INPUT_SIZE + outputs * OUTPUT_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub fee_per_kb: u64,
    pub min_relay_fee_per_kb: u64,
    pub free_relay_max_size: usize,
    /// Change below this is added to the fee instead.
    pub dust_threshold: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            fee_per_kb: DEFAULT_TX_FEE_PER_KB,
            min_relay_fee_per_kb: MIN_RELAY_FEE_PER_KB,
            free_relay_max_size: FREE_RELAY_MAX_SIZE,
            dust_threshold: DUST_THRESHOLD,
        }
    }
}

impl FeePolicy {
    /// `rate × (1 + size/1000)`, raised to the minimum relay rate once the
    /// transaction is too big to relay for free.
    pub fn fee_for_size(&self, size: usize) -> u64 {
        let kb = 1 + (size / 1000) as u64;
        let fee = self.fee_per_kb.saturating_mul(kb);
        if size > self.free_relay_max_size {
            fee.max(self.min_relay_fee_per_kb.saturating_mul(kb))
        } else {
            fee
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: Address,
    pub amount: u64,
}

impl Recipient {
    pub fn new(address: Address, amount: u64) -> Self {
        Self { address, amount }
    }
}

/// A built, not yet signed, spend.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub recipients: Vec<Recipient>,
    pub inputs: Vec<Candidate>,
    pub fee: u64,
    pub change: Option<TxOutput>,
    /// Inputs carry empty signatures.
    pub tx: Transaction,
    pub estimated_size: usize,
}

impl PendingTransaction {
    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.inputs.iter().map(|c| c.outpoint).collect()
    }

    pub fn total_in(&self) -> u64 {
        self.inputs.iter().map(|c| c.value).sum()
    }

    pub fn total_sent(&self) -> u64 {
        self.recipients.iter().map(|r| r.amount).sum()
    }
}

pub struct TransactionBuilder {
    policy: FeePolicy,
    recipients: Vec<Recipient>,
    fee_override: Option<u64>,
    fee_confirmed: bool,
    lock_time: u64,
}

impl TransactionBuilder {
    pub fn new(policy: FeePolicy) -> Self {
        Self { policy, recipients: Vec::new(), fee_override: None, fee_confirmed: false, lock_time: 0 }
    }

    pub fn add_recipient(&mut self, address: Address, amount: u64) -> &mut Self {
        self.recipients.push(Recipient { address, amount });
        self
    }

    pub fn add_recipients(&mut self, recipients: impl IntoIterator<Item = Recipient>) -> &mut Self {
        self.recipients.extend(recipients);
        self
    }

    /// Pay exactly `fee`. An explicit fee also counts as fee confirmation.
    pub fn fee_override(&mut self, fee: Option<u64>) -> &mut Self {
        self.fee_override = fee;
        self
    }

    /// The caller accepted the fee for a transaction above the free-relay size.
    pub fn confirm_fee(&mut self, confirmed: bool) -> &mut Self {
        self.fee_confirmed = confirmed;
        self
    }

    pub fn lock_time(&mut self, lock_time: u64) -> &mut Self {
        self.lock_time = lock_time;
        self
    }

    /// Amount and duplicate checks. Returns the total to send.
    pub fn check_recipients(&self) -> Result<u64, WalletError> {
        if self.recipients.is_empty() {
            return Err(WalletError::TransactionCreationFailed("no recipients".into()));
        }
        let mut seen = HashSet::with_capacity(self.recipients.len());
        let mut total = 0u64;
        for r in &self.recipients {
            if r.amount == 0 || r.amount > MAX_MONEY {
                return Err(WalletError::InvalidAmount(format!("{} to {}", r.amount, r.address)));
            }
            if !seen.insert(&r.address) {
                return Err(WalletError::DuplicateRecipient(r.address.to_string()));
            }
            total = total
                .checked_add(r.amount)
                .filter(|t| *t <= MAX_MONEY)
                .ok_or_else(|| WalletError::InvalidAmount("total out of range".into()))?;
        }
        Ok(total)
    }

    fn fee_for_inputs(&self, inputs: usize, outputs: usize) -> u64 {
        match self.fee_override {
            Some(fee) => fee,
            None => self.policy.fee_for_size(estimate_size(inputs, outputs)),
        }
    }

    pub fn build(
        &self,
        candidates: &[Candidate],
        change_pubkey_hash: Hash256,
    ) -> Result<PendingTransaction, WalletError> {
        let target = self.check_recipients()?;
        let outputs_with_change = self.recipients.len() + 1;

        let selection =
            CoinSelector::select(candidates, target, |k| self.fee_for_inputs(k, outputs_with_change))?;
        let n_inputs = selection.inputs.len();
        let size = estimate_size(n_inputs, outputs_with_change);
        let mut fee = self.fee_for_inputs(n_inputs, outputs_with_change);

        let confirmed = self.fee_confirmed || self.fee_override.is_some();
        if size > self.policy.free_relay_max_size && fee > 0 && !confirmed {
            return Err(WalletError::FeeConfirmationRequired { fee });
        }

        let change_value = selection
            .total
            .checked_sub(target)
            .and_then(|v| v.checked_sub(fee))
            .ok_or_else(|| WalletError::TransactionCreationFailed("inputs do not cover payment".into()))?;

        let change = if change_value == 0 {
            None
        } else if change_value < self.policy.dust_threshold {
            debug!(change_value, "dust change added to fee");
            fee += change_value;
            None
        } else {
            Some(TxOutput { value: change_value, pubkey_hash: change_pubkey_hash })
        };

        let mut outputs: Vec<TxOutput> = self
            .recipients
            .iter()
            .map(|r| TxOutput { value: r.amount, pubkey_hash: r.address.pubkey_hash() })
            .collect();
        outputs.extend(change.clone());

        let tx = Transaction {
            version: TX_VERSION,
            inputs: selection.inputs.iter().map(|c| TxInput::unsigned(c.outpoint)).collect(),
            outputs,
            lock_time: self.lock_time,
        };
        let estimated_size = estimate_size(n_inputs, tx.outputs.len());

        Ok(PendingTransaction {
            recipients: self.recipients.clone(),
            inputs: selection.inputs,
            fee,
            change,
            tx,
            estimated_size,
        })
    }

    /// Sign every input with the key `resolve` returns for its owner.
    pub fn sign<F>(pending: &PendingTransaction, mut resolve: F) -> Result<Transaction, WalletError>
    where
        F: FnMut(&Hash256) -> Result<KeyPair, WalletError>,
    {
        let mut tx = pending.tx.clone();
        for (i, input) in pending.inputs.iter().enumerate() {
            let kp = resolve(&input.pubkey_hash)?;
            sign_transaction_input(&mut tx, i, &kp)?;
        }
        Ok(tx)
    }

    /// Structural validation of a signed spend against what was built.
    pub fn verify_signed(pending: &PendingTransaction, tx: &Transaction) -> Result<(), WalletError> {
        let fail = |msg: String| WalletError::TransactionCreationFailed(msg);

        tx.check_structure().map_err(|e| fail(e.to_string()))?;
        let signed = tx.inputs.iter().filter(|i| i.is_signed()).count();
        if tx.inputs.len() != pending.inputs.len() || signed != pending.inputs.len() {
            return Err(fail(format!(
                "signature count mismatch: {signed} signed, {} inputs",
                pending.inputs.len()
            )));
        }
        for (i, input) in pending.inputs.iter().enumerate() {
            verify_transaction_input(tx, i, &input.pubkey_hash)
                .map_err(|e| fail(format!("input {i}: {e}")))?;
        }
        let out = tx.total_output_value().ok_or_else(|| fail("value overflow".into()))?;
        if out.checked_add(pending.fee) != Some(pending.total_in()) {
            return Err(fail("inputs, outputs and fee do not balance".into()));
        }
        Ok(())
    }
}
