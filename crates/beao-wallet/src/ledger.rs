//! Wallet history and the set of outputs we own.
//!
//! Credits are owned outputs created by a transaction; debits are owned
//! outputs a transaction consumes. Every owned output is either unspent or
//! marked with the spending txid, so the unspent total always equals total
//! credits minus total debits.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use beao_core::types::{Hash256, OutPoint, Transaction};

use crate::coin_selection::Candidate;
use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Received,
    Sent,
    /// Every output goes back to the wallet.
    ToSelf,
    /// Coinbase.
    Mined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTx {
    pub txid: Hash256,
    pub tx: Transaction,
    pub kind: TxKind,
    /// Unix seconds when the wallet first saw the transaction.
    pub received_at: u64,
    /// Height of the including block while it is in the best chain.
    pub included_at: Option<u64>,
    pub peer_acks: u32,
    /// Spends wallet outputs.
    pub from_me: bool,
    pub credit: u64,
    pub debit: u64,
    /// Known only when every input was ours.
    pub fee: u64,
}

impl WalletTx {
    pub fn net(&self) -> i64 {
        self.credit as i64 - self.debit as i64
    }

    pub fn depth(&self, tip: u64) -> u64 {
        match self.included_at {
            Some(h) if h <= tip => tip - h + 1,
            _ => 0,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.kind == TxKind::Mined
    }

    pub fn blocks_to_maturity(&self, tip: u64, maturity: u64) -> u64 {
        if self.is_coinbase() { maturity.saturating_sub(self.depth(tip)) } else { 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedOutput {
    pub outpoint: OutPoint,
    pub value: u64,
    pub pubkey_hash: Hash256,
    pub spent_by: Option<Hash256>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub immature: u64,
}

impl Balance {
    pub fn total(&self) -> u64 {
        self.confirmed.saturating_add(self.unconfirmed).saturating_add(self.immature)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    txs: HashMap<Hash256, WalletTx>,
    outputs: BTreeMap<OutPoint, OwnedOutput>,
    reserved: HashSet<OutPoint>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, txid: &Hash256) -> Option<&WalletTx> {
        self.txs.get(txid)
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Record `tx` if it touches the wallet. Returns its txid, or `None`
    /// when it neither credits nor debits us. Re-adding is a no-op.
    pub fn add_transaction<F>(&mut self, tx: Transaction, now: u64, is_mine: F) -> Result<Option<Hash256>, WalletError>
    where
        F: Fn(&Hash256) -> bool,
    {
        let txid = tx.txid()?;
        if self.txs.contains_key(&txid) {
            return Ok(Some(txid));
        }

        let spent: Vec<OutPoint> = tx
            .inputs
            .iter()
            .map(|i| i.previous_output)
            .filter(|op| self.outputs.get(op).is_some_and(|o| o.spent_by.is_none()))
            .collect();
        let debit = spent.iter().filter_map(|op| self.outputs.get(op)).map(|o| o.value).sum::<u64>();
        let credit = tx.outputs.iter().filter(|o| is_mine(&o.pubkey_hash)).map(|o| o.value).sum::<u64>();
        if debit == 0 && credit == 0 {
            return Ok(None);
        }

        for op in &spent {
            if let Some(out) = self.outputs.get_mut(op) {
                out.spent_by = Some(txid);
            }
            self.reserved.remove(op);
        }
        for (i, out) in tx.outputs.iter().enumerate() {
            if is_mine(&out.pubkey_hash) {
                let outpoint = OutPoint::new(txid, i as u64);
                self.outputs.insert(
                    outpoint,
                    OwnedOutput { outpoint, value: out.value, pubkey_hash: out.pubkey_hash, spent_by: None },
                );
            }
        }

        let kind = if tx.is_coinbase() {
            TxKind::Mined
        } else if debit == 0 {
            TxKind::Received
        } else if tx.outputs.iter().all(|o| is_mine(&o.pubkey_hash)) {
            TxKind::ToSelf
        } else {
            TxKind::Sent
        };
        let fee = if debit > 0 && spent.len() == tx.inputs.len() {
            debit.saturating_sub(tx.total_output_value().unwrap_or(debit))
        } else {
            0
        };

        debug!(%txid, ?kind, credit, debit, "transaction added to ledger");
        self.txs.insert(
            txid,
            WalletTx {
                txid,
                tx,
                kind,
                received_at: now,
                included_at: None,
                peer_acks: 0,
                from_me: debit > 0,
                credit,
                debit,
                fee,
            },
        );
        Ok(Some(txid))
    }

    /// Record our own signed spend and drop its reservations.
    pub fn commit<F>(&mut self, tx: Transaction, now: u64, is_mine: F) -> Result<Hash256, WalletError>
    where
        F: Fn(&Hash256) -> bool,
    {
        let inputs: Vec<OutPoint> = tx.inputs.iter().map(|i| i.previous_output).collect();
        let txid = self
            .add_transaction(tx, now, is_mine)?
            .ok_or_else(|| WalletError::TransactionCreationFailed("spend does not touch the wallet".into()))?;
        self.release(&inputs);
        Ok(txid)
    }

    pub fn confirm(&mut self, txid: &Hash256, height: u64) -> Result<(), WalletError> {
        let wtx = self.txs.get_mut(txid).ok_or_else(|| WalletError::UnknownTransaction(txid.to_string()))?;
        wtx.included_at = Some(height);
        Ok(())
    }

    /// The including block left the best chain.
    pub fn unconfirm(&mut self, txid: &Hash256) -> Result<(), WalletError> {
        let wtx = self.txs.get_mut(txid).ok_or_else(|| WalletError::UnknownTransaction(txid.to_string()))?;
        if wtx.included_at.take().is_some() {
            warn!(%txid, "transaction left the best chain");
        }
        Ok(())
    }

    pub fn note_peer_ack(&mut self, txid: &Hash256) -> Result<u32, WalletError> {
        let wtx = self.txs.get_mut(txid).ok_or_else(|| WalletError::UnknownTransaction(txid.to_string()))?;
        wtx.peer_acks = wtx.peer_acks.saturating_add(1);
        Ok(wtx.peer_acks)
    }

    /// Drop a transaction, its outputs, and its claim on the outputs it
    /// spent. Fails if something else already spends one of its outputs.
    pub fn remove_transaction(&mut self, txid: &Hash256) -> Result<WalletTx, WalletError> {
        if !self.txs.contains_key(txid) {
            return Err(WalletError::UnknownTransaction(txid.to_string()));
        }
        let created: Vec<OutPoint> = self.outputs.range(OutPoint::new(*txid, 0)..).map(|(op, _)| *op).take_while(|op| op.txid == *txid).collect();
        if let Some(op) = created.iter().find(|op| self.outputs.get(op).is_some_and(|o| o.spent_by.is_some())) {
            return Err(WalletError::TransactionCreationFailed(format!("output {op} is already spent")));
        }
        for op in &created {
            self.outputs.remove(op);
            self.reserved.remove(op);
        }
        for out in self.outputs.values_mut() {
            if out.spent_by == Some(*txid) {
                out.spent_by = None;
            }
        }
        let wtx = self.txs.remove(txid).ok_or_else(|| WalletError::UnknownTransaction(txid.to_string()))?;
        debug!(%txid, "transaction removed from ledger");
        Ok(wtx)
    }

    fn parent(&self, op: &OutPoint) -> Option<&WalletTx> {
        self.txs.get(&op.txid)
    }

    fn unspent(&self) -> impl Iterator<Item = &OwnedOutput> {
        self.outputs.values().filter(|o| o.spent_by.is_none())
    }

    /// Outputs a new spend may use: unspent, unreserved, mature, and
    /// confirmed unless they are our own change.
    pub fn spendable(&self, tip: u64, maturity: u64, spend_zero_conf_change: bool) -> Vec<Candidate> {
        self.unspent()
            .filter(|o| !self.reserved.contains(&o.outpoint))
            .filter_map(|o| {
                let parent = self.parent(&o.outpoint)?;
                let depth = parent.depth(tip);
                if parent.is_coinbase() && depth < maturity {
                    return None;
                }
                if depth == 0 && !(parent.from_me && spend_zero_conf_change) {
                    return None;
                }
                Some(Candidate { outpoint: o.outpoint, value: o.value, pubkey_hash: o.pubkey_hash, depth })
            })
            .collect()
    }

    /// Fails without reserving anything if any outpoint is taken.
    pub fn reserve(&mut self, outpoints: &[OutPoint]) -> Result<(), WalletError> {
        for op in outpoints {
            let free = self.outputs.get(op).is_some_and(|o| o.spent_by.is_none());
            if !free || self.reserved.contains(op) {
                return Err(WalletError::TransactionCreationFailed(format!("output {op} is not available")));
            }
        }
        self.reserved.extend(outpoints.iter().copied());
        Ok(())
    }

    pub fn release(&mut self, outpoints: &[OutPoint]) {
        for op in outpoints {
            self.reserved.remove(op);
        }
    }

    pub fn is_reserved(&self, outpoint: &OutPoint) -> bool {
        self.reserved.contains(outpoint)
    }

    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }

    /// Reserved outputs still count: they stay ours until a spend commits.
    pub fn balance(&self, tip: u64, maturity: u64) -> Balance {
        let mut balance = Balance::default();
        for o in self.unspent() {
            let Some(parent) = self.parent(&o.outpoint) else { continue };
            let depth = parent.depth(tip);
            let bucket = if parent.is_coinbase() {
                match depth {
                    0 => continue,
                    d if d < maturity => &mut balance.immature,
                    _ => &mut balance.confirmed,
                }
            } else if depth > 0 || parent.from_me {
                &mut balance.confirmed
            } else {
                &mut balance.unconfirmed
            };
            *bucket = bucket.saturating_add(o.value);
        }
        balance
    }

    pub fn unspent_total(&self) -> u64 {
        self.unspent().map(|o| o.value).sum()
    }

    pub fn total_credits(&self) -> u64 {
        self.txs.values().map(|t| t.credit).sum()
    }

    pub fn total_debits(&self) -> u64 {
        self.txs.values().map(|t| t.debit).sum()
    }

    /// Newest first.
    pub fn transactions(&self) -> Vec<&WalletTx> {
        let mut out: Vec<_> = self.txs.values().collect();
        out.sort_by(|a, b| b.received_at.cmp(&a.received_at).then(a.txid.cmp(&b.txid)));
        out
    }

    pub fn to_record(&self) -> LedgerRecord {
        let mut transactions: Vec<WalletTx> = self.txs.values().cloned().collect();
        transactions.sort_by(|a, b| a.received_at.cmp(&b.received_at).then(a.txid.cmp(&b.txid)));
        LedgerRecord { transactions, outputs: self.outputs.values().cloned().collect() }
    }

    pub fn from_record(record: LedgerRecord) -> Result<Self, WalletError> {
        let txs: HashMap<Hash256, WalletTx> = record.transactions.into_iter().map(|t| (t.txid, t)).collect();
        let outputs: BTreeMap<OutPoint, OwnedOutput> =
            record.outputs.into_iter().map(|o| (o.outpoint, o)).collect();
        if let Some(orphan) = outputs.keys().find(|op| !txs.contains_key(&op.txid)) {
            return Err(WalletError::CorruptedFile(format!("output {orphan} has no transaction")));
        }
        Ok(Self { txs, outputs, reserved: HashSet::new() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub transactions: Vec<WalletTx>,
    pub outputs: Vec<OwnedOutput>,
}
