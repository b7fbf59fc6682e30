//! Address book: labels for our receiving addresses and for the addresses
//! we send to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use beao_core::address::Address;

use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Backed by a wallet key.
    Receiving,
    /// Someone else's address.
    Sending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBookEntry {
    pub address: Address,
    pub label: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    entries: HashMap<Address, AddressBookEntry>,
}

impl AddressBook {
    pub fn from_entries(entries: impl IntoIterator<Item = AddressBookEntry>) -> Self {
        Self { entries: entries.into_iter().map(|e| (e.address.clone(), e)).collect() }
    }

    pub fn insert(
        &mut self,
        address: Address,
        label: impl Into<String>,
        kind: EntryKind,
    ) -> Result<(), WalletError> {
        if self.entries.contains_key(&address) {
            return Err(WalletError::DuplicateAddress(address.to_string()));
        }
        let entry = AddressBookEntry { address: address.clone(), label: label.into(), kind };
        self.entries.insert(address, entry);
        Ok(())
    }

    pub fn set_label(&mut self, address: &Address, label: impl Into<String>) -> Result<(), WalletError> {
        let entry = self
            .entries
            .get_mut(address)
            .ok_or_else(|| WalletError::UnknownAddress(address.to_string()))?;
        entry.label = label.into();
        Ok(())
    }

    pub fn remove_sending(&mut self, address: &Address) -> Result<AddressBookEntry, WalletError> {
        match self.entries.get(address).map(|e| e.kind) {
            None => Err(WalletError::UnknownAddress(address.to_string())),
            Some(EntryKind::Receiving) => Err(WalletError::CannotDeleteReceiving(address.to_string())),
            Some(EntryKind::Sending) => self
                .entries
                .remove(address)
                .ok_or_else(|| WalletError::UnknownAddress(address.to_string())),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&AddressBookEntry> {
        self.entries.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.entries.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by kind, then label, then address.
    pub fn entries(&self) -> Vec<AddressBookEntry> {
        let mut out: Vec<_> = self.entries.values().cloned().collect();
        out.sort_by(|a, b| {
            (a.kind == EntryKind::Sending, &a.label, a.address.encode()).cmp(&(
                b.kind == EntryKind::Sending,
                &b.label,
                b.address.encode(),
            ))
        });
        out
    }
}
