//! Dependency ledger for dapps and their transfers
//!
//! Mutators are only called when a transaction is confirmed. Each has a
//! read-only `check_*` twin used at admission and at commit re-validation.

use super::dapp::{Dapp, DappAsset, DappError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Confirmed dapps and the running in/out balance of each
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DependencyLedger {
    /// Dapps by registering transaction id
    dapps: HashMap<String, Dapp>,
    /// Name -> dapp id
    by_name: HashMap<String, String>,
    /// Link -> dapp id
    by_link: HashMap<String, String>,
    /// Confirmed in-transfer id -> dapp id
    in_transfers: HashMap<String, String>,
}

impl DependencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn check_register_dapp(&self, asset: &DappAsset) -> Result<(), DappError> {
        asset.validate()?;
        if self.by_name.contains_key(&asset.name) {
            return Err(DappError::DuplicateName(asset.name.clone()));
        }
        if self.by_link.contains_key(&asset.link) {
            return Err(DappError::DuplicateLink(asset.link.clone()));
        }
        Ok(())
    }

    /// Register a dapp created by transaction `transaction_id`
    pub fn register_dapp(
        &mut self,
        transaction_id: &str,
        owner: &str,
        asset: DappAsset,
        height: u64,
    ) -> Result<&Dapp, DappError> {
        self.check_register_dapp(&asset)?;

        log::info!("Dapp registered: {} ({})", asset.name, transaction_id);

        self.by_name
            .insert(asset.name.clone(), transaction_id.to_string());
        self.by_link
            .insert(asset.link.clone(), transaction_id.to_string());

        let dapp = Dapp::new(transaction_id.to_string(), owner.to_string(), asset, height);
        Ok(self
            .dapps
            .entry(transaction_id.to_string())
            .or_insert(dapp))
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    pub fn check_in_transfer(&self, dapp_id: &str, amount: u64) -> Result<(), DappError> {
        if amount == 0 {
            return Err(DappError::InvalidAmount);
        }
        if !self.dapps.contains_key(dapp_id) {
            return Err(DappError::UnknownDapp(dapp_id.to_string()));
        }
        Ok(())
    }

    /// Credit `amount` to the dapp. Returns the new available balance.
    pub fn record_in_transfer(
        &mut self,
        transaction_id: &str,
        dapp_id: &str,
        amount: u64,
    ) -> Result<u64, DappError> {
        self.check_in_transfer(dapp_id, amount)?;

        let dapp = self
            .dapps
            .get_mut(dapp_id)
            .ok_or_else(|| DappError::UnknownDapp(dapp_id.to_string()))?;
        dapp.in_transfers.insert(transaction_id.to_string(), amount);
        dapp.total_in = dapp.total_in.saturating_add(amount);
        self.in_transfers
            .insert(transaction_id.to_string(), dapp_id.to_string());

        log::debug!("In-transfer {} credited {} to dapp {}", transaction_id, amount, dapp_id);
        Ok(dapp.available_balance())
    }

    pub fn check_out_transfer(
        &self,
        dapp_id: &str,
        in_transfer_id: &str,
        amount: u64,
    ) -> Result<(), DappError> {
        if amount == 0 {
            return Err(DappError::InvalidAmount);
        }

        let dapp = self
            .dapps
            .get(dapp_id)
            .ok_or_else(|| DappError::UnknownDapp(dapp_id.to_string()))?;

        match self.in_transfers.get(in_transfer_id) {
            None => return Err(DappError::UnknownInTransfer(in_transfer_id.to_string())),
            Some(owner) if owner != dapp_id => {
                return Err(DappError::InTransferDappMismatch {
                    in_transfer: in_transfer_id.to_string(),
                    expected: dapp_id.to_string(),
                    actual: owner.clone(),
                })
            }
            Some(_) => {}
        }

        let available = dapp.available_balance();
        if amount > available {
            return Err(DappError::InsufficientDappBalance {
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Debit `amount` from the dapp. Returns the new available balance.
    pub fn record_out_transfer(
        &mut self,
        transaction_id: &str,
        dapp_id: &str,
        in_transfer_id: &str,
        amount: u64,
    ) -> Result<u64, DappError> {
        self.check_out_transfer(dapp_id, in_transfer_id, amount)?;

        let dapp = self
            .dapps
            .get_mut(dapp_id)
            .ok_or_else(|| DappError::UnknownDapp(dapp_id.to_string()))?;
        dapp.out_transfers.insert(transaction_id.to_string(), amount);
        dapp.total_out = dapp.total_out.saturating_add(amount);

        log::debug!("Out-transfer {} debited {} from dapp {}", transaction_id, amount, dapp_id);
        Ok(dapp.available_balance())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn dapp(&self, id: &str) -> Option<&Dapp> {
        self.dapps.get(id)
    }

    pub fn dapp_by_name(&self, name: &str) -> Option<&Dapp> {
        self.by_name.get(name).and_then(|id| self.dapps.get(id))
    }

    pub fn available_balance(&self, dapp_id: &str) -> Option<u64> {
        self.dapps.get(dapp_id).map(|d| d.available_balance())
    }

    /// Dapp a confirmed in-transfer was credited to
    pub fn in_transfer_dapp(&self, in_transfer_id: &str) -> Option<&str> {
        self.in_transfers.get(in_transfer_id).map(String::as_str)
    }

    /// All dapps, oldest first
    pub fn list(&self) -> Vec<&Dapp> {
        let mut dapps: Vec<&Dapp> = self.dapps.values().collect();
        dapps.sort_by(|a, b| {
            a.registered_at_height
                .cmp(&b.registered_at_height)
                .then_with(|| a.asset.name.cmp(&b.asset.name))
        });
        dapps
    }

    pub fn len(&self) -> usize {
        self.dapps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dapps.is_empty()
    }
}
