//! Dapp registration records
//!
//! A dapp is created by a confirmed type 5 transaction and is immutable
//! afterwards except for its transfer totals.

use crate::core::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_DESCRIPTION_LENGTH: usize = 160;
pub const MAX_TAGS_LENGTH: usize = 160;
pub const MAX_LINK_LENGTH: usize = 2000;
pub const MAX_CATEGORY: u8 = 8;

/// Dapp-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DappError {
    #[error("Dapp name already taken: {0}")]
    DuplicateName(String),
    #[error("Dapp link already registered: {0}")]
    DuplicateLink(String),
    #[error("Dapp not found: {0}")]
    UnknownDapp(String),
    #[error("In-transfer not confirmed: {0}")]
    UnknownInTransfer(String),
    #[error("In-transfer {in_transfer} belongs to dapp {actual}, not {expected}")]
    InTransferDappMismatch {
        in_transfer: String,
        expected: String,
        actual: String,
    },
    #[error("Insufficient dapp balance: available {available}, requested {requested}")]
    InsufficientDappBalance { available: u64, requested: u64 },
    #[error("Invalid dapp: {0}")]
    InvalidDapp(String),
    #[error("Invalid amount: amount must be greater than 0")]
    InvalidAmount,
}

impl DappError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DappError::DuplicateName(_) | DappError::DuplicateLink(_) => ErrorKind::Conflict,
            DappError::UnknownDapp(_) | DappError::UnknownInTransfer(_) => {
                ErrorKind::DependencyNotReady
            }
            DappError::InsufficientDappBalance { .. } => ErrorKind::InsufficientBalance,
            DappError::InTransferDappMismatch { .. }
            | DappError::InvalidDapp(_)
            | DappError::InvalidAmount => ErrorKind::Validation,
        }
    }
}

/// Type 5 payload
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DappAsset {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Comma-separated tags
    #[serde(default)]
    pub tags: Option<String>,
    /// Download link of the dapp bundle, must end in `.zip`
    pub link: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub category: u8,
    #[serde(default)]
    pub dapp_type: u8,
}

impl DappAsset {
    /// Minimal asset with a name and a link
    pub fn new(name: &str, link: &str, category: u8) -> Self {
        Self {
            name: name.to_string(),
            link: link.to_string(),
            category,
            ..Default::default()
        }
    }

    /// Check field formats; uniqueness is the ledger's concern
    pub fn validate(&self) -> Result<(), DappError> {
        let name = self.name.trim();
        if name.is_empty() || name != self.name {
            return Err(DappError::InvalidDapp(
                "name must be non-empty without surrounding whitespace".to_string(),
            ));
        }
        if self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(DappError::InvalidDapp(format!(
                "name longer than {} characters",
                MAX_NAME_LENGTH
            )));
        }

        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LENGTH {
                return Err(DappError::InvalidDapp("description too long".to_string()));
            }
        }

        if let Some(tags) = &self.tags {
            if tags.chars().count() > MAX_TAGS_LENGTH {
                return Err(DappError::InvalidDapp("tags too long".to_string()));
            }
            let mut seen: Vec<&str> = Vec::new();
            for tag in tags.split(',').map(str::trim) {
                if tag.is_empty() {
                    continue;
                }
                if seen.contains(&tag) {
                    return Err(DappError::InvalidDapp(format!("duplicate tag: {}", tag)));
                }
                seen.push(tag);
            }
        }

        if self.link.len() > MAX_LINK_LENGTH || !self.link.to_lowercase().ends_with(".zip") {
            return Err(DappError::InvalidDapp(
                "link must point to a .zip file".to_string(),
            ));
        }

        if let Some(icon) = &self.icon {
            let icon = icon.to_lowercase();
            if ![".png", ".jpg", ".jpeg"].iter().any(|ext| icon.ends_with(ext)) {
                return Err(DappError::InvalidDapp(
                    "icon must be a png or jpeg image".to_string(),
                ));
            }
        }

        if self.category > MAX_CATEGORY {
            return Err(DappError::InvalidDapp(format!(
                "category {} out of range 0-{}",
                self.category, MAX_CATEGORY
            )));
        }

        if self.dapp_type != 0 {
            return Err(DappError::InvalidDapp(format!(
                "unsupported dapp type {}",
                self.dapp_type
            )));
        }

        Ok(())
    }
}

/// A confirmed dapp
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dapp {
    /// Id of the registering transaction
    pub id: String,
    pub owner: String,
    pub asset: DappAsset,
    pub registered_at_height: u64,
    pub created_at: DateTime<Utc>,
    /// Confirmed in-transfers: transaction id -> amount
    pub in_transfers: HashMap<String, u64>,
    /// Confirmed out-transfers: transaction id -> amount
    pub out_transfers: HashMap<String, u64>,
    pub total_in: u64,
    pub total_out: u64,
}

impl Dapp {
    pub fn new(id: String, owner: String, asset: DappAsset, height: u64) -> Self {
        Self {
            id,
            owner,
            asset,
            registered_at_height: height,
            created_at: Utc::now(),
            in_transfers: HashMap::new(),
            out_transfers: HashMap::new(),
            total_in: 0,
            total_out: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.asset.name
    }

    /// Confirmed in minus confirmed out
    pub fn available_balance(&self) -> u64 {
        self.total_in.saturating_sub(self.total_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_asset() {
        let asset = DappAsset {
            description: Some("A dapp".to_string()),
            tags: Some("game, fun".to_string()),
            icon: Some("https://example.com/icon.png".to_string()),
            ..DappAsset::new("Lisk Guestbook", "https://example.com/guestbook.zip", 2)
        };
        assert!(asset.validate().is_ok());
    }

    #[test]
    fn test_invalid_assets() {
        let base = DappAsset::new("app", "https://example.com/app.zip", 0);

        let cases = vec![
            DappAsset { name: String::new(), ..base.clone() },
            DappAsset { name: " app".to_string(), ..base.clone() },
            DappAsset { name: "x".repeat(33), ..base.clone() },
            DappAsset { link: "https://example.com/app.tar".to_string(), ..base.clone() },
            DappAsset { category: 9, ..base.clone() },
            DappAsset { dapp_type: 1, ..base.clone() },
            DappAsset { tags: Some("a,b,a".to_string()), ..base.clone() },
            DappAsset { icon: Some("icon.gif".to_string()), ..base.clone() },
        ];

        for asset in cases {
            let err = asset.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{:?}", asset);
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(DappError::DuplicateLink("l".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            DappError::UnknownInTransfer("t".into()).kind(),
            ErrorKind::DependencyNotReady
        );
        assert_eq!(
            DappError::InsufficientDappBalance {
                available: 1,
                requested: 2
            }
            .kind(),
            ErrorKind::InsufficientBalance
        );
    }
}
