use crate::domain::stock::StockMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A named set of held symbols. `owner` is an opaque identity reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub members: BTreeSet<String>,
}

impl Portfolio {
    pub fn new(id: Uuid, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            owner: owner.into(),
            name: name.into(),
            created_at: Utc::now(),
            members: BTreeSet::new(),
        }
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.members.contains(symbol)
    }

    /// Adds a catalog stock. `None` is a lookup miss: returns false and leaves membership alone.
    /// Re-adding a current member is a no-op that still returns true.
    pub fn add_stock(&mut self, stock: Option<&StockMetrics>) -> bool {
        match stock {
            Some(s) => {
                self.members.insert(s.symbol.clone());
                true
            }
            None => false,
        }
    }

    /// Removing a symbol that is not held is a no-op.
    pub fn delete_stock(&mut self, symbol: &str) {
        self.members.remove(symbol);
    }
}
