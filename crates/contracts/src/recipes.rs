//! Recipe and item tables imported from the game data files.

use serde::{Deserialize, Serialize};

use crate::{Capability, ItemId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingredient {
    pub item_id: ItemId,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipe {
    pub recipe_id: u32,
    pub product_id: ItemId,
    /// Category of the facility that runs this recipe (e.g. `WorkStation`, `Stove`).
    /// Empty means the configured default workstation.
    #[serde(default)]
    pub facility_category: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub required_capability: Option<Capability>,
}

impl Recipe {
    pub fn facility_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.facility_category.trim() {
            "" => fallback,
            category => category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemDef {
    pub item_id: ItemId,
    pub name: String,
    #[serde(default)]
    pub is_food: bool,
}
