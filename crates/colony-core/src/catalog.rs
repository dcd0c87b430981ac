//! Recipe and item lookup tables.
//!
//! Mirrors the game's data tables: each product has at most one recipe, each
//! item has a display name. The catalog is immutable once built.

use std::collections::BTreeMap;

use contracts::{ItemDef, ItemId, Recipe};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate item id {0}")]
    DuplicateItem(ItemId),
    #[error("duplicate recipe for product {0}")]
    DuplicateRecipe(ItemId),
    #[error("duplicate recipe id {0}")]
    DuplicateRecipeId(u32),
    #[error("recipe {recipe_id} needs {count} of item {item_id}; counts must be positive")]
    InvalidIngredient {
        recipe_id: u32,
        item_id: ItemId,
        count: i64,
    },
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk shape of a catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeCatalog {
    items: Vec<ItemDef>,
    recipes: Vec<Recipe>,
    item_index: BTreeMap<ItemId, usize>,
    name_index: BTreeMap<String, ItemId>,
    product_index: BTreeMap<ItemId, usize>,
    recipe_index: BTreeMap<u32, usize>,
}

impl RecipeCatalog {
    pub fn new(items: Vec<ItemDef>, recipes: Vec<Recipe>) -> Result<Self, CatalogError> {
        let mut item_index = BTreeMap::new();
        let mut name_index = BTreeMap::new();
        for (idx, item) in items.iter().enumerate() {
            if item_index.insert(item.item_id, idx).is_some() {
                return Err(CatalogError::DuplicateItem(item.item_id));
            }
            name_index.insert(item.name.to_ascii_lowercase(), item.item_id);
        }

        let mut product_index = BTreeMap::new();
        let mut recipe_index = BTreeMap::new();
        for (idx, recipe) in recipes.iter().enumerate() {
            if product_index.insert(recipe.product_id, idx).is_some() {
                return Err(CatalogError::DuplicateRecipe(recipe.product_id));
            }
            if recipe_index.insert(recipe.recipe_id, idx).is_some() {
                return Err(CatalogError::DuplicateRecipeId(recipe.recipe_id));
            }
            if let Some(bad) = recipe.ingredients.iter().find(|ing| ing.count <= 0) {
                return Err(CatalogError::InvalidIngredient {
                    recipe_id: recipe.recipe_id,
                    item_id: bad.item_id,
                    count: bad.count,
                });
            }
        }

        Ok(Self {
            items,
            recipes,
            item_index,
            name_index,
            product_index,
            recipe_index,
        })
    }

    pub fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        Self::new(file.items, file.recipes)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        Self::from_file(serde_json::from_str(raw)?)
    }

    pub fn items(&self) -> &[ItemDef] {
        &self.items
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn item(&self, item_id: ItemId) -> Option<&ItemDef> {
        self.item_index.get(&item_id).map(|idx| &self.items[*idx])
    }

    /// Case-insensitive name lookup. Bare numeric names are accepted as ids.
    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        let name = name.trim();
        self.name_index
            .get(&name.to_ascii_lowercase())
            .copied()
            .or_else(|| name.parse().ok().filter(|id| self.item_index.contains_key(id)))
    }

    pub fn item_name(&self, item_id: ItemId) -> String {
        self.item(item_id)
            .map(|item| item.name.clone())
            .unwrap_or_else(|| format!("Item_{item_id}"))
    }

    pub fn is_food(&self, item_id: ItemId) -> bool {
        self.item(item_id).is_some_and(|item| item.is_food)
    }

    pub fn food_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items
            .iter()
            .filter(|item| item.is_food)
            .map(|item| item.item_id)
    }

    pub fn recipe_for(&self, product_id: ItemId) -> Option<&Recipe> {
        self.product_index
            .get(&product_id)
            .map(|idx| &self.recipes[*idx])
    }

    pub fn recipe_by_id(&self, recipe_id: u32) -> Option<&Recipe> {
        self.recipe_index
            .get(&recipe_id)
            .map(|idx| &self.recipes[*idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Capability, Ingredient};

    fn sample() -> RecipeCatalog {
        RecipeCatalog::from_json_str(
            r#"{
                "items": [
                    { "item_id": 1001, "name": "Cotton" },
                    { "item_id": 1002, "name": "Cloth" },
                    { "item_id": 2003, "name": "Meal", "is_food": true }
                ],
                "recipes": [
                    {
                        "recipe_id": 3001,
                        "product_id": 1002,
                        "facility_category": "WorkStation",
                        "ingredients": [{ "item_id": 1001, "count": 5 }],
                        "required_capability": "CanCraft"
                    }
                ]
            }"#,
        )
        .expect("catalog parses")
    }

    #[test]
    fn lookups_by_name_id_and_product() {
        let catalog = sample();
        assert_eq!(catalog.item_id("cloth"), Some(1002));
        assert_eq!(catalog.item_id(" COTTON "), Some(1001));
        assert_eq!(catalog.item_id("1001"), Some(1001));
        assert_eq!(catalog.item_id("9999"), None);
        assert_eq!(catalog.item_name(2003), "Meal");
        assert_eq!(catalog.item_name(42), "Item_42");

        let recipe = catalog.recipe_for(1002).expect("cloth recipe");
        assert_eq!(recipe.recipe_id, 3001);
        assert_eq!(
            recipe.ingredients,
            vec![Ingredient {
                item_id: 1001,
                count: 5
            }]
        );
        assert_eq!(recipe.required_capability, Some(Capability::new("cancraft")));
        assert_eq!(catalog.recipe_by_id(3001).map(|r| r.product_id), Some(1002));
        assert!(catalog.recipe_for(1001).is_none());
    }

    #[test]
    fn food_items_are_flagged() {
        let catalog = sample();
        assert!(catalog.is_food(2003));
        assert!(!catalog.is_food(1001));
        assert_eq!(catalog.food_items().collect::<Vec<_>>(), vec![2003]);
    }

    #[test]
    fn duplicate_recipes_are_rejected() {
        let recipe = Recipe {
            recipe_id: 1,
            product_id: 7,
            facility_category: "Stove".to_string(),
            ingredients: Vec::new(),
            required_capability: None,
        };
        let mut second = recipe.clone();
        second.recipe_id = 2;
        let err = RecipeCatalog::new(Vec::new(), vec![recipe, second]).expect_err("duplicate");
        assert!(matches!(err, CatalogError::DuplicateRecipe(7)));
    }

    #[test]
    fn non_positive_ingredient_counts_are_rejected() {
        let err = RecipeCatalog::from_json_str(
            r#"{
                "recipes": [{
                    "recipe_id": 9,
                    "product_id": 90,
                    "facility_category": "WorkStation",
                    "ingredients": [{ "item_id": 1, "count": 2 }, { "item_id": 2, "count": 0 }]
                }]
            }"#,
        )
        .expect_err("zero count");
        assert!(matches!(
            err,
            CatalogError::InvalidIngredient {
                recipe_id: 9,
                item_id: 2,
                count: 0
            }
        ));
    }
}
