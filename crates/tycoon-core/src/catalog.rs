//! Catalog (category → subcategory → item) and shopping carts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TycoonError};
use crate::types::{ensure_non_negative, CategoryId, ItemId, Money, SubcategoryId, UserId};

/// Top-level grouping of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Second level of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub category_id: CategoryId,
    pub name: String,
}

/// A purchasable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,

    /// Unit price. Only bulk price adjustment changes it.
    pub price: Money,

    /// Weight in kilograms.
    pub weight: i64,

    pub subcategory_id: SubcategoryId,
}

impl Item {
    /// The item re-priced by `pct` percent.
    pub fn adjusted(&self, pct: i64) -> Result<Item> {
        Ok(Item {
            price: adjusted_price(self.price, pct)?,
            ..self.clone()
        })
    }
}

/// Item fields before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub weight: i64,
    pub subcategory_id: SubcategoryId,
}

impl NewItem {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TycoonError::invalid("item name cannot be empty"));
        }
        ensure_non_negative(self.price, "item price")?;
        ensure_non_negative(self.weight, "item weight")?;
        Ok(())
    }

    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            name: self.name,
            price: self.price,
            weight: self.weight,
            subcategory_id: self.subcategory_id,
        }
    }
}

/// Multiply `price` by `(1 + pct/100)` and truncate toward zero.
///
/// Integer arithmetic keeps 100 at 15% at exactly 115.
pub fn adjusted_price(price: Money, pct: i64) -> Result<Money> {
    if pct < -100 {
        return Err(TycoonError::invalid(format!(
            "percentage must be at least -100, got {}",
            pct
        )));
    }
    let factor = 100i128 + pct as i128;
    let scaled = (price as i128) * factor / 100;
    Money::try_from(scaled).map_err(|_| TycoonError::invalid("adjusted price overflows"))
}

/// One entry in a user's cart. Quantity is always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub quantity: i64,
}

/// A cart line priced at current catalog prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub item: Item,
    pub quantity: i64,
    pub line_total: Money,
}

/// A fully priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub user_id: UserId,
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

impl CartSummary {
    /// Price `lines` against `items`.
    ///
    /// Every line must reference a known item.
    pub fn price(user_id: UserId, lines: &[CartLine], items: &HashMap<ItemId, Item>) -> Result<Self> {
        let mut priced = Vec::with_capacity(lines.len());
        let mut total: Money = 0;

        for line in lines {
            let item = items
                .get(&line.item_id)
                .ok_or_else(|| TycoonError::not_found(ItemId::LABEL, line.item_id))?;
            let line_total = item
                .price
                .checked_mul(line.quantity)
                .ok_or_else(|| TycoonError::invalid("cart total overflows"))?;
            total = total
                .checked_add(line_total)
                .ok_or_else(|| TycoonError::invalid("cart total overflows"))?;
            priced.push(PricedLine {
                item: item.clone(),
                quantity: line.quantity,
                line_total,
            });
        }

        Ok(Self {
            user_id,
            lines: priced,
            total,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Receipt text shown before confirmation.
    pub fn render(&self) -> String {
        let mut out = String::from("Your order:\n");
        for line in &self.lines {
            out.push_str(&format!(
                "{} x{} = {}\n",
                line.item.name, line.quantity, line.line_total
            ));
        }
        out.push_str(&format!("\nTotal: {}", self.total));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, price: Money) -> Item {
        Item {
            id: ItemId(id),
            name: format!("item-{}", id),
            price,
            weight: 1,
            subcategory_id: SubcategoryId(1),
        }
    }

    #[test]
    fn test_adjusted_price_truncates() {
        assert_eq!(adjusted_price(100, 15).unwrap(), 115);
        assert_eq!(adjusted_price(20, 15).unwrap(), 23);
        assert_eq!(adjusted_price(7, 15).unwrap(), 8);
        assert_eq!(adjusted_price(99, -50).unwrap(), 49);
        assert_eq!(adjusted_price(99, -100).unwrap(), 0);
        assert!(adjusted_price(10, -101).is_err());
    }

    #[test]
    fn test_cart_pricing() {
        let items: HashMap<ItemId, Item> =
            [(ItemId(1), item(1, 20)), (ItemId(2), item(2, 15))].into_iter().collect();
        let lines = vec![
            CartLine { user_id: UserId(5), item_id: ItemId(1), quantity: 3 },
            CartLine { user_id: UserId(5), item_id: ItemId(2), quantity: 1 },
        ];

        let summary = CartSummary::price(UserId(5), &lines, &items).unwrap();
        assert_eq!(summary.total, 75);
        assert_eq!(summary.lines[0].line_total, 60);
        assert!(summary.render().contains("Total: 75"));
    }

    #[test]
    fn test_cart_pricing_unknown_item() {
        let items = HashMap::new();
        let lines = vec![CartLine { user_id: UserId(5), item_id: ItemId(9), quantity: 1 }];
        let err = CartSummary::price(UserId(5), &lines, &items).unwrap_err();
        assert!(matches!(err, TycoonError::NotFound { .. }));
    }

    #[test]
    fn test_new_item_validation() {
        let new = NewItem {
            name: "Crate".into(),
            price: -1,
            weight: 0,
            subcategory_id: SubcategoryId(1),
        };
        assert!(new.validate().is_err());
    }
}
