// core/src/models/add_on.rs

use crate::money::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
  pub id: String,
  pub name: String,
  pub emoji: String,
  pub price: Money,
  pub original_price: Money,
}

impl AddOn {
  pub fn is_on_sale(&self) -> bool {
    self.price < self.original_price
  }
}

/// An add-on as it appears in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnOrderItem {
  pub id: String,
  pub name: String,
  pub emoji: String,
  pub price: Money,
  pub original_price: Money,
  pub is_on_sale: bool,
}

impl From<&AddOn> for AddOnOrderItem {
  fn from(add_on: &AddOn) -> Self {
    Self {
      id: add_on.id.clone(),
      name: add_on.name.clone(),
      emoji: add_on.emoji.clone(),
      price: add_on.price,
      original_price: add_on.original_price,
      is_on_sale: add_on.is_on_sale(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct AddOnCatalog {
  add_ons: Vec<AddOn>,
}

impl AddOnCatalog {
  pub fn new(add_ons: Vec<AddOn>) -> Self {
    Self { add_ons }
  }

  pub fn get(&self, id: &str) -> Option<&AddOn> {
    self.add_ons.iter().find(|a| a.id == id)
  }

  pub fn all(&self) -> &[AddOn] {
    &self.add_ons
  }
}

impl Default for AddOnCatalog {
  fn default() -> Self {
    Self::new(vec![
      AddOn {
        id: "express-launch".to_string(),
        name: "Express Launch".to_string(),
        emoji: "⚡".to_string(),
        price: Money::from_whole(28),
        original_price: Money::from_whole(40),
      },
      AddOn {
        id: "discover-weekly-push".to_string(),
        name: "Discover Weekly Push".to_string(),
        emoji: "🔥".to_string(),
        price: Money::from_whole(18),
        original_price: Money::from_whole(25),
      },
    ])
  }
}
