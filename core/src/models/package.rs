// core/src/models/package.rs

use crate::money::Money;
use serde::{Deserialize, Serialize};

/// A promotion tier. Reference data only; the client never persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
  pub id: String,
  pub name: String,
  pub price: Money,
  pub plays: String,
  pub placements: String,
  pub description: String,
}

/// The fixed set of packages offered in the storefront.
#[derive(Debug, Clone)]
pub struct PackageCatalog {
  packages: Vec<Package>,
}

impl PackageCatalog {
  pub fn new(packages: Vec<Package>) -> Self {
    Self { packages }
  }

  pub fn get(&self, id: &str) -> Option<&Package> {
    self.packages.iter().find(|p| p.id == id)
  }

  pub fn all(&self) -> &[Package] {
    &self.packages
  }
}

fn package(id: &str, name: &str, price: i64, plays: &str, placements: &str, description: &str) -> Package {
  Package {
    id: id.to_string(),
    name: name.to_string(),
    price: Money::from_whole(price),
    plays: plays.to_string(),
    placements: placements.to_string(),
    description: description.to_string(),
  }
}

impl Default for PackageCatalog {
  fn default() -> Self {
    Self::new(vec![
      package(
        "breakthrough",
        "BREAKTHROUGH",
        39,
        "3k - 3.5k Streams",
        "10 - 12 Playlist Pitches",
        "Kickstart your track with real listeners.",
      ),
      package(
        "momentum",
        "MOMENTUM",
        79,
        "7.5k - 8.5k Streams",
        "25 - 30 Playlist Pitches",
        "Build momentum and grow your audience.",
      ),
      package(
        "dominate",
        "DOMINATE",
        149,
        "18k - 20k Streams",
        "60 - 70 Playlist Pitches",
        "Push your track into algorithmic playlists.",
      ),
      package(
        "unstoppable",
        "UNSTOPPABLE",
        259,
        "45k - 50k Streams",
        "150 - 170 Playlist Pitches",
        "Serious reach for serious releases.",
      ),
      package(
        "legendary",
        "LEGENDARY",
        479,
        "125k - 150k Streams",
        "375 - 400 Playlist Pitches",
        "Our biggest campaign for breakout records.",
      ),
    ])
  }
}
