// core/src/models/session.rs

use super::Track;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Track index -> package id, as stored by the session service (`{"0": "breakthrough"}`).
pub type PackageSelections = BTreeMap<usize, String>;

/// Item composition of a checkout session. Prices are never taken from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
  pub tracks: Vec<Track>,
  pub selected_packages: PackageSelections,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
}
