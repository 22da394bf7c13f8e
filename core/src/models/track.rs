// core/src/models/track.rs

use serde::{Deserialize, Serialize};

/// A Spotify track picked for promotion. Identified by its Spotify id and never edited once
/// selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
  pub id: String,
  pub title: String,
  pub artist: String,
  pub image_url: String,
  pub url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artist_profile_url: Option<String>,
}
