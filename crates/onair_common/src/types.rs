//! Now-playing payload served by the radio metadata API.

use serde::{Deserialize, Serialize};

/// Whether an entry is on air or already played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Playing,
    History,
}

/// One track entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingItem {
    pub artist: String,
    pub duration: String,
    #[serde(rename = "iTunesTrackUrl")]
    pub itunes_track_url: String,
    pub image_url: String,
    pub status: TrackStatus,
    pub time: String,
    pub title: String,
}

/// Top-level response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingData {
    pub nowplaying: Vec<NowPlayingItem>,
}

impl NowPlayingData {
    /// The track currently on air, if the station reports one
    pub fn current(&self) -> Option<&NowPlayingItem> {
        self.nowplaying
            .iter()
            .find(|item| item.status == TrackStatus::Playing)
    }

    /// Previously played tracks, in the order the API returned them
    pub fn history(&self) -> impl Iterator<Item = &NowPlayingItem> {
        self.nowplaying
            .iter()
            .filter(|item| item.status == TrackStatus::History)
    }

    /// Semantic checks that serde cannot express.
    ///
    /// The wire shape is already enforced by decoding; this only rejects
    /// payloads claiming several tracks are on air at once.
    pub fn validate(&self) -> Result<(), String> {
        let playing = self
            .nowplaying
            .iter()
            .filter(|item| item.status == TrackStatus::Playing)
            .count();
        if playing > 1 {
            return Err(format!("{} tracks marked as playing", playing));
        }
        Ok(())
    }
}
