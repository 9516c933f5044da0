//! Media playback model backing the `"music"` pseudo-entity.
//!
//! Player state frames are flattened into plain attributes so the store
//! treats music like any other entity. Listeners that care about playback
//! get a [`MusicUpdate`], rebuilt from those attributes and diffed against
//! the previous state.

use serde::{Deserialize, Serialize};

use crate::entity::{AttributeKey, AttributeValue, Attributes};

/// Track-related keys cleared when playback stops reporting a track.
const TRACK_KEYS: [AttributeKey; 6] = [
    AttributeKey::TrackId,
    AttributeKey::TrackName,
    AttributeKey::Artist,
    AttributeKey::Album,
    AttributeKey::AlbumArt,
    AttributeKey::DurationMs,
];

/// Structured player state as pushed by the relay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<i64>,
    #[serde(default)]
    pub device: Option<PlayerDevice>,
    #[serde(default)]
    pub item: Option<TrackItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerDevice {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub volume_percent: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<NamedItem>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedItem {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}

impl PlayerState {
    /// Whether this state describes something worth showing.
    #[must_use]
    pub fn has_track(&self) -> bool {
        self.item.is_some()
    }

    /// Flatten into attributes of the music pseudo-entity.
    #[must_use]
    pub fn to_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new()
            .with(AttributeKey::IsPlaying, self.is_playing)
            .with(AttributeKey::ProgressMs, self.progress_ms)
            .with(
                AttributeKey::Volume,
                self.device.as_ref().and_then(|d| d.volume_percent),
            );
        match &self.item {
            Some(item) => {
                let artist = item
                    .artists
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let album = item.album.as_ref();
                attributes.insert(AttributeKey::TrackId, item.id.as_str());
                attributes.insert(AttributeKey::TrackName, item.name.as_str());
                attributes.insert(AttributeKey::Artist, artist);
                attributes.insert(AttributeKey::Album, album.map(|a| a.name.clone()));
                attributes.insert(
                    AttributeKey::AlbumArt,
                    album.and_then(|a| a.images.first()).map(|i| i.url.clone()),
                );
                attributes.insert(AttributeKey::DurationMs, item.duration_ms);
            }
            None => {
                for key in TRACK_KEYS {
                    attributes.insert(key, AttributeValue::Null);
                }
            }
        }
        attributes
    }

    /// Attributes that clear playback entirely ("nothing active").
    #[must_use]
    pub fn cleared_attributes() -> Attributes {
        let mut attributes = Attributes::new()
            .with(AttributeKey::IsPlaying, false)
            .with(AttributeKey::ProgressMs, AttributeValue::Null);
        for key in TRACK_KEYS {
            attributes.insert(key, AttributeValue::Null);
        }
        attributes
    }
}

/// Track currently loaded in the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
    pub album_art: Option<String>,
    pub duration_ms: Option<i64>,
}

/// Playback state reconstructed from music attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicState {
    pub is_playing: bool,
    pub track: Option<TrackInfo>,
}

impl MusicState {
    #[must_use]
    pub fn from_attributes(attributes: &Attributes) -> Self {
        let text = |key: &AttributeKey| {
            attributes
                .get(key)
                .and_then(AttributeValue::as_str)
                .map(str::to_string)
        };
        let track = text(&AttributeKey::TrackId).map(|id| TrackInfo {
            id,
            name: text(&AttributeKey::TrackName).unwrap_or_default(),
            artist: text(&AttributeKey::Artist).unwrap_or_default(),
            album: text(&AttributeKey::Album),
            album_art: text(&AttributeKey::AlbumArt),
            duration_ms: attributes
                .get(&AttributeKey::DurationMs)
                .and_then(AttributeValue::as_i64),
        });
        Self {
            is_playing: attributes
                .get(&AttributeKey::IsPlaying)
                .and_then(AttributeValue::as_bool)
                .unwrap_or(false),
            track,
        }
    }
}

/// Payload delivered to music listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicUpdate {
    pub is_playing: bool,
    pub track_info: Option<TrackInfo>,
    pub track_changed: bool,
    pub playing_state_changed: bool,
}

impl MusicUpdate {
    /// Diff `current` against the previously delivered state.
    ///
    /// With no previous state, the comparison is made against "stopped,
    /// nothing loaded".
    #[must_use]
    pub fn diff(previous: Option<&MusicState>, current: &MusicState) -> Self {
        let default = MusicState::default();
        let previous = previous.unwrap_or(&default);
        let track_id = |state: &MusicState| state.track.as_ref().map(|t| t.id.clone());
        Self {
            is_playing: current.is_playing,
            track_info: current.track.clone(),
            track_changed: track_id(previous) != track_id(current),
            playing_state_changed: previous.is_playing != current.is_playing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(track: &str) -> PlayerState {
        PlayerState {
            is_playing: true,
            progress_ms: Some(1_000),
            device: Some(PlayerDevice {
                name: Some("Kitchen".to_string()),
                volume_percent: Some(40),
            }),
            item: Some(TrackItem {
                id: track.to_string(),
                name: format!("Song {track}"),
                artists: vec![
                    NamedItem {
                        name: "A".to_string(),
                    },
                    NamedItem {
                        name: "B".to_string(),
                    },
                ],
                album: Some(Album {
                    name: "Record".to_string(),
                    images: vec![Image {
                        url: "http://img/1".to_string(),
                    }],
                }),
                duration_ms: Some(180_000),
            }),
        }
    }

    #[test]
    fn should_flatten_player_state_into_attributes() {
        let attributes = playing("t1").to_attributes();
        assert_eq!(
            attributes.get(&AttributeKey::Artist),
            Some(&AttributeValue::from("A, B"))
        );
        assert_eq!(
            attributes.get(&AttributeKey::Volume),
            Some(&AttributeValue::Int(40))
        );
    }

    #[test]
    fn should_rebuild_music_state_from_attributes() {
        let state = MusicState::from_attributes(&playing("t1").to_attributes());
        assert!(state.is_playing);
        let track = state.track.unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.album_art.as_deref(), Some("http://img/1"));
    }

    #[test]
    fn should_clear_track_when_merging_cleared_attributes() {
        let mut attributes = playing("t1").to_attributes();
        attributes.merge(&PlayerState::cleared_attributes());
        let state = MusicState::from_attributes(&attributes);
        assert!(!state.is_playing);
        assert!(state.track.is_none());
    }

    #[test]
    fn should_flag_track_change() {
        let before = MusicState::from_attributes(&playing("t1").to_attributes());
        let after = MusicState::from_attributes(&playing("t2").to_attributes());
        let update = MusicUpdate::diff(Some(&before), &after);
        assert!(update.track_changed);
        assert!(!update.playing_state_changed);
    }

    #[test]
    fn should_flag_playing_state_change_against_default() {
        let after = MusicState::from_attributes(&playing("t1").to_attributes());
        let update = MusicUpdate::diff(None, &after);
        assert!(update.track_changed);
        assert!(update.playing_state_changed);
    }

    #[test]
    fn should_deserialize_relay_payload_with_missing_fields() {
        let state: PlayerState =
            serde_json::from_str(r#"{"is_playing": true, "item": {"id": "x", "name": "Y"}}"#)
                .unwrap();
        assert!(state.has_track());
        assert!(state.device.is_none());
    }
}
