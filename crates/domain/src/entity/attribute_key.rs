//! Attribute names.
//!
//! Known names get a dedicated variant so the store can reason about them
//! (significance); anything else is carried as [`AttributeKey::Other`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! define_keys {
    ($($(#[doc = $doc:expr])* $variant:ident => $name:literal),* $(,)?) => {
        /// Name of an entity attribute.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum AttributeKey {
            $($(#[doc = $doc])* $variant,)*
            /// An attribute without a dedicated variant.
            Other(String),
        }

        impl AttributeKey {
            /// Wire name of the attribute.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Other(name) => name,
                }
            }
        }

        impl From<&str> for AttributeKey {
            fn from(name: &str) -> Self {
                match name {
                    $($name => Self::$variant,)*
                    other => Self::Other(other.to_string()),
                }
            }
        }
    };
}

define_keys! {
    Switch => "switch",
    Level => "level",
    Brightness => "brightness",
    Color => "color",
    ColorTemperature => "color_temperature",
    Temperature => "temperature",
    Humidity => "humidity",
    Battery => "battery",
    Power => "power",
    Energy => "energy",
    Contact => "contact",
    Motion => "motion",
    Lock => "lock",
    Position => "position",
    Mode => "mode",
    IsPlaying => "is_playing",
    TrackId => "track_id",
    TrackName => "track_name",
    Artist => "artist",
    Album => "album",
    AlbumArt => "album_art",
    DurationMs => "duration_ms",
    /// Playback position; advances continuously while playing.
    ProgressMs => "progress_ms",
    Volume => "volume",
    /// Radio signal strength.
    Rssi => "rssi",
    LinkQuality => "link_quality",
    LastSeen => "last_seen",
}

impl AttributeKey {
    /// Whether a change to this attribute should reach listeners.
    ///
    /// High-frequency telemetry is merged into the record but never
    /// triggers a notification on its own.
    #[must_use]
    pub fn is_significant(&self) -> bool {
        !matches!(
            self,
            Self::Rssi | Self::LinkQuality | Self::LastSeen | Self::ProgressMs
        )
    }
}

impl From<String> for AttributeKey {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AttributeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AttributeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name))
    }
}
