//! Messages relayed to the watch.

use serde::{Deserialize, Serialize};
use simplicity_weather::Temperature;

pub const LOCATION_UNAVAILABLE: &str = "Loc unavailable";
pub const HTTP_ERROR: &str = "HTTP Error";
pub const BAD_RESPONSE: &str = "Bad response";

// AppMessage dictionary layout: a one-byte tuple count, then per tuple a
// u32 key, a u8 type and a u16 length ahead of the value.
const DICT_HEADER_LEN: usize = 1;
const TUPLE_HEADER_LEN: usize = 4 + 1 + 2;
const INT_VALUE_LEN: usize = 4;

fn cstring_tuple_len(s: &str) -> usize {
    TUPLE_HEADER_LEN + s.len() + 1
}

/// Key/value payload for the watch. Serializes to `{"city", "temperature"}`
/// or `{"error"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceMessage {
    Weather { city: String, temperature: i64 },
    Error { error: String },
}

impl DeviceMessage {
    pub fn weather(city: impl Into<String>, temperature: Temperature) -> Self {
        DeviceMessage::Weather {
            city: city.into(),
            temperature: temperature.value,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        DeviceMessage::Error {
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DeviceMessage::Error { .. })
    }

    /// Size of this message once packed into an AppMessage dictionary.
    pub fn encoded_len(&self) -> usize {
        match self {
            DeviceMessage::Weather { city, .. } => {
                DICT_HEADER_LEN + cstring_tuple_len(city) + TUPLE_HEADER_LEN + INT_VALUE_LEN
            }
            DeviceMessage::Error { error } => DICT_HEADER_LEN + cstring_tuple_len(error),
        }
    }

    /// Shorten the city name until the message fits an inbox of `inbox_size` bytes.
    pub fn fit_to(self, inbox_size: usize) -> Self {
        match self {
            DeviceMessage::Weather { city, temperature } => {
                let overhead =
                    DICT_HEADER_LEN + TUPLE_HEADER_LEN + 1 + TUPLE_HEADER_LEN + INT_VALUE_LEN;
                let budget = inbox_size.saturating_sub(overhead);
                let city = truncate_on_char_boundary(city, budget);
                DeviceMessage::Weather { city, temperature }
            }
            other => other,
        }
    }
}

fn truncate_on_char_boundary(mut s: String, max_len: usize) -> String {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    tracing::debug!("Truncating city {:?} to {} bytes", s, end);
    s.truncate(end);
    s
}
