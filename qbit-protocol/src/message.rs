//! JSON messages exchanged with the cloud peer and the MQTT broker
//!
//! Socket messages are JSON objects tagged by a `"type"` field. Unknown
//! message types decode to [`InboundMessage::Unknown`] and are ignored by
//! the caller; anything that is not valid JSON (or is missing required
//! fields) is a [`MessageError::Malformed`] and is dropped.

use alloc::string::String;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sender shown when a socket poke does not name one
pub const DEFAULT_SOCKET_SENDER: &str = "Someone";

/// Sender shown when an MQTT poke command does not name one
pub const DEFAULT_MQTT_SENDER: &str = "MQTT";

/// Message shown when a poke carries no text
pub const DEFAULT_POKE_TEXT: &str = "Poke!";

/// Name shown when a claim request carries no user name
pub const DEFAULT_CLAIM_USER: &str = "Unknown";

/// Errors that can occur while decoding or encoding a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// Not valid JSON, or a required field is missing or mistyped
    Malformed,
    /// Serialization failed
    Encode,
}

/// Messages received from the cloud peer over the device socket
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// A notification for the display
    #[serde(rename = "poke")]
    Poke(PokeMessage),
    /// A user asks to bind this device to their account
    #[serde(rename = "claim_request")]
    ClaimRequest {
        #[serde(rename = "userName", default)]
        user_name: Option<String>,
    },
    /// Any message type this firmware does not handle
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Decode a socket text message
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        serde_json::from_str(text).map_err(|_| MessageError::Malformed)
    }
}

/// Body of an inbound `poke` message
///
/// The bitmap fields are base64 strings holding column-major page data
/// (one byte per column per 8-pixel page). They are only honored when both
/// bitmaps and both widths are present.
///
/// Every field is optional and a field of the wrong type reads as absent,
/// so a poke with a broken bitmap still arrives as a text poke.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokeMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub sender: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub sender_bitmap: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub sender_bitmap_width: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub text_bitmap: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub text_bitmap_width: Option<u32>,
}

/// Read any JSON value, keeping it only if it has the expected type
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Encoded bitmap fields of a poke, borrowed from the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapFields<'a> {
    pub sender: &'a str,
    pub sender_width: u32,
    pub text: &'a str,
    pub text_width: u32,
}

impl PokeMessage {
    /// Sender name, or the default when absent or empty
    pub fn sender_or_default(&self) -> &str {
        non_empty(self.sender.as_deref()).unwrap_or(DEFAULT_SOCKET_SENDER)
    }

    /// Message text, or the default when absent or empty
    pub fn text_or_default(&self) -> &str {
        non_empty(self.text.as_deref()).unwrap_or(DEFAULT_POKE_TEXT)
    }

    /// Bitmap fields, if the message carries a complete bitmap pair
    pub fn bitmap_fields(&self) -> Option<BitmapFields<'_>> {
        let sender = non_empty(self.sender_bitmap.as_deref())?;
        let text = non_empty(self.text_bitmap.as_deref())?;
        let sender_width = self.sender_bitmap_width.filter(|w| *w > 0)?;
        let text_width = self.text_bitmap_width.filter(|w| *w > 0)?;

        Some(BitmapFields {
            sender,
            sender_width,
            text,
            text_width,
        })
    }
}

/// Messages sent to the cloud peer over the device socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage<'a> {
    /// Sent once every time the socket opens
    #[serde(rename = "device.register")]
    Register {
        id: &'a str,
        name: &'a str,
        ip: &'a str,
        version: &'a str,
    },
    /// The user held the pad during a claim prompt
    #[serde(rename = "claim_confirm")]
    ClaimConfirm,
    /// The claim prompt expired
    #[serde(rename = "claim_reject")]
    ClaimReject,
}

impl OutboundMessage<'_> {
    /// Encode as a JSON text message
    pub fn to_json(&self) -> Result<String, MessageError> {
        to_json(self)
    }
}

/// Payload of the MQTT `/command` topic
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandPayload {
    pub command: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl CommandPayload {
    /// Decode a command payload
    pub fn parse(payload: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice(payload).map_err(|_| MessageError::Malformed)
    }

    /// Sender name, or the MQTT default
    pub fn sender_or_default(&self) -> &str {
        non_empty(self.sender.as_deref()).unwrap_or(DEFAULT_MQTT_SENDER)
    }

    /// Message text, or the default
    pub fn text_or_default(&self) -> &str {
        non_empty(self.text.as_deref()).unwrap_or(DEFAULT_POKE_TEXT)
    }
}

/// Payload published on `/poke` when a poke arrives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PokePayload<'a> {
    pub sender: &'a str,
    pub text: &'a str,
    pub time: &'a str,
}

/// Payload published on `/touch` for every completed gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TouchPayload<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub time: &'a str,
}

/// Payload published (retained) on `/info` after the broker connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoPayload<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub ip: &'a str,
}

/// Serialize any payload to a JSON string
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, MessageError> {
    serde_json::to_string(value).map_err(|_| MessageError::Encode)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
