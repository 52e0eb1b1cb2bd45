//! Sync-protocol packet definitions.
//!
//! Packets travel as JSON text frames over the WebSocket connection between
//! the server and its viewers. The field layout is fixed: a `type` tag plus
//! an optional `content` payload.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// A packet sent by a viewer to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum Packet {
    /// Add a text entry to the shared clipboard.
    #[serde(rename = "newEntry")]
    NewEntry(String),

    /// Delete the clipboard entry with the given id. The id travels as a
    /// decimal string, matching what browser clients send.
    #[serde(rename = "delEntry")]
    DelEntry(String),

    /// Remove all clipboard entries.
    #[serde(rename = "clearClipboard")]
    ClearClipboard,

    /// Run a shell command on the host. Only honored when the server runs
    /// with remote-command mode enabled.
    #[serde(rename = "command")]
    Command(String),
}

impl Packet {
    /// Decode a packet from a JSON text frame.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Encode this packet as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the entry id carried by a `delEntry` packet.
    pub fn entry_id(&self) -> Result<usize> {
        match self {
            Packet::DelEntry(raw) => {
                raw.parse::<usize>()
                    .map_err(|e| ProtocolError::InvalidContent {
                        packet_type: "delEntry".to_string(),
                        reason: e.to_string(),
                    })
            }
            _ => Err(ProtocolError::InvalidContent {
                packet_type: "delEntry".to_string(),
                reason: "packet is not a delEntry".to_string(),
            }),
        }
    }
}

/// A packet sent by the server to every connected viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum SendPacket {
    /// The clipboard changed; viewers should re-fetch it.
    #[serde(rename = "refreshClipboard")]
    RefreshClipboard,

    /// Combined output of a remote command.
    #[serde(rename = "updateCLI")]
    UpdateCli(String),
}

impl SendPacket {
    /// Encode this packet as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a packet from a JSON text frame.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_roundtrip() {
        let packet = Packet::NewEntry("copy me".to_string());
        let json = packet.to_json().unwrap();
        assert_eq!(json, r#"{"type":"newEntry","content":"copy me"}"#);
        assert_eq!(Packet::from_json(&json).unwrap(), packet);
    }

    #[test]
    fn test_del_entry_id_parsing() {
        let packet = Packet::from_json(r#"{"type":"delEntry","content":"3"}"#).unwrap();
        assert_eq!(packet.entry_id().unwrap(), 3);
    }

    #[test]
    fn test_del_entry_id_not_a_number() {
        let packet = Packet::DelEntry("three".to_string());
        assert!(matches!(
            packet.entry_id(),
            Err(ProtocolError::InvalidContent { .. })
        ));
    }

    #[test]
    fn test_entry_id_on_wrong_packet() {
        let packet = Packet::ClearClipboard;
        assert!(packet.entry_id().is_err());
    }

    #[test]
    fn test_clear_clipboard_decodes_without_content() {
        let packet = Packet::from_json(r#"{"type":"clearClipboard"}"#).unwrap();
        assert_eq!(packet, Packet::ClearClipboard);
    }

    #[test]
    fn test_command_packet() {
        let packet = Packet::from_json(r#"{"type":"command","content":"ls -la"}"#).unwrap();
        assert_eq!(packet, Packet::Command("ls -la".to_string()));
    }

    #[test]
    fn test_unknown_type_is_decode_error() {
        let result = Packet::from_json(r#"{"type":"selfDestruct"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_refresh_clipboard_encoding() {
        let json = SendPacket::RefreshClipboard.to_json().unwrap();
        assert_eq!(json, r#"{"type":"refreshClipboard"}"#);
    }

    #[test]
    fn test_update_cli_roundtrip() {
        let packet = SendPacket::UpdateCli("total 8\ndrwxr-xr-x".to_string());
        let json = packet.to_json().unwrap();
        assert_eq!(SendPacket::from_json(&json).unwrap(), packet);
    }
}
