//! Datagram definitions matching the gateway.

#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Protocol version (must match gateway)
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header length
pub const HEADER_LEN: usize = 12;

/// Largest datagram the gateway may emit
pub const MAX_FRAME_SIZE: usize = 2048;

/// Message types matching the gateway protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    PushData = 0x00,
    PushAck = 0x01,
    PullData = 0x02,
    PullResp = 0x03,
    PullAck = 0x04,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(MessageType::PushData),
            0x01 => Ok(MessageType::PushAck),
            0x02 => Ok(MessageType::PullData),
            0x03 => Ok(MessageType::PullResp),
            0x04 => Ok(MessageType::PullAck),
            _ => Err(value),
        }
    }
}

/// Parsed datagram.
#[derive(Debug)]
pub struct Datagram {
    pub version: u8,
    pub token: u16,
    pub msg_type: MessageType,
    pub identity: [u8; 8],
    pub body: Value,
    pub len: usize,
}

impl Datagram {
    /// Identity in `aa:bb:cc:ff:ff:dd:ee:ff` form.
    pub fn identity_string(&self) -> String {
        self.identity
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Body kind, if it is one the gateway sends.
    pub fn kind(&self) -> Option<&'static str> {
        if self.body.get("rxpk").is_some() {
            Some("rxpk")
        } else if self.body.get("stat").is_some() {
            Some("stat")
        } else {
            None
        }
    }
}

/// Parse a raw datagram: 12-byte header followed by a JSON body.
pub fn parse_datagram(data: &[u8]) -> Result<Datagram> {
    if data.len() < HEADER_LEN {
        bail!("Datagram too short: {} bytes", data.len());
    }

    let msg_type = MessageType::try_from(data[3])
        .map_err(|b| anyhow::anyhow!("Unknown message type: 0x{:02x}", b))?;

    let mut identity = [0u8; 8];
    identity.copy_from_slice(&data[4..HEADER_LEN]);

    let body = serde_json::from_slice(&data[HEADER_LEN..]).context("Body is not valid JSON")?;

    Ok(Datagram {
        version: data[0],
        token: u16::from_be_bytes([data[1], data[2]]),
        msg_type,
        identity,
        body,
        len: data.len(),
    })
}

/// Build the PUSH_ACK a collector returns for a PUSH_DATA.
/// Format: [version][token_h][token_l][0x01]
pub fn build_push_ack(token: u16) -> [u8; 4] {
    let [hi, lo] = token.to_be_bytes();
    [PROTOCOL_VERSION, hi, lo, MessageType::PushAck as u8]
}
