//! Server List Ping — the status query a game client sends before joining.
//!
//! Handshake (next state = status), then an empty status request. The server
//! answers with a length-prefixed JSON document carrying the player counts.

use std::time::Duration;

use async_trait::async_trait;
use craftbot_core::{ServerStatus, StatusSource, TransportError};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Protocol version sent in the handshake. Servers answer status
/// requests regardless of the version.
const PROTOCOL_VERSION: i32 = 767;

/// Upper bound on a status response, in bytes.
const MAX_PACKET_LEN: i32 = 1 << 20;

pub struct SlpStatusSource {
    timeout: Duration,
}

impl SlpStatusSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn query(&self, host: &str, port: u16) -> Result<ServerStatus, TransportError> {
        let mut stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| TransportError::from_io(&e))?;

        stream
            .write_all(&handshake_packet(host, port))
            .await
            .map_err(|e| TransportError::from_io(&e))?;
        // Status request: length 1, packet id 0
        stream
            .write_all(&[0x01, 0x00])
            .await
            .map_err(|e| TransportError::from_io(&e))?;

        let len = read_varint(&mut stream).await?;
        if !(1..=MAX_PACKET_LEN).contains(&len) {
            return Err(TransportError::Protocol(format!("bad packet length {len}")));
        }
        let mut body = vec![0u8; len as usize];
        stream
            .read_exact(&mut body)
            .await
            .map_err(|e| TransportError::from_io(&e))?;

        let mut cursor = body.as_slice();
        let packet_id = read_varint(&mut cursor).await?;
        if packet_id != 0 {
            return Err(TransportError::Protocol(format!(
                "unexpected packet id {packet_id}"
            )));
        }
        let json_len = read_varint(&mut cursor).await?;
        if json_len < 0 || json_len as usize > cursor.len() {
            return Err(TransportError::Protocol("truncated status payload".into()));
        }

        parse_status(&cursor[..json_len as usize])
    }
}

impl Default for SlpStatusSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl StatusSource for SlpStatusSource {
    async fn query_status(&self, host: &str, port: u16) -> Result<ServerStatus, TransportError> {
        match tokio::time::timeout(self.timeout, self.query(host, port)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Io(format!(
                "status query to {host}:{port} timed out"
            ))),
        }
    }
}

// --- Wire format ---

#[derive(Deserialize)]
struct StatusResponse {
    players: Option<StatusPlayers>,
    version: Option<StatusVersion>,
}

#[derive(Deserialize)]
struct StatusPlayers {
    online: u32,
    max: u32,
}

#[derive(Deserialize)]
struct StatusVersion {
    name: String,
}

fn parse_status(payload: &[u8]) -> Result<ServerStatus, TransportError> {
    let response: StatusResponse = serde_json::from_slice(payload)
        .map_err(|e| TransportError::Protocol(format!("invalid status json: {e}")))?;

    let players = response
        .players
        .ok_or_else(|| TransportError::Protocol("status has no players field".into()))?;

    Ok(ServerStatus {
        online_players: players.online,
        max_players: players.max,
        version: response.version.map(|v| v.name),
    })
}

fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(host.len() + 16);
    write_varint(&mut body, 0x00);
    write_varint(&mut body, PROTOCOL_VERSION);
    write_varint(&mut body, host.len() as i32);
    body.extend_from_slice(host.as_bytes());
    body.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut body, 1); // next state: status

    let mut packet = Vec::with_capacity(body.len() + 5);
    write_varint(&mut packet, body.len() as i32);
    packet.extend_from_slice(&body);
    packet
}

fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, TransportError> {
    let mut value: u32 = 0;
    for position in 0..5 {
        let byte = reader
            .read_u8()
            .await
            .map_err(|e| TransportError::from_io(&e))?;
        value |= ((byte & 0x7F) as u32) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(TransportError::Protocol("varint too long".into()))
}
