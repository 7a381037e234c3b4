//! Display formatting policies for bucket keys.
//!
//! A format only changes how a key is rendered; it never takes part in
//! ordering or merging. On the wire a format is identified by name.

use crate::error::DecodeError;
use crate::stream::{WireReader, WireWriter};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocValueFormat {
    /// UTF-8 text (lossy for invalid sequences), plain decimal for numbers
    #[default]
    Raw,
    /// Standard base64 of the raw bytes
    Binary,
    /// `F`/`T` bytes or zero/non-zero numbers as `false`/`true`
    Bool,
    /// 4- or 16-byte network addresses
    Ip,
}

impl DocValueFormat {
    pub const ALL: [DocValueFormat; 4] = [
        DocValueFormat::Raw,
        DocValueFormat::Binary,
        DocValueFormat::Bool,
        DocValueFormat::Ip,
    ];

    /// Stable wire identifier
    pub fn name(&self) -> &'static str {
        match self {
            DocValueFormat::Raw => "raw",
            DocValueFormat::Binary => "binary",
            DocValueFormat::Bool => "bool",
            DocValueFormat::Ip => "ip",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn is_default(&self) -> bool {
        *self == DocValueFormat::Raw
    }

    pub fn format_bytes(&self, bytes: &[u8]) -> String {
        match self {
            DocValueFormat::Raw => String::from_utf8_lossy(bytes).into_owned(),
            DocValueFormat::Binary => base64::engine::general_purpose::STANDARD.encode(bytes),
            DocValueFormat::Bool => match bytes {
                b"F" => "false".to_string(),
                b"T" => "true".to_string(),
                other => String::from_utf8_lossy(other).into_owned(),
            },
            DocValueFormat::Ip => match format_ip(bytes) {
                Some(addr) => addr.to_string(),
                None => String::from_utf8_lossy(bytes).into_owned(),
            },
        }
    }

    pub fn format_long(&self, value: i64) -> String {
        match self {
            DocValueFormat::Bool => (value != 0).to_string(),
            DocValueFormat::Raw | DocValueFormat::Binary | DocValueFormat::Ip => value.to_string(),
        }
    }

    pub fn write(&self, out: &mut WireWriter) {
        out.write_str(self.name());
    }

    pub fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let name = input.read_str("format")?;
        Self::from_name(name)
            .ok_or_else(|| DecodeError::new("format", format!("unknown format '{}'", name)))
    }
}

impl fmt::Display for DocValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn format_ip(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }
    let octets = <[u8; 16]>::try_from(bytes).ok()?;
    let v6 = Ipv6Addr::from(octets);
    Some(match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    })
}
