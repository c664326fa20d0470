//! Minimal Solidity ABI codec for the view calls the dashboard makes.
//!
//! Only static `address`/`uint256` arguments are encoded; return values may be
//! `uint8`, `uint256`, `address` or a dynamic `string`.

use crate::error::{DashboardError, Result};
use alloy_primitives::{keccak256, Address, U256};

const WORD: usize = 32;

/// Argument of a view call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiArg {
    Address(Address),
    Uint(U256),
}

/// Declared return type of a view call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Uint8,
    Uint256,
    Address,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    Address(Address),
    String(String),
}

impl AbiValue {
    pub fn into_uint(self) -> Result<U256> {
        match self {
            AbiValue::Uint(v) => Ok(v),
            other => Err(DashboardError::Decode(format!("expected integer, got {:?}", other))),
        }
    }

    pub fn into_address(self) -> Result<Address> {
        match self {
            AbiValue::Address(a) => Ok(a),
            other => Err(DashboardError::Decode(format!("expected address, got {:?}", other))),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            AbiValue::String(s) => Ok(s),
            other => Err(DashboardError::Decode(format!("expected string, got {:?}", other))),
        }
    }
}

/// First four bytes of keccak256 of the canonical signature, e.g. `balanceOf(address)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

pub fn encode_call(signature: &str, args: &[AbiArg]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        match arg {
            AbiArg::Address(addr) => {
                data.extend_from_slice(&[0u8; 12]);
                data.extend_from_slice(addr.as_slice());
            }
            AbiArg::Uint(v) => data.extend_from_slice(&v.to_be_bytes::<WORD>()),
        }
    }
    data
}

pub fn decode(ty: AbiType, data: &[u8]) -> Result<AbiValue> {
    match ty {
        AbiType::Uint256 => Ok(AbiValue::Uint(word_at(data, 0)?)),
        AbiType::Uint8 => {
            let v = word_at(data, 0)?;
            if v > U256::from(u8::MAX) {
                return Err(DashboardError::Decode(format!("uint8 out of range: {}", v)));
            }
            Ok(AbiValue::Uint(v))
        }
        AbiType::Address => {
            let word = slice_word(data, 0)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(DashboardError::Decode("address word has dirty high bytes".into()));
            }
            Ok(AbiValue::Address(Address::from_slice(&word[12..])))
        }
        AbiType::String => decode_string(data).map(AbiValue::String),
    }
}

fn decode_string(data: &[u8]) -> Result<String> {
    let offset = as_usize(word_at(data, 0)?)?;
    let len = as_usize(word_at(data, offset)?)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| DashboardError::Decode("string offset overflow".into()))?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| DashboardError::Decode("string length overflow".into()))?;
    let bytes = data.get(start..end).ok_or_else(|| {
        DashboardError::Decode(format!("string of {} bytes exceeds {} byte payload", len, data.len()))
    })?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| DashboardError::Decode(format!("string is not UTF-8: {}", e)))
}

fn slice_word(data: &[u8], offset: usize) -> Result<&[u8]> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            DashboardError::Decode(format!(
                "need 32 bytes at offset {}, payload has {}",
                offset,
                data.len()
            ))
        })
}

fn word_at(data: &[u8], offset: usize) -> Result<U256> {
    slice_word(data, offset).map(U256::from_be_slice)
}

fn as_usize(v: U256) -> Result<usize> {
    usize::try_from(v).map_err(|_| DashboardError::Decode(format!("offset too large: {}", v)))
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decodes a `0x`-prefixed hex string; `0x` alone yields an empty vector.
pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    let compact = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(compact).map_err(|e| DashboardError::Decode(format!("invalid hex {:?}: {}", s, e)))
}

/// Parses a JSON-RPC quantity such as `0x1b4`.
pub fn parse_quantity(s: &str) -> Result<u64> {
    let compact = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(compact, 16)
        .map_err(|e| DashboardError::Decode(format!("invalid quantity {:?}: {}", s, e)))
}
