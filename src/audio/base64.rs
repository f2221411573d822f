//! RFC 4648 base64 with the standard alphabet and `=` padding.
//!
//! Rendered audio is handed to the persistence layer as text, mirroring
//! storage APIs that only accept strings.

use crate::audio::error::EngineError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PAD: u8 = b'=';
const INVALID: u8 = 0xff;

const DECODE_TABLE: [u8; 256] = build_decode_table();

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < 64 {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Encodes `bytes` in 3-byte groups, padding the final group.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for group in bytes.chunks(3) {
        let b0 = group[0] as u32;
        let b1 = group.get(1).copied().unwrap_or(0) as u32;
        let b2 = group.get(2).copied().unwrap_or(0) as u32;
        let triplet = (b0 << 16) | (b1 << 8) | b2;

        out.push(ALPHABET[(triplet >> 18) as usize & 0x3f] as char);
        out.push(ALPHABET[(triplet >> 12) as usize & 0x3f] as char);
        if group.len() > 1 {
            out.push(ALPHABET[(triplet >> 6) as usize & 0x3f] as char);
        } else {
            out.push(PAD as char);
        }
        if group.len() > 2 {
            out.push(ALPHABET[triplet as usize & 0x3f] as char);
        } else {
            out.push(PAD as char);
        }
    }
    out
}

/// Decodes padded base64 text. Whitespace and non-zero padding bits are rejected.
pub fn decode(text: &str) -> Result<Vec<u8>, EngineError> {
    let input = text.as_bytes();
    if input.len() % 4 != 0 {
        return Err(malformed(format!("length {} is not a multiple of 4", input.len())));
    }

    let mut out = Vec::with_capacity(input.len() / 4 * 3);
    let quads = input.len() / 4;
    for (index, quad) in input.chunks(4).enumerate() {
        let is_last = index + 1 == quads;
        let padding = quad.iter().rev().take_while(|&&c| c == PAD).count();
        if padding > 2 || (padding > 0 && !is_last) {
            return Err(malformed(format!("unexpected padding in group {}", index)));
        }

        let mut triplet = 0u32;
        for (pos, &c) in quad[..4 - padding].iter().enumerate() {
            let value = DECODE_TABLE[c as usize];
            if value == INVALID {
                return Err(malformed(format!("invalid character {:?} at offset {}", c as char, index * 4 + pos)));
            }
            triplet |= (value as u32) << (18 - 6 * pos);
        }
        // Bits below the last decoded byte must be zero in a canonical encoding.
        let unused_bits = 8 * padding as u32;
        if unused_bits > 0 && triplet & ((1 << unused_bits) - 1) != 0 {
            return Err(malformed(format!("non-zero trailing bits in group {}", index)));
        }

        out.push((triplet >> 16) as u8);
        if padding < 2 {
            out.push((triplet >> 8) as u8);
        }
        if padding < 1 {
            out.push(triplet as u8);
        }
    }
    Ok(out)
}

fn malformed(reason: String) -> EngineError {
    EngineError::InvalidState(format!("Malformed base64: {}", reason))
}
