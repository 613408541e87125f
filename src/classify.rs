//! Text/binary classification of untyped payloads
//!
//! Values are byte blobs; the preview needs to know whether printing them
//! as text would garble the terminal.

/// Share of non-printable bytes, in percent, at which a payload is binary
const BINARY_THRESHOLD_PERCENT: usize = 30;

/// Heuristic check whether a payload is displayable text
///
/// Empty payloads are text. Any zero byte makes a payload binary. Otherwise
/// a payload is binary when bytes outside printable ASCII (plus `\n`, `\r`,
/// `\t` and backspace) make up 30% or more of it.
pub fn is_text(data: &[u8]) -> bool {
    if data.is_empty() {
        return true;
    }

    let mut odd = 0usize;
    for &b in data {
        if b == 0 {
            return false;
        }
        if !is_printable(b) {
            odd += 1;
        }
    }
    odd * 100 < data.len() * BINARY_THRESHOLD_PERCENT
}

fn is_printable(b: u8) -> bool {
    matches!(b, 32..=126 | b'\n' | b'\r' | b'\t' | 0x08)
}

/// Render bytes as `\xHH` escapes, uppercase hex, four characters per byte
pub fn encode_to_hex(data: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(data.len() * 4);
    for &b in data {
        out.push('\\');
        out.push('x');
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
