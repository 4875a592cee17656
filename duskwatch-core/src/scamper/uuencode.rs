//! Standard uuencode line decoding, used to reassemble the binary result
//! stream carried under a broker `D <N>` announcement. Each decoded line
//! yields at most 64 bytes.

const MAX_DECODED_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UudecodeError;

fn decode_char(c: u8) -> u8 {
    c.wrapping_sub(0x20) & 0x3F
}

/// Decodes one uuencoded line (length-prefix character followed by groups
/// of 4 encoded characters, no trailing newline) into at most 64 raw
/// bytes. A length-prefix of zero decodes to an empty output, which is
/// valid (the line carried no payload bytes, only framing).
pub fn uudecode_line(line: &[u8]) -> Result<Vec<u8>, UudecodeError> {
    if line.is_empty() {
        return Err(UudecodeError);
    }
    let declared_len = decode_char(line[0]) as usize;
    if declared_len > MAX_DECODED_LEN {
        return Err(UudecodeError);
    }
    let encoded = &line[1..];
    let mut out = Vec::with_capacity(declared_len);

    for group in encoded.chunks(4) {
        if out.len() >= declared_len {
            break;
        }
        if group.len() < 2 {
            break;
        }
        let c0 = decode_char(group[0]);
        let c1 = decode_char(group[1]);
        let c2 = if group.len() > 2 { decode_char(group[2]) } else { 0 };
        let c3 = if group.len() > 3 { decode_char(group[3]) } else { 0 };

        let b0 = (c0 << 2) | (c1 >> 4);
        let b1 = (c1 << 4) | (c2 >> 2);
        let b2 = (c2 << 6) | c3;

        for b in [b0, b1, b2] {
            if out.len() >= declared_len {
                break;
            }
            out.push(b);
        }
    }

    if out.len() != declared_len {
        return Err(UudecodeError);
    }
    Ok(out)
}

/// Encodes `bytes` (at most 64 of them) into one uuencode line, for tests
/// and fixture generation.
pub fn uuencode_line(bytes: &[u8]) -> Vec<u8> {
    assert!(bytes.len() <= MAX_DECODED_LEN);
    let mut out = Vec::new();
    out.push((bytes.len() as u8 & 0x3F) + 0x20);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);

        let c0 = b0 >> 2;
        let c1 = ((b0 & 0x03) << 4) | (b1 >> 4);
        let c2 = ((b1 & 0x0F) << 2) | (b2 >> 6);
        let c3 = b2 & 0x3F;

        for c in [c0, c1, c2, c3] {
            out.push((c & 0x3F) + 0x20);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let original = b"hello scamper";
        let line = uuencode_line(original);
        let decoded = uudecode_line(&line).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_payload_decodes_to_empty() {
        let line = uuencode_line(&[]);
        assert_eq!(uudecode_line(&line).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn decoded_length_never_exceeds_64() {
        let bytes = [0x41u8; 64];
        let line = uuencode_line(&bytes);
        let decoded = uudecode_line(&line).unwrap();
        assert_eq!(decoded.len(), 64);
    }

    #[test]
    fn shorter_input_yields_shorter_output() {
        let line = uuencode_line(b"hi");
        let decoded = uudecode_line(&line).unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn truncated_groups_are_rejected() {
        // Declares 10 bytes but only supplies one encoded group (3 bytes).
        let mut line = uuencode_line(b"abcdefghij");
        line.truncate(5);
        assert!(uudecode_line(&line).is_err());
    }
}
