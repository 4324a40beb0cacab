use super::CodecError;

const MAX_JUMPS: usize = 16;
const MAX_NAME_LEN: usize = 255;

/// Encodes a dotted domain name as length-prefixed labels terminated by a
/// zero byte. Never emits compression pointers; only upstream/peer
/// responses are expected to use them, and not compressing on write is
/// valid DNS.
pub fn encode_name(name: &str, out: &mut Vec<u8>) {
    if name.is_empty() {
        out.push(0);
        return;
    }
    for label in name.split('.') {
        let bytes = label.as_bytes();
        let len = bytes.len().min(63);
        out.push(len as u8);
        out.extend_from_slice(&bytes[..len]);
    }
    out.push(0);
}

/// Decodes a name starting at `*offset`, following compression pointers
/// as needed. `*offset` is advanced past the name as it appears in the
/// original stream (i.e. past a pointer, not past the jump target).
pub fn decode_name(buf: &[u8], offset: &mut usize) -> Result<String, CodecError> {
    let mut labels: Vec<String> = Vec::new();
    let mut cursor = *offset;
    let mut end_of_name: Option<usize> = None;
    let mut jumps = 0;

    loop {
        let len = *buf.get(cursor).ok_or(CodecError::UnexpectedEof)?;
        if len == 0 {
            cursor += 1;
            if end_of_name.is_none() {
                end_of_name = Some(cursor);
            }
            break;
        }
        if len & 0xC0 == 0xC0 {
            jumps += 1;
            if jumps > MAX_JUMPS {
                return Err(CodecError::BadPointer);
            }
            let next = *buf.get(cursor + 1).ok_or(CodecError::UnexpectedEof)?;
            let pointer = (((len & 0x3F) as usize) << 8) | next as usize;
            if pointer >= buf.len() {
                return Err(CodecError::BadPointer);
            }
            if end_of_name.is_none() {
                end_of_name = Some(cursor + 2);
            }
            cursor = pointer;
            continue;
        }
        let len = len as usize;
        let start = cursor + 1;
        let end = start + len;
        let label = buf.get(start..end).ok_or(CodecError::UnexpectedEof)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        cursor = end;
        if labels.iter().map(|l| l.len() + 1).sum::<usize>() > MAX_NAME_LEN {
            return Err(CodecError::NameTooLong);
        }
    }

    *offset = end_of_name.unwrap_or(cursor);
    Ok(labels.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_name() {
        let mut buf = Vec::new();
        encode_name("www.example.com", &mut buf);
        let mut offset = 0;
        let name = decode_name(&buf, &mut offset).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn follows_compression_pointer() {
        let mut buf = Vec::new();
        encode_name("example.com", &mut buf);
        let pointer_target = 0u16;
        let pointer_at = buf.len();
        buf.push(0xC0 | ((pointer_target >> 8) as u8));
        buf.push((pointer_target & 0xFF) as u8);

        let mut offset = pointer_at;
        let name = decode_name(&buf, &mut offset).unwrap();
        assert_eq!(name, "example.com");
        assert_eq!(offset, pointer_at + 2);
    }
}
