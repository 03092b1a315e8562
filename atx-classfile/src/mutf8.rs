use crate::error::Error;

/// Decode a Modified UTF-8 (MUTF-8) byte sequence into a Rust String.
///
/// MUTF-8 differences from standard UTF-8:
/// - Null character (U+0000) is encoded as 0xC0 0x80 (not 0x00)
/// - Supplementary characters (U+10000+) use surrogate pairs encoded as two 3-byte sequences
///
/// A surrogate outside a high/low pair has no `char` and is rejected.
///
/// `base` is the file offset of `data[0]` and is only used for error reporting.
pub fn decode_mutf8(data: &[u8], base: usize) -> Result<String, Error> {
    let mut result = String::with_capacity(data.len());
    let mut pos = 0;

    while pos < data.len() {
        let b = data[pos];

        if b == 0 {
            // A raw zero byte never appears in class-file strings.
            return Err(Error::InvalidMutf8(base + pos));
        }

        if b & 0x80 == 0 {
            // Single byte: 0xxxxxxx
            result.push(b as char);
            pos += 1;
        } else if b & 0xe0 == 0xc0 {
            // Two bytes: 110xxxxx 10xxxxxx
            if pos + 1 >= data.len() {
                return Err(Error::InvalidMutf8(base + pos));
            }
            let b2 = data[pos + 1];
            if b2 & 0xc0 != 0x80 {
                return Err(Error::InvalidMutf8(base + pos));
            }
            let cp = ((b as u32 & 0x1f) << 6) | (b2 as u32 & 0x3f);
            if let Some(c) = char::from_u32(cp) {
                result.push(c);
            }
            pos += 2;
        } else if b & 0xf0 == 0xe0 {
            // Three bytes: 1110xxxx 10xxxxxx 10xxxxxx
            if pos + 2 >= data.len() {
                return Err(Error::InvalidMutf8(base + pos));
            }
            let b2 = data[pos + 1];
            let b3 = data[pos + 2];
            if (b2 & 0xc0 != 0x80) || (b3 & 0xc0 != 0x80) {
                return Err(Error::InvalidMutf8(base + pos));
            }
            let cp = ((b as u32 & 0x0f) << 12) | ((b2 as u32 & 0x3f) << 6) | (b3 as u32 & 0x3f);

            if (0xD800..=0xDBFF).contains(&cp) {
                // High surrogate - look for low surrogate
                if pos + 5 < data.len() && data[pos + 3] & 0xf0 == 0xe0 {
                    let b4 = data[pos + 3];
                    let b5 = data[pos + 4];
                    let b6 = data[pos + 5];
                    let cp2 =
                        ((b4 as u32 & 0x0f) << 12) | ((b5 as u32 & 0x3f) << 6) | (b6 as u32 & 0x3f);
                    if (0xDC00..=0xDFFF).contains(&cp2) {
                        let supplementary = 0x10000 + ((cp - 0xD800) << 10) + (cp2 - 0xDC00);
                        if let Some(c) = char::from_u32(supplementary) {
                            result.push(c);
                        }
                        pos += 6;
                        continue;
                    }
                }
                return Err(Error::InvalidMutf8(base + pos));
            }
            match char::from_u32(cp) {
                Some(c) => result.push(c),
                // Lone low surrogate
                None => return Err(Error::InvalidMutf8(base + pos)),
            }
            pos += 3;
        } else {
            return Err(Error::InvalidMutf8(base + pos));
        }
    }

    Ok(result)
}

/// Encode a string as Modified UTF-8, the inverse of [`decode_mutf8`].
pub fn encode_mutf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        let cp = c as u32;
        match cp {
            0x01..=0x7f => out.push(cp as u8),
            0x00 | 0x80..=0x7ff => {
                out.push(0xc0 | (cp >> 6) as u8);
                out.push(0x80 | (cp & 0x3f) as u8);
            }
            0x800..=0xffff => push_three(&mut out, cp),
            _ => {
                let v = cp - 0x10000;
                push_three(&mut out, 0xD800 + (v >> 10));
                push_three(&mut out, 0xDC00 + (v & 0x3ff));
            }
        }
    }
    out
}

fn push_three(out: &mut Vec<u8>, cp: u32) {
    out.push(0xe0 | (cp >> 12) as u8);
    out.push(0x80 | ((cp >> 6) & 0x3f) as u8);
    out.push(0x80 | (cp & 0x3f) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii() {
        assert_eq!(
            decode_mutf8(b"net/example/Foo", 0).unwrap(),
            "net/example/Foo"
        );
        assert_eq!(encode_mutf8("<init>"), b"<init>");
    }

    #[test]
    fn embedded_null_uses_two_bytes() {
        assert_eq!(encode_mutf8("a\0b"), [b'a', 0xc0, 0x80, b'b']);
        assert_eq!(decode_mutf8(&[b'a', 0xc0, 0x80, b'b'], 0).unwrap(), "a\0b");
    }

    #[test]
    fn raw_zero_rejected() {
        let err = decode_mutf8(&[b'a', 0x00], 0x10).unwrap_err();
        assert!(matches!(err, Error::InvalidMutf8(0x11)));
    }

    #[test]
    fn supplementary_as_surrogate_pair() {
        let s = "lambda$\u{1F600}";
        let encoded = encode_mutf8(s);
        // 7 ASCII bytes + two 3-byte surrogates
        assert_eq!(encoded.len(), 13);
        assert_eq!(decode_mutf8(&encoded, 0).unwrap(), s);
    }

    #[test]
    fn lone_surrogates_rejected() {
        let high = decode_mutf8(&[b'x', 0xed, 0xa0, 0x80], 0x20).unwrap_err();
        assert!(matches!(high, Error::InvalidMutf8(0x21)));
        let low = decode_mutf8(&[0xed, 0xb0, 0x80], 0).unwrap_err();
        assert!(matches!(low, Error::InvalidMutf8(0)));
        // high surrogate followed by something other than a low surrogate
        assert!(decode_mutf8(&[0xed, 0xa0, 0x80, 0xed, 0xa0, 0x81], 0).is_err());
        assert!(decode_mutf8(&[0xed, 0xa0, 0x81], 0).is_err());
        assert_eq!(
            decode_mutf8(&[0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80], 0).unwrap(),
            "\u{1F600}"
        );
    }

    #[test]
    fn truncated_sequence() {
        assert!(decode_mutf8(&[0xe2, 0x82], 0).is_err());
        assert!(decode_mutf8(&[0xc3], 0).is_err());
    }
}
