//! Fixed-width "decimal blob" text encoding.
//!
//! Numbers that must survive a JSON round-trip without passing through a
//! floating-point reader are written as the little-endian bytes of the value,
//! each byte as exactly three decimal digits. `258u16` becomes `"002001"`.

/// Encode raw bytes, three digits per byte.
pub fn to_blob(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        s.push(char::from(b'0' + b / 100));
        s.push(char::from(b'0' + (b / 10) % 10));
        s.push(char::from(b'0' + b % 10));
    }
    s
}

/// Decode into a buffer of width `N`. Shorter blobs are accepted and leave the
/// remaining high bytes zero.
pub fn from_blob<const N: usize>(text: &str) -> Result<[u8; N], String> {
    let raw = text.as_bytes();
    if raw.len() % 3 != 0 {
        return Err(format!("length {} is not a multiple of 3", raw.len()));
    }
    if raw.len() / 3 > N {
        return Err(format!("{} bytes do not fit in {N}", raw.len() / 3));
    }
    let mut out = [0u8; N];
    for (i, triple) in raw.chunks_exact(3).enumerate() {
        let mut v: u32 = 0;
        for &c in triple {
            if !c.is_ascii_digit() {
                return Err(format!("non-digit {:?} at byte {i}", c as char));
            }
            v = v * 10 + u32::from(c - b'0');
        }
        out[i] = u8::try_from(v).map_err(|_| format!("value {v} at byte {i} exceeds 255"))?;
    }
    Ok(out)
}

/// Types with a fixed-width little-endian blob form.
pub trait BlobValue: Sized {
    fn to_blob(&self) -> String;
    fn from_blob(text: &str) -> Result<Self, String>;
}

macro_rules! blob_value {
    ($($t:ty),*) => {$(
        impl BlobValue for $t {
            fn to_blob(&self) -> String {
                to_blob(&self.to_le_bytes())
            }
            fn from_blob(text: &str) -> Result<Self, String> {
                Ok(<$t>::from_le_bytes(from_blob(text)?))
            }
        }
    )*};
}

blob_value!(u8, u32, i32, u64, i64, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_digits_per_byte_little_endian() {
        assert_eq!(258u16.to_le_bytes().len(), 2);
        assert_eq!(to_blob(&258u16.to_le_bytes()), "002001");
        assert_eq!(7u32.to_blob(), "007000000000");
        assert_eq!(u32::from_blob("007000000000").unwrap(), 7);
    }

    #[test]
    fn short_blob_zero_extends() {
        assert_eq!(u64::from_blob("255").unwrap(), 255);
        assert_eq!(u64::from_blob("").unwrap(), 0);
    }

    #[test]
    fn rejects_malformed() {
        assert!(u32::from_blob("12").is_err());
        assert!(u32::from_blob("256000000000").is_err());
        assert!(u32::from_blob("0a1000000000").is_err());
        assert!(u8::from_blob("001002").is_err());
    }

    #[test]
    fn float_bits_survive() {
        let v = 0.1f64 + 0.2f64;
        assert_eq!(f64::from_blob(&v.to_blob()).unwrap().to_bits(), v.to_bits());
    }
}
