use crate::blob::BlobValue;

/// Free-form manifest extension value.
///
/// Numbers are kept as the fixed-width blob of their bytes so they never pass
/// through a lossy numeric parse; readers pick the interpretation.
#[derive(Clone, Debug)]
pub enum CustomField {
    Text(String),
    Blob(Vec<u8>),
}

impl CustomField {
    pub fn from_i64(v: i64) -> Self {
        CustomField::Blob(v.to_le_bytes().to_vec())
    }

    pub fn from_f64(v: f64) -> Self {
        CustomField::Blob(v.to_le_bytes().to_vec())
    }

    /// The value as it appears on the wire.
    pub fn as_string(&self) -> String {
        match self {
            CustomField::Text(s) => s.clone(),
            CustomField::Blob(b) => crate::blob::to_blob(b),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CustomField::Text(s) => i64::from_blob(s).ok(),
            CustomField::Blob(b) => Some(i64::from_le_bytes(widen(b)?)),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CustomField::Text(s) => f64::from_blob(s).ok(),
            CustomField::Blob(b) => Some(f64::from_le_bytes(widen(b)?)),
        }
    }
}

fn widen(b: &[u8]) -> Option<[u8; 8]> {
    if b.len() > 8 {
        return None;
    }
    let mut out = [0u8; 8];
    out[..b.len()].copy_from_slice(b);
    Some(out)
}

impl PartialEq for CustomField {
    fn eq(&self, other: &Self) -> bool {
        self.as_string() == other.as_string()
    }
}

impl Eq for CustomField {}

impl From<&str> for CustomField {
    fn from(s: &str) -> Self {
        CustomField::Text(s.to_string())
    }
}

impl From<String> for CustomField {
    fn from(s: String) -> Self {
        CustomField::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_and_text_views_agree() {
        let f = CustomField::from_i64(-42);
        let wire = CustomField::Text(f.as_string());
        assert_eq!(wire.as_i64(), Some(-42));
        assert_eq!(f, wire);
    }

    #[test]
    fn large_integer_is_exact() {
        let v = (1i64 << 62) + 1;
        let wire = CustomField::Text(CustomField::from_i64(v).as_string());
        assert_eq!(wire.as_i64(), Some(v));
    }

    #[test]
    fn double_is_exact() {
        let wire = CustomField::Text(CustomField::from_f64(1.0 / 3.0).as_string());
        assert_eq!(wire.as_f64(), Some(1.0 / 3.0));
    }

    #[test]
    fn plain_text_is_not_a_number() {
        let f = CustomField::from("hello");
        assert_eq!(f.as_string(), "hello");
        assert_eq!(f.as_i64(), None);
    }
}
