use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Binary-safe key name. Identity of a [`KeyRecord`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyName(Arc<[u8]>);

impl KeyName {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy UTF-8 view used for display, pattern matching and tree segments.
    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<&str> for KeyName {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl From<String> for KeyName {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for KeyName {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_str_lossy())
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

/// Value type of a key as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyType {
    String,
    List,
    Set,
    ZSet,
    Hash,
    Stream,
    Json,
    /// The key vanished between scan and metadata fetch.
    None,
    Other(String),
}

impl KeyType {
    /// Parse a backend type name (`"hash"`, `"zset"`, `"ReJSON-RL"`, ...).
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => KeyType::String,
            "list" => KeyType::List,
            "set" => KeyType::Set,
            "zset" => KeyType::ZSet,
            "hash" => KeyType::Hash,
            "stream" => KeyType::Stream,
            "rejson-rl" | "json" => KeyType::Json,
            "none" => KeyType::None,
            _ => KeyType::Other(name.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
            KeyType::Hash => "hash",
            KeyType::Stream => "stream",
            KeyType::Json => "json",
            KeyType::None => "none",
            KeyType::Other(name) => name,
        }
    }
}

/// A per-key attribute that is fetched lazily.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    NotLoaded,
    Loaded(T),
}

impl<T> Field<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Field::Loaded(_))
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Field::Loaded(value) => Some(value),
            Field::NotLoaded => None,
        }
    }
}

/// Attributes returned by the metadata RPC for a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetadata {
    pub name: KeyName,
    pub key_type: KeyType,
    /// Memory footprint in bytes, when the backend reports one.
    pub size: Option<u64>,
    /// Element count for collection types.
    pub length: Option<u64>,
    /// Seconds to live; `-1` means no expiry, `-2` means the key is gone.
    pub ttl: Option<i64>,
}

/// One scanned key plus whatever metadata has been hydrated so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub name: KeyName,
    pub key_type: Field<KeyType>,
    pub size: Field<u64>,
    pub length: Field<u64>,
    pub ttl: Field<i64>,
}

impl KeyRecord {
    pub fn new(name: KeyName) -> Self {
        Self {
            name,
            key_type: Field::NotLoaded,
            size: Field::NotLoaded,
            length: Field::NotLoaded,
            ttl: Field::NotLoaded,
        }
    }

    /// True while no metadata field has been loaded yet.
    pub fn needs_metadata(&self) -> bool {
        !self.key_type.is_loaded()
            && !self.size.is_loaded()
            && !self.length.is_loaded()
            && !self.ttl.is_loaded()
    }

    /// Fill fields from a metadata response. The type is always loaded;
    /// the remaining fields only when the backend reported them.
    pub fn apply_metadata(&mut self, meta: &KeyMetadata) {
        self.key_type = Field::Loaded(meta.key_type.clone());
        if let Some(size) = meta.size {
            self.size = Field::Loaded(size);
        }
        if let Some(length) = meta.length {
            self.length = Field::Loaded(length);
        }
        if let Some(ttl) = meta.ttl {
            self.ttl = Field::Loaded(ttl);
        }
    }
}

/// Human-readable TTL: `no limit`, `expired`, `45s`, `3m 20s`, `2h 5m`, `3d 4h`.
pub fn format_ttl(ttl: i64) -> String {
    match ttl {
        -1 => "no limit".to_string(),
        t if t < 0 => "expired".to_string(),
        t if t < 60 => format!("{}s", t),
        t if t < 3_600 => format!("{}m {}s", t / 60, t % 60),
        t if t < 86_400 => format!("{}h {}m", t / 3_600, (t % 3_600) / 60),
        t => format!("{}d {}h", t / 86_400, (t % 86_400) / 3_600),
    }
}

/// Human-readable byte size (`512 B`, `1.2 KB`, `3.4 MB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> KeyMetadata {
        KeyMetadata {
            name: KeyName::from(name),
            key_type: KeyType::Hash,
            size: Some(128),
            length: None,
            ttl: Some(-1),
        }
    }

    #[test]
    fn new_record_needs_metadata() {
        let record = KeyRecord::new(KeyName::from("user:1"));
        assert!(record.needs_metadata());
        assert_eq!(record.size, Field::NotLoaded);
    }

    #[test]
    fn apply_metadata_keeps_unreported_fields_not_loaded() {
        let mut record = KeyRecord::new(KeyName::from("user:1"));
        record.apply_metadata(&meta("user:1"));
        assert!(!record.needs_metadata());
        assert_eq!(record.key_type, Field::Loaded(KeyType::Hash));
        assert_eq!(record.size, Field::Loaded(128));
        assert_eq!(record.length, Field::NotLoaded);
        assert_eq!(record.ttl, Field::Loaded(-1));
    }

    #[test]
    fn binary_names_display_lossy() {
        let name = KeyName::new(vec![b'k', 0xff, b'1']);
        assert_eq!(name.as_bytes(), &[b'k', 0xff, b'1']);
        assert_eq!(name.to_string(), "k\u{fffd}1");
    }

    #[test]
    fn key_type_parsing() {
        assert_eq!(KeyType::from_type_name("zset"), KeyType::ZSet);
        assert_eq!(KeyType::from_type_name("ReJSON-RL"), KeyType::Json);
        assert_eq!(
            KeyType::from_type_name("TSDB-TYPE"),
            KeyType::Other("TSDB-TYPE".into())
        );
        assert_eq!(KeyType::Other("TSDB-TYPE".into()).label(), "TSDB-TYPE");
    }

    #[test]
    fn ttl_formatting() {
        assert_eq!(format_ttl(-1), "no limit");
        assert_eq!(format_ttl(-2), "expired");
        assert_eq!(format_ttl(45), "45s");
        assert_eq!(format_ttl(200), "3m 20s");
        assert_eq!(format_ttl(7_500), "2h 5m");
        assert_eq!(format_ttl(273_600), "3d 4h");
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1_229), "1.2 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
