//! In-process keyspace backend.
//!
//! Cursor tokens encode the last key name returned, and a sweep resumes
//! strictly after it in sorted order. Keys present for the whole sweep are
//! always returned, whatever is inserted or removed around the cursor; keys
//! inserted behind the cursor are missed until the next sweep.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::keyspace::backend::{BackendError, Cursor, KeyspaceBackend, ScanPage};
use crate::keyspace::pattern::KeyPattern;
use crate::keyspace::record::{KeyMetadata, KeyName, KeyType};

/// One entry of a JSON keyspace fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureEntry {
    pub name: String,
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub ttl: Option<i64>,
}

#[derive(Debug, Clone)]
struct StoredKey {
    key_type: KeyType,
    size: Option<u64>,
    length: Option<u64>,
    ttl: i64,
}

impl StoredKey {
    fn plain(key_type: KeyType) -> Self {
        Self {
            key_type,
            size: None,
            length: None,
            ttl: -1,
        }
    }
}

/// Keyspace held in memory with optional latency and failure injection.
#[derive(Debug, Default)]
pub struct MemoryKeyspace {
    keys: RwLock<BTreeMap<KeyName, StoredKey>>,
    latency: Duration,
    /// Re-send the last key of the previous page at the head of each page.
    redeliver: bool,
    failing_scans: AtomicUsize,
    failing_metadata: AtomicUsize,
    scan_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl MemoryKeyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyspace of string keys with the given names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keyspace = Self::new();
        for name in names {
            keyspace.insert(name.as_ref(), KeyType::String);
        }
        keyspace
    }

    /// Load a JSON array of [`FixtureEntry`] values.
    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<FixtureEntry> = serde_json::from_str(&content)
            .map_err(|e| AppError::Fixture(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<FixtureEntry>) -> Self {
        let mut map = BTreeMap::new();
        for entry in entries {
            let key_type = entry
                .key_type
                .as_deref()
                .map(KeyType::from_type_name)
                .unwrap_or(KeyType::String);
            map.insert(
                KeyName::from(entry.name),
                StoredKey {
                    key_type,
                    size: entry.size,
                    length: entry.length,
                    ttl: entry.ttl.unwrap_or(-1),
                },
            );
        }
        Self {
            keys: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Deterministic namespaced keyspace of `count` keys for demos.
    pub fn demo(count: usize) -> Self {
        let mut map = BTreeMap::new();
        for i in 0..count {
            let (name, key_type, length) = match i % 6 {
                0 => (format!("user:{}:profile", i), KeyType::Hash, Some(8)),
                1 => (format!("user:{}:sessions", i), KeyType::Set, Some((i % 5) as u64 + 1)),
                2 => (format!("cache:page:{}", i), KeyType::String, None),
                3 => (format!("queue:{}:job:{}", i % 16, i), KeyType::List, Some((i % 40) as u64)),
                4 => (format!("events:{}:stream:{}", i % 7, i), KeyType::Stream, Some(100)),
                _ => (format!("counter{}", i), KeyType::String, None),
            };
            let ttl = if i % 6 == 2 { 300 + (i % 3_600) as i64 } else { -1 };
            map.insert(
                KeyName::from(name),
                StoredKey {
                    key_type,
                    size: Some(64 + (i as u64 * 37) % 4_096),
                    length,
                    ttl,
                },
            );
        }
        Self {
            keys: RwLock::new(map),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn insert(&self, name: &str, key_type: KeyType) {
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(KeyName::from(name), StoredKey::plain(key_type));
        }
    }

    pub fn len(&self) -> usize {
        self.keys.read().map(|keys| keys.len()).unwrap_or(0)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn consume_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Test controls: duplicate re-delivery, mid-sweep removal, failure
/// injection and call counters.
#[cfg(test)]
impl MemoryKeyspace {
    pub fn with_redelivery(mut self, redeliver: bool) -> Self {
        self.redeliver = redeliver;
        self
    }

    pub fn remove(&self, name: &str) -> bool {
        self.keys
            .write()
            .map(|mut keys| keys.remove(&KeyName::from(name)).is_some())
            .unwrap_or(false)
    }

    /// Make the next `n` scan calls fail.
    pub fn fail_next_scans(&self, n: usize) {
        self.failing_scans.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` metadata calls fail.
    pub fn fail_next_metadata(&self, n: usize) {
        self.failing_metadata.store(n, Ordering::SeqCst);
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

fn poisoned() -> BackendError {
    BackendError::Unavailable("keyspace lock poisoned".into())
}

const CURSOR_PREFIX: &str = "k:";

fn encode_cursor(last: &KeyName) -> Cursor {
    let hex: String = last.as_bytes().iter().map(|b| format!("{:02x}", b)).collect();
    Cursor::new(format!("{}{}", CURSOR_PREFIX, hex))
}

/// Last key name of the previous page, `None` at the start of a sweep.
fn decode_cursor(cursor: &Cursor) -> std::result::Result<Option<KeyName>, BackendError> {
    if cursor.is_start() {
        return Ok(None);
    }
    let invalid = || BackendError::Protocol(format!("invalid cursor {:?}", cursor.as_str()));
    let hex = cursor.as_str().strip_prefix(CURSOR_PREFIX).ok_or_else(invalid)?;
    if hex.len() % 2 != 0 {
        return Err(invalid());
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(invalid)
        })
        .collect::<std::result::Result<Vec<u8>, _>>()?;
    Ok(Some(KeyName::new(bytes)))
}

#[async_trait]
impl KeyspaceBackend for MemoryKeyspace {
    async fn scan(
        &self,
        cursor: &Cursor,
        pattern: Option<&KeyPattern>,
        count: usize,
    ) -> std::result::Result<ScanPage, BackendError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if Self::consume_failure(&self.failing_scans) {
            return Err(BackendError::Injected("scan".into()));
        }

        let resume = decode_cursor(cursor)?;
        let keys = self.keys.read().map_err(|_| poisoned())?;

        let step = count.max(1);
        // One extra entry tells whether anything follows this page.
        let mut page: Vec<&KeyName> = match &resume {
            None => keys.keys().take(step + 1).collect(),
            Some(last) => keys
                .range::<KeyName, _>((Excluded(last), Unbounded))
                .map(|(name, _)| name)
                .take(step + 1)
                .collect(),
        };
        let more = page.len() > step;
        page.truncate(step);

        let next = match page.last() {
            Some(last) if more => encode_cursor(last),
            _ => Cursor::start(),
        };
        let redelivered = resume
            .as_ref()
            .filter(|last| self.redeliver && keys.contains_key(*last));
        let visited: Vec<KeyName> = redelivered
            .into_iter()
            .chain(page)
            .filter(|name| pattern.map_or(true, |p| p.matches(name)))
            .cloned()
            .collect();

        Ok(ScanPage {
            cursor: next,
            keys: visited,
        })
    }

    async fn fetch_metadata(
        &self,
        names: &[KeyName],
    ) -> std::result::Result<Vec<KeyMetadata>, BackendError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if Self::consume_failure(&self.failing_metadata) {
            return Err(BackendError::Injected("metadata".into()));
        }

        let keys = self.keys.read().map_err(|_| poisoned())?;
        // Reverse order: callers must not rely on reply order.
        Ok(names
            .iter()
            .rev()
            .map(|name| match keys.get(name) {
                Some(stored) => KeyMetadata {
                    name: name.clone(),
                    key_type: stored.key_type.clone(),
                    size: stored.size,
                    length: stored.length,
                    ttl: Some(stored.ttl),
                },
                None => KeyMetadata {
                    name: name.clone(),
                    key_type: KeyType::None,
                    size: None,
                    length: None,
                    ttl: Some(-2),
                },
            })
            .collect())
    }

    async fn key_count(&self) -> std::result::Result<Option<u64>, BackendError> {
        self.simulate_latency().await;
        let keys = self.keys.read().map_err(|_| poisoned())?;
        Ok(Some(keys.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    async fn sweep(keyspace: &MemoryKeyspace, count: usize) -> Vec<KeyName> {
        let mut cursor = Cursor::start();
        let mut seen = Vec::new();
        loop {
            let page = keyspace.scan(&cursor, None, count).await.unwrap();
            seen.extend(page.keys);
            if page.cursor.is_start() {
                break;
            }
            cursor = page.cursor;
        }
        seen
    }

    #[tokio::test]
    async fn full_sweep_visits_every_key() {
        let keyspace = MemoryKeyspace::from_names(["a", "b", "c", "d", "e"]);
        let seen = sweep(&keyspace, 2).await;
        assert_eq!(seen.len(), 5);
        assert_eq!(keyspace.scan_calls(), 3);
    }

    #[tokio::test]
    async fn redelivery_repeats_page_boundaries() {
        let keyspace = MemoryKeyspace::from_names(["a", "b", "c", "d", "e"]).with_redelivery(true);
        let seen = sweep(&keyspace, 2).await;
        let unique: HashSet<_> = seen.iter().cloned().collect();
        assert_eq!(unique.len(), 5);
        assert!(seen.len() > 5);
    }

    #[tokio::test]
    async fn removal_behind_cursor_does_not_skip_stable_keys() {
        let keyspace = MemoryKeyspace::from_names(["a", "b", "c", "d"]);
        let first = keyspace.scan(&Cursor::start(), None, 2).await.unwrap();
        assert_eq!(first.keys, vec![KeyName::from("a"), KeyName::from("b")]);

        assert!(keyspace.remove("a"));
        let mut seen = first.keys;
        let mut cursor = first.cursor;
        while !cursor.is_start() {
            let page = keyspace.scan(&cursor, None, 2).await.unwrap();
            seen.extend(page.keys);
            cursor = page.cursor;
        }
        let names: Vec<String> = seen.iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn cursor_survives_removal_of_its_own_key() {
        let keyspace = MemoryKeyspace::from_names(["a", "b", "c"]);
        let first = keyspace.scan(&Cursor::start(), None, 1).await.unwrap();
        assert!(keyspace.remove("a"));
        let next = keyspace.scan(&first.cursor, None, 5).await.unwrap();
        assert_eq!(next.keys, vec![KeyName::from("b"), KeyName::from("c")]);
        assert!(next.cursor.is_start());
    }

    #[test]
    fn cursor_tokens_round_trip_binary_names() {
        let name = KeyName::new(vec![0u8, 0xff, b':']);
        let cursor = encode_cursor(&name);
        assert!(!cursor.is_start());
        assert_eq!(decode_cursor(&cursor).unwrap(), Some(name));
        assert!(decode_cursor(&Cursor::new("k:abc")).is_err());
    }

    #[tokio::test]
    async fn pattern_filters_visited_entries() {
        let keyspace = MemoryKeyspace::from_names(["user:1", "user:2", "post:1"]);
        let pattern = KeyPattern::new("user:*").unwrap();
        let page = keyspace
            .scan(&Cursor::start(), Some(&pattern), 10)
            .await
            .unwrap();
        assert!(page.cursor.is_start());
        assert_eq!(page.keys.len(), 2);
    }

    #[tokio::test]
    async fn invalid_cursor_is_protocol_error() {
        let keyspace = MemoryKeyspace::from_names(["a"]);
        let err = keyspace
            .scan(&Cursor::new("garbage"), None, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Protocol(_)));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let keyspace = MemoryKeyspace::from_names(["a"]);
        keyspace.fail_next_scans(1);
        assert!(keyspace.scan(&Cursor::start(), None, 10).await.is_err());
        assert!(keyspace.scan(&Cursor::start(), None, 10).await.is_ok());
    }

    #[tokio::test]
    async fn metadata_for_missing_key_reports_none_type() {
        let keyspace = MemoryKeyspace::from_names(["a"]);
        let replies = keyspace
            .fetch_metadata(&[KeyName::from("a"), KeyName::from("gone")])
            .await
            .unwrap();
        let gone = replies.iter().find(|m| m.name == KeyName::from("gone")).unwrap();
        assert_eq!(gone.key_type, KeyType::None);
        assert_eq!(gone.ttl, Some(-2));
    }

    #[test]
    fn fixture_file_loads_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keys.json");
        let mut f = std::fs::File::create(&path).expect("create");
        write!(
            f,
            r#"[{{"name": "user:1", "type": "hash", "size": 90, "length": 3}},
                {{"name": "plain", "ttl": 60}}]"#
        )
        .expect("write");

        let keyspace = MemoryKeyspace::from_fixture_file(&path).expect("load");
        assert_eq!(keyspace.len(), 2);
    }

    #[test]
    fn fixture_file_rejects_bad_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").expect("write");
        let err = MemoryKeyspace::from_fixture_file(&path).unwrap_err();
        assert!(matches!(err, AppError::Fixture(_)));
    }

    #[test]
    fn demo_keyspace_is_deterministic() {
        assert_eq!(MemoryKeyspace::demo(600).len(), 600);
        assert_eq!(MemoryKeyspace::demo(600).len(), MemoryKeyspace::demo(600).len());
    }
}
