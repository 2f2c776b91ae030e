//! Shared test doubles: an in-memory database and an instrumented archive

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use qizx_api::{Member, MemberKind, Properties, PropertyValue, QizxError};
use qizx_bulk::{Archiver, BulkError, RemoteStore, Result, StoreFactory};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// In-memory database
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: MemberKind,
    pub body: Vec<u8>,
    pub properties: Properties,
}

impl Record {
    fn collection() -> Self {
        Self {
            kind: MemberKind::Collection,
            body: Vec::new(),
            properties: Properties::new(),
        }
    }
}

type Library = BTreeMap<String, Record>;

#[derive(Default)]
pub struct MemoryStore {
    libraries: Mutex<BTreeMap<String, Library>>,
    /// Paths whose document bodies cannot be read or written
    failing: BTreeSet<String>,
    /// Paths whose document read panics
    panicking: BTreeSet<String>,
    delay: Option<Duration>,
}

fn not_found(what: &str) -> BulkError {
    BulkError::Remote(QizxError::NotFound(format!("NotFound: {}", what)))
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(index) => Some(path[..index].to_string()),
        None => None,
    }
}

fn nature(kind: MemberKind) -> &'static str {
    match kind {
        MemberKind::Collection => "collection",
        MemberKind::Document => "document",
        MemberKind::NonXmlDocument => "non-xml document",
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn panicking(mut self, path: &str) -> Self {
        self.panicking.insert(path.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_library(&self, name: &str) {
        let mut libraries = self.libraries.lock().unwrap();
        libraries
            .entry(name.to_string())
            .or_insert_with(|| BTreeMap::from([("/".to_string(), Record::collection())]));
    }

    pub fn add(&self, library: &str, path: &str, kind: MemberKind, body: &[u8], properties: &[(&str, PropertyValue)]) {
        self.add_library(library);
        let mut libraries = self.libraries.lock().unwrap();
        let lib = libraries.get_mut(library).unwrap();
        Self::ensure_parents(lib, path);
        lib.insert(
            path.to_string(),
            Record {
                kind,
                body: body.to_vec(),
                properties: properties
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect(),
            },
        );
    }

    pub fn snapshot(&self, library: &str) -> Library {
        self.libraries
            .lock()
            .unwrap()
            .get(library)
            .cloned()
            .unwrap_or_default()
    }

    pub fn library_names(&self) -> Vec<String> {
        self.libraries.lock().unwrap().keys().cloned().collect()
    }

    fn ensure_parents(lib: &mut Library, path: &str) {
        let mut parent = parent_of(path);
        while let Some(collection) = parent {
            parent = parent_of(&collection);
            lib.entry(collection).or_insert_with(Record::collection);
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, path: &str) -> Result<()> {
        if self.failing.contains(path) {
            return Err(BulkError::Remote(QizxError::Server(format!(
                "Server: cannot access {}",
                path
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_libraries(&self) -> Result<Vec<String>> {
        Ok(self.library_names())
    }

    async fn list_members(&self, library: &str, path: &str, depth: u32) -> Result<Vec<Member>> {
        let libraries = self.libraries.lock().unwrap();
        let lib = libraries
            .get(library)
            .ok_or_else(|| not_found(&format!("no such library: {}", library)))?;
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };

        Ok(lib
            .iter()
            .filter(|(member, _)| member.as_str() != path && member.starts_with(&prefix))
            .filter(|(member, _)| member[prefix.len()..].split('/').count() <= depth as usize)
            .map(|(member, record)| Member {
                path: member.clone(),
                kind: record.kind,
            })
            .collect())
    }

    async fn get_document(&self, library: &str, path: &str) -> Result<Vec<u8>> {
        if self.panicking.contains(path) {
            panic!("simulated crash reading {}", path);
        }
        self.pause().await;
        self.check(path)?;
        let libraries = self.libraries.lock().unwrap();
        libraries
            .get(library)
            .and_then(|lib| lib.get(path))
            .map(|record| record.body.clone())
            .ok_or_else(|| not_found(path))
    }

    async fn get_properties(&self, library: &str, path: &str) -> Result<Properties> {
        let libraries = self.libraries.lock().unwrap();
        let record = libraries
            .get(library)
            .and_then(|lib| lib.get(path))
            .ok_or_else(|| not_found(path))?;
        let mut properties = record.properties.clone();
        properties.insert("nature".into(), PropertyValue::String(nature(record.kind).into()));
        properties.insert("path".into(), PropertyValue::String(path.into()));
        Ok(properties)
    }

    async fn put_document(&self, library: &str, path: &str, body: Vec<u8>, kind: MemberKind) -> Result<()> {
        self.pause().await;
        self.check(path)?;
        let mut libraries = self.libraries.lock().unwrap();
        let lib = libraries
            .get_mut(library)
            .ok_or_else(|| not_found(library))?;
        Self::ensure_parents(lib, path);
        let record = lib.entry(path.to_string()).or_insert_with(|| Record {
            kind,
            body: Vec::new(),
            properties: Properties::new(),
        });
        record.kind = kind;
        record.body = body;
        Ok(())
    }

    async fn put_properties(&self, library: &str, path: &str, properties: &Properties) -> Result<()> {
        let mut libraries = self.libraries.lock().unwrap();
        let record = libraries
            .get_mut(library)
            .and_then(|lib| lib.get_mut(path))
            .ok_or_else(|| not_found(path))?;
        record
            .properties
            .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn create_library(&self, library: &str) -> Result<()> {
        self.add_library(library);
        Ok(())
    }

    async fn create_collection(&self, library: &str, path: &str) -> Result<()> {
        let mut libraries = self.libraries.lock().unwrap();
        let lib = libraries
            .get_mut(library)
            .ok_or_else(|| not_found(library))?;
        Self::ensure_parents(lib, path);
        lib.entry(path.to_string()).or_insert_with(Record::collection);
        Ok(())
    }
}

/// Hands out the same store to every connection; can refuse connections.
pub struct MemoryFactory {
    pub store: Arc<MemoryStore>,
    /// Connections allowed before every further one fails
    pub allowed: Option<usize>,
    pub connections: AtomicUsize,
}

impl MemoryFactory {
    pub fn new(store: MemoryStore) -> Arc<Self> {
        Self::with_store(Arc::new(store))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            allowed: None,
            connections: AtomicUsize::new(0),
        })
    }

    pub fn refusing_after(store: MemoryStore, allowed: usize) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(store),
            allowed: Some(allowed),
            connections: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StoreFactory for MemoryFactory {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>> {
        let attempt = self.connections.fetch_add(1, Ordering::SeqCst);
        if self.allowed.is_some_and(|allowed| attempt >= allowed) {
            return Err(BulkError::Connection("connection refused".into()));
        }
        Ok(self.store.clone() as Arc<dyn RemoteStore>)
    }
}

/// A small library exercising documents, non-XML documents, nesting and properties.
pub fn sample_store(library: &str) -> MemoryStore {
    let store = MemoryStore::new();
    populate(&store, library);
    store
}

pub fn populate(store: &MemoryStore, library: &str) {
    store.add(
        library,
        "/a.xml",
        MemberKind::Document,
        b"<a/>",
        &[("owner", PropertyValue::String("ann".into()))],
    );
    store.add(library, "/books/b1.xml", MemberKind::Document, b"<book n='1'/>", &[]);
    store.add(
        library,
        "/books/b2.xml",
        MemberKind::Document,
        b"<book n='2'/>",
        &[("rank", PropertyValue::Integer(2))],
    );
    store.add(library, "/books/old/b0.xml", MemberKind::Document, b"<book n='0'/>", &[]);
    store.add(library, "/img/logo.png", MemberKind::NonXmlDocument, &[0x89, b'P', b'N', b'G'], &[]);
    store.add(
        library,
        "/empty",
        MemberKind::Collection,
        b"",
        &[("purpose", PropertyValue::String("spare".into()))],
    );
}

/// A library with `count` flat documents.
pub fn wide_store(library: &str, count: usize) -> MemoryStore {
    let store = MemoryStore::new();
    for i in 0..count {
        store.add(
            library,
            &format!("/docs/d{:03}.xml", i),
            MemberKind::Document,
            format!("<d n='{}'/>", i).as_bytes(),
            &[],
        );
    }
    store
}

// ============================================================================
// Instrumented archive
// ============================================================================

/// In-memory archive counting closes and detecting overlapping writes.
pub struct RecordingArchiver {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    concurrent: bool,
    write_delay: Duration,
    guard: tokio::sync::Mutex<()>,
    pub closes: AtomicUsize,
    pub writes: AtomicUsize,
    pub overlaps: AtomicUsize,
}

impl RecordingArchiver {
    pub fn new(concurrent: bool) -> Arc<Self> {
        Self::with_delay(concurrent, Duration::ZERO)
    }

    pub fn with_delay(concurrent: bool, write_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(BTreeMap::new()),
            concurrent,
            write_delay,
            guard: tokio::sync::Mutex::new(()),
            closes: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
        })
    }

    pub fn entries(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Archiver for RecordingArchiver {
    async fn write(&self, name: &str, payload: Vec<u8>) -> Result<()> {
        let guard = self.guard.try_lock();
        if guard.is_err() {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        self.entries.lock().unwrap().insert(name.to_string(), payload);
        self.writes.fetch_add(1, Ordering::SeqCst);
        drop(guard);
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| BulkError::EntryNotFound(name.to_string()))
    }

    async fn list_entries(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn supports_concurrent_writes(&self) -> bool {
        self.concurrent
    }
}
