//! Transfer jobs, queue messages and the archive entry layout
//!
//! Every library occupies one top-level directory of the archive:
//!
//! ```text
//! <library>/documents/<path>          XML document body
//! <library>/nonxml/<path>             non-XML document body
//! <library>/properties/<path>/.properties.json    property set
//! ```
//!
//! Property sets mirror the member path as directories, so no single file name
//! grows with the depth of the tree. A path segment starting with `.` or `%`
//! gets its first character percent-encoded, which keeps member names apart
//! from the `.properties.json` file and from `.`/`..` components.

use crate::error::{BulkError, Result};
use qizx_api::{MemberKind, Properties};
use serde::{Deserialize, Serialize};

const DOCUMENTS_DIR: &str = "documents";
const NONXML_DIR: &str = "nonxml";
const PROPERTIES_DIR: &str = "properties";
const PROPERTIES_FILE: &str = ".properties.json";

/// System properties maintained by the server; never written back on restore.
pub const READ_ONLY_PROPERTIES: &[&str] = &["path", "nature", "last-modified", "size"];

/// What a job transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    Document,
    NonXmlDocument,
    Properties,
}

impl JobKind {
    /// Job kind for the body of a library member, if it has one.
    pub fn for_member(kind: MemberKind) -> Option<Self> {
        match kind {
            MemberKind::Document => Some(JobKind::Document),
            MemberKind::NonXmlDocument => Some(JobKind::NonXmlDocument),
            MemberKind::Collection => None,
        }
    }

    pub fn is_body(self) -> bool {
        !matches!(self, JobKind::Properties)
    }
}

/// One unit of transfer work, consumed exactly once by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    pub kind: JobKind,
    /// Library the member lives in (dump) or is stored into (restore)
    pub library: String,
    /// Document or collection path, starting with `/`
    pub path: String,
    /// Archive entry written (dump) or read (restore)
    pub entry: String,
}

impl Job {
    /// Job for a member of a library, with the entry name from the archive layout.
    pub fn new(kind: JobKind, library: impl Into<String>, path: impl Into<String>) -> Self {
        let library = library.into();
        let path = path.into();
        let entry = entry_name(kind, &library, &path);
        Self {
            kind,
            library,
            path,
            entry,
        }
    }

    /// Job for an existing archive entry, stored into `library`.
    pub fn from_entry(entry: &str, library: impl Into<String>) -> Result<Self> {
        let parsed = parse_entry(entry)?;
        Ok(Self {
            kind: parsed.kind,
            library: library.into(),
            path: parsed.path,
            entry: entry.to_string(),
        })
    }
}

/// A named payload for the archive writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub name: String,
    pub payload: Vec<u8>,
}

/// Message on the job queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobMessage {
    Job(Job),
    Shutdown,
}

/// Message on the archive queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveMessage {
    Write(WriteRequest),
    Shutdown,
}

/// Archived property set of one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    pub path: String,
    pub properties: Properties,
}

impl PropertySet {
    /// Whether the archived member is a collection.
    pub fn is_collection(&self) -> bool {
        self.properties
            .get("nature")
            .and_then(|nature| nature.as_str())
            .map(|nature| MemberKind::from_nature(nature) == MemberKind::Collection)
            .unwrap_or(false)
    }

    /// Properties that can be written back to the server.
    pub fn writable(&self) -> Properties {
        self.properties
            .iter()
            .filter(|(name, _)| !READ_ONLY_PROPERTIES.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Archive entry name for a member of `library`.
pub fn entry_name(kind: JobKind, library: &str, path: &str) -> String {
    match kind {
        JobKind::Document => format!("{}/{}{}", library, DOCUMENTS_DIR, path),
        JobKind::NonXmlDocument => format!("{}/{}{}", library, NONXML_DIR, path),
        JobKind::Properties => {
            let mut entry = format!("{}/{}/", library, PROPERTIES_DIR);
            for segment in path.split('/').filter(|segment| !segment.is_empty()) {
                entry.push_str(&escape_segment(segment));
                entry.push('/');
            }
            entry.push_str(PROPERTIES_FILE);
            entry
        },
    }
}

fn escape_segment(segment: &str) -> String {
    match segment.as_bytes().first() {
        Some(b'.') => format!("%2E{}", &segment[1..]),
        Some(b'%') => format!("%25{}", &segment[1..]),
        _ => segment.to_string(),
    }
}

fn unescape_segment(segment: &str) -> Option<String> {
    if let Some(rest) = segment.strip_prefix("%2E") {
        Some(format!(".{}", rest))
    } else if let Some(rest) = segment.strip_prefix("%25") {
        Some(format!("%{}", rest))
    } else if segment.is_empty() || segment.starts_with('%') || segment.starts_with('.') {
        None
    } else {
        Some(segment.to_string())
    }
}

/// An archive entry name split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub library: String,
    pub kind: JobKind,
    pub path: String,
}

pub fn parse_entry(entry: &str) -> Result<ParsedEntry> {
    let invalid = || BulkError::InvalidEntry(entry.to_string());

    let (library, rest) = entry.split_once('/').ok_or_else(invalid)?;
    if library.is_empty() {
        return Err(invalid());
    }
    let (section, member) = rest.split_once('/').ok_or_else(invalid)?;

    let (kind, path) = match section {
        DOCUMENTS_DIR => (JobKind::Document, format!("/{}", member)),
        NONXML_DIR => (JobKind::NonXmlDocument, format!("/{}", member)),
        PROPERTIES_DIR if member == PROPERTIES_FILE => (JobKind::Properties, "/".to_string()),
        PROPERTIES_DIR => {
            let dir = member
                .strip_suffix(PROPERTIES_FILE)
                .and_then(|dir| dir.strip_suffix('/'))
                .ok_or_else(invalid)?;
            let mut path = String::with_capacity(dir.len() + 1);
            for segment in dir.split('/') {
                path.push('/');
                path.push_str(&unescape_segment(segment).ok_or_else(invalid)?);
            }
            (JobKind::Properties, path)
        },
        _ => return Err(invalid()),
    };

    if path.len() < 2 && kind.is_body() {
        return Err(invalid());
    }

    Ok(ParsedEntry {
        library: library.to_string(),
        kind,
        path,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use qizx_api::PropertyValue;

    #[test]
    fn test_entry_names() {
        assert_eq!(
            entry_name(JobKind::Document, "books", "/a/b.xml"),
            "books/documents/a/b.xml"
        );
        assert_eq!(
            entry_name(JobKind::NonXmlDocument, "books", "/img/c.png"),
            "books/nonxml/img/c.png"
        );
        assert_eq!(
            entry_name(JobKind::Properties, "books", "/a/b.xml"),
            "books/properties/a/b.xml/.properties.json"
        );
        assert_eq!(
            entry_name(JobKind::Properties, "books", "/"),
            "books/properties/.properties.json"
        );
        assert_eq!(
            entry_name(JobKind::Properties, "books", "/.hidden/%7E/.properties.json"),
            "books/properties/%2Ehidden/%257E/%2Eproperties.json/.properties.json"
        );
    }

    #[test]
    fn test_property_entry_components_stay_short() {
        let segment = "s".repeat(200);
        let path: String = (0..40).map(|_| format!("/{}", segment)).collect();
        let entry = entry_name(JobKind::Properties, "books", &path);

        assert!(entry.split('/').all(|component| component.len() <= 200));
        assert_eq!(parse_entry(&entry).unwrap().path, path);
    }

    #[test]
    fn test_parse_entry() {
        for job in [
            Job::new(JobKind::Document, "books", "/a/b.xml"),
            Job::new(JobKind::NonXmlDocument, "books", "/c d.png"),
            Job::new(JobKind::Properties, "books", "/"),
            Job::new(JobKind::Properties, "books", "/a/b.json"),
            Job::new(JobKind::Properties, "books", "/a/.properties.json"),
            Job::new(JobKind::Properties, "books", "/%2E/../.x"),
        ] {
            let parsed = parse_entry(&job.entry).unwrap();
            assert_eq!(parsed.library, job.library);
            assert_eq!(parsed.kind, job.kind);
            assert_eq!(parsed.path, job.path);
        }
    }

    #[test]
    fn test_parse_rejects_foreign_entries() {
        assert!(parse_entry("README").is_err());
        assert!(parse_entry("books/other/x").is_err());
        assert!(parse_entry("books/properties/a.xml").is_err());
        assert!(parse_entry("books/properties/a.xml.properties.json").is_err());
        assert!(parse_entry("books/properties/../.properties.json").is_err());
        assert!(parse_entry("books/properties/a//.properties.json").is_err());
        assert!(parse_entry("books/documents/").is_err());
        assert!(parse_entry("/documents/a.xml").is_err());
    }

    #[test]
    fn test_from_entry_overrides_library() {
        let job = Job::from_entry("books/documents/a.xml", "copy").unwrap();
        assert_eq!(job.library, "copy");
        assert_eq!(job.path, "/a.xml");
        assert_eq!(job.entry, "books/documents/a.xml");
    }

    #[test]
    fn test_property_set_filters_system_properties() {
        let mut properties = Properties::new();
        properties.insert("nature".into(), PropertyValue::String("collection".into()));
        properties.insert("size".into(), PropertyValue::Integer(10));
        properties.insert("owner".into(), PropertyValue::String("ann".into()));
        let set = PropertySet {
            path: "/c".into(),
            properties,
        };

        assert!(set.is_collection());
        let writable = set.writable();
        assert_eq!(writable.len(), 1);
        assert!(writable.contains_key("owner"));
    }
}
