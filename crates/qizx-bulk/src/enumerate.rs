//! Job enumeration
//!
//! Dump jobs come from walking a library's collection tree; restore jobs come
//! from the archive's entry list. Both are computed completely for a library
//! before any of its jobs is queued, so an enumeration failure never leaves a
//! library half-queued.

use crate::archive::Archiver;
use crate::error::{BulkError, Result};
use crate::job::{parse_entry, Job, JobKind};
use crate::store::RemoteStore;
use qizx_api::MemberKind;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};

const ROOT: &str = "/";

/// Libraries to dump: the explicit one, or every library on the server.
pub async fn select_libraries(store: &dyn RemoteStore, explicit: Option<&str>) -> Result<Vec<String>> {
    match explicit {
        Some(library) => Ok(vec![library.to_string()]),
        None => store
            .list_libraries()
            .await
            .map_err(|e| BulkError::enumeration("libraries", e)),
    }
}

/// All jobs needed to dump `library`, walking collections breadth-first.
///
/// Every member, the root collection included, gets a property-set job;
/// documents also get a body job.
pub async fn dump_jobs(store: &dyn RemoteStore, library: &str) -> Result<Vec<Job>> {
    let scope = format!("library '{}'", library);
    let mut jobs = vec![Job::new(JobKind::Properties, library, ROOT)];
    let mut pending = VecDeque::from([ROOT.to_string()]);

    while let Some(collection) = pending.pop_front() {
        let members = store
            .list_members(library, &collection, 1)
            .await
            .map_err(|e| BulkError::enumeration(scope.as_str(), e))?;

        for member in members {
            if let Some(kind) = JobKind::for_member(member.kind) {
                jobs.push(Job::new(kind, library, member.path.as_str()));
            }
            jobs.push(Job::new(JobKind::Properties, library, member.path.as_str()));
            if member.kind == MemberKind::Collection {
                pending.push_back(member.path);
            }
        }
    }

    debug!(library = %library, jobs = jobs.len(), "Enumerated library");
    Ok(jobs)
}

/// An archive library and the database library it is restored into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryMapping {
    pub source: String,
    pub target: String,
}

/// Everything a restore run will do, split into ordered phases.
#[derive(Debug, Clone, Default)]
pub struct RestorePlan {
    pub libraries: Vec<LibraryMapping>,
    /// Document bodies, stored first
    pub documents: Vec<Job>,
    /// Property sets, applied once every document exists
    pub properties: Vec<Job>,
}

impl RestorePlan {
    pub fn job_count(&self) -> usize {
        self.documents.len() + self.properties.len()
    }
}

/// Plan a restore from the archive's entries.
///
/// Library names come from the top-level archive directories. With an
/// explicit `library`, the archive library of that name is restored, or the
/// archive's only library is restored under that name.
pub async fn restore_plan(archive: &dyn Archiver, library: Option<&str>) -> Result<RestorePlan> {
    let entries = archive
        .list_entries()
        .await
        .map_err(|e| BulkError::enumeration("archive", e))?;

    let mut by_library: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in entries {
        match parse_entry(&entry) {
            Ok(parsed) => by_library.entry(parsed.library).or_default().push(entry),
            Err(e) => warn!(error = %e, "Skipping archive entry"),
        }
    }

    if by_library.is_empty() {
        return Err(BulkError::enumeration("archive", "no libraries found"));
    }

    let libraries = match library {
        None => by_library
            .keys()
            .map(|name| LibraryMapping {
                source: name.clone(),
                target: name.clone(),
            })
            .collect(),
        Some(target) if by_library.contains_key(target) || by_library.len() == 1 => {
            let source = if by_library.contains_key(target) {
                target.to_string()
            } else {
                by_library.keys().next().cloned().unwrap_or_default()
            };
            vec![LibraryMapping {
                source,
                target: target.to_string(),
            }]
        },
        Some(target) => {
            return Err(BulkError::enumeration(
                "archive",
                format!(
                    "library '{}' not found; archive holds {}",
                    target,
                    by_library.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            ));
        },
    };

    let mut plan = RestorePlan {
        libraries: libraries.clone(),
        ..Default::default()
    };
    for mapping in &libraries {
        for entry in by_library.get(&mapping.source).into_iter().flatten() {
            let job = Job::from_entry(entry, mapping.target.as_str())?;
            if job.kind.is_body() {
                plan.documents.push(job);
            } else {
                plan.properties.push(job);
            }
        }
        info!(source = %mapping.source, target = %mapping.target, "Planned library restore");
    }

    Ok(plan)
}

/// Create every target library that does not exist yet.
pub async fn ensure_libraries(store: &dyn RemoteStore, libraries: &[LibraryMapping]) -> Result<()> {
    let existing = store
        .list_libraries()
        .await
        .map_err(|e| BulkError::enumeration("libraries", e))?;

    for mapping in libraries {
        if existing.contains(&mapping.target) {
            continue;
        }
        info!(library = %mapping.target, "Creating library");
        store
            .create_library(&mapping.target)
            .await
            .map_err(|e| BulkError::enumeration(format!("library '{}'", mapping.target), e))?;
    }
    Ok(())
}
