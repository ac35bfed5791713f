//! Session identity and discovery
//!
//! Recording file names encode `{object}_{person}_{session}.<ext>`.
//! Discovery enumerates the input directory once and returns sessions in
//! lexicographic file-name order, which is the processing order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Identity of one session recording
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// Recording file name, including extension
    pub file_name: String,

    /// File name without extension, used to name the artifact
    pub stem: String,

    /// Grasped object label (first name component)
    pub object: String,

    /// Person label (second name component)
    pub person: String,

    /// Session index (third name component)
    pub session: String,
}

impl SessionId {
    /// Parse a recording file name
    ///
    /// Names that do not split into three non-empty parts keep the whole
    /// stem as object label and leave person/session empty.
    pub fn parse(file_name: &str) -> Self {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string());

        let parts: Vec<&str> = stem.splitn(3, '_').collect();
        let (object, person, session) = match parts.as_slice() {
            [o, p, s] if !o.is_empty() && !p.is_empty() && !s.is_empty() => {
                (o.to_string(), p.to_string(), s.to_string())
            }
            _ => (stem.clone(), String::new(), String::new()),
        };

        Self {
            file_name: file_name.to_string(),
            stem,
            object,
            person,
            session,
        }
    }

    /// Whether the name carried the full object/person/session triple
    pub fn is_labeled(&self) -> bool {
        !self.person.is_empty() && !self.session.is_empty()
    }

    /// File name of the artifact produced for this session
    pub fn artifact_name(&self) -> String {
        format!("{}.json", self.stem)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Restricts discovery to selected labels; empty lists accept everything
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub objects: Vec<String>,
    pub people: Vec<String>,
    pub sessions: Vec<String>,
}

impl SessionFilter {
    pub fn accepts(&self, id: &SessionId) -> bool {
        fn allowed(list: &[String], value: &str) -> bool {
            list.is_empty() || list.iter().any(|v| v == value)
        }

        allowed(&self.objects, &id.object)
            && allowed(&self.people, &id.person)
            && allowed(&self.sessions, &id.session)
    }
}

/// A discovered recording on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecording {
    pub id: SessionId,
    pub path: PathBuf,
}

/// Enumerate recordings in `input_dir` with the given extension
///
/// Only regular files are considered. The result is sorted by file name
/// (byte order) so processing order never depends on the filesystem.
pub fn discover_sessions(
    input_dir: &Path,
    extension: &str,
    filter: &SessionFilter,
) -> io::Result<Vec<SessionRecording>> {
    let extension = extension.trim_start_matches('.');
    let mut recordings = Vec::new();

    for entry in fs::read_dir(input_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let matches_ext = path
            .extension()
            .map(|e| e.to_string_lossy() == extension)
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let id = SessionId::parse(&file_name);

        if !id.is_labeled() {
            tracing::warn!("Recording name {} does not follow object_person_session", file_name);
        }

        if !filter.accepts(&id) {
            tracing::debug!("Skipping {} (filtered out)", file_name);
            continue;
        }

        recordings.push(SessionRecording { id, path });
    }

    recordings.sort_by(|a, b| a.id.file_name.cmp(&b.id.file_name));

    tracing::info!(
        "Discovered {} session recording(s) in {:?}",
        recordings.len(),
        input_dir
    );

    Ok(recordings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_name_triple() {
        let id = SessionId::parse("bottle_joel_1.bag");
        assert_eq!(id.object, "bottle");
        assert_eq!(id.person, "joel");
        assert_eq!(id.session, "1");
        assert_eq!(id.stem, "bottle_joel_1");
        assert_eq!(id.artifact_name(), "bottle_joel_1.json");
        assert!(id.is_labeled());
    }

    #[test]
    fn unlabeled_name_keeps_stem() {
        let id = SessionId::parse("calibration.bag");
        assert_eq!(id.object, "calibration");
        assert!(!id.is_labeled());
        assert_eq!(id.artifact_name(), "calibration.json");
    }

    #[test]
    fn filter_matches_all_components() {
        let filter = SessionFilter {
            objects: vec!["cube".into()],
            people: vec![],
            sessions: vec!["2".into(), "3".into()],
        };
        assert!(filter.accepts(&SessionId::parse("cube_pedro_2.bag")));
        assert!(!filter.accepts(&SessionId::parse("cube_pedro_1.bag")));
        assert!(!filter.accepts(&SessionId::parse("phone_pedro_2.bag")));
    }

    #[test]
    fn discovery_is_sorted_and_filtered_by_extension() {
        let dir = tempdir().unwrap();
        for name in ["cube_joel_2.rec", "bottle_joel_1.rec", "notes.txt", "bottle_ana_3.rec"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.rec")).unwrap();

        let found = discover_sessions(dir.path(), ".rec", &SessionFilter::default()).unwrap();
        let names: Vec<_> = found.iter().map(|r| r.id.file_name.as_str()).collect();
        assert_eq!(names, ["bottle_ana_3.rec", "bottle_joel_1.rec", "cube_joel_2.rec"]);
    }
}
