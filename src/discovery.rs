//! Session file discovery
//!
//! A session folder holds one sub-folder per subject, each containing that
//! subject's recording files.

use crate::error::QcError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Subject id to recording paths, both in sorted order
pub type SessionFiles = BTreeMap<String, Vec<PathBuf>>;

/// Collect subject folders and their files under `dir`.
///
/// Hidden entries are ignored, as are files sitting directly in `dir`.
/// Fails on the first folder that cannot be read.
pub fn discover_sessions(dir: &Path) -> Result<SessionFiles, QcError> {
    let mut sessions = SessionFiles::new();
    for (subject, path) in list_subjects(dir)? {
        sessions.insert(subject, subject_files(&path)?);
    }
    Ok(sessions)
}

/// Non-hidden subject folders directly under `dir`, sorted by name
pub fn list_subjects(dir: &Path) -> Result<Vec<(String, PathBuf)>, QcError> {
    let mut subjects = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !entry.file_type()?.is_dir() {
            continue;
        }
        subjects.push((name, entry.path()));
    }
    subjects.sort();
    Ok(subjects)
}

/// Non-hidden regular files of one subject folder, sorted by path
pub fn subject_files(dir: &Path) -> Result<Vec<PathBuf>, QcError> {
    let mut files = Vec::new();
    for file in fs::read_dir(dir)? {
        let file = file?;
        if is_hidden(&file.file_name().to_string_lossy()) {
            continue;
        }
        if file.file_type()?.is_file() {
            files.push(file.path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// One project/session folder of the study tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    pub project: String,
    pub session: String,
    pub path: PathBuf,
}

/// Where recordings live below the study root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyLayout {
    pub projects: Vec<String>,
    pub sessions: Vec<String>,
    /// Path from a project folder to the session folders
    pub data_dir: PathBuf,
}

impl Default for StudyLayout {
    fn default() -> Self {
        Self {
            projects: vec![
                "InterventionStudy".to_string(),
                "ObservationalStudy".to_string(),
            ],
            sessions: vec!["Supervised".to_string(), "Unsupervised".to_string()],
            data_dir: ["3-Experiment", "data", "polarhrcsv"].iter().collect(),
        }
    }
}

impl StudyLayout {
    /// Session folders that exist under `base`
    pub fn session_dirs(&self, base: &Path) -> Vec<SessionDir> {
        let mut dirs = Vec::new();
        for project in &self.projects {
            let project_path = base.join(project).join(&self.data_dir);
            if !project_path.is_dir() {
                continue;
            }
            for session in &self.sessions {
                let path = project_path.join(session);
                if path.is_dir() {
                    dirs.push(SessionDir {
                        project: project.clone(),
                        session: session.clone(),
                        path,
                    });
                }
            }
        }
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(path: &Path) {
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discover_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let sub07 = dir.path().join("sub07");
        fs::create_dir(&sub07).unwrap();
        touch(&sub07.join("ses02.csv"));
        touch(&sub07.join("ses01.csv"));
        touch(&sub07.join(".DS_Store"));
        fs::create_dir(sub07.join("nested")).unwrap();
        fs::create_dir(dir.path().join("sub08")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        touch(&dir.path().join("notes.txt"));

        let sessions = discover_sessions(dir.path()).unwrap();
        assert_eq!(
            sessions.keys().cloned().collect::<Vec<_>>(),
            vec!["sub07".to_string(), "sub08".to_string()]
        );
        assert_eq!(
            sessions["sub07"],
            vec![sub07.join("ses01.csv"), sub07.join("ses02.csv")]
        );
        assert!(sessions["sub08"].is_empty());
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover_sessions(&dir.path().join("absent"));
        assert!(matches!(result, Err(QcError::Io(_))));
    }

    #[test]
    fn test_layout_lists_existing_session_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StudyLayout::default();
        let supervised = dir
            .path()
            .join("InterventionStudy")
            .join(&layout.data_dir)
            .join("Supervised");
        fs::create_dir_all(&supervised).unwrap();

        let dirs = layout.session_dirs(dir.path());
        assert_eq!(
            dirs,
            vec![SessionDir {
                project: "InterventionStudy".to_string(),
                session: "Supervised".to_string(),
                path: supervised,
            }]
        );
    }
}
