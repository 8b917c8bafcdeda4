//! Locating run files on disk.
//!
//! Runs are filed as `<root>/<scenario>/<label>_packets_log.csv` (any depth
//! below `root` works); the scenario is the name of the directory that
//! directly contains the file.

use std::io;
use std::path::{Path, PathBuf};

/// File-name suffix identifying a reconciled run log.
pub const RUN_FILE_SUFFIX: &str = "_packets_log.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFile {
    pub scenario: String,
    pub path: PathBuf,
}

/// Recursively collect every run file under `root`, sorted by path.
pub fn find_run_files(root: &Path) -> io::Result<Vec<RunFile>> {
    let mut paths = Vec::new();
    walk(root, &mut paths)?;
    paths.sort();
    Ok(paths
        .into_iter()
        .filter_map(|path| {
            let scenario = scenario_of(&path)?;
            Some(RunFile { scenario, path })
        })
        .collect())
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, out)?;
        } else if is_run_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_run_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(RUN_FILE_SUFFIX))
}

/// Name of the directory immediately containing `path`.
pub fn scenario_of(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()?
        .to_str()
        .map(str::to_string)
}
