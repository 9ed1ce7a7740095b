//! Per-stream working-directory preparation (spec.md §4.3).
//!
//! Size-balanced partitioning needs each stream's packet index opened in
//! isolation from its siblings, but a CTF trace directory interleaves
//! metadata and every stream's channel files together. This module stages
//! one working directory per stream — metadata plus that stream's
//! `<channel>_<cpu>` file and index — so a source can be opened against
//! just that stream. The staged tree is torn down on drop.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Error, Result};

/// One staged per-stream directory.
#[derive(Debug)]
pub struct StreamDir {
    pub name: String,
    pub dir: PathBuf,
}

/// Owns every per-stream working directory created for one run; removes
/// them all on drop, so callers don't need to remember to clean up.
#[derive(Debug)]
pub struct WorkingSet {
    pub streams: Vec<StreamDir>,
    root: PathBuf,
}

impl Drop for WorkingSet {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            log::warn!(
                "failed to remove per-stream working directory {}: {e}",
                self.root.display()
            );
        }
    }
}

/// Stage `<tmp>/<trace_name>_per_stream-<uuid>/<stream_file>.d/{metadata,
/// <stream_file>, index/<stream_file>.idx}` (spec.md §6) — one `.d`
/// directory per channel file found directly under `trace_dir`.
pub fn prepare(trace_dir: &Path) -> Result<WorkingSet> {
    let trace_name = trace_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Setup(format!("trace path has no file name: {}", trace_dir.display())))?;

    let root = std::env::temp_dir().join(format!("{trace_name}_per_stream-{}", Uuid::new_v4()));
    fs::create_dir_all(&root)?;

    let metadata_src = trace_dir.join("metadata");
    let index_dir = trace_dir.join("index");

    let mut streams = Vec::new();
    let read_dir = fs::read_dir(trace_dir).map_err(|e| {
        Error::Setup(format!(
            "could not read trace directory {}: {e}",
            trace_dir.display()
        ))
    })?;
    for entry in read_dir {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let channel_name = entry
            .file_name()
            .to_str()
            .ok_or_else(|| Error::Setup("non-UTF-8 channel file name".to_string()))?
            .to_string();
        if channel_name == "metadata" {
            continue;
        }

        let stream_root = root.join(format!("{channel_name}.d"));
        let stream_index_dir = stream_root.join("index");
        fs::create_dir_all(&stream_index_dir)?;

        if metadata_src.is_file() {
            link_or_copy(&metadata_src, &stream_root.join("metadata"))?;
        }
        link_or_copy(&entry.path(), &stream_root.join(&channel_name))?;

        let idx_name = format!("{channel_name}.idx");
        let idx_src = index_dir.join(&idx_name);
        if idx_src.is_file() {
            link_or_copy(&idx_src, &stream_index_dir.join(&idx_name))?;
        }

        streams.push(StreamDir {
            name: channel_name,
            dir: stream_root,
        });
    }

    streams.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(WorkingSet { streams, root })
}

/// Hard-link `src` at `dst`, falling back to a full copy when the two
/// paths don't share a filesystem (hard links can't cross devices).
fn link_or_copy(src: &Path, dst: &Path) -> Result<()> {
    match fs::hard_link(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(_) => {
            fs::copy(src, dst)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn make_trace(root: &Path) {
        let index = root.join("index");
        fs::create_dir_all(&index).unwrap();
        File::create(root.join("metadata")).unwrap().write_all(b"meta").unwrap();
        for name in ["sched_switch_0", "sched_switch_1"] {
            File::create(root.join(name)).unwrap().write_all(b"events").unwrap();
            File::create(index.join(format!("{name}.idx"))).unwrap().write_all(b"idx").unwrap();
        }
    }

    #[test]
    fn stages_one_directory_per_channel_file() {
        let trace_root = tempdir().unwrap();
        let trace_dir = trace_root.path().join("my-trace");
        fs::create_dir_all(&trace_dir).unwrap();
        make_trace(&trace_dir);

        let working_set = prepare(&trace_dir).unwrap();
        assert_eq!(working_set.streams.len(), 2);
        for stream in &working_set.streams {
            assert!(stream.dir.ends_with(format!("{}.d", stream.name)));
            assert!(stream.dir.join("metadata").is_file());
            assert!(stream.dir.join(&stream.name).is_file());
            assert!(stream
                .dir
                .join("index")
                .join(format!("{}.idx", stream.name))
                .is_file());
        }
    }

    #[test]
    fn drop_removes_the_staged_tree() {
        let trace_root = tempdir().unwrap();
        let trace_dir = trace_root.path().join("my-trace");
        fs::create_dir_all(&trace_dir).unwrap();
        make_trace(&trace_dir);

        let working_set = prepare(&trace_dir).unwrap();
        let root = working_set.root.clone();
        assert!(root.is_dir());
        drop(working_set);
        assert!(!root.exists());
    }
}
