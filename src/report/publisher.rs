//! Atomic publication of a run's JSON artifacts.
//!
//! All three files are staged as temp files next to their destinations and
//! fsynced before any of them is renamed into place. The files being
//! replaced are hard-linked to backups first; if a later rename fails, the
//! ones already renamed are rolled back, so the directory always ends up
//! holding a single run's artifacts.

use crate::models::Snapshot;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const POSTS_FILE: &str = "posts.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const WORDFREQ_FILE: &str = "wordfreq.json";

/// Where a successful publish put each artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifacts {
    pub posts: PathBuf,
    pub summary: PathBuf,
    pub wordfreq: PathBuf,
}

impl PublishedArtifacts {
    pub fn paths(&self) -> [&Path; 3] {
        [&self.posts, &self.summary, &self.wordfreq]
    }
}

/// A serialized artifact waiting to be renamed into place.
struct StagedFile {
    temp: NamedTempFile,
    destination: PathBuf,
}

/// Writes snapshots into a fixed output directory.
#[derive(Debug, Clone)]
pub struct Publisher {
    output_dir: PathBuf,
}

impl Publisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Replace the published artifacts with `snapshot`.
    pub fn publish(&self, snapshot: &Snapshot) -> Result<PublishedArtifacts> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output_dir.display()
            )
        })?;

        // Stage everything first; dropping a StagedFile deletes its temp file.
        let staged = [
            self.stage(POSTS_FILE, &snapshot.posts)?,
            self.stage(SUMMARY_FILE, &snapshot.summary)?,
            self.stage(WORDFREQ_FILE, &snapshot.wordfreq)?,
        ];

        // Keep the current artifacts reachable until every rename has landed.
        let mut backups: Vec<Option<PathBuf>> = Vec::with_capacity(staged.len());
        for file in &staged {
            match self.back_up(&file.destination) {
                Ok(backup) => backups.push(backup),
                Err(e) => {
                    discard_backups(&backups);
                    return Err(e);
                }
            }
        }

        let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());
        for file in staged {
            let destination = file.destination.clone();
            if let Err(e) = file.temp.persist(&destination) {
                restore(&committed, &backups);
                discard_backups(&backups);
                return Err(e.error)
                    .with_context(|| format!("Failed to replace {}", destination.display()));
            }
            debug!("Published {}", destination.display());
            committed.push(destination);
        }

        discard_backups(&backups);
        sync_dir(&self.output_dir);

        info!(
            "Published {} posts to {}",
            snapshot.posts.len(),
            self.output_dir.display()
        );

        let mut committed = committed.into_iter();
        match (committed.next(), committed.next(), committed.next()) {
            (Some(posts), Some(summary), Some(wordfreq)) => Ok(PublishedArtifacts {
                posts,
                summary,
                wordfreq,
            }),
            _ => anyhow::bail!("Artifact list incomplete after publish"),
        }
    }

    /// Hard-link the current artifact at `destination` to a backup name.
    ///
    /// Returns `None` when there is nothing to back up. Fails when the
    /// destination exists but cannot be linked, e.g. because it is not a
    /// regular file; in that case nothing has been replaced yet.
    fn back_up(&self, destination: &Path) -> Result<Option<PathBuf>> {
        match std::fs::symlink_metadata(destination) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to inspect {}", destination.display()))
            }
        }

        let backup = backup_path(destination);
        remove_if_present(&backup)
            .with_context(|| format!("Failed to clear stale backup {}", backup.display()))?;
        if let Err(e) = std::fs::hard_link(destination, &backup) {
            debug!("Cannot link {}, copying instead: {}", destination.display(), e);
            std::fs::copy(destination, &backup)
                .with_context(|| format!("Failed to back up {}", destination.display()))?;
        }
        Ok(Some(backup))
    }

    fn stage<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<StagedFile> {
        let destination = self.output_dir.join(file_name);

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(&self.output_dir)
            .with_context(|| format!("Failed to create temp file for {}", file_name))?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, value)
                .with_context(|| format!("Failed to serialize {}", file_name))?;
            writer.write_all(b"\n")?;
            writer
                .flush()
                .with_context(|| format!("Failed to write {}", file_name))?;
        }

        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync {}", file_name))?;
        make_world_readable(temp.as_file())?;

        Ok(StagedFile { temp, destination })
    }
}

/// Temp files are created owner-only; published artifacts are public.
#[cfg(unix)]
fn make_world_readable(file: &std::fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
        .context("Failed to set artifact permissions")
}

#[cfg(not(unix))]
fn make_world_readable(_file: &std::fs::File) -> Result<()> {
    Ok(())
}

/// `.posts.json.bak` next to `posts.json`.
fn backup_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.bak", name))
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Put back what `committed` replaced. `backups` is indexed like the staged
/// files, so the first `committed.len()` entries belong to `committed`.
fn restore(committed: &[PathBuf], backups: &[Option<PathBuf>]) {
    for (destination, backup) in committed.iter().zip(backups) {
        let result = match backup {
            Some(backup) => std::fs::rename(backup, destination),
            None => remove_if_present(destination),
        };
        match result {
            Ok(()) => debug!("Rolled back {}", destination.display()),
            Err(e) => warn!("Failed to roll back {}: {}", destination.display(), e),
        }
    }
}

fn discard_backups(backups: &[Option<PathBuf>]) {
    for backup in backups.iter().flatten() {
        if let Err(e) = remove_if_present(backup) {
            debug!("Failed to remove backup {}: {}", backup.display(), e);
        }
    }
}

/// Best effort: make the renames durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    let synced = std::fs::File::open(dir).and_then(|handle| handle.sync_all());
    if let Err(e) = synced {
        debug!("Failed to sync {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{build_snapshot, AggregateOptions};
    use crate::models::{Post, Summary, TermCount};
    use tempfile::TempDir;

    const STAMP: &str = "2024-05-01T12:00:00Z";

    fn create_test_post(id: &str, sentiment: u8) -> Post {
        Post {
            id: id.to_string(),
            title: "Ranked is back".to_string(),
            author: "someone".to_string(),
            selftext: "Finally, ranked mode returns ✨".to_string(),
            url: String::new(),
            permalink: format!("https://www.reddit.com/r/test/comments/{}/", id),
            created_utc: 1_714_564_800.0,
            created_iso: STAMP.to_string(),
            score: 10,
            num_comments: 4,
            sentiment_1_5: sentiment,
            sentiment_reason: "Excited".to_string(),
            requested_items: vec!["ranked mode".to_string()],
        }
    }

    fn snapshot(posts: Vec<Post>) -> Snapshot {
        build_snapshot(posts, &AggregateOptions::new("test"), STAMP)
    }

    #[test]
    fn test_publish_writes_consistent_artifacts() {
        let dir = TempDir::new().unwrap();
        let publisher = Publisher::new(dir.path().join("data"));
        let snap = snapshot(vec![create_test_post("a", 4), create_test_post("b", 2)]);

        let artifacts = publisher.publish(&snap).unwrap();

        let posts: Vec<Post> =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.posts).unwrap()).unwrap();
        let summary: Summary =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.summary).unwrap()).unwrap();
        let wordfreq: Vec<TermCount> =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.wordfreq).unwrap()).unwrap();

        assert_eq!(posts, snap.posts);
        assert_eq!(summary.post_count, posts.len());
        assert_eq!(summary.generated_at_utc, STAMP);
        assert_eq!(wordfreq, snap.wordfreq);
        assert!(posts[0].selftext.contains('✨'));
    }

    #[test]
    fn test_publish_replaces_previous_run() {
        let dir = TempDir::new().unwrap();
        let publisher = Publisher::new(dir.path());

        publisher
            .publish(&snapshot(vec![
                create_test_post("a", 1),
                create_test_post("b", 5),
            ]))
            .unwrap();
        let artifacts = publisher.publish(&snapshot(Vec::new())).unwrap();

        let posts = std::fs::read_to_string(&artifacts.posts).unwrap();
        assert_eq!(posts.trim(), "[]");
        let summary: Summary =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.summary).unwrap()).unwrap();
        assert_eq!(summary.post_count, 0);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let publisher = Publisher::new(dir.path());
        publisher
            .publish(&snapshot(vec![create_test_post("a", 3)]))
            .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![POSTS_FILE, SUMMARY_FILE, WORDFREQ_FILE]);
    }

    #[test]
    fn test_unwritable_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let publisher = Publisher::new(&blocker);
        assert!(publisher.publish(&snapshot(Vec::new())).is_err());
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "x");
    }

    #[test]
    fn test_blocked_destination_keeps_previous_run() {
        let dir = TempDir::new().unwrap();
        let publisher = Publisher::new(dir.path());
        let first = snapshot(vec![create_test_post("a", 4), create_test_post("b", 2)]);
        publisher.publish(&first).unwrap();

        let summary = dir.path().join(SUMMARY_FILE);
        std::fs::remove_file(&summary).unwrap();
        std::fs::create_dir(&summary).unwrap();
        std::fs::write(summary.join("keep"), "x").unwrap();

        assert!(publisher.publish(&snapshot(Vec::new())).is_err());

        let posts: Vec<Post> =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(POSTS_FILE)).unwrap())
                .unwrap();
        let wordfreq: Vec<TermCount> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(WORDFREQ_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(posts, first.posts);
        assert_eq!(wordfreq, first.wordfreq);

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![POSTS_FILE, SUMMARY_FILE, WORDFREQ_FILE]);
    }

    #[test]
    fn test_restore_puts_back_replaced_files() {
        let dir = TempDir::new().unwrap();
        let publisher = Publisher::new(dir.path());
        let posts = dir.path().join(POSTS_FILE);
        let summary = dir.path().join(SUMMARY_FILE);

        std::fs::write(&posts, "old posts").unwrap();
        let backups = vec![
            publisher.back_up(&posts).unwrap(),
            publisher.back_up(&summary).unwrap(),
        ];
        assert!(backups[0].is_some());
        assert!(backups[1].is_none());

        // Simulate two renames that landed before a third one failed.
        let mut replacement = NamedTempFile::new_in(dir.path()).unwrap();
        replacement.write_all(b"new posts").unwrap();
        replacement.persist(&posts).unwrap();
        std::fs::write(&summary, "new summary").unwrap();

        restore(&[posts.clone(), summary.clone()], &backups);
        discard_backups(&backups);

        assert_eq!(std::fs::read_to_string(&posts).unwrap(), "old posts");
        assert!(!summary.exists());
        assert!(!backup_path(&posts).exists());
    }

    #[test]
    fn test_stale_backup_is_replaced() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".posts.json.bak"), "stale").unwrap();

        let publisher = Publisher::new(dir.path());
        publisher
            .publish(&snapshot(vec![create_test_post("a", 3)]))
            .unwrap();
        publisher.publish(&snapshot(Vec::new())).unwrap();

        assert!(!dir.path().join(".posts.json.bak").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_artifacts_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let artifacts = Publisher::new(dir.path())
            .publish(&snapshot(Vec::new()))
            .unwrap();
        let mode = std::fs::metadata(&artifacts.summary)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
