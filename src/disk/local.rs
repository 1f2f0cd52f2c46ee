//! Local directory disk
//!
//! Each disk is a directory; each bucket a subdirectory of it. An object
//! `a/b.txt` is stored as the directory `a/b.txt/` holding `xl.json` (and,
//! in a full engine, its part shards). Raw listings therefore show objects
//! with a trailing `/`, exactly like sub-directories.

use super::types::{ObjectMetadata, XL_META_FILE};
use super::Disk;
use crate::error::{DiskError, DiskResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{trace, warn};

/// Disk rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
    endpoint: String,
}

impl LocalDisk {
    /// Open a disk rooted at `root`, which must be an existing directory
    pub fn open(root: impl Into<PathBuf>) -> DiskResult<Self> {
        let root = root.into();
        let endpoint = root.display().to_string();
        if !root.is_dir() {
            return Err(DiskError::DiskNotFound { endpoint });
        }
        Ok(Self { root, endpoint })
    }

    /// Create a bucket directory
    pub fn make_bucket(&self, bucket: &str) -> DiskResult<()> {
        self.check_online()?;
        if !is_single_component(bucket) {
            return Err(DiskError::VolumeNotFound {
                bucket: bucket.to_string(),
            });
        }
        fs::create_dir_all(self.root.join(bucket)).map_err(|e| DiskError::from_io(e, bucket))
    }

    /// Write an object's metadata file, creating its directory
    pub fn write_metadata(&self, bucket: &str, object: &str, meta: &ObjectMetadata) -> DiskResult<()> {
        let path = format!("{}/{}", bucket, object);
        let object_dir = join_relative(self.bucket_path(bucket)?, object, &path)?;
        fs::create_dir_all(&object_dir).map_err(|e| DiskError::from_io(e, &path))?;

        let json = serde_json::to_vec_pretty(meta).map_err(|e| DiskError::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(object_dir.join(XL_META_FILE), json).map_err(|e| DiskError::from_io(e, &path))
    }

    fn check_online(&self) -> DiskResult<()> {
        if !self.root.is_dir() {
            return Err(DiskError::DiskNotFound {
                endpoint: self.endpoint.clone(),
            });
        }
        Ok(())
    }

    fn bucket_path(&self, bucket: &str) -> DiskResult<PathBuf> {
        self.check_online()?;
        let path = self.root.join(bucket);
        if !is_single_component(bucket) || !path.is_dir() {
            return Err(DiskError::VolumeNotFound {
                bucket: bucket.to_string(),
            });
        }
        Ok(path)
    }

    fn meta_path(&self, bucket: &str, object: &str) -> DiskResult<PathBuf> {
        let display = format!("{}/{}", bucket, object.trim_end_matches('/'));
        Ok(join_relative(self.bucket_path(bucket)?, object, &display)?.join(XL_META_FILE))
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Join a bucket-relative path onto `base`, refusing anything but plain names
///
/// Root, `.` and `..` components would resolve outside the bucket; they are
/// reported as missing.
fn join_relative(base: PathBuf, rel: &str, display: &str) -> DiskResult<PathBuf> {
    let mut path = base;
    for component in Path::new(rel.trim_end_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            _ => {
                return Err(DiskError::FileNotFound {
                    path: display.to_string(),
                })
            }
        }
    }
    Ok(path)
}

impl Disk for LocalDisk {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn list_dir(&self, bucket: &str, dir: &str) -> DiskResult<Vec<String>> {
        let display_path = format!("{}/{}", bucket, dir);
        let dir_path = join_relative(self.bucket_path(bucket)?, dir, &display_path)?;

        let read_dir = fs::read_dir(&dir_path).map_err(|e| DiskError::from_io(e, &display_path))?;
        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| DiskError::from_io(e, &display_path))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(disk = %self.endpoint, dir = %display_path, "Skipping non UTF-8 entry");
                continue;
            };
            let file_type = entry.file_type().map_err(|e| DiskError::from_io(e, &display_path))?;
            if file_type.is_dir() {
                entries.push(format!("{}/", name));
            } else {
                entries.push(name);
            }
        }

        trace!(disk = %self.endpoint, dir = %display_path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    fn read_metadata(&self, bucket: &str, object: &str) -> DiskResult<ObjectMetadata> {
        let path = self.meta_path(bucket, object)?;
        let display = format!("{}/{}", bucket, object.trim_end_matches('/'));

        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            // A file where a directory is expected means no object here
            ErrorKind::NotADirectory => DiskError::FileNotFound {
                path: display.clone(),
            },
            _ => DiskError::from_io(e, &display),
        })?;

        serde_json::from_slice(&bytes).map_err(|e| DiskError::Corrupt {
            path: display,
            reason: e.to_string(),
        })
    }

    fn has_object(&self, bucket: &str, object: &str) -> DiskResult<bool> {
        match self.meta_path(bucket, object) {
            Ok(path) => Ok(path.is_file()),
            Err(DiskError::FileNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::types::ErasureInfo;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_list_and_read() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::open(dir.path()).unwrap();
        disk.make_bucket("bucket").unwrap();

        let meta = ObjectMetadata::new(7, Utc::now(), ErasureInfo::new(1, 1, 1024));
        disk.write_metadata("bucket", "docs/readme.md", &meta).unwrap();

        assert_eq!(disk.list_dir("bucket", "").unwrap(), vec!["docs/"]);
        assert_eq!(disk.list_dir("bucket", "docs/").unwrap(), vec!["readme.md/"]);
        assert_eq!(disk.read_metadata("bucket", "docs/readme.md").unwrap(), meta);
        assert!(disk.has_object("bucket", "docs/readme.md/").unwrap());
        assert!(!disk.has_object("bucket", "docs/").unwrap());
    }

    #[test]
    fn test_error_mapping() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::open(dir.path()).unwrap();

        assert!(matches!(
            disk.list_dir("nobucket", ""),
            Err(DiskError::VolumeNotFound { .. })
        ));

        disk.make_bucket("bucket").unwrap();
        assert!(matches!(
            disk.list_dir("bucket", "missing/"),
            Err(DiskError::FileNotFound { .. })
        ));

        fs::create_dir_all(dir.path().join("bucket/bad")).unwrap();
        fs::write(dir.path().join("bucket/bad").join(XL_META_FILE), b"{not json").unwrap();
        assert!(matches!(
            disk.read_metadata("bucket", "bad"),
            Err(DiskError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_paths_stay_inside_bucket() {
        let dir = tempdir().unwrap();
        let disk = LocalDisk::open(dir.path()).unwrap();
        disk.make_bucket("photos").unwrap();
        disk.make_bucket("private").unwrap();
        let meta = ObjectMetadata::new(3, Utc::now(), ErasureInfo::new(1, 1, 1024));
        disk.write_metadata("private", "secret.txt", &meta).unwrap();

        for dir_name in ["../", "../private/", "/tmp/", "/etc", "a/../../"] {
            assert!(
                matches!(disk.list_dir("photos", dir_name), Err(DiskError::FileNotFound { .. })),
                "{}",
                dir_name
            );
        }
        assert!(matches!(
            disk.read_metadata("photos", "../private/secret.txt"),
            Err(DiskError::FileNotFound { .. })
        ));
        assert!(!disk.has_object("photos", "../private/secret.txt").unwrap());
        assert!(matches!(
            disk.write_metadata("photos", "../escaped", &meta),
            Err(DiskError::FileNotFound { .. })
        ));
        assert!(!dir.path().join("escaped").exists());

        for bucket in ["..", "photos/../private", "/tmp"] {
            assert!(
                matches!(disk.list_dir(bucket, ""), Err(DiskError::VolumeNotFound { .. })),
                "{}",
                bucket
            );
        }
    }

    #[test]
    fn test_missing_root_is_offline() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("disk1");
        assert!(LocalDisk::open(&root).unwrap_err().is_disk_offline());

        fs::create_dir(&root).unwrap();
        let disk = LocalDisk::open(&root).unwrap();
        fs::remove_dir(&root).unwrap();
        assert!(disk.list_dir("bucket", "").unwrap_err().is_disk_offline());
    }
}
