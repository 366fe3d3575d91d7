//! Filesystem helpers for locating replica databases, built on `cap-std` and
//! `camino`.
#![forbid(unsafe_code)]

use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// State of a database location on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// A regular file exists at the path.
    File,
    /// Something other than a regular file exists at the path.
    NotAFile,
    /// Nothing exists at the path yet.
    Missing,
}

/// Inspect `path` without following it outside its parent directory.
pub fn inspect_database(path: &Utf8Path) -> io::Result<DatabaseLocation> {
    let (dir, name) = match parent_dir_and_name(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(DatabaseLocation::Missing);
        }
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) if meta.is_file() => Ok(DatabaseLocation::File),
        Ok(_) => Ok(DatabaseLocation::NotAFile),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(DatabaseLocation::Missing),
        Err(err) => Err(err),
    }
}

/// Create the directory that will hold the database at `path`.
///
/// Absolute paths are resolved from the filesystem root and relative paths
/// from the working directory.
pub fn prepare_database_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let (base, relative) = split_base(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

fn parent_dir_and_name(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other("database path should name a file"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Split `parent` into an ambient base directory and the path below it.
///
/// The base is the leading root (with any Windows prefix) of an absolute
/// path, or the working directory for a relative one.
fn split_base(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let mut base = Utf8PathBuf::new();
    let mut relative = Utf8PathBuf::new();
    for component in parent.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir if relative.as_str().is_empty() => {
                base.push(component);
            }
            other => relative.push(other),
        }
    }
    if base.as_str().is_empty() {
        base.push(".");
    }
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        (dir, path)
    }

    #[rstest]
    fn prepares_nested_directories(root: (TempDir, Utf8PathBuf)) {
        let (_guard, base) = root;
        let database = base.join("state/replica/roadnet.db");
        prepare_database_dir(&database).expect("create directories");
        assert!(base.join("state/replica").is_dir());
        assert_eq!(
            inspect_database(&database).expect("inspect"),
            DatabaseLocation::Missing
        );
    }

    #[rstest]
    fn bare_file_name_needs_no_directory() {
        prepare_database_dir(Utf8Path::new("roadnet.db")).expect("nothing to create");
    }

    #[rstest]
    fn reports_existing_files_and_directories(root: (TempDir, Utf8PathBuf)) {
        let (_guard, base) = root;
        let file = base.join("roadnet.db");
        std::fs::write(&file, b"").expect("write file");
        assert_eq!(inspect_database(&file).expect("inspect"), DatabaseLocation::File);
        assert_eq!(
            inspect_database(&base).expect("inspect"),
            DatabaseLocation::NotAFile
        );
    }

    #[rstest]
    fn missing_parent_reads_as_missing(root: (TempDir, Utf8PathBuf)) {
        let (_guard, base) = root;
        let database = base.join("absent/roadnet.db");
        assert_eq!(
            inspect_database(&database).expect("inspect"),
            DatabaseLocation::Missing
        );
    }
}
