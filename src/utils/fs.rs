use crate::cert::PkiError;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use uuid::Uuid;

pub const PRIVATE_MODE: u32 = 0o600;
pub const PUBLIC_MODE: u32 = 0o644;

/// A fully written and synced file waiting to be renamed over its target.
pub struct StagedFile {
    temp_path: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    pub fn stage(target: &Path, contents: &[u8], mode: u32) -> Result<Self, PkiError> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| PkiError::io(parent, e))?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        let mut file = create_file_with_mode(&temp_path, mode)?;
        let written = file
            .write_all(contents)
            .and_then(|_| file.sync_all());
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(PkiError::io(&temp_path, e));
        }

        Ok(Self {
            temp_path,
            target: target.to_path_buf(),
        })
    }

    pub fn commit(self) -> Result<(), PkiError> {
        fs::rename(&self.temp_path, &self.target).map_err(|e| {
            let _ = fs::remove_file(&self.temp_path);
            PkiError::io(&self.target, e)
        })
    }

    pub fn discard(self) {
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// Replaces `path` with `contents` through a temporary file and a rename.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<(), PkiError> {
    StagedFile::stage(path, contents, mode)?.commit()
}

/// Reads a file, reporting a missing file distinctly from other I/O failures.
pub fn read_file(path: &Path) -> Result<Vec<u8>, PkiError> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PkiError::MissingFile(path.to_path_buf()),
        _ => PkiError::io(path, e),
    })
}

fn create_file_with_mode(path: &Path, mode: u32) -> Result<fs::File, PkiError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .mode(mode)
            .open(path)
            .map_err(|e| PkiError::io(path, e))?;
        // umask may have stripped bits from the requested mode
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| PkiError::io(path, e))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    {
        let _ = mode;
        fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)
            .map_err(|e| PkiError::io(path, e))
    }
}
