//! Disk I/O for downloaded files.
//!
//! Bodies are streamed into `<name>.part` and renamed to the final name only
//! after a complete 200 response, so a failed download never leaves a file
//! under its final name.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Temporary file suffix used before the rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a.grib2` → `a.grib2.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Sequential writer for one in-flight download.
pub struct PartFile {
    writer: BufWriter<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (truncating) the temp file next to `final_path`.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let temp_path = temp_path(final_path);
        let file = File::create(&temp_path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            temp_path,
            final_path: final_path.to_path_buf(),
            written: 0,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Flush and rename the temp file to the final path. Returns the byte count.
    pub fn finalize(self) -> io::Result<u64> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.temp_path, &self.final_path)?;
        Ok(self.written)
    }

    /// Drop the temp file.
    pub fn discard(self) {
        let temp_path = self.temp_path.clone();
        drop(self.writer);
        if let Err(e) = fs::remove_file(&temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %temp_path.display(), "could not remove partial file: {}", e);
            }
        }
    }
}

/// Concatenate `inputs` in order into `dest`, removing each input once copied.
/// Returns the total byte count.
pub fn concat_files(inputs: &[PathBuf], dest: &Path) -> io::Result<u64> {
    let mut out = BufWriter::new(File::create(dest)?);
    let mut total = 0u64;
    for input in inputs {
        let mut f = File::open(input)?;
        total += io::copy(&mut f, &mut out)?;
        drop(f);
        fs::remove_file(input)?;
    }
    out.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("file.grib2"));
        assert_eq!(p.to_string_lossy(), "file.grib2.part");
        let p2 = temp_path(Path::new("/tmp/o1_00/x.grib2"));
        assert_eq!(p2.to_string_lossy(), "/tmp/o1_00/x.grib2.part");
    }

    #[test]
    fn finalize_renames_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("out.grib2");
        let mut part = PartFile::create(&final_path).unwrap();
        part.write(b"GRIB").unwrap();
        part.write(b"7777").unwrap();
        assert!(temp_path(&final_path).exists());
        assert_eq!(part.finalize().unwrap(), 8);
        assert!(!temp_path(&final_path).exists());
        assert_eq!(fs::read(&final_path).unwrap(), b"GRIB7777");
    }

    #[test]
    fn discard_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("out.grib2");
        let mut part = PartFile::create(&final_path).unwrap();
        part.write(b"partial").unwrap();
        part.discard();
        assert!(!final_path.exists());
        assert!(!temp_path(&final_path).exists());
    }

    #[test]
    fn concat_files_joins_in_order_and_removes_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.grib2");
        let b = dir.path().join("b.grib2");
        fs::write(&a, b"first-").unwrap();
        fs::write(&b, b"second").unwrap();
        let dest = dir.path().join("joined.grib2");
        let n = concat_files(&[a.clone(), b.clone()], &dest).unwrap();
        assert_eq!(n, 12);
        assert_eq!(fs::read(&dest).unwrap(), b"first-second");
        assert!(!a.exists());
        assert!(!b.exists());
    }
}
