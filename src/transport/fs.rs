use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::constants::dataset::SHARD_EXTENSIONS;
use crate::types::ShardPath;

/// Filesystem transport that discovers and streams JSONL shards under a dataset root.
pub struct ShardStream {
    root: PathBuf,
}

impl ShardStream {
    /// Create a stream rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Shard files under the root, ordered by relative path. Symlinks are
    /// followed.
    ///
    /// Hidden entries (any path component starting with `.`) are skipped so
    /// staging directories and editor droppings never become shards.
    pub fn discover(&self) -> io::Result<Vec<ShardPath>> {
        let mut shards = Vec::new();
        let walker = WalkDir::new(&self.root).follow_links(true);
        for entry in walker.into_iter() {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() || !is_shard_file(entry.path()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if is_hidden(relative) {
                continue;
            }
            shards.push(relative_to_shard_path(relative));
        }
        shards.sort();
        Ok(shards)
    }
}

/// True if the path has a recognized shard extension (case-insensitive).
pub fn is_shard_file(path: &Path) -> bool {
    shard_extension(path).is_some()
}

/// Lowercased shard extension of `path`, if it is one.
pub fn shard_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    SHARD_EXTENSIONS
        .iter()
        .any(|allowed| *allowed == ext)
        .then_some(ext)
}

fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(part) => part.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

fn relative_to_shard_path(relative: &Path) -> ShardPath {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Non-blank lines of one shard, without their line terminators.
pub struct ShardLines {
    reader: BufReader<File>,
    buffer: Vec<u8>,
    line_no: usize,
}

impl ShardLines {
    /// Open a shard for line streaming.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            buffer: Vec::new(),
            line_no: 0,
        })
    }
}

impl Iterator for ShardLines {
    /// `(1-based physical line number, line text)`.
    type Item = io::Result<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let mut end = self.buffer.len();
                    while end > 0 && matches!(self.buffer[end - 1], b'\n' | b'\r') {
                        end -= 1;
                    }
                    let raw = &self.buffer[..end];
                    if raw.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(match std::str::from_utf8(raw) {
                        Ok(text) => Ok((self.line_no, text.to_string())),
                        Err(err) => Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("line {} is not valid UTF-8: {err}", self.line_no),
                        )),
                    });
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Count non-blank lines without decoding them.
pub fn count_rows(path: &Path) -> io::Result<usize> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buffer = Vec::new();
    let mut rows = 0;
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        if !buffer.iter().all(u8::is_ascii_whitespace) {
            rows += 1;
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn discover_orders_shards_and_skips_hidden_entries() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("train")).unwrap();
        fs::create_dir_all(root.join(".staging")).unwrap();
        fs::write(root.join("train/b.jsonl"), "{}\n").unwrap();
        fs::write(root.join("a.NDJSON"), "{}\n").unwrap();
        fs::write(root.join("dataset_info.json"), "{}").unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();
        fs::write(root.join(".staging/c.jsonl"), "{}\n").unwrap();

        let shards = ShardStream::new(root).discover().unwrap();
        assert_eq!(shards, vec!["a.NDJSON".to_string(), "train/b.jsonl".to_string()]);
    }

    #[test]
    fn lines_skip_blanks_and_strip_terminators() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rows.jsonl");
        fs::write(&path, "{\"a\":1}\r\n\n   \n{\"a\":2}").unwrap();

        let lines: Vec<(usize, String)> = ShardLines::open(&path)
            .unwrap()
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(
            lines,
            vec![(1, "{\"a\":1}".to_string()), (4, "{\"a\":2}".to_string())]
        );
        assert_eq!(count_rows(&path).unwrap(), 2);
    }

    #[test]
    fn shard_extension_is_case_insensitive() {
        assert_eq!(shard_extension(Path::new("x/DATA.JSONL")), Some("jsonl".to_string()));
        assert_eq!(shard_extension(Path::new("x/data.parquet")), None);
        assert_eq!(shard_extension(Path::new("x/noext")), None);
    }
}
