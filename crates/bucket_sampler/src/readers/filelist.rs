use crate::dataset::DataSource;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Field separator used by training file-lists.
pub const FILELIST_SEPARATOR: char = '|';

/// One line of a training file-list: the audio path followed by any number of
/// companion fields (speaker id, feature file, pitch file, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilelistEntry {
    pub audio_path: PathBuf,
    pub fields: Vec<String>,
}

impl FilelistEntry {
    /// Splits a `path|field|field` line. Surrounding whitespace of the whole
    /// line is stripped; fields are otherwise kept verbatim.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.trim().split(FILELIST_SEPARATOR);
        let audio_path = parts
            .next()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| anyhow!("Missing audio path in file-list line: {line:?}"))?;
        Ok(Self {
            audio_path: PathBuf::from(audio_path),
            fields: parts.map(str::to_string).collect(),
        })
    }
}

/// Reads `|`-separated training file-lists line by line. Skips blank lines.
///
/// # Example
/// ```ignore
/// // wavs/0001.wav|speaker_0|feats/0001.npy|pitch/0001.pt
/// let source = FilelistSource::new("filelists/train.txt");
/// for entry in source.stream()? {
///     let entry = entry?;
///     println!("{}", entry.audio_path.display());
/// }
/// ```
pub struct FilelistSource {
    path: PathBuf,
}

impl FilelistSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource<FilelistEntry> for FilelistSource {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<FilelistEntry>> + Send>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open file-list: {}", self.path.display()))?;

        let reader = BufReader::new(file);
        let iter = reader
            .lines()
            .enumerate()
            .filter_map(move |(line_num, line)| match line {
                Ok(text) if text.trim().is_empty() => None,
                Ok(text) => Some(FilelistEntry::parse(&text).with_context(|| {
                    format!("Invalid file-list entry at line {}", line_num + 1)
                })),
                Err(e) => {
                    Some(Err(e).with_context(|| format!("Error reading line {}", line_num + 1)))
                }
            });
        Ok(Box::new(iter))
    }
}
