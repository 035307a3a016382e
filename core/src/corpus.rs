use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// A crawled page before any processing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDocument {
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self { url: url.into(), content: content.into(), encoding: None }
    }
}

/// Every `*.json` / `*.jsonl` file below `input`, in sorted path order.
pub fn corpus_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

/// Lazily streams documents from a corpus directory. Unreadable files and
/// malformed records are logged and skipped; at most one reader buffer is
/// held per file.
pub fn read_corpus(input: &Path) -> impl Iterator<Item = RawDocument> {
    corpus_files(input).into_iter().flat_map(|file| read_file(&file))
}

type Records = Box<dyn Iterator<Item = RawDocument>>;

fn read_file(file: &Path) -> Records {
    let mut reader = match File::open(file) {
        Ok(f) => BufReader::new(f),
        Err(err) => {
            warn!(path = %file.display(), %err, "skipping unreadable corpus file");
            return Box::new(std::iter::empty());
        }
    };
    let path = file.to_path_buf();

    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        return Box::new(json_lines(reader, path));
    }
    match skip_separators(&mut reader) {
        Ok(Some(b'[')) => {
            reader.consume(1);
            Box::new(ArrayRecords { reader, path, record: 0, done: false })
        }
        Ok(_) => Box::new(object_stream(reader, path)),
        Err(err) => {
            warn!(path = %path.display(), %err, "skipping unreadable corpus file");
            Box::new(std::iter::empty())
        }
    }
}

/// One record per line. Invalid UTF-8 is replaced rather than ending the file.
fn json_lines(reader: BufReader<File>, path: PathBuf) -> impl Iterator<Item = RawDocument> {
    let read_path = path.clone();
    reader
        .split(b'\n')
        .enumerate()
        .map_while(move |(lineno, line)| match line {
            Ok(bytes) => Some((lineno + 1, bytes)),
            Err(err) => {
                warn!(path = %read_path.display(), line = lineno + 1, %err, "stopped reading corpus file");
                None
            }
        })
        .filter_map(move |(lineno, bytes)| parse_line(&path, lineno, &bytes))
}

fn parse_line(path: &Path, lineno: usize, bytes: &[u8]) -> Option<RawDocument> {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(err) => {
            warn!(path = %path.display(), line = lineno, %err, "replacing invalid utf-8 in record");
            String::from_utf8_lossy(bytes)
        }
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<RawDocument>(text) {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!(path = %path.display(), line = lineno, %err, "skipping malformed record");
            None
        }
    }
}

/// A single object, or several concatenated ones. A syntax error ends the file.
fn object_stream(reader: BufReader<File>, path: PathBuf) -> impl Iterator<Item = RawDocument> {
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<Value>()
        .enumerate()
        .map_while(move |(record, value)| match value {
            Ok(value) => Some(to_document(&path, record + 1, value)),
            Err(err) => {
                warn!(path = %path.display(), record = record + 1, %err, "skipping malformed document");
                None
            }
        })
        .flatten()
}

fn to_document(path: &Path, record: usize, value: Value) -> Option<RawDocument> {
    match serde_json::from_value(value) {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!(path = %path.display(), record, %err, "skipping malformed record");
            None
        }
    }
}

/// Elements of a top-level JSON array, parsed one at a time.
struct ArrayRecords<R> {
    reader: R,
    path: PathBuf,
    record: usize,
    done: bool,
}

impl<R: BufRead> Iterator for ArrayRecords<R> {
    type Item = RawDocument;

    fn next(&mut self) -> Option<RawDocument> {
        while !self.done {
            match skip_separators(&mut self.reader) {
                Ok(Some(b']')) | Ok(None) => {
                    self.done = true;
                    return None;
                }
                Ok(Some(_)) => {}
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "stopped reading corpus file");
                    self.done = true;
                    return None;
                }
            }
            self.record += 1;
            let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
            let value = match Value::deserialize(&mut de) {
                Ok(value) => value,
                Err(err) => {
                    warn!(path = %self.path.display(), record = self.record, %err, "skipping rest of malformed array");
                    self.done = true;
                    return None;
                }
            };
            if let Some(doc) = to_document(&self.path, self.record, value) {
                return Some(doc);
            }
        }
        None
    }
}

/// Consumes whitespace and commas, returning the next byte without consuming it.
fn skip_separators<R: BufRead>(reader: &mut R) -> std::io::Result<Option<u8>> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        match buf.iter().position(|b| !(b.is_ascii_whitespace() || *b == b',')) {
            Some(pos) => {
                let next = buf[pos];
                reader.consume(pos);
                return Ok(Some(next));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}
