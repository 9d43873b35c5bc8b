use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{ChunkingSettings, DocumentSettings};
use crate::error::{Error, Result};
use crate::traits::{DocumentSource, TextSplitter};
use crate::types::{Document, DocumentChunk};

/// Loads every non-hidden regular file below a root directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLoader {
    extensions: Vec<String>,
}

impl DirectoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict loading to the given extensions (without the dot, case-insensitive).
    pub fn with_extensions(extensions: &[String]) -> Self {
        Self { extensions: extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect() }
    }

    pub fn from_settings(settings: &DocumentSettings) -> Self {
        Self::with_extensions(&settings.extensions)
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = walkdir::WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
        for entry in walker {
            let entry = entry
                .map_err(|e| Error::Load { path: e.path().unwrap_or(root).to_path_buf(), reason: e.to_string() })?;
            if entry.file_type().is_file() && self.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

impl DocumentSource for DirectoryLoader {
    fn list_documents(&self, root: &Path) -> Result<Vec<Document>> {
        if !root.is_dir() {
            return Err(Error::Load { path: root.to_path_buf(), reason: "not a readable directory".to_string() });
        }
        let files = self.list_files(root)?;
        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let text = read_file_content(&path)?;
            let doc_id = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            debug!(doc_id = %doc_id, bytes = text.len(), "loaded document");
            documents.push(Document { source: path.to_string_lossy().to_string(), doc_id, text });
        }
        Ok(documents)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

fn read_file_content(file_path: &Path) -> Result<String> {
    let bytes = fs::read(file_path)
        .map_err(|e| Error::Load { path: file_path.to_path_buf(), reason: e.to_string() })?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive separator splitter: try paragraph breaks first, then lines,
/// then words, then single characters, merging pieces back up to
/// `chunk_size` characters with `chunk_overlap` characters carried over.
#[derive(Debug, Clone)]
pub struct RecursiveTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text`, which starts at byte `base` of the document, into
    /// trimmed chunks tagged with their document offsets.
    fn split_recursive(&self, text: &str, base: usize, separators: &[String]) -> Vec<(usize, String)> {
        let mut separator = "";
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good: Vec<(usize, &str)> = Vec::new();
        for (rel, piece) in split_keeping_separator(text, separator) {
            let offset = base + rel;
            if char_len(piece) < self.chunk_size {
                good.push((offset, piece));
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                push_trimmed(&mut chunks, offset, piece);
            } else {
                chunks.extend(self.split_recursive(piece, offset, remaining));
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }
        chunks
    }

    /// Greedily join adjacent pieces into windows of at most `chunk_size`
    /// characters, keeping a tail of at most `chunk_overlap` characters when
    /// starting the next window. Pieces must be contiguous in the document.
    fn merge(&self, pieces: &[(usize, &str)]) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        let mut window: VecDeque<(usize, &str)> = VecDeque::new();
        let mut total = 0usize;
        for &(offset, piece) in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_window(&mut out, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, front)) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back((offset, piece));
            total += len;
        }
        push_window(&mut out, &window);
        out
    }
}

impl TextSplitter for RecursiveTextSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        self.split_with_offsets(text).into_iter().map(|(_, chunk)| chunk).collect()
    }

    fn split_with_offsets(&self, text: &str) -> Vec<(usize, String)> {
        self.split_recursive(text, 0, &self.separators)
    }
}

fn push_window(out: &mut Vec<(usize, String)>, window: &VecDeque<(usize, &str)>) {
    if let Some(&(start, _)) = window.front() {
        let joined: String = window.iter().map(|(_, piece)| *piece).collect();
        push_trimmed(out, start, &joined);
    }
}

/// Push `text` (found at byte `offset`) with surrounding whitespace removed,
/// moving the offset past the leading part. Blank text is dropped.
fn push_trimmed(out: &mut Vec<(usize, String)>, offset: usize, text: &str) {
    let without_lead = text.trim_start();
    let trimmed = without_lead.trim_end();
    if !trimmed.is_empty() {
        out.push((offset + text.len() - without_lead.len(), trimmed.to_string()));
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` on `separator`, attaching each separator to the start of the
/// piece that follows it so that concatenating the pieces restores `text`.
/// Each piece comes with its byte offset in `text`. An empty separator splits
/// into single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<(usize, &'a str)> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| (i, &text[i..i + c.len_utf8()])).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push((start, &text[start..idx]));
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push((start, &text[start..]));
    }
    pieces
}

/// Loads a directory and splits every document into chunks with provenance.
pub struct DataProcessor<S = DirectoryLoader, T = RecursiveTextSplitter> {
    source: S,
    splitter: T,
}

impl DataProcessor {
    pub fn new(chunking: &ChunkingSettings) -> Result<Self> {
        Ok(Self { source: DirectoryLoader::new(), splitter: RecursiveTextSplitter::from_settings(chunking)? })
    }
}

impl<S: DocumentSource, T: TextSplitter> DataProcessor<S, T> {
    pub fn with_parts(source: S, splitter: T) -> Self {
        Self { source, splitter }
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<DocumentChunk>> {
        let documents = self.source.list_documents(data_dir)?;
        if documents.is_empty() {
            info!(dir = %data_dir.display(), "no documents found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for document in &documents {
            all_chunks.extend(self.chunk_document(document));
        }
        info!(files = documents.len(), chunks = all_chunks.len(), "processed document directory");
        Ok(all_chunks)
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<DocumentChunk> {
        let pieces = self.splitter.split_with_offsets(&document.text);
        let total_chunks = pieces.len();
        let mut chunks = Vec::with_capacity(total_chunks);
        for (chunk_index, (start_offset, content)) in pieces.into_iter().enumerate() {
            chunks.push(DocumentChunk {
                id: format!("{}#{}", document.doc_id, chunk_index),
                doc_id: document.doc_id.clone(),
                source: document.source.clone(),
                content,
                start_offset,
                chunk_index,
                total_chunks,
            });
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_stays_with_following_piece() {
        let pieces = split_keeping_separator("a b  c", " ");
        assert_eq!(pieces, vec![(0, "a"), (1, " b"), (3, " "), (4, " c")]);
        assert_eq!(pieces.iter().map(|(_, p)| *p).collect::<String>(), "a b  c");
    }

    #[test]
    fn empty_separator_splits_characters() {
        assert_eq!(split_keeping_separator("héj", ""), vec![(0, "h"), (1, "é"), (3, "j")]);
    }

    #[test]
    fn merge_respects_size_and_overlap() {
        let splitter = RecursiveTextSplitter::new(10, 4).expect("splitter");
        let merged = splitter.merge(&[(0, "aaa"), (3, " bbb"), (7, " ccc"), (11, " ddd")]);
        assert_eq!(
            merged,
            vec![(0, "aaa bbb".to_string()), (4, "bbb ccc".to_string()), (8, "ccc ddd".to_string())]
        );
    }
}
