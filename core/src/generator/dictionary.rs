use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::debug;

use super::CandidateGenerator;
use crate::{
    candidate::{Candidate, GeneratorKind, Word},
    error::{CrackError, CrackResult},
};

/// A list of words shared by every phase of a session.
pub type Wordlist = Arc<[Word]>;

const VERBATIM: &str = "verbatim";

/// Where the words of a dictionary come from.
#[derive(Clone, Debug)]
pub enum WordSource {
    /// Words already in memory, for instance a list supplied by an external guess provider.
    Memory(Wordlist),
    /// A file with one word per line, streamed lazily.
    File(PathBuf),
}

impl WordSource {
    /// Returns the words of this source, reading the whole file if needed.
    pub fn load(&self) -> CrackResult<Wordlist> {
        match self {
            Self::Memory(words) => Ok(words.clone()),
            Self::File(path) => load_wordlist(path),
        }
    }
}

/// Reads a wordlist file: one word per line, empty lines are skipped.
pub fn load_wordlist(path: &Path) -> CrackResult<Wordlist> {
    let reader = BufReader::new(File::open(path)?);
    let mut words = Vec::new();

    for line in reader.lines() {
        if let Some(word) = clean_line(&line?) {
            words.push(Word::from(word));
        }
    }

    debug!(path = %path.display(), words = words.len(), "loaded wordlist");
    Ok(words.into())
}

#[inline]
fn clean_line(line: &str) -> Option<&str> {
    let word = line.strip_suffix('\r').unwrap_or(line);
    (!word.is_empty()).then_some(word)
}

enum Cursor {
    Memory {
        words: Wordlist,
        position: usize,
    },
    File {
        path: PathBuf,
        lines: Option<std::io::Lines<BufReader<File>>>,
        done: bool,
        /// A read failure met after some words of the batch were already yielded.
        pending: Option<CrackError>,
    },
}

/// Yields wordlist entries verbatim, in insertion order.
pub struct DictionaryGenerator {
    cursor: Cursor,
    pattern: Word,
}

impl DictionaryGenerator {
    /// Creates a dictionary over words held in memory.
    pub fn new(words: Wordlist) -> Self {
        Self {
            cursor: Cursor::Memory { words, position: 0 },
            pattern: Word::from(VERBATIM),
        }
    }

    /// Creates a dictionary streaming a file.
    /// The file is opened right away so a missing file is reported before any phase starts.
    pub fn from_file(path: &Path) -> CrackResult<Self> {
        let lines = BufReader::new(File::open(path)?).lines();

        Ok(Self {
            cursor: Cursor::File {
                path: path.to_owned(),
                lines: Some(lines),
                done: false,
                pending: None,
            },
            pattern: Word::from(VERBATIM),
        })
    }

    pub fn from_source(source: &WordSource) -> CrackResult<Self> {
        match source {
            WordSource::Memory(words) => Ok(Self::new(words.clone())),
            WordSource::File(path) => Self::from_file(path),
        }
    }

    fn fault(message: String) -> CrackError {
        CrackError::PhaseGenerator {
            phase: GeneratorKind::Dictionary.name(),
            message,
        }
    }
}

impl CandidateGenerator for DictionaryGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Dictionary
    }

    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize> {
        let kind = self.kind();

        match &mut self.cursor {
            Cursor::Memory { words, position } => {
                let end = position.saturating_add(max).min(words.len());
                out.extend(
                    words[*position..end]
                        .iter()
                        .map(|word| Candidate::new(word.to_string(), kind, &self.pattern)),
                );
                let count = end - *position;
                *position = end;

                Ok(count)
            }

            Cursor::File {
                path,
                lines,
                done,
                pending,
            } => {
                if let Some(err) = pending.take() {
                    return Err(err);
                }

                let Some(lines) = lines.as_mut() else {
                    return Ok(0);
                };

                let mut count = 0;
                while count < max {
                    match lines.next() {
                        None => {
                            *done = true;
                            break;
                        }
                        Some(Err(err)) => {
                            let err = Self::fault(format!("unable to read {}: {err}", path.display()));
                            // the words before the failure are still tested, in order
                            if count == 0 {
                                return Err(err);
                            }
                            *pending = Some(err);
                            break;
                        }
                        Some(Ok(line)) => {
                            if let Some(word) = clean_line(&line) {
                                out.push(Candidate::new(word.to_owned(), kind, &self.pattern));
                                count += 1;
                            }
                        }
                    }
                }

                Ok(count)
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        match &self.cursor {
            Cursor::Memory { words, position } => *position >= words.len(),
            Cursor::File { done, .. } => *done,
        }
    }

    fn reset(&mut self) -> CrackResult<()> {
        match &mut self.cursor {
            Cursor::Memory { position, .. } => *position = 0,
            Cursor::File {
                path,
                lines,
                done,
                pending,
            } => {
                *lines = Some(BufReader::new(File::open(&*path)?).lines());
                *done = false;
                *pending = None;
            }
        }

        Ok(())
    }
}
