use super::ParseError;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Characters that always form a word of their own
const DELIMITERS: &[char] = &['@', '{', '}', '(', ')', ',', ';', ':'];

/// Delimiters that still split words read as file names
///
/// File names keep `@`, `{`, `}`, and `:` (Windows drive letters) as
/// ordinary characters.
const FILE_NAME_DELIMITERS: &[char] = &['(', ')', ',', ';'];

/// Comment marker, recognized at the start of a line after leading whitespace
const COMMENT_CHAR: char = '#';

/// An abstract sequence of lines feeding a [`WordSource`]
///
/// One implementation per place configuration text comes from: an argument
/// vector (one line per argument) or a file (one line per physical line).
pub trait LineSource {
    /// The next line, or `None` at end of input
    fn next_line(&mut self) -> Result<Option<String>, ParseError>;

    /// Human-readable position of the line most recently returned
    fn location(&self) -> String;
}

/// Line source over an argument vector, one line per argument
pub struct ArgumentSource {
    arguments: std::vec::IntoIter<String>,
    description: String,
    index: usize,
}

impl ArgumentSource {
    pub fn new(arguments: Vec<String>, description: impl Into<String>) -> ArgumentSource {
        ArgumentSource {
            arguments: arguments.into_iter(),
            description: description.into(),
            index: 0,
        }
    }
}

impl LineSource for ArgumentSource {
    fn next_line(&mut self) -> Result<Option<String>, ParseError> {
        let line = self.arguments.next();
        if line.is_some() {
            self.index += 1;
        }
        Ok(line)
    }

    fn location(&self) -> String {
        format!("argument number {} {}", self.index, self.description)
    }
}

/// Line source over a configuration file, one line per physical line
pub struct FileSource {
    reader: BufReader<File>,
    path: PathBuf,
    line_number: usize,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<FileSource, ParseError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| {
            ParseError::without_location(format!(
                "Can't open configuration file '{}': {}",
                path.display(),
                err
            ))
        })?;
        Ok(FileSource {
            reader: BufReader::new(file),
            path,
            line_number: 0,
        })
    }
}

impl LineSource for FileSource {
    fn next_line(&mut self) -> Result<Option<String>, ParseError> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn location(&self) -> String {
        format!("line {} of file '{}'", self.line_number, self.path.display())
    }
}

/// One active source in the include stack
struct Frame {
    lines: Box<dyn LineSource>,
    base_directory: PathBuf,
    /// Canonical path when the frame reads a file; used to reject include
    /// cycles
    file_path: Option<PathBuf>,
    current_line: Vec<char>,
    position: usize,
}

impl Frame {
    fn at_end_of_line(&self) -> bool {
        self.position >= self.current_line.len()
    }
}

/// Canonical form for include-identity checks; a path that cannot be
/// resolved compares as written
fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Pull-based tokenizer over a stack of line sources
///
/// Words are split on whitespace and the fixed delimiter set; double-quoted
/// spans become a single word with the quotes removed; comment lines are
/// accumulated rather than emitted. Including another source pushes it on the
/// stack, and exhausted includes pop off automatically, so callers just keep
/// calling [`Self::next_word`].
pub struct WordSource {
    /// Innermost active source last; never empty until the source is closed
    stack: Vec<Frame>,
    comments: Option<String>,
    variables: HashMap<String, String>,
}

impl WordSource {
    pub fn new(lines: Box<dyn LineSource>, base_directory: PathBuf) -> WordSource {
        WordSource {
            stack: vec![Frame {
                lines,
                base_directory,
                file_path: None,
                current_line: vec![],
                position: 0,
            }],
            comments: None,
            variables: std::env::vars().collect(),
        }
    }

    pub fn from_arguments(arguments: Vec<String>, description: impl Into<String>) -> WordSource {
        WordSource::new(
            Box::new(ArgumentSource::new(arguments, description)),
            PathBuf::new(),
        )
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<WordSource, ParseError> {
        let path = path.as_ref();
        let base_directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut source = WordSource::new(Box::new(FileSource::open(path)?), base_directory);
        if let Some(frame) = source.stack.last_mut() {
            frame.file_path = Some(canonical_or_self(path));
        }
        Ok(source)
    }

    /// Override a `<variable>` binding (defaults come from the environment)
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Push an included source; subsequent words come from it until it is
    /// exhausted
    pub fn include(&mut self, mut other: WordSource) {
        // Include chains flatten into one stack, innermost last
        self.stack.append(&mut other.stack);
    }

    /// Open `path` (resolved against the current base directory) and include
    /// it
    pub fn include_file(&mut self, path: impl AsRef<Path>) -> Result<(), ParseError> {
        let path = self.resolve_path(path.as_ref());
        let canonical = canonical_or_self(&path);
        if self
            .stack
            .iter()
            .any(|frame| frame.file_path.as_deref() == Some(canonical.as_path()))
        {
            return Err(ParseError::new(
                format!("Circular include of file '{}'", path.display()),
                self.current_location_description(),
            ));
        }
        let base_directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.stack.push(Frame {
            lines: Box::new(FileSource::open(&path)?),
            base_directory,
            file_path: Some(canonical),
            current_line: vec![],
            position: 0,
        });
        Ok(())
    }

    /// Resolve a possibly-relative path against the innermost base directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            match self.stack.last() {
                Some(frame) if !frame.base_directory.as_os_str().is_empty() => {
                    frame.base_directory.join(path)
                }
                _ => path.to_path_buf(),
            }
        }
    }

    /// Change the base directory of the innermost active source
    pub fn set_base_directory(&mut self, directory: PathBuf) {
        if let Some(frame) = self.stack.last_mut() {
            frame.base_directory = directory;
        }
    }

    pub fn base_directory(&self) -> Option<&Path> {
        self.stack.last().map(|frame| frame.base_directory.as_path())
    }

    /// Comment text accumulated since the last call, joined with newlines
    pub fn last_comments(&mut self) -> Option<String> {
        self.comments.take()
    }

    /// Human-readable position, composing the include chain outer-to-inner
    pub fn current_location_description(&self) -> String {
        let mut description = String::new();
        for frame in self.stack.iter().rev() {
            if !description.is_empty() {
                description.push_str(", included from ");
            }
            description.push_str(&frame.lines.location());
        }
        if description.is_empty() {
            description.push_str("end of input");
        }
        description
    }

    /// The next word, or `None` at end of input
    ///
    /// `treat_as_file_name` relaxes the delimiter set so paths survive as one
    /// word; `expand_variables` substitutes `<name>` spans from the variable
    /// table.
    pub fn next_word(
        &mut self,
        treat_as_file_name: bool,
        expand_variables: bool,
    ) -> Result<Option<String>, ParseError> {
        loop {
            let frame = match self.stack.last_mut() {
                Some(frame) => frame,
                None => return Ok(None),
            };

            // Refill the line buffer when the current line is used up
            if frame.at_end_of_line() {
                match frame.lines.next_line()? {
                    Some(line) => {
                        let trimmed = line.trim_start();
                        if let Some(comment) = trimmed.strip_prefix(COMMENT_CHAR) {
                            let comments = self.comments.get_or_insert_with(String::new);
                            if !comments.is_empty() {
                                comments.push('\n');
                            }
                            comments.push_str(comment);
                            continue;
                        }
                        frame.current_line = line.chars().collect();
                        frame.position = 0;
                        continue;
                    }
                    None => {
                        // Exhausted includes pop off; their file handle drops here
                        self.stack.pop();
                        continue;
                    }
                }
            }

            // Skip whitespace inside the line
            while let Some(c) = frame.current_line.get(frame.position) {
                if c.is_whitespace() {
                    frame.position += 1;
                } else {
                    break;
                }
            }
            if frame.at_end_of_line() {
                continue;
            }

            let word = Self::read_word_from_line(frame, treat_as_file_name)?;
            let word = if expand_variables {
                self.expand_variables(&word)?
            } else {
                word
            };
            return Ok(Some(word));
        }
    }

    fn read_word_from_line(frame: &mut Frame, treat_as_file_name: bool) -> Result<String, ParseError> {
        let delimiters: &[char] = if treat_as_file_name {
            FILE_NAME_DELIMITERS
        } else {
            DELIMITERS
        };
        let line = &frame.current_line;
        let start = frame.position;
        let first = line[start];

        // Quoted span: everything up to the closing quote, quotes stripped
        if first == '"' {
            let mut word = String::new();
            let mut position = start + 1;
            loop {
                match line.get(position) {
                    Some('"') => {
                        frame.position = position + 1;
                        return Ok(word);
                    }
                    Some(c) => {
                        word.push(*c);
                        position += 1;
                    }
                    None => {
                        return Err(ParseError::new(
                            "Missing closing quote for quoted word",
                            frame.lines.location(),
                        ));
                    }
                }
            }
        }

        // Delimiters are atomic
        if delimiters.contains(&first) {
            frame.position = start + 1;
            return Ok(first.to_string());
        }

        let mut end = start;
        while let Some(c) = line.get(end) {
            if c.is_whitespace() || delimiters.contains(c) || *c == '"' {
                break;
            }
            end += 1;
        }
        frame.position = end;
        Ok(line[start..end].iter().collect())
    }

    /// Substitute `<name>` spans against the variable table
    fn expand_variables(&self, word: &str) -> Result<String, ParseError> {
        if !word.contains('<') {
            return Ok(word.to_string());
        }
        let mut expanded = String::new();
        let mut rest = word;
        while let Some(open) = rest.find('<') {
            expanded.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];
            match after_open.find('>') {
                Some(close) => {
                    let name = &after_open[..close];
                    let value = if name == "base" {
                        self.base_directory()
                            .map(|dir| dir.display().to_string())
                    } else {
                        self.variables.get(name).cloned()
                    };
                    match value {
                        Some(value) => expanded.push_str(&value),
                        None => {
                            return Err(ParseError::new(
                                format!("Undefined variable '<{}>'", name),
                                self.current_location_description(),
                            ));
                        }
                    }
                    rest = &after_open[close + 1..];
                }
                None => {
                    // Un-closed '<' is ordinary text (generic signatures etc.)
                    expanded.push_str(&rest[open..]);
                    return Ok(expanded);
                }
            }
        }
        expanded.push_str(rest);
        Ok(expanded)
    }

    /// Release every open source, innermost first
    ///
    /// Dropping has the same effect; this exists so callers can close on the
    /// happy path explicitly.
    pub fn close(&mut self) {
        while self.stack.pop().is_some() {}
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args_source(lines: &[&str]) -> WordSource {
        let mut source = WordSource::from_arguments(
            lines.iter().map(|s| s.to_string()).collect(),
            "in test",
        );
        source.variables.clear();
        source
    }

    fn all_words(source: &mut WordSource) -> Vec<String> {
        let mut words = vec![];
        while let Some(word) = source.next_word(false, false).unwrap() {
            words.push(word);
        }
        words
    }

    #[test]
    fn whitespace_separated_words_round_trip() {
        let mut source = args_source(&["alpha beta", "gamma  delta"]);
        let words = all_words(&mut source);
        assert_eq!(words, vec!["alpha", "beta", "gamma", "delta"]);

        // Re-tokenizing the joined words reproduces the sequence
        let mut again = args_source(&[&words.join(" ")]);
        assert_eq!(all_words(&mut again), words);
    }

    #[test]
    fn delimiters_are_atomic() {
        let mut source = args_source(&["a,b;c"]);
        assert_eq!(all_words(&mut source), vec!["a", ",", "b", ";", "c"]);
    }

    #[test]
    fn quoted_words_preserve_whitespace() {
        let mut source = args_source(&["\"a b c\""]);
        assert_eq!(all_words(&mut source), vec!["a b c"]);

        let mut source = args_source(&["\"a b c\" next"]);
        assert_eq!(all_words(&mut source), vec!["a b c", "next"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let mut source = args_source(&["\"never closed"]);
        let err = source.next_word(false, false).unwrap_err();
        assert!(err.message.contains("closing quote"));
        assert!(err.location.is_some());
    }

    #[test]
    fn comment_lines_accumulate() {
        let mut source = args_source(&["# first", "  # second", "word"]);
        assert_eq!(source.next_word(false, false).unwrap().unwrap(), "word");
        assert_eq!(source.last_comments().unwrap(), " first\n second");
        assert!(source.last_comments().is_none());
    }

    #[test]
    fn include_drains_before_outer_source() {
        let mut main = args_source(&["outer"]);
        let included = args_source(&["first", "second"]);
        main.include(included);

        assert_eq!(main.next_word(false, false).unwrap().unwrap(), "first");
        assert_eq!(main.next_word(false, false).unwrap().unwrap(), "second");
        assert_eq!(main.next_word(false, false).unwrap().unwrap(), "outer");
        assert_eq!(main.next_word(false, false).unwrap(), None);
        main.close();
    }

    #[test]
    fn location_is_monotonic() {
        let mut source = args_source(&["a b", "c"]);
        let mut last_index = 0;
        while source.next_word(false, false).unwrap().is_some() {
            let description = source.current_location_description();
            let index: usize = description
                .split_whitespace()
                .nth(2)
                .and_then(|n| n.parse().ok())
                .unwrap();
            assert!(index >= last_index);
            last_index = index;
        }
    }

    #[test]
    fn file_name_words_keep_colons() {
        let mut source = args_source(&["C:\\path\\to\\file.pro;next"]);
        assert_eq!(
            source.next_word(true, false).unwrap().unwrap(),
            "C:\\path\\to\\file.pro"
        );
        assert_eq!(source.next_word(true, false).unwrap().unwrap(), ";");
    }

    #[test]
    fn variable_expansion() {
        let mut source = args_source(&["<prefix>/classes"]);
        source.set_variable("prefix", "/opt/app");
        assert_eq!(
            source.next_word(false, true).unwrap().unwrap(),
            "/opt/app/classes"
        );

        let mut source = args_source(&["<undefined_variable_xyz>"]);
        assert!(source.next_word(false, true).is_err());
    }

    #[test]
    fn unclosed_angle_bracket_is_plain_text() {
        let mut source = args_source(&["a<b"]);
        assert_eq!(source.next_word(false, true).unwrap().unwrap(), "a<b");
    }

    #[test]
    fn self_include_is_rejected() {
        let path = std::env::temp_dir().join("word_source_self_include.pro");
        std::fs::write(&path, "-include word_source_self_include.pro\n").unwrap();

        let mut source = WordSource::from_file(&path).unwrap();
        let err = source.include_file(&path).unwrap_err();
        assert!(err.message.contains("Circular include"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn include_cycle_through_another_file_is_rejected() {
        let directory = std::env::temp_dir();
        let outer = directory.join("word_source_cycle_outer.pro");
        let inner = directory.join("word_source_cycle_inner.pro");
        std::fs::write(&outer, "-include word_source_cycle_inner.pro\n").unwrap();
        std::fs::write(&inner, "-include word_source_cycle_outer.pro\n").unwrap();

        let mut source = WordSource::from_file(&outer).unwrap();
        source.include_file(&inner).unwrap();
        let err = source.include_file(&outer).unwrap_err();
        assert!(err.message.contains("Circular include"));

        std::fs::remove_file(&outer).ok();
        std::fs::remove_file(&inner).ok();
    }
}
