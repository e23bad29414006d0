//! Dockerfile model.
//!
//! Minimal parser that only understands `FROM`. Everything else is kept as
//! raw lines so the file serializes back byte-for-byte; a `FROM` image can be
//! replaced by rewriting just the span of its argument token.
//!
//! Parsing runs in two steps, following buildkit:
//! - the lines are split into tokens, where each token is one logical
//!   instruction (spanning continuation lines), a comment, or an empty line;
//! - `FROM` tokens are split into words and interpreted.

use std::ops::Range;
use std::path::Path;

use a3s_lock_core::error::{LockError, Result};

use crate::oci::ImageReference;

/// Default line continuation character.
const DEFAULT_ESCAPE: char = '\\';

/// What a `FROM` instruction builds on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseImage {
    /// An external image resolved through a registry
    Image(ImageReference),
    /// A build stage declared earlier in the same file
    Stage(String),
    /// The empty `scratch` image
    Scratch,
    /// A reference that depends on build-arg expansion (`$VAR`, `${VAR}`)
    Variable(String),
}

/// One `FROM` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromInstruction {
    /// 1-based line number of the `FROM` keyword
    pub line_number: usize,
    /// Index into the document lines of the line holding the image token
    pub line: usize,
    /// Byte range of the image token within that line
    pub span: Range<usize>,
    /// Image token as currently written
    pub image: String,
    /// Interpretation of the image token
    pub base: BaseImage,
    /// Value of `--platform=`, passed through untouched
    pub platform: Option<String>,
    /// Stage alias from `AS <name>`
    pub stage_name: Option<String>,
}

impl FromInstruction {
    /// The external image reference, if this instruction has one.
    pub fn reference(&self) -> Option<&ImageReference> {
        match &self.base {
            BaseImage::Image(reference) => Some(reference),
            _ => None,
        }
    }

    /// Whether the image names an earlier build stage.
    pub fn is_stage_reference(&self) -> bool {
        matches!(self.base, BaseImage::Stage(_))
    }
}

/// Parsed Dockerfile: raw lines plus the `FROM` instructions found in them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfileDocument {
    lines: Vec<String>,
    instructions: Vec<FromInstruction>,
    stages: Vec<String>,
}

impl DockerfileDocument {
    /// Parse a Dockerfile from its text content.
    pub fn parse(content: &str) -> Result<Self> {
        let lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();
        let escape = escape_directive(&lines);

        let mut instructions = Vec::new();
        let mut stages: Vec<String> = Vec::new();

        for token in tokenize(&lines, escape) {
            let words = token_words(&lines, token.clone(), escape);
            let is_from = words
                .first()
                .map_or(false, |w| w.text.eq_ignore_ascii_case("FROM"));
            if !is_from {
                continue;
            }

            let instruction = parse_from(&words, token.start + 1, &stages)?;
            if let Some(name) = &instruction.stage_name {
                stages.push(name.clone());
            }
            instructions.push(instruction);
        }

        Ok(Self {
            lines,
            instructions,
            stages,
        })
    }

    /// Parse a Dockerfile from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::IoError(format!("Failed to read Dockerfile at {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Raw lines, each with its original line ending.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// `FROM` instructions in document order.
    pub fn instructions(&self) -> &[FromInstruction] {
        &self.instructions
    }

    /// Stage names in declaration order.
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Replace the image of instruction `index`, rewriting only its token.
    pub fn replace_reference(&mut self, index: usize, reference: ImageReference) -> Result<()> {
        let instruction = self.instructions.get_mut(index).ok_or_else(|| {
            LockError::ParseError(format!("No FROM instruction at index {}", index))
        })?;
        if instruction.reference().is_none() {
            return Err(LockError::ParseError(format!(
                "Line {}: '{}' is not an external image",
                instruction.line_number, instruction.image
            )));
        }

        let text = reference.to_string();
        let line = &mut self.lines[instruction.line];
        line.replace_range(instruction.span.clone(), &text);

        instruction.span = instruction.span.start..instruction.span.start + text.len();
        instruction.image = text;
        instruction.base = BaseImage::Image(reference);
        Ok(())
    }
}

impl std::fmt::Display for DockerfileDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// A whitespace-separated word of an instruction, located in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Word<'a> {
    line: usize,
    span: Range<usize>,
    text: &'a str,
}

/// Return whether the given line is a comment or blank.
///
/// Blank lines behave like comments (e.g. they continue an instruction).
fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Whether a (non-comment) line ends with the continuation character.
fn continues(line: &str, escape: char) -> bool {
    line.trim_end().ends_with(escape)
}

/// Read the `# escape=` parser directive from the top of the file.
fn escape_directive(lines: &[String]) -> char {
    for line in lines {
        let Some(body) = line.trim().strip_prefix('#') else {
            break;
        };
        let Some((key, value)) = body.split_once('=') else {
            break;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            break;
        }
        if key.eq_ignore_ascii_case("escape") {
            return match value.trim() {
                "`" => '`',
                _ => DEFAULT_ESCAPE,
            };
        }
    }
    DEFAULT_ESCAPE
}

/// Split lines into tokens (ranges of line indices).
///
/// Each token is one instruction, comment, or empty line. Comments and empty
/// lines inside a continued instruction belong to that instruction.
fn tokenize(lines: &[String], escape: char) -> Vec<Range<usize>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        let complete = if is_comment_or_blank(line) {
            start.is_none()
        } else {
            !continues(line, escape)
        };
        let token_start = *start.get_or_insert(i);
        if complete {
            tokens.push(token_start..i + 1);
            start = None;
        }
    }

    // Continuation at the last line
    if let Some(token_start) = start {
        tokens.push(token_start..lines.len());
    }

    tokens
}

/// Words of an instruction token with their positions.
///
/// Skips embedded comments and blank lines, drops continuation characters,
/// and stops a line at a word starting with `#`.
fn token_words(lines: &[String], token: Range<usize>, escape: char) -> Vec<Word<'_>> {
    let mut words = Vec::new();

    for index in token {
        let line = lines[index].as_str();
        if is_comment_or_blank(line) {
            continue;
        }

        let mut content = line.trim_end_matches(&['\n', '\r'][..]);
        if continues(content, escape) {
            let trimmed = content.trim_end();
            content = &trimmed[..trimmed.len() - escape.len_utf8()];
        }

        let mut start: Option<usize> = None;
        let mut line_words = Vec::new();
        for (pos, c) in content.char_indices() {
            match (c.is_whitespace(), start) {
                (true, Some(s)) => {
                    line_words.push(s..pos);
                    start = None;
                }
                (false, None) => start = Some(pos),
                _ => {}
            }
        }
        if let Some(s) = start {
            line_words.push(s..content.len());
        }

        for span in line_words {
            let text = &content[span.clone()];
            if text.starts_with('#') && !words.is_empty() {
                break;
            }
            words.push(Word {
                line: index,
                span,
                text,
            });
        }
    }

    words
}

fn dockerfile_error(line_number: usize, message: impl Into<String>) -> LockError {
    LockError::DockerfileError {
        line: line_number,
        message: message.into(),
    }
}

/// Interpret the words of a `FROM` token.
///
/// `FROM [--platform=<platform>] <image> [AS <name>]`
fn parse_from(words: &[Word<'_>], line_number: usize, stages: &[String]) -> Result<FromInstruction> {
    let mut rest = &words[1..];

    let mut platform = None;
    while let Some(flag) = rest.first().filter(|w| w.text.starts_with("--")) {
        match flag.text.strip_prefix("--platform=") {
            Some(value) => platform = Some(value.to_string()),
            None => {
                return Err(dockerfile_error(
                    line_number,
                    format!("FROM with an unknown flag: {}", flag.text),
                ))
            }
        }
        rest = &rest[1..];
    }

    let Some((image, rest)) = rest.split_first() else {
        return Err(dockerfile_error(line_number, "FROM with too few arguments"));
    };

    let (stage_name, rest) = match rest {
        [keyword, name, tail @ ..] if keyword.text.eq_ignore_ascii_case("AS") => {
            (Some(name.text.to_string()), tail)
        }
        _ => (None, rest),
    };
    if !rest.is_empty() {
        return Err(dockerfile_error(line_number, "FROM with too many arguments"));
    }

    let base = classify_base(image.text, stages).map_err(|e| {
        dockerfile_error(
            line_number,
            format!("Invalid image reference '{}': {}", image.text, e),
        )
    })?;

    Ok(FromInstruction {
        line_number,
        line: image.line,
        span: image.span.clone(),
        image: image.text.to_string(),
        base,
        platform,
        stage_name,
    })
}

fn classify_base(image: &str, stages: &[String]) -> Result<BaseImage> {
    if image.contains('$') {
        return Ok(BaseImage::Variable(image.to_string()));
    }
    // Stage names are matched case-insensitively, as Docker does
    if let Some(stage) = stages.iter().find(|s| s.eq_ignore_ascii_case(image)) {
        return Ok(BaseImage::Stage(stage.clone()));
    }
    if image.eq_ignore_ascii_case("scratch") {
        return Ok(BaseImage::Scratch);
    }
    ImageReference::parse(image).map(BaseImage::Image)
}
