//! Prompt document model and its XML and JSON renderings.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

use crate::error::AggregateError;
use crate::{Error, Result};

/// Output serialization format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `<prompt>` XML document.
    #[default]
    Xml,
    /// Pretty-printed JSON object.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml => f.write_str("xml"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!("unknown output format: {other}"))),
        }
    }
}

/// One aggregated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Slash-separated path relative to the base directory.
    pub path: String,
    /// Extension without the dot; empty when there is none.
    #[serde(rename = "type")]
    pub file_type: String,
    /// Full file text.
    pub content: String,
}

/// The aggregated prompt: file records followed by instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptDocument {
    pub files: Vec<FileRecord>,
    pub instructions: String,
}

impl PromptDocument {
    /// Create an empty document carrying `instructions`.
    #[must_use]
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            files: Vec::new(),
            instructions: instructions.into(),
        }
    }

    /// Sort records by path so output does not depend on worker timing.
    pub fn sort_files(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
    }

    /// Total bytes of file content.
    #[must_use]
    pub fn content_len(&self) -> usize {
        self.files.iter().map(|f| f.content.len()).sum()
    }

    /// Render in the requested format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Xml => self.to_xml(),
            OutputFormat::Json => self.to_json(),
        }
    }

    /// Pretty-printed JSON with `files` and `instructions` keys.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| render_error(&e))
    }

    /// Indented XML with a declaration header.
    ///
    /// ```text
    /// <prompt>
    ///   <files>
    ///     <file path="src/main.rs" type="rs">
    ///       <filecontents>...</filecontents>
    ///     </file>
    ///   </files>
    ///   <instructions>...</instructions>
    /// </prompt>
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if writing an event fails.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        emit(&mut writer, Event::Start(BytesStart::new("prompt")))?;
        emit(&mut writer, Event::Start(BytesStart::new("files")))?;

        for file in &self.files {
            let path = xml_safe(&file.path);
            let file_type = xml_safe(&file.file_type);
            let start = BytesStart::new("file")
                .with_attributes([("path", path.as_ref()), ("type", file_type.as_ref())]);
            emit(&mut writer, Event::Start(start))?;
            text_element(&mut writer, "filecontents", &file.content)?;
            emit(&mut writer, Event::End(BytesEnd::new("file")))?;
        }

        emit(&mut writer, Event::End(BytesEnd::new("files")))?;
        text_element(&mut writer, "instructions", &self.instructions)?;
        emit(&mut writer, Event::End(BytesEnd::new("prompt")))?;

        String::from_utf8(writer.into_inner()).map_err(|e| render_error(&e))
    }
}

fn render_error(e: &dyn fmt::Display) -> Error {
    AggregateError::Render(e.to_string()).into()
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(|e| render_error(&e))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    // A text event, even an empty one, keeps the end tag on the same line.
    emit(writer, Event::Text(BytesText::new(&xml_safe(text))))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Replace characters XML 1.0 cannot carry with U+FFFD.
fn xml_safe(text: &str) -> Cow<'_, str> {
    let allowed = |c: char| matches!(c, '\t' | '\n' | '\r') || c >= ' ';
    if text.chars().all(allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(
            text.chars()
                .map(|c| if allowed(c) { c } else { '\u{fffd}' })
                .collect(),
        )
    }
}
