//! Structured identity of one manpage, derived from its place in the tree.
//!
//! The serving tree is laid out as
//! `<root>/<suite>/<package>/<name>.<section>[.<lang>].gz`, and the rendered
//! page lives next to the source as `...html.gz`. The suite plays the role of
//! the version axis: the same binary package in two suites yields two
//! variants of every document it ships.

use std::fmt;
use std::path::{Component, Path};

use crate::error::{RenderError, Result};

/// Suffix of compressed manpage sources.
pub const SOURCE_SUFFIX: &str = ".gz";

/// Suffix of rendered, compressed HTML pages.
pub const HTML_SUFFIX: &str = ".html.gz";

/// One manpage variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document {
    pub suite: String,
    pub package: String,
    pub name: String,
    pub section: String,
    pub language: Option<String>,
}

impl Document {
    /// Parse the document identity from a full path below `root`.
    pub fn from_serving_path(root: &Path, path: &Path) -> Result<Self> {
        let invalid = |reason: &str| RenderError::InvalidServingPath {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let relative = path
            .strip_prefix(root)
            .map_err(|_| invalid("not below the serving directory"))?;

        let mut parts = Vec::with_capacity(3);
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(
                    part.to_str()
                        .ok_or_else(|| invalid("path is not valid UTF-8"))?,
                ),
                _ => return Err(invalid("unexpected path component")),
            }
        }
        let [suite, package, file] = parts[..] else {
            return Err(invalid("expected <suite>/<package>/<file>"));
        };

        if file.ends_with(HTML_SUFFIX) {
            return Err(invalid("rendered output, not a source document"));
        }
        let stem = file
            .strip_suffix(SOURCE_SUFFIX)
            .ok_or_else(|| invalid("missing .gz suffix"))?;
        let (name, section, language) =
            split_stem(stem).ok_or_else(|| invalid("expected <name>.<section>[.<lang>]"))?;

        Ok(Document {
            suite: suite.to_string(),
            package: package.to_string(),
            name: name.to_string(),
            section: section.to_string(),
            language: language.map(str::to_string),
        })
    }

    /// File name without any suffix, e.g. `bash.1` or `ls.1.de`.
    pub fn stem(&self) -> String {
        match &self.language {
            Some(lang) => format!("{}.{}.{}", self.name, self.section, lang),
            None => format!("{}.{}", self.name, self.section),
        }
    }

    /// Canonical output-relative path. This is the document's comparison key.
    pub fn serving_path(&self) -> String {
        format!("{}/{}/{}", self.suite, self.package, self.stem())
    }

    /// Path of the compressed source relative to the serving directory.
    pub fn raw_path(&self) -> String {
        format!("{}{SOURCE_SUFFIX}", self.serving_path())
    }

    /// Path of the rendered page relative to the serving directory.
    pub fn html_path(&self) -> String {
        format!("{}{HTML_SUFFIX}", self.serving_path())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.section)
    }
}

/// Whether a directory entry name is a compressed manpage source.
pub fn is_source_name(file_name: &str) -> bool {
    file_name.ends_with(SOURCE_SUFFIX) && !file_name.ends_with(HTML_SUFFIX)
}

/// Output file name for a source file name: `bash.1.gz` -> `bash.1.html.gz`.
pub fn html_name(source_name: &str) -> String {
    let stem = source_name
        .strip_suffix(SOURCE_SUFFIX)
        .unwrap_or(source_name);
    format!("{stem}{HTML_SUFFIX}")
}

fn split_stem(stem: &str) -> Option<(&str, &str, Option<&str>)> {
    let (rest, last) = stem.rsplit_once('.')?;
    if starts_with_digit(last) {
        return (!rest.is_empty()).then_some((rest, last, None));
    }
    let (name, section) = rest.rsplit_once('.')?;
    (!name.is_empty() && starts_with_digit(section) && !last.is_empty())
        .then_some((name, section, Some(last)))
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}
