//! Registry of every known manpage variant.
//!
//! Built once before a run starts and read-only afterwards. Documents are
//! stored in a dense table and addressed by [`DocId`] handles, so "is this
//! the same document" is a handle comparison rather than a string compare or
//! a pointer identity check.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::document::{Document, is_source_name};
use crate::error::{RenderError, Result};

/// Handle of a document inside a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(u32);

/// All known documents, indexed by serving path and by name.
#[derive(Debug, Default)]
pub struct Registry {
    documents: Vec<Document>,
    by_serving_path: HashMap<String, DocId>,
    by_name: HashMap<String, Arc<[DocId]>>,
}

impl Registry {
    /// Build a registry from documents. Later duplicates of a serving path
    /// are dropped; variant order follows first insertion.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut table = Vec::new();
        let mut by_serving_path = HashMap::new();
        let mut names: HashMap<String, Vec<DocId>> = HashMap::new();

        for document in documents {
            let serving_path = document.serving_path();
            if by_serving_path.contains_key(&serving_path) {
                continue;
            }
            let id = DocId(table.len() as u32);
            by_serving_path.insert(serving_path, id);
            names.entry(document.name.clone()).or_default().push(id);
            table.push(document);
        }

        Registry {
            documents: table,
            by_serving_path,
            by_name: names
                .into_iter()
                .map(|(name, ids)| (name, Arc::from(ids)))
                .collect(),
        }
    }

    /// Scan `<root>/<suite>/<package>/` for compressed manpages of the given
    /// suites.
    pub fn scan(root: &Path, suites: &BTreeSet<String>) -> Result<Self> {
        let mut documents = Vec::new();
        for suite in suites {
            let walker = WalkDir::new(root.join(suite))
                .min_depth(2)
                .max_depth(2)
                .sort_by_file_name();
            for entry in walker {
                let entry = entry.map_err(|err| {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.join(suite));
                    RenderError::io(path, err.into())
                })?;
                let Some(file_name) = entry.file_name().to_str() else {
                    continue;
                };
                if !is_source_name(file_name) {
                    continue;
                }
                match Document::from_serving_path(root, entry.path()) {
                    Ok(document) => documents.push(document),
                    Err(err) => debug!("skipping {}: {err}", entry.path().display()),
                }
            }
        }
        Ok(Self::from_documents(documents))
    }

    /// The document behind a handle.
    ///
    /// Handles are only minted by this registry, so the lookup cannot miss.
    pub fn get(&self, id: DocId) -> &Document {
        &self.documents[id.0 as usize]
    }

    /// Canonical handle for a serving path.
    pub fn lookup(&self, serving_path: &str) -> Option<DocId> {
        self.by_serving_path.get(serving_path).copied()
    }

    /// Every variant sharing `name`, empty if the name is unknown.
    pub fn variants(&self, name: &str) -> Arc<[DocId]> {
        self.by_name
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
