//! User template documents.
//!
//! A template is a JSON packet description saved as `<name>.trp` under a
//! template directory. Names may contain `/` to group templates into
//! subdirectories, e.g. `dns/query`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::Packet;
use crate::wire::{TranslationError, from_wire, parse_description, to_wire};

/// File extension of template documents, without the dot.
pub const TEMPLATE_EXTENSION: &str = "trp";

/// Errors raised by the template store.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Name is empty, absolute, or escapes the template directory.
    #[error("invalid template name: {0:?}")]
    InvalidName(String),

    /// No template with this name exists.
    #[error("template not found: {0}")]
    NotFound(String),

    /// Refusing to save a packet with no protocols.
    #[error("cannot save an empty template, add at least one protocol")]
    EmptyPacket,

    /// The document is not a valid packet description.
    #[error("template {name}: {source}")]
    Translation {
        name: String,
        #[source]
        source: TranslationError,
    },

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A directory of template documents.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    /// Creates a store rooted at `root`. The directory need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the template directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists template names, sorted.
    ///
    /// Returns an empty list if the directory does not exist.
    pub fn list(&self) -> Result<Vec<String>, TemplateError> {
        let mut names = Vec::new();
        if self.root.is_dir() {
            self.collect(&self.root, &mut names)?;
        }
        names.sort();
        Ok(names)
    }

    fn collect(&self, dir: &Path, names: &mut Vec<String>) -> Result<(), TemplateError> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, names)?;
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            match self.name_of(&path) {
                Some(name) => names.push(name),
                None => warn!(path = %path.display(), "skipping template outside store"),
            }
        }
        Ok(())
    }

    /// Maps a file path under the root back to a template name.
    fn name_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
        let parts: Vec<&str> = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;
        let name = parts.join("/");
        validate_name(&name).ok()?;
        Some(name)
    }

    /// Resolves a template name to its file path.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, TemplateError> {
        validate_name(name)?;
        let mut path = self.root.clone();
        for part in name.split('/') {
            path.push(part);
        }
        path.set_extension(TEMPLATE_EXTENSION);
        Ok(path)
    }

    /// Loads a template as a packet.
    pub fn load(&self, name: &str) -> Result<Packet, TemplateError> {
        let path = self.path_for(name)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TemplateError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let translation = |source| TemplateError::Translation {
            name: name.to_string(),
            source,
        };
        let value = parse_description(&text).map_err(translation)?;
        from_wire(&value).map_err(translation)
    }

    /// Saves a packet as a template, overwriting any existing one.
    ///
    /// Returns the path written.
    pub fn save(&self, name: &str, packet: &Packet) -> Result<PathBuf, TemplateError> {
        if packet.is_empty() {
            return Err(TemplateError::EmptyPacket);
        }
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&to_wire(packet))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&path, text)?;
        debug!(name = %name, path = %path.display(), "template saved");
        Ok(path)
    }
}

/// Checks that a template name stays inside the store.
pub fn validate_name(name: &str) -> Result<(), TemplateError> {
    let invalid = || TemplateError::InvalidName(name.to_string());
    if name.is_empty() || name.starts_with('/') {
        return Err(invalid());
    }
    for part in name.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return Err(invalid());
        }
        if part.contains(['\\', ':', '\0']) {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Strips a trailing `.ext` from a template file name.
pub fn display_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(index) if index > 0 => &file_name[..index],
        _ => file_name,
    }
}
