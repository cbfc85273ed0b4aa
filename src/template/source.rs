//! Where template bytes come from.
use crate::error::ConverterError;
use crate::schedule::DestinationCategory;
use crate::template::TemplateError;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Fetches the bytes of a category's template.
pub trait TemplateSource {
    /// Returns `None` when no template exists at `location`.
    fn fetch(&self, category: DestinationCategory, location: &str) -> Result<Option<Vec<u8>>, ConverterError>;
}

/// Reads templates from the file system.
///
/// Locations are paths, relative ones resolved against `root`, or `file://` URLs.
#[derive(Clone, Debug, Default)]
pub struct FileTemplateSource {
    root: PathBuf,
}

impl FileTemplateSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File system path a location refers to.
    pub fn resolve(&self, location: &str) -> Result<PathBuf, ConverterError> {
        if !location.contains("://") {
            return Ok(self.root.join(location));
        }
        let url = Url::parse(location).map_err(|_| TemplateError::UnsupportedLocation(location.to_owned()))?;
        if url.scheme() != "file" {
            Err(TemplateError::UnsupportedLocation(location.to_owned()))?;
        }
        let path = url
            .to_file_path()
            .map_err(|_| TemplateError::UnsupportedLocation(location.to_owned()))?;
        Ok(path)
    }
}

impl TemplateSource for FileTemplateSource {
    fn fetch(&self, category: DestinationCategory, location: &str) -> Result<Option<Vec<u8>>, ConverterError> {
        let path = self.resolve(location)?;
        if !path.is_file() {
            debug!(category = %category, path = %path.display(), "template file not found");
            return Ok(None);
        }
        debug!(category = %category, path = %path.display(), "reading template");
        Ok(Some(std::fs::read(&path)?))
    }
}

/// Templates held in memory, keyed by category. The location is ignored.
#[derive(Clone, Debug, Default)]
pub struct MemoryTemplateSource {
    templates: HashMap<DestinationCategory, Vec<u8>>,
}

impl MemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: DestinationCategory, bytes: Vec<u8>) -> &mut Self {
        self.templates.insert(category, bytes);
        self
    }

    pub fn with(mut self, category: DestinationCategory, bytes: Vec<u8>) -> Self {
        self.insert(category, bytes);
        self
    }
}

impl TemplateSource for MemoryTemplateSource {
    fn fetch(&self, category: DestinationCategory, _location: &str) -> Result<Option<Vec<u8>>, ConverterError> {
        Ok(self.templates.get(&category).cloned())
    }
}

impl<T: TemplateSource + ?Sized> TemplateSource for &T {
    fn fetch(&self, category: DestinationCategory, location: &str) -> Result<Option<Vec<u8>>, ConverterError> {
        (**self).fetch(category, location)
    }
}
