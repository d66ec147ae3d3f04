use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ClipListError {
    #[error("failed reading clip list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Animation clip names in presentation order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipLibrary {
    names: Vec<String>,
}

impl ClipLibrary {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lib = Self::default();
        lib.extend(names);
        lib
    }

    /// One clip per line; blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        )
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClipListError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ClipListError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !name.is_empty() && !self.contains(&name) {
                self.names.push(name);
            }
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn first(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// Clip the show opens with: a walking clip, else an "all night" clip, else the first one.
    pub fn opener(&self) -> Option<&str> {
        let find = |needle: &str| {
            self.names
                .iter()
                .find(|n| n.to_lowercase().contains(needle))
                .map(String::as_str)
        };
        find("walking").or_else(|| find("all_night")).or_else(|| self.first())
    }

    /// Cyclic neighbour of `current`; an unknown or missing clip counts as index 0.
    pub fn step_from(&self, current: Option<&str>, forward: bool) -> Option<&str> {
        if self.names.is_empty() {
            return None;
        }
        let n = self.names.len();
        let i = current.and_then(|c| self.position(c)).unwrap_or(0);
        let next = if forward { (i + 1) % n } else { (i + n - 1) % n };
        self.names.get(next).map(String::as_str)
    }
}
