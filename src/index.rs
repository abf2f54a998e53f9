use std::fmt::{self, Display, Formatter};

pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// A `namespace:path` asset location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetId {
    namespace: String,
    path: String,
}

impl AssetId {
    pub fn new(namespace: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.as_ref().to_lowercase(),
            path: path.into(),
        }
    }

    /// Parse `namespace:path`, falling back to the default namespace when no
    /// colon is present.
    pub fn parse(location: &str) -> Self {
        match location.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Self::new(DEFAULT_NAMESPACE, location),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            namespace: self.namespace.clone(),
            path: path.into(),
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let file_name = self.path.rsplit('/').next()?;
        file_name.rsplit_once('.').map(|(_, extension)| extension)
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
