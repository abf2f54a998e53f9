use std::{
    collections::HashMap,
    convert::Infallible,
    error::Error,
    fs,
    io,
    path::{Path, PathBuf},
};

use crate::index::AssetId;

#[cfg(feature = "zip")]
pub use self::zip::{ZipSource, ZipSourceError};

/// Where model bytes come from.
pub trait AssetSource {
    type Error: Error + 'static;

    /// Read a whole asset. `Ok(None)` means the asset does not exist.
    fn read(&mut self, id: &AssetId) -> Result<Option<Vec<u8>>, Self::Error>;
}

impl<S: AssetSource + ?Sized> AssetSource for Box<S> {
    type Error = S::Error;

    fn read(&mut self, id: &AssetId) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).read(id)
    }
}

/// Assets laid out on disk as `<root>/<namespace>/<path>`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, id: &AssetId) -> PathBuf {
        let mut path = self.root.join(id.namespace());
        path.extend(id.path().split('/').filter(|segment| !segment.is_empty()));
        path
    }
}

impl AssetSource for DirectorySource {
    type Error = io::Error;

    fn read(&mut self, id: &AssetId) -> Result<Option<Vec<u8>>, Self::Error> {
        match fs::read(self.resolve(id)) {
            Ok(buffer) => Ok(Some(buffer)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Assets held in memory. Counts reads so callers can see what was fetched.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    assets: HashMap<AssetId, Vec<u8>>,
    reads: usize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<AssetId>, buffer: impl Into<Vec<u8>>) -> &mut Self {
        self.assets.insert(id.into(), buffer.into());
        self
    }

    pub fn remove(&mut self, id: &AssetId) -> Option<Vec<u8>> {
        self.assets.remove(id)
    }

    /// Reads served so far, including misses.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl AssetSource for MemorySource {
    type Error = Infallible;

    fn read(&mut self, id: &AssetId) -> Result<Option<Vec<u8>>, Self::Error> {
        self.reads += 1;
        Ok(self.assets.get(id).cloned())
    }
}

#[cfg(feature = "zip")]
mod zip {
    use std::{
        error::Error,
        fmt::{self, Display, Formatter},
        io::{self, Read, Seek},
    };

    use zip::{result::ZipError, ZipArchive};

    use super::AssetSource;
    use crate::index::AssetId;

    #[derive(Debug)]
    pub enum ZipSourceError {
        Zip(ZipError),
        FileTooLarge(u64),
    }

    impl Display for ZipSourceError {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            match self {
                ZipSourceError::Zip(error) => Display::fmt(error, f),
                ZipSourceError::FileTooLarge(size) => write!(f, "File size {} is too large", size),
            }
        }
    }

    impl Error for ZipSourceError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            match self {
                ZipSourceError::Zip(error) => Some(error),
                ZipSourceError::FileTooLarge(_) => None,
            }
        }
    }

    impl From<ZipError> for ZipSourceError {
        fn from(value: ZipError) -> Self {
            Self::Zip(value)
        }
    }

    impl From<io::Error> for ZipSourceError {
        fn from(value: io::Error) -> Self {
            Self::Zip(ZipError::Io(value))
        }
    }

    /// A resource pack archive, entries named `<prefix>/<namespace>/<path>`.
    pub struct ZipSource<T> {
        archive: ZipArchive<T>,
        prefix: String,
    }

    impl<T: Read + Seek> ZipSource<T> {
        pub const DEFAULT_PREFIX: &'static str = "assets";

        pub fn new(stream: T) -> Result<Self, ZipSourceError> {
            Self::with_prefix(stream, Self::DEFAULT_PREFIX)
        }

        pub fn with_prefix(stream: T, prefix: impl Into<String>) -> Result<Self, ZipSourceError> {
            Ok(Self {
                archive: ZipArchive::new(stream)?,
                prefix: prefix.into(),
            })
        }

        fn entry_name(&self, id: &AssetId) -> String {
            let prefix = self.prefix.trim_matches('/');
            if prefix.is_empty() {
                format!("{}/{}", id.namespace(), id.path())
            } else {
                format!("{}/{}/{}", prefix, id.namespace(), id.path())
            }
        }
    }

    impl<T: Read + Seek> AssetSource for ZipSource<T> {
        type Error = ZipSourceError;

        fn read(&mut self, id: &AssetId) -> Result<Option<Vec<u8>>, Self::Error> {
            let name = self.entry_name(id);
            let mut entry = match self.archive.by_name(&name) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => return Ok(None),
                Err(error) => return Err(error.into()),
            };
            let file_size = entry.size();
            let file_size: usize = file_size
                .try_into()
                .map_err(|_| ZipSourceError::FileTooLarge(file_size))?;
            let mut buffer = Vec::with_capacity(file_size);
            entry.read_to_end(&mut buffer)?;
            Ok(Some(buffer))
        }
    }

}
