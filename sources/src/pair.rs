use std::fmt;
use std::path::PathBuf;

use url::Url;

/// One file (or directory) to transfer: a concrete remote location
/// and the local directory it should end up in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteLocalPair {
    /// Full remote location
    pub uri: Url,
    /// Local destination directory
    pub destination: PathBuf,
    /// Directory part of the remote path, without a trailing slash
    pub path: String,
    /// Last component of the remote path; empty if the remote is a directory
    pub fname: String,
}

impl RemoteLocalPair {
    pub(crate) fn new(uri: Url, destination: PathBuf) -> Self {
        let (path, fname) = match uri.path().rsplit_once('/') {
            Some((path, fname)) => (path.to_owned(), fname.to_owned()),
            None => (String::with_capacity(0), uri.path().to_owned()),
        };
        Self {
            uri,
            destination,
            path,
            fname,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.fname.is_empty()
    }

    /// Where the transferred file ends up locally.
    pub fn local_path(&self) -> PathBuf {
        self.destination.join(&self.fname)
    }
}

impl fmt::Display for RemoteLocalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.uri, self.local_path().display())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_split() -> Result<()> {
        let pair = RemoteLocalPair::new(
            Url::parse("ftp://gdc.cddis.eosdis.nasa.gov/gnss/products/2295/COD22951.EPH.Z")?,
            PathBuf::from("campaign/ORB"),
        );
        assert_eq!(pair.path, "/gnss/products/2295");
        assert_eq!(pair.fname, "COD22951.EPH.Z");
        assert_eq!(pair.local_path(), PathBuf::from("campaign/ORB/COD22951.EPH.Z"));
        assert!(!pair.is_directory());

        let dir = RemoteLocalPair::new(
            Url::parse("https://example.com/data/2024/")?,
            PathBuf::from("campaign/DATA"),
        );
        assert_eq!(dir.path, "/data/2024");
        assert!(dir.is_directory());
        Ok(())
    }
}
