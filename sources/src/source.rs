use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::SystemTime;

use url::Url;

use params::{Mapping, ParameterDomain};
use util::HashSet;

use crate::{Error, RemoteLocalPair};

const SECS_PER_DAY: f64 = 86_400.0;

/// How old a local copy may get before it is fetched again.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MaxAge {
    /// Never re-fetch a file that exists locally.
    #[default]
    Unbounded,
    /// Re-fetch files last modified more than this many days ago.
    Days(f64),
}

impl MaxAge {
    pub fn days(days: f64) -> Result<Self, Error> {
        if days.is_nan() || days < 0.0 {
            return Err(Error::NegativeMaxAge(days));
        }
        Ok(Self::Days(days))
    }
}

/// A parameterized remote location and the local directory its files go to.
#[derive(Debug, Clone)]
pub struct Source {
    identifier: String,
    description: String,
    /// Remote URL template; a directory if `filenames` are given
    url: String,
    /// Local directory template
    destination: String,
    /// Filename templates, appended to `url`
    filenames: Option<Vec<String>>,
    parameters: ParameterDomain,
    max_age: MaxAge,
}

impl Source {
    pub fn new<T, U, D>(identifier: T, url: U, destination: D) -> Self
    where
        T: Into<String>,
        U: Into<String>,
        D: Into<String>,
    {
        Self {
            identifier: identifier.into(),
            description: String::with_capacity(0),
            url: url.into(),
            destination: destination.into(),
            filenames: None,
            parameters: ParameterDomain::new(),
            max_age: MaxAge::default(),
        }
    }

    pub fn with_description<T: Into<String>>(mut self, description: T) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_filenames(mut self, filenames: Vec<String>) -> Self {
        self.filenames = Some(filenames);
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterDomain) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn max_age(&self) -> MaxAge {
        self.max_age
    }

    /// Expand the templates into concrete transfer pairs,
    /// in template order, without duplicates.
    pub fn resolve(&self) -> Result<Vec<RemoteLocalPair>, Error> {
        let mut pairs = Vec::new();
        let mut seen = HashSet::default();

        for remote in self.remote_templates() {
            let mut template = Mapping::with_capacity(2);
            template.insert("remote", remote);
            template.insert("destination", self.destination.as_str());

            for resolved in params::resolve_mapping(&template, &self.parameters)? {
                let remote = resolved.require_str("remote")?;
                let uri = Url::parse(remote)
                    .map_err(|e| Error::InvalidUrl(remote.to_owned(), e))?;
                let destination = PathBuf::from(resolved.require_str("destination")?);

                let pair = RemoteLocalPair::new(uri, destination);
                if seen.insert(pair.clone()) {
                    pairs.push(pair);
                }
            }
        }

        log::debug!("source {} resolved to {} pairs", self.identifier, pairs.len());
        Ok(pairs)
    }

    fn remote_templates(&self) -> Vec<String> {
        match &self.filenames {
            None => vec![self.url.clone()],
            Some(filenames) => {
                let sep = if self.url.ends_with('/') { "" } else { "/" };
                filenames
                    .iter()
                    .map(|fname| format!("{}{sep}{fname}", self.url))
                    .collect()
            }
        }
    }

    /// Whether `pair` has to be transferred, judged at time `now`:
    /// missing local files always do, existing ones only once older than the max age.
    pub fn needs_fetch(&self, pair: &RemoteLocalPair, now: SystemTime) -> Result<bool, Error> {
        let local = pair.local_path();
        let meta = match fs::metadata(&local) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(Error::Metadata(local, e)),
        };
        match self.max_age {
            MaxAge::Unbounded => Ok(false),
            MaxAge::Days(days) => {
                let modified = meta.modified().map_err(|e| Error::Metadata(local, e))?;
                // files from the future count as fresh:
                let age = now.duration_since(modified).unwrap_or_default();
                Ok(age.as_secs_f64() > days * SECS_PER_DAY)
            }
        }
    }
}
