use anyhow::Result;

use params::{permutations, Mapping, ParameterDomain, Value};

use super::Error;

const GLOB_CHARS: &[char] = &['*', '?', '['];

/// Dispatch hook: replace every string argument containing wildcards with each
/// matching path in turn. Several wildcard arguments give every combination.
pub fn expand_glob(args: Mapping) -> Result<Vec<Mapping>> {
    let mut matches = ParameterDomain::new();
    for (name, val) in args.iter() {
        let Some(pattern) = val.as_str().filter(|s| s.contains(GLOB_CHARS)) else {
            continue;
        };
        let paths = glob_sorted(pattern)?;
        if paths.is_empty() {
            log::warn!("no files match {name}: \"{pattern}\"");
        }
        matches.insert(name, paths)?;
    }
    if matches.is_empty() {
        return Ok(vec![args]);
    }

    Ok(permutations(&matches)?
        .into_iter()
        .map(|perm| {
            let mut expanded = args.clone();
            for (name, path) in perm {
                expanded.insert(name, path);
            }
            expanded
        })
        .collect())
}

fn glob_sorted(pattern: &str) -> Result<Vec<Value>> {
    let entries =
        glob::glob(pattern).map_err(|e| Error::InvalidPattern(pattern.to_owned(), e))?;
    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path.to_string_lossy().into_owned()),
            Err(e) => log::warn!("skipping unreadable path while globbing: {e}"),
        }
    }
    paths.sort_unstable();
    Ok(paths.into_iter().map(Value::Str).collect())
}
