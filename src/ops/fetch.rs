use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use url::Url;

use params::{Mapping, Value};

use super::Error;

/// Copy the file (or directory) at `url` into the directory `destination`.
/// Only `file://` urls are supported. Returns the local path.
pub fn fetch(args: &Mapping) -> Result<Value> {
    let url = args.require_str("url")?;
    let destination = Path::new(args.require_str("destination")?);

    let uri = Url::parse(url).with_context(|| format!("parsing url \"{url}\""))?;
    if uri.scheme() != "file" {
        return Err(Error::UnsupportedScheme(uri.scheme().to_owned()).into());
    }
    let src = uri
        .to_file_path()
        .map_err(|_| Error::NotALocalPath(url.to_owned()))?;

    let tgt = match src.file_name() {
        Some(fname) => destination.join(fname),
        None => destination.to_path_buf(),
    };
    fs::create_dir_all(destination).with_context(|| format!("creating {destination:?}"))?;
    copy(&src, &tgt).with_context(|| format!("copying {src:?} to {tgt:?}"))?;

    log::debug!("fetched {url} to {tgt:?}");
    Ok(Value::Str(tgt.to_string_lossy().into_owned()))
}

/// Copy `src` to `tgt`, recursively if needed. Symlinks are followed.
fn copy(src: &Path, tgt: &Path) -> Result<()> {
    if src.is_file() {
        fs::copy(src, tgt)?;
    } else if src.is_dir() {
        copy_dir(src, tgt)?;
    } else {
        return Err(Error::UnknownPathType(src.to_path_buf()).into());
    }
    Ok(())
}

fn copy_dir(src: &Path, tgt: &Path) -> Result<()> {
    fs::create_dir_all(tgt)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_entry: PathBuf = entry.path();
        copy(&src_entry, &tgt.join(entry.file_name()))?;
    }
    Ok(())
}
