use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;

use params::{Mapping, Value};

/// Compress `fname` to `fname.gz`. The original is removed unless `keep` (default true).
/// Returns the path of the compressed file.
pub fn gzip(args: &Mapping) -> Result<Value> {
    let src = PathBuf::from(args.require_str("fname")?);
    let keep = args.optional_bool("keep")?.unwrap_or(true);

    let mut tgt = src.clone().into_os_string();
    tgt.push(".gz");
    let tgt = PathBuf::from(tgt);

    let input = File::open(&src).with_context(|| format!("opening {src:?}"))?;
    let output = File::create(&tgt).with_context(|| format!("creating {tgt:?}"))?;

    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut BufReader::new(input), &mut encoder)
        .with_context(|| format!("compressing {src:?}"))?;
    encoder.finish()?.into_inner().map_err(|e| e.into_error())?;

    if !keep {
        fs::remove_file(&src).with_context(|| format!("removing {src:?}"))?;
    }
    log::debug!("compressed {src:?} to {tgt:?}");
    Ok(Value::Str(tgt.to_string_lossy().into_owned()))
}
