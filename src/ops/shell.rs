use std::fs::File;
use std::io::{self, stderr, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};

use params::{Mapping, Value};

use super::Error;

/// Run `command` with bash, optionally in `cwd`.
/// Output goes to stderr, and is also appended to the file `log` if given.
/// Fails if the command exits unsuccessfully; returns its exit code otherwise.
pub fn shell(args: &Mapping) -> Result<Value> {
    let command = args.require_str("command")?;

    let mut cmd = Command::new("/usr/bin/env");
    cmd.arg("bash").arg("-c").arg(command);
    if let Some(cwd) = args.get("cwd") {
        cmd.current_dir(cwd.to_string());
    }

    let log_file = match args.get("log") {
        Some(Value::Null) | None => None,
        Some(path) => Some(open_log(Path::new(&path.to_string()))?),
    };

    log::debug!("running `{command}`");
    let code = run_cmd(&mut cmd, command, log_file)?;
    Ok(Value::Int(code.into()))
}

fn open_log(path: &Path) -> Result<File> {
    File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {path:?}"))
}

/// Run a subprocess, teeing stdout and stderr to our stderr and `log_file`.
/// Based on:
/// <https://stackoverflow.com/questions/66060139/how-to-tee-stdout-stderr-from-a-subprocess-in-rust>
fn run_cmd(cmd: &mut Command, text: &str, log_file: Option<File>) -> Result<i32> {
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::SpawnFailed(text.to_owned(), e))?;

    let child_out = child.stdout.take().context("attaching to child stdout")?;
    let child_err = child.stderr.take().context("attaching to child stderr")?;
    let err_log = log_file.as_ref().map(File::try_clone).transpose()?;

    let thread_out = thread::spawn(move || communicate(child_out, log_file, stderr()));
    let thread_err = thread::spawn(move || communicate(child_err, err_log, stderr()));

    for handle in [thread_out, thread_err] {
        match handle.join() {
            Ok(res) => res.context("communicating with child process")?,
            Err(_) => anyhow::bail!("output thread of `{text}` panicked"),
        }
    }

    let status = child.wait().context("waiting on child process")?;
    if !status.success() {
        return Err(Error::CommandFailed(text.to_owned(), status.to_string()).into());
    }
    Ok(status.code().unwrap_or_default())
}

fn communicate<R: Read, W: Write>(
    mut stream: R,
    mut file: Option<File>,
    mut output: W,
) -> io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        let num_read = stream.read(&mut buf)?;
        if num_read == 0 {
            break;
        }

        let buf = &buf[..num_read];
        if let Some(file) = &mut file {
            file.write_all(buf)?;
        }
        output.write_all(buf)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> Mapping {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_shell() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("out.log");
        let res = shell(&args(&[
            ("command", "echo hello > greeting.txt; echo logged"),
            ("cwd", dir.path().to_str().unwrap()),
            ("log", log.to_str().unwrap()),
        ]))?;
        assert_eq!(res, Value::Int(0));
        assert_eq!(std::fs::read_to_string(dir.path().join("greeting.txt"))?, "hello\n");
        assert_eq!(std::fs::read_to_string(&log)?, "logged\n");
        Ok(())
    }

    #[test]
    fn test_shell_failure() {
        let err = shell(&args(&[("command", "exit 3")])).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CommandFailed(..))));
        assert!(shell(&Mapping::new()).is_err());
    }
}
