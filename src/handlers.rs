/// Built-in handler set: voice-controlled navigation, file operations, and
/// shell execution around a shared tracked working directory.
///
/// Registered by the binary; the pipeline itself never assumes these exist.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::constants::dispatch::SHELL_TIMEOUT_SECS;
use crate::dispatch::Dispatcher;

const HELP_TEXT: &str = "Available voice commands. \
Navigation: list files, change directory to, go to home, go back. \
Files: create file, delete file, read file. \
Shell: run followed by any command. \
Say 'repeat that' to hear the last response again, or a goodbye phrase to exit.";

fn param<'a>(parameters: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    parameters
        .get(key)
        .map(String::as_str)
        .with_context(|| format!("Missing parameter '{key}'"))
}

/// Register the built-in handlers on a dispatcher. The working directory
/// is shared across handlers, like a tiny shell session.
pub fn register_builtin(dispatcher: &mut Dispatcher) {
    let cwd = Arc::new(Mutex::new(
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    ));

    dispatcher.register("help", |_| Ok(Some(HELP_TEXT.to_string())));

    {
        let cwd = Arc::clone(&cwd);
        dispatcher.register("list", move |_| {
            let dir = cwd.lock().unwrap().clone();
            Ok(Some(list_directory(&dir)?))
        });
    }

    {
        let cwd = Arc::clone(&cwd);
        dispatcher.register("cd", move |parameters| {
            let path = param(parameters, "path")?;
            let mut dir = cwd.lock().unwrap();
            Ok(Some(change_directory(&mut dir, path)))
        });
    }

    {
        let cwd = Arc::clone(&cwd);
        dispatcher.register("pwd", move |_| {
            let dir = cwd.lock().unwrap();
            Ok(Some(format!("You are in {}", dir.display())))
        });
    }

    {
        let cwd = Arc::clone(&cwd);
        dispatcher.register("create", move |parameters| {
            let filename = param(parameters, "filename")?;
            let filepath = cwd.lock().unwrap().join(filename);
            if filepath.exists() {
                return Ok(Some(format!("File {filename} already exists.")));
            }
            fs::write(&filepath, "").with_context(|| format!("Failed to create {filename}"))?;
            Ok(Some(format!("Created file {filename}")))
        });
    }

    {
        let cwd = Arc::clone(&cwd);
        dispatcher.register("delete", move |parameters| {
            let filename = param(parameters, "filename")?;
            let filepath = cwd.lock().unwrap().join(filename);
            if !filepath.exists() {
                return Ok(Some(format!("File {filename} not found.")));
            }
            fs::remove_file(&filepath).with_context(|| format!("Failed to delete {filename}"))?;
            Ok(Some(format!("Deleted {filename}")))
        });
    }

    {
        let cwd = Arc::clone(&cwd);
        dispatcher.register("read", move |parameters| {
            let filename = param(parameters, "filename")?;
            let filepath = cwd.lock().unwrap().join(filename);
            if !filepath.exists() {
                return Ok(Some(format!("File {filename} not found.")));
            }
            let content = fs::read_to_string(&filepath)
                .with_context(|| format!("Failed to read {filename}"))?;
            Ok(Some(format!("Contents of {filename}: {content}")))
        });
    }

    {
        let cwd = Arc::clone(&cwd);
        dispatcher.register("shell", move |parameters| {
            let command = param(parameters, "command")?;
            let dir = cwd.lock().unwrap().clone();
            run_shell(command, &dir)
        });
    }
}

fn list_directory(dir: &Path) -> Result<String> {
    let mut folders = Vec::new();
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).context("Failed to list directory")? {
        let entry = entry.context("Failed to read directory entry")?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_dir() {
            folders.push(name);
        } else {
            files.push(name);
        }
    }

    if folders.is_empty() && files.is_empty() {
        return Ok("The directory is empty.".to_string());
    }

    folders.sort();
    files.sort();

    let mut response = format!("Found {} folders and {} files. ", folders.len(), files.len());
    if !folders.is_empty() {
        response.push_str(&format!("Folders: {}. ", preview(&folders)));
    }
    if !files.is_empty() {
        response.push_str(&format!("Files: {}.", preview(&files)));
    }
    Ok(response)
}

/// Name the first few entries; speech gets tedious past that.
fn preview(names: &[String]) -> String {
    let shown = names.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
    if names.len() > 5 {
        format!("{} and {} more", shown, names.len() - 5)
    } else {
        shown
    }
}

fn change_directory(current: &mut PathBuf, path: &str) -> String {
    let target = match path {
        "home" => dirs::home_dir().unwrap_or_else(|| current.clone()),
        "desktop" => dirs::home_dir()
            .map(|h| h.join("Desktop"))
            .unwrap_or_else(|| current.clone()),
        _ => current.join(path),
    };

    match target.canonicalize() {
        Ok(resolved) if resolved.is_dir() => {
            let name = resolved
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| resolved.display().to_string());
            *current = resolved;
            format!("Changed to {name}")
        }
        _ => format!("Directory {path} does not exist."),
    }
}

fn run_shell(command: &str, dir: &Path) -> Result<Option<String>> {
    #[cfg(target_os = "windows")]
    let (program, flag) = ("cmd", "/C");
    #[cfg(not(target_os = "windows"))]
    let (program, flag) = ("sh", "-c");

    let mut child = std::process::Command::new(program)
        .arg(flag)
        .arg(command)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to run '{command}'"))?;

    // std::process has no wait timeout, so poll until the deadline
    let deadline = Instant::now() + Duration::from_secs(SHELL_TIMEOUT_SECS);
    loop {
        match child.try_wait().context("Failed to poll command")? {
            Some(_) => break,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(Some(format!(
                    "Command timed out after {SHELL_TIMEOUT_SECS} seconds."
                )));
            }
            None => std::thread::sleep(Duration::from_millis(100)),
        }
    }

    let output = child
        .wait_with_output()
        .context("Failed to collect command output")?;

    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };

    let response = if output.status.success() {
        if text.is_empty() {
            "Command completed successfully.".to_string()
        } else {
            format!("Command completed. {text}")
        }
    } else {
        format!("Command failed: {text}")
    };

    Ok(Some(response))
}
