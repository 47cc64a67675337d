use anyhow::{anyhow, Result};
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::helpers::fs::write_atomic;

/// Keeps tokens as `NAME='token'` entries of an env file, next to the rest
/// of the deployment's variables.
#[derive(Debug, Clone)]
pub struct DotenvSink {
    path: PathBuf,
}

impl DotenvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self, credential: &str) -> Result<Option<String>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let entries = dotenvy::from_path_iter(&self.path)
            .map_err(|e| anyhow!("cannot read '{}': {}", self.path.display(), e))?;
        for entry in entries {
            let (key, value) = entry.map_err(|e| anyhow!("cannot parse '{}': {}", self.path.display(), e))?;
            if key == credential {
                return Ok(Some(value).filter(|v| !v.is_empty()));
            }
        }
        Ok(None)
    }

    pub async fn store(&self, credential: &str, token: &str) -> Result<()> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        write_atomic(&self.path, &set_key(&content, credential, token)).await
    }
}

/// Replace (or append) the assignment of `key`, leaving every other line as is
fn set_key(content: &str, key: &str, value: &str) -> String {
    let assignment = format!("{}={}", key, quote(value));
    let mut replaced = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let unexported = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let assigns_key = unexported
                .split_once('=')
                .map(|(name, _)| name.trim() == key)
                .unwrap_or(false);
            if assigns_key && !replaced {
                replaced = true;
                assignment.clone()
            } else {
                line.to_owned()
            }
        })
        .collect();

    if !replaced {
        lines.push(assignment);
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        format!("'{}'", value)
    }
}
