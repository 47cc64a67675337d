use anyhow::Result;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::helpers::fs::write_atomic;

const TOKEN_FILE_EXTENSION: &str = "token";

/// One `<dir>/<credential>.token` file per credential
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, credential: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", credential, TOKEN_FILE_EXTENSION))
    }

    pub async fn load(&self, credential: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(credential)).await {
            Ok(content) => Ok(Some(content.trim().to_owned()).filter(|t| !t.is_empty())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn store(&self, credential: &str, token: &str) -> Result<()> {
        write_atomic(&self.path_for(credential), token).await
    }
}
