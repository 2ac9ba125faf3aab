//! Exercise material on the local filesystem

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::capability::LabFiles;
use crate::config::LabConfig;
use crate::Result;

/// Copies `<materials>/<lab>` to `<work>/<lab>` and removes it again
#[derive(Debug, Clone)]
pub struct LocalLabFiles {
    materials_dir: PathBuf,
    work_dir: PathBuf,
}

impl LocalLabFiles {
    pub fn new(materials_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            materials_dir: materials_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn from_config(config: &LabConfig) -> Self {
        Self::new(config.files.materials_dir.clone(), config.work_dir())
    }

    pub fn workdir(&self, lab_name: &str) -> PathBuf {
        self.work_dir.join(lab_name)
    }
}

#[async_trait]
impl LabFiles for LocalLabFiles {
    async fn copy_lab_files(&self, lab_name: &str) -> Result<()> {
        let source = self.materials_dir.join(lab_name);
        let target = self.workdir(lab_name);
        info!("copying {:?} to {:?}", source, target);

        tokio::task::spawn_blocking(move || copy_dir(&source, &target))
            .await
            .map_err(io::Error::other)??;
        Ok(())
    }

    async fn delete_workdir(&self, lab_name: &str) -> Result<()> {
        let target = self.workdir(lab_name);
        info!("removing {:?}", target);

        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{:?} does not exist", target);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Recursive copy; existing files are overwritten
fn copy_dir(source: &Path, target: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
