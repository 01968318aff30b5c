//! Folds per-symbol shards into the canonical store.
//!
//! Merging re-applies insert-or-ignore, so running it twice over the same
//! shards adds nothing: the canonical uniqueness constraints absorb every
//! duplicate row.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;

use super::store::{shard_path, ShardStore};

pub struct MergeEngine {
    data_dir: PathBuf,
    db_name: String,
}

impl MergeEngine {
    pub fn new(data_dir: &Path, db_name: &str) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            db_name: db_name.to_string(),
        }
    }

    /// Scan the data directory for shard-named files and return their group
    /// keys (`db-AAPL.sqlite` -> `AAPL`).
    pub fn discover_groups(&self) -> Result<Vec<String>> {
        let (stem, ext) = match self.db_name.rsplit_once('.') {
            Some((stem, ext)) => (format!("{}-", stem), format!(".{}", ext)),
            None => (format!("{}-", self.db_name), String::new()),
        };

        let mut groups = Vec::new();
        if !self.data_dir.exists() {
            return Ok(groups);
        }
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(rest) = name.strip_prefix(&stem) {
                if let Some(group) = rest.strip_suffix(&ext) {
                    if !group.is_empty() {
                        groups.push(group.to_string());
                    }
                }
            }
        }
        groups.sort();
        Ok(groups)
    }

    /// Merge the given shard groups (or every discovered shard) into the
    /// canonical store, optionally deleting shard files afterwards. Returns
    /// the open canonical handle.
    pub async fn merge(&self, groups: Option<Vec<String>>, delete: bool) -> Result<ShardStore> {
        let groups = match groups {
            Some(groups) => groups,
            None => self.discover_groups()?,
        };

        let canonical = ShardStore::open(&self.data_dir, &self.db_name, None).await?;

        for group in &groups {
            let shard = ShardStore::open(&self.data_dir, &self.db_name, Some(group)).await?;

            let companies = shard.all_companies().await?;
            for company in companies {
                canonical.insert_company(company).await?;
            }

            let articles = shard.all_articles().await?;
            let count = articles.len();
            let inserted = canonical.insert_articles(articles).await?;
            debug!(group = %group, count, inserted, "merged shard");

            shard.close().await?;

            if delete {
                let path = shard_path(&self.data_dir, &self.db_name, Some(group));
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(group = %group, error = %e, "failed to delete merged shard");
                }
            }
        }

        info!(shards = groups.len(), "merge complete");
        Ok(canonical)
    }
}
