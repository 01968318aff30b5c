//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.toml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl news for every configured symbol and source, then merge the
    /// shards into the canonical store
    Crawl,

    /// Merge existing shards into the canonical store
    Merge {
        /// Delete shard files after a successful merge
        #[arg(long)]
        delete: bool,
    },

    /// Report canonical store row counts
    Stats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crawl_with_config_path() {
        let cli = Cli::parse_from(["tickernews", "--config", "/tmp/c.toml", "crawl"]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/c.toml")));
        assert!(matches!(cli.command, Command::Crawl));
    }

    #[test]
    fn parses_merge_delete_flag() {
        let cli = Cli::parse_from(["tickernews", "merge", "--delete"]);
        assert!(matches!(cli.command, Command::Merge { delete: true }));
    }
}
