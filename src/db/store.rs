//! Durable, idempotent storage for one shard.
//!
//! A shard is a SQLite file scoped to one symbol (or, for the canonical
//! store, no symbol at all). Schema creation is idempotent, the `source`
//! column is added by additive migration, and all inserts are
//! insert-or-ignore so duplicates are absorbed rather than raised.

use chrono::NaiveDate;
use rusqlite::params;
use std::path::{Path, PathBuf};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, Company};

use super::schema::SCHEMA;

/// Source value backfilled into rows that pre-date the `source` column.
const LEGACY_SOURCE: &str = "marketwatch";

pub struct ShardStore {
    conn: Connection,
    path: PathBuf,
}

/// File name for a shard: the base name with "-GROUP" spliced in before the
/// extension, e.g. `db.sqlite` + `AAPL` -> `db-AAPL.sqlite`.
pub fn shard_path(data_dir: &Path, db_name: &str, group: Option<&str>) -> PathBuf {
    let file = match group {
        Some(group) => match db_name.rsplit_once('.') {
            Some((stem, ext)) => format!("{}-{}.{}", stem, group, ext),
            None => format!("{}-{}", db_name, group),
        },
        None => db_name.to_string(),
    };
    data_dir.join(file)
}

impl ShardStore {
    /// Open (creating if absent) the shard for `group`, or the canonical
    /// store when `group` is `None`.
    pub async fn open(data_dir: &Path, db_name: &str, group: Option<&str>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = shard_path(data_dir, db_name, group);
        let conn = Connection::open(&path).await?;

        conn.call(|conn| {
            // Generous lock wait so merges and inspection tools can poke at
            // shards while a crawl is committing.
            conn.execute_batch("PRAGMA busy_timeout = 120000;")?;
            conn.execute_batch(SCHEMA)?;
            if !has_column(conn, "articles", "source")? {
                conn.execute("ALTER TABLE articles ADD COLUMN source VARCHAR(20)", [])?;
                conn.execute("UPDATE articles SET source = ?1", params![LEGACY_SOURCE])?;
            }
            Ok(())
        })
        .await?;

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert-or-ignore: the first write for a symbol wins.
    pub async fn insert_company(&self, company: Company) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO companies (symbol, name, industry, sector, description)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        company.symbol,
                        company.name,
                        company.industry,
                        company.sector,
                        company.description,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Insert a whole batch in one transaction, ignoring duplicate
    /// `(symbol, url)` rows. Returns the number of rows actually inserted.
    pub async fn insert_articles(&self, batch: Vec<Article>) -> Result<usize> {
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                for article in &batch {
                    inserted += tx.execute(
                        "INSERT OR IGNORE INTO articles (symbol, headline, date, content, url, source)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            article.symbol,
                            article.headline,
                            article.date.format("%Y-%m-%d").to_string(),
                            article.content,
                            article.url,
                            article.source,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn article_exists(&self, symbol: &str, url: &str) -> Result<bool> {
        let symbol = symbol.to_string();
        let url = url.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(url) FROM articles WHERE url = ?1 AND symbol = ?2",
                    params![url, symbol],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    pub async fn article_count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    pub async fn company_count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    pub async fn all_articles(&self) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT symbol, headline, date, content, url, source
                     FROM articles ORDER BY article_id ASC",
                )?;
                let articles = stmt
                    .query_map([], |row| {
                        let date: String = row.get(2)?;
                        Ok(Article {
                            symbol: row.get(0)?,
                            headline: row.get(1)?,
                            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                                .unwrap_or(NaiveDate::MIN),
                            content: row.get(3)?,
                            url: row.get(4)?,
                            source: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn all_companies(&self) -> Result<Vec<Company>> {
        let companies = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT symbol, name, industry, sector, description
                     FROM companies ORDER BY company_id ASC",
                )?;
                let companies = stmt
                    .query_map([], |row| {
                        Ok(Company {
                            symbol: row.get(0)?,
                            name: row.get(1)?,
                            industry: row.get(2)?,
                            sector: row.get(3)?,
                            description: row.get(4)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(companies)
            })
            .await?;
        Ok(companies)
    }

    /// Flush and release the connection.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

fn has_column(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(symbol: &str, url: &str) -> Article {
        Article {
            symbol: symbol.to_string(),
            headline: "Headline".to_string(),
            date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
            content: "Body text.".to_string(),
            url: url.to_string(),
            source: "marketwatch".to_string(),
        }
    }

    #[tokio::test]
    async fn shard_naming_splices_group_before_extension() {
        let dir = Path::new("data");
        assert_eq!(
            shard_path(dir, "db.sqlite", Some("AAPL")),
            dir.join("db-AAPL.sqlite")
        );
        assert_eq!(shard_path(dir, "db.sqlite", None), dir.join("db.sqlite"));
    }

    #[tokio::test]
    async fn duplicate_articles_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShardStore::open(dir.path(), "db.sqlite", Some("AAPL"))
            .await
            .unwrap();

        let inserted = store
            .insert_articles(vec![article("AAPL", "http://x/1"), article("AAPL", "http://x/1")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        // a second run with the same url is also absorbed
        let inserted = store
            .insert_articles(vec![article("AAPL", "http://x/1")])
            .await
            .unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(store.article_count().await.unwrap(), 1);
        assert!(store.article_exists("AAPL", "http://x/1").await.unwrap());
        assert!(!store.article_exists("MSFT", "http://x/1").await.unwrap());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn company_first_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShardStore::open(dir.path(), "db.sqlite", Some("AAPL"))
            .await
            .unwrap();

        let mut company = Company {
            symbol: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            industry: "Computers".to_string(),
            sector: "Technology".to_string(),
            description: "Makes phones.".to_string(),
        };
        store.insert_company(company.clone()).await.unwrap();
        company.name = "Apple Computer".to_string();
        store.insert_company(company).await.unwrap();

        let companies = store.all_companies().await.unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name, "Apple Inc.");
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_is_idempotent_and_migrates_legacy_rows() {
        let dir = tempfile::tempdir().unwrap();

        // seed a pre-migration shard lacking the source column
        let path = shard_path(dir.path(), "db.sqlite", Some("AAPL"));
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE articles (
                    article_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    symbol VARCHAR(10), headline VARCHAR(255), date VARCHAR(10),
                    content TEXT, url VARCHAR(255), UNIQUE(symbol, url));",
            )
            .unwrap();
            conn.execute(
                "INSERT INTO articles (symbol, headline, date, content, url)
                 VALUES ('AAPL', 'Old', '2019-01-01', 'Body', 'http://x/old')",
                [],
            )
            .unwrap();
        }

        let store = ShardStore::open(dir.path(), "db.sqlite", Some("AAPL"))
            .await
            .unwrap();
        let articles = store.all_articles().await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source, "marketwatch");
        store.close().await.unwrap();

        // open twice more; schema setup and migration must not error
        for _ in 0..2 {
            let store = ShardStore::open(dir.path(), "db.sqlite", Some("AAPL"))
                .await
                .unwrap();
            assert_eq!(store.article_count().await.unwrap(), 1);
            store.close().await.unwrap();
        }
    }
}
