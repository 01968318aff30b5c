/// Base schema, pre-dating the `source` column. Creation is idempotent and
/// the missing column is added by the migration in `store::open`.
pub const SCHEMA: &str = r#"
-- articles table
CREATE TABLE IF NOT EXISTS articles (
    article_id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol VARCHAR(10),
    headline VARCHAR(255),
    date VARCHAR(10),
    content TEXT,
    url VARCHAR(255),
    UNIQUE(symbol, url)
);

-- companies table
CREATE TABLE IF NOT EXISTS companies (
    company_id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol VARCHAR(10) UNIQUE,
    name VARCHAR(255),
    industry VARCHAR(255),
    sector VARCHAR(255),
    description TEXT
);
"#;
