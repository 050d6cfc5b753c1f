use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mc_core::{Article, ArticleStatus, ArticleStore, Error, ForwardRecord, Language, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT NOT NULL,
        link TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        raw_content BLOB NOT NULL,
        title TEXT,
        body_content TEXT,
        published_time TEXT,
        published_raw TEXT,
        language_code TEXT,
        language_name TEXT,
        status TEXT NOT NULL,
        fetched_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_source ON articles (source)",
    "CREATE INDEX IF NOT EXISTS idx_articles_status ON articles (status)",
    r#"
    CREATE TABLE IF NOT EXISTS forward_records (
        handle TEXT NOT NULL,
        article_id TEXT NOT NULL
    )
    "#,
    // Add future migrations here
];

fn storage_error(context: &str, e: sqlx::Error) -> Error {
    Error::Storage(format!("{}: {}", context, e))
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at ./articles.db"
    }

    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new("articles.db")).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| storage_error("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| storage_error(&format!("Failed to run migration {}", i), e))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }

    fn article_from_row(row: &SqliteRow) -> Result<Article> {
        let get_text = |column: &str| -> Result<String> {
            row.try_get::<String, _>(column)
                .map_err(|e| storage_error(&format!("Failed to read {}", column), e))
        };
        let get_opt = |column: &str| -> Result<Option<String>> {
            row.try_get::<Option<String>, _>(column)
                .map_err(|e| storage_error(&format!("Failed to read {}", column), e))
        };
        let parse_time = |value: &str| -> Result<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::Storage(format!("Failed to parse stored date {}: {}", value, e)))
        };

        let id = get_text("id")?;
        let language = match (get_opt("language_code")?, get_opt("language_name")?) {
            (Some(code), Some(name)) => Some(Language { code, name }),
            _ => None,
        };

        Ok(Article {
            id: Uuid::parse_str(&id)
                .map_err(|e| Error::Storage(format!("Invalid article id {}: {}", id, e)))?,
            link: get_text("link")?,
            source: get_text("source")?,
            raw_content: row
                .try_get::<Vec<u8>, _>("raw_content")
                .map_err(|e| storage_error("Failed to read raw_content", e))?,
            title: get_opt("title")?,
            body_content: get_opt("body_content")?,
            published_time: get_opt("published_time")?
                .map(|value| parse_time(&value))
                .transpose()?,
            published_raw: get_opt("published_raw")?,
            language,
            status: ArticleStatus::from_str(&get_text("status")?)?,
            fetched_at: parse_time(&get_text("fetched_at")?)?,
        })
    }

    fn articles_from_rows(rows: &[SqliteRow]) -> Result<Vec<Article>> {
        rows.iter().map(Self::article_from_row).collect()
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn exists(&self, link: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE link = ?")
            .bind(link)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| storage_error("Failed to look up article", e))?;
        Ok(row.is_some())
    }

    async fn find_by_link(&self, link: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE link = ?")
            .bind(link)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| storage_error("Failed to look up article", e))?;
        row.as_ref().map(Self::article_from_row).transpose()
    }

    async fn insert_article(&self, article: &Article) -> Result<()> {
        let (language_code, language_name) = match &article.language {
            Some(lang) => (Some(lang.code.as_str()), Some(lang.name.as_str())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO articles
            (id, link, source, raw_content, title, body_content, published_time,
             published_raw, language_code, language_name, status, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article.id.to_string())
        .bind(&article.link)
        .bind(&article.source)
        .bind(&article.raw_content)
        .bind(article.title.as_deref())
        .bind(article.body_content.as_deref())
        .bind(article.published_time.map(|t| t.to_rfc3339()))
        .bind(article.published_raw.as_deref())
        .bind(language_code)
        .bind(language_name)
        .bind(article.status.as_str())
        .bind(article.fetched_at.to_rfc3339())
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(Error::Duplicate(article.link.clone()))
            }
            Err(e) => Err(storage_error("Failed to store article", e)),
        }
    }

    async fn get_by_source(&self, source: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE source = ?
            ORDER BY fetched_at DESC, link ASC
            "#,
        )
        .bind(source)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage_error("Failed to get articles by source", e))?;

        Self::articles_from_rows(&rows)
    }

    async fn find_by_status(&self, status: ArticleStatus, limit: usize, skip: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE status = ?
            ORDER BY fetched_at DESC, link ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(status.as_str())
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage_error("Failed to get articles by status", e))?;

        Self::articles_from_rows(&rows)
    }

    async fn count_by_status(&self, status: ArticleStatus) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| storage_error("Failed to count articles", e))?;
        Ok(count as usize)
    }

    async fn update_status(&self, link: &str, status: ArticleStatus) -> Result<()> {
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM articles WHERE link = ?")
            .bind(link)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| storage_error("Failed to read article status", e))?;
        let current = current
            .ok_or_else(|| Error::NotFound(link.to_string()))?
            .parse::<ArticleStatus>()?;

        if !current.can_advance_to(status) {
            return Err(Error::StatusRegression {
                link: link.to_string(),
                from: current,
                to: status,
            });
        }

        // Guarded on the status we read so a concurrent writer cannot be overwritten.
        let result = sqlx::query("UPDATE articles SET status = ? WHERE link = ? AND status = ?")
            .bind(status.as_str())
            .bind(link)
            .bind(current.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| storage_error("Failed to update article status", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::StatusRegression {
                link: link.to_string(),
                from: current,
                to: status,
            });
        }
        Ok(())
    }

    async fn find_unparsed_dates(&self, limit: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE published_time IS NULL AND published_raw IS NOT NULL
            ORDER BY fetched_at DESC, link ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage_error("Failed to find unparsed dates", e))?;

        Self::articles_from_rows(&rows)
    }

    async fn set_published_time(&self, link: &str, published: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE articles SET published_time = ? WHERE link = ?")
            .bind(published.to_rfc3339())
            .bind(link)
            .execute(&*self.pool)
            .await
            .map_err(|e| storage_error("Failed to set published time", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(link.to_string()));
        }
        Ok(())
    }

    async fn record_forward(&self, record: &ForwardRecord) -> Result<()> {
        sqlx::query("INSERT INTO forward_records (handle, article_id) VALUES (?, ?)")
            .bind(&record.handle)
            .bind(record.article_id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(|e| storage_error("Failed to record forward", e))?;
        Ok(())
    }

    async fn forward_records(&self) -> Result<Vec<ForwardRecord>> {
        let rows = sqlx::query("SELECT handle, article_id FROM forward_records ORDER BY rowid")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| storage_error("Failed to read forward records", e))?;

        rows.iter()
            .map(|row| {
                let handle: String = row
                    .try_get("handle")
                    .map_err(|e| storage_error("Failed to read handle", e))?;
                let article_id: String = row
                    .try_get("article_id")
                    .map_err(|e| storage_error("Failed to read article_id", e))?;
                Ok(ForwardRecord {
                    handle,
                    article_id: Uuid::parse_str(&article_id)
                        .map_err(|e| Error::Storage(format!("Invalid article id {}: {}", article_id, e)))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn article(link: &str) -> Article {
        let mut article = Article::fetched(link, "estadao", vec![0x78, 0x9c, 0x01]);
        article.title = Some("Título".to_string());
        article.language = Some(Language {
            code: "pt".to_string(),
            name: "PORTUGUESE".to_string(),
        });
        article.status = ArticleStatus::Extracted;
        article
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        // Create a temporary directory for the test database
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();

        let article = article("http://example.com/1");
        storage.insert_article(&article).await.unwrap();
        assert!(storage.exists(&article.link).await.unwrap());

        let stored = storage.find_by_link(&article.link).await.unwrap().unwrap();
        assert_eq!(stored.id, article.id);
        assert_eq!(stored.raw_content, article.raw_content);
        assert_eq!(stored.title.as_deref(), Some("Título"));
        assert_eq!(stored.language, article.language);
        assert!(stored.body_content.is_none());
        assert!(stored.published_time.is_none());
        assert_eq!(stored.status, ArticleStatus::Extracted);
    }

    #[tokio::test]
    async fn test_sqlite_rejects_duplicate_link() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("dup.db"))
            .await
            .unwrap();

        storage.insert_article(&article("http://example.com/1")).await.unwrap();
        let err = storage
            .insert_article(&article("http://example.com/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_sqlite_status_and_forwarding() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("fwd.db"))
            .await
            .unwrap();
        let article = article("http://example.com/1");
        storage.insert_article(&article).await.unwrap();

        assert_eq!(storage.count_by_status(ArticleStatus::Extracted).await.unwrap(), 1);
        let err = storage
            .update_status(&article.link, ArticleStatus::Fetched)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StatusRegression { .. }));

        let record = ForwardRecord {
            handle: "doc-1".to_string(),
            article_id: article.id,
        };
        storage.record_forward(&record).await.unwrap();
        storage
            .update_status(&article.link, ArticleStatus::SentDownstream)
            .await
            .unwrap();

        assert_eq!(storage.forward_records().await.unwrap(), vec![record]);
        assert!(storage
            .find_by_status(ArticleStatus::Extracted, 10, 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_date_repair_update() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("dates.db"))
            .await
            .unwrap();
        let mut article = article("http://example.com/1");
        article.published_raw = Some("Seg, 21 Out 2013 22:14:36 -0200".to_string());
        storage.insert_article(&article).await.unwrap();

        assert_eq!(storage.find_unparsed_dates(10).await.unwrap().len(), 1);
        let when = DateTime::parse_from_rfc3339("2013-10-22T00:14:36Z")
            .unwrap()
            .with_timezone(&Utc);
        storage.set_published_time(&article.link, when).await.unwrap();

        assert!(storage.find_unparsed_dates(10).await.unwrap().is_empty());
        let stored = storage.find_by_link(&article.link).await.unwrap().unwrap();
        assert_eq!(stored.published_time, Some(when));
    }
}
