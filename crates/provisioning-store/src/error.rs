#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("query failed: {query}: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("row not found")]
    NotFound,
}

impl DbError {
    pub fn from_query(query: &'static str, source: sqlx::Error) -> Self {
        if matches!(source, sqlx::Error::RowNotFound) {
            DbError::NotFound
        } else {
            DbError::Query { query, source }
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
