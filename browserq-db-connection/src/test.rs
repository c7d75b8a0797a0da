#[cfg(test)]
mod tests {
    use crate::config::{DEFAULT_BUSY_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS};
    use crate::utils::display_path;
    use crate::*;
    use std::path::Path;

    #[test]
    fn test_config_creation() {
        let config = StoreConnectionConfig::new("jobs.sqlite");
        assert_eq!(config.path, Path::new("jobs.sqlite"));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.busy_timeout_secs, DEFAULT_BUSY_TIMEOUT_SECS);
        assert!(!config.create_if_missing);
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let config = StoreConnectionConfig::default();
        assert!(matches!(
            config.validate(),
            Err(DbConnectionError::EmptyDatabasePath)
        ));
    }

    #[test]
    fn test_validate_rejects_zero_connections() {
        let config = StoreConnectionConfig {
            max_connections: 0,
            ..StoreConnectionConfig::new("jobs.sqlite")
        };
        assert!(matches!(
            config.validate(),
            Err(DbConnectionError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(Path::new("")), "<unset>");
        assert_eq!(display_path(Path::new("/var/lib/q.db")), "/var/lib/q.db");
    }

    #[test]
    fn test_const_timeouts() {
        let config = StoreConnectionConfig {
            busy_timeout_secs: 7,
            connect_timeout_secs: 42,
            ..Default::default()
        };
        assert_eq!(config.busy_timeout(), std::time::Duration::from_secs(7));
        assert_eq!(config.connect_timeout(), std::time::Duration::from_secs(42));
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StoreConnectionConfig::new(dir.path().join("absent.sqlite"));
        let err = create_pool(&config).await.expect_err("must not create");
        assert!(matches!(err, DbConnectionError::DatabaseNotFound(_)));
        assert!(!dir.path().join("absent.sqlite").exists());
    }

    #[tokio::test]
    async fn test_create_if_missing_builds_file_and_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("jobs.sqlite");
        let config = StoreConnectionConfig::new(&path).create_if_missing(true);
        let pool = create_pool(&config).await.expect("create pool");

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("journal mode");
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
        pool.close().await;
    }
}
