use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_core::{
    config::DatabaseConfig,
    models::{ResultReport, TaskResult, TaskRunStatistics, TaskStatus},
    traits::{TaskResultRepository, UpsertOutcome},
    SchedulerError, SchedulerResult,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::database::run_key;

pub struct SqliteTaskResultRepository {
    pool: SqlitePool,
}

impl SqliteTaskResultRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 按配置连接SQLite并初始化表结构
    pub async fn connect(config: &DatabaseConfig) -> SchedulerResult<Self> {
        debug!("Creating SQLite task result repository at: {}", config.url);

        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect_with(connect_options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// 运行数据库迁移
    pub async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
        debug!("Running SQLite database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_results (
                task_id TEXT PRIMARY KEY,
                task TEXT,
                status TEXT NOT NULL,
                result TEXT NOT NULL DEFAULT 'null',
                last_change DATETIME NOT NULL,
                last_success DATETIME
            )
            "#,
        )
        .execute(pool)
        .await?;

        // 运行历史，同一 run_id 的重复投递只计一次
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_run_history (
                task_id TEXT NOT NULL,
                run_key TEXT NOT NULL,
                status TEXT NOT NULL,
                recorded_at DATETIME NOT NULL,
                PRIMARY KEY (task_id, run_key)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_task_run_history_task_id ON task_run_history(task_id)",
        )
        .execute(pool)
        .await?;

        debug!("Successfully completed SQLite database migrations");
        Ok(())
    }

    fn row_to_task_result(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<TaskResult> {
        let status: String = row.try_get("status")?;
        let result: String = row.try_get("result")?;

        Ok(TaskResult {
            task_id: row.try_get("task_id")?,
            task: row.try_get("task")?,
            status: TaskStatus::parse(&status)?,
            result: serde_json::from_str::<Value>(&result).map_err(|e| {
                SchedulerError::Serialization(format!("任务结果不是合法JSON: {e}"))
            })?,
            last_change: row.try_get::<DateTime<Utc>, _>("last_change")?,
            last_success: row.try_get::<Option<DateTime<Utc>>, _>("last_success")?,
        })
    }
}

#[async_trait]
impl TaskResultRepository for SqliteTaskResultRepository {
    #[instrument(skip(self, report), fields(task_id = %report.task_id, status = %report.status))]
    async fn upsert(&self, report: &ResultReport) -> SchedulerResult<UpsertOutcome> {
        let now = Utc::now();
        let result = serde_json::to_string(&report.result)?;
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM task_results WHERE task_id = ?")
            .bind(&report.task_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();

        sqlx::query(
            r#"
            INSERT INTO task_results (task_id, task, status, result, last_change, last_success)
            VALUES (?1, ?2, ?3, ?4, ?5, CASE WHEN ?3 = 'SUCCESS' THEN ?5 ELSE NULL END)
            ON CONFLICT(task_id) DO UPDATE SET
                task = COALESCE(excluded.task, task_results.task),
                status = excluded.status,
                result = excluded.result,
                last_change = excluded.last_change,
                last_success = CASE
                    WHEN excluded.status = 'SUCCESS' THEN excluded.last_change
                    ELSE task_results.last_success
                END
            "#,
        )
        .bind(&report.task_id)
        .bind(&report.task)
        .bind(report.status.as_str())
        .bind(&result)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if report.status.is_terminal() {
            sqlx::query(
                r#"
                INSERT INTO task_run_history (task_id, run_key, status, recorded_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(task_id, run_key) DO NOTHING
                "#,
            )
            .bind(&report.task_id)
            .bind(run_key(report))
            .bind(report.status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    #[instrument(skip(self))]
    async fn get(&self, task_id: &str) -> SchedulerResult<Option<TaskResult>> {
        let row = sqlx::query("SELECT * FROM task_results WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_task_result).transpose()
    }

    #[instrument(skip(self))]
    async fn statistics(&self, task_id: &str) -> SchedulerResult<TaskRunStatistics> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'SUCCESS' THEN 1 ELSE 0 END), 0) AS successes,
                COALESCE(SUM(CASE WHEN status = 'FAILURE' THEN 1 ELSE 0 END), 0) AS failures
            FROM task_run_history
            WHERE task_id = ?
            "#,
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;

        let successes: i64 = row.try_get("successes")?;
        let failures: i64 = row.try_get("failures")?;
        Ok(TaskRunStatistics::from_counts(
            successes.max(0) as u64,
            failures.max(0) as u64,
        ))
    }

    async fn count(&self) -> SchedulerResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
