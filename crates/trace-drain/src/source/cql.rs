//! Cassandra / Scylla trace source
//!
//! Reads the `system_traces.sessions` table (or whatever keyspace and table
//! are configured) through the Scylla driver, which also speaks to Cassandra.
//!
//! ```text
//! SELECT session_id, client, command, coordinator, parameters,
//!        duration, request, started_at FROM sessions
//! ```
//!
//! Rows are pulled page by page, so a large table is never materialized in
//! memory. One session is opened at startup and reused for every cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::unprepared::Statement;
use scylla::statement::Consistency;
use scylla::value::CqlTimestamp;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::TraceSource;
use crate::config::{ConsistencyLevel, SourceSettings};
use crate::error::{DrainError, Result};
use crate::record::TraceRecord;

/// Columns in the order of the select list
type SessionRow = (
    Uuid,
    Option<IpAddr>,
    Option<String>,
    Option<IpAddr>,
    Option<HashMap<String, String>>,
    Option<i32>,
    Option<String>,
    Option<CqlTimestamp>,
);

/// Trace source backed by a long-lived CQL session
pub struct CqlTraceSource {
    session: Session,
    table: String,
    consistency: Consistency,
    request_timeout: Duration,
    truncate_timeout: Duration,
    page_size: i32,
}

impl CqlTraceSource {
    /// Connect to the cluster and switch to the configured keyspace
    pub async fn connect(settings: &SourceSettings) -> Result<Self> {
        info!(
            hosts = ?settings.hosts,
            keyspace = %settings.keyspace,
            consistency = ?settings.consistency,
            "Connecting to trace source"
        );

        let mut builder = SessionBuilder::new()
            .known_nodes(&settings.hosts)
            .connection_timeout(settings.connection_timeout())
            .use_keyspace(&settings.keyspace, false);

        if let Some(ref username) = settings.username {
            let password = settings
                .password
                .as_ref()
                .map(|p| p.expose_secret())
                .unwrap_or_default();
            builder = builder.user(username, password);
        }

        let session = builder.build().await.map_err(|e| {
            DrainError::connection(format!(
                "failed to connect to {:?}: {}",
                settings.hosts, e
            ))
        })?;

        Ok(Self {
            session,
            table: settings.table.clone(),
            consistency: to_consistency(settings.consistency),
            request_timeout: settings.request_timeout(),
            truncate_timeout: settings.truncate_timeout(),
            page_size: settings.page_size,
        })
    }

    fn statement(&self, cql: String) -> Statement {
        statement(cql, self.consistency, self.request_timeout)
    }

    fn select_cql(&self) -> String {
        format!(
            "SELECT session_id, client, command, coordinator, parameters, duration, request, started_at FROM {}",
            self.table
        )
    }
}

#[async_trait]
impl TraceSource for CqlTraceSource {
    fn name(&self) -> &str {
        &self.table
    }

    async fn read(&self) -> Result<BoxStream<'static, Result<TraceRecord>>> {
        let mut statement = self.statement(self.select_cql());
        statement.set_page_size(self.page_size);

        debug!(table = %self.table, page_size = self.page_size, "Opening trace query");

        let pager = self
            .session
            .query_iter(statement, ())
            .await
            .map_err(|e| DrainError::source_query(format!("{}: {}", self.table, e)))?;

        let rows = pager
            .rows_stream::<SessionRow>()
            .map_err(|e| DrainError::source_query(format!("{}: {}", self.table, e)))?;

        Ok(rows
            .map(|row| {
                row.map(into_record)
                    .map_err(|e| DrainError::source_stream(e.to_string()))
            })
            .boxed())
    }

    async fn truncate(&self) -> Result<()> {
        let statement = statement(
            format!("TRUNCATE {}", self.table),
            self.consistency,
            self.truncate_timeout,
        );
        debug!(
            table = %self.table,
            timeout_ms = self.truncate_timeout.as_millis() as u64,
            "Truncating trace table"
        );
        self.session
            .query_unpaged(statement, ())
            .await
            .map_err(|e| DrainError::truncate(format!("{}: {}", self.table, e)))?;
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        self.session
            .query_unpaged(
                self.statement("SELECT release_version FROM system.local".to_string()),
                (),
            )
            .await
            .map_err(|e| DrainError::connection(e.to_string()))?;
        Ok(())
    }
}

fn statement(cql: String, consistency: Consistency, timeout: Duration) -> Statement {
    let mut statement = Statement::new(cql);
    statement.set_consistency(consistency);
    statement.set_request_timeout(Some(timeout));
    statement
}

fn to_consistency(level: ConsistencyLevel) -> Consistency {
    match level {
        ConsistencyLevel::Any => Consistency::Any,
        ConsistencyLevel::One => Consistency::One,
        ConsistencyLevel::Two => Consistency::Two,
        ConsistencyLevel::Three => Consistency::Three,
        ConsistencyLevel::Quorum => Consistency::Quorum,
        ConsistencyLevel::All => Consistency::All,
        ConsistencyLevel::LocalQuorum => Consistency::LocalQuorum,
        ConsistencyLevel::EachQuorum => Consistency::EachQuorum,
        ConsistencyLevel::LocalOne => Consistency::LocalOne,
    }
}

/// Flatten nulls the way a plain scan into zero values would
fn into_record(row: SessionRow) -> TraceRecord {
    let (session_id, client, command, coordinator, parameters, duration, request, started_at) =
        row;

    TraceRecord {
        session_id: session_id.to_string(),
        client: client.map(|a| a.to_string()).unwrap_or_default(),
        command: command.unwrap_or_default(),
        coordinator: coordinator.map(|a| a.to_string()).unwrap_or_default(),
        duration: duration.map(i64::from).unwrap_or_default(),
        parameters: parameters.unwrap_or_default(),
        request: request.unwrap_or_default(),
        started_at: started_at.and_then(|ts| DateTime::<Utc>::from_timestamp_millis(ts.0)),
    }
}
