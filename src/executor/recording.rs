use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

use super::{Executor, Statement};
use crate::core::{BulkError, Result};
use crate::platform::Platform;

#[derive(Debug, Default)]
struct Recorded {
    statements: Vec<Statement>,
    copies: Vec<(String, Vec<String>)>,
    /// Scripted results of upcoming calls; `None` lets a call through.
    outcomes: VecDeque<Option<String>>,
    next_id: Option<i64>,
}

/// Executor that keeps every statement instead of sending it anywhere.
///
/// Affected rows are the configured value, or the number of bound rows for
/// inserts. Each insert advances the fake last insert id by its row count.
#[derive(Debug)]
pub struct RecordingExecutor {
    platform: Platform,
    affected_rows: Option<u64>,
    state: Mutex<Recorded>,
}

impl RecordingExecutor {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            affected_rows: None,
            state: Mutex::new(Recorded::default()),
        }
    }

    pub fn with_affected_rows(mut self, rows: u64) -> Self {
        self.affected_rows = Some(rows);
        self
    }

    /// First id handed out by `last_insert_id`.
    pub fn with_first_insert_id(self, id: i64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.next_id = Some(id);
        }
        self
    }

    /// Queues a failure for an upcoming `execute` or `copy_in` call. Scripted
    /// outcomes are consumed one per call, in the order they were queued.
    pub fn fail_next(&self, message: impl Into<String>) -> Result<()> {
        self.state.lock()?.outcomes.push_back(Some(message.into()));
        Ok(())
    }

    /// Queues a successful call ahead of later scripted failures.
    pub fn pass_next(&self) -> Result<()> {
        self.state.lock()?.outcomes.push_back(None);
        Ok(())
    }

    pub fn statements(&self) -> Result<Vec<Statement>> {
        Ok(self.state.lock()?.statements.clone())
    }

    pub fn copies(&self) -> Result<Vec<(String, Vec<String>)>> {
        Ok(self.state.lock()?.copies.clone())
    }

    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        state.statements.clear();
        state.copies.clear();
        Ok(())
    }
}

fn inserted_rows(statement: &Statement) -> u64 {
    let sql = statement.sql.trim_start();
    if !sql.starts_with("INSERT") {
        return 0;
    }
    let Some(values) = sql.find(" VALUES ") else {
        return 0;
    };
    // each row tuple opens with "(" after VALUES
    sql[values..].matches("(?").count() as u64
}

impl Executor for RecordingExecutor {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn execute(&self, statement: &Statement) -> Result<u64> {
        let mut state = self.state.lock()?;
        if let Some(Some(message)) = state.outcomes.pop_front() {
            return Err(BulkError::Execution(message));
        }

        debug!(sql = %statement.sql, params = statement.params.len(), "recorded statement");
        let inserted = inserted_rows(statement);
        if inserted > 0 {
            if let Some(id) = state.next_id.as_mut() {
                *id += inserted as i64;
            }
        }
        state.statements.push(statement.clone());

        Ok(self.affected_rows.unwrap_or(inserted))
    }

    fn last_insert_id(&self) -> Result<Option<String>> {
        let state = self.state.lock()?;
        let Some(next) = state.next_id else {
            return Ok(None);
        };
        let last_rows = state.statements.last().map(inserted_rows).unwrap_or(0) as i64;
        // first id of the most recent multi-row insert, as MySQL reports it
        Ok(Some((next - last_rows).to_string()))
    }

    fn copy_in(&self, command: &str, lines: &[String]) -> Result<u64> {
        if !self.platform.supports_copy() {
            return Err(BulkError::unsupported_platform(self.platform, "COPY"));
        }
        let mut state = self.state.lock()?;
        if let Some(Some(message)) = state.outcomes.pop_front() {
            return Err(BulkError::Execution(message));
        }
        state.copies.push((command.to_string(), lines.to_vec()));
        Ok(lines.len() as u64)
    }
}
