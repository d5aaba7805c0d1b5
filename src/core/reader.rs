use crate::core::config::ReaderConfig;
use crate::core::error::ReadError;
use crate::core::fetch_progress::ProgressSink;
use crate::core::models::{DataPath, Person, validate_person};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Capability the fetch controller drives to obtain people records.
///
/// Implementations report progress as a percentage through `progress` and are
/// expected to observe `cancel` cooperatively, returning
/// [`ReadError::Canceled`] once they notice it has been signaled.
#[async_trait]
pub trait PersonReader: Send + Sync {
    async fn read(
        &self,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<Vec<Person>, ReadError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RosterSource {
    /// Built-in roster, used when no people file is configured
    Sample,
    /// JSON array of people
    File(PathBuf),
}

/// Reads a roster one record at a time, pausing `record_delay` per record.
pub struct RosterReader {
    source: RosterSource,
    record_delay: Duration,
}

impl RosterReader {
    pub fn new(source: RosterSource, record_delay: Duration) -> Self {
        Self {
            source,
            record_delay,
        }
    }

    pub fn from_config(config: &ReaderConfig, data_path: &DataPath) -> Self {
        let source = match &config.people_file {
            Some(path) => RosterSource::File(data_path.resolve(path)),
            None => RosterSource::Sample,
        };
        Self::new(source, Duration::from_millis(config.record_delay_ms))
    }

    pub fn source(&self) -> &RosterSource {
        &self.source
    }

    async fn load(&self) -> Result<Vec<Person>, ReadError> {
        match &self.source {
            RosterSource::Sample => Ok(sample_roster()),
            RosterSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ReadError::fault("IO", &format!("{}: {e}", path.display()))
                })?;
                let people: Vec<Person> = serde_json::from_str(&content)?;
                Ok(people)
            }
        }
    }
}

#[async_trait]
impl PersonReader for RosterReader {
    async fn read(
        &self,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<Vec<Person>, ReadError> {
        if cancel.is_cancelled() {
            return Err(ReadError::Canceled);
        }

        let roster = self.load().await?;
        let total = roster.len();
        log::debug!(
            "Reading {total} people for fetch {} from {:?}",
            progress.fetch_id(),
            self.source
        );

        let mut people = Vec::with_capacity(total);
        let mut invalid = Vec::new();

        for (index, person) in roster.into_iter().enumerate() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("Fetch {} canceled after {index} of {total} records", progress.fetch_id());
                    return Err(ReadError::Canceled);
                }
                _ = tokio::time::sleep(self.record_delay) => {}
            }

            match validate_person(&person) {
                Ok(()) => people.push(person),
                Err(message) => invalid.push(ReadError::fault("Validation", &message)),
            }
            progress.report(percent_complete(index + 1, total));
        }

        if total == 0 {
            progress.report(100);
        }

        if !invalid.is_empty() {
            return Err(ReadError::Aggregate(invalid));
        }

        Ok(people)
    }
}

fn percent_complete(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as u8
}

pub fn sample_roster() -> Vec<Person> {
    let roster = [
        (1, "John", "Koenig", (1975, 10, 17), 6),
        (2, "Dylan", "Hunt", (2000, 10, 2), 8),
        (3, "John", "Crichton", (1999, 3, 19), 7),
        (4, "Dave", "Lister", (1988, 2, 15), 9),
        (5, "John", "Sheridan", (1994, 1, 26), 6),
        (6, "Dante", "Montana", (2000, 11, 1), 5),
        (7, "Isaac", "Gampu", (1977, 9, 10), 4),
    ];

    roster
        .into_iter()
        .filter_map(|(id, given, family, (y, m, d), rating)| {
            NaiveDate::from_ymd_opt(y, m, d)
                .map(|start_date| Person::new(id, given, family, start_date, rating))
        })
        .collect()
}
