use crate::core::error::ReadError;
use crate::core::fetch_progress::ProgressSink;
use crate::core::models::Person;
use crate::core::reader::PersonReader;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn person_a() -> Person {
    Person::new(
        1,
        "John",
        "Koenig",
        NaiveDate::from_ymd_opt(1975, 10, 17).unwrap(),
        6,
    )
}

pub fn person_b() -> Person {
    Person::new(
        2,
        "Dylan",
        "Hunt",
        NaiveDate::from_ymd_opt(2000, 10, 2).unwrap(),
        8,
    )
}

#[derive(Debug, Clone)]
pub enum Step {
    Progress(u8),
    Sleep(Duration),
}

#[derive(Debug, Clone)]
pub enum Ending {
    Return(Vec<Person>),
    Fail(ReadError),
    /// Block until the token is signaled, then report cancellation
    WaitForCancel,
    Panic(&'static str),
}

#[derive(Debug, Clone)]
pub struct Script {
    pub steps: Vec<Step>,
    pub ending: Ending,
}

impl Script {
    pub fn new(steps: Vec<Step>, ending: Ending) -> Self {
        Self { steps, ending }
    }

    pub fn progress(reports: &[u8], ending: Ending) -> Self {
        Self::new(reports.iter().map(|p| Step::Progress(*p)).collect(), ending)
    }
}

/// Reader that plays back one script per fetch; fetch N gets `scripts[N - 1]`.
pub struct ScriptedReader {
    scripts: Vec<Script>,
    calls: AtomicUsize,
}

impl ScriptedReader {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn single(script: Script) -> Self {
        Self::new(vec![script])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersonReader for ScriptedReader {
    async fn read(
        &self,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<Vec<Person>, ReadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = (progress.fetch_id().0 as usize).saturating_sub(1);
        let script = self
            .scripts
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("No script for fetch {}", progress.fetch_id()));

        for step in script.steps {
            match step {
                Step::Progress(percent) => progress.report(percent),
                Step::Sleep(duration) => tokio::time::sleep(duration).await,
            }
        }

        match script.ending {
            Ending::Return(people) => Ok(people),
            Ending::Fail(error) => Err(error),
            Ending::WaitForCancel => {
                cancel.cancelled().await;
                Err(ReadError::Canceled)
            }
            Ending::Panic(message) => panic!("{message}"),
        }
    }
}
