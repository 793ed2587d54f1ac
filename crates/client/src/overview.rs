use stringr_shared::stringing::current_string_job;
use stringr_shared::{Racquet, Session, StringJob};

use crate::backend::Backend;
use crate::error::ClientError;

/// Everything the racquet detail view shows
#[derive(Debug, Clone)]
pub struct RacquetOverview {
    pub racquet: Racquet,
    /// Newest first
    pub string_jobs: Vec<StringJob>,
    /// Sessions of every job above, grouped by job in the same order
    pub sessions: Vec<Session>,
}

impl RacquetOverview {
    pub fn current_string_job(&self) -> Option<&StringJob> {
        current_string_job(&self.string_jobs)
    }

    pub fn sessions_for<'a>(&'a self, string_job_id: &'a str) -> impl Iterator<Item = &'a Session> {
        self.sessions
            .iter()
            .filter(move |s| s.string_job.as_deref() == Some(string_job_id))
    }
}

impl Backend {
    /// Loads the racquet, its jobs, then each job's sessions one after another.
    pub async fn racquet_overview(&self, racquet_id: &str) -> Result<RacquetOverview, ClientError> {
        let racquet = self.racquets().get(racquet_id).await?;
        let string_jobs = self.string_jobs().by_racquet(racquet_id).await?.items;

        let mut sessions = Vec::new();
        for job in &string_jobs {
            sessions.extend(self.sessions().by_string_job(&job.id).await?.items);
        }

        tracing::debug!(
            racquet = racquet_id,
            jobs = string_jobs.len(),
            sessions = sessions.len(),
            "Loaded racquet overview"
        );

        Ok(RacquetOverview {
            racquet,
            string_jobs,
            sessions,
        })
    }
}
