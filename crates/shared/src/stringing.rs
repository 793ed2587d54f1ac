//! Helpers around stringing jobs: which one is current, and how to label them.

use crate::records::{StringJob, TennisString};

/// The racquet's current stringing: the job with the latest `created`.
///
/// Equal timestamps go to the job that appears later in `jobs`. A job
/// without a timestamp never beats one that has one.
pub fn current_string_job(jobs: &[StringJob]) -> Option<&StringJob> {
    jobs.iter()
        .enumerate()
        .max_by_key(|(position, job)| (job.created, *position))
        .map(|(_, job)| job)
}

/// "55 lbs", "55/53 lbs" or "Not specified"
pub fn format_tension(main: Option<f64>, cross: Option<f64>) -> String {
    match (main, cross) {
        (Some(main), Some(cross)) if main == cross => format!("{main} lbs"),
        (Some(main), Some(cross)) => format!("{main}/{cross} lbs"),
        (Some(main), None) => format!("{main} lbs"),
        _ => "Not specified".to_string(),
    }
}

/// "Babolat RPM Blast 17", skipping absent parts
pub fn string_label(string: &TennisString) -> String {
    [
        string.brand.as_deref(),
        Some(string.model.as_str()),
        string.gauge.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Main string name plus main tension, from the expanded relation.
pub fn job_label(job: &StringJob) -> String {
    let name = job
        .expand
        .as_ref()
        .and_then(|expand| expand.main_string.as_ref())
        .map(|string| {
            [string.brand.as_deref(), Some(string.model.as_str())]
                .into_iter()
                .flatten()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_else(|| "Unknown String".to_string());
    match job.tension_lbs_main {
        Some(tension) => format!("{name} {tension}lbs"),
        None => name,
    }
}
