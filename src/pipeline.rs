use anyhow::Result;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::{io::Read, path::Path, time::Instant};
use tracing::{info, instrument};

use crate::classify::StackPolicy;
use crate::ingest::{ChunkedReader, RawPosting};
use crate::output::ParquetSink;
use crate::sanitize::{clean_numeric, impute_salary_avg, parse_count, parse_posting_date};
use crate::sector::{self, Sector};

/// Cleaned, single-label output record. Created once per retained input row,
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPosting {
    pub job_title: String,
    pub company: Option<String>,
    pub category: Sector,
    pub salary_avg: Option<f64>,
    pub posting_date: Option<NaiveDate>,
    pub tech_stack: String,
    pub num_applications: Option<u64>,
}

/// Why a record was excluded from the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No recognized sector, including an unparseable categories field.
    SectorMismatch,
    /// Empty or whitespace-only job title. Policy decision: such records are
    /// dropped rather than retained as "Other", since the downstream
    /// contract requires a non-null title on every row.
    MissingTitle,
}

#[derive(Debug, PartialEq)]
pub enum Transformed {
    Keep(CanonicalPosting),
    Drop(DropReason),
}

/// Per-record transform: sector filter, then title check, then
/// classification and field sanitization. Pure — no state shared between
/// records, which is what lets chunks run through rayon.
pub fn transform(raw: &RawPosting, policy: &StackPolicy) -> Transformed {
    let categories = raw.categories.as_deref().unwrap_or("");
    let sector = match sector::primary_sector(categories) {
        Some(s) => s,
        None => return Transformed::Drop(DropReason::SectorMismatch),
    };

    let title = raw.job_title.as_deref().map(str::trim).unwrap_or("");
    if title.is_empty() {
        return Transformed::Drop(DropReason::MissingTitle);
    }

    let salary_min = raw.salary_min.as_deref().and_then(clean_numeric);
    let salary_max = raw.salary_max.as_deref().and_then(clean_numeric);
    let salary_avg = raw.salary_avg.as_deref().and_then(clean_numeric);

    Transformed::Keep(CanonicalPosting {
        job_title: title.to_string(),
        company: raw.company.clone(),
        category: sector,
        salary_avg: impute_salary_avg(salary_avg, salary_min, salary_max),
        posting_date: raw.posting_date.as_deref().and_then(parse_posting_date),
        tech_stack: policy.classify(title).to_string(),
        num_applications: raw.num_applications.as_deref().and_then(parse_count),
    })
}

/// End-of-run accounting. `total_rows` counts every input row, including
/// the ones the CSV layer could not decode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub total_rows: u64,
    pub retained: u64,
    pub dropped_sector: u64,
    pub dropped_title: u64,
    pub rows_unreadable: u64,
}

/// Run the full pipeline: chunked read, parallel per-record transform with
/// order-preserving reassembly, append to the Parquet sink, atomic publish.
/// Field- and record-level failures never abort the batch; only I/O does,
/// in which case the temp file is removed and no artifact is published.
#[instrument(level = "info", skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn run(
    input: &Path,
    output: &Path,
    policy: &StackPolicy,
    chunk_size: usize,
) -> Result<RunSummary> {
    let start = Instant::now();
    let mut reader = ChunkedReader::open(input, chunk_size)?;
    let mut sink = ParquetSink::create(output)?;

    match drive(&mut reader, &mut sink, policy) {
        Ok(mut summary) => {
            summary.rows_unreadable = reader.unreadable_rows();
            summary.total_rows += summary.rows_unreadable;
            sink.finish()?;
            info!(
                total = summary.total_rows,
                retained = summary.retained,
                dropped_sector = summary.dropped_sector,
                dropped_title = summary.dropped_title,
                unreadable = summary.rows_unreadable,
                policy = policy.version(),
                elapsed = ?start.elapsed(),
                "run complete"
            );
            Ok(summary)
        }
        Err(e) => {
            sink.discard();
            Err(e)
        }
    }
}

fn drive<R: Read>(
    reader: &mut ChunkedReader<R>,
    sink: &mut ParquetSink,
    policy: &StackPolicy,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    while let Some(chunk) = reader.next_chunk()? {
        summary.total_rows += chunk.len() as u64;

        // par_iter + collect keeps input order, so the output stays
        // deterministic regardless of scheduling.
        let transformed: Vec<Transformed> = chunk
            .par_iter()
            .map(|raw| transform(raw, policy))
            .collect();

        let mut retained = Vec::with_capacity(transformed.len());
        for t in transformed {
            match t {
                Transformed::Keep(posting) => retained.push(posting),
                Transformed::Drop(DropReason::SectorMismatch) => summary.dropped_sector += 1,
                Transformed::Drop(DropReason::MissingTitle) => summary.dropped_title += 1,
            }
        }

        summary.retained += retained.len() as u64;
        sink.write_chunk(&retained)?;
    }

    Ok(summary)
}
