use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{
        Array, ArrayRef, Date32Array, Date32Builder, Float64Array, Float64Builder, StringArray,
        StringBuilder, UInt64Array, UInt64Builder,
    },
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{Duration, NaiveDate};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::{BrotliLevel, Compression},
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use crate::pipeline::CanonicalPosting;
use crate::sector::Sector;

/// Output schema, column order fixed by the downstream contract.
pub fn output_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("job_title", DataType::Utf8, false),
        Field::new("company", DataType::Utf8, true),
        Field::new("category", DataType::Utf8, false),
        Field::new("salary_avg", DataType::Float64, true),
        Field::new("date", DataType::Date32, true),
        Field::new("Tech_Stack", DataType::Utf8, false),
        Field::new("num_applications", DataType::UInt64, true),
    ]))
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// Brotli-compressed Parquet sink. Writes to a sibling `.tmp` path and only
/// renames onto the final path in `finish`, so a consumer polling the output
/// location never sees a half-written artifact.
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    schema: Arc<Schema>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    rows_written: u64,
}

impl ParquetSink {
    pub fn create(path: &Path) -> Result<Self> {
        let tmp_path = path.with_extension("tmp");
        let file = File::create(&tmp_path)
            .with_context(|| format!("creating temp output {}", tmp_path.display()))?;

        let props = WriterProperties::builder()
            .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
            .set_dictionary_enabled(true)
            .build();

        let schema = output_schema();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
            .context("creating parquet writer")?;

        Ok(Self {
            writer,
            schema,
            tmp_path,
            final_path: path.to_path_buf(),
            rows_written: 0,
        })
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Append a chunk of canonical rows, preserving their order.
    pub fn write_chunk(&mut self, rows: &[CanonicalPosting]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let batch = self.build_batch(rows)?;
        self.writer.write(&batch).context("writing batch to parquet")?;
        self.rows_written += rows.len() as u64;
        debug!(rows = rows.len(), "wrote chunk");
        Ok(())
    }

    fn build_batch(&self, rows: &[CanonicalPosting]) -> Result<RecordBatch> {
        let mut job_title = StringBuilder::new();
        let mut company = StringBuilder::new();
        let mut category = StringBuilder::new();
        let mut salary_avg = Float64Builder::new();
        let mut date = Date32Builder::new();
        let mut tech_stack = StringBuilder::new();
        let mut num_applications = UInt64Builder::new();

        let epoch = epoch();
        for row in rows {
            job_title.append_value(&row.job_title);
            company.append_option(row.company.as_deref());
            category.append_value(row.category.as_str());
            salary_avg.append_option(row.salary_avg);
            date.append_option(
                row.posting_date
                    .map(|d| (d - epoch).num_days() as i32),
            );
            tech_stack.append_value(&row.tech_stack);
            num_applications.append_option(row.num_applications);
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(job_title.finish()),
            Arc::new(company.finish()),
            Arc::new(category.finish()),
            Arc::new(salary_avg.finish()),
            Arc::new(date.finish()),
            Arc::new(tech_stack.finish()),
            Arc::new(num_applications.finish()),
        ];

        RecordBatch::try_new(self.schema.clone(), columns).context("building record batch")
    }

    /// Close the writer and atomically publish the artifact. If closing or
    /// the rename fails, the temp file is removed so a failed run never
    /// leaves one behind and any prior artifact stays untouched.
    pub fn finish(self) -> Result<u64> {
        let Self {
            writer,
            tmp_path,
            final_path,
            rows_written,
            ..
        } = self;

        let published = writer
            .close()
            .context("closing parquet writer")
            .and_then(|_| {
                fs::rename(&tmp_path, &final_path).with_context(|| {
                    format!(
                        "renaming {} to {}",
                        tmp_path.display(),
                        final_path.display()
                    )
                })
            });
        if let Err(e) = published {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        info!(
            rows = rows_written,
            path = %final_path.display(),
            "published output artifact"
        );
        Ok(rows_written)
    }

    /// Abandon the run: remove the temp file, leave any prior artifact as-is.
    pub fn discard(self) {
        let tmp = self.tmp_path.clone();
        drop(self.writer);
        let _ = fs::remove_file(tmp);
    }
}

/// Read an artifact back into canonical rows. Used by the round-trip tests
/// and handy for ad-hoc verification of a published file.
pub fn read_postings(path: &Path) -> Result<Vec<CanonicalPosting>> {
    let file = File::open(path)
        .with_context(|| format!("opening artifact {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("opening parquet reader")?
        .build()
        .context("building parquet reader")?;

    let epoch = epoch();
    let mut out = Vec::new();
    for batch in reader {
        let batch = batch.context("reading parquet batch")?;

        let job_title = column::<StringArray>(&batch, "job_title")?;
        let company = column::<StringArray>(&batch, "company")?;
        let category = column::<StringArray>(&batch, "category")?;
        let salary_avg = column::<Float64Array>(&batch, "salary_avg")?;
        let date = column::<Date32Array>(&batch, "date")?;
        let tech_stack = column::<StringArray>(&batch, "Tech_Stack")?;
        let num_applications = column::<UInt64Array>(&batch, "num_applications")?;

        for i in 0..batch.num_rows() {
            let sector_name = category.value(i);
            let category = Sector::from_name(sector_name)
                .ok_or_else(|| anyhow!("unknown category in artifact: {:?}", sector_name))?;

            out.push(CanonicalPosting {
                job_title: job_title.value(i).to_string(),
                company: (!company.is_null(i)).then(|| company.value(i).to_string()),
                category,
                salary_avg: (!salary_avg.is_null(i)).then(|| salary_avg.value(i)),
                posting_date: (!date.is_null(i))
                    .then(|| epoch + Duration::days(date.value(i) as i64)),
                tech_stack: tech_stack.value(i).to_string(),
                num_applications: (!num_applications.is_null(i))
                    .then(|| num_applications.value(i)),
            });
        }
    }
    Ok(out)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("artifact missing column {:?}", name))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow!("column {:?} has unexpected type", name))
}
