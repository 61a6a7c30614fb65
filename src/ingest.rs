use anyhow::{anyhow, Context, Result};
use csv::{ByteRecord, ErrorKind, ReaderBuilder};
use std::{fs::File, io::Read, path::Path};
use tracing::warn;

/// One row of the source table, exactly as read. Every field is optional
/// text; nothing is interpreted at this stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPosting {
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub categories: Option<String>,
    pub salary_min: Option<String>,
    pub salary_max: Option<String>,
    pub salary_avg: Option<String>,
    pub posting_date: Option<String>,
    pub num_applications: Option<String>,
}

// Header aliases for the two source exports seen so far (the portal rename
// and the flattened-metadata rename). Matched case-insensitively.
const TITLE_ALIASES: &[&str] = &["title", "job_title"];
const CATEGORIES_ALIASES: &[&str] = &["categories", "category"];
const COMPANY_ALIASES: &[&str] = &["postedCompany_name", "company"];
const SALARY_MIN_ALIASES: &[&str] = &["salary_minimum", "min_salary", "salary_min"];
const SALARY_MAX_ALIASES: &[&str] = &["salary_maximum", "max_salary", "salary_max"];
const SALARY_AVG_ALIASES: &[&str] = &["average_salary", "salary_avg"];
const DATE_ALIASES: &[&str] = &["metadata_newPostingDate", "posting_date", "date"];
const APPLICATIONS_ALIASES: &[&str] = &[
    "metadata_totalNumberJobApplication",
    "num_applications",
    "applications",
];

/// Source-header → canonical-field index mapping, resolved once per file.
#[derive(Debug, Clone)]
struct ColumnMap {
    job_title: usize,
    categories: usize,
    company: Option<usize>,
    salary_min: Option<usize>,
    salary_max: Option<usize>,
    salary_avg: Option<usize>,
    posting_date: Option<usize>,
    num_applications: Option<usize>,
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.iter().any(|a| h.eq_ignore_ascii_case(a)))
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Result<Self> {
        let job_title = find_column(headers, TITLE_ALIASES)
            .ok_or_else(|| anyhow!("no title column found (expected one of {:?})", TITLE_ALIASES))?;
        let categories = find_column(headers, CATEGORIES_ALIASES).ok_or_else(|| {
            anyhow!(
                "no categories column found (expected one of {:?})",
                CATEGORIES_ALIASES
            )
        })?;

        Ok(Self {
            job_title,
            categories,
            company: find_column(headers, COMPANY_ALIASES),
            salary_min: find_column(headers, SALARY_MIN_ALIASES),
            salary_max: find_column(headers, SALARY_MAX_ALIASES),
            salary_avg: find_column(headers, SALARY_AVG_ALIASES),
            posting_date: find_column(headers, DATE_ALIASES),
            num_applications: find_column(headers, APPLICATIONS_ALIASES),
        })
    }
}

/// Streaming CSV reader yielding fixed-size chunks of [`RawPosting`]s, so a
/// multi-hundred-megabyte input never has to be resident at once. Rows the
/// CSV layer rejects (a field count disagreeing with the header row) are
/// counted and skipped, never fatal; only I/O errors abort.
pub struct ChunkedReader<R: Read> {
    reader: csv::Reader<R>,
    map: ColumnMap,
    chunk_size: usize,
    record: ByteRecord,
    unreadable_rows: u64,
}

impl ChunkedReader<File> {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening input file {}", path.display()))?;
        Self::from_reader(file, chunk_size)
    }
}

impl<R: Read> ChunkedReader<R> {
    pub fn from_reader(rdr: R, chunk_size: usize) -> Result<Self> {
        let mut reader = ReaderBuilder::new().from_reader(rdr);
        let headers: Vec<String> = reader
            .byte_headers()
            .context("reading CSV header row")?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();
        let map = ColumnMap::resolve(&headers)?;

        Ok(Self {
            reader,
            map,
            chunk_size,
            record: ByteRecord::new(),
            unreadable_rows: 0,
        })
    }

    /// Rows skipped because the CSV layer could not decode them.
    pub fn unreadable_rows(&self) -> u64 {
        self.unreadable_rows
    }

    /// Read up to `chunk_size` postings. `Ok(None)` signals end of input.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<RawPosting>>> {
        let mut chunk = Vec::with_capacity(self.chunk_size);

        while chunk.len() < self.chunk_size {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => chunk.push(self.to_posting()),
                Ok(false) => break,
                Err(e) => {
                    if matches!(e.kind(), ErrorKind::Io(_)) {
                        return Err(e).context("reading input CSV");
                    }
                    warn!(error = %e, "skipping unreadable CSV row");
                    self.unreadable_rows += 1;
                }
            }
        }

        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }

    fn to_posting(&self) -> RawPosting {
        let field = |idx: Option<usize>| -> Option<String> {
            let i = idx?;
            let raw = self.record.get(i)?;
            let s = String::from_utf8_lossy(raw);
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };

        RawPosting {
            job_title: field(Some(self.map.job_title)),
            company: field(self.map.company),
            categories: field(Some(self.map.categories)),
            salary_min: field(self.map.salary_min),
            salary_max: field(self.map.salary_max),
            salary_avg: field(self.map.salary_avg),
            posting_date: field(self.map.posting_date),
            num_applications: field(self.map.num_applications),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(csv: &str, chunk_size: usize) -> ChunkedReader<Cursor<Vec<u8>>> {
        ChunkedReader::from_reader(Cursor::new(csv.as_bytes().to_vec()), chunk_size).unwrap()
    }

    #[test]
    fn resolves_portal_export_headers() {
        let csv = "title,categories,postedCompany_name,salary_minimum,salary_maximum,average_salary,metadata_newPostingDate,metadata_totalNumberJobApplication\n\
                   Engineer,\"['Engineering']\",Acme,4000,6000,5000,2021-07-09,12\n";
        let mut r = reader(csv, 10);
        let chunk = r.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.len(), 1);
        let p = &chunk[0];
        assert_eq!(p.job_title.as_deref(), Some("Engineer"));
        assert_eq!(p.company.as_deref(), Some("Acme"));
        assert_eq!(p.salary_min.as_deref(), Some("4000"));
        assert_eq!(p.posting_date.as_deref(), Some("2021-07-09"));
        assert_eq!(p.num_applications.as_deref(), Some("12"));
    }

    #[test]
    fn resolves_flat_export_headers() {
        let csv = "job_title,category,company,min_salary,max_salary,date\n\
                   Dev,\"['Information Technology']\",Beta,3000,5000,2022-01-01\n";
        let mut r = reader(csv, 10);
        let p = &r.next_chunk().unwrap().unwrap()[0];
        assert_eq!(p.job_title.as_deref(), Some("Dev"));
        assert_eq!(p.categories.as_deref(), Some("['Information Technology']"));
        assert_eq!(p.salary_max.as_deref(), Some("5000"));
        assert!(p.salary_avg.is_none());
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let csv = "job_title,company\nDev,Acme\n";
        let err = ChunkedReader::from_reader(Cursor::new(csv.as_bytes().to_vec()), 10)
            .err()
            .expect("categories column is required");
        assert!(err.to_string().contains("categories"));
    }

    #[test]
    fn empty_fields_become_none() {
        let csv = "title,categories,company\n,\"['Engineering']\",\n";
        let mut r = reader(csv, 10);
        let p = &r.next_chunk().unwrap().unwrap()[0];
        assert!(p.job_title.is_none());
        assert!(p.company.is_none());
    }

    #[test]
    fn mismatched_field_counts_count_as_unreadable() {
        // One short row, one long row, one valid row. The bad rows are
        // skipped and counted; the batch never aborts.
        let csv = "title,categories,company\n\
                   Dev,\"['Engineering']\"\n\
                   Ops,\"['Engineering']\",Acme,stray\n\
                   Lead,\"['Engineering']\",Beta\n";
        let mut r = reader(csv, 10);
        let chunk = r.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk[0].job_title.as_deref(), Some("Lead"));
        assert_eq!(r.unreadable_rows(), 2);
    }

    #[test]
    fn chunks_respect_size_and_terminate() {
        let mut csv = String::from("title,categories\n");
        for i in 0..5 {
            csv.push_str(&format!("Dev {},\"['Engineering']\"\n", i));
        }
        let mut r = reader(&csv, 2);
        assert_eq!(r.next_chunk().unwrap().unwrap().len(), 2);
        assert_eq!(r.next_chunk().unwrap().unwrap().len(), 2);
        assert_eq!(r.next_chunk().unwrap().unwrap().len(), 1);
        assert!(r.next_chunk().unwrap().is_none());
    }
}
