// 🔌 Record Sources
// Where rows come from: a CSV export on disk, a shared spreadsheet over
// HTTPS, or memory. Only the connection is cached; rows are re-read on
// every fetch.

use crate::error::SourceError;
use crate::record::{RawRecord, RecordSnapshot};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// TRAITS
// ============================================================================

/// RecordSource - read-only access to the full current row set
pub trait RecordSource: Send + Sync {
    /// Read every row, in source order.
    fn fetch(&self) -> Result<RecordSnapshot, SourceError>;

    /// Human-readable origin, for logs and the status bar
    fn describe(&self) -> String;
}

/// Connector - the authenticate / look-up step that yields a source handle
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn RecordSource>, SourceError>;
}

// ============================================================================
// LAZY CONNECTION
// ============================================================================

/// LazyConnection - process-wide handle, established on first use
///
/// A failed fetch drops the handle, so the next pass connects again.
pub struct LazyConnection {
    connector: Box<dyn Connector>,
    handle: Mutex<Option<Arc<dyn RecordSource>>>,
}

impl LazyConnection {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        LazyConnection {
            connector,
            handle: Mutex::new(None),
        }
    }

    /// The cached handle, connecting first if needed.
    pub fn handle(&self) -> Result<Arc<dyn RecordSource>, SourceError> {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let handle = self.connector.connect()?;
        info!(source = %handle.describe(), "Connected to record source");
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Fresh rows through the cached handle.
    pub fn fetch(&self) -> Result<RecordSnapshot, SourceError> {
        let handle = self.handle()?;
        match handle.fetch() {
            Ok(snapshot) => {
                debug!(rows = snapshot.len(), "Fetched rows");
                Ok(snapshot)
            }
            Err(err) => {
                warn!(error = %err, "Fetch failed; dropping connection");
                self.reset();
                Err(err)
            }
        }
    }

    /// Forget the handle; the next call reconnects.
    pub fn reset(&self) {
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_connected(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

// ============================================================================
// CSV PARSING
// ============================================================================

/// Parse CSV text (header row required) into a snapshot.
///
/// Rows shorter than the header simply lack the trailing columns. Bytes that
/// are not UTF-8 (a Windows-1252 export, say) become U+FFFD in that cell only;
/// a mangled date then lands in the rejected rows like any other bad date.
pub fn read_snapshot<R: Read>(reader: R) -> Result<RecordSnapshot, SourceError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader.byte_headers()?.iter().map(lossy).collect();
    let mut records = Vec::new();

    for (idx, result) in reader.byte_records().enumerate() {
        let row = result?;
        records.push(RawRecord::from_pairs(
            idx + 1,
            headers.iter().cloned().zip(row.iter().map(lossy)),
        ));
    }

    Ok(RecordSnapshot::new(headers, records))
}

fn lossy(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

// ============================================================================
// CSV FILE SOURCE
// ============================================================================

/// Connects to a CSV export of the sheet on disk.
pub struct CsvFileConnector {
    path: PathBuf,
}

impl CsvFileConnector {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvFileConnector {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Connector for CsvFileConnector {
    fn connect(&self) -> Result<Arc<dyn RecordSource>, SourceError> {
        if !self.path.is_file() {
            return Err(SourceError::Connection(format!(
                "CSV file not found: {}",
                self.path.display()
            )));
        }
        Ok(Arc::new(CsvFileSource {
            path: self.path.clone(),
        }))
    }
}

pub struct CsvFileSource {
    path: PathBuf,
}

impl RecordSource for CsvFileSource {
    fn fetch(&self) -> Result<RecordSnapshot, SourceError> {
        let file = File::open(&self.path).map_err(|e| {
            SourceError::Fetch(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        read_snapshot(file)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ============================================================================
// SHARED SPREADSHEET SOURCE
// ============================================================================

const SHEET_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects to one worksheet of a shared spreadsheet via its CSV export.
pub struct SheetConnector {
    url: String,
    token_env: Option<String>,
}

impl SheetConnector {
    /// Export URL for worksheet `gid` of spreadsheet `id`.
    pub fn export_url(spreadsheet_id: &str, gid: u64) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
            spreadsheet_id, gid
        )
    }

    pub fn new(url: String) -> Self {
        SheetConnector {
            url,
            token_env: None,
        }
    }

    /// Builder pattern: read a bearer token from this environment variable
    /// at connect time.
    pub fn with_token_env(mut self, var: &str) -> Self {
        self.token_env = Some(var.to_string());
        self
    }

    fn token(&self) -> Result<Option<String>, SourceError> {
        match &self.token_env {
            None => Ok(None),
            Some(var) => std::env::var(var).map(Some).map_err(|_| {
                SourceError::Connection(format!("Credentials missing: ${} is not set", var))
            }),
        }
    }
}

impl Connector for SheetConnector {
    fn connect(&self) -> Result<Arc<dyn RecordSource>, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(SHEET_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Connection(format!("HTTP client setup failed: {}", e)))?;

        Ok(Arc::new(SheetSource {
            client,
            url: self.url.clone(),
            token: self.token()?,
        }))
    }
}

pub struct SheetSource {
    client: reqwest::blocking::Client,
    url: String,
    token: Option<String>,
}

impl RecordSource for SheetSource {
    fn fetch(&self) -> Result<RecordSnapshot, SourceError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::NOT_FOUND
        {
            return Err(SourceError::Connection(format!(
                "Spreadsheet refused access ({}): {}",
                status, self.url
            )));
        }
        if !status.is_success() {
            return Err(SourceError::Fetch(format!("Spreadsheet export returned {}", status)));
        }

        let body = response.bytes()?;
        read_snapshot(body.as_ref())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// Fixed rows; connects instantly. For tests and embedding.
#[derive(Clone, Default)]
pub struct StaticSource {
    snapshot: RecordSnapshot,
}

impl StaticSource {
    pub fn new(snapshot: RecordSnapshot) -> Self {
        StaticSource { snapshot }
    }
}

impl RecordSource for StaticSource {
    fn fetch(&self) -> Result<RecordSnapshot, SourceError> {
        Ok(self.snapshot.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory ({} rows)", self.snapshot.len())
    }
}

impl Connector for StaticSource {
    fn connect(&self) -> Result<Arc<dyn RecordSource>, SourceError> {
        Ok(Arc::new(self.clone()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::record::ColumnMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CSV: &str = "\
Timestamp,name,Type of encounter,Date seen,finalized report ?
03/01/2024 09:00:00,A,New Consult Initial,03/01/2024,yes
20/01/2024 17:30:00,B,Follow Up visit,20/01/2024
";

    #[test]
    fn test_read_snapshot_keeps_order_and_headers() {
        let snapshot = read_snapshot(CSV.as_bytes()).unwrap();

        assert_eq!(snapshot.headers.len(), 5);
        assert_eq!(snapshot.headers[3], "Date seen");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.records[0].row, 1);
        assert_eq!(snapshot.records[0].get("name"), Some("A"));
        assert_eq!(snapshot.records[1].get("Date seen"), Some("20/01/2024"));
    }

    #[test]
    fn test_short_rows_lack_trailing_columns() {
        let snapshot = read_snapshot(CSV.as_bytes()).unwrap();
        assert_eq!(snapshot.records[1].get("finalized report ?"), None);
        assert_eq!(snapshot.records[1].get_or_empty("finalized report ?"), "");
    }

    #[test]
    fn test_invalid_utf8_in_date_cell_rejects_only_that_row() {
        let bytes = b"name,Type of encounter,Date seen\n\
A,new consult,03/01/2024\n\
B,follow up,\xE905/01/2024\n";

        let snapshot = read_snapshot(&bytes[..]).unwrap();
        let out = normalize(&snapshot.records, &ColumnMap::default());

        assert_eq!(out.normalized.len(), 1);
        assert_eq!(out.normalized[0].name, "A");
        assert_eq!(out.rejected_count(), 1);
        assert_eq!(out.rejected[0].get("name"), Some("B"));
    }

    #[test]
    fn test_invalid_utf8_elsewhere_keeps_the_row() {
        let bytes = b"name,Type of encounter,Date seen\n\
Ren\xE9e,follow up,05/01/2024\n";

        let snapshot = read_snapshot(&bytes[..]).unwrap();
        let out = normalize(&snapshot.records, &ColumnMap::default());

        assert_eq!(out.rejected_count(), 0);
        assert_eq!(out.normalized.len(), 1);
        assert_eq!(out.normalized[0].name, "Ren\u{FFFD}e");
        assert_eq!(out.normalized[0].encounter_type, "follow up");
    }

    #[test]
    fn test_missing_csv_is_connection_error() {
        let connector = CsvFileConnector::new("/definitely/not/here.csv");
        let err = connector.connect().err().unwrap();
        assert!(err.is_connection());
    }

    #[test]
    fn test_csv_file_round_trip() {
        let path = std::env::temp_dir().join(format!("earnings-source-{}.csv", std::process::id()));
        std::fs::write(&path, CSV).unwrap();

        let connection = LazyConnection::new(Box::new(CsvFileConnector::new(&path)));
        let snapshot = connection.fetch().unwrap();
        assert_eq!(snapshot.len(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_sheet_export_url() {
        assert_eq!(
            SheetConnector::export_url("abc123", 0),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv&gid=0"
        );
    }

    #[test]
    fn test_sheet_token_env_must_be_set() {
        let connector = SheetConnector::new("https://example.invalid/export".to_string())
            .with_token_env("EARNINGS_TEST_TOKEN_THAT_IS_NEVER_SET");
        let err = connector.connect().err().unwrap();
        assert!(err.to_string().contains("Credentials missing"));
    }

    /// Counts connects; fails fetches while `broken` is set.
    struct FlakyConnector {
        connects: Arc<AtomicUsize>,
        broken: Arc<AtomicUsize>,
    }

    struct FlakySource {
        broken: Arc<AtomicUsize>,
    }

    impl RecordSource for FlakySource {
        fn fetch(&self) -> Result<RecordSnapshot, SourceError> {
            if self.broken.load(Ordering::SeqCst) > 0 {
                Err(SourceError::Connection("token expired".to_string()))
            } else {
                Ok(RecordSnapshot::default())
            }
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    impl Connector for FlakyConnector {
        fn connect(&self) -> Result<Arc<dyn RecordSource>, SourceError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FlakySource {
                broken: Arc::clone(&self.broken),
            }))
        }
    }

    #[test]
    fn test_connection_is_reused_and_reestablished() {
        let connects = Arc::new(AtomicUsize::new(0));
        let broken = Arc::new(AtomicUsize::new(0));
        let connection = LazyConnection::new(Box::new(FlakyConnector {
            connects: Arc::clone(&connects),
            broken: Arc::clone(&broken),
        }));

        assert!(!connection.is_connected());
        connection.fetch().unwrap();
        connection.fetch().unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        broken.store(1, Ordering::SeqCst);
        assert!(connection.fetch().is_err());
        assert!(!connection.is_connected());

        broken.store(0, Ordering::SeqCst);
        connection.fetch().unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_static_source_refetches_full_snapshot() {
        let snapshot = RecordSnapshot::from_records(vec![RawRecord::new(1).with("name", "A")]);
        let connection = LazyConnection::new(Box::new(StaticSource::new(snapshot)));

        assert_eq!(connection.fetch().unwrap().len(), 1);
        assert_eq!(connection.fetch().unwrap().len(), 1);
    }
}
