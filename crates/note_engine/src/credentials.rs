use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info};

use crate::csv::{parse_records, quote_field, RecordParser, UnescapedEvents};
use crate::decode::{decode_bytes, DecodeError};
use crate::persist::{write_atomically, PersistError};

pub const EXPORT_HEADER: &str = "URL,Username,Password\n";

const URL_COLUMN: &str = "url";
const USERNAME_COLUMN: &str = "username";
const PASSWORD_COLUMN: &str = "password";

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("The file is not a valid CSV export.")]
    UnexpectedFormat,
    #[error("The CSV file has no \"{column}\" column.")]
    HeaderNotFound { column: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Saving a password failed: {0}")]
    Store(#[from] CredentialStoreError),
    #[error("Writing the export failed: {0}")]
    Persist(#[from] PersistError),
    #[error("The export was interrupted: {0}")]
    Interrupted(String),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CredentialStoreError(pub String);

/// A login as known to the credential store, without its secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredCredential {
    pub hostname: String,
    pub username: String,
}

pub trait CredentialStore: Send + Sync {
    fn save(&self, hostname: &str, username: &str, password: &str)
        -> Result<(), CredentialStoreError>;

    fn fetch_all(&self) -> Vec<StoredCredential>;

    fn password(&self, hostname: &str, username: &str) -> Option<String>;
}

/// One decoded CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl CredentialEntry {
    /// Builds an entry from a login URL; `None` when any field is empty.
    pub fn new(url: &str, username: &str, password: &str) -> Option<Self> {
        if url.is_empty() || username.is_empty() || password.is_empty() {
            return None;
        }
        let hostname = hostname_from_url(url);
        if hostname.is_empty() {
            return None;
        }
        Some(Self {
            hostname,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// The entry as one quoted CSV line.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{}\n",
            quote_field(&self.hostname),
            quote_field(&self.username),
            quote_field(&self.password)
        )
    }
}

/// Strips scheme, `www.`, path, query and fragment; trailing dots and
/// backslashes go too. Case is preserved.
pub fn hostname_from_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .find("://")
        .map(|idx| &trimmed[idx + 3..])
        .unwrap_or(trimmed);
    let without_www = match without_scheme.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &without_scheme[4..],
        _ => without_scheme,
    };
    let end = without_www
        .find(['/', '?', '#'])
        .unwrap_or(without_www.len());
    without_www[..end]
        .trim_end_matches(['.', '\\'])
        .to_string()
}

/// Column positions of the required fields, resolved from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeaderIndex {
    url: usize,
    username: usize,
    password: usize,
}

impl HeaderIndex {
    fn resolve(header: &[String]) -> Result<Self, CsvError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| CsvError::HeaderNotFound {
                    column: name.to_string(),
                })
        };
        Ok(Self {
            url: find(URL_COLUMN)?,
            username: find(USERNAME_COLUMN)?,
            password: find(PASSWORD_COLUMN)?,
        })
    }

    fn min_fields(&self) -> usize {
        self.url.max(self.username).max(self.password) + 1
    }

    fn decode(&self, record: &[String]) -> Option<CredentialEntry> {
        if record.len() < self.min_fields() {
            return None;
        }
        CredentialEntry::new(
            &record[self.url],
            &record[self.username],
            &record[self.password],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

type Records<'a> = RecordParser<UnescapedEvents<std::str::Chars<'a>>>;

/// Splits off the header record and resolves the required columns.
fn read_header(csv: &str) -> Result<(HeaderIndex, Records<'_>), CsvError> {
    // NUL never appears in a text export; the file is binary.
    if csv.contains('\0') {
        return Err(CsvError::UnexpectedFormat);
    }
    let mut records = parse_records(csv);
    let header = records.next().ok_or(CsvError::HeaderNotFound {
        column: URL_COLUMN.to_string(),
    })?;
    Ok((HeaderIndex::resolve(&header)?, records))
}

/// Decodes CSV text into entries, returning them with the number of rows
/// that were too short or missed a required value.
pub fn decode_entries(csv: &str) -> Result<(Vec<CredentialEntry>, usize), CsvError> {
    let (index, records) = read_header(csv)?;
    let mut entries = Vec::new();
    let mut skipped = 0;
    for record in records {
        match index.decode(&record) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }
    Ok((entries, skipped))
}

/// Imports every valid row into `store`.
///
/// A store failure stops the import; rows saved before it stay saved.
pub fn import_credentials(
    csv: &str,
    store: &dyn CredentialStore,
) -> Result<ImportSummary, CsvError> {
    let (index, records) = read_header(csv)?;
    let mut summary = ImportSummary::default();
    for (row, record) in records.enumerate() {
        let Some(entry) = index.decode(&record) else {
            engine_debug!("skipping csv row {}: missing fields", row + 1);
            summary.skipped += 1;
            continue;
        };
        store.save(&entry.hostname, &entry.username, &entry.password)?;
        summary.imported += 1;
    }
    engine_info!(
        "imported {} passwords ({} rows skipped)",
        summary.imported,
        summary.skipped
    );
    Ok(summary)
}

/// Same as [`import_credentials`], for raw file bytes in any encoding.
pub fn import_credentials_from_bytes(
    bytes: &[u8],
    store: &dyn CredentialStore,
) -> Result<ImportSummary, CsvError> {
    let decoded = decode_bytes(bytes, Some("text/csv"))?;
    import_credentials(&decoded.text, store)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsvExport {
    pub csv: String,
    pub exported: usize,
    pub failed: Vec<StoredCredential>,
}

/// Writes every stored credential whose secret can be read; the others are
/// reported in `failed`.
pub fn encode_credentials(store: &dyn CredentialStore) -> CsvExport {
    let mut export = CsvExport {
        csv: EXPORT_HEADER.to_string(),
        ..CsvExport::default()
    };
    for credential in store.fetch_all() {
        match store.password(&credential.hostname, &credential.username) {
            Some(password) => {
                let entry = CredentialEntry {
                    hostname: credential.hostname,
                    username: credential.username,
                    password,
                };
                export.csv.push_str(&entry.to_csv_row());
                export.exported += 1;
            }
            None => export.failed.push(credential),
        }
    }
    engine_info!(
        "exported {} passwords ({} failed)",
        export.exported,
        export.failed.len()
    );
    export
}

/// Runs [`encode_credentials`] on the blocking pool.
pub async fn export_credentials(store: Arc<dyn CredentialStore>) -> Result<CsvExport, CsvError> {
    tokio::task::spawn_blocking(move || encode_credentials(store.as_ref()))
        .await
        .map_err(|err| CsvError::Interrupted(err.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExportSummary {
    pub path: PathBuf,
    pub exported: usize,
    pub failed: Vec<StoredCredential>,
}

/// Exports to `path`, replacing any existing file atomically.
pub async fn export_credentials_to_file(
    store: Arc<dyn CredentialStore>,
    path: &Path,
) -> Result<FileExportSummary, CsvError> {
    let export = export_credentials(store).await?;
    let path = write_atomically(path, &export.csv)?;
    Ok(FileExportSummary {
        path,
        exported: export.exported,
        failed: export.failed,
    })
}
