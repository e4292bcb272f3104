//! Note engine: turns captured web pages into note content and moves
//! saved passwords in and out of CSV files.
mod assets;
mod config;
mod convert;
mod credentials;
mod csv;
mod decode;
mod engine;
mod extract;
mod fetch;
mod filename;
mod node;
mod paragraphs;
mod persist;
mod resolve;
mod text;
mod types;
mod visitor;

pub use assets::{
    resolve_assets, AssetFetcher, AssetRequest, AssetStore, AssetStoreError, Collaborators,
    EmbedEligibility, FetchedAsset, HeaderImageSizer, ImageSizer, KnownHostsEmbedChecker,
    MemoryAssetStore, ResolutionReport, StoredAsset, SVG_MIME_TYPE,
};
pub use config::ConverterOptions;
pub use convert::{HtmlNoteAdapter, PreparedConversion};
pub use credentials::{
    decode_entries, encode_credentials, export_credentials, export_credentials_to_file,
    hostname_from_url, import_credentials, import_credentials_from_bytes, CredentialEntry,
    CredentialStore, CredentialStoreError, CsvError, CsvExport, FileExportSummary, ImportSummary,
    StoredCredential, EXPORT_HEADER,
};
pub use csv::{parse_records, quote_field, CharacterEvent, RecordParser, UnescapedEvents};
pub use decode::{decode_bytes, decode_bytes_lossy, DecodeError, DecodedText};
pub use engine::EngineHandle;
pub use extract::extract_paragraphs;
pub use fetch::{FetchSettings, ReqwestAssetFetcher};
pub use filename::{asset_file_name, content_asset_id, data_asset_file_name};
pub use node::{AssetOrigin, DisplayInfo, NodeArena, NodeId, NodeKind, NoteNode};
pub use paragraphs::{join_and_split, join_bullets, split_lines};
pub use persist::{write_atomically, PersistError};
pub use resolve::{parse_data_uri, resolve_url, DataUri};
pub use text::{RichText, TextAttribute, TextRun};
pub use types::{FailureKind, FetchError};
pub use visitor::{is_block_level, HtmlVisitor, VisitOutput};
