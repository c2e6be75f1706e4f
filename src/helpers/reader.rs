use crate::error::EstimateSheetError;
use crate::spreadsheet::SpreadsheetError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug)]
pub enum UnifiedReaderError {
    #[error("No data from remote file: '{0}'")]
    RemoteFileNoDataError(String),
}

/// Workbook bytes from either a local file or a remote URL
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// Remote or caller-supplied content held in memory
    Remote(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a local path or a remote URL.
    /// Remote URLs go through DuckDB's `read_blob` so its credential handling applies.
    pub(crate) fn new(file_name: &str) -> Result<UnifiedReader, EstimateSheetError> {
        if Self::is_remote_url(file_name) {
            Self::read_blob_with_duckdb(file_name)
        } else {
            let file = File::open(file_name)
                .map_err(|error| SpreadsheetError::SourceUnavailable(file_name.to_owned(), error.to_string()))?;
            Ok(UnifiedReader::Local(BufReader::new(file)))
        }
    }

    /// Wraps workbook content that is already in memory
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> UnifiedReader {
        UnifiedReader::Remote(Cursor::new(bytes))
    }

    /// Checks if a file name represents a remote URL
    pub(crate) fn is_remote_url(file_name: &str) -> bool {
        if let Ok(url) = Url::parse(file_name) {
            // Windows drive letters parse as one-letter schemes
            url.scheme() != "file" && url.scheme().len() > 1
        } else {
            false
        }
    }

    fn read_blob_with_duckdb(file_name: &str) -> Result<UnifiedReader, EstimateSheetError> {
        debug!(file_name, "fetching remote workbook");
        let connection = duckdb::Connection::open_in_memory()?;
        let result: Result<Vec<u8>, _> = connection.query_row("SELECT content FROM read_blob(?)", [file_name], |row| row.get(0));
        connection.close().map_err(|(_, e)| e)?;

        let bytes = result
            .map_err(|error| SpreadsheetError::SourceUnavailable(file_name.to_owned(), error.to_string()))?;
        if bytes.is_empty() {
            Err(UnifiedReaderError::RemoteFileNoDataError(file_name.to_owned()))?;
        }
        Ok(UnifiedReader::Remote(Cursor::new(bytes)))
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Remote(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Remote(reader) => reader.seek(pos),
        }
    }
}
