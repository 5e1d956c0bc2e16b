use buffer_pool::api::BpmError;

/// The index's error taxonomy.
#[derive(Debug)]
pub enum IndexError {
    /// Metadata on reopen doesn't match the relation name, byte offset,
    /// or key type the caller supplied.
    BadIndexInfo,
    /// A scan's bound operators were outside the permitted set.
    BadOperator,
    /// A scan's low bound was greater than its high bound.
    BadRange,
    /// `start_scan` found a non-empty range that matched nothing.
    NoSuchKeyFound,
    /// `next`/`end_scan` called without a live cursor.
    ScanNotInitialized,
    /// The active scan cursor is exhausted.
    IndexScanCompleted,
    /// A failure surfaced by the buffer manager.
    Io(std::io::Error),
}

impl From<BpmError> for IndexError {
    fn from(err: BpmError) -> Self {
        match err {
            BpmError::Io(e) => IndexError::Io(e),
            BpmError::NoFreeFrames => {
                IndexError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
            }
        }
    }
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::BadIndexInfo => write!(f, "index metadata does not match the supplied relation/offset/type"),
            IndexError::BadOperator => write!(f, "scan bound operators outside the permitted set"),
            IndexError::BadRange => write!(f, "scan low bound is greater than its high bound"),
            IndexError::NoSuchKeyFound => write!(f, "scan range matched no keys"),
            IndexError::ScanNotInitialized => write!(f, "no active scan cursor"),
            IndexError::IndexScanCompleted => write!(f, "scan cursor is exhausted"),
            IndexError::Io(err) => write!(f, "index I/O error: {err}"),
        }
    }
}

impl std::error::Error for IndexError {}

pub type Result<T> = std::result::Result<T, IndexError>;
