use crate::boxes::FourCC;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a regular file: {0}")]
    NotRegularFile(String),
    #[error("box '{typ}' at {offset:#x} declares {declared} bytes but only {available} remain")]
    BoxExceedsFile {
        typ: FourCC,
        offset: u64,
        declared: u64,
        available: u64,
    },
    #[error("invalid box size for '{typ}' at {offset:#x}")]
    InvalidSize { typ: FourCC, offset: u64 },
    #[error("missing mandatory box '{0}'")]
    MissingBox(&'static str),
    #[error("no movie box found in non-fragmented file")]
    NoMovie,
    #[error("movie box has no tracks")]
    NoTracks,
    #[error("no track {0}")]
    NoSuchTrack(usize),
    #[error("no sample {sample} in track {track}")]
    NoSuchSample { track: usize, sample: usize },
    #[error("parse has not run or did not succeed")]
    NotParsed,
}

pub type Result<T> = std::result::Result<T, Error>;
