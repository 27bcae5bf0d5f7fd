use std::{io,time,fmt};
use std::convert::From;


pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    IO(io::Error),
    CSV(csv::Error),
    JSON(serde_json::Error),
    TOML(toml::de::Error),
    Reqwest(reqwest::Error),
    HttpError(reqwest::StatusCode),
    SystemTime(time::SystemTimeError),
    ParseDate(chrono::format::ParseError),
    DataLoad(String),
    Parse { row: usize, field: String, value: String },
    InvalidGeometry(String),
}

impl Error {

    /// Wrap a loader failure with the path it happened on.
    pub fn data_load<P: fmt::Debug, E: fmt::Display>(path: P, err: E) -> Self {
	Self::DataLoad(format!("{:?}: {}", path, err))
    }

}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
	Self::IO(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
	Self::CSV(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
	Self::JSON(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
	Self::TOML(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
	Self::Reqwest(err)
    }
}

impl From<time::SystemTimeError> for Error {
    fn from(err: time::SystemTimeError) -> Self {
	Self::SystemTime(err)
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
	Self::ParseDate(err)
    }
}


impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	match self {
	    Self::IO(err) => write!(f, "I/O error: {}", err),
	    Self::CSV(err) => write!(f, "CSV error: {}", err),
	    Self::JSON(err) => write!(f, "JSON error: {}", err),
	    Self::TOML(err) => write!(f, "Config error: {}", err),
	    Self::Reqwest(err) => write!(f, "Request error: {}", err),
	    Self::HttpError(err) => write!(f, "HTTP error: {}", err),
	    Self::SystemTime(err) => write!(f, "System Time error: {}", err),
	    Self::ParseDate(err) => write!(f, "Date parse error: {}", err),
	    Self::DataLoad(msg) => write!(f, "Failed to load data: {}", msg),
	    Self::Parse { row, field, value } =>
		write!(f, "Parse error on row {}: {} = {:?}", row, field, value),
	    Self::InvalidGeometry(name) => write!(f, "Invalid geometry for {}", name),
	}
    }
}

impl std::error::Error for Error {}
