use std::fs;
use std::path::{Path, PathBuf};

use chrono::naive::NaiveDate;
use serde::Deserialize;
use log::{debug,info};

use super::error::Result;


#[derive(Deserialize,Debug,Clone,Copy,PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[serde(alias = "utf8")]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(alias = "iso-8859-1")]
    Latin1,
}

#[derive(Deserialize,Debug,Clone)]
#[serde(default)]
pub struct Config {
    pub country: String,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Defaults to `{data_dir}/{country}/contours.geojson`.
    pub contours_file: Option<PathBuf>,
    /// Defaults to `{data_dir}/{country}/patients.csv`.
    pub patients_file: Option<PathBuf>,
    /// When set, the case table is downloaded and cached instead of read
    /// from `patients_file`.
    pub patients_url: Option<String>,
    pub encoding: Encoding,
    /// GeoJSON feature property holding the province name.
    pub name_property: String,
    pub province_column: String,
    pub date_columns: Vec<String>,
    /// Date column used for range selection.
    pub date_field: String,
    pub default_start: String,
    pub normalize_names: bool,
    pub marker_scale: f64,
}

impl Default for Config {
    fn default() -> Self {
	Config {
	    country: "Morocco".to_string(),
	    data_dir: PathBuf::from("data"),
	    cache_dir: PathBuf::from("cache"),
	    output_dir: PathBuf::from("graphs"),
	    contours_file: None,
	    patients_file: None,
	    patients_url: None,
	    encoding: Encoding::Utf8,
	    name_property: "name".to_string(),
	    province_column: "province".to_string(),
	    date_columns: vec!["confirmed_date".to_string()],
	    date_field: "confirmed_date".to_string(),
	    default_start: "2020-03-02".to_string(),
	    normalize_names: true,
	    marker_scale: 4.0,
	}
    }
}

impl Config {

    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
	if !path.exists() {
	    info!("No config file at {:?}, using defaults", path);
	    return Ok(Config::default());
	}
	let config: Config = toml::from_str(&fs::read_to_string(path)?)?;
	debug!("Loaded config from {:?}: {:?}", path, config);
	Ok(config)
    }

    pub fn contours_path(&self) -> PathBuf {
	self.contours_file.clone().unwrap_or_else(
	    || self.data_dir.join(&self.country).join("contours.geojson"))
    }

    pub fn patients_path(&self) -> PathBuf {
	self.patients_file.clone().unwrap_or_else(
	    || self.data_dir.join(&self.country).join("patients.csv"))
    }

    pub fn output_path(&self) -> PathBuf {
	self.output_dir.join(&self.country)
    }

    pub fn default_start(&self) -> Result<NaiveDate> {
	Ok(NaiveDate::parse_from_str(&self.default_start, "%Y-%m-%d")?)
    }

}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
	let config: Config = toml::from_str(r#"
country = "Tunisia"
encoding = "latin1"
date_columns = ["confirmed_date", "recovered_date"]
"#).unwrap();
	assert_eq!(config.country, "Tunisia");
	assert_eq!(config.encoding, Encoding::Latin1);
	assert_eq!(config.date_columns.len(), 2);
	assert_eq!(config.province_column, "province");
	assert_eq!(config.contours_path(), PathBuf::from("data/Tunisia/contours.geojson"));
	assert_eq!(config.default_start().unwrap(), NaiveDate::from_ymd_opt(2020, 3, 2).unwrap());
    }

    #[test]
    fn missing_file_gives_defaults() {
	let dir = tempfile::tempdir().unwrap();
	let config = Config::load(&dir.path().join("absent.toml")).unwrap();
	assert_eq!(config.country, "Morocco");
	assert_eq!(config.patients_path(), PathBuf::from("data/Morocco/patients.csv"));
    }

    #[test]
    fn explicit_paths_win() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("config.toml");
	fs::write(&path, "contours_file = \"maps/ma.geojson\"\nencoding = \"utf-8\"\n").unwrap();
	let config = Config::load(&path).unwrap();
	assert_eq!(config.contours_path(), PathBuf::from("maps/ma.geojson"));
	assert_eq!(config.encoding, Encoding::Utf8);
    }

}
