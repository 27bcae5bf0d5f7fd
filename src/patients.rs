use std::fs;
use std::path::Path;
use std::time::Duration;
use std::collections::{BTreeMap,HashMap};

use chrono::naive::{NaiveDate,NaiveDateTime};
use encoding_rs::mem::decode_latin1;
use unidecode::unidecode;
use log::{debug,info};

use super::config::{Config,Encoding};
use super::error::{Result,Error};


const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];


/// One confirmed case.
#[derive(Debug,Clone,PartialEq)]
pub struct CaseRecord {
    pub province: String,
    pub dates: BTreeMap<String,NaiveDate>,
    /// Remaining columns, kept as read.
    pub fields: BTreeMap<String,String>,
}

pub type CaseTable = Vec<CaseRecord>;

impl CaseRecord {

    pub fn date(&self, field: &str) -> Option<NaiveDate> {
	self.dates.get(field).copied()
    }

}


/// Inclusive date range; an absent bound does not filter on that side.
#[derive(Debug,Clone,Copy,Default,PartialEq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {

    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
	Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
	self.start.map_or(true, |start| start <= date)
	    && self.end.map_or(true, |end| date <= end)
    }

}


pub fn select_by_date<'a>(table: &'a [CaseRecord], field: &str,
			  start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<&'a CaseRecord> {
    let range = DateRange::new(start, end);
    table.iter().filter(
	|record| record.date(field).map_or(false, |date| range.contains(date))
    ).collect()
}


/// Key used to match case rows against contour names.
pub fn province_key(name: &str, normalize: bool) -> String {
    match normalize {
	true => unidecode(name).trim().to_lowercase(),
	false => name.to_string(),
    }
}

pub fn count_by_province(cases: &[&CaseRecord], normalize: bool) -> HashMap<String,usize> {
    let mut counts = HashMap::new();
    for record in cases {
	*counts.entry(province_key(&record.province, normalize)).or_insert(0) += 1;
    }
    counts
}


pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter()
	.find_map(|format| NaiveDate::parse_from_str(value, format).ok())
	.or_else(|| DATETIME_FORMATS.iter().find_map(
	    |format| NaiveDateTime::parse_from_str(value, format).ok().map(|dt| dt.date())))
}


pub fn load(config: &Config) -> Result<CaseTable> {
    let bytes = match &config.patients_url {
	Some(url) => cached_download(url, &config.cache_dir.join(&config.country))?,
	None => {
	    let path = config.patients_path();
	    info!("Loading patients from {:?}...", path);
	    fs::read(&path).map_err(|err| Error::data_load(&path, err))?
	}
    };
    let table = parse(&decode(bytes, config.encoding)?,
		      &config.province_column, &config.date_columns)?;
    info!("Loaded {} case records", table.len());
    Ok(table)
}


fn decode(bytes: Vec<u8>, encoding: Encoding) -> Result<String> {
    match encoding {
	Encoding::Utf8 => String::from_utf8(bytes)
	    .map_err(|err| Error::DataLoad(format!("patients: {}", err))),
	Encoding::Latin1 => Ok(decode_latin1(&bytes).into_owned()),
    }
}


pub fn parse(text: &str, province_column: &str, date_columns: &[String]) -> Result<CaseTable> {

    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h.trim() == name)
	.ok_or_else(|| Error::DataLoad(format!("column {:?} not found in patients", name)));

    let province_idx = column(province_column)?;
    let date_idx = date_columns.iter().map(
	|name| Ok((name.clone(), column(name)?))
    ).collect::<Result<Vec<_>>>()?;

    rdr.records().enumerate().map(|(row,record)| {

	let record = record?;
	let mut dates = BTreeMap::new();

	for (name,idx) in &date_idx {
	    let value = record.get(*idx).unwrap_or("").trim();
	    if value.is_empty() {
		continue;
	    }
	    let date = parse_date(value).ok_or_else(|| Error::Parse {
		row, field: name.clone(), value: value.to_string()
	    })?;
	    dates.insert(name.clone(), date);
	}

	let fields = headers.iter().zip(record.iter()).enumerate()
	    .filter(|(i,_)| *i != province_idx && !date_idx.iter().any(|(_,idx)| idx == i))
	    .map(|(_,(h,v))| (h.to_string(), v.to_string()))
	    .collect();

	Ok(CaseRecord {
	    province: record.get(province_idx).unwrap_or("").trim().to_string(),
	    dates, fields
	})

    }).collect()

}


fn cached_download(url: &str, cache_path: &Path) -> Result<Vec<u8>> {

    let cache_file = cache_path.join("patients.csv");

    if cache_file.exists() && fs::metadata(&cache_file)?.modified()?.elapsed()? < Duration::new(1800,0) {
	debug!("Using cached {:?}", cache_file);
	return Ok(fs::read(&cache_file)?);
    }

    let data = download(url)?;
    fs::create_dir_all(cache_path)?;
    fs::write(&cache_file, &data)?;
    Ok(data)

}


fn download(url: &str) -> Result<Vec<u8>> {

    println!("Downloading {}...", url);
    let res = reqwest::blocking::get(url)?;

    match res.status().as_u16() {
	200 => Ok(res.bytes()?.to_vec()),
	_ => Err(Error::HttpError(res.status())),
    }

}


#[cfg(test)]
mod tests {

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
	NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn columns() -> Vec<String> {
	vec!["confirmed_date".to_string()]
    }

    const PATIENTS: &str = "\
id,province,confirmed_date,sex
1,Casablanca,2020-03-02,M
2,Marrakech,03/03/2020,F
3,Casablanca,2020-03-05 14:30:00,F
4,Fès,,M
5,Casablanca,2020-03-09T08:00:00,M
";

    fn table() -> CaseTable {
	parse(PATIENTS, "province", &columns()).unwrap()
    }

    #[test]
    fn parses_rows_and_dates() {
	let table = table();
	assert_eq!(table.len(), 5);
	assert_eq!(table[0].province, "Casablanca");
	assert_eq!(table[0].date("confirmed_date"), Some(date(2020, 3, 2)));
	assert_eq!(table[1].date("confirmed_date"), Some(date(2020, 3, 3)));
	assert_eq!(table[2].date("confirmed_date"), Some(date(2020, 3, 5)));
	assert_eq!(table[3].date("confirmed_date"), None);
	assert_eq!(table[4].date("confirmed_date"), Some(date(2020, 3, 9)));
	assert_eq!(table[0].fields.get("sex").map(|s| s.as_str()), Some("M"));
	assert!(!table[0].fields.contains_key("province"));
    }

    #[test]
    fn bad_date_is_fatal() {
	let text = "province,confirmed_date\nA,2020-03-02\nB,yesterday\n";
	match parse(text, "province", &columns()) {
	    Err(Error::Parse { row, field, value }) => {
		assert_eq!(row, 1);
		assert_eq!(field, "confirmed_date");
		assert_eq!(value, "yesterday");
	    }
	    other => panic!("unexpected result: {:?}", other),
	}
    }

    #[test]
    fn missing_column_fails_to_load() {
	let text = "region,confirmed_date\nA,2020-03-02\n";
	assert!(matches!(parse(text, "province", &columns()), Err(Error::DataLoad(_))));
    }

    #[test]
    fn filter_is_inclusive_and_exact() {
	let table = table();
	let (start, end) = (date(2020, 3, 3), date(2020, 3, 5));
	let selected = select_by_date(&table, "confirmed_date", Some(start), Some(end));
	assert_eq!(selected.len(), 2);
	for record in &table {
	    let inside = record.date("confirmed_date")
		.map_or(false, |d| start <= d && d <= end);
	    assert_eq!(inside, selected.contains(&record));
	}
    }

    #[test]
    fn filter_keeps_input_order_and_open_bounds() {
	let table = table();
	let selected = select_by_date(&table, "confirmed_date", None, None);
	assert_eq!(selected.iter().map(|r| r.fields["id"].as_str()).collect::<Vec<_>>(),
		   vec!["1", "2", "3", "5"]);
	let selected = select_by_date(&table, "confirmed_date", Some(date(2020, 3, 5)), None);
	assert_eq!(selected.len(), 2);
	let selected = select_by_date(&table, "confirmed_date", None, Some(date(2020, 3, 2)));
	assert_eq!(selected.len(), 1);
    }

    #[test]
    fn reversed_range_is_empty() {
	let table = table();
	assert!(select_by_date(&table, "confirmed_date",
			       Some(date(2020, 3, 9)), Some(date(2020, 3, 2))).is_empty());
    }

    #[test]
    fn unknown_field_selects_nothing() {
	assert!(select_by_date(&table(), "recovered_date", None, None).is_empty());
    }

    #[test]
    fn counts_use_normalized_keys() {
	let table = parse("province,confirmed_date\nFès,2020-03-02\n fes ,2020-03-03\nRabat,2020-03-03\n",
			  "province", &columns()).unwrap();
	let cases = table.iter().collect::<Vec<_>>();
	let counts = count_by_province(&cases, true);
	assert_eq!(counts.get(&province_key("Fès", true)), Some(&2));
	assert_eq!(counts.get("rabat"), Some(&1));
	let counts = count_by_province(&cases, false);
	assert_eq!(counts.get("Fès"), Some(&1));
    }

    #[test]
    fn load_reads_latin1_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("patients.csv");
	fs::write(&path, b"province,confirmed_date\nF\xe8s,2020-03-02\n").unwrap();
	let config = Config {
	    patients_file: Some(path),
	    encoding: Encoding::Latin1,
	    ..Config::default()
	};
	let table = load(&config).unwrap();
	assert_eq!(table[0].province, "Fès");
    }

    #[test]
    fn load_reports_missing_file() {
	let dir = tempfile::tempdir().unwrap();
	let config = Config {
	    patients_file: Some(dir.path().join("absent.csv")),
	    ..Config::default()
	};
	assert!(matches!(load(&config), Err(Error::DataLoad(_))));
    }

    #[test]
    fn fresh_cache_is_used_instead_of_downloading() {
	let dir = tempfile::tempdir().unwrap();
	let cache = dir.path().join("Morocco");
	fs::create_dir_all(&cache).unwrap();
	fs::write(cache.join("patients.csv"), "province,confirmed_date\nRabat,2020-03-04\n").unwrap();
	let config = Config {
	    cache_dir: dir.path().to_path_buf(),
	    patients_url: Some("http://127.0.0.1:9/patients.csv".to_string()),
	    ..Config::default()
	};
	let table = load(&config).unwrap();
	assert_eq!(table.len(), 1);
	assert_eq!(table[0].date("confirmed_date"), Some(date(2020, 3, 4)));
    }

}
