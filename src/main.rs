mod config;
mod contours;
mod dashboard;
mod error;
mod figure;
mod patients;

use std::path::PathBuf;

use chrono::Local;
use chrono::naive::NaiveDate;
use clap::{Parser,Subcommand};
use log::info;

use config::Config;
use dashboard::{Dashboard,Request};
use error::Result;


/// COVID-19 cases on a province map, with cumulative counts per province.
#[derive(Parser,Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration; defaults apply when the file does not exist.
    #[arg(short, long, value_name = "FILE", default_value = "covid19-map.toml")]
    config: PathBuf,
    /// Log debug output.
    #[arg(long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand,Debug)]
enum Commands {
    /// Map with case markers and cumulative cases of the selected provinces
    Dashboard {
	#[arg(short, long = "province", value_name = "NAME")]
	provinces: Vec<String>,
	/// First day (inclusive), defaults to the configured start date
	#[arg(long)]
	start: Option<String>,
	/// Last day (inclusive), defaults to today
	#[arg(long)]
	end: Option<String>,
    },
    /// Province outlines only, selected provinces highlighted
    Outline {
	#[arg(short, long = "province", value_name = "NAME")]
	provinces: Vec<String>,
    },
    /// List province names
    Provinces,
}


fn main() -> Result<()> {

    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
	match cli.verbose { true => "debug", false => "info" })).init();

    let config = Config::load(&cli.config)?;
    let graph_path = config.output_path();

    match cli.command {
	Commands::Dashboard { provinces, start, end } => {
	    let dashboard = Dashboard::load(&config)?;
	    let request = dashboard_request(&config, provinces, start, end)?;
	    let figures = dashboard.render(&request);
	    figure::write_page(&graph_path, "dashboard.html",
			       &format!("COVID-19 {}", config.country),
			       &[figures.map, figures.graph])?;
	    info!("Wrote {:?}", graph_path.join("dashboard.html"));
	}
	Commands::Outline { provinces } => {
	    let dashboard = Dashboard::load_contours(&config)?;
	    figure::write_page(&graph_path, "outline.html",
			       &format!("COVID-19 {}", config.country),
			       &[dashboard.outline_figure(&provinces)])?;
	    info!("Wrote {:?}", graph_path.join("outline.html"));
	}
	Commands::Provinces => {
	    let dashboard = Dashboard::load_contours(&config)?;
	    for name in dashboard.provinces() {
		println!("{}", name);
	    }
	}
    }

    Ok(())

}


/// Missing bounds fall back to the configured start and today.
fn dashboard_request(config: &Config, provinces: Vec<String>,
		     start: Option<String>, end: Option<String>) -> Result<Request> {
    let start = match start {
	Some(start) => start,
	None => format!("{}", config.default_start()?.format("%Y-%m-%d")),
    };
    let end = end.unwrap_or_else(|| format!("{}", Local::now().date_naive().format("%Y-%m-%d")));
    Ok(Request { provinces, start: Some(start), end: Some(end) })
}


/// Calendar days from the first date up to and including the second;
/// unbounded without an end.
#[derive(Clone,Debug)]
pub struct NaiveDateRange(NaiveDate,Option<NaiveDate>);

impl Iterator for NaiveDateRange {
    type Item = NaiveDate;
    fn next(&mut self) -> Option<NaiveDate> {
	match self.1.map_or(true, |end| self.0 <= end) {
	    false => None,
	    true => {
		let current = self.0;
		self.0 = self.0.succ_opt()?;
		Some(current)
	    }
	}
    }
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn date_range_includes_both_ends() {
	let start = NaiveDate::from_ymd_opt(2020, 2, 27).unwrap();
	let end = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
	let days = NaiveDateRange(start, Some(end)).collect::<Vec<_>>();
	assert_eq!(days.len(), 4);
	assert_eq!(days.first(), Some(&start));
	assert_eq!(days.last(), Some(&end));
	assert_eq!(NaiveDateRange(end, Some(start)).count(), 0);
	assert_eq!(NaiveDateRange(start, None).take(10).count(), 10);
    }

    #[test]
    fn explicit_start_skips_configured_default() {
	let config = Config { default_start: "not a date".to_string(), ..Config::default() };
	let request = dashboard_request(&config, vec![], Some("2020-03-10".to_string()),
					Some("2020-03-20".to_string())).unwrap();
	assert_eq!(request.start.as_deref(), Some("2020-03-10"));
	assert_eq!(request.end.as_deref(), Some("2020-03-20"));
	assert!(dashboard_request(&config, vec![], None, None).is_err());
	let request = dashboard_request(&Config::default(), vec![], None, None).unwrap();
	assert_eq!(request.start.as_deref(), Some("2020-03-02"));
    }

    #[test]
    fn cli_collects_repeated_provinces() {
	let cli = Cli::try_parse_from(["covid19-map", "dashboard", "-p", "Rabat", "--province",
				       "Fès", "--start", "2020-03-02"]).unwrap();
	match cli.command {
	    Commands::Dashboard { provinces, start, end } => {
		assert_eq!(provinces, vec!["Rabat", "Fès"]);
		assert_eq!(start.as_deref(), Some("2020-03-02"));
		assert_eq!(end, None);
	    }
	    other => panic!("unexpected command: {:?}", other),
	}
    }

}
