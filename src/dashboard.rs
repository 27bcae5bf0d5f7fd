use log::{debug,info,warn};

use super::config::Config;
use super::contours::{self,ContourMap,Barycenters};
use super::patients::{self,CaseRecord,CaseTable,DateRange,province_key,select_by_date};
use super::figure::{self,Figure,Layout,MapStyle};
use super::error::{Result,Error};


/// Data loaded once at startup. Never mutated afterwards, so every
/// figure below is a pure function of it and the request.
pub struct Dashboard {
    pub contours: ContourMap,
    pub cases: CaseTable,
    pub barycenters: Barycenters,
    date_field: String,
    style: MapStyle,
}

/// Raw user input, as it comes from the command line or a form.
#[derive(Debug,Clone,Default)]
pub struct Request {
    pub provinces: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug,Clone,PartialEq)]
pub struct Figures {
    pub map: Figure,
    pub graph: Figure,
}


impl Request {

    pub fn date_range(&self) -> Result<DateRange> {
	let parse = |field: &str, value: &Option<String>| match value.as_deref().map(str::trim) {
	    None | Some("") => Ok(None),
	    Some(value) => patients::parse_date(value).map(Some).ok_or_else(|| Error::Parse {
		row: 0, field: field.to_string(), value: value.to_string()
	    }),
	};
	Ok(DateRange::new(parse("start_date", &self.start)?, parse("end_date", &self.end)?))
    }

}


impl Dashboard {

    pub fn load(config: &Config) -> Result<Self> {
	let contours = contours::load(&config.contours_path(), &config.name_property)?;
	let cases = patients::load(config)?;
	Self::new(contours, cases, config)
    }

    /// Contours only, for views that show no cases.
    pub fn load_contours(config: &Config) -> Result<Self> {
	let contours = contours::load(&config.contours_path(), &config.name_property)?;
	Self::new(contours, CaseTable::new(), config)
    }

    pub fn new(contours: ContourMap, cases: CaseTable, config: &Config) -> Result<Self> {
	let barycenters = contours::barycenters(&contours)?;
	info!("Dashboard ready: {} provinces, {} cases", contours.len(), cases.len());
	Ok(Dashboard {
	    contours, cases, barycenters,
	    date_field: config.date_field.clone(),
	    style: MapStyle {
		marker_scale: config.marker_scale,
		normalize_names: config.normalize_names,
	    },
	})
    }

    /// Province names in display order.
    pub fn provinces(&self) -> Vec<&str> {
	self.contours.keys().map(|name| name.as_str()).collect()
    }

    pub fn is_province(&self, name: &str) -> bool {
	let key = province_key(name, self.style.normalize_names);
	self.contours.keys().any(|province| province_key(province, self.style.normalize_names) == key)
    }

    pub fn select(&self, range: &DateRange) -> Vec<&CaseRecord> {
	select_by_date(&self.cases, &self.date_field, range.start, range.end)
    }

    pub fn map_figure(&self, selection: &[String], range: &DateRange) -> Figure {
	let cases = self.select(range);
	debug!("Map: {} cases in {:?}", cases.len(), range);
	Figure {
	    data: figure::map_traces(&self.contours, selection, &self.barycenters,
				     &cases, &self.style),
	    layout: Layout::Map,
	}
    }

    pub fn graph_figure(&self, selection: &[String], range: &DateRange) -> Figure {
	if selection.is_empty() {
	    return Figure::empty(Layout::TimeSeries);
	}
	let cases = self.select(range);
	let data = figure::time_series_traces(selection, range, &cases,
					       &self.date_field, self.style.normalize_names);
	debug!("Graph: {:?}", data.iter().map(|trace| trace.name()).collect::<Vec<_>>());
	Figure { data, layout: Layout::TimeSeries }
    }

    /// Provinces only, selected ones highlighted.
    pub fn outline_figure(&self, selection: &[String]) -> Figure {
	Figure {
	    data: figure::outline_traces(&self.contours, selection, self.style.normalize_names),
	    layout: Layout::Map,
	}
    }

    /// Bad user input gives empty figures instead of an error.
    pub fn render(&self, request: &Request) -> Figures {
	for province in &request.provinces {
	    if !self.is_province(province) {
		warn!("Unknown province: {}", province);
	    }
	}
	match request.date_range() {
	    Ok(range) => Figures {
		map: self.map_figure(&request.provinces, &range),
		graph: self.graph_figure(&request.provinces, &range),
	    },
	    Err(err) => {
		warn!("Ignoring request: {}", err);
		Figures {
		    map: Figure::empty(Layout::Map),
		    graph: Figure::empty(Layout::TimeSeries),
		}
	    }
	}
    }

}
