use std::{io,fs};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::collections::BTreeMap;

use chrono::Datelike;
use serde_json::{Value,json};

use super::contours::{ContourMap,Barycenters};
use super::patients::{CaseRecord,DateRange,count_by_province,province_key};
use super::error::Result;
use super::NaiveDateRange;


const OUTLINE_COLOR: &str = "rgb(120,120,120)";
const HIGHLIGHT_COLOR: &str = "rgb(200,30,30)";
const HIGHLIGHT_FILL: &str = "rgba(200,30,30,0.2)";
const MARKER_COLOR: &str = "rgba(200,30,30,0.6)";


#[derive(Debug,Clone,PartialEq)]
pub enum Trace {
    /// Province boundary; `None` separates rings.
    Outline { name: String, x: Vec<Option<f64>>, y: Vec<Option<f64>>, highlighted: bool },
    Marker { name: String, x: f64, y: f64, count: usize, size: f64 },
    Line { name: String, x: Vec<String>, y: Vec<u64> },
}

#[derive(Debug,Clone,Copy,PartialEq)]
pub enum Layout {
    Map,
    TimeSeries,
}

#[derive(Debug,Clone,PartialEq)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug,Clone,Copy)]
pub struct MapStyle {
    pub marker_scale: f64,
    pub normalize_names: bool,
}


impl Trace {

    pub fn name(&self) -> &str {
	match self {
	    Self::Outline { name, .. } | Self::Marker { name, .. } | Self::Line { name, .. } => name,
	}
    }

    pub fn to_json(&self) -> Value {
	match self {
	    Self::Outline { name, x, y, highlighted } => json!({
		"type": "scatter",
		"mode": "lines",
		"name": name,
		"x": x,
		"y": y,
		"connectgaps": false,
		"hoverinfo": "name",
		"fill": if *highlighted { "toself" } else { "none" },
		"fillcolor": HIGHLIGHT_FILL,
		"line": {
		    "color": if *highlighted { HIGHLIGHT_COLOR } else { OUTLINE_COLOR },
		    "width": if *highlighted { 2 } else { 1 }
		}
	    }),
	    Self::Marker { name, x, y, count, size } => json!({
		"type": "scatter",
		"mode": "markers+text",
		"name": name,
		"x": [x],
		"y": [y],
		"text": [count.to_string()],
		"textposition": "middle center",
		"hovertext": [format!("{}: {}", name, count)],
		"hoverinfo": "text",
		"marker": {
		    "size": size,
		    "color": MARKER_COLOR
		}
	    }),
	    Self::Line { name, x, y } => json!({
		"type": "scatter",
		"mode": "lines",
		"name": name,
		"x": x,
		"y": y,
		"line": {"width": 2}
	    }),
	}
    }

}


impl Layout {

    pub fn to_json(&self) -> Value {
	match self {
	    Self::Map => json!({
		"xaxis": {
		    "showticklabels": false,
		    "showgrid": false,
		    "zeroline": false
		},
		"yaxis": {
		    "scaleanchor": "x",
		    "scaleratio": 1,
		    "autorange": "reversed",
		    "showticklabels": false,
		    "showgrid": false,
		    "showline": false,
		    "zeroline": false
		},
		"showlegend": false,
		"paper_bgcolor": "rgba(0,0,0,0)",
		"plot_bgcolor": "rgba(0,0,0,0)"
	    }),
	    Self::TimeSeries => json!({
		"xaxis": {
		    "showticklabels": true,
		    "showgrid": false,
		    "zeroline": false
		},
		"yaxis": {
		    "showticklabels": true,
		    "showgrid": true,
		    "showline": true,
		    "zeroline": true
		},
		"showlegend": true,
		"paper_bgcolor": "rgba(0,0,0,0)",
		"plot_bgcolor": "rgba(0,0,0,0)"
	    }),
	}
    }

}


impl Figure {

    pub fn empty(layout: Layout) -> Self {
	Self { data: vec![], layout }
    }

    pub fn to_json(&self) -> Value {
	json!({
	    "data": self.data.iter().map(Trace::to_json).collect::<Vec<_>>(),
	    "layout": self.layout.to_json()
	})
    }

}


/// One outline per province, in name order.
pub fn outline_traces(contours: &ContourMap, highlighted: &[String], normalize: bool) -> Vec<Trace> {
    let highlighted = highlighted.iter()
	.map(|name| province_key(name, normalize)).collect::<Vec<_>>();
    contours.iter().map(|(name,contour)| {
	let mut x = Vec::new();
	let mut y = Vec::new();
	for (i,ring) in contour.rings().enumerate() {
	    if i > 0 {
		x.push(None);
		y.push(None);
	    }
	    x.extend(ring.0.iter().map(|c| Some(c.x)));
	    y.extend(ring.0.iter().map(|c| Some(c.y)));
	}
	Trace::Outline {
	    name: name.clone(), x, y,
	    highlighted: highlighted.contains(&province_key(name, normalize)),
	}
    }).collect()
}


/// One marker per province, also for provinces without cases.
pub fn marker_traces(barycenters: &Barycenters, cases: &[&CaseRecord], style: &MapStyle) -> Vec<Trace> {
    let counts = count_by_province(cases, style.normalize_names);
    barycenters.iter().map(|(name,center)| {
	let count = counts.get(&province_key(name, style.normalize_names)).copied().unwrap_or(0);
	Trace::Marker {
	    name: name.clone(),
	    x: center.x(),
	    y: center.y(),
	    count,
	    size: style.marker_scale * (count as f64).sqrt(),
	}
    }).collect()
}


pub fn map_traces(contours: &ContourMap, highlighted: &[String], barycenters: &Barycenters,
		  cases: &[&CaseRecord], style: &MapStyle) -> Vec<Trace> {
    let mut traces = outline_traces(contours, highlighted, style.normalize_names);
    traces.extend(marker_traces(barycenters, cases, style));
    traces
}


/// Cumulative daily counts over `days`; days without cases add zero.
pub fn cumulative_counts<I>(days: NaiveDateRange, dates: I) -> Vec<(chrono::NaiveDate,u64)>
where I: IntoIterator<Item = chrono::NaiveDate> {
    let mut per_day = BTreeMap::new();
    for date in dates {
	*per_day.entry(date).or_insert(0) += 1;
    }
    days.scan(0, |sum,date| {
	*sum += per_day.get(&date).copied().unwrap_or(0);
	Some((date, *sum))
    }).collect()
}


pub fn time_series_traces(selected: &[String], range: &DateRange, cases: &[&CaseRecord],
			  field: &str, normalize: bool) -> Vec<Trace> {

    let dates = || cases.iter().filter_map(|record| record.date(field));
    let start = range.start.or_else(|| dates().min());
    let end = range.end.or_else(|| dates().max());

    selected.iter().map(|province| {

	let key = province_key(province, normalize);
	let series = match (start, end) {
	    (Some(start), Some(end)) => cumulative_counts(
		NaiveDateRange(start, Some(end)),
		cases.iter()
		    .filter(|record| province_key(&record.province, normalize) == key)
		    .filter_map(|record| record.date(field))
		    .filter(|date| start <= *date && *date <= end)),
	    _ => vec![],
	};

	Trace::Line {
	    name: province.clone(),
	    x: series.iter().map(|(date,_)| format!("{}/{}", date.day(), date.month())).collect(),
	    y: series.iter().map(|(_,count)| *count).collect(),
	}

    }).collect()

}


pub fn write_page(graph_path: &Path, path: &str, title: &str, figures: &[Figure]) -> Result<()> {

    fs::create_dir_all(graph_path)?;
    let mut out = io::BufWriter::new(File::create(graph_path.join(path))?);
    let width = 100 / figures.len().max(1);

    write!(out, "<!DOCTYPE html><html><head>")?;
    write!(out, "<meta charset=\"UTF-8\">")?;
    write!(out, "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">")?;
    write!(out, "<title>{}</title>", escape_html(title))?;
    write!(out, "<script src=\"https://cdn.plot.ly/plotly-2.27.0.min.js\"></script>")?;
    write!(out, "</head>")?;
    write!(out, "<body>")?;
    write!(out, "<h2>{}</h2>", escape_html(title))?;

    for i in 0..figures.len() {
	write!(out, "<div id=\"figure{}\" style=\"display: inline-block; vertical-align: top; \
		     width: {}%; height: 85vh;\"></div>", i, width)?;
    }

    write!(out, "<script type=\"text/javascript\">")?;
    for (i,figure) in figures.iter().enumerate() {
	write!(out, "var figure{} = {}", i, script_json(&figure.to_json())?)?;
	write!(out, ";Plotly.newPlot('figure{}', figure{}.data, figure{}.layout);", i, i, i)?;
    }
    write!(out, "</script>")?;
    write!(out, "</body></html>")?;

    Ok(())

}


fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// JSON that cannot close the surrounding `<script>` element.
fn script_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace('<', "\\u003c"))
}
