use std::io;
use std::fs::File;
use std::path::Path;
use std::collections::BTreeMap;

use geo::{Coord,LineString,MultiLineString,Point};
use geojson::GeoJson;
use log::{info,warn};

use super::error::{Result,Error};


/// Boundary of one province. Multi-part provinces keep one ring per part.
#[derive(Debug,Clone,PartialEq)]
pub struct Contour(MultiLineString<f64>);

pub type ContourMap = BTreeMap<String,Contour>;
pub type Barycenters = BTreeMap<String,Point<f64>>;

impl Contour {

    pub fn new(rings: Vec<LineString<f64>>) -> Self {
	Self(MultiLineString::new(rings))
    }

    pub fn rings(&self) -> impl Iterator<Item = &LineString<f64>> {
	self.0.iter()
    }

    pub fn points(&self) -> impl Iterator<Item = &Coord<f64>> {
	self.0.iter().flat_map(|ring| ring.0.iter())
    }

}


pub fn load(path: &Path, name_property: &str) -> Result<ContourMap> {

    info!("Loading contours from {:?}...", path);

    let file = File::open(path).map_err(|err| Error::data_load(path, err))?;
    let geojson = GeoJson::from_reader(io::BufReader::new(file))
	.map_err(|err| Error::data_load(path, err))?;

    let collection = match geojson {
	GeoJson::FeatureCollection(fc) => fc,
	_ => return Err(Error::data_load(path, "GeoJSON must be a FeatureCollection")),
    };

    let mut contours = BTreeMap::new();

    for (row,feature) in collection.features.into_iter().enumerate() {

	let name = match feature.properties.as_ref().and_then(|props| props.get(name_property)) {
	    Some(serde_json::Value::String(s)) => s.clone(),
	    Some(serde_json::Value::Number(n)) => n.to_string(),
	    _ => {
		warn!("Skipping feature {} without a {:?} property", row, name_property);
		continue;
	    }
	};

	let value = match feature.geometry {
	    Some(geometry) => geometry.value,
	    None => {
		warn!("Skipping {}: no geometry", name);
		continue;
	    }
	};

	let rings = match geo::Geometry::<f64>::try_from(value) {
	    Ok(geo::Geometry::Polygon(polygon)) => vec![polygon.into_inner().0],
	    Ok(geo::Geometry::MultiPolygon(parts)) => parts.into_iter()
		.map(|polygon| polygon.into_inner().0).collect(),
	    Ok(_) => {
		warn!("Skipping {}: not a polygon", name);
		continue;
	    }
	    Err(err) => return Err(Error::Parse {
		row, field: "geometry".to_string(), value: err.to_string()
	    }),
	};

	if contours.insert(name.clone(), Contour::new(rings)).is_some() {
	    return Err(Error::Parse { row, field: name_property.to_string(), value: name });
	}

    }

    info!("Loaded {} contours", contours.len());
    Ok(contours)

}


pub fn barycenter(name: &str, contour: &Contour) -> Result<Point<f64>> {
    let (n,sum) = contour.points().fold(
	(0usize, Coord { x: 0.0, y: 0.0 }),
	|(n,sum),c| (n + 1, sum + *c));
    match n {
	0 => Err(Error::InvalidGeometry(name.to_string())),
	n => Ok(Point::from(sum / n as f64)),
    }
}


pub fn barycenters(contours: &ContourMap) -> Result<Barycenters> {
    contours.iter().map(
	|(name,contour)| Ok((name.clone(), barycenter(name, contour)?))
    ).collect()
}
