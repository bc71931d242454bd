//! Flight geometry derived from a mission's waypoints.
//!
//! Everything here is a pure transform: no map or network access.

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{Waypoint, WaypointId};

/// `[longitude, latitude]`, the GeoJSON coordinate order.
pub type Coordinate = [f64; 2];

/// A longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn to_coordinate(self) -> Coordinate {
        [self.lng, self.lat]
    }
}

/// Axis-aligned longitude/latitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: LngLat,
    pub north_east: LngLat,
}

impl Bounds {
    /// Zero-area box seeded at a single point.
    pub fn from_point(point: LngLat) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    /// Grow the box so it contains `point`.
    pub fn extend(&mut self, point: LngLat) {
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
    }

    pub fn contains(&self, point: LngLat) -> bool {
        (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
            && (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.south_west.lng + self.north_east.lng) / 2.0,
            (self.south_west.lat + self.north_east.lat) / 2.0,
        )
    }
}

/// Renderable marker for one waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    pub index: i64,
    pub altitude: Option<f64>,
    pub id: WaypointId,
    pub longitude: f64,
    pub latitude: f64,
}

impl PointFeature {
    pub fn position(&self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }

    fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("index".to_string(), json!(self.index));
        properties.insert("altitude".to_string(), json!(self.altitude));
        properties.insert("id".to_string(), json!(self.id));

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![self.longitude, self.latitude]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Ordered markers, path and framing box for one mission.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightGeometry {
    pub ordered_points: Vec<PointFeature>,
    pub path_coordinates: Vec<Coordinate>,
    pub bounds: Option<Bounds>,
}

impl FlightGeometry {
    pub fn is_empty(&self) -> bool {
        self.ordered_points.is_empty()
    }

    /// Markers as a GeoJSON `FeatureCollection` of points.
    pub fn points_geojson(&self) -> GeoJson {
        GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features: self.ordered_points.iter().map(PointFeature::to_feature).collect(),
            foreign_members: None,
        })
    }

    /// Flight path as a single GeoJSON `LineString` feature.
    pub fn path_geojson(&self) -> GeoJson {
        let line = self
            .path_coordinates
            .iter()
            .map(|coordinate| coordinate.to_vec())
            .collect();
        GeoJson::Feature(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(line))),
            id: None,
            properties: Some(JsonObject::new()),
            foreign_members: None,
        })
    }
}

/// Sort waypoints by `index` and derive markers, path and bounds.
///
/// The sort is stable: waypoints sharing an index keep their input order.
pub fn derive_geometry(waypoints: &[Waypoint]) -> FlightGeometry {
    let mut sorted: Vec<&Waypoint> = waypoints.iter().collect();
    sorted.sort_by_key(|waypoint| waypoint.index);

    let ordered_points: Vec<PointFeature> = sorted
        .iter()
        .map(|waypoint| PointFeature {
            index: waypoint.index,
            altitude: waypoint.altitude,
            id: waypoint.id,
            longitude: waypoint.longitude,
            latitude: waypoint.latitude,
        })
        .collect();

    let path_coordinates = ordered_points
        .iter()
        .map(|point| point.position().to_coordinate())
        .collect();

    let bounds = ordered_points.split_first().map(|(first, rest)| {
        rest.iter().fold(Bounds::from_point(first.position()), |mut bounds, point| {
            bounds.extend(point.position());
            bounds
        })
    });

    FlightGeometry {
        ordered_points,
        path_coordinates,
        bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoint(id: i64, index: i64, lng: f64, lat: f64) -> Waypoint {
        Waypoint {
            id,
            mission_id: 1,
            latitude: lat,
            longitude: lng,
            altitude: None,
            index,
        }
    }

    #[test]
    fn orders_path_by_index() {
        let waypoints = vec![
            waypoint(1, 2, 10.0, 50.0),
            waypoint(2, 0, 11.0, 51.0),
            waypoint(3, 1, 12.0, 52.0),
        ];

        let geometry = derive_geometry(&waypoints);
        assert_eq!(
            geometry.path_coordinates,
            vec![[11.0, 51.0], [12.0, 52.0], [10.0, 50.0]]
        );
        let ids: Vec<i64> = geometry.ordered_points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn empty_input_has_no_geometry() {
        let geometry = derive_geometry(&[]);
        assert!(geometry.is_empty());
        assert!(geometry.path_coordinates.is_empty());
        assert!(geometry.bounds.is_none());
    }

    #[test]
    fn equal_indices_keep_input_order() {
        let waypoints = vec![
            waypoint(10, 1, 0.0, 0.0),
            waypoint(11, 0, 1.0, 1.0),
            waypoint(12, 1, 2.0, 2.0),
            waypoint(13, 0, 3.0, 3.0),
            waypoint(14, 1, 4.0, 4.0),
        ];

        let geometry = derive_geometry(&waypoints);
        let ids: Vec<i64> = geometry.ordered_points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![11, 13, 10, 12, 14]);
    }

    #[test]
    fn path_keeps_every_waypoint_in_index_order() {
        let waypoints: Vec<Waypoint> = [7, 3, 9, 3, 0, 12, 5]
            .iter()
            .enumerate()
            .map(|(i, index)| waypoint(i as i64, *index, i as f64, -(i as f64)))
            .collect();

        let geometry = derive_geometry(&waypoints);
        assert_eq!(geometry.path_coordinates.len(), waypoints.len());
        assert!(geometry
            .ordered_points
            .windows(2)
            .all(|pair| pair[0].index <= pair[1].index));
    }

    #[test]
    fn bounds_cover_all_points() {
        let waypoints = vec![
            waypoint(1, 0, 174.70, -36.80),
            waypoint(2, 1, 174.78, -36.86),
            waypoint(3, 2, 174.74, -36.83),
        ];

        let bounds = derive_geometry(&waypoints).bounds.unwrap();
        assert_eq!(bounds.south_west, LngLat::new(174.70, -36.86));
        assert_eq!(bounds.north_east, LngLat::new(174.78, -36.80));
        assert!(waypoints
            .iter()
            .all(|w| bounds.contains(LngLat::new(w.longitude, w.latitude))));
    }

    #[test]
    fn single_point_bounds_have_zero_area() {
        let bounds = derive_geometry(&[waypoint(1, 0, 5.0, 6.0)]).bounds.unwrap();
        assert_eq!(bounds.south_west, bounds.north_east);
    }

    #[test]
    fn geojson_shapes_match_map_sources() {
        let geometry = derive_geometry(&[waypoint(1, 4, 5.0, 6.0), waypoint(2, 5, 7.0, 8.0)]);

        let points = serde_json::to_value(geometry.points_geojson()).unwrap();
        assert_eq!(points["type"], "FeatureCollection");
        assert_eq!(points["features"][0]["geometry"]["type"], "Point");
        assert_eq!(points["features"][0]["properties"]["index"], 4);

        let path = serde_json::to_value(geometry.path_geojson()).unwrap();
        assert_eq!(path["type"], "Feature");
        assert_eq!(path["geometry"]["type"], "LineString");
        assert_eq!(path["geometry"]["coordinates"][1][0], 7.0);
    }

    #[test]
    fn exported_sources_parse_as_geojson() {
        let geometry = derive_geometry(&[waypoint(1, 0, 5.0, 6.0), waypoint(2, 1, 7.0, 8.0)]);

        let points: GeoJson = geometry.points_geojson().to_string().parse().unwrap();
        let GeoJson::FeatureCollection(collection) = points else {
            panic!("expected a feature collection");
        };
        assert_eq!(collection.features.len(), 2);
        assert_eq!(
            collection.features[1].geometry.as_ref().map(|g| &g.value),
            Some(&Value::Point(vec![7.0, 8.0]))
        );

        let path: GeoJson = geometry.path_geojson().to_string().parse().unwrap();
        let GeoJson::Feature(feature) = path else {
            panic!("expected a feature");
        };
        assert_eq!(
            feature.geometry.map(|g| g.value),
            Some(Value::LineString(vec![vec![5.0, 6.0], vec![7.0, 8.0]]))
        );
    }
}
