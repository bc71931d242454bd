//! KML mission file parsing.
//!
//! Waypoints come from `Placemark` elements in the KML 2.2 namespace. Each
//! placemark needs a `Point/coordinates` value; the DJI waypoint extension
//! (`wpml`) supplies the sequence `index` and the `executeHeight` altitude as
//! direct children of the placemark.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::ParsedWaypoint;

pub const KML_NAMESPACE: &[u8] = b"http://www.opengis.net/kml/2.2";
/// Prefix shared by every published version of the DJI waypoint namespace.
pub const WPML_NAMESPACE_PREFIX: &[u8] = b"http://www.dji.com/wpmz/";

#[derive(Error, Debug)]
pub enum KmlError {
    #[error("Invalid KML file format: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid KML file format: document is empty")]
    Empty,

    #[error("Invalid KML file format: unexpected end of document inside <{0}>")]
    Truncated(String),
}

/// Reasons a single placemark is skipped.
#[derive(Error, Debug, PartialEq)]
enum PlacemarkError {
    #[error("placemark has no point coordinates")]
    MissingCoordinates,

    #[error("invalid coordinate format: {0}")]
    Coordinates(String),

    #[error("invalid waypoint index: {0}")]
    Index(String),

    #[error("invalid execute height: {0}")]
    Height(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Placemark,
    Point,
    Coordinates,
    Index,
    ExecuteHeight,
    Other,
}

impl Tag {
    fn resolve(ns: &ResolveResult<'_>, local_name: &[u8]) -> Self {
        match ns {
            ResolveResult::Bound(Namespace(uri)) if *uri == KML_NAMESPACE => match local_name {
                b"Placemark" => Tag::Placemark,
                b"Point" => Tag::Point,
                b"coordinates" => Tag::Coordinates,
                _ => Tag::Other,
            },
            ResolveResult::Bound(Namespace(uri)) if uri.starts_with(WPML_NAMESPACE_PREFIX) => {
                match local_name {
                    b"index" => Tag::Index,
                    b"executeHeight" => Tag::ExecuteHeight,
                    _ => Tag::Other,
                }
            }
            _ => Tag::Other,
        }
    }
}

/// Raw text collected while walking one placemark.
#[derive(Debug, Default)]
struct PlacemarkDraft {
    /// Stack depth of the `Placemark` element itself.
    depth: usize,
    coordinates: Option<String>,
    /// Set once the first `coordinates` element has closed.
    coordinates_closed: bool,
    index: Option<String>,
    execute_height: Option<String>,
}

impl PlacemarkDraft {
    fn finish(self) -> Result<ParsedWaypoint, PlacemarkError> {
        let coordinates = self
            .coordinates
            .filter(|text| !text.trim().is_empty())
            .ok_or(PlacemarkError::MissingCoordinates)?;
        let (longitude, latitude, coordinate_altitude) = parse_coordinates(&coordinates)?;

        let index = match self.index.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text
                .parse::<i64>()
                .map_err(|_| PlacemarkError::Index(text.to_string()))?,
            _ => 0,
        };

        let altitude = match self.execute_height.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Some(
                text.parse::<f64>()
                    .ok()
                    .filter(|height| height.is_finite())
                    .ok_or_else(|| PlacemarkError::Height(text.to_string()))?,
            ),
            _ => coordinate_altitude,
        };

        Ok(ParsedWaypoint {
            latitude,
            longitude,
            altitude,
            index,
        })
    }
}

/// Parse `lon,lat` or `lon,lat,alt`.
fn parse_coordinates(text: &str) -> Result<(f64, f64, Option<f64>), PlacemarkError> {
    let text = text.trim();
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let invalid = || PlacemarkError::Coordinates(text.to_string());

    let (lon, lat, alt) = match parts.as_slice() {
        [lon, lat] => (lon, lat, None),
        [lon, lat, alt] => (lon, lat, Some(alt)),
        _ => return Err(invalid()),
    };

    let number = |part: &str| {
        part.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(invalid)
    };

    let longitude = number(lon)?;
    let latitude = number(lat)?;
    let altitude = alt.map(|alt| number(alt)).transpose()?;
    Ok((longitude, latitude, altitude))
}

/// Extract the waypoints of a KML mission, sorted by index.
///
/// Placemarks without usable coordinates are skipped with a warning; the
/// document as a whole must still be well-formed XML.
pub fn parse_kml(content: &str) -> Result<Vec<ParsedWaypoint>, KmlError> {
    let mut reader = NsReader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<(Tag, String)> = Vec::new();
    let mut saw_root = false;
    let mut draft: Option<PlacemarkDraft> = None;
    let mut waypoints = Vec::new();

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(element)) => {
                saw_root = true;
                let local = element.local_name();
                let tag = Tag::resolve(&ns, local.as_ref());
                stack.push((tag, String::from_utf8_lossy(local.as_ref()).into_owned()));
                if tag == Tag::Placemark && draft.is_none() {
                    draft = Some(PlacemarkDraft {
                        depth: stack.len(),
                        ..Default::default()
                    });
                }
            }
            (_, Event::Empty(_)) => {
                saw_root = true;
            }
            (_, Event::Text(text)) => {
                let text = text.unescape()?;
                collect_text(&stack, draft.as_mut(), &text);
            }
            (_, Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                collect_text(&stack, draft.as_mut(), &text);
            }
            (_, Event::End(_)) => {
                let closing_depth = stack.len();
                let closed = stack.pop();
                if let (Some(d), Some((Tag::Coordinates, _))) = (draft.as_mut(), closed.as_ref()) {
                    d.coordinates_closed = d.coordinates.is_some();
                }
                if draft.as_ref().is_some_and(|d| d.depth == closing_depth) {
                    if let Some(finished) = draft.take() {
                        match finished.finish() {
                            Ok(waypoint) => waypoints.push(waypoint),
                            Err(err) => warn!("Skipping placemark: {}", err),
                        }
                    }
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    if let Some((_, name)) = stack.last() {
        return Err(KmlError::Truncated(name.clone()));
    }
    if !saw_root {
        return Err(KmlError::Empty);
    }

    waypoints.sort_by_key(|waypoint| waypoint.index);
    info!("Parsed KML: {} waypoints found", waypoints.len());
    Ok(waypoints)
}

fn collect_text(stack: &[(Tag, String)], draft: Option<&mut PlacemarkDraft>, text: &str) {
    let Some(draft) = draft else {
        return;
    };
    let depth = stack.len();
    let Some((tag, _)) = stack.last() else {
        return;
    };
    let parent = depth.checked_sub(2).and_then(|i| stack.get(i)).map(|(t, _)| *t);

    let slot = match tag {
        // The first Point's coordinates win, like a descendant lookup would.
        Tag::Coordinates if parent == Some(Tag::Point) && !draft.coordinates_closed => {
            &mut draft.coordinates
        }
        Tag::Index if depth == draft.depth + 1 => &mut draft.index,
        Tag::ExecuteHeight if depth == draft.depth + 1 => &mut draft.execute_height,
        _ => return,
    };
    slot.get_or_insert_with(String::new).push_str(text);
}
