//! Particle tracks produced by an external tracker.
//!
//! Tracks are read-only context for reporting; the graph pipeline never
//! consumes them. Two inputs are accepted:
//!
//! - **TrackMate XML** (`.xml`): spots from `AllSpots`, links from the
//!   `Edge` elements of every `Track` listed under `FilteredTracks` (every
//!   track when that section is absent).
//! - **Link table** (anything else): the `;`-delimited table this crate's
//!   reports write, one row per link with [`LINK_COLUMNS`] as header.
//!
//! A track is kept as its links, each joining an earlier spot to a later
//! one, so branching and merging tracks survive unchanged.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{CytoError, Result};
use crate::volume::Point3;

/// Header of the link table: spot features of the source (`0`) and target
/// (`1`) end of every link.
pub const LINK_COLUMNS: [&str; 17] = [
    "ID",
    "t0",
    "x0",
    "y0",
    "z0",
    "avg.intensity0",
    "tot.intensity0",
    "quality0",
    "diameter0",
    "t1",
    "x1",
    "y1",
    "z1",
    "avg.intensity1",
    "tot.intensity1",
    "quality1",
    "diameter1",
];

/// One detected spot. Feature values the tracker did not report are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackSpot {
    pub t: f64,
    pub position: Point3,
    pub avg_intensity: Option<f64>,
    pub tot_intensity: Option<f64>,
    pub quality: Option<f64>,
    pub diameter: Option<f64>,
}

impl TrackSpot {
    fn key(&self) -> [u64; 4] {
        [
            self.t.to_bits(),
            self.position.x.to_bits(),
            self.position.y.to_bits(),
            self.position.z.to_bits(),
        ]
    }

    /// The feature columns of this spot, in [`LINK_COLUMNS`] order.
    #[must_use]
    pub const fn fields(&self) -> [Option<f64>; 8] {
        [
            Some(self.t),
            Some(self.position.x),
            Some(self.position.y),
            Some(self.position.z),
            self.avg_intensity,
            self.tot_intensity,
            self.quality,
            self.diameter,
        ]
    }
}

/// A link between two spots of one track, `source.t <= target.t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackLink {
    pub source: TrackSpot,
    pub target: TrackSpot,
}

impl TrackLink {
    fn ordered(a: TrackSpot, b: TrackSpot) -> Self {
        if b.t < a.t {
            Self { source: b, target: a }
        } else {
            Self { source: a, target: b }
        }
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.source.position.distance(&self.target.position)
    }
}

/// All links that share a track id, ordered by source then target time.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u64,
    pub links: Vec<TrackLink>,
}

/// Descriptive statistics of one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackSummary {
    pub id: u64,
    /// Distinct spots.
    pub points: usize,
    pub t_start: f64,
    pub t_end: f64,
    /// Sum of the link lengths.
    pub path_length: f64,
    /// `path_length / (t_end - t_start)`; `None` for a single instant.
    pub mean_speed: Option<f64>,
    /// Mean spot intensity; `None` when no spot reports one.
    pub mean_intensity: Option<f64>,
}

impl Track {
    fn new(id: u64, mut links: Vec<TrackLink>) -> Self {
        links.sort_by(|a, b| {
            a.source
                .t
                .total_cmp(&b.source.t)
                .then(a.target.t.total_cmp(&b.target.t))
        });
        Self { id, links }
    }

    /// Distinct spots of the track, by time.
    #[must_use]
    pub fn spots(&self) -> Vec<TrackSpot> {
        let mut seen = BTreeSet::new();
        let mut spots: Vec<TrackSpot> = self
            .links
            .iter()
            .flat_map(|l| [l.source, l.target])
            .filter(|s| seen.insert(s.key()))
            .collect();
        spots.sort_by(|a, b| a.t.total_cmp(&b.t));
        spots
    }

    /// Summarize this track. Returns `None` for a track without links.
    #[must_use]
    pub fn summary(&self) -> Option<TrackSummary> {
        let spots = self.spots();
        let t_start = spots.first()?.t;
        let t_end = spots.last()?.t;
        let path_length: f64 = self.links.iter().map(TrackLink::length).sum();
        let intensities: Vec<f64> = spots.iter().filter_map(|s| s.avg_intensity).collect();
        let duration = t_end - t_start;
        Some(TrackSummary {
            id: self.id,
            points: spots.len(),
            t_start,
            t_end,
            path_length,
            mean_speed: (duration > 0.0).then(|| path_length / duration),
            mean_intensity: (!intensities.is_empty())
                .then(|| intensities.iter().sum::<f64>() / intensities.len() as f64),
        })
    }
}

// ---------------------------------------------------------------------------
// TrackMate XML
// ---------------------------------------------------------------------------

fn number(node: Node<'_, '_>, names: &[&str]) -> Option<f64> {
    names
        .iter()
        .find_map(|name| node.attribute(*name))
        .and_then(|v| v.trim().parse::<f64>().ok())
}

fn required(node: Node<'_, '_>, name: &str) -> std::result::Result<f64, String> {
    number(node, &[name]).ok_or_else(|| {
        format!(
            "<{}> at byte {} has no numeric {name}",
            node.tag_name().name(),
            node.range().start
        )
    })
}

fn id(node: Node<'_, '_>, name: &str) -> std::result::Result<u64, String> {
    node.attribute(name)
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| format!("<{}> has no integer {name}", node.tag_name().name()))
}

fn spot(node: Node<'_, '_>) -> std::result::Result<(u64, TrackSpot), String> {
    let t = number(node, &["FRAME", "POSITION_T"])
        .ok_or_else(|| "spot has neither FRAME nor POSITION_T".to_string())?;
    let spot = TrackSpot {
        t,
        position: Point3::new(
            required(node, "POSITION_X")?,
            required(node, "POSITION_Y")?,
            number(node, &["POSITION_Z"]).unwrap_or(0.0),
        ),
        avg_intensity: number(node, &["MEAN_INTENSITY", "MEAN_INTENSITY_CH1"]),
        tot_intensity: number(node, &["TOTAL_INTENSITY", "TOTAL_INTENSITY_CH1"]),
        quality: number(node, &["QUALITY"]),
        diameter: number(node, &["ESTIMATED_DIAMETER"])
            .or_else(|| number(node, &["RADIUS"]).map(|r| 2.0 * r)),
    };
    Ok((id(node, "ID")?, spot))
}

/// Parse a TrackMate XML document.
///
/// # Errors
///
/// Returns a message for malformed XML, spots without coordinates and links
/// to unknown spots.
pub fn parse_trackmate(text: &str) -> std::result::Result<Vec<Track>, String> {
    let doc = Document::parse(text).map_err(|e| e.to_string())?;

    let spots: HashMap<u64, TrackSpot> = doc
        .descendants()
        .filter(|n| n.has_tag_name("Spot"))
        .map(spot)
        .collect::<std::result::Result<_, _>>()?;

    let filtered: Option<BTreeSet<u64>> = doc
        .descendants()
        .find(|n| n.has_tag_name("FilteredTracks"))
        .map(|section| {
            section
                .children()
                .filter(|n| n.has_tag_name("TrackID"))
                .map(|n| id(n, "TRACK_ID"))
                .collect::<std::result::Result<_, _>>()
        })
        .transpose()?;

    let mut tracks = Vec::new();
    for track in doc.descendants().filter(|n| n.has_tag_name("Track")) {
        let track_id = id(track, "TRACK_ID")?;
        if filtered.as_ref().is_some_and(|keep| !keep.contains(&track_id)) {
            continue;
        }
        let links = track
            .children()
            .filter(|n| n.has_tag_name("Edge"))
            .map(|edge| {
                let end = |name: &str| -> std::result::Result<TrackSpot, String> {
                    let spot_id = id(edge, name)?;
                    spots
                        .get(&spot_id)
                        .copied()
                        .ok_or_else(|| format!("track {track_id} links unknown spot {spot_id}"))
                };
                Ok(TrackLink::ordered(end("SPOT_SOURCE_ID")?, end("SPOT_TARGET_ID")?))
            })
            .collect::<std::result::Result<Vec<_>, String>>()?;
        tracks.push(Track::new(track_id, links));
    }
    tracks.sort_by_key(|t| t.id);
    Ok(tracks)
}

// ---------------------------------------------------------------------------
// Link table
// ---------------------------------------------------------------------------

/// One row of the link table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct LinkRow {
    #[serde(rename = "ID")]
    id: u64,
    t0: f64,
    x0: f64,
    y0: f64,
    z0: f64,
    #[serde(rename = "avg.intensity0")]
    avg_intensity0: Option<f64>,
    #[serde(rename = "tot.intensity0")]
    tot_intensity0: Option<f64>,
    quality0: Option<f64>,
    diameter0: Option<f64>,
    t1: f64,
    x1: f64,
    y1: f64,
    z1: f64,
    #[serde(rename = "avg.intensity1")]
    avg_intensity1: Option<f64>,
    #[serde(rename = "tot.intensity1")]
    tot_intensity1: Option<f64>,
    quality1: Option<f64>,
    diameter1: Option<f64>,
}

/// `nan` in a feature column means "not reported".
fn reported(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

impl LinkRow {
    fn into_link(self) -> TrackLink {
        TrackLink::ordered(
            TrackSpot {
                t: self.t0,
                position: Point3::new(self.x0, self.y0, self.z0),
                avg_intensity: reported(self.avg_intensity0),
                tot_intensity: reported(self.tot_intensity0),
                quality: reported(self.quality0),
                diameter: reported(self.diameter0),
            },
            TrackSpot {
                t: self.t1,
                position: Point3::new(self.x1, self.y1, self.z1),
                avg_intensity: reported(self.avg_intensity1),
                tot_intensity: reported(self.tot_intensity1),
                quality: reported(self.quality1),
                diameter: reported(self.diameter1),
            },
        )
    }
}

fn load_link_table(path: &Path) -> Result<Vec<Track>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| CytoError::input_load("tracks", path, e))?;

    let mut grouped: HashMap<u64, Vec<TrackLink>> = HashMap::new();
    for (row, record) in reader.deserialize::<LinkRow>().enumerate() {
        let record = record
            .map_err(|e| CytoError::input_load("tracks", path, format!("row {}: {e}", row + 1)))?;
        grouped.entry(record.id).or_default().push(record.into_link());
    }
    let mut tracks: Vec<Track> = grouped
        .into_iter()
        .map(|(id, links)| Track::new(id, links))
        .collect();
    tracks.sort_by_key(|t| t.id);
    Ok(tracks)
}

/// Read a TrackMate XML file or a link table. Tracks come back sorted by id.
///
/// # Errors
///
/// Returns [`CytoError::InputLoad`] if the file cannot be read or is
/// malformed.
#[instrument]
pub fn load_tracks(path: &Path) -> Result<Vec<Track>> {
    let is_xml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"));
    let tracks = if is_xml {
        let text = std::fs::read_to_string(path).map_err(|e| CytoError::input_load("tracks", path, e))?;
        parse_trackmate(&text).map_err(|e| CytoError::input_load("tracks", path, e))?
    } else {
        load_link_table(path)?
    };
    debug!(
        tracks = tracks.len(),
        links = tracks.iter().map(|t| t.links.len()).sum::<usize>(),
        "tracks loaded"
    );
    Ok(tracks)
}
