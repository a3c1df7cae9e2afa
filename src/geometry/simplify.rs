//! Simplification choice and the simplifier collaborator.

use std::fmt;

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{
  CoordsIter, Geometry, GeometryCollection, Line, LineString, MultiLineString, MultiPolygon,
  Polygon, Simplify,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, SimplifyError};

/// Tolerance used by [`Tolerance::default`] and the convenience loaders.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// A finite, strictly positive simplification tolerance.
///
/// Larger values produce coarser geometry.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tolerance(f64);

impl Tolerance {
  pub fn new(value: f64) -> Result<Self> {
    if value.is_finite() && value > 0.0 {
      Ok(Self(value))
    } else {
      Err(Error::InvalidTolerance(value))
    }
  }

  pub fn value(self) -> f64 {
    self.0
  }
}

impl Default for Tolerance {
  fn default() -> Self {
    Self(DEFAULT_TOLERANCE)
  }
}

impl TryFrom<f64> for Tolerance {
  type Error = Error;

  fn try_from(value: f64) -> Result<Self> {
    Self::new(value)
  }
}

impl From<Tolerance> for f64 {
  fn from(tolerance: Tolerance) -> Self {
    tolerance.0
  }
}

impl fmt::Display for Tolerance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Whether, and how aggressively, to simplify loaded geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Simplification {
  /// Keep geometry exactly as parsed
  #[default]
  None,
  /// Simplify every geometry with the given tolerance
  Tolerance(Tolerance),
}

/// Geometry simplification collaborator.
pub trait Simplifier: Send + Sync {
  /// Return a simplified copy of `geometry`.
  ///
  /// Implementations must preserve topology: no self-intersections and no
  /// ring collapse beyond what the input already has.
  fn simplify(
    &self,
    geometry: &Geometry<f64>,
    tolerance: Tolerance,
  ) -> std::result::Result<Geometry<f64>, SimplifyError>;
}

/// Distance-bounded Ramer-Douglas-Peucker simplification from `geo`,
/// guarded so topology survives.
///
/// Every removed vertex lies within `tolerance` of the simplified shape. A
/// ring that would collapse below a closed ring or cross itself keeps its
/// source coordinates, and a polygon whose simplified rings would cross each
/// other is kept whole. Members of multi-geometries are simplified
/// independently. Points pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyPreservingSimplifier;

impl Simplifier for TopologyPreservingSimplifier {
  fn simplify(
    &self,
    geometry: &Geometry<f64>,
    tolerance: Tolerance,
  ) -> std::result::Result<Geometry<f64>, SimplifyError> {
    if let Some(bad) = geometry
      .coords_iter()
      .find(|c| !c.x.is_finite() || !c.y.is_finite())
    {
      return Err(SimplifyError(format!(
        "non-finite coordinate ({}, {})",
        bad.x, bad.y
      )));
    }

    Ok(simplify_geometry(geometry, &tolerance.value()))
  }
}

fn simplify_geometry(geometry: &Geometry<f64>, epsilon: &f64) -> Geometry<f64> {
  match geometry {
    Geometry::LineString(ls) => Geometry::LineString(simplify_line(ls, epsilon)),
    Geometry::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString::new(
      mls.iter().map(|ls| simplify_line(ls, epsilon)).collect(),
    )),
    Geometry::Polygon(p) => Geometry::Polygon(simplify_polygon(p, epsilon)),
    Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon::new(
      mp.iter().map(|p| simplify_polygon(p, epsilon)).collect(),
    )),
    Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
      gc.iter()
        .map(|g| simplify_geometry(g, epsilon))
        .collect::<GeometryCollection<f64>>(),
    ),
    // Nothing to remove from points, lines, rects and triangles
    other => other.clone(),
  }
}

fn simplify_line(line: &LineString<f64>, epsilon: &f64) -> LineString<f64> {
  let simplified = line.simplify(epsilon);
  if self_intersects(&simplified) {
    line.clone()
  } else {
    simplified
  }
}

fn simplify_ring(ring: &LineString<f64>, epsilon: &f64) -> LineString<f64> {
  let simplified = ring.simplify(epsilon);
  if collapsed(ring, &simplified) || self_intersects(&simplified) {
    ring.clone()
  } else {
    simplified
  }
}

fn simplify_polygon(polygon: &Polygon<f64>, epsilon: &f64) -> Polygon<f64> {
  let exterior = simplify_ring(polygon.exterior(), epsilon);
  let interiors: Vec<LineString<f64>> = polygon
    .interiors()
    .iter()
    .map(|ring| simplify_ring(ring, epsilon))
    .collect();

  let rings: Vec<&LineString<f64>> = std::iter::once(&exterior).chain(&interiors).collect();
  for (i, a) in rings.iter().enumerate() {
    if rings[i + 1..].iter().any(|b| rings_cross(a, b)) {
      return polygon.clone();
    }
  }

  Polygon::new(exterior, interiors)
}

/// A closed ring needs four coordinates; anything less is a collapse the
/// source did not have.
fn collapsed(before: &LineString<f64>, after: &LineString<f64>) -> bool {
  before.0.len() >= 4 && after.0.len() < 4
}

/// Whether any two non-adjacent segments touch, or adjacent ones overlap.
fn self_intersects(line: &LineString<f64>) -> bool {
  let segments: Vec<Line<f64>> = line.lines().collect();
  let n = segments.len();
  let closed = line.is_closed();

  for i in 0..n {
    for j in (i + 1)..n {
      let adjacent = j == i + 1 || (closed && i == 0 && j == n - 1);
      match line_intersection(segments[i], segments[j]) {
        None => {}
        // Adjacent segments share exactly their common endpoint
        Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
        Some(_) => return true,
      }
    }
  }
  false
}

fn rings_cross(a: &LineString<f64>, b: &LineString<f64>) -> bool {
  a.lines()
    .any(|sa| b.lines().any(|sb| line_intersection(sa, sb).is_some()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use geo::{coord, point, Coord};

  fn point_segment_distance(p: Coord<f64>, segment: Line<f64>) -> f64 {
    let d = segment.delta();
    let len2 = d.x * d.x + d.y * d.y;
    let t = if len2 == 0.0 {
      0.0
    } else {
      (((p.x - segment.start.x) * d.x + (p.y - segment.start.y) * d.y) / len2).clamp(0.0, 1.0)
    };
    (p.x - (segment.start.x + t * d.x)).hypot(p.y - (segment.start.y + t * d.y))
  }

  fn directed_distance(from: &LineString<f64>, to: &LineString<f64>) -> f64 {
    from
      .coords()
      .map(|c| {
        to.lines()
          .map(|l| point_segment_distance(*c, l))
          .fold(f64::INFINITY, f64::min)
      })
      .fold(0.0, f64::max)
  }

  fn hausdorff(a: &LineString<f64>, b: &LineString<f64>) -> f64 {
    directed_distance(a, b).max(directed_distance(b, a))
  }

  fn exterior(geometry: &Geometry<f64>) -> &LineString<f64> {
    match geometry {
      Geometry::Polygon(p) => p.exterior(),
      other => panic!("expected polygon, got {:?}", other),
    }
  }

  /// Rectangle whose bottom edge zigzags 0.05 deep over 200 teeth.
  fn zigzag_polygon() -> Polygon<f64> {
    let mut ring: Vec<Coord<f64>> = (0..=200)
      .map(|i| coord! { x: i as f64 * 0.05, y: if i % 2 == 1 { -0.05 } else { 0.0 } })
      .collect();
    ring.push(coord! { x: 10.0, y: 5.0 });
    ring.push(coord! { x: 0.0, y: 5.0 });
    Polygon::new(LineString::from(ring), vec![])
  }

  fn circle(cx: f64, cy: f64, radius: f64, segments: usize) -> Polygon<f64> {
    let ring: Vec<Coord<f64>> = (0..segments)
      .map(|i| {
        let angle = std::f64::consts::TAU * i as f64 / segments as f64;
        coord! { x: cx + radius * angle.cos(), y: cy + radius * angle.sin() }
      })
      .collect();
    Polygon::new(LineString::from(ring), vec![])
  }

  #[test]
  fn test_tolerance_rejects_non_positive_and_non_finite() {
    assert!(Tolerance::new(0.0).is_err());
    assert!(Tolerance::new(-0.5).is_err());
    assert!(Tolerance::new(f64::NAN).is_err());
    assert!(Tolerance::new(f64::INFINITY).is_err());
    assert!(Tolerance::new(0.05).is_ok());
  }

  #[test]
  fn test_tolerance_display_is_shortest_form() {
    assert_eq!(Tolerance::new(0.05).unwrap().to_string(), "0.05");
    assert_eq!(Tolerance::default().to_string(), "0.01");
  }

  #[test]
  fn test_tolerance_deserialize_validates() {
    let ok: Tolerance = serde_yaml::from_str("0.02").unwrap();
    assert_eq!(ok.value(), 0.02);
    assert!(serde_yaml::from_str::<Tolerance>("-1.0").is_err());
  }

  #[test]
  fn test_zigzag_deeper_than_tolerance_survives() {
    let polygon = Geometry::Polygon(zigzag_polygon());
    let simplified = TopologyPreservingSimplifier
      .simplify(&polygon, Tolerance::new(0.01).unwrap())
      .unwrap();

    assert_eq!(simplified.coords_count(), polygon.coords_count());
    assert!(hausdorff(exterior(&polygon), exterior(&simplified)) <= 0.01);
  }

  #[test]
  fn test_simplified_ring_stays_within_tolerance() {
    let polygon = Geometry::Polygon(circle(0.0, 0.0, 1.0, 64));
    for tolerance in [0.001, 0.01, 0.05, 0.2] {
      let simplified = TopologyPreservingSimplifier
        .simplify(&polygon, Tolerance::new(tolerance).unwrap())
        .unwrap();
      let distance = hausdorff(exterior(&polygon), exterior(&simplified));
      assert!(
        distance <= tolerance + 1e-12,
        "tolerance {} gave distance {}",
        tolerance,
        distance
      );
    }
  }

  #[test]
  fn test_self_intersection_detection() {
    let bowtie = LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]);
    let square = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
    let open_u = LineString::from(vec![(0.0, 1.0), (0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
    let doubling_back = LineString::from(vec![(0.0, 0.0), (2.0, 0.0), (1.0, 0.0)]);

    assert!(self_intersects(&bowtie));
    assert!(!self_intersects(&square));
    assert!(!self_intersects(&open_u));
    assert!(self_intersects(&doubling_back));
  }

  #[test]
  fn test_polygon_kept_when_shell_would_cut_through_hole() {
    // The shell's shallow dip is within tolerance, but the hole sits in it
    let shell = LineString::from(vec![
      (0.0, 0.0),
      (50.0, -0.5),
      (100.0, 0.0),
      (100.0, 100.0),
      (0.0, 100.0),
      (0.0, 0.0),
    ]);
    let hole = LineString::from(vec![(49.0, -0.4), (51.0, -0.4), (50.0, 0.2), (49.0, -0.4)]);
    let polygon = Polygon::new(shell, vec![hole]);

    let simplified = TopologyPreservingSimplifier
      .simplify(&Geometry::Polygon(polygon.clone()), Tolerance::new(1.0).unwrap())
      .unwrap();

    assert_eq!(simplified, Geometry::Polygon(polygon));
  }

  #[test]
  fn test_polygon_loses_vertices() {
    let polygon = Geometry::Polygon(circle(0.0, 0.0, 1.0, 64));
    let simplified = TopologyPreservingSimplifier
      .simplify(&polygon, Tolerance::new(0.05).unwrap())
      .unwrap();

    assert!(matches!(simplified, Geometry::Polygon(_)));
    assert!(simplified.coords_count() < polygon.coords_count());
    assert!(simplified.coords_count() >= 4);
  }

  #[test]
  fn test_polygon_never_collapses_below_a_ring() {
    let polygon = Geometry::Polygon(circle(0.0, 0.0, 0.001, 8));
    let simplified = TopologyPreservingSimplifier
      .simplify(&polygon, Tolerance::new(1000.0).unwrap())
      .unwrap();

    assert!(exterior(&simplified).0.len() >= 4);
    assert_eq!(simplified, polygon);
  }

  #[test]
  fn test_points_pass_through() {
    let p = Geometry::Point(point!(x: 1.5, y: 2.5));
    let simplified = TopologyPreservingSimplifier
      .simplify(&p, Tolerance::default())
      .unwrap();
    assert_eq!(simplified, p);
  }

  #[test]
  fn test_non_finite_coordinates_are_rejected() {
    let p = Geometry::Point(point!(x: f64::NAN, y: 0.0));
    let err = TopologyPreservingSimplifier
      .simplify(&p, Tolerance::default())
      .unwrap_err();
    assert!(err.0.contains("non-finite"));
  }
}
