use crate::data::RegionStore;
use crate::types::RegionId;
use geo::bounding_rect::BoundingRect;
use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};

// Wrapper for RTree indexing
struct RegionEnvelope {
    id: RegionId,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Point-in-region lookup over one map's regions.
///
/// Boundaries are closed: a point on a region's edge belongs to that region.
/// When several regions claim a point (shared edges, overlaps), the one that
/// was loaded first wins.
pub struct HitTester {
    tree: RTree<RegionEnvelope>,
}

impl HitTester {
    pub fn build(store: &RegionStore) -> Self {
        let items: Vec<RegionEnvelope> = store
            .regions()
            .iter()
            .filter_map(|region| {
                let rect = region.geometry.bounding_rect()?;
                Some(RegionEnvelope {
                    id: region.id,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        tracing::debug!("Built spatial index over {} regions", items.len());
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn locate(&self, store: &RegionStore, point: Point<f64>) -> Option<RegionId> {
        if !point.x().is_finite() || !point.y().is_finite() {
            return None;
        }

        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut candidates: Vec<RegionId> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.id)
            .collect();
        // Tree order is arbitrary; load order decides ties.
        candidates.sort_unstable();

        candidates.into_iter().find(|id| {
            // Per part: a MultiPolygon counts boundary hits modulo 2, so a
            // vertex shared by two of its parts would read as outside.
            store.get(*id).is_some_and(|region| {
                region
                    .geometry
                    .0
                    .iter()
                    .any(|part| part.coordinate_position(&point.0) != CoordPos::Outside)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;
    use geo::{polygon, MultiPolygon};
    use std::path::Path;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    fn store(features: Vec<(&str, MultiPolygon<f64>)>) -> RegionStore {
        let features = features
            .into_iter()
            .map(|(name, geometry)| (name.to_string(), geometry))
            .collect();
        RegionStore::from_features(Path::new("test.geojson"), features, Color::WHITE).unwrap()
    }

    #[test]
    fn finds_the_enclosing_region() {
        let store = store(vec![
            ("R1", square(0.0, 0.0, 1.0)),
            ("R2", square(2.0, 0.0, 1.0)),
            ("R3", square(4.0, 0.0, 1.0)),
        ]);
        let hits = HitTester::build(&store);

        assert_eq!(hits.locate(&store, Point::new(0.5, 0.5)), Some(RegionId(0)));
        assert_eq!(hits.locate(&store, Point::new(2.5, 0.5)), Some(RegionId(1)));
        assert_eq!(hits.locate(&store, Point::new(4.1, 0.9)), Some(RegionId(2)));
    }

    #[test]
    fn misses_return_none() {
        let store = store(vec![("R1", square(0.0, 0.0, 1.0)), ("R2", square(2.0, 0.0, 1.0))]);
        let hits = HitTester::build(&store);

        // Between the squares, inside the combined bounding box.
        assert_eq!(hits.locate(&store, Point::new(1.5, 0.5)), None);
        assert_eq!(hits.locate(&store, Point::new(-10.0, 40.0)), None);
        assert_eq!(hits.locate(&store, Point::new(f64::NAN, 0.5)), None);
        assert_eq!(hits.locate(&store, Point::new(0.5, f64::INFINITY)), None);
    }

    #[test]
    fn shared_edge_goes_to_first_loaded_region() {
        let store = store(vec![("West", square(0.0, 0.0, 1.0)), ("East", square(1.0, 0.0, 1.0))]);
        let hits = HitTester::build(&store);
        assert_eq!(hits.locate(&store, Point::new(1.0, 0.5)), Some(RegionId(0)));

        let reversed = self::store(vec![("East", square(1.0, 0.0, 1.0)), ("West", square(0.0, 0.0, 1.0))]);
        let hits = HitTester::build(&reversed);
        assert_eq!(hits.locate(&reversed, Point::new(1.0, 0.5)), Some(RegionId(0)));
    }

    #[test]
    fn outer_boundary_counts_as_inside() {
        let store = store(vec![("R1", square(0.0, 0.0, 1.0))]);
        let hits = HitTester::build(&store);
        assert_eq!(hits.locate(&store, Point::new(0.0, 0.0)), Some(RegionId(0)));
        assert_eq!(hits.locate(&store, Point::new(0.5, 1.0)), Some(RegionId(0)));
    }

    fn joined(a: MultiPolygon<f64>, b: MultiPolygon<f64>) -> MultiPolygon<f64> {
        MultiPolygon::new(a.0.into_iter().chain(b.0).collect())
    }

    #[test]
    fn vertex_between_parts_of_one_region_is_inside() {
        let islands = joined(square(0.0, 0.0, 1.0), square(1.0, 1.0, 1.0));
        let store = store(vec![("Archipelago", islands)]);
        let hits = HitTester::build(&store);

        assert_eq!(hits.locate(&store, Point::new(1.0, 1.0)), Some(RegionId(0)));
        assert_eq!(hits.locate(&store, Point::new(0.5, 1.0)), Some(RegionId(0)));
    }

    #[test]
    fn edge_between_parts_of_one_region_is_inside() {
        let halves = joined(square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0));
        let store = store(vec![("Twin", halves)]);
        let hits = HitTester::build(&store);

        assert_eq!(hits.locate(&store, Point::new(1.0, 0.5)), Some(RegionId(0)));
    }

    #[test]
    fn holes_are_not_part_of_the_region() {
        let ring = geo::Polygon::new(
            geo::LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            vec![geo::LineString::from(vec![
                (1.0, 1.0),
                (3.0, 1.0),
                (3.0, 3.0),
                (1.0, 3.0),
                (1.0, 1.0),
            ])],
        );
        let store = store(vec![
            ("Ring", MultiPolygon::new(vec![ring])),
            ("Enclave", square(1.0, 1.0, 2.0)),
        ]);
        let hits = HitTester::build(&store);

        assert_eq!(hits.locate(&store, Point::new(0.5, 0.5)), Some(RegionId(0)));
        assert_eq!(hits.locate(&store, Point::new(2.0, 2.0)), Some(RegionId(1)));
    }
}
