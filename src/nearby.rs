use serde::{Deserialize, Serialize};

pub const DEFAULT_NEARBY_CUTOFF: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl PlotPoint {
    pub fn new(id: &str, x: f64, y: f64) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPoint {
    pub point: PlotPoint,
    pub distance: f64,
}

pub fn distance(a: &PlotPoint, b: &PlotPoint) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Points within `cutoff` of `center`, closest first, ties in input order.
/// The center itself (by id) is never part of the result.
pub fn find_nearby(center: &PlotPoint, all_points: &[PlotPoint], cutoff: f64) -> Vec<NearbyPoint> {
    collect_within(center, all_points, cutoff, |point| point.id != center.id)
}

pub fn find_nearby_at(x: f64, y: f64, all_points: &[PlotPoint], cutoff: f64) -> Vec<NearbyPoint> {
    let center = PlotPoint::new("", x, y);
    collect_within(&center, all_points, cutoff, |_| true)
}

fn collect_within<F>(center: &PlotPoint, all_points: &[PlotPoint], cutoff: f64, keep: F) -> Vec<NearbyPoint>
where
    F: Fn(&PlotPoint) -> bool,
{
    let mut nearby = all_points
        .iter()
        .filter(|point| keep(point))
        .filter_map(|point| {
            let d = distance(center, point);
            (d <= cutoff).then(|| NearbyPoint {
                point: point.clone(),
                distance: d,
            })
        })
        .collect::<Vec<_>>();
    nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    nearby
}
