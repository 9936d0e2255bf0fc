use geo::{Coord, LineString, Simplify};
use tracing::debug;

/// Polylines at or below this many points are served as-is; simplifying
/// them has no visible benefit and only risks shape fidelity.
pub const MIN_POINTS: usize = 300;

/// Reduces an ordered `[lat, lon]` polyline for rendering using
/// Ramer-Douglas-Peucker. The effective epsilon grows logarithmically with
/// point count (`tolerance * log10(n)`), so a fixed caller tolerance suits
/// both a 400-point and a 20,000-point shape. First and last points always
/// survive, and the result is never longer than the input. Running the
/// function on its own output returns it unchanged.
pub fn simplify(points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
    if points.len() <= MIN_POINTS {
        return points.to_vec();
    }
    let epsilon = tolerance * (points.len() as f64).log10();
    let line = LineString::new(
        points
            .iter()
            .map(|p| Coord { x: p[1], y: p[0] })
            .collect(),
    );
    let simplified: Vec<[f64; 2]> = line
        .simplify(&epsilon)
        .0
        .into_iter()
        .map(|c| [c.y, c.x])
        .collect();
    debug!(
        input = points.len(),
        output = simplified.len(),
        "Simplified polyline"
    );
    simplified
}
