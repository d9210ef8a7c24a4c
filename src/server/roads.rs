//! Static road list served to the frontend map.

use serde::Serialize;

/// A road the frontend can request predictions for.
///
/// `path` is a polyline of `[latitude, longitude]` points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Road {
    pub id: &'static str,
    pub name: &'static str,
    pub path: &'static [[f64; 2]],
}

const ROADS: [Road; 3] = [
    Road {
        id: "road-1",
        name: "Main Street",
        path: &[[40.7128, -74.0060], [40.7138, -74.0050], [40.7148, -74.0040]],
    },
    Road {
        id: "road-2",
        name: "Broadway",
        path: &[[40.7158, -74.0030], [40.7168, -74.0020], [40.7178, -74.0010]],
    },
    Road {
        id: "road-3",
        name: "Park Avenue",
        path: &[[40.7188, -74.0000], [40.7198, -73.9990], [40.7208, -73.9980]],
    },
];

/// Returns the fixed road list.
pub fn roads() -> &'static [Road] {
    &ROADS
}
