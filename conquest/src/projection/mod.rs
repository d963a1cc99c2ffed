//! Projection métrique des géométries géographiques
//!
//! Toutes les comparaisons de surface et de distance du moteur se font dans
//! une projection UTM fixe (par défaut zone 34 nord, EPSG:32634) : en
//! coordonnées géographiques brutes, un degré de longitude n'a pas la même
//! longueur selon la latitude.
//!
//! Implémentation en Rust pur (séries de Snyder), sans bibliothèque PROJ.

mod ellipsoid;
mod utm;

pub use ellipsoid::WGS84;
pub use utm::central_meridian_deg;

use geo::{Area, Buffer, Coord, Euclidean, Length, LineString, MapCoords, MultiPolygon};

use crate::ConquestError;

/// Latitude minimale couverte par UTM
pub const MIN_LATITUDE_DEG: f64 = -80.0;

/// Latitude maximale couverte par UTM
pub const MAX_LATITUDE_DEG: f64 = 84.0;

/// Écart maximal au méridien central accepté, en degrés de longitude
pub const MAX_MERIDIAN_OFFSET_DEG: f64 = 9.0;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Projection UTM fixe WGS84 ↔ mètres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricProjection {
    zone: u8,
    south: bool,
}

impl MetricProjection {
    /// Crée une projection pour une zone UTM (1..=60)
    pub fn utm(zone: u8, south: bool) -> Result<Self, ConquestError> {
        if !(1..=60).contains(&zone) {
            return Err(ConquestError::InvalidConfig(format!(
                "UTM zone {} out of range 1..=60",
                zone
            )));
        }
        Ok(Self { zone, south })
    }

    /// Zone UTM
    pub fn zone(&self) -> u8 {
        self.zone
    }

    /// Hémisphère sud ?
    pub fn is_south(&self) -> bool {
        self.south
    }

    /// Code EPSG de la projection (326zz / 327zz)
    pub fn epsg(&self) -> u32 {
        let base = if self.south { 32700 } else { 32600 };
        base + u32::from(self.zone)
    }

    /// Projette une coordonnée (lon, lat en degrés) vers (x, y) en mètres
    pub fn project(&self, coord: Coord) -> Result<Coord, ConquestError> {
        let (lon, lat) = (coord.x, coord.y);

        if !lon.is_finite() || !lat.is_finite() {
            return Err(ConquestError::projection(lon, lat, "non-finite coordinate"));
        }
        if !(MIN_LATITUDE_DEG..=MAX_LATITUDE_DEG).contains(&lat) {
            return Err(ConquestError::projection(
                lon,
                lat,
                format!(
                    "latitude outside [{}, {}]",
                    MIN_LATITUDE_DEG, MAX_LATITUDE_DEG
                ),
            ));
        }

        let offset = normalize_longitude(lon - central_meridian_deg(self.zone));
        if offset.abs() > MAX_MERIDIAN_OFFSET_DEG {
            return Err(ConquestError::projection(
                lon,
                lat,
                format!(
                    "more than {}° from the central meridian of EPSG:{}",
                    MAX_MERIDIAN_OFFSET_DEG,
                    self.epsg()
                ),
            ));
        }

        let geo = Geographic::from_degrees(central_meridian_deg(self.zone) + offset, lat);
        let (x, y) = utm::geographic_to_utm(geo, self.zone, self.south);
        Ok(Coord { x, y })
    }

    /// Convertit une coordonnée métrique vers (lon, lat) en degrés
    pub fn unproject(&self, coord: Coord) -> Result<Coord, ConquestError> {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(ConquestError::projection(
                coord.x,
                coord.y,
                "non-finite metric coordinate",
            ));
        }
        let (lon, lat) = utm::utm_to_geographic(coord.x, coord.y, self.zone, self.south).to_degrees();
        Ok(Coord { x: lon, y: lat })
    }

    /// Reprojette une géométrie géographique dans le plan métrique
    pub fn to_metric<G>(&self, geometry: &G) -> Result<G::Output, ConquestError>
    where
        G: MapCoords<f64, f64>,
    {
        geometry.try_map_coords(|c| self.project(c))
    }

    /// Reprojette une géométrie métrique en coordonnées géographiques
    pub fn to_geographic<G>(&self, geometry: &G) -> Result<G::Output, ConquestError>
    where
        G: MapCoords<f64, f64>,
    {
        geometry.try_map_coords(|c| self.unproject(c))
    }

    /// Buffer de `distance` mètres autour d'une géométrie géographique
    ///
    /// Projette, dilate d'un disque de `distance` mètres, puis revient en
    /// coordonnées géographiques.
    pub fn buffer_meters<G>(&self, geometry: &G, distance: f64) -> Result<MultiPolygon, ConquestError>
    where
        G: MapCoords<f64, f64>,
        G::Output: Buffer<Scalar = f64>,
    {
        let projected = self.to_metric(geometry)?;
        let buffered = projected.buffer(distance);
        self.to_geographic(&buffered)
    }

    /// Surface en m² d'une géométrie géographique
    pub fn area_m2<G>(&self, geometry: &G) -> Result<f64, ConquestError>
    where
        G: MapCoords<f64, f64>,
        G::Output: Area<f64>,
    {
        Ok(self.to_metric(geometry)?.unsigned_area())
    }

    /// Longueur en mètres d'un anneau géographique
    pub fn ring_length_m(&self, ring: &LineString) -> Result<f64, ConquestError> {
        let projected = self.to_metric(ring)?;
        Ok(Euclidean.length(&projected))
    }
}

impl Default for MetricProjection {
    /// WGS 84 / UTM zone 34N (EPSG:32634)
    fn default() -> Self {
        Self {
            zone: 34,
            south: false,
        }
    }
}

/// Ramène un écart de longitude dans [-180, 180)
fn normalize_longitude(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Contains, Point, Polygon};

    fn metric_square(projection: &MetricProjection, x0: f64, y0: f64, side: f64) -> Polygon {
        let square = Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + side, y0),
                (x0 + side, y0 + side),
                (x0, y0 + side),
                (x0, y0),
            ]),
            vec![],
        );
        projection.to_geographic(&square).unwrap()
    }

    #[test]
    fn test_default_is_utm_34n() {
        let projection = MetricProjection::default();
        assert_eq!(projection.epsg(), 32634);
        assert_eq!(MetricProjection::utm(40, true).unwrap().epsg(), 32740);
    }

    #[test]
    fn test_invalid_zone() {
        assert!(MetricProjection::utm(0, false).is_err());
        assert!(MetricProjection::utm(61, false).is_err());
    }

    #[test]
    fn test_square_area_and_length() {
        let projection = MetricProjection::default();
        let square = metric_square(&projection, 500_000.0, 5_000_000.0, 100.0);

        let area = projection.area_m2(&square).unwrap();
        assert!((area - 10_000.0).abs() < 0.5, "area={}", area);

        let length = projection.ring_length_m(square.exterior()).unwrap();
        assert!((length - 400.0).abs() < 0.01, "length={}", length);
    }

    #[test]
    fn test_out_of_domain() {
        let projection = MetricProjection::default();

        let far_west = projection.project(Coord { x: -73.98, y: 40.75 });
        assert!(matches!(far_west, Err(ConquestError::Projection { .. })));

        let polar = projection.project(Coord { x: 21.0, y: 86.0 });
        assert!(matches!(polar, Err(ConquestError::Projection { .. })));

        let nan = projection.project(Coord {
            x: f64::NAN,
            y: 45.0,
        });
        assert!(matches!(nan, Err(ConquestError::Projection { .. })));
    }

    #[test]
    fn test_to_metric_fails_on_any_bad_coordinate() {
        let projection = MetricProjection::default();
        let line = LineString::from(vec![(21.0, 45.0), (21.001, 45.0), (120.0, 45.0)]);
        assert!(projection.to_metric(&line).is_err());
    }

    #[test]
    fn test_buffer_meters_around_point() {
        let projection = MetricProjection::default();
        let origin = projection
            .unproject(Coord {
                x: 500_000.0,
                y: 5_000_000.0,
            })
            .unwrap();
        let near = projection
            .unproject(Coord {
                x: 500_006.0,
                y: 5_000_000.0,
            })
            .unwrap();
        let far = projection
            .unproject(Coord {
                x: 500_014.0,
                y: 5_000_000.0,
            })
            .unwrap();

        let disk = projection.buffer_meters(&Point::from(origin), 10.0).unwrap();
        assert!(disk.contains(&Point::from(near)));
        assert!(!disk.contains(&Point::from(far)));
    }

    #[test]
    fn test_normalize_longitude() {
        assert!((normalize_longitude(350.0) - (-10.0)).abs() < 1e-12);
        assert!((normalize_longitude(-190.0) - 170.0).abs() < 1e-12);
        assert!((normalize_longitude(5.0) - 5.0).abs() < 1e-12);
    }
}
