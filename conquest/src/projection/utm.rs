//! Projection UTM (Universal Transverse Mercator)
//!
//! Séries de Snyder (USGS Professional Paper 1395), précises au millimètre
//! à quelques degrés du méridien central.

use super::ellipsoid::WGS84;
use super::Geographic;

/// Facteur d'échelle sur le méridien central
const K0: f64 = 0.9996;

/// False easting
const FALSE_EASTING: f64 = 500000.0;

/// False northing pour l'hémisphère sud
const FALSE_NORTHING_SOUTH: f64 = 10000000.0;

/// Longitude du méridien central d'une zone, en degrés
pub fn central_meridian_deg(zone: u8) -> f64 {
    (f64::from(zone) - 1.0) * 6.0 - 180.0 + 3.0
}

/// Longueur d'arc du méridien depuis l'équateur jusqu'à `phi` (radians)
fn meridian_arc(phi: f64) -> f64 {
    let a = WGS84::A;
    let e2 = WGS84::E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Convertit des coordonnées géographiques WGS84 vers UTM (mètres)
pub fn geographic_to_utm(geo: Geographic, zone: u8, south: bool) -> (f64, f64) {
    let a = WGS84::A;
    let e2 = WGS84::E2;
    let ep2 = WGS84::EP2;

    let lon0 = central_meridian_deg(zone).to_radians();
    let phi = geo.lat;

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let tan_phi = phi.tan();

    let n = a / (1.0 - e2 * sin_phi.powi(2)).sqrt();
    let t = tan_phi.powi(2);
    let c = ep2 * cos_phi.powi(2);
    let big_a = cos_phi * (geo.lon - lon0);
    let m = meridian_arc(phi);

    let x = K0
        * n
        * (big_a
            + (1.0 - t + c) * big_a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t.powi(2) + 72.0 * c - 58.0 * ep2) * big_a.powi(5) / 120.0);

    let y = K0
        * (m + n
            * tan_phi
            * (big_a.powi(2) / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c.powi(2)) * big_a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t.powi(2) + 600.0 * c - 330.0 * ep2) * big_a.powi(6)
                    / 720.0));

    let northing = if south { y + FALSE_NORTHING_SOUTH } else { y };
    (x + FALSE_EASTING, northing)
}

/// Convertit UTM vers coordonnées géographiques WGS84
pub fn utm_to_geographic(x: f64, y: f64, zone: u8, south: bool) -> Geographic {
    let a = WGS84::A;
    let e2 = WGS84::E2;
    let ep2 = WGS84::EP2;

    let y0 = if south { FALSE_NORTHING_SOUTH } else { 0.0 };
    let lon0 = central_meridian_deg(zone).to_radians();

    // Coordonnées réduites
    let x = x - FALSE_EASTING;
    let y = y - y0;

    // Latitude du pied de la perpendiculaire
    let m = y / K0;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
    let t1 = tan_phi1.powi(2);
    let c1 = ep2 * cos_phi1.powi(2);
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
    let d = x / (n1 * K0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2) - 252.0 * ep2 - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_meridian() {
        assert_eq!(central_meridian_deg(31), 3.0);
        assert_eq!(central_meridian_deg(34), 21.0);
        assert_eq!(central_meridian_deg(1), -177.0);
    }

    #[test]
    fn test_belgrade_zone_34() {
        // Belgrade: 20.4573°E, 44.7872°N → UTM 34N ≈ (457_070, 4_959_450)
        let (x, y) = geographic_to_utm(Geographic::from_degrees(20.4573, 44.7872), 34, false);
        assert!((x - 457_070.0).abs() < 200.0, "x={}", x);
        assert!((y - 4_959_450.0).abs() < 200.0, "y={}", y);
    }

    #[test]
    fn test_central_meridian_easting() {
        let (x, _) = geographic_to_utm(Geographic::from_degrees(21.0, 45.0), 34, false);
        assert!((x - 500000.0).abs() < 1e-6, "x={}", x);
    }

    #[test]
    fn test_round_trip() {
        let source = Geographic::from_degrees(22.31, 47.15);
        let (x, y) = geographic_to_utm(source, 34, false);
        let back = utm_to_geographic(x, y, 34, false);
        let (lon, lat) = back.to_degrees();
        // 1e-7 degré ≈ 1 cm
        assert!((lon - 22.31).abs() < 1e-7, "lon={}", lon);
        assert!((lat - 47.15).abs() < 1e-7, "lat={}", lat);
    }

    #[test]
    fn test_reunion_southern_hemisphere() {
        // Saint-Denis approximativement
        // UTM Zone 40S: 338000, 7691000
        let geo = utm_to_geographic(338000.0, 7691000.0, 40, true);
        let (lon, lat) = geo.to_degrees();

        // Saint-Denis: 55.45°E, -20.88°S
        assert!((lon - 55.45).abs() < 0.2, "lon={}", lon);
        assert!((lat - (-20.88)).abs() < 0.2, "lat={}", lat);

        let (x, y) = geographic_to_utm(geo, 40, true);
        assert!((x - 338000.0).abs() < 0.05, "x={}", x);
        assert!((y - 7691000.0).abs() < 0.05, "y={}", y);
    }
}
