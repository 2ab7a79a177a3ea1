//! ECEF to geodetic conversion for the reference-station display.

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// ECEF meters to (latitude deg, longitude deg, ellipsoidal height m),
/// iterative on the latitude.
pub fn ecef_to_llh(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let r2 = x * x + y * y;
    let r = r2.sqrt();

    if r < 1e-9 {
        // On the axis.
        let lat = if z >= 0.0 { 90.0 } else { -90.0 };
        let b = WGS84_A * (1.0 - WGS84_F);
        return (lat, 0.0, z.abs() - b);
    }

    let lon = y.atan2(x);
    let mut zk = z;
    loop {
        let sin_lat = zk / (r2 + zk * zk).sqrt();
        let v = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let zi = z + v * e2 * sin_lat;
        if (zi - zk).abs() < 1e-4 {
            let lat = zi.atan2(r).to_degrees();
            let height = (r2 + zi * zi).sqrt() - v;
            return (lat, lon.to_degrees(), height);
        }
        zk = zi;
    }
}

/// Render as the conventional "lat lon height" triplet.
pub fn format_llh(x: f64, y: f64, z: f64) -> String {
    let (lat, lon, h) = ecef_to_llh(x, y, z);
    format!("{lat:.7} {lon:.7} {h:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_site() {
        // Hiroshima area: 34.4401 N, 132.4148 E, h 233 m.
        let lat = 34.4401061f64.to_radians();
        let lon = 132.4147804f64.to_radians();
        let h = 233.362;
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let v = WGS84_A / (1.0 - e2 * lat.sin() * lat.sin()).sqrt();
        let x = (v + h) * lat.cos() * lon.cos();
        let y = (v + h) * lat.cos() * lon.sin();
        let z = (v * (1.0 - e2) + h) * lat.sin();

        let (lat_d, lon_d, h_out) = ecef_to_llh(x, y, z);
        assert!((lat_d - 34.4401061).abs() < 1e-7);
        assert!((lon_d - 132.4147804).abs() < 1e-7);
        assert!((h_out - 233.362).abs() < 1e-3);
    }

    #[test]
    fn formats_fixed_precision() {
        let lat = 34.4401061f64.to_radians();
        let lon = 132.4147804f64.to_radians();
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let v = WGS84_A / (1.0 - e2 * lat.sin() * lat.sin()).sqrt();
        let x = (v + 233.362) * lat.cos() * lon.cos();
        let y = (v + 233.362) * lat.cos() * lon.sin();
        let z = (v * (1.0 - e2) + 233.362) * lat.sin();
        assert_eq!(format_llh(x, y, z), "34.4401061 132.4147804 233.362");
    }
}
