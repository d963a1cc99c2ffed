//! Export GeoJSON des zones avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use conquest::TerritoryRegion;

/// Exporte les zones dans un fichier GeoJSON (FeatureCollection, EPSG:4326)
pub fn export_regions(regions: &[TerritoryRegion], output_path: &Path) -> Result<usize> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_regions(&mut writer, regions)?;
    writer.flush()?;
    Ok(regions.len())
}

/// Écrit une FeatureCollection de zones
pub fn write_regions<W: Write>(writer: &mut W, regions: &[TerritoryRegion]) -> Result<()> {
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::4326"}}}},"features":["#
    )?;

    for (i, region) in regions.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_region(writer, region)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

fn write_region<W: Write>(writer: &mut W, region: &TerritoryRegion) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":{},"#, region.id)?;

    write!(writer, r#""geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    Geometry::Polygon(region.polygon.clone()).process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    let area = if region.area_m2.is_finite() {
        region.area_m2
    } else {
        0.0
    };
    write!(
        writer,
        r#","properties":{{"owner":{},"area_m2":{:.2},"created_at":{},"last_modified":{}}}}}"#,
        region.owner,
        area,
        unix_seconds(region.created_at),
        unix_seconds(region.last_modified)
    )?;

    Ok(())
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conquest::{PlayerId, RegionId};
    use geo::{LineString, Polygon};

    fn region(id: i64) -> TerritoryRegion {
        TerritoryRegion {
            id: RegionId(id),
            owner: PlayerId(7),
            polygon: Polygon::new(
                LineString::from(vec![(21.0, 45.0), (21.001, 45.0), (21.0, 45.001), (21.0, 45.0)]),
                vec![],
            ),
            created_at: UNIX_EPOCH,
            last_modified: UNIX_EPOCH,
            area_m2: 4321.5,
        }
    }

    #[test]
    fn test_write_regions_is_valid_json() {
        let mut buffer = Vec::new();
        write_regions(&mut buffer, &[region(1), region(2)]).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        let features = json["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["id"], 1);
        assert_eq!(features[0]["properties"]["owner"], 7);
        assert_eq!(features[0]["geometry"]["type"], "Polygon");
    }

    #[test]
    fn test_export_regions_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.geojson");

        let count = export_regions(&[region(3)], &path).unwrap();
        assert_eq!(count, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("EPSG::4326"));
        assert!(content.contains(r#""area_m2":4321.50"#));
    }

    #[test]
    fn test_empty_collection() {
        let mut buffer = Vec::new();
        write_regions(&mut buffer, &[]).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert!(json["features"].as_array().unwrap().is_empty());
    }
}
