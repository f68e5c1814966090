//! Reads a NonLinLoc-format travel-time grid (one `.hdr`/`.buf` pair per
//! station/phase), for callers migrating an existing travel-time archive
//! instead of rebuilding from a velocity model.
//!
//! Grounded on `examples/original_source/QMigrate/core/model.py`'s
//! `read_3d_nlloc_lut`: the `.hdr` file's first line carries `nx ny nz x0 y0
//! z0 dx dy dz TYPE`, and a `TRANSFORM` line names the projection
//! (`SIMPLE`, `LAMBERT`, `TRANS_MERC`); the `.buf` file is a flat
//! big-endian `f32` array in `(x, y, z)` row-major order.

use std::io::{BufRead, Read};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use ndarray::Array3;

use crate::geo::{GridSpec, Projection, SortOrder};

use super::LutError;

/// One station/phase travel-time grid read from a NonLinLoc `.hdr`/`.buf`
/// pair, still in NonLinLoc's own grid geometry (not yet combined with other
/// stations into a [`super::Lut`]).
pub struct NonLinLocGrid {
    pub spec: GridSpec,
    pub times: Array3<f64>,
}

/// Reads one NonLinLoc travel-time grid.
pub fn read_nonlinloc_lut(hdr_path: impl AsRef<Path>, buf_path: impl AsRef<Path>) -> Result<NonLinLocGrid, LutError> {
    let hdr = std::fs::File::open(hdr_path)?;
    let mut lines = std::io::BufReader::new(hdr).lines();

    let dims_line = lines
        .next()
        .ok_or_else(|| LutError::Corrupt("NonLinLoc header is empty".to_string()))??;
    let fields: Vec<&str> = dims_line.split_whitespace().collect();
    if fields.len() < 9 {
        return Err(LutError::Corrupt("NonLinLoc header line 1 is malformed".to_string()));
    }
    let parse_i64 = |s: &str| -> Result<i64, LutError> {
        s.parse().map_err(|_| LutError::Corrupt(format!("bad integer {s:?} in NonLinLoc header")))
    };
    let parse_f64 = |s: &str| -> Result<f64, LutError> {
        s.parse().map_err(|_| LutError::Corrupt(format!("bad number {s:?} in NonLinLoc header")))
    };
    let nx = parse_i64(fields[0])?;
    let ny = parse_i64(fields[1])?;
    let nz = parse_i64(fields[2])?;
    let x0 = parse_f64(fields[3])?;
    let y0 = parse_f64(fields[4])?;
    let z0 = parse_f64(fields[5])?;
    let dx = parse_f64(fields[6])?;
    let dy = parse_f64(fields[7])?;
    let dz = parse_f64(fields[8])?;

    let mut projection = Projection::Wgs84;
    let mut longitude = 0.0;
    let mut latitude = 0.0;
    for line in lines {
        let line = line?;
        if !line.starts_with("TRANSFORM") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let kind = fields.get(1).copied().unwrap_or("NONE");
        let lat0 = find_param(&fields, "LatOrig").unwrap_or(0.0);
        let lon0 = find_param(&fields, "LongOrig").unwrap_or(0.0);
        match kind {
            "SIMPLE" | "NONE" => {
                projection = Projection::Wgs84;
            }
            "TRANS_MERC" => {
                projection = Projection::Tm { lon0, lat0 };
            }
            "LAMBERT" => {
                let p1 = find_param(&fields, "FirstStdParal").unwrap_or(lat0);
                let p2 = find_param(&fields, "SecondStdParal").unwrap_or(lat0);
                projection = Projection::Lcc { lon0, lat0, p1, p2 };
            }
            other => return Err(LutError::Corrupt(format!("unsupported NonLinLoc transform {other}"))),
        }
        longitude = lon0;
        latitude = lat0;
        break;
    }

    let spec = GridSpec {
        cell_count: (nx, ny, nz),
        cell_size: (dx, dy, dz),
        azimuth: 0.0,
        dip: 0.0,
        sort_order: SortOrder::RowMajor,
        elevation: -z0 - (nz - 1) as f64 * dz / 2.0,
        projection,
        longitude,
        latitude,
    };
    let _ = (x0, y0);

    let mut buf = std::fs::File::open(buf_path)?;
    let mut times = Array3::<f64>::zeros((nx as usize, ny as usize, nz as usize));
    for i in 0..nx as usize {
        for j in 0..ny as usize {
            for k in 0..nz as usize {
                times[[i, j, k]] = buf.read_f32::<BigEndian>()? as f64;
            }
        }
    }
    let mut trailing = [0u8; 1];
    if buf.read(&mut trailing)? != 0 {
        return Err(LutError::Corrupt(
            "NonLinLoc .buf file has more samples than the header declares".to_string(),
        ));
    }

    Ok(NonLinLocGrid { spec, times })
}

fn find_param(fields: &[&str], name: &str) -> Option<f64> {
    for field in fields {
        if let Some(rest) = field.strip_prefix(name) {
            if let Ok(v) = rest.trim_start_matches('=').parse::<f64>() {
                return Some(v);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    #[test]
    fn reads_a_minimal_grid() {
        let dir = tempfile::tempdir().unwrap();
        let hdr_path = dir.path().join("p.hdr");
        let buf_path = dir.path().join("p.buf");
        std::fs::write(
            &hdr_path,
            "2 2 2  0.0 0.0 0.0  100.0 100.0 100.0  FLOAT\nTRANSFORM  SIMPLE  LatOrig=1.0  LongOrig=2.0\n",
        )
        .unwrap();
        let mut buf = std::fs::File::create(&buf_path).unwrap();
        for v in 0..8 {
            buf.write_f32::<BigEndian>(v as f32).unwrap();
        }
        drop(buf);

        let grid = read_nonlinloc_lut(&hdr_path, &buf_path).unwrap();
        assert_eq!(grid.spec.cell_count, (2, 2, 2));
        assert_eq!(grid.times[[1, 1, 1]], 7.0);
    }
}
