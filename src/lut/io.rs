//! Binary LUT persistence.
//!
//! Format grounded on `examples/other_examples/.../crates-projection-src-lut.rs.rs`'s
//! `TileGridLut::to_bytes`/`from_bytes`: a fixed little-endian header
//! followed by a flat array of travel times, versioned so a format change
//! fails loudly instead of silently misreading.

use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array4;

use crate::constants::{LUT_FORMAT_VERSION, LUT_MAGIC};
use crate::geo::{GridSpec, Projection, SortOrder};
use crate::station::{Station, StationSet};

use super::{Lut, LutError};

fn write_projection(w: &mut impl Write, p: Projection) -> Result<(), LutError> {
    match p {
        Projection::Wgs84 => w.write_u8(0)?,
        Projection::Nad27 => w.write_u8(1)?,
        Projection::Utm { zone } => {
            w.write_u8(2)?;
            w.write_i32::<LittleEndian>(zone)?;
        }
        Projection::Lcc { lon0, lat0, p1, p2 } => {
            w.write_u8(3)?;
            for v in [lon0, lat0, p1, p2] {
                w.write_f64::<LittleEndian>(v)?;
            }
        }
        Projection::Tm { lon0, lat0 } => {
            w.write_u8(4)?;
            for v in [lon0, lat0] {
                w.write_f64::<LittleEndian>(v)?;
            }
        }
    }
    Ok(())
}

fn read_projection(r: &mut impl Read) -> Result<Projection, LutError> {
    Ok(match r.read_u8()? {
        0 => Projection::Wgs84,
        1 => Projection::Nad27,
        2 => Projection::Utm { zone: r.read_i32::<LittleEndian>()? },
        3 => Projection::Lcc {
            lon0: r.read_f64::<LittleEndian>()?,
            lat0: r.read_f64::<LittleEndian>()?,
            p1: r.read_f64::<LittleEndian>()?,
            p2: r.read_f64::<LittleEndian>()?,
        },
        4 => Projection::Tm {
            lon0: r.read_f64::<LittleEndian>()?,
            lat0: r.read_f64::<LittleEndian>()?,
        },
        tag => return Err(LutError::Corrupt(format!("unknown projection tag {tag}"))),
    })
}

/// Writes `lut` to `path` in the crate's binary LUT format.
pub fn write_lut(lut: Lut, path: impl AsRef<Path>) -> Result<(), LutError> {
    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);

    w.write_all(&LUT_MAGIC)?;
    w.write_u32::<LittleEndian>(LUT_FORMAT_VERSION)?;

    let (cell_count, cell_size, azimuth, dip, sort_order, elevation, projection, (longitude, latitude)) = (
        lut.grid().cell_count(),
        lut.grid().cell_size(),
        lut.grid().azimuth(),
        lut.grid().dip(),
        lut.grid().sort_order(),
        lut.grid().elevation(),
        lut.grid().projection(),
        lut.grid().centre_geographic(),
    );
    w.write_i64::<LittleEndian>(cell_count.0)?;
    w.write_i64::<LittleEndian>(cell_count.1)?;
    w.write_i64::<LittleEndian>(cell_count.2)?;
    w.write_f64::<LittleEndian>(cell_size.0)?;
    w.write_f64::<LittleEndian>(cell_size.1)?;
    w.write_f64::<LittleEndian>(cell_size.2)?;
    w.write_f64::<LittleEndian>(azimuth)?;
    w.write_f64::<LittleEndian>(dip)?;
    w.write_u8(match sort_order {
        SortOrder::RowMajor => 0,
        SortOrder::ColumnMajor => 1,
    })?;
    w.write_f64::<LittleEndian>(elevation)?;
    write_projection(&mut w, projection)?;
    w.write_f64::<LittleEndian>(longitude)?;
    w.write_f64::<LittleEndian>(latitude)?;

    let stations = lut.stations().iter().cloned().collect::<Vec<_>>();
    w.write_u32::<LittleEndian>(stations.len() as u32)?;
    for s in &stations {
        let name = s.name.as_bytes();
        w.write_u32::<LittleEndian>(name.len() as u32)?;
        w.write_all(name)?;
        w.write_f64::<LittleEndian>(s.longitude)?;
        w.write_f64::<LittleEndian>(s.latitude)?;
        w.write_f64::<LittleEndian>(s.elevation)?;
    }

    let (_, _, p_times, s_times) = lut.into_raw();
    for volume in [&p_times, &s_times] {
        for &v in volume.iter() {
            w.write_f64::<LittleEndian>(v)?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Reads a LUT previously written by [`write_lut`].
pub fn read_lut(path: impl AsRef<Path>) -> Result<Lut, LutError> {
    let file = std::fs::File::open(path)?;
    let mut r = std::io::BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != LUT_MAGIC {
        return Err(LutError::Corrupt("bad magic bytes".to_string()));
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version != LUT_FORMAT_VERSION {
        return Err(LutError::UnsupportedVersion {
            found: version,
            supported: LUT_FORMAT_VERSION,
        });
    }

    let cell_count = (
        r.read_i64::<LittleEndian>()?,
        r.read_i64::<LittleEndian>()?,
        r.read_i64::<LittleEndian>()?,
    );
    let cell_size = (
        r.read_f64::<LittleEndian>()?,
        r.read_f64::<LittleEndian>()?,
        r.read_f64::<LittleEndian>()?,
    );
    let azimuth = r.read_f64::<LittleEndian>()?;
    let dip = r.read_f64::<LittleEndian>()?;
    let sort_order = match r.read_u8()? {
        0 => SortOrder::RowMajor,
        1 => SortOrder::ColumnMajor,
        tag => return Err(LutError::Corrupt(format!("unknown sort order tag {tag}"))),
    };
    let elevation = r.read_f64::<LittleEndian>()?;
    let projection = read_projection(&mut r)?;
    let longitude = r.read_f64::<LittleEndian>()?;
    let latitude = r.read_f64::<LittleEndian>()?;

    let grid = GridSpec {
        cell_count,
        cell_size,
        azimuth,
        dip,
        sort_order,
        elevation,
        projection,
        longitude,
        latitude,
    }
    .try_build()?;

    let n_stations = r.read_u32::<LittleEndian>()? as usize;
    let mut stations = Vec::with_capacity(n_stations);
    for _ in 0..n_stations {
        let len = r.read_u32::<LittleEndian>()? as usize;
        let mut name = vec![0u8; len];
        r.read_exact(&mut name)?;
        let name = String::from_utf8(name).map_err(|e| LutError::Corrupt(e.to_string()))?;
        let longitude = r.read_f64::<LittleEndian>()?;
        let latitude = r.read_f64::<LittleEndian>()?;
        let elevation = r.read_f64::<LittleEndian>()?;
        stations.push(Station::new(name, longitude, latitude, elevation));
    }
    let stations = StationSet::new(stations);

    let (nx, ny, nz) = cell_count;
    let shape = (n_stations, nx as usize, ny as usize, nz as usize);
    let read_volume = |r: &mut std::io::BufReader<std::fs::File>| -> Result<Array4<f64>, LutError> {
        let mut flat = vec![0.0; n_stations * nx as usize * ny as usize * nz as usize];
        for v in flat.iter_mut() {
            *v = r.read_f64::<LittleEndian>()?;
        }
        Array4::from_shape_vec(shape, flat).map_err(|e| LutError::Corrupt(e.to_string()))
    };
    let p_times = read_volume(&mut r)?;
    let s_times = read_volume(&mut r)?;

    Lut::new(grid, stations, p_times, s_times)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_temp_file() {
        let grid = GridSpec {
            cell_count: (3, 3, 3),
            cell_size: (100.0, 100.0, 100.0),
            azimuth: 0.0,
            dip: 0.0,
            sort_order: SortOrder::RowMajor,
            elevation: 0.0,
            projection: Projection::Wgs84,
            longitude: 0.0,
            latitude: 0.0,
        }
        .try_build()
        .unwrap();
        let stations = StationSet::new(vec![Station::new("AA01", 0.0, 0.0, 0.0)]);
        let p_times = Array4::<f64>::from_shape_fn((1, 3, 3, 3), |(_, i, j, k)| (i + j + k) as f64);
        let s_times = p_times.clone();
        let lut = Lut::new(grid, stations, p_times, s_times).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.slut");
        write_lut(lut, &path).unwrap();
        let reloaded = read_lut(&path).unwrap();
        assert_eq!(reloaded.grid().cell_count(), (3, 3, 3));
        assert_eq!(reloaded.stations().len(), 1);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.slut");
        std::fs::write(&path, b"nope").unwrap();
        assert!(matches!(read_lut(&path), Err(LutError::Corrupt(_))));
    }
}
