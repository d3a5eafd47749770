use std::{fmt::Debug, fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use las::{Color, Header, Point, Read, Reader, Write, Writer};
use nalgebra::Vector3;

/// An in-memory LAS point cloud: all point positions in world coordinates, together with
/// the header of the file they were read from.
///
/// The header is treated as opaque metadata. It is carried along so that a derived point
/// set (e.g. the detected road boundary) can be written with the scale, offset and version
/// of the original scan.
#[derive(Debug, Clone)]
pub struct PointCloud {
    positions: Vec<Vector3<f64>>,
    header: Header,
}

impl PointCloud {
    /// Creates a new `PointCloud` from raw positions and a LAS header
    pub fn new(positions: Vec<Vector3<f64>>, header: Header) -> Self {
        Self { positions, header }
    }

    /// Reads a `PointCloud` from the LAS/LAZ file at `path`.
    ///
    /// # Errors
    ///
    /// If `path` does not exist, cannot be opened or does not point to a valid LAS/LAZ file,
    /// an error is returned.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = Reader::from_path(&path)
            .with_context(|| format!("Failed to open LAS file {}", path.as_ref().display()))?;
        Self::read_all(reader)
    }

    /// Reads a `PointCloud` from the given `std::io::Read`.
    ///
    /// # Errors
    ///
    /// If the given `Read` does not represent a valid LAS/LAZ file, an error is returned.
    pub fn from_reader<R: std::io::Read + std::io::Seek + Send + Debug + 'static>(
        reader: R,
    ) -> Result<Self> {
        let reader = Reader::new(reader).context("Failed to parse LAS data")?;
        Self::read_all(reader)
    }

    fn read_all(mut reader: Reader) -> Result<Self> {
        let header = reader.header().clone();
        let mut positions = Vec::with_capacity(header.number_of_points() as usize);
        for point in reader.points() {
            let point = point.context("Failed to read LAS point record")?;
            positions.push(Vector3::new(point.x, point.y, point.z));
        }
        Ok(Self { positions, header })
    }

    /// The point positions in world coordinates
    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    /// The LAS header this cloud was created with
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of points in this cloud
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// `true` if this cloud contains no points
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Creates a new `PointCloud` with the given `positions` but the header of `self`. This
    /// is how a processing result gets written in the same format as its input file.
    pub fn with_positions(&self, positions: Vec<Vector3<f64>>) -> Self {
        Self {
            positions,
            header: self.header.clone(),
        }
    }

    /// Writes this cloud to a LAS file at `path`. Only the positions are written, all other
    /// LAS attributes are left at their defaults.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(
            File::create(&path)
                .with_context(|| format!("Failed to create file {}", path.as_ref().display()))?,
        );
        self.write_to(writer)
    }

    /// Writes this cloud to the given `std::io::Write`
    pub fn write_to<W: std::io::Write + std::io::Seek + Debug + Send + 'static>(
        &self,
        writer: W,
    ) -> Result<()> {
        let format = *self.header.point_format();
        let mut writer = Writer::new(writer, self.header.clone())
            .context("Failed to create LAS writer")?;
        for position in &self.positions {
            let mut las_point = Point {
                x: position.x,
                y: position.y,
                z: position.z,
                ..Default::default()
            };
            // attributes the header's point format requires must be present, even
            // though only the positions carry information
            if format.has_gps_time {
                las_point.gps_time = Some(0.0);
            }
            if format.has_color {
                las_point.color = Some(Color::new(0, 0, 0));
            }
            writer
                .write(las_point)
                .context("Failed to write LAS point record")?;
        }
        writer.close().context("Failed to finalize LAS file")?;
        Ok(())
    }
}
