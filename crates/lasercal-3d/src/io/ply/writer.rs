use std::io::Write;
use std::path::Path;

use super::{
    properties::{PlyEncoding, PlyType, XyzF64Property, XyzF64RgbProperty},
    PlyError,
};
use crate::pointcloud::PointCloud;

fn write_header<W: Write>(
    writer: &mut W,
    vertex_count: usize,
    format: &PlyType,
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    let encoding = match encoding {
        PlyEncoding::Ascii => "ascii",
        PlyEncoding::BinaryLittleEndian => "binary_little_endian",
    };
    writeln!(writer, "ply")?;
    writeln!(writer, "format {encoding} 1.0")?;
    writeln!(writer, "element vertex {vertex_count}")?;
    for property in format.properties() {
        writeln!(writer, "property {} {}", property.data_type.name(), property.name)?;
    }
    writeln!(writer, "end_header")?;
    Ok(())
}

/// Write a point cloud as PLY into any writer.
///
/// Positions are stored as `double` so that a read back is lossless. Colors are
/// written as `uchar red green blue` when the cloud has them.
pub fn write_ply_to_writer<W: Write>(
    writer: &mut W,
    pointcloud: &PointCloud,
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    let colors = pointcloud
        .colors()
        .filter(|colors| colors.len() == pointcloud.len());
    let format = match colors {
        Some(_) => PlyType::XyzF64Rgb,
        None => PlyType::XyzF64,
    };

    write_header(writer, pointcloud.len(), &format, encoding)?;

    let config = bincode::config::standard();
    for (i, &[x, y, z]) in pointcloud.points().iter().enumerate() {
        let color = colors.map(|colors| colors[i]);
        match (encoding, color) {
            (PlyEncoding::Ascii, None) => writeln!(writer, "{x} {y} {z}")?,
            (PlyEncoding::Ascii, Some([r, g, b])) => writeln!(writer, "{x} {y} {z} {r} {g} {b}")?,
            (PlyEncoding::BinaryLittleEndian, None) => {
                bincode::encode_into_std_write(XyzF64Property { x, y, z }, writer, config)?;
            }
            (PlyEncoding::BinaryLittleEndian, Some([red, green, blue])) => {
                bincode::encode_into_std_write(
                    XyzF64RgbProperty {
                        x,
                        y,
                        z,
                        red,
                        green,
                        blue,
                    },
                    writer,
                    config,
                )?;
            }
        }
    }

    Ok(())
}

/// Write a point cloud to a PLY file, replacing any existing file.
///
/// # Arguments
///
/// * `path` - The path of the file to create.
/// * `pointcloud` - The point cloud to store.
/// * `encoding` - The body encoding.
pub fn write_ply(
    path: impl AsRef<Path>,
    pointcloud: &PointCloud,
    encoding: PlyEncoding,
) -> Result<(), PlyError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_ply_to_writer(&mut writer, pointcloud, encoding)?;
    writer.flush()?;
    Ok(())
}
