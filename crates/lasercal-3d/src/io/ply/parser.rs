use std::io::{BufRead, Read};
use std::path::Path;

use super::{
    properties::{DynamicProperty, PlyDataType, PlyEncoding, PlyPropertyDefinition, PlyType},
    PlyError, PlyProperty, PlyPropertyTrait,
};
use crate::pointcloud::PointCloud;

// the vertex count comes from the file, the buffer grows past this as vertices are read
const MAX_PREALLOCATED_VERTICES: usize = 1 << 20;

#[derive(Debug)]
struct PlyHeader {
    pub vertex_count: usize,
    pub properties: Vec<PlyPropertyDefinition>,
    pub format: PlyType,
    pub encoding: PlyEncoding,
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut vertex_count = None;
    let mut encoding = None;
    let mut is_ply = false;
    let mut in_vertex_element = false;
    let mut properties = Vec::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::UnsupportedHeader("missing end_header".to_string()));
        }
        let trimmed = line.trim();

        if trimmed == "ply" {
            is_ply = true;
            continue;
        }

        if trimmed == "end_header" {
            break;
        }

        let parts = trimmed.split_whitespace().collect::<Vec<_>>();
        match parts.as_slice() {
            ["format", "ascii", ..] => encoding = Some(PlyEncoding::Ascii),
            ["format", "binary_little_endian", ..] => {
                encoding = Some(PlyEncoding::BinaryLittleEndian)
            }
            ["format", other, ..] => {
                return Err(PlyError::UnsupportedHeader(format!("format {other}")));
            }
            ["element", "vertex", count] => {
                if vertex_count.is_some() {
                    return Err(PlyError::UnsupportedHeader(
                        "duplicated vertex element".to_string(),
                    ));
                }
                let count = count
                    .parse()
                    .map_err(|_| PlyError::UnsupportedHeader(trimmed.to_string()))?;
                vertex_count = Some(count);
                in_vertex_element = true;
            }
            ["element", _, count] => {
                // the body is read up to the vertices only
                if vertex_count.is_none() && *count != "0" {
                    return Err(PlyError::UnsupportedHeader(format!(
                        "element before vertices: {trimmed}"
                    )));
                }
                in_vertex_element = false;
            }
            ["property", "list", ..] if in_vertex_element => {
                return Err(PlyError::UnsupportedProperty(trimmed.to_string()));
            }
            ["property", data_type, name] if in_vertex_element => {
                properties.push(PlyPropertyDefinition::new(name, PlyDataType::parse(data_type)?));
            }
            _ => {}
        }
    }

    if !is_ply {
        return Err(PlyError::UnsupportedHeader("missing magic".to_string()));
    }

    let encoding =
        encoding.ok_or_else(|| PlyError::UnsupportedHeader("missing format".to_string()))?;
    let vertex_count = vertex_count
        .ok_or_else(|| PlyError::UnsupportedHeader("missing vertex element".to_string()))?;
    let format = PlyType::detect_format(&properties)?;

    Ok(PlyHeader {
        vertex_count,
        properties,
        format,
        encoding,
    })
}

fn read_vertices<R: BufRead>(
    reader: &mut R,
    header: &PlyHeader,
) -> Result<Vec<PlyProperty>, PlyError> {
    let mut vertices = Vec::with_capacity(header.vertex_count.min(MAX_PREALLOCATED_VERTICES));

    match header.encoding {
        PlyEncoding::BinaryLittleEndian => {
            let mut buffer = vec![0u8; header.format.size_of()];
            for _ in 0..header.vertex_count {
                reader.read_exact(&mut buffer)?;
                vertices.push(header.format.deserialize(&buffer)?);
            }
        }
        PlyEncoding::Ascii => {
            let mut line = String::new();
            while vertices.len() < header.vertex_count {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err(PlyError::InvalidValue(format!(
                        "expected {} vertices, found {}",
                        header.vertex_count,
                        vertices.len()
                    )));
                }
                if line.trim().is_empty() {
                    continue;
                }
                let property =
                    DynamicProperty::parse_from_tokens(line.split_whitespace(), &header.properties)?;
                vertices.push(PlyProperty::Dynamic(property));
            }
        }
    }

    Ok(vertices)
}

/// Read a PLY point cloud from any buffered reader.
///
/// Both `ascii` and `binary_little_endian` bodies are supported. The vertex layout is
/// detected from the header; colors are kept when every vertex carries one.
pub fn read_ply_from_reader<R: BufRead>(reader: &mut R) -> Result<PointCloud, PlyError> {
    let header = parse_header(reader)?;
    let vertices = read_vertices(reader, &header)?;

    let points = vertices.iter().map(|v| v.to_point()).collect::<Vec<_>>();
    let colors = vertices.iter().map(|v| v.to_color()).collect::<Option<Vec<_>>>();
    let colors = colors.filter(|c| !c.is_empty());

    Ok(PointCloud::new(points, colors))
}

/// Read a PLY file with automatic format detection.
///
/// # Arguments
///
/// * `path` - The path to the PLY file.
///
/// # Returns
///
/// The point cloud stored in the file.
pub fn read_ply(path: impl AsRef<Path>) -> Result<PointCloud, PlyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    read_ply_from_reader(&mut reader)
}
