use super::PlyError;

/// The encoding of the PLY body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyEncoding {
    /// Whitespace separated values, one vertex per line.
    Ascii,
    /// Packed little endian values.
    BinaryLittleEndian,
}

/// The scalar types a PLY property can have.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlyDataType {
    /// 32 bits float (`float`).
    Float32,
    /// 64 bits float (`double`).
    Float64,
    /// Signed byte (`char`).
    Int8,
    /// Unsigned byte (`uchar`).
    UInt8,
    /// Signed 16 bits integer (`short`).
    Int16,
    /// Unsigned 16 bits integer (`ushort`).
    UInt16,
    /// Signed 32 bits integer (`int`).
    Int32,
    /// Unsigned 32 bits integer (`uint`).
    UInt32,
}

impl PlyDataType {
    /// Size in bytes of one value in a binary body.
    pub fn size(&self) -> usize {
        match self {
            PlyDataType::Float32 | PlyDataType::Int32 | PlyDataType::UInt32 => 4,
            PlyDataType::Float64 => 8,
            PlyDataType::Int16 | PlyDataType::UInt16 => 2,
            PlyDataType::Int8 | PlyDataType::UInt8 => 1,
        }
    }

    /// Parse a type name as it appears in a header.
    pub fn parse(type_str: &str) -> Result<Self, PlyError> {
        match type_str {
            "float" | "float32" => Ok(PlyDataType::Float32),
            "double" | "float64" => Ok(PlyDataType::Float64),
            "char" | "int8" => Ok(PlyDataType::Int8),
            "uchar" | "uint8" => Ok(PlyDataType::UInt8),
            "short" | "int16" => Ok(PlyDataType::Int16),
            "ushort" | "uint16" => Ok(PlyDataType::UInt16),
            "int" | "int32" => Ok(PlyDataType::Int32),
            "uint" | "uint32" => Ok(PlyDataType::UInt32),
            other => Err(PlyError::UnsupportedProperty(other.to_string())),
        }
    }

    /// The canonical header name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            PlyDataType::Float32 => "float",
            PlyDataType::Float64 => "double",
            PlyDataType::Int8 => "char",
            PlyDataType::UInt8 => "uchar",
            PlyDataType::Int16 => "short",
            PlyDataType::UInt16 => "ushort",
            PlyDataType::Int32 => "int",
            PlyDataType::UInt32 => "uint",
        }
    }
}

/// A named vertex property declared in the header.
#[derive(Debug, PartialEq, Clone)]
pub struct PlyPropertyDefinition {
    /// The property name, e.g. `x` or `red`.
    pub name: String,
    /// The scalar type of the property.
    pub data_type: PlyDataType,
}

impl PlyPropertyDefinition {
    /// Create a new property definition.
    pub fn new(name: &str, data_type: PlyDataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }
}

/// Accessors shared by every decoded vertex layout.
pub trait PlyPropertyTrait {
    /// The vertex position.
    fn to_point(&self) -> [f64; 3];
    /// The vertex color if the layout has one.
    fn to_color(&self) -> Option<[u8; 3]>;
}

/// Vertex with single precision coordinates.
#[derive(Debug, Clone, Copy, PartialEq, bincode::Decode, bincode::Encode)]
pub struct XyzF32Property {
    /// x coordinate.
    pub x: f32,
    /// y coordinate.
    pub y: f32,
    /// z coordinate.
    pub z: f32,
}

impl PlyPropertyTrait for XyzF32Property {
    fn to_point(&self) -> [f64; 3] {
        [self.x as f64, self.y as f64, self.z as f64]
    }

    fn to_color(&self) -> Option<[u8; 3]> {
        None
    }
}

/// Vertex with double precision coordinates.
#[derive(Debug, Clone, Copy, PartialEq, bincode::Decode, bincode::Encode)]
pub struct XyzF64Property {
    /// x coordinate.
    pub x: f64,
    /// y coordinate.
    pub y: f64,
    /// z coordinate.
    pub z: f64,
}

impl PlyPropertyTrait for XyzF64Property {
    fn to_point(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn to_color(&self) -> Option<[u8; 3]> {
        None
    }
}

/// Vertex with double precision coordinates and a 8 bits color.
#[derive(Debug, Clone, Copy, PartialEq, bincode::Decode, bincode::Encode)]
pub struct XyzF64RgbProperty {
    /// x coordinate.
    pub x: f64,
    /// y coordinate.
    pub y: f64,
    /// z coordinate.
    pub z: f64,
    /// red channel.
    pub red: u8,
    /// green channel.
    pub green: u8,
    /// blue channel.
    pub blue: u8,
}

impl PlyPropertyTrait for XyzF64RgbProperty {
    fn to_point(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn to_color(&self) -> Option<[u8; 3]> {
        Some([self.red, self.green, self.blue])
    }
}

/// A scalar value of a dynamic vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DynamicPropertyValue {
    /// `float` value.
    Float32(f32),
    /// `double` value.
    Float64(f64),
    /// `char` value.
    Int8(i8),
    /// `uchar` value.
    UInt8(u8),
    /// `short` value.
    Int16(i16),
    /// `ushort` value.
    UInt16(u16),
    /// `int` value.
    Int32(i32),
    /// `uint` value.
    UInt32(u32),
}

impl DynamicPropertyValue {
    fn as_f64(&self) -> f64 {
        match *self {
            DynamicPropertyValue::Float32(v) => v as f64,
            DynamicPropertyValue::Float64(v) => v,
            DynamicPropertyValue::Int8(v) => v as f64,
            DynamicPropertyValue::UInt8(v) => v as f64,
            DynamicPropertyValue::Int16(v) => v as f64,
            DynamicPropertyValue::UInt16(v) => v as f64,
            DynamicPropertyValue::Int32(v) => v as f64,
            DynamicPropertyValue::UInt32(v) => v as f64,
        }
    }

    fn as_u8(&self) -> u8 {
        match *self {
            DynamicPropertyValue::UInt8(v) => v,
            DynamicPropertyValue::Float32(v) => (v * 255.0) as u8,
            DynamicPropertyValue::Float64(v) => (v * 255.0) as u8,
            other => other.as_f64().clamp(0.0, 255.0) as u8,
        }
    }
}

/// Vertex with an arbitrary schema, decoded property by property.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicProperty {
    /// The decoded values in header order.
    pub properties: Vec<(String, DynamicPropertyValue)>,
}

fn le_bytes<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N], PlyError> {
    buffer
        .get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| PlyError::InvalidValue(format!("truncated vertex at byte {offset}")))
}

fn parse_token<T: std::str::FromStr>(token: &str, name: &str) -> Result<T, PlyError> {
    token
        .parse()
        .map_err(|_| PlyError::InvalidValue(format!("'{token}' for '{name}'")))
}

impl DynamicProperty {
    pub(crate) fn parse_from_buffer(
        buffer: &[u8],
        schema: &[PlyPropertyDefinition],
    ) -> Result<Self, PlyError> {
        let mut properties = Vec::with_capacity(schema.len());
        let mut offset = 0;

        for prop_def in schema {
            let value = match prop_def.data_type {
                PlyDataType::Float32 => {
                    DynamicPropertyValue::Float32(f32::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::Float64 => {
                    DynamicPropertyValue::Float64(f64::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::Int8 => {
                    DynamicPropertyValue::Int8(i8::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::UInt8 => {
                    DynamicPropertyValue::UInt8(u8::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::Int16 => {
                    DynamicPropertyValue::Int16(i16::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::UInt16 => {
                    DynamicPropertyValue::UInt16(u16::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::Int32 => {
                    DynamicPropertyValue::Int32(i32::from_le_bytes(le_bytes(buffer, offset)?))
                }
                PlyDataType::UInt32 => {
                    DynamicPropertyValue::UInt32(u32::from_le_bytes(le_bytes(buffer, offset)?))
                }
            };

            properties.push((prop_def.name.clone(), value));
            offset += prop_def.data_type.size();
        }

        Ok(DynamicProperty { properties })
    }

    pub(crate) fn parse_from_tokens<'a>(
        tokens: impl Iterator<Item = &'a str>,
        schema: &[PlyPropertyDefinition],
    ) -> Result<Self, PlyError> {
        let mut tokens = tokens;
        let mut properties = Vec::with_capacity(schema.len());

        for prop_def in schema {
            let token = tokens
                .next()
                .ok_or_else(|| PlyError::InvalidValue(format!("missing '{}'", prop_def.name)))?;
            let name = prop_def.name.as_str();
            let value = match prop_def.data_type {
                PlyDataType::Float32 => DynamicPropertyValue::Float32(parse_token(token, name)?),
                PlyDataType::Float64 => DynamicPropertyValue::Float64(parse_token(token, name)?),
                PlyDataType::Int8 => DynamicPropertyValue::Int8(parse_token(token, name)?),
                PlyDataType::UInt8 => DynamicPropertyValue::UInt8(parse_token(token, name)?),
                PlyDataType::Int16 => DynamicPropertyValue::Int16(parse_token(token, name)?),
                PlyDataType::UInt16 => DynamicPropertyValue::UInt16(parse_token(token, name)?),
                PlyDataType::Int32 => DynamicPropertyValue::Int32(parse_token(token, name)?),
                PlyDataType::UInt32 => DynamicPropertyValue::UInt32(parse_token(token, name)?),
            };
            properties.push((prop_def.name.clone(), value));
        }

        Ok(DynamicProperty { properties })
    }

    fn get(&self, name: &str) -> Option<&DynamicPropertyValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn get_float(&self, name: &str) -> f64 {
        self.get(name).map(|v| v.as_f64()).unwrap_or(0.0)
    }
}

impl PlyPropertyTrait for DynamicProperty {
    fn to_point(&self) -> [f64; 3] {
        [self.get_float("x"), self.get_float("y"), self.get_float("z")]
    }

    fn to_color(&self) -> Option<[u8; 3]> {
        Some([
            self.get("red")?.as_u8(),
            self.get("green")?.as_u8(),
            self.get("blue")?.as_u8(),
        ])
    }
}

/// A decoded vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum PlyProperty {
    /// Single precision position.
    XyzF32(XyzF32Property),
    /// Double precision position.
    XyzF64(XyzF64Property),
    /// Double precision position with color.
    XyzF64Rgb(XyzF64RgbProperty),
    /// Any other layout.
    Dynamic(DynamicProperty),
}

impl PlyPropertyTrait for PlyProperty {
    fn to_point(&self) -> [f64; 3] {
        match self {
            PlyProperty::XyzF32(property) => property.to_point(),
            PlyProperty::XyzF64(property) => property.to_point(),
            PlyProperty::XyzF64Rgb(property) => property.to_point(),
            PlyProperty::Dynamic(property) => property.to_point(),
        }
    }

    fn to_color(&self) -> Option<[u8; 3]> {
        match self {
            PlyProperty::XyzF32(property) => property.to_color(),
            PlyProperty::XyzF64(property) => property.to_color(),
            PlyProperty::XyzF64Rgb(property) => property.to_color(),
            PlyProperty::Dynamic(property) => property.to_color(),
        }
    }
}

/// The vertex layouts the reader knows how to decode.
#[derive(Debug, PartialEq, Clone)]
pub enum PlyType {
    /// `float x, y, z`.
    XyzF32,
    /// `double x, y, z`.
    XyzF64,
    /// `double x, y, z` followed by `uchar red, green, blue`.
    XyzF64Rgb,
    /// Any schema containing `x`, `y` and `z`.
    Dynamic(Vec<PlyPropertyDefinition>),
}

impl PlyType {
    /// Decode one binary vertex.
    pub fn deserialize(&self, buffer: &[u8]) -> Result<PlyProperty, PlyError> {
        let config = bincode::config::standard();
        match self {
            PlyType::XyzF32 => {
                let (property, _): (XyzF32Property, usize) =
                    bincode::decode_from_slice(buffer, config)?;
                Ok(PlyProperty::XyzF32(property))
            }
            PlyType::XyzF64 => {
                let (property, _): (XyzF64Property, usize) =
                    bincode::decode_from_slice(buffer, config)?;
                Ok(PlyProperty::XyzF64(property))
            }
            PlyType::XyzF64Rgb => {
                let (property, _): (XyzF64RgbProperty, usize) =
                    bincode::decode_from_slice(buffer, config)?;
                Ok(PlyProperty::XyzF64Rgb(property))
            }
            PlyType::Dynamic(ref schema) => Ok(PlyProperty::Dynamic(
                DynamicProperty::parse_from_buffer(buffer, schema)?,
            )),
        }
    }

    /// Size in bytes of one binary vertex.
    pub fn size_of(&self) -> usize {
        match self {
            PlyType::XyzF32 => 3 * 4,
            PlyType::XyzF64 => 3 * 8,
            PlyType::XyzF64Rgb => 3 * 8 + 3,
            PlyType::Dynamic(ref props) => props.iter().map(|p| p.data_type.size()).sum(),
        }
    }

    /// The header properties of the layout.
    pub fn properties(&self) -> Vec<PlyPropertyDefinition> {
        let xyz = |data_type| {
            ["x", "y", "z"]
                .into_iter()
                .map(move |name| PlyPropertyDefinition::new(name, data_type))
        };
        match self {
            PlyType::XyzF32 => xyz(PlyDataType::Float32).collect(),
            PlyType::XyzF64 => xyz(PlyDataType::Float64).collect(),
            PlyType::XyzF64Rgb => xyz(PlyDataType::Float64)
                .chain(
                    ["red", "green", "blue"]
                        .into_iter()
                        .map(|name| PlyPropertyDefinition::new(name, PlyDataType::UInt8)),
                )
                .collect(),
            PlyType::Dynamic(props) => props.clone(),
        }
    }

    /// Pick the layout matching the header properties.
    pub fn detect_format(properties: &[PlyPropertyDefinition]) -> Result<Self, PlyError> {
        for name in ["x", "y", "z"] {
            if !properties.iter().any(|p| p.name == name) {
                return Err(PlyError::UnsupportedProperty(format!(
                    "missing vertex coordinate '{name}'"
                )));
            }
        }

        for known in [PlyType::XyzF32, PlyType::XyzF64, PlyType::XyzF64Rgb] {
            if known.properties() == properties {
                return Ok(known);
            }
        }

        Ok(PlyType::Dynamic(properties.to_vec()))
    }
}
