//! Mapbox Vector Tile model with byte accounting
//!
//! Layers and features keep track of the bytes each part occupies in the
//! encoded tile, so a tile can be broken down by where its size comes from.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::pbf::{Field, Message, WireType};
use crate::domain::DomainError;

pub const LAYER_TAG: u32 = 3;
pub const DEFAULT_EXTENT: u32 = 4096;

/// Geometry type of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeomType {
    #[default]
    Unknown,
    Point,
    LineString,
    Polygon,
}

impl TryFrom<u32> for GeomType {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GeomType::Unknown),
            1 => Ok(GeomType::Point),
            2 => Ok(GeomType::LineString),
            3 => Ok(GeomType::Polygon),
            other => Err(DomainError::InvalidValue(format!(
                "unknown geometry type {other}"
            ))),
        }
    }
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f32),
    Double(f64),
    Int(i64),
    UInt(u64),
    SInt(i64),
    Bool(bool),
}

impl Value {
    /// Decode a `Value` message. Exactly one field must be present.
    pub fn decode(data: &[u8]) -> Result<Self, DomainError> {
        let mut value = None;
        let mut count = 0;

        for field in Message::new(data) {
            let field = field?;
            count += 1;
            value = Some(match field.tag {
                1 => Value::String(field.as_str()?.to_string()),
                2 => Value::Float(field.as_float()?),
                3 => Value::Double(field.as_double()?),
                4 => Value::Int(field.as_int64()?),
                5 => Value::UInt(field.as_uint64()?),
                6 => Value::SInt(field.as_sint64()?),
                7 => Value::Bool(field.as_int32()? != 0),
                tag => {
                    return Err(DomainError::UnexpectedTag {
                        context: "value",
                        tag,
                    })
                }
            });
        }

        match (value, count) {
            (None, _) => Err(DomainError::InvalidValue(
                "found no fields when decoding value".into(),
            )),
            (Some(_), c) if c > 1 => Err(DomainError::InvalidValue(
                "found multiple fields when decoding value".into(),
            )),
            (Some(v), _) => Ok(v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Int(v) | Value::SInt(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// A feature within a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<'a> {
    pub id: Option<u64>,
    pub tags: Vec<u32>,
    pub geom_type: GeomType,
    pub geometry: Vec<&'a [u8]>,
    /// Bytes of the whole feature field within the layer
    pub size: usize,
    /// Bytes of the packed tags field(s)
    pub tags_size: usize,
    /// Bytes of the geometry command field(s)
    pub cmds_size: usize,
}

impl<'a> Feature<'a> {
    fn parse(field: &Field<'a>) -> Result<Self, DomainError> {
        let mut feature = Feature {
            id: None,
            tags: Vec::new(),
            geom_type: GeomType::Unknown,
            geometry: Vec::new(),
            size: field.size,
            tags_size: 0,
            cmds_size: 0,
        };

        for sub in Message::new(field.as_bytes()?) {
            let sub = sub?;
            match sub.tag {
                1 => feature.id = Some(sub.as_uint64()?),
                2 => {
                    for tag in sub.packed(WireType::Varint)? {
                        feature.tags.push(tag?.as_uint32()?);
                    }
                    feature.tags_size += sub.size;
                }
                3 => feature.geom_type = GeomType::try_from(sub.as_uint32()?)?,
                4 => {
                    // geometry commands are only accounted, not decoded
                    feature.geometry.push(sub.as_bytes()?);
                    feature.cmds_size += sub.size;
                }
                tag => {
                    return Err(DomainError::UnexpectedTag {
                        context: "feature",
                        tag,
                    })
                }
            }
        }

        Ok(feature)
    }

    /// Bytes not attributable to tags or geometry.
    pub fn metadata_size(&self) -> usize {
        self.size.saturating_sub(self.tags_size + self.cmds_size)
    }
}

/// A layer is a container of features, plus some metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer<'a> {
    pub version: u32,
    pub name: String,
    pub features: Vec<Feature<'a>>,
    pub keys: Vec<&'a str>,
    pub values: Vec<&'a [u8]>,
    pub extent: u32,
    /// Bytes of the whole layer field within the tile
    pub size: usize,
    pub features_size: usize,
    /// Bytes of the key and value tables
    pub properties_size: usize,
}

impl<'a> Layer<'a> {
    pub fn parse(field: &Field<'a>) -> Result<Self, DomainError> {
        let mut name = None;
        let mut layer = Layer {
            version: 1,
            name: String::new(),
            features: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
            extent: DEFAULT_EXTENT,
            size: field.size,
            features_size: 0,
            properties_size: 0,
        };

        for sub in Message::new(field.as_bytes()?) {
            let sub = sub?;
            match sub.tag {
                15 => layer.version = sub.as_uint32()?,
                1 => name = Some(sub.as_str()?.to_string()),
                2 => {
                    layer.features.push(Feature::parse(&sub)?);
                    layer.features_size += sub.size;
                }
                3 => {
                    layer.keys.push(sub.as_str()?);
                    layer.properties_size += sub.size;
                }
                4 => {
                    layer.values.push(sub.as_bytes()?);
                    layer.properties_size += sub.size;
                }
                5 => layer.extent = sub.as_uint32()?,
                tag => {
                    return Err(DomainError::UnexpectedTag {
                        context: "layer",
                        tag,
                    })
                }
            }
        }

        layer.name = name.ok_or(DomainError::LayerMissingName)?;
        Ok(layer)
    }

    /// Bytes not attributable to features or the key/value tables.
    pub fn metadata_size(&self) -> usize {
        self.size
            .saturating_sub(self.properties_size + self.features_size)
    }

    /// Decode the properties of one of this layer's features.
    pub fn properties(&self, feature: &Feature<'_>) -> Result<BTreeMap<String, Value>, DomainError> {
        let mut props = BTreeMap::new();
        for pair in feature.tags.chunks(2) {
            let [k, v] = pair else {
                return Err(DomainError::InvalidValue(format!(
                    "odd number of feature tags in layer {}",
                    self.name
                )));
            };
            let key = self.keys.get(*k as usize).ok_or_else(|| DomainError::TagIndexOutOfRange {
                layer: self.name.clone(),
                index: *k,
            })?;
            let value = self.values.get(*v as usize).ok_or_else(|| DomainError::TagIndexOutOfRange {
                layer: self.name.clone(),
                index: *v,
            })?;
            props.insert((*key).to_string(), Value::decode(value)?);
        }
        Ok(props)
    }
}

/// A tile is a sequence of layers.
#[derive(Debug, Clone, Copy)]
pub struct Tile<'a> {
    data: &'a [u8],
}

impl<'a> Tile<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Iterate layers lazily, parsing each as it is reached.
    pub fn layers(&self) -> impl Iterator<Item = Result<Layer<'a>, DomainError>> + 'a {
        Message::new(self.data).map(|field| {
            let field = field?;
            if field.tag != LAYER_TAG {
                return Err(DomainError::UnexpectedTag {
                    context: "tile (expecting layer)",
                    tag: field.tag,
                });
            }
            Layer::parse(&field)
        })
    }

    /// Parse all layers, failing on the first malformed one.
    pub fn parse_layers(&self) -> Result<Vec<Layer<'a>>, DomainError> {
        self.layers().collect()
    }
}
