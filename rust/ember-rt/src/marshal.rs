//! Image codec: serializes a value graph to bytes and back.
//!
//! Shared objects (buffers, arrays, tables, functions) are written once and
//! referenced by id afterwards, so cycles and aliasing survive a round trip.
//! Values found in the reverse lookup are written by name and resolved on
//! decode against a forward lookup, which is how native routines cross the
//! image boundary.
//!
//! Framing: `EMBR` magic, format version (u32 LE), SHA-256 of the payload,
//! then the payload itself (gzip of bincode).

use crate::env::{decode_binding, Env};
use crate::function::{Arity, FuncDef, FuncFlags, Function};
use crate::table::{Struct, Table};
use crate::value::Value;
use ember_core::Instruction;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    #[error("cannot marshal value of type {0}")]
    Unsupported(&'static str),
    #[error("no native value registered as {0}")]
    UnknownNative(String),
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("decoding failed: {0}")]
    Decode(String),
    #[error("version mismatch: image v{found}, runtime v{expected}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("image checksum mismatch")]
    Checksum,
    #[error("not an ember image")]
    BadMagic,
    #[error("value nested deeper than {0} levels")]
    TooDeep(usize),
}

// ---------------------------------------------------------------------------
// Serialized form
// ---------------------------------------------------------------------------

pub const IMAGE_MAGIC: &[u8; 4] = b"EMBR";

/// Current image format version.
pub const IMAGE_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 32;

/// Deepest nesting of containers the codec walks, in either direction.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImageValue {
    Nil,
    Boolean(bool),
    Number(f64),
    String(Vec<u8>),
    Symbol(Vec<u8>),
    Keyword(Vec<u8>),
    Tuple(Vec<ImageValue>),
    Struct(Vec<(ImageValue, ImageValue)>),
    Buffer {
        id: u32,
        bytes: Vec<u8>,
    },
    Array {
        id: u32,
        items: Vec<ImageValue>,
    },
    Table {
        id: u32,
        proto: Option<Box<ImageValue>>,
        entries: Vec<(ImageValue, ImageValue)>,
    },
    Function {
        id: u32,
        def: Box<ImageFuncDef>,
    },
    /// A value the encoder found in its reverse lookup.
    Registry(String),
    /// A shared object written earlier in the stream.
    Ref(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFuncDef {
    pub name: String,
    pub doc: Option<String>,
    pub flags: FuncFlags,
    pub arity: Arity,
    pub slot_count: u32,
    pub bytecode: Vec<Instruction>,
    pub constants: Vec<ImageValue>,
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Value to name, consulted while encoding.
pub type ReverseLookup = FxHashMap<Value, String>;

/// Name to value, consulted while decoding.
pub type ForwardLookup = FxHashMap<String, Value>;

fn is_routine(value: &Value) -> bool {
    matches!(value, Value::Function(_) | Value::CFunction(_))
}

fn bound_routines(env: &Env) -> Vec<(String, Value)> {
    let table = env.table().borrow();
    table
        .iter()
        .filter_map(|(k, raw)| match k {
            Value::Symbol(name) => decode_binding(raw)
                .map(|b| b.value)
                .filter(is_routine)
                .map(|v| (String::from_utf8_lossy(name).into_owned(), v)),
            _ => None,
        })
        .collect()
}

/// Names of every routine bound in `env`, keyed by value.
pub fn reverse_lookup(env: &Env) -> ReverseLookup {
    bound_routines(env).into_iter().map(|(k, v)| (v, k)).collect()
}

/// Every routine bound in `env`, keyed by name.
pub fn env_lookup(env: &Env) -> ForwardLookup {
    bound_routines(env).into_iter().collect()
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

struct Encoder<'a> {
    lookup: &'a ReverseLookup,
    ids: FxHashMap<usize, u32>,
    depth: usize,
}

impl Encoder<'_> {
    /// Returns the existing id for a shared object, or registers a new one.
    fn id_for(&mut self, addr: usize) -> Result<u32, u32> {
        if let Some(id) = self.ids.get(&addr) {
            return Err(*id);
        }
        let id = self.ids.len() as u32;
        self.ids.insert(addr, id);
        Ok(id)
    }

    fn pairs<'v>(
        &mut self,
        pairs: impl Iterator<Item = (&'v Value, &'v Value)>,
    ) -> Result<Vec<(ImageValue, ImageValue)>, MarshalError> {
        pairs
            .map(|(k, v)| -> Result<_, MarshalError> { Ok((self.encode(k)?, self.encode(v)?)) })
            .collect()
    }

    fn encode(&mut self, value: &Value) -> Result<ImageValue, MarshalError> {
        if self.depth >= MAX_DEPTH {
            return Err(MarshalError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let image = self.encode_value(value);
        self.depth -= 1;
        image
    }

    fn encode_value(&mut self, value: &Value) -> Result<ImageValue, MarshalError> {
        if !matches!(value, Value::Nil | Value::Boolean(_) | Value::Number(_)) {
            if let Some(name) = self.lookup.get(value) {
                return Ok(ImageValue::Registry(name.clone()));
            }
        }
        Ok(match value {
            Value::Nil => ImageValue::Nil,
            Value::Boolean(b) => ImageValue::Boolean(*b),
            Value::Number(n) => ImageValue::Number(*n),
            Value::String(s) => ImageValue::String(s.to_vec()),
            Value::Symbol(s) => ImageValue::Symbol(s.to_vec()),
            Value::Keyword(s) => ImageValue::Keyword(s.to_vec()),
            Value::Tuple(items) => {
                ImageValue::Tuple(items.iter().map(|v| self.encode(v)).collect::<Result<_, _>>()?)
            }
            Value::Struct(s) => ImageValue::Struct(self.pairs(s.iter())?),
            Value::Buffer(b) => match self.id_for(Rc::as_ptr(b) as *const () as usize) {
                Err(id) => ImageValue::Ref(id),
                Ok(id) => ImageValue::Buffer {
                    id,
                    bytes: b.borrow().clone(),
                },
            },
            Value::Array(a) => match self.id_for(Rc::as_ptr(a) as *const () as usize) {
                Err(id) => ImageValue::Ref(id),
                Ok(id) => {
                    let items = a.borrow().clone();
                    ImageValue::Array {
                        id,
                        items: items.iter().map(|v| self.encode(v)).collect::<Result<_, _>>()?,
                    }
                }
            },
            Value::Table(t) => match self.id_for(Rc::as_ptr(t) as *const () as usize) {
                Err(id) => ImageValue::Ref(id),
                Ok(id) => {
                    let (proto, entries) = {
                        let t = t.borrow();
                        let entries: Vec<(Value, Value)> =
                            t.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                        (t.proto().cloned(), entries)
                    };
                    let proto = match proto {
                        Some(p) => Some(Box::new(self.encode(&Value::Table(p))?)),
                        None => None,
                    };
                    ImageValue::Table {
                        id,
                        proto,
                        entries: self.pairs(entries.iter().map(|(k, v)| (k, v)))?,
                    }
                }
            },
            Value::Function(f) => match self.id_for(Rc::as_ptr(f) as *const () as usize) {
                Err(id) => ImageValue::Ref(id),
                Ok(id) => {
                    let def = &f.def;
                    let constants = def
                        .constants
                        .iter()
                        .map(|v| self.encode(v))
                        .collect::<Result<_, _>>()?;
                    ImageValue::Function {
                        id,
                        def: Box::new(ImageFuncDef {
                            name: def.name.clone(),
                            doc: def.doc.clone(),
                            flags: def.flags,
                            arity: def.arity,
                            slot_count: def.slot_count,
                            bytecode: def.bytecode.clone(),
                            constants,
                        }),
                    }
                }
            },
            Value::CFunction(_) => return Err(MarshalError::Unsupported("cfunction")),
            Value::Fiber(_) => return Err(MarshalError::Unsupported("fiber")),
            Value::Abstract(a) => return Err(MarshalError::Unsupported(a.type_name())),
        })
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

struct Decoder<'a> {
    lookup: &'a ForwardLookup,
    objects: FxHashMap<u32, Value>,
    depth: usize,
}

impl Decoder<'_> {
    fn register(&mut self, id: u32, value: Value) -> Result<(), MarshalError> {
        if self.objects.insert(id, value).is_some() {
            return Err(MarshalError::Decode(format!("duplicate object id {}", id)));
        }
        Ok(())
    }

    fn pairs(&mut self, pairs: &[(ImageValue, ImageValue)]) -> Result<Vec<(Value, Value)>, MarshalError> {
        pairs
            .iter()
            .map(|(k, v)| -> Result<_, MarshalError> { Ok((self.decode(k)?, self.decode(v)?)) })
            .collect()
    }

    fn decode(&mut self, image: &ImageValue) -> Result<Value, MarshalError> {
        if self.depth >= MAX_DEPTH {
            return Err(MarshalError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let value = self.decode_value(image);
        self.depth -= 1;
        value
    }

    fn decode_value(&mut self, image: &ImageValue) -> Result<Value, MarshalError> {
        Ok(match image {
            ImageValue::Nil => Value::Nil,
            ImageValue::Boolean(b) => Value::Boolean(*b),
            ImageValue::Number(n) => Value::Number(*n),
            ImageValue::String(s) => Value::string(s),
            ImageValue::Symbol(s) => Value::symbol(s),
            ImageValue::Keyword(s) => Value::keyword(s),
            ImageValue::Tuple(items) => {
                Value::tuple(items.iter().map(|v| self.decode(v)).collect::<Result<_, _>>()?)
            }
            ImageValue::Struct(pairs) => Value::structure(Struct::from_pairs(self.pairs(pairs)?)),
            ImageValue::Buffer { id, bytes } => {
                let v = Value::buffer(bytes.clone());
                self.register(*id, v.clone())?;
                v
            }
            ImageValue::Array { id, items } => {
                let cell = Rc::new(RefCell::new(Vec::with_capacity(items.len())));
                self.register(*id, Value::Array(cell.clone()))?;
                let decoded = items.iter().map(|v| self.decode(v)).collect::<Result<Vec<_>, _>>()?;
                *cell.borrow_mut() = decoded;
                Value::Array(cell)
            }
            ImageValue::Table { id, proto, entries } => {
                let cell = Rc::new(RefCell::new(Table::with_capacity(entries.len())));
                self.register(*id, Value::Table(cell.clone()))?;
                if let Some(proto) = proto {
                    match self.decode(proto)? {
                        Value::Table(p) => cell.borrow_mut().set_proto(Some(p)),
                        other => {
                            return Err(MarshalError::Decode(format!(
                                "table prototype must be a table, got {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                for (k, v) in self.pairs(entries)? {
                    cell.borrow_mut().put(k, v);
                }
                Value::Table(cell)
            }
            ImageValue::Function { id, def } => {
                let constants = def
                    .constants
                    .iter()
                    .map(|v| self.decode(v))
                    .collect::<Result<Vec<_>, _>>()?;
                let def = FuncDef {
                    name: def.name.clone(),
                    doc: def.doc.clone(),
                    flags: def.flags,
                    arity: def.arity,
                    slot_count: def.slot_count,
                    bytecode: def.bytecode.clone(),
                    constants,
                };
                def.verify()
                    .map_err(|e| MarshalError::Decode(format!("function {}: {}", def.name, e)))?;
                let v = Value::Function(Function::new(def));
                self.register(*id, v.clone())?;
                v
            }
            ImageValue::Registry(name) => self
                .lookup
                .get(name)
                .cloned()
                .ok_or_else(|| MarshalError::UnknownNative(name.clone()))?,
            // A function cannot see itself through its own constants: its id
            // is only registered once they are decoded.
            ImageValue::Ref(id) => self
                .objects
                .get(id)
                .cloned()
                .ok_or_else(|| MarshalError::Decode(format!("reference to unknown object {}", id)))?,
        })
    }
}

// ---------------------------------------------------------------------------
// Compression / framing
// ---------------------------------------------------------------------------

pub fn compress(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Encodes `value` into a framed image.
pub fn marshal(value: &Value, lookup: &ReverseLookup) -> Result<Vec<u8>, MarshalError> {
    let mut encoder = Encoder {
        lookup,
        ids: FxHashMap::default(),
        depth: 0,
    };
    let image = encoder.encode(value)?;
    frame(&image)
}

fn frame(image: &ImageValue) -> Result<Vec<u8>, MarshalError> {
    let raw = bincode::serialize(image).map_err(|e| MarshalError::Encode(e.to_string()))?;
    let payload = compress(&raw).map_err(|e| MarshalError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(IMAGE_MAGIC);
    out.extend_from_slice(&IMAGE_VERSION.to_le_bytes());
    out.extend_from_slice(&Sha256::digest(&payload));
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes a framed image, resolving named natives through `lookup`.
pub fn unmarshal(bytes: &[u8], lookup: &ForwardLookup) -> Result<Value, MarshalError> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != IMAGE_MAGIC {
        return Err(MarshalError::BadMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let found = u32::from_le_bytes(version);
    if found != IMAGE_VERSION {
        return Err(MarshalError::VersionMismatch {
            expected: IMAGE_VERSION,
            found,
        });
    }
    let (digest, payload) = bytes[8..].split_at(32);
    if Sha256::digest(payload).as_slice() != digest {
        return Err(MarshalError::Checksum);
    }
    let raw = decompress(payload).map_err(|e| MarshalError::Decode(e.to_string()))?;
    let image: ImageValue =
        bincode::deserialize(&raw).map_err(|e| MarshalError::Decode(e.to_string()))?;
    let mut decoder = Decoder {
        lookup,
        objects: FxHashMap::default(),
        depth: 0,
    };
    decoder.decode(&image)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
