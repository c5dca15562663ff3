//! Typed views over byte buffers.
//!
//! A typed array reads and writes fixed-width little-endian numbers in a
//! buffer. The buffer is shared, so writes through the view are visible
//! to `buffer/...` routines and the other way round.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::table::Struct;
use crate::value::{Abstract, Value};
use crate::vm::ops::check_length;
use crate::vm::{Vm, VmError};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl ElementType {
    pub fn from_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"uint8" => Self::U8,
            b"int8" => Self::I8,
            b"uint16" => Self::U16,
            b"int16" => Self::I16,
            b"uint32" => Self::U32,
            b"int32" => Self::I32,
            b"float32" => Self::F32,
            b"float64" => Self::F64,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    fn read(self, b: &[u8]) -> f64 {
        match self {
            Self::U8 => b[0] as f64,
            Self::I8 => b[0] as i8 as f64,
            Self::U16 => u16::from_le_bytes([b[0], b[1]]) as f64,
            Self::I16 => i16::from_le_bytes([b[0], b[1]]) as f64,
            Self::U32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Self::I32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Self::F32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Self::F64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&b[..8]);
                f64::from_le_bytes(raw)
            }
        }
    }

    /// Integer types wrap like a C cast of the truncated value.
    fn write(self, b: &mut [u8], n: f64) {
        let wide = n as i64;
        match self {
            Self::U8 | Self::I8 => b[0] = wide as u8,
            Self::U16 | Self::I16 => b[..2].copy_from_slice(&(wide as u16).to_le_bytes()),
            Self::U32 | Self::I32 => b[..4].copy_from_slice(&(wide as u32).to_le_bytes()),
            Self::F32 => b[..4].copy_from_slice(&(n as f32).to_le_bytes()),
            Self::F64 => b[..8].copy_from_slice(&n.to_le_bytes()),
        }
    }
}

#[derive(Debug)]
pub struct TypedArray {
    pub element: ElementType,
    pub buffer: Rc<RefCell<Vec<u8>>>,
    pub offset: usize,
    pub length: usize,
}

impl Abstract for TypedArray {
    fn type_name(&self) -> &'static str {
        "core/typed-array"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TypedArray {
    /// Byte range of element `i`, checked against both the view and the
    /// current buffer length. Buffers can shrink under a view.
    fn span(&self, i: usize) -> Result<std::ops::Range<usize>, VmError> {
        if i >= self.length {
            return Err(args::runtime(format!(
                "index {} out of range [0, {})",
                i, self.length
            )));
        }
        let start = self.offset + i * self.element.size();
        let end = start + self.element.size();
        if end > self.buffer.borrow().len() {
            return Err(args::runtime("typed array extends past its buffer"));
        }
        Ok(start..end)
    }

    pub fn get(&self, i: usize) -> Result<f64, VmError> {
        let span = self.span(i)?;
        Ok(self.element.read(&self.buffer.borrow()[span]))
    }

    pub fn set(&self, i: usize, n: f64) -> Result<(), VmError> {
        let span = self.span(i)?;
        self.element.write(&mut self.buffer.borrow_mut()[span], n);
        Ok(())
    }
}

fn view_arg(args: &[Value], i: usize) -> Result<&TypedArray, VmError> {
    match &args[i] {
        Value::Abstract(a) => a
            .as_any()
            .downcast_ref::<TypedArray>()
            .ok_or_else(|| VmError::type_error("core/typed-array", &args[i])),
        other => Err(VmError::type_error("core/typed-array", other)),
    }
}

fn cfun_new(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("tarray/new", args, 2, Some(4))?;
    let element = match &args[0] {
        Value::Keyword(k) => ElementType::from_name(k),
        _ => None,
    }
    .ok_or_else(|| VmError::type_error("typed array element type", &args[0]))?;
    let length = args::index(args, 1)?;
    let bytes = length
        .checked_mul(element.size())
        .ok_or_else(|| args::runtime("typed array too large"))?;
    let offset = match args.get(3) {
        None | Some(Value::Nil) => 0,
        Some(_) => args::index(args, 3)?,
    };
    let buffer = match args.get(2) {
        None | Some(Value::Nil) => Rc::new(RefCell::new(vec![0u8; check_length(bytes)?])),
        Some(_) => {
            let buffer = args::buffer(args, 2)?;
            if offset.saturating_add(bytes) > buffer.borrow().len() {
                return Err(args::runtime(format!(
                    "buffer of {} bytes cannot hold {} {} elements at offset {}",
                    buffer.borrow().len(),
                    length,
                    element.name(),
                    offset
                )));
            }
            buffer
        }
    };
    Ok(Value::Abstract(Rc::new(TypedArray {
        element,
        buffer,
        offset,
        length,
    })))
}

fn cfun_get(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("tarray/get", args, 2)?;
    let view = view_arg(args, 0)?;
    Ok(Value::Number(view.get(args::index(args, 1)?)?))
}

fn cfun_set(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("tarray/set", args, 3)?;
    let view = view_arg(args, 0)?;
    view.set(args::index(args, 1)?, args::number(args, 2)?)?;
    Ok(args[0].clone())
}

fn cfun_length(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("tarray/length", args, 1)?;
    Ok(Value::Number(view_arg(args, 0)?.length as f64))
}

fn cfun_buffer(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("tarray/buffer", args, 1)?;
    Ok(Value::Buffer(view_arg(args, 0)?.buffer.clone()))
}

fn cfun_properties(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("tarray/properties", args, 1)?;
    let view = view_arg(args, 0)?;
    Ok(Value::structure(Struct::from_pairs([
        (Value::keyword("type"), Value::keyword(view.element.name())),
        (Value::keyword("size"), Value::Number(view.length as f64)),
        (Value::keyword("byte-offset"), Value::Number(view.offset as f64)),
        (Value::keyword("element-size"), Value::Number(view.element.size() as f64)),
    ])))
}

const ENTRIES: &[Entry] = &[
    ("tarray/new", cfun_new,
        "(tarray/new type size &opt buffer offset)\n\n\
         Creates a typed array of size elements. type is one of :uint8 :int8 :uint16 :int16 \
         :uint32 :int32 :float32 :float64. Without buffer a zeroed buffer is allocated; \
         otherwise the array views buffer starting at byte offset."),
    ("tarray/get", cfun_get,
        "(tarray/get arr i)\n\nReturns element i of arr as a number."),
    ("tarray/set", cfun_set,
        "(tarray/set arr i x)\n\nStores x at element i of arr, wrapping integers to the element width. Returns arr."),
    ("tarray/length", cfun_length,
        "(tarray/length arr)\n\nReturns the number of elements in arr."),
    ("tarray/buffer", cfun_buffer,
        "(tarray/buffer arr)\n\nReturns the buffer arr views."),
    ("tarray/properties", cfun_properties,
        "(tarray/properties arr)\n\nReturns a struct with the :type, :size, :byte-offset, and :element-size of arr."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}
