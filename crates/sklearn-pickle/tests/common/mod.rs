#![allow(dead_code)]

//! Minimal pickle writer for building opcode streams in tests.

use sklearn_pickle::unpickler::opcodes as op;

#[derive(Default)]
pub struct Pickle {
    out: Vec<u8>,
}

impl Pickle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proto(version: u8) -> Self {
        Self {
            out: vec![op::PROTO, version],
        }
    }

    pub fn op(mut self, code: u8) -> Self {
        self.out.push(code);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.out.extend_from_slice(bytes);
        self
    }

    pub fn none(self) -> Self {
        self.op(op::NONE)
    }

    pub fn bool(self, value: bool) -> Self {
        self.op(if value { op::NEWTRUE } else { op::NEWFALSE })
    }

    pub fn int(self, value: i32) -> Self {
        self.op(op::BININT).raw(&value.to_le_bytes())
    }

    pub fn float(self, value: f64) -> Self {
        self.op(op::BINFLOAT).raw(&value.to_be_bytes())
    }

    pub fn str(self, value: &str) -> Self {
        let len = value.len() as u32;
        self.op(op::BINUNICODE).raw(&len.to_le_bytes()).raw(value.as_bytes())
    }

    pub fn bytes(self, value: &[u8]) -> Self {
        let len = value.len() as u32;
        self.op(op::BINBYTES).raw(&len.to_le_bytes()).raw(value)
    }

    /// Python 2 `str`: latin-1 text.
    pub fn binstring(self, value: &[u8]) -> Self {
        let len = value.len() as i32;
        self.op(op::BINSTRING).raw(&len.to_le_bytes()).raw(value)
    }

    pub fn global(self, module: &str, name: &str) -> Self {
        self.op(op::GLOBAL)
            .raw(module.as_bytes())
            .raw(b"\n")
            .raw(name.as_bytes())
            .raw(b"\n")
    }

    pub fn mark(self) -> Self {
        self.op(op::MARK)
    }

    pub fn tuple(self) -> Self {
        self.op(op::TUPLE)
    }

    pub fn empty_dict(self) -> Self {
        self.op(op::EMPTY_DICT)
    }

    pub fn setitems(self) -> Self {
        self.op(op::SETITEMS)
    }

    pub fn reduce(self) -> Self {
        self.op(op::REDUCE)
    }

    pub fn build(self) -> Self {
        self.op(op::BUILD)
    }

    pub fn put(self, index: u8) -> Self {
        self.op(op::BINPUT).raw(&[index])
    }

    pub fn get(self, index: u8) -> Self {
        self.op(op::BINGET).raw(&[index])
    }

    /// `copy_reg._reconstructor(cls, object, None)`, the protocol 0-1
    /// spelling of a bare instance.
    pub fn instance(self, module: &str, name: &str) -> Self {
        self.global("copy_reg", "_reconstructor")
            .global(module, name)
            .global("__builtin__", "object")
            .none()
            .op(op::TUPLE3)
            .reduce()
    }

    /// `numpy.dtype(code, False, True)` with a little-endian state.
    pub fn dtype(self, code: &str) -> Self {
        self.dtype_with_order(code, "<")
    }

    pub fn dtype_with_order(self, code: &str, byteorder: &str) -> Self {
        self.global("numpy", "dtype")
            .binstring(code.as_bytes())
            .bool(false)
            .bool(true)
            .op(op::TUPLE3)
            .reduce()
            .mark()
            .int(3)
            .binstring(byteorder.as_bytes())
            .none()
            .none()
            .none()
            .int(-1)
            .int(-1)
            .int(0)
            .tuple()
            .build()
    }

    pub fn shape(mut self, shape: &[usize]) -> Self {
        self = self.mark();
        for &dim in shape {
            self = self.int(dim as i32);
        }
        self.tuple()
    }

    /// A joblib `NumpyArrayWrapper` followed by its raw payload.
    pub fn wrapper(self, code: &str, shape: &[usize], payload: &[u8]) -> Self {
        self.instance("joblib.numpy_pickle", "NumpyArrayWrapper")
            .empty_dict()
            .mark()
            .str("subclass")
            .global("numpy", "ndarray")
            .str("shape")
            .shape(shape)
            .str("order")
            .str("C")
            .str("dtype")
            .dtype(code)
            .str("allow_mmap")
            .bool(false)
            .setitems()
            .build()
            .raw(payload)
    }

    /// `numpy.core.multiarray._reconstruct` with inline raw data.
    pub fn reconstruct(self, code: &str, shape: &[usize], payload: &[u8]) -> Self {
        self.global("numpy.core.multiarray", "_reconstruct")
            .global("numpy", "ndarray")
            .mark()
            .int(0)
            .tuple()
            .binstring(b"b")
            .op(op::TUPLE3)
            .reduce()
            .mark()
            .int(1)
            .shape(shape)
            .dtype(code)
            .bool(false)
            .binstring(payload)
            .tuple()
            .build()
    }

    pub fn stop(self) -> Vec<u8> {
        self.op(op::STOP).out
    }
}

pub fn le_bytes_f32(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
