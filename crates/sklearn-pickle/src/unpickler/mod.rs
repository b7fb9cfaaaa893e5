//! Pickle stack machine.
//!
//! Interprets the opcode stream of protocols 0 through 5 with an operand
//! stack, a mark stack and a memo table. Calls (`REDUCE`, `NEWOBJ`, `OBJ`,
//! `INST`) are routed through a [`ReducerRegistry`]; names without a reducer
//! produce an unresolved placeholder object and a diagnostic.

pub mod opcodes;
mod text;
mod unique;

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use sklearn_pickle_buffers::{print_octets, Reader};
use tracing::{debug, trace, warn};

use crate::error::PickleError;
use crate::reducers::{self, ReducerRegistry};
use crate::value::{Object, Value};

/// Deepest container nesting a stream may build.
pub const MAX_NESTING: usize = 256;

/// Copies of memoized values (and `DUP`) are charged against an allowance
/// of this many bytes per input byte, with a floor for small streams.
const COPY_BUDGET_PER_INPUT_BYTE: usize = 128;
const MIN_COPY_BUDGET: usize = 64 << 20;

/// Stack slot: either an owned value with its nesting depth, or a
/// reference to a memo entry.
///
/// Memoized values live in the memo only, so opcodes that mutate a
/// container (`APPENDS`, `SETITEMS`, `BUILD`, ...) update the single copy
/// that later `GET`s observe.
#[derive(Debug, Clone)]
enum Item {
    Value(Value, usize),
    Memo(u32),
}

#[derive(Debug)]
struct Memoized {
    value: Value,
    depth: usize,
}

/// Sink for non-fatal diagnostics raised while decoding.
pub type Diagnostics<'d> = dyn FnMut(PickleError) + 'd;

/// Decodes one pickle from the start of `data`.
///
/// Unresolved type names are logged and otherwise dropped; use
/// [`Unpickler::load`] to observe them.
pub fn loads(data: &[u8], registry: &ReducerRegistry) -> Result<Value, PickleError> {
    Unpickler::new(data).load(registry, &mut |error: PickleError| {
        debug!(%error, "diagnostic dropped");
    })
}

/// One-shot pickle decoder over a borrowed byte buffer.
pub struct Unpickler<'a> {
    reader: Reader<'a>,
    stack: Vec<Item>,
    metastack: Vec<Vec<Item>>,
    memo: HashMap<u32, Memoized>,
    proto: u8,
    opcode: u8,
    /// Deepest value popped by the current opcode.
    nested: usize,
    copy_limit: usize,
    copy_budget: usize,
}

impl<'a> Unpickler<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let copy_limit = data
            .len()
            .saturating_mul(COPY_BUDGET_PER_INPUT_BYTE)
            .max(MIN_COPY_BUDGET);
        Self {
            reader: Reader::new(data),
            stack: Vec::new(),
            metastack: Vec::new(),
            memo: HashMap::new(),
            proto: 0,
            opcode: 0,
            nested: 0,
            copy_limit,
            copy_budget: copy_limit,
        }
    }

    /// Offset of the first byte after the `STOP` opcode once loading
    /// succeeded.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Runs the stack machine until `STOP` and returns the single value left
    /// on the stack.
    pub fn load(
        &mut self,
        registry: &ReducerRegistry,
        diagnostics: &mut Diagnostics<'_>,
    ) -> Result<Value, PickleError> {
        loop {
            let offset = self.reader.position();
            self.opcode = self.reader.u8()?;
            trace!(
                offset,
                opcode = opcodes::name(self.opcode).unwrap_or("?"),
                "pickle op"
            );
            if self.opcode == opcodes::STOP {
                return self.finish();
            }
            self.nested = 0;
            self.step(offset, registry, diagnostics)?;
        }
    }

    fn finish(&mut self) -> Result<Value, PickleError> {
        if !self.metastack.is_empty() {
            return Err(self.malformed("STOP inside an unclosed MARK"));
        }
        match <[Item; 1]>::try_from(mem::take(&mut self.stack)) {
            Ok([item]) => self.resolve(item),
            Err(items) => Err(PickleError::MalformedStream(format!(
                "STOP with {} items on the stack, expected 1",
                items.len()
            ))),
        }
    }

    fn step(
        &mut self,
        offset: usize,
        registry: &ReducerRegistry,
        diagnostics: &mut Diagnostics<'_>,
    ) -> Result<(), PickleError> {
        use self::opcodes::*;

        match self.opcode {
            PROTO => {
                self.proto = self.reader.u8()?;
                if self.proto > HIGHEST_PROTOCOL {
                    return Err(PickleError::MalformedStream(format!(
                        "unsupported pickle protocol {}",
                        self.proto
                    )));
                }
            }
            FRAME => {
                self.reader.u64_le()?;
            }

            // Leaves
            NONE => self.push(Value::None)?,
            NEWTRUE => self.push(Value::Bool(true))?,
            NEWFALSE => self.push(Value::Bool(false))?,
            INT => {
                let line = self.reader.line()?;
                let value = match line {
                    b"00" => Value::Bool(false),
                    b"01" => Value::Bool(true),
                    _ => text::parse_int(line).ok_or_else(|| self.malformed("invalid INT"))?,
                };
                self.push(value)?;
            }
            LONG => {
                let line = self.reader.line()?;
                let line = line.strip_suffix(b"L").unwrap_or(line);
                let value = text::parse_int(line).ok_or_else(|| self.malformed("invalid LONG"))?;
                self.push(value)?;
            }
            BININT => {
                let v = self.reader.i32_le()?;
                self.push(Value::Int(v.into()))?;
            }
            BININT1 => {
                let v = self.reader.u8()?;
                self.push(Value::Int(v.into()))?;
            }
            BININT2 => {
                let v = self.reader.u16_le()?;
                self.push(Value::Int(v.into()))?;
            }
            LONG1 => {
                let bytes = self.reader.bin_u8()?;
                let value = decode_long(bytes).ok_or_else(|| self.malformed("LONG1 wider than 128 bits"))?;
                self.push(value)?;
            }
            LONG4 => {
                let size = self.read_length_i32()?;
                let bytes = self.reader.buf(size)?;
                let value = decode_long(bytes).ok_or_else(|| self.malformed("LONG4 wider than 128 bits"))?;
                self.push(value)?;
            }
            FLOAT => {
                let line = self.reader.line()?;
                let value = std::str::from_utf8(line)
                    .ok()
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .ok_or_else(|| self.malformed("invalid FLOAT"))?;
                self.push(Value::Float(value))?;
            }
            BINFLOAT => {
                let v = self.reader.f64_be()?;
                self.push(Value::Float(v))?;
            }
            STRING => {
                let line = self.reader.line()?;
                let bytes = text::unquote_string(line).ok_or_else(|| self.malformed("invalid STRING"))?;
                self.push(Value::Str(latin1(&bytes)))?;
            }
            BINSTRING => {
                let size = self.read_length_i32()?;
                let bytes = self.reader.buf(size)?;
                self.push(Value::Str(latin1(bytes)))?;
            }
            SHORT_BINSTRING => {
                let bytes = self.reader.bin_u8()?;
                self.push(Value::Str(latin1(bytes)))?;
            }
            UNICODE => {
                let line = self.reader.line()?;
                let s = text::raw_unicode_escape(line).ok_or_else(|| self.malformed("invalid UNICODE"))?;
                self.push(Value::Str(s))?;
            }
            BINUNICODE => {
                let bytes = self.reader.bin_u32_le()?;
                let s = self.utf8(bytes)?;
                self.push(Value::Str(s))?;
            }
            SHORT_BINUNICODE => {
                let bytes = self.reader.bin_u8()?;
                let s = self.utf8(bytes)?;
                self.push(Value::Str(s))?;
            }
            BINUNICODE8 => {
                let bytes = self.reader.bin_u64_le()?;
                let s = self.utf8(bytes)?;
                self.push(Value::Str(s))?;
            }
            BINBYTES => {
                let bytes = self.reader.bin_u32_le()?;
                self.push(Value::Bytes(Arc::from(bytes)))?;
            }
            SHORT_BINBYTES => {
                let bytes = self.reader.bin_u8()?;
                self.push(Value::Bytes(Arc::from(bytes)))?;
            }
            BINBYTES8 | BYTEARRAY8 => {
                let bytes = self.reader.bin_u64_le()?;
                self.push(Value::Bytes(Arc::from(bytes)))?;
            }
            READONLY_BUFFER => {
                self.top()?;
            }

            // Stack manipulation
            MARK => {
                let stack = mem::take(&mut self.stack);
                self.metastack.push(stack);
            }
            POP => {
                if self.stack.is_empty() && !self.metastack.is_empty() {
                    self.pop_mark()?;
                } else {
                    self.pop()?;
                }
            }
            POP_MARK => {
                self.pop_mark()?;
            }
            DUP => {
                let cost = match self.top()? {
                    Item::Value(value, _) => self.copy_cost(value)?,
                    Item::Memo(_) => 0,
                };
                self.copy_budget -= cost;
                let item = self.top()?.clone();
                self.stack.push(item);
            }

            // Memo
            GET => {
                let line = self.reader.line()?;
                let index = text::parse_index(line).ok_or_else(|| self.malformed("invalid GET index"))?;
                self.get(index)?;
            }
            BINGET => {
                let index = self.reader.u8()?;
                self.get(index.into())?;
            }
            LONG_BINGET => {
                let index = self.reader.u32_le()?;
                self.get(index)?;
            }
            PUT => {
                let line = self.reader.line()?;
                let index = text::parse_index(line).ok_or_else(|| self.malformed("invalid PUT index"))?;
                self.put(index)?;
            }
            BINPUT => {
                let index = self.reader.u8()?;
                self.put(index.into())?;
            }
            LONG_BINPUT => {
                let index = self.reader.u32_le()?;
                self.put(index)?;
            }
            MEMOIZE => {
                let index = u32::try_from(self.memo.len())
                    .map_err(|_| self.malformed("memo table overflow"))?;
                self.put(index)?;
            }

            // Containers
            EMPTY_TUPLE => self.push(Value::Tuple(Vec::new()))?,
            TUPLE => {
                let items = self.pop_mark_values()?;
                self.push(Value::Tuple(items))?;
            }
            TUPLE1 | TUPLE2 | TUPLE3 => {
                let n = usize::from(self.opcode - TUPLE1 + 1);
                let items = self.pop_values(n)?;
                self.push(Value::Tuple(items))?;
            }
            EMPTY_LIST => self.push(Value::List(Vec::new()))?,
            LIST => {
                let items = self.pop_mark_values()?;
                self.push(Value::List(items))?;
            }
            APPEND => {
                let item = self.pop_value()?;
                self.extend_list(vec![item])?;
            }
            APPENDS => {
                let items = self.pop_mark_values()?;
                self.extend_list(items)?;
            }
            EMPTY_DICT => self.push(Value::Dict(Vec::new()))?,
            DICT => {
                let items = self.pop_mark_values()?;
                let entries = self.pairs(items)?;
                self.push(Value::Dict(entries))?;
            }
            SETITEM => {
                let value = self.pop_value()?;
                let key = self.pop_value()?;
                self.set_items(vec![(key, value)])?;
            }
            SETITEMS => {
                let items = self.pop_mark_values()?;
                let entries = self.pairs(items)?;
                self.set_items(entries)?;
            }
            EMPTY_SET => self.push(Value::Set(Vec::new()))?,
            ADDITEMS => {
                let items = self.pop_mark_values()?;
                match self.top_mut()? {
                    Value::Set(set) => set.extend(items),
                    other => {
                        let kind = other.kind();
                        return Err(self.malformed(&format!("ADDITEMS target is a {kind}")));
                    }
                }
            }
            FROZENSET => {
                let items = self.pop_mark_values()?;
                self.push(Value::FrozenSet(unique::dedup(items)))?;
            }

            // Globals and calls
            GLOBAL => {
                let module = self.reader.line()?;
                let name = self.reader.line()?;
                let global = format!("{}.{}", latin1(module), latin1(name));
                self.push(Value::Global(global))?;
            }
            STACK_GLOBAL => {
                let name = self.pop_value()?;
                let module = self.pop_value()?;
                match (module, name) {
                    (Value::Str(module), Value::Str(name)) => {
                        self.push(Value::Global(format!("{module}.{name}")))?
                    }
                    _ => return Err(self.malformed("STACK_GLOBAL requires two strings")),
                }
            }
            REDUCE => {
                let args = self.pop_value()?;
                let callable = self.pop_value()?;
                let args = self.arguments(args)?;
                let value = self.call(callable, args, registry, diagnostics)?;
                self.push(value)?;
            }
            NEWOBJ => {
                let args = self.pop_value()?;
                let cls = self.pop_value()?;
                let args = self.arguments(args)?;
                let value = self.call(cls, args, registry, diagnostics)?;
                self.push(value)?;
            }
            NEWOBJ_EX => {
                let kwargs = self.pop_value()?;
                let args = self.pop_value()?;
                let cls = self.pop_value()?;
                if !matches!(&kwargs, Value::Dict(entries) if entries.is_empty()) {
                    debug!(offset, "NEWOBJ_EX keyword arguments ignored");
                }
                let args = self.arguments(args)?;
                let value = self.call(cls, args, registry, diagnostics)?;
                self.push(value)?;
            }
            OBJ => {
                let mut items = self.pop_mark_values()?;
                if items.is_empty() {
                    return Err(self.malformed("OBJ without a class"));
                }
                let cls = items.remove(0);
                let value = self.call(cls, items, registry, diagnostics)?;
                self.push(value)?;
            }
            INST => {
                let module = self.reader.line()?;
                let name = self.reader.line()?;
                let cls = Value::Global(format!("{}.{}", latin1(module), latin1(name)));
                let args = self.pop_mark_values()?;
                let value = self.call(cls, args, registry, diagnostics)?;
                self.push(value)?;
            }
            BUILD => {
                let state = self.pop_value()?;
                self.deepen_top()?;
                let target = top_mut(&mut self.stack, &mut self.memo)?;
                match target {
                    Value::Object(obj) => {
                        debug!(type_name = %obj.type_name, offset, "restoring state");
                        obj.body.restore(&obj.type_name, state, &mut self.reader)?;
                    }
                    other => {
                        let kind = other.kind();
                        return Err(self.malformed(&format!("BUILD target is a {kind}")));
                    }
                }
            }

            PERSID | BINPERSID | EXT1 | EXT2 | EXT4 | NEXT_BUFFER => {
                let name = opcodes::name(self.opcode).unwrap_or("?");
                return Err(PickleError::MalformedStream(format!(
                    "unsupported opcode {name} at offset {offset}"
                )));
            }
            op => {
                return Err(PickleError::MalformedStream(format!(
                    "unknown opcode 0x{op:02x} at offset {offset} (next bytes: {})",
                    print_octets(self.reader.lookahead(8), 8)
                )));
            }
        }
        Ok(())
    }

    fn malformed(&self, message: &str) -> PickleError {
        let name = opcodes::name(self.opcode).unwrap_or("?");
        PickleError::MalformedStream(format!(
            "{message} ({name} before offset {})",
            self.reader.position()
        ))
    }

    /// Pushes `value`; containers and objects sit one level above the
    /// deepest value the current opcode popped.
    fn push(&mut self, value: Value) -> Result<(), PickleError> {
        let depth = if nests(&value) { self.nested + 1 } else { 0 };
        self.check_depth(depth)?;
        self.stack.push(Item::Value(value, depth));
        Ok(())
    }

    fn check_depth(&self, depth: usize) -> Result<(), PickleError> {
        if depth > MAX_NESTING {
            return Err(self.malformed(&format!(
                "nesting too deep (more than {MAX_NESTING} levels)"
            )));
        }
        Ok(())
    }

    /// Records that the top container now holds the values popped by the
    /// current opcode.
    fn deepen_top(&mut self) -> Result<(), PickleError> {
        let depth = self.nested + 1;
        self.check_depth(depth)?;
        match self.stack.last_mut() {
            Some(Item::Value(_, current)) => *current = (*current).max(depth),
            Some(Item::Memo(index)) => {
                if let Some(entry) = self.memo.get_mut(&*index) {
                    entry.depth = entry.depth.max(depth);
                }
            }
            None => {}
        }
        Ok(())
    }

    fn top(&self) -> Result<&Item, PickleError> {
        self.stack
            .last()
            .ok_or_else(|| self.malformed("stack underflow"))
    }

    fn top_mut(&mut self) -> Result<&mut Value, PickleError> {
        self.deepen_top()?;
        let opcode = self.opcode;
        top_mut(&mut self.stack, &mut self.memo).map_err(|err| match err {
            PickleError::MalformedStream(message) => PickleError::MalformedStream(format!(
                "{message} ({})",
                opcodes::name(opcode).unwrap_or("?")
            )),
            other => other,
        })
    }

    fn pop(&mut self) -> Result<Item, PickleError> {
        match self.stack.pop() {
            Some(item) => Ok(item),
            None => Err(self.malformed("stack underflow")),
        }
    }

    fn pop_value(&mut self) -> Result<Value, PickleError> {
        let item = self.pop()?;
        self.resolve(item)
    }

    fn pop_values(&mut self, n: usize) -> Result<Vec<Value>, PickleError> {
        if self.stack.len() < n {
            return Err(self.malformed("stack underflow"));
        }
        let items = self.stack.split_off(self.stack.len() - n);
        self.resolve_all(items)
    }

    fn pop_mark(&mut self) -> Result<Vec<Item>, PickleError> {
        match self.metastack.pop() {
            Some(previous) => Ok(mem::replace(&mut self.stack, previous)),
            None => Err(self.malformed("MARK not found")),
        }
    }

    fn pop_mark_values(&mut self) -> Result<Vec<Value>, PickleError> {
        let items = self.pop_mark()?;
        self.resolve_all(items)
    }

    fn resolve(&mut self, item: Item) -> Result<Value, PickleError> {
        let (value, depth) = match item {
            Item::Value(value, depth) => (value, depth),
            Item::Memo(index) => self.copy_memo(index)?,
        };
        self.nested = self.nested.max(depth);
        Ok(unique::normalize(value))
    }

    fn resolve_all(&mut self, items: Vec<Item>) -> Result<Vec<Value>, PickleError> {
        items.into_iter().map(|item| self.resolve(item)).collect()
    }

    fn copy_memo(&mut self, index: u32) -> Result<(Value, usize), PickleError> {
        let Some(entry) = self.memo.get(&index) else {
            return Err(self.malformed(&format!("invalid memo reference {index}")));
        };
        let cost = self.copy_cost(&entry.value)?;
        let copy = (entry.value.clone(), entry.depth);
        self.copy_budget -= cost;
        Ok(copy)
    }

    fn copy_cost(&self, value: &Value) -> Result<usize, PickleError> {
        footprint(value, self.copy_budget).ok_or_else(|| {
            self.malformed(&format!(
                "copies of memoized values exceed {} bytes",
                self.copy_limit
            ))
        })
    }

    fn get(&mut self, index: u32) -> Result<(), PickleError> {
        if !self.memo.contains_key(&index) {
            return Err(self.malformed(&format!("invalid memo reference {index}")));
        }
        self.stack.push(Item::Memo(index));
        Ok(())
    }

    fn put(&mut self, index: u32) -> Result<(), PickleError> {
        let (value, depth) = match self.stack.pop() {
            Some(Item::Value(value, depth)) => (value, depth),
            Some(Item::Memo(source)) if source == index => {
                self.stack.push(Item::Memo(index));
                return Ok(());
            }
            Some(Item::Memo(source)) => self.copy_memo(source)?,
            None => return Err(self.malformed("stack underflow")),
        };
        self.memo.insert(index, Memoized { value, depth });
        self.stack.push(Item::Memo(index));
        Ok(())
    }

    fn read_length_i32(&mut self) -> Result<usize, PickleError> {
        let size = self.reader.i32_le()?;
        usize::try_from(size).map_err(|_| self.malformed(&format!("negative length {size}")))
    }

    fn utf8(&self, bytes: &[u8]) -> Result<String, PickleError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| self.malformed("invalid UTF-8"))
    }

    fn pairs(&self, items: Vec<Value>) -> Result<Vec<(Value, Value)>, PickleError> {
        if items.len() % 2 != 0 {
            return Err(self.malformed("odd number of items for a dict"));
        }
        let mut entries = Vec::with_capacity(items.len() / 2);
        let mut items = items.into_iter();
        while let (Some(key), Some(value)) = (items.next(), items.next()) {
            entries.push((key, value));
        }
        Ok(entries)
    }

    fn extend_list(&mut self, items: Vec<Value>) -> Result<(), PickleError> {
        match self.top_mut()? {
            Value::List(list) => {
                list.extend(items);
                Ok(())
            }
            other => {
                let kind = other.kind();
                Err(self.malformed(&format!("cannot append to a {kind}")))
            }
        }
    }

    fn set_items(&mut self, entries: Vec<(Value, Value)>) -> Result<(), PickleError> {
        match self.top_mut()? {
            Value::Dict(dict) => {
                dict.extend(entries);
                Ok(())
            }
            other => {
                let kind = other.kind();
                Err(self.malformed(&format!("cannot set items on a {kind}")))
            }
        }
    }

    fn arguments(&self, args: Value) -> Result<Vec<Value>, PickleError> {
        match args {
            Value::Tuple(items) | Value::List(items) => Ok(items),
            other => Err(self.malformed(&format!("call arguments are a {}", other.kind()))),
        }
    }

    fn call(
        &self,
        callable: Value,
        args: Vec<Value>,
        registry: &ReducerRegistry,
        diagnostics: &mut Diagnostics<'_>,
    ) -> Result<Value, PickleError> {
        match callable {
            Value::Global(name) => function_call(name, args, registry, diagnostics),
            other => Err(self.malformed(&format!("cannot call a {}", other.kind()))),
        }
    }
}

fn top_mut<'s>(
    stack: &'s mut [Item],
    memo: &'s mut HashMap<u32, Memoized>,
) -> Result<&'s mut Value, PickleError> {
    match stack.last_mut() {
        Some(Item::Value(value, _)) => Ok(value),
        Some(Item::Memo(index)) => {
            let index = *index;
            memo.get_mut(&index).map(|entry| &mut entry.value).ok_or_else(|| {
                PickleError::MalformedStream(format!("invalid memo reference {index}"))
            })
        }
        None => Err(PickleError::MalformedStream("stack underflow".to_owned())),
    }
}

const RECONSTRUCTORS: &[&str] = &["copy_reg._reconstructor", "copyreg._reconstructor"];
const BASE_OBJECTS: &[&str] = &["__builtin__.object", "builtins.object"];
const SCALARS: &[&str] = &[
    "numpy.core.multiarray.scalar",
    "numpy._core.multiarray.scalar",
];

/// Dispatches a call to `name` with positional `args`.
///
/// Special cases are matched first: the reconstructor shim, numpy scalars,
/// and the handful of builtins pickle uses to express plain values. Every
/// other name goes through the registry.
pub fn function_call(
    name: String,
    args: Vec<Value>,
    registry: &ReducerRegistry,
    diagnostics: &mut Diagnostics<'_>,
) -> Result<Value, PickleError> {
    let (name, args) = match (name.as_str(), args.as_slice()) {
        (reconstructor, [Value::Global(cls), Value::Global(base), ..])
            if RECONSTRUCTORS.contains(&reconstructor) && BASE_OBJECTS.contains(&base.as_str()) =>
        {
            (cls.clone(), Vec::new())
        }
        _ => (name, args),
    };

    if SCALARS.contains(&name.as_str()) {
        return reducers::scalar(&name, args);
    }
    if let Some(value) = builtin_call(&name, &args)? {
        return Ok(value);
    }

    match registry.resolve(&name) {
        Some(reducer) => {
            debug!(type_name = %name, ?reducer, "reducing");
            let body = reducer.construct(args)?;
            Ok(Value::Object(Box::new(Object::new(name, body))))
        }
        None => {
            warn!(type_name = %name, "no reducer registered");
            diagnostics(PickleError::UnresolvedTypeName(name.clone()));
            Ok(Value::Object(Box::new(Object::unresolved(name))))
        }
    }
}

/// Builtins that rebuild plain values rather than objects.
fn builtin_call(name: &str, args: &[Value]) -> Result<Option<Value>, PickleError> {
    let value = match name {
        // Python 3 writes `bytes` under protocol 2 as `_codecs.encode(text, "latin1")`.
        "_codecs.encode" => match args {
            [text @ Value::Str(_), ..] => text
                .as_bytes()
                .map(|bytes| Value::Bytes(bytes.into()))
                .ok_or_else(|| PickleError::malformed_state(name, "text is not latin-1"))?,
            [Value::Bytes(bytes), ..] => Value::Bytes(Arc::clone(bytes)),
            _ => return Err(PickleError::malformed_state(name, "expected a string argument")),
        },
        "__builtin__.bytearray" | "builtins.bytearray" | "__builtin__.bytes" | "builtins.bytes" => {
            match args {
                [] => Value::Bytes(Arc::from(Vec::new())),
                [value, ..] => Value::Bytes(
                    value
                        .to_shared_bytes()
                        .ok_or_else(|| PickleError::malformed_state(name, "expected bytes"))?,
                ),
            }
        }
        "collections.OrderedDict" => match args {
            [] => Value::Dict(Vec::new()),
            [items] => Value::Dict(
                items
                    .as_sequence()
                    .ok_or_else(|| PickleError::malformed_state(name, "expected a sequence of pairs"))?
                    .iter()
                    .map(|pair| match pair.as_sequence() {
                        Some([key, value]) => Ok((key.clone(), value.clone())),
                        _ => Err(PickleError::malformed_state(name, "expected a key/value pair")),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            _ => return Err(PickleError::malformed_state(name, "too many arguments")),
        },
        "__builtin__.set" | "builtins.set" | "__builtin__.frozenset" | "builtins.frozenset" => {
            let items = match args {
                [] => Vec::new(),
                [items, ..] => items
                    .as_sequence()
                    .ok_or_else(|| PickleError::malformed_state(name, "expected a sequence"))?
                    .to_vec(),
            };
            if name.ends_with("frozenset") {
                Value::FrozenSet(unique::dedup(items))
            } else {
                Value::Set(unique::dedup(items))
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Containers and objects; everything else is a leaf.
fn nests(value: &Value) -> bool {
    matches!(
        value,
        Value::List(_)
            | Value::Tuple(_)
            | Value::Dict(_)
            | Value::Set(_)
            | Value::FrozenSet(_)
            | Value::Object(_)
    )
}

/// Bytes a deep copy of `value` allocates, or `None` once that passes
/// `limit`.
fn footprint(value: &Value, limit: usize) -> Option<usize> {
    let mut total = 0usize;
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        total = total.saturating_add(value.shallow_size());
        if total > limit {
            return None;
        }
        value.extend_children(&mut pending);
    }
    Some(total)
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Two's-complement little-endian integer of arbitrary width.
fn decode_long(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return Some(Value::Int(0));
    }
    if bytes.len() > 16 {
        return None;
    }
    let fill = if bytes[bytes.len() - 1] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 16];
    buf[..bytes.len()].copy_from_slice(bytes);
    let value = i128::from_le_bytes(buf);
    Some(match i64::try_from(value) {
        Ok(v) => Value::Int(v),
        Err(_) => Value::BigInt(value),
    })
}
