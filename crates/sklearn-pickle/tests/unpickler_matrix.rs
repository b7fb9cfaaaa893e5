mod common;

use common::{le_bytes_f32, Pickle};
use sklearn_pickle::reducers::{ArrayLayout, Reduced};
use sklearn_pickle::tensor::DataType;
use sklearn_pickle::unpickler::opcodes as op;
use sklearn_pickle::{loads, PickleError, ReducerRegistry, Unpickler, Value};

fn load(data: &[u8]) -> Result<Value, PickleError> {
    loads(data, &ReducerRegistry::new())
}

fn load_with_diagnostics(data: &[u8]) -> (Result<Value, PickleError>, Vec<PickleError>) {
    let mut diagnostics = Vec::new();
    let result = Unpickler::new(data).load(&ReducerRegistry::new(), &mut |error| {
        diagnostics.push(error)
    });
    (result, diagnostics)
}

fn s(text: &str) -> Value {
    Value::Str(text.into())
}

#[test]
fn protocol_0_text_stream() {
    // pickle.dumps({'a': [1, 2.5, None], 'b': (True, 'x')}, protocol=0)
    let data = b"(dp0\nVa\np1\n(lp2\nI1\naF2.5\naNasVb\np3\n(I01\nVx\np4\ntp5\ns.";
    assert_eq!(
        load(data).unwrap(),
        Value::Dict(vec![
            (
                s("a"),
                Value::List(vec![Value::Int(1), Value::Float(2.5), Value::None])
            ),
            (s("b"), Value::Tuple(vec![Value::Bool(true), s("x")])),
        ])
    );
}

#[test]
fn protocol_4_framed_stream() {
    // pickle.dumps(['ab', 'ab', 300, -2], protocol=4): the second string is
    // a memo back-reference.
    let mut data = vec![op::PROTO, 4, op::FRAME];
    let body: &[u8] = &[
        op::EMPTY_LIST,
        op::MEMOIZE,
        op::MARK,
        op::SHORT_BINUNICODE,
        2,
        b'a',
        b'b',
        op::MEMOIZE,
        op::BINGET,
        1,
        op::BININT2,
        0x2c,
        0x01,
        op::BININT,
        0xfe,
        0xff,
        0xff,
        0xff,
        op::APPENDS,
        op::STOP,
    ];
    data.extend_from_slice(&(body.len() as u64).to_le_bytes());
    data.extend_from_slice(body);
    assert_eq!(
        load(&data).unwrap(),
        Value::List(vec![s("ab"), s("ab"), Value::Int(300), Value::Int(-2)])
    );
}

#[test]
fn stack_global_and_newobj() {
    let data = Pickle::proto(4)
        .str("sklearn.naive_bayes")
        .str("GaussianNB")
        .op(op::STACK_GLOBAL)
        .op(op::EMPTY_TUPLE)
        .op(op::NEWOBJ)
        .empty_dict()
        .str("var_smoothing")
        .float(1e-9)
        .op(op::SETITEM)
        .build()
        .stop();
    let value = load(&data).unwrap();
    let obj = value.as_object().unwrap();
    assert_eq!(obj.type_name, "sklearn.naive_bayes.GaussianNB");
    assert_eq!(obj.field("var_smoothing"), Some(Value::Float(1e-9)));
}

#[test]
fn reconstructor_is_rewritten_for_both_spellings() {
    for (module, base) in [("copy_reg", "__builtin__"), ("copyreg", "builtins")] {
        let data = Pickle::proto(2)
            .global(module, "_reconstructor")
            .global("sklearn.svm.classes", "SVC")
            .global(base, "object")
            .none()
            .op(op::TUPLE3)
            .reduce()
            .stop();
        let (value, diagnostics) = load_with_diagnostics(&data);
        let value = value.unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.type_name, "sklearn.svm.classes.SVC");
        assert!(obj.is_resolved());
        assert!(diagnostics.is_empty());
    }
}

#[test]
fn joblib_wrapper_reads_payload_from_stream() {
    let payload = le_bytes_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let data = Pickle::proto(2)
        .wrapper("f4", &[2, 3], &payload)
        .stop();
    let value = load(&data).unwrap();
    let obj = value.as_object().unwrap();
    let Reduced::Array(array) = &obj.body else {
        panic!("expected an array, got {:?}", obj.body);
    };
    assert_eq!(array.layout, ArrayLayout::Wrapper);
    assert_eq!(array.shape, [2, 3]);
    assert_eq!(&array.data[..], &payload[..]);
    assert_eq!(array.order.as_deref(), Some("C"));
    assert_eq!(array.tensor_type().unwrap().to_string(), "float32[2,3]");
}

#[test]
fn joblib_alignment_padding_is_skipped() {
    let payload = 7i64.to_le_bytes();
    let data = Pickle::proto(2)
        .instance("joblib.numpy_pickle", "NumpyArrayWrapper")
        .empty_dict()
        .mark()
        .str("dtype")
        .dtype("i8")
        .str("shape")
        .shape(&[1])
        .str("numpy_array_alignment_bytes")
        .int(16)
        .setitems()
        .build()
        .raw(&[3, 0xaa, 0xaa, 0xaa])
        .raw(&payload)
        .stop();
    let value = load(&data).unwrap();
    let Reduced::Array(array) = &value.as_object().unwrap().body else {
        panic!("expected an array");
    };
    assert_eq!(&array.data[..], &payload[..]);
}

#[test]
fn numpy_reconstruct_keeps_inline_data() {
    let payload = le_bytes_f32(&[0.5, -0.5]);
    let data = Pickle::proto(2)
        .reconstruct("f4", &[2], &payload)
        .stop();
    let value = load(&data).unwrap();
    let Reduced::Array(array) = &value.as_object().unwrap().body else {
        panic!("expected an array");
    };
    assert_eq!(array.layout, ArrayLayout::Reconstruct);
    assert_eq!(array.version, Some(1));
    assert_eq!(&array.data[..], &payload[..]);
    assert_eq!(
        array.dtype.as_ref().and_then(|dt| dt.data_type()),
        Some(DataType::Float32)
    );
}

#[test]
fn int64_scalar_is_a_bare_value() {
    let data = Pickle::proto(2)
        .global("numpy.core.multiarray", "scalar")
        .dtype("i8")
        .bytes(&5i64.to_le_bytes())
        .op(op::TUPLE2)
        .reduce()
        .stop();
    assert_eq!(load(&data).unwrap(), Value::Int(5));
}

#[test]
fn float_scalar_is_an_unknown_data_type() {
    let data = Pickle::proto(2)
        .global("numpy.core.multiarray", "scalar")
        .dtype("f8")
        .bytes(&1.5f64.to_le_bytes())
        .op(op::TUPLE2)
        .reduce()
        .stop();
    assert_eq!(
        load(&data),
        Err(PickleError::UnknownDataType("float64".into()))
    );
}

#[test]
fn dtype_codes_and_state() {
    for code in ["i4", "i8", "f4", "f8", "V8"] {
        let data = Pickle::proto(2).dtype(code).stop();
        assert!(load(&data).is_ok(), "{code}");
    }

    let data = Pickle::proto(2)
        .global("numpy", "dtype")
        .binstring(b"O8")
        .op(op::TUPLE1)
        .reduce()
        .stop();
    assert_eq!(load(&data), Err(PickleError::UnknownDataType("O8".into())));

    let data = Pickle::proto(2)
        .global("numpy", "dtype")
        .binstring(b"f4")
        .op(op::TUPLE1)
        .reduce()
        .mark()
        .int(3)
        .binstring(b"<")
        .tuple()
        .build()
        .stop();
    assert_eq!(load(&data), Err(PickleError::MalformedDescriptorState(2)));
}

#[test]
fn unknown_type_name_is_a_diagnostic() {
    let data = Pickle::proto(2)
        .instance("sklearn.pipeline", "Pipeline")
        .empty_dict()
        .str("steps")
        .op(op::EMPTY_LIST)
        .op(op::SETITEM)
        .build()
        .stop();
    let (value, diagnostics) = load_with_diagnostics(&data);
    let value = value.unwrap();
    let obj = value.as_object().unwrap();
    assert_eq!(obj.type_name, "sklearn.pipeline.Pipeline");
    assert!(!obj.is_resolved());
    assert!(obj.fields().is_empty());
    assert_eq!(
        diagnostics,
        [PickleError::UnresolvedTypeName(
            "sklearn.pipeline.Pipeline".into()
        )]
    );
    assert!(!diagnostics[0].is_fatal());
    assert_eq!(diagnostics[0].to_string(), "unknown function 'sklearn.pipeline.Pipeline'");
}

#[test]
fn builtin_value_constructors() {
    let data = Pickle::proto(2)
        .mark()
        .global("_codecs", "encode")
        .str("\u{0}\u{ff}")
        .str("latin1")
        .op(op::TUPLE2)
        .reduce()
        .global("collections", "OrderedDict")
        .op(op::EMPTY_LIST)
        .mark()
        .str("k")
        .int(1)
        .tuple()
        .op(op::APPEND)
        .op(op::TUPLE1)
        .reduce()
        .global("__builtin__", "set")
        .mark()
        .int(1)
        .int(1)
        .int(2)
        .op(op::LIST)
        .op(op::TUPLE1)
        .reduce()
        .tuple()
        .stop();
    assert_eq!(
        load(&data).unwrap(),
        Value::Tuple(vec![
            Value::Bytes(vec![0u8, 255].into()),
            Value::Dict(vec![(s("k"), Value::Int(1))]),
            Value::Set(vec![Value::Int(1), Value::Int(2)]),
        ])
    );
}

#[test]
fn sets_and_frozensets() {
    let data = Pickle::proto(4)
        .mark()
        .op(op::EMPTY_SET)
        .mark()
        .int(1)
        .int(2)
        .int(1)
        .op(op::ADDITEMS)
        .mark()
        .str("a")
        .op(op::FROZENSET)
        .tuple()
        .stop();
    assert_eq!(
        load(&data).unwrap(),
        Value::Tuple(vec![
            Value::Set(vec![Value::Int(1), Value::Int(2)]),
            Value::FrozenSet(vec![s("a")]),
        ])
    );
}

#[test]
fn wide_integers() {
    let data = Pickle::proto(2)
        .mark()
        .op(op::LONG1)
        .raw(&[9, 0, 0, 0, 0, 0, 0, 0, 0, 1])
        .op(op::LONG1)
        .raw(&[2, 0x00, 0x80])
        .op(op::LONG4)
        .raw(&0i32.to_le_bytes())
        .tuple()
        .stop();
    assert_eq!(
        load(&data).unwrap(),
        Value::Tuple(vec![
            Value::BigInt(1 << 64),
            Value::Int(-32768),
            Value::Int(0)
        ])
    );

    let mut too_wide = vec![op::PROTO, 2, op::LONG1, 17];
    too_wide.extend([0u8; 17]);
    too_wide.push(op::STOP);
    assert!(matches!(load(&too_wide), Err(PickleError::MalformedStream(_))));
}

#[test]
fn memoized_objects_observe_build() {
    // The estimator is memoized before BUILD; the back-reference taken
    // afterwards sees the restored state.
    let data = Pickle::proto(2)
        .mark()
        .instance("sklearn.svm.classes", "SVC")
        .put(0)
        .empty_dict()
        .str("C")
        .float(2.0)
        .op(op::SETITEM)
        .build()
        .op(op::POP)
        .get(0)
        .tuple()
        .stop();
    let value = load(&data).unwrap();
    let items = value.as_sequence().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].as_object().unwrap().field("C"),
        Some(Value::Float(2.0))
    );
}

#[test]
fn inst_and_obj_calls() {
    let data = Pickle::new()
        .mark()
        .mark()
        .op(op::INST)
        .raw(b"sklearn.tree.tree\nDecisionTreeClassifier\n")
        .mark()
        .global("sklearn.svm.classes", "SVC")
        .op(op::OBJ)
        .tuple()
        .stop();
    let value = load(&data).unwrap();
    let names: Vec<_> = value
        .as_sequence()
        .unwrap()
        .iter()
        .map(|item| item.as_object().unwrap().type_name.clone())
        .collect();
    assert_eq!(
        names,
        [
            "sklearn.tree.tree.DecisionTreeClassifier",
            "sklearn.svm.classes.SVC"
        ]
    );
}

#[test]
fn tree_state_is_restored() {
    let data = Pickle::proto(2)
        .global("sklearn.tree._tree", "Tree")
        .int(4)
        .global("numpy.core.multiarray", "_reconstruct")
        .global("numpy", "ndarray")
        .mark()
        .int(0)
        .tuple()
        .binstring(b"b")
        .op(op::TUPLE3)
        .reduce()
        .int(1)
        .op(op::TUPLE3)
        .reduce()
        .empty_dict()
        .mark()
        .str("max_depth")
        .int(3)
        .str("node_count")
        .int(5)
        .setitems()
        .build()
        .stop();
    let value = load(&data).unwrap();
    let obj = value.as_object().unwrap();
    assert_eq!(obj.field("n_features"), Some(Value::Int(4)));
    assert_eq!(obj.field("n_outputs"), Some(Value::Int(1)));
    assert_eq!(obj.field("max_depth"), Some(Value::Int(3)));
    assert_eq!(obj.field("node_count"), Some(Value::Int(5)));
}

#[test]
fn fatal_stream_errors() {
    let cases: &[(&[u8], &str)] = &[
        (&b"0."[..], "stack underflow"),
        (&b"h\x05."[..], "invalid memo reference 5"),
        (&b"NN."[..], "STOP with 2 items"),
        (&b"(N."[..], "unclosed MARK"),
        (&b"\x80\x02\xff"[..], "unknown opcode 0xff at offset 2"),
        (&b"\x80\x02Q."[..], "unsupported opcode BINPERSID"),
        (&b"\x80\x03\x82\x01."[..], "unsupported opcode EXT1"),
        (&b"NNb."[..], "BUILD target is a none"),
        (&b"NN\x85R."[..], "cannot call a none"),
    ];
    for (data, needle) in cases {
        match load(data) {
            Err(PickleError::MalformedStream(message)) => {
                assert!(message.contains(needle), "{message:?} lacks {needle:?}")
            }
            other => panic!("{data:?}: expected MalformedStream, got {other:?}"),
        }
    }
}

#[test]
fn truncated_stream_is_fatal() {
    let payload = le_bytes_f32(&[1.0, 2.0]);
    let data = Pickle::proto(2).wrapper("f4", &[2], &payload).stop();
    for cut in [1, data.len() / 2, data.len() - 5, data.len() - 1] {
        assert!(
            matches!(load(&data[..cut]), Err(PickleError::UnexpectedEndOfStream(_))),
            "cut at {cut}"
        );
    }
}

#[test]
fn loading_stops_at_stop() {
    let mut data = Pickle::new().none().stop();
    data.extend_from_slice(b"trailing");
    let mut unpickler = Unpickler::new(&data);
    let value = unpickler.load(&ReducerRegistry::new(), &mut |_| {}).unwrap();
    assert_eq!(value, Value::None);
    assert_eq!(unpickler.position(), 2);
}

/// `memo[i] = [memo[i - 1], memo[i - 1]]`, then `memo[levels]` is loaded.
fn doubling_memo(levels: u8) -> Vec<u8> {
    let mut pickle = Pickle::proto(2).none().put(0).op(op::POP);
    for i in 1..=levels {
        pickle = pickle
            .mark()
            .get(i - 1)
            .get(i - 1)
            .op(op::LIST)
            .put(i)
            .op(op::POP);
    }
    pickle.get(levels).stop()
}

fn leaves(value: &Value) -> usize {
    match value {
        Value::List(items) => items.iter().map(leaves).sum(),
        _ => 1,
    }
}

#[test]
fn repeated_memo_references_are_copied() {
    let value = load(&doubling_memo(10)).unwrap();
    assert_eq!(leaves(&value), 1 << 10);
}

#[test]
fn exponential_memo_copies_are_rejected() {
    let data = doubling_memo(40);
    assert!(data.len() < 400);
    match load(&data) {
        Err(PickleError::MalformedStream(message)) => {
            assert!(message.contains("copies of memoized values exceed"), "{message}")
        }
        other => panic!("expected MalformedStream, got {other:?}"),
    }
}

#[test]
fn nesting_up_to_the_limit_loads() {
    use sklearn_pickle::unpickler::MAX_NESTING;

    let mut data = vec![op::EMPTY_LIST; MAX_NESTING];
    data.extend(vec![op::APPEND; MAX_NESTING - 1]);
    data.push(op::STOP);
    let mut value = &load(&data).unwrap();
    let mut depth = 1;
    while let Value::List(items) = value {
        match items.as_slice() {
            [inner] => {
                value = inner;
                depth += 1;
            }
            [] => break,
            _ => panic!("unexpected list {items:?}"),
        }
    }
    assert_eq!(depth, MAX_NESTING);
}

#[test]
fn deep_nesting_is_rejected() {
    let n = 200_000;
    let mut data = vec![op::EMPTY_LIST; n];
    data.extend(vec![op::APPEND; n - 1]);
    data.push(op::STOP);
    match load(&data) {
        Err(PickleError::MalformedStream(message)) => {
            assert!(message.contains("nesting too deep"), "{message}")
        }
        other => panic!("expected MalformedStream, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn deep_nesting_through_the_memo_is_rejected() {
    // x = []; repeatedly x = [x], memoizing every level under index 0
    let mut pickle = Pickle::proto(2).op(op::EMPTY_LIST).put(0).op(op::POP);
    for _ in 0..300 {
        pickle = pickle.mark().get(0).op(op::LIST).put(0).op(op::POP);
    }
    let data = pickle.get(0).stop();
    assert!(matches!(
        load(&data),
        Err(PickleError::MalformedStream(message)) if message.contains("nesting too deep")
    ));
}

#[test]
fn repeated_dict_keys_keep_the_first_position_and_the_last_value() {
    // d = {}; d['a'] = 1; d['b'] = 2; d['a'] = 3
    let data = Pickle::proto(2)
        .empty_dict()
        .str("a")
        .int(1)
        .op(op::SETITEM)
        .str("b")
        .int(2)
        .op(op::SETITEM)
        .str("a")
        .int(3)
        .op(op::SETITEM)
        .stop();
    assert_eq!(
        load(&data).unwrap(),
        Value::Dict(vec![(s("a"), Value::Int(3)), (s("b"), Value::Int(2))])
    );
}

#[test]
fn large_dicts_with_overwrites_load() {
    let n = 40_000;
    let mut pickle = Pickle::proto(2).empty_dict().mark();
    for round in 0..2 {
        for key in 0..n {
            pickle = pickle.int(key).int(key * 2 + round);
        }
    }
    let data = pickle.setitems().stop();
    let Value::Dict(entries) = load(&data).unwrap() else {
        panic!("expected a dict");
    };
    assert_eq!(entries.len(), n as usize);
    assert_eq!(entries[10], (Value::Int(10), Value::Int(21)));
}

#[test]
fn sets_drop_repeated_items() {
    let data = Pickle::proto(4)
        .op(op::EMPTY_SET)
        .mark()
        .int(1)
        .str("x")
        .int(1)
        .op(op::ADDITEMS)
        .mark()
        .str("x")
        .int(2)
        .op(op::ADDITEMS)
        .stop();
    assert_eq!(
        load(&data).unwrap(),
        Value::Set(vec![Value::Int(1), s("x"), Value::Int(2)])
    );
}
