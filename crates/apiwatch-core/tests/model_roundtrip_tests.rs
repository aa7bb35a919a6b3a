//! Round-trip laws: serialize→parse is identity, orders survive
//! persistence as a dense bijection, and re-tracing a deterministic
//! client yields the same model modulo call-id renaming.

use std::collections::HashMap;
use std::rc::Rc;

use apiwatch_core::model::ModelTree;
use apiwatch_core::path::{AccessPath, PathComponent};
use apiwatch_core::persist::ModelFile;
use apiwatch_core::tracer::TraceSession;
use apiwatch_script::value::ObjectData;
use apiwatch_script::{Interpreter, PropKey, Value};

fn lib_object(props: Vec<(&str, Value)>) -> Value {
    let object = ObjectData::default();
    for (k, v) in props {
        object.props.borrow_mut().insert(k.to_string(), v);
    }
    Value::Object(Rc::new(object))
}

/// A deterministic client: reads, one call with a primitive argument,
/// one construct, one write.
fn run_client(seed: u64) -> ModelFile {
    let mut interp = Interpreter::new();
    let session = TraceSession::with_seed(seed);
    let lib = session.wrap_root(
        "mylib",
        lib_object(vec![
            ("greet", Value::string("hello")),
            (
                "pad",
                Value::native_fn("pad", |_i, _t, args| {
                    Ok(Value::string(format!(
                        "~{}",
                        args.first().cloned().unwrap_or(Value::Undefined)
                    )))
                }),
            ),
            (
                "Maker",
                Value::native_fn("Maker", |_i, _t, _a| Ok(lib_object(vec![]))),
            ),
        ]),
    );

    interp.get_property(&lib, &PropKey::name("greet")).unwrap();
    let pad = interp.get_property(&lib, &PropKey::name("pad")).unwrap();
    interp
        .call_value(&pad, Value::Undefined, &[Value::string("x")])
        .unwrap();
    let maker = interp.get_property(&lib, &PropKey::name("Maker")).unwrap();
    interp.construct_value(&maker, &[]).unwrap();
    interp
        .set_property(&lib, &PropKey::name("mode"), Value::Bool(true))
        .unwrap();

    let (tree, rho) = session.finish();
    assert!(rho.is_empty());
    ModelFile::from_tree(&tree, rho)
}

/// Rewrite call ids to sequential names in first-appearance order so
/// models from different seeds become comparable.
fn normalize(file: &ModelFile) -> Vec<(AccessPath, String)> {
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut rename = |id: &str| -> String {
        let next = format!("k{}", renames.len());
        renames.entry(id.to_string()).or_insert(next).clone()
    };
    file.paths
        .iter()
        .map(|entry| {
            let components = entry
                .path
                .components()
                .iter()
                .map(|c| match c {
                    PathComponent::Call { call_id } => PathComponent::Call {
                        call_id: apiwatch_core::path::CallId(rename(call_id.as_str())),
                    },
                    PathComponent::New { call_id } => PathComponent::New {
                        call_id: apiwatch_core::path::CallId(rename(call_id.as_str())),
                    },
                    PathComponent::Arg { call_id, arg_id } => PathComponent::Arg {
                        call_id: apiwatch_core::path::CallId(rename(call_id.as_str())),
                        arg_id: *arg_id,
                    },
                    other => other.clone(),
                })
                .collect();
            (
                AccessPath::from_components(components),
                entry.tag.name().to_string(),
            )
        })
        .collect()
}

#[test]
fn serialize_then_parse_is_identity() {
    let model = run_client(1);
    let json = model.to_json().unwrap();
    let back = ModelFile::from_json(&json).unwrap();
    assert_eq!(back, model);

    // Stability: a second serialization is byte-identical.
    assert_eq!(back.to_json().unwrap(), json);
}

#[test]
fn orders_survive_persistence_as_dense_bijection() {
    let model = run_client(2);
    let tree = ModelTree::from_model(&model).unwrap();
    let mut orders: Vec<u32> = model.paths.iter().map(|p| p.order).collect();
    let expected: Vec<u32> = (0..model.paths.len() as u32).collect();
    assert_eq!(orders, expected);

    // And the reconstructed tree schedules them identically.
    orders = tree
        .schedule()
        .into_iter()
        .map(|id| tree.node(id).order)
        .collect();
    assert_eq!(orders, expected);
}

#[test]
fn retracing_yields_same_model_modulo_call_id_renaming() {
    let a = run_client(11);
    let b = run_client(99);
    // Raw models differ (fresh call ids)…
    assert_ne!(a, b);
    // …but normalize to the same shape.
    assert_eq!(normalize(&a), normalize(&b));
}
