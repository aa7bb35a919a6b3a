//! # Host Bridge
//!
//! Presents a mediated module loader to client programs: a `require`
//! that behaves like the host's own resolution — relative specifiers
//! with extension fall-through, bare specifiers via a parent
//! `node_modules` walk honouring `package.json` entry points — except
//! that asking for the subject library returns a tracer-wrapped root.
//! Every other module is resolved and returned unmodified.
//!
//! The bridge also drives client execution: plain mode runs each source
//! file with `require`/`module` in scope; test mode additionally
//! provides synchronous `describe`/`it` shims. Client failures are
//! logged and never abort the run — a partial model is still a model.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use apiwatch_script::value::ObjectData;
use apiwatch_script::{parse, EvalError, Interpreter, PropKey, Value};

use crate::replay::LibrarySource;
use crate::tracer::TraceSession;

/// Bridge configuration for one run.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Name of the subject library: the one specifier that gets wrapped.
    pub library: String,
    /// Package directory override; when absent the library is found via
    /// the `node_modules` walk like any other bare specifier.
    pub lib_path: Option<PathBuf>,
    /// Base directory for resolution when no client file provides one
    /// (the replay phase).
    pub resolve_root: PathBuf,
    /// Provide `describe`/`it` shims to clients.
    pub test_mode: bool,
}

impl BridgeConfig {
    pub fn new(library: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            lib_path: None,
            resolve_root: PathBuf::from("."),
            test_mode: false,
        }
    }

    pub fn with_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lib_path = Some(path.into());
        self
    }

    pub fn with_resolve_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolve_root = path.into();
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }
}

/// Outcome of running a batch of client files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientRunSummary {
    pub executed: usize,
    pub failed: usize,
}

pub struct HostBridge {
    inner: Rc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    /// Raw module cache: modules are loaded once per run.
    cache: RefCell<HashMap<PathBuf, Value>>,
    /// Modules currently evaluating, for cycle detection.
    loading: RefCell<HashSet<PathBuf>>,
}

impl HostBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            inner: Rc::new(BridgeInner {
                config,
                cache: RefCell::new(HashMap::new()),
                loading: RefCell::new(HashSet::new()),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Resolve and load the subject library without wrapping.
    pub fn load_library_raw(&self, interp: &mut Interpreter) -> Result<Value> {
        let name = self.inner.config.library.clone();
        let root = self.inner.config.resolve_root.clone();
        let path = self.inner.resolve(&name, &root)?;
        self.inner.load_module_raw(interp, &path)
    }

    /// Execute every client file under tracing. Client errors are
    /// logged; the summary says how many files failed.
    pub fn execute_clients(
        &self,
        interp: &mut Interpreter,
        session: &TraceSession,
        clients: &[PathBuf],
    ) -> Result<ClientRunSummary> {
        let wrapped_root: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let mut summary = ClientRunSummary::default();
        for client in clients {
            summary.executed += 1;
            if let Err(e) = self.run_client(interp, session, client, &wrapped_root) {
                warn!(client = %client.display(), error = %e, "client execution failed");
                summary.failed += 1;
            }
        }
        Ok(summary)
    }

    fn run_client(
        &self,
        interp: &mut Interpreter,
        session: &TraceSession,
        client: &Path,
        wrapped_root: &Rc<RefCell<Option<Value>>>,
    ) -> Result<()> {
        let source = fs::read_to_string(client)
            .with_context(|| format!("reading client {}", client.display()))?;
        let program =
            parse(&source).map_err(|e| anyhow!("parsing client {}: {}", client.display(), e))?;
        let client_dir = client
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let require = self
            .inner
            .traced_require(session.clone(), client_dir, wrapped_root.clone());
        let module = make_module_object();
        let mut bindings = vec![
            ("require".to_string(), require),
            ("module".to_string(), module),
        ];
        if self.inner.config.test_mode {
            bindings.push(("describe".to_string(), suite_shim("describe")));
            bindings.push(("it".to_string(), suite_shim("it")));
        }

        debug!(client = %client.display(), "executing client");
        interp
            .run_with_bindings(&program, bindings)
            .map_err(|e| anyhow!("running client {}: {}", client.display(), e))
    }
}

/// Replay-side loading: the new library version, unwrapped.
impl LibrarySource for HostBridge {
    fn load(&mut self, interp: &mut Interpreter, module_name: &str) -> Result<Value> {
        if module_name == self.inner.config.library {
            return self.load_library_raw(interp);
        }
        let root = self.inner.config.resolve_root.clone();
        let path = self.inner.resolve(module_name, &root)?;
        self.inner.load_module_raw(interp, &path)
    }
}

impl BridgeInner {
    /// Mirror of the host resolution convention.
    fn resolve(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf> {
        if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
        {
            let base = from_dir.join(specifier);
            return resolve_file(&base)
                .ok_or_else(|| anyhow!("cannot resolve '{}' from {}", specifier, from_dir.display()));
        }

        // The subject library may live outside any node_modules tree.
        if specifier == self.config.library {
            if let Some(lib_path) = &self.config.lib_path {
                return resolve_package(lib_path);
            }
        }

        let mut dir = Some(from_dir.to_path_buf());
        while let Some(current) = dir {
            let candidate = current.join("node_modules").join(specifier);
            if candidate.is_dir() {
                return resolve_package(&candidate);
            }
            dir = current.parent().map(Path::to_path_buf);
        }
        bail!(
            "cannot resolve module '{}' from {}",
            specifier,
            from_dir.display()
        )
    }

    /// Load a module file, evaluating it once and caching its exports.
    fn load_module_raw(self: &Rc<Self>, interp: &mut Interpreter, path: &Path) -> Result<Value> {
        let canonical = fs::canonicalize(path)
            .with_context(|| format!("canonicalizing module path {}", path.display()))?;
        if let Some(cached) = self.cache.borrow().get(&canonical) {
            return Ok(cached.clone());
        }
        if !self.loading.borrow_mut().insert(canonical.clone()) {
            bail!("circular module dependency at {}", canonical.display());
        }

        let result = self.eval_module(interp, &canonical);
        self.loading.borrow_mut().remove(&canonical);
        let exports = result?;
        self.cache
            .borrow_mut()
            .insert(canonical, exports.clone());
        Ok(exports)
    }

    fn eval_module(self: &Rc<Self>, interp: &mut Interpreter, path: &Path) -> Result<Value> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading module {}", path.display()))?;
        let program =
            parse(&source).map_err(|e| anyhow!("parsing module {}: {}", path.display(), e))?;
        let module_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let module = make_module_object();
        let require = self.raw_require(module_dir);
        interp
            .run_with_bindings(
                &program,
                vec![
                    ("require".to_string(), require),
                    ("module".to_string(), module.clone()),
                ],
            )
            .map_err(|e| anyhow!("evaluating module {}: {}", path.display(), e))?;

        interp
            .get_property(&module, &PropKey::name("exports"))
            .map_err(|e| anyhow!("reading exports of {}: {}", path.display(), e))
    }

    /// A `require` for library/dependency internals: no wrapping.
    fn raw_require(self: &Rc<Self>, from_dir: PathBuf) -> Value {
        let inner = self.clone();
        Value::native_fn("require", move |interp, _this, args| {
            let specifier = require_specifier(args)?;
            let path = inner
                .resolve(&specifier, &from_dir)
                .map_err(|e| EvalError::Thrown(Value::error(e.to_string())))?;
            inner
                .load_module_raw(interp, &path)
                .map_err(|e| EvalError::Thrown(Value::error(e.to_string())))
        })
    }

    /// The client-facing loader: the subject library comes back wrapped,
    /// everything else resolves normally.
    fn traced_require(
        self: &Rc<Self>,
        session: TraceSession,
        from_dir: PathBuf,
        wrapped_root: Rc<RefCell<Option<Value>>>,
    ) -> Value {
        let inner = self.clone();
        Value::native_fn("require", move |interp, _this, args| {
            let specifier = require_specifier(args)?;
            if specifier == inner.config.library {
                if let Some(existing) = wrapped_root.borrow().clone() {
                    return Ok(existing);
                }
                let path = inner
                    .resolve(&specifier, &from_dir)
                    .map_err(|e| EvalError::Thrown(Value::error(e.to_string())))?;
                let library = inner
                    .load_module_raw(interp, &path)
                    .map_err(|e| EvalError::Thrown(Value::error(e.to_string())))?;
                let wrapped = session.wrap_root(&specifier, library);
                *wrapped_root.borrow_mut() = Some(wrapped.clone());
                return Ok(wrapped);
            }
            let path = inner
                .resolve(&specifier, &from_dir)
                .map_err(|e| EvalError::Thrown(Value::error(e.to_string())))?;
            inner
                .load_module_raw(interp, &path)
                .map_err(|e| EvalError::Thrown(Value::error(e.to_string())))
        })
    }
}

fn require_specifier(args: &[Value]) -> Result<String, EvalError> {
    match args.first() {
        Some(Value::Str(s)) => Ok(s.to_string()),
        other => Err(EvalError::type_error(format!(
            "require expects a module name string, got {}",
            other.map(|v| v.type_of()).unwrap_or("nothing")
        ))),
    }
}

fn make_module_object() -> Value {
    let module = ObjectData::default();
    module
        .props
        .borrow_mut()
        .insert("exports".to_string(), Value::object());
    Value::Object(Rc::new(module))
}

/// Synchronous test-framework shim: run the suite/case body now.
fn suite_shim(kind: &'static str) -> Value {
    Value::builtin_fn(kind, move |interp, _this, args| {
        let name = args
            .first()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<unnamed>".to_string());
        let callback = args.get(1).cloned().unwrap_or(Value::Undefined);
        if !callback.is_callable() {
            return Ok(Value::Undefined);
        }
        debug!(kind, name = %name, "running test shim");
        if let Err(e) = interp.call_value(&callback, Value::Undefined, &[]) {
            warn!(kind, name = %name, error = %e, "test body failed");
        }
        Ok(Value::Undefined)
    })
}

/// Resolve a path with `.js`/`.cjs` extension fall-through.
fn resolve_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    for ext in ["js", "cjs"] {
        let mut candidate = base.as_os_str().to_owned();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Resolve a package directory to its entry file via `package.json`
/// `main`, defaulting to `index.js`.
fn resolve_package(dir: &Path) -> Result<PathBuf> {
    let manifest = dir.join("package.json");
    let entry = if manifest.is_file() {
        let text = fs::read_to_string(&manifest)
            .with_context(|| format!("reading {}", manifest.display()))?;
        let parsed: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", manifest.display()))?;
        parsed
            .get("main")
            .and_then(|m| m.as_str())
            .unwrap_or("index.js")
            .to_string()
    } else {
        "index.js".to_string()
    };
    resolve_file(&dir.join(&entry))
        .ok_or_else(|| anyhow!("package {} has no entry file {}", dir.display(), entry))
}

/// Enumerate client files: a single file, or every `*.js` directly in a
/// directory, in sorted order.
pub fn discover_clients(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("client path {} does not exist", path.display());
    }
    let mut clients: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("listing clients in {}", path.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "js").unwrap_or(false))
        .collect();
    clients.sort();
    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn resolves_relative_with_extension_fallthrough() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("helper.js"), "module.exports = 1;");
        let bridge = HostBridge::new(BridgeConfig::new("mylib"));
        let resolved = bridge.inner.resolve("./helper", dir.path()).unwrap();
        assert!(resolved.ends_with("helper.js"));
    }

    #[test]
    fn resolves_bare_specifier_through_node_modules_walk() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        write(
            &dir.path().join("node_modules/mylib/package.json"),
            r#"{"name": "mylib", "main": "lib/entry.js"}"#,
        );
        write(
            &dir.path().join("node_modules/mylib/lib/entry.js"),
            "module.exports = {};",
        );
        let bridge = HostBridge::new(BridgeConfig::new("mylib"));
        let resolved = bridge.inner.resolve("mylib", &nested).unwrap();
        assert!(resolved.ends_with("node_modules/mylib/lib/entry.js"));
    }

    #[test]
    fn package_without_manifest_defaults_to_index() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("node_modules/plain/index.js"),
            "module.exports = {};",
        );
        let bridge = HostBridge::new(BridgeConfig::new("mylib"));
        let resolved = bridge.inner.resolve("plain", dir.path()).unwrap();
        assert!(resolved.ends_with("node_modules/plain/index.js"));
    }

    #[test]
    fn loads_module_exports_once() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("counting.js");
        write(&module, "module.exports = { n: 1 };");
        let bridge = HostBridge::new(BridgeConfig::new("mylib"));
        let mut interp = Interpreter::new();

        let first = bridge
            .inner
            .load_module_raw(&mut interp, &module)
            .unwrap();
        let second = bridge
            .inner
            .load_module_raw(&mut interp, &module)
            .unwrap();
        assert!(first.strict_eq(&second), "module cache must return the same value");
    }

    #[test]
    fn module_requires_its_own_dependencies_raw() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("pkg/dep.js"), "module.exports = 41;");
        write(
            &dir.path().join("pkg/index.js"),
            "var dep = require('./dep'); module.exports = { answer: dep + 1 };",
        );
        let bridge = HostBridge::new(BridgeConfig::new("mylib"));
        let mut interp = Interpreter::new();
        let exports = bridge
            .inner
            .load_module_raw(&mut interp, &dir.path().join("pkg/index.js"))
            .unwrap();
        let answer = interp
            .get_property(&exports, &PropKey::name("answer"))
            .unwrap();
        assert!(matches!(answer, Value::Num(n) if n == 42.0));
    }

    #[test]
    fn discovers_sorted_js_clients() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("b.js"), "");
        write(&dir.path().join("a.js"), "");
        write(&dir.path().join("notes.txt"), "");
        let clients = discover_clients(dir.path()).unwrap();
        let names: Vec<_> = clients
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.js", "b.js"]);
    }

    #[test]
    fn client_errors_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("node_modules/mylib/index.js"),
            "module.exports = { greet: 'hello' };",
        );
        write(&dir.path().join("clients/bad.js"), "this is not ( valid");
        write(
            &dir.path().join("clients/good.js"),
            "var lib = require('mylib'); var g = lib.greet;",
        );

        let bridge = HostBridge::new(BridgeConfig::new("mylib"));
        let session = TraceSession::with_seed(1);
        let mut interp = Interpreter::new();
        let clients = discover_clients(&dir.path().join("clients")).unwrap();
        let summary = bridge
            .execute_clients(&mut interp, &session, &clients)
            .unwrap();

        assert_eq!(summary.executed, 2);
        assert_eq!(summary.failed, 1);
        // The good client still produced a model.
        assert!(session.recorded_len() >= 2);
    }
}
