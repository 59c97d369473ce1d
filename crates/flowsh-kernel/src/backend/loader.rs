//! Filesystem module loader for the import stage.
//!
//! Paths starting with `./`, `../` or `/` resolve against the working
//! directory. Bare names are searched for in `<cwd>/flowsh_modules/` and then
//! in each configured module directory. A name may omit its extension.
//!
//! `.json`, `.yaml`/`.yml` and `.toml` files are data modules. Anything else
//! is an expression module: its text is compiled and evaluated once with no
//! bindings, and the result is the module value.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use flowsh_types::{EmptyBindings, ExpressionEngine, Value};

use super::{Decoder, Format, LoadError, ModuleLoader};

/// Directory searched for bare module names, relative to the working directory.
pub const MODULES_DIR: &str = "flowsh_modules";

const EXTENSIONS: &[&str] = &["flow", "json", "yaml", "yml", "toml"];

pub struct FsModuleLoader {
    cwd: PathBuf,
    module_dirs: Vec<PathBuf>,
    engine: Arc<dyn ExpressionEngine>,
    decoder: Arc<dyn Decoder>,
}

impl FsModuleLoader {
    pub fn new(
        cwd: impl Into<PathBuf>,
        module_dirs: Vec<PathBuf>,
        engine: Arc<dyn ExpressionEngine>,
        decoder: Arc<dyn Decoder>,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            module_dirs,
            engine,
            decoder,
        }
    }

    fn search_roots(&self, spec: &str) -> Vec<PathBuf> {
        let explicit =
            spec.starts_with("./") || spec.starts_with("../") || Path::new(spec).is_absolute();
        if explicit {
            vec![self.cwd.clone()]
        } else {
            std::iter::once(self.cwd.join(MODULES_DIR))
                .chain(self.module_dirs.iter().map(|dir| self.cwd.join(dir)))
                .collect()
        }
    }

    /// Find the file `spec` refers to.
    pub async fn resolve(&self, spec: &str) -> Option<PathBuf> {
        for root in self.search_roots(spec) {
            for candidate in candidates(&root.join(spec)) {
                if is_file(&candidate).await {
                    return Some(candidate);
                }
            }
        }
        None
    }

    async fn evaluate_module(&self, spec: &str, text: &str) -> Result<Value, LoadError> {
        let to_err = |source| LoadError::Evaluation {
            module: spec.to_string(),
            source,
        };
        let expr = self.engine.compile(text.trim(), &[]).map_err(to_err)?;
        expr.eval(Arc::new(EmptyBindings), Vec::new()).await.map_err(to_err)
    }
}

fn candidates(base: &Path) -> Vec<PathBuf> {
    let mut out = vec![base.to_path_buf()];
    for ext in EXTENSIONS {
        let mut name: OsString = base.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        out.push(PathBuf::from(name));
    }
    out
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

#[async_trait]
impl ModuleLoader for FsModuleLoader {
    async fn load(&self, spec: &str, export: Option<&str>) -> Result<Value, LoadError> {
        let path = self
            .resolve(spec)
            .await
            .ok_or_else(|| LoadError::NotFound(spec.to_string()))?;
        tracing::debug!(module = spec, path = %path.display(), "loading module");

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| LoadError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension);
        let module = match format {
            Some(format) => self.decoder.decode(format, &text)?,
            None => self.evaluate_module(spec, &text).await?,
        };

        match export {
            None => Ok(module),
            Some(name) => module
                .as_object()
                .and_then(|members| members.get(name))
                .cloned()
                .ok_or_else(|| LoadError::MissingExport {
                    module: spec.to_string(),
                    export: name.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StructuredDecoder;
    use flowsh_expr::ExprEngine;

    fn loader(cwd: &Path, dirs: Vec<PathBuf>) -> FsModuleLoader {
        FsModuleLoader::new(cwd, dirs, Arc::new(ExprEngine::new()), Arc::new(StructuredDecoder))
    }

    #[tokio::test]
    async fn test_relative_json_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"port": 80}"#).unwrap();

        let v = loader(dir.path(), vec![]).load("./data.json", None).await.unwrap();
        assert_eq!(v, Value::object([("port", Value::Int(80))]));
    }

    #[tokio::test]
    async fn test_named_export() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cfg.yaml"), "host: example\nport: 1\n").unwrap();

        let v = loader(dir.path(), vec![]).load("./cfg.yaml", Some("host")).await.unwrap();
        assert_eq!(v, Value::from("example"));
    }

    #[tokio::test]
    async fn test_missing_export() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cfg.toml"), "a = 1\n").unwrap();

        let err = loader(dir.path(), vec![]).load("./cfg.toml", Some("b")).await.unwrap_err();
        assert!(matches!(err, LoadError::MissingExport { .. }));
    }

    #[tokio::test]
    async fn test_bare_name_searches_modules_dir_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let modules = dir.path().join(MODULES_DIR);
        std::fs::create_dir(&modules).unwrap();
        std::fs::write(modules.join("answers.json"), "[42]").unwrap();

        let v = loader(dir.path(), vec![]).load("answers", None).await.unwrap();
        assert_eq!(v, Value::Array(vec![Value::Int(42)]));
    }

    #[tokio::test]
    async fn test_configured_module_dir() {
        let dir = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        std::fs::write(lib.path().join("greeting.flow"), "'hi there'").unwrap();

        let v = loader(dir.path(), vec![lib.path().to_path_buf()])
            .load("greeting", None)
            .await
            .unwrap();
        assert_eq!(v, Value::from("hi there"));
    }

    #[tokio::test]
    async fn test_expression_module_exports_functions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("math.flow"), "{ square: n => n * n }").unwrap();

        let v = loader(dir.path(), vec![]).load("./math.flow", Some("square")).await.unwrap();
        let out = flowsh_types::call_value(&v, vec![Value::Int(9)]).await.unwrap();
        assert_eq!(out, Value::Int(81));
    }

    #[tokio::test]
    async fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = loader(dir.path(), vec![]).load("nowhere", None).await.unwrap_err();
        assert_eq!(err, LoadError::NotFound("nowhere".to_string()));
    }
}
