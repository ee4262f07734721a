//! Import extraction and resolution.
//!
//! Extraction is syntactic (regex based) and covers ES modules, CommonJS
//! `require`, dynamic `import()` and Python `import`/`from` statements.
//! Resolution maps a specifier to a sandbox path, a package, or a builtin.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// An import statement found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    /// 1-based line of the statement.
    pub line: usize,
}

/// Source languages with import extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Script,
    Python,
}

/// Extensions tried when a script specifier omits one.
pub const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "json"];

impl SourceKind {
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" | "mts" | "cts" => Some(SourceKind::Script),
            "py" => Some(SourceKind::Python),
            _ => None,
        }
    }
}

fn script_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // import x from 'a'; import 'a'; export { y } from 'a'
            Regex::new(r#"^\s*(?:import|export)\b[^'"]*?(?:\bfrom\s*)?['"]([^'"]+)['"]"#)
                .expect("static regex"),
            Regex::new(r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("static regex"),
            Regex::new(r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("static regex"),
        ]
    })
}

fn python_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"^\s*from\s+(\.*[\w.]*)\s+import\b").expect("static regex"),
            Regex::new(r"^\s*import\s+([\w.]+(?:\s*,\s*[\w.]+)*)").expect("static regex"),
        ]
    })
}

/// Extract import specifiers from `content`.
pub fn extract_imports(kind: SourceKind, content: &str) -> Vec<ImportRef> {
    let mut imports = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        match kind {
            SourceKind::Script => {
                for pattern in script_patterns() {
                    for caps in pattern.captures_iter(line) {
                        imports.push(ImportRef {
                            specifier: caps[1].to_string(),
                            line: line_no,
                        });
                    }
                }
            }
            SourceKind::Python => {
                let [from_import, plain_import] = python_patterns();
                if let Some(caps) = from_import.captures(line) {
                    imports.push(ImportRef {
                        specifier: caps[1].to_string(),
                        line: line_no,
                    });
                } else if let Some(caps) = plain_import.captures(line) {
                    for module in caps[1].split(',') {
                        imports.push(ImportRef {
                            specifier: module.trim().to_string(),
                            line: line_no,
                        });
                    }
                }
            }
        }
    }

    imports.dedup();
    imports
}

/// What an import specifier refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// A path inside the sandbox, without extension resolution applied.
    Local(String),
    /// A third-party package, by its root name.
    Package(String),
    /// A runtime builtin module.
    Builtin(String),
    /// A relative import that climbs above the sandbox root.
    Escapes,
}

/// Classifies specifiers for one sandbox.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    builtins: Vec<String>,
    aliases: BTreeMap<String, String>,
}

impl ImportResolver {
    pub fn new(builtins: Vec<String>, aliases: BTreeMap<String, String>) -> Self {
        Self { builtins, aliases }
    }

    /// Classify `specifier` as written in the file at `importer`.
    pub fn classify(&self, kind: SourceKind, importer: &str, specifier: &str) -> ImportTarget {
        match kind {
            SourceKind::Script => self.classify_script(importer, specifier),
            SourceKind::Python => self.classify_python(importer, specifier),
        }
    }

    fn classify_script(&self, importer: &str, specifier: &str) -> ImportTarget {
        if let Some(builtin) = specifier.strip_prefix("node:") {
            return ImportTarget::Builtin(builtin.to_string());
        }

        if specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." {
            let dir = parent_dir(importer);
            return match join_normalized(&dir, specifier) {
                Some(path) => ImportTarget::Local(path),
                None => ImportTarget::Escapes,
            };
        }

        if specifier.starts_with('/') {
            return ImportTarget::Escapes;
        }

        // Longest alias first so `@app` wins over `@`.
        let mut aliases: Vec<_> = self.aliases.iter().collect();
        aliases.sort_by_key(|(alias, _)| std::cmp::Reverse(alias.len()));
        for (alias, dir) in aliases {
            if let Some(rest) = specifier.strip_prefix(alias.as_str())
                && (rest.is_empty() || rest.starts_with('/'))
            {
                return match join_normalized(dir, rest.trim_start_matches('/')) {
                    Some(path) => ImportTarget::Local(path),
                    None => ImportTarget::Escapes,
                };
            }
        }

        let root = package_root(specifier);
        if self.is_builtin(&root) {
            ImportTarget::Builtin(root)
        } else {
            ImportTarget::Package(root)
        }
    }

    fn classify_python(&self, importer: &str, specifier: &str) -> ImportTarget {
        let dots = specifier.chars().take_while(|c| *c == '.').count();
        let module = &specifier[dots..];

        if dots > 0 {
            let mut dir = parent_dir(importer);
            for _ in 1..dots {
                dir = match join_normalized(&dir, "..") {
                    Some(d) => d,
                    None => return ImportTarget::Escapes,
                };
            }
            let rel = module.replace('.', "/");
            return match join_normalized(&dir, &rel) {
                Some(path) => ImportTarget::Local(path),
                None => ImportTarget::Escapes,
            };
        }

        let root = module.split('.').next().unwrap_or(module).to_string();
        if self.is_builtin(&root) {
            ImportTarget::Builtin(root)
        } else {
            ImportTarget::Package(root)
        }
    }

    fn is_builtin(&self, root: &str) -> bool {
        self.builtins.iter().any(|b| b == root)
    }
}

/// Root package name of a bare specifier (`@scope/pkg/x` -> `@scope/pkg`).
pub fn package_root(specifier: &str) -> String {
    let mut parts = specifier.split('/');
    match parts.next() {
        Some(scope) if scope.starts_with('@') => match parts.next() {
            Some(name) => format!("{}/{}", scope, name),
            None => scope.to_string(),
        },
        Some(name) => name.to_string(),
        None => String::new(),
    }
}

/// Candidate files a local script import may refer to.
///
/// `src/util` yields `src/util`, `src/util.ts`, ..., `src/util/index.ts`, ...
pub fn script_candidates(path: &str) -> Vec<String> {
    let mut out = vec![path.to_string()];
    let base = path.trim_end_matches('/');
    for ext in SCRIPT_EXTENSIONS {
        out.push(format!("{}.{}", base, ext));
    }
    for ext in SCRIPT_EXTENSIONS {
        out.push(format!("{}/index.{}", base, ext));
    }
    // `./x.js` in TypeScript sources usually means `./x.ts`.
    for (js, ts) in [(".js", ".ts"), (".js", ".tsx"), (".jsx", ".tsx")] {
        if let Some(stem) = base.strip_suffix(js) {
            out.push(format!("{}{}", stem, ts));
        }
    }
    out
}

/// Candidate files a local Python import may refer to.
pub fn python_candidates(path: &str) -> Vec<String> {
    vec![format!("{}.py", path), format!("{}/__init__.py", path), path.to_string()]
}

fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// Join and normalize `rel` onto `base`, both sandbox-relative.
///
/// Returns `None` if the result climbs above the sandbox root.
pub fn join_normalized(base: &str, rel: &str) -> Option<String> {
    let joined = if base.is_empty() {
        PathBuf::from(rel)
    } else {
        Path::new(base).join(rel)
    };

    let mut parts: Vec<String> = Vec::new();
    for component in joined.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}
