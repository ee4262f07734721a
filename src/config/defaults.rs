//! Compiled configuration defaults.
//!
//! List-typed keys are unions: whatever an operator configures is added to
//! the compiled list, never substituted for it. The seed table mirrors the
//! compiled values so `gatekeep config list` shows the effective baseline.

/// Configuration keys read by gatekeep.
pub mod keys {
    pub const DELETE_CHECK_IGNORE_DIRS: &str = "DELETE_CHECK_IGNORE_DIRS";
    pub const TEST_HAPPY_PATH_KEYWORDS: &str = "TEST_HAPPY_PATH_KEYWORDS";
    pub const TEST_SAD_PATH_KEYWORDS: &str = "TEST_SAD_PATH_KEYWORDS";
    pub const TEST_FILE_PATTERNS: &str = "TEST_FILE_PATTERNS";
    pub const LINT_CONFIG_FILES: &str = "LINT_CONFIG_FILES";
    pub const LINT_SKIP_IF_NO_CONFIG: &str = "LINT_SKIP_IF_NO_CONFIG";
    pub const EXTRA_BUILTIN_MODULES: &str = "EXTRA_BUILTIN_MODULES";
    pub const PATH_ALIASES: &str = "PATH_ALIASES";
    pub const TEST_TYPE_PATTERNS: &str = "TEST_TYPE_PATTERNS";
    pub const TEST_READ_ONLY_EXCLUDED_PATHS: &str = "TEST_READ_ONLY_EXCLUDED_PATHS";
    pub const SENSITIVE_FILE_PATTERNS: &str = "SENSITIVE_FILE_PATTERNS";
    pub const STUB_PATTERNS: &str = "STUB_PATTERNS";
    pub const STUB_CHECK_EXTENSIONS: &str = "STUB_CHECK_EXTENSIONS";
    pub const TEST_COMMAND: &str = "TEST_COMMAND";
    pub const COMPILE_COMMAND: &str = "COMPILE_COMMAND";
    pub const BUILD_COMMAND: &str = "BUILD_COMMAND";
    pub const LINT_COMMAND: &str = "LINT_COMMAND";
    pub const TEST_EXECUTION_TIMEOUT_MS: &str = "TEST_EXECUTION_TIMEOUT_MS";
    pub const COMPILATION_TIMEOUT_MS: &str = "COMPILATION_TIMEOUT_MS";
    pub const BUILD_TIMEOUT_MS: &str = "BUILD_TIMEOUT_MS";
    pub const LINT_TIMEOUT_MS: &str = "LINT_TIMEOUT_MS";
    pub const TEST_SKIP_IF_NO_COMMAND: &str = "TEST_SKIP_IF_NO_COMMAND";
    pub const COMPILATION_SKIP_IF_NO_CONFIG: &str = "COMPILATION_SKIP_IF_NO_CONFIG";
    pub const BUILD_SKIP_IF_NO_SCRIPT: &str = "BUILD_SKIP_IF_NO_SCRIPT";
    pub const SANDBOX_DEPENDENCY_DIR: &str = "SANDBOX_DEPENDENCY_DIR";
    pub const EVENT_RETENTION: &str = "EVENT_RETENTION";
    pub const LOCK_STALE_MINUTES: &str = "LOCK_STALE_MINUTES";
    pub const AGENT_MAX_FIX_ATTEMPTS: &str = "AGENT_MAX_FIX_ATTEMPTS";
}

pub const DELETE_CHECK_IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "coverage",
    ".next",
    ".cache",
];

pub const TEST_HAPPY_PATH_KEYWORDS: &[&str] =
    &["should", "success", "valid", "works", "returns", "happy"];

pub const TEST_SAD_PATH_KEYWORDS: &[&str] = &[
    "error", "fail", "invalid", "throw", "reject", "missing", "empty", "sad",
];

pub const TEST_FILE_PATTERNS: &[&str] = &[
    "**/*.test.*",
    "**/*.spec.*",
    "**/__tests__/**",
    "**/tests/**",
    "**/*_test.*",
    "**/test_*",
];

pub const LINT_CONFIG_FILES: &[&str] = &[
    ".eslintrc",
    ".eslintrc.js",
    ".eslintrc.cjs",
    ".eslintrc.json",
    ".eslintrc.yml",
    "eslint.config.js",
    "eslint.config.mjs",
    "biome.json",
    "ruff.toml",
    ".flake8",
    "clippy.toml",
];

/// Node.js core modules plus common language standard roots.
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "crypto",
    "events",
    "fs",
    "http",
    "https",
    "net",
    "os",
    "path",
    "process",
    "querystring",
    "readline",
    "stream",
    "string_decoder",
    "timers",
    "tls",
    "url",
    "util",
    "worker_threads",
    "zlib",
    "std",
    "core",
    "alloc",
];

pub const PATH_ALIASES: &[(&str, &str)] = &[("@", "src"), ("~", "src")];

pub const TEST_TYPE_PATTERNS: &[(&str, &str)] = &[
    ("e2e", r"e2e|playwright|cypress"),
    ("integration", r"integration|supertest"),
    ("unit", r"\.(test|spec)\.|_test\.|tests?/"),
];

pub const TEST_READ_ONLY_EXCLUDED_PATHS: &[&str] = &["artifacts/**"];

pub const SENSITIVE_FILE_PATTERNS: &[&str] = &[
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "id_rsa*",
    ".npmrc",
    "**/secrets/**",
    ".git/**",
];

pub const STUB_PATTERNS: &[&str] = &[
    "TODO",
    "FIXME",
    "XXX",
    "HACK",
    "unimplemented!",
    "todo!",
    r#"throw new Error\(\s*["']not implemented"#,
    "NotImplementedError",
    r"^\s*pass\s*$",
];

pub const STUB_CHECK_EXTENSIONS: &[&str] = &["rs", "py", "ts", "js", "tsx", "jsx"];

pub const TEST_EXECUTION_TIMEOUT_MS: u64 = 300_000;
pub const COMPILATION_TIMEOUT_MS: u64 = 120_000;
pub const BUILD_TIMEOUT_MS: u64 = 300_000;
pub const LINT_TIMEOUT_MS: u64 = 60_000;
pub const EVENT_RETENTION: u64 = 1000;
pub const LOCK_STALE_MINUTES: u64 = 120;
pub const AGENT_MAX_FIX_ATTEMPTS: u64 = 3;
pub const SANDBOX_DEPENDENCY_DIR: &str = "node_modules";

/// One row of the seed table.
#[derive(Debug, Clone, Copy)]
pub struct DefaultEntry {
    pub key: &'static str,
    pub value: &'static str,
    pub value_type: super::ValueType,
    pub category: &'static str,
    pub description: &'static str,
}

macro_rules! entry {
    ($key:expr, $value:expr, $ty:ident, $cat:expr, $desc:expr) => {
        DefaultEntry {
            key: $key,
            value: $value,
            value_type: super::ValueType::$ty,
            category: $cat,
            description: $desc,
        }
    };
}

/// Rows written by `gatekeep config seed`.
pub const DEFAULTS: &[DefaultEntry] = &[
    entry!(keys::SENSITIVE_FILE_PATTERNS, ".env,.env.*,*.pem,*.key,id_rsa*,.npmrc,**/secrets/**,.git/**", String, "sanitization",
        "Globs the manifest must never touch"),
    entry!(keys::TEST_HAPPY_PATH_KEYWORDS, "should,success,valid,works,returns,happy", String, "contract",
        "Keywords identifying a happy-path test"),
    entry!(keys::TEST_SAD_PATH_KEYWORDS, "error,fail,invalid,throw,reject,missing,empty,sad", String, "contract",
        "Keywords identifying a sad-path test"),
    entry!(keys::TEST_FILE_PATTERNS, "**/*.test.*,**/*.spec.*,**/__tests__/**,**/tests/**,**/*_test.*,**/test_*", String, "contract",
        "Globs identifying test files"),
    entry!(keys::EXTRA_BUILTIN_MODULES, "", String, "contract",
        "Additional module names treated as always available"),
    entry!(keys::PATH_ALIASES, "@:src,~:src", String, "contract",
        "Import alias to directory pairs"),
    entry!(keys::TEST_TYPE_PATTERNS, r"e2e:e2e|playwright|cypress,integration:integration|supertest,unit:\.(test|spec)\.|_test\.|tests?/", String, "contract",
        "Test type to detection regex pairs"),
    entry!(keys::DELETE_CHECK_IGNORE_DIRS, "node_modules,.git,dist,build,coverage,.next,.cache", String, "execution",
        "Directories not scanned for references to deleted files"),
    entry!(keys::TEST_READ_ONLY_EXCLUDED_PATHS, "artifacts/**", String, "execution",
        "Globs of existing tests that may be modified"),
    entry!(keys::STUB_PATTERNS, r#"TODO,FIXME,XXX,HACK,unimplemented!,todo!,throw new Error\(\s*["']not implemented,NotImplementedError,^\s*pass\s*$"#, String, "execution",
        "Regexes flagging placeholder code in added lines"),
    entry!(keys::STUB_CHECK_EXTENSIONS, "rs,py,ts,js,tsx,jsx", String, "execution",
        "File extensions scanned for stubs"),
    entry!(keys::TEST_COMMAND, "", String, "execution",
        "Test command; empty detects from package.json"),
    entry!(keys::TEST_EXECUTION_TIMEOUT_MS, "300000", Number, "execution",
        "Test execution timeout in milliseconds"),
    entry!(keys::TEST_SKIP_IF_NO_COMMAND, "true", Boolean, "execution",
        "Skip instead of fail when no test command is found"),
    entry!(keys::COMPILE_COMMAND, "", String, "integrity",
        "Compile command; empty detects from tsconfig.json"),
    entry!(keys::COMPILATION_TIMEOUT_MS, "120000", Number, "integrity",
        "Compilation timeout in milliseconds"),
    entry!(keys::COMPILATION_SKIP_IF_NO_CONFIG, "true", Boolean, "integrity",
        "Skip instead of fail when no compiler config is found"),
    entry!(keys::LINT_CONFIG_FILES, ".eslintrc,.eslintrc.js,.eslintrc.cjs,.eslintrc.json,.eslintrc.yml,eslint.config.js,eslint.config.mjs,biome.json,ruff.toml,.flake8,clippy.toml", String, "integrity",
        "Lint configuration file candidates"),
    entry!(keys::LINT_COMMAND, "", String, "integrity",
        "Lint command; changed files are appended"),
    entry!(keys::LINT_TIMEOUT_MS, "60000", Number, "integrity",
        "Lint timeout in milliseconds"),
    entry!(keys::LINT_SKIP_IF_NO_CONFIG, "true", Boolean, "integrity",
        "Skip instead of fail when no lint config is found"),
    entry!(keys::BUILD_COMMAND, "", String, "integrity",
        "Build command; empty detects the package.json build script"),
    entry!(keys::BUILD_TIMEOUT_MS, "300000", Number, "integrity",
        "Build timeout in milliseconds"),
    entry!(keys::BUILD_SKIP_IF_NO_SCRIPT, "true", Boolean, "integrity",
        "Skip instead of fail when no build script is found"),
    entry!(keys::SANDBOX_DEPENDENCY_DIR, "node_modules", String, "sandbox",
        "Dependency directory linked into each sandbox"),
    entry!(keys::LOCK_STALE_MINUTES, "120", Number, "sandbox",
        "Age after which a run lock is considered abandoned"),
    entry!(keys::EVENT_RETENTION, "1000", Number, "events",
        "Events kept in memory per run for reconnection"),
    entry!(keys::AGENT_MAX_FIX_ATTEMPTS, "3", Number, "agent",
        "Fix iterations before the pipeline gives up"),
];

/// Look up the seed row for `key`.
pub fn find(key: &str) -> Option<&'static DefaultEntry> {
    DEFAULTS.iter().find(|entry| entry.key == key)
}
