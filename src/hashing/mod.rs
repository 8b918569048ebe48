//! Content fingerprints for spec files
//!
//! A spec's hash covers its own bytes plus the bytes of every module it
//! imports directly. Modules imported only by those dependencies are not
//! included.

mod resolver;

pub use resolver::{DependencyResolver, RelativeResolver, DEFAULT_EXTENSIONS};

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

fn import_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"import.*from\s+['"]([^'"]+)['"]"#).expect("import pattern is valid")
    })
}

/// Module specifiers referenced by `from '...'` imports, first occurrence order
pub fn import_specifiers(source: &str) -> Vec<String> {
    let mut specifiers: Vec<String> = Vec::new();
    for capture in import_pattern().captures_iter(source) {
        let specifier = &capture[1];
        if !specifiers.iter().any(|s| s == specifier) {
            specifiers.push(specifier.to_string());
        }
    }
    specifiers
}

/// Computes dependency-aware content hashes
#[derive(Clone)]
pub struct DependencyHasher {
    resolver: Arc<dyn DependencyResolver>,
}

impl Default for DependencyHasher {
    fn default() -> Self {
        Self::new(Arc::new(RelativeResolver::default()))
    }
}

impl DependencyHasher {
    pub fn new(resolver: Arc<dyn DependencyResolver>) -> Self {
        Self { resolver }
    }

    /// Hex SHA-256 of the spec content followed by its direct dependencies'
    /// contents in discovery order.
    ///
    /// A dependency that cannot be resolved or read contributes nothing.
    pub fn compute_hash(&self, spec_path: &Path) -> std::io::Result<String> {
        let content = fs::read(spec_path)?;
        let source = String::from_utf8_lossy(&content);

        let mut hasher = Sha256::new();
        hasher.update(&content);

        for specifier in import_specifiers(&source) {
            hasher.update(self.dependency_content(spec_path, &specifier));
        }

        Ok(hex::encode(hasher.finalize()))
    }

    fn dependency_content(&self, spec_path: &Path, specifier: &str) -> Vec<u8> {
        let Some(resolved) = self.resolver.resolve(spec_path, specifier) else {
            debug!(
                "Unresolved import '{}' in {}",
                specifier,
                spec_path.display()
            );
            return Vec::new();
        };

        fs::read(&resolved).unwrap_or_else(|e| {
            debug!("Failed to read dependency {}: {}", resolved.display(), e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Resolves from a fixed table, ignoring the filesystem layout
    struct TableResolver(HashMap<String, PathBuf>);

    impl DependencyResolver for TableResolver {
        fn resolve(&self, _spec_path: &Path, specifier: &str) -> Option<PathBuf> {
            self.0.get(specifier).cloned()
        }
    }

    struct Fixture {
        dir: TempDir,
        hasher: DependencyHasher,
    }

    impl Fixture {
        /// spec imports `./page`; page imports `./widget`
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(
                dir.path().join("login.cy.ts"),
                "import { LoginPage } from './page';\nimport x from \"./missing\";\ndescribe('login', () => {});\n",
            )
            .unwrap();
            fs::write(
                dir.path().join("page.ts"),
                "import { Widget } from './widget';\nexport class LoginPage {}\n",
            )
            .unwrap();
            fs::write(dir.path().join("widget.ts"), "export class Widget {}\n").unwrap();

            Self {
                dir,
                hasher: DependencyHasher::default(),
            }
        }

        fn spec(&self) -> PathBuf {
            self.dir.path().join("login.cy.ts")
        }

        fn hash(&self) -> String {
            self.hasher.compute_hash(&self.spec()).unwrap()
        }

        fn append(&self, file: &str, text: &str) {
            let path = self.dir.path().join(file);
            let mut content = fs::read_to_string(&path).unwrap();
            content.push_str(text);
            fs::write(path, content).unwrap();
        }
    }

    #[test]
    fn test_import_specifiers_in_order_without_duplicates() {
        let source = r#"
import { a } from './a';
import b from "../b";
import { a as again } from './a';
import 'side-effect-only';
const x = 1;
"#;
        assert_eq!(import_specifiers(source), vec!["./a", "../b"]);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let fixture = Fixture::new();
        assert_eq!(fixture.hash(), fixture.hash());
        assert_eq!(fixture.hash().len(), 64);
    }

    #[test]
    fn test_direct_dependency_change_changes_hash() {
        let fixture = Fixture::new();
        let before = fixture.hash();
        fixture.append("page.ts", " ");
        assert_ne!(before, fixture.hash());
    }

    #[test]
    fn test_spec_change_changes_hash() {
        let fixture = Fixture::new();
        let before = fixture.hash();
        fixture.append("login.cy.ts", "\n");
        assert_ne!(before, fixture.hash());
    }

    #[test]
    fn test_transitive_dependency_change_keeps_hash() {
        let fixture = Fixture::new();
        let before = fixture.hash();
        fixture.append("widget.ts", "export const extra = 1;\n");
        assert_eq!(before, fixture.hash());
    }

    #[test]
    fn test_unresolved_dependency_contributes_nothing() {
        let fixture = Fixture::new();
        let content = fs::read(fixture.spec()).unwrap();
        let page = fs::read(fixture.dir.path().join("page.ts")).unwrap();

        let mut expected = Sha256::new();
        expected.update(&content);
        expected.update(&page);
        assert_eq!(fixture.hash(), hex::encode(expected.finalize()));
    }

    #[test]
    fn test_injected_resolver() {
        let fixture = Fixture::new();
        let elsewhere = fixture.dir.path().join("elsewhere.ts");
        fs::write(&elsewhere, "export const v = 1;").unwrap();

        let table = HashMap::from([("./page".to_string(), elsewhere.clone())]);
        let hasher = DependencyHasher::new(Arc::new(TableResolver(table)));

        let mut expected = Sha256::new();
        expected.update(fs::read(fixture.spec()).unwrap());
        expected.update(b"export const v = 1;");
        assert_eq!(
            hasher.compute_hash(&fixture.spec()).unwrap(),
            hex::encode(expected.finalize())
        );
        assert_ne!(hasher.compute_hash(&fixture.spec()).unwrap(), fixture.hash());
    }

    #[test]
    fn test_missing_spec_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(DependencyHasher::default()
            .compute_hash(&dir.path().join("nope.cy.ts"))
            .is_err());
    }
}
