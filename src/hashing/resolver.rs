//! Import specifier resolution

use std::path::{Path, PathBuf};

/// Extensions tried, in order, when a specifier omits one
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "json"];

/// Maps an import specifier found in a spec to the file it refers to
pub trait DependencyResolver: Send + Sync {
    fn resolve(&self, spec_path: &Path, specifier: &str) -> Option<PathBuf>;
}

/// Node-style resolution relative to the spec's directory.
///
/// Relative and absolute specifiers are tried as an exact file, then with each
/// extension appended, then as a directory containing `index.<ext>`. Bare
/// package specifiers are looked up under `node_modules` in the spec's
/// directory and every ancestor.
#[derive(Clone, Debug)]
pub struct RelativeResolver {
    extensions: Vec<String>,
}

impl Default for RelativeResolver {
    fn default() -> Self {
        Self::with_extensions(DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()))
    }
}

impl RelativeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions(extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
        }
    }

    fn resolve_file(&self, candidate: &Path) -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate.to_path_buf());
        }

        for ext in &self.extensions {
            let mut with_ext = candidate.as_os_str().to_owned();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if candidate.is_dir() {
            return self
                .extensions
                .iter()
                .map(|ext| candidate.join(format!("index.{ext}")))
                .find(|index| index.is_file());
        }

        None
    }
}

impl DependencyResolver for RelativeResolver {
    fn resolve(&self, spec_path: &Path, specifier: &str) -> Option<PathBuf> {
        let base = spec_path.parent().unwrap_or_else(|| Path::new("."));

        if specifier.starts_with('.') {
            return self.resolve_file(&base.join(specifier));
        }
        if specifier.starts_with('/') {
            return self.resolve_file(Path::new(specifier));
        }

        base.ancestors()
            .map(|dir| dir.join("node_modules").join(specifier))
            .find_map(|candidate| self.resolve_file(&candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "export {}").unwrap();
    }

    #[test]
    fn test_resolves_relative_with_extension() {
        let dir = TempDir::new().unwrap();
        let spec = dir.path().join("e2e/login.cy.ts");
        touch(&spec);
        touch(&dir.path().join("support/commands.ts"));

        let resolved = RelativeResolver::new().resolve(&spec, "../support/commands");
        assert_eq!(resolved, Some(dir.path().join("e2e/../support/commands.ts")));
    }

    #[test]
    fn test_resolves_directory_index() {
        let dir = TempDir::new().unwrap();
        let spec = dir.path().join("login.cy.ts");
        touch(&spec);
        touch(&dir.path().join("pages/index.js"));

        let resolved = RelativeResolver::new().resolve(&spec, "./pages");
        assert_eq!(resolved, Some(dir.path().join("./pages").join("index.js")));
    }

    #[test]
    fn test_resolves_bare_specifier_from_ancestor_node_modules() {
        let dir = TempDir::new().unwrap();
        let spec = dir.path().join("cypress/e2e/a.cy.ts");
        touch(&spec);
        touch(&dir.path().join("node_modules/helpers/index.ts"));

        let resolved = RelativeResolver::new().resolve(&spec, "helpers");
        assert_eq!(
            resolved,
            Some(dir.path().join("node_modules/helpers").join("index.ts"))
        );
    }

    #[test]
    fn test_unresolvable_specifier() {
        let dir = TempDir::new().unwrap();
        let spec = dir.path().join("a.cy.ts");
        touch(&spec);

        assert_eq!(RelativeResolver::new().resolve(&spec, "./missing"), None);
        assert_eq!(RelativeResolver::new().resolve(&spec, "no-such-package"), None);
    }
}
