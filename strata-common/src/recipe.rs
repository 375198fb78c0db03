// strata-common/src/recipe.rs
use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StrataError};
use crate::model::variant::BuildVariant;

/// The recipe document: the full set of declared variants plus the list of
/// packages whose resolved pins must agree across variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub name: Option<String>,
    /// Packages that must resolve to the same exact pin in every variant
    /// built in one invocation. Empty means variants may diverge freely.
    #[serde(default)]
    pub cross_check: Vec<String>,
    pub variants: Vec<BuildVariant>,
}

impl Recipe {
    /// Loads and validates a recipe file. Relative paths inside the recipe
    /// (constraint and requirement files) are resolved against the recipe's
    /// own directory, so a recipe works no matter where it is invoked from.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading recipe from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            StrataError::Recipe(format!("cannot read recipe {}: {e}", path.display()))
        })?;
        let mut recipe: Recipe = serde_json::from_str(&text).map_err(|e| {
            StrataError::Recipe(format!("cannot parse recipe {}: {e}", path.display()))
        })?;

        if recipe.variants.is_empty() {
            return Err(StrataError::Recipe(format!(
                "recipe {} declares no variants",
                path.display()
            )));
        }

        let mut seen = BTreeSet::new();
        for variant in &recipe.variants {
            if variant.id.is_empty() {
                return Err(StrataError::Recipe("variant with empty id".to_string()));
            }
            if !seen.insert(variant.id.clone()) {
                return Err(StrataError::Recipe(format!(
                    "duplicate variant id '{}'",
                    variant.id
                )));
            }
        }

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        for variant in &mut recipe.variants {
            if let Some(constraints) = &variant.constraints {
                if constraints.is_relative() {
                    variant.constraints = Some(base_dir.join(constraints));
                }
            }
            for group in &mut variant.groups {
                if group.file.is_relative() {
                    group.file = base_dir.join(&group.file);
                }
            }
        }

        debug!(
            "Recipe loaded: {} variant(s), cross_check={:?}",
            recipe.variants.len(),
            recipe.cross_check
        );
        Ok(recipe)
    }

    pub fn variant(&self, id: &str) -> Option<&BuildVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Resolves requested ids to variants, failing on the first unknown id.
    /// An empty request selects every declared variant.
    pub fn select(&self, ids: &[String]) -> Result<Vec<&BuildVariant>> {
        if ids.is_empty() {
            return Ok(self.variants.iter().collect());
        }
        let mut selected = Vec::new();
        for id in ids {
            let variant = self.variant(id).ok_or_else(|| {
                StrataError::NotFound(format!(
                    "variant '{id}' is not declared in the recipe (known: {})",
                    self.variants
                        .iter()
                        .map(|v| v.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;
            selected.push(variant);
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_recipe(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("strata.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(
            dir.path(),
            r#"{
                "variants": [{
                    "id": "stable",
                    "base": "3.8.13",
                    "constraints": "constraints.txt",
                    "groups": [{"kind": "package", "file": "requirements.txt"}]
                }]
            }"#,
        );
        let recipe = Recipe::load(&path).unwrap();
        let variant = recipe.variant("stable").unwrap();
        assert_eq!(
            variant.constraints.as_deref(),
            Some(dir.path().join("constraints.txt").as_path())
        );
        assert_eq!(variant.groups[0].file, dir.path().join("requirements.txt"));
    }

    #[test]
    fn duplicate_variant_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(
            dir.path(),
            r#"{"variants": [
                {"id": "a", "base": "1"},
                {"id": "a", "base": "2"}
            ]}"#,
        );
        assert!(matches!(
            Recipe::load(&path),
            Err(StrataError::Recipe(_))
        ));
    }

    #[test]
    fn select_unknown_variant_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recipe(dir.path(), r#"{"variants": [{"id": "a", "base": "1"}]}"#);
        let recipe = Recipe::load(&path).unwrap();
        assert!(recipe.select(&["b".to_string()]).is_err());
        assert_eq!(recipe.select(&[]).unwrap().len(), 1);
    }
}
