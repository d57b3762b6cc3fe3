use crate::error::{ScramError, SourceSpan};
use std::collections::HashMap;

/// A case-preserved name together with its lower-cased identity key.
///
/// Identity comparisons throughout the model use `id`, never `name`
/// (spec.md §3: "Identity comparisons use `id`"). `Eq`/`Hash` are
/// therefore derived from `id` alone, not the full struct.
#[derive(Debug, Clone)]
pub struct Identifier {
    pub name: String,
    id: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = name.to_lowercase();
        Self { name, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Identifier {}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

/// Scope in which an entity is registered: the containing path plus
/// public/private visibility. Two entities may share a `name` as long as
/// their `(base_path, is_public)` scopes differ (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub base_path: Vec<String>,
    pub is_public: bool,
}

impl Scope {
    pub fn root(is_public: bool) -> Self {
        Self {
            base_path: Vec::new(),
            is_public,
        }
    }

    pub fn nested(&self, container: impl Into<String>) -> Self {
        let mut base_path = self.base_path.clone();
        base_path.push(container.into());
        Self {
            base_path,
            is_public: self.is_public,
        }
    }
}

/// Registers named entities under `(scope, id)`, the contract of spec.md
/// §4.A: duplicate registration is a hard error, lookup resolves in the
/// originating scope first and then walks outward through enclosing
/// containers, skipping private entries once it leaves their scope.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<(Scope, String), SourceSpan>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        scope: &Scope,
        id: &Identifier,
        span: SourceSpan,
    ) -> Result<(), ScramError> {
        let key = (scope.clone(), id.id().to_string());
        if self.entries.contains_key(&key) {
            return Err(ScramError::Redefinition {
                id: id.name.clone(),
                span,
            });
        }
        self.entries.insert(key, span);
        Ok(())
    }

    /// Resolves `id` starting at `scope`, then walking outward through
    /// enclosing containers (dropping the last path segment each step).
    /// Private entries registered in an ancestor scope are not visible
    /// once `scope` has left that container.
    pub fn resolve(&self, scope: &Scope, id: &str) -> Option<&SourceSpan> {
        let mut path = scope.base_path.clone();
        loop {
            let candidate = Scope {
                base_path: path.clone(),
                is_public: scope.is_public,
            };
            if let Some(span) = self.entries.get(&(candidate.clone(), id.to_string())) {
                return Some(span);
            }
            // Also try the public variant of this scope: a private lookup
            // can still see public siblings.
            if !scope.is_public {
                let public_candidate = Scope {
                    base_path: path.clone(),
                    is_public: true,
                };
                if let Some(span) = self.entries.get(&(public_candidate, id.to_string())) {
                    return Some(span);
                }
            }
            if path.is_empty() {
                return None;
            }
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_case() {
        let a = Identifier::new("Pump-A");
        let b = Identifier::new("pump-a");
        assert_eq!(a, b);
        assert_eq!(a.id(), "pump-a");
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reg = Registry::new();
        let scope = Scope::root(true);
        let id = Identifier::new("Valve1");
        reg.register(&scope, &id, SourceSpan::unknown()).unwrap();
        let err = reg.register(&scope, &id, SourceSpan::unknown()).unwrap_err();
        assert!(matches!(err, ScramError::Redefinition { .. }));
    }

    #[test]
    fn same_name_different_scope_is_allowed() {
        let mut reg = Registry::new();
        let public = Scope::root(true);
        let private = Scope::root(false).nested("moduleA");
        let id = Identifier::new("Valve1");
        reg.register(&public, &id, SourceSpan::unknown()).unwrap();
        reg.register(&private, &id, SourceSpan::unknown()).unwrap();
    }

    #[test]
    fn lookup_walks_outward() {
        let mut reg = Registry::new();
        let outer = Scope::root(true);
        let id = Identifier::new("MissionTime");
        reg.register(&outer, &id, SourceSpan::unknown()).unwrap();

        let inner = outer.nested("sub");
        assert!(reg.resolve(&inner, "missiontime").is_some());
    }
}
