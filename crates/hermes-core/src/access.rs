//! Department-based access rules.
//!
//! Visibility is decided from two things only: the document's access level
//! and the requester's department. The requester's department is derived per
//! request from the role claims of an identity the caller has already
//! validated; it is never persisted.

use crate::lister::Document;
use crate::metadata::AccessLevel;

/// Departments the portal recognises in role claims, in priority order.
pub const KNOWN_DEPARTMENTS: [&str; 6] = [
    "[1014] Sistemas",
    "IT",
    "Finanzas",
    "RRHH",
    "Marketing",
    "Dirección",
];

/// Department assigned when no role claim matches a known department.
pub const FALLBACK_DEPARTMENT: &str = "IT";

/// Decide whether `document` is visible to a requester from
/// `requester_department`.
///
/// - `publico` is visible to everyone.
/// - `departamento` and `privado` are visible to the owning department only.
/// - Any other level is hidden from everyone.
///
/// `privado` currently grants exactly the same visibility as `departamento`.
#[must_use]
pub fn is_visible(document: &Document, requester_department: &str) -> bool {
    match &document.access_level {
        AccessLevel::Publico => true,
        AccessLevel::Departamento | AccessLevel::Privado => {
            document.owner_department == requester_department
        }
        AccessLevel::Other(_) => false,
    }
}

/// Maps role claims to a department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentResolver {
    known: Vec<String>,
    fallback: String,
}

impl Default for DepartmentResolver {
    fn default() -> Self {
        Self {
            known: KNOWN_DEPARTMENTS.iter().map(|d| (*d).to_owned()).collect(),
            fallback: FALLBACK_DEPARTMENT.to_owned(),
        }
    }
}

impl DepartmentResolver {
    /// Create a resolver over a custom department list.
    pub fn new(known: Vec<String>, fallback: impl Into<String>) -> Self {
        Self {
            known,
            fallback: fallback.into(),
        }
    }

    /// Return the first role that names a known department, or the fallback.
    ///
    /// Roles are compared after trimming surrounding whitespace.
    pub fn resolve<'a, I>(&self, roles: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        roles
            .into_iter()
            .map(str::trim)
            .find(|role| self.known.iter().any(|known| known == role))
            .map_or_else(|| self.fallback.clone(), ToOwned::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(level: AccessLevel, owner: &str) -> Document {
        Document {
            filename: "a.pdf".to_owned(),
            access_level: level,
            owner_department: owner.to_owned(),
            content_hash: String::new(),
            file_size: 0,
            upload_date: None,
            degraded: false,
        }
    }

    // ── is_visible ───────────────────────────────────────────────────

    #[test]
    fn publico_is_visible_to_every_department() {
        let d = doc(AccessLevel::Publico, "Finanzas");
        assert!(is_visible(&d, "Finanzas"));
        assert!(is_visible(&d, "Marketing"));
        assert!(is_visible(&d, ""));
    }

    #[test]
    fn departamento_requires_matching_department() {
        let d = doc(AccessLevel::Departamento, "Finanzas");
        assert!(is_visible(&d, "Finanzas"));
        assert!(!is_visible(&d, "RRHH"));
    }

    #[test]
    fn department_match_is_exact() {
        let d = doc(AccessLevel::Departamento, "Finanzas");
        assert!(!is_visible(&d, "finanzas"));
        assert!(!is_visible(&d, "Finanzas "));
    }

    #[test]
    fn privado_behaves_like_departamento_until_decided_otherwise() {
        for requester in ["Finanzas", "RRHH", "IT", ""] {
            assert_eq!(
                is_visible(&doc(AccessLevel::Privado, "Finanzas"), requester),
                is_visible(&doc(AccessLevel::Departamento, "Finanzas"), requester),
                "privado and departamento diverged for '{requester}'"
            );
        }
    }

    #[test]
    fn unknown_levels_are_hidden_even_from_owner() {
        let d = doc(AccessLevel::Other("confidencial".to_owned()), "Finanzas");
        assert!(!is_visible(&d, "Finanzas"));
    }

    // ── DepartmentResolver ───────────────────────────────────────────

    #[test]
    fn first_known_role_wins() {
        let resolver = DepartmentResolver::default();
        assert_eq!(
            resolver.resolve(["offline_access", "RRHH", "Finanzas"]),
            "RRHH"
        );
    }

    #[test]
    fn no_known_role_falls_back_to_it() {
        let resolver = DepartmentResolver::default();
        assert_eq!(resolver.resolve(["uma_authorization"]), "IT");
        assert_eq!(resolver.resolve([]), "IT");
    }

    #[test]
    fn roles_are_trimmed() {
        let resolver = DepartmentResolver::default();
        assert_eq!(resolver.resolve([" Dirección "]), "Dirección");
        assert_eq!(resolver.resolve(["[1014] Sistemas"]), "[1014] Sistemas");
    }

    #[test]
    fn custom_resolver_uses_its_own_list() {
        let resolver = DepartmentResolver::new(vec!["Legal".to_owned()], "Legal");
        assert_eq!(resolver.resolve(["IT"]), "Legal");
        assert_eq!(resolver.resolve(["Legal"]), "Legal");
        assert_eq!(resolver.resolve(["RRHH"]), "Legal");
    }
}
