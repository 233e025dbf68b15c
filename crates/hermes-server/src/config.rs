//! Server configuration loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use hermes_core::access::{DepartmentResolver, FALLBACK_DEPARTMENT, KNOWN_DEPARTMENTS};
use hermes_core::upload::{DEFAULT_ALLOWED_TYPES, DEFAULT_MAX_FILE_SIZE, UploadPolicy};

/// Default bind address: loopback, port 3000.
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);

/// Extra body allowance on top of the file payload for multipart framing and
/// the metadata part.
const BODY_LIMIT_SLACK: u64 = 1024 * 1024;

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener on.
    pub bind_addr: SocketAddr,
    /// Directory holding documents and their sidecars.
    pub docs_dir: PathBuf,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Largest accepted file in bytes.
    pub max_upload_bytes: u64,
    /// Most files accepted in one upload request.
    pub max_files_per_upload: usize,
    /// Accepted MIME types.
    pub allowed_types: Vec<String>,
    /// Report identical re-uploads as duplicates instead of rewriting them.
    pub detect_duplicates: bool,
    /// JSON file with the portal feature flags (optional).
    pub feature_flags_path: Option<PathBuf>,
    /// Directory of static portal pages served at `/` (optional).
    pub static_dir: Option<PathBuf>,
    /// Allowed CORS origin. Any origin when unset.
    pub cors_origin: Option<String>,
    /// Departments recognised in forwarded role claims, in priority order.
    pub departments: Vec<String>,
    /// Department assigned when no role names a known department.
    pub fallback_department: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on, binds to `0.0.0.0`
    /// - `HERMES_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:3000`)
    /// - `HERMES_DOCS_DIR`: document directory (default: `./docs`)
    /// - `HERMES_LOG_LEVEL`: log filter (default: `info`)
    /// - `HERMES_MAX_UPLOAD_BYTES`: per-file limit (default: 25 MiB)
    /// - `HERMES_MAX_FILES_PER_UPLOAD`: files per request (default: `20`)
    /// - `HERMES_ALLOWED_TYPES`: comma-separated MIME types (default: pdf, docx, txt, pptx, xlsx)
    /// - `HERMES_DETECT_DUPLICATES`: `true`/`1` to enable (default: `false`)
    /// - `HERMES_FEATURE_FLAGS`: path to the feature flag JSON (optional)
    /// - `HERMES_STATIC_DIR`: static pages directory (optional)
    /// - `HERMES_CORS_ORIGIN`: allowed CORS origin (optional)
    /// - `HERMES_DEPARTMENTS`: comma-separated known departments
    /// - `HERMES_FALLBACK_DEPARTMENT`: department when no role matches (default: `IT`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_addr = SocketAddr::from(DEFAULT_BIND_ADDR);

        // Priority: HERMES_BIND_ADDR > PORT > default
        let bind_addr = if let Some(addr) = lookup("HERMES_BIND_ADDR") {
            addr.parse().unwrap_or(default_addr)
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port.parse().unwrap_or(DEFAULT_BIND_ADDR.1);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            default_addr
        };

        let docs_dir = lookup("HERMES_DOCS_DIR")
            .map_or_else(|| PathBuf::from("./docs"), PathBuf::from);

        let log_level = lookup("HERMES_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let max_upload_bytes = lookup("HERMES_MAX_UPLOAD_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);

        let max_files_per_upload = lookup("HERMES_MAX_FILES_PER_UPLOAD")
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(20);

        let allowed_types = lookup("HERMES_ALLOWED_TYPES")
            .map(|v| {
                v.split(',')
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| DEFAULT_ALLOWED_TYPES.iter().map(|t| (*t).to_owned()).collect());

        let detect_duplicates = lookup("HERMES_DETECT_DUPLICATES")
            .is_some_and(|v| v == "true" || v == "1");

        let departments = lookup("HERMES_DEPARTMENTS")
            .map(|v| {
                v.split(',')
                    .map(|d| d.trim().to_owned())
                    .filter(|d| !d.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| KNOWN_DEPARTMENTS.iter().map(|d| (*d).to_owned()).collect());

        let fallback_department = lookup("HERMES_FALLBACK_DEPARTMENT")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| FALLBACK_DEPARTMENT.to_owned());

        Self {
            bind_addr,
            docs_dir,
            log_level,
            max_upload_bytes,
            max_files_per_upload,
            allowed_types,
            detect_duplicates,
            feature_flags_path: lookup("HERMES_FEATURE_FLAGS").map(PathBuf::from),
            static_dir: lookup("HERMES_STATIC_DIR").map(PathBuf::from),
            cors_origin: lookup("HERMES_CORS_ORIGIN").filter(|v| !v.is_empty()),
            departments,
            fallback_department,
        }
    }

    /// The upload policy derived from this configuration.
    #[must_use]
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size: self.max_upload_bytes,
            allowed_types: self.allowed_types.clone(),
            detect_duplicates: self.detect_duplicates,
        }
    }

    /// The role-to-department resolver for requester identification.
    #[must_use]
    pub fn department_resolver(&self) -> DepartmentResolver {
        DepartmentResolver::new(self.departments.clone(), self.fallback_department.clone())
    }

    /// Largest request body accepted on the upload route.
    #[must_use]
    pub fn upload_body_limit(&self) -> usize {
        let files = u64::try_from(self.max_files_per_upload).unwrap_or(u64::MAX);
        let limit = self
            .max_upload_bytes
            .saturating_mul(files)
            .saturating_add(BODY_LIMIT_SLACK);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 3000)));
        assert_eq!(config.docs_dir, PathBuf::from("./docs"));
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.max_files_per_upload, 20);
        assert_eq!(config.allowed_types.len(), 5);
        assert!(!config.detect_duplicates);
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn bind_addr_beats_port() {
        let config = config_from(&[("HERMES_BIND_ADDR", "0.0.0.0:8080"), ("PORT", "9000")]);
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));

        let config = config_from(&[("PORT", "9000")]);
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 9000)));
    }

    #[test]
    fn allowed_types_are_normalised() {
        let config = config_from(&[("HERMES_ALLOWED_TYPES", " Text/Plain ,,image/png")]);
        assert_eq!(config.allowed_types, vec!["text/plain", "image/png"]);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = config_from(&[
            ("HERMES_MAX_UPLOAD_BYTES", "lots"),
            ("HERMES_MAX_FILES_PER_UPLOAD", "0"),
        ]);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.max_files_per_upload, 20);
    }

    #[test]
    fn departments_default_to_the_known_list() {
        let config = ServerConfig::default();
        assert_eq!(config.departments.len(), KNOWN_DEPARTMENTS.len());
        assert_eq!(config.fallback_department, "IT");
        assert_eq!(config.department_resolver().resolve(["Finanzas"]), "Finanzas");
    }

    #[test]
    fn departments_can_be_replaced() {
        let config = config_from(&[
            ("HERMES_DEPARTMENTS", "Legal, Compras ,"),
            ("HERMES_FALLBACK_DEPARTMENT", "Compras"),
        ]);
        assert_eq!(config.departments, vec!["Legal", "Compras"]);

        let resolver = config.department_resolver();
        assert_eq!(resolver.resolve(["Legal"]), "Legal");
        assert_eq!(resolver.resolve(["Finanzas"]), "Compras");
    }

    #[test]
    fn policy_and_body_limit_follow_config() {
        let config = config_from(&[
            ("HERMES_MAX_UPLOAD_BYTES", "100"),
            ("HERMES_MAX_FILES_PER_UPLOAD", "3"),
            ("HERMES_DETECT_DUPLICATES", "1"),
        ]);
        let policy = config.upload_policy();
        assert_eq!(policy.max_file_size, 100);
        assert!(policy.detect_duplicates);
        assert_eq!(config.upload_body_limit(), 300 + 1024 * 1024);
    }
}
