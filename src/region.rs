// Region resolution for the backend proxy.
//
// Maps a caller's region key to the base URL of the regional chat backend.
// The mapping is a single JSON object in the environment
// (ASSIST_BACKEND_URL_REGIONS) and is re-read on every lookup so a
// configuration change takes effect without a restart.

use std::collections::HashMap;

use axum::http::Uri;

/// Environment variable holding the region -> base URL JSON object,
/// e.g. `{"us":"https://us.backend.example.com/api","eu":"https://eu.backend.example.com/api"}`.
pub const REGION_MAP_VAR: &str = "ASSIST_BACKEND_URL_REGIONS";

/// Environment variable naming the region used when a request carries none.
pub const DEFAULT_REGION_VAR: &str = "ASSIST_DEFAULT_REGION";

/// Fallback region when neither the request nor the environment names one.
pub const FALLBACK_REGION: &str = "us";

/// Request header naming the caller's region.
pub const USER_REGION_HEADER: &str = "x-user-region";

// ---------------------------------------------------------------------------
// RegionSource trait (dependency injection point)
// ---------------------------------------------------------------------------

/// Abstraction over where the region mapping comes from.
///
/// `EnvSource` reads the process environment on every call; `MapSource`
/// holds a fixed mapping (used in tests to avoid process-global env state).
pub trait RegionSource: Send + Sync {
    /// The raw JSON mapping, or `None` when unconfigured.
    fn mapping(&self) -> Option<String>;

    /// The region to use when the request carries none.
    fn default_region(&self) -> String;
}

/// Reads the mapping from the process environment per call.
pub struct EnvSource;

impl RegionSource for EnvSource {
    fn mapping(&self) -> Option<String> {
        std::env::var(REGION_MAP_VAR).ok()
    }

    fn default_region(&self) -> String {
        std::env::var(DEFAULT_REGION_VAR).unwrap_or_else(|_| FALLBACK_REGION.to_string())
    }
}

/// Fixed mapping for tests.
pub struct MapSource {
    pub mapping: String,
    pub default_region: String,
}

impl MapSource {
    pub fn new(mapping: impl Into<String>) -> Self {
        Self {
            mapping: mapping.into(),
            default_region: FALLBACK_REGION.to_string(),
        }
    }
}

impl RegionSource for MapSource {
    fn mapping(&self) -> Option<String> {
        Some(self.mapping.clone())
    }

    fn default_region(&self) -> String {
        self.default_region.clone()
    }
}

// ---------------------------------------------------------------------------
// Backend target
// ---------------------------------------------------------------------------

/// A resolved backend, split into the pieces forwarding composes separately.
///
/// `origin` is `scheme://authority` with no trailing slash; `path_prefix` is
/// the pathname of the configured URL with any trailing `/` stripped (empty
/// when the URL has no path). The upstream URL for a request is
/// `{origin}{path_prefix}{route path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub origin: String,
    pub path_prefix: String,
}

impl BackendTarget {
    /// Split a configured base URL into origin and path prefix.
    ///
    /// Returns `None` for URLs with no scheme or host, which cannot be
    /// forwarded to.
    fn from_base_url(base_url: &str) -> Option<Self> {
        let uri: Uri = base_url.parse().ok()?;
        let scheme = uri.scheme_str()?;
        let authority = uri.authority()?;

        let path = uri.path().trim_end_matches('/');

        Some(Self {
            origin: format!("{scheme}://{authority}"),
            path_prefix: path.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a region key to a backend target.
///
/// An absent `region` falls back to the source's default region. An unknown
/// region, a missing mapping, or an unparseable base URL all yield `None`;
/// the route layer converts that into its fixed error response rather than
/// attempting a forward that can only fail.
pub fn resolve(source: &dyn RegionSource, region: Option<&str>) -> Option<BackendTarget> {
    let region = match region {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => source.default_region(),
    };

    let raw = match source.mapping() {
        Some(raw) => raw,
        None => {
            tracing::warn!(var = REGION_MAP_VAR, "region mapping is not configured");
            return None;
        }
    };

    // Re-parsed per lookup by design: env changes apply without restart.
    let map: HashMap<String, String> = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(var = REGION_MAP_VAR, error = %e, "region mapping is not valid JSON");
            return None;
        }
    };

    let base_url = match map.get(&region) {
        Some(url) => url,
        None => {
            tracing::warn!(region = %region, "no backend URL configured for region");
            return None;
        }
    };

    let target = BackendTarget::from_base_url(base_url);
    if target.is_none() {
        tracing::warn!(region = %region, base_url = %base_url, "configured backend URL is not absolute");
    } else {
        tracing::debug!(region = %region, base_url = %base_url, "resolved backend");
    }
    target
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
