use std::sync::Arc;

use axum::Router;
use logging::Logger;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::RouterConfig;
use crate::error::RouteError;
use crate::route::{Route, RouteEntry, RouteKind};

/// The composed application router.
#[derive(Clone, Debug)]
pub struct HttpRouter(Router);

impl HttpRouter {
    pub fn router(&self) -> Router {
        self.0.clone()
    }

    pub fn into_inner(self) -> Router {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param,
    Wildcard,
}

/// An entry with its effective path resolved.
struct Planned<'a> {
    entry: &'a RouteEntry,
    path: String,
    segments: Vec<Segment>,
}

impl Planned<'_> {
    fn kind(&self) -> RouteKind {
        self.entry.kind()
    }

    /// Whether `self` and `other` would claim some common path.
    ///
    /// Walks both patterns segment by segment. A mount owns every path beneath
    /// its prefix, a wildcard owns every remaining suffix, and path parameters
    /// overlap each other regardless of name. A static segment next to a
    /// parameter is not a conflict: the static route takes precedence.
    fn conflicts_with(&self, other: &Planned<'_>) -> bool {
        let mut index = 0;
        loop {
            match (self.segments.get(index), other.segments.get(index)) {
                (None, None) => return true,
                (None, Some(_)) => return self.kind() == RouteKind::Mount,
                (Some(_), None) => return other.kind() == RouteKind::Mount,
                (Some(Segment::Wildcard), Some(_)) | (Some(_), Some(Segment::Wildcard)) => {
                    return true
                }
                (Some(Segment::Param), Some(Segment::Param)) => {}
                (Some(Segment::Static(a)), Some(Segment::Static(b))) if a == b => {}
                (Some(_), Some(_)) => return false,
            }
            index += 1;
        }
    }
}

/// Compose `routes` into one router, in the order given.
///
/// Mounts are nested under `config.api_prefix`, handlers are routed at the
/// root. Every effective pattern is validated and checked against every
/// other before the first one is wired, so a conflict never leaves a
/// partially built router. Path parameters match each other regardless of
/// their names and a wildcard claims every path beneath it. When `logger` is
/// present each route is logged and requests are traced.
pub fn build_router(
    config: &RouterConfig,
    routes: &[Arc<RouteEntry>],
    logger: Option<&Logger>,
) -> Result<HttpRouter, RouteError> {
    let prefix = api_prefix(&config.api_prefix)?;

    let mut plan: Vec<Planned<'_>> = Vec::with_capacity(routes.len());
    for entry in routes.iter().map(Arc::as_ref) {
        let path = effective_path(&prefix, entry)?;
        let planned = Planned {
            entry,
            segments: segments(&path),
            path,
        };
        if let Some(earlier) = plan.iter().find(|p| p.conflicts_with(&planned)) {
            return Err(RouteError::RouteConflict {
                pattern: planned.path,
                first: earlier.entry.owner,
                second: planned.entry.owner,
            });
        }
        plan.push(planned);
    }

    let mut router = Router::new();
    for planned in &plan {
        router = match &planned.entry.route {
            Route::Mount(mount) => {
                router.nest(&planned.path, mount.register_routes(Router::new()))
            }
            Route::Handler(handler) => router.route(&planned.path, handler.method_router()),
        };
        if logger.is_some() {
            info!(
                pattern = %planned.path,
                kind = %planned.kind(),
                owner = planned.entry.owner,
                "registering route"
            );
        }
    }
    debug!(routes = plan.len(), prefix = %prefix, "router built");

    if logger.is_some() {
        router = router.layer(TraceLayer::new_for_http());
    }
    Ok(HttpRouter(router.layer(CatchPanicLayer::new())))
}

fn api_prefix(prefix: &str) -> Result<String, RouteError> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Ok(String::new());
    }
    if !prefix.starts_with('/') {
        return Err(RouteError::InvalidPattern {
            pattern: prefix.to_string(),
            owner: "RouterConfig",
            reason: "api prefix must start with '/'",
        });
    }
    if prefix.contains(['*', ':']) {
        return Err(RouteError::InvalidPattern {
            pattern: prefix.to_string(),
            owner: "RouterConfig",
            reason: "api prefix must be static",
        });
    }
    Ok(prefix.to_string())
}

fn effective_path(prefix: &str, entry: &RouteEntry) -> Result<String, RouteError> {
    let pattern = entry.pattern();
    let invalid = |reason| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        owner: entry.owner,
        reason,
    };

    if pattern.is_empty() {
        return Err(invalid("pattern is empty"));
    }
    if !pattern.starts_with('/') {
        return Err(invalid("pattern must start with '/'"));
    }
    if let Some(reason) = segment_error(pattern) {
        return Err(invalid(reason));
    }

    match entry.kind() {
        RouteKind::Handler => Ok(pattern.to_string()),
        RouteKind::Mount => {
            if pattern == "/" {
                return Err(invalid("cannot mount at '/'"));
            }
            if pattern.ends_with('/') {
                return Err(invalid("mount prefix must not end with '/'"));
            }
            if pattern.contains('*') {
                return Err(invalid("mount prefix must not contain a wildcard"));
            }
            Ok(format!("{prefix}{pattern}"))
        }
    }
}

/// Checks the captures of a pattern the way the router will parse them.
fn segment_error(pattern: &str) -> Option<&'static str> {
    let pieces: Vec<&str> = pattern.split('/').skip(1).collect();
    for (position, piece) in pieces.iter().enumerate() {
        let (capture, name) = match piece.strip_prefix([':', '*']) {
            Some(name) => (true, name),
            None => (false, *piece),
        };
        if name.contains([':', '*']) {
            return Some("':' and '*' may only start a segment");
        }
        if capture && name.is_empty() {
            return Some("path parameter must be named");
        }
        if piece.starts_with('*') && position + 1 != pieces.len() {
            return Some("wildcard must be the last segment");
        }
    }
    None
}

fn segments(path: &str) -> Vec<Segment> {
    path.split('/')
        .skip(1)
        .map(|segment| {
            if segment.starts_with(':') {
                Segment::Param
            } else if segment.starts_with('*') {
                Segment::Wildcard
            } else {
                Segment::Static(segment.to_string())
            }
        })
        .collect()
}
