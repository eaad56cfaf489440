//! Build and host information: logged once at startup and served as JSON.

use std::fs;
use std::sync::Arc;

use axum::routing::{get, MethodRouter};
use axum::Json;
use lifecycle::{AssemblyError, Hook, Lifecycle, Registry};
use routing::{HandlerRoute, RouteRegistry};
use serde::Serialize;
use tracing::info;

pub const INFO_PATH: &str = "/_info";

const UNKNOWN: &str = "unknown";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub platform: String,
    pub hostname: String,
    pub commit: String,
    pub build_date: String,
}

impl BuildInfo {
    /// `version` is the binary's package version; commit and build date come
    /// from `BUILD_COMMIT` and `BUILD_DATE` at compile time.
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            hostname: hostname(),
            commit: option_env!("BUILD_COMMIT").unwrap_or(UNKNOWN).to_string(),
            build_date: option_env!("BUILD_DATE").unwrap_or(UNKNOWN).to_string(),
        }
    }

    /// Start hook logging the banner.
    pub fn banner_hook(self: &Arc<Self>) -> Hook {
        let info = self.clone();
        Hook::new("build-info").on_start(move |_| async move {
            info!(
                version = %info.version,
                platform = %info.platform,
                hostname = %info.hostname,
                commit = %info.commit,
                build_date = %info.build_date,
                "starting"
            );
            Ok(())
        })
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| fs::read_to_string("/proc/sys/kernel/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// `GET /_info`.
pub struct InfoRoute {
    info: Arc<BuildInfo>,
}

impl InfoRoute {
    pub fn new(info: Arc<BuildInfo>) -> Self {
        Self { info }
    }
}

impl HandlerRoute for InfoRoute {
    fn route_pattern(&self) -> &str {
        INFO_PATH
    }

    fn method_router(&self) -> MethodRouter {
        let info = self.info.clone();
        get(move || async move { Json(info.as_ref().clone()) })
    }
}

/// Supply `info`, register its banner hook and its `/_info` route.
pub fn provide_build_info(registry: &mut Registry, info: BuildInfo) -> Result<(), AssemblyError> {
    registry.supply(info)?;
    registry.invoke(|(info, lifecycle): (Arc<BuildInfo>, Arc<Lifecycle>)| {
        lifecycle.append(info.banner_hook())
    });
    registry.provide_handler(|info: Arc<BuildInfo>| InfoRoute::new(info));
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use lifecycle::HookContext;
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn build_info_has_platform_and_fallbacks() {
        let info = BuildInfo::new("1.2.3");
        assert_eq!(info.version, "1.2.3");
        assert!(info.platform.contains('/'));
        assert!(!info.hostname.is_empty());
        assert!(!info.commit.is_empty());
    }

    #[tokio::test]
    async fn info_route_serves_json() {
        let info = Arc::new(BuildInfo::new("1.2.3"));
        let route = InfoRoute::new(info.clone());
        let router = Router::new().route(route.route_pattern(), route.method_router());

        let response = router
            .oneshot(Request::builder().uri("/_info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["version"], "1.2.3");
        assert_eq!(json["hostname"], info.hostname.as_str());
    }

    #[tokio::test]
    async fn banner_hook_is_appended_and_started() {
        let mut registry = Registry::new();
        provide_build_info(&mut registry, BuildInfo::new("1.2.3")).unwrap();
        let lifecycle = registry.build().unwrap().lifecycle();

        assert_eq!(lifecycle.len(), 1);
        lifecycle.start(HookContext::default()).await.unwrap();
    }
}
