use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct RouterConfig {
    /// Prefix every mount is nested under. Empty or `/` mounts at the root.
    #[envconfig(from = "ROUTER_API_PREFIX", default = "/v1")]
    pub api_prefix: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/v1".to_string(),
        }
    }
}
