use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct HttpConfig {
    #[envconfig(from = "HTTP_LISTEN_ADDR", default = "0.0.0.0:8080")]
    pub listen_addr: String,
}
