use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct GrpcConfig {
    #[envconfig(from = "GRPC_LISTEN_ADDR", default = "0.0.0.0:50051")]
    pub listen_addr: String,

    #[envconfig(from = "GRPC_ENABLED", default = "false")]
    pub enabled: bool,
}
