use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{SocketAddr, TcpListener};
use std::sync::OnceLock;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("surge=debug,mock_service=info")
            .with_test_writer()
            .init();

        // NOTE: Only installs the recorder; nothing is scraped during tests
        let _ = PrometheusBuilder::new().install_recorder();
    });
}

/// Starts a mock service on an ephemeral port owned by the calling test's runtime.
#[allow(unused)]
pub async fn mock_server() -> String {
    init();
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let addr = mock_service::spawn(addr).await.unwrap();
    format!("http://{addr}")
}

/// An address nothing is listening on.
#[allow(unused)]
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}
