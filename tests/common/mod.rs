#![allow(dead_code)]

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test environment with RUST_LOG=WARN
pub fn init_test_env() {
    INIT.call_once(|| {
        std::env::set_var("RUST_LOG", "warn");
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub mod test_database {
    use lazy_static::lazy_static;
    use std::sync::Arc;
    use testcontainers::{clients::Cli, Container};
    use testcontainers_modules::postgres::Postgres;

    pub struct TestDatabase {
        pub connection_string: String,
        _container: Container<'static, Postgres>
    }

    impl TestDatabase {
        pub fn new() -> Self {
            // Create a static CLI instance
            lazy_static! {
                static ref DOCKER: Arc<Cli> = Arc::new(Cli::default());
            }

            // Start PostgreSQL container
            let container = DOCKER.run(Postgres::default());
            let port = container.get_host_port_ipv4(5432);

            let connection_string = format!(
                "host=localhost port={} user=postgres password=postgres dbname=postgres",
                port
            );

            TestDatabase {
                connection_string,
                _container: container
            }
        }
    }
}
