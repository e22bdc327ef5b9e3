#![allow(dead_code)] // each test binary uses a different subset

pub mod builders;
pub mod hooked_store;
pub mod mock_driver;
pub mod strategies;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use hooked_store::HookedStore;
#[allow(unused_imports)]
pub use mock_driver::*;

use schemaflow_core::config::LoggingConfig;
use schemaflow_core::logging::init_logging;

/// Install the test subscriber once; `RUST_LOG` controls the output
pub fn init_test_logging() {
    init_logging(&LoggingConfig {
        level: "warn".to_string(),
        ..Default::default()
    });
}
