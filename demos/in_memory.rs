use std::sync::Arc;

use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;

use tracing_table_sink::layer::TableLayer;
use tracing_table_sink::memory::{MemoryConnector, MemoryTableService};
use tracing_table_sink::storage::Credentials;
use tracing_table_sink::{HookInitializer, Severity};

fn main() {
    let service = Arc::new(MemoryTableService::new());
    let hook = HookInitializer::new(MemoryConnector::new(Arc::clone(&service))).initialize(
        &Credentials::new("devstoreaccount1", "a2V5"),
        "applogs",
        Severity::Info,
    );

    let subscriber = tracing_subscriber::registry().with(TableLayer::new(hook));
    tracing::subscriber::with_default(subscriber, || {
        debug!("below the threshold, not stored");
        info!("boot");
        error!(service = "billing", invoice = 991, "charge failed");
    });

    for row in service.rows("applogs") {
        println!("{} / {} -> {:?}", row.partition_key, row.row_key, row.properties);
    }
}
