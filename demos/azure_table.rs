use tracing::{error, info, warn};

use tracing_table_sink::init::init_tracing;
use tracing_table_sink::{Severity, TableHook};

/// Writes a few events to Azure Table Storage.
///
/// Credentials come from `ACCOUNT_NAME` / `ACCOUNT_KEY` because both
/// arguments are left empty. If they are missing or wrong the hook is
/// disabled, a diagnostic is printed and the program keeps running.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let hook = TableHook::new("", "", "applogs", Severity::Info);
    if !hook.is_enabled() {
        eprintln!("table hook disabled; events will only reach stdout");
    }
    init_tracing(hook)?;

    info!("boot");
    warn!(service = "billing", invoice = 991, "invoice overdue");
    error!(service = "auth", user_id = 42, reason = "invalid password", "authentication failed");
    Ok(())
}
