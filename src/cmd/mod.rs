//! Subcommand dispatch and execution.
//!
//! [`dispatch`] routes the parsed CLI to [`proxy`] (the gateway) or
//! [`events`] (the event service). Each handler lives in its own submodule.

pub mod events;
pub mod proxy;

use crate::cli::{Cli, Commands};
use crate::error::StranglerError;

pub async fn dispatch(cli: Cli) -> Result<(), StranglerError> {
    match cli.command {
        Some(Commands::Proxy(args)) => proxy::execute(*args).await,
        Some(Commands::Events(args)) => events::execute(*args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  strangler v{version}: strangler-fig gateway and event pipeline\n\n  \
         No command provided. To get started:\n\n    \
         strangler proxy                   Start the gateway (everything to the monolith)\n    \
         strangler events                  Start the event service against Kafka\n    \
         strangler events --broker memory  Start the event service without Kafka\n    \
         strangler --help                  See all commands and options\n"
    );
}
