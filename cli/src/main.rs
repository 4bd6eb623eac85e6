use threadvault_cli::core::CoreApp;
use threadvault_cli::data::error::DataError;

#[tokio::main]
async fn main() {
    if let Err(e) = CoreApp::run().await {
        eprintln!("\nError: {e:#}\n");
        let code = e
            .downcast_ref::<DataError>()
            .map_or(threadvault_cli::core::constants::EXIT_RUNTIME, DataError::exit_code);
        std::process::exit(code);
    }
}
