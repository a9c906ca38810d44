use codebox_core::telemetry::configure_tracing;

#[tokio::main]
async fn main() {
    // Stdout carries the result; diagnostics stay on stderr.
    if let Err(e) = configure_tracing("warn", false) {
        eprintln!("{}", e);
    }

    println!("{}", codebox_guest::run_from_env().await);
}
