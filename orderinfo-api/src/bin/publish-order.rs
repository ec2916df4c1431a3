//! Order Publisher Binary
//!
//! Publishes JSON order files to the configured order subject. Each file
//! holds one order. Used to feed a local stack by hand.
//!
//! Usage:
//!   cargo run -p orderinfo-api --bin publish-order -- order1.json order2.json

use orderinfo_api::{NatsOrderPublisher, StreamConfig};

#[tokio::main]
async fn main() {
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("Usage: publish-order <order.json>...");
        std::process::exit(2);
    }

    let config = StreamConfig::from_env();
    let publisher = match NatsOrderPublisher::connect(&config).await {
        Ok(publisher) => publisher,
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    let mut failed = 0usize;
    for path in &paths {
        let payload = match std::fs::read(path) {
            Ok(payload) => payload,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                failed += 1;
                continue;
            }
        };
        match publisher.publish(payload).await {
            Ok(sequence) => println!("{} -> {} (seq {})", path, publisher.topic(), sequence),
            Err(e) => {
                eprintln!("{}: {}", path, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
