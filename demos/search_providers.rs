//! Search every provider that has a key in the environment
//!
//! `UNSPLASH_API_KEY=... PIXABAY_API_KEY=... cargo run --example search_providers -- cats`

use stockframe::providers::{MemoryCredentialStore, ProviderRegistry};
use stockframe::{Config, SearchGateway};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let query = std::env::args().nth(1).unwrap_or_else(|| "mountains".to_string());
    println!("Stockframe - Search Example ({:?})\n", query);

    let mut registry = ProviderRegistry::with_builtin_providers(MemoryCredentialStore::new());
    for id in registry.list_providers() {
        let var = format!("{}_API_KEY", id.to_uppercase());
        if let Ok(key) = std::env::var(&var) {
            registry.set_credential(&id, key)?;
        }
    }

    let gateway = SearchGateway::http(&Config::default())?;
    for id in registry.list_providers() {
        println!("{}", id);
        println!("{}", "=".repeat(60));
        if !registry.has_credential(&id) {
            println!("  skipped: set {}_API_KEY\n", id.to_uppercase());
            continue;
        }
        match gateway.search(&registry, &query, &id) {
            Ok(results) => {
                for r in results.iter().take(5) {
                    println!("  {}x{}  {}", r.width, r.height, r.full_url);
                    println!("      {}", r.alt_text);
                }
                println!("  ({} results)\n", results.len());
            }
            Err(e) => println!("  error: {}\n", e),
        }
    }
    Ok(())
}
