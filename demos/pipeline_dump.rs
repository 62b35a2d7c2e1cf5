//! Pipeline dump - fetch and print everything a device describes.
//!
//! This demo shows:
//! - Loading the client configuration from a JSON file and the environment
//! - Installing the diagnostic sink
//! - Connecting to the backend and fetching every pipeline collection
//! - Running a graph query over the result
//!
//! # Running
//!
//! ```text
//! MATCH_IFINDEX=4 MATCH_LOG_LEVEL=debug \
//!     cargo run --example pipeline_dump -- /etc/matchd/client.json
//! ```

use matchlib_nl::control::ClientConfig;
use matchlib_nl::query;
use matchlib_nl::Client;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::from_path(path)?,
        None => ClientConfig::default(),
    };
    config.apply_env()?;
    let diag = config.log.install("pipeline_dump")?;

    let mut client = Client::builder().config(&config).connect()?;
    tracing::info!(session = %client.session(), "connected");

    let headers = client.get_headers()?;
    println!("headers: {:#?}", headers);

    let header_graph = client.get_header_graph()?;
    println!("header graph: {:#?}", header_graph);

    let actions = client.get_actions()?;
    println!("actions: {:#?}", actions);

    let tables = client.get_tables()?;
    println!("tables: {:#?}", tables);

    let table_graph = client.get_table_graph()?;
    println!("table graph: {:#?}", table_graph);

    let ports = client.get_ports(0, 0)?;
    println!("ports: {:#?}", ports);

    for table in &tables {
        let rules = client.get_rules(table.uid, 0, 0)?;
        println!("table {} ({}): {} rules", table.uid, table.name, rules.len());
    }

    if let Some(root) = header_graph.first() {
        println!(
            "headers reachable from {}: {:?}",
            root.name,
            query::reachable_headers(&header_graph, root.uid)
        );
    }

    diag.close();
    Ok(())
}
