//! Replica - Publishing and Consuming a Schema
//!
//! Two replicas share one in-process log. A producer registers an `orders`
//! schema and a second version of it; the replicas pick both up from the
//! log and use them to encode and decode values.
//!
//! ## 1. Waiting Before Data Exists
//!
//! The readiness waits are registered *before* anything is published. They
//! fire once the alias and the entry behind it have both been applied, in
//! whatever order the log delivers them.
//!
//! ## 2. Independent Replicas
//!
//! Each replica reads the log from the start with its own cursor. A replica
//! started late catches up by replaying history.
//!
//! ## 3. Cancellation
//!
//! Waits have no timeout of their own. Here they are bounded by Ctrl-C
//! through a `CancellationToken`.
//!
//! Run with `RUST_LOG=schemata=debug` to see every update being applied.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use schemata::{codec::JsonSchemaCompiler, explorer::AliasListDto, memory::MemoryLog, *};

const ORDER_V0: &str = r#"{
    "type": "object",
    "properties": { "sku": { "type": "string" } },
    "required": ["sku"]
}"#;

const ORDER_V1: &str = r#"{
    "type": "object",
    "properties": {
        "sku": { "type": "string" },
        "quantity": { "type": "integer", "minimum": 1 }
    },
    "required": ["sku", "quantity"]
}"#;

#[tokio::main]
async fn main() -> Result {
    let directive = "schemata=info".parse().map_err(Error::external)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    let log = MemoryLog::new();
    let repo = CatalogRepository::new(log.connect(), Config::default());
    let handle = repo.run().await?;

    let v0 = NameVersion::origin("orders");
    let v1 = v0.next();
    let versioned = repo.versioned();
    let v0_ready = versioned.wait_ready(&v0);
    let v1_ready = versioned.wait_ready(&v1);

    let updater = Updater::new(log.connect(), Config::default());
    updater
        .create_schema(v0.name(), ORDER_V0, &JsonSchemaCompiler)
        .await?;
    updater
        .publish_version(&v1, ORDER_V1, &JsonSchemaCompiler)
        .await?;

    for (version, ready) in [(&v0, v0_ready), (&v1, v1_ready)] {
        if !ready.or_cancelled(&token).await? {
            println!("Interrupted while waiting for {version}");
            return handle.shutdown().await;
        }
        println!("{version} is ready");
    }

    let order = json!({"sku": "A-1", "quantity": 3});
    let bytes = versioned.encode(&v1, &order)?;
    println!("Encoded with {v1}: {}", String::from_utf8_lossy(&bytes));
    println!("Decoded with {v0}: {}", versioned.decode(&v0, &bytes)?);

    if let Err(e) = versioned.encode(&v1, &json!({"sku": "A-1"})) {
        println!("Rejected by {v1}: {e}");
    }

    // A replica started now replays the log and ends up in the same state.
    let late = CatalogRepository::new(log.connect(), Config::default());
    let late_handle = late.run().await?;
    if late.wait_alias_ready(&v1.alias()).or_cancelled(&token).await? {
        let latest = late.versioned().latest_version("orders");
        println!(
            "Late replica: {} entries, latest orders version {:?}",
            late.count(),
            latest.map(|v| v.to_string())
        );
        let aliases =
            serde_json::to_string(&AliasListDto::collect(&late)).map_err(Error::external)?;
        println!("Late replica aliases: {aliases}");
    }

    late_handle.shutdown().await?;
    handle.shutdown().await
}
