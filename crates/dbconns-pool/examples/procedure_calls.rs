//! Stored-procedure calls through the pool.
//!
//! Connects to the database selected by `DB_ENV`, then runs a handful of
//! procedure calls and prints pool status and metrics along the way.
//!
//! # Running
//!
//! ```bash
//! export DB_ENV=local
//! export LOCAL_DB_USER=root
//! export LOCAL_DB_PASSWORD=Password123!
//!
//! cargo run -p dbconns-pool --example procedure_calls
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use dbconns_client::{ConnectionParameters, MySqlConnector};
use dbconns_pool::{Pool, PoolConfig, PoolError, ProcedureError, Procedures};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let params = ConnectionParameters::from_env()?;
    let pool_config = PoolConfig::from_env(params.environment)?;

    println!("=== Stored Procedure Example ===\n");
    println!("Target: {}", params.redacted_url());
    println!("  Min connections: {}", pool_config.min_connections);
    println!("  Max connections: {}", pool_config.max_connections);
    println!("  Acquire timeout: {:?}", pool_config.connection_timeout);
    println!();

    let pool = Pool::new(MySqlConnector::new(params)?, pool_config).await?;
    let shutdown = pool.close_on_shutdown();
    print_pool_status(&pool);

    let procs = Procedures::new(pool.clone());

    // 1. A list-shaped call.
    println!("\n1. execute_list(get_user_list):");
    let users = procs.execute_list("get_user_list", &[]).await?;
    println!("  {} row(s)", users.len());
    for row in users.iter().take(5) {
        let id: i64 = row.get_by_name("UserId")?;
        let name: String = row.get_by_name("UserName")?;
        println!("  {id}: {name}");
    }

    // 2. A single-row call; no match is not an error.
    println!("\n2. execute_single(get_user_login):");
    match procs
        .execute_single("get_user_login", &["nobody@example.com".into(), "x".into()])
        .await?
    {
        Some(row) => println!("  logged in as {}", row.get_by_name::<String>("UserName")?),
        None => println!("  no matching user"),
    }

    // 3. Concurrent calls share the pool.
    println!("\n3. 10 concurrent list calls:");
    let start = Instant::now();
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let procs = procs.clone();
            tokio::spawn(async move { procs.execute_list("get_user_list", &[]).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }
    println!("  completed in {:?}", start.elapsed());
    print_pool_status(&pool);

    // 4. Exhaustion: hold every connection, then ask for one more.
    println!("\n4. Acquiring past the maximum:");
    let mut held = Vec::new();
    for _ in 0..pool.config().max_connections {
        held.push(pool.get().await?);
    }
    match pool.get_timeout(Duration::from_millis(500)).await {
        Err(PoolError::AcquisitionTimeout(waited)) => {
            println!("  timed out after {waited:?}, as expected");
        }
        Ok(_) => println!("  unexpectedly got a connection"),
        Err(e) => println!("  failed: {e}"),
    }
    for conn in held {
        conn.release().await;
    }

    // 5. A server-side failure names the procedure.
    println!("\n5. Calling a procedure that does not exist:");
    match procs.execute_without_result("no_such_procedure", &[]).await {
        Err(ProcedureError::Execution { procedure, source }) => {
            println!("  {procedure} failed: {source}");
        }
        other => println!("  unexpected result: {other:?}"),
    }

    print_pool_metrics(&pool);

    pool.close().await;
    shutdown.abort();
    println!("\nPool closed.");
    Ok(())
}

fn print_pool_status(pool: &Pool<MySqlConnector>) {
    let status = pool.status();
    println!("Pool status:");
    println!("  Available: {}", status.available);
    println!("  In use: {}", status.in_use);
    println!("  Total: {} (min {}, max {})", status.total, status.min, status.max);
    println!("  Utilization: {:.1}%", status.utilization());
}

fn print_pool_metrics(pool: &Pool<MySqlConnector>) {
    let metrics = pool.metrics();
    println!("\nPool metrics:");
    println!("  Connections created: {}", metrics.connections_created);
    println!("  Connections closed: {}", metrics.connections_closed);
    println!(
        "  Checkouts: {} ok / {} failed ({:.1}% success)",
        metrics.checkouts_successful,
        metrics.checkouts_failed,
        metrics.checkout_success_rate() * 100.0
    );
    println!(
        "  Health checks: {} ({:.1}% success)",
        metrics.health_checks_performed,
        metrics.health_check_success_rate() * 100.0
    );
    println!("  Rollbacks on return: {}", metrics.rollbacks_performed);
    println!("  Uptime: {:?}", metrics.uptime);
}
