use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use taskhive::config::{ExecutorConfig, LogConfig, TaskConfig};
use taskhive::executor::TaskExecutor;
use taskhive::logging;
use taskhive::registry::TaskRegistry;
use taskhive::task::Task;

const TAG: &str = "Main";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = LogConfig::from_env();
    let _log_guard = logging::init_tracing(&log_config)?;

    let run_for = std::env::var("TASKHIVE_DEMO_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(3));

    eprintln!("taskhive v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Demo duration: {run_for:?}");

    let registry = TaskRegistry::global();
    registry.initialize();

    let executor = TaskExecutor::with_config(ExecutorConfig::from_env())?;

    // ── Tasks ───────────────────────────────────────────────────────────
    let beats = Arc::new(AtomicU64::new(0));
    let heartbeat = {
        let beats = Arc::clone(&beats);
        Arc::new(Task::from_fn("heartbeat", move |ctx| {
            let beats = Arc::clone(&beats);
            async move {
                while ctx.sleep(Duration::from_millis(500)).await {
                    let n = beats.fetch_add(1, Ordering::SeqCst) + 1;
                    logging::record("Heartbeat", &format!("beat {n}"));
                }
                Ok(())
            }
        })
        .with_config(TaskConfig::from_env())?)
    };
    registry.register_task(Arc::clone(&heartbeat)).await;
    registry.start_task("heartbeat", false).await;

    let monitor = Arc::new(Task::from_fn("heartbeat-monitor", |ctx| async move {
        let parent = ctx.parent_id.clone().unwrap_or_default();
        logging::other("Monitor", &format!("watching {parent}"));
        ctx.cancelled().await;
        Ok(())
    }));
    heartbeat.add_child_task(monitor).await;

    // ── Periodic status report ──────────────────────────────────────────
    let reporter = executor.schedule_at_fixed_rate(
        || async {
            for (name, status) in TaskRegistry::global().get_all_task_status().await {
                logging::system(
                    TAG,
                    &format!(
                        "{name}: {} (children: {}, executions: {})",
                        status.state, status.child_task_count, status.execute_count
                    ),
                );
            }
            Ok(())
        },
        Duration::ZERO,
        Duration::from_secs(1),
    );

    tokio::select! {
        _ = tokio::time::sleep(run_for) => {}
        _ = tokio::signal::ctrl_c() => {
            logging::system(TAG, "Interrupted, shutting down");
        }
    }

    reporter.cancel();
    for stats in registry.all_statistics().await {
        eprintln!("\n{stats}");
    }
    eprintln!("\nHeartbeats: {}", beats.load(Ordering::SeqCst));
    let statuses = registry.get_all_task_status().await;
    println!("{}", serde_json::to_string_pretty(&statuses)?);

    registry.cleanup().await;
    executor.shutdown().await;
    Ok(())
}
