use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Builder;

use workpool::{PoolConfig, PoolInner};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    rt.block_on(async {
        let pool = PoolInner::with_config(PoolConfig::cpu_bound());
        let done = Arc::new(AtomicUsize::new(0));

        let now = Instant::now();
        for i in 0..100_000usize {
            let done = done.clone();
            pool.submit(async move {
                let _ = i;
                done.fetch_add(1, Ordering::Relaxed);
            })
            .await
            .unwrap();
        }

        while done.load(Ordering::Relaxed) < 100_000 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        pool.close().await;

        let metrics = pool.metrics();
        println!("elapsed: {:?}", now.elapsed());
        println!(
            "completed: {} panicked: {} utilization at exit: {:.1}%",
            metrics.completed,
            metrics.panicked,
            metrics.utilization() * 100.0
        );
    });
}
