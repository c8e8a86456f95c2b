use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::{ sync::Semaphore, task };
use tracing::{ debug, error };

use crate::client::LookupClient;
use crate::result::LookupResult;

/// Invoked once per completed lookup with (done, total, ip).
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

pub struct DispatcherOpt {
    pub client: Arc<LookupClient>,
    pub ips: Vec<String>,
    pub threads: usize,
    pub progress: Option<ProgressCallback>,
}

/// Fan out one fetch+extract task per input IP with at most `threads`
/// lookups in flight; excess tasks queue on the semaphore. Results are
/// collected in completion order, one per input IP, duplicates included.
/// A task that dies degrades to an `exception:` record for its IP only.
pub async fn run_batch(opt: DispatcherOpt) -> Vec<LookupResult> {
    let total = opt.ips.len();
    let workers = opt.threads.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    debug!("dispatching {} lookups across {} workers", total, workers);

    let mut pending = FuturesUnordered::new();
    for ip in opt.ips {
        let client = opt.client.clone();
        let semaphore = semaphore.clone();
        let task_ip = ip.clone();
        let handle = task::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    return LookupResult::with_error(&task_ip, format!("exception: {}", e));
                }
            };
            client.check_ip(&task_ip).await
        });
        pending.push(async move { (ip, handle.await) });
    }

    let mut results = Vec::with_capacity(total);
    while let Some((ip, joined)) = pending.next().await {
        let res = match joined {
            Ok(r) => r,
            Err(e) => {
                error!(ip = ip.as_str(), "lookup task died: {}", e);
                LookupResult::with_error(&ip, format!("exception: {}", e))
            }
        };
        if let Some(notify) = &opt.progress {
            notify(results.len() + 1, total, &res.ip);
        }
        results.push(res);
    }
    results
}
