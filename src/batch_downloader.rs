use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use reqwest::Client;
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use crate::download_configuration::DownloadConfiguration;
use crate::download_operation::DownloadOperation;
use crate::download_receiver::DownloadReceiver;
use crate::download_sender::DownloadSender;
use crate::download_status::DownloadStatus;
use crate::download_task::{DownloadTask, DownloadTaskConfiguration};
use crate::download_tracker;
use crate::error::DownloadError;

/// Invoked once per completed image with (completed so far, total), in
/// completion order.
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

pub struct BatchDownloader {
    config: Arc<DownloadConfiguration>,
    client: Arc<Client>,
    completed_count: Arc<AtomicU32>,
    cancel_token: CancellationToken,
    sender: Arc<DownloadSender>,
    receiver: DownloadReceiver,
    progress_callback: Option<ProgressCallback>,
    thread_handle: Option<JoinHandle<()>>,
}

impl BatchDownloader {
    pub fn new(config: DownloadConfiguration) -> BatchDownloader {
        let client = build_client(&config);
        let (sender, receiver) = download_tracker::new();
        BatchDownloader {
            config: Arc::new(config),
            client: Arc::new(client),
            completed_count: Arc::new(AtomicU32::new(0)),
            cancel_token: CancellationToken::new(),
            sender: Arc::new(sender),
            receiver,
            progress_callback: None,
            thread_handle: None,
        }
    }

    pub fn set_progress_callback(&mut self, on_progress: ProgressCallback) {
        self.progress_callback = Some(on_progress);
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn operation(&self) -> DownloadOperation {
        DownloadOperation::new(self.cancel_token.clone(), self.receiver.clone())
    }

    pub fn start_download(&mut self) {
        let _ = self.sender.status_sender.send(DownloadStatus::Pending.into());
        let handle = spawn(async_start_download(
            self.config.clone(),
            self.client.clone(),
            self.completed_count.clone(),
            self.cancel_token.clone(),
            self.sender.clone(),
            self.progress_callback.clone()));
        self.thread_handle = Some(handle);
    }

    pub fn is_done(&self) -> bool {
        if let Some(handle) = &self.thread_handle {
            return handle.is_finished();
        }
        false
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_count.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        tracing::info!("stop requested, cancelling in-flight downloads");
        self.cancel_token.cancel();
    }
}

/// Downloads `total_count` copies of the source URL into the save directory
/// and returns once every image is written, the run fails, or the cancel
/// token fires. `Err(DownloadError::Cancelled)` is the expected outcome of an
/// operator stop; any other error aborted the run.
pub async fn download(
    config: DownloadConfiguration,
    cancel_token: CancellationToken,
    on_progress: Option<ProgressCallback>,
) -> crate::error::Result<()> {
    let client = Arc::new(build_client(&config));
    let config = Arc::new(config);
    let completed_count = Arc::new(AtomicU32::new(0));
    let (sender, _receiver) = download_tracker::new();
    run_batches(&config, &client, &completed_count, &cancel_token, &Arc::new(sender), &on_progress).await
}

fn build_client(config: &DownloadConfiguration) -> Client {
    let mut builder = Client::builder();
    if config.timeout > 0 {
        builder = builder.timeout(Duration::from_secs(config.timeout));
    }
    builder.build().unwrap_or_else(|_| Client::new())
}

fn change_download_status(sender: &Arc<DownloadSender>, to_status: DownloadStatus) {
    let _ = sender.status_sender.send(to_status.into());
}

async fn async_start_download(
    config: Arc<DownloadConfiguration>,
    client: Arc<Client>,
    completed_count: Arc<AtomicU32>,
    cancel_token: CancellationToken,
    sender: Arc<DownloadSender>,
    on_progress: Option<ProgressCallback>) {

    if cancel_token.is_cancelled() {
        change_download_status(&sender, DownloadStatus::Stop);
        return;
    }

    change_download_status(&sender, DownloadStatus::Download);
    let _ = sender.total_count_sender.send(config.total_count);

    tracing::info!(
        "starting batch download: {} images, {} in parallel",
        config.total_count, config.parallel_count
    );

    match run_batches(&config, &client, &completed_count, &cancel_token, &sender, &on_progress).await {
        Ok(()) => {
            change_download_status(&sender, DownloadStatus::Complete);
            tracing::info!("batch download complete: {} images", config.total_count);
        }
        Err(DownloadError::Cancelled) => {
            change_download_status(&sender, DownloadStatus::Stop);
            tracing::info!(
                "batch download cancelled after {} images",
                completed_count.load(Ordering::SeqCst)
            );
        }
        Err(e) => {
            tracing::error!("batch download failed: {}", e);
            let _ = sender.error_sender.send(e);
            change_download_status(&sender, DownloadStatus::Failed);
        }
    }
}

/// Runs the index range `[0, total_count)` in consecutive batches of at most
/// `parallel_count` tasks. Every batch is joined to completion before the
/// next one starts, so no more than `parallel_count` downloads are in flight
/// at any instant.
async fn run_batches(
    config: &Arc<DownloadConfiguration>,
    client: &Arc<Client>,
    completed_count: &Arc<AtomicU32>,
    cancel_token: &CancellationToken,
    sender: &Arc<DownloadSender>,
    on_progress: &Option<ProgressCallback>,
) -> crate::error::Result<()> {
    let total_count = config.total_count;
    let url = config.get_url();
    let save_path = config.get_save_path();

    let mut offset = 0u32;
    while offset < total_count {
        if cancel_token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let batch_count = config.parallel_count.min(total_count - offset);
        let mut handles = Vec::with_capacity(batch_count as usize);
        for j in 0..batch_count {
            let index = offset + j;
            let task_config = DownloadTaskConfiguration {
                url: url.clone(),
                save_path: save_path.clone(),
                index,
                retry_times_on_failure: config.retry_times_on_failure,
            };
            let client = client.clone();
            let cancel_token = cancel_token.clone();
            let completed_count = completed_count.clone();
            let sender = sender.clone();
            let on_progress = on_progress.clone();
            handles.push(spawn(async move {
                let mut task = DownloadTask::new(task_config);
                let result = task.start_download(client, cancel_token).await;
                if result.is_ok() {
                    let completed = completed_count.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = sender.completed_count_sender.send(completed);
                    if let Some(on_progress) = &on_progress {
                        on_progress(completed, total_count);
                    }
                    tracing::debug!("image {} downloaded ({}/{})", index, completed, total_count);
                }
                result
            }));
        }

        let mut cancelled = false;
        let mut failure: Option<DownloadError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(DownloadError::Cancelled)) => {
                    cancelled = true;
                }
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                Err(_) => {
                    if failure.is_none() {
                        failure = Some(DownloadError::DownloadTask);
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if cancelled {
            return Err(DownloadError::Cancelled);
        }

        offset += batch_count;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use crate::batch_downloader::{download, BatchDownloader, ProgressCallback};
    use crate::download_configuration::DownloadConfiguration;
    use crate::download_status::DownloadStatus;
    use crate::error::DownloadError;

    /// How the fixture server treats a request, by arrival order.
    #[derive(Clone, Copy)]
    enum FailMode {
        None,
        /// The first n requests get a 500, the rest succeed.
        First(u32),
        /// Requests after the first n get a 500.
        After(u32),
    }

    struct ServerStats {
        requests: AtomicU32,
        in_flight: AtomicU32,
        max_in_flight: AtomicU32,
    }

    /// Minimal localhost HTTP/1.1 server serving `body` on every GET, with a
    /// per-request delay and an in-flight gauge. Runs until the process exits.
    fn start_server(body: Vec<u8>, delay: Duration, fail_mode: FailMode) -> (String, Arc<ServerStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let body = Arc::new(body);
        let stats = Arc::new(ServerStats {
            requests: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        });
        let server_stats = stats.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let body = Arc::clone(&body);
                let stats = server_stats.clone();
                thread::spawn(move || handle(stream, &body, delay, fail_mode, &stats));
            }
        });
        (format!("http://127.0.0.1:{}/image.png", port), stats)
    }

    fn handle(mut stream: TcpStream, body: &[u8], delay: Duration, fail_mode: FailMode, stats: &ServerStats) {
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

        let sequence = stats.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let current = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let mut buf = [0u8; 8192];
        if stream.read(&mut buf).is_err() {
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let fail = match fail_mode {
            FailMode::None => false,
            FailMode::First(n) => sequence <= n,
            FailMode::After(n) => sequence > n,
        };

        // gauge is released before the body is written: the client cannot have
        // finished this request while the gauge still counts it
        stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fail {
            let _ = stream.write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            return;
        }
        let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
        let _ = stream.write_all(header.as_bytes());
        let _ = stream.write_all(body);
    }

    fn collect_progress() -> (ProgressCallback, Arc<Mutex<Vec<(u32, u32)>>>) {
        let events: Arc<Mutex<Vec<(u32, u32)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let on_progress: ProgressCallback = Arc::new(move |completed, total| {
            sink.lock().unwrap().push((completed, total));
        });
        (on_progress, events)
    }

    fn configuration(url: &str, save_path: &str, total_count: u32, parallel_count: u32) -> DownloadConfiguration {
        DownloadConfiguration::new()
            .set_url(url)
            .set_save_path(save_path)
            .set_total_count(total_count)
            .set_parallel_count(parallel_count)
            .build()
            .expect("configuration should be valid")
    }

    #[tokio::test]
    async fn test_download_all_images() {
        let (url, stats) = start_server(b"png bytes".to_vec(), Duration::ZERO, FailMode::None);
        let dir = tempfile::tempdir().expect("tempdir");
        let save_path = dir.path().to_string_lossy().to_string();
        let config = configuration(&url, &save_path, 5, 2);
        let (on_progress, events) = collect_progress();

        let result = download(config, CancellationToken::new(), Some(on_progress)).await;
        assert_eq!(result, Ok(()));

        for i in 0..5 {
            let path = dir.path().join(format!("{}.png", i));
            assert_eq!(std::fs::read(path).expect("image file"), b"png bytes".to_vec());
        }

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|(_, total)| *total == 5));
        assert_eq!(events.last().unwrap().0, 5);
        let mut completed: Vec<u32> = events.iter().map(|(completed, _)| *completed).collect();
        completed.sort_unstable();
        assert_eq!(completed, vec![1, 2, 3, 4, 5]);

        assert_eq!(stats.requests.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_count_bounds_concurrency() {
        let (url, stats) = start_server(vec![1u8; 64], Duration::from_millis(50), FailMode::None);
        let dir = tempfile::tempdir().expect("tempdir");
        let config = configuration(&url, &dir.path().to_string_lossy(), 6, 2);

        let result = download(config, CancellationToken::new(), None).await;
        assert_eq!(result, Ok(()));

        assert_eq!(stats.requests.load(Ordering::SeqCst), 6);
        assert!(stats.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (url, stats) = start_server(b"png bytes".to_vec(), Duration::ZERO, FailMode::None);
        let dir = tempfile::tempdir().expect("tempdir");
        let config = configuration(&url, &dir.path().to_string_lossy(), 4, 2);
        let (on_progress, events) = collect_progress();

        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let result = download(config, cancel_token, Some(on_progress)).await;
        assert_eq!(result, Err(DownloadError::Cancelled));
        assert_eq!(events.lock().unwrap().len(), 0);
        assert_eq!(stats.requests.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_mid_run_stops_scheduling() {
        let (url, stats) = start_server(vec![1u8; 64], Duration::from_millis(200), FailMode::None);
        let dir = tempfile::tempdir().expect("tempdir");
        let config = configuration(&url, &dir.path().to_string_lossy(), 10, 3);
        let (on_progress, events) = collect_progress();

        let cancel_token = CancellationToken::new();
        let trigger = cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = download(config, cancel_token, Some(on_progress)).await;
        assert_eq!(result, Err(DownloadError::Cancelled));

        // the signal fired during the first batch: it settles, no batch follows
        assert!(stats.requests.load(Ordering::SeqCst) <= 3);
        assert!(events.lock().unwrap().len() <= 3);
    }

    #[tokio::test]
    async fn test_failure_aborts_run() {
        let (url, stats) = start_server(b"png bytes".to_vec(), Duration::ZERO, FailMode::After(2));
        let dir = tempfile::tempdir().expect("tempdir");
        let config = configuration(&url, &dir.path().to_string_lossy(), 6, 2);

        let result = download(config, CancellationToken::new(), None).await;
        match result {
            Err(DownloadError::Response(message)) => {
                assert!(message.starts_with("image "), "error should name the failing index: {}", message);
            }
            other => panic!("expected a Response error, got {:?}", other),
        }

        // first batch succeeded, second batch failed, third batch never started
        assert_eq!(stats.requests.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let (url, stats) = start_server(b"png bytes".to_vec(), Duration::ZERO, FailMode::First(1));
        let dir = tempfile::tempdir().expect("tempdir");
        let save_path = dir.path().to_string_lossy().to_string();
        let config = DownloadConfiguration::new()
            .set_url(url.as_str())
            .set_save_path(save_path.as_str())
            .set_total_count(2)
            .set_parallel_count(2)
            .set_retry_times_on_failure(1)
            .build()
            .expect("configuration should be valid");
        let (on_progress, events) = collect_progress();

        let result = download(config, CancellationToken::new(), Some(on_progress)).await;
        assert_eq!(result, Ok(()));
        assert_eq!(events.lock().unwrap().len(), 2);
        assert_eq!(stats.requests.load(Ordering::SeqCst), 3);
        for i in 0..2 {
            assert!(dir.path().join(format!("{}.png", i)).exists());
        }
    }

    #[tokio::test]
    async fn test_empty_run_completes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = configuration("http://127.0.0.1:9/unused.png", &dir.path().to_string_lossy(), 0, 2);
        let (on_progress, events) = collect_progress();

        let result = download(config, CancellationToken::new(), Some(on_progress)).await;
        assert_eq!(result, Ok(()));
        assert_eq!(events.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_operation_reports_progress() {
        let (url, _stats) = start_server(b"png bytes".to_vec(), Duration::ZERO, FailMode::None);
        let dir = tempfile::tempdir().expect("tempdir");
        let config = configuration(&url, &dir.path().to_string_lossy(), 3, 2);

        let mut downloader = BatchDownloader::new(config);
        let operation = downloader.operation();
        downloader.start_download();

        while !operation.is_done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(operation.status(), DownloadStatus::Complete);
        assert_eq!(operation.completed_count(), 3);
        assert_eq!(operation.total_count(), 3);
        assert_eq!(operation.progress(), 1f64);
        assert_eq!(operation.error(), DownloadError::None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_operation_stop() {
        let (url, _stats) = start_server(vec![1u8; 64], Duration::from_millis(100), FailMode::None);
        let dir = tempfile::tempdir().expect("tempdir");
        let config = configuration(&url, &dir.path().to_string_lossy(), 10, 2);

        let mut downloader = BatchDownloader::new(config);
        let operation = downloader.operation();
        downloader.start_download();

        tokio::time::sleep(Duration::from_millis(150)).await;
        operation.stop();

        while !operation.is_done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(operation.status(), DownloadStatus::Stop);
        assert!(operation.completed_count() < 10);
    }
}
