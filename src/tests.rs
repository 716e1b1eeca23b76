#[cfg(test)]
mod core_tests {
    use crate::{
        ArchiveSink, BatchOrchestrator, BrowserPool, CaptureError, CaptureOptions,
        CaptureOverrides, CaptureRequest, CaptureResult, Capturer, Config, ImageFormat, Viewport,
    };
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.batch_concurrency, 3);
        assert!(config.chrome_path.is_none());
    }

    #[test]
    fn test_merge_defaults_empty() {
        let options = CaptureOptions::merge_defaults(&CaptureOverrides::default());
        assert_eq!(options.width, 1920);
        assert_eq!(options.height, 1080);
        assert!(!options.full_page);
        assert_eq!(options.format, ImageFormat::Png);
        assert_eq!(options.quality, 80);
        assert_eq!(options.timeout, Duration::from_millis(30_000));
        assert!(options.viewport.is_none());
        assert!(options.device_profile.is_none());
    }

    #[test]
    fn test_merge_defaults_overrides_only_given_fields() {
        let options = CaptureOptions::merge_defaults(&CaptureOverrides {
            format: Some(ImageFormat::Jpeg),
            ..Default::default()
        });
        assert_eq!(options.format, ImageFormat::Jpeg);
        assert_eq!(options.width, 1920);
        assert_eq!(options.quality, 80);

        let options = CaptureOptions::merge_defaults(&CaptureOverrides {
            width: Some(375),
            height: Some(667),
            timeout_ms: Some(5_000),
            ..Default::default()
        });
        assert_eq!(options.width, 375);
        assert_eq!(options.height, 667);
        assert_eq!(options.timeout, Duration::from_millis(5_000));
        assert_eq!(options.format, ImageFormat::Png);
    }

    #[test]
    fn test_explicit_viewport_wins_over_dimensions() {
        let options = CaptureOptions::merge_defaults(&CaptureOverrides {
            width: Some(800),
            height: Some(600),
            viewport: Some(Viewport {
                width: 375,
                height: 667,
            }),
            ..Default::default()
        });
        assert_eq!(
            options.effective_viewport(),
            Viewport {
                width: 375,
                height: 667
            }
        );
    }

    #[test]
    fn test_error_display_and_transience() {
        assert_eq!(
            CaptureError::LoadFailure(503).to_string(),
            "page load failed with status 503"
        );
        assert!(CaptureError::PoolExhausted.is_transient());
        assert!(CaptureError::LoadFailure(500).is_transient());
        assert!(!CaptureError::MissingUrl.is_transient());
        assert!(!CaptureError::LaunchFailure("boom".to_string()).is_transient());
    }

    #[test]
    fn test_format_extension_and_lossiness() {
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Webp.extension(), "webp");
        assert!(ImageFormat::Jpeg.is_lossy());
        assert!(!ImageFormat::Png.is_lossy());
        assert!(!ImageFormat::Webp.is_lossy());
    }

    /// Capturer stub tracking concurrency and completion order, failing
    /// for configured URLs.
    struct StubCapturer {
        fail: HashSet<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        completed: Mutex<Vec<String>>,
    }

    impl StubCapturer {
        fn new(fail: &[&str]) -> Self {
            Self {
                fail: fail.iter().map(|s| s.to_string()).collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                completed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Capturer for StubCapturer {
        async fn capture(&self, request: &CaptureRequest) -> Result<CaptureResult, CaptureError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.lock().unwrap().push(request.url.clone());

            if self.fail.contains(&request.url) {
                return Err(CaptureError::LoadFailure(503));
            }
            Ok(CaptureResult {
                url: request.url.clone(),
                data: request.url.as_bytes().to_vec(),
                format: request.options.format,
                duration: Duration::from_millis(10),
            })
        }
    }

    /// In-memory sink recording entries and finalize calls.
    #[derive(Default)]
    struct RecordingSink {
        entries: Vec<(String, Vec<u8>)>,
        finalized: usize,
    }

    impl ArchiveSink for RecordingSink {
        fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), CaptureError> {
            self.entries.push((name.to_string(), bytes.to_vec()));
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), CaptureError> {
            self.finalized += 1;
            Ok(())
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_batch_groups_bound_concurrency() {
        let capturer = std::sync::Arc::new(StubCapturer::new(&[]));
        let orchestrator = BatchOrchestrator::with_concurrency(capturer.clone(), 3);
        let mut sink = RecordingSink::default();

        let input = urls(&[
            "https://a.example",
            "https://b.example",
            "https://c.example",
            "https://d.example",
        ]);
        let summary = orchestrator
            .run(&input, &CaptureOptions::default(), &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 0);
        // Never more than one group in flight.
        assert!(capturer.max_in_flight.load(Ordering::SeqCst) <= 3);

        // The group barrier means D only runs after A, B, C settled.
        let completed = capturer.completed.lock().unwrap();
        let first_group: HashSet<&str> = completed[..3].iter().map(|s| s.as_str()).collect();
        assert_eq!(
            first_group,
            ["https://a.example", "https://b.example", "https://c.example"]
                .into_iter()
                .collect()
        );
        assert_eq!(completed[3], "https://d.example");
    }

    #[tokio::test]
    async fn test_batch_entries_in_input_order_with_unique_names() {
        let capturer = std::sync::Arc::new(StubCapturer::new(&[]));
        let orchestrator = BatchOrchestrator::with_concurrency(capturer, 3);
        let mut sink = RecordingSink::default();

        let input = urls(&[
            "https://a.example",
            "https://b.example",
            "https://c.example",
            "https://d.example",
        ]);
        orchestrator
            .run(&input, &CaptureOptions::default(), &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.entries.len(), 4);
        assert_eq!(sink.finalized, 1);

        for (i, (name, data)) in sink.entries.iter().enumerate() {
            assert!(
                name.starts_with(&format!("screenshot_{}_", i + 1)),
                "entry {i} named {name}"
            );
            assert!(name.ends_with(".png"));
            // Stub writes the URL back as payload, proving position.
            assert_eq!(data, input[i].as_bytes());
        }

        let unique: HashSet<&String> = sink.entries.iter().map(|(n, _)| n).collect();
        assert_eq!(unique.len(), 4);
    }

    #[tokio::test]
    async fn test_batch_failure_becomes_text_entry() {
        let capturer = std::sync::Arc::new(StubCapturer::new(&["https://b.example"]));
        let orchestrator = BatchOrchestrator::with_concurrency(capturer, 3);
        let mut sink = RecordingSink::default();

        let input = urls(&["https://a.example", "https://b.example", "https://c.example"]);
        let summary = orchestrator
            .run(&input, &CaptureOptions::default(), &mut sink)
            .await
            .expect("batch resolves despite per-URL failure");

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(sink.entries.len(), 3);

        let (name, body) = &sink.entries[1];
        assert!(name.starts_with("screenshot_2_"));
        assert!(name.ends_with(".txt"));
        let text = String::from_utf8(body.clone()).unwrap();
        assert!(text.starts_with("Error taking screenshot:"));
        assert!(text.contains("503"));

        assert!(sink.entries[0].0.ends_with(".png"));
        assert!(sink.entries[2].0.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_batch_single_url() {
        let capturer = std::sync::Arc::new(StubCapturer::new(&[]));
        let orchestrator = BatchOrchestrator::new(capturer);
        let mut sink = RecordingSink::default();

        let summary = orchestrator
            .run(
                &urls(&["https://only.example"]),
                &CaptureOptions::default(),
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(sink.entries.len(), 1);
        assert_eq!(sink.finalized, 1);
    }

    #[tokio::test]
    async fn test_initialize_fails_fatally_on_launch_error() {
        let pool = BrowserPool::new(Config {
            pool_size: 2,
            chrome_path: Some("/nonexistent/chrome-binary".to_string()),
            ..Default::default()
        });

        let err = pool.initialize().await.unwrap_err();
        assert!(matches!(err, CaptureError::LaunchFailure(_)));

        // All-or-nothing boot: nothing is left behind.
        let stats = pool.stats().await;
        assert_eq!(stats.total, 0);
        assert_eq!(stats.available, 0);
        assert_eq!(stats.busy, 0);
    }
}

#[cfg(test)]
mod browser_tests {
    //! Integration tests that drive a real Chromium. Ignored by
    //! default; run with `cargo test -- --ignored` on a machine with a
    //! local Chrome install.

    use crate::{
        BrowserPool, CaptureError, CaptureOptions, CapturePipeline, CaptureRequest, Config,
    };
    use std::sync::Arc;

    fn test_config() -> Config {
        Config {
            pool_size: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium"]
    async fn test_pool_exhaustion_and_release() {
        let pool = BrowserPool::new(test_config());
        pool.initialize().await.expect("pool init");

        let a = pool.acquire().await.expect("first acquire");
        let b = pool.acquire().await.expect("second acquire");
        assert!(matches!(
            pool.acquire().await,
            Err(CaptureError::PoolExhausted)
        ));

        let stats = pool.stats().await;
        assert_eq!(stats.busy, 2);
        assert_eq!(stats.available, 0);

        pool.release(a).await;
        pool.release(b).await;

        let stats = pool.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.available, 2);
        assert_eq!(stats.busy, 0);

        pool.teardown().await;
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium"]
    async fn test_release_replaces_dead_instance() {
        let pool = BrowserPool::new(test_config());
        pool.initialize().await.expect("pool init");

        let mut instance = pool.acquire().await.expect("acquire");
        let dead_id = instance.id;
        instance.disconnect().await;
        pool.release(instance).await;

        // The dead instance is gone and a replacement restores full
        // capacity.
        let stats = pool.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.available, 2);
        assert_eq!(stats.busy, 0);

        let a = pool.acquire().await.expect("acquire after replacement");
        let b = pool.acquire().await.expect("second acquire");
        assert_ne!(a.id, dead_id);
        assert_ne!(b.id, dead_id);
        pool.release(a).await;
        pool.release(b).await;

        // An instance the pool no longer tracks as busy is dropped,
        // never re-added.
        let lingering = pool.acquire().await.expect("acquire");
        pool.teardown().await;
        pool.release(lingering).await;
        assert_eq!(pool.stats().await.total, 0);
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium and network access"]
    async fn test_capture_timeout_releases_capacity() {
        let pool = Arc::new(BrowserPool::new(test_config()));
        let pipeline = CapturePipeline::new(pool.clone());
        pool.initialize().await.expect("pool init");

        let request = CaptureRequest::new(
            "https://httpbin.org/delay/10",
            CaptureOptions::merge_defaults(&crate::CaptureOverrides {
                timeout_ms: Some(2_000),
                ..Default::default()
            }),
        );
        match pipeline.capture(&request).await {
            Err(CaptureError::NavigationTimeout(_)) => {}
            other => panic!("expected NavigationTimeout, got {other:?}"),
        }

        // Expiry must hand the instance back, not wedge it busy.
        let stats = pool.stats().await;
        assert_eq!(stats.busy, 0);
        assert_eq!(stats.available, 2);

        pool.teardown().await;
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium"]
    async fn test_teardown_then_lazy_reinitialize() {
        let pool = BrowserPool::new(test_config());
        pool.initialize().await.expect("pool init");
        pool.teardown().await;
        assert_eq!(pool.stats().await.total, 0);

        // Next acquire brings the pool back up.
        let instance = pool.acquire().await.expect("lazy re-init");
        assert_eq!(pool.stats().await.total, 2);
        pool.release(instance).await;
        pool.teardown().await;
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium and network access"]
    async fn test_capture_failure_does_not_leak_capacity() {
        let pool = Arc::new(BrowserPool::new(test_config()));
        let pipeline = CapturePipeline::new(pool.clone());
        pool.initialize().await.expect("pool init");

        let request = CaptureRequest::new(
            "https://httpbin.org/status/500",
            CaptureOptions::default(),
        );
        match pipeline.capture(&request).await {
            Err(CaptureError::LoadFailure(status)) => assert_eq!(status, 500),
            other => panic!("expected LoadFailure, got {other:?}"),
        }

        let stats = pool.stats().await;
        assert_eq!(stats.busy, 0);
        assert_eq!(stats.available, 2);

        pool.teardown().await;
    }
}
