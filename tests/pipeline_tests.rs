//! Tests for the report lifecycle against a mock collection server

use assert_matches::assert_matches;
use hostreport::collectors::{Probe, ProbeContext};
use hostreport::logging::{self, LogBuffer, Verbosity};
use hostreport::{
    Answer, CacheKey, Config, DecisionKind, Error, FileStore, MemoryStore, OutcomeRecord,
    Pipeline, Prompter, Report, ReportStore, RunOptions, RunOutcome,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fs;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tempfile::TempDir;
use tracing::instrument::WithSubscriber;
use wiremock::matchers::{body_string, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OPT_OUT: &str = r#"{"OptOut": true}"#;
const REPORT_PATH: &str = "/ubuntu/desktop/24.04";

fn cpu_probe(_: &ProbeContext) -> Option<Value> {
    Some(json!({"Vendor": "GenuineIntel", "Threads": 8}))
}

fn gpu_probe(_: &ProbeContext) -> Option<Value> {
    None
}

fn probes() -> Vec<Probe> {
    vec![Probe::new("CPU", cpu_probe), Probe::new("GPU", gpu_probe)]
}

/// A host root with an os-release and an empty cache directory
struct Host {
    root: TempDir,
    cache: TempDir,
}

impl Host {
    fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(root.path().join("etc")).unwrap();
        fs::write(
            root.path().join("etc/os-release"),
            "ID=ubuntu\nVERSION_ID=\"24.04\"\nPRETTY_NAME=\"Ubuntu 24.04 LTS\"\n",
        )
        .unwrap();
        let cache = TempDir::new().expect("Failed to create temp dir");
        Self { root, cache }
    }

    fn config(&self, server: &MockServer) -> Config {
        Config::default()
            .with_root(self.root.path())
            .with_cache_dir(self.cache.path())
            .with_endpoint(server.uri())
            .with_timeout(Duration::from_secs(2))
    }

    fn pipeline(&self, server: &MockServer) -> Pipeline<FileStore> {
        Pipeline::from_config(self.config(server))
            .unwrap()
            .with_probes(probes())
    }

    fn record_path(&self) -> std::path::PathBuf {
        self.cache.path().join("hostreport").join("ubuntu.24.04")
    }

    fn stored(&self) -> String {
        fs::read_to_string(self.record_path()).expect("record should exist")
    }
}

async fn expect_posts(server: &MockServer, body: Option<&str>, count: u64) {
    let mock = Mock::given(method("POST")).and(path(REPORT_PATH));
    let mock = match body {
        Some(body) => mock.and(body_string(body)),
        None => mock.and(body_string_contains("\"Version\":")),
    };
    mock.respond_with(ResponseTemplate::new(200))
        .expect(count)
        .mount(server)
        .await;
}

mod decisions {
    use super::*;

    #[tokio::test]
    async fn test_yes_stores_and_sends_report_once() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 1).await;
        let host = Host::new();

        let outcome = host
            .pipeline(&server)
            .run(RunOptions::new(Answer::Yes))
            .await
            .unwrap();

        assert_eq!(outcome.kind(), DecisionKind::Report);
        assert!(outcome.delivery().unwrap().is_success());
        let stored = host.stored();
        assert!(stored.contains("\"Version\":"));
        assert!(stored.contains("GenuineIntel"));
        assert!(!stored.contains("GPU"));
    }

    #[tokio::test]
    async fn test_no_stores_and_sends_literal_opt_out() {
        let server = MockServer::start().await;
        expect_posts(&server, Some(OPT_OUT), 1).await;
        let host = Host::new();

        let outcome = host
            .pipeline(&server)
            .run(RunOptions::new(Answer::No))
            .await
            .unwrap();

        assert_eq!(outcome.kind(), DecisionKind::OptOut);
        assert_eq!(host.stored(), OPT_OUT);
    }

    #[tokio::test]
    async fn test_opt_out_kept_local_when_policy_says_so() {
        let server = MockServer::start().await;
        expect_posts(&server, Some(OPT_OUT), 0).await;
        let host = Host::new();
        let pipeline = Pipeline::from_config(host.config(&server).with_send_opt_out(false))
            .unwrap()
            .with_probes(probes());

        let outcome = pipeline.run(RunOptions::new(Answer::No)).await.unwrap();

        assert_matches!(
            outcome,
            RunOutcome::Completed {
                kind: DecisionKind::OptOut,
                delivery: None,
                ..
            }
        );
        assert_eq!(host.stored(), OPT_OUT);
    }

    #[tokio::test]
    async fn test_policy_does_not_hold_back_reports() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 1).await;
        let host = Host::new();
        let pipeline = Pipeline::from_config(host.config(&server).with_send_opt_out(false))
            .unwrap()
            .with_probes(probes());

        pipeline.run(RunOptions::new(Answer::Yes)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unset_without_prompter_fails_before_storing() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 0).await;
        let host = Host::new();

        let result = host
            .pipeline(&server)
            .run(RunOptions::new(Answer::Unset))
            .await;

        assert_matches!(result, Err(Error::AmbiguousConsent));
        assert!(!host.record_path().exists());
    }

    #[tokio::test]
    async fn test_unset_with_auto_confirm_sends_report() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 1).await;
        let host = Host::new();

        let outcome = host
            .pipeline(&server)
            .run(RunOptions::new(Answer::Unset).auto_confirm(true))
            .await
            .unwrap();

        assert_eq!(outcome.kind(), DecisionKind::Report);
    }

    struct Decline;

    impl Prompter for Decline {
        fn ask(&self, report: &Report) -> hostreport::Result<Answer> {
            assert!(report.category("CPU").is_some());
            Ok(Answer::No)
        }
    }

    #[tokio::test]
    async fn test_unset_asks_prompter() {
        let server = MockServer::start().await;
        expect_posts(&server, Some(OPT_OUT), 1).await;
        let host = Host::new();

        let outcome = host
            .pipeline(&server)
            .run(RunOptions::new(Answer::Unset).with_prompter(&Decline))
            .await
            .unwrap();

        assert_eq!(outcome.kind(), DecisionKind::OptOut);
    }
}

mod idempotence {
    use super::*;

    #[tokio::test]
    async fn test_second_run_short_circuits() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 1).await;
        let host = Host::new();
        let pipeline = host.pipeline(&server);

        let first = pipeline.run(RunOptions::new(Answer::Yes)).await.unwrap();
        let second = pipeline.run(RunOptions::new(Answer::Yes)).await.unwrap();

        assert_matches!(first, RunOutcome::Completed { .. });
        assert_eq!(
            second,
            RunOutcome::AlreadyDecided {
                key: CacheKey::new("ubuntu", "24.04"),
                kind: DecisionKind::Report,
            }
        );
    }

    #[tokio::test]
    async fn test_earlier_opt_out_is_not_overridden_without_force() {
        let server = MockServer::start().await;
        expect_posts(&server, Some(OPT_OUT), 1).await;
        let host = Host::new();
        let pipeline = host.pipeline(&server);

        pipeline.run(RunOptions::new(Answer::No)).await.unwrap();
        let second = pipeline.run(RunOptions::new(Answer::Yes)).await.unwrap();

        assert_eq!(second.kind(), DecisionKind::OptOut);
        assert_eq!(host.stored(), OPT_OUT);
    }

    #[tokio::test]
    async fn test_force_sends_again_and_replaces_record() {
        let server = MockServer::start().await;
        expect_posts(&server, Some(OPT_OUT), 1).await;
        expect_posts(&server, None, 1).await;
        let host = Host::new();
        let pipeline = host.pipeline(&server);

        pipeline.run(RunOptions::new(Answer::No)).await.unwrap();
        let forced = pipeline
            .run(RunOptions::new(Answer::Yes).force(true))
            .await
            .unwrap();

        assert_eq!(forced.kind(), DecisionKind::Report);
        assert!(host.stored().contains("\"Version\":"));
    }

    #[tokio::test]
    async fn test_malformed_record_is_rebuilt() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 1).await;
        let host = Host::new();
        fs::create_dir_all(host.record_path().parent().unwrap()).unwrap();
        fs::write(host.record_path(), "{\"Version\": \"1\", \"CPU\": {").unwrap();

        let outcome = host
            .pipeline(&server)
            .run(RunOptions::new(Answer::Yes))
            .await
            .unwrap();

        assert_matches!(outcome, RunOutcome::Completed { .. });
        assert!(OutcomeRecord::parse(host.stored().as_bytes()).is_some());
    }

    #[tokio::test]
    async fn test_memory_store_backend() {
        let server = MockServer::start().await;
        expect_posts(&server, Some(OPT_OUT), 1).await;
        let host = Host::new();
        let pipeline = Pipeline::new(host.config(&server), MemoryStore::new())
            .unwrap()
            .with_probes(probes());

        pipeline.run(RunOptions::new(Answer::No)).await.unwrap();
        pipeline.run(RunOptions::new(Answer::No)).await.unwrap();

        let key = pipeline.cache_key();
        assert_eq!(pipeline.store().raw(&key).unwrap(), OPT_OUT.as_bytes());
        assert_eq!(pipeline.store().len(), 1);
        assert!(!host.record_path().exists());
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_store_failure_aborts_before_sending() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 0).await;
        let host = Host::new();
        // A file where the cache namespace directory should be.
        fs::write(host.cache.path().join("hostreport"), "in the way").unwrap();

        let result = host
            .pipeline(&server)
            .run(RunOptions::new(Answer::Yes))
            .await;

        assert_matches!(result, Err(Error::StoreWrite { .. }));
    }

    #[tokio::test]
    async fn test_server_error_keeps_decision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let host = Host::new();

        let outcome = host
            .pipeline(&server)
            .run(RunOptions::new(Answer::No))
            .await
            .unwrap();

        let delivery = outcome.delivery().unwrap();
        assert!(!delivery.is_success());
        assert_eq!(delivery.status, Some(500));
        assert!(outcome.warning().is_some());
        assert_eq!(host.stored(), OPT_OUT);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_retried_on_next_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        let host = Host::new();
        let pipeline = host.pipeline(&server);

        pipeline.run(RunOptions::new(Answer::Yes)).await.unwrap();
        let second = pipeline.run(RunOptions::new(Answer::Yes)).await.unwrap();

        assert_matches!(second, RunOutcome::AlreadyDecided { .. });
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;
        let host = Host::new();
        let pipeline = Pipeline::from_config(host.config(&server).with_timeout(Duration::from_secs(1)))
            .unwrap()
            .with_probes(probes());

        let start = std::time::Instant::now();
        let outcome = pipeline.run(RunOptions::new(Answer::Yes)).await.unwrap();
        let elapsed = start.elapsed();

        assert!(
            elapsed < Duration::from_secs(8),
            "run should have timed out, but took {:?}",
            elapsed
        );
        let delivery = outcome.delivery().unwrap();
        assert!(!delivery.is_success());
        assert!(delivery.status.is_none());
        assert!(host.stored().contains("\"Version\":"));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let host = Host::new();
        let config = Config::default()
            .with_root(host.root.path())
            .with_cache_dir(host.cache.path())
            .with_endpoint("http://127.0.0.1:1");
        let pipeline = Pipeline::from_config(config).unwrap().with_probes(probes());

        let outcome = pipeline.run(RunOptions::new(Answer::No)).await.unwrap();

        assert!(!outcome.delivery().unwrap().is_success());
        assert_eq!(host.stored(), OPT_OUT);
    }
}

mod logs {
    use super::*;

    #[tokio::test]
    async fn test_transitions_logged_at_info() {
        let server = MockServer::start().await;
        expect_posts(&server, Some(OPT_OUT), 1).await;
        let host = Host::new();
        let pipeline = host.pipeline(&server);
        let buffer = LogBuffer::new();
        let subscriber = logging::subscriber(Verbosity::Info, buffer.clone(), false);

        pipeline
            .run(RunOptions::new(Answer::No))
            .with_subscriber(subscriber)
            .await
            .unwrap();

        let logs = buffer.contents();
        for stage in ["start:", "built:", "gated:", "stored:", "sent:", "done:"] {
            assert!(logs.contains(stage), "missing {} in {}", stage, logs);
        }
        assert!(!logs.contains("DEBUG"));
    }

    #[tokio::test]
    async fn test_quiet_run_logs_nothing() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 1).await;
        let host = Host::new();
        let pipeline = host.pipeline(&server);
        let buffer = LogBuffer::new();
        let subscriber = logging::subscriber(Verbosity::Quiet, buffer.clone(), false);

        pipeline
            .run(RunOptions::new(Answer::Yes))
            .with_subscriber(subscriber)
            .await
            .unwrap();

        assert_eq!(buffer.contents(), "");
    }

    #[tokio::test]
    async fn test_failed_delivery_is_silent_at_default_verbosity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let host = Host::new();
        let pipeline = host.pipeline(&server);
        let buffer = LogBuffer::new();
        let subscriber = logging::subscriber(Verbosity::Quiet, buffer.clone(), false);

        let outcome = pipeline
            .run(RunOptions::new(Answer::No))
            .with_subscriber(subscriber)
            .await
            .unwrap();

        assert!(outcome.warning().is_some());
        assert_eq!(buffer.contents(), "");
    }

    static COLLECTED_ON: Mutex<Option<ThreadId>> = Mutex::new(None);

    fn thread_probe(_: &ProbeContext) -> Option<Value> {
        *COLLECTED_ON.lock() = Some(thread::current().id());
        Some(json!("riscv64"))
    }

    #[tokio::test]
    async fn test_probes_run_off_the_async_thread_and_still_log() {
        let server = MockServer::start().await;
        expect_posts(&server, None, 1).await;
        let host = Host::new();
        let pipeline = Pipeline::from_config(host.config(&server))
            .unwrap()
            .with_probes(vec![Probe::new("Arch", thread_probe)]);
        let buffer = LogBuffer::new();
        let subscriber = logging::subscriber(Verbosity::Debug, buffer.clone(), false);

        pipeline
            .run(RunOptions::new(Answer::Yes))
            .with_subscriber(subscriber)
            .await
            .unwrap();

        let collected_on = (*COLLECTED_ON.lock()).expect("facts should have been collected");
        assert_ne!(collected_on, thread::current().id());
        assert!(buffer.contents().contains("Arch: \"riscv64\""));
        assert!(host.stored().contains("riscv64"));
    }

    #[test]
    fn test_show_emits_debug_detail() {
        let host = Host::new();
        let pipeline = Pipeline::new(Config::default().with_root(host.root.path()), MemoryStore::new())
            .unwrap()
            .with_probes(probes());
        let buffer = LogBuffer::new();
        let subscriber = logging::subscriber(Verbosity::Debug, buffer.clone(), false);

        let report = tracing::subscriber::with_default(subscriber, || pipeline.show());

        assert!(report.to_json().unwrap().contains("\"Version\":"));
        assert!(buffer.contents().contains("DEBUG"));
        assert!(pipeline.store().is_empty());
    }
}

#[test]
fn test_stored_record_readable_by_store() {
    let host = Host::new();
    let store = FileStore::new(host.cache.path());
    let key = CacheKey::new("ubuntu", "24.04");
    store.save(&key, &OutcomeRecord::OptOut).unwrap();

    assert_eq!(store.path_for(&key), host.record_path());
    assert_eq!(store.load(&key).unwrap(), Some(OutcomeRecord::OptOut));
}
