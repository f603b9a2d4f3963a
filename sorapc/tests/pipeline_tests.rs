//! End-to-end tests of the orchestrator and download pipeline against a
//! real database and fake remote collaborators.

mod common;

use std::path::PathBuf;

use serde_json::json;

use common::*;
use sorapc::Error;
use sorapc::database::repositories::{DownloadRepository, SqlxDownloadRepository};
use sorapc::error::ErrorKind;
use sorapc::orchestrator::PollOutcome;
use sorapc::remote::CreateVideoRequest;

const SHARE_URL: &str = "https://sora.chatgpt.com/p/s_abc";
const CLEAN_URL: &str = "https://cdn.example.com/clean/gen_2.mp4";

/// Submit `task_id` through the facade using a fresh credential.
async fn submit(h: &Harness, task_id: &str, prompt: &str) -> i64 {
    let credential_id = insert_credential(&h.db.pool, "bearer-1", None, "").await;
    h.remote.push_create(&json!({ "id": task_id }).to_string());
    let job = h
        .container
        .orchestrator
        .submit_job(false, &CreateVideoRequest::new(prompt))
        .await
        .unwrap();
    assert_eq!(job.task_id, task_id);
    assert_eq!(job.credential_id, credential_id);
    credential_id
}

/// Submit and complete a job so that one download record exists.
async fn completed_job(h: &Harness) -> PathBuf {
    submit(h, "task_2", "a cat").await;
    FakeRemote::set(
        &h.remote.drafts,
        vec![draft("task_2", "gen_2", "https://cdn.example.com/orig/gen_2.mp4")],
    );
    let outcome = h.container.orchestrator.poll_tick("task_2").await.unwrap();
    assert_eq!(outcome, PollOutcome::Completed { downloaded: 1 });
    h.config.download_dir.join("gen_2.mp4")
}

fn downloads(h: &Harness) -> SqlxDownloadRepository {
    SqlxDownloadRepository::new(h.db.pool.clone())
}

mod orchestrator_tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_without_credentials() {
        let h = harness().await;
        let err = h
            .container
            .orchestrator
            .submit_job(false, &CreateVideoRequest::new("cat"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoEligibleCredential { require_pro: false }));
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submit_records_job() {
        let h = harness().await;
        let credential_id = submit(&h, "task_1", "  a dog ").await;

        let task = h.container.orchestrator.ledger().get("task_1").await.unwrap();
        assert_eq!(task.token_id, credential_id);
        assert_eq!(task.prompt, "a dog");
        assert!(
            h.remote
                .calls()
                .iter()
                .any(|c| c.starts_with("create:bearer-1:"))
        );

        let pending = h.container.orchestrator.recover_on_start().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task_id, "task_1");
    }

    #[tokio::test]
    async fn test_poll_in_progress_normalises_fraction() {
        let h = harness().await;
        submit(&h, "task_1", "cat").await;
        FakeRemote::set(&h.remote.pending, json!({"tasks": [{"progress_pct": 0.35}]}));

        let outcome = h.container.orchestrator.poll_tick("task_1").await.unwrap();
        assert_eq!(outcome, PollOutcome::InProgress { progress: 35.0 });
        assert!(!outcome.is_completed());

        let task = h.container.orchestrator.ledger().get("task_1").await.unwrap();
        assert_eq!(task.progress_pct, Some(35.0));
        assert!(!h.remote.calls().iter().any(|c| c.starts_with("drafts:")));
    }

    #[tokio::test]
    async fn test_poll_unknown_job() {
        let h = harness().await;
        assert!(matches!(
            h.container.orchestrator.poll_tick("nope").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            h.container.orchestrator.poll_tick(" ").await,
            Err(Error::EmptyIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_completion_downloads_only_target() {
        let h = harness_with(&[("SORAPC_DRAFTS_LIMIT", "50")]).await;
        submit(&h, "task_2", "cat").await;
        FakeRemote::set(
            &h.remote.drafts,
            vec![
                draft("task_1", "gen_1", "https://cdn.example.com/gen_1.mp4"),
                draft("task_2", "gen_2", "https://cdn.example.com/gen_2.webm"),
                draft("task_3", "gen_3", "https://cdn.example.com/gen_3.mp4"),
                draft("", "gen_4", "https://cdn.example.com/gen_4.mp4"),
            ],
        );

        let outcome = h.container.orchestrator.poll_tick("task_2").await.unwrap();
        assert_eq!(outcome, PollOutcome::Completed { downloaded: 1 });

        let fetched = h.fetcher.fetched();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].0, "https://cdn.example.com/gen_2.webm");
        let expected = h.config.download_dir.join("gen_2.webm");
        assert!(expected.exists());

        let map = h.container.orchestrator.downloads_map().await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["task_2"], expected.display().to_string());

        let task = h.container.orchestrator.ledger().get("task_2").await.unwrap();
        assert_eq!(task.progress_pct, Some(100.0));
        assert!(h.container.orchestrator.recover_on_start().await.is_empty());
        assert!(h.remote.calls().contains(&"drafts:bearer-1:50:0".to_string()));
    }

    #[tokio::test]
    async fn test_completion_before_draft_is_listed() {
        let h = harness().await;
        submit(&h, "task_2", "cat").await;
        FakeRemote::set(
            &h.remote.drafts,
            vec![draft("task_1", "gen_1", "https://cdn.example.com/gen_1.mp4")],
        );

        let outcome = h.container.orchestrator.poll_tick("task_2").await.unwrap();
        assert_eq!(outcome, PollOutcome::Completed { downloaded: 0 });
        assert!(h.fetcher.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_no_record() {
        let h = harness().await;
        submit(&h, "task_2", "cat").await;
        let url = "https://cdn.example.com/gen_2.mp4";
        h.fetcher.fail_on(url);
        FakeRemote::set(&h.remote.drafts, vec![draft("task_2", "gen_2", url)]);

        let err = h.container.orchestrator.poll_tick("task_2").await.unwrap_err();
        assert!(matches!(err, Error::DownloadFailed(_)));
        assert!(downloads(&h).list_downloads().await.unwrap().is_empty());
        assert!(!h.config.download_dir.join("gen_2.mp4").exists());
    }

    #[tokio::test]
    async fn test_blank_target_downloads_nothing() {
        let h = harness().await;
        let drafts = vec![draft("", "gen_1", "https://cdn.example.com/gen_1.mp4")];

        let count = h
            .container
            .orchestrator
            .pipeline()
            .selective_download(&drafts, "  ")
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(h.fetcher.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_redownload_and_purge() {
        let h = harness().await;
        let path = completed_job(&h).await;

        let outcome = h.container.orchestrator.redownload("task_2").await.unwrap();
        assert_eq!(outcome.local_path, path.display().to_string());
        assert_eq!(h.fetcher.fetched().len(), 2);

        h.container
            .orchestrator
            .purge_job("task_2", true)
            .await
            .unwrap();
        assert!(!path.exists());
        assert!(downloads(&h).list_downloads().await.unwrap().is_empty());
        assert!(matches!(
            h.container.orchestrator.ledger().get("task_2").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            h.container.orchestrator.redownload("task_2").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_purge_keeps_file_when_asked() {
        let h = harness().await;
        let path = completed_job(&h).await;

        h.container
            .orchestrator
            .purge_job("task_2", false)
            .await
            .unwrap();
        assert!(path.exists());
        assert!(h.container.orchestrator.list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_downloads() {
        let h = harness().await;
        let path = completed_job(&h).await;

        assert_eq!(h.container.orchestrator.clear_downloads().await.unwrap(), 1);
        assert!(!path.exists());
        assert!(
            h.container
                .orchestrator
                .downloads_map()
                .await
                .unwrap()
                .is_empty()
        );
    }
}

mod publish_tests {
    use super::*;

    #[tokio::test]
    async fn test_conflict_then_generation_fallback() {
        let h = harness_with(&[("SORAPC_WATERMARK_TOKEN", "wm-token")]).await;
        let path = completed_job(&h).await;
        FakeRemote::set(
            &h.remote.publish_response,
            json!({"message": "HTTP 409: already published"}),
        );
        FakeRemote::set(&h.remote.published_by_task, json!({"status": "pending"}));
        FakeRemote::set(
            &h.remote.published_by_generation,
            json!({"share_url": SHARE_URL, "post_id": "s_abc"}),
        );
        FakeRemote::set(&h.resolver.result, Some(CLEAN_URL.to_string()));

        let outcome = h
            .container
            .orchestrator
            .publish_and_fetch_unwatermarked("task_2", None, None)
            .await
            .unwrap();

        assert_eq!(outcome.published_url, SHARE_URL);
        assert_eq!(outcome.resolved_url, CLEAN_URL);
        assert_eq!(outcome.local_path, path.display().to_string());
        assert_eq!(outcome.post_id, "s_abc");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), CLEAN_URL);

        let calls = h.remote.calls();
        assert!(calls.contains(&"publish:bearer-1:gen_2:a cat".to_string()));
        assert!(!calls.iter().any(|c| c.contains("task_id=task_2")));
        assert!(calls.iter().any(|c| c.contains("generation_id=gen_2")));

        let resolver_calls = h.resolver.calls.lock().unwrap().clone();
        assert_eq!(resolver_calls.len(), 1);
        assert_eq!(resolver_calls[0].1, "wm-token");
        assert_eq!(resolver_calls[0].2, SHARE_URL);

        let record = downloads(&h)
            .latest_for_task("task_2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.downloadable_url.as_deref(), Some(CLEAN_URL));
        assert_eq!(record.post_id, "s_abc");
    }

    #[tokio::test]
    async fn test_pending_primary_lookup_falls_back() {
        let h = harness().await;
        completed_job(&h).await;
        FakeRemote::set(&h.remote.published_by_task, json!({"status": "pending"}));
        FakeRemote::set(
            &h.remote.published_by_generation,
            json!({"data": {"item": {"url": "https://videos.openai.com/raw/gen_2"}}}),
        );

        let outcome = h
            .container
            .orchestrator
            .publish_and_fetch_unwatermarked("task_2", None, None)
            .await
            .unwrap();

        assert_eq!(outcome.resolved_url, "https://videos.openai.com/raw/gen_2");
        assert_eq!(outcome.post_id, outcome.published_url);
        assert!(h.resolver.calls.lock().unwrap().is_empty());

        let calls = h.remote.calls();
        let task_lookup = calls.iter().position(|c| c.contains("task_id=task_2"));
        let gen_lookup = calls.iter().position(|c| c.contains("generation_id=gen_2"));
        assert!(task_lookup.is_some());
        assert!(task_lookup < gen_lookup);
    }

    #[tokio::test]
    async fn test_caller_overrides_watermark_settings() {
        let h = harness_with(&[("SORAPC_WATERMARK_TOKEN", "configured")]).await;
        completed_job(&h).await;
        FakeRemote::set(
            &h.remote.published_by_task,
            json!({"share_url": SHARE_URL}),
        );
        FakeRemote::set(&h.resolver.result, Some(CLEAN_URL.to_string()));

        h.container
            .orchestrator
            .publish_and_fetch_unwatermarked(
                "task_2",
                Some("https://unwatermark.example.com/api"),
                Some("override"),
            )
            .await
            .unwrap();

        let resolver_calls = h.resolver.calls.lock().unwrap().clone();
        assert_eq!(resolver_calls[0].0, "https://unwatermark.example.com/api");
        assert_eq!(resolver_calls[0].1, "override");
    }

    #[tokio::test]
    async fn test_missing_prerequisites() {
        let h = harness().await;

        let failure = h
            .container
            .orchestrator
            .publish_and_fetch_unwatermarked("unknown", None, None)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::PrerequisiteMissing);

        submit(&h, "task_1", "cat").await;
        let failure = h
            .container
            .orchestrator
            .publish_and_fetch_unwatermarked("task_1", None, None)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::PrerequisiteMissing);
        assert!(!h.remote.calls().iter().any(|c| c.starts_with("publish:")));
    }

    #[tokio::test]
    async fn test_no_published_url() {
        let h = harness().await;
        completed_job(&h).await;

        let failure = h
            .container
            .orchestrator
            .publish_and_fetch_unwatermarked("task_2", None, None)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::NoPublishedUrl);
        assert!(failure.message.contains("task_2"));
    }

    #[tokio::test]
    async fn test_watermark_token_required() {
        let h = harness().await;
        completed_job(&h).await;
        FakeRemote::set(
            &h.remote.published_by_task,
            json!({"share_url": SHARE_URL}),
        );

        let failure = h
            .container
            .orchestrator
            .publish_and_fetch_unwatermarked("task_2", None, Some("  "))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::WatermarkCredentialMissing);
        assert!(h.resolver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolver_without_url() {
        let h = harness_with(&[("SORAPC_WATERMARK_TOKEN", "wm")]).await;
        completed_job(&h).await;
        FakeRemote::set(
            &h.remote.published_by_task,
            json!({"share_url": SHARE_URL}),
        );

        let failure = h
            .container
            .orchestrator
            .publish_and_fetch_unwatermarked("task_2", None, None)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::NoWatermarkFreeUrl);
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_previous_file() {
        let h = harness_with(&[("SORAPC_WATERMARK_TOKEN", "wm")]).await;
        let path = completed_job(&h).await;
        let before = std::fs::read_to_string(&path).unwrap();
        FakeRemote::set(
            &h.remote.published_by_task,
            json!({"share_url": SHARE_URL}),
        );
        FakeRemote::set(&h.resolver.result, Some(CLEAN_URL.to_string()));
        h.fetcher.fail_on(CLEAN_URL);

        let failure = h
            .container
            .orchestrator
            .publish_and_fetch_unwatermarked("task_2", None, None)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::DownloadFailed);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        let record = downloads(&h)
            .latest_for_task("task_2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            record.downloadable_url.as_deref(),
            Some("https://cdn.example.com/orig/gen_2.mp4")
        );
        assert_eq!(record.post_id, "");
    }
}
