mod common;

use std::fs;
use std::time::{Duration, Instant};

use common::client_for;
use tripo3d_client::{
    CancellationToken, DownloadOptions, OutputKind, Task, TaskOutput, TaskStatus, TripoError,
};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn finished_task(server: &MockServer, status: TaskStatus) -> Task {
    Task {
        task_id: "mock_task_id_123".to_string(),
        task_type: "text_to_model".to_string(),
        status,
        progress: 100,
        create_time: Some(1752091365),
        running_left_time: None,
        output: Some(TaskOutput::from_iter([
            (OutputKind::Model, format!("{}/files/model.glb", server.uri())),
            (OutputKind::RenderedImage, format!("{}/files/preview.webp", server.uri())),
        ])),
        error_code: None,
        error_msg: None,
    }
}

async fn serve_model(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/files/model.glb"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("dummy model data"))
        .mount(server)
        .await;
}

async fn serve_preview(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/files/preview.webp"))
        .respond_with(ResponseTemplate::new(status).set_body_bytes("dummy preview"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_download_all_artifacts() {
    let server = MockServer::start().await;
    serve_model(&server).await;
    serve_preview(&server, 200).await;

    let client = client_for(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let task = finished_task(&server, TaskStatus::Success);

    let downloads = client
        .download_task_models(&task, dest_dir.path(), &DownloadOptions::default())
        .await
        .unwrap();

    assert!(downloads.is_complete());
    let model = downloads.path(OutputKind::Model).unwrap();
    assert_eq!(model, dest_dir.path().join("mock_task_id_123_model.glb"));
    assert_eq!(fs::read_to_string(model).unwrap(), "dummy model data");
    let preview = downloads.path(OutputKind::RenderedImage).unwrap();
    assert_eq!(
        preview,
        dest_dir.path().join("mock_task_id_123_rendered_image.webp")
    );
}

#[tokio::test]
async fn test_partial_download_tolerated() {
    let server = MockServer::start().await;
    serve_model(&server).await;
    serve_preview(&server, 500).await;

    let client = client_for(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let task = finished_task(&server, TaskStatus::Success);

    let downloads = client
        .download_task_models(
            &task,
            dest_dir.path(),
            &DownloadOptions::default().allow_partial(true),
        )
        .await
        .unwrap();

    assert_eq!(downloads.files.len(), 2);
    assert!(downloads.path(OutputKind::Model).is_some());
    assert_eq!(downloads.files[&OutputKind::RenderedImage], None);
    assert!(matches!(
        downloads.errors[&OutputKind::RenderedImage],
        TripoError::ApiError { status: 500, .. }
    ));
    assert!(!downloads.errors.contains_key(&OutputKind::Model));
}

#[tokio::test]
async fn test_partial_download_rejected_without_tolerance() {
    let server = MockServer::start().await;
    serve_model(&server).await;
    serve_preview(&server, 404).await;

    let client = client_for(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let task = finished_task(&server, TaskStatus::Success);

    let err = client
        .download_task_models(&task, dest_dir.path(), &DownloadOptions::default())
        .await
        .unwrap_err();

    match err {
        TripoError::PartialDownload {
            task_id,
            downloaded,
            failed,
        } => {
            assert_eq!(task_id, "mock_task_id_123");
            assert!(downloaded.contains_key(&OutputKind::Model));
            assert_eq!(failed.len(), 1);
            assert!(failed.contains_key(&OutputKind::RenderedImage));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_redownload_overwrites_in_place() {
    let server = MockServer::start().await;
    serve_model(&server).await;
    serve_preview(&server, 200).await;

    let client = client_for(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let task = finished_task(&server, TaskStatus::Success);
    let options = DownloadOptions::default();

    let first = client
        .download_task_models(&task, dest_dir.path(), &options)
        .await
        .unwrap();
    let first_bytes = fs::read(first.path(OutputKind::Model).unwrap()).unwrap();

    let second = client
        .download_task_models(&task, dest_dir.path(), &options)
        .await
        .unwrap();
    let second_bytes = fs::read(second.path(OutputKind::Model).unwrap()).unwrap();

    assert_eq!(first.files, second.files);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(fs::read_dir(dest_dir.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn test_download_filters_kinds() {
    let server = MockServer::start().await;
    serve_model(&server).await;
    Mock::given(method("GET"))
        .and(path("/files/preview.webp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let task = finished_task(&server, TaskStatus::Success);

    let downloads = client
        .download_task_models(
            &task,
            dest_dir.path(),
            &DownloadOptions::default().kinds([OutputKind::Model, OutputKind::PbrModel]),
        )
        .await
        .unwrap();

    assert!(downloads.path(OutputKind::Model).is_some());
    assert_eq!(downloads.files[&OutputKind::PbrModel], None);
    assert!(!downloads.files.contains_key(&OutputKind::RenderedImage));
    assert!(downloads.is_complete());
}

#[tokio::test]
async fn test_download_requires_successful_task() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let task = finished_task(&server, TaskStatus::Running);

    let err = client
        .download_task_models(&task, dest_dir.path(), &DownloadOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TripoError::InvalidTaskState {
            status: TaskStatus::Running,
            expected: TaskStatus::Success,
            ..
        }
    ));
}

#[tokio::test]
async fn test_artifact_fetch_does_not_send_api_key() {
    let server = MockServer::start().await;
    // Presigned storage rejects requests carrying a second credential.
    Mock::given(method("GET"))
        .and(path("/files/model.glb"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(400))
        .expect(0)
        .with_priority(1)
        .mount(&server)
        .await;
    serve_model(&server).await;

    let client = client_for(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let task = finished_task(&server, TaskStatus::Success);

    let downloads = client
        .download_task_models(
            &task,
            dest_dir.path(),
            &DownloadOptions::default().kinds([OutputKind::Model]),
        )
        .await
        .unwrap();

    let model = downloads.path(OutputKind::Model).unwrap();
    assert_eq!(fs::read_to_string(model).unwrap(), "dummy model data");
}

#[tokio::test]
async fn test_cancelled_download_leaves_no_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/model.glb"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes("dummy model data")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    serve_preview(&server, 200).await;

    let client = client_for(&server);
    let dest_dir = tempfile::tempdir().unwrap();
    let task = finished_task(&server, TaskStatus::Success);

    let token = CancellationToken::new();
    let options = DownloadOptions::default().cancel_token(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let started = Instant::now();
    let err = client
        .download_task_models(&task, dest_dir.path(), &options)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    match err {
        TripoError::Cancelled { task_id } => assert_eq!(task_id, "mock_task_id_123"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(2));
    // The preview may have been fetched before the token fired, but a
    // cancelled download commits nothing and leaves no staging files.
    let leftovers: Vec<_> = fs::read_dir(dest_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.ends_with(".part") || name.starts_with("mock_task_id_123_model"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
}
