//! End-to-end: run ENVI SpectralIndex against a mock GSF server of each
//! family and follow the job to completion.

use std::time::{Duration, Instant};

use gsf_client::{
    AnyServer, Direction, GsfError, Job, JobSnapshot, JobStatus, Protocol, Server, Service,
    Session, Task,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NDVI: &str = "Normalized Difference Vegetation Index";

fn session() -> Session {
    Session::default().with_poll_interval(Duration::from_millis(10))
}

fn input_parameters(mock: &MockServer) -> Map<String, Value> {
    json!({
        "INPUT_RASTER": {
            "url": format!("{}/data/qb_boulder_msi", mock.uri()),
            "factory": "URLRaster"
        },
        "INDEX": NDVI
    })
    .as_object()
    .cloned()
    .unwrap()
}

/// Answer `GET {status_path}` with each document in turn, repeating the last.
async fn mount_status_sequence(mock: &MockServer, status_path: &str, docs: Vec<Value>) {
    let last = docs.len() - 1;
    for (i, doc) in docs.into_iter().enumerate() {
        let mut builder = Mock::given(method("GET"))
            .and(path(status_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(doc));
        if i < last {
            builder = builder.up_to_n_times(1);
        }
        builder.mount(mock).await;
    }
}

async fn mount_sdk_server(mock: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/reports/server-info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "description": "GSF",
            "version": "3.0.1",
            "configuration": {"requestHandlers": [{"type": "gsf-request-handler-rest"}]}
        })))
        .mount(mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [{"name": "ENVI"}, {"name": "IDL"}]
        })))
        .mount(mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/services/ENVI/tasks/SpectralIndex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "taskName": "SpectralIndex",
            "serviceName": "ENVI",
            "displayName": "Spectral Index",
            "description": "This task creates a spectral index raster.",
            "inputParameters": [
                {"name": "INPUT_RASTER", "type": "ENVIRASTER", "required": true},
                {"name": "INDEX", "type": "string", "required": true, "choiceList": [NDVI]}
            ],
            "outputParameters": [
                {"name": "OUTPUT_RASTER", "type": "ENVIRASTER", "required": true}
            ]
        })))
        .mount(mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .and(body_partial_json(json!({
            "serviceName": "ENVI",
            "taskName": "SpectralIndex",
            "inputParameters": {"INDEX": NDVI}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"jobId": 101})))
        .mount(mock)
        .await;

    let output = json!({"OUTPUT_RASTER": {"best": {
        "url": format!("{}/jobs/101/OUTPUT_RASTER.dat", mock.uri()),
        "factory": "URLRaster"
    }}});
    mount_status_sequence(
        mock,
        "/jobs/101",
        vec![
            json!({"jobId": 101, "jobStatus": "Accepted", "jobProgress": 0}),
            json!({"jobId": 101, "jobStatus": "Started", "jobProgress": 50, "jobMessage": "Computing index"}),
            json!({"jobId": 101, "jobStatus": "Succeeded", "jobProgress": 100, "jobResults": output}),
        ],
    )
    .await;
}

async fn mount_ese_server(mock: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ese/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [{"name": "ENVI"}]
        })))
        .mount(mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/ese/services/ENVI/SpectralIndex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "SpectralIndex",
            "displayName": "Spectral Index",
            "description": "This task creates a spectral index raster.",
            "parameters": [
                {"name": "INPUT_RASTER", "dataType": "ENVIRASTER", "direction": "INPUT", "parameterType": "required"},
                {"name": "INDEX", "dataType": "STRING", "direction": "INPUT", "parameterType": "required"},
                {"name": "OUTPUT_RASTER", "dataType": "ENVIRASTER", "direction": "OUTPUT", "parameterType": "required"}
            ]
        })))
        .mount(mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/ese/services/ENVI/SpectralIndex/submitJob"))
        .and(body_partial_json(json!({"INDEX": NDVI})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": 7, "jobStatus": "esriJobSubmitted"})))
        .mount(mock)
        .await;

    let output = json!([{"name": "OUTPUT_RASTER", "value": {
        "url": format!("{}/ese/jobs/7/OUTPUT_RASTER.dat", mock.uri()),
        "factory": "URLRaster"
    }}]);
    mount_status_sequence(
        mock,
        "/ese/jobs/7/status",
        vec![
            json!({"jobId": 7, "jobStatus": "esriJobSubmitted", "jobProgress": 0}),
            json!({"jobId": 7, "jobStatus": "esriJobExecuting", "jobProgress": 30}),
            json!({"jobId": 7, "jobStatus": "esriJobSucceeded", "jobProgress": 100, "results": output}),
        ],
    )
    .await;
}

async fn run_spectral_index(server: &AnyServer, mock: &MockServer) -> JobSnapshot {
    assert!(server.services().await.unwrap().contains(&"ENVI".to_string()));
    let service = server.service("ENVI").await.unwrap();
    let task = service.task("SpectralIndex").unwrap();

    let params = task.parameters().await.unwrap();
    let inputs: Vec<_> = params
        .iter()
        .filter(|p| p.direction == Direction::Input)
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(inputs, vec!["INPUT_RASTER", "INDEX"]);
    assert!(params.iter().all(|p| !p.name.is_empty() && !p.type_name.is_empty()));

    let job = task.submit(Some(input_parameters(mock))).await.unwrap();

    let mut seen = Vec::new();
    let mut record = |s: &JobSnapshot| seen.push(s.status);
    let done = job.wait_for_done(Some(&mut record)).await.unwrap();

    assert_eq!(seen.first(), Some(&JobStatus::Accepted));
    assert_eq!(seen.last(), Some(&JobStatus::Succeeded));

    // A fresh handle for the same id reports the same terminal state.
    let again = server.job(job.job_id()).unwrap();
    assert_eq!(again.status().await.unwrap(), JobStatus::Succeeded);
    assert_eq!(again.results().await.unwrap(), done.results);

    done
}

#[tokio::test]
async fn test_spectral_index_on_sdk_server() {
    let mock = MockServer::start().await;
    mount_sdk_server(&mock).await;

    let base = Url::parse(&mock.uri()).unwrap();
    let started = Instant::now();
    let server = AnyServer::connect(&base, session(), Protocol::Auto).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(server.protocol(), Protocol::Sdk);

    let done = run_spectral_index(&server, &mock).await;
    assert_eq!(done.progress, 100);
    assert_eq!(done.error_message, "");
    assert!(done.results["OUTPUT_RASTER"]["url"]
        .as_str()
        .unwrap()
        .ends_with("/jobs/101/OUTPUT_RASTER.dat"));
}

#[tokio::test]
async fn test_spectral_index_on_ese_server() {
    let mock = MockServer::start().await;
    mount_ese_server(&mock).await;
    Mock::given(method("GET"))
        .and(path("/reports/server-info"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock)
        .await;

    let base = Url::parse(&mock.uri()).unwrap();
    let started = Instant::now();
    let server = AnyServer::connect(&base, session(), Protocol::Auto).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(server.protocol(), Protocol::Ese);

    let done = run_spectral_index(&server, &mock).await;
    assert!(done.results["OUTPUT_RASTER"]["url"]
        .as_str()
        .unwrap()
        .ends_with("/ese/jobs/7/OUTPUT_RASTER.dat"));

    assert!(matches!(server.jobs().await, Err(GsfError::Unsupported(_))));
}

#[tokio::test]
async fn test_unknown_job_and_service() {
    let mock = MockServer::start().await;
    mount_sdk_server(&mock).await;
    Mock::given(method("GET"))
        .and(path("/jobs/-1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Job -1 not found"))
        .mount(&mock)
        .await;

    let server = AnyServer::connect(&Url::parse(&mock.uri()).unwrap(), session(), Protocol::Sdk)
        .await
        .unwrap();

    match server.job(-1).unwrap().status().await {
        Err(GsfError::JobNotFound(f)) => assert_eq!(f.status, Some(404)),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(matches!(
        server.service("__does_not_exist__").await,
        Err(GsfError::ServiceNotFound(_))
    ));
}
