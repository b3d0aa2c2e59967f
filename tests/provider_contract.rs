//! Contract every provider adapter honours behind `dyn DataSource`.

use std::sync::Arc;

use hydrocast_core::adapters::{open_meteo, power};
use hydrocast_core::{
    Coordinate, DataSource, HttpResponse, OpenMeteoAdapter, PowerAdapter, ProviderError,
    ProviderId, RetryPolicy, ScriptedHttpClient, SeriesKind, SeriesRequest, SharedCredential,
    TssAdapter, UtcDateTime,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const TSS: &str = "https://tss.test/";

fn request(kind: SeriesKind) -> SeriesRequest {
    SeriesRequest::trailing(
        Coordinate::new(-33.87, 151.21).expect("valid coordinate"),
        2,
        kind,
        UtcDateTime::parse("2024-05-08T10:37:00Z").expect("valid timestamp"),
    )
}

fn scripted() -> Arc<ScriptedHttpClient> {
    let tss = json!({
        "data": [
            {"time": "2024-05-08T03:00:00Z", "apcpsfc": 0.1, "SoilMoi0_10cm_inst": 0.2},
            {"time": "2024-05-08T01:00:00Z", "apcpsfc": 0.3, "tmp2m": 280.0},
            {"time": "2024-05-08T02:00:00Z", "apcpsfc": 0.0}
        ]
    });
    let power = json!({
        "properties": {"parameter": {
            "T2M": {"2024050803": 9.0, "2024050801": 8.0},
            "PRECTOTCORR": {"2024050802": 0.4}
        }}
    });
    let archive = json!({
        "hourly": {
            "time": ["2024-05-08T03:00", "2024-05-08T01:00", "2024-05-08T02:00"],
            "temperature_2m": [9.5, 8.5, null],
            "precipitation": [0.0, 0.2, 0.1]
        }
    });

    Arc::new(
        ScriptedHttpClient::new()
            .route(TSS, HttpResponse::ok_json(tss.to_string()))
            .route(power::ENDPOINT, HttpResponse::ok_json(power.to_string()))
            .route(open_meteo::ENDPOINT, HttpResponse::ok_json(archive.to_string())),
    )
}

fn adapters(client: &Arc<ScriptedHttpClient>) -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(
            TssAdapter::new(client.clone(), SharedCredential::default())
                .with_base_candidates(vec![String::from("https://tss.test/ts")]),
        ),
        Arc::new(PowerAdapter::new(client.clone())),
        Arc::new(OpenMeteoAdapter::new(client.clone())),
    ]
}

#[tokio::test]
async fn test_adapters_report_their_provider_ids_in_chain_order() {
    let client = scripted();
    let ids = adapters(&client)
        .iter()
        .map(|adapter| adapter.id())
        .collect::<Vec<_>>();

    assert_eq!(
        ids,
        vec![ProviderId::NasaTss, ProviderId::NasaPower, ProviderId::OpenMeteo]
    );
}

#[tokio::test]
async fn test_every_adapter_returns_ascending_samples_at_the_requested_point() {
    let client = scripted();
    let request = request(SeriesKind::Hourly);

    for adapter in adapters(&client) {
        let samples = adapter
            .fetch(&request, &CancellationToken::new())
            .await
            .unwrap_or_else(|error| panic!("{} failed: {error}", adapter.id()));

        assert_eq!(samples.len(), 3, "{}", adapter.id());
        assert!(
            samples.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp),
            "{} not ascending",
            adapter.id()
        );
        assert!(samples.iter().all(|sample| sample.latitude == -33.87));
    }
}

#[tokio::test]
async fn test_fallback_adapters_never_report_soil_moisture() {
    let client = scripted();
    let request = request(SeriesKind::Hourly);

    for adapter in adapters(&client).into_iter().skip(1) {
        let samples = adapter
            .fetch(&request, &CancellationToken::new())
            .await
            .expect("adapter serves");
        assert!(samples.iter().all(|sample| sample.soil_moisture.is_none()));
    }
}

#[tokio::test]
async fn test_missing_values_stay_absent_instead_of_zero() {
    let client = scripted();
    let request = request(SeriesKind::Hourly);
    let all = adapters(&client);

    let power_samples = all[1]
        .fetch(&request, &CancellationToken::new())
        .await
        .expect("power serves");
    assert_eq!(power_samples[0].precipitation_rate, None);
    assert_eq!(power_samples[1].temperature, None);

    let archive_samples = all[2]
        .fetch(&request, &CancellationToken::new())
        .await
        .expect("archive serves");
    assert_eq!(archive_samples[1].temperature, None);
    assert_eq!(archive_samples[2].precipitation_rate, Some(0.0));
}

#[tokio::test]
async fn test_malformed_samples_are_dropped_without_failing_the_batch() {
    let tss = json!({
        "data": [
            {"time": null, "apcpsfc": 1.0},
            {"time": "2024-05-08T01:00:00Z", "apcpsfc": "n/a"},
            {"time": "2024-05-08T02:00:00Z", "apcpsfc": 0.5}
        ]
    });
    let power = json!({
        "properties": {"parameter": {
            "PRECTOTCORR": {"2024050801": "n/a", "2024050802": 0.5, "later": 1.0}
        }}
    });
    let archive = json!({
        "hourly": {
            "time": [null, "2024-05-08T01:00", "2024-05-08T02:00"],
            "precipitation": [1.0, "n/a", 0.5]
        }
    });
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route(TSS, HttpResponse::ok_json(tss.to_string()))
            .route(power::ENDPOINT, HttpResponse::ok_json(power.to_string()))
            .route(open_meteo::ENDPOINT, HttpResponse::ok_json(archive.to_string())),
    );
    let request = request(SeriesKind::Daily);

    for adapter in adapters(&client) {
        let samples = adapter
            .fetch(&request, &CancellationToken::new())
            .await
            .unwrap_or_else(|error| panic!("{} failed: {error}", adapter.id()));

        assert_eq!(samples.len(), 2, "{}", adapter.id());
        assert_eq!(samples[0].precipitation_rate, None, "{}", adapter.id());
        assert_eq!(samples[1].precipitation_rate, Some(0.5), "{}", adapter.id());
    }
}

#[tokio::test]
async fn test_cancelled_token_stops_every_adapter_before_any_request() {
    let client = scripted();
    let cancel = CancellationToken::new();
    cancel.cancel();

    for kind in [SeriesKind::Hourly, SeriesKind::Daily] {
        let request = request(kind);
        for adapter in adapters(&client) {
            let error = adapter
                .fetch(&request, &cancel)
                .await
                .expect_err("cancelled");
            assert_eq!(error, ProviderError::Cancelled);
        }
    }
    assert_eq!(client.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_policy_stops_on_unauthorized_primary() {
    let client = Arc::new(ScriptedHttpClient::new().route(TSS, HttpResponse::new(401, "")));
    let adapter = TssAdapter::new(client.clone(), SharedCredential::default())
        .with_base_candidates(vec![String::from("https://tss.test/ts")]);
    let request = request(SeriesKind::Daily);
    let cancel = CancellationToken::new();

    let error = RetryPolicy::new(3, std::time::Duration::from_secs(1))
        .run(&cancel, || adapter.fetch(&request, &cancel))
        .await
        .expect_err("denied");

    assert!(!error.is_retryable());
    assert_eq!(client.request_count(), 2, "both format shapes of one base, one attempt");
}
