use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonthlySiteAggregate {
    month: u32,
    pflegetage: f64,
    betten: u32,
    stationsauslastung: f64,
    station_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationMonthlySeries {
    station_name: String,
}

#[derive(Debug, Deserialize)]
struct OccupancyReport {
    months: Vec<MonthlySiteAggregate>,
    stations: Vec<StationMonthlySeries>,
}

#[derive(Debug, Deserialize)]
struct StationOptionsResponse {
    options: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ComparisonMonth {
    month: u32,
    metrics: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonSeries {
    id: String,
    monthly_data: Vec<ComparisonMonth>,
}

#[derive(Debug, Deserialize)]
struct MovementResponse {
    months: Vec<Option<f64>>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn write_data_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push(format!("occupancy_http_{}_{}", std::process::id(), nanos));
    std::fs::create_dir_all(&dir).expect("create data dir");

    let groups = serde_json::json!([{
        "name": "PRNGHZ Station S3/S4 GHZ",
        "mitglieder": [{ "stationName": "PRNGHZS3" }, { "stationName": "PRNGHZS4" }]
    }]);
    let beds = serde_json::json!([
        { "Standort": "PRI", "Station": "PRNGHZ Station S3/S4 GHZ", "Jahr": 2025, "Bettenanzahl": 16 },
        { "Standort": "PRI", "Station": "2IM", "Jahr": 2025, "Bettenanzahl": 20 }
    ]);
    let uploads = serde_json::json!([{
        "month": "03-2025",
        "locationsData": { "PRI": [{ "data": [
            { "Station": "PRNGHZS3", "Pflegetage": 180 },
            { "Station": "PRNGHZS4", "Pflegetage": 120 },
            { "Standort": "PRI", "Typ": "Aufnahmen", "Januar": 40, "Februar": 38 }
        ]}]}
    }]);

    for (name, value) in [("groups.json", groups), ("beds.json", beds), ("uploads.json", uploads)] {
        std::fs::write(dir.join(name), serde_json::to_vec_pretty(&value).unwrap())
            .expect("write fixture");
    }
    dir
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/sites")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_dir = write_data_dir();
    let child = Command::new(env!("CARGO_BIN_EXE_occupancy_dashboard"))
        .env("PORT", port.to_string())
        .env("DASHBOARD_DATA_DIR", data_dir)
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn occupancy(client: &Client, base_url: &str) -> OccupancyReport {
    client
        .get(format!("{base_url}/api/occupancy?site=PRI&year=2025"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_occupancy_counts_group_beds_once() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let report = occupancy(&client, &server.base_url).await;
    assert_eq!(report.months.len(), 12);

    let march = &report.months[2];
    assert_eq!(march.month, 3);
    assert_eq!(march.betten, 16);
    assert_eq!(march.pflegetage, 300.0);
    assert!((march.stationsauslastung - 60.48).abs() < 0.01);
    assert!(report.stations.iter().any(|s| s.station_name == "PRNGHZS3"));
}

#[tokio::test]
async fn http_station_options_collapse_groups() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response: StationOptionsResponse = client
        .get(format!("{}/api/stations?site=PRI&year=2025", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(response.options.iter().any(|o| o == "PRNGHZ Station S3/S4 GHZ"));
    assert!(!response.options.iter().any(|o| o == "PRNGHZS3"));
}

#[tokio::test]
async fn http_comparison_keeps_nulls() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let series: Vec<ComparisonSeries> = client
        .get(format!(
            "{}/api/comparison?site=PRI&year=2025&select=PRNGHZ%20Station%20S3%2FS4%20GHZ,2IM&all=true",
            server.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(series[0].id, "PRNGHZ Station S3/S4 GHZ");
    assert_eq!(series[2].id, "all");

    let march = &series[0].monthly_data[2];
    assert_eq!(march.month, 3);
    assert_eq!(march.metrics["betten"], serde_json::json!(16.0));
    assert!(series[0].monthly_data[0].metrics["pflegetage"].is_null());

    let all_march = &series[2].monthly_data[2].metrics;
    assert_eq!(all_march["betten"], serde_json::json!(16.0));
    assert_eq!(all_march["pflegetage"], serde_json::json!(300.0));
    let occupancy = all_march["stationsauslastung"].as_f64().unwrap();
    assert!((occupancy - 60.48).abs() < 0.01);
}

#[tokio::test]
async fn http_movements_read_pivot_columns() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response: MovementResponse = client
        .get(format!("{}/api/movements?site=PRI&typ=Aufnahmen", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response.months.len(), 12);
    assert_eq!(response.months[0], Some(40.0));
    assert_eq!(response.months[1], Some(38.0));
    assert_eq!(response.months[2], None);
}

#[tokio::test]
async fn http_upload_triggers_recomputation() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let rejected = client
        .post(format!("{}/api/uploads", server.base_url))
        .json(&serde_json::json!({ "month": "13-2025", "locationsData": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);

    let before = occupancy(&client, &server.base_url).await;
    let response = client
        .post(format!("{}/api/uploads", server.base_url))
        .json(&serde_json::json!({
            "month": "04-2025",
            "locationsData": { "PRI": [{ "data": [{ "Station": "2IM", "Pflegetage": 450 }] }] }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let after = occupancy(&client, &server.base_url).await;
    assert_eq!(before.months[2].pflegetage, after.months[2].pflegetage);
    assert_eq!(after.months[3].betten, 20);
    assert_eq!(after.months[3].station_count, 1);
    assert!((after.months[3].stationsauslastung - 75.0).abs() < 1e-9);
}

#[tokio::test]
async fn http_missing_site_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/occupancy", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}
