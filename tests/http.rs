mod common;

use std::fs;
use std::time::{Duration, Instant};

use common::{fixture, serve, serve_silently, Route};
use launcher_updater::bundle::SystemBundleStore;
use launcher_updater::error::DownloadError;
use launcher_updater::fetch::{ArchiveSource, DownloadKind, HttpTransport};
use launcher_updater::locale::{self, Lang};
use launcher_updater::manifest::ManifestSource;
use launcher_updater::mega::MegaProvider;
use launcher_updater::replace::{RunMode, SelfReplaceCoordinator};
use launcher_updater::{LauncherConfig, LauncherPaths, Outcome, Status, Updater};

const MANIFEST: &str = r#"{
    "launcher": {"version": "1.0", "url": ""},
    "system": {"version": "3", "url": "SYSTEM_URL"}
}"#;

fn transport() -> HttpTransport {
    HttpTransport::new(&LauncherConfig::default()).unwrap()
}

#[test]
fn fetches_and_parses_manifest() {
    let server = serve(vec![Route::ok(
        "/version.json",
        MANIFEST.replace("SYSTEM_URL", "http://x/sys3.zip"),
    )]);
    let manifest = transport()
        .fetch_manifest(&server.url("/version.json"))
        .unwrap();
    assert_eq!(manifest.launcher_release(), None);
    assert_eq!(manifest.system_release().unwrap().url, "http://x/sys3.zip");
}

#[test]
fn manifest_errors_collapse_into_network_error() {
    let server = serve(vec![
        Route::status("/down.json", 503),
        Route::ok("/html.json", "<html>maintenance</html>"),
    ]);
    let transport = transport();
    assert!(transport.fetch_manifest(&server.url("/down.json")).is_err());
    assert!(transport.fetch_manifest(&server.url("/html.json")).is_err());
    assert!(transport.fetch_manifest("").is_err());
}

#[test]
fn manifest_fetch_times_out() {
    let server = serve_silently();
    let transport = transport().with_manifest_timeout(Duration::from_millis(300));
    let started = Instant::now();
    assert!(transport.fetch_manifest(&server.url("/version.json")).is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn download_streams_body_to_disk() {
    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    let server = serve(vec![Route::ok("/launcher.exe", payload.clone())]);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("launcher_new");

    transport()
        .download(&server.url("/launcher.exe"), &dest, DownloadKind::Launcher)
        .unwrap();

    assert_eq!(fs::read(&dest).unwrap(), payload);
}

#[test]
fn download_rejects_error_status() {
    let server = serve(vec![]);
    let dir = tempfile::tempdir().unwrap();
    let err = transport()
        .download(
            &server.url("/missing.zip"),
            &dir.path().join("system_update.zip"),
            DownloadKind::Bundle,
        )
        .unwrap_err();
    assert!(matches!(err, DownloadError::Status { status: 404, .. }));
}

#[test]
fn hosted_links_go_through_the_proxy() {
    let server = serve(vec![Route::ok("/proxy", "bundle bytes")]);
    let config = LauncherConfig {
        provider_proxy_url: Some(server.url("/proxy")),
        ..LauncherConfig::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("system_update.zip");

    HttpTransport::new(&config)
        .unwrap()
        .download("https://mega.nz/file/abc#key", &dest, DownloadKind::Bundle)
        .unwrap();

    assert_eq!(fs::read(&dest).unwrap(), b"bundle bytes");
    assert_eq!(
        server.requests(),
        vec!["/proxy?uri=https%3A%2F%2Fmega.nz%2Ffile%2Fabc%23key"]
    );
}

// 32-byte link key 00..1f and "hosted bundle bytes" encrypted with it
const LINK_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";
const ENCRYPTED: [u8; 19] = [
    0xf5, 0xed, 0xab, 0x1c, 0x92, 0x44, 0x74, 0x36, 0x49, 0xbb, 0xce, 0xde, 0xe2, 0x32, 0x5f,
    0xd9, 0x5f, 0xd2, 0x31,
];

#[test]
fn hosted_links_are_resolved_and_decrypted() {
    let files = serve(vec![Route::ok("/dl/abc", ENCRYPTED.to_vec())]);
    let api = serve(vec![Route::ok(
        "/cs",
        format!(r#"[{{"s": 19, "at": "x", "g": "{}"}}]"#, files.url("/dl/abc")),
    )]);
    let transport =
        HttpTransport::with_provider(Box::new(MegaProvider::with_api_url(api.url("/cs")))).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("system_update.zip");

    transport
        .download(
            &format!("https://mega.nz/file/Xy12AbCd#{}", LINK_KEY),
            &dest,
            DownloadKind::Bundle,
        )
        .unwrap();

    assert_eq!(fs::read(&dest).unwrap(), b"hosted bundle bytes");
    let calls = api.requests();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("/cs?id="));
    assert_eq!(files.requests(), vec!["/dl/abc"]);
}

#[test]
fn hosted_provider_errors_are_reported() {
    let api = serve(vec![Route::ok("/cs", "[-9]")]);
    let transport =
        HttpTransport::with_provider(Box::new(MegaProvider::with_api_url(api.url("/cs")))).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = transport
        .download(
            &format!("https://mega.nz/#!Xy12AbCd!{}", LINK_KEY),
            &dir.path().join("launcher_new"),
            DownloadKind::Launcher,
        )
        .unwrap_err();

    assert!(matches!(err, DownloadError::Provider(_)));
    assert!(err.to_string().contains("not found"));
}

#[test]
fn manifest_with_bom_is_accepted() {
    let body = [
        b"\xef\xbb\xbf".as_slice(),
        MANIFEST.replace("SYSTEM_URL", "http://x/sys3.zip").as_bytes(),
    ]
    .concat();
    let server = serve(vec![Route::ok("/version.json", body)]);
    let manifest = transport()
        .fetch_manifest(&server.url("/version.json"))
        .unwrap();
    assert_eq!(manifest.system_release().unwrap().version, "3");
}

struct Install {
    _dir: tempfile::TempDir,
    config: LauncherConfig,
    paths: LauncherPaths,
}

fn install(manifest_url: String) -> Install {
    let dir = tempfile::tempdir().unwrap();
    let config = LauncherConfig {
        launcher_version: "1.0".to_string(),
        version_manifest_url: manifest_url,
        start_file: "game.exe".to_string(),
        ..LauncherConfig::default()
    };
    let paths = LauncherPaths::new(dir.path(), &config);
    Install {
        _dir: dir,
        config,
        paths,
    }
}

fn development(paths: &LauncherPaths) -> SelfReplaceCoordinator {
    SelfReplaceCoordinator::new(RunMode::Development {
        staging_dir: paths.staging_dir(),
    })
}

#[test]
fn system_bundle_is_installed_over_http() {
    let bundle = fs::read(fixture("bundle_encrypted.zip")).unwrap();
    let files = serve(vec![Route::ok("/sys3.zip", bundle)]);
    let api = serve(vec![Route::ok(
        "/version.json",
        MANIFEST.replace("SYSTEM_URL", &files.url("/sys3.zip")),
    )]);
    let install = install(api.url("/version.json"));
    let transport = transport();
    let mut seen = Vec::new();
    let mut sink = |status: &Status| seen.push(status.clone());

    let report = Updater::new(
        &install.config,
        &install.paths,
        &transport,
        &transport,
        development(&install.paths),
    )
    .check_updates(&mut sink);

    assert_eq!(report.outcome, Outcome::Updated);
    assert!(!report.restart_requested);
    assert_eq!(
        seen,
        vec![
            Status::CheckingUpdates,
            Status::DownloadingSystem {
                version: "3".to_string()
            },
            Status::ExtractingSystem,
            Status::SystemUpdated {
                version: "3".to_string()
            },
        ]
    );

    let store = SystemBundleStore::new(install.paths.system_dir());
    assert_eq!(store.local_version().as_deref(), Some("3"));
    assert_eq!(
        fs::read_to_string(install.paths.system_dir().join("data/maps/map01.dat")).unwrap(),
        "map01 tiles\n"
    );
    assert_eq!(files.requests(), vec!["/sys3.zip"]);
}

#[test]
fn unreachable_manifest_blocks_play() {
    let api = serve_silently();
    let install = install(api.url("/version.json"));
    let store = SystemBundleStore::new(install.paths.system_dir());
    store.set_version("2").unwrap();
    let transport = transport().with_manifest_timeout(Duration::from_millis(300));
    let mut sink = |_: &Status| {};

    let report = Updater::new(
        &install.config,
        &install.paths,
        &transport,
        &transport,
        development(&install.paths),
    )
    .check_updates(&mut sink);

    assert_eq!(report.outcome, Outcome::Failed);
    assert!(!report.outcome.allows_play());
    let last = report.last_status.unwrap();
    assert_eq!(last, Status::ManifestUnavailable);
    assert!(locale::render(&last, Lang::En)
        .to_lowercase()
        .contains("could not verify"));
    assert_eq!(store.local_version().as_deref(), Some("2"));
}
