//! Integration tests for the package registry.
//!
//! These tests drive the public API end to end:
//! - save, reload and staged-save atomicity of local packages
//! - lookup by version and liberal name matching
//! - archives with embedded packages
//! - size-bounded asset downloads
//!
//! Run with: `cargo test --test registry_integration`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use tokio_util::sync::CancellationToken;

use swole::content::{
    BoxFuture, Content, ContentInfo, ContentKind, ContentRef, CreationContent, CreationPart,
    DataContent, ImageContent, KindRegistry, ScriptContent,
};
use swole::package::{PackageIdentifier, PackageInfo, PackageManifest, PackageVersion};
use swole::registry::{
    write_entries, ArchiveEntry, DownloadError, MatchMode, Package, PackageFilter, ProgressFn,
    Registry, RegistryConfig, SaveReport, StagedSave, TransferProgress, Transport,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn registry_at(root: &Path) -> Registry {
    Registry::new(RegistryConfig::new(root.to_path_buf()))
}

fn id(name: &str, version: &str) -> PackageIdentifier {
    PackageIdentifier::parse(name, version).unwrap()
}

fn version(v: &str) -> PackageVersion {
    PackageVersion::parse(v).unwrap()
}

fn manifest_bytes(name: &str, version: &str) -> Vec<u8> {
    PackageManifest::new(PackageInfo::new(name, version))
        .to_bytes()
        .unwrap()
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 3, image::Rgba([255, 0, 0, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Archive with `foo.swlson` and an embedded `nested.swole` holding `inner`.
fn outer_archive() -> Vec<u8> {
    let inner = write_entries(&[
        ArchiveEntry::new("manifest.json", manifest_bytes("inner", "1.0")),
        ArchiveEntry::new("bar.swlua", br#"{"name":"bar","source":"print()"}"#.to_vec()),
    ])
    .unwrap();
    write_entries(&[
        ArchiveEntry::new("manifest.json", manifest_bytes("outer", "1.0")),
        ArchiveEntry::new("foo.swlson", br#"{"name":"foo","data":{"answer":42}}"#.to_vec()),
        ArchiveEntry::new("nested.swole", inner),
    ])
    .unwrap()
}

/// Serves a fixed payload in chunks, optionally declaring its total size.
struct SimulatedTransport {
    declared_total: Option<u64>,
    chunk: Vec<u8>,
    chunks: usize,
}

impl SimulatedTransport {
    fn payload(bytes: Vec<u8>) -> Self {
        Self {
            declared_total: Some(bytes.len() as u64),
            chunk: bytes,
            chunks: 1,
        }
    }
}

impl Transport for SimulatedTransport {
    fn fetch<'a>(
        &'a self,
        _uri: &'a Url,
        sink: &'a mut Vec<u8>,
        progress: ProgressFn<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), DownloadError>> {
        Box::pin(async move {
            progress(TransferProgress {
                received: 0,
                total: self.declared_total,
            });
            for _ in 0..self.chunks {
                if cancel.is_cancelled() {
                    return Err(DownloadError::Cancelled {
                        received: sink.len() as u64,
                    });
                }
                sink.extend_from_slice(&self.chunk);
                progress(TransferProgress {
                    received: sink.len() as u64,
                    total: self.declared_total,
                });
            }
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled {
                    received: sink.len() as u64,
                });
            }
            Ok(())
        })
    }
}

// ============================================================================
// Save and Reload
// ============================================================================

#[test]
fn test_save_then_reload_round_trip() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut registry = registry_at(temp.path());
    let pack = registry
        .create_local_package(PackageInfo::new("mypack", "1.2").with_curator("tester"))
        .unwrap();

    let dependency = id("props", "3.0");
    {
        let local = registry.edit_local_package(&pack).unwrap();
        local.add(Arc::new(DataContent::new(
            ContentInfo::new("settings"),
            serde_json::json!({"gravity": 9.8}),
        )));
        local.add(Arc::new(ScriptContent::new(ContentInfo::new("main"), "start()")));
        local.add(Arc::new(CreationContent::new(
            ContentInfo::new("tower"),
            vec![CreationPart::new("crate", ContentKind::Model).from_package(dependency.clone())],
        )));
    }
    assert_eq!(
        registry.save_local_package(&pack),
        Some(SaveReport::Saved { files: 3 })
    );

    let mut reloaded = registry_at(temp.path());
    assert_eq!(reloaded.scan_local(), 1);
    let local = reloaded.local_package(&pack).unwrap();
    let current = local.current().unwrap();

    assert_eq!(local.identifier(), Some(pack.clone()));
    assert_eq!(current.manifest().info.curator, "tester");
    assert!(current.manifest().contains_dependency(&dependency));

    let mut items: Vec<(String, ContentKind)> = current
        .iter()
        .map(|item| (item.name().to_string(), item.kind()))
        .collect();
    items.sort();
    assert_eq!(
        items,
        vec![
            ("main".to_string(), ContentKind::Script),
            ("settings".to_string(), ContentKind::Data),
            ("tower".to_string(), ContentKind::Creation),
        ]
    );
}

#[test]
fn test_interrupted_save_leaves_original_unchanged() {
    let temp = tempfile::TempDir::new().unwrap();
    let dir = temp.path().join("local").join("mypack-v1.0");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("manifest.json"), manifest_bytes("mypack", "1.0")).unwrap();
    std::fs::write(dir.join("old.swlua"), br#"{"name":"old","source":"v1"}"#).unwrap();

    let mut registry = registry_at(temp.path());
    assert_eq!(registry.scan_local(), 1);
    let pack = id("mypack", "1.0");
    let old = registry.local_package(&pack).unwrap().current().unwrap().get(0).cloned().unwrap();
    registry
        .edit_local_package(&pack)
        .unwrap()
        .replace(&old, Arc::new(ScriptContent::new(ContentInfo::new("old"), "v2")), true);

    let snapshot = registry.local_package(&pack).unwrap().current().unwrap().clone();
    let kinds = Arc::new(KindRegistry::standard());
    let staged = StagedSave::stage(&dir, &snapshot, kinds).unwrap();
    assert!(staged.staging_path().join("old.swlua").exists());
    // Interrupted before the swap
    drop(staged);

    let text = std::fs::read_to_string(dir.join("old.swlua")).unwrap();
    assert!(text.contains("v1"));
    let siblings = std::fs::read_dir(dir.parent().unwrap()).unwrap().count();
    assert_eq!(siblings, 1);
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_find_by_version() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut registry = registry_at(temp.path());
    for v in ["1.0", "1.10", "2.0", "1.9"] {
        registry.create_local_package(PackageInfo::new("mypack", v)).unwrap();
    }

    let latest = registry.find_package("mypack", None, PackageFilter::Any).unwrap();
    assert_eq!(latest.package.identifier(), Some(id("mypack", "2.0")));
    assert_eq!(latest.mode, MatchMode::Exact);

    let (exact, _) = registry.find_local_package("mypack", Some(&version("1.10"))).unwrap();
    assert_eq!(exact.identifier(), Some(id("mypack", "1.10")));

    assert!(registry.find_package("mypack", Some(&version("3.0")), PackageFilter::Any).is_none());
    assert!(registry.find_external_package("mypack", None).is_none());

    let listed: Vec<String> = registry
        .list_packages_by_name("mypack", PackageFilter::Any)
        .iter()
        .map(|p| p.display_name())
        .collect();
    assert_eq!(listed, vec!["mypack-2.0", "mypack-1.10", "mypack-1.9", "mypack-1.0"]);
}

#[test]
fn test_liberal_name_fallback() {
    let temp = tempfile::TempDir::new().unwrap();
    let archive = write_entries(&[ArchiveEntry::new("manifest.json", manifest_bytes("mypack", "1.0"))]).unwrap();

    let mut registry = registry_at(temp.path());
    assert_eq!(registry.load_external_bytes(archive.clone()), vec![id("mypack", "1.0")]);
    let found = registry.find_package("MyPack", None, PackageFilter::Any).unwrap();
    assert_eq!(found.mode, MatchMode::Liberal);
    assert_eq!(found.package.identifier(), Some(id("mypack", "1.0")));

    let mut strict = Registry::new(RegistryConfig::new(temp.path().to_path_buf()).with_liberal_matching(false));
    strict.load_external_bytes(archive);
    assert!(strict.find_package("MyPack", None, PackageFilter::Any).is_none());
    assert!(strict.find_package("mypack", None, PackageFilter::Any).is_some());
}

// ============================================================================
// Archives
// ============================================================================

#[test]
fn test_embedded_package_is_indexed_separately() {
    let temp = tempfile::TempDir::new().unwrap();
    let external = temp.path().join("external");
    std::fs::create_dir_all(&external).unwrap();
    std::fs::write(external.join("outer-1.0.swole"), outer_archive()).unwrap();
    std::fs::write(external.join("readme.txt"), b"not an archive").unwrap();

    let mut registry = registry_at(temp.path());
    assert_eq!(registry.scan_external(), 2);

    let (outer, _) = registry.find_external_package("outer", None).unwrap();
    assert!(!outer.is_embedded());
    assert_eq!(outer.package().len(), 1);
    let foo = outer.package().try_find::<DataContent>("foo", true).unwrap();
    assert_eq!(foo.data["answer"], 42);
    assert_eq!(outer.cache_path, temp.path().join("cache").join("outer-v1.0"));

    let (inner, _) = registry.find_external_package("inner", None).unwrap();
    assert!(inner.is_embedded());
    assert_eq!(inner.embedding.as_ref().unwrap().parent, id("outer", "1.0"));
    assert_eq!(inner.embedding.as_ref().unwrap().parent_cache_path, outer.cache_path);
    assert_eq!(inner.cache_path, outer.cache_path.join("embedded").join("inner-v1.0"));
    assert_ne!(inner.cache_path, outer.cache_path);
    assert!(inner.display_name().ends_with("(embedded)"));
    assert!(inner.package().try_find::<ScriptContent>("bar", true).is_some());
}

#[test]
fn test_archive_without_manifest_is_not_indexed() {
    let temp = tempfile::TempDir::new().unwrap();
    let archive = write_entries(&[ArchiveEntry::new("foo.swlson", br#"{"name":"foo"}"#.to_vec())]).unwrap();

    let mut registry = registry_at(temp.path());
    assert!(registry.load_external_bytes(archive).is_empty());
    assert!(registry.external_packages().is_empty());
}

#[tokio::test]
async fn test_image_source_downloaded_while_loading() {
    let temp = tempfile::TempDir::new().unwrap();
    let archive = write_entries(&[
        ArchiveEntry::new("manifest.json", manifest_bytes("skybox", "1.0")),
        ArchiveEntry::new(
            "sky.swimg",
            br#"{"name":"sky","source":"https://cdn.example.com/sky.png"}"#.to_vec(),
        ),
    ])
    .unwrap();

    let mut registry =
        registry_at(temp.path()).with_transport(Arc::new(SimulatedTransport::payload(png_bytes())));
    assert_eq!(registry.load_external_bytes_async(archive).await.len(), 1);

    let (skybox, _) = registry.find_external_package("skybox", None).unwrap();
    let sky = skybox.package().try_find::<ImageContent>("sky", true).unwrap();
    assert_eq!((sky.width, sky.height), (4, 3));
    assert_eq!(sky.source.as_deref(), Some("https://cdn.example.com/sky.png"));
}

#[tokio::test]
async fn test_async_scan_and_export() {
    let temp = tempfile::TempDir::new().unwrap();
    let dir = temp.path().join("local").join("tools-v0.5");
    std::fs::create_dir_all(dir.join("scripts")).unwrap();
    std::fs::write(dir.join("manifest.json"), manifest_bytes("tools", "0.5")).unwrap();
    std::fs::write(dir.join("scripts/run.swlua"), br#"{"name":"run","source":"go()"}"#).unwrap();

    let mut registry = registry_at(temp.path());
    assert_eq!(registry.scan_local_async().await, 1);

    let pack = id("tools", "0.5");
    let out = temp.path().join("exports");
    let path: PathBuf = registry
        .export_archive_async(&pack, PackageFilter::Local, &out)
        .await
        .unwrap();

    let loaded = registry.load_external_package_async(&path).await;
    assert_eq!(loaded, vec![pack]);
    let (external, _) = registry.find_external_package("tools", None).unwrap();
    let run: &ContentRef = external.package().find("run", Some(ContentKind::Script)).unwrap();
    assert_eq!(
        run.info().relative_path.as_deref(),
        Some(Path::new("scripts/run.swlua"))
    );
}

// ============================================================================
// Bounded Downloads
// ============================================================================

#[test]
fn test_declared_size_over_local_ceiling_is_rejected() {
    let temp = tempfile::TempDir::new().unwrap();
    let transport = SimulatedTransport {
        declared_total: Some(60_000_000),
        chunk: vec![0u8; 1024],
        chunks: 8,
    };
    let registry = registry_at(temp.path()).with_transport(Arc::new(transport));

    let download = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(registry.downloader().fetch_bounded("file:///assets/huge.bin"));
    assert!(!download.is_complete());
    assert!(download.bytes.is_empty());

    assert!(registry.download_asset("file:///assets/huge.bin").is_empty());
}

#[test]
fn test_undeclared_stream_is_cancelled_and_discarded() {
    let temp = tempfile::TempDir::new().unwrap();
    let transport = SimulatedTransport {
        declared_total: None,
        chunk: vec![1u8; 1_000_000],
        chunks: 40,
    };
    let registry = registry_at(temp.path()).with_transport(Arc::new(transport));

    assert!(registry.download_asset("https://example.com/stream.bin").is_empty());
}

#[test]
fn test_download_within_ceiling() {
    let temp = tempfile::TempDir::new().unwrap();
    let registry = registry_at(temp.path()).with_transport(Arc::new(SimulatedTransport::payload(vec![9u8; 2048])));

    assert_eq!(registry.download_asset("https://example.com/small.bin").len(), 2048);
}
