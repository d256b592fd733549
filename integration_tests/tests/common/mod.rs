use std::path::PathBuf;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn ensure_test_catalog() {
    INIT.call_once(|| {
        let catalog_path = fixture_path("test_mission_catalog.json");

        debug_assert!(
            catalog_path.exists(),
            "missing test mission catalog at {}",
            catalog_path.display()
        );

        std::env::set_var("MISSION_CATALOG_PATH", &catalog_path);
    });
}
