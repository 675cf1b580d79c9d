//! End-to-end import: CSV source -> staging -> swap -> production.

use std::sync::Arc;

use parcelforge::config::Settings;
use parcelforge::models::BatchStatus;
use parcelforge::pipeline::Orchestrator;
use parcelforge::repository::{CountyRepository, ParcelRepository, ParcelTable};
use parcelforge::swap::SwapCoordinator;

const CSV_HEADER: &str = "PARCEL_ID,OWN_NAME,PHY_ADDR1,PHY_CITY,PHY_STATE,PHY_ZIPCD,JV,ACT_YR_BLT,FLOOD_ZONE,ELEVATION,WKT\n";

fn miami_row(parcel_id: &str) -> String {
    format!(
        "{parcel_id},BISCAYNE HOLDINGS LLC,123 Brickell Ave,Miami,FL,33131,850000,1998,AE,4,\
         \"POLYGON((-80.192 25.761,-80.192 25.762,-80.191 25.762,-80.191 25.761,-80.192 25.761))\"\n"
    )
}

fn setup_county(settings: &Settings, fips: &str, rows: &[String]) {
    let dir = settings.county_source_dir(fips);
    std::fs::create_dir_all(&dir).unwrap();
    let mut contents = String::from(CSV_HEADER);
    for row in rows {
        contents.push_str(row);
    }
    std::fs::write(dir.join("parcels.csv"), contents).unwrap();
}

fn test_settings(dir: &tempfile::TempDir) -> Settings {
    let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
    settings.pipeline.batch_delay_ms = 0;
    settings.pipeline.batch_size = 2;
    settings
}

#[tokio::test]
async fn import_swap_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir);
    setup_county(
        &settings,
        "12086",
        &[miami_row("01-0001"), miami_row("01-0002"), miami_row("01-0003")],
    );

    // Import stages records without touching production
    let orchestrator = Orchestrator::new(settings.clone()).unwrap();
    let batch = orchestrator.process_county("12086").await.unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.records_processed, 3);
    assert_eq!(batch.records_succeeded, 3);

    let parcels = ParcelRepository::new(&settings.database_path()).unwrap();
    assert_eq!(parcels.count(ParcelTable::Staging).unwrap(), 3);
    assert_eq!(parcels.count(ParcelTable::Production).unwrap(), 0);

    // Swap publishes the staged records atomically
    let result = SwapCoordinator::new(&settings.database_path())
        .promote_staging(settings.pipeline.swap_min_fraction)
        .await
        .unwrap();
    assert_eq!(result.old_count, 0);
    assert_eq!(result.new_count, 3);
    assert_eq!(parcels.count(ParcelTable::Production).unwrap(), 3);
    assert_eq!(parcels.count(ParcelTable::Staging).unwrap(), 0);

    // Published records carry the derived features
    let record = parcels
        .get(ParcelTable::Production, "01-0001", "12086")
        .unwrap()
        .unwrap();
    assert!(record.spatial_features.coastal);
    assert_eq!(record.spatial_features.flood_zone.as_deref(), Some("AE"));
    assert!(record.risk_factors.hurricane >= 0.8);
    assert_eq!(record.risk_factors.storm_surge, Some(0.9));
    assert!(record.property_features.is_corporate_owner);
    assert_eq!(record.year_built, Some(1998));
    assert_eq!(
        record.address.as_deref(),
        Some("123 BRICKELL AVE MIAMI FL 33131")
    );
}

#[tokio::test]
async fn reimport_converges_and_preserves_production() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir);
    setup_county(&settings, "12015", &[miami_row("B-1"), miami_row("B-2")]);

    let orchestrator = Arc::new(Orchestrator::new(settings.clone()).unwrap());
    let counties = CountyRepository::new(&settings.database_path()).unwrap();
    orchestrator.process_county("12015").await.unwrap();
    SwapCoordinator::new(&settings.database_path())
        .promote_staging(0.5)
        .await
        .unwrap();

    // Second import of the same files stages the same two parcels again
    let batch = orchestrator.process_county("12015").await.unwrap();
    assert_eq!(batch.records_succeeded, 2);

    let parcels = ParcelRepository::new(&settings.database_path()).unwrap();
    assert_eq!(parcels.count(ParcelTable::Staging).unwrap(), 2);
    // Production still serves the first import until the next swap
    assert_eq!(parcels.count(ParcelTable::Production).unwrap(), 2);

    // Two successful runs bump the queue priority twice
    assert_eq!(
        counties.get("12015").unwrap().unwrap().processing_priority,
        2
    );
}
