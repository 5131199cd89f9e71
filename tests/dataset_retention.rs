use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use equipment_data_processing::config::Config;
use equipment_data_processing::service::EquipmentService;
use equipment_data_processing::types::{DatasetId, OwnerId};
use equipment_data_processing::ErrorKind;

const VALID: &str = "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
                     P-101,Pump,120.5,5.2,80\n\
                     V-201,Valve,40,2.1,60\n";

fn tmp_data_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("equipment-it-{tag}-{nanos}"))
}

fn artifact_of(service: &EquipmentService, owner: &OwnerId, id: DatasetId) -> PathBuf {
    service
        .get_dataset(owner, id)
        .unwrap()
        .dataset
        .source_path
        .expect("file-backed uploads keep an artifact")
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

fn documents_in(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|d| {
            d.filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
                .count()
        })
        .unwrap_or(0)
}

#[test]
fn sixth_upload_evicts_the_oldest_and_its_artifact() {
    let data_dir = tmp_data_dir("retention");
    let service = EquipmentService::open(&Config::with_data_dir(&data_dir)).unwrap();
    let owner = OwnerId::new("alice");

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(service.upload(&owner, &format!("run-{i}.csv"), VALID).unwrap().id);
    }
    let oldest_artifact = artifact_of(&service, &owner, ids[0]);
    assert!(oldest_artifact.exists());
    assert_eq!(files_in(&data_dir.join("uploads").join("alice")), 5);

    let newest = service.upload(&owner, "run-5.csv", VALID).unwrap();

    let listing = service.list_datasets(&owner).unwrap();
    assert_eq!(listing.len(), 5);
    assert_eq!(listing[0].id, newest.id);
    assert!(listing.iter().all(|d| d.id != ids[0]));
    assert_eq!(
        service.get_dataset(&owner, ids[0]).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(!oldest_artifact.exists());
    assert_eq!(files_in(&data_dir.join("uploads").join("alice")), 5);
    assert_eq!(documents_in(&data_dir.join("datasets")), 5);

    fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn retention_never_touches_other_owners() {
    let data_dir = tmp_data_dir("owners");
    let service = EquipmentService::open(&Config::with_data_dir(&data_dir)).unwrap();
    let alice = OwnerId::new("alice");
    let bob = OwnerId::new("bob");

    let bob_id = service.upload(&bob, "bob.csv", VALID).unwrap().id;
    for i in 0..8 {
        service.upload(&alice, &format!("a{i}.csv"), VALID).unwrap();
    }

    assert_eq!(service.list_datasets(&alice).unwrap().len(), 5);
    assert_eq!(service.list_datasets(&bob).unwrap()[0].id, bob_id);

    fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn configured_retention_limit_is_honored() {
    let data_dir = tmp_data_dir("limit");
    let config = Config {
        retention_limit: 2,
        ..Config::with_data_dir(&data_dir)
    };
    let service = EquipmentService::open(&config).unwrap();
    let owner = OwnerId::new("alice");
    for i in 0..4 {
        service.upload(&owner, &format!("r{i}.csv"), VALID).unwrap();
    }
    let names: Vec<_> = service
        .list_datasets(&owner)
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["r3.csv", "r2.csv"]);

    fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn datasets_survive_reopening_the_store() {
    let data_dir = tmp_data_dir("reopen");
    let owner = OwnerId::new("alice");
    let config = Config::with_data_dir(&data_dir);

    let first = {
        let service = EquipmentService::open(&config).unwrap();
        service.upload(&owner, "plant.csv", VALID).unwrap()
    };

    let service = EquipmentService::open(&config).unwrap();
    let summary = service.get_summary(&owner, first.id).unwrap();
    assert_eq!(summary, first);

    let second = service.upload(&owner, "plant-2.csv", VALID).unwrap();
    assert!(second.id > first.id);
    assert!(second.created_at > first.created_at);

    fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn delete_removes_document_and_artifact() {
    let data_dir = tmp_data_dir("delete");
    let service = EquipmentService::open(&Config::with_data_dir(&data_dir)).unwrap();
    let owner = OwnerId::new("alice");

    let id = service.upload(&owner, "plant.csv", VALID).unwrap().id;
    let artifact = artifact_of(&service, &owner, id);

    service.delete_dataset(&owner, id).unwrap();
    assert!(!artifact.exists());
    assert_eq!(documents_in(&data_dir.join("datasets")), 0);
    assert_eq!(
        service.delete_dataset(&owner, id).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    fs::remove_dir_all(&data_dir).ok();
}
