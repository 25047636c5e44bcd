use serde_json::json;
use spinup::api::{extract, next_page};
use spinup::config::Config;
use spinup::model::{
    Firewall, Instance, InstanceStatus, ResourceRef, SizeTier, Snapshot, SshKey,
};
use spinup::provision::build_profile;

fn config() -> Config {
    let mut config = Config::new("token");
    config.ssh_keys = vec![
        ResourceRef::Id(512_190),
        ResourceRef::Slug("3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa".into()),
    ];
    config
}

#[test]
fn profile_defaults_to_base_image() {
    let profile = build_profile(&config(), "box", SizeTier::Medium, None, &[]);

    assert_eq!(profile.name, "box");
    assert_eq!(profile.size, "c-16-intel");
    assert_eq!(profile.region, "nyc1");
    assert_eq!(profile.image, ResourceRef::Slug("ubuntu-24-10-x64".into()));
    assert!(profile.monitoring);
    assert!(!profile.backups);
    assert_eq!(profile.tags, None);
}

#[test]
fn profile_body_matches_create_call() {
    let snapshot = Snapshot {
        id: "6372321".into(),
        name: "golden".into(),
        regions: vec![],
        min_disk_size: None,
    };
    let profile = build_profile(
        &config(),
        "box",
        SizeTier::Slow,
        Some(&snapshot),
        &["ci".to_string()],
    );

    assert_eq!(
        serde_json::to_value(&profile).unwrap(),
        json!({
            "name": "box",
            "region": "nyc1",
            "size": "c-8-intel",
            "image": 6_372_321,
            "ssh_keys": [512_190, "3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa"],
            "backups": false,
            "ipv6": true,
            "monitoring": true,
            "tags": ["ci"]
        })
    );
}

#[test]
fn profile_omits_empty_key_list() {
    let profile = build_profile(&Config::new("token"), "box", SizeTier::Slow, None, &[]);
    let body = serde_json::to_value(&profile).unwrap();

    assert!(body.get("ssh_keys").is_none());
    assert!(body.get("tags").is_none());
}

#[test]
fn decode_droplet_document() {
    let doc = json!({
        "droplet": {
            "id": 3_164_494,
            "name": "build-box",
            "status": "active",
            "size_slug": "c-8-intel",
            "created_at": "2024-03-01T10:00:00Z",
            "region": {"slug": "nyc1", "name": "New York 1"},
            "image": {"id": 6_918_990, "name": "golden", "slug": null},
            "tags": ["ci"],
            "networks": {
                "v4": [
                    {"ip_address": "10.128.192.124", "netmask": "255.255.0.0",
                     "gateway": "nil", "type": "private"},
                    {"ip_address": "192.241.165.154", "netmask": "255.255.240.0",
                     "gateway": "192.241.160.1", "type": "public"}
                ],
                "v6": []
            },
            "memory": 1024,
            "vcpus": 1
        }
    });

    let droplet: Instance = extract(&doc, "droplet").unwrap();

    assert_eq!(droplet.id, 3_164_494);
    assert_eq!(droplet.status, InstanceStatus::Active);
    assert_eq!(droplet.public_ipv4(), Some("192.241.165.154"));
    assert_eq!(droplet.region.slug, "nyc1");
}

#[test]
fn unknown_status_still_decodes() {
    let doc = json!({"droplet": {"id": 1, "name": "x", "status": "migrating"}});
    let droplet: Instance = extract(&doc, "droplet").unwrap();

    assert_eq!(droplet.status, InstanceStatus::Unknown);
    assert!(!droplet.is_active());
    assert_eq!(droplet.public_ipv4(), None);
}

#[test]
fn decode_firewalls_snapshots_and_keys() {
    let doc = json!({
        "firewalls": [{
            "id": "bb4b2611-3d72-467b-8602-280330ecd65c",
            "name": "web",
            "status": "succeeded",
            "droplet_ids": [8043964]
        }],
        "snapshots": [{
            "id": "6372321",
            "name": "golden",
            "regions": ["nyc1"],
            "min_disk_size": 25,
            "resource_type": "droplet"
        }],
        "ssh_keys": [{
            "id": 512_189,
            "name": "laptop",
            "fingerprint": "3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa",
            "public_key": "ssh-rsa AAAA..."
        }],
        "links": {},
        "meta": {"total": 1}
    });

    let firewalls: Vec<Firewall> = extract(&doc, "firewalls").unwrap();
    let snapshots: Vec<Snapshot> = extract(&doc, "snapshots").unwrap();
    let keys: Vec<SshKey> = extract(&doc, "ssh_keys").unwrap();

    assert_eq!(firewalls[0].droplet_ids, vec![8_043_964]);
    assert_eq!(snapshots[0].min_disk_size, Some(25));
    assert_eq!(keys[0].name, "laptop");
    assert_eq!(next_page(&doc), None);
}
