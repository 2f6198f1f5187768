mod common;

use common::{FakeRemoteQuery, PostgresTestFixture};
use searchcore::{CatalogReader, EntityName, QueryFormat, QueryOptions, SearchModuleOptions};
use serde_json::{Value, json};

fn options() -> SearchModuleOptions {
    serde_json::from_value(json!({
        "schema": {
            "entities": [
                { "alias": "service_zone", "entity": "ServiceZone", "fields": ["id", "name"] },
                {
                    "alias": "geo_zone",
                    "entity": "GeoZone",
                    "fields": [
                        "id", "type", "country_code", "province_code", "city",
                        "postal_expression", "service_zone.id"
                    ],
                    "parents": [{ "alias": "service_zone", "target_prop": "geo_zones" }]
                }
            ]
        }
    }))
    .expect("options should deserialize")
}

/// Four geo zones, one per shape.
fn geo_zones() -> Vec<Value> {
    vec![
        json!({ "id": "fgz_1", "type": "country", "country_code": "fr" }),
        json!({ "id": "fgz_2", "type": "province", "country_code": "fr", "province_code": "idf" }),
        json!({ "id": "fgz_3", "type": "city", "country_code": "fr", "province_code": "idf", "city": "paris" }),
        json!({
            "id": "fgz_4",
            "type": "zip",
            "country_code": "fr",
            "province_code": "idf",
            "city": "paris",
            "postal_expression": { "type": "regex", "exp": "^75[0-9]{3}$" }
        }),
    ]
}

fn remote() -> FakeRemoteQuery {
    let with_parent = geo_zones()
        .into_iter()
        .map(|mut zone| {
            zone["service_zone"] = json!({ "id": "serzo_1" });
            zone
        })
        .collect();

    FakeRemoteQuery::new()
        .with_records("service_zone", vec![json!({ "id": "serzo_1", "name": "Paris delivery" })])
        .with_records("geo_zone", with_parent)
}

#[tokio::test]
async fn service_zone_geo_zones_round_trip_and_cascade() {
    // Given: A service zone created with four geo zones of four shapes
    let fixture = PostgresTestFixture::new().await;
    let (provider, bus) = fixture.provider(&options(), remote()).await;
    let _ = bus
        .emit("service_zone.created", json!({ "id": "serzo_1" }))
        .await
        .expect("service zone should project");
    let ids: Vec<Value> = geo_zones().iter().map(|zone| json!({ "id": zone["id"] })).collect();
    let _ = bus
        .emit(
            "geo_zone.created",
            json!({ "body": { "metadata": { "action": "created" }, "data": ids.clone() } }),
        )
        .await
        .expect("geo zones should project");

    // When: The service zone is queried with fully expanded geo zones
    let selection = QueryFormat::new(json!({ "service_zone": { "name": true, "geo_zones": {} } }));
    let zones = provider
        .query(&selection, &QueryOptions::default())
        .await
        .expect("query should succeed");

    // Then: All four geo zones come back verbatim
    assert_eq!(
        zones,
        vec![json!({ "id": "serzo_1", "name": "Paris delivery", "geo_zones": geo_zones() })]
    );

    // When: The service zone is deleted and the deletion cascades to its geo zones
    let _ = bus
        .emit("service_zone.deleted", json!({ "id": "serzo_1" }))
        .await
        .expect("service zone delete should project");
    let geo_zone = EntityName::try_new("GeoZone").expect("valid entity name");
    for zone in geo_zones() {
        let id = zone["id"].as_str().expect("geo zone id");
        assert!(
            fixture
                .store
                .relations_for(&geo_zone, id)
                .await
                .expect("relation read should succeed")
                .is_empty()
        );
    }
    let _ = bus
        .emit("geo_zone.deleted", json!(ids))
        .await
        .expect("geo zone deletes should project");

    // Then: Neither the parent nor any geo zone remains
    let remaining = provider
        .query(
            &QueryFormat::new(json!({ "geo_zone": { "type": true } })),
            &QueryOptions::default(),
        )
        .await
        .expect("query should succeed");
    assert!(remaining.is_empty());
    assert!(
        provider
            .query(&selection, &QueryOptions::default())
            .await
            .expect("query should succeed")
            .is_empty()
    );
    assert_eq!(
        fixture
            .store
            .count_relations()
            .await
            .expect("count should succeed"),
        0
    );
}
