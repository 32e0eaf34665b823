use super::*;
use glowboost_api::SalonSeed;
use serial_test::serial;

fn memory_config(seeds: &[(&str, &str)]) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.webhook.allow_unsigned = true;
    config.store.salons = seeds
        .iter()
        .map(|(id, email)| SalonSeed {
            id: id.to_string(),
            organizer_email: email.to_string(),
        })
        .collect();
    config
}

#[tokio::test]
async fn test_memory_store_is_seeded_from_config() {
    let config = memory_config(&[("s1", "owner@one.example"), ("s2", "owner@two.example")]);

    let store = build_store(&config).await.unwrap();

    let salon = store
        .find_salon_by_organizer_email("owner@two.example")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(salon.id.as_str(), "s2");
}

#[tokio::test]
async fn test_duplicate_seed_email_fails_startup() {
    let config = memory_config(&[("s1", "owner@one.example"), ("s2", "owner@one.example")]);

    assert!(build_store(&config).await.is_err());
}

#[cfg(not(feature = "postgres"))]
#[tokio::test]
async fn test_postgres_backend_requires_feature() {
    let mut config = memory_config(&[]);
    config.store.backend = StoreBackend::Postgres;
    config.store.database_url = Some("postgres://localhost/glowboost".to_string());

    let err = match build_store(&config).await {
        Ok(_) => panic!("postgres backend should not build without the feature"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("postgres"));
}

#[test]
#[serial]
fn test_invalid_level_falls_back_to_default_filter() {
    std::env::remove_var("RUST_LOG");
    let logging = LoggingConfig {
        level: "not a [valid filter".to_string(),
        json_format: false,
    };

    let filter = env_filter(&logging);

    assert!(filter.to_string().contains("glowboost_service=info"));
}

#[test]
#[serial]
fn test_missing_secret_fails_config_load() {
    std::env::remove_var(CONFIG_FILE_ENV);
    std::env::remove_var(WEBHOOK_SECRET_ENV);
    std::env::remove_var("GB__WEBHOOK__ALLOW_UNSIGNED");

    let err = load_config().unwrap_err();

    assert!(format!("{err:#}").contains("webhook.secret"));
}

#[test]
#[serial]
fn test_secret_from_environment_completes_config() {
    std::env::remove_var(CONFIG_FILE_ENV);
    std::env::set_var(WEBHOOK_SECRET_ENV, "whsec_from_env");

    let config = load_config();
    std::env::remove_var(WEBHOOK_SECRET_ENV);

    assert!(config.unwrap().webhook.secret.is_some());
}
