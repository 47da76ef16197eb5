use std::io::Write;

use modelrelay_config::ConfigLoader;

#[test]
fn loads_config_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
httpPort: 7001
models:
  - id: a
    modelName: model-a
    baseUrl: http://127.0.0.1:9/v1
    apiKey: key-a
"#
    )
    .unwrap();

    let config = ConfigLoader::new(file.path()).load().unwrap();
    assert_eq!(config.http_port, 7001);
    assert_eq!(config.models[0].model_name, "model-a");
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = ConfigLoader::new(&path).load().unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
}
