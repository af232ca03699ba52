use std::fs::{create_dir, write};
use tempfile::TempDir;
use textsync_core::content::Format;

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("text.yaml");
    write(&path, yaml).expect("write config");
    path
}

/// A relative `path_docs` is resolved against the directory holding the file.
#[test]
fn test_load_config_resolves_path_docs_relative_to_file() {
    let dir = TempDir::new().expect("temp dir");
    create_dir(dir.path().join("src")).unwrap();
    let config_path = write_config(
        &dir,
        r#"
identifier: xyz
path_docs: ./src
template_file: page.html
collection:
  name: cv
  description: Curriculum vitae
documents:
  resume:
    content_file: a.rst
    description: My resume
    format_in: rst
    format_out: html
    tags: [resume, cv]
  style:
    content_file: b.css
    description: Styles
    format_in: css
    format_out: css
"#,
    );

    let config =
        textsync::load_config::load_config(&config_path).expect("Config should load");

    assert_eq!(config.identifier, "xyz");
    assert_eq!(config.path_docs, dir.path().join("./src"));
    assert_eq!(
        config.status_path(),
        dir.path().join("./src").join(".text.status.yaml")
    );
    assert_eq!(
        config.template_path(),
        Some(dir.path().join("./src").join("page.html"))
    );
    assert_eq!(config.documents.len(), 2);
    let resume = &config.documents["resume"];
    assert_eq!(resume.format_in, Format::Rst);
    assert_eq!(resume.format_out, Format::Html);
    assert_eq!(resume.tags, vec!["resume".to_string(), "cv".to_string()]);
    assert!(config.documents["style"].tags.is_empty());
}

#[test]
fn test_load_config_errors_on_blank_identifier() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(
        &dir,
        r#"
identifier: "  "
path_docs: .
collection: { name: cv, description: "" }
documents:
  resume: { content_file: a.rst, description: "", format_in: rst, format_out: html }
"#,
    );

    let err = textsync::load_config::load_config(&config_path).unwrap_err();
    assert!(
        format!("{err:#}").contains("identifier"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn test_load_config_errors_on_unknown_format() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(
        &dir,
        r#"
identifier: xyz
path_docs: .
collection: { name: cv, description: "" }
documents:
  resume: { content_file: a.doc, description: "", format_in: word, format_out: html }
"#,
    );

    let err = textsync::load_config::load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
fn test_load_config_errors_on_missing_file() {
    let dir = TempDir::new().expect("temp dir");
    let err = textsync::load_config::load_config(dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
