//! Integration tests for fillpdf
//!
//! The toolchain is replaced by small shell scripts that imitate pdftk and
//! exiftool, so these run without a PDF toolkit installed.

use fillpdf::form::{encode_fdf, encode_xfdf, FDF_FOOTER, FDF_HEADER};
use fillpdf::{
    Error, FieldFormat, FillOptions, FillOutput, Form, InfoEntry, PdfFiller, PdfServer, PdfSource,
    ServerConfig, Toolchain,
};
use pretty_assertions::assert_eq;

#[test]
fn test_fdf_hello_world_between_header_and_footer() {
    let form = Form::new().with("field_1", "Hello").with("field_2", "World");
    let text = String::from_utf8(encode_fdf(&form).unwrap()).unwrap();

    let body = text
        .strip_prefix(FDF_HEADER)
        .and_then(|rest| rest.strip_suffix(&format!("{}\n", FDF_FOOTER)))
        .expect("payload should be framed by the fixed header and footer");
    let lines: Vec<&str> = body.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(
        lines,
        vec![
            "<< /T (field_1) /V (Hello)>>",
            "<< /T (field_2) /V (World)>>"
        ]
    );
}

#[test]
fn test_encoders_disagree_only_on_non_latin1() {
    let latin = Form::new().with("city", "Zürich");
    assert!(encode_fdf(&latin).is_ok());
    assert!(encode_xfdf(&latin).is_ok());

    let wide = Form::new().with("city", "\u{6771}\u{4EAC}");
    assert!(matches!(encode_fdf(&wide), Err(Error::Encoding { .. })));
    assert!(encode_xfdf(&wide).unwrap().contains("\u{6771}\u{4EAC}"));
}

#[test]
fn test_missing_source_is_reported_first() {
    let filler = PdfFiller::with_toolchain(Toolchain::default().with_pdftk("/nonexistent/pdftk"));
    let result = filler.get_fields("/nonexistent/form.pdf");
    assert!(matches!(result, Err(Error::NotFound { .. })));
}

#[cfg(unix)]
mod fake_toolchain {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Imitates the pdftk operations fillpdf uses. `fill_form` concatenates the
    /// source, the payload and a flatten marker into the output file.
    const FAKE_PDFTK: &str = r#"#!/bin/sh
src="$1"
op="$2"
case "$op" in
  fill_form)
    {
      cat "$src"
      echo "% payload $(basename "$3")"
      cat "$3"
      if [ "$6" = "flatten" ]; then echo "% flattened"; fi
    } > "$5"
    ;;
  dump_data_fields_utf8)
    printf '%s\n' '---' 'FieldType: Text' 'FieldName: field_1' 'FieldFlags: 0' \
      'FieldJustification: Left' '---' 'FieldType: Button' 'FieldName: agree' \
      'FieldNameAlt: I agree' 'FieldFlags: 0'
    ;;
  dump_data_utf8)
    printf 'InfoBegin\nInfoKey: Producer\nInfoValue: FakeTK 1.0\nInfoBegin\nInfoKey: Title\nInfoValue: Application\nNumberOfPages: 2\n'
    ;;
  update_info_utf8)
    {
      cat "$src"
      echo "% info"
      cat "$3"
    } > "$5"
    ;;
  *)
    echo "Error: unknown operation $op" >&2
    exit 1
    ;;
esac
exit 0
"#;

    const FAKE_EXIFTOOL: &str = r#"#!/bin/sh
for last; do :; done
echo "% exif stripped" >> "$last"
"#;

    const FAILING_PDFTK: &str = "#!/bin/sh\necho 'Error: Failed to open PDF file:' >&2\nexit 1\n";

    struct Fixture {
        dir: TempDir,
        filler: PdfFiller,
        source: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_pdftk(FAKE_PDFTK)
        }

        fn with_pdftk(pdftk_script: &str) -> Self {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let pdftk = write_script(dir.path(), "pdftk", pdftk_script);
            let exiftool = write_script(dir.path(), "exiftool", FAKE_EXIFTOOL);

            let source = dir.path().join("form.pdf");
            std::fs::write(&source, "%PDF-1.4 form\n").unwrap();

            Self {
                filler: PdfFiller::with_toolchain(
                    Toolchain::default()
                        .with_pdftk(pdftk)
                        .with_metadata_stripper(exiftool),
                ),
                dir,
                source,
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn fill_bytes(fixture: &Fixture, form: &Form, options: FillOptions) -> String {
        let output = fixture
            .filler
            .fill(form, &fixture.source, None, options)
            .expect("fill should succeed");
        let bytes = output.into_bytes().expect("no destination means bytes");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_fill_returns_bytes_with_fdf_payload() {
        let fixture = Fixture::new();
        let form = Form::new().with("field_1", "Hello").with("field_2", "World");

        let text = fill_bytes(&fixture, &form, FillOptions::default());
        assert!(text.starts_with("%PDF-1.4 form\n"));
        assert!(text.contains("% payload data.fdf"));
        assert!(text.contains("<< /T (field_1) /V (Hello)>>\n<< /T (field_2) /V (World)>>"));
        assert!(text.contains("% flattened"));
        assert!(!text.contains("% exif stripped"));
    }

    #[test]
    fn test_fill_with_xfdf_without_flatten() {
        let fixture = Fixture::new();
        let form = Form::new().with("greeting", "\u{3053}\u{3093}\u{306B}\u{3061}\u{306F}");

        let options = FillOptions::default()
            .with_format(FieldFormat::Xfdf)
            .with_flatten(false);
        let text = fill_bytes(&fixture, &form, options);

        assert!(text.contains("% payload data.xfdf"));
        assert!(text.contains(
            "<field name=\"greeting\"><value>\u{3053}\u{3093}\u{306B}\u{3061}\u{306F}</value></field>"
        ));
        assert!(!text.contains("% flattened"));
    }

    #[test]
    fn test_fill_encoding_error_before_tool_runs() {
        let fixture = Fixture::new();
        let form = Form::new().with("price", "\u{20AC}10");
        let destination = fixture.path("filled.pdf");

        let result = fixture
            .filler
            .fill(&form, &fixture.source, Some(destination.as_path()), FillOptions::default());
        assert!(matches!(result, Err(Error::Encoding { .. })));
        assert!(!destination.exists());
    }

    #[test]
    fn test_fill_writes_destination() {
        let fixture = Fixture::new();
        let destination = fixture.path("out/filled.pdf");
        std::fs::create_dir(fixture.path("out")).unwrap();

        let form = Form::new().with("field_1", "Hello");
        let output = fixture
            .filler
            .fill(&form, &fixture.source, Some(destination.as_path()), FillOptions::default())
            .unwrap();

        assert_eq!(output, FillOutput::Written(destination.clone()));
        let written = std::fs::read_to_string(&destination).unwrap();
        assert!(written.contains("<< /T (field_1) /V (Hello)>>"));
    }

    #[test]
    fn test_existing_destination_is_left_untouched() {
        let fixture = Fixture::new();
        let destination = fixture.path("filled.pdf");
        std::fs::write(&destination, b"original bytes").unwrap();

        let form = Form::new().with("field_1", "Hello");
        let options = FillOptions::default().with_overwrite(false);
        let result = fixture
            .filler
            .fill(&form, &fixture.source, Some(destination.as_path()), options);

        assert!(matches!(result, Err(Error::DestinationExists { .. })));
        assert_eq!(std::fs::read(&destination).unwrap(), b"original bytes");
    }

    #[test]
    fn test_existing_destination_is_replaced_with_overwrite() {
        let fixture = Fixture::new();
        let destination = fixture.path("filled.pdf");
        std::fs::write(&destination, b"original bytes").unwrap();

        let form = Form::new().with("field_1", "Hello");
        let options = FillOptions::default().with_overwrite(true);
        fixture
            .filler
            .fill(&form, &fixture.source, Some(destination.as_path()), options)
            .unwrap();

        let written = std::fs::read_to_string(&destination).unwrap();
        assert!(written.starts_with("%PDF-1.4 form\n"));
    }

    #[test]
    fn test_remove_metadata_clears_info_and_strips_xmp() {
        let fixture = Fixture::new();
        let form = Form::new().with("field_1", "Hello");

        let text = fill_bytes(
            &fixture,
            &form,
            FillOptions::default().with_remove_metadata(true),
        );

        assert!(text.contains("% info\nInfoBegin\nInfoKey: Producer\nInfoValue: \n"));
        assert!(text.contains("InfoKey: Title\nInfoValue: \n"));
        assert!(!text.contains("FakeTK"));
        assert!(text.trim_end().ends_with("% exif stripped"));
    }

    #[test]
    fn test_remove_metadata_requires_stripper() {
        let fixture = Fixture::new();
        let filler = PdfFiller::with_toolchain(
            fixture
                .filler
                .toolchain()
                .clone()
                .with_metadata_stripper("/nonexistent/exiftool"),
        );

        let result = filler.fill(
            &Form::new(),
            &fixture.source,
            None,
            FillOptions::default().with_remove_metadata(true),
        );
        match result {
            Err(Error::ToolNotInstalled { tool }) => assert_eq!(tool, "exiftool"),
            other => panic!("expected ToolNotInstalled, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_failure_carries_stderr() {
        let fixture = Fixture::with_pdftk(FAILING_PDFTK);
        let destination = fixture.path("filled.pdf");

        let result = fixture.filler.fill(
            &Form::new().with("field_1", "Hello"),
            &fixture.source,
            Some(destination.as_path()),
            FillOptions::default(),
        );
        match result {
            Err(Error::ToolInvocation { tool, stderr }) => {
                assert_eq!(tool, "pdftk");
                assert_eq!(stderr, "Error: Failed to open PDF file:");
            }
            other => panic!("expected ToolInvocation, got {:?}", other),
        }
        assert!(!destination.exists());
    }

    #[test]
    fn test_get_fields_tool_failure() {
        let fixture = Fixture::with_pdftk(FAILING_PDFTK);

        match fixture.filler.get_fields(&fixture.source) {
            Err(Error::ToolInvocation { tool, stderr }) => {
                assert_eq!(tool, "pdftk");
                assert_eq!(stderr, "Error: Failed to open PDF file:");
            }
            other => panic!("expected ToolInvocation, got {:?}", other),
        }

        match fixture.filler.read_info(&fixture.source) {
            Err(Error::ToolInvocation { stderr, .. }) => {
                assert_eq!(stderr, "Error: Failed to open PDF file:");
            }
            other => panic!("expected ToolInvocation, got {:?}", other),
        }
    }

    #[test]
    fn test_get_fields() {
        let fixture = Fixture::new();
        let fields = fixture.filler.get_fields(&fixture.source).unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_type, "text");
        assert_eq!(fields[0].name, "field_1");
        assert_eq!(fields[0].flags, "0");
        assert_eq!(fields[1].field_type, "button");
        assert_eq!(fields[1].alt_name, "I agree");
    }

    #[test]
    fn test_read_and_update_info() {
        let fixture = Fixture::new();

        let info = fixture.filler.read_info(&fixture.source).unwrap();
        assert_eq!(info.get("Producer"), Some("FakeTK 1.0"));
        assert_eq!(info.page_count, Some(2));

        let destination = fixture.path("titled.pdf");
        fixture
            .filler
            .update_info(
                &fixture.source,
                &[InfoEntry::new("Title", "Filled application")],
                Some(destination.as_path()),
                false,
            )
            .unwrap();
        let written = std::fs::read_to_string(&destination).unwrap();
        assert!(written.contains("InfoKey: Title\nInfoValue: Filled application\n"));

        let again = fixture.filler.update_info(
            &fixture.source,
            &[InfoEntry::new("Title", "Second")],
            Some(destination.as_path()),
            false,
        );
        assert!(matches!(again, Err(Error::DestinationExists { .. })));
    }

    #[tokio::test]
    async fn test_server_fill_form_to_path() {
        let fixture = Fixture::new();
        let server = PdfServer::with_config(ServerConfig {
            resource_dirs: vec![fixture.dir.path().to_string_lossy().to_string()],
            toolchain: fixture.filler.toolchain().clone(),
        });

        let output_path = fixture.path("filled.pdf");
        let params = serde_json::from_value(serde_json::json!({
            "source": {"path": fixture.source.to_string_lossy()},
            "fields": {"field_1": "Hello", "count": 2, "agree": true},
            "output_path": output_path.to_string_lossy(),
        }))
        .unwrap();

        let result = server.process_fill_form(&params).await.unwrap();
        assert_eq!(result.fields_written, 3);
        assert!(result.output_base64.is_none());

        let written = std::fs::read_to_string(&output_path).unwrap();
        assert!(written.contains("<< /T (agree) /V (true)>>"));
        assert!(written.contains("<< /T (count) /V (2)>>"));
    }

    #[tokio::test]
    async fn test_server_fill_form_base64_roundtrip() {
        use base64::Engine;

        let fixture = Fixture::new();
        let server = PdfServer::with_config(ServerConfig {
            resource_dirs: vec![],
            toolchain: fixture.filler.toolchain().clone(),
        });

        let engine = base64::engine::general_purpose::STANDARD;
        let params = serde_json::from_value(serde_json::json!({
            "source": {"base64": engine.encode(b"%PDF-1.7 inline\n")},
            "fields": {"field_1": "Hello"},
            "flatten": false,
        }))
        .unwrap();

        let result = server.process_fill_form(&params).await.unwrap();
        assert_eq!(result.source, "<base64>");
        let bytes = engine.decode(result.output_base64.unwrap()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.7 inline\n"));
        assert!(!text.contains("% flattened"));
    }

    #[tokio::test]
    async fn test_server_get_form_fields() {
        let fixture = Fixture::new();
        let server = PdfServer::with_config(ServerConfig {
            resource_dirs: vec![],
            toolchain: fixture.filler.toolchain().clone(),
        });

        let source = PdfSource::Path {
            path: fixture.source.to_string_lossy().to_string(),
        };
        let result = server.process_get_form_fields(&source).await.unwrap();
        assert_eq!(result.total_fields, 2);
        assert_eq!(result.fields[1].name, "agree");
    }
}
