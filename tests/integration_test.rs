//! Integration tests for linescrub

use std::collections::HashMap;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use linescrub::config::{
    Config, DestinationConfig, NullHandling, SanitizeConfig, SourceConfig,
};
use linescrub::pipeline::{Pipeline, RunReport};

/// Build a config over tempdir-backed local storage.
fn local_config(dir: &TempDir, sanitize: SanitizeConfig) -> Config {
    Config {
        source: SourceConfig {
            path: dir.path().join("in.txt").to_string_lossy().into_owned(),
            chunk_size_bytes: 32,
            storage_options: HashMap::new(),
        },
        destination: DestinationConfig {
            path: dir.path().join("out.txt").to_string_lossy().into_owned(),
            flush_threshold_bytes: 32,
            storage_options: HashMap::new(),
        },
        sanitize,
        metrics: Default::default(),
    }
}

async fn run(dir: &TempDir, input: &[u8], sanitize: SanitizeConfig) -> RunReport {
    std::fs::write(dir.path().join("in.txt"), input).unwrap();
    let config = local_config(dir, sanitize);
    let mut pipeline = Pipeline::new(config, CancellationToken::new())
        .await
        .unwrap();
    pipeline.run().await.unwrap()
}

fn output_lines(dir: &TempDir) -> Vec<String> {
    std::fs::read_to_string(dir.path().join("out.txt"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

mod scenario_tests {
    use super::*;

    /// Scenario A: drop mode rejects the NULL-sentinel line and the
    /// non-ASCII line; only the clean line survives.
    #[tokio::test]
    async fn test_drop_mode_tilde_extract() {
        let dir = TempDir::new().unwrap();
        let input = "Col1~Col2~Col3\nNULL~NULL~\n09BB\u{00BF}~NY~1G\ngood~good~good\n";

        let report = run(&dir, input.as_bytes(), SanitizeConfig::default()).await;

        assert_eq!(
            output_lines(&dir),
            vec!["Col1~Col2~Col3".to_string(), "good~good~good".to_string()]
        );
        assert_eq!(report.summary.total_lines_seen, 4);
        assert_eq!(report.summary.accepted_count, 1);
        assert_eq!(report.summary.rejected_count, 2);
        assert_eq!(report.summary.percent_accepted, 25.0);
        assert_eq!(report.bad_lines.len(), 2);
        assert_eq!(report.bad_lines[0].line_number, 2);
        assert_eq!(report.bad_lines[0].rule.as_deref(), Some("null-sentinel"));
        assert_eq!(report.bad_lines[1].line_number, 3);
        assert_eq!(report.bad_lines[1].rule.as_deref(), Some("non-ascii"));
    }

    /// Scenario B: replace mode keeps the line, stripping the sentinel to
    /// an empty field.
    #[tokio::test]
    async fn test_replace_mode_strips_sentinel() {
        let dir = TempDir::new().unwrap();
        let input = b"HEADER1~HEADER2~HEADER3\nvalue1~NULL~value3\n";
        let sanitize = SanitizeConfig {
            null_handling: NullHandling::Replace,
            ..SanitizeConfig::default()
        };

        let report = run(&dir, input, sanitize).await;

        assert_eq!(
            output_lines(&dir),
            vec![
                "HEADER1~HEADER2~HEADER3".to_string(),
                "value1~~value3".to_string()
            ]
        );
        assert_eq!(report.summary.rejected_count, 0);
    }

    /// Scenario C: a tab-delimited line exactly one trailing field short is
    /// repaired by appending one delimiter.
    #[tokio::test]
    async fn test_tab_delimiter_off_by_one_repair() {
        let dir = TempDir::new().unwrap();
        let input = b"HEADER1\tHEADER2\tHEADER3\nvalue1\tvalue2\n";
        let sanitize = SanitizeConfig {
            delimiter: "\t".to_string(),
            ..SanitizeConfig::default()
        };

        let report = run(&dir, input, sanitize).await;

        let lines = output_lines(&dir);
        assert_eq!(lines[1], "value1\tvalue2\t");
        // Repaired line has expected_column_count fields.
        assert_eq!(lines[1].split('\t').count(), 3);
        assert_eq!(report.summary.repaired_count, 1);
        assert_eq!(report.summary.accepted_count, 1);
        assert_eq!(report.summary.rejected_count, 0);
    }
}

mod property_tests {
    use super::*;

    /// Clean input: every data line accepted, nothing rejected.
    #[tokio::test]
    async fn test_clean_input_accepts_everything() {
        let dir = TempDir::new().unwrap();
        let mut input = String::from("c1~c2~c3\n");
        for i in 0..100 {
            input.push_str(&format!("a{i}~b{i}~c{i}\n"));
        }

        let report = run(&dir, input.as_bytes(), SanitizeConfig::default()).await;

        assert_eq!(report.summary.total_lines_seen, 101);
        assert_eq!(
            report.summary.accepted_count,
            report.summary.total_lines_seen - 1
        );
        assert_eq!(report.summary.rejected_count, 0);
    }

    /// Round-trip: a clean file passes through byte-identical
    /// (newline-normalized).
    #[tokio::test]
    async fn test_round_trip_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let input = "h1~h2~h3\nr1a~r1b~r1c\nr2a~r2b~r2c\n";

        run(&dir, input.as_bytes(), SanitizeConfig::default()).await;

        let output = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(output, input);
    }

    /// Idempotence: sanitizing the sanitizer's own output rejects nothing.
    #[tokio::test]
    async fn test_idempotent_on_own_output() {
        let first = TempDir::new().unwrap();
        let input = "h1~h2~h3\nok~ok~ok\nshort~line\nNULL~NULL~\nmore~ok~fields\n";
        let report = run(&first, input.as_bytes(), SanitizeConfig::default()).await;
        assert!(report.summary.rejected_count > 0 || report.summary.repaired_count > 0);

        let cleaned = std::fs::read(first.path().join("out.txt")).unwrap();

        let second = TempDir::new().unwrap();
        let report = run(&second, &cleaned, SanitizeConfig::default()).await;

        assert_eq!(report.summary.rejected_count, 0);
        assert_eq!(report.summary.repaired_count, 0);
        let again = std::fs::read(second.path().join("out.txt")).unwrap();
        assert_eq!(again, cleaned);
    }

    /// Flush granularity never shows up in the final artifact.
    #[tokio::test]
    async fn test_flush_threshold_invisible() {
        let mut input = String::from("c1~c2\n");
        for i in 0..200 {
            input.push_str(&format!("row{i}~val{i}\n"));
        }

        let mut outputs = Vec::new();
        for threshold in [1usize, 7, 64, 1 << 20] {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("in.txt"), input.as_bytes()).unwrap();
            let mut config = local_config(&dir, SanitizeConfig::default());
            config.destination.flush_threshold_bytes = threshold;

            let mut pipeline = Pipeline::new(config, CancellationToken::new())
                .await
                .unwrap();
            pipeline.run().await.unwrap();
            outputs.push(std::fs::read(dir.path().join("out.txt")).unwrap());
        }

        for pair in outputs.windows(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    /// Chunk boundaries never split a logical line's classification.
    #[tokio::test]
    async fn test_tiny_read_chunks_classify_identically() {
        let input = "h1~h2~h3\ngood~fields~here\nbad~count\nNULL~NULL~\n";

        let big = TempDir::new().unwrap();
        std::fs::write(big.path().join("in.txt"), input).unwrap();
        let config_big = local_config(&big, SanitizeConfig::default());

        let small = TempDir::new().unwrap();
        std::fs::write(small.path().join("in.txt"), input).unwrap();
        let mut config_small = local_config(&small, SanitizeConfig::default());
        config_small.source.chunk_size_bytes = 1;

        for config in [config_big, config_small] {
            let mut pipeline = Pipeline::new(config, CancellationToken::new())
                .await
                .unwrap();
            let report = pipeline.run().await.unwrap();
            assert_eq!(report.summary.accepted_count, 1);
            assert_eq!(report.summary.repaired_count, 1);
            assert_eq!(report.summary.rejected_count, 1);
        }
        assert_eq!(output_lines(&big), output_lines(&small));
    }

    /// A final line with no trailing newline is still processed, and the
    /// output is fully newline-terminated.
    #[tokio::test]
    async fn test_unterminated_final_line() {
        let dir = TempDir::new().unwrap();
        let report = run(&dir, b"h1~h2\nlast~line", SanitizeConfig::default()).await;

        assert_eq!(report.summary.total_lines_seen, 2);
        assert_eq!(report.summary.accepted_count, 1);
        let output = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(output, "h1~h2\nlast~line\n");
    }
}

mod report_tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_lines_render_with_carets() {
        let dir = TempDir::new().unwrap();
        let input = "Col1~Col2~Col3\n09BB\u{00BF}~NY~1G\n".as_bytes();

        let report = run(&dir, input, SanitizeConfig::default()).await;

        let record = &report.bad_lines[0];
        let rendered = record.render();
        assert_eq!(rendered[0], "line 2: 09BB\u{00BF}~NY~1G");
        assert!(rendered[1].contains('^'));
        assert_eq!(rendered[1].chars().count(), rendered[0].chars().count());
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_writing() {
        let dir = TempDir::new().unwrap();
        let input = b"h1~h2\nok~fine\nNULL~NULL~\n";
        let sanitize = SanitizeConfig {
            dry_run: true,
            ..SanitizeConfig::default()
        };

        let report = run(&dir, input, sanitize).await;

        assert_eq!(report.summary.accepted_count, 1);
        assert_eq!(report.summary.rejected_count, 1);
        assert!(!dir.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn test_custom_reject_pattern_reported_by_name() {
        let dir = TempDir::new().unwrap();
        let input = b"h1~h2\nSKIP~me\nkeep~me\n";
        let sanitize = SanitizeConfig {
            reject_patterns: vec!["^SKIP".to_string()],
            ..SanitizeConfig::default()
        };

        let report = run(&dir, input, sanitize).await;

        assert_eq!(report.summary.accepted_count, 1);
        assert_eq!(report.bad_lines[0].rule.as_deref(), Some("^SKIP"));
        assert_eq!(output_lines(&dir), vec!["h1~h2", "keep~me"]);
    }

    #[tokio::test]
    async fn test_latin1_extract_with_utf8_config_rejects_by_decode() {
        let dir = TempDir::new().unwrap();
        // 0xBF alone is invalid UTF-8.
        let input: &[u8] = b"h1~h2~h3\nok~ok~ok\nbad\xBF~x~y\n";

        let report = run(&dir, input, SanitizeConfig::default()).await;

        assert_eq!(report.summary.accepted_count, 1);
        assert_eq!(report.summary.rejected_count, 1);
        let record = &report.bad_lines[0];
        assert!(record.raw_line.is_none());
        // Line 3 starts at byte 18; the bad byte is 3 bytes in.
        assert_eq!(record.byte_position, Some(21));
    }
}
