//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, build_strategy, build_execution_config)
//! - Data source selection (build_data_port)
//! - Code resolution logic (resolve_codes)
//! - Report selection (report_format, lot_size)
//! - Dry-run mode with real INI files on disk
//! - Full pipeline over CSV fixtures written to a temp directory

mod common;

use chrono::NaiveTime;
use common::*;
use std::io::Write;
use std::path::Path;
use tailtrader::adapters::csv_adapter::{write_daily_csv, write_intraday_csv};
use tailtrader::adapters::file_config_adapter::FileConfigAdapter;
use tailtrader::cli::{self, ReportFormat};
use tailtrader::domain::error::TailtraderError;
use tailtrader::domain::execution::SellPolicy;
use tailtrader::domain::strategy::{Strategy, TrendWindow};

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn config(content: &str) -> FileConfigAdapter {
    FileConfigAdapter::from_string(content).unwrap()
}

fn exit_code_debug(code: std::process::ExitCode) -> String {
    format!("{code:?}")
}

const VALID_INI: &str = r#"
[data]
source = csv
path = /var/lib/tailtrader

[backtest]
start_date = 2024-01-01
end_date = 2024-12-31
workers = 4
codes = sh600000,sz000001

[strategy]
kind = threshold
min_turnover_pct = 2.5
max_turnover_pct = 6.0

[execution]
buy_time = 14:50:00
sell_time = 10:00:00
tick = 0.01
sell_policy = trigger

[report]
format = text
lot_size = 100
"#;

mod config_loading {
    use super::*;

    #[test]
    fn valid_ini_builds_backtest_config() {
        let cfg = cli::build_backtest_config(&config(VALID_INI)).unwrap();
        assert_eq!(cfg.start_date, date("2024-01-01"));
        assert_eq!(cfg.end_date, date("2024-12-31"));
        assert_eq!(cfg.workers, 4);
    }

    #[test]
    fn workers_default_to_ten() {
        let cfg = cli::build_backtest_config(&config(
            "[backtest]\nstart_date = 2024-01-01\nend_date = 2024-02-01\n",
        ))
        .unwrap();
        assert_eq!(cfg.workers, 10);
    }

    #[test]
    fn missing_start_date_fails() {
        let err = cli::build_backtest_config(&config("[backtest]\nend_date = 2024-02-01\n"))
            .unwrap_err();
        assert!(matches!(err, TailtraderError::ConfigMissing { ref key, .. } if key == "start_date"));
    }

    #[test]
    fn inverted_period_fails() {
        let err = cli::build_backtest_config(&config(
            "[backtest]\nstart_date = 2024-03-01\nend_date = 2024-02-01\n",
        ))
        .unwrap_err();
        assert!(matches!(err, TailtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let result = cli::load_config(Path::new("/nonexistent/tailtrader.ini"));
        let code = result.err().unwrap();
        assert_eq!(
            exit_code_debug(code),
            exit_code_debug(std::process::ExitCode::from(2))
        );
    }
}

mod strategy_building {
    use super::*;

    #[test]
    fn threshold_reads_turnover_band() {
        match cli::build_strategy(&config(VALID_INI)).unwrap() {
            Strategy::Threshold(f) => {
                assert_eq!(f.min_turnover_pct, 2.5);
                assert_eq!(f.max_turnover_pct, 6.0);
            }
            other => panic!("expected threshold, got {other:?}"),
        }
    }

    #[test]
    fn missing_kind_defaults_to_threshold() {
        let strategy = cli::build_strategy(&config("[strategy]\n")).unwrap();
        assert_eq!(strategy.name(), "threshold");
    }

    #[test]
    fn trend_converts_units() {
        let ini = r#"
[strategy]
kind = trend
min_turnover_pct = 1.0
min_market_cap = 5000000000
cutoff_time = 14:30
max_high_deviation_pct = 1.5
ma_period = 10
lookback = 15
min_above_ma_pct = 60
min_rise_pct = 1.0
max_rise_pct = 4.0
trend_window = sliding
"#;
        match cli::build_strategy(&config(ini)).unwrap() {
            Strategy::Trend(t) => {
                assert_eq!(t.threshold.min_turnover_pct, 1.0);
                assert_eq!(t.min_market_cap, 5_000_000_000_000);
                assert_eq!(t.max_market_cap, i128::MAX);
                assert_eq!(t.cutoff_time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
                assert_eq!(t.max_high_deviation_bp, 150);
                assert_eq!(t.ma_period, 10);
                assert_eq!(t.lookback, 15);
                assert_eq!(t.min_above_ma_bp, 6_000);
                assert_eq!(t.min_rise_bp, 100);
                assert_eq!(t.max_rise_bp, 400);
                assert_eq!(t.window, TrendWindow::Sliding);
            }
            other => panic!("expected trend, got {other:?}"),
        }
    }

    #[test]
    fn volume_breakout_ratio_becomes_basis_points() {
        let ini = "[strategy]\nkind = volume_breakout\nvolume_ratio = 3.0\nbase_floor_pct = 75\n";
        match cli::build_strategy(&config(ini)).unwrap() {
            Strategy::VolumeBreakout(v) => {
                assert_eq!(v.volume_ratio_bp, 30_000);
                assert_eq!(v.base_floor_bp, 7_500);
                assert_eq!(v.high_window, 6);
                assert_eq!(v.support_long, 20);
            }
            other => panic!("expected volume breakout, got {other:?}"),
        }
    }

    #[test]
    fn unknown_trend_window_fails() {
        let err = cli::build_strategy(&config("[strategy]\nkind = trend\ntrend_window = weekly\n"))
            .unwrap_err();
        assert!(matches!(err, TailtraderError::ConfigInvalid { ref key, .. } if key == "trend_window"));
    }

    #[test]
    fn malformed_number_fails() {
        let err = cli::build_strategy(&config("[strategy]\nmin_turnover_pct = lots\n")).unwrap_err();
        assert!(matches!(err, TailtraderError::ConfigInvalid { .. }));
    }
}

mod execution_building {
    use super::*;

    #[test]
    fn defaults_apply_without_section() {
        let exec = cli::build_execution_config(&config("")).unwrap();
        assert_eq!(exec.buy_time, NaiveTime::from_hms_opt(14, 50, 0).unwrap());
        assert_eq!(exec.sell_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(exec.tick, Price(10));
        assert_eq!(exec.sell_policy, SellPolicy::Trigger);
    }

    #[test]
    fn reads_custom_values() {
        let exec = cli::build_execution_config(&config(
            "[execution]\nbuy_time = 14:55\nsell_time = 09:45:00\ntick = 0.02\nsell_policy = running_low\n",
        ))
        .unwrap();
        assert_eq!(exec.buy_time, NaiveTime::from_hms_opt(14, 55, 0).unwrap());
        assert_eq!(exec.sell_time, NaiveTime::from_hms_opt(9, 45, 0).unwrap());
        assert_eq!(exec.tick, Price(20));
        assert_eq!(exec.sell_policy, SellPolicy::RunningLow);
    }

    #[test]
    fn bad_tick_fails() {
        let err = cli::build_execution_config(&config("[execution]\ntick = a cent\n")).unwrap_err();
        assert!(matches!(err, TailtraderError::ConfigInvalid { ref key, .. } if key == "tick"));
    }
}

mod data_port_building {
    use super::*;

    #[test]
    fn csv_requires_path() {
        let err = cli::build_data_port(&config("[data]\nsource = csv\n")).err().unwrap();
        assert!(matches!(err, TailtraderError::ConfigMissing { ref key, .. } if key == "path"));
    }

    #[test]
    fn unknown_source_fails() {
        let err = cli::build_data_port(&config("[data]\nsource = parquet\npath = /tmp\n"))
            .err()
            .unwrap();
        assert!(matches!(err, TailtraderError::ConfigInvalid { ref key, .. } if key == "source"));
    }

    #[test]
    fn csv_port_lists_codes_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        write_daily_csv(dir.path(), "sz000001", &[daily_bar("2024-01-02", 10.0, 3.0)]).unwrap();
        write_daily_csv(dir.path(), "sh600000", &[daily_bar("2024-01-02", 10.0, 3.0)]).unwrap();
        let ini = format!("[data]\npath = {}\n", dir.path().display());

        let port = cli::build_data_port(&config(&ini)).unwrap();
        assert_eq!(port.list_codes().unwrap(), vec!["sh600000", "sz000001"]);
    }
}

mod code_resolution {
    use super::*;

    fn catalog() -> MockDataPort {
        MockDataPort::new()
            .with_daily("sh600000", vec![])
            .with_daily("sh601398", vec![])
            .with_daily("sz000001", vec![])
    }

    #[test]
    fn override_wins() {
        let codes = cli::resolve_codes(Some("SZ000002, sh600016"), &config(VALID_INI), &catalog())
            .unwrap();
        assert_eq!(codes, vec!["sz000002", "sh600016"]);
    }

    #[test]
    fn configured_codes_are_used() {
        let codes = cli::resolve_codes(None, &config(VALID_INI), &catalog()).unwrap();
        assert_eq!(codes, vec!["sh600000", "sz000001"]);
    }

    #[test]
    fn catalog_filtered_by_prefixes() {
        let codes = cli::resolve_codes(
            None,
            &config("[backtest]\ncode_prefixes = sh60, \n"),
            &catalog(),
        )
        .unwrap();
        assert_eq!(codes, vec!["sh600000", "sh601398"]);
    }

    #[test]
    fn whole_catalog_without_codes_or_prefixes() {
        let codes = cli::resolve_codes(None, &config(""), &catalog()).unwrap();
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn duplicate_override_fails() {
        let err = cli::resolve_codes(Some("sh600000,SH600000"), &config(""), &catalog()).unwrap_err();
        assert!(matches!(err, TailtraderError::Universe(_)));
    }

    #[test]
    fn empty_catalog_fails() {
        let err = cli::resolve_codes(None, &config(""), &MockDataPort::new()).unwrap_err();
        assert!(matches!(err, TailtraderError::Universe(_)));
    }
}

mod report_selection {
    use super::*;

    #[test]
    fn format_defaults_to_text() {
        assert_eq!(cli::report_format(&config("")).unwrap(), ReportFormat::Text);
        assert_eq!(
            cli::report_format(&config("[report]\nformat = json\n")).unwrap(),
            ReportFormat::Json
        );
        assert!(cli::report_format(&config("[report]\nformat = pdf\n")).is_err());
    }

    #[test]
    fn lot_size_defaults_to_one_hundred() {
        assert_eq!(cli::lot_size(&config("")), 100);
        assert_eq!(cli::lot_size(&config("[report]\nlot_size = 10\n")), 10);
    }
}

mod dry_run {
    use super::*;

    #[test]
    fn valid_config_succeeds() {
        let file = write_temp_ini(VALID_INI);
        let code = cli::run_dry_run(file.path(), None);
        assert_eq!(
            exit_code_debug(code),
            exit_code_debug(std::process::ExitCode::SUCCESS)
        );
    }

    #[test]
    fn invalid_config_fails_with_config_exit_code() {
        let file = write_temp_ini(&VALID_INI.replace("workers = 4", "workers = 0"));
        let code = cli::run_dry_run(file.path(), None);
        assert_eq!(
            exit_code_debug(code),
            exit_code_debug(std::process::ExitCode::from(2))
        );
    }

    #[test]
    fn bad_code_override_fails() {
        let file = write_temp_ini(VALID_INI);
        let code = cli::run_dry_run(file.path(), Some("sh600000,,sz000001"));
        assert_eq!(
            exit_code_debug(code),
            exit_code_debug(std::process::ExitCode::from(5))
        );
    }
}

mod csv_end_to_end {
    use super::*;

    fn seed(root: &Path) {
        let (daily, intraday) = flat_market(&[
            ("2024-03-01", 10.0, 3.0),
            ("2024-03-04", 10.5, 3.0),
            ("2024-03-05", 10.2, 3.0),
        ]);
        write_daily_csv(root, "sh600000", &daily).unwrap();
        write_intraday_csv(root, "sh600000", 2024, &intraday).unwrap();
        write_daily_csv(root, "sz000001", &[]).unwrap();
    }

    fn ini(root: &Path, format: &str) -> String {
        format!(
            "[data]\npath = {}\n\n[backtest]\nstart_date = 2024-01-01\nend_date = 2024-12-31\nworkers = 2\n\n[report]\nformat = {format}\n",
            root.display()
        )
    }

    #[test]
    fn text_report_summarizes_run() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let report = cli::execute_backtest(&config(&ini(dir.path(), "text")), None, None).unwrap();

        assert!(report.contains("Strategy:        threshold"));
        assert!(report.contains("Total trades:    2"));
        // (+0.48 - 0.32) * 100 shares.
        assert!(report.contains("Total profit:    16.00 / lot"));
        assert!(report.contains("Skipped codes (1):"));
        assert!(report.contains("sz000001"));
    }

    #[test]
    fn json_report_carries_minor_units() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let report = cli::execute_backtest(
            &config(&ini(dir.path(), "text")),
            Some("sh600000"),
            Some(ReportFormat::Json),
        )
        .unwrap();

        let json: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(json["summary"]["total_trades"], 2);
        assert_eq!(json["summary"]["total_profit"], 160);
        assert_eq!(json["trades"][0]["entry_price"], 10_010);
        assert_eq!(json["trades"][0]["exit_time"], "2024-03-04T10:00:00");
        assert_eq!(json["outcomes"][0]["state"], "done");
    }

    #[test]
    fn config_failure_stops_before_running() {
        let dir = tempfile::TempDir::new().unwrap();
        seed(dir.path());
        let ini = ini(dir.path(), "text").replace("workers = 2", "workers = 0");
        let err = cli::execute_backtest(&config(&ini), None, None).unwrap_err();
        assert!(matches!(err, TailtraderError::ConfigInvalid { ref key, .. } if key == "workers"));
    }
}
