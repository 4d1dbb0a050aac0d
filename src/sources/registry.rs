use anyhow::{Context, Result};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::info;

use super::spec::{Iteration, PayloadFormat, RangeSpec, SourceSpec, StatCode};
use crate::config::FailurePolicy;
use crate::fetch::json::ResultCode;
use crate::process::{DateColumn, Normalization, Predicate, RenameRule, RowFilter};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Defence-related contracts from the public procurement contract API, one request per month.
fn procurement() -> SourceSpec {
    SourceSpec {
        name: "procurement".into(),
        description: "Public procurement contracts placed by defence agencies".into(),
        endpoint: "https://apis.data.go.kr/1230000/ao/CntrctInfoService/getCntrctInfoListThng"
            .into(),
        query: labels(&[
            ("serviceKey", "{api_key}"),
            ("pageNo", "1"),
            ("numOfRows", "999"),
            ("inqryDiv", "1"),
            ("inqryBgnDate", "{start_date}0000"),
            ("inqryEndDate", "{end_date}2359"),
        ]),
        format: PayloadFormat::Xml {
            item: "item".into(),
        },
        api_key_env: Some("PROCUREMENT_API_KEY".into()),
        iteration: Iteration::Monthly,
        range: RangeSpec {
            start: "202301".into(),
            end: None,
        },
        normalize: Normalization {
            columns: strings(&[
                "cntrctCnclsDate",
                "untyCntrctNo",
                "cntrctNm",
                "dminsttNm",
                "thtmCntrctAmt",
                "totCntrctAmt",
            ]),
            drop_columns: strings(&[
                "rgstDt",
                "chgDt",
                "dcsnCntrctNo",
                "cntrctRefNo",
                "baseLawNm",
                "cntrctDtlInfoUrl",
                "crdtrNm",
                "pubPrcrmntLrgClsfcNm",
                "pubPrcrmntMidClsfcNm",
            ]),
            rename: vec![RenameRule {
                column: "cntrctCnclsMthdNm".into(),
                labels: labels(&[
                    ("수의계약", "Private contract"),
                    ("제한경쟁", "Restricted competition"),
                    ("일반경쟁", "Open competition"),
                    ("지명경쟁", "Nominated competition"),
                ]),
            }],
            filter: Some(RowFilter {
                column: "dminsttNm".into(),
                matches: Predicate::Contains("국방".into()),
                keep: true,
            }),
            date_column: None,
        },
        throttle_ms: 0,
        on_error: FailurePolicy::FailFast,
        output: "processed/defence/procurement_contracts.csv".into(),
    }
}

/// Bank of Korea ECOS monthly statistics, one request per statistic code.
fn ecos() -> SourceSpec {
    SourceSpec {
        name: "ecos".into(),
        description: "Bank of Korea ECOS monthly indicators".into(),
        endpoint: "https://ecos.bok.or.kr/api/StatisticSearch/{api_key}/json/kr/1/10000/{code}/M/{start}/{end}/{item}"
            .into(),
        query: BTreeMap::new(),
        format: PayloadFormat::Json {
            rows: "/StatisticSearch/row".into(),
            result_code: Some(ResultCode {
                code: "/RESULT/CODE".into(),
                message: Some("/RESULT/MESSAGE".into()),
                ok: vec![],
                empty: vec!["INFO-200".into()],
            }),
        },
        api_key_env: Some("ECOS_API_KEY".into()),
        iteration: Iteration::Codes {
            codes: vec![
                StatCode { code: "722Y001".into(), item: Some("0101000".into()) },
                StatCode { code: "901Y009".into(), item: Some("0".into()) },
                StatCode { code: "511Y002".into(), item: Some("FME".into()) },
                StatCode { code: "512Y014".into(), item: Some("C0000".into()) },
                StatCode { code: "403Y001".into(), item: Some("*AA".into()) },
                StatCode { code: "401Y015".into(), item: Some("*AA".into()) },
                StatCode { code: "731Y004".into(), item: Some("0000001".into()) },
            ],
            tag_column: "source_code".into(),
        },
        range: RangeSpec {
            start: "201501".into(),
            end: None,
        },
        normalize: Normalization {
            columns: strings(&["source_code", "TIME", "ITEM_NAME1", "DATA_VALUE", "UNIT_NAME"]),
            drop_columns: strings(&[
                "ITEM_CODE2",
                "ITEM_NAME2",
                "ITEM_CODE3",
                "ITEM_NAME3",
                "ITEM_CODE4",
                "ITEM_NAME4",
                "WGT",
            ]),
            rename: vec![RenameRule {
                column: "source_code".into(),
                labels: labels(&[
                    ("722Y001", "Base rate"),
                    ("901Y009", "Consumer price index"),
                    ("511Y002", "Consumer sentiment index"),
                    ("512Y014", "Business survey index"),
                    ("403Y001", "Export price index"),
                    ("401Y015", "Import price index"),
                    ("731Y004", "KRW/USD exchange rate"),
                ]),
            }],
            filter: None,
            date_column: None,
        },
        throttle_ms: 300,
        on_error: FailurePolicy::SkipAndLog,
        output: "processed/economy/ecos_indicators.csv".into(),
    }
}

/// IEA monthly electricity statistics for Korea, one bulk request.
fn iea() -> SourceSpec {
    SourceSpec {
        name: "iea".into(),
        description: "IEA monthly electricity statistics".into(),
        endpoint: "https://api.iea.org/mes/monthly".into(),
        query: labels(&[
            ("countries", "KOR"),
            ("startYear", "{start_year}"),
            ("endYear", "{end_year}"),
        ]),
        format: PayloadFormat::Json {
            rows: "".into(),
            result_code: None,
        },
        api_key_env: None,
        iteration: Iteration::Bulk,
        range: RangeSpec {
            start: "201801".into(),
            end: None,
        },
        normalize: Normalization {
            columns: strings(&["date", "country", "balance", "product", "value", "unit"]),
            drop_columns: strings(&["yearToDate", "previousYearToDate", "share", "flag"]),
            rename: vec![RenameRule {
                column: "product".into(),
                labels: labels(&[
                    ("COAL", "Coal"),
                    ("NATGAS", "Natural gas"),
                    ("OIL", "Oil"),
                    ("NUCLEAR", "Nuclear"),
                    ("HYDRO", "Hydro"),
                    ("WIND", "Wind"),
                    ("SOLAR", "Solar"),
                    ("COMRENEW", "Combustible renewables"),
                    ("TOTAL", "Total"),
                ]),
            }],
            filter: Some(RowFilter {
                column: "balance".into(),
                matches: Predicate::Equals("Net Electricity Production".into()),
                keep: true,
            }),
            date_column: Some(DateColumn {
                year: "year".into(),
                month: "month".into(),
                target: "date".into(),
                format: "%Y-%m".into(),
            }),
        },
        throttle_ms: 0,
        on_error: FailurePolicy::FailFast,
        output: "processed/energy/iea_electricity.csv".into(),
    }
}

/// Petronet petroleum supply/demand workbook, saved as downloaded.
fn petronet() -> SourceSpec {
    SourceSpec {
        name: "petronet".into(),
        description: "Petronet petroleum supply and demand export".into(),
        endpoint: "https://www.petronet.co.kr/v4/excel/KDXQ0010.jsp".into(),
        query: labels(&[("sMonth", "{start}"), ("eMonth", "{end}")]),
        format: PayloadFormat::Binary,
        api_key_env: None,
        iteration: Iteration::Bulk,
        range: RangeSpec {
            start: "201501".into(),
            end: None,
        },
        normalize: Normalization::default(),
        throttle_ms: 0,
        on_error: FailurePolicy::FailFast,
        output: "raw/energy/petronet_supply.xls".into(),
    }
}

/// The built-in source table, keyed by name.
pub fn builtin() -> BTreeMap<String, SourceSpec> {
    [procurement(), ecos(), iea(), petronet()]
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect()
}

/// Built-in sources, with entries from a YAML list layered on top: an entry
/// whose name matches replaces the built-in one, others are added.
pub fn load(overrides: Option<&Path>) -> Result<BTreeMap<String, SourceSpec>> {
    let mut table = builtin();
    if let Some(path) = overrides {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let extra: Vec<SourceSpec> = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing source table {}", path.display()))?;
        info!(path = %path.display(), count = extra.len(), "loaded source overrides");
        for spec in extra {
            table.insert(spec.name.clone(), spec);
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builtin_names_and_policies() {
        let table = builtin();
        let names: Vec<&str> = table.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["ecos", "iea", "petronet", "procurement"]);
        assert_eq!(table["ecos"].throttle_ms, 300);
        assert_eq!(table["ecos"].on_error, FailurePolicy::SkipAndLog);
        assert!(table.values().all(|s| s.range.end.is_none()));
    }

    #[test]
    fn yaml_round_trip_and_override() {
        let tmp = tempdir().unwrap();
        let mut ecos = builtin()["ecos"].clone();
        ecos.throttle_ms = 1000;
        let added = SourceSpec {
            name: "kosis".into(),
            output: "processed/industry/kosis.csv".into(),
            ..builtin()["iea"].clone()
        };
        let yaml = serde_yaml::to_string(&vec![ecos.clone(), added.clone()]).unwrap();
        let path = tmp.path().join("sources.yaml");
        fs::write(&path, yaml).unwrap();

        let table = load(Some(&path)).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table["ecos"], ecos);
        assert_eq!(table["kosis"], added);
        assert_eq!(table["iea"], builtin()["iea"]);
    }

    #[test]
    fn hand_written_yaml_entry() {
        let yaml = r#"
- name: trade
  endpoint: https://example.test/trade/{start}
  format: { kind: json, rows: /data }
  iteration: { kind: bulk }
  range: { start: "202001" }
  drop_columns: [internal_id]
  output: processed/korea_trade/trade.csv
"#;
        let specs: Vec<SourceSpec> = serde_yaml::from_str(yaml).unwrap();
        let spec = &specs[0];
        assert_eq!(spec.on_error, FailurePolicy::SkipAndLog);
        assert_eq!(spec.normalize.drop_columns, vec!["internal_id"]);
        assert!(spec.normalize.columns.is_empty());
        assert_eq!(
            spec.format,
            PayloadFormat::Json {
                rows: "/data".into(),
                result_code: None
            }
        );
    }
}
