//! Standalone HTML export of the record table over an optional date interval.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use tracing::info;

use crate::dashboard::{display_timestamp, escape_html, format_value};
use crate::store::Reading;

const TITLE: &str = "Registro Parametri Ambientali MRI";

const HEADERS: &[&str] = &[
    "Data/Ora",
    "O2 (%)",
    "RH Umidità 1 (%)",
    "Temperatura 1 (°C)",
    "RH Umidità 2 (%)",
    "Temperatura 2 (°C)",
    "Livello di elio (SI/NO)",
    "Aspirazione forzata (SI/NO)",
    "Operatore",
];

const STYLE: &str = r#"body { font-family: 'Segoe UI', Arial, Helvetica, sans-serif; margin: 40px; background:#f8f9fa; color:#2c3e50; }
h1 { margin-bottom: .2rem; text-align:center; }
p.meta { color: #555; margin-top: 0; text-align:center; }
table { border-collapse: collapse; width: 100%; margin-top: 16px; background:#fff; box-shadow:0 2px 10px rgba(0,0,0,.05);}
th, td { border-bottom: 1px solid #ecf0f1; padding: 10px; text-align: center; font-size: 14px; }
th { background: #3498db; color:#fff; position:sticky; top:0; }
tr:nth-child(even) { background: #f8f9fa; }
.footer { margin-top: 24px; font-size: 12px; color: #777; text-align:center; }
@media print {
  body { margin: 0; }
  h1 { font-size: 20px; }
}"#;

/// Writes the record table for the given interval to `out_path`. The period
/// line names the bounds the operator asked for; an omitted bound shows "-".
pub fn export_records(
    records: &[Reading],
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    out_path: &Path,
) -> io::Result<()> {
    let period = if start.is_some() || end.is_some() {
        format!(
            "Intervallo: {} → {}",
            start.map(|t| display_timestamp(&t)).unwrap_or_else(|| "-".into()),
            end.map(|t| display_timestamp(&t)).unwrap_or_else(|| "-".into()),
        )
    } else {
        String::new()
    };

    let headers: String = HEADERS
        .iter()
        .map(|label| format!("<th>{label}</th>"))
        .collect();

    let mut rows = String::new();
    for r in records {
        rows.push_str(&format!(
            "<tr>\n  <td>{}</td>\n  <td>{}</td>\n  <td>{}</td>\n  <td>{}</td>\n  <td>{}</td>\n  <td>{}</td>\n  <td>{}</td>\n  <td>{}</td>\n  <td>{}</td>\n</tr>\n",
            display_timestamp(&r.timestamp),
            format_value(r.o2),
            format_value(r.rh1),
            format_value(r.temp1),
            format_value(r.rh2),
            format_value(r.temp2),
            r.elio_ok,
            r.aspirazione_ok,
            escape_html(&r.operatore),
        ));
    }

    let html = format!(
        r#"<!doctype html>
<html lang="it">
<head>
<meta charset="utf-8">
<title>{title}</title>
<meta name="viewport" content="width=device-width, initial-scale=1">
<style>
{style}
</style>
</head>
<body>
<h1>🏥 {title}</h1>
<p class="meta">{period}</p>
<table>
<thead>
<tr>{headers}</tr>
</thead>
<tbody>
{rows}</tbody>
</table>
<div class="footer">Generato il {generated}</div>
</body>
</html>"#,
        title = TITLE,
        style = STYLE,
        period = period,
        headers = headers,
        rows = rows,
        generated = Local::now().format("%d/%m/%y %H:%M"),
    );

    fs::write(out_path, html)?;
    info!(path = %out_path.display(), records = records.len(), "Record table exported");
    Ok(())
}
