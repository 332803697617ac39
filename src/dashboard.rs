//! Renders the snapshot into the self-contained dashboard document: last
//! reading, 30-day Chart.js line chart, and full history table. The only
//! external resource is the charting library, which is either referenced from
//! the CDN or served as a local `chart.umd.min.js` copy for offline rooms.

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::snapshot::Snapshot;
use crate::store::{Reading, StatusFlag};

/// File name of the user-supplied offline charting library.
pub const CHART_ASSET_FILE: &str = "chart.umd.min.js";

pub const CHART_CDN_URL: &str = "https://cdn.jsdelivr.net/npm/chart.js";

/// Where the chart library is loaded from. Mutually exclusive modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartSource {
    /// `chart.umd.min.js` next to the document inside the publish directory.
    Local,
    /// Fixed CDN URL.
    Remote,
}

impl ChartSource {
    pub fn script_tag(self) -> String {
        match self {
            ChartSource::Local => format!(r#"<script src="{CHART_ASSET_FILE}"></script>"#),
            ChartSource::Remote => format!(r#"<script src="{CHART_CDN_URL}"></script>"#),
        }
    }
}

/// Decides the chart source for this render. Offline mode prefers a library
/// copy already in the publish directory, then one in the application asset
/// directory (copied in on demand), and degrades to the CDN otherwise.
pub fn resolve_chart_source(publish_dir: &Path, asset_dir: &Path, offline: bool) -> ChartSource {
    if !offline {
        return ChartSource::Remote;
    }
    let in_publish_dir = publish_dir.join(CHART_ASSET_FILE);
    if in_publish_dir.is_file() {
        return ChartSource::Local;
    }
    let in_asset_dir = asset_dir.join(CHART_ASSET_FILE);
    if in_asset_dir.is_file() {
        // The publish directory may not exist yet on the first cycle.
        let _ = fs::create_dir_all(publish_dir);
        match fs::copy(&in_asset_dir, &in_publish_dir) {
            Ok(_) => {
                info!(from = %in_asset_dir.display(), to = %in_publish_dir.display(),
                    "Copied offline chart library into publish directory");
                return ChartSource::Local;
            }
            Err(e) => {
                warn!(error = %e, "Could not copy offline chart library; falling back to CDN");
                return ChartSource::Remote;
            }
        }
    }
    warn!(dir = %publish_dir.display(), "Offline chart mode requested but no local library found; using CDN");
    ChartSource::Remote
}

/// An immutable rendered document plus the generation timestamp embedded in
/// it. The archive file name is derived from the commit time, not from this.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub html: String,
    pub generated_at: NaiveDateTime,
}

/// Display form used everywhere the operator reads a timestamp.
pub fn display_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%d/%m/%y %H:%M").to_string()
}

/// Sensor values are always shown with two decimals.
pub fn format_value(value: f64) -> String {
    format!("{value:.2}")
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

const TITLE: &str = "Dashboard Parametri Ambientali MRI";

const STYLE: &str = r#"  :root {
    --bg:#0f172a; --card:#111827; --muted:#94a3b8; --accent:#38bdf8; --text:#e5e7eb;
  }
  * { box-sizing: border-box; }
  body { margin:0; font-family: system-ui,-apple-system,Segoe UI,Roboto,Ubuntu,Arial; background:var(--bg); color:var(--text); }
  .wrap { max-width: 1100px; margin:0 auto; padding:16px; }
  .title { font-size: clamp(20px, 3vw, 28px); font-weight:700; margin:8px 0 2px; }
  .subtitle { color: var(--muted); margin-bottom: 14px; }
  .grid { display:grid; grid-template-columns: repeat(12, 1fr); gap: 12px; }
  .card { background:var(--card); border-radius:16px; padding:14px; box-shadow: 0 6px 24px rgba(0,0,0,.25); }
  .span-12 { grid-column: span 12; }
  .span-6 { grid-column: span 6; }
  @media (max-width: 860px) { .span-6 { grid-column: span 12; } }
  .kv { display:grid; grid-template-columns: 1fr auto; gap:6px; padding:8px 0; border-bottom: 1px dashed rgba(255,255,255,.08); }
  .kv:last-child { border-bottom:none; }
  .k { color:var(--muted); }
  .v { font-weight:700; }
  .badge { display:inline-block; padding:4px 8px; border-radius:9999px; font-size:12px; }
  .ok { background: rgba(34,197,94,.15); color:#86efac; }
  .no { background: rgba(239,68,68,.15); color:#fecaca; }
  table { width:100%; border-collapse: collapse; }
  th, td { text-align:center; padding:8px 6px; border-bottom:1px solid rgba(255,255,255,.08); font-size:13px; }
  th { color:var(--muted); position:sticky; top:0; background:var(--card); }
  tr:nth-child(even) td { background: rgba(255,255,255,.02); }
  .foot { color:var(--muted); font-size:12px; text-align:center; margin-top:14px; }
  .chartbox { height: 260px; }"#;

/// Renders the dashboard. Deterministic: identical snapshot, chart source and
/// `generated_at` produce identical bytes.
pub fn render(
    snapshot: &Snapshot,
    chart_source: ChartSource,
    generated_at: NaiveDateTime,
) -> RenderedDocument {
    let latest = &snapshot.latest;

    let labels: Vec<String> = snapshot
        .window
        .iter()
        .map(|r| display_timestamp(&r.timestamp))
        .collect();
    let o2: Vec<f64> = snapshot.window.iter().map(|r| r.o2).collect();
    let rh1: Vec<f64> = snapshot.window.iter().map(|r| r.rh1).collect();
    let temp1: Vec<f64> = snapshot.window.iter().map(|r| r.temp1).collect();
    let rh2: Vec<f64> = snapshot.window.iter().map(|r| r.rh2).collect();
    let temp2: Vec<f64> = snapshot.window.iter().map(|r| r.temp2).collect();

    let html = format!(
        r#"<!doctype html>
<html lang="it">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
{chart_tag}
<style>
{style}
</style>
</head>
<body>
  <div class="wrap">
    <div class="title">🏥 {title}</div>
    <div class="subtitle">Aggiornato al {updated} — Operatore: {operator}</div>

    <div class="grid">
      <div class="card span-6">
        <div class="title" style="font-size:18px;">Ultima lettura</div>
        <div class="kv"><div class="k">Data/Ora</div><div class="v">{updated}</div></div>
        <div class="kv"><div class="k">O2 (%)</div><div class="v">{o2}</div></div>
        <div class="kv"><div class="k">RH 1 (%)</div><div class="v">{rh1}</div></div>
        <div class="kv"><div class="k">Temp 1 (°C)</div><div class="v">{temp1}</div></div>
        <div class="kv"><div class="k">RH 2 (%)</div><div class="v">{rh2}</div></div>
        <div class="kv"><div class="k">Temp 2 (°C)</div><div class="v">{temp2}</div></div>
        <div class="kv"><div class="k">Elio</div><div class="v">{elio}</div></div>
        <div class="kv"><div class="k">Aspirazione</div><div class="v">{aspirazione}</div></div>
      </div>

      <div class="card span-6">
        <div class="title" style="font-size:18px;">Andamento ultimi 30 giorni</div>
        <div class="chartbox"><canvas id="chart"></canvas></div>
      </div>

      <div class="card span-12">
        <div class="title" style="font-size:18px;">Storico (30 giorni)</div>
        <div style="overflow:auto; max-height: 46vh;">
          <table>
            <thead>
              <tr>
                <th>Data/Ora</th>
                <th>O2 (%)</th>
                <th>RH 1 (%)</th>
                <th>Temp 1 (°C)</th>
                <th>RH 2 (%)</th>
                <th>Temp 2 (°C)</th>
                <th>Elio</th>
                <th>Aspirazione</th>
                <th>Operatore</th>
              </tr>
            </thead>
            <tbody>
{table_rows}
            </tbody>
          </table>
        </div>
      </div>
    </div>

    <div class="foot">Generato automaticamente — {generated}</div>
  </div>

<script>
  const labels = {labels_json};
  const dataO2 = {o2_json};
  const dataRH1 = {rh1_json};
  const dataT1 = {t1_json};
  const dataRH2 = {rh2_json};
  const dataT2 = {t2_json};

  const ctx = document.getElementById('chart').getContext('2d');
  new Chart(ctx, {{
    type: 'line',
    data: {{
      labels: labels,
      datasets: [
        {{ label: 'O2 (%)', data: dataO2, tension: .25 }},
        {{ label: 'RH 1 (%)', data: dataRH1, tension: .25 }},
        {{ label: 'Temp 1 (°C)', data: dataT1, tension: .25 }},
        {{ label: 'RH 2 (%)', data: dataRH2, tension: .25 }},
        {{ label: 'Temp 2 (°C)', data: dataT2, tension: .25 }}
      ]
    }},
    options: {{
      responsive: true,
      maintainAspectRatio: false,
      scales: {{
        x: {{ ticks: {{ maxRotation: 0, autoSkip: true }} }},
        y: {{ beginAtZero: false }}
      }}
    }}
  }});
</script>
</body>
</html>"#,
        title = TITLE,
        chart_tag = chart_source.script_tag(),
        style = STYLE,
        updated = display_timestamp(&latest.timestamp),
        operator = escape_html(&latest.operatore),
        o2 = format_value(latest.o2),
        rh1 = format_value(latest.rh1),
        temp1 = format_value(latest.temp1),
        rh2 = format_value(latest.rh2),
        temp2 = format_value(latest.temp2),
        elio = badge(latest.elio_ok),
        aspirazione = badge(latest.aspirazione_ok),
        table_rows = history_rows(&snapshot.window),
        generated = display_timestamp(&generated_at),
        labels_json = to_json(&labels),
        o2_json = to_json(&o2),
        rh1_json = to_json(&rh1),
        t1_json = to_json(&temp1),
        rh2_json = to_json(&rh2),
        t2_json = to_json(&temp2),
    );

    RenderedDocument { html, generated_at }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

fn badge(flag: StatusFlag) -> String {
    let class = match flag {
        StatusFlag::Si => "ok",
        StatusFlag::No => "no",
    };
    format!(r#"<span class="badge {class}">{}</span>"#, flag.as_str())
}

fn history_rows(window: &[Reading]) -> String {
    let mut rows = String::new();
    for r in window {
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
    rows
}
